// Overlay ownership: route line, stop markers and vehicle markers
use crate::blt_geo;
use crate::blt_models::{Coordinate, Stop, Vehicle};
use log::debug;

// ============================================================================
// Rendering Surface
// ============================================================================

/// Opaque reference to a shape drawn on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OverlayHandle(u64);

impl OverlayHandle {
    pub fn new(id: u64) -> Self {
        OverlayHandle(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineStyle {
    pub color: String,
    pub weight: f32,
    pub opacity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Stop,
    Vehicle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOptions {
    pub kind: MarkerKind,
    pub color: Option<String>,
    pub title: Option<String>,
    pub tooltip: Option<String>,
    pub popup: Option<String>,
}

/// Something that can show a base map and draw shapes on it.
pub trait RenderSurface {
    fn draw_line(&mut self, points: &[Coordinate], style: &LineStyle) -> OverlayHandle;
    fn draw_marker(&mut self, point: Coordinate, options: &MarkerOptions) -> OverlayHandle;
    fn remove_layer(&mut self, handle: OverlayHandle);
    fn pan_to(&mut self, point: Coordinate);
    fn set_view(&mut self, point: Coordinate, zoom: u8);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub center: Coordinate,
    pub zoom: u8,
}

// ============================================================================
// Layer Manager
// ============================================================================

const ROUTE_OUTLINE_COLOR: &str = "#ffffff";
pub const ROUTE_LINE_COLOR: &str = "#2563eb";
const STOP_MARKER_COLOR: &str = "#1d4ed8";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayCounts {
    pub route_line: usize,
    pub stop_markers: usize,
    pub vehicle_markers: usize,
}

/// Sole owner of every overlay handle. Each group is fully released before
/// its next generation is drawn.
pub struct OverlayLayerManager<S: RenderSurface> {
    surface: S,
    route_line: Vec<OverlayHandle>,
    stop_markers: Vec<OverlayHandle>,
    vehicle_markers: Vec<OverlayHandle>,
}

impl<S: RenderSurface> OverlayLayerManager<S> {
    pub fn new(mut surface: S, initial_view: MapView) -> Self {
        surface.set_view(initial_view.center, initial_view.zoom);
        OverlayLayerManager {
            surface,
            route_line: Vec::new(),
            stop_markers: Vec::new(),
            vehicle_markers: Vec::new(),
        }
    }

    /// Replace the route line and stop markers. An empty list just clears them.
    pub fn set_route(&mut self, stops: &[Stop]) {
        Self::release(&mut self.surface, &mut self.route_line);
        Self::release(&mut self.surface, &mut self.stop_markers);

        if stops.is_empty() {
            debug!("No stops to draw, route overlay left empty");
            return;
        }

        let points: Vec<Coordinate> = stops.iter().map(|s| s.coordinate).collect();

        // Pale underlay first so the colored stroke stays readable on any tiles
        let outline = LineStyle {
            color: ROUTE_OUTLINE_COLOR.to_string(),
            weight: 8.0,
            opacity: 0.9,
        };
        let main = LineStyle {
            color: ROUTE_LINE_COLOR.to_string(),
            weight: 5.0,
            opacity: 0.95,
        };
        self.route_line.push(self.surface.draw_line(&points, &outline));
        self.route_line.push(self.surface.draw_line(&points, &main));

        // Zoom is left alone
        if stops.len() > 1 {
            if let Some(center) = blt_geo::route_center(stops) {
                self.surface.pan_to(center);
            }
        }

        for stop in stops {
            let options = MarkerOptions {
                kind: MarkerKind::Stop,
                color: Some(STOP_MARKER_COLOR.to_string()),
                title: None,
                tooltip: stop.name.clone(),
                popup: stop.name.clone(),
            };
            let handle = self.surface.draw_marker(stop.coordinate, &options);
            self.stop_markers.push(handle);
        }

        debug!("Route drawn with {} stops", stops.len());
    }

    /// Replace the vehicle markers. Vehicles without a usable position are skipped.
    /// Never moves the viewport.
    pub fn set_vehicles(&mut self, vehicles: &[Vehicle]) {
        Self::release(&mut self.surface, &mut self.vehicle_markers);

        for vehicle in vehicles {
            let Some(point) = vehicle.coordinate else {
                debug!("Skipping vehicle {} without a position", vehicle.id);
                continue;
            };
            let options = MarkerOptions {
                kind: MarkerKind::Vehicle,
                color: None,
                title: Some(format!("{} #{}", vehicle.route_no, vehicle.id)),
                tooltip: None,
                popup: Some(Self::vehicle_popup(vehicle)),
            };
            let handle = self.surface.draw_marker(point, &options);
            self.vehicle_markers.push(handle);
        }
    }

    /// Release every handle, e.g. when the tracking view goes away.
    pub fn teardown(&mut self) {
        Self::release(&mut self.surface, &mut self.route_line);
        Self::release(&mut self.surface, &mut self.stop_markers);
        Self::release(&mut self.surface, &mut self.vehicle_markers);
    }

    pub fn counts(&self) -> OverlayCounts {
        OverlayCounts {
            route_line: self.route_line.len(),
            stop_markers: self.stop_markers.len(),
            vehicle_markers: self.vehicle_markers.len(),
        }
    }

    #[cfg(test)]
    pub fn surface(&self) -> &S {
        &self.surface
    }

    fn release(surface: &mut S, group: &mut Vec<OverlayHandle>) {
        for handle in group.drain(..) {
            surface.remove_layer(handle);
        }
    }

    fn vehicle_popup(vehicle: &Vehicle) -> String {
        let mut popup = format!("{}\nBus #{}", vehicle.route_no, vehicle.id);
        let detail = match &vehicle.status {
            Some(status) if !status.trim().is_empty() => format!("{} {}", status.trim(), vehicle.direction),
            _ => vehicle.direction.to_string(),
        };
        popup.push('\n');
        popup.push_str(&detail);
        popup
    }
}

// ============================================================================
// Test Support
// ============================================================================
