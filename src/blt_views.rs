// Views for the Bus Live Tracker terminal client
use crate::blt_catalog::RouteCatalog;
use crate::blt_controllers::{SearchStatus, StopEstimate, StopRef, TrackingStatus};
use crate::blt_models::{Coordinate, Vehicle};
use crate::blt_overlay::{LineStyle, MarkerKind, MarkerOptions, OverlayHandle, ROUTE_LINE_COLOR, RenderSurface};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{debug, info};
use std::time::Duration;

pub struct BLTViews;

impl BLTViews {
    pub fn show_welcome_screen() {
        println!("\n{}", "═".repeat(70));
        println!("     🚌 BUS LIVE TRACKER");
        println!("{}", "═".repeat(70));
    }

    /// List every catalogued route with its stop count
    pub fn show_routes(catalog: &RouteCatalog) {
        Self::show_welcome_screen();
        if catalog.is_empty() {
            println!("\n⚠️  The route catalog is empty");
            println!("{}", "═".repeat(70));
            return;
        }

        println!("\n🗺️  ROUTES WITH STOP DATA ({})", catalog.len());
        println!("{}", "─".repeat(70));
        for (route, stops) in catalog.summary() {
            println!("  {}  {} stops", Self::colorize_route(route), stops);
        }
        println!("{}", "═".repeat(70));
    }

    pub fn show_tracking_header(route: &str, interval: Duration) {
        Self::show_welcome_screen();
        println!("\n🔄 Tracking route {}", Self::colorize_route(route));
        println!("   Refreshing every {} seconds", interval.as_secs_f32());
        println!("   Press Ctrl+C to stop");
    }

    /// Show one tracking update: buses, stop estimate and any fetch error
    pub fn show_tracking_status(status: &TrackingStatus, tz: &Tz) {
        if status.route.is_empty() {
            println!("\n⚠️  No route selected");
            return;
        }

        println!("\n{}", "═".repeat(70));
        println!(
            "🔄 LIVE TRACKING - Route {} - Update #{}",
            Self::colorize_route(&status.route),
            status.refresh_count
        );
        match status.last_update {
            Some(at) => println!("📅 {}", Self::format_update_time(at, tz)),
            None => println!("📅 Waiting for the first update..."),
        }
        if !status.has_stop_data {
            println!("   (no stop data for this route)");
        }
        println!("{}", "─".repeat(70));

        if !status.vehicles.is_empty() {
            println!("🚌 {} active buses", status.vehicles.len());
            for vehicle in &status.vehicles {
                Self::display_vehicle(vehicle);
            }
            println!("{}", "─".repeat(70));
        }

        Self::display_estimate(&status.estimate);

        if let Some(error) = &status.error {
            println!("\n⚠️  {}", error);
            println!("   Showing the last known positions, retrying on the next refresh");
        }
        println!("{}", "═".repeat(70));
    }

    fn display_vehicle(vehicle: &Vehicle) {
        let position = match vehicle.coordinate {
            Some(c) => c.to_string(),
            None => "position unknown".to_string(),
        };
        let status = vehicle.status.as_deref().unwrap_or("");
        println!("  • Bus #{} {} {} {}", vehicle.id, position, vehicle.direction, status);
    }

    fn display_estimate(estimate: &StopEstimate) {
        match estimate {
            StopEstimate::Located { current, next } => {
                println!("📍 Current stop: {}", Self::stop_label(current));
                println!("➡️  Next stop:    {}", Self::stop_label(next));
            }
            StopEstimate::Pending => println!("⏳ Waiting for bus positions..."),
            StopEstimate::NoVehicles => println!("🚫 No active buses on this route"),
            StopEstimate::NoStopData => println!("📭 No stop data available for this route"),
            StopEstimate::NoPosition => println!("❓ First bus did not report a usable position"),
        }
    }

    fn stop_label(stop: &StopRef) -> String {
        format!("{} (stop {})", stop.name.as_deref().unwrap_or("—"), stop.index + 1)
    }

    pub fn show_search_help() {
        Self::show_welcome_screen();
        println!("\n🔍 Type a route number, source or destination");
        println!("   Each line replaces the search box contents; an empty line clears it");
        println!("   Press Ctrl+D to finish");
    }

    pub fn show_suggestions(status: &SearchStatus) {
        if let Some(error) = &status.error {
            println!("\n⚠️  {}", error);
        }
        if status.suggestions.is_empty() {
            println!("\n💡 No suggestions");
            return;
        }

        println!("\n💡 Suggestions ({}):", status.suggestions.len());
        for suggestion in &status.suggestions {
            println!(
                "  {}  {} → {}",
                Self::colorize_route(&suggestion.route_no),
                suggestion.source,
                suggestion.destination
            );
        }
    }

    pub fn goodbye_message() {
        println!("\n{}", "═".repeat(70));
        println!("       👋 Thank you for using Bus Live Tracker!");
        println!("{}", "═".repeat(70));
        println!();
    }

    pub fn format_update_time(at: DateTime<Utc>, tz: &Tz) -> String {
        at.with_timezone(tz).format("%A, %B %d, %Y at %H:%M:%S %Z").to_string()
    }

    /// Route badge in the map's route line color
    fn colorize_route(route: &str) -> String {
        let (r, g, b) = parse_hex_color(ROUTE_LINE_COLOR);
        format!("\x1b[48;2;{};{};{}m\x1b[97m {} \x1b[0m", r, g, b, route)
    }
}

/// `#rrggbb` to RGB, grey when malformed
fn parse_hex_color(hex: &str) -> (u8, u8, u8) {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return (128, 128, 128);
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).unwrap_or(128);
    (channel(0), channel(2), channel(4))
}

// ============================================================================
// Console Surface
// ============================================================================

/// Render surface for the terminal: no map, every draw call becomes a log line.
#[derive(Debug, Default)]
pub struct ConsoleSurface {
    next_id: u64,
    live: usize,
}

impl ConsoleSurface {
    fn next_handle(&mut self) -> OverlayHandle {
        self.next_id += 1;
        self.live += 1;
        OverlayHandle::new(self.next_id)
    }
}

impl RenderSurface for ConsoleSurface {
    fn draw_line(&mut self, points: &[Coordinate], style: &LineStyle) -> OverlayHandle {
        debug!("Line through {} points in {} (weight {})", points.len(), style.color, style.weight);
        self.next_handle()
    }

    fn draw_marker(&mut self, point: Coordinate, options: &MarkerOptions) -> OverlayHandle {
        let label = options
            .title
            .as_deref()
            .or(options.tooltip.as_deref())
            .unwrap_or("unnamed");
        match options.kind {
            MarkerKind::Stop => debug!("Stop marker {} at {}", label, point),
            MarkerKind::Vehicle => debug!("Bus marker {} at {}", label, point),
        }
        self.next_handle()
    }

    fn remove_layer(&mut self, handle: OverlayHandle) {
        self.live = self.live.saturating_sub(1);
        debug!("Removed layer {} ({} still drawn)", handle.id(), self.live);
    }

    fn pan_to(&mut self, point: Coordinate) {
        info!("Map centered on {}", point);
    }

    fn set_view(&mut self, point: Coordinate, zoom: u8) {
        info!("Map view at {} zoom {}", point, zoom);
    }
}
