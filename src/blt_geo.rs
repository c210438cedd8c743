// Great-circle distance and nearest-stop matching
use crate::blt_models::{Coordinate, Direction, Stop};
use geo::{BoundingRect, LineString};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance in meters on a spherical Earth.
pub fn distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1_rad = a.lat().to_radians();
    let lat2_rad = b.lat().to_radians();
    let delta_lat = (b.lat() - a.lat()).to_radians();
    let delta_lng = (b.lng() - a.lng()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Center of the bounding box around a list of stops.
pub fn route_center(stops: &[Stop]) -> Option<Coordinate> {
    let line: LineString<f64> = stops
        .iter()
        .map(|s| (s.coordinate.lng(), s.coordinate.lat()))
        .collect::<Vec<_>>()
        .into();
    let center = line.bounding_rect()?.center();
    Coordinate::new(center.y, center.x).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopMatch {
    pub current_idx: usize,
    pub next_idx: usize,
}

/// Find the stop closest to `vehicle` and the one it heads to next.
///
/// Ties go to the lowest index. Returns `None` for an empty stop list.
pub fn locate(vehicle: Coordinate, direction: Direction, stops: &[Stop]) -> Option<StopMatch> {
    let mut best: Option<(usize, f64)> = None;
    for (i, stop) in stops.iter().enumerate() {
        let d = distance(vehicle, stop.coordinate);
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((i, d)),
        }
    }

    let (current_idx, _) = best?;
    let last = stops.len() - 1;
    let next_idx = match direction {
        Direction::Up => (current_idx + 1).min(last),
        Direction::Down => current_idx.saturating_sub(1),
    };

    Some(StopMatch {
        current_idx,
        next_idx,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng).unwrap()
    }

    fn line_of_stops() -> Vec<Stop> {
        (0..5)
            .map(|i| Stop::new(coord(19.0 + i as f64 * 0.01, 72.8), Some(&format!("S{}", i))))
            .collect()
    }

    #[test]
    fn distance_to_self_is_zero_and_symmetric() {
        let a = coord(19.076, 72.878);
        let b = coord(18.5204, 73.8567);
        assert_eq!(distance(a, a), 0.0);
        assert_eq!(distance(a, b), distance(b, a));
    }

    #[test]
    fn one_degree_of_latitude() {
        let d = distance(coord(0.0, 0.0), coord(1.0, 0.0));
        // 6_371_000 * pi / 180
        assert!((d - 111_194.93).abs() < 1.0);
    }

    #[test]
    fn mumbai_to_pune() {
        let d = distance(coord(19.076, 72.878), coord(18.5204, 73.8567));
        assert!((d - 120_000.0).abs() < 5_000.0);
    }

    #[test]
    fn vehicle_at_each_stop_going_up() {
        let stops = line_of_stops();
        for i in 0..stops.len() {
            let m = locate(stops[i].coordinate, Direction::Up, &stops).unwrap();
            assert_eq!(m.current_idx, i);
            assert_eq!(m.next_idx, (i + 1).min(stops.len() - 1));
        }
    }

    #[test]
    fn vehicle_at_each_stop_going_down() {
        let stops = line_of_stops();
        for i in 0..stops.len() {
            let m = locate(stops[i].coordinate, Direction::Down, &stops).unwrap();
            assert_eq!(m.current_idx, i);
            assert_eq!(m.next_idx, i.saturating_sub(1));
        }
    }

    #[test]
    fn ties_go_to_first_stop() {
        let stops = vec![
            Stop::new(coord(19.0, 72.8), Some("A")),
            Stop::new(coord(19.0, 72.8), Some("B")),
            Stop::new(coord(19.5, 72.8), Some("C")),
        ];
        let m = locate(coord(19.0, 72.8), Direction::Up, &stops).unwrap();
        assert_eq!(m, StopMatch { current_idx: 0, next_idx: 1 });
    }

    #[test]
    fn single_stop_clamps_both_ways() {
        let stops = vec![Stop::new(coord(19.0, 72.8), None)];
        let v = coord(19.2, 72.9);
        assert_eq!(locate(v, Direction::Up, &stops), Some(StopMatch { current_idx: 0, next_idx: 0 }));
        assert_eq!(locate(v, Direction::Down, &stops), Some(StopMatch { current_idx: 0, next_idx: 0 }));
    }

    #[test]
    fn empty_stop_list_has_no_match() {
        assert_eq!(locate(coord(19.0, 72.8), Direction::Up, &[]), None);
        assert_eq!(route_center(&[]), None);
    }

    #[test]
    fn route_center_is_bounding_box_midpoint() {
        let stops = vec![
            Stop::new(coord(19.00, 72.80), None),
            Stop::new(coord(19.10, 72.90), None),
            Stop::new(coord(19.02, 72.84), None),
        ];
        let center = route_center(&stops).unwrap();
        assert!((center.lat() - 19.05).abs() < 1e-9);
        assert!((center.lng() - 72.85).abs() < 1e-9);
    }
}
