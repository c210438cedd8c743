// Domain models and errors for the Bus Live Tracker
//
// Backend endpoints consumed by the tracker:
// - Active vehicles on a route: <base>/buses/routes/{routeId}/active-buses
// - Route search suggestions:   <base>/buses/search?query={text}

use std::fmt;

// ============================================================================
// Data Structures
// ============================================================================

/// A validated WGS84 position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting non-finite or out-of-range values.
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(TrackerError::ParseError(format!(
                "Non-finite coordinate ({}, {})",
                lat, lng
            )));
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(TrackerError::ParseError(format!(
                "Coordinate out of range ({}, {})",
                lat, lng
            )));
        }
        Ok(Coordinate { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// A stop at a fixed position along a route.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub coordinate: Coordinate,
    pub name: Option<String>,
}

impl Stop {
    pub fn new(coordinate: Coordinate, name: Option<&str>) -> Self {
        Stop {
            coordinate,
            name: name.map(String::from),
        }
    }
}

/// Direction of travel. Stop lists are ordered along `Up`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Up,
    Down,
}

impl Direction {
    /// Missing or blank means `Up`; anything that is not "UP" counts as `Down`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Direction::Up,
            Some(s) if s.eq_ignore_ascii_case("UP") => Direction::Up,
            Some(_) => Direction::Down,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// One live position report. Only lives for a single poll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: String,
    pub route_no: String,
    /// `None` when the report had no usable position.
    pub coordinate: Option<Coordinate>,
    pub direction: Direction,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Suggestion {
    pub route_no: String,
    pub source: String,
    pub destination: String,
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerError {
    NetworkError(String),
    ParseError(String),
    FileError(String),
    ConfigError(String),
    /// Outcome of an aborted request; never reaches the error callbacks.
    Cancelled,
}

impl TrackerError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TrackerError::Cancelled)
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::NetworkError(e) => write!(f, "Network error: {}", e),
            TrackerError::ParseError(e) => write!(f, "Parse error: {}", e),
            TrackerError::FileError(e) => write!(f, "File error: {}", e),
            TrackerError::ConfigError(e) => write!(f, "Config error: {}", e),
            TrackerError::Cancelled => write!(f, "Request cancelled"),
        }
    }
}

impl std::error::Error for TrackerError {}

pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coordinate_rejects_invalid_values() {
        assert!(Coordinate::new(19.0, 72.8).is_ok());
        assert!(Coordinate::new(f64::NAN, 72.8).is_err());
        assert!(Coordinate::new(19.0, f64::INFINITY).is_err());
        assert!(Coordinate::new(90.5, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
    }

    #[test]
    fn direction_defaults_to_up() {
        assert_eq!(Direction::parse(None), Direction::Up);
        assert_eq!(Direction::parse(Some("  ")), Direction::Up);
        assert_eq!(Direction::parse(Some("up")), Direction::Up);
        assert_eq!(Direction::parse(Some("DOWN")), Direction::Down);
        assert_eq!(Direction::parse(Some("inbound")), Direction::Down);
    }

    #[test]
    fn coordinates_print_with_six_decimals() {
        let stop = Stop::new(Coordinate::new(19.0, 72.8).unwrap(), None);
        assert_eq!(stop.coordinate.to_string(), "(19.000000, 72.800000)");
        assert_eq!(stop.name, None);
    }
}
