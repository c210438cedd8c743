// Command line and environment configuration
use crate::blt_models::{Coordinate, Result, TrackerError};
use crate::blt_overlay::MapView;
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use reqwest::Url;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "BLT")]
#[command(about = "Live bus tracking with current/next stop estimates")]
pub struct Args {
    /// Base URL of the transit backend
    #[arg(long, env = "BUS_API_BASE_URL", default_value = "http://localhost:8000/api")]
    pub api_base_url: String,

    /// JSON file mapping route numbers to their ordered stops
    #[arg(long, env = "ROUTE_CATALOG", default_value = "data/routes.json")]
    pub catalog: PathBuf,

    /// Delay between two vehicle refreshes, in milliseconds
    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 7000)]
    pub poll_interval_ms: u64,

    /// Quiet period before a search is sent, in milliseconds
    #[arg(long, env = "SEARCH_DEBOUNCE_MS", default_value_t = 300)]
    pub debounce_ms: u64,

    /// HTTP request timeout, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 15)]
    pub request_timeout_secs: u64,

    /// Timezone used when printing update times
    #[arg(long, env = "DISPLAY_TZ", default_value = "Asia/Kolkata")]
    pub timezone: String,

    /// Initial map center latitude
    #[arg(long, default_value_t = 19.076, allow_negative_numbers = true)]
    pub center_lat: f64,

    /// Initial map center longitude
    #[arg(long, default_value_t = 72.878, allow_negative_numbers = true)]
    pub center_lng: f64,

    /// Initial map zoom level
    #[arg(long, default_value_t = 11)]
    pub zoom: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Follow the live vehicles of a route until Ctrl-C
    Track {
        /// Route number, e.g. 12A
        route: String,
    },
    /// Read search input from stdin, one keystroke state per line
    Search,
    /// List the routes in the catalog
    Routes,
}

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub api_base_url: String,
    pub catalog_path: PathBuf,
    pub poll_interval: Duration,
    pub debounce: Duration,
    pub request_timeout: Duration,
    pub timezone: Tz,
    pub initial_view: MapView,
}

impl TrackerConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.poll_interval_ms == 0 {
            return Err(TrackerError::ConfigError("Poll interval must be greater than zero".to_string()));
        }
        if args.request_timeout_secs == 0 {
            return Err(TrackerError::ConfigError("Request timeout must be greater than zero".to_string()));
        }

        let api_base_url = args.api_base_url.trim();
        Url::parse(api_base_url)
            .map_err(|e| TrackerError::ConfigError(format!("Invalid API base URL '{}': {}", api_base_url, e)))?;

        let timezone: Tz = args
            .timezone
            .parse()
            .map_err(|e| TrackerError::ConfigError(format!("Unknown timezone '{}': {}", args.timezone, e)))?;

        let center = Coordinate::new(args.center_lat, args.center_lng)
            .map_err(|e| TrackerError::ConfigError(format!("Invalid map center: {}", e)))?;

        Ok(TrackerConfig {
            api_base_url: api_base_url.to_string(),
            catalog_path: args.catalog.clone(),
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            debounce: Duration::from_millis(args.debounce_ms),
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            timezone,
            initial_view: MapView {
                center,
                zoom: args.zoom,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["BLT"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults_follow_the_web_client() {
        let args = parse(&["--api-base-url", "http://example.test", "track", "12A"]);
        assert_eq!(args.command, Command::Track { route: "12A".to_string() });

        let config = TrackerConfig::from_args(&args).unwrap();
        assert_eq!(config.poll_interval, Duration::from_millis(7000));
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.timezone, chrono_tz::Asia::Kolkata);
        assert_eq!(config.initial_view.zoom, 11);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let args = parse(&["--poll-interval-ms", "0", "routes"]);
        assert!(matches!(
            TrackerConfig::from_args(&args),
            Err(TrackerError::ConfigError(_))
        ));
    }

    #[test]
    fn bad_timezone_and_center_are_rejected() {
        let args = parse(&["--timezone", "Mars/Olympus", "routes"]);
        assert!(TrackerConfig::from_args(&args).is_err());

        let args = parse(&["--center-lat", "-95.0", "routes"]);
        assert!(TrackerConfig::from_args(&args).is_err());

        let args = parse(&["--api-base-url", "not a url", "routes"]);
        assert!(TrackerConfig::from_args(&args).is_err());
    }
}
