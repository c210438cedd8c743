// Transit backend client: active vehicles and route search
use crate::blt_models::{Coordinate, Direction, Result, Suggestion, TrackerError, Vehicle};
use log::debug;
use reqwest::{Client, Url};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// What the tracker needs from the backend.
///
/// Returned futures own everything they need and do not borrow `self`, so they
/// can be spawned; dropping one aborts the underlying request.
pub trait TransitApi: Clone + Send + Sync + 'static {
    fn active_vehicles(&self, route_id: String) -> impl Future<Output = Result<Vec<Vehicle>>> + Send + 'static + use<Self>;
    fn search(&self, query: String) -> impl Future<Output = Result<Vec<Suggestion>>> + Send + 'static + use<Self>;
}

#[derive(Debug, Clone)]
pub struct HttpTransitApi {
    client: Client,
    base_url: Url,
}

impl HttpTransitApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| TrackerError::ConfigError(format!("Invalid API base URL '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(TrackerError::ConfigError(format!(
                "API base URL '{}' cannot carry a path",
                base_url
            )));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(HttpTransitApi { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn vehicles_url(&self, route_id: &str) -> Url {
        self.endpoint(&["buses", "routes", route_id, "active-buses"])
    }

    pub fn search_url(&self, query: &str) -> Url {
        let mut url = self.endpoint(&["buses", "search"]);
        url.query_pairs_mut().append_pair("query", query);
        url
    }
}

async fn get_json(client: Client, url: Url) -> Result<Value> {
    debug!("GET {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| TrackerError::NetworkError(format!("Request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(TrackerError::NetworkError(format!(
            "API returned error: {}",
            response.status()
        )));
    }

    response
        .json::<Value>()
        .await
        .map_err(|e| TrackerError::ParseError(format!("Invalid JSON response: {}", e)))
}

impl TransitApi for HttpTransitApi {
    fn active_vehicles(&self, route_id: String) -> impl Future<Output = Result<Vec<Vehicle>>> + Send + 'static + use<> {
        let client = self.client.clone();
        let url = self.vehicles_url(&route_id);
        async move {
            let body = get_json(client, url).await?;
            Ok(parse_vehicles(&body))
        }
    }

    fn search(&self, query: String) -> impl Future<Output = Result<Vec<Suggestion>>> + Send + 'static + use<> {
        let client = self.client.clone();
        let url = self.search_url(&query);
        async move {
            let body = get_json(client, url).await?;
            Ok(parse_suggestions(&body))
        }
    }
}

// ============================================================================
// Payload Normalisation
// ============================================================================

/// Strings and numbers both work as labels; `bus_id` may be either.
fn label(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Numbers or numeric strings.
fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn parse_vehicle(entry: &Value) -> Vehicle {
    let id = label(&entry["bus_id"])
        .or_else(|| label(&entry["id"]))
        .unwrap_or_else(|| "Unknown".to_string());
    let route_no = label(&entry["route_no"]).unwrap_or_default();

    let coordinate = match (number(&entry["lat"]), number(&entry["lng"])) {
        (Some(lat), Some(lng)) => Coordinate::new(lat, lng).ok(),
        _ => None,
    };

    Vehicle {
        id,
        route_no,
        coordinate,
        direction: Direction::parse(entry["direction"].as_str()),
        status: entry["status"].as_str().map(String::from),
    }
}

/// Anything but a JSON array counts as "no vehicles".
pub fn parse_vehicles(body: &Value) -> Vec<Vehicle> {
    match body.as_array() {
        Some(entries) => entries.iter().map(parse_vehicle).collect(),
        None => {
            debug!("Vehicle payload is not an array, treating it as empty");
            Vec::new()
        }
    }
}

/// Accepts a bare array or `{ "response": [...] }`; anything else is empty.
pub fn parse_suggestions(body: &Value) -> Vec<Suggestion> {
    let entries = body
        .as_array()
        .or_else(|| body.get("response").and_then(Value::as_array));

    let Some(entries) = entries else {
        debug!("Search payload has an unexpected shape, treating it as empty");
        return Vec::new();
    };

    entries
        .iter()
        .filter(|entry| entry.is_object())
        .map(|entry| Suggestion {
            route_no: label(&entry["route_no"]).unwrap_or_default(),
            source: label(&entry["source"]).unwrap_or_default(),
            destination: label(&entry["destination"]).unwrap_or_default(),
        })
        .collect()
}
