// Static route catalog: route number -> ordered stop list
use crate::blt_models::{Coordinate, Result, Stop, TrackerError};
use log::{info, warn};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
struct RawStop {
    lat: f64,
    lng: f64,
    #[serde(default)]
    stop_name: Option<String>,
}

/// Read-only route index, loaded once at startup.
#[derive(Debug, Default)]
pub struct RouteCatalog {
    routes: HashMap<String, Arc<[Stop]>>,
}

/// Route keys are trimmed and uppercased before any lookup.
pub fn normalize_route_key(route_id: &str) -> String {
    route_id.trim().to_uppercase()
}

impl RouteCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            TrackerError::FileError(format!("Failed to read route catalog {:?}: {}", path, e))
        })?;
        let catalog = Self::from_json(&contents)?;
        info!("Loaded {} routes from {:?}", catalog.len(), path);
        Ok(catalog)
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        let raw: HashMap<String, Vec<RawStop>> = serde_json::from_str(contents)
            .map_err(|e| TrackerError::ParseError(format!("Invalid route catalog: {}", e)))?;

        let mut routes: HashMap<String, Arc<[Stop]>> = HashMap::with_capacity(raw.len());
        for (route_id, raw_stops) in raw {
            let key = normalize_route_key(&route_id);
            if raw_stops.is_empty() {
                warn!("Route {} has no stops, leaving it out of the catalog", key);
                continue;
            }

            let stops = raw_stops
                .into_iter()
                .enumerate()
                .map(|(i, s)| {
                    let coordinate = Coordinate::new(s.lat, s.lng).map_err(|e| {
                        TrackerError::ParseError(format!("Route {} stop #{}: {}", key, i, e))
                    })?;
                    let name = s.stop_name.as_deref().filter(|n| !n.trim().is_empty());
                    Ok(Stop::new(coordinate, name))
                })
                .collect::<Result<Vec<_>>>()?;

            if routes.insert(key.clone(), Arc::from(stops)).is_some() {
                warn!("Route {} is listed twice, keeping the last entry", key);
            }
        }

        Ok(RouteCatalog { routes })
    }

    /// Stops for a route, or `None` for an unknown route.
    pub fn get(&self, route_id: &str) -> Option<Arc<[Stop]>> {
        self.routes.get(&normalize_route_key(route_id)).cloned()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// All route keys with their stop counts, sorted by key.
    pub fn summary(&self) -> Vec<(&str, usize)> {
        let mut entries: Vec<(&str, usize)> = self
            .routes
            .iter()
            .map(|(k, stops)| (k.as_str(), stops.len()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}
