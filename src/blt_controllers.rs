// Controllers for the Bus Live Tracker: live route tracking and route search
use crate::blt_api::{HttpTransitApi, TransitApi};
use crate::blt_catalog::{RouteCatalog, normalize_route_key};
use crate::blt_config::{Command, TrackerConfig};
use crate::blt_geo;
use crate::blt_models::{Stop, Suggestion, Vehicle};
use crate::blt_overlay::{MapView, OverlayCounts, OverlayLayerManager, RenderSurface};
use crate::blt_scheduler::{DebounceScheduler, PollingScheduler};
use crate::blt_slot::RequestSlot;
use crate::blt_views::{BLTViews, ConsoleSurface};
use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

// ============================================================================
// Tracking Status
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopRef {
    pub index: usize,
    pub name: Option<String>,
}

impl StopRef {
    fn of(stops: &[Stop], index: usize) -> Self {
        StopRef {
            index,
            name: stops[index].name.clone(),
        }
    }
}

/// Where the first reported bus is along the route.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StopEstimate {
    #[default]
    Pending,
    NoVehicles,
    NoStopData,
    NoPosition,
    Located { current: StopRef, next: StopRef },
}

/// Snapshot published after every route change and every applied poll cycle.
#[derive(Debug, Clone, Default)]
pub struct TrackingStatus {
    pub route: String,
    pub has_stop_data: bool,
    pub vehicles: Vec<Vehicle>,
    pub estimate: StopEstimate,
    pub error: Option<String>,
    pub refresh_count: usize,
    pub last_update: Option<DateTime<Utc>>,
}

/// Current/next stop for the first vehicle of the response.
///
/// The response order carries no meaning, so "first" is an arbitrary pick.
pub fn estimate_stops(vehicles: &[Vehicle], stops: Option<&[Stop]>) -> StopEstimate {
    let Some(first) = vehicles.first() else {
        return StopEstimate::NoVehicles;
    };
    let stops = match stops {
        Some(stops) if !stops.is_empty() => stops,
        _ => return StopEstimate::NoStopData,
    };
    let Some(position) = first.coordinate else {
        return StopEstimate::NoPosition;
    };

    match blt_geo::locate(position, first.direction, stops) {
        Some(m) => StopEstimate::Located {
            current: StopRef::of(stops, m.current_idx),
            next: StopRef::of(stops, m.next_idx),
        },
        None => StopEstimate::NoStopData,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Live Route Tracking
// ============================================================================

/// Live view of one route: static route overlay, refreshed vehicle markers and
/// the current/next stop estimate.
pub struct TrackingView<S: RenderSurface + Send + 'static, A: TransitApi> {
    api: A,
    catalog: Arc<RouteCatalog>,
    overlay: Arc<Mutex<OverlayLayerManager<S>>>,
    status: Arc<watch::Sender<TrackingStatus>>,
    poll_interval: Duration,
    poller: Option<PollingScheduler<Vec<Vehicle>>>,
}

impl<S: RenderSurface + Send + 'static, A: TransitApi> TrackingView<S, A> {
    pub fn new(
        api: A,
        catalog: Arc<RouteCatalog>,
        surface: S,
        initial_view: MapView,
        poll_interval: Duration,
    ) -> Self {
        let (status, _) = watch::channel(TrackingStatus::default());
        TrackingView {
            api,
            catalog,
            overlay: Arc::new(Mutex::new(OverlayLayerManager::new(surface, initial_view))),
            status: Arc::new(status),
            poll_interval,
            poller: None,
        }
    }

    /// Switch to `raw_route`: retire the old overlays and polling, draw the new
    /// route and start polling its vehicles.
    pub fn select_route(&mut self, raw_route: &str) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }

        let route = normalize_route_key(raw_route);
        let stops = self.catalog.get(&route);
        {
            let mut overlay = lock(&self.overlay);
            overlay.set_vehicles(&[]);
            overlay.set_route(stops.as_deref().unwrap_or(&[]));
        }

        self.status.send_replace(TrackingStatus {
            route: route.clone(),
            has_stop_data: stops.is_some(),
            ..TrackingStatus::default()
        });

        if route.is_empty() {
            return;
        }
        if stops.is_none() {
            info!("Route {} is not in the catalog, tracking buses without stops", route);
        }

        let slot = RequestSlot::new(
            "vehicles",
            {
                let overlay = Arc::clone(&self.overlay);
                let status = Arc::clone(&self.status);
                let route = route.clone();
                move |vehicles: Vec<Vehicle>| {
                    lock(&overlay).set_vehicles(&vehicles);
                    let estimate = estimate_stops(&vehicles, stops.as_deref());
                    info!("Route {}: {} active buses", route, vehicles.len());
                    status.send_modify(|s| {
                        s.error = None;
                        s.estimate = estimate;
                        s.vehicles = vehicles;
                        s.refresh_count += 1;
                        s.last_update = Some(Utc::now());
                    });
                }
            },
            {
                let status = Arc::clone(&self.status);
                let route = route.clone();
                move |e| {
                    warn!("Route {}: failed to fetch active buses: {}", route, e);
                    status.send_modify(|s| s.error = Some("Failed to fetch active buses".to_string()));
                }
            },
        );

        let poller = PollingScheduler::new(slot);
        let api = self.api.clone();
        poller.start(self.poll_interval, move || api.active_vehicles(route.clone()));
        self.poller = Some(poller);
    }

    #[cfg(test)]
    pub fn status(&self) -> TrackingStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackingStatus> {
        self.status.subscribe()
    }

    #[cfg(test)]
    pub fn overlay_counts(&self) -> OverlayCounts {
        lock(&self.overlay).counts()
    }

    /// Stop polling and release every overlay. Idempotent.
    pub fn close(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
        let mut overlay = lock(&self.overlay);
        let counts = overlay.counts();
        if counts != OverlayCounts::default() {
            debug!("Releasing overlays: {:?}", counts);
        }
        overlay.teardown();
    }
}

impl<S: RenderSurface + Send + 'static, A: TransitApi> Drop for TrackingView<S, A> {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Route Search
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct SearchStatus {
    pub suggestions: Vec<Suggestion>,
    pub error: Option<String>,
    pub updates: usize,
}

/// Debounced search-as-you-type over the backend's route search.
pub struct SuggestionSearch<A: TransitApi> {
    api: A,
    quiet: Duration,
    debounce: DebounceScheduler<Vec<Suggestion>>,
    status: Arc<watch::Sender<SearchStatus>>,
}

impl<A: TransitApi> SuggestionSearch<A> {
    pub fn new(api: A, quiet: Duration) -> Self {
        let (status, _) = watch::channel(SearchStatus::default());
        let status = Arc::new(status);

        let slot = RequestSlot::new(
            "search",
            {
                let status = Arc::clone(&status);
                move |suggestions: Vec<Suggestion>| {
                    status.send_modify(|s| {
                        s.suggestions = suggestions;
                        s.error = None;
                        s.updates += 1;
                    });
                }
            },
            {
                let status = Arc::clone(&status);
                move |e| {
                    warn!("Search failed: {}", e);
                    status.send_modify(|s| s.error = Some("Failed to fetch suggestions".to_string()));
                }
            },
        );

        SuggestionSearch {
            api,
            quiet,
            debounce: DebounceScheduler::new(slot),
            status,
        }
    }

    /// Feed the current contents of the search box.
    pub fn input(&self, text: &str) {
        let api = self.api.clone();
        self.debounce.trigger(text, self.quiet, move |query| api.search(query));
    }

    /// True when no quiet timer or request is outstanding.
    pub fn is_settled(&self) -> bool {
        self.debounce.is_settled()
    }

    #[cfg(test)]
    pub fn status(&self) -> SearchStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SearchStatus> {
        self.status.subscribe()
    }

    pub fn close(&self) {
        self.debounce.dispose();
    }
}

// ============================================================================
// Command Line Entry Points
// ============================================================================

pub struct BLTControllers;

impl BLTControllers {
    pub async fn run(config: TrackerConfig, command: Command) -> anyhow::Result<()> {
        match command {
            Command::Routes => {
                let catalog = RouteCatalog::load(&config.catalog_path)
                    .context("Could not load the route catalog")?;
                BLTViews::show_routes(&catalog);
                Ok(())
            }
            Command::Track { route } => Self::track(&config, &route).await,
            Command::Search => Self::search(&config).await,
        }
    }

    /// Follow one route until Ctrl-C, printing a status block per update.
    async fn track(config: &TrackerConfig, route: &str) -> anyhow::Result<()> {
        let catalog = RouteCatalog::load(&config.catalog_path)
            .context("Could not load the route catalog")?;
        let api = HttpTransitApi::new(&config.api_base_url, config.request_timeout)
            .context("Could not set up the transit API client")?;

        let mut view = TrackingView::new(
            api,
            Arc::new(catalog),
            ConsoleSurface::default(),
            config.initial_view,
            config.poll_interval,
        );

        BLTViews::show_tracking_header(&normalize_route_key(route), config.poll_interval);
        let mut updates = view.subscribe();
        view.select_route(route);

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = updates.borrow_and_update().clone();
                    BLTViews::show_tracking_status(&status, &config.timezone);
                }
                _ = &mut ctrl_c => {
                    BLTViews::goodbye_message();
                    break;
                }
            }
        }

        view.close();
        Ok(())
    }

    /// Treat every stdin line as the new contents of the search box.
    async fn search(config: &TrackerConfig) -> anyhow::Result<()> {
        let api = HttpTransitApi::new(&config.api_base_url, config.request_timeout)
            .context("Could not set up the transit API client")?;
        let search = SuggestionSearch::new(api, config.debounce);
        let mut updates = search.subscribe();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        BLTViews::show_search_help();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line.context("Failed to read from stdin")? {
                        Some(text) => search.input(&text),
                        None => break,
                    }
                }
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = updates.borrow_and_update().clone();
                    BLTViews::show_suggestions(&status);
                }
            }
        }

        // Input closed; let the last query land before leaving
        if !search.is_settled() {
            let grace = config.debounce + config.request_timeout;
            if let Ok(Ok(())) = tokio::time::timeout(grace, updates.changed()).await {
                let status = updates.borrow_and_update().clone();
                BLTViews::show_suggestions(&status);
            }
        }

        search.close();
        Ok(())
    }
}
