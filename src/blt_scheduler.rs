// Polling and debouncing on top of a RequestSlot
use crate::blt_models::Result;
use crate::blt_slot::RequestSlot;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

// ============================================================================
// Polling
// ============================================================================

enum PollState {
    Idle,
    Active { ticker: JoinHandle<()> },
    Stopped,
}

/// Runs a fetch-and-apply cycle on a fixed interval.
///
/// Every cycle goes through the same slot, so a fetch that is still pending when
/// the next tick fires is aborted and its result thrown away.
pub struct PollingScheduler<T: Send + 'static> {
    slot: RequestSlot<T>,
    state: Mutex<PollState>,
}

impl<T: Send + 'static> PollingScheduler<T> {
    pub fn new(slot: RequestSlot<T>) -> Self {
        PollingScheduler {
            slot,
            state: Mutex::new(PollState::Idle),
        }
    }

    /// Run one cycle now and then one every `interval` until stopped.
    pub fn start<F, Fut>(&self, interval: Duration, cycle: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if interval.is_zero() {
            warn!("Refusing to poll with a zero interval");
            return;
        }

        let mut state = self.lock_state();
        if !matches!(*state, PollState::Idle) {
            warn!("Polling scheduler already started or stopped, ignoring start");
            return;
        }

        let slot = self.slot.clone();
        let ticker = tokio::spawn(async move {
            let mut ticks = tokio::time::interval(interval);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                slot.start(&cycle);
            }
        });

        info!("Polling every {}ms", interval.as_millis());
        *state = PollState::Active { ticker };
    }

    /// Stop polling and drop any in-flight cycle. Idempotent.
    pub fn stop(&self) {
        let mut state = self.lock_state();
        if let PollState::Active { ticker } = &*state {
            ticker.abort();
            debug!("Polling stopped");
        }
        *state = PollState::Stopped;
        self.slot.dispose();
    }

    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        matches!(*self.lock_state(), PollState::Active { .. })
    }

    fn lock_state(&self) -> MutexGuard<'_, PollState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + 'static> Drop for PollingScheduler<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Debouncing
// ============================================================================

struct DebounceState {
    pending: Option<JoinHandle<()>>,
}

/// Waits for input to settle before acting on it.
///
/// Only the last input of a burst reaches `action`, and the action runs through
/// the scheduler's slot so an older, slower response cannot land after a newer one.
pub struct DebounceScheduler<T: Send + 'static> {
    slot: RequestSlot<T>,
    state: Mutex<DebounceState>,
}

impl<T: Default + Send + 'static> DebounceScheduler<T> {
    pub fn new(slot: RequestSlot<T>) -> Self {
        DebounceScheduler {
            slot,
            state: Mutex::new(DebounceState { pending: None }),
        }
    }

    /// Record `input` and (re)arm the quiet timer.
    ///
    /// Blank input clears the results right away without issuing a request.
    pub fn trigger<F, Fut>(&self, input: &str, quiet: Duration, action: F)
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut state = self.lock_state();
        if self.slot.is_disposed() {
            return;
        }
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        self.slot.cancel();

        let input = input.trim().to_string();
        if input.is_empty() {
            self.slot.resolve_now(T::default());
            return;
        }

        let slot = self.slot.clone();
        state.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            debug!("Input settled on {:?}", input);
            slot.start(move || action(input));
        }));
    }

    /// No quiet timer running and no request in flight.
    pub fn is_settled(&self) -> bool {
        let timer_done = self
            .lock_state()
            .pending
            .as_ref()
            .is_none_or(JoinHandle::is_finished);
        timer_done && !self.slot.is_pending()
    }

    /// Cancel the pending timer and any in-flight request. Idempotent.
    pub fn dispose(&self) {
        let mut state = self.lock_state();
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        self.slot.dispose();
    }

    fn lock_state(&self) -> MutexGuard<'_, DebounceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + 'static> Drop for DebounceScheduler<T> {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = state.pending.take() {
            pending.abort();
        }
        self.slot.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blt_models::TrackerError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::{Instant, sleep};

    type Log<V> = Arc<Mutex<Vec<V>>>;

    fn new_log<V>() -> Log<V> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn timed_slot(applied: &Log<(Instant, u32)>, errors: &Log<TrackerError>) -> RequestSlot<u32> {
        let a = applied.clone();
        let e = errors.clone();
        RequestSlot::new(
            "poll-test",
            move |v| a.lock().unwrap().push((Instant::now(), v)),
            move |err| e.lock().unwrap().push(err),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn one_apply_per_tick() {
        let applied = new_log();
        let errors = new_log();
        let poller = PollingScheduler::new(timed_slot(&applied, &errors));
        let counter = Arc::new(AtomicU32::new(0));

        let started = Instant::now();
        let c = counter.clone();
        poller.start(Duration::from_millis(1000), move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n) }
        });

        sleep(Duration::from_millis(5500)).await;
        let applied = applied.lock().unwrap().clone();
        assert_eq!(applied.len(), 6);
        for (i, (at, value)) in applied.iter().enumerate() {
            assert_eq!(*value, i as u32);
            let offset = at.duration_since(started);
            let tick = Duration::from_millis(1000 * i as u64);
            assert!(offset >= tick && offset < tick + Duration::from_millis(5));
        }
        assert!(errors.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_cycles_are_superseded_by_the_next_tick() {
        let applied = new_log();
        let errors = new_log();
        let poller = PollingScheduler::new(timed_slot(&applied, &errors));
        let calls = Arc::new(AtomicU32::new(0));

        let c = calls.clone();
        poller.start(Duration::from_millis(1000), move || {
            c.fetch_add(1, Ordering::SeqCst);
            async {
                sleep(Duration::from_millis(1500)).await;
                Ok(1)
            }
        });

        sleep(Duration::from_millis(5500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert!(applied.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_cycle_keeps_polling() {
        let applied = new_log();
        let errors = new_log();
        let poller = PollingScheduler::new(timed_slot(&applied, &errors));
        let counter = Arc::new(AtomicU32::new(0));

        let c = counter.clone();
        poller.start(Duration::from_millis(1000), move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 1 {
                    Err(TrackerError::NetworkError("down".into()))
                } else {
                    Ok(n)
                }
            }
        });

        sleep(Duration::from_millis(2500)).await;
        let values: Vec<u32> = applied.lock().unwrap().iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0, 2]);
        assert_eq!(errors.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_terminal_and_idempotent() {
        let applied = new_log();
        let errors = new_log();
        let poller = PollingScheduler::new(timed_slot(&applied, &errors));
        poller.stop();
        poller.start(Duration::from_millis(100), || async { Ok(1) });
        assert!(!poller.is_active());

        let applied2 = new_log();
        let poller2 = PollingScheduler::new(timed_slot(&applied2, &errors));
        poller2.start(Duration::from_millis(100), || async {
            sleep(Duration::from_millis(50)).await;
            Ok(1)
        });
        assert!(poller2.is_active());
        sleep(Duration::from_millis(120)).await;
        poller2.stop();
        poller2.stop();
        assert!(!poller2.is_active());

        sleep(Duration::from_millis(1000)).await;
        assert!(applied.lock().unwrap().is_empty());
        assert_eq!(applied2.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_poller_stops_it() {
        let applied = new_log();
        let errors = new_log();
        let poller = PollingScheduler::new(timed_slot(&applied, &errors));
        poller.start(Duration::from_millis(100), || async { Ok(1) });
        sleep(Duration::from_millis(50)).await;
        drop(poller);

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(applied.lock().unwrap().len(), 1);
    }

    fn search_slot(results: &Log<Vec<String>>) -> RequestSlot<Vec<String>> {
        let r = results.clone();
        RequestSlot::new("debounce-test", move |v| r.lock().unwrap().push(v), |_| {})
    }

    type BoxedSearch = std::pin::Pin<Box<dyn Future<Output = Result<Vec<String>>> + Send>>;

    fn echo_action(
        calls: &Log<String>,
        delay_ms: u64,
    ) -> impl FnOnce(String) -> BoxedSearch + Send + 'static {
        let calls = calls.clone();
        move |input: String| -> BoxedSearch {
            calls.lock().unwrap().push(input.clone());
            Box::pin(async move {
                sleep(Duration::from_millis(delay_ms)).await;
                Ok(vec![input])
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_acts_once_on_the_last_input() {
        let results = new_log();
        let calls = new_log();
        let debounce = DebounceScheduler::new(search_slot(&results));
        let quiet = Duration::from_millis(300);

        for input in ["A", "AB", "ABC"] {
            debounce.trigger(input, quiet, echo_action(&calls, 10));
            sleep(Duration::from_millis(100)).await;
        }
        sleep(Duration::from_millis(1000)).await;

        assert_eq!(*calls.lock().unwrap(), vec!["ABC".to_string()]);
        assert_eq!(*results.lock().unwrap(), vec![vec!["ABC".to_string()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn blank_input_clears_without_a_request() {
        let results = new_log();
        let calls = new_log();
        let debounce = DebounceScheduler::new(search_slot(&results));

        debounce.trigger("A", Duration::from_millis(300), echo_action(&calls, 10));
        debounce.trigger("   ", Duration::from_millis(300), echo_action(&calls, 10));
        assert_eq!(*results.lock().unwrap(), vec![Vec::<String>::new()]);

        sleep(Duration::from_millis(1000)).await;
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(results.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_older_response_cannot_overwrite_newer_input() {
        let results = new_log();
        let calls = new_log();
        let debounce = DebounceScheduler::new(search_slot(&results));
        let quiet = Duration::from_millis(300);

        debounce.trigger("A", quiet, echo_action(&calls, 1000));
        sleep(Duration::from_millis(400)).await;
        debounce.trigger("AB", quiet, echo_action(&calls, 10));
        sleep(Duration::from_millis(2000)).await;

        assert_eq!(*calls.lock().unwrap(), vec!["A".to_string(), "AB".to_string()]);
        assert_eq!(*results.lock().unwrap(), vec![vec!["AB".to_string()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn input_is_trimmed_before_acting() {
        let results = new_log();
        let calls = new_log();
        let debounce = DebounceScheduler::new(search_slot(&results));

        debounce.trigger("  12a ", Duration::from_millis(300), echo_action(&calls, 0));
        sleep(Duration::from_millis(400)).await;
        assert_eq!(*calls.lock().unwrap(), vec!["12a".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_cancels_pending_work() {
        let results = new_log();
        let calls = new_log();
        let debounce = DebounceScheduler::new(search_slot(&results));

        debounce.trigger("A", Duration::from_millis(300), echo_action(&calls, 10));
        debounce.dispose();
        debounce.dispose();
        debounce.trigger("B", Duration::from_millis(300), echo_action(&calls, 10));

        sleep(Duration::from_millis(1000)).await;
        assert!(calls.lock().unwrap().is_empty());
        assert!(results.lock().unwrap().is_empty());
    }
}
