// Single-flight request holder: only the latest request may touch shared state
use crate::blt_models::{Result, TrackerError};
use futures::future::{AbortHandle, Abortable};
use log::debug;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type SuccessFn<T> = dyn Fn(T) + Send + Sync;
type ErrorFn = dyn Fn(TrackerError) + Send + Sync;

struct SlotState {
    generation: u64,
    in_flight: Option<AbortHandle>,
    disposed: bool,
}

struct SlotInner<T> {
    name: &'static str,
    state: Mutex<SlotState>,
    on_success: Box<SuccessFn<T>>,
    on_error: Box<ErrorFn>,
}

/// Holds at most one live request. Starting a new one aborts the previous one,
/// and a superseded request never reaches the callbacks.
///
/// Callbacks run while the slot's lock is held, so they must not call back
/// into the same slot.
pub struct RequestSlot<T> {
    inner: Arc<SlotInner<T>>,
}

impl<T> Clone for RequestSlot<T> {
    fn clone(&self) -> Self {
        RequestSlot {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + 'static> RequestSlot<T> {
    pub fn new<S, E>(name: &'static str, on_success: S, on_error: E) -> Self
    where
        S: Fn(T) + Send + Sync + 'static,
        E: Fn(TrackerError) + Send + Sync + 'static,
    {
        RequestSlot {
            inner: Arc::new(SlotInner {
                name,
                state: Mutex::new(SlotState {
                    generation: 0,
                    in_flight: None,
                    disposed: false,
                }),
                on_success: Box::new(on_success),
                on_error: Box::new(on_error),
            }),
        }
    }

    /// Abort whatever is in flight and spawn the request built by `producer`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F, Fut>(&self, producer: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let (handle, registration) = AbortHandle::new_pair();
        let generation = {
            let mut state = self.inner.lock_state();
            if state.disposed {
                debug!("[{}] ignoring start on a disposed slot", self.inner.name);
                return;
            }
            let generation = supersede(&mut state);
            state.in_flight = Some(handle);
            generation
        };

        let request = Abortable::new(producer(), registration);
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = request.await.unwrap_or(Err(TrackerError::Cancelled));
            inner.settle(generation, outcome);
        });
    }

    /// Abort the outstanding request, if any. The slot stays usable.
    pub fn cancel(&self) {
        let mut state = self.inner.lock_state();
        if state.in_flight.is_some() {
            debug!("[{}] cancelling request #{}", self.inner.name, state.generation);
        }
        supersede(&mut state);
    }

    /// Supersede any outstanding request and hand `value` straight to `on_success`.
    pub fn resolve_now(&self, value: T) {
        let mut state = self.inner.lock_state();
        if state.disposed {
            return;
        }
        supersede(&mut state);
        (self.inner.on_success)(value);
    }

    /// Cancel and make the slot permanently inert. Safe to call repeatedly.
    pub fn dispose(&self) {
        let mut state = self.inner.lock_state();
        if state.disposed {
            return;
        }
        supersede(&mut state);
        state.disposed = true;
        debug!("[{}] disposed", self.inner.name);
    }

    pub fn is_pending(&self) -> bool {
        self.inner.lock_state().in_flight.is_some()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock_state().disposed
    }
}

impl<T> SlotInner<T> {
    fn lock_state(&self) -> MutexGuard<'_, SlotState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, generation: u64, outcome: Result<T>) {
        let mut state = self.lock_state();
        if state.disposed || state.generation != generation {
            debug!("[{}] discarding stale result of request #{}", self.name, generation);
            return;
        }
        state.in_flight = None;

        match outcome {
            Ok(value) => (self.on_success)(value),
            Err(e) if e.is_cancelled() => {
                debug!("[{}] request #{} reported cancellation", self.name, generation)
            }
            Err(e) => (self.on_error)(e),
        }
    }
}

fn supersede(state: &mut SlotState) -> u64 {
    if let Some(handle) = state.in_flight.take() {
        handle.abort();
    }
    state.generation += 1;
    state.generation
}
