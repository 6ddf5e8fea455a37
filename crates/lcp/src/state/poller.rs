//! Background refresh scheduling
//!
//! An explicit worker with a cancellation signal, instead of an ambient
//! repeating timer: the poller re-runs the session fetch on a fixed
//! period while the dashboard is visible, and stops promptly when asked
//! (or when its handle is dropped).

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::threads::ThreadsState;

/// Default period between background fetches
pub const POLL_INTERVAL: Duration = Duration::from_secs(600);

/// Source of document/window visibility
///
/// Hidden dashboards skip their poll ticks; the embedding shell decides
/// what "visible" means.
pub trait VisibilityProbe: Send + Sync {
    fn is_visible(&self) -> bool;
}

/// Probe that always reports visible (headless use, tests)
pub struct AlwaysVisible;

impl VisibilityProbe for AlwaysVisible {
    fn is_visible(&self) -> bool {
        true
    }
}

/// Cancellation signal shared with the worker thread
struct StopSignal {
    stopped: Mutex<bool>,
    changed: Condvar,
}

impl StopSignal {
    fn new() -> Self {
        Self {
            stopped: Mutex::new(false),
            changed: Condvar::new(),
        }
    }

    /// Wait up to `period`; returns true if stopped in the meantime
    fn wait_for(&self, period: Duration) -> bool {
        let deadline = Instant::now() + period;
        let mut stopped = self.stopped.lock().unwrap();
        while !*stopped {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _timeout) = self
                .changed
                .wait_timeout(stopped, deadline - now)
                .unwrap();
            stopped = guard;
        }
        true
    }

    fn stop(&self) {
        *self.stopped.lock().unwrap() = true;
        self.changed.notify_all();
    }
}

/// Handle to the background poll worker
///
/// Stopping (explicitly or by drop) cancels the pending wait and joins
/// the worker, so no tick can fire after the handle is gone.
pub struct Poller {
    signal: Arc<StopSignal>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    /// Start polling `state` on the given period
    pub fn start(
        state: Arc<ThreadsState>,
        period: Duration,
        visibility: Arc<dyn VisibilityProbe>,
    ) -> Self {
        let signal = Arc::new(StopSignal::new());
        let worker_signal = Arc::clone(&signal);

        let handle = std::thread::spawn(move || {
            loop {
                if worker_signal.wait_for(period) {
                    break;
                }
                if !state.is_alive() {
                    break;
                }
                if !visibility.is_visible() {
                    continue;
                }
                if let Err(e) = state.fetch() {
                    log::warn!("Background fetch failed: {e}");
                }
            }
        });

        Self {
            signal,
            handle: Some(handle),
        }
    }

    /// Cancel the worker and wait for it to finish
    pub fn stop(&mut self) {
        self.signal.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{FnTransport, LcpClient, RequestGateway, TransportResponse};
    use crate::storage::{InMemorySnapshotStore, SnapshotStore};
    use serde_json::json;

    struct NeverVisible;

    impl VisibilityProbe for NeverVisible {
        fn is_visible(&self) -> bool {
            false
        }
    }

    fn make_state(transport: Arc<FnTransport>) -> Arc<ThreadsState> {
        let gateway = Arc::new(RequestGateway::with_timing(
            transport,
            Duration::ZERO,
            Duration::ZERO,
        ));
        let client = Arc::new(LcpClient::new(gateway));
        let store = Arc::new(InMemorySnapshotStore::new());
        ThreadsState::new("agent-1", client, store as Arc<dyn SnapshotStore>).unwrap()
    }

    fn stub_transport() -> Arc<FnTransport> {
        Arc::new(FnTransport::new(|_, endpoint, _| {
            let body = match endpoint {
                "lcp/get_all_threads" => json!({"success": true, "data": []}),
                _ => json!({"success": true, "data": {}}),
            };
            Ok(TransportResponse::ok(body))
        }))
    }

    #[test]
    fn test_poller_fetches_on_period() {
        let transport = stub_transport();
        let state = make_state(Arc::clone(&transport));

        let mut poller = Poller::start(state, Duration::from_millis(20), Arc::new(AlwaysVisible));
        std::thread::sleep(Duration::from_millis(110));
        poller.stop();

        // Several ticks fired, each issuing the two fetch requests
        assert!(transport.calls() >= 4, "only {} calls", transport.calls());
    }

    #[test]
    fn test_poller_skips_hidden_ticks() {
        let transport = stub_transport();
        let state = make_state(Arc::clone(&transport));

        let mut poller = Poller::start(state, Duration::from_millis(20), Arc::new(NeverVisible));
        std::thread::sleep(Duration::from_millis(100));
        poller.stop();

        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn test_stop_is_prompt() {
        let transport = stub_transport();
        let state = make_state(transport);

        let mut poller = Poller::start(state, Duration::from_secs(600), Arc::new(AlwaysVisible));
        let start = Instant::now();
        poller.stop();

        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_poller_stops_after_teardown() {
        let transport = stub_transport();
        let state = make_state(Arc::clone(&transport));
        state.teardown();

        let mut poller = Poller::start(
            Arc::clone(&state),
            Duration::from_millis(20),
            Arc::new(AlwaysVisible),
        );
        std::thread::sleep(Duration::from_millis(80));
        poller.stop();

        // The worker exits at the first tick of a dead session
        assert_eq!(transport.calls(), 0);
    }
}
