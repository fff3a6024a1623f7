//! Debouncer: run only the last of a burst of actions, after a quiet period

use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

#[derive(Default)]
struct DebounceState {
    /// Bumped by every `schedule`/`cancel`; a timer only fires if it still
    /// owns the current generation.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Delays an action until `delay` has passed without another `schedule`.
///
/// ```text
/// schedule(A) ─┐ schedule(B) ─┐ schedule(C) ─┐
///              x              x              └── delay ──► C runs
/// ```
///
/// Must be used inside a tokio runtime.
pub struct Debouncer {
    delay: Duration,
    state: Arc<Mutex<DebounceState>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            state: Arc::new(Mutex::new(DebounceState::default())),
        }
    }

    /// Replace any pending action with `action`, to run after `delay`
    pub fn schedule<F>(&self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.state.lock();
        state.generation += 1;
        let generation = state.generation;
        if let Some(previous) = state.timer.take() {
            previous.abort();
            trace!("debounced action superseded");
        }

        let shared = Arc::clone(&self.state);
        let delay = self.delay;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut state = shared.lock();
                if state.generation != generation {
                    return;
                }
                state.timer = None;
            }
            action.await;
        }));
    }

    /// Drop the pending action, if any
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }

    /// Whether an action is waiting to fire
    pub fn is_pending(&self) -> bool {
        self.state.lock().timer.is_some()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(timer) = self.state.lock().timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> impl Future<Output = ()> + Send + 'static {
        let log = Arc::clone(log);
        async move { log.lock().push(name) }
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_last_action_runs() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let log = recorder();

        debouncer.schedule(push(&log, "A"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        debouncer.schedule(push(&log, "B"));
        tokio::time::sleep(Duration::from_millis(30)).await;
        debouncer.schedule(push(&log, "C"));
        assert!(debouncer.is_pending());

        // 99ms after the last call: nothing yet
        tokio::time::sleep(Duration::from_millis(99)).await;
        assert!(log.lock().is_empty());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(*log.lock(), vec!["C"]);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let log = recorder();

        // no-op when idle
        debouncer.cancel();

        debouncer.schedule(push(&log, "A"));
        debouncer.cancel();
        assert!(!debouncer.is_pending());
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(log.lock().is_empty());

        debouncer.schedule(push(&log, "B"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*log.lock(), vec!["B"]);
    }
}
