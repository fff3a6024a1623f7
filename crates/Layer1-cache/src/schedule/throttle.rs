//! Throttler: at most one action per interval, leading + trailing edge

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

#[derive(Default)]
struct ThrottleState {
    last_run: Option<Instant>,
    /// Latest action that arrived during the cooldown; older ones are dropped
    pending: Option<BoxFuture<'static, ()>>,
    /// Trailing-edge timer, at most one
    timer: Option<JoinHandle<()>>,
}

/// Bounds how often an action runs.
///
/// The first call after a quiet `interval` runs immediately. Calls during
/// the cooldown replace each other; only the latest one runs when the
/// cooldown ends. This is lossy by design of the primitive, not a queue.
pub struct Throttler {
    interval: Duration,
    state: Arc<Mutex<ThrottleState>>,
}

impl Throttler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Arc::new(Mutex::new(ThrottleState::default())),
        }
    }

    /// Run `action` now if the interval has elapsed (returns `true` once it
    /// completed), otherwise keep it as the trailing action and return `false`.
    pub async fn throttle<F>(&self, action: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let run_now = {
            let mut state = self.state.lock();
            let now = Instant::now();
            let ready = state
                .last_run
                .map_or(true, |last| now.duration_since(last) >= self.interval);

            if ready {
                state.last_run = Some(now);
                true
            } else {
                if state.pending.replace(action.boxed()).is_some() {
                    trace!("throttled action replaced");
                }
                if state.timer.is_none() {
                    let elapsed = state
                        .last_run
                        .map_or(Duration::ZERO, |last| now.duration_since(last));
                    let remaining = self.interval.saturating_sub(elapsed);
                    state.timer = Some(self.spawn_trailing(remaining));
                }
                return false;
            }
        };

        if run_now {
            action.await;
        }
        run_now
    }

    fn spawn_trailing(&self, after: Duration) -> JoinHandle<()> {
        let shared = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let action = {
                let mut state = shared.lock();
                state.timer = None;
                let action = state.pending.take();
                if action.is_some() {
                    state.last_run = Some(Instant::now());
                }
                action
            };
            if let Some(action) = action {
                action.await;
            }
        })
    }

    /// Drop the trailing action and its timer; `last_run` is kept
    pub fn cancel(&self) {
        let mut state = self.state.lock();
        state.pending = None;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
    }

    /// Whether a trailing action is waiting
    pub fn is_pending(&self) -> bool {
        self.state.lock().pending.is_some()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for Throttler {
    fn drop(&mut self) {
        if let Some(timer) = self.state.lock().timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bump(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_runs_at_most_twice() {
        let throttler = Throttler::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));

        assert!(throttler.throttle(bump(&runs)).await);
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(4)).await;
            assert!(!throttler.throttle(bump(&runs)).await);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(throttler.is_pending());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!throttler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_latest_pending_action_wins() {
        let throttler = Throttler::new(Duration::from_millis(100));
        let log = Arc::new(Mutex::new(Vec::new()));

        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            throttler
                .throttle(async move { log.lock().push(name) })
                .await;
        }
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(*log.lock(), vec!["first", "third"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_immediately_after_interval() {
        let throttler = Throttler::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));

        assert!(throttler.throttle(bump(&runs)).await);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(throttler.throttle(bump(&runs)).await);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_trailing_action() {
        let throttler = Throttler::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));

        throttler.cancel();
        throttler.throttle(bump(&runs)).await;
        throttler.throttle(bump(&runs)).await;
        throttler.cancel();
        assert!(!throttler.is_pending());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
