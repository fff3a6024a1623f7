//! UpdateCoalescer: batch rapid updates into one callback

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

/// Receives one batch of coalesced items
pub type BatchCallback<T> = Arc<dyn Fn(Vec<T>) + Send + Sync>;

struct CoalesceState<T> {
    buffer: Vec<T>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

/// Buffers items and delivers them as a single batch once `delay` passes
/// without a new `add`.
///
/// The buffer is taken before the callback runs, so a callback may call
/// [`add`](Self::add) without affecting the batch it is handling.
pub struct UpdateCoalescer<T> {
    delay: Duration,
    state: Arc<Mutex<CoalesceState<T>>>,
    callback: BatchCallback<T>,
}

impl<T: Send + 'static> UpdateCoalescer<T> {
    pub fn new<F>(delay: Duration, callback: F) -> Self
    where
        F: Fn(Vec<T>) + Send + Sync + 'static,
    {
        Self {
            delay,
            state: Arc::new(Mutex::new(CoalesceState {
                buffer: Vec::new(),
                generation: 0,
                timer: None,
            })),
            callback: Arc::new(callback),
        }
    }

    /// Buffer `item` and restart the delay timer
    pub fn add(&self, item: T) {
        let mut state = self.state.lock();
        state.buffer.push(item);
        state.generation += 1;
        let generation = state.generation;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let shared = Arc::clone(&self.state);
        let callback = Arc::clone(&self.callback);
        let delay = self.delay;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let batch = {
                let mut state = shared.lock();
                if state.generation != generation {
                    return;
                }
                state.timer = None;
                std::mem::take(&mut state.buffer)
            };
            if !batch.is_empty() {
                trace!("delivering coalesced batch of {}", batch.len());
                callback(batch);
            }
        }));
    }

    /// Deliver the buffered items now; returns how many were delivered
    pub fn flush(&self) -> usize {
        let batch = self.take_buffer();
        let delivered = batch.len();
        if delivered > 0 {
            (self.callback)(batch);
        }
        delivered
    }

    /// Drop the buffered items without delivering them
    pub fn cancel(&self) -> usize {
        self.take_buffer().len()
    }

    fn take_buffer(&self) -> Vec<T> {
        let mut state = self.state.lock();
        state.generation += 1;
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        std::mem::take(&mut state.buffer)
    }

    pub fn pending_len(&self) -> usize {
        self.state.lock().buffer.len()
    }
}

impl<T> Drop for UpdateCoalescer<T> {
    fn drop(&mut self) {
        if let Some(timer) = self.state.lock().timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> (Arc<Mutex<Vec<Vec<u32>>>>, impl Fn(Vec<u32>) + Send + Sync + 'static) {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&batches);
        (batches, move |batch: Vec<u32>| sink.lock().push(batch))
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_delivered_in_one_batch() {
        let (batches, callback) = collector();
        let coalescer = UpdateCoalescer::new(Duration::from_millis(50), callback);

        for i in 0..5 {
            coalescer.add(i);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(batches.lock().is_empty());
        assert_eq!(coalescer.pending_len(), 5);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(*batches.lock(), vec![vec![0, 1, 2, 3, 4]]);
        assert_eq!(coalescer.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_and_cancel() {
        let (batches, callback) = collector();
        let coalescer = UpdateCoalescer::new(Duration::from_millis(50), callback);

        assert_eq!(coalescer.flush(), 0);
        coalescer.add(1);
        coalescer.add(2);
        assert_eq!(coalescer.flush(), 2);

        coalescer.add(3);
        assert_eq!(coalescer.cancel(), 1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(*batches.lock(), vec![vec![1, 2]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_callback_may_add() {
        let batches = Arc::new(Mutex::new(Vec::new()));
        let slot: Arc<Mutex<Option<Arc<UpdateCoalescer<u32>>>>> = Arc::new(Mutex::new(None));

        let sink = Arc::clone(&batches);
        let reentrant = Arc::clone(&slot);
        let coalescer = Arc::new(UpdateCoalescer::new(
            Duration::from_millis(10),
            move |batch: Vec<u32>| {
                if batch == vec![1, 2] {
                    if let Some(coalescer) = reentrant.lock().as_ref() {
                        coalescer.add(3);
                    }
                }
                sink.lock().push(batch);
            },
        ));
        *slot.lock() = Some(Arc::clone(&coalescer));

        coalescer.add(1);
        coalescer.add(2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*batches.lock(), vec![vec![1, 2], vec![3]]);

        slot.lock().take();
    }
}
