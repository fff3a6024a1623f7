//! ChunkedProcessor: process large inputs in chunks, yielding in between

use std::future::Future;
use tracing::trace;

/// Splits work into fixed-size chunks and yields to the scheduler between
/// them so a long transform does not starve other tasks.
#[derive(Debug, Clone, Copy)]
pub struct ChunkedProcessor {
    chunk_size: usize,
}

impl Default for ChunkedProcessor {
    fn default() -> Self {
        Self::new(100)
    }
}

impl ChunkedProcessor {
    /// A chunk size of 0 is treated as 1
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Map every item in order; results keep the input order
    pub async fn process<T, R, F>(&self, items: Vec<T>, mut transform: F) -> Vec<R>
    where
        F: FnMut(T) -> R,
    {
        let mut results = Vec::with_capacity(items.len());
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 && i % self.chunk_size == 0 {
                tokio::task::yield_now().await;
            }
            results.push(transform(item));
        }
        results
    }

    /// Keep the items matching `predicate`, in order
    pub async fn filter<T, P>(&self, items: Vec<T>, mut predicate: P) -> Vec<T>
    where
        P: FnMut(&T) -> bool,
    {
        let mut kept = Vec::new();
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 && i % self.chunk_size == 0 {
                tokio::task::yield_now().await;
            }
            if predicate(&item) {
                kept.push(item);
            }
        }
        kept
    }

    /// Hand each chunk to `f` in order, yielding after each one
    pub async fn for_each_chunk<T, F, Fut>(&self, items: Vec<T>, mut f: F)
    where
        F: FnMut(Vec<T>) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut items = items.into_iter().peekable();
        let mut index = 0usize;
        while items.peek().is_some() {
            let chunk: Vec<T> = items.by_ref().take(self.chunk_size).collect();
            trace!("processing chunk {} ({} items)", index, chunk.len());
            f(chunk).await;
            index += 1;
            tokio::task::yield_now().await;
        }
    }
}
