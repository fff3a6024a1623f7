//! LazyPaginator: page-by-page loading with prefetch near the end

use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Observable paginator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Nothing loaded yet
    Empty,
    /// A page load is in flight
    Loading,
    Loaded { has_more: bool },
}

struct PageCursor<T> {
    items: Vec<T>,
    next_page: usize,
    has_more: bool,
    loaded: bool,
    /// In-flight flag; at most one load at a time
    loading: bool,
    /// Bumped by `load_initial`; a load started under an older generation
    /// discards its page.
    generation: u64,
}

impl<T> Default for PageCursor<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_page: 0,
            has_more: true,
            loaded: false,
            loading: false,
            generation: 0,
        }
    }
}

/// Clears the in-flight flag when a load is dropped before its page is
/// applied, unless a reset started a newer generation.
struct LoadGuard<'a, T> {
    cursor: &'a Mutex<PageCursor<T>>,
    generation: u64,
}

impl<T> Drop for LoadGuard<'_, T> {
    fn drop(&mut self) {
        let mut cursor = self.cursor.lock();
        if cursor.generation == self.generation && cursor.loading {
            cursor.loading = false;
            debug!("page load dropped before completion");
        }
    }
}

/// Accumulates pages from `loader(page, page_size)`.
///
/// A short page (fewer than `page_size` items) marks the end.
pub struct LazyPaginator<T, F> {
    loader: F,
    page_size: usize,
    prefetch_threshold: usize,
    cursor: Mutex<PageCursor<T>>,
}

impl<T, F, Fut, E> LazyPaginator<T, F>
where
    T: Clone + Send + 'static,
    F: Fn(usize, usize) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    pub fn new(page_size: usize, prefetch_threshold: usize, loader: F) -> Self {
        Self {
            loader,
            page_size: page_size.max(1),
            prefetch_threshold,
            cursor: Mutex::new(PageCursor::default()),
        }
    }

    /// Reset to page 0 and load it. Loads still in flight from before the
    /// reset are discarded when they finish.
    pub async fn load_initial(&self) -> Result<(), E> {
        let generation = {
            let mut cursor = self.cursor.lock();
            let generation = cursor.generation + 1;
            *cursor = PageCursor {
                loading: true,
                generation,
                ..PageCursor::default()
            };
            generation
        };

        let _guard = self.guard(generation);
        let page = (self.loader)(0, self.page_size).await;
        self.apply(generation, page).map(|_| ())
    }

    /// Load the next page. No-op (returns `Ok(false)`) while another load
    /// is in flight or when the last page was already seen.
    pub async fn load_next_page(&self) -> Result<bool, E> {
        let (generation, page_index) = {
            let mut cursor = self.cursor.lock();
            if cursor.loading || !cursor.has_more {
                return Ok(false);
            }
            cursor.loading = true;
            (cursor.generation, cursor.next_page)
        };

        let _guard = self.guard(generation);
        let page = (self.loader)(page_index, self.page_size).await;
        self.apply(generation, page)
    }

    fn guard(&self, generation: u64) -> LoadGuard<'_, T> {
        LoadGuard {
            cursor: &self.cursor,
            generation,
        }
    }

    fn apply(&self, generation: u64, page: Result<Vec<T>, E>) -> Result<bool, E> {
        let mut cursor = self.cursor.lock();
        if cursor.generation != generation {
            debug!("discarding page from a previous generation");
            return Ok(false);
        }
        cursor.loading = false;

        let page = page?;
        cursor.has_more = page.len() == self.page_size;
        cursor.items.extend(page);
        cursor.next_page += 1;
        cursor.loaded = true;
        Ok(true)
    }

    /// Start loading the next page in the background when `visible_index`
    /// is within `prefetch_threshold` of the end. Returns whether a load
    /// was started.
    pub fn check_prefetch(self: &Arc<Self>, visible_index: usize) -> bool {
        let should_load = {
            let cursor = self.cursor.lock();
            !cursor.loading
                && cursor.has_more
                && visible_index >= cursor.items.len().saturating_sub(self.prefetch_threshold)
        };
        if !should_load {
            return false;
        }

        let paginator = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = paginator.load_next_page().await {
                warn!("prefetch failed: {}", e);
            }
        });
        true
    }

    /// Snapshot of the loaded items
    pub fn items(&self) -> Vec<T> {
        self.cursor.lock().items.clone()
    }

    pub fn len(&self) -> usize {
        self.cursor.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.lock().items.is_empty()
    }

    pub fn has_more(&self) -> bool {
        self.cursor.lock().has_more
    }

    pub fn is_loading(&self) -> bool {
        self.cursor.lock().loading
    }

    pub fn state(&self) -> PageState {
        let cursor = self.cursor.lock();
        if cursor.loading {
            PageState::Loading
        } else if !cursor.loaded {
            PageState::Empty
        } else {
            PageState::Loaded {
                has_more: cursor.has_more,
            }
        }
    }
}
