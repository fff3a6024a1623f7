//! Compute helpers
//!
//! - [`Memoizer`] - LRU + TTL cache in front of an async function
//! - [`LazyPaginator`] - incremental page loading with prefetch
//! - [`ChunkedProcessor`] - cooperative processing of large inputs

mod chunked;
mod memo;
mod paginate;

pub use chunked::ChunkedProcessor;
pub use memo::Memoizer;
pub use paginate::{LazyPaginator, PageState};
