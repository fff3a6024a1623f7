//! Scheduling primitives
//!
//! Standalone helpers that shape when an action runs. They know nothing
//! about the cache; a typical use is gating cache invalidation behind a
//! debounce after file saves.
//!
//! Each instance keeps its state under one mutex and spawns only the
//! deferred timer as a task, so all of them need a tokio runtime.
//!
//! - [`Debouncer`] - only the last action of a burst runs
//! - [`Throttler`] - at most one action per interval (leading + trailing)
//! - [`UpdateCoalescer`] - rapid items delivered as one batch

mod coalesce;
mod debounce;
mod throttle;

pub use coalesce::{BatchCallback, UpdateCoalescer};
pub use debounce::Debouncer;
pub use throttle::Throttler;
