//! Timed cache entries
//!
//! Every tier wraps its values in a [`TimedEntry`]. Lazy expiry on access
//! and the background sweep both call [`TimedEntry::is_valid_at`], so the
//! two paths can never disagree about staleness.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::fs::FileSignature;

/// External staleness check
pub type ExternalCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// When a cached value stops being usable
#[derive(Clone)]
pub enum ValidityRule {
    /// Valid until `created_at + ttl`
    Ttl(Duration),
    /// Valid while the backing file still has this `(mtime, size)`
    Signature(FileSignature),
    /// Valid while the closure returns `true`
    External(ExternalCheck),
}

impl fmt::Debug for ValidityRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidityRule::Ttl(ttl) => f.debug_tuple("Ttl").field(ttl).finish(),
            ValidityRule::Signature(sig) => f.debug_tuple("Signature").field(sig).finish(),
            ValidityRule::External(_) => f.write_str("External(..)"),
        }
    }
}

/// A value plus the rule deciding whether it may still be served
#[derive(Debug, Clone)]
pub struct TimedEntry<V> {
    pub value: V,
    pub created_at: Instant,
    pub validity: ValidityRule,
}

impl<V> TimedEntry<V> {
    pub fn new(value: V, validity: ValidityRule) -> Self {
        Self {
            value,
            created_at: Instant::now(),
            validity,
        }
    }

    /// Entry with a fixed time-to-live
    pub fn with_ttl(value: V, ttl: Duration) -> Self {
        Self::new(value, ValidityRule::Ttl(ttl))
    }

    /// Entry tied to a file signature
    pub fn with_signature(value: V, signature: FileSignature) -> Self {
        Self::new(value, ValidityRule::Signature(signature))
    }

    /// The single validity predicate.
    ///
    /// `observed` is the current signature of the backing file; it is only
    /// consulted for `Signature` entries, which are invalid without one.
    pub fn is_valid_at(&self, now: Instant, observed: Option<&FileSignature>) -> bool {
        match &self.validity {
            ValidityRule::Ttl(ttl) => now.saturating_duration_since(self.created_at) < *ttl,
            ValidityRule::Signature(expected) => observed == Some(expected),
            ValidityRule::External(check) => check(),
        }
    }

    /// Whether a sweep may drop this entry without touching the filesystem.
    ///
    /// Signature entries are only judged on access.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match &self.validity {
            ValidityRule::Signature(_) => false,
            _ => !self.is_valid_at(now, None),
        }
    }

    /// Time left before a TTL entry expires
    pub fn remaining_ttl(&self, now: Instant) -> Option<Duration> {
        match &self.validity {
            ValidityRule::Ttl(ttl) => {
                Some(ttl.saturating_sub(now.saturating_duration_since(self.created_at)))
            }
            _ => None,
        }
    }
}
