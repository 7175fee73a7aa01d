//! Cache entries and query results

use crate::cache::policy::QueryPolicy;
use crate::error::{CatalogError, Result};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Type-erased cached value
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// One keyed slot in the cache
pub(crate) struct CacheEntry {
    pub value: Option<AnyValue>,
    pub fetched_at: Option<Instant>,
    pub stale_at: Instant,
    pub evict_at: Instant,
    pub gc_time: Duration,
    pub last_error: Option<CatalogError>,
}

impl CacheEntry {
    pub fn empty(now: Instant, policy: &QueryPolicy) -> Self {
        Self {
            value: None,
            fetched_at: None,
            stale_at: now,
            evict_at: now + policy.gc_time,
            gc_time: policy.gc_time,
            last_error: None,
        }
    }

    /// Replace the value after a successful fetch or seed
    pub fn store(&mut self, value: AnyValue, now: Instant, policy: &QueryPolicy) {
        self.value = Some(value);
        self.fetched_at = Some(now);
        self.stale_at = now + policy.stale_time;
        self.gc_time = policy.gc_time;
        self.last_error = None;
        self.touch(now);
    }

    /// Record a failed fetch; any previous value stays
    pub fn fail(&mut self, error: CatalogError, now: Instant) {
        self.last_error = Some(error);
        self.touch(now);
    }

    pub fn touch(&mut self, now: Instant) {
        self.evict_at = now + self.gc_time;
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        now >= self.stale_at
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.evict_at
    }

    pub fn info(&self, now: Instant) -> EntryInfo {
        EntryInfo {
            has_value: self.value.is_some(),
            is_stale: self.is_stale(now),
            fetched_at: self.fetched_at,
            evict_at: self.evict_at,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only snapshot of an entry's bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    pub has_value: bool,
    pub is_stale: bool,
    pub fetched_at: Option<Instant>,
    pub evict_at: Instant,
    pub last_error: Option<CatalogError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// Nothing was requested (disabled query or rejected input)
    Idle,
    Success,
    Error,
}

/// Outcome of a cached query
///
/// A failed refresh keeps the previous value in `data` and reports the
/// failure in `error` at the same time.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResult<T> {
    pub data: Option<T>,
    pub error: Option<CatalogError>,
    pub status: QueryStatus,
    /// Served past its staleness deadline, a refresh is running
    pub is_stale: bool,
    /// Answered without waiting for the network
    pub from_cache: bool,
}

impl<T> CachedResult<T> {
    pub fn idle() -> Self {
        Self {
            data: None,
            error: None,
            status: QueryStatus::Idle,
            is_stale: false,
            from_cache: false,
        }
    }

    pub(crate) fn new(data: Option<T>, error: Option<CatalogError>, is_stale: bool, from_cache: bool) -> Self {
        let status = if error.is_some() {
            QueryStatus::Error
        } else if data.is_some() {
            QueryStatus::Success
        } else {
            QueryStatus::Idle
        };
        Self {
            data,
            error,
            status,
            is_stale,
            from_cache,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Displayable value, or the error when there is nothing to show
    pub fn into_result(self) -> Result<Option<T>> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(Some(data)),
            (None, Some(error)) => Err(error),
            (None, None) => Ok(None),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CachedResult<U> {
        CachedResult {
            data: self.data.map(f),
            error: self.error,
            status: self.status,
            is_stale: self.is_stale,
            from_cache: self.from_cache,
        }
    }
}
