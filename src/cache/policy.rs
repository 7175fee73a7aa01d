// ReadHub Core - Book catalog client data layer
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Staleness, eviction and retry policies
//!
//! # Retry Strategy
//! - Queries: up to 3 retries for retryable failures
//! - 4xx responses are final, except 408 and 429 which get up to 2 retries
//! - Client-side timeouts have no response and use the query budget
//! - Mutations: at most 1 retry
//! - Backoff starts at 1s and doubles per attempt, capped at 30s

use crate::error::{CatalogError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Inactivity window after which an unused entry is dropped
pub const GC_TIME: Duration = Duration::from_secs(10 * 60);

/// How failed fetches are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries for server and network failures
    pub max_retries: u32,
    /// Retries for 408/429 responses
    pub transient_client_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const QUERY: Self = Self {
        max_retries: 3,
        transient_client_retries: 2,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
    };

    pub const MUTATION: Self = Self {
        max_retries: 1,
        transient_client_retries: 1,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
    };

    pub const NONE: Self = Self {
        max_retries: 0,
        transient_client_retries: 0,
        base_delay: Duration::from_secs(1),
        max_delay: Duration::from_secs(30),
    };

    /// Whether another attempt is allowed after `failures` failed attempts
    pub fn should_retry(&self, failures: u32, error: &CatalogError) -> bool {
        if !error.is_retryable() {
            return false;
        }
        let limit = if error.is_transient_client_error() {
            self.transient_client_retries
        } else {
            self.max_retries
        };
        failures <= limit
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op` until it succeeds or the policy gives up
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut failures = 0u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    failures += 1;
                    if !self.should_retry(failures, &e) {
                        if failures > 1 {
                            warn!(label, attempts = failures, error = %e, "Giving up after retries");
                        }
                        return Err(e);
                    }
                    let delay = self.delay_for(failures - 1);
                    debug!(label, attempt = failures, delay_ms = delay.as_millis() as u64, error = %e, "Retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::QUERY
    }
}

/// Per-operation cache windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryPolicy {
    /// How long a value is served without a refresh
    pub stale_time: Duration,
    /// Inactivity window before eviction
    pub gc_time: Duration,
    pub retry: RetryPolicy,
}

impl QueryPolicy {
    pub const DETAIL: Self = Self::fresh_for(Duration::from_secs(10 * 60));
    pub const LIST: Self = Self::fresh_for(Duration::from_secs(5 * 60));
    pub const SEARCH: Self = Self::fresh_for(Duration::from_secs(2 * 60));
    pub const POPULAR: Self = Self::fresh_for(Duration::from_secs(15 * 60));
    pub const COUNT: Self = Self::fresh_for(Duration::from_secs(30 * 60));
    pub const EXISTS: Self = Self::fresh_for(Duration::from_secs(60 * 60));

    /// Policy with the default eviction window and query retries
    pub const fn fresh_for(stale_time: Duration) -> Self {
        Self {
            stale_time,
            gc_time: GC_TIME,
            retry: RetryPolicy::QUERY,
        }
    }

    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn attempts_for(policy: RetryPolicy, error: CatalogError) -> u32 {
        let calls = AtomicU32::new(0);
        let result: Result<()> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                let error = error.clone();
                async move { Err(error) }
            })
            .await;
        assert!(result.is_err());
        calls.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_retry_three_times() {
        assert_eq!(attempts_for(RetryPolicy::QUERY, CatalogError::http_status(500)).await, 4);
        assert_eq!(attempts_for(RetryPolicy::QUERY, CatalogError::network("reset")).await, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_timeouts_use_full_budget() {
        let timeout = CatalogError::Transport(TransportError::Timeout);
        assert_eq!(attempts_for(RetryPolicy::QUERY, timeout.clone()).await, 4);
        assert_eq!(attempts_for(RetryPolicy::MUTATION, timeout).await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_client_errors_retry_twice() {
        assert_eq!(attempts_for(RetryPolicy::QUERY, CatalogError::http_status(429)).await, 3);
        assert_eq!(attempts_for(RetryPolicy::QUERY, CatalogError::http_status(408)).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_never_retry() {
        assert_eq!(attempts_for(RetryPolicy::QUERY, CatalogError::http_status(404)).await, 1);
        assert_eq!(attempts_for(RetryPolicy::QUERY, CatalogError::http_status(400)).await, 1);
        assert_eq!(attempts_for(RetryPolicy::QUERY, CatalogError::validation("bad")).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mutations_retry_once() {
        assert_eq!(attempts_for(RetryPolicy::MUTATION, CatalogError::http_status(503)).await, 2);
        assert_eq!(attempts_for(RetryPolicy::MUTATION, CatalogError::http_status(409)).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_failure() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        let result = RetryPolicy::QUERY
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(CatalogError::http_status(502))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        // 1s + 2s of backoff
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::QUERY;
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(40), Duration::from_secs(30));
    }

    #[test]
    fn test_operation_windows() {
        assert_eq!(QueryPolicy::DETAIL.stale_time, Duration::from_secs(600));
        assert_eq!(QueryPolicy::LIST.stale_time, Duration::from_secs(300));
        assert_eq!(QueryPolicy::SEARCH.stale_time, Duration::from_secs(120));
        assert_eq!(QueryPolicy::COUNT.stale_time, Duration::from_secs(1800));
        assert_eq!(QueryPolicy::EXISTS.stale_time, Duration::from_secs(3600));
        assert_eq!(QueryPolicy::LIST.gc_time, GC_TIME);
    }
}
