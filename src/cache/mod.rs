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


//! Request-keyed query cache
//!
//! A framework-agnostic cache service: canonical key → entry map, with
//! per-operation staleness windows, inactivity eviction, retries and
//! mutation-driven invalidation.
//!
//! # Read path
//! - Fresh hit: returned immediately, no network call
//! - Stale hit: returned immediately, a background refresh is spawned
//! - Miss: waits for the fetch; concurrent misses on the same key share one
//!   outstanding call
//!
//! Every read also sweeps entries past their inactivity window, so memory
//! stays bounded without a janitor. Fetches run on their own task and finish
//! even when every waiter is dropped.
//!
//! # Write path
//! A fetch only writes its result if it is still the key's current fetch.
//! `set`, `remove` and `invalidate` detach whatever fetch is running, so a
//! late response never overwrites fresher state.
//!
//! # Usage Example
//! ```no_run
//! use readhub_core::cache::{CacheKey, QueryCache, QueryPolicy};
//!
//! # async fn example() {
//! let cache = QueryCache::new();
//! let result = cache
//!     .query(CacheKey::count(), QueryPolicy::COUNT, || async { Ok(42u64) })
//!     .await;
//! assert_eq!(result.data, Some(42));
//! # }
//! ```

pub mod entry;
pub mod key;
pub mod policy;

pub use entry::{AnyValue, CachedResult, EntryInfo, QueryStatus};
pub use key::{CacheKey, QueryKind, Segment};
pub use policy::{QueryPolicy, RetryPolicy, GC_TIME};

use crate::error::{CatalogError, Result};
use crate::events::{publish, CacheEvent, EVENT_CHANNEL_CAPACITY};
use entry::CacheEntry;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

type SharedFetch = Shared<BoxFuture<'static, Result<AnyValue>>>;

struct InFlight {
    id: u64,
    future: SharedFetch,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, InFlight>,
    next_fetch_id: u64,
}

struct CacheInner {
    state: Mutex<CacheState>,
    events: broadcast::Sender<CacheEvent>,
}

/// Effect applied to the cache after a successful mutation
pub enum CacheEffect {
    /// Drop every entry in a segment
    Invalidate(Segment),
    /// Drop one entry so the next read refetches
    InvalidateKey(CacheKey),
    /// Write a value directly, as if it had just been fetched
    Seed(CacheKey, AnyValue, QueryPolicy),
    /// Remove one entry outright
    Remove(CacheKey),
}

impl CacheEffect {
    pub fn seed<T: Send + Sync + 'static>(key: CacheKey, value: T, policy: QueryPolicy) -> Self {
        Self::Seed(key, Arc::new(value), policy)
    }
}

impl fmt::Debug for CacheEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalidate(segment) => f.debug_tuple("Invalidate").field(segment).finish(),
            Self::InvalidateKey(key) => f.debug_tuple("InvalidateKey").field(key).finish(),
            Self::Seed(key, _, _) => f.debug_tuple("Seed").field(key).finish(),
            Self::Remove(key) => f.debug_tuple("Remove").field(key).finish(),
        }
    }
}

/// Shared, cloneable handle to one cache
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("QueryCache")
            .field("entries", &state.entries.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                events,
            }),
        }
    }

    /// Subscribe to entry change events
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.inner.events.subscribe()
    }

    /// Read through the cache
    ///
    /// `fetcher` may be called several times (retries, later refreshes) and
    /// must be `'static` because stale refreshes run in the background.
    pub async fn query<T, F, Fut>(&self, key: CacheKey, policy: QueryPolicy, fetcher: F) -> CachedResult<T>
    where
        T: Clone + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let now = Instant::now();
        let lookup = {
            let mut state = self.lock();
            self.evict_expired(&mut state, now);
            state.entries.get_mut(&key).and_then(|entry| {
                let value = entry.value.clone()?;
                entry.touch(now);
                Some((value, entry.is_stale(now), entry.last_error.clone()))
            })
        };

        match lookup {
            Some((value, stale, last_error)) => {
                if stale {
                    trace!(key = %key, "Stale hit, refreshing in background");
                    self.refresh_in_background(&key, policy, fetcher);
                } else {
                    trace!(key = %key, "Cache hit");
                }
                match downcast::<T>(&key, &value) {
                    Ok(data) => CachedResult::new(Some(data), last_error, stale, true),
                    Err(e) => CachedResult::new(None, Some(e), stale, true),
                }
            }
            None => {
                let fetch = {
                    let mut state = self.lock();
                    self.start_fetch(&mut state, &key, policy, fetcher)
                };
                match fetch.await.and_then(|value| downcast::<T>(&key, &value)) {
                    Ok(data) => CachedResult::new(Some(data), None, false, false),
                    Err(e) => CachedResult::new(None, Some(e), false, false),
                }
            }
        }
    }

    /// Run a mutation with the mutation retry policy, then apply its effects
    ///
    /// Effects are only applied when the mutation succeeds.
    pub async fn mutate<T, F, Fut, E>(&self, fetcher: F, effects: E) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        E: FnOnce(&T) -> Vec<CacheEffect>,
    {
        let value = RetryPolicy::MUTATION.run("mutation", fetcher).await?;
        for effect in effects(&value) {
            self.apply(effect);
        }
        Ok(value)
    }

    pub fn apply(&self, effect: CacheEffect) {
        debug!(effect = ?effect, "Applying cache effect");
        match effect {
            CacheEffect::Invalidate(segment) => {
                self.invalidate(segment);
            }
            CacheEffect::InvalidateKey(key) => {
                self.invalidate_key(&key);
            }
            CacheEffect::Seed(key, value, policy) => self.store(key, value, policy),
            CacheEffect::Remove(key) => {
                self.remove(&key);
            }
        }
    }

    /// Current value, without fetching and without counting as a use
    pub fn get<T: Clone + 'static>(&self, key: &CacheKey) -> Option<T> {
        let now = Instant::now();
        let state = self.lock();
        state
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.value.as_ref())
            .and_then(|value| value.downcast_ref::<T>().cloned())
    }

    /// Write a value as if it had just been fetched
    pub fn set<T: Send + Sync + 'static>(&self, key: CacheKey, value: T, policy: QueryPolicy) {
        self.store(key, Arc::new(value), policy);
    }

    /// Drop every entry in a segment; returns how many were dropped
    pub fn invalidate(&self, segment: Segment) -> usize {
        let mut state = self.lock();
        let keys: Vec<CacheKey> = state
            .entries
            .keys()
            .chain(state.in_flight.keys())
            .filter(|key| key.segment() == segment)
            .cloned()
            .collect();

        let mut dropped = 0;
        for key in keys {
            state.in_flight.remove(&key);
            if state.entries.remove(&key).is_some() {
                dropped += 1;
                publish(&self.inner.events, CacheEvent::Invalidated(key));
            }
        }
        debug!(segment = ?segment, dropped, "Invalidated cache segment");
        dropped
    }

    pub fn invalidate_key(&self, key: &CacheKey) -> bool {
        let mut state = self.lock();
        state.in_flight.remove(key);
        let dropped = state.entries.remove(key).is_some();
        if dropped {
            publish(&self.inner.events, CacheEvent::Invalidated(key.clone()));
        }
        dropped
    }

    /// Remove one entry outright
    pub fn remove(&self, key: &CacheKey) -> bool {
        let mut state = self.lock();
        state.in_flight.remove(key);
        let removed = state.entries.remove(key).is_some();
        if removed {
            publish(&self.inner.events, CacheEvent::Removed(key.clone()));
        }
        removed
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.in_flight.clear();
        for (key, _) in state.entries.drain() {
            publish(&self.inner.events, CacheEvent::Removed(key));
        }
    }

    /// Drop entries unused for longer than their inactivity window
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        self.evict_expired(&mut state, now)
    }

    /// Run `collect_garbage` periodically until the cache is dropped
    pub fn spawn_janitor(&self, interval: Duration) -> JoinHandle<()> {
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(inner) => {
                        QueryCache { inner }.collect_garbage();
                    }
                    None => break,
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Bookkeeping snapshot for one entry
    pub fn entry_info(&self, key: &CacheKey) -> Option<EntryInfo> {
        let now = Instant::now();
        self.lock().entries.get(key).map(|entry| entry.info(now))
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store(&self, key: CacheKey, value: AnyValue, policy: QueryPolicy) {
        let now = Instant::now();
        let mut state = self.lock();
        self.evict_expired(&mut state, now);
        state.in_flight.remove(&key);
        state
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::empty(now, &policy))
            .store(value, now, &policy);
        publish(&self.inner.events, CacheEvent::Updated(key));
    }

    /// Remove expired entries whose key has no fetch running
    fn evict_expired(&self, state: &mut CacheState, now: Instant) -> usize {
        let CacheState {
            entries, in_flight, ..
        } = state;
        let before = entries.len();
        entries.retain(|key, entry| {
            let keep = !entry.is_expired(now) || in_flight.contains_key(key);
            if !keep {
                publish(&self.inner.events, CacheEvent::Evicted(key.clone()));
            }
            keep
        });
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "Evicted unused cache entries");
        }
        evicted
    }

    /// Join the running fetch for `key` or start a new one
    ///
    /// New fetches are driven by a spawned task, so the in-flight record is
    /// cleared even if every caller stops waiting.
    fn start_fetch<T, F, Fut>(
        &self,
        state: &mut CacheState,
        key: &CacheKey,
        policy: QueryPolicy,
        fetcher: F,
    ) -> SharedFetch
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        if let Some(running) = state.in_flight.get(key) {
            trace!(key = %key, "Joining in-flight fetch");
            return running.future.clone();
        }

        let id = state.next_fetch_id;
        state.next_fetch_id += 1;
        debug!(key = %key, fetch_id = id, "Cache miss, fetching");

        let weak = Arc::downgrade(&self.inner);
        let fetch_key = key.clone();
        let future = async move {
            let label = fetch_key.to_string();
            let result = policy
                .retry
                .run(&label, || {
                    let fut = fetcher();
                    async move { fut.await.map(|value| Arc::new(value) as AnyValue) }
                })
                .await;
            if let Some(inner) = weak.upgrade() {
                QueryCache { inner }.finish_fetch(&fetch_key, id, policy, &result);
            }
            result
        }
        .boxed()
        .shared();

        state.in_flight.insert(
            key.clone(),
            InFlight {
                id,
                future: future.clone(),
            },
        );
        tokio::spawn(future.clone().map(|_| ()));
        future
    }

    fn refresh_in_background<T, F, Fut>(&self, key: &CacheKey, policy: QueryPolicy, fetcher: F)
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut state = self.lock();
        // the spawned driver owns completion, nobody waits here
        drop(self.start_fetch(&mut state, key, policy, fetcher));
    }

    /// Record a fetch result if that fetch is still current for the key
    fn finish_fetch(&self, key: &CacheKey, id: u64, policy: QueryPolicy, result: &Result<AnyValue>) {
        let now = Instant::now();
        let mut state = self.lock();
        if state.in_flight.get(key).map(|running| running.id) != Some(id) {
            debug!(key = %key, fetch_id = id, "Discarding result of detached fetch");
            return;
        }
        state.in_flight.remove(key);

        let entry = state
            .entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::empty(now, &policy));
        match result {
            Ok(value) => {
                entry.store(value.clone(), now, &policy);
                publish(&self.inner.events, CacheEvent::Updated(key.clone()));
            }
            Err(error) => {
                warn!(key = %key, error = %error, "Fetch failed, keeping previous value");
                entry.fail(error.clone(), now);
                publish(
                    &self.inner.events,
                    CacheEvent::Failed {
                        key: key.clone(),
                        error: error.clone(),
                    },
                );
            }
        }
    }
}

fn downcast<T: Clone + 'static>(key: &CacheKey, value: &AnyValue) -> Result<T> {
    value.downcast_ref::<T>().cloned().ok_or_else(|| {
        CatalogError::internal(format!("Cached value for {} has an unexpected type", key))
    })
}
