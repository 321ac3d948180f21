//! Keyed collection of slice ledgers with query and update publishing.
//!
//! `OrderedSliceCache` is the shared engine behind both the shared media and
//! user photos caches. It owns one [`SliceLedger`] per key, creates ledgers
//! lazily on first mutation, answers queries for unknown keys from an empty
//! ledger, and publishes a [`SliceUpdate`] for every effective addition.
//! Removals return their change so the owning cache can decide which event
//! kind to publish.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use slicecache_core::{CacheConfig, CacheError, CacheResult, LedgerError, SliceId};
use tracing::{debug, warn};

use crate::events::SliceUpdate;
use crate::ledger::{Rejected, Slice, SliceChange, SliceLedger};
use crate::publisher::{Publisher, Subscription};
use crate::query::{Coverage, QueryResult, SliceQuery};

/// Anything usable as a ledger key.
pub trait CacheKey: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> CacheKey for T where
    T: Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
}

/// Query statistics for one cache component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Queries answered completely from known data.
    pub hits: u64,
    /// Queries that needed a fetch.
    pub misses: u64,
    /// Ledgers currently held.
    pub ledger_count: usize,
    /// Identifiers known across all ledgers.
    pub known_ids: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

pub struct OrderedSliceCache<K, I> {
    name: &'static str,
    config: CacheConfig,
    ledgers: HashMap<K, SliceLedger<I>>,
    slice_updated: Publisher<SliceUpdate<K, I>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: CacheKey, I: SliceId> OrderedSliceCache<K, I> {
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            name,
            slice_updated: Publisher::new(name, config.event_capacity),
            config,
            ledgers: HashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The ledger for `key`, if one has been created.
    pub fn ledger(&self, key: &K) -> Option<&SliceLedger<I>> {
        self.ledgers.get(key)
    }

    /// Keys that currently hold a ledger.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.ledgers.keys()
    }

    fn ledger_mut(&mut self, key: K) -> &mut SliceLedger<I> {
        self.ledgers.entry(key).or_default()
    }

    /// Publish a change for `key` on the slice update channel.
    pub fn notify(&self, key: K, change: SliceChange<I>) {
        let count = self.ledgers.get(&key).and_then(SliceLedger::count);
        self.slice_updated.publish(SliceUpdate { key, change, count });
    }

    fn applied(&self, key: K, operation: &'static str, change: Option<SliceChange<I>>) -> bool {
        match change {
            Some(change) => {
                debug!(cache = self.name, key = %key, operation, "Ledger changed");
                self.notify(key, change);
                true
            }
            None => {
                debug!(cache = self.name, key = %key, operation, "No-op mutation");
                false
            }
        }
    }

    pub(crate) fn rejected(
        &self,
        key: K,
        operation: &'static str,
        rejected: Rejected<I>,
    ) -> CacheError {
        let error = match rejected {
            Rejected::NotNewer { id, top } => {
                warn!(
                    cache = self.name,
                    key = %key,
                    operation,
                    id = %id,
                    top = %top,
                    "Rejected non-monotonic new item"
                );
                LedgerError::NonMonotonicNew {
                    key: key.to_string(),
                    id: id.to_string(),
                    top: top.to_string(),
                }
            }
            Rejected::Sentinel(id) => {
                warn!(cache = self.name, key = %key, operation, id = %id, "Rejected sentinel id");
                LedgerError::SentinelId {
                    key: key.to_string(),
                    id: id.to_string(),
                }
            }
        };
        error.into()
    }

    /// Record a newly created item above everything known.
    ///
    /// Returns whether the ledger changed.
    pub fn add_new(&mut self, key: K, id: I) -> CacheResult<bool> {
        match self.ledger_mut(key).add_new(id) {
            Ok(change) => Ok(self.applied(key, "add_new", change)),
            Err(rejected) => Err(self.rejected(key, "add_new", rejected)),
        }
    }

    /// Record a single item known to exist, without boundary claims.
    pub fn add_existing(&mut self, key: K, id: I) -> CacheResult<bool> {
        match self.ledger_mut(key).add_existing(id) {
            Ok(change) => Ok(self.applied(key, "add_existing", change)),
            Err(rejected) => Err(self.rejected(key, "add_existing", rejected)),
        }
    }

    /// Merge a loaded slice.
    pub fn add_slice(&mut self, key: K, slice: Slice<I>) -> CacheResult<bool> {
        match self.ledger_mut(key).add_slice(slice) {
            Ok(change) => Ok(self.applied(key, "add_slice", change)),
            Err(rejected) => Err(self.rejected(key, "add_slice", rejected)),
        }
    }

    /// Remove one item without publishing.
    pub fn remove_one(&mut self, key: K, id: I) -> Option<SliceChange<I>> {
        let change = self.ledgers.get_mut(&key)?.remove_one(id);
        if change.is_none() {
            debug!(cache = self.name, key = %key, id = %id, "Remove of unknown item");
        }
        change
    }

    /// Drop `id` and everything newer without publishing.
    pub fn remove_after(&mut self, key: K, id: I) -> Option<SliceChange<I>> {
        self.ledgers.get_mut(&key)?.remove_after(id)
    }

    /// Forget everything known for `key`. The ledger is kept, emptied.
    pub fn remove_all(&mut self, key: K) -> bool {
        self.ledgers
            .get_mut(&key)
            .map_or(false, SliceLedger::remove_all)
    }

    fn clamp(&self, query: &SliceQuery<I>) -> SliceQuery<I> {
        let max = self.config.max_query_limit;
        if query.limit_before > max || query.limit_after > max {
            warn!(
                cache = self.name,
                limit_before = query.limit_before,
                limit_after = query.limit_after,
                max,
                "Query limit clamped"
            );
        }
        SliceQuery {
            anchor: query.anchor,
            limit_before: query.limit_before.min(max),
            limit_after: query.limit_after.min(max),
        }
    }

    /// Answer a query from known data. Unknown keys read as empty.
    pub fn query(&self, key: &K, query: &SliceQuery<I>) -> QueryResult<I> {
        let query = self.clamp(query);
        let result = match self.ledgers.get(key) {
            Some(ledger) => ledger.query(&query),
            None => SliceLedger::new().query(&query),
        };
        if result.complete {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Deliver a query result to a one-shot callback.
    pub fn query_with<R>(
        &self,
        key: &K,
        query: &SliceQuery<I>,
        callback: impl FnOnce(QueryResult<I>) -> R,
    ) -> R {
        callback(self.query(key, query))
    }

    pub fn coverage(&self, key: &K, query: &SliceQuery<I>) -> Coverage<I> {
        let query = self.clamp(query);
        match self.ledgers.get(key) {
            Some(ledger) => ledger.coverage(query.anchor, query.limit_before, query.limit_after),
            None => {
                SliceLedger::new().coverage(query.anchor, query.limit_before, query.limit_after)
            }
        }
    }

    /// Subscribe to every slice update.
    pub fn subscribe(&self) -> Subscription<SliceUpdate<K, I>> {
        self.slice_updated.subscribe()
    }

    /// Subscribe to slice updates for one key.
    pub fn subscribe_to(&self, key: K) -> Subscription<SliceUpdate<K, I>> {
        self.slice_updated.subscribe_to(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            ledger_count: self.ledgers.len(),
            known_ids: self.ledgers.values().map(SliceLedger::len).sum(),
        }
    }
}

impl<K, I> fmt::Debug for OrderedSliceCache<K, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedSliceCache")
            .field("name", &self.name)
            .field("ledgers", &self.ledgers.len())
            .field("slice_updated", &self.slice_updated)
            .finish()
    }
}
