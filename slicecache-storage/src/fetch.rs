//! Backing store boundary.
//!
//! A [`SliceFetcher`] turns [`FetchRequest`]s into loaded slices. The caches
//! never call it on their own; `fill_and_query` is the one place a query is
//! allowed to wait on the backing store.

use async_trait::async_trait;
use slicecache_core::{
    CacheResult, FetchRequest, MsgId, PhotoId, SharedMediaKey, SliceId, UserPhotosKey,
};
use tracing::debug;

use crate::ledger::{Rejected, Slice};
use crate::ordered::{CacheKey, OrderedSliceCache};
use crate::query::{QueryResult, SliceQuery};
use crate::shared_media::{SharedMediaCache, SharedMediaQuery, SharedMediaResult};
use crate::user_photos::{UserPhotosCache, UserPhotosQuery, UserPhotosResult};

/// A slice returned by the backing store.
pub type FetchedSlice<I> = Slice<I>;

/// Loads slices on request.
#[async_trait]
pub trait SliceFetcher<K, I>: Send + Sync
where
    K: Send + Sync + 'static,
    I: Send + Sync + 'static,
{
    /// Load the items described by `request` for `key`.
    ///
    /// The returned slice must carry the boundary claims and range it is
    /// complete over; the cache trusts them.
    async fn fetch(&self, key: K, request: FetchRequest<I>) -> CacheResult<FetchedSlice<I>>;
}

impl<K: CacheKey, I: SliceId> OrderedSliceCache<K, I> {
    /// Query, fetch each reported gap once, merge, and query again.
    ///
    /// Fetched slices are only applied once every fetch succeeded and none
    /// carries a sentinel id.
    pub async fn fill_and_query<F>(
        &mut self,
        key: K,
        query: &SliceQuery<I>,
        fetcher: &F,
    ) -> CacheResult<QueryResult<I>>
    where
        F: SliceFetcher<K, I> + ?Sized,
    {
        let first = self.query(&key, query);
        if first.complete {
            return Ok(first);
        }

        let mut slices = Vec::with_capacity(first.fetch.len());
        for request in first.fetch {
            debug!(key = %key, ?request, "Fetching slice");
            slices.push(fetcher.fetch(key, request).await?);
        }
        if let Some(id) = slices.iter().find_map(Slice::sentinel) {
            return Err(self.rejected(key, "fill_and_query", Rejected::Sentinel(id)));
        }
        for slice in slices {
            self.add_slice(key, slice)?;
        }
        Ok(self.query(&key, query))
    }
}

impl SharedMediaCache {
    pub async fn fill_and_query<F>(
        &mut self,
        query: &SharedMediaQuery,
        fetcher: &F,
    ) -> CacheResult<SharedMediaResult>
    where
        F: SliceFetcher<SharedMediaKey, MsgId> + ?Sized,
    {
        self.inner_mut()
            .fill_and_query(query.key, &query.query, fetcher)
            .await
    }
}

impl UserPhotosCache {
    pub async fn fill_and_query<F>(
        &mut self,
        query: &UserPhotosQuery,
        fetcher: &F,
    ) -> CacheResult<UserPhotosResult>
    where
        F: SliceFetcher<UserPhotosKey, PhotoId> + ?Sized,
    {
        self.inner_mut()
            .fill_and_query(query.key, &query.query, fetcher)
            .await
    }
}
