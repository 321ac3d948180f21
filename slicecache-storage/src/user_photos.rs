//! User photos cache: profile photo ids per user.

use serde::{Deserialize, Serialize};
use slicecache_core::{CacheConfig, CacheResult, PhotoId, UserId, UserPhotosKey};

use crate::events::UserPhotosSliceUpdate;
use crate::ledger::Slice;
use crate::ordered::{CacheStats, OrderedSliceCache};
use crate::publisher::Subscription;
use crate::query::{QueryResult, SliceQuery};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPhotosAddNew {
    pub user: UserId,
    pub photo_id: PhotoId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPhotosAddSlice {
    pub user: UserId,
    pub slice: Slice<PhotoId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPhotosRemoveOne {
    pub user: UserId,
    pub photo_id: PhotoId,
}

/// Drop `photo_id` and every newer photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPhotosRemoveAfter {
    pub user: UserId,
    pub photo_id: PhotoId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPhotosQuery {
    pub key: UserPhotosKey,
    pub query: SliceQuery<PhotoId>,
}

pub type UserPhotosResult = QueryResult<PhotoId>;

pub struct UserPhotosCache {
    cache: OrderedSliceCache<UserPhotosKey, PhotoId>,
}

impl UserPhotosCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            cache: OrderedSliceCache::new("user_photos", config),
        }
    }

    pub fn add_new(&mut self, request: UserPhotosAddNew) -> CacheResult<()> {
        self.cache
            .add_new(UserPhotosKey::new(request.user), request.photo_id)
            .map(drop)
    }

    pub fn add_slice(&mut self, request: UserPhotosAddSlice) -> CacheResult<()> {
        self.cache
            .add_slice(UserPhotosKey::new(request.user), request.slice)
            .map(drop)
    }

    pub fn remove_one(&mut self, request: UserPhotosRemoveOne) {
        let key = UserPhotosKey::new(request.user);
        if let Some(change) = self.cache.remove_one(key, request.photo_id) {
            self.cache.notify(key, change);
        }
    }

    pub fn remove_after(&mut self, request: UserPhotosRemoveAfter) {
        let key = UserPhotosKey::new(request.user);
        if let Some(change) = self.cache.remove_after(key, request.photo_id) {
            self.cache.notify(key, change);
        }
    }

    pub fn query(&self, query: &UserPhotosQuery) -> UserPhotosResult {
        self.cache.query(&query.key, &query.query)
    }

    pub fn query_with<R>(
        &self,
        query: &UserPhotosQuery,
        callback: impl FnOnce(UserPhotosResult) -> R,
    ) -> R {
        self.cache.query_with(&query.key, &query.query, callback)
    }

    pub fn slice_updated(&self) -> Subscription<UserPhotosSliceUpdate> {
        self.cache.subscribe()
    }

    pub fn slice_updated_for(&self, user: UserId) -> Subscription<UserPhotosSliceUpdate> {
        self.cache.subscribe_to(UserPhotosKey::new(user))
    }

    pub fn inner(&self) -> &OrderedSliceCache<UserPhotosKey, PhotoId> {
        &self.cache
    }

    pub(crate) fn inner_mut(&mut self) -> &mut OrderedSliceCache<UserPhotosKey, PhotoId> {
        &mut self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
