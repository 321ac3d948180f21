//! Storage facade: one entry point owning both caches.

use slicecache_core::{
    CacheConfig, CacheResult, MsgId, PeerId, PhotoId, SharedMediaKey, UserId, UserPhotosKey,
};

use crate::events::{
    SharedMediaAllRemoved, SharedMediaOneRemoved, SharedMediaSliceUpdate, UserPhotosSliceUpdate,
};
use crate::fetch::SliceFetcher;
use crate::ordered::CacheStats;
use crate::publisher::Subscription;
use crate::shared_media::{
    SharedMediaAddExisting, SharedMediaAddNew, SharedMediaAddSlice, SharedMediaCache,
    SharedMediaQuery, SharedMediaRemoveAll, SharedMediaRemoveOne, SharedMediaResult,
};
use crate::user_photos::{
    UserPhotosAddNew, UserPhotosAddSlice, UserPhotosCache, UserPhotosQuery,
    UserPhotosRemoveAfter, UserPhotosRemoveOne, UserPhotosResult,
};

/// Owns the shared media and user photos caches and forwards to them.
pub struct Storage {
    config: CacheConfig,
    shared_media: SharedMediaCache,
    user_photos: UserPhotosCache,
}

impl Storage {
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self::with_valid_config(config))
    }

    fn with_valid_config(config: CacheConfig) -> Self {
        Self {
            shared_media: SharedMediaCache::new(config.clone()),
            user_photos: UserPhotosCache::new(config.clone()),
            config,
        }
    }

    /// Build from `SLICECACHE_*` environment variables.
    pub fn from_env() -> CacheResult<Self> {
        Self::new(CacheConfig::from_env())
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn shared_media(&self) -> &SharedMediaCache {
        &self.shared_media
    }

    pub fn shared_media_mut(&mut self) -> &mut SharedMediaCache {
        &mut self.shared_media
    }

    pub fn user_photos(&self) -> &UserPhotosCache {
        &self.user_photos
    }

    pub fn user_photos_mut(&mut self) -> &mut UserPhotosCache {
        &mut self.user_photos
    }

    // ------------------------------------------------------------------
    // Shared media
    // ------------------------------------------------------------------

    pub fn shared_media_add_new(&mut self, request: SharedMediaAddNew) -> CacheResult<()> {
        self.shared_media.add_new(request)
    }

    pub fn shared_media_add_existing(
        &mut self,
        request: SharedMediaAddExisting,
    ) -> CacheResult<()> {
        self.shared_media.add_existing(request)
    }

    pub fn shared_media_add_slice(&mut self, request: SharedMediaAddSlice) -> CacheResult<()> {
        self.shared_media.add_slice(request)
    }

    pub fn shared_media_remove_one(&mut self, request: SharedMediaRemoveOne) {
        self.shared_media.remove_one(request);
    }

    pub fn shared_media_remove_all(&mut self, request: SharedMediaRemoveAll) {
        self.shared_media.remove_all(request);
    }

    pub fn shared_media_query(&self, query: &SharedMediaQuery) -> SharedMediaResult {
        self.shared_media.query(query)
    }

    pub fn shared_media_query_with<R>(
        &self,
        query: &SharedMediaQuery,
        callback: impl FnOnce(SharedMediaResult) -> R,
    ) -> R {
        self.shared_media.query_with(query, callback)
    }

    pub async fn shared_media_fill_and_query<F>(
        &mut self,
        query: &SharedMediaQuery,
        fetcher: &F,
    ) -> CacheResult<SharedMediaResult>
    where
        F: SliceFetcher<SharedMediaKey, MsgId> + ?Sized,
    {
        self.shared_media.fill_and_query(query, fetcher).await
    }

    pub fn shared_media_slice_updated(&self) -> Subscription<SharedMediaSliceUpdate> {
        self.shared_media.slice_updated()
    }

    pub fn shared_media_one_removed(&self) -> Subscription<SharedMediaOneRemoved> {
        self.shared_media.one_removed()
    }

    pub fn shared_media_one_removed_for(
        &self,
        peer: PeerId,
    ) -> Subscription<SharedMediaOneRemoved> {
        self.shared_media.one_removed_for(peer)
    }

    pub fn shared_media_all_removed(&self) -> Subscription<SharedMediaAllRemoved> {
        self.shared_media.all_removed()
    }

    // ------------------------------------------------------------------
    // User photos
    // ------------------------------------------------------------------

    pub fn user_photos_add_new(&mut self, request: UserPhotosAddNew) -> CacheResult<()> {
        self.user_photos.add_new(request)
    }

    pub fn user_photos_add_slice(&mut self, request: UserPhotosAddSlice) -> CacheResult<()> {
        self.user_photos.add_slice(request)
    }

    pub fn user_photos_remove_one(&mut self, request: UserPhotosRemoveOne) {
        self.user_photos.remove_one(request);
    }

    pub fn user_photos_remove_after(&mut self, request: UserPhotosRemoveAfter) {
        self.user_photos.remove_after(request);
    }

    pub fn user_photos_query(&self, query: &UserPhotosQuery) -> UserPhotosResult {
        self.user_photos.query(query)
    }

    pub fn user_photos_query_with<R>(
        &self,
        query: &UserPhotosQuery,
        callback: impl FnOnce(UserPhotosResult) -> R,
    ) -> R {
        self.user_photos.query_with(query, callback)
    }

    pub async fn user_photos_fill_and_query<F>(
        &mut self,
        query: &UserPhotosQuery,
        fetcher: &F,
    ) -> CacheResult<UserPhotosResult>
    where
        F: SliceFetcher<UserPhotosKey, PhotoId> + ?Sized,
    {
        self.user_photos.fill_and_query(query, fetcher).await
    }

    pub fn user_photos_slice_updated(&self) -> Subscription<UserPhotosSliceUpdate> {
        self.user_photos.slice_updated()
    }

    pub fn user_photos_slice_updated_for(
        &self,
        user: UserId,
    ) -> Subscription<UserPhotosSliceUpdate> {
        self.user_photos.slice_updated_for(user)
    }

    /// Statistics for (shared media, user photos).
    pub fn stats(&self) -> (CacheStats, CacheStats) {
        (self.shared_media.stats(), self.user_photos.stats())
    }
}

impl Default for Storage {
    /// `CacheConfig::default()` always passes `validate()`.
    fn default() -> Self {
        Self::with_valid_config(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Slice;
    use crate::query::SliceQuery;
    use slicecache_core::{CacheError, MediaKind};

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = CacheConfig::default().with_event_capacity(0);
        assert!(matches!(Storage::new(config), Err(CacheError::Config(_))));
    }

    #[test]
    fn test_default_uses_validated_default_config() {
        let storage = Storage::default();
        assert_eq!(storage.config(), &CacheConfig::default());
        assert!(storage.config().validate().is_ok());
        assert_eq!(storage.shared_media().inner().config(), storage.config());
        assert_eq!(storage.user_photos().inner().config(), storage.config());
    }

    #[test]
    fn test_caches_are_independent() {
        let mut storage = Storage::default();
        storage
            .shared_media_add_slice(SharedMediaAddSlice {
                peer: PeerId(1),
                kind: MediaKind::Link,
                slice: Slice::new(vec![MsgId(1)]).with_top(),
            })
            .unwrap();
        storage
            .user_photos_add_slice(UserPhotosAddSlice {
                user: UserId(1),
                slice: Slice::new(vec![PhotoId(2)]).with_top(),
            })
            .unwrap();

        let media = storage.shared_media_query(&SharedMediaQuery {
            key: SharedMediaKey::new(PeerId(1), MediaKind::Link),
            query: SliceQuery::newest(5),
        });
        let photos = storage.user_photos_query(&UserPhotosQuery {
            key: UserPhotosKey::new(UserId(1)),
            query: SliceQuery::newest(5),
        });
        assert_eq!(media.ids, vec![MsgId(1)]);
        assert_eq!(photos.ids, vec![PhotoId(2)]);

        let (media_stats, photo_stats) = storage.stats();
        assert_eq!(media_stats.ledger_count, 1);
        assert_eq!(photo_stats.ledger_count, 1);
    }
}
