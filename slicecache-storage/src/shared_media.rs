//! Shared media cache: message ids per (peer, media kind).

use serde::{Deserialize, Serialize};
use slicecache_core::{
    CacheConfig, CacheResult, MediaKind, MediaTypes, MsgId, PeerId, SharedMediaKey,
};
use tracing::debug;

use crate::events::{SharedMediaAllRemoved, SharedMediaOneRemoved, SharedMediaSliceUpdate};
use crate::ledger::Slice;
use crate::ordered::{CacheStats, OrderedSliceCache};
use crate::publisher::{Publisher, Subscription};
use crate::query::{QueryResult, SliceQuery};

/// A new message carrying media of the given kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMediaAddNew {
    pub peer: PeerId,
    pub types: MediaTypes,
    pub msg_id: MsgId,
}

/// An existing message carrying media of the given kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMediaAddExisting {
    pub peer: PeerId,
    pub types: MediaTypes,
    pub msg_id: MsgId,
}

/// A loaded slice of one media kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMediaAddSlice {
    pub peer: PeerId,
    pub kind: MediaKind,
    pub slice: Slice<MsgId>,
}

impl SharedMediaAddSlice {
    pub fn key(&self) -> SharedMediaKey {
        SharedMediaKey::new(self.peer, self.kind)
    }
}

/// A message deleted from the given kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMediaRemoveOne {
    pub peer: PeerId,
    pub types: MediaTypes,
    pub msg_id: MsgId,
}

/// Everything of the given kinds dropped for a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMediaRemoveAll {
    pub peer: PeerId,
    pub types: MediaTypes,
}

impl SharedMediaRemoveAll {
    /// Drop every media kind for `peer`.
    pub fn new(peer: PeerId) -> Self {
        Self {
            peer,
            types: MediaTypes::all(),
        }
    }
}

/// A query against one (peer, kind) ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMediaQuery {
    pub key: SharedMediaKey,
    pub query: SliceQuery<MsgId>,
}

pub type SharedMediaResult = QueryResult<MsgId>;

pub struct SharedMediaCache {
    cache: OrderedSliceCache<SharedMediaKey, MsgId>,
    one_removed: Publisher<SharedMediaOneRemoved>,
    all_removed: Publisher<SharedMediaAllRemoved>,
}

impl SharedMediaCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            one_removed: Publisher::new("shared_media.one_removed", config.event_capacity),
            all_removed: Publisher::new("shared_media.all_removed", config.event_capacity),
            cache: OrderedSliceCache::new("shared_media", config),
        }
    }

    /// Apply `apply` to every kind in `types`; the first error is kept.
    fn each_kind(
        &mut self,
        peer: PeerId,
        types: MediaTypes,
        mut apply: impl FnMut(
            &mut OrderedSliceCache<SharedMediaKey, MsgId>,
            SharedMediaKey,
        ) -> CacheResult<bool>,
    ) -> CacheResult<()> {
        let mut outcome = Ok(());
        for kind in types.kinds() {
            if let Err(err) = apply(&mut self.cache, SharedMediaKey::new(peer, kind)) {
                outcome = outcome.and(Err(err));
            }
        }
        outcome
    }

    /// Record a new message under each of its kinds.
    ///
    /// Every kind is attempted; the first rejection is returned.
    pub fn add_new(&mut self, request: SharedMediaAddNew) -> CacheResult<()> {
        self.each_kind(request.peer, request.types, |cache, key| {
            cache.add_new(key, request.msg_id)
        })
    }

    pub fn add_existing(&mut self, request: SharedMediaAddExisting) -> CacheResult<()> {
        self.each_kind(request.peer, request.types, |cache, key| {
            cache.add_existing(key, request.msg_id)
        })
    }

    pub fn add_slice(&mut self, request: SharedMediaAddSlice) -> CacheResult<()> {
        let key = request.key();
        self.cache.add_slice(key, request.slice).map(drop)
    }

    /// Remove a message from each of its kinds.
    ///
    /// One event names exactly the kinds the message was removed from;
    /// nothing is published if it was unknown everywhere.
    pub fn remove_one(&mut self, request: SharedMediaRemoveOne) {
        let mut removed = MediaTypes::empty();
        for kind in request.types.kinds() {
            let key = SharedMediaKey::new(request.peer, kind);
            if self.cache.remove_one(key, request.msg_id).is_some() {
                removed |= kind.flag();
            }
        }
        if removed.is_empty() {
            return;
        }
        self.one_removed.publish(SharedMediaOneRemoved {
            peer: request.peer,
            types: removed,
            msg_id: request.msg_id,
        });
    }

    /// Drop everything known for the named kinds. Always publishes once.
    pub fn remove_all(&mut self, request: SharedMediaRemoveAll) {
        let cleared = request
            .types
            .kinds()
            .filter(|kind| self.cache.remove_all(SharedMediaKey::new(request.peer, *kind)))
            .count();
        debug!(peer = %request.peer, cleared, "Shared media cleared");
        self.all_removed.publish(SharedMediaAllRemoved {
            peer: request.peer,
            types: request.types,
        });
    }

    pub fn query(&self, query: &SharedMediaQuery) -> SharedMediaResult {
        self.cache.query(&query.key, &query.query)
    }

    pub fn query_with<R>(
        &self,
        query: &SharedMediaQuery,
        callback: impl FnOnce(SharedMediaResult) -> R,
    ) -> R {
        self.cache.query_with(&query.key, &query.query, callback)
    }

    pub fn slice_updated(&self) -> Subscription<SharedMediaSliceUpdate> {
        self.cache.subscribe()
    }

    pub fn slice_updated_for(&self, key: SharedMediaKey) -> Subscription<SharedMediaSliceUpdate> {
        self.cache.subscribe_to(key)
    }

    pub fn one_removed(&self) -> Subscription<SharedMediaOneRemoved> {
        self.one_removed.subscribe()
    }

    pub fn one_removed_for(&self, peer: PeerId) -> Subscription<SharedMediaOneRemoved> {
        self.one_removed.subscribe_to(peer)
    }

    pub fn all_removed(&self) -> Subscription<SharedMediaAllRemoved> {
        self.all_removed.subscribe()
    }

    pub fn all_removed_for(&self, peer: PeerId) -> Subscription<SharedMediaAllRemoved> {
        self.all_removed.subscribe_to(peer)
    }

    /// The underlying keyed cache.
    pub fn inner(&self) -> &OrderedSliceCache<SharedMediaKey, MsgId> {
        &self.cache
    }

    pub(crate) fn inner_mut(&mut self) -> &mut OrderedSliceCache<SharedMediaKey, MsgId> {
        &mut self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicecache_core::SliceId;

    const PEER: PeerId = PeerId(100);

    fn msgs(raw: &[i64]) -> Vec<MsgId> {
        raw.iter().copied().map(MsgId).collect()
    }

    fn photo_key() -> SharedMediaKey {
        SharedMediaKey::new(PEER, MediaKind::Photo)
    }

    fn newest(key: SharedMediaKey, limit: usize) -> SharedMediaQuery {
        SharedMediaQuery {
            key,
            query: SliceQuery::newest(limit),
        }
    }

    fn seeded() -> SharedMediaCache {
        let mut cache = SharedMediaCache::new(CacheConfig::default());
        for kind in [MediaKind::Photo, MediaKind::PhotoVideo] {
            cache
                .add_slice(SharedMediaAddSlice {
                    peer: PEER,
                    kind,
                    slice: Slice::new(msgs(&[10, 20, 30])).with_top(),
                })
                .unwrap();
        }
        cache
    }

    #[test]
    fn test_add_new_applies_to_each_kind() {
        let mut cache = seeded();
        cache
            .add_new(SharedMediaAddNew {
                peer: PEER,
                types: MediaTypes::PHOTO | MediaTypes::PHOTO_VIDEO,
                msg_id: MsgId(40),
            })
            .unwrap();
        for kind in [MediaKind::Photo, MediaKind::PhotoVideo] {
            let result = cache.query(&newest(SharedMediaKey::new(PEER, kind), 1));
            assert_eq!(result.ids, msgs(&[40]));
            assert!(result.top_touched);
        }
    }

    #[test]
    fn test_add_new_reports_first_rejection() {
        let mut cache = seeded();
        let result = cache.add_new(SharedMediaAddNew {
            peer: PEER,
            types: MediaTypes::PHOTO | MediaTypes::FILE,
            msg_id: MsgId(15),
        });
        assert!(result.is_err());
        let file = cache.query(&SharedMediaQuery {
            key: SharedMediaKey::new(PEER, MediaKind::File),
            query: SliceQuery::around(MsgId(15), 0, 1),
        });
        assert_eq!(file.ids, msgs(&[15]));
    }

    #[test]
    fn test_add_existing_rejects_sentinel() {
        let mut cache = seeded();
        let result = cache.add_existing(SharedMediaAddExisting {
            peer: PEER,
            types: MediaTypes::PHOTO | MediaTypes::FILE,
            msg_id: MsgId::MAX,
        });
        assert!(result.is_err());
        let photos = cache.query(&newest(photo_key(), 5));
        assert_eq!(photos.ids, msgs(&[30, 20, 10]));
    }

    #[test]
    fn test_remove_one_names_affected_kinds() {
        let mut cache = seeded();
        let mut removed = cache.one_removed();
        cache.remove_one(SharedMediaRemoveOne {
            peer: PEER,
            types: MediaTypes::PHOTO | MediaTypes::VIDEO,
            msg_id: MsgId(20),
        });
        let events = removed.drain().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].types, MediaTypes::PHOTO);
        assert_eq!(events[0].msg_id, MsgId(20));
    }

    #[test]
    fn test_remove_unknown_publishes_nothing() {
        let mut cache = seeded();
        let mut removed = cache.one_removed();
        cache.remove_one(SharedMediaRemoveOne {
            peer: PEER,
            types: MediaTypes::all(),
            msg_id: MsgId(25),
        });
        assert_eq!(removed.try_next(), Ok(None));
    }

    #[test]
    fn test_remove_all_always_publishes() {
        let mut cache = SharedMediaCache::new(CacheConfig::default());
        let mut cleared = cache.all_removed_for(PEER);
        cache.remove_all(SharedMediaRemoveAll::new(PEER));
        assert_eq!(cleared.drain().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_all_keeps_other_kinds() {
        let mut cache = seeded();
        cache.remove_all(SharedMediaRemoveAll {
            peer: PEER,
            types: MediaTypes::PHOTO,
        });
        assert!(cache.query(&newest(photo_key(), 3)).ids.is_empty());
        let other = cache.query(&newest(SharedMediaKey::new(PEER, MediaKind::PhotoVideo), 3));
        assert_eq!(other.ids, msgs(&[30, 20, 10]));
    }

    #[test]
    fn test_slice_updates_filter_by_key() {
        let mut cache = SharedMediaCache::new(CacheConfig::default());
        let mut photos = cache.slice_updated_for(photo_key());
        cache
            .add_slice(SharedMediaAddSlice {
                peer: PEER,
                kind: MediaKind::Video,
                slice: Slice::new(msgs(&[1])),
            })
            .unwrap();
        cache
            .add_slice(SharedMediaAddSlice {
                peer: PEER,
                kind: MediaKind::Photo,
                slice: Slice::new(msgs(&[2])),
            })
            .unwrap();
        let events = photos.drain().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, photo_key());
    }
}
