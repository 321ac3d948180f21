//! Update events emitted by the caches.
//!
//! Each cache publishes on a separate channel per event kind. Events carry
//! their key so subscribers can filter to the peer or user they display.

use serde::{Deserialize, Serialize};
use slicecache_core::{MediaTypes, MsgId, PeerId, PhotoId, SharedMediaKey, UserPhotosKey};

use crate::ledger::SliceChange;

/// An event that belongs to some key and can be filtered by it.
pub trait KeyedEvent {
    type Key;

    /// True if a subscriber interested in `key` should see this event.
    fn concerns(&self, key: &Self::Key) -> bool;
}

/// A ledger changed for one key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceUpdate<K, I> {
    pub key: K,
    pub change: SliceChange<I>,
    /// Total count after the change, if known.
    pub count: Option<usize>,
}

impl<K: PartialEq, I> KeyedEvent for SliceUpdate<K, I> {
    type Key = K;

    fn concerns(&self, key: &K) -> bool {
        self.key == *key
    }
}

pub type SharedMediaSliceUpdate = SliceUpdate<SharedMediaKey, MsgId>;
pub type UserPhotosSliceUpdate = SliceUpdate<UserPhotosKey, PhotoId>;

/// One message was removed from some of a peer's media kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMediaOneRemoved {
    pub peer: PeerId,
    /// Kinds the message was actually removed from.
    pub types: MediaTypes,
    pub msg_id: MsgId,
}

impl KeyedEvent for SharedMediaOneRemoved {
    type Key = PeerId;

    fn concerns(&self, peer: &PeerId) -> bool {
        self.peer == *peer
    }
}

/// Every known item of some of a peer's media kinds was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedMediaAllRemoved {
    pub peer: PeerId,
    pub types: MediaTypes,
}

impl KeyedEvent for SharedMediaAllRemoved {
    type Key = PeerId;

    fn concerns(&self, peer: &PeerId) -> bool {
        self.peer == *peer
    }
}
