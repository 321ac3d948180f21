//! slicecache Storage - Ordered Slice Caches
//!
//! In-memory caches of partially loaded, ordered identifier sequences:
//! message ids per (peer, media kind) and photo ids per user.
//!
//! ## Architecture
//!
//! - [`SliceLedger`]: known chunks of one sequence and its boundary state
//! - Query engine: paginated windows around an anchor, with the fetch
//!   requests needed to complete them
//! - [`Publisher`]: broadcast channels for slice updates and removals
//! - [`SharedMediaCache`] and [`UserPhotosCache`] over a generic
//!   [`OrderedSliceCache`], composed by the [`Storage`] facade
//! - [`SliceFetcher`]: async backing store boundary used by `fill_and_query`
//!
//! All mutation goes through `&mut self`; there are no internal locks.

pub mod events;
pub mod facade;
pub mod fetch;
pub mod ledger;
pub mod ordered;
pub mod publisher;
pub mod query;
pub mod shared_media;
pub mod user_photos;

pub use events::{
    KeyedEvent, SharedMediaAllRemoved, SharedMediaOneRemoved, SharedMediaSliceUpdate,
    SliceUpdate, UserPhotosSliceUpdate,
};
pub use facade::Storage;
pub use fetch::{FetchedSlice, SliceFetcher};
pub use ledger::{Chunk, Rejected, Slice, SliceChange, SliceLedger};
pub use ordered::{CacheKey, CacheStats, OrderedSliceCache};
pub use publisher::{Publisher, Subscription, SubscriptionError};
pub use query::{Coverage, QueryResult, SliceQuery};
pub use shared_media::{
    SharedMediaAddExisting, SharedMediaAddNew, SharedMediaAddSlice, SharedMediaCache,
    SharedMediaQuery, SharedMediaRemoveAll, SharedMediaRemoveOne, SharedMediaResult,
};
pub use user_photos::{
    UserPhotosAddNew, UserPhotosAddSlice, UserPhotosCache, UserPhotosQuery,
    UserPhotosRemoveAfter, UserPhotosRemoveOne, UserPhotosResult,
};

pub use slicecache_core::{
    Anchor, CacheConfig, CacheError, CacheResult, Direction, FetchRequest, IdRange, MediaKind,
    MediaTypes, MsgId, PeerId, PhotoId, SharedMediaKey, SliceId, UserId, UserPhotosKey,
};
