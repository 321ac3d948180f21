//! slicecache Core - Identity, Key and Range Types
//!
//! Plain data types shared by the cache components. No cache logic lives
//! here; see `slicecache-storage` for the ledger, query engine and publisher.

pub mod config;
pub mod error;
pub mod identity;
pub mod media;
pub mod range;

pub use config::CacheConfig;
pub use error::{CacheError, CacheResult, ConfigError, FetchError, LedgerError};
pub use identity::{MsgId, PeerId, PhotoId, SliceId, UserId};
pub use media::{MediaKind, MediaTypes, SharedMediaKey, UserPhotosKey};
pub use range::{Anchor, Direction, FetchRequest, IdRange};
