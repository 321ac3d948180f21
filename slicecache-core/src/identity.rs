//! Identity types for slice cache entries and their owners

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// An identifier that can live inside a slice ledger.
///
/// Identifiers are totally ordered; a higher value is a more recent item.
/// `MIN` and `MAX` are sentinels for the true bottom and top of a sequence
/// and are never stored as real items.
pub trait SliceId: Copy + Ord + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Sentinel below every real identifier.
    const MIN: Self;
    /// Sentinel above every real identifier.
    const MAX: Self;

    /// The next representable identifier, if any.
    fn successor(self) -> Option<Self>;

    /// The previous representable identifier, if any.
    fn predecessor(self) -> Option<Self>;

    /// True if no representable identifier lies strictly between `self` and `other`.
    fn abuts(self, other: Self) -> bool {
        self.successor() == Some(other)
    }

    /// True for `MIN` and `MAX`, which can never be stored.
    fn is_sentinel(self) -> bool {
        self == Self::MIN || self == Self::MAX
    }
}

macro_rules! slice_id_type {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Raw integer value.
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl SliceId for $name {
            const MIN: Self = Self(i64::MIN);
            const MAX: Self = Self(i64::MAX);

            fn successor(self) -> Option<Self> {
                self.0.checked_add(1).map(Self)
            }

            fn predecessor(self) -> Option<Self> {
                self.0.checked_sub(1).map(Self)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "#{}"), self.0)
            }
        }
    };
}

slice_id_type!(
    /// Message identifier inside one conversation.
    MsgId,
    "msg"
);

slice_id_type!(
    /// Photo identifier inside one user's photo history.
    PhotoId,
    "photo"
);

/// Conversation (peer) identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// User identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}
