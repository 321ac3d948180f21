//! Media kinds and cache keys.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identity::{PeerId, UserId};

/// Kind of media a conversation message can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Video,
    PhotoVideo,
    MusicFile,
    File,
    VoiceFile,
    Link,
    ChatPhoto,
    RoundVoiceFile,
    Gif,
    RoundFile,
    Pinned,
}

impl MediaKind {
    /// Every kind, in flag order.
    pub const ALL: [MediaKind; 12] = [
        MediaKind::Photo,
        MediaKind::Video,
        MediaKind::PhotoVideo,
        MediaKind::MusicFile,
        MediaKind::File,
        MediaKind::VoiceFile,
        MediaKind::Link,
        MediaKind::ChatPhoto,
        MediaKind::RoundVoiceFile,
        MediaKind::Gif,
        MediaKind::RoundFile,
        MediaKind::Pinned,
    ];

    /// The single-kind flag set for this kind.
    pub fn flag(self) -> MediaTypes {
        match self {
            MediaKind::Photo => MediaTypes::PHOTO,
            MediaKind::Video => MediaTypes::VIDEO,
            MediaKind::PhotoVideo => MediaTypes::PHOTO_VIDEO,
            MediaKind::MusicFile => MediaTypes::MUSIC_FILE,
            MediaKind::File => MediaTypes::FILE,
            MediaKind::VoiceFile => MediaTypes::VOICE_FILE,
            MediaKind::Link => MediaTypes::LINK,
            MediaKind::ChatPhoto => MediaTypes::CHAT_PHOTO,
            MediaKind::RoundVoiceFile => MediaTypes::ROUND_VOICE_FILE,
            MediaKind::Gif => MediaTypes::GIF,
            MediaKind::RoundFile => MediaTypes::ROUND_FILE,
            MediaKind::Pinned => MediaTypes::PINNED,
        }
    }
}

bitflags! {
    /// Set of media kinds a single message belongs to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MediaTypes: u16 {
        const PHOTO = 1 << 0;
        const VIDEO = 1 << 1;
        const PHOTO_VIDEO = 1 << 2;
        const MUSIC_FILE = 1 << 3;
        const FILE = 1 << 4;
        const VOICE_FILE = 1 << 5;
        const LINK = 1 << 6;
        const CHAT_PHOTO = 1 << 7;
        const ROUND_VOICE_FILE = 1 << 8;
        const GIF = 1 << 9;
        const ROUND_FILE = 1 << 10;
        const PINNED = 1 << 11;
    }
}

impl MediaTypes {
    /// Iterate the individual kinds in this set.
    pub fn kinds(self) -> impl Iterator<Item = MediaKind> {
        MediaKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(kind.flag()))
    }

    pub fn has(self, kind: MediaKind) -> bool {
        self.contains(kind.flag())
    }
}

impl Default for MediaTypes {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<MediaKind> for MediaTypes {
    fn from(kind: MediaKind) -> Self {
        kind.flag()
    }
}

// Serialized as raw bits.
impl Serialize for MediaTypes {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MediaTypes {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u16::deserialize(deserializer)?;
        Self::from_bits(bits).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid MediaTypes bits: {:#06x}", bits))
        })
    }
}

/// Ledger key for one kind of shared media in one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SharedMediaKey {
    pub peer: PeerId,
    pub kind: MediaKind,
}

impl SharedMediaKey {
    pub fn new(peer: PeerId, kind: MediaKind) -> Self {
        Self { peer, kind }
    }
}

impl fmt::Display for SharedMediaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{:?}", self.peer, self.kind)
    }
}

/// Ledger key for one user's photo history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserPhotosKey {
    pub user: UserId,
}

impl UserPhotosKey {
    pub fn new(user: UserId) -> Self {
        Self { user }
    }
}

impl fmt::Display for UserPhotosKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/photos", self.user)
    }
}
