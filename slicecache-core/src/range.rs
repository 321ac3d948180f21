//! Identifier ranges, query anchors and fetch requests.

use serde::{Deserialize, Serialize};

use crate::identity::SliceId;

/// Closed interval `[from, till]` of identifier space.
///
/// A range attached to known data asserts that every identifier that exists
/// inside it is known. `till == I::MAX` reaches the true top of the sequence,
/// `from == I::MIN` the true bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdRange<I> {
    pub from: I,
    pub till: I,
}

impl<I: SliceId> IdRange<I> {
    /// Create a range, swapping the bounds if given in reverse.
    pub fn new(from: I, till: I) -> Self {
        if from <= till {
            Self { from, till }
        } else {
            Self {
                from: till,
                till: from,
            }
        }
    }

    /// Range holding a single identifier.
    pub fn point(id: I) -> Self {
        Self { from: id, till: id }
    }

    /// The whole identifier space.
    pub fn full() -> Self {
        Self {
            from: I::MIN,
            till: I::MAX,
        }
    }

    pub fn contains(&self, id: I) -> bool {
        self.from <= id && id <= self.till
    }

    pub fn reaches_top(&self) -> bool {
        self.till == I::MAX
    }

    pub fn reaches_bottom(&self) -> bool {
        self.from == I::MIN
    }

    /// True if the two ranges overlap or leave no representable gap between them.
    pub fn touches(&self, other: &Self) -> bool {
        let overlaps = self.from <= other.till && other.from <= self.till;
        overlaps || self.till.abuts(other.from) || other.till.abuts(self.from)
    }

    /// Smallest range covering both.
    pub fn hull(&self, other: &Self) -> Self {
        Self {
            from: self.from.min(other.from),
            till: self.till.max(other.till),
        }
    }
}

/// Position a paginated query is centered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Anchor<I> {
    /// A concrete identifier (or the nearest older one when it does not exist).
    Id(I),
    /// The most recent item of the whole sequence.
    Newest,
    /// The oldest item of the whole sequence.
    Oldest,
}

/// Which side of an anchor a loader must fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Items more recent than the anchor.
    Newer,
    /// Items older than the anchor.
    Older,
    /// Both sides; the anchor itself lies in unknown territory.
    Around,
}

/// What the backing store must load for a query to become complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchRequest<I> {
    pub anchor: Anchor<I>,
    pub direction: Direction,
    /// Number of items still missing on that side.
    pub limit: usize,
}
