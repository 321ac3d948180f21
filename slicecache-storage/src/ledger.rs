//! Slice ledger: the accumulated knowledge of one key's ordered sequence.
//!
//! A ledger is a list of disjoint chunks in ascending order. Each chunk pairs
//! an [`IdRange`] with the identifiers known to exist inside it, and asserts
//! that no other identifier exists in that range. Gaps between chunks are
//! unknown territory. The top of the sequence is fully loaded when the last
//! chunk's range reaches `I::MAX`; the bottom when the first chunk's range
//! reaches `I::MIN`.
//!
//! Merges are ordered by identifier value only, so slices may arrive in any
//! order, overlap, or repeat without changing the outcome.

use serde::{Deserialize, Serialize};
use slicecache_core::{IdRange, SliceId};

/// A contiguous run of known identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk<I> {
    pub(crate) range: IdRange<I>,
    pub(crate) ids: Vec<I>,
}

impl<I: SliceId> Chunk<I> {
    /// The span over which this chunk's knowledge is complete.
    pub fn range(&self) -> IdRange<I> {
        self.range
    }

    /// Known identifiers, strictly increasing.
    pub fn ids(&self) -> &[I] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// A batch of identifiers delivered by the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slice<I> {
    /// Identifiers in the batch; sorted and deduplicated on merge.
    pub ids: Vec<I>,
    /// Nothing newer than this batch exists.
    pub covers_top: bool,
    /// Nothing older than this batch exists.
    pub covers_bottom: bool,
    /// Explicit span the batch is complete over, when wider than its ids.
    pub range: Option<IdRange<I>>,
    /// Total size of the whole sequence, when the backing store reports it.
    pub count: Option<usize>,
}

impl<I: SliceId> Slice<I> {
    pub fn new(ids: Vec<I>) -> Self {
        Self {
            ids,
            covers_top: false,
            covers_bottom: false,
            range: None,
            count: None,
        }
    }

    pub fn with_top(mut self) -> Self {
        self.covers_top = true;
        self
    }

    pub fn with_bottom(mut self) -> Self {
        self.covers_bottom = true;
        self
    }

    pub fn with_range(mut self, range: IdRange<I>) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// The first boundary sentinel among the ids, if any.
    pub fn sentinel(&self) -> Option<I> {
        self.ids.iter().copied().find(|id| id.is_sentinel())
    }

    /// Range this slice is complete over, given its (sorted) ids.
    fn effective_range(&self, sorted: &[I]) -> Option<IdRange<I>> {
        let from_ids = match (sorted.first(), sorted.last()) {
            (Some(&first), Some(&last)) => Some(IdRange::new(first, last)),
            _ => None,
        };
        let mut range = match (from_ids, self.range) {
            (Some(a), Some(b)) => a.hull(&b),
            (Some(a), None) => a,
            (None, Some(b)) => b,
            (None, None) if self.covers_top && self.covers_bottom => IdRange::full(),
            (None, None) => return None,
        };
        if self.covers_top {
            range.till = I::MAX;
        }
        if self.covers_bottom {
            range.from = I::MIN;
        }
        Some(range)
    }
}

/// What a mutation changed in a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SliceChange<I> {
    /// The chunk now covering this region, replacing whatever was known there.
    Merged(Chunk<I>),
    /// A single identifier was removed.
    Removed(I),
    /// Everything from this identifier upward was dropped.
    Truncated(I),
    /// Only the reported total count changed.
    Counted,
}

/// A mutation the ledger refused. Nothing was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected<I> {
    /// `add_new` with an identifier below the known top.
    NotNewer { id: I, top: I },
    /// `MIN` or `MAX` offered as a real identifier.
    Sentinel(I),
}

fn check_id<I: SliceId>(id: I) -> Result<(), Rejected<I>> {
    if id.is_sentinel() {
        Err(Rejected::Sentinel(id))
    } else {
        Ok(())
    }
}

/// Best current knowledge of one key's ordered identifier sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceLedger<I> {
    pub(crate) chunks: Vec<Chunk<I>>,
    pub(crate) count: Option<usize>,
}

impl<I: SliceId> Default for SliceLedger<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: SliceId> SliceLedger<I> {
    /// Create an empty ledger: nothing known, neither end loaded.
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            count: None,
        }
    }

    pub fn chunks(&self) -> &[Chunk<I>] {
        &self.chunks
    }

    /// Total size of the true sequence, if known.
    pub fn count(&self) -> Option<usize> {
        self.count
    }

    /// True when nothing at all is known.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Number of known identifiers.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }

    pub fn fully_loaded_top(&self) -> bool {
        self.chunks
            .last()
            .is_some_and(|chunk| chunk.range.reaches_top())
    }

    pub fn fully_loaded_bottom(&self) -> bool {
        self.chunks
            .first()
            .is_some_and(|chunk| chunk.range.reaches_bottom())
    }

    /// All known identifiers in ascending order.
    pub fn known_ids(&self) -> impl Iterator<Item = I> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.ids.iter().copied())
    }

    /// Largest known identifier.
    pub fn top_id(&self) -> Option<I> {
        self.chunks.iter().rev().find_map(|chunk| chunk.ids.last().copied())
    }

    /// Index of the chunk whose range contains `id`.
    pub(crate) fn chunk_index(&self, id: I) -> Option<usize> {
        let index = self.chunks.partition_point(|chunk| chunk.range.till < id);
        self.chunks
            .get(index)
            .filter(|chunk| chunk.range.contains(id))
            .map(|_| index)
    }

    pub fn contains(&self, id: I) -> bool {
        self.chunk_index(id)
            .is_some_and(|index| self.chunks[index].ids.binary_search(&id).is_ok())
    }

    /// Merge a backing-store slice.
    ///
    /// Every chunk overlapping or abutting the slice's range is spliced with
    /// it into one chunk. Known identifiers are never dropped. A slice that
    /// carries a sentinel id is refused whole.
    pub fn add_slice(
        &mut self,
        mut slice: Slice<I>,
    ) -> Result<Option<SliceChange<I>>, Rejected<I>> {
        if let Some(id) = slice.sentinel() {
            return Err(Rejected::Sentinel(id));
        }
        let mut ids = std::mem::take(&mut slice.ids);
        ids.sort_unstable();
        ids.dedup();

        let count_before = self.count;
        if let Some(count) = slice.count {
            self.count = Some(count);
        }

        let merged = match slice.effective_range(&ids) {
            Some(range) => self.splice(range, ids),
            None => None,
        };
        self.normalize_count();

        Ok(match merged {
            Some(chunk) => Some(SliceChange::Merged(chunk)),
            None if self.count != count_before => Some(SliceChange::Counted),
            None => None,
        })
    }

    /// Insert an identifier found by indirect means.
    ///
    /// It joins a chunk whose range contains or abuts it; otherwise it is
    /// kept as an isolated point that claims nothing about its neighbors.
    pub fn add_existing(&mut self, id: I) -> Result<Option<SliceChange<I>>, Rejected<I>> {
        check_id(id)?;
        if self.contains(id) {
            return Ok(None);
        }
        let change = self
            .splice(IdRange::point(id), vec![id])
            .map(SliceChange::Merged);
        self.normalize_count();
        Ok(change)
    }

    /// Insert a freshly created identifier, newer than everything known.
    ///
    /// With a loaded top it extends the top chunk; otherwise it is recorded
    /// as an isolated point and the top stays unloaded.
    pub fn add_new(&mut self, id: I) -> Result<Option<SliceChange<I>>, Rejected<I>> {
        check_id(id)?;
        if self.contains(id) {
            return Ok(None);
        }
        if let Some(top) = self.top_id() {
            if id < top {
                return Err(Rejected::NotNewer { id, top });
            }
        }

        let range = if self.fully_loaded_top() {
            IdRange::new(id, I::MAX)
        } else {
            IdRange::point(id)
        };
        if let Some(count) = self.count.as_mut() {
            *count += 1;
        }
        let change = self.splice(range, vec![id]).map(SliceChange::Merged);
        self.normalize_count();
        Ok(change)
    }

    /// Remove one identifier; ranges are untouched.
    pub fn remove_one(&mut self, id: I) -> Option<SliceChange<I>> {
        let index = self.chunk_index(id)?;
        let chunk = &mut self.chunks[index];
        let position = chunk.ids.binary_search(&id).ok()?;
        chunk.ids.remove(position);
        if let Some(count) = self.count.as_mut() {
            *count = count.saturating_sub(1);
        }
        Some(SliceChange::Removed(id))
    }

    /// Forget everything. Returns true if anything was known.
    pub fn remove_all(&mut self) -> bool {
        let had_data = !self.chunks.is_empty() || self.count.is_some();
        self.chunks.clear();
        self.count = None;
        had_data
    }

    /// Drop `id` and every newer identifier; the top becomes unloaded.
    pub fn remove_after(&mut self, id: I) -> Option<SliceChange<I>> {
        let top_was_loaded = self.fully_loaded_top();
        let count_before = self.count;
        let before = self.chunks.len();
        let mut removed = 0usize;
        let mut range_cut = false;

        let keep = self.chunks.partition_point(|chunk| chunk.range.from < id);
        for chunk in self.chunks.drain(keep..) {
            removed += chunk.ids.len();
        }

        if let Some(last) = self.chunks.last_mut() {
            if last.range.till >= id {
                let cut = last.ids.partition_point(|known| *known < id);
                removed += last.ids.len() - cut;
                last.ids.truncate(cut);
                // `range.from < id`, so a predecessor always exists here.
                if let Some(prev) = id.predecessor() {
                    last.range.till = prev;
                }
                range_cut = true;
            }
        }

        self.count = match self.count {
            Some(count) if top_was_loaded => Some(count.saturating_sub(removed)),
            _ => None,
        };
        let truncated = removed > 0
            || range_cut
            || self.chunks.len() != before
            || self.count != count_before;
        truncated.then_some(SliceChange::Truncated(id))
    }

    /// Splice `range`/`ids` into the chunk list. Returns the resulting chunk
    /// if anything changed.
    fn splice(&mut self, range: IdRange<I>, ids: Vec<I>) -> Option<Chunk<I>> {
        let start = self
            .chunks
            .partition_point(|chunk| chunk.range.till < range.from && !chunk.range.touches(&range));
        let end = self
            .chunks
            .partition_point(|chunk| chunk.range.from <= range.till || chunk.range.touches(&range));

        if end == start + 1 {
            let existing = &self.chunks[start];
            let absorbed = existing.range.hull(&range) == existing.range
                && ids.iter().all(|id| existing.ids.binary_search(id).is_ok());
            if absorbed {
                return None;
            }
        }

        let mut merged_range = range;
        let mut known = Vec::new();
        for chunk in self.chunks.drain(start..end) {
            merged_range = merged_range.hull(&chunk.range);
            known.extend(chunk.ids);
        }

        let chunk = Chunk {
            range: merged_range,
            ids: merge_sorted(known, ids),
        };
        self.chunks.insert(start, chunk.clone());
        Some(chunk)
    }

    /// A single chunk spanning the whole space knows the exact count.
    fn normalize_count(&mut self) {
        if let [only] = self.chunks.as_slice() {
            if only.range == IdRange::full() {
                self.count = Some(only.ids.len());
            }
        }
    }
}

/// Union of two strictly increasing sequences.
fn merge_sorted<I: Ord + Copy>(left: Vec<I>, right: Vec<I>) -> Vec<I> {
    let mut out = Vec::with_capacity(left.len() + right.len());
    let (mut a, mut b) = (left.into_iter().peekable(), right.into_iter().peekable());
    loop {
        let next = match (a.peek(), b.peek()) {
            (Some(x), Some(y)) if x < y => a.next(),
            (Some(x), Some(y)) if x > y => b.next(),
            (Some(_), Some(_)) => {
                b.next();
                a.next()
            }
            (Some(_), None) => a.next(),
            (None, Some(_)) => b.next(),
            (None, None) => break,
        };
        out.extend(next);
    }
    out
}
