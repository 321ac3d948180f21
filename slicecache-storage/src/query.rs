//! Query engine: paginated windows around an anchor.
//!
//! Results are in display order, newest first. `limit_before` counts items
//! newer than the anchor position; `limit_after` counts items from the anchor
//! position (inclusive) going older. An `Id` anchor that is not itself known
//! resolves to the nearest older item.
//!
//! Queries never wait. When the ledger cannot fully answer, the result is
//! the best partial window plus the [`FetchRequest`]s a loader would need.

use serde::{Deserialize, Serialize};
use slicecache_core::{Anchor, Direction, FetchRequest, SliceId};

use crate::ledger::{Chunk, SliceLedger};

/// A paginated request against one ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceQuery<I> {
    pub anchor: Anchor<I>,
    pub limit_before: usize,
    pub limit_after: usize,
}

impl<I: SliceId> SliceQuery<I> {
    pub fn new(anchor: Anchor<I>, limit_before: usize, limit_after: usize) -> Self {
        Self {
            anchor,
            limit_before,
            limit_after,
        }
    }

    /// Up to `limit` items starting at the newest.
    pub fn newest(limit: usize) -> Self {
        Self::new(Anchor::Newest, 0, limit)
    }

    /// Up to `limit` items ending at the oldest.
    pub fn oldest(limit: usize) -> Self {
        Self::new(Anchor::Oldest, limit.saturating_sub(1), limit.min(1))
    }

    pub fn around(id: I, limit_before: usize, limit_after: usize) -> Self {
        Self::new(Anchor::Id(id), limit_before, limit_after)
    }
}

/// Outcome of a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResult<I> {
    /// Returned identifiers, newest first.
    pub ids: Vec<I>,
    /// The window starts at the true newest item.
    pub top_touched: bool,
    /// The window ends at the true oldest item.
    pub bottom_touched: bool,
    /// Both sides of the window were satisfied from known data.
    pub complete: bool,
    /// Items known to exist newer than the window, when derivable.
    pub skipped_before: Option<usize>,
    /// Items known to exist older than the window, when derivable.
    pub skipped_after: Option<usize>,
    /// Total size of the sequence, when known.
    pub count: Option<usize>,
    /// What a loader must fetch to complete this window.
    pub fetch: Vec<FetchRequest<I>>,
}

impl<I: SliceId> QueryResult<I> {
    fn unresolved(count: Option<usize>, fetch: FetchRequest<I>) -> Self {
        Self {
            ids: Vec::new(),
            top_touched: false,
            bottom_touched: false,
            complete: false,
            skipped_before: None,
            skipped_after: None,
            count,
            fetch: vec![fetch],
        }
    }

    /// Query for the page of newer items adjacent to this result.
    pub fn newer_page(&self, limit: usize) -> Option<SliceQuery<I>> {
        if self.top_touched {
            return None;
        }
        self.ids
            .first()
            .map(|&newest| SliceQuery::new(Anchor::Id(newest), limit, 0))
    }

    /// Query for the page of older items adjacent to this result.
    pub fn older_page(&self, limit: usize) -> Option<SliceQuery<I>> {
        if self.bottom_touched {
            return None;
        }
        self.ids
            .last()
            .and_then(|&oldest| oldest_below(oldest))
            .map(|below| SliceQuery::new(Anchor::Id(below), 0, limit))
    }
}

fn oldest_below<I: SliceId>(id: I) -> Option<I> {
    id.predecessor().filter(|prev| *prev != I::MIN)
}

/// Whether a window is answerable from known data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Coverage<I> {
    Full,
    Partial { fetch: Vec<FetchRequest<I>> },
}

impl<I> Coverage<I> {
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}

/// A window resolved inside one chunk.
struct Window<'a, I> {
    chunk: &'a Chunk<I>,
    /// Bounds in newest-first order.
    start: usize,
    end: usize,
    newer_missing: usize,
    older_missing: usize,
}

impl<'a, I: SliceId> Window<'a, I> {
    fn resolve(chunk: &'a Chunk<I>, anchor: Anchor<I>, before: usize, after: usize) -> Self {
        let len = chunk.ids.len();
        let position = match anchor {
            Anchor::Newest => 0,
            Anchor::Oldest => len.saturating_sub(1),
            Anchor::Id(id) => len - chunk.ids.partition_point(|known| *known <= id),
        };
        let start = position.saturating_sub(before);
        let end = position.saturating_add(after).min(len);

        let newer_missing = if chunk.range.reaches_top() {
            0
        } else {
            before.saturating_sub(position)
        };
        let older_missing = if chunk.range.reaches_bottom() {
            0
        } else {
            after.saturating_sub(len - position)
        };

        Self {
            chunk,
            start,
            end,
            newer_missing,
            older_missing,
        }
    }

    fn fetch(&self) -> Vec<FetchRequest<I>> {
        let mut fetch = Vec::new();
        if self.newer_missing > 0 {
            fetch.push(FetchRequest {
                anchor: Anchor::Id(self.chunk.range.till),
                direction: Direction::Newer,
                limit: self.newer_missing,
            });
        }
        if self.older_missing > 0 {
            fetch.push(FetchRequest {
                anchor: Anchor::Id(self.chunk.range.from),
                direction: Direction::Older,
                limit: self.older_missing,
            });
        }
        fetch
    }

    fn into_result(self, count: Option<usize>) -> QueryResult<I> {
        let len = self.chunk.ids.len();
        let range = self.chunk.range;
        let ids: Vec<I> = self.chunk.ids[len - self.end..len - self.start]
            .iter()
            .rev()
            .copied()
            .collect();
        let returned = ids.len();

        let skipped_before = if range.reaches_top() {
            Some(self.start)
        } else if range.reaches_bottom() {
            count.and_then(|c| c.checked_sub(len - self.start))
        } else {
            None
        };
        let skipped_after = if range.reaches_bottom() {
            Some(len - self.end)
        } else if range.reaches_top() {
            count.and_then(|c| c.checked_sub(self.start + returned))
        } else {
            None
        };

        let fetch = self.fetch();
        QueryResult {
            ids,
            top_touched: self.start == 0 && range.reaches_top(),
            bottom_touched: self.end == len && range.reaches_bottom(),
            complete: fetch.is_empty(),
            skipped_before,
            skipped_after,
            count,
            fetch,
        }
    }
}

impl<I: SliceId> SliceLedger<I> {
    /// Chunk an anchor resolves into, or the request needed to find one.
    fn anchor_chunk(
        &self,
        anchor: Anchor<I>,
        before: usize,
        after: usize,
    ) -> Result<&Chunk<I>, FetchRequest<I>> {
        match anchor {
            Anchor::Newest => self
                .chunks
                .last()
                .filter(|chunk| chunk.range.reaches_top())
                .ok_or(FetchRequest {
                    anchor: Anchor::Newest,
                    direction: Direction::Older,
                    limit: after.max(1),
                }),
            Anchor::Oldest => self
                .chunks
                .first()
                .filter(|chunk| chunk.range.reaches_bottom())
                .ok_or(FetchRequest {
                    anchor: Anchor::Oldest,
                    direction: Direction::Newer,
                    limit: before.saturating_add(1),
                }),
            Anchor::Id(id) => self
                .chunk_index(id)
                .map(|index| &self.chunks[index])
                .ok_or(FetchRequest {
                    anchor,
                    direction: Direction::Around,
                    limit: before.saturating_add(after).max(1),
                }),
        }
    }

    /// Whether the window around `anchor` is fully known.
    pub fn coverage(&self, anchor: Anchor<I>, before: usize, after: usize) -> Coverage<I> {
        let fetch = match self.anchor_chunk(anchor, before, after) {
            Ok(chunk) => Window::resolve(chunk, anchor, before, after).fetch(),
            Err(request) => vec![request],
        };
        if fetch.is_empty() {
            Coverage::Full
        } else {
            Coverage::Partial { fetch }
        }
    }

    /// Answer a query from known data.
    pub fn query(&self, query: &SliceQuery<I>) -> QueryResult<I> {
        match self.anchor_chunk(query.anchor, query.limit_before, query.limit_after) {
            Ok(chunk) => Window::resolve(chunk, query.anchor, query.limit_before, query.limit_after)
                .into_result(self.count),
            Err(request) => QueryResult::unresolved(self.count, request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Slice;
    use proptest::prelude::*;
    use slicecache_core::{IdRange, MsgId};

    fn ids(raw: &[i64]) -> Vec<MsgId> {
        raw.iter().copied().map(MsgId).collect()
    }

    fn raw(result: &QueryResult<MsgId>) -> Vec<i64> {
        result.ids.iter().map(|id| id.get()).collect()
    }

    fn loaded(raw_ids: &[i64]) -> SliceLedger<MsgId> {
        let mut ledger = SliceLedger::new();
        ledger.add_slice(Slice::new(ids(raw_ids)).with_top().with_bottom()).unwrap();
        ledger
    }

    #[test]
    fn test_newest_window() {
        let mut ledger = SliceLedger::new();
        ledger.add_slice(Slice::new(ids(&[10, 20, 30])).with_top()).unwrap();
        let result = ledger.query(&SliceQuery::newest(5));
        assert_eq!(raw(&result), vec![30, 20, 10]);
        assert!(result.top_touched);
        assert!(!result.bottom_touched);
        assert!(!result.complete);
        assert_eq!(
            result.fetch,
            vec![FetchRequest {
                anchor: Anchor::Id(MsgId(10)),
                direction: Direction::Older,
                limit: 2,
            }]
        );
    }

    #[test]
    fn test_newest_requires_loaded_top() {
        let mut ledger = SliceLedger::new();
        ledger.add_slice(Slice::new(ids(&[10, 20, 30]))).unwrap();
        let result = ledger.query(&SliceQuery::newest(5));
        assert!(result.ids.is_empty());
        assert!(!result.complete);
        assert_eq!(result.fetch[0].anchor, Anchor::Newest);
    }

    #[test]
    fn test_oldest_window() {
        let ledger = loaded(&[1, 2, 3, 4, 5]);
        let result = ledger.query(&SliceQuery::oldest(3));
        assert_eq!(raw(&result), vec![3, 2, 1]);
        assert!(result.bottom_touched);
        assert!(!result.top_touched);
        assert!(result.complete);
        assert_eq!(result.skipped_before, Some(2));
        assert_eq!(result.skipped_after, Some(0));
    }

    #[test]
    fn test_window_around_id() {
        let ledger = loaded(&[10, 20, 30, 40, 50, 60]);
        let result = ledger.query(&SliceQuery::around(MsgId(40), 2, 2));
        assert_eq!(raw(&result), vec![60, 50, 40, 30]);
        assert!(result.top_touched);
        assert!(!result.bottom_touched);
        assert!(result.complete);
        assert_eq!(result.skipped_before, Some(0));
        assert_eq!(result.skipped_after, Some(2));
        assert_eq!(result.count, Some(6));
    }

    #[test]
    fn test_missing_anchor_resolves_to_older_item() {
        let ledger = loaded(&[10, 20, 30]);
        let result = ledger.query(&SliceQuery::around(MsgId(25), 0, 1));
        assert_eq!(raw(&result), vec![20]);
    }

    #[test]
    fn test_anchor_in_unknown_gap() {
        let mut ledger = SliceLedger::new();
        ledger.add_slice(Slice::new(ids(&[1, 2]))).unwrap();
        ledger.add_slice(Slice::new(ids(&[10, 11]))).unwrap();
        let result = ledger.query(&SliceQuery::around(MsgId(5), 3, 3));
        assert!(result.ids.is_empty());
        assert_eq!(result.fetch[0].direction, Direction::Around);
        assert_eq!(result.fetch[0].limit, 6);
    }

    #[test]
    fn test_fewer_at_boundary_is_complete() {
        let ledger = loaded(&[1, 2]);
        let result = ledger.query(&SliceQuery::newest(10));
        assert_eq!(raw(&result), vec![2, 1]);
        assert!(result.complete);
        assert!(result.top_touched && result.bottom_touched);
    }

    #[test]
    fn test_skips_from_count_without_bottom() {
        let mut ledger = SliceLedger::new();
        ledger
            .add_slice(Slice::new(ids(&[50, 60, 70])).with_top().with_count(10))
            .unwrap();
        let result = ledger.query(&SliceQuery::newest(2));
        assert_eq!(result.skipped_before, Some(0));
        assert_eq!(result.skipped_after, Some(8));
    }

    #[test]
    fn test_empty_known_sequence() {
        let mut ledger = SliceLedger::<MsgId>::new();
        ledger.add_slice(Slice::new(vec![]).with_range(IdRange::full())).unwrap();
        let result = ledger.query(&SliceQuery::newest(5));
        assert!(result.ids.is_empty());
        assert!(result.complete);
        assert!(result.top_touched && result.bottom_touched);
    }

    #[test]
    fn test_pagination_helpers() {
        let mut ledger = SliceLedger::new();
        ledger.add_slice(Slice::new(ids(&[10, 20, 30, 40])).with_top()).unwrap();
        let first = ledger.query(&SliceQuery::newest(2));
        assert!(first.newer_page(5).is_none());
        let next = first.older_page(2).expect("older page available");
        let second = ledger.query(&next);
        assert_eq!(raw(&second), vec![20, 10]);
    }

    #[test]
    fn test_coverage_matches_query() {
        let mut ledger = SliceLedger::new();
        ledger.add_slice(Slice::new(ids(&[10, 20, 30])).with_top()).unwrap();
        assert!(ledger.coverage(Anchor::Newest, 0, 3).is_full());
        assert!(!ledger.coverage(Anchor::Newest, 0, 4).is_full());
        assert!(!ledger.coverage(Anchor::Oldest, 0, 1).is_full());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Results are strictly descending and never exceed the requested size.
        #[test]
        fn prop_window_shape(
            raw_ids in proptest::collection::vec(-100i64..100, 0..30),
            anchor in -120i64..120,
            before in 0usize..10,
            after in 0usize..10,
        ) {
            let ledger = loaded(&raw_ids);
            let result = ledger.query(&SliceQuery::around(MsgId(anchor), before, after));
            prop_assert!(result.ids.windows(2).all(|w| w[0] > w[1]));
            prop_assert!(result.ids.len() <= before + after);
            prop_assert!(result.complete);
        }

        /// Coverage and query agree, and repeated reads are identical.
        #[test]
        fn prop_coverage_deterministic(
            raw_ids in proptest::collection::vec(-100i64..100, 1..30),
            top in any::<bool>(),
            anchor in -120i64..120,
            before in 0usize..10,
            after in 0usize..10,
        ) {
            let mut ledger = SliceLedger::new();
            let mut slice = Slice::new(ids(&raw_ids));
            slice.covers_top = top;
            ledger.add_slice(slice).unwrap();

            let query = SliceQuery::around(MsgId(anchor), before, after);
            let first = ledger.coverage(query.anchor, before, after);
            let _ = ledger.query(&SliceQuery::newest(3));
            let second = ledger.coverage(query.anchor, before, after);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.is_full(), ledger.query(&query).complete);
        }
    }
}
