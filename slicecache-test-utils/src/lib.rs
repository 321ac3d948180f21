//! slicecache Test Utilities
//!
//! Centralized test infrastructure for the slicecache workspace:
//! - A backing store fake answering fetch requests from a known truth
//! - Proptest generators for ids, media kinds, slices and ledger operations
//! - Test fixtures for common scenarios
//! - Custom assertions for ledger and query invariants

pub use slicecache_core::{
    Anchor, CacheConfig, CacheError, CacheResult, Direction, FetchError, FetchRequest, IdRange,
    LedgerError, MediaKind, MediaTypes, MsgId, PeerId, PhotoId, SharedMediaKey, SliceId, UserId,
    UserPhotosKey,
};
pub use slicecache_storage::{
    FetchedSlice, QueryResult, Rejected, Slice, SliceFetcher, SliceLedger, SliceQuery,
};

use async_trait::async_trait;
use slicecache_storage::CacheKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

// ============================================================================
// BACKING STORE FAKE
// ============================================================================

/// Answers fetch requests exactly from a fixed, fully known sequence per key.
///
/// Every returned slice carries the tightest range it is complete over
/// (reaching `MIN`/`MAX` when it exhausts a side) and the true count.
#[derive(Debug)]
pub struct TruthFetcher<K, I> {
    truth: HashMap<K, Vec<I>>,
    calls: AtomicUsize,
    failing: bool,
}

impl<K: CacheKey, I: SliceId> TruthFetcher<K, I> {
    pub fn new() -> Self {
        Self {
            truth: HashMap::new(),
            calls: AtomicUsize::new(0),
            failing: false,
        }
    }

    /// Set the full sequence for `key`.
    pub fn with_sequence(mut self, key: K, mut ids: Vec<I>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        self.truth.insert(key, ids);
        self
    }

    /// Fail every fetch with `FetchError::Failed`.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of fetches served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn sequence(&self, key: &K) -> &[I] {
        self.truth.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The slice a backing store would return for `request`.
    pub fn answer(&self, key: &K, request: FetchRequest<I>) -> Slice<I> {
        let all = self.sequence(key);
        let limit = request.limit.max(1);
        let count = all.len();

        let (ids, from, till) = match request.anchor {
            Anchor::Newest => {
                let taken = &all[count.saturating_sub(limit)..];
                (taken, lower_edge(all, taken), I::MAX)
            }
            Anchor::Oldest => {
                let taken = &all[..limit.min(count)];
                (taken, I::MIN, upper_edge(all, taken))
            }
            Anchor::Id(anchor) => {
                let split = all.partition_point(|id| *id <= anchor);
                match request.direction {
                    Direction::Older => {
                        let older = &all[..all.partition_point(|id| *id < anchor)];
                        let taken = &older[older.len().saturating_sub(limit)..];
                        let till = anchor.predecessor().unwrap_or(I::MIN);
                        (taken, lower_edge(older, taken), till)
                    }
                    Direction::Newer => {
                        let newer = &all[split..];
                        let taken = &newer[..limit.min(newer.len())];
                        let from = anchor.successor().unwrap_or(I::MAX);
                        (taken, from, upper_edge(newer, taken))
                    }
                    Direction::Around => {
                        let older = &all[..split];
                        let newer = &all[split..];
                        let below = &older[older.len().saturating_sub(limit)..];
                        let above = &newer[..limit.min(newer.len())];
                        let from = lower_edge(older, below).min(anchor);
                        let till = upper_edge(newer, above).max(anchor);
                        let start = split - below.len();
                        (&all[start..split + above.len()], from, till)
                    }
                }
            }
        };

        Slice::new(ids.to_vec())
            .with_range(IdRange::new(from, till))
            .with_count(count)
    }
}

impl<K: CacheKey, I: SliceId> Default for TruthFetcher<K, I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowest id a slice taken from the top of `side` is complete down to.
fn lower_edge<I: SliceId>(side: &[I], taken: &[I]) -> I {
    if taken.len() == side.len() {
        I::MIN
    } else {
        taken.first().copied().unwrap_or(I::MIN)
    }
}

/// Highest id a slice taken from the bottom of `side` is complete up to.
fn upper_edge<I: SliceId>(side: &[I], taken: &[I]) -> I {
    if taken.len() == side.len() {
        I::MAX
    } else {
        taken.last().copied().unwrap_or(I::MAX)
    }
}

#[async_trait]
impl<K: CacheKey, I: SliceId> SliceFetcher<K, I> for TruthFetcher<K, I> {
    async fn fetch(&self, key: K, request: FetchRequest<I>) -> CacheResult<FetchedSlice<I>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(FetchError::Failed {
                key: key.to_string(),
                reason: "scripted failure".to_string(),
            }
            .into());
        }
        Ok(self.answer(&key, request))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for slicecache types.

    use super::*;
    use proptest::prelude::*;

    /// A single ledger mutation.
    #[derive(Debug, Clone)]
    pub enum LedgerOp {
        AddNew(MsgId),
        AddExisting(MsgId),
        AddSlice(Slice<MsgId>),
        RemoveOne(MsgId),
    }

    impl LedgerOp {
        /// Apply to a ledger. False when the ledger refused the op.
        pub fn apply(&self, ledger: &mut SliceLedger<MsgId>) -> bool {
            match self {
                LedgerOp::AddNew(id) => ledger.add_new(*id).is_ok(),
                LedgerOp::AddExisting(id) => ledger.add_existing(*id).is_ok(),
                LedgerOp::AddSlice(slice) => ledger.add_slice(slice.clone()).is_ok(),
                LedgerOp::RemoveOne(id) => {
                    ledger.remove_one(*id);
                    true
                }
            }
        }
    }

    /// Message ids from a small space so slices collide often, plus the
    /// sentinels and the real ids next to them.
    pub fn arb_msg_id() -> impl Strategy<Value = MsgId> {
        prop_oneof![
            40 => (-200i64..200).prop_map(MsgId),
            1 => Just(MsgId::MIN),
            1 => Just(MsgId::MAX),
            1 => Just(MsgId(i64::MIN + 1)),
            1 => Just(MsgId(i64::MAX - 1)),
        ]
    }

    pub fn arb_photo_id() -> impl Strategy<Value = PhotoId> {
        (0i64..500).prop_map(PhotoId)
    }

    pub fn arb_peer_id() -> impl Strategy<Value = PeerId> {
        (1u64..8).prop_map(PeerId)
    }

    pub fn arb_media_kind() -> impl Strategy<Value = MediaKind> {
        proptest::sample::select(MediaKind::ALL.to_vec())
    }

    /// Non-empty media kind sets.
    pub fn arb_media_types() -> impl Strategy<Value = MediaTypes> {
        (1u16..(1 << 12)).prop_map(MediaTypes::from_bits_truncate)
    }

    /// A slice with at least one id and arbitrary boundary claims. It may
    /// carry a sentinel, in which case the ledger refuses it.
    pub fn arb_slice() -> impl Strategy<Value = Slice<MsgId>> {
        (
            proptest::collection::vec(arb_msg_id(), 1..16),
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(ids, top, bottom)| {
                let mut slice = Slice::new(ids);
                slice.covers_top = top;
                slice.covers_bottom = bottom;
                slice
            })
    }

    pub fn arb_ledger_op() -> impl Strategy<Value = LedgerOp> {
        prop_oneof![
            1 => arb_msg_id().prop_map(LedgerOp::AddNew),
            2 => arb_msg_id().prop_map(LedgerOp::AddExisting),
            4 => arb_slice().prop_map(LedgerOp::AddSlice),
            1 => arb_msg_id().prop_map(LedgerOp::RemoveOne),
        ]
    }

    /// A fully known sequence of distinct message ids, ascending.
    pub fn arb_truth() -> impl Strategy<Value = Vec<MsgId>> {
        proptest::collection::btree_set(1i64..1000, 0..60)
            .prop_map(|ids| ids.into_iter().map(MsgId).collect())
    }

    pub fn arb_query() -> impl Strategy<Value = SliceQuery<MsgId>> {
        (
            prop_oneof![
                Just(Anchor::Newest),
                Just(Anchor::Oldest),
                (0i64..1001).prop_map(|id| Anchor::Id(MsgId(id))),
            ],
            0usize..12,
            0usize..12,
        )
            .prop_map(|(anchor, before, after)| SliceQuery::new(anchor, before, after))
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;

    pub const PEER: PeerId = PeerId(100);
    pub const USER: UserId = UserId(200);

    /// Small limits so clamping and lagging are easy to trigger.
    pub fn small_config() -> CacheConfig {
        CacheConfig::default()
            .with_event_capacity(4)
            .with_max_query_limit(50)
    }

    pub fn msg_ids(raw: &[i64]) -> Vec<MsgId> {
        raw.iter().copied().map(MsgId).collect()
    }

    pub fn photo_ids(raw: &[i64]) -> Vec<PhotoId> {
        raw.iter().copied().map(PhotoId).collect()
    }

    pub fn photo_key() -> SharedMediaKey {
        SharedMediaKey::new(PEER, MediaKind::Photo)
    }

    pub fn user_key() -> UserPhotosKey {
        UserPhotosKey::new(USER)
    }

    /// `[10, 20, 30]` with the top loaded.
    pub fn top_slice() -> Slice<MsgId> {
        Slice::new(msg_ids(&[10, 20, 30])).with_top()
    }

    /// Ledger holding exactly `ids` with both ends loaded.
    pub fn loaded_ledger(raw: &[i64]) -> SliceLedger<MsgId> {
        let mut ledger = SliceLedger::new();
        ledger
            .add_slice(Slice::new(msg_ids(raw)).with_top().with_bottom())
            .expect("fixture ids are real");
        ledger
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for ledger and query invariants.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &CacheResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_non_monotonic<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::Ledger(LedgerError::NonMonotonicNew { .. })) => {}
            other => panic!("Expected NonMonotonicNew, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_sentinel<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::Ledger(LedgerError::SentinelId { .. })) => {}
            other => panic!("Expected SentinelId, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_fetch_error<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::Fetch(_)) => {}
            other => panic!("Expected Fetch error, got: {:?}", other),
        }
    }

    /// Chunks ascending, disjoint, non-touching; ids strictly increasing
    /// and inside their chunk's range.
    #[track_caller]
    pub fn assert_well_formed<I: SliceId>(ledger: &SliceLedger<I>) {
        for chunk in ledger.chunks() {
            let range = chunk.range();
            assert!(range.from <= range.till, "inverted range {:?}", range);
            assert!(
                chunk.ids().windows(2).all(|w| w[0] < w[1]),
                "ids not strictly increasing: {:?}",
                chunk.ids()
            );
            assert!(
                chunk.ids().iter().all(|id| range.contains(*id)),
                "id outside range {:?}",
                range
            );
        }
        for pair in ledger.chunks().windows(2) {
            let (lower, upper) = (pair[0].range(), pair[1].range());
            assert!(
                lower.till < upper.from && !lower.touches(&upper),
                "chunks {:?} and {:?} should have merged",
                lower,
                upper
            );
        }
    }

    /// Ids strictly descending, as displayed.
    #[track_caller]
    pub fn assert_newest_first<I: SliceId>(result: &QueryResult<I>) {
        assert!(
            result.ids.windows(2).all(|w| w[0] > w[1]),
            "not newest-first: {:?}",
            result.ids
        );
    }
}

// ============================================================================
// TESTS
// ============================================================================
