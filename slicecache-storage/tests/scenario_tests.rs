//! End-to-end scenarios through the storage facade.
//!
//! Each scenario checks both the query answer and the exact events observed
//! by subscribers.

use slicecache_storage::{
    Anchor, MediaKind, MediaTypes, MsgId, PhotoId, SharedMediaAddExisting, SharedMediaAddNew,
    SharedMediaAddSlice, SharedMediaQuery, SharedMediaRemoveAll, SharedMediaRemoveOne,
    SliceChange, SliceQuery, Storage, SubscriptionError, UserPhotosAddNew, UserPhotosAddSlice,
    UserPhotosQuery, UserPhotosRemoveAfter,
};
use slicecache_test_utils::assertions;
use slicecache_test_utils::fixtures::{
    msg_ids, photo_ids, photo_key, small_config, top_slice, user_key, PEER, USER,
};
use tokio_stream::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Route cache logs to the test writer; `RUST_LOG=slicecache_storage=debug`
/// shows publishes and merges.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn newest(limit: usize) -> SharedMediaQuery {
    SharedMediaQuery {
        key: photo_key(),
        query: SliceQuery::newest(limit),
    }
}

fn storage_with_top_slice() -> Storage {
    init_tracing();
    let mut storage = Storage::default();
    assertions::assert_ok(&storage.shared_media_add_slice(SharedMediaAddSlice {
        peer: PEER,
        kind: MediaKind::Photo,
        slice: top_slice(),
    }));
    storage
}

#[test]
fn test_top_slice_answers_newest() {
    let storage = storage_with_top_slice();
    let result = storage.shared_media_query(&newest(5));
    assert_eq!(result.ids, msg_ids(&[30, 20, 10]));
    assert!(result.top_touched);
    assert!(!result.bottom_touched);
    assert!(!result.complete);
    assertions::assert_newest_first(&result);
}

#[test]
fn test_add_new_extends_loaded_top() {
    let mut storage = storage_with_top_slice();
    let mut updates = storage.shared_media_slice_updated();
    storage
        .shared_media_add_new(SharedMediaAddNew {
            peer: PEER,
            types: MediaTypes::PHOTO,
            msg_id: MsgId(40),
        })
        .unwrap();

    let result = storage.shared_media_query(&newest(1));
    assert_eq!(result.ids, msg_ids(&[40]));
    assert!(result.top_touched);
    assert_eq!(updates.drain().unwrap().len(), 1);
}

#[test]
fn test_remove_one_publishes_single_event() {
    let mut storage = storage_with_top_slice();
    storage
        .shared_media_add_new(SharedMediaAddNew {
            peer: PEER,
            types: MediaTypes::PHOTO,
            msg_id: MsgId(40),
        })
        .unwrap();
    let mut removed = storage.shared_media_one_removed();
    let mut updates = storage.shared_media_slice_updated();

    storage.shared_media_remove_one(SharedMediaRemoveOne {
        peer: PEER,
        types: MediaTypes::PHOTO,
        msg_id: MsgId(20),
    });

    let result = storage.shared_media_query(&newest(10));
    assert_eq!(result.ids, msg_ids(&[40, 30, 10]));

    let events = removed.drain().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].msg_id, MsgId(20));
    assert_eq!(events[0].peer, PEER);
    assert_eq!(updates.try_next(), Ok(None));
}

#[test]
fn test_remove_all_clears_and_publishes_once() {
    let mut storage = storage_with_top_slice();
    let mut cleared = storage.shared_media_all_removed();

    storage.shared_media_remove_all(SharedMediaRemoveAll::new(PEER));

    let result = storage.shared_media_query(&newest(10));
    assert!(result.ids.is_empty());
    assert!(!result.top_touched);
    assert!(!result.bottom_touched);
    assert_eq!(result.fetch[0].anchor, Anchor::Newest);

    let ledger = storage
        .shared_media()
        .inner()
        .ledger(&photo_key())
        .expect("ledger kept after clear");
    assert!(!ledger.fully_loaded_top());
    assert!(!ledger.fully_loaded_bottom());

    assert_eq!(cleared.drain().unwrap().len(), 1);
}

#[test]
fn test_rejected_add_new_changes_nothing() {
    let mut storage = storage_with_top_slice();
    let mut updates = storage.shared_media_slice_updated();
    let result = storage.shared_media_add_new(SharedMediaAddNew {
        peer: PEER,
        types: MediaTypes::PHOTO,
        msg_id: MsgId(15),
    });
    assertions::assert_non_monotonic(&result);
    assert_eq!(
        storage.shared_media_query(&newest(10)).ids,
        msg_ids(&[30, 20, 10])
    );
    assert_eq!(updates.try_next(), Ok(None));
}

#[test]
fn test_sentinel_ids_are_refused_everywhere() {
    let mut storage = storage_with_top_slice();
    let mut updates = storage.shared_media_slice_updated();
    assertions::assert_sentinel(&storage.shared_media_add_new(SharedMediaAddNew {
        peer: PEER,
        types: MediaTypes::PHOTO,
        msg_id: MsgId(i64::MAX),
    }));
    assertions::assert_sentinel(&storage.shared_media_add_existing(SharedMediaAddExisting {
        peer: PEER,
        types: MediaTypes::PHOTO | MediaTypes::FILE,
        msg_id: MsgId(i64::MIN),
    }));
    assertions::assert_sentinel(&storage.user_photos_add_slice(UserPhotosAddSlice {
        user: USER,
        slice: slicecache_storage::Slice::new(photo_ids(&[1, i64::MAX])).with_top(),
    }));

    let result = storage.shared_media_query(&newest(10));
    assert_eq!(result.ids, msg_ids(&[30, 20, 10]));
    assert!(!result.bottom_touched);
    assert_eq!(updates.try_next(), Ok(None));
}

#[test]
fn test_user_photos_lifecycle() {
    let mut storage = Storage::default();
    let mut updates = storage.user_photos_slice_updated_for(USER);
    assertions::assert_ok(&storage.user_photos_add_slice(UserPhotosAddSlice {
        user: USER,
        slice: slicecache_storage::Slice::new(photo_ids(&[100, 200, 300]))
            .with_top()
            .with_bottom(),
    }));
    storage
        .user_photos_add_new(UserPhotosAddNew {
            user: USER,
            photo_id: PhotoId(400),
        })
        .unwrap();
    storage.user_photos_remove_after(UserPhotosRemoveAfter {
        user: USER,
        photo_id: PhotoId(300),
    });

    let query = UserPhotosQuery {
        key: user_key(),
        query: SliceQuery::oldest(10),
    };
    let result = storage.user_photos_query(&query);
    assert_eq!(result.ids, photo_ids(&[200, 100]));
    assert!(result.bottom_touched);

    let events = updates.drain().unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[2].change, SliceChange::Truncated(PhotoId(300)));
}

#[test]
fn test_lagging_subscriber_must_requery() {
    init_tracing();
    let mut storage = Storage::new(small_config()).unwrap();
    let mut updates = storage.shared_media_slice_updated();
    for id in 0..10 {
        assertions::assert_ok(&storage.shared_media_add_slice(SharedMediaAddSlice {
            peer: PEER,
            kind: MediaKind::Photo,
            slice: slicecache_storage::Slice::new(msg_ids(&[id * 10])),
        }));
    }
    assert!(matches!(updates.try_next(), Err(SubscriptionError::Lagged(_))));
    assert!(updates.try_next().unwrap().is_some());
}

#[test]
fn test_query_with_callback() {
    let storage = storage_with_top_slice();
    let mut calls = 0;
    let len = storage.shared_media_query_with(&newest(2), |result| {
        calls += 1;
        result.ids.len()
    });
    assert_eq!(len, 2);
    assert_eq!(calls, 1);
}

#[tokio::test]
async fn test_update_stream_follows_mutation_order() {
    let mut storage = Storage::default();
    let stream = storage.shared_media().slice_updated_for(photo_key()).into_stream();

    for id in [5, 1, 3] {
        assertions::assert_ok(&storage.shared_media_add_slice(SharedMediaAddSlice {
            peer: PEER,
            kind: MediaKind::Photo,
            slice: slicecache_storage::Slice::new(msg_ids(&[id])),
        }));
    }
    assertions::assert_ok(&storage.shared_media_add_slice(SharedMediaAddSlice {
        peer: PEER,
        kind: MediaKind::Video,
        slice: slicecache_storage::Slice::new(msg_ids(&[9])),
    }));
    drop(storage);

    let changes: Vec<_> = stream
        .map(|event| event.map(|update| update.change))
        .collect()
        .await;
    assert_eq!(changes.len(), 3);
    for change in changes {
        assert!(matches!(change, Ok(SliceChange::Merged(_))));
    }
}
