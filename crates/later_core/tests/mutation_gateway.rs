mod common;

use common::{harness, insert_item_behind_cache, note, stored_item_count};
use later_core::{
    ContainerId, CountError, CountOperation, DesyncEvent, ItemId, ItemKind, ItemPayload,
    ModelValidationError,
};
use std::sync::Arc;

#[tokio::test]
async fn create_and_delete_keep_count_in_step() {
    let h = harness();
    let space = h.service.create_container("Inbox", None).await.unwrap();
    assert_eq!(h.service.get_count(space.id).await.unwrap(), 0);

    let mut created = Vec::new();
    for title in ["one", "two", "three"] {
        created.push(h.service.create_item(space.id, note(title)).await.unwrap());
    }
    assert_eq!(h.service.get_count(space.id).await.unwrap(), 3);

    h.service.delete_item(created[0].id).await.unwrap();
    assert_eq!(h.service.get_count(space.id).await.unwrap(), 2);
    assert_eq!(stored_item_count(&h.conn, space.id), 2);
    assert!(h.service.recent_events().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_lose_no_updates() {
    let h = harness();
    let service = Arc::new(h.service);
    let space = service.create_container("Inbox", None).await.unwrap();
    for title in ["seed one", "seed two"] {
        service.create_item(space.id, note(title)).await.unwrap();
    }

    let space_id = space.id;
    let tasks: Vec<_> = (0..10)
        .map(|index| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .create_item(space_id, note(&format!("concurrent {index}")))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(service.get_count(space.id).await.unwrap(), 12);
    assert_eq!(stored_item_count(&h.conn, space.id), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_and_deletes_settle_on_store_count() {
    let h = harness();
    let service = Arc::new(h.service);
    let space = service.create_container("Inbox", None).await.unwrap();
    let mut doomed = Vec::new();
    for index in 0..8 {
        let item = service
            .create_item(space.id, note(&format!("old {index}")))
            .await
            .unwrap();
        doomed.push(item.id);
    }

    let mut tasks = Vec::new();
    for id in doomed {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            service.delete_item(id).await.map(|_| ())
        }));
    }
    let space_id = space.id;
    for index in 0..5 {
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            service
                .create_item(space_id, note(&format!("new {index}")))
                .await
                .map(|_| ())
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(service.get_count(space.id).await.unwrap(), 5);
    assert_eq!(stored_item_count(&h.conn, space.id), 5);
}

#[tokio::test]
async fn spaces_count_independently() {
    let h = harness();
    let work = h.service.create_container("Work", None).await.unwrap();
    let home = h.service.create_container("Home", None).await.unwrap();

    h.service.create_item(work.id, note("report")).await.unwrap();
    h.service.create_item(work.id, note("slides")).await.unwrap();
    h.service.create_item(home.id, note("laundry")).await.unwrap();

    assert_eq!(h.service.get_count(work.id).await.unwrap(), 2);
    assert_eq!(h.service.get_count(home.id).await.unwrap(), 1);
}

#[tokio::test]
async fn delete_at_zero_clamps_and_records_symptom() {
    let h = harness();
    let space = h.service.create_container("Empty", None).await.unwrap();
    let untracked = insert_item_behind_cache(&h.conn, space.id);

    h.service.delete_item(untracked).await.unwrap();

    assert_eq!(h.service.get_count(space.id).await.unwrap(), 0);
    let events = h.service.recent_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        DesyncEvent::FloorClamped { container_id, item_id, .. }
            if container_id == space.id && item_id == untracked
    ));
}

#[tokio::test]
async fn create_in_missing_space_is_rejected() {
    let h = harness();
    let ghost = ContainerId::new();

    let err = h.service.create_item(ghost, note("orphan")).await.unwrap_err();
    assert!(matches!(err, CountError::ContainerNotFound(id) if id == ghost));
    assert_eq!(err.code(), "space_not_found");
}

#[tokio::test]
async fn delete_of_missing_item_is_rejected() {
    let h = harness();
    let missing = ItemId::new();

    let err = h.service.delete_item(missing).await.unwrap_err();
    assert!(matches!(err, CountError::ItemNotFound(id) if id == missing));
}

#[tokio::test]
async fn blank_title_is_rejected_before_any_write() {
    let h = harness();
    let space = h.service.create_container("Inbox", None).await.unwrap();

    let err = h
        .service
        .create_item(space.id, ItemPayload::new(ItemKind::List, "   ", "milk"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CountError::InvalidPayload(ModelValidationError::BlankItemTitle)
    ));
    assert_eq!(stored_item_count(&h.conn, space.id), 0);
    assert_eq!(h.service.get_count(space.id).await.unwrap(), 0);
}

#[tokio::test]
async fn failed_item_write_leaves_count_untouched() {
    let h = harness();
    let space = h.service.create_container("Inbox", None).await.unwrap();
    h.service.create_item(space.id, note("kept")).await.unwrap();

    h.items.fail_writes(true);
    let err = h
        .service
        .create_item(space.id, note("lost"))
        .await
        .unwrap_err();

    assert!(matches!(err, CountError::StoreUnavailable(_)));
    assert_eq!(h.service.get_count(space.id).await.unwrap(), 1);
    assert_eq!(stored_item_count(&h.conn, space.id), 1);
    assert!(h.service.recent_events().is_empty());
}

#[tokio::test]
async fn failed_delete_write_leaves_count_untouched() {
    let h = harness();
    let space = h.service.create_container("Inbox", None).await.unwrap();
    let item = h.service.create_item(space.id, note("kept")).await.unwrap();

    h.items.fail_writes(true);
    let err = h.service.delete_item(item.id).await.unwrap_err();

    assert!(matches!(err, CountError::StoreUnavailable(_)));
    assert_eq!(h.service.get_count(space.id).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_increment_still_reports_success_with_warning() {
    let h = harness();
    let space = h.service.create_container("Inbox", None).await.unwrap();

    h.containers.fail_count_writes(true);
    let item = h.service.create_item(space.id, note("drifted")).await.unwrap();
    h.containers.fail_count_writes(false);

    assert_eq!(stored_item_count(&h.conn, space.id), 1);
    assert_eq!(h.service.get_count(space.id).await.unwrap(), 0);
    let events = h.service.drain_events();
    assert_eq!(events.len(), 1);
    match &events[0] {
        DesyncEvent::CacheAdjustFailed {
            container_id,
            item_id,
            operation,
            ..
        } => {
            assert_eq!(*container_id, space.id);
            assert_eq!(*item_id, item.id);
            assert_eq!(*operation, CountOperation::Increment);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let result = h.service.reconcile(space.id).await.unwrap();
    assert!(result.corrected());
    assert_eq!(h.service.get_count(space.id).await.unwrap(), 1);
}

#[tokio::test]
async fn failed_decrement_still_reports_success_with_warning() {
    let h = harness();
    let space = h.service.create_container("Inbox", None).await.unwrap();
    let item = h.service.create_item(space.id, note("gone")).await.unwrap();

    h.containers.fail_count_writes(true);
    h.service.delete_item(item.id).await.unwrap();
    h.containers.fail_count_writes(false);

    assert_eq!(h.service.get_count(space.id).await.unwrap(), 1);
    assert!(matches!(
        h.service.recent_events().as_slice(),
        [DesyncEvent::CacheAdjustFailed {
            operation: CountOperation::Decrement,
            ..
        }]
    ));
}

#[tokio::test]
async fn move_shifts_one_count_between_spaces() {
    let h = harness();
    let work = h.service.create_container("Work", None).await.unwrap();
    let home = h.service.create_container("Home", None).await.unwrap();
    let item = h.service.create_item(work.id, note("book")).await.unwrap();

    let moved = h.service.move_item(item.id, home.id).await.unwrap();

    assert_eq!(moved.container_id, home.id);
    assert_eq!(h.service.get_count(work.id).await.unwrap(), 0);
    assert_eq!(h.service.get_count(home.id).await.unwrap(), 1);
    assert_eq!(h.service.list_items(home.id).await.unwrap(), vec![moved]);
}

#[tokio::test]
async fn move_within_same_space_changes_nothing() {
    let h = harness();
    let work = h.service.create_container("Work", None).await.unwrap();
    let item = h.service.create_item(work.id, note("stay")).await.unwrap();

    let unchanged = h.service.move_item(item.id, work.id).await.unwrap();

    assert_eq!(unchanged, item);
    assert_eq!(h.service.get_count(work.id).await.unwrap(), 1);
}

#[tokio::test]
async fn move_to_missing_space_is_rejected() {
    let h = harness();
    let work = h.service.create_container("Work", None).await.unwrap();
    let item = h.service.create_item(work.id, note("stay")).await.unwrap();
    let ghost = ContainerId::new();

    let err = h.service.move_item(item.id, ghost).await.unwrap_err();

    assert!(matches!(err, CountError::ContainerNotFound(id) if id == ghost));
    assert_eq!(h.service.get_count(work.id).await.unwrap(), 1);
    assert_eq!(stored_item_count(&h.conn, work.id), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_moves_do_not_deadlock() {
    let h = harness();
    let service = Arc::new(h.service);
    let left = service.create_container("Left", None).await.unwrap();
    let right = service.create_container("Right", None).await.unwrap();
    let mut tasks = Vec::new();
    for index in 0..6 {
        let (from, to) = if index % 2 == 0 {
            (left.id, right.id)
        } else {
            (right.id, left.id)
        };
        let item = service
            .create_item(from, note(&format!("moving {index}")))
            .await
            .unwrap();
        let service = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            service.move_item(item.id, to).await.map(|_| ())
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(service.get_count(left.id).await.unwrap(), 3);
    assert_eq!(service.get_count(right.id).await.unwrap(), 3);
    assert!(service.recent_events().is_empty());
}

#[tokio::test]
async fn count_items_filters_by_kind() {
    let h = harness();
    let space = h.service.create_container("Mixed", None).await.unwrap();
    h.service
        .create_item(space.id, ItemPayload::new(ItemKind::TodoList, "chores", ""))
        .await
        .unwrap();
    h.service
        .create_item(space.id, ItemPayload::detect("Reading", "- Dune\n- Emma\n- Ulysses"))
        .await
        .unwrap();
    h.service.create_item(space.id, note("thoughts")).await.unwrap();

    assert_eq!(h.service.count_items(space.id, None).await.unwrap(), 3);
    assert_eq!(
        h.service
            .count_items(space.id, Some(ItemKind::TodoList))
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        h.service
            .count_items(space.id, Some(ItemKind::List))
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn rename_changes_metadata_only() {
    let h = harness();
    let space = h.service.create_container("Inbox", None).await.unwrap();
    for title in ["one", "two"] {
        h.service.create_item(space.id, note(title)).await.unwrap();
    }

    let renamed = h
        .service
        .rename_container(space.id, " Triage ", Some("📥".to_string()))
        .await
        .unwrap();
    assert_eq!(renamed.name, "Triage");
    assert_eq!(renamed.icon.as_deref(), Some("📥"));
    assert_eq!(renamed.item_count(), 2);
    assert_eq!(stored_item_count(&h.conn, space.id), 2);

    let err = h
        .service
        .rename_container(space.id, "  ", None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CountError::InvalidPayload(ModelValidationError::BlankSpaceName)
    ));

    let ghost = ContainerId::new();
    let err = h
        .service
        .rename_container(ghost, "Ghost", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CountError::ContainerNotFound(id) if id == ghost));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn renames_racing_creates_lose_no_counts() {
    let h = harness();
    let service = Arc::new(h.service);
    let space = service.create_container("Inbox", None).await.unwrap();
    let space_id = space.id;

    let mut tasks = Vec::new();
    for index in 0..20 {
        let creator = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            creator
                .create_item(space_id, note(&format!("item {index}")))
                .await
                .map(|_| ())
        }));
        let renamer = Arc::clone(&service);
        tasks.push(tokio::spawn(async move {
            renamer
                .rename_container(space_id, format!("Inbox {index}"), None)
                .await
                .map(|_| ())
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(service.get_count(space_id).await.unwrap(), 20);
    assert_eq!(stored_item_count(&h.conn, space_id), 20);
    assert!(service.recent_events().is_empty());
}
