//! Local deletions mirrored to the remote store

use notesync_core::domain::{Entity, ImageKind, JournalAttachment, JournalEntry, RecordType};
use notesync_core::ports::{ILocalStore, IRemoteStore};
use notesync_sync::SyncState;

use crate::common::{setup, Harness};

/// Saves an entry with two attachments and pushes all three
async fn synced_entry(h: &Harness) -> (JournalEntry, Vec<JournalAttachment>) {
    let entry = JournalEntry::new("trip", "");
    let attachments: Vec<JournalAttachment> = (0..2u8)
        .map(|i| JournalAttachment::new(entry.id(), ImageKind::Photo, vec![i; 16]))
        .collect();
    h.tracker.save(&entry.clone().into()).await.unwrap();
    for attachment in &attachments {
        h.tracker.save(&attachment.clone().into()).await.unwrap();
    }
    let report = h.engine.sync().await.unwrap();
    assert_eq!(report.pushed, 3);
    (entry, attachments)
}

#[tokio::test]
async fn test_deleting_unsynced_entity_never_reaches_remote() {
    let h = setup().await;
    let entry = JournalEntry::new("never pushed", "");
    h.tracker.save(&entry.clone().into()).await.unwrap();
    assert_eq!(h.coordinator.status().pending_count, 1);

    let removed = h
        .tracker
        .delete(RecordType::JournalEntry, entry.id())
        .await
        .unwrap();

    assert_eq!(removed.len(), 1);
    assert_eq!(h.coordinator.status().pending_count, 0);
    assert!(h.local.pending_deletions().await.unwrap().is_empty());

    let report = h.engine.sync().await.unwrap();
    assert_eq!(report.deleted, 0);
    assert!(h.remote.delete_calls().is_empty());
}

#[tokio::test]
async fn test_deleting_synced_entity_issues_one_remote_delete() {
    let h = setup().await;
    let entry = JournalEntry::new("pushed", "");
    h.tracker.save(&entry.clone().into()).await.unwrap();
    h.engine.sync().await.unwrap();
    let key = Entity::from(entry.clone()).record_id();

    h.tracker
        .delete(RecordType::JournalEntry, entry.id())
        .await
        .unwrap();
    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(h.remote.delete_calls(), vec![key]);
    assert_eq!(h.remote.len(), 0);
    assert!(h.local.pending_deletions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_entry_cascades_to_attachments() {
    let h = setup().await;
    let (entry, attachments) = synced_entry(&h).await;
    assert_eq!(h.remote.len(), 3);

    let removed = h
        .tracker
        .delete(RecordType::JournalEntry, entry.id())
        .await
        .unwrap();
    assert_eq!(removed.len(), 3);
    for attachment in &attachments {
        assert!(h
            .local
            .get(RecordType::JournalAttachment, attachment.id())
            .await
            .unwrap()
            .is_none());
    }

    let report = h.engine.sync().await.unwrap();

    // Only the root is deleted explicitly; the server cascades the rest.
    assert_eq!(h.remote.delete_calls().len(), 1);
    assert_eq!(report.deleted, 1);
    assert_eq!(h.remote.len(), 0);
}

#[tokio::test]
async fn test_record_already_gone_remotely_counts_as_deleted() {
    let h = setup().await;
    let entry = JournalEntry::new("gone", "");
    h.tracker.save(&entry.clone().into()).await.unwrap();
    h.engine.sync().await.unwrap();
    let key = Entity::from(entry.clone()).record_id();

    // Another device deleted it first.
    h.remote.delete(&key).await.unwrap();
    h.tracker
        .delete(RecordType::JournalEntry, entry.id())
        .await
        .unwrap();

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.failed, 0);
    assert!(h.local.pending_deletions().await.unwrap().is_empty());
    assert!(matches!(h.coordinator.status().state, SyncState::Synced { .. }));
}

#[tokio::test]
async fn test_failed_remote_delete_stays_queued_and_is_not_resurrected() {
    let h = setup().await;
    let entry = JournalEntry::new("sticky", "");
    h.tracker.save(&entry.clone().into()).await.unwrap();
    h.engine.sync().await.unwrap();
    let key = Entity::from(entry.clone()).record_id();
    h.remote.fail_delete(key.clone());

    h.tracker
        .delete(RecordType::JournalEntry, entry.id())
        .await
        .unwrap();
    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.deleted, 0);
    assert!(matches!(h.coordinator.status().state, SyncState::Error { .. }));
    let queued = h.local.pending_deletions().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].record_id, key);
    // The server copy is still there but must not come back on pull.
    assert!(h.remote.get(&key).is_some());
    assert!(h
        .local
        .get(RecordType::JournalEntry, entry.id())
        .await
        .unwrap()
        .is_none());

    h.remote.clear_failures();
    let report = h.engine.sync().await.unwrap();
    assert_eq!(report.deleted, 1);
    assert!(h.remote.get(&key).is_none());
}
