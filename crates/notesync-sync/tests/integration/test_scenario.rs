//! The create → push → edit → offline → reconnect walkthrough

use notesync_core::domain::{Entity, JournalEntry, RecordType};
use notesync_sync::{ResumeEvent, SyncError, SyncState};

use crate::common::setup;

#[tokio::test]
async fn test_entry_lifecycle_across_reconnect() {
    let h = setup().await;

    // Create E1 with no content.
    let entry = JournalEntry::new("", "");
    let id = entry.id();
    assert!(entry.sync().needs_sync());
    assert!(entry.sync().remote_key().is_none());
    h.tracker.save(&entry.into()).await.unwrap();
    assert_eq!(h.coordinator.status().pending_count, 1);

    // Push succeeds.
    let report = h.engine.sync().await.unwrap();
    assert_eq!(report.pushed, 1);
    assert_eq!(report.failed, 0);

    let synced = h.load(RecordType::JournalEntry, id).await;
    assert!(!synced.sync().needs_sync());
    assert!(synced.sync().last_sync_error().is_none());
    let key = synced.sync().remote_key().cloned().expect("remote key after push");
    assert_eq!(key.to_string(), format!("JournalEntry_{id}"));
    assert!(matches!(h.coordinator.status().state, SyncState::Synced { .. }));
    assert_eq!(h.coordinator.status().pending_count, 0);

    // Edit the title locally.
    let Entity::JournalEntry(mut edited) = synced else {
        panic!("expected a journal entry");
    };
    edited.set_title("Morning pages");
    h.tracker.save(&edited.into()).await.unwrap();

    let dirty = h.load(RecordType::JournalEntry, id).await;
    assert!(dirty.sync().needs_sync());
    assert_eq!(dirty.sync().remote_key(), Some(&key));
    assert_eq!(h.coordinator.status().pending_count, 1);

    // Network drops.
    h.coordinator.network_changed(false).await.unwrap();
    assert_eq!(h.coordinator.status().state, SyncState::Offline);
    assert!(matches!(h.engine.sync().await, Err(SyncError::Offline)));

    // Network returns with one pending change.
    let mut resume = h.coordinator.subscribe_resume();
    h.coordinator.network_changed(true).await.unwrap();
    assert_eq!(h.coordinator.status().state, SyncState::WaitingForNetwork);
    assert_eq!(resume.recv().await.unwrap(), ResumeEvent { pending_count: 1 });

    let report = h.engine.sync().await.unwrap();
    assert_eq!(report.pushed, 1);

    let status = h.coordinator.status();
    assert!(matches!(status.state, SyncState::Synced { .. }));
    assert_eq!(status.pending_count, 0);
    assert!(status.last_synced_at.is_some());

    let remote = h.remote.get(&key).expect("record on server");
    assert_eq!(remote.string(notesync_codec::fields::TITLE), Some("Morning pages"));
}
