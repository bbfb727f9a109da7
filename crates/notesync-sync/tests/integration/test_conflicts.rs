//! Conflicts between a dirty local entity and a newer server copy

use std::time::Duration;

use notesync_core::domain::{ConflictPolicy, Entity, JournalEntry, RecordType, Resolution};
use notesync_core::ports::ILocalStore;
use notesync_sync::SyncState;

use crate::common::{codec, setup_with, Harness};

/// Pushes an entry, then edits it on "another device" and locally
///
/// With `remote_last` the server edit is the more recent one.
async fn diverge(policy: ConflictPolicy, remote_last: bool) -> (Harness, JournalEntry) {
    let h = setup_with(policy, codec()).await;
    let entry = JournalEntry::new("original", "");
    h.tracker.save(&entry.clone().into()).await.unwrap();
    h.engine.sync().await.unwrap();

    let Entity::JournalEntry(base) = h.load(RecordType::JournalEntry, entry.id()).await else {
        panic!("expected a journal entry");
    };
    let mut local = base.clone();
    let mut remote = base;

    if remote_last {
        local.set_title("local title");
        tokio::time::sleep(Duration::from_millis(5)).await;
        remote.set_title("remote title");
    } else {
        remote.set_title("remote title");
        tokio::time::sleep(Duration::from_millis(5)).await;
        local.set_title("local title");
    }
    h.seed_remote(&remote.into());
    h.tracker.save(&local.clone().into()).await.unwrap();
    (h, local)
}

fn title(entity: &Entity) -> &str {
    match entity {
        Entity::JournalEntry(e) => e.title(),
        other => panic!("unexpected {other:?}"),
    }
}

fn remote_title(h: &Harness, entry: &JournalEntry) -> String {
    let record = h
        .remote
        .get(&Entity::from(entry.clone()).record_id())
        .expect("record on server");
    record
        .string(notesync_codec::fields::TITLE)
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_manual_policy_keeps_local_and_persists_conflict() {
    let (h, entry) = diverge(ConflictPolicy::Manual, false).await;

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.conflicts, 1);
    let stored = h.load(RecordType::JournalEntry, entry.id()).await;
    assert_eq!(title(&stored), "local title");
    assert!(stored.sync().needs_sync());
    assert_eq!(remote_title(&h, &entry), "remote title");

    let open = h.local.unresolved_conflicts().await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].entity_id(), entry.id());
    assert_eq!(
        open[0].server_record().string(notesync_codec::fields::TITLE),
        Some("remote title")
    );
    assert_eq!(h.coordinator.status().pending_count, 1);

    // The entity is held back until the conflict is resolved.
    let saves = h.remote.batch_saves();
    let report = h.engine.sync().await.unwrap();
    assert_eq!(report.conflicts, 0);
    assert_eq!(h.remote.batch_saves(), saves);
    assert_eq!(remote_title(&h, &entry), "remote title");
}

#[tokio::test]
async fn test_manual_resolution_keep_remote() {
    let (h, entry) = diverge(ConflictPolicy::Manual, false).await;
    h.engine.sync().await.unwrap();
    let conflict = h.local.unresolved_conflicts().await.unwrap().remove(0);

    h.engine
        .resolve_conflict(conflict.id(), Resolution::KeptRemote)
        .await
        .unwrap();

    let stored = h.load(RecordType::JournalEntry, entry.id()).await;
    assert_eq!(title(&stored), "remote title");
    assert!(!stored.sync().needs_sync());
    assert!(h.local.unresolved_conflicts().await.unwrap().is_empty());
    assert_eq!(h.coordinator.status().pending_count, 0);
}

#[tokio::test]
async fn test_manual_resolution_keep_local_pushes_next_cycle() {
    let (h, entry) = diverge(ConflictPolicy::Manual, false).await;
    h.engine.sync().await.unwrap();
    let conflict = h.local.unresolved_conflicts().await.unwrap().remove(0);

    h.engine
        .resolve_conflict(conflict.id(), Resolution::KeptLocal)
        .await
        .unwrap();
    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.pushed, 1);
    assert_eq!(report.conflicts, 0);
    assert_eq!(remote_title(&h, &entry), "local title");
    assert!(!h
        .load(RecordType::JournalEntry, entry.id())
        .await
        .sync()
        .needs_sync());
}

#[tokio::test]
async fn test_resolving_unknown_conflict_fails() {
    let (h, _) = diverge(ConflictPolicy::Manual, false).await;
    let err = h
        .engine
        .resolve_conflict(Default::default(), Resolution::KeptLocal)
        .await
        .unwrap_err();
    assert!(matches!(err, notesync_sync::SyncError::Domain(_)));
}

#[tokio::test]
async fn test_keep_remote_policy_overwrites_local() {
    let (h, entry) = diverge(ConflictPolicy::KeepRemote, false).await;

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.conflicts, 1);
    let stored = h.load(RecordType::JournalEntry, entry.id()).await;
    assert_eq!(title(&stored), "remote title");
    assert!(!stored.sync().needs_sync());
    assert!(h.local.unresolved_conflicts().await.unwrap().is_empty());
    assert!(matches!(h.coordinator.status().state, SyncState::Synced { .. }));
    assert_eq!(h.coordinator.status().pending_count, 0);
}

#[tokio::test]
async fn test_keep_local_policy_wins_on_next_push() {
    let (h, entry) = diverge(ConflictPolicy::KeepLocal, false).await;

    let report = h.engine.sync().await.unwrap();
    assert_eq!(report.conflicts, 1);
    assert!(h.local.unresolved_conflicts().await.unwrap().is_empty());
    assert_eq!(remote_title(&h, &entry), "remote title");

    let report = h.engine.sync().await.unwrap();
    assert_eq!(report.conflicts, 0);
    assert_eq!(report.pushed, 1);
    assert_eq!(remote_title(&h, &entry), "local title");
}

#[tokio::test]
async fn test_last_writer_wins_prefers_newer_remote() {
    let (h, entry) = diverge(ConflictPolicy::LastWriterWins, true).await;

    h.engine.sync().await.unwrap();

    let stored = h.load(RecordType::JournalEntry, entry.id()).await;
    assert_eq!(title(&stored), "remote title");
    assert!(!stored.sync().needs_sync());
}

#[tokio::test]
async fn test_last_writer_wins_prefers_newer_local() {
    let (h, entry) = diverge(ConflictPolicy::LastWriterWins, false).await;

    h.engine.sync().await.unwrap();
    let stored = h.load(RecordType::JournalEntry, entry.id()).await;
    assert_eq!(title(&stored), "local title");
    assert!(stored.sync().needs_sync());

    h.engine.sync().await.unwrap();
    assert_eq!(remote_title(&h, &entry), "local title");
}
