//! Pull: merging remote records into the local store

use chrono::{Duration, Utc};
use notesync_core::domain::{
    Entity, EntityId, ImageKind, JournalAttachment, JournalEntry, RecordId, RecordType, Settings,
};
use notesync_core::ports::ILocalStore;
use notesync_core::record::WireRecord;

use crate::common::setup;

#[tokio::test]
async fn test_pull_inserts_new_records() {
    let h = setup().await;
    let entry = JournalEntry::new("From the phone", "Written elsewhere");
    let attachment = JournalAttachment::new(entry.id(), ImageKind::Photo, vec![1, 2, 3, 4]);
    h.seed_remote(&entry.clone().into());
    h.seed_remote(&attachment.clone().into());

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.pulled, 2);
    let local = h.load(RecordType::JournalEntry, entry.id()).await;
    assert!(local.same_content(&entry.into()));
    assert!(!local.sync().needs_sync());
    assert!(local.sync().change_tag().is_some());

    match h.load(RecordType::JournalAttachment, attachment.id()).await {
        Entity::JournalAttachment(pulled) => assert_eq!(pulled.image_data(), &[1, 2, 3, 4]),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(h.coordinator.status().pending_count, 0);
}

#[tokio::test]
async fn test_remote_update_overwrites_clean_local() {
    let h = setup().await;
    let mut settings = Settings::new();
    h.seed_remote(&settings.clone().into());
    h.engine.sync().await.unwrap();

    settings.set_theme("dark");
    h.seed_remote(&settings.clone().into());
    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.pulled, 1);
    match h.load(RecordType::Settings, settings.id()).await {
        Entity::Settings(local) => {
            assert_eq!(local.theme(), "dark");
            assert!(!local.sync().needs_sync());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_pull_pages_through_all_records() {
    let h = setup().await;
    for i in 0..5 {
        h.seed_remote(&JournalEntry::new(format!("entry {i}"), "").into());
    }

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.pulled, 5);
    assert_eq!(
        h.local.fetch_dirty(RecordType::JournalEntry).await.unwrap().len(),
        0
    );
}

#[tokio::test]
async fn test_incremental_pull_ignores_old_records() {
    let h = setup().await;
    h.engine.sync().await.unwrap();
    assert!(h.coordinator.status().last_synced_at.is_some());

    let old = JournalEntry::new("stale", "");
    let record = h.codec.encode(&old.clone().into()).unwrap();
    h.remote.seed_at(record, Utc::now() - Duration::hours(1));
    let fresh = JournalEntry::new("fresh", "");
    h.seed_remote(&fresh.clone().into());

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.pulled, 1);
    assert!(h
        .local
        .get(RecordType::JournalEntry, old.id())
        .await
        .unwrap()
        .is_none());
    assert!(h
        .local
        .get(RecordType::JournalEntry, fresh.id())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_child_without_local_parent_is_skipped() {
    let h = setup().await;
    let orphan = JournalAttachment::new(EntityId::new(), ImageKind::Photo, vec![9]);
    h.seed_remote(&orphan.clone().into());

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.pulled, 0);
    assert_eq!(report.skipped, 1);
    assert!(h
        .local
        .get(RecordType::JournalAttachment, orphan.id())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_undecodable_record_is_skipped() {
    let h = setup().await;
    let id = EntityId::new();
    h.remote
        .seed(WireRecord::new(RecordId::for_entity(RecordType::JournalEntry, id)));

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.failed, 0);
    assert!(h
        .local
        .get(RecordType::JournalEntry, id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_identical_edits_on_both_sides_are_not_a_conflict() {
    let h = setup().await;
    let entry = JournalEntry::new("draft", "");
    h.tracker.save(&entry.clone().into()).await.unwrap();
    h.engine.sync().await.unwrap();

    let Entity::JournalEntry(mut local) = h.load(RecordType::JournalEntry, entry.id()).await else {
        panic!("expected a journal entry");
    };
    local.set_title("agreed");
    let server = h.seed_remote(&local.clone().into());
    h.tracker.save(&local.into()).await.unwrap();

    let report = h.engine.sync().await.unwrap();

    assert_eq!(report.conflicts, 0);
    let stored = h.load(RecordType::JournalEntry, entry.id()).await;
    assert!(!stored.sync().needs_sync());
    assert_eq!(stored.sync().change_tag(), server.change_tag.as_deref());
    assert!(h.local.unresolved_conflicts().await.unwrap().is_empty());
}
