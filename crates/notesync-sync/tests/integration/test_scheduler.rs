//! Scheduler: periodic, requested and resume-driven cycles

use std::sync::Arc;
use std::time::Duration;

use notesync_core::domain::JournalEntry;
use notesync_sync::{SyncEngine, SyncScheduler, SyncState, SyncTrigger};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::{config, setup, Harness};

/// Long enough that only the immediate first tick fires during a test
const POLL: Duration = Duration::from_secs(3600);

async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

fn start(h: &Harness) -> (SyncTrigger, CancellationToken, JoinHandle<u64>) {
    let engine = Arc::new(SyncEngine::new(
        h.remote.clone(),
        h.local.clone(),
        h.codec.clone(),
        h.coordinator.clone(),
        &config(),
    ));
    let shutdown = CancellationToken::new();
    let (scheduler, trigger) =
        SyncScheduler::new(engine, &h.coordinator, POLL, shutdown.clone());
    (trigger, shutdown, tokio::spawn(scheduler.run()))
}

#[tokio::test]
async fn test_first_cycle_runs_immediately() {
    let h = setup().await;
    h.tracker
        .save(&JournalEntry::new("queued before start", "").into())
        .await
        .unwrap();

    let (_trigger, shutdown, task) = start(&h);

    wait_for("initial push", || h.remote.len() == 1).await;
    wait_for("synced state", || {
        matches!(h.coordinator.status().state, SyncState::Synced { .. })
    })
    .await;

    shutdown.cancel();
    assert_eq!(task.await.unwrap(), 1);
}

#[tokio::test]
async fn test_requested_sync_runs_a_cycle() {
    let h = setup().await;
    let (trigger, shutdown, task) = start(&h);
    wait_for("initial cycle", || {
        matches!(h.coordinator.status().state, SyncState::Synced { .. })
    })
    .await;

    h.tracker
        .save(&JournalEntry::new("written later", "").into())
        .await
        .unwrap();
    assert!(trigger.request_sync());

    wait_for("requested push", || h.remote.len() == 1).await;
    shutdown.cancel();
    assert!(task.await.unwrap() >= 2);
}

#[tokio::test]
async fn test_reconnect_with_pending_work_runs_a_cycle() {
    let h = setup().await;
    let (_trigger, shutdown, task) = start(&h);
    wait_for("initial cycle", || {
        matches!(h.coordinator.status().state, SyncState::Synced { .. })
    })
    .await;

    h.coordinator.network_changed(false).await.unwrap();
    h.tracker
        .save(&JournalEntry::new("offline edit", "").into())
        .await
        .unwrap();
    h.coordinator.network_changed(true).await.unwrap();

    wait_for("push after reconnect", || h.remote.len() == 1).await;
    wait_for("pending drained", || h.coordinator.status().pending_count == 0).await;

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_trigger_reports_stopped_scheduler() {
    let h = setup().await;
    let (trigger, shutdown, task) = start(&h);

    shutdown.cancel();
    task.await.unwrap();

    assert!(!trigger.request_sync());
}
