//! Push/pull synchronization engine
//!
//! The [`SyncEngine`] runs one sync cycle between the local store and the
//! remote record store and reports the outcome to the coordinator.
//!
//! ## Sync Flow
//!
//! 1. **Availability**: check the remote account; stop if it is not usable
//! 2. **Deletions**: mirror queued local deletes with `batch_delete`
//! 3. **Push**: save dirty entities per type, parents first, in batches
//! 4. **Pull**: page through remote records per type, incrementally from
//!    the last successful sync, and merge them into the local store
//! 5. **Bookkeeping**: `end_sync` when nothing failed, `sync_failed` otherwise,
//!    then reconcile the pending counter with the store
//!
//! ## Failures
//!
//! Batches are non-atomic. An item that fails keeps `needs_sync` set and
//! records the reason; it is retried on the next cycle. Only a failure of a
//! whole call aborts the cycle.
//!
//! ## Cancellation
//!
//! Cancelling the engine's token stops new batches from being submitted. A
//! batch already handed to the remote store always runs to completion.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use notesync_codec::RecordCodec;
use notesync_core::config::Config;
use notesync_core::domain::{
    ConflictId, ConflictPolicy, DomainError, Entity, EntityId, RecordId, RecordType, Resolution,
    SyncConflict,
};
use notesync_core::ports::{ILocalStore, IRemoteStore, RecordPager, RemoteError};
use notesync_core::record::{RecordQuery, WireRecord};

use crate::coordinator::CoordinatorHandle;
use crate::SyncError;

/// Pulls re-read this much before the last successful sync, so records the
/// server touched while that cycle was finishing are not missed
const PULL_OVERLAP_SECS: i64 = 60;

// ============================================================================
// SyncReport
// ============================================================================

/// Summary of one sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Entities the server confirmed as saved
    pub pushed: u32,
    /// Remote records written into the local store
    pub pulled: u32,
    /// Remote deletes mirrored
    pub deleted: u32,
    /// Items that failed and stay queued for the next cycle
    pub failed: u32,
    /// Conflicts detected (and persisted) during the cycle
    pub conflicts: u32,
    /// Records ignored: undecodable, already up to date, or held back
    pub skipped: u32,
    /// The cycle stopped early because the engine was cancelled
    pub cancelled: bool,
    pub duration_ms: u64,
}

impl SyncReport {
    /// True if every item was processed without failure
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && !self.cancelled
    }
}

/// Completed-operation counter feeding coordinator progress
struct Progress {
    completed: u64,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Runs push/pull cycles against the injected stores
pub struct SyncEngine {
    remote: Arc<dyn IRemoteStore>,
    local: Arc<dyn ILocalStore>,
    codec: RecordCodec,
    coordinator: CoordinatorHandle,
    policy: ConflictPolicy,
    batch_size: usize,
    page_size: usize,
    cancel: CancellationToken,
}

impl SyncEngine {
    /// Creates a new engine
    ///
    /// # Arguments
    /// * `remote` - Remote record store
    /// * `local` - Local entity store
    /// * `codec` - Entity/record conversion
    /// * `coordinator` - Handle to the sync state machine
    /// * `config` - Batch size, page size and conflict policy
    pub fn new(
        remote: Arc<dyn IRemoteStore>,
        local: Arc<dyn ILocalStore>,
        codec: RecordCodec,
        coordinator: CoordinatorHandle,
        config: &Config,
    ) -> Self {
        Self {
            remote,
            local,
            codec,
            coordinator,
            policy: config.conflicts.policy(),
            batch_size: config.sync.batch_size.max(1),
            page_size: config.sync.page_size.max(1),
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `token` to stop submitting batches once it is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_policy(mut self, policy: ConflictPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    // ========================================================================
    // Cycle
    // ========================================================================

    /// Runs one sync cycle
    ///
    /// # Errors
    /// - `SyncError::Offline` if the coordinator knows the network is down;
    ///   the sync state is left untouched
    /// - Any error that aborted the whole cycle; the state is set to
    ///   `offline` for network failures and `error` otherwise
    #[tracing::instrument(skip(self), fields(policy = %self.policy))]
    pub async fn sync(&self) -> Result<SyncReport, SyncError> {
        let status = self.coordinator.status();
        if !status.network_available {
            debug!("Network is offline, skipping sync");
            return Err(SyncError::Offline);
        }

        let started = Instant::now();
        let since = status
            .last_synced_at
            .map(|at| at - Duration::seconds(PULL_OVERLAP_SECS));

        let outcome = self.run_cycle(since).await;
        match &outcome {
            Ok(report) if report.cancelled => {
                info!("Sync cancelled");
                self.coordinator.reset_to_idle().await?;
            }
            Ok(report) if report.failed == 0 => {
                self.coordinator.end_sync().await?;
            }
            Ok(report) => {
                warn!(failed = report.failed, "Sync completed with failures");
                self.coordinator
                    .sync_failed(format!("{} item(s) failed to sync", report.failed))
                    .await?;
            }
            Err(SyncError::Remote(RemoteError::NetworkUnavailable(reason))) => {
                warn!(reason = %reason, "Network unavailable during sync");
                self.coordinator.network_changed(false).await?;
            }
            Err(SyncError::Remote(e)) => {
                error!(error = %e, kind = ?e.kind(), "Sync aborted");
                self.coordinator.sync_failed(e.user_message()).await?;
            }
            Err(e) => {
                error!(error = %e, "Sync aborted");
                self.coordinator.sync_failed(e.to_string()).await?;
            }
        }

        // Conflicts and failures leave entities dirty; the counter follows the store.
        match self.local.count_dirty().await {
            Ok(dirty) => self.coordinator.reconcile_pending(dirty).await?,
            Err(e) => warn!(error = %e, "Failed to count dirty entities"),
        }

        let mut report = outcome?;
        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            pushed = report.pushed,
            pulled = report.pulled,
            deleted = report.deleted,
            failed = report.failed,
            conflicts = report.conflicts,
            skipped = report.skipped,
            duration_ms = report.duration_ms,
            "Sync cycle finished"
        );
        Ok(report)
    }

    async fn run_cycle(
        &self,
        since: Option<chrono::DateTime<Utc>>,
    ) -> Result<SyncReport, SyncError> {
        let account = self.remote.check_availability().await?;
        if let Some(err) = account.to_error() {
            return Err(err.into());
        }

        let deletions = self.local.pending_deletions().await?;
        let mut dirty = Vec::with_capacity(RecordType::PUSH_ORDER.len());
        for record_type in RecordType::PUSH_ORDER {
            dirty.push((record_type, self.local.fetch_dirty(record_type).await?));
        }
        let mut held: HashSet<(RecordType, EntityId)> = self
            .local
            .unresolved_conflicts()
            .await?
            .iter()
            .map(|c| (c.record_type(), c.entity_id()))
            .collect();

        let dirty_count: usize = dirty.iter().map(|(_, entities)| entities.len()).sum();
        let total = (deletions.len() + dirty_count + RecordType::PUSH_ORDER.len()) as u64;
        info!(
            deletions = deletions.len(),
            dirty = dirty_count,
            held = held.len(),
            "Starting sync cycle"
        );
        self.coordinator.begin_sync(total).await?;

        let mut report = SyncReport::default();
        let mut progress = Progress { completed: 0 };

        let deletion_ids: Vec<RecordId> = deletions.into_iter().map(|d| d.record_id).collect();
        self.mirror_deletions(&deletion_ids, &mut report, &mut progress)
            .await?;
        if report.cancelled {
            return Ok(report);
        }

        for (record_type, entities) in dirty {
            self.push_type(record_type, entities, &mut held, &mut report, &mut progress)
                .await?;
            if report.cancelled {
                return Ok(report);
            }
        }

        // Deletes that could not be mirrored must not be resurrected by the pull.
        let still_pending: HashSet<RecordId> = self
            .local
            .pending_deletions()
            .await?
            .into_iter()
            .map(|d| d.record_id)
            .collect();
        for record_type in RecordType::PUSH_ORDER {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(report);
            }
            self.pull_type(record_type, since, &still_pending, &mut held, &mut report)
                .await?;
            self.advance(&mut progress, 1).await?;
        }

        Ok(report)
    }

    async fn advance(&self, progress: &mut Progress, n: usize) -> Result<(), SyncError> {
        progress.completed += n as u64;
        self.coordinator.update_progress(progress.completed).await
    }

    // ========================================================================
    // Deletions
    // ========================================================================

    async fn mirror_deletions(
        &self,
        ids: &[RecordId],
        report: &mut SyncReport,
        progress: &mut Progress,
    ) -> Result<(), SyncError> {
        for chunk in ids.chunks(self.batch_size) {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(());
            }

            let outcome = self.remote.batch_delete(chunk).await?;
            for record_id in &outcome.deleted {
                self.local.clear_deletion(record_id).await?;
                report.deleted += 1;
            }
            for failure in outcome.failures {
                match failure.error {
                    RemoteError::RecordNotFound(_) => {
                        debug!(record_id = %failure.record_id, "Already deleted remotely");
                        self.local.clear_deletion(&failure.record_id).await?;
                        report.deleted += 1;
                    }
                    error => {
                        warn!(
                            record_id = %failure.record_id,
                            error = %error,
                            "Remote delete failed, will retry"
                        );
                        report.failed += 1;
                    }
                }
            }
            self.advance(progress, chunk.len()).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Push
    // ========================================================================

    async fn push_type(
        &self,
        record_type: RecordType,
        entities: Vec<Entity>,
        held: &mut HashSet<(RecordType, EntityId)>,
        report: &mut SyncReport,
        progress: &mut Progress,
    ) -> Result<(), SyncError> {
        for chunk in entities.chunks(self.batch_size) {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                return Ok(());
            }

            let mut records = Vec::with_capacity(chunk.len());
            let mut pushed: HashMap<RecordId, &Entity> = HashMap::with_capacity(chunk.len());
            for entity in chunk {
                if held.contains(&(record_type, entity.id())) {
                    debug!(entity_id = %entity.id(), "Holding back entity with open conflict");
                    report.skipped += 1;
                    continue;
                }
                match self.codec.encode(entity) {
                    Ok(record) => {
                        pushed.insert(record.record_id.clone(), entity);
                        records.push(record);
                    }
                    Err(e) => {
                        warn!(entity_id = %entity.id(), error = %e, "Failed to encode entity");
                        self.record_failure(record_type, entity.id(), e.to_string())
                            .await?;
                        report.failed += 1;
                    }
                }
            }

            if !records.is_empty() {
                debug!(%record_type, count = records.len(), "Pushing batch");
                let outcome = self.remote.batch_save(&records).await?;

                for saved in &outcome.saved {
                    if let Some(original) = pushed.get(&saved.record_id) {
                        self.apply_saved(original, saved).await?;
                        report.pushed += 1;
                    }
                }

                for failure in outcome.failures {
                    let Some(original) = pushed.get(&failure.record_id) else {
                        continue;
                    };
                    match failure.error {
                        RemoteError::ConflictDetected { server_record } => {
                            self.handle_conflict((*original).clone(), *server_record, held, report)
                                .await?;
                        }
                        error => {
                            warn!(
                                record_id = %failure.record_id,
                                kind = ?error.kind(),
                                error = %error,
                                "Failed to save record"
                            );
                            self.record_failure(record_type, original.id(), error.user_message())
                                .await?;
                            report.failed += 1;
                        }
                    }
                }
            }

            self.advance(progress, chunk.len()).await?;
        }
        Ok(())
    }

    /// Clears `needs_sync` on a pushed entity unless it changed meanwhile
    ///
    /// An entity edited while its batch was in flight stays dirty but moves
    /// onto the saved change tag, so its own save is not taken for a
    /// conflict and the edit is pushed next cycle.
    async fn apply_saved(&self, original: &Entity, saved: &WireRecord) -> Result<(), SyncError> {
        let current = self.local.get(original.record_type(), original.id()).await?;
        let Some(mut current) = current else {
            debug!(record_id = %saved.record_id, "Pushed entity was deleted locally");
            return Ok(());
        };
        if !current.same_content(original) {
            debug!(record_id = %saved.record_id, "Entity changed during push, keeping it dirty");
            current.sync_mut().set_change_tag(saved.change_tag.clone());
            self.local.upsert(&current).await?;
            return Ok(());
        }

        let sync = current.sync_mut();
        sync.mark_synced(saved.record_id.clone(), saved.modified_at.unwrap_or_else(Utc::now));
        sync.set_change_tag(saved.change_tag.clone());
        self.local.upsert(&current).await?;
        Ok(())
    }

    async fn record_failure(
        &self,
        record_type: RecordType,
        id: EntityId,
        reason: String,
    ) -> Result<(), SyncError> {
        if let Some(mut current) = self.local.get(record_type, id).await? {
            current.sync_mut().record_failure(reason);
            self.local.upsert(&current).await?;
        }
        Ok(())
    }

    // ========================================================================
    // Pull
    // ========================================================================

    async fn pull_type(
        &self,
        record_type: RecordType,
        since: Option<chrono::DateTime<Utc>>,
        pending_deletions: &HashSet<RecordId>,
        held: &mut HashSet<(RecordType, EntityId)>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let mut query = RecordQuery::all(record_type).with_page_size(self.page_size);
        if let Some(since) = since {
            query = query.modified_since(since);
        }

        let mut pager = RecordPager::new(self.remote.as_ref(), query);
        while let Some(page) = pager.next_page().await? {
            debug!(%record_type, count = page.len(), "Pulled page");
            for record in page {
                self.apply_pulled(record_type, record, pending_deletions, held, report)
                    .await?;
            }
        }
        report.skipped += pager.skipped() as u32;
        Ok(())
    }

    async fn apply_pulled(
        &self,
        record_type: RecordType,
        record: WireRecord,
        pending_deletions: &HashSet<RecordId>,
        held: &mut HashSet<(RecordType, EntityId)>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let Some(incoming) = self.codec.decode(&record, record_type) else {
            report.skipped += 1;
            return Ok(());
        };

        if pending_deletions.contains(&record.record_id) {
            debug!(record_id = %record.record_id, "Ignoring record deleted locally");
            report.skipped += 1;
            return Ok(());
        }
        if let (Some(parent_type), Some(parent_id)) =
            (record_type.parent_type(), incoming.parent_id())
        {
            let parent_key = RecordId::for_entity(parent_type, parent_id);
            let parent = self.local.get(parent_type, parent_id).await?;
            if parent.is_none() || pending_deletions.contains(&parent_key) {
                debug!(record_id = %record.record_id, "Ignoring record without local parent");
                report.skipped += 1;
                return Ok(());
            }
        }
        if held.contains(&(record_type, incoming.id())) {
            report.skipped += 1;
            return Ok(());
        }

        match self.local.get(record_type, incoming.id()).await? {
            None => {
                self.local.upsert(&incoming).await?;
                report.pulled += 1;
            }
            Some(local) if !local.sync().needs_sync() => {
                if local.same_content(&incoming) {
                    if local.sync().change_tag() != incoming.sync().change_tag() {
                        self.local.upsert(&incoming).await?;
                    }
                    report.skipped += 1;
                } else {
                    self.local.upsert(&incoming).await?;
                    report.pulled += 1;
                }
            }
            Some(local) if local.sync().change_tag().is_some()
                && local.sync().change_tag() == record.change_tag.as_deref() =>
            {
                // A local edit on top of the current server version; pushed next cycle.
                debug!(record_id = %record.record_id, "Local edit pending on current version");
                report.skipped += 1;
            }
            Some(local) => {
                self.handle_conflict(local, record, held, report).await?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Conflicts
    // ========================================================================

    /// Persists a conflict and applies the configured policy to it
    ///
    /// A server copy with the same content as the local entity is not a
    /// conflict; it is adopted as the synced state.
    async fn handle_conflict(
        &self,
        local: Entity,
        server_record: WireRecord,
        held: &mut HashSet<(RecordType, EntityId)>,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let remote = self.codec.decode(&server_record, local.record_type());
        if let Some(remote) = remote.as_ref().filter(|r| r.same_content(&local)) {
            debug!(record_id = %server_record.record_id, "Server copy already matches");
            self.local.upsert(remote).await?;
            report.pulled += 1;
            return Ok(());
        }

        report.conflicts += 1;
        let key = (local.record_type(), local.id());
        let resolution = match self.policy {
            ConflictPolicy::Manual => None,
            ConflictPolicy::KeepLocal => Some(Resolution::KeptLocal),
            ConflictPolicy::KeepRemote => Some(Resolution::KeptRemote),
            ConflictPolicy::LastWriterWins => remote.as_ref().map(|remote| {
                if remote.modified_at() > local.modified_at() {
                    Resolution::KeptRemote
                } else {
                    Resolution::KeptLocal
                }
            }),
        };

        warn!(
            record_id = %server_record.record_id,
            policy = %self.policy,
            resolution = ?resolution,
            "Sync conflict detected"
        );

        let mut conflict = SyncConflict::new(local, server_record);
        match resolution {
            Some(resolution) => match self.apply_resolution(&mut conflict, resolution).await {
                Ok(()) => {}
                Err(SyncError::Domain(e)) => {
                    warn!(error = %e, "Could not apply resolution, leaving conflict open");
                    self.local.save_conflict(&conflict).await?;
                    held.insert(key);
                }
                Err(e) => return Err(e),
            },
            None => {
                self.local.save_conflict(&conflict).await?;
                held.insert(key);
            }
        }
        Ok(())
    }

    /// Resolves an open conflict by id
    ///
    /// `KeptLocal` releases the local entity, rebased on the server version,
    /// so it is pushed over the server copy on the next cycle. `KeptRemote`
    /// overwrites it with the server copy.
    ///
    /// # Errors
    /// `SyncError::Domain` if no open conflict has this id or the server
    /// copy cannot be decoded.
    pub async fn resolve_conflict(
        &self,
        conflict_id: ConflictId,
        resolution: Resolution,
    ) -> Result<(), SyncError> {
        let mut conflict = self
            .local
            .unresolved_conflicts()
            .await?
            .into_iter()
            .find(|c| c.id() == conflict_id)
            .ok_or_else(|| {
                DomainError::ValidationFailed(format!("no open conflict {conflict_id}"))
            })?;
        self.apply_resolution(&mut conflict, resolution).await?;
        if resolution == Resolution::KeptRemote {
            self.coordinator
                .reconcile_pending(self.local.count_dirty().await?)
                .await?;
        }
        Ok(())
    }

    async fn apply_resolution(
        &self,
        conflict: &mut SyncConflict,
        resolution: Resolution,
    ) -> Result<(), SyncError> {
        if resolution == Resolution::KeptLocal {
            // Rebase onto the server version so the next push overwrites it.
            let current = self
                .local
                .get(conflict.record_type(), conflict.entity_id())
                .await?;
            if let Some(mut current) = current {
                current
                    .sync_mut()
                    .set_change_tag(conflict.server_record().change_tag.clone());
                self.local.upsert(&current).await?;
            }
        } else {
            let remote = self
                .codec
                .decode(conflict.server_record(), conflict.record_type())
                .ok_or_else(|| {
                    DomainError::ValidationFailed(format!(
                        "server copy of {} cannot be decoded",
                        conflict.server_record().record_id
                    ))
                })?;
            self.local.upsert(&remote).await?;
        }

        conflict.resolve(resolution);
        self.local.save_conflict(conflict).await?;
        info!(
            conflict_id = %conflict.id(),
            entity_id = %conflict.entity_id(),
            ?resolution,
            "Conflict resolved"
        );
        Ok(())
    }
}
