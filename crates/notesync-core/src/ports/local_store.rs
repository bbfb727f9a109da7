//! Local entity store port (driven/secondary port)
//!
//! The on-device transactional store the sync engine reads dirty entities
//! from and writes pulled state into. The engine owns neither its schema nor
//! its query planning.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   and don't need domain-level classification.
//! - `delete` cascades to owned children inside the store; it returns the
//!   removed entities so the caller can mirror each one remotely.

use chrono::{DateTime, Utc};

use crate::domain::{Entity, EntityId, PendingDeletion, RecordId, RecordType, SyncConflict};

/// Port trait for local entity persistence
#[async_trait::async_trait]
pub trait ILocalStore: Send + Sync {
    /// Retrieves an entity by type and ID
    async fn get(&self, record_type: RecordType, id: EntityId) -> anyhow::Result<Option<Entity>>;

    /// Retrieves every entity of a type whose `needs_sync` flag is set
    async fn fetch_dirty(&self, record_type: RecordType) -> anyhow::Result<Vec<Entity>>;

    /// Counts dirty entities across all types
    async fn count_dirty(&self) -> anyhow::Result<u64>;

    /// Inserts or replaces an entity
    async fn upsert(&self, entity: &Entity) -> anyhow::Result<()>;

    /// Deletes an entity and, transitively, the entities it owns
    ///
    /// # Returns
    /// Every removed entity, parent first. Empty if nothing matched.
    async fn delete(&self, record_type: RecordType, id: EntityId) -> anyhow::Result<Vec<Entity>>;

    /// Retrieves the entities of `child_type` owned by `parent_id`
    async fn children(
        &self,
        child_type: RecordType,
        parent_id: EntityId,
    ) -> anyhow::Result<Vec<Entity>>;

    /// Queues a remote delete; enqueueing the same record twice is a no-op
    async fn enqueue_deletion(&self, deletion: &PendingDeletion) -> anyhow::Result<()>;

    /// Returns queued remote deletes, oldest first
    async fn pending_deletions(&self) -> anyhow::Result<Vec<PendingDeletion>>;

    /// Removes a remote delete from the queue once mirrored
    async fn clear_deletion(&self, record_id: &RecordId) -> anyhow::Result<()>;

    /// Saves (inserts or updates) a conflict
    async fn save_conflict(&self, conflict: &SyncConflict) -> anyhow::Result<()>;

    /// Retrieves every conflict without a resolution
    async fn unresolved_conflicts(&self) -> anyhow::Result<Vec<SyncConflict>>;
}

/// Port trait for the durable, process-wide sync status
#[async_trait::async_trait]
pub trait ISyncStatusStore: Send + Sync {
    /// When the last sync cycle completed without failures
    async fn last_successful_sync(&self) -> anyhow::Result<Option<DateTime<Utc>>>;

    async fn set_last_successful_sync(&self, at: DateTime<Utc>) -> anyhow::Result<()>;
}
