//! SQLite implementation of ILocalStore and ISyncStatusStore
//!
//! Entities are stored as serde JSON payloads next to the columns the sync
//! engine filters on. The payload is the source of truth; the columns are
//! rewritten on every upsert.
//!
//! ## Type Mapping
//!
//! | Domain Type      | SQL Type | Strategy                                  |
//! |------------------|----------|-------------------------------------------|
//! | RecordType       | TEXT     | `as_str()` / `FromStr`                    |
//! | EntityId         | TEXT     | UUID string via `to_string()` / `FromStr` |
//! | RecordId         | TEXT     | `{Type}_{uuid}` via `to_string()`         |
//! | DateTime<Utc>    | TEXT     | RFC 3339, UTC, nanosecond precision       |
//! | Entity           | TEXT     | serde_json serialization                  |
//! | SyncConflict     | TEXT     | serde_json serialization                  |

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use notesync_core::domain::{
    Entity, EntityId, PendingDeletion, RecordId, RecordType, Resolution, SyncConflict,
};
use notesync_core::ports::{ILocalStore, ISyncStatusStore};

use crate::CacheError;

const LAST_SUCCESSFUL_SYNC_KEY: &str = "last_successful_sync";

/// SQLite-based implementation of the local store ports
pub struct SqliteLocalStore {
    pool: SqlitePool,
}

impl SqliteLocalStore {
    /// Creates a new store instance with the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

/// Fixed-width UTC timestamps, so TEXT ordering is chronological
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            CacheError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

fn resolution_to_string(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::KeptLocal => "kept_local",
        Resolution::KeptRemote => "kept_remote",
    }
}

fn entity_from_row(row: &SqliteRow) -> Result<Entity, CacheError> {
    let payload: String = row.get("payload");
    let entity: Entity = serde_json::from_str(&payload)?;

    // The key columns must agree with the payload.
    let record_type: String = row.get("record_type");
    let id: String = row.get("id");
    if entity.record_type().as_str() != record_type || entity.id().to_string() != id {
        return Err(CacheError::SerializationError(format!(
            "Payload of {record_type}/{id} describes {}/{}",
            entity.record_type(),
            entity.id()
        )));
    }
    Ok(entity)
}

fn deletion_from_row(row: &SqliteRow) -> Result<PendingDeletion, CacheError> {
    let record_id: String = row.get("record_id");
    let enqueued_at: String = row.get("enqueued_at");
    let record_id = RecordId::parse(&record_id)
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;
    Ok(PendingDeletion {
        record_type: record_id.record_type(),
        record_id,
        enqueued_at: parse_datetime(&enqueued_at)?,
    })
}

fn conflict_from_row(row: &SqliteRow) -> Result<SyncConflict, CacheError> {
    let payload: String = row.get("payload");
    Ok(serde_json::from_str(&payload)?)
}

async fn fetch_entity(
    conn: &mut SqliteConnection,
    record_type: RecordType,
    id: EntityId,
) -> Result<Option<Entity>, CacheError> {
    let row = sqlx::query("SELECT * FROM entities WHERE record_type = ? AND id = ?")
        .bind(record_type.as_str())
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(entity_from_row).transpose()
}

async fn fetch_children(
    conn: &mut SqliteConnection,
    child_type: RecordType,
    parent_id: EntityId,
) -> Result<Vec<Entity>, CacheError> {
    let rows = sqlx::query(
        "SELECT * FROM entities WHERE record_type = ? AND parent_id = ? \
         ORDER BY modified_at ASC",
    )
    .bind(child_type.as_str())
    .bind(parent_id.to_string())
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(entity_from_row).collect()
}

// ============================================================================
// ILocalStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalStore for SqliteLocalStore {
    async fn get(&self, record_type: RecordType, id: EntityId) -> anyhow::Result<Option<Entity>> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_entity(&mut conn, record_type, id).await?)
    }

    async fn fetch_dirty(&self, record_type: RecordType) -> anyhow::Result<Vec<Entity>> {
        let rows = sqlx::query(
            "SELECT * FROM entities WHERE record_type = ? AND needs_sync = 1 \
             ORDER BY modified_at ASC",
        )
        .bind(record_type.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut entities = Vec::with_capacity(rows.len());
        for row in &rows {
            entities.push(entity_from_row(row)?);
        }
        Ok(entities)
    }

    async fn count_dirty(&self) -> anyhow::Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities WHERE needs_sync = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn upsert(&self, entity: &Entity) -> anyhow::Result<()> {
        let payload = serde_json::to_string(entity).map_err(CacheError::from)?;
        let id = entity.id().to_string();

        sqlx::query(
            "INSERT INTO entities (record_type, id, parent_id, needs_sync, modified_at, payload) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (record_type, id) DO UPDATE SET \
               parent_id = excluded.parent_id, \
               needs_sync = excluded.needs_sync, \
               modified_at = excluded.modified_at, \
               payload = excluded.payload",
        )
        .bind(entity.record_type().as_str())
        .bind(&id)
        .bind(entity.parent_id().map(|p| p.to_string()))
        .bind(entity.sync().needs_sync())
        .bind(format_datetime(entity.modified_at()))
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        tracing::trace!(record_type = %entity.record_type(), entity_id = %id, "Upserted entity");
        Ok(())
    }

    async fn delete(&self, record_type: RecordType, id: EntityId) -> anyhow::Result<Vec<Entity>> {
        let mut tx = self.pool.begin().await?;

        // Breadth-first so parents precede their children.
        let mut removed: Vec<Entity> = Vec::new();
        if let Some(root) = fetch_entity(&mut tx, record_type, id).await? {
            removed.push(root);
        }
        let mut next = 0;
        while next < removed.len() {
            let (parent_type, parent_id) = (removed[next].record_type(), removed[next].id());
            if let Some(child_type) = parent_type.child_type() {
                let children = fetch_children(&mut tx, child_type, parent_id).await?;
                removed.extend(children);
            }
            next += 1;
        }

        for entity in &removed {
            let (kind, entity_id) = (entity.record_type().as_str(), entity.id().to_string());
            sqlx::query("DELETE FROM entities WHERE record_type = ? AND id = ?")
                .bind(kind)
                .bind(&entity_id)
                .execute(&mut *tx)
                .await?;
            // Conflicts about a deleted entity can no longer be acted on.
            sqlx::query("DELETE FROM conflicts WHERE record_type = ? AND entity_id = ?")
                .bind(kind)
                .bind(&entity_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            %record_type,
            entity_id = %id,
            removed = removed.len(),
            "Deleted entity"
        );
        Ok(removed)
    }

    async fn children(
        &self,
        child_type: RecordType,
        parent_id: EntityId,
    ) -> anyhow::Result<Vec<Entity>> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_children(&mut conn, child_type, parent_id).await?)
    }

    // --- Deletion queue ---

    async fn enqueue_deletion(&self, deletion: &PendingDeletion) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO pending_deletions (record_id, record_type, enqueued_at) \
             VALUES (?, ?, ?)",
        )
        .bind(deletion.record_id.to_string())
        .bind(deletion.record_type.as_str())
        .bind(format_datetime(deletion.enqueued_at))
        .execute(&self.pool)
        .await?;

        tracing::trace!(record_id = %deletion.record_id, "Enqueued remote deletion");
        Ok(())
    }

    async fn pending_deletions(&self) -> anyhow::Result<Vec<PendingDeletion>> {
        let rows = sqlx::query("SELECT * FROM pending_deletions ORDER BY enqueued_at ASC")
            .fetch_all(&self.pool)
            .await?;

        let mut deletions = Vec::with_capacity(rows.len());
        for row in &rows {
            deletions.push(deletion_from_row(row)?);
        }
        Ok(deletions)
    }

    async fn clear_deletion(&self, record_id: &RecordId) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM pending_deletions WHERE record_id = ?")
            .bind(record_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Conflicts ---

    async fn save_conflict(&self, conflict: &SyncConflict) -> anyhow::Result<()> {
        let id = conflict.id().to_string();
        let payload = serde_json::to_string(conflict).map_err(CacheError::from)?;

        sqlx::query(
            "INSERT OR REPLACE INTO conflicts \
             (id, record_type, entity_id, detected_at, resolution, payload) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(conflict.record_type().as_str())
        .bind(conflict.entity_id().to_string())
        .bind(format_datetime(conflict.detected_at()))
        .bind(conflict.resolution().map(resolution_to_string))
        .bind(&payload)
        .execute(&self.pool)
        .await?;

        tracing::trace!(conflict_id = %id, "Saved conflict");
        Ok(())
    }

    async fn unresolved_conflicts(&self) -> anyhow::Result<Vec<SyncConflict>> {
        let rows = sqlx::query(
            "SELECT * FROM conflicts WHERE resolution IS NULL ORDER BY detected_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut conflicts = Vec::with_capacity(rows.len());
        for row in &rows {
            conflicts.push(conflict_from_row(row)?);
        }
        Ok(conflicts)
    }
}

// ============================================================================
// ISyncStatusStore implementation
// ============================================================================

#[async_trait::async_trait]
impl ISyncStatusStore for SqliteLocalStore {
    async fn last_successful_sync(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        let value: Option<String> = sqlx::query_scalar("SELECT value FROM sync_status WHERE key = ?")
            .bind(LAST_SUCCESSFUL_SYNC_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.as_deref().map(parse_datetime).transpose()?)
    }

    async fn set_last_successful_sync(&self, at: DateTime<Utc>) -> anyhow::Result<()> {
        sqlx::query("INSERT OR REPLACE INTO sync_status (key, value) VALUES (?, ?)")
            .bind(LAST_SUCCESSFUL_SYNC_KEY)
            .bind(format_datetime(at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
