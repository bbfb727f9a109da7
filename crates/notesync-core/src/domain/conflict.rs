//! Sync conflicts and queued remote deletions
//!
//! A conflict is raised when a pulled record targets an entity that is still
//! dirty locally, or when the server rejects a push because its copy moved on.
//! Conflicts are always persisted; [`ConflictPolicy`] decides which side, if
//! any, is applied automatically.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::errors::DomainError;
use super::newtypes::{ConflictId, EntityId, RecordId, RecordType};
use crate::record::WireRecord;

/// How detected conflicts are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Keep the local copy and leave the conflict for the user
    #[default]
    Manual,
    /// Keep the local copy; it will overwrite the server on the next push
    KeepLocal,
    /// Overwrite the local copy with the server record
    KeepRemote,
    /// Whichever side has the newer modification time wins
    LastWriterWins,
}

impl ConflictPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::Manual => "manual",
            ConflictPolicy::KeepLocal => "keep_local",
            ConflictPolicy::KeepRemote => "keep_remote",
            ConflictPolicy::LastWriterWins => "last_writer_wins",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "manual" => Ok(ConflictPolicy::Manual),
            "keep_local" => Ok(ConflictPolicy::KeepLocal),
            "keep_remote" => Ok(ConflictPolicy::KeepRemote),
            "last_writer_wins" => Ok(ConflictPolicy::LastWriterWins),
            other => Err(DomainError::ValidationFailed(format!(
                "unknown conflict strategy: {other}"
            ))),
        }
    }
}

/// Outcome applied to a conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    KeptLocal,
    KeptRemote,
}

/// A persisted divergence between a dirty local entity and the server copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConflict {
    id: ConflictId,
    record_type: RecordType,
    entity_id: EntityId,
    local: Entity,
    server_record: WireRecord,
    detected_at: DateTime<Utc>,
    resolution: Option<Resolution>,
    resolved_at: Option<DateTime<Utc>>,
}

impl SyncConflict {
    /// Captures a new, unresolved conflict
    pub fn new(local: Entity, server_record: WireRecord) -> Self {
        Self {
            id: ConflictId::new(),
            record_type: local.record_type(),
            entity_id: local.id(),
            local,
            server_record,
            detected_at: Utc::now(),
            resolution: None,
            resolved_at: None,
        }
    }

    pub fn id(&self) -> ConflictId {
        self.id
    }

    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn local(&self) -> &Entity {
        &self.local
    }

    /// The server's version, kept so a caller can resolve manually
    pub fn server_record(&self) -> &WireRecord {
        &self.server_record
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }

    pub fn resolved_at(&self) -> Option<DateTime<Utc>> {
        self.resolved_at
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    /// Marks the conflict resolved
    pub fn resolve(&mut self, resolution: Resolution) {
        self.resolution = Some(resolution);
        self.resolved_at = Some(Utc::now());
    }
}

/// A remote delete waiting to be mirrored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeletion {
    pub record_id: RecordId,
    pub record_type: RecordType,
    pub enqueued_at: DateTime<Utc>,
}

impl PendingDeletion {
    pub fn new(record_id: RecordId) -> Self {
        Self {
            record_type: record_id.record_type(),
            record_id,
            enqueued_at: Utc::now(),
        }
    }
}
