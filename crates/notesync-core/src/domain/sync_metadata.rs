//! Per-entity synchronization metadata
//!
//! Every synchronizable entity embeds a [`SyncMetadata`] value that tracks
//! whether the entity has local changes not yet mirrored to the remote store.
//!
//! ## Invariant
//!
//! `needs_sync == false` implies `remote_key.is_some() && last_synced_at.is_some()`.
//! The flag can only be cleared through [`SyncMetadata::mark_synced`], which
//! sets both at once, so the invariant holds by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RecordId;

/// Synchronization bookkeeping embedded in each domain entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Identifier of the corresponding remote record (absent until first push)
    remote_key: Option<RecordId>,
    /// When this entity was last confirmed in sync with the remote store
    last_synced_at: Option<DateTime<Utc>>,
    /// True whenever a domain field changed since the last successful sync
    needs_sync: bool,
    /// Last failure reason, cleared on success
    last_sync_error: Option<String>,
    /// Server version tag of the record this entity was last synced with
    #[serde(default)]
    change_tag: Option<String>,
}

impl SyncMetadata {
    /// Metadata for a freshly created entity: dirty, never synced
    pub fn new() -> Self {
        Self {
            remote_key: None,
            last_synced_at: None,
            needs_sync: true,
            last_sync_error: None,
            change_tag: None,
        }
    }

    /// Metadata for an entity that was just written down from the server
    pub fn synced(remote_key: RecordId, at: DateTime<Utc>) -> Self {
        Self {
            remote_key: Some(remote_key),
            last_synced_at: Some(at),
            needs_sync: false,
            last_sync_error: None,
            change_tag: None,
        }
    }

    /// Sets the server version tag the metadata starts from
    pub fn with_change_tag(mut self, change_tag: Option<String>) -> Self {
        self.change_tag = change_tag;
        self
    }

    /// Returns the remote record identifier, if the entity was ever pushed
    pub fn remote_key(&self) -> Option<&RecordId> {
        self.remote_key.as_ref()
    }

    /// Returns when the entity was last synced
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    /// Returns true if the entity has unsynchronized local changes
    pub fn needs_sync(&self) -> bool {
        self.needs_sync
    }

    /// Returns the last recorded sync failure
    pub fn last_sync_error(&self) -> Option<&str> {
        self.last_sync_error.as_deref()
    }

    /// Returns the server version the next push is based on
    pub fn change_tag(&self) -> Option<&str> {
        self.change_tag.as_deref()
    }

    /// Adopts a server version tag without touching the dirty flag
    ///
    /// Used after a save, and when a conflict is resolved in favour of the
    /// local copy so the next push overwrites the server version it saw.
    pub fn set_change_tag(&mut self, change_tag: Option<String>) {
        self.change_tag = change_tag;
    }

    /// Flags the entity as dirty after a local mutation
    ///
    /// Returns true if the flag flipped from clean to dirty, which is the
    /// signal the coordinator uses to increment its pending counter.
    pub fn mark_dirty(&mut self) -> bool {
        let flipped = !self.needs_sync;
        self.needs_sync = true;
        flipped
    }

    /// Records a successful push (or pull) of this entity
    ///
    /// Returns true if the flag flipped from dirty to clean.
    pub fn mark_synced(&mut self, remote_key: RecordId, at: DateTime<Utc>) -> bool {
        let flipped = self.needs_sync;
        self.remote_key = Some(remote_key);
        self.last_synced_at = Some(at);
        self.needs_sync = false;
        self.last_sync_error = None;
        flipped
    }

    /// Records a failed sync attempt; the entity stays dirty
    pub fn record_failure(&mut self, reason: impl Into<String>) {
        self.last_sync_error = Some(reason.into());
    }
}

impl Default for SyncMetadata {
    fn default() -> Self {
        Self::new()
    }
}
