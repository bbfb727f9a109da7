//! Local change tracking
//!
//! [`ChangeTracker`] is the entry point for local mutations. It writes to the
//! local store and keeps the coordinator's pending-sync counter in step with
//! the `needs_sync` flags it flips. Deletes are cascaded locally and queued
//! for mirroring on the remote store.

use std::sync::Arc;

use tracing::{debug, info};

use notesync_core::domain::{
    Avatar, DomainError, Entity, EntityId, PendingDeletion, RecordType,
};
use notesync_core::ports::ILocalStore;

use crate::coordinator::CoordinatorHandle;
use crate::SyncError;

/// Applies local mutations and reports them to the coordinator
#[derive(Clone)]
pub struct ChangeTracker {
    local: Arc<dyn ILocalStore>,
    coordinator: CoordinatorHandle,
}

impl ChangeTracker {
    pub fn new(local: Arc<dyn ILocalStore>, coordinator: CoordinatorHandle) -> Self {
        Self { local, coordinator }
    }

    /// Persists an entity
    ///
    /// The pending counter moves only when the stored `needs_sync` flag
    /// actually flips; saving an already-dirty entity again does not count
    /// twice.
    pub async fn save(&self, entity: &Entity) -> Result<(), SyncError> {
        let was_dirty = self
            .local
            .get(entity.record_type(), entity.id())
            .await?
            .map(|stored| stored.sync().needs_sync());
        let is_dirty = entity.sync().needs_sync();

        self.local.upsert(entity).await?;

        match (was_dirty, is_dirty) {
            (None | Some(false), true) => self.coordinator.entity_dirtied().await?,
            (Some(true), false) => self.coordinator.entities_cleaned(1).await?,
            _ => {}
        }
        Ok(())
    }

    /// Deletes an entity and everything it owns
    ///
    /// The remote delete is queued for the root record only when it was
    /// ever pushed; the remote cascades it to the children through their
    /// parent references. Children are queued individually only when the
    /// root itself never reached the server.
    ///
    /// # Returns
    /// The removed entities, parent first
    pub async fn delete(
        &self,
        record_type: RecordType,
        id: EntityId,
    ) -> Result<Vec<Entity>, SyncError> {
        let removed = self.local.delete(record_type, id).await?;
        let Some((root, children)) = removed.split_first() else {
            debug!(%record_type, entity_id = %id, "Nothing to delete");
            return Ok(removed);
        };

        let mut queued = 0usize;
        if let Some(key) = root.sync().remote_key() {
            self.local
                .enqueue_deletion(&PendingDeletion::new(key.clone()))
                .await?;
            queued += 1;
        } else {
            for child in children {
                if let Some(key) = child.sync().remote_key() {
                    self.local
                        .enqueue_deletion(&PendingDeletion::new(key.clone()))
                        .await?;
                    queued += 1;
                }
            }
        }

        let dirty = removed.iter().filter(|e| e.sync().needs_sync()).count() as u64;
        if dirty > 0 {
            self.coordinator.entities_cleaned(dirty).await?;
        }

        info!(
            %record_type,
            entity_id = %id,
            removed = removed.len(),
            queued,
            "Deleted entity locally"
        );
        Ok(removed)
    }

    /// Makes one avatar of a profile active and deactivates the others
    ///
    /// # Returns
    /// IDs of the avatars whose flag changed
    pub async fn activate_avatar(
        &self,
        profile_id: EntityId,
        avatar_id: EntityId,
    ) -> Result<Vec<EntityId>, SyncError> {
        let profile = match self.local.get(RecordType::Profile, profile_id).await? {
            Some(Entity::Profile(profile)) => profile,
            _ => {
                return Err(DomainError::ValidationFailed(format!(
                    "profile {profile_id} not found"
                ))
                .into())
            }
        };

        let mut avatars: Vec<Avatar> = self
            .local
            .children(RecordType::Avatar, profile_id)
            .await?
            .into_iter()
            .filter_map(|entity| match entity {
                Entity::Avatar(avatar) => Some(avatar),
                _ => None,
            })
            .collect();

        let changed = profile.activate_avatar(&mut avatars, avatar_id)?;
        for avatar in avatars.into_iter().filter(|a| changed.contains(&a.id())) {
            self.save(&Entity::Avatar(avatar)).await?;
        }
        Ok(changed)
    }
}
