//! Profile and avatar entities
//!
//! A [`Profile`] owns zero or more [`Avatar`]s. At most one avatar per profile
//! is flagged active; the profile enforces this, the avatar cannot flip its own
//! flag.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::journal::ImageKind;
use super::newtypes::EntityId;
use super::sync_metadata::SyncMetadata;

// ============================================================================
// Profile
// ============================================================================

/// Domain fields of the user profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFields {
    pub display_name: String,
    pub bio: Option<String>,
    pub writing_goals: BTreeSet<String>,
}

/// The user's profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    id: EntityId,
    fields: ProfileFields,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    sync: SyncMetadata,
}

impl Profile {
    pub fn new(display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            fields: ProfileFields {
                display_name: display_name.into(),
                ..ProfileFields::default()
            },
            created_at: now,
            modified_at: now,
            sync: SyncMetadata::new(),
        }
    }

    /// Reconstructs a profile from stored or remote state
    pub fn from_remote(
        id: EntityId,
        fields: ProfileFields,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
        sync: SyncMetadata,
    ) -> Self {
        Self {
            id,
            fields,
            created_at,
            modified_at,
            sync,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn fields(&self) -> &ProfileFields {
        &self.fields
    }

    pub fn display_name(&self) -> &str {
        &self.fields.display_name
    }

    pub fn bio(&self) -> Option<&str> {
        self.fields.bio.as_deref()
    }

    pub fn writing_goals(&self) -> &BTreeSet<String> {
        &self.fields.writing_goals
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn sync(&self) -> &SyncMetadata {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncMetadata {
        &mut self.sync
    }

    pub fn set_display_name(&mut self, name: impl Into<String>) {
        self.fields.display_name = name.into();
        self.touch();
    }

    pub fn set_bio(&mut self, bio: Option<String>) {
        self.fields.bio = bio;
        self.touch();
    }

    pub fn set_writing_goals(&mut self, goals: BTreeSet<String>) {
        self.fields.writing_goals = goals;
        self.touch();
    }

    /// Makes `avatar_id` the single active avatar of this profile
    ///
    /// Every avatar whose flag changes is marked dirty; avatars already in the
    /// right state are left untouched.
    ///
    /// # Arguments
    /// * `avatars` - All avatars owned by this profile
    /// * `avatar_id` - The avatar to activate
    ///
    /// # Returns
    /// IDs of the avatars that changed, so the caller knows what to persist.
    ///
    /// # Errors
    /// `DomainError::ForeignAvatar` if any avatar in the slice belongs to a
    /// different profile, `DomainError::ValidationFailed` if `avatar_id` is
    /// not among them. Nothing is mutated on error.
    pub fn activate_avatar(
        &self,
        avatars: &mut [Avatar],
        avatar_id: EntityId,
    ) -> Result<Vec<EntityId>, DomainError> {
        if let Some(foreign) = avatars.iter().find(|a| a.profile_id() != self.id) {
            return Err(DomainError::ForeignAvatar {
                avatar: foreign.id().to_string(),
                profile: self.id.to_string(),
            });
        }
        if !avatars.iter().any(|a| a.id() == avatar_id) {
            return Err(DomainError::ValidationFailed(format!(
                "avatar {avatar_id} not found for profile {}",
                self.id
            )));
        }

        let mut changed = Vec::new();
        for avatar in avatars.iter_mut() {
            let should_be_active = avatar.id() == avatar_id;
            if avatar.is_active() != should_be_active {
                avatar.set_active(should_be_active);
                changed.push(avatar.id());
            }
        }
        Ok(changed)
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
        self.sync.mark_dirty();
    }
}

// ============================================================================
// Avatar
// ============================================================================

/// Domain fields of an avatar image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarFields {
    pub profile_id: EntityId,
    pub kind: ImageKind,
    pub image_data: Vec<u8>,
    pub is_active: bool,
}

/// An avatar image owned by a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Avatar {
    id: EntityId,
    fields: AvatarFields,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    sync: SyncMetadata,
}

impl Avatar {
    /// Creates a new, inactive avatar
    pub fn new(profile_id: EntityId, kind: ImageKind, image_data: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            fields: AvatarFields {
                profile_id,
                kind,
                image_data,
                is_active: false,
            },
            created_at: now,
            modified_at: now,
            sync: SyncMetadata::new(),
        }
    }

    /// Reconstructs an avatar from stored or remote state
    pub fn from_remote(
        id: EntityId,
        fields: AvatarFields,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
        sync: SyncMetadata,
    ) -> Self {
        Self {
            id,
            fields,
            created_at,
            modified_at,
            sync,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn fields(&self) -> &AvatarFields {
        &self.fields
    }

    pub fn profile_id(&self) -> EntityId {
        self.fields.profile_id
    }

    pub fn kind(&self) -> ImageKind {
        self.fields.kind
    }

    pub fn image_data(&self) -> &[u8] {
        &self.fields.image_data
    }

    pub fn is_active(&self) -> bool {
        self.fields.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        self.modified_at
    }

    pub fn sync(&self) -> &SyncMetadata {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut SyncMetadata {
        &mut self.sync
    }

    pub fn replace_image(&mut self, kind: ImageKind, image_data: Vec<u8>) {
        self.fields.kind = kind;
        self.fields.image_data = image_data;
        self.touch();
    }

    // Only the owning profile toggles activation.
    fn set_active(&mut self, active: bool) {
        self.fields.is_active = active;
        self.touch();
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
        self.sync.mark_dirty();
    }
}
