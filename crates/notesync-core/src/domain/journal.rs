//! Journal entities
//!
//! A [`JournalEntry`] owns zero or more [`JournalAttachment`]s. Ownership is
//! cascading: deleting the entry deletes its attachments, locally and remotely.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::EntityId;
use super::sync_metadata::SyncMetadata;

/// Origin of an image payload
///
/// Drives the compression policy: generated imagery is compressed more
/// aggressively than user photos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageKind {
    /// A photo taken or imported by the user
    Photo,
    /// An AI-generated image
    Generated,
}

impl ImageKind {
    /// Returns the stable wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageKind::Photo => "photo",
            ImageKind::Generated => "generated",
        }
    }

    /// Parses a wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "photo" => Some(ImageKind::Photo),
            "generated" => Some(ImageKind::Generated),
            _ => None,
        }
    }
}

impl std::fmt::Display for ImageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// JournalEntry
// ============================================================================

/// Domain fields of a journal entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryFields {
    pub title: String,
    pub content: String,
    pub mood: Option<String>,
    pub tags: BTreeSet<String>,
    pub is_favorite: bool,
}

/// A single journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    id: EntityId,
    fields: JournalEntryFields,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    sync: SyncMetadata,
}

impl JournalEntry {
    /// Creates a new, unsynced entry
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            fields: JournalEntryFields {
                title: title.into(),
                content: content.into(),
                ..JournalEntryFields::default()
            },
            created_at: now,
            modified_at: now,
            sync: SyncMetadata::new(),
        }
    }

    /// Reconstructs an entry from stored or remote state
    pub fn from_remote(
        id: EntityId,
        fields: JournalEntryFields,
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

    pub fn fields(&self) -> &JournalEntryFields {
        &self.fields
    }

    pub fn title(&self) -> &str {
        &self.fields.title
    }

    pub fn content(&self) -> &str {
        &self.fields.content
    }

    pub fn mood(&self) -> Option<&str> {
        self.fields.mood.as_deref()
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.fields.tags
    }

    pub fn is_favorite(&self) -> bool {
        self.fields.is_favorite
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

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.fields.title = title.into();
        self.touch();
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.fields.content = content.into();
        self.touch();
    }

    pub fn set_mood(&mut self, mood: Option<String>) {
        self.fields.mood = mood;
        self.touch();
    }

    /// Adds a tag; returns false (and leaves the entry clean) if already present
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        let added = self.fields.tags.insert(tag.into());
        if added {
            self.touch();
        }
        added
    }

    /// Removes a tag; returns false if it was not present
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let removed = self.fields.tags.remove(tag);
        if removed {
            self.touch();
        }
        removed
    }

    pub fn set_favorite(&mut self, favorite: bool) {
        self.fields.is_favorite = favorite;
        self.touch();
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
        self.sync.mark_dirty();
    }
}

// ============================================================================
// JournalAttachment
// ============================================================================

/// Domain fields of a journal attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalAttachmentFields {
    pub entry_id: EntityId,
    pub kind: ImageKind,
    pub caption: Option<String>,
    pub image_data: Vec<u8>,
}

/// An image attached to a journal entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalAttachment {
    id: EntityId,
    fields: JournalAttachmentFields,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    sync: SyncMetadata,
}

impl JournalAttachment {
    /// Creates a new, unsynced attachment owned by `entry_id`
    pub fn new(entry_id: EntityId, kind: ImageKind, image_data: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            fields: JournalAttachmentFields {
                entry_id,
                kind,
                caption: None,
                image_data,
            },
            created_at: now,
            modified_at: now,
            sync: SyncMetadata::new(),
        }
    }

    /// Reconstructs an attachment from stored or remote state
    pub fn from_remote(
        id: EntityId,
        fields: JournalAttachmentFields,
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

    pub fn fields(&self) -> &JournalAttachmentFields {
        &self.fields
    }

    pub fn entry_id(&self) -> EntityId {
        self.fields.entry_id
    }

    pub fn kind(&self) -> ImageKind {
        self.fields.kind
    }

    pub fn caption(&self) -> Option<&str> {
        self.fields.caption.as_deref()
    }

    pub fn image_data(&self) -> &[u8] {
        &self.fields.image_data
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

    pub fn set_caption(&mut self, caption: Option<String>) {
        self.fields.caption = caption;
        self.touch();
    }

    pub fn replace_image(&mut self, kind: ImageKind, image_data: Vec<u8>) {
        self.fields.kind = kind;
        self.fields.image_data = image_data;
        self.touch();
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
        self.sync.mark_dirty();
    }
}
