//! Domain entities and value objects

pub mod conflict;
pub mod entity;
pub mod errors;
pub mod journal;
pub mod newtypes;
pub mod profile;
pub mod settings;
pub mod sync_metadata;

pub use conflict::{ConflictPolicy, PendingDeletion, Resolution, SyncConflict};
pub use entity::Entity;
pub use errors::DomainError;
pub use journal::{ImageKind, JournalAttachment, JournalAttachmentFields, JournalEntry, JournalEntryFields};
pub use newtypes::{ConflictId, EntityId, RecordId, RecordType};
pub use profile::{Avatar, AvatarFields, Profile, ProfileFields};
pub use settings::{Settings, SettingsFields};
pub use sync_metadata::SyncMetadata;
