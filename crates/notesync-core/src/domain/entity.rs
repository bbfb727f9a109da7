//! Sum type over every synchronizable entity
//!
//! Orchestration code handles entities uniformly through [`Entity`]; the
//! codec and the local store dispatch on the variant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::journal::{JournalAttachment, JournalEntry};
use super::newtypes::{EntityId, RecordId, RecordType};
use super::profile::{Avatar, Profile};
use super::settings::Settings;
use super::sync_metadata::SyncMetadata;

/// Any synchronizable domain entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record_type", content = "entity")]
pub enum Entity {
    JournalEntry(JournalEntry),
    JournalAttachment(JournalAttachment),
    Profile(Profile),
    Avatar(Avatar),
    Settings(Settings),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::JournalEntry(e) => e.id(),
            Entity::JournalAttachment(e) => e.id(),
            Entity::Profile(e) => e.id(),
            Entity::Avatar(e) => e.id(),
            Entity::Settings(e) => e.id(),
        }
    }

    pub fn record_type(&self) -> RecordType {
        match self {
            Entity::JournalEntry(_) => RecordType::JournalEntry,
            Entity::JournalAttachment(_) => RecordType::JournalAttachment,
            Entity::Profile(_) => RecordType::Profile,
            Entity::Avatar(_) => RecordType::Avatar,
            Entity::Settings(_) => RecordType::Settings,
        }
    }

    /// The deterministic remote record identifier for this entity
    pub fn record_id(&self) -> RecordId {
        RecordId::for_entity(self.record_type(), self.id())
    }

    pub fn sync(&self) -> &SyncMetadata {
        match self {
            Entity::JournalEntry(e) => e.sync(),
            Entity::JournalAttachment(e) => e.sync(),
            Entity::Profile(e) => e.sync(),
            Entity::Avatar(e) => e.sync(),
            Entity::Settings(e) => e.sync(),
        }
    }

    pub fn sync_mut(&mut self) -> &mut SyncMetadata {
        match self {
            Entity::JournalEntry(e) => e.sync_mut(),
            Entity::JournalAttachment(e) => e.sync_mut(),
            Entity::Profile(e) => e.sync_mut(),
            Entity::Avatar(e) => e.sync_mut(),
            Entity::Settings(e) => e.sync_mut(),
        }
    }

    /// Owning entity for child types (attachment → entry, avatar → profile)
    pub fn parent_id(&self) -> Option<EntityId> {
        match self {
            Entity::JournalAttachment(e) => Some(e.entry_id()),
            Entity::Avatar(e) => Some(e.profile_id()),
            _ => None,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Entity::JournalEntry(e) => e.created_at(),
            Entity::JournalAttachment(e) => e.created_at(),
            Entity::Profile(e) => e.created_at(),
            Entity::Avatar(e) => e.created_at(),
            Entity::Settings(e) => e.created_at(),
        }
    }

    pub fn modified_at(&self) -> DateTime<Utc> {
        match self {
            Entity::JournalEntry(e) => e.modified_at(),
            Entity::JournalAttachment(e) => e.modified_at(),
            Entity::Profile(e) => e.modified_at(),
            Entity::Avatar(e) => e.modified_at(),
            Entity::Settings(e) => e.modified_at(),
        }
    }

    /// True if the domain fields (not the sync bookkeeping) are equal
    pub fn same_content(&self, other: &Entity) -> bool {
        match (self, other) {
            (Entity::JournalEntry(a), Entity::JournalEntry(b)) => {
                a.id() == b.id() && a.fields() == b.fields()
            }
            (Entity::JournalAttachment(a), Entity::JournalAttachment(b)) => {
                a.id() == b.id() && a.fields() == b.fields()
            }
            (Entity::Profile(a), Entity::Profile(b)) => a.id() == b.id() && a.fields() == b.fields(),
            (Entity::Avatar(a), Entity::Avatar(b)) => a.id() == b.id() && a.fields() == b.fields(),
            (Entity::Settings(a), Entity::Settings(b)) => {
                a.id() == b.id() && a.fields() == b.fields()
            }
            _ => false,
        }
    }
}

impl From<JournalEntry> for Entity {
    fn from(value: JournalEntry) -> Self {
        Entity::JournalEntry(value)
    }
}

impl From<JournalAttachment> for Entity {
    fn from(value: JournalAttachment) -> Self {
        Entity::JournalAttachment(value)
    }
}

impl From<Profile> for Entity {
    fn from(value: Profile) -> Self {
        Entity::Profile(value)
    }
}

impl From<Avatar> for Entity {
    fn from(value: Avatar) -> Self {
        Entity::Avatar(value)
    }
}

impl From<Settings> for Entity {
    fn from(value: Settings) -> Self {
        Entity::Settings(value)
    }
}
