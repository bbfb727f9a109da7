//! Entity <-> wire record mapping
//!
//! Every domain field maps to a named slot. Booleans are stored as `Int8`
//! because the remote schema has no boolean type; string sets are stored as
//! sorted string lists; image payloads become compressed asset references.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{NaiveTime, Utc};
use notesync_core::domain::{
    Avatar, AvatarFields, Entity, EntityId, ImageKind, JournalAttachment, JournalAttachmentFields,
    JournalEntry, JournalEntryFields, Profile, ProfileFields, RecordId, RecordType, Settings,
    SettingsFields, SyncMetadata,
};
use notesync_core::ports::IAssetCompressor;
use notesync_core::record::{AssetRef, FieldValue, RecordReference, WireRecord};
use tracing::warn;

use crate::CodecError;

/// Field names used on the wire
pub mod fields {
    pub const ENTITY_ID: &str = "entityId";
    pub const CREATED_AT: &str = "createdAt";
    pub const MODIFIED_AT: &str = "modifiedAt";

    pub const TITLE: &str = "title";
    pub const CONTENT: &str = "content";
    pub const MOOD: &str = "mood";
    pub const TAGS: &str = "tags";
    pub const IS_FAVORITE: &str = "isFavorite";

    pub const ENTRY_ID: &str = "entryId";
    pub const KIND: &str = "kind";
    pub const CAPTION: &str = "caption";
    pub const IMAGE_DATA: &str = "imageData";

    pub const DISPLAY_NAME: &str = "displayName";
    pub const BIO: &str = "bio";
    pub const WRITING_GOALS: &str = "writingGoals";

    pub const PROFILE_ID: &str = "profileId";
    pub const IS_ACTIVE: &str = "isActive";

    pub const THEME: &str = "theme";
    pub const BIOMETRIC_LOCK_ENABLED: &str = "biometricLockEnabled";
    pub const DAILY_REMINDER_ENABLED: &str = "dailyReminderEnabled";
    pub const REMINDER_TIME: &str = "reminderTime";
    pub const AI_FEATURES_ENABLED: &str = "aiFeaturesEnabled";

    /// Reference from an attachment to its entry
    pub const REF_ENTRY: &str = "entry";
    /// Reference from an avatar to its profile
    pub const REF_PROFILE: &str = "profile";
}

// `%.f` writes the fraction only when non-zero and parses it as optional.
const REMINDER_TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Bidirectional mapping between [`Entity`] and [`WireRecord`]
///
/// Has no knowledge of network or storage state.
#[derive(Clone)]
pub struct RecordCodec {
    compressor: Arc<dyn IAssetCompressor>,
}

impl RecordCodec {
    pub fn new(compressor: Arc<dyn IAssetCompressor>) -> Self {
        Self { compressor }
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encodes an entity into a wire record
    ///
    /// The record identifier is derived from the record type and entity ID,
    /// so encoding the same entity twice addresses the same remote record.
    ///
    /// # Errors
    /// `CodecError::Compression` if an image payload could not be compressed.
    /// No record is produced in that case.
    pub fn encode(&self, entity: &Entity) -> Result<WireRecord, CodecError> {
        let mut record = WireRecord::new(entity.record_id());
        record.change_tag = entity.sync().change_tag().map(str::to_string);
        record.set(fields::ENTITY_ID, FieldValue::String(entity.id().to_string()));
        record.set(fields::CREATED_AT, FieldValue::Timestamp(entity.created_at()));
        record.set(fields::MODIFIED_AT, FieldValue::Timestamp(entity.modified_at()));

        match entity {
            Entity::JournalEntry(e) => encode_entry(&mut record, e.fields()),
            Entity::JournalAttachment(a) => {
                let f = a.fields();
                set_parent(
                    &mut record,
                    fields::ENTRY_ID,
                    fields::REF_ENTRY,
                    RecordType::JournalEntry,
                    f.entry_id,
                );
                record.set(fields::KIND, FieldValue::String(f.kind.as_str().to_string()));
                set_optional(&mut record, fields::CAPTION, f.caption.as_deref());
                self.stage_image(&mut record, f.kind, &f.image_data)?;
            }
            Entity::Profile(p) => {
                let f = p.fields();
                record.set(fields::DISPLAY_NAME, FieldValue::String(f.display_name.clone()));
                set_optional(&mut record, fields::BIO, f.bio.as_deref());
                record.set(fields::WRITING_GOALS, string_list(&f.writing_goals));
            }
            Entity::Avatar(a) => {
                let f = a.fields();
                set_parent(
                    &mut record,
                    fields::PROFILE_ID,
                    fields::REF_PROFILE,
                    RecordType::Profile,
                    f.profile_id,
                );
                record.set(fields::KIND, FieldValue::String(f.kind.as_str().to_string()));
                record.set(fields::IS_ACTIVE, bool_field(f.is_active));
                self.stage_image(&mut record, f.kind, &f.image_data)?;
            }
            Entity::Settings(s) => encode_settings(&mut record, s.fields()),
        }

        Ok(record)
    }

    fn stage_image(
        &self,
        record: &mut WireRecord,
        kind: ImageKind,
        bytes: &[u8],
    ) -> Result<(), CodecError> {
        let compressed = self
            .compressor
            .compress(bytes, kind)
            .map_err(|source| CodecError::Compression {
                record_id: record.record_id.clone(),
                field: fields::IMAGE_DATA,
                source,
            })?;
        let asset = AssetRef {
            asset_id: format!("{}.{}", record.record_id, fields::IMAGE_DATA),
            content_type: compressed.content_type,
            content_encoding: compressed.content_encoding,
            size_bytes: compressed.bytes.len() as u64,
        };
        record.set_asset(fields::IMAGE_DATA, asset, compressed.bytes);
        Ok(())
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    /// Decodes a wire record into an entity of the `expected` type
    ///
    /// Returns `None` (and logs why) when the record cannot be used: wrong
    /// type, missing or malformed identifier, missing mandatory fields, or
    /// an image that cannot be decompressed. Callers skip such records.
    ///
    /// A decoded entity is in sync by definition: `needs_sync` is false and
    /// `last_synced_at` is now.
    pub fn decode(&self, record: &WireRecord, expected: RecordType) -> Option<Entity> {
        match self.try_decode(record, expected) {
            Ok(entity) => Some(entity),
            Err(reason) => {
                warn!(
                    record_id = %record.record_id,
                    expected = %expected,
                    reason,
                    "Skipping undecodable record"
                );
                None
            }
        }
    }

    fn try_decode(&self, record: &WireRecord, expected: RecordType) -> Result<Entity, &'static str> {
        if record.record_type != expected || record.record_id.record_type() != expected {
            return Err("record type mismatch");
        }
        let id: EntityId = record
            .string(fields::ENTITY_ID)
            .ok_or("missing entity id")?
            .parse()
            .map_err(|_| "malformed entity id")?;
        if id != record.record_id.entity_id() {
            return Err("entity id does not match record id");
        }

        let created_at = record
            .timestamp(fields::CREATED_AT)
            .or(record.modified_at)
            .unwrap_or_else(Utc::now);
        let modified_at = record
            .timestamp(fields::MODIFIED_AT)
            .or(record.modified_at)
            .unwrap_or(created_at);
        let sync = SyncMetadata::synced(record.record_id.clone(), Utc::now())
            .with_change_tag(record.change_tag.clone());

        let entity = match expected {
            RecordType::JournalEntry => {
                let domain = JournalEntryFields {
                    title: required_string(record, fields::TITLE)?,
                    content: record.string(fields::CONTENT).unwrap_or_default().to_string(),
                    mood: optional_string(record, fields::MOOD),
                    tags: string_set(record, fields::TAGS),
                    is_favorite: bool_value(record, fields::IS_FAVORITE),
                };
                JournalEntry::from_remote(id, domain, created_at, modified_at, sync).into()
            }
            RecordType::JournalAttachment => {
                let domain = JournalAttachmentFields {
                    entry_id: parent_id(record, fields::ENTRY_ID)?,
                    kind: image_kind(record)?,
                    caption: optional_string(record, fields::CAPTION),
                    image_data: self.image_bytes(record)?,
                };
                JournalAttachment::from_remote(id, domain, created_at, modified_at, sync).into()
            }
            RecordType::Profile => {
                let domain = ProfileFields {
                    display_name: required_string(record, fields::DISPLAY_NAME)?,
                    bio: optional_string(record, fields::BIO),
                    writing_goals: string_set(record, fields::WRITING_GOALS),
                };
                Profile::from_remote(id, domain, created_at, modified_at, sync).into()
            }
            RecordType::Avatar => {
                let domain = AvatarFields {
                    profile_id: parent_id(record, fields::PROFILE_ID)?,
                    kind: image_kind(record)?,
                    image_data: self.image_bytes(record)?,
                    is_active: bool_value(record, fields::IS_ACTIVE),
                };
                Avatar::from_remote(id, domain, created_at, modified_at, sync).into()
            }
            RecordType::Settings => {
                let reminder_time = match record.string(fields::REMINDER_TIME) {
                    Some(s) => Some(
                        NaiveTime::parse_from_str(s, REMINDER_TIME_FORMAT)
                            .map_err(|_| "malformed reminder time")?,
                    ),
                    None => None,
                };
                let domain = SettingsFields {
                    theme: required_string(record, fields::THEME)?,
                    biometric_lock_enabled: bool_value(record, fields::BIOMETRIC_LOCK_ENABLED),
                    daily_reminder_enabled: bool_value(record, fields::DAILY_REMINDER_ENABLED),
                    reminder_time,
                    ai_features_enabled: bool_value(record, fields::AI_FEATURES_ENABLED),
                };
                Settings::from_remote(id, domain, created_at, modified_at, sync).into()
            }
        };
        Ok(entity)
    }

    fn image_bytes(&self, record: &WireRecord) -> Result<Vec<u8>, &'static str> {
        let asset = record.asset(fields::IMAGE_DATA).ok_or("missing image asset")?;
        let bytes = record
            .asset_bytes(fields::IMAGE_DATA)
            .ok_or("image asset was not downloaded")?;
        self.compressor
            .decompress(bytes, &asset.content_encoding)
            .map_err(|_| "image asset could not be decompressed")
    }
}

impl std::fmt::Debug for RecordCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordCodec").finish_non_exhaustive()
    }
}

// ============================================================================
// Field helpers
// ============================================================================

fn encode_entry(record: &mut WireRecord, f: &JournalEntryFields) {
    record.set(fields::TITLE, FieldValue::String(f.title.clone()));
    record.set(fields::CONTENT, FieldValue::String(f.content.clone()));
    set_optional(record, fields::MOOD, f.mood.as_deref());
    record.set(fields::TAGS, string_list(&f.tags));
    record.set(fields::IS_FAVORITE, bool_field(f.is_favorite));
}

fn encode_settings(record: &mut WireRecord, f: &SettingsFields) {
    record.set(fields::THEME, FieldValue::String(f.theme.clone()));
    record.set(fields::BIOMETRIC_LOCK_ENABLED, bool_field(f.biometric_lock_enabled));
    record.set(fields::DAILY_REMINDER_ENABLED, bool_field(f.daily_reminder_enabled));
    if let Some(time) = f.reminder_time {
        record.set(
            fields::REMINDER_TIME,
            FieldValue::String(time.format(REMINDER_TIME_FORMAT).to_string()),
        );
    }
    record.set(fields::AI_FEATURES_ENABLED, bool_field(f.ai_features_enabled));
}

fn set_parent(
    record: &mut WireRecord,
    field: &str,
    reference: &str,
    parent_type: RecordType,
    parent_id: EntityId,
) {
    record.set(field, FieldValue::String(parent_id.to_string()));
    record.set_reference(
        reference,
        RecordReference::cascading(RecordId::for_entity(parent_type, parent_id)),
    );
}

fn set_optional(record: &mut WireRecord, field: &str, value: Option<&str>) {
    if let Some(v) = value {
        record.set(field, FieldValue::String(v.to_string()));
    }
}

fn bool_field(value: bool) -> FieldValue {
    FieldValue::Int8(i8::from(value))
}

fn bool_value(record: &WireRecord, field: &str) -> bool {
    record.int8(field).is_some_and(|v| v != 0)
}

fn string_list(set: &BTreeSet<String>) -> FieldValue {
    FieldValue::StringList(set.iter().cloned().collect())
}

fn string_set(record: &WireRecord, field: &str) -> BTreeSet<String> {
    record
        .string_list(field)
        .map(|list| list.iter().cloned().collect())
        .unwrap_or_default()
}

fn required_string(record: &WireRecord, field: &'static str) -> Result<String, &'static str> {
    record
        .string(field)
        .map(str::to_string)
        .ok_or("missing mandatory field")
}

fn optional_string(record: &WireRecord, field: &str) -> Option<String> {
    record.string(field).map(str::to_string)
}

fn parent_id(record: &WireRecord, field: &str) -> Result<EntityId, &'static str> {
    record
        .string(field)
        .ok_or("missing parent id")?
        .parse()
        .map_err(|_| "malformed parent id")
}

fn image_kind(record: &WireRecord) -> Result<ImageKind, &'static str> {
    record
        .string(fields::KIND)
        .and_then(ImageKind::parse)
        .ok_or("missing or unknown image kind")
}
