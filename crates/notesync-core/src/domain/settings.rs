//! Application settings entity
//!
//! One settings record per account. Only the user-facing preferences that
//! should follow the user between devices live here.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::EntityId;
use super::sync_metadata::SyncMetadata;

/// Domain fields of the settings record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFields {
    pub theme: String,
    pub biometric_lock_enabled: bool,
    pub daily_reminder_enabled: bool,
    pub reminder_time: Option<NaiveTime>,
    pub ai_features_enabled: bool,
}

impl Default for SettingsFields {
    fn default() -> Self {
        Self {
            theme: "system".to_string(),
            biometric_lock_enabled: false,
            daily_reminder_enabled: false,
            reminder_time: None,
            ai_features_enabled: true,
        }
    }
}

/// Synchronized user preferences
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    id: EntityId,
    fields: SettingsFields,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
    sync: SyncMetadata,
}

impl Settings {
    /// Creates settings with default preferences
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(),
            fields: SettingsFields::default(),
            created_at: now,
            modified_at: now,
            sync: SyncMetadata::new(),
        }
    }

    /// Reconstructs settings from stored or remote state
    pub fn from_remote(
        id: EntityId,
        fields: SettingsFields,
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

    pub fn fields(&self) -> &SettingsFields {
        &self.fields
    }

    pub fn theme(&self) -> &str {
        &self.fields.theme
    }

    pub fn biometric_lock_enabled(&self) -> bool {
        self.fields.biometric_lock_enabled
    }

    pub fn daily_reminder_enabled(&self) -> bool {
        self.fields.daily_reminder_enabled
    }

    pub fn reminder_time(&self) -> Option<NaiveTime> {
        self.fields.reminder_time
    }

    pub fn ai_features_enabled(&self) -> bool {
        self.fields.ai_features_enabled
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

    pub fn set_theme(&mut self, theme: impl Into<String>) {
        self.fields.theme = theme.into();
        self.touch();
    }

    pub fn set_biometric_lock(&mut self, enabled: bool) {
        self.fields.biometric_lock_enabled = enabled;
        self.touch();
    }

    /// Enables or disables the daily reminder
    ///
    /// Disabling clears the reminder time.
    pub fn set_daily_reminder(&mut self, time: Option<NaiveTime>) {
        self.fields.daily_reminder_enabled = time.is_some();
        self.fields.reminder_time = time;
        self.touch();
    }

    pub fn set_ai_features(&mut self, enabled: bool) {
        self.fields.ai_features_enabled = enabled;
        self.touch();
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
        self.sync.mark_dirty();
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}
