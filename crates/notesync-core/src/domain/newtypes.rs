//! Domain newtypes with validation
//!
//! Strongly-typed wrappers for entity identifiers, record types and the
//! deterministic remote record identifiers derived from them.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// UUID-based ID types
// ============================================================================

/// Stable, globally unique identifier of a locally-owned entity
///
/// Assigned once at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(Uuid);

impl EntityId {
    /// Create a new random EntityId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an EntityId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid EntityId: {e}")))
    }
}

impl From<Uuid> for EntityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifier for persisted sync conflicts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConflictId(Uuid);

impl ConflictId {
    /// Create a new random ConflictId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConflictId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ConflictId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ConflictId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid ConflictId: {e}")))
    }
}

// ============================================================================
// RecordType
// ============================================================================

/// The named type of a remote record
///
/// One variant per synchronizable domain type. The string form is the
/// record type name used on the wire and in record identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    JournalEntry,
    JournalAttachment,
    Profile,
    Avatar,
    Settings,
}

impl RecordType {
    /// All record types, parents before children
    ///
    /// Pushing in this order means a child's parent reference always points
    /// at a record the server has already seen.
    pub const PUSH_ORDER: [RecordType; 5] = [
        RecordType::Settings,
        RecordType::Profile,
        RecordType::Avatar,
        RecordType::JournalEntry,
        RecordType::JournalAttachment,
    ];

    /// Returns the wire name of this record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::JournalEntry => "JournalEntry",
            RecordType::JournalAttachment => "JournalAttachment",
            RecordType::Profile => "Profile",
            RecordType::Avatar => "Avatar",
            RecordType::Settings => "Settings",
        }
    }

    /// Returns the parent record type for owned types
    pub fn parent_type(&self) -> Option<RecordType> {
        match self {
            RecordType::JournalAttachment => Some(RecordType::JournalEntry),
            RecordType::Avatar => Some(RecordType::Profile),
            _ => None,
        }
    }

    /// Returns the child record type owned by this type, if any
    pub fn child_type(&self) -> Option<RecordType> {
        match self {
            RecordType::JournalEntry => Some(RecordType::JournalAttachment),
            RecordType::Profile => Some(RecordType::Avatar),
            _ => None,
        }
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "JournalEntry" => Ok(RecordType::JournalEntry),
            "JournalAttachment" => Ok(RecordType::JournalAttachment),
            "Profile" => Ok(RecordType::Profile),
            "Avatar" => Ok(RecordType::Avatar),
            "Settings" => Ok(RecordType::Settings),
            other => Err(DomainError::UnknownRecordType(other.to_string())),
        }
    }
}

// ============================================================================
// RecordId
// ============================================================================

/// Identifier of a remote record, of the form `"{recordType}_{entityId}"`
///
/// Derived deterministically from the record type and the local entity ID,
/// so re-encoding the same entity always addresses the same remote record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId {
    record_type: RecordType,
    entity_id: EntityId,
}

impl RecordId {
    /// Builds the record identifier for an entity
    pub fn for_entity(record_type: RecordType, entity_id: EntityId) -> Self {
        Self {
            record_type,
            entity_id,
        }
    }

    /// Parses a record identifier string
    ///
    /// # Errors
    /// Returns `DomainError::InvalidRecordId` if the string is not
    /// `{knownRecordType}_{uuid}`.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        let (type_part, id_part) = s
            .split_once('_')
            .ok_or_else(|| DomainError::InvalidRecordId(s.to_string()))?;
        let record_type = type_part
            .parse::<RecordType>()
            .map_err(|_| DomainError::InvalidRecordId(s.to_string()))?;
        let entity_id = id_part
            .parse::<EntityId>()
            .map_err(|_| DomainError::InvalidRecordId(s.to_string()))?;
        Ok(Self {
            record_type,
            entity_id,
        })
    }

    /// Returns the record type encoded in this identifier
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Returns the local entity ID encoded in this identifier
    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.record_type, self.entity_id)
    }
}

impl FromStr for RecordId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<RecordId> for String {
    fn from(value: RecordId) -> Self {
        value.to_string()
    }
}
