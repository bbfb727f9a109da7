//! Remote wire record model
//!
//! A [`WireRecord`] is a named-type record with a flat field map, optional
//! typed references to other records and binary assets that travel
//! out-of-band. The JSON shape of these types is the record store's wire
//! format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::newtypes::{RecordId, RecordType};

/// Name of the server-maintained modification time, usable in query filters
/// and sort descriptors
pub const SERVER_MODIFIED_AT: &str = "___modTime";

// ============================================================================
// Field values
// ============================================================================

/// Reference to a binary payload stored as a separate large object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetRef {
    pub asset_id: String,
    pub content_type: String,
    /// `deflate` or `identity`
    pub content_encoding: String,
    /// Size of the encoded bytes as uploaded
    pub size_bytes: u64,
}

/// A scalar, list, timestamp or asset value in a record's field map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Int8(i8),
    Int64(i64),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    Timestamp(DateTime<Utc>),
    Asset(AssetRef),
}

/// What the server does to the referencing record when the target is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceAction {
    #[default]
    None,
    DeleteSelf,
}

/// Typed link from one record to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordReference {
    pub record_id: RecordId,
    pub action: ReferenceAction,
}

impl RecordReference {
    /// A reference whose target's deletion cascades to the referencing record
    pub fn cascading(record_id: RecordId) -> Self {
        Self {
            record_id,
            action: ReferenceAction::DeleteSelf,
        }
    }
}

// ============================================================================
// WireRecord
// ============================================================================

/// A record as exchanged with the remote store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRecord {
    pub record_type: RecordType,
    #[serde(rename = "recordName")]
    pub record_id: RecordId,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldValue>,
    #[serde(default)]
    pub references: BTreeMap<String, RecordReference>,
    /// Asset bytes keyed by field name
    ///
    /// Staged by the codec on encode, uploaded separately by the remote
    /// client, and hydrated again on fetch. Never part of the record JSON.
    #[serde(skip)]
    pub assets: BTreeMap<String, Vec<u8>>,
    /// Server version tag, absent until the record was saved once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_tag: Option<String>,
    /// Server-side modification time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
}

impl WireRecord {
    /// Creates an empty record addressed by `record_id`
    pub fn new(record_id: RecordId) -> Self {
        Self {
            record_type: record_id.record_type(),
            record_id,
            fields: BTreeMap::new(),
            references: BTreeMap::new(),
            assets: BTreeMap::new(),
            change_tag: None,
            modified_at: None,
        }
    }

    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.fields.insert(name.to_string(), value);
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Attaches a binary asset: the reference goes in the field map, the
    /// bytes are staged for upload
    pub fn set_asset(&mut self, name: &str, asset: AssetRef, bytes: Vec<u8>) {
        self.fields.insert(name.to_string(), FieldValue::Asset(asset));
        self.assets.insert(name.to_string(), bytes);
    }

    pub fn set_reference(&mut self, name: &str, reference: RecordReference) {
        self.references.insert(name.to_string(), reference);
    }

    pub fn reference(&self, name: &str) -> Option<&RecordReference> {
        self.references.get(name)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::String(s)) => Some(s),
            _ => None,
        }
    }

    pub fn int8(&self, name: &str) -> Option<i8> {
        match self.fields.get(name) {
            Some(FieldValue::Int8(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn int64(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(FieldValue::Int64(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn string_list(&self, name: &str) -> Option<&[String]> {
        match self.fields.get(name) {
            Some(FieldValue::StringList(v)) => Some(v),
            _ => None,
        }
    }

    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        match self.fields.get(name) {
            Some(FieldValue::Timestamp(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn asset(&self, name: &str) -> Option<&AssetRef> {
        match self.fields.get(name) {
            Some(FieldValue::Asset(a)) => Some(a),
            _ => None,
        }
    }

    /// Staged or hydrated bytes of an asset field
    pub fn asset_bytes(&self, name: &str) -> Option<&[u8]> {
        self.assets.get(name).map(Vec::as_slice)
    }

    /// Iterates over `(field name, asset)` pairs
    pub fn asset_fields(&self) -> impl Iterator<Item = (&str, &AssetRef)> {
        self.fields.iter().filter_map(|(name, value)| match value {
            FieldValue::Asset(a) => Some((name.as_str(), a)),
            _ => None,
        })
    }
}

// ============================================================================
// Queries
// ============================================================================

/// Comparison operator of a query filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Comparator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEquals,
    LessThan,
    LessThanOrEquals,
}

/// A single field predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    #[serde(rename = "fieldName")]
    pub field: String,
    pub comparator: Comparator,
    #[serde(rename = "fieldValue")]
    pub value: FieldValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortDescriptor {
    #[serde(rename = "fieldName")]
    pub field: String,
    pub ascending: bool,
}

/// Query over one record type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub record_type: RecordType,
    pub filters: Vec<Filter>,
    pub sort: Vec<SortDescriptor>,
    pub page_size: usize,
}

impl RecordQuery {
    /// All records of a type, 100 per page
    pub fn all(record_type: RecordType) -> Self {
        Self {
            record_type,
            filters: Vec::new(),
            sort: Vec::new(),
            page_size: 100,
        }
    }

    /// Restricts to records the server modified after `since`, oldest first
    pub fn modified_since(mut self, since: DateTime<Utc>) -> Self {
        self.filters.push(Filter {
            field: SERVER_MODIFIED_AT.to_string(),
            comparator: Comparator::GreaterThan,
            value: FieldValue::Timestamp(since),
        });
        self.sort.push(SortDescriptor {
            field: SERVER_MODIFIED_AT.to_string(),
            ascending: true,
        });
        self
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

/// One page of query results
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage {
    pub records: Vec<WireRecord>,
    /// Opaque continuation marker; `None` when the server has no more pages
    pub cursor: Option<String>,
    /// Records on this page the store could not parse and left out
    pub skipped: usize,
}
