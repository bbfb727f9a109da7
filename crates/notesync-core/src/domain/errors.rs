//! Domain error types
//!
//! Validation failures and malformed identifiers raised by domain operations.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Unknown remote record type name
    #[error("Unknown record type: {0}")]
    UnknownRecordType(String),

    /// Record identifier does not follow the `{recordType}_{id}` shape
    #[error("Invalid record ID: {0}")]
    InvalidRecordId(String),

    /// An avatar does not belong to the profile operating on it
    #[error("Avatar {avatar} does not belong to profile {profile}")]
    ForeignAvatar {
        /// The avatar that was referenced
        avatar: String,
        /// The profile that attempted the operation
        profile: String,
    },

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
