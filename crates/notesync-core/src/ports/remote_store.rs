//! Remote record store port (driven/secondary port)
//!
//! This module defines the interface for the account-scoped remote record
//! database, together with the typed error taxonomy every adapter maps its
//! low-level failures into.
//!
//! ## Design Notes
//!
//! - Unlike the local storage ports, this port returns a typed
//!   [`RemoteError`]: orchestration reacts differently to each kind (go
//!   offline, retry next cycle, record a conflict, treat as already deleted).
//! - Batch operations are non-atomic. A per-item failure is reported in the
//!   outcome, never as an `Err`; only a failure of the whole call is.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::newtypes::RecordId;
use crate::record::{QueryPage, RecordQuery, WireRecord};

// ============================================================================
// AccountStatus
// ============================================================================

/// Availability of the remote account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Available,
    NoAccount,
    Restricted,
    TemporarilyUnavailable,
    Unknown,
}

impl AccountStatus {
    pub fn is_available(&self) -> bool {
        matches!(self, AccountStatus::Available)
    }

    /// The error an operation fails with under this status, `None` if available
    pub fn to_error(self) -> Option<RemoteError> {
        match self {
            AccountStatus::Available => None,
            AccountStatus::NoAccount => Some(RemoteError::NotAuthenticated),
            AccountStatus::Restricted => Some(RemoteError::AccountRestricted),
            AccountStatus::TemporarilyUnavailable => {
                Some(RemoteError::AccountTemporarilyUnavailable)
            }
            AccountStatus::Unknown => Some(RemoteError::Unknown(anyhow::anyhow!(
                "remote account status could not be determined"
            ))),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AccountStatus::Available => "available",
            AccountStatus::NoAccount => "no_account",
            AccountStatus::Restricted => "restricted",
            AccountStatus::TemporarilyUnavailable => "temporarily_unavailable",
            AccountStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

// ============================================================================
// RemoteError
// ============================================================================

/// Error taxonomy of the remote store
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No active remote account session
    #[error("Not authenticated with the remote store")]
    NotAuthenticated,

    #[error("Remote account is restricted")]
    AccountRestricted,

    #[error("Remote account is temporarily unavailable")]
    AccountTemporarilyUnavailable,

    /// Transport-level connectivity failure
    #[error("Network unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Remote storage quota exceeded")]
    QuotaExceeded,

    /// The server copy diverged from the one being written
    #[error("Conflict with server record {}", server_record.record_id)]
    ConflictDetected {
        /// The server's current version
        server_record: Box<WireRecord>,
    },

    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    #[error("Server error: {0}")]
    ServerError(String),

    /// Unmapped failure, wrapping the original cause
    #[error("Unknown remote error: {0:#}")]
    Unknown(anyhow::Error),
}

/// Discriminant of [`RemoteError`], for logging and counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    NotAuthenticated,
    AccountRestricted,
    AccountTemporarilyUnavailable,
    NetworkUnavailable,
    QuotaExceeded,
    ConflictDetected,
    RecordNotFound,
    ServerError,
    Unknown,
}

impl RemoteError {
    pub fn kind(&self) -> RemoteErrorKind {
        match self {
            RemoteError::NotAuthenticated => RemoteErrorKind::NotAuthenticated,
            RemoteError::AccountRestricted => RemoteErrorKind::AccountRestricted,
            RemoteError::AccountTemporarilyUnavailable => {
                RemoteErrorKind::AccountTemporarilyUnavailable
            }
            RemoteError::NetworkUnavailable(_) => RemoteErrorKind::NetworkUnavailable,
            RemoteError::QuotaExceeded => RemoteErrorKind::QuotaExceeded,
            RemoteError::ConflictDetected { .. } => RemoteErrorKind::ConflictDetected,
            RemoteError::RecordNotFound(_) => RemoteErrorKind::RecordNotFound,
            RemoteError::ServerError(_) => RemoteErrorKind::ServerError,
            RemoteError::Unknown(_) => RemoteErrorKind::Unknown,
        }
    }

    /// Whether the next sync cycle should try again without user action
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::AccountTemporarilyUnavailable
                | RemoteError::NetworkUnavailable(_)
                | RemoteError::ServerError(_)
                | RemoteError::Unknown(_)
        )
    }

    /// Short message suitable for the user-visible sync status
    pub fn user_message(&self) -> String {
        match self {
            RemoteError::NotAuthenticated => "Sign in to your account to sync".to_string(),
            RemoteError::AccountRestricted => "Your account is restricted".to_string(),
            RemoteError::AccountTemporarilyUnavailable => {
                "Sync is temporarily unavailable".to_string()
            }
            RemoteError::NetworkUnavailable(_) => "No network connection".to_string(),
            RemoteError::QuotaExceeded => "Storage is full. Free up space to sync".to_string(),
            RemoteError::ConflictDetected { .. } => {
                "Some changes conflict with the server copy".to_string()
            }
            RemoteError::RecordNotFound(_) => "Record no longer exists".to_string(),
            RemoteError::ServerError(_) | RemoteError::Unknown(_) => "Sync failed".to_string(),
        }
    }
}

// ============================================================================
// Batch outcomes
// ============================================================================

/// A single item that failed inside a batch
#[derive(Debug)]
pub struct ItemFailure {
    pub record_id: RecordId,
    pub error: RemoteError,
}

/// Result of a non-atomic batch save
#[derive(Debug, Default)]
pub struct BatchSaveOutcome {
    /// Records the server committed, as returned by the server
    pub saved: Vec<WireRecord>,
    pub failures: Vec<ItemFailure>,
}

/// Result of a non-atomic batch delete
#[derive(Debug, Default)]
pub struct BatchDeleteOutcome {
    pub deleted: Vec<RecordId>,
    pub failures: Vec<ItemFailure>,
}

// ============================================================================
// IRemoteStore trait
// ============================================================================

/// Port trait for the remote record store
///
/// Every operation other than `check_availability` fails fast with the
/// matching [`RemoteError`] when the account is not available.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Returns the account status
    ///
    /// Concurrent calls share one in-flight request.
    async fn check_availability(&self) -> Result<AccountStatus, RemoteError>;

    /// Saves (upserts) a single record
    ///
    /// # Returns
    /// The record as stored by the server, with its change tag
    async fn save(&self, record: &WireRecord) -> Result<WireRecord, RemoteError>;

    /// Fetches a single record, with its assets hydrated
    async fn fetch(&self, id: &RecordId) -> Result<WireRecord, RemoteError>;

    /// Deletes a single record
    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError>;

    /// Fetches one page of a query
    ///
    /// # Arguments
    /// * `query` - Type, predicate, sort and page size
    /// * `cursor` - Continuation marker of the previous page (None for the first)
    async fn query_page(
        &self,
        query: &RecordQuery,
        cursor: Option<&str>,
    ) -> Result<QueryPage, RemoteError>;

    /// Saves many records; each item commits independently
    ///
    /// # Errors
    /// Only when the call as a whole could not be carried out
    async fn batch_save(&self, records: &[WireRecord]) -> Result<BatchSaveOutcome, RemoteError>;

    /// Deletes many records; each item commits independently
    ///
    /// # Errors
    /// Only when the call as a whole could not be carried out
    async fn batch_delete(&self, ids: &[RecordId]) -> Result<BatchDeleteOutcome, RemoteError>;
}

// ============================================================================
// RecordPager
// ============================================================================

/// Lazy page sequence over a query
///
/// Follows continuation markers until the server reports no more pages.
/// Holds at most one page; restartable by constructing a new pager, not
/// resumable across processes.
pub struct RecordPager<'a> {
    store: &'a dyn IRemoteStore,
    query: RecordQuery,
    cursor: Option<String>,
    exhausted: bool,
    skipped: usize,
}

impl<'a> RecordPager<'a> {
    pub fn new(store: &'a dyn IRemoteStore, query: RecordQuery) -> Self {
        Self {
            store,
            query,
            cursor: None,
            exhausted: false,
            skipped: 0,
        }
    }

    /// Unparseable records dropped so far across all pages
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Fetches the next page, `Ok(None)` once the query is exhausted
    pub async fn next_page(&mut self) -> Result<Option<Vec<WireRecord>>, RemoteError> {
        if self.exhausted {
            return Ok(None);
        }
        let page = self
            .store
            .query_page(&self.query, self.cursor.as_deref())
            .await?;
        self.cursor = page.cursor;
        self.exhausted = self.cursor.is_none();
        self.skipped += page.skipped;
        Ok(Some(page.records))
    }
}
