//! Translation of HTTP and server failures into [`RemoteError`]
//!
//! Every low-level failure maps to exactly one taxonomy entry. The server's
//! `serverErrorCode` wins over the HTTP status when both are present.

use anyhow::anyhow;
use notesync_core::domain::RecordId;
use notesync_core::ports::RemoteError;
use notesync_core::record::WireRecord;
use reqwest::StatusCode;
use serde::Deserialize;

/// Error body returned by the record store, also used per item in batch
/// responses
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerErrorBody {
    #[serde(default)]
    pub record_name: Option<String>,
    pub server_error_code: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub server_record: Option<WireRecord>,
}

/// Maps a transport failure (no HTTP response) to a [`RemoteError`]
pub fn map_transport_error(err: reqwest::Error) -> RemoteError {
    if err.is_connect() || err.is_timeout() {
        RemoteError::NetworkUnavailable(err.to_string())
    } else if err.is_request() && err.status().is_none() {
        // Failed while sending: the server was not reached.
        RemoteError::NetworkUnavailable(err.to_string())
    } else {
        RemoteError::Unknown(anyhow::Error::new(err))
    }
}

/// Maps a server error code, falling back to the HTTP status
///
/// # Arguments
/// * `status` - HTTP status of the response (None for per-item batch errors)
/// * `body` - Parsed error body, if the server sent one
/// * `record_id` - Record the request addressed, used for `RecordNotFound`
pub fn map_server_error(
    status: Option<StatusCode>,
    body: Option<ServerErrorBody>,
    record_id: Option<&RecordId>,
) -> RemoteError {
    let (code, reason, server_record) = match body {
        Some(b) => (Some(b.server_error_code), b.reason, b.server_record),
        None => (None, None, None),
    };
    let reason = reason.unwrap_or_default();

    if let Some(code) = code.as_deref() {
        match code {
            "AUTHENTICATION_REQUIRED" | "AUTHENTICATION_FAILED" => {
                return RemoteError::NotAuthenticated
            }
            "ACCESS_DENIED" | "ACCOUNT_RESTRICTED" => return RemoteError::AccountRestricted,
            "TRY_AGAIN_LATER" | "THROTTLED" | "ZONE_BUSY" | "SERVICE_UNAVAILABLE" => {
                return RemoteError::AccountTemporarilyUnavailable
            }
            "QUOTA_EXCEEDED" => return RemoteError::QuotaExceeded,
            "NOT_FOUND" | "UNKNOWN_ITEM" => {
                if let Some(id) = record_id {
                    return RemoteError::RecordNotFound(id.clone());
                }
            }
            "CONFLICT" | "SERVER_RECORD_CHANGED" => {
                if let Some(record) = server_record {
                    return RemoteError::ConflictDetected {
                        server_record: Box::new(record),
                    };
                }
                return RemoteError::Unknown(anyhow!("conflict reported without a server record"));
            }
            "INTERNAL_ERROR" => return RemoteError::ServerError(reason),
            _ => {}
        }
    }

    match status {
        Some(StatusCode::UNAUTHORIZED) => RemoteError::NotAuthenticated,
        Some(StatusCode::FORBIDDEN) => RemoteError::AccountRestricted,
        Some(StatusCode::TOO_MANY_REQUESTS) | Some(StatusCode::SERVICE_UNAVAILABLE) => {
            RemoteError::AccountTemporarilyUnavailable
        }
        Some(StatusCode::INSUFFICIENT_STORAGE) => RemoteError::QuotaExceeded,
        Some(StatusCode::NOT_FOUND) => match record_id {
            Some(id) => RemoteError::RecordNotFound(id.clone()),
            None => RemoteError::Unknown(anyhow!("HTTP 404: {reason}")),
        },
        Some(StatusCode::CONFLICT) => match server_record {
            Some(record) => RemoteError::ConflictDetected {
                server_record: Box::new(record),
            },
            None => RemoteError::Unknown(anyhow!("HTTP 409 without a server record: {reason}")),
        },
        Some(s) if s.is_server_error() => RemoteError::ServerError(format!("HTTP {s}: {reason}")),
        Some(s) => RemoteError::Unknown(anyhow!(
            "unexpected HTTP {s} (code {}): {reason}",
            code.as_deref().unwrap_or("none")
        )),
        None => RemoteError::Unknown(anyhow!(
            "unmapped server error code {}: {reason}",
            code.as_deref().unwrap_or("none")
        )),
    }
}

/// Makes an owned copy of an error, for sharing one result between callers
pub(crate) fn duplicate(err: &RemoteError) -> RemoteError {
    match err {
        RemoteError::NotAuthenticated => RemoteError::NotAuthenticated,
        RemoteError::AccountRestricted => RemoteError::AccountRestricted,
        RemoteError::AccountTemporarilyUnavailable => RemoteError::AccountTemporarilyUnavailable,
        RemoteError::NetworkUnavailable(m) => RemoteError::NetworkUnavailable(m.clone()),
        RemoteError::QuotaExceeded => RemoteError::QuotaExceeded,
        RemoteError::ConflictDetected { server_record } => RemoteError::ConflictDetected {
            server_record: server_record.clone(),
        },
        RemoteError::RecordNotFound(id) => RemoteError::RecordNotFound(id.clone()),
        RemoteError::ServerError(m) => RemoteError::ServerError(m.clone()),
        RemoteError::Unknown(e) => RemoteError::Unknown(anyhow!("{e:#}")),
    }
}
