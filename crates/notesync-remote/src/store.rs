//! HttpRemoteStore - IRemoteStore implementation over the record store API
//!
//! Wraps the [`RecordStoreClient`] to fulfil the [`IRemoteStore`] port
//! contract.
//!
//! ## Design Notes
//!
//! - The account status is cached. Every CRUD call fails fast unless the
//!   cached (or freshly checked) status is `available`; a
//!   `NotAuthenticated` response drops the cache.
//! - Concurrent `check_availability` calls share one request: the first
//!   caller owns a `watch` sender, later callers wait on its receiver.
//! - Staged assets are uploaded before the record that references them and
//!   hydrated after every fetch, so callers only ever see complete records.
//! - Records in query and modify responses are parsed one by one. A query
//!   record that does not parse is logged and dropped; the rest of the page
//!   stands. An unreadable modify result fails only its own item.
//! - Saves are `update` operations: the server checks the record's change
//!   tag and rejects a stale one with a conflict carrying its own copy.

use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use notesync_core::domain::RecordId;
use notesync_core::ports::{
    AccountStatus, BatchDeleteOutcome, BatchSaveOutcome, IRemoteStore, ItemFailure, RemoteError,
    RemoteErrorKind,
};
use notesync_core::record::{Filter, QueryPage, RecordQuery, SortDescriptor, WireRecord};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::client::RecordStoreClient;
use crate::errors::{duplicate, map_server_error, ServerErrorBody};

type SharedStatus = Option<Result<AccountStatus, RemoteError>>;

// ============================================================================
// Wire DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
struct AccountStatusResponse {
    status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    record_type: &'a str,
    filters: &'a [Filter],
    sort_by: &'a [SortDescriptor],
    results_limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    continuation_marker: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    /// Kept raw so one malformed record cannot fail the page
    #[serde(default)]
    records: Vec<serde_json::Value>,
    #[serde(default)]
    continuation_marker: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    atomic: bool,
    operations: Vec<ModifyOperation<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyOperation<'a> {
    operation_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<&'a WireRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record_name: Option<&'a RecordId>,
}

#[derive(Debug, Deserialize)]
struct ModifyResponse {
    #[serde(default)]
    records: Vec<serde_json::Value>,
}

/// One entry of a modify response, in request order
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ModifyResult {
    Failed(ServerErrorBody),
    Saved(Box<WireRecord>),
    Deleted {
        #[serde(rename = "recordName")]
        #[allow(dead_code)]
        record_name: String,
    },
}

/// Parses one raw record of a response
fn parse_record(raw: serde_json::Value) -> Result<WireRecord, serde_json::Error> {
    serde_json::from_value(raw)
}

/// Parses one raw modify result; `None` if it matches no known shape
fn parse_modify_result(raw: serde_json::Value) -> Option<ModifyResult> {
    match serde_json::from_value(raw) {
        Ok(result) => Some(result),
        Err(e) => {
            warn!(error = %e, "Unparseable modify result");
            None
        }
    }
}

fn malformed_result(record_id: &RecordId) -> RemoteError {
    RemoteError::Unknown(anyhow!("malformed modify result for {record_id}"))
}

fn parse_account_status(raw: &str) -> AccountStatus {
    match raw {
        "available" => AccountStatus::Available,
        "no_account" => AccountStatus::NoAccount,
        "restricted" => AccountStatus::Restricted,
        "temporarily_unavailable" => AccountStatus::TemporarilyUnavailable,
        _ => AccountStatus::Unknown,
    }
}

// ============================================================================
// HttpRemoteStore
// ============================================================================

#[derive(Default)]
struct AvailabilityState {
    cached: Option<AccountStatus>,
    in_flight: Option<watch::Receiver<SharedStatus>>,
}

/// [`IRemoteStore`] backed by the record store HTTP API
pub struct HttpRemoteStore {
    client: RecordStoreClient,
    availability: Mutex<AvailabilityState>,
}

impl HttpRemoteStore {
    pub fn new(client: RecordStoreClient) -> Self {
        Self {
            client,
            availability: Mutex::new(AvailabilityState::default()),
        }
    }

    /// Returns the last known account status without a network call
    pub fn cached_status(&self) -> Option<AccountStatus> {
        self.availability_state().cached
    }

    fn availability_state(&self) -> MutexGuard<'_, AvailabilityState> {
        self.availability
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drops the cached status when the server says the session is gone
    fn observe(&self, err: RemoteError) -> RemoteError {
        if err.kind() == RemoteErrorKind::NotAuthenticated {
            debug!("Invalidating cached account status");
            self.availability_state().cached = None;
        }
        err
    }

    async fn fetch_account_status(&self) -> Result<AccountStatus, RemoteError> {
        let response: AccountStatusResponse = self
            .client
            .execute_json(self.client.request(Method::GET, "/account/status"), None)
            .await?;
        Ok(parse_account_status(&response.status))
    }

    /// Fails fast unless the account is available
    async fn ensure_available(&self) -> Result<(), RemoteError> {
        if self.cached_status() == Some(AccountStatus::Available) {
            return Ok(());
        }
        let status = self.check_availability().await?;
        match status.to_error() {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Uploads every staged asset of a record
    async fn upload_assets(&self, record: &WireRecord) -> Result<(), RemoteError> {
        for (field, asset) in record.asset_fields() {
            let Some(bytes) = record.asset_bytes(field) else {
                return Err(RemoteError::Unknown(anyhow!(
                    "asset field {field} of {} has no staged bytes",
                    record.record_id
                )));
            };
            self.client
                .upload_asset(
                    &asset.asset_id,
                    bytes.to_vec(),
                    &asset.content_type,
                    &asset.content_encoding,
                    &record.record_id,
                )
                .await?;
        }
        Ok(())
    }

    /// Downloads the bytes of every asset field into `record.assets`
    async fn hydrate(&self, record: &mut WireRecord) -> Result<(), RemoteError> {
        let pending: Vec<(String, String)> = record
            .asset_fields()
            .filter(|(field, _)| record.asset_bytes(field).is_none())
            .map(|(field, asset)| (field.to_string(), asset.asset_id.clone()))
            .collect();
        for (field, asset_id) in pending {
            let bytes = self
                .client
                .download_asset(&asset_id, &record.record_id)
                .await?;
            record.assets.insert(field, bytes);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl IRemoteStore for HttpRemoteStore {
    async fn check_availability(&self) -> Result<AccountStatus, RemoteError> {
        let (sender, mut receiver) = {
            let mut state = self.availability_state();
            match &state.in_flight {
                // A dropped sender means the owning call was cancelled; start over.
                Some(rx) if rx.has_changed().is_ok() => (None, rx.clone()),
                _ => {
                    let (tx, rx) = watch::channel(None);
                    state.in_flight = Some(rx.clone());
                    (Some(tx), rx)
                }
            }
        };

        let Some(sender) = sender else {
            debug!("Joining in-flight availability check");
            let shared = receiver
                .wait_for(Option::is_some)
                .await
                .map_err(|_| RemoteError::Unknown(anyhow!("availability check was abandoned")))?;
            return match shared.as_ref() {
                Some(Ok(status)) => Ok(*status),
                Some(Err(err)) => Err(duplicate(err)),
                None => Err(RemoteError::Unknown(anyhow!("availability check produced no result"))),
            };
        };

        let result = self.fetch_account_status().await;
        {
            let mut state = self.availability_state();
            state.in_flight = None;
            match &result {
                Ok(status) => state.cached = Some(*status),
                Err(_) => state.cached = None,
            }
        }
        match &result {
            Ok(status) => info!(%status, "Remote account status"),
            Err(e) => warn!(error = %e, "Availability check failed"),
        }
        let shared = match &result {
            Ok(status) => Ok(*status),
            Err(err) => Err(duplicate(err)),
        };
        sender.send_replace(Some(shared));
        result
    }

    async fn save(&self, record: &WireRecord) -> Result<WireRecord, RemoteError> {
        self.ensure_available().await?;
        self.upload_assets(record)
            .await
            .map_err(|e| self.observe(e))?;

        let request = self
            .client
            .request(Method::PUT, &format!("/records/{}", record.record_id))
            .json(record);
        let mut saved: WireRecord = self
            .client
            .execute_json(request, Some(&record.record_id))
            .await
            .map_err(|e| self.observe(e))?;
        saved.assets = record.assets.clone();
        debug!(record_id = %saved.record_id, "Saved record");
        Ok(saved)
    }

    async fn fetch(&self, id: &RecordId) -> Result<WireRecord, RemoteError> {
        self.ensure_available().await?;
        let request = self.client.request(Method::GET, &format!("/records/{id}"));
        let mut record: WireRecord = self
            .client
            .execute_json(request, Some(id))
            .await
            .map_err(|e| self.observe(e))?;
        self.hydrate(&mut record)
            .await
            .map_err(|e| self.observe(e))?;
        Ok(record)
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.ensure_available().await?;
        let request = self.client.request(Method::DELETE, &format!("/records/{id}"));
        self.client
            .execute(request, Some(id))
            .await
            .map_err(|e| self.observe(e))?;
        debug!(record_id = %id, "Deleted record");
        Ok(())
    }

    async fn query_page(
        &self,
        query: &RecordQuery,
        cursor: Option<&str>,
    ) -> Result<QueryPage, RemoteError> {
        self.ensure_available().await?;
        let body = QueryRequest {
            record_type: query.record_type.as_str(),
            filters: &query.filters,
            sort_by: &query.sort,
            results_limit: query.page_size,
            continuation_marker: cursor,
        };
        let request = self
            .client
            .request(Method::POST, "/records/query")
            .json(&body);
        let response: QueryResponse = self
            .client
            .execute_json(request, None)
            .await
            .map_err(|e| self.observe(e))?;

        let mut records = Vec::with_capacity(response.records.len());
        let mut skipped = 0usize;
        for raw in response.records {
            let mut record = match parse_record(raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(
                        record_type = %query.record_type,
                        error = %e,
                        "Skipping unparseable record"
                    );
                    skipped += 1;
                    continue;
                }
            };
            match self.hydrate(&mut record).await {
                Ok(()) => {}
                // Leave it incomplete; the codec skips records without asset bytes.
                Err(RemoteError::RecordNotFound(_)) => {
                    warn!(record_id = %record.record_id, "Asset missing on server");
                }
                Err(e) => return Err(self.observe(e)),
            }
            records.push(record);
        }

        debug!(
            record_type = %query.record_type,
            count = records.len(),
            skipped,
            more = response.continuation_marker.is_some(),
            "Fetched query page"
        );
        Ok(QueryPage {
            records,
            cursor: response.continuation_marker,
            skipped,
        })
    }

    async fn batch_save(&self, records: &[WireRecord]) -> Result<BatchSaveOutcome, RemoteError> {
        let mut outcome = BatchSaveOutcome::default();
        if records.is_empty() {
            return Ok(outcome);
        }
        self.ensure_available().await?;

        // Assets first; a record whose assets failed is not submitted.
        let mut ready = Vec::with_capacity(records.len());
        for record in records {
            match self.upload_assets(record).await {
                Ok(()) => ready.push(record),
                Err(e @ RemoteError::NetworkUnavailable(_))
                | Err(e @ RemoteError::NotAuthenticated) => return Err(self.observe(e)),
                Err(error) => {
                    warn!(record_id = %record.record_id, error = %error, "Asset upload failed");
                    outcome.failures.push(ItemFailure {
                        record_id: record.record_id.clone(),
                        error,
                    });
                }
            }
        }
        if ready.is_empty() {
            return Ok(outcome);
        }

        let body = ModifyRequest {
            atomic: false,
            operations: ready
                .iter()
                .map(|record| ModifyOperation {
                    operation_type: "update",
                    record: Some(record),
                    record_name: None,
                })
                .collect(),
        };
        let request = self
            .client
            .request(Method::POST, "/records/modify")
            .json(&body);
        let response: ModifyResponse = self
            .client
            .execute_json(request, None)
            .await
            .map_err(|e| self.observe(e))?;
        if response.records.len() != ready.len() {
            return Err(RemoteError::ServerError(format!(
                "modify returned {} results for {} operations",
                response.records.len(),
                ready.len()
            )));
        }

        for (sent, raw) in ready.into_iter().zip(response.records) {
            let Some(result) = parse_modify_result(raw) else {
                // Outcome unknown; the entity stays dirty and is retried.
                outcome.failures.push(ItemFailure {
                    record_id: sent.record_id.clone(),
                    error: malformed_result(&sent.record_id),
                });
                continue;
            };
            match result {
                ModifyResult::Saved(saved) => {
                    let mut saved = *saved;
                    saved.assets = sent.assets.clone();
                    outcome.saved.push(saved);
                }
                ModifyResult::Failed(body) => {
                    let error = map_server_error(None, Some(body), Some(&sent.record_id));
                    warn!(record_id = %sent.record_id, error = %error, "Batch save item failed");
                    outcome.failures.push(ItemFailure {
                        record_id: sent.record_id.clone(),
                        error,
                    });
                }
                ModifyResult::Deleted { .. } => {
                    outcome.failures.push(ItemFailure {
                        record_id: sent.record_id.clone(),
                        error: RemoteError::Unknown(anyhow!("server answered a save with a delete")),
                    });
                }
            }
        }

        info!(
            saved = outcome.saved.len(),
            failed = outcome.failures.len(),
            "Batch save finished"
        );
        Ok(outcome)
    }

    async fn batch_delete(&self, ids: &[RecordId]) -> Result<BatchDeleteOutcome, RemoteError> {
        let mut outcome = BatchDeleteOutcome::default();
        if ids.is_empty() {
            return Ok(outcome);
        }
        self.ensure_available().await?;

        let body = ModifyRequest {
            atomic: false,
            operations: ids
                .iter()
                .map(|id| ModifyOperation {
                    operation_type: "delete",
                    record: None,
                    record_name: Some(id),
                })
                .collect(),
        };
        let request = self
            .client
            .request(Method::POST, "/records/modify")
            .json(&body);
        let response: ModifyResponse = self
            .client
            .execute_json(request, None)
            .await
            .map_err(|e| self.observe(e))?;
        if response.records.len() != ids.len() {
            return Err(RemoteError::ServerError(format!(
                "modify returned {} results for {} operations",
                response.records.len(),
                ids.len()
            )));
        }

        for (id, raw) in ids.iter().zip(response.records) {
            let Some(result) = parse_modify_result(raw) else {
                outcome.failures.push(ItemFailure {
                    record_id: id.clone(),
                    error: malformed_result(id),
                });
                continue;
            };
            match result {
                ModifyResult::Failed(body) => {
                    let error = map_server_error(None, Some(body), Some(id));
                    warn!(record_id = %id, error = %error, "Batch delete item failed");
                    outcome.failures.push(ItemFailure {
                        record_id: id.clone(),
                        error,
                    });
                }
                ModifyResult::Deleted { .. } | ModifyResult::Saved(_) => {
                    outcome.deleted.push(id.clone())
                }
            }
        }

        info!(
            deleted = outcome.deleted.len(),
            failed = outcome.failures.len(),
            "Batch delete finished"
        );
        Ok(outcome)
    }
}
