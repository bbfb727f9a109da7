//! Shared fixtures for sync engine integration tests
//!
//! The remote store is an in-memory fake with optimistic concurrency on
//! change tags and per-record failure injection. The local store is the
//! real SQLite store over an in-memory pool.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use notesync_cache::{DatabasePool, SqliteLocalStore};
use notesync_codec::{DeflateAssetCompressor, RecordCodec};
use notesync_core::config::{Config, ConfigBuilder};
use notesync_core::domain::{ConflictPolicy, Entity, EntityId, RecordId, RecordType};
use notesync_core::ports::{
    AccountStatus, BatchDeleteOutcome, BatchSaveOutcome, ILocalStore, IRemoteStore, ItemFailure,
    RemoteError,
};
use notesync_core::record::{
    Comparator, FieldValue, QueryPage, RecordQuery, WireRecord, SERVER_MODIFIED_AT,
};
use notesync_sync::{ChangeTracker, CoordinatorHandle, SyncCoordinator, SyncEngine};

// ============================================================================
// FakeRemote
// ============================================================================

/// Failure injected for a single record
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum Injected {
    Quota,
    Server,
}

impl Injected {
    fn to_error(self) -> RemoteError {
        match self {
            Injected::Quota => RemoteError::QuotaExceeded,
            Injected::Server => RemoteError::ServerError("injected".to_string()),
        }
    }
}

/// In-memory record store
///
/// A save whose change tag differs from the stored record's is rejected
/// with `ConflictDetected`, carrying the stored copy.
#[derive(Default)]
pub struct FakeRemote {
    records: Mutex<BTreeMap<RecordId, WireRecord>>,
    status: Mutex<Option<AccountStatus>>,
    offline: Mutex<bool>,
    save_failures: Mutex<HashMap<RecordId, Injected>>,
    delete_failures: Mutex<HashSet<RecordId>>,
    delete_calls: Mutex<Vec<RecordId>>,
    batch_saves: AtomicU64,
    version: AtomicU64,
}

#[allow(dead_code)]
impl FakeRemote {
    pub fn set_status(&self, status: AccountStatus) {
        *self.status.lock().unwrap() = Some(status);
    }

    /// Every call fails with `NetworkUnavailable` while set
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    pub fn fail_save(&self, record_id: RecordId, failure: Injected) {
        self.save_failures.lock().unwrap().insert(record_id, failure);
    }

    pub fn fail_delete(&self, record_id: RecordId) {
        self.delete_failures.lock().unwrap().insert(record_id);
    }

    pub fn clear_failures(&self) {
        self.save_failures.lock().unwrap().clear();
        self.delete_failures.lock().unwrap().clear();
    }

    pub fn get(&self, record_id: &RecordId) -> Option<WireRecord> {
        self.records.lock().unwrap().get(record_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Record ids passed to `delete`/`batch_delete`, in call order
    pub fn delete_calls(&self) -> Vec<RecordId> {
        self.delete_calls.lock().unwrap().clone()
    }

    pub fn batch_saves(&self) -> u64 {
        self.batch_saves.load(Ordering::SeqCst)
    }

    /// Stores a record as if another device had saved it now
    pub fn seed(&self, record: WireRecord) -> WireRecord {
        self.seed_at(record, Utc::now())
    }

    /// Stores a record with an explicit server modification time
    pub fn seed_at(&self, mut record: WireRecord, at: DateTime<Utc>) -> WireRecord {
        record.change_tag = Some(self.next_tag());
        record.modified_at = Some(at);
        self.records
            .lock()
            .unwrap()
            .insert(record.record_id.clone(), record.clone());
        record
    }

    fn next_tag(&self) -> String {
        format!("v{}", self.version.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn ensure_online(&self) -> Result<(), RemoteError> {
        if *self.offline.lock().unwrap() {
            return Err(RemoteError::NetworkUnavailable("simulated outage".to_string()));
        }
        Ok(())
    }

    fn save_one(&self, record: &WireRecord) -> Result<WireRecord, RemoteError> {
        if let Some(failure) = self.save_failures.lock().unwrap().get(&record.record_id) {
            return Err(failure.to_error());
        }
        let mut records = self.records.lock().unwrap();
        if let Some(stored) = records.get(&record.record_id) {
            if stored.change_tag != record.change_tag {
                return Err(RemoteError::ConflictDetected {
                    server_record: Box::new(stored.clone()),
                });
            }
        }
        let mut saved = record.clone();
        saved.change_tag = Some(self.next_tag());
        saved.modified_at = Some(Utc::now());
        records.insert(saved.record_id.clone(), saved.clone());
        Ok(saved)
    }

    fn delete_one(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.delete_calls.lock().unwrap().push(id.clone());
        if self.delete_failures.lock().unwrap().contains(id) {
            return Err(RemoteError::ServerError("injected".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        if records.remove(id).is_none() {
            return Err(RemoteError::RecordNotFound(id.clone()));
        }
        // Parent references cascade.
        records.retain(|_, r| r.references.values().all(|reference| &reference.record_id != id));
        Ok(())
    }
}

fn matches_filters(record: &WireRecord, query: &RecordQuery) -> bool {
    query.filters.iter().all(|filter| {
        match (filter.field.as_str(), &filter.comparator, &filter.value) {
            (SERVER_MODIFIED_AT, Comparator::GreaterThan, FieldValue::Timestamp(since)) => {
                record.modified_at.map_or(false, |at| at > *since)
            }
            _ => true,
        }
    })
}

#[async_trait::async_trait]
impl IRemoteStore for FakeRemote {
    async fn check_availability(&self) -> Result<AccountStatus, RemoteError> {
        self.ensure_online()?;
        Ok(self.status.lock().unwrap().unwrap_or(AccountStatus::Available))
    }

    async fn save(&self, record: &WireRecord) -> Result<WireRecord, RemoteError> {
        self.ensure_online()?;
        self.save_one(record)
    }

    async fn fetch(&self, id: &RecordId) -> Result<WireRecord, RemoteError> {
        self.ensure_online()?;
        self.get(id).ok_or_else(|| RemoteError::RecordNotFound(id.clone()))
    }

    async fn delete(&self, id: &RecordId) -> Result<(), RemoteError> {
        self.ensure_online()?;
        self.delete_one(id)
    }

    async fn query_page(
        &self,
        query: &RecordQuery,
        cursor: Option<&str>,
    ) -> Result<QueryPage, RemoteError> {
        self.ensure_online()?;
        let mut matching: Vec<WireRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.record_type == query.record_type && matches_filters(r, query))
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.modified_at);

        let offset: usize = cursor.map_or(0, |c| c.parse().unwrap_or(0));
        let end = (offset + query.page_size).min(matching.len());
        let records = matching.get(offset..end).unwrap_or_default().to_vec();
        let cursor = (end < matching.len()).then(|| end.to_string());
        Ok(QueryPage {
            records,
            cursor,
            skipped: 0,
        })
    }

    async fn batch_save(&self, records: &[WireRecord]) -> Result<BatchSaveOutcome, RemoteError> {
        self.ensure_online()?;
        self.batch_saves.fetch_add(1, Ordering::SeqCst);
        let mut outcome = BatchSaveOutcome::default();
        for record in records {
            match self.save_one(record) {
                Ok(saved) => outcome.saved.push(saved),
                Err(error) => outcome.failures.push(ItemFailure {
                    record_id: record.record_id.clone(),
                    error,
                }),
            }
        }
        Ok(outcome)
    }

    async fn batch_delete(&self, ids: &[RecordId]) -> Result<BatchDeleteOutcome, RemoteError> {
        self.ensure_online()?;
        let mut outcome = BatchDeleteOutcome::default();
        for id in ids {
            match self.delete_one(id) {
                Ok(()) => outcome.deleted.push(id.clone()),
                Err(error) => outcome.failures.push(ItemFailure {
                    record_id: id.clone(),
                    error,
                }),
            }
        }
        Ok(outcome)
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub remote: Arc<FakeRemote>,
    pub local: Arc<SqliteLocalStore>,
    pub coordinator: CoordinatorHandle,
    pub tracker: ChangeTracker,
    pub engine: SyncEngine,
    pub codec: RecordCodec,
}

pub fn codec() -> RecordCodec {
    RecordCodec::new(Arc::new(DeflateAssetCompressor::default()))
}

/// Small batches so multi-batch paths are exercised
pub fn config() -> Config {
    ConfigBuilder::new()
        .sync_batch_size(2)
        .sync_page_size(2)
        .build()
}

pub async fn setup() -> Harness {
    setup_with(ConflictPolicy::Manual, codec()).await
}

pub async fn setup_with(policy: ConflictPolicy, codec: RecordCodec) -> Harness {
    let pool = DatabasePool::in_memory()
        .await
        .expect("Failed to create in-memory database");
    let local = Arc::new(SqliteLocalStore::new(pool.pool().clone()));
    let remote = Arc::new(FakeRemote::default());
    let (coordinator, _task) = SyncCoordinator::spawn(local.clone())
        .await
        .expect("Failed to start coordinator");

    let tracker = ChangeTracker::new(local.clone(), coordinator.clone());
    let engine = SyncEngine::new(
        remote.clone(),
        local.clone(),
        codec.clone(),
        coordinator.clone(),
        &config(),
    )
    .with_policy(policy);

    Harness {
        remote,
        local,
        coordinator,
        tracker,
        engine,
        codec,
    }
}

#[allow(dead_code)]
impl Harness {
    pub async fn load(&self, record_type: RecordType, id: EntityId) -> Entity {
        self.local
            .get(record_type, id)
            .await
            .unwrap()
            .expect("entity should exist locally")
    }

    /// Encodes an entity and stores it remotely, as another device would
    pub fn seed_remote(&self, entity: &Entity) -> WireRecord {
        self.remote.seed(self.codec.encode(entity).unwrap())
    }
}
