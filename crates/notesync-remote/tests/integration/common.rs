//! Shared test helpers for record store integration tests
//!
//! Each helper mounts mock endpoints on a wiremock server. Records are built
//! as JSON the way the server sends them.

use notesync_core::domain::{EntityId, RecordId, RecordType};
use notesync_core::record::{FieldValue, WireRecord};
use notesync_remote::{HttpRemoteStore, RecordStoreClient};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test-api-token";

/// Starts a mock server and returns a store pointing at it
///
/// No endpoints are mounted.
pub async fn setup_bare() -> (MockServer, HttpRemoteStore) {
    let server = MockServer::start().await;
    let client = RecordStoreClient::with_base_url(Some(TOKEN.to_string()), server.uri());
    (server, HttpRemoteStore::new(client))
}

/// Starts a mock server whose account is available
pub async fn setup_available() -> (MockServer, HttpRemoteStore) {
    let (server, store) = setup_bare().await;
    mount_account_status(&server, "available").await;
    (server, store)
}

pub async fn mount_account_status(server: &MockServer, status: &str) {
    Mock::given(method("GET"))
        .and(path("/account/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": status })),
        )
        .mount(server)
        .await;
}

/// Mounts a server error body for any request to `method_name path_str`
#[allow(dead_code)]
pub async fn mount_error(
    server: &MockServer,
    method_name: &str,
    path_str: &str,
    status: u16,
    code: &str,
) {
    Mock::given(method(method_name))
        .and(path(path_str))
        .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
            "serverErrorCode": code,
            "reason": "mocked failure"
        })))
        .mount(server)
        .await;
}

pub fn entry_id() -> RecordId {
    RecordId::for_entity(RecordType::JournalEntry, EntityId::new())
}

/// A journal entry record with a title, as the codec would produce it
pub fn entry_record(title: &str) -> WireRecord {
    let id = entry_id();
    let mut record = WireRecord::new(id.clone());
    record.set(
        "entityId",
        FieldValue::String(id.entity_id().to_string()),
    );
    record.set("title", FieldValue::String(title.to_string()));
    record
}

/// JSON body of a saved record, with a change tag
pub fn saved_json(record: &WireRecord, change_tag: &str) -> serde_json::Value {
    let mut value = serde_json::to_value(record).expect("serialize record");
    value["changeTag"] = serde_json::json!(change_tag);
    value
}
