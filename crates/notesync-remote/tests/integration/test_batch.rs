//! Integration tests for non-atomic batch save and delete

use notesync_core::domain::RecordId;
use notesync_core::ports::{IRemoteStore, RemoteError, RemoteErrorKind};
use notesync_core::record::FieldValue;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_batch_save_reports_partial_failures() {
    let (server, store) = common::setup_available().await;
    let ok = common::entry_record("saved");
    let full = common::entry_record("over quota");
    let stale = common::entry_record("stale");
    let mut server_copy = stale.clone();
    server_copy.set("title", FieldValue::String("newer".to_string()));

    Mock::given(method("POST"))
        .and(path("/records/modify"))
        .and(body_partial_json(serde_json::json!({
            "atomic": false,
            "operations": [
                { "operationType": "update" },
                { "operationType": "update" },
                { "operationType": "update" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "records": [
                common::saved_json(&ok, "tag-ok"),
                {
                    "recordName": full.record_id.to_string(),
                    "serverErrorCode": "QUOTA_EXCEEDED",
                    "reason": "no space"
                },
                {
                    "recordName": stale.record_id.to_string(),
                    "serverErrorCode": "CONFLICT",
                    "serverRecord": common::saved_json(&server_copy, "tag-server")
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = store
        .batch_save(&[ok.clone(), full.clone(), stale.clone()])
        .await
        .expect("batch call failed");

    assert_eq!(outcome.saved.len(), 1);
    assert_eq!(outcome.saved[0].record_id, ok.record_id);
    assert_eq!(outcome.saved[0].change_tag.as_deref(), Some("tag-ok"));

    assert_eq!(outcome.failures.len(), 2);
    assert_eq!(outcome.failures[0].record_id, full.record_id);
    assert_eq!(outcome.failures[0].error.kind(), RemoteErrorKind::QuotaExceeded);
    assert_eq!(outcome.failures[1].record_id, stale.record_id);
    match &outcome.failures[1].error {
        RemoteError::ConflictDetected { server_record } => {
            assert_eq!(server_record.string("title"), Some("newer"))
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_batch_save_whole_call_failure() {
    let (server, store) = common::setup_available().await;
    common::mount_error(&server, "POST", "/records/modify", 503, "TRY_AGAIN_LATER").await;

    let err = store
        .batch_save(&[common::entry_record("a"), common::entry_record("b")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::AccountTemporarilyUnavailable);
}

#[tokio::test]
async fn test_batch_save_rejects_mismatched_result_count() {
    let (server, store) = common::setup_available().await;
    Mock::given(method("POST"))
        .and(path("/records/modify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "records": [] })))
        .mount(&server)
        .await;

    let err = store
        .batch_save(&[common::entry_record("a")])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::ServerError);
}

#[tokio::test]
async fn test_empty_batches_make_no_requests() {
    let (server, store) = common::setup_bare().await;

    let saved = store.batch_save(&[]).await.unwrap();
    let deleted = store.batch_delete(&[]).await.unwrap();

    assert!(saved.saved.is_empty() && saved.failures.is_empty());
    assert!(deleted.deleted.is_empty() && deleted.failures.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_batch_delete_reports_missing_records() {
    let (server, store) = common::setup_available().await;
    let gone: RecordId = common::entry_id();
    let present: RecordId = common::entry_id();

    Mock::given(method("POST"))
        .and(path("/records/modify"))
        .and(body_partial_json(serde_json::json!({
            "operations": [
                { "operationType": "delete", "recordName": present.to_string() },
                { "operationType": "delete", "recordName": gone.to_string() }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "records": [
                { "recordName": present.to_string(), "deleted": true },
                { "recordName": gone.to_string(), "serverErrorCode": "NOT_FOUND" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = store
        .batch_delete(&[present.clone(), gone.clone()])
        .await
        .expect("batch call failed");

    assert_eq!(outcome.deleted, vec![present]);
    assert_eq!(outcome.failures.len(), 1);
    match &outcome.failures[0].error {
        RemoteError::RecordNotFound(id) => assert_eq!(*id, gone),
        other => panic!("expected RecordNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_batch_save_tolerates_malformed_item_result() {
    let (server, store) = common::setup_available().await;
    let ok = common::entry_record("saved");
    let odd = common::entry_record("unreadable answer");

    Mock::given(method("POST"))
        .and(path("/records/modify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "records": [
                common::saved_json(&ok, "tag-ok"),
                { "unexpected": true }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = store
        .batch_save(&[ok.clone(), odd.clone()])
        .await
        .expect("batch call failed");

    assert_eq!(outcome.saved.len(), 1);
    assert_eq!(outcome.saved[0].record_id, ok.record_id);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].record_id, odd.record_id);
    assert_eq!(outcome.failures[0].error.kind(), RemoteErrorKind::Unknown);
}
