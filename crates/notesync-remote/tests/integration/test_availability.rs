//! Integration tests for account availability checks

use std::time::Duration;

use notesync_core::ports::{AccountStatus, IRemoteStore, RemoteErrorKind};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common;

#[tokio::test]
async fn test_check_availability_maps_statuses() {
    for (raw, expected) in [
        ("available", AccountStatus::Available),
        ("no_account", AccountStatus::NoAccount),
        ("restricted", AccountStatus::Restricted),
        ("temporarily_unavailable", AccountStatus::TemporarilyUnavailable),
        ("something_else", AccountStatus::Unknown),
    ] {
        let (server, store) = common::setup_bare().await;
        common::mount_account_status(&server, raw).await;

        let status = store.check_availability().await.expect("check failed");
        assert_eq!(status, expected, "status string {raw}");
        assert_eq!(store.cached_status(), Some(expected));
    }
}

#[tokio::test]
async fn test_check_availability_sends_bearer_token() {
    let (server, store) = common::setup_bare().await;
    Mock::given(method("GET"))
        .and(path("/account/status"))
        .and(header("authorization", "Bearer test-api-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "available" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(
        store.check_availability().await.unwrap(),
        AccountStatus::Available
    );
}

#[tokio::test]
async fn test_concurrent_checks_share_one_request() {
    let (server, store) = common::setup_bare().await;
    Mock::given(method("GET"))
        .and(path("/account/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "available" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (a, b, c) = tokio::join!(
        store.check_availability(),
        store.check_availability(),
        store.check_availability()
    );

    assert_eq!(a.unwrap(), AccountStatus::Available);
    assert_eq!(b.unwrap(), AccountStatus::Available);
    assert_eq!(c.unwrap(), AccountStatus::Available);
}

#[tokio::test]
async fn test_sequential_checks_each_hit_the_server() {
    let (server, store) = common::setup_bare().await;
    Mock::given(method("GET"))
        .and(path("/account/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "status": "available" })),
        )
        .expect(2)
        .mount(&server)
        .await;

    store.check_availability().await.unwrap();
    store.check_availability().await.unwrap();
}

#[tokio::test]
async fn test_operations_fail_fast_when_account_unavailable() {
    let (server, store) = common::setup_bare().await;
    common::mount_account_status(&server, "restricted").await;

    let err = store.fetch(&common::entry_id()).await.unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::AccountRestricted);

    // Only the status endpoint was contacted.
    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url.path(), "/account/status");
}

#[tokio::test]
async fn test_no_account_fails_as_not_authenticated() {
    let (server, store) = common::setup_bare().await;
    common::mount_account_status(&server, "no_account").await;

    let err = store.delete(&common::entry_id()).await.unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::NotAuthenticated);
}

#[tokio::test]
async fn test_status_endpoint_failure_is_reported() {
    let (server, store) = common::setup_bare().await;
    common::mount_error(&server, "GET", "/account/status", 503, "TRY_AGAIN_LATER").await;

    let err = store.check_availability().await.unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::AccountTemporarilyUnavailable);
    assert_eq!(store.cached_status(), None);
}

#[tokio::test]
async fn test_unreachable_server_is_network_unavailable() {
    let client = notesync_remote::RecordStoreClient::with_base_url(None, "http://127.0.0.1:9");
    let store = notesync_remote::HttpRemoteStore::new(client);

    let err = store.check_availability().await.unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::NetworkUnavailable);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_not_authenticated_drops_cached_status() {
    let (server, store) = common::setup_available().await;
    let id = common::entry_id();
    common::mount_error(
        &server,
        "GET",
        &format!("/records/{id}"),
        401,
        "AUTHENTICATION_REQUIRED",
    )
    .await;

    store.check_availability().await.unwrap();
    assert_eq!(store.cached_status(), Some(AccountStatus::Available));

    let err = store.fetch(&id).await.unwrap_err();
    assert_eq!(err.kind(), RemoteErrorKind::NotAuthenticated);
    assert_eq!(store.cached_status(), None);
}
