//! Ledger-level tests for the ingest service.
//!
//! Firestore, YouTube and R2 are all served by wiremock. These tests
//! pin the two guarantees the ledger makes: at most one charge per
//! (user, video), and no writes at all when the balance cannot cover
//! the cost.

use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lectio_api::services::ingest::{IngestService, IngestStatus};
use lectio_api::services::youtube::YouTubeClient;
use lectio_firestore::client::{FirestoreClient, FirestoreConfig};
use lectio_firestore::retry::RetryConfig;
use lectio_storage::client::{R2Client, R2Config};

const UID: &str = "u1";
const VIDEO_ID: &str = "dQw4w9WgXcQ";
const DOCS: &str = "/v1/projects/test-project/databases/(default)/documents";

fn firestore_config() -> FirestoreConfig {
    FirestoreConfig {
        project_id: "test-project".to_string(),
        database_id: "(default)".to_string(),
        timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(1),
        retry: RetryConfig {
            max_retries: 0,
            base_delay_ms: 1,
            max_delay_ms: 1,
        },
    }
}

async fn service(
    firestore: &MockServer,
    youtube: &MockServer,
    storage: &MockServer,
) -> IngestService {
    let firestore_client =
        FirestoreClient::with_endpoint(firestore.uri(), firestore_config(), "test-token")
            .expect("firestore client");

    let r2 = R2Client::new(R2Config {
        endpoint_url: storage.uri(),
        access_key_id: "test".to_string(),
        secret_access_key: "test".to_string(),
        bucket_name: "test-bucket".to_string(),
        region: "auto".to_string(),
    })
    .await
    .expect("r2 client");

    IngestService::new(
        firestore_client,
        r2,
        Arc::new(YouTubeClient::with_base_url(youtube.uri())),
    )
}

fn account_doc(balance: i64) -> serde_json::Value {
    serde_json::json!({
        "name": format!("projects/test-project/databases/(default)/documents/users/{}", UID),
        "fields": {
            "token_balance": { "integerValue": balance.to_string() },
            "tier": { "stringValue": "free" },
            "materials_this_month": { "integerValue": "0" }
        },
        "createTime": "2025-01-01T00:00:00Z",
        "updateTime": "2025-01-02T00:00:00Z"
    })
}

fn material_doc() -> serde_json::Value {
    serde_json::json!({
        "name": format!(
            "projects/test-project/databases/(default)/documents/users/{}/materials/{}",
            UID, VIDEO_ID
        ),
        "fields": {
            "owner_id": { "stringValue": UID },
            "video_id": { "stringValue": VIDEO_ID },
            "title": { "stringValue": "Lecture 1" },
            "input_tokens": { "integerValue": "3" },
            "billed_units": { "integerValue": "1" }
        },
        "createTime": "2025-01-01T00:00:00Z",
        "updateTime": "2025-01-01T00:00:00Z"
    })
}

fn commit_ok() -> serde_json::Value {
    serde_json::json!({
        "writeResults": [
            { "updateTime": "2025-01-03T00:00:00Z" },
            { "updateTime": "2025-01-03T00:00:00Z" }
        ],
        "commitTime": "2025-01-03T00:00:00Z"
    })
}

/// Watch page with a 600 second video and one English caption track
/// whose timedtext URL points back at the mock server.
fn watch_page(youtube: &MockServer) -> String {
    format!(
        r#"<html>var ytInitialPlayerResponse = {{"videoDetails": {{"lengthSeconds": "600"}},
"captions": {{"playerCaptionsTracklistRenderer": {{"captionTracks":
[{{"baseUrl": "{}/api/timedtext?v={}", "languageCode": "en"}}]}}}}}};</html>"#,
        youtube.uri(),
        VIDEO_ID
    )
}

async fn mount_youtube(youtube: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/watch"))
        .and(query_param("v", VIDEO_ID))
        .respond_with(ResponseTemplate::new(200).set_body_string(watch_page(youtube)))
        .mount(youtube)
        .await;
    Mock::given(method("GET"))
        .and(path("/oembed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "title": "Lecture 1",
            "author_name": "Prof",
            "thumbnail_url": null
        })))
        .mount(youtube)
        .await;
    // "hello world" sanitizes to 11 chars: 3 input tokens, 1 billed unit
    Mock::given(method("GET"))
        .and(path("/api/timedtext"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<transcript><text start="0" dur="2">hello world</text></transcript>"#,
        ))
        .mount(youtube)
        .await;
}

#[tokio::test]
async fn test_repeat_ingest_returns_already_exists_without_charge() {
    let firestore = MockServer::start().await;
    let youtube = MockServer::start().await;
    let storage = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(format!("{}/users/{}/materials/{}", DOCS, UID, VIDEO_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(material_doc()))
        .mount(&firestore)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}:commit", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(commit_ok()))
        .expect(0)
        .mount(&firestore)
        .await;

    let service = service(&firestore, &youtube, &storage).await;
    let outcome = service.ingest(UID, VIDEO_ID, None).await.unwrap();

    assert_eq!(outcome.status, IngestStatus::AlreadyExists);
    assert_eq!(outcome.billed_units_charged, 0);
    assert_eq!(outcome.material_id, VIDEO_ID);
}

#[tokio::test]
async fn test_exact_balance_debits_to_zero() {
    let firestore = MockServer::start().await;
    let youtube = MockServer::start().await;
    let storage = MockServer::start().await;
    mount_youtube(&youtube).await;

    Mock::given(method("GET"))
        .and(path(format!("{}/users/{}/materials/{}", DOCS, UID, VIDEO_ID)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&firestore)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/{}", DOCS, UID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_doc(1)))
        .mount(&firestore)
        .await;
    // Both writes travel in one commit: the debit down to zero guarded
    // by the account's update time, and the guarded material create
    Mock::given(method("POST"))
        .and(path(format!("{}:commit", DOCS)))
        .and(body_partial_json(serde_json::json!({
            "writes": [
                {
                    "update": { "fields": { "token_balance": { "integerValue": "0" } } },
                    "currentDocument": { "updateTime": "2025-01-02T00:00:00Z" }
                },
                { "currentDocument": { "exists": false } }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(commit_ok()))
        .expect(1)
        .mount(&firestore)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!(
            "/test-bucket/{}/transcripts/{}.txt.gz",
            UID, VIDEO_ID
        )))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&storage)
        .await;

    let service = service(&firestore, &youtube, &storage).await;
    let outcome = service.ingest(UID, VIDEO_ID, None).await.unwrap();

    assert_eq!(outcome.status, IngestStatus::Processed);
    assert_eq!(outcome.billed_units_charged, 1);
    assert_eq!(outcome.input_tokens, 3);
}

#[tokio::test]
async fn test_one_unit_short_rejects_before_any_write() {
    let firestore = MockServer::start().await;
    let youtube = MockServer::start().await;
    let storage = MockServer::start().await;
    mount_youtube(&youtube).await;

    Mock::given(method("GET"))
        .and(path(format!("{}/users/{}/materials/{}", DOCS, UID, VIDEO_ID)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&firestore)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/{}", DOCS, UID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_doc(0)))
        .mount(&firestore)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}:commit", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(commit_ok()))
        .expect(0)
        .mount(&firestore)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&storage)
        .await;

    let service = service(&firestore, &youtube, &storage).await;
    let err = service.ingest(UID, VIDEO_ID, None).await.unwrap_err();

    assert_eq!(err.kind(), "resource_exhausted");
}

#[tokio::test]
async fn test_commit_retries_after_concurrent_account_update() {
    let firestore = MockServer::start().await;
    let youtube = MockServer::start().await;
    let storage = MockServer::start().await;
    mount_youtube(&youtube).await;

    Mock::given(method("GET"))
        .and(path(format!("{}/users/{}/materials/{}", DOCS, UID, VIDEO_ID)))
        .respond_with(ResponseTemplate::new(404))
        .mount(&firestore)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/users/{}", DOCS, UID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(account_doc(5)))
        .mount(&firestore)
        .await;
    // First commit loses the updateTime race; the retry wins
    Mock::given(method("POST"))
        .and(path(format!("{}:commit", DOCS)))
        .respond_with(ResponseTemplate::new(400).set_body_string(
            r#"{"error":{"status":"FAILED_PRECONDITION","message":"stale update time"}}"#,
        ))
        .up_to_n_times(1)
        .expect(1)
        .mount(&firestore)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}:commit", DOCS)))
        .respond_with(ResponseTemplate::new(200).set_body_json(commit_ok()))
        .expect(1)
        .mount(&firestore)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&storage)
        .await;

    let service = service(&firestore, &youtube, &storage).await;
    let outcome = service.ingest(UID, VIDEO_ID, None).await.unwrap();

    assert_eq!(outcome.status, IngestStatus::Processed);
    assert_eq!(outcome.billed_units_charged, 1);
}
