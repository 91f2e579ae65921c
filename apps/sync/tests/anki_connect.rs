//! HTTP transport tests against a mock record store.

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

use flashcard_sync::client::{Action, AnkiConnectClient, ClientError, RecordStoreClient};
use flashcard_sync::{Config, SyncEngine, SyncError};

fn client(server: &MockServer) -> AnkiConnectClient {
    AnkiConnectClient::new(&server.uri(), None, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn invoke_posts_versioned_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({
            "action": "findNotes",
            "version": 6,
            "params": { "query": "tag:\"md-flashcard\"" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [1, 2, 3],
            "error": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ids: Vec<u64> = client(&server)
        .invoke(&Action::FindNotes {
            query: "tag:\"md-flashcard\"".to_string(),
        })
        .await
        .unwrap()
        .decode("findNotes")
        .unwrap();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn api_key_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "action": "version", "key": "s3cret" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": 6,
            "error": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client =
        AnkiConnectClient::new(&server.uri(), Some("s3cret".to_string()), Duration::from_secs(5))
            .unwrap();
    let response = client.invoke(&Action::Version).await.unwrap();
    assert_eq!(response.result, json!(6));
}

#[tokio::test]
async fn action_error_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": null,
            "error": "deck was not found"
        })))
        .mount(&server)
        .await;

    let error = client(&server)
        .invoke(&Action::DeckNames)
        .await
        .unwrap()
        .into_result("deckNames")
        .unwrap_err();
    assert!(matches!(
        error,
        ClientError::Rejected { action, message }
            if action == "deckNames" && message == "deck was not found"
    ));
}

#[tokio::test]
async fn http_failure_is_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let error = client(&server).invoke(&Action::Version).await.unwrap_err();
    assert!(matches!(error, ClientError::Backend { status: 500, .. }));
}

#[tokio::test]
async fn malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let error = client(&server).invoke(&Action::Version).await.unwrap_err();
    assert!(matches!(error, ClientError::Decode(_)));
}

#[tokio::test]
async fn multi_count_mismatch_is_shape_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "action": "multi" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [{ "result": ["Default"], "error": null }],
            "error": null
        })))
        .mount(&server)
        .await;

    let error = client(&server)
        .multi(vec![Action::DeckNames, Action::ModelNames])
        .await
        .unwrap_err();
    assert!(matches!(error, ClientError::Shape(_)));
}

#[tokio::test]
async fn unreachable_store_is_transport_error() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let config = Config {
        anki_url: uri,
        request_timeout_secs: 2,
        ..Config::default()
    };
    let engine = SyncEngine::from_config(config).unwrap();
    let error = engine.check_connectivity().await.unwrap_err();
    assert!(matches!(error, SyncError::Transport(_)), "{error:?}");
}

#[tokio::test]
async fn engine_runs_against_http_store() {
    let server = MockServer::start().await;
    // Snapshot of an empty collection for a vault without flashcards
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "action": "multi" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": [
                { "result": [], "error": null },
                { "result": [], "error": null }
            ],
            "error": null
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.md"), "# No cards here\n").unwrap();
    let store = flashcard_sync::VaultStore::new(dir.path(), "anki-deck");

    let client: Arc<dyn RecordStoreClient> = Arc::new(client(&server));
    let engine = SyncEngine::new(client, Config::default());
    let summary = engine.sync(&store).await.unwrap();
    assert_eq!(summary.added + summary.modified + summary.deleted, 0);
}
