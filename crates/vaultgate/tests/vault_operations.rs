//! Vault domain client tests against a mock backend
//!
//! Exercises the operation surface (list, read, write, delete, search,
//! commands), domain error classification, read-after-write consistency
//! through the cache, the health probe, and monitor integration.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vaultgate::{
    CacheConfig, CircuitBreakerConfig, GatewayConfig, RetryConfig, TimeoutTiers, VaultClient,
    VaultError,
};

fn test_config(uri: &str) -> GatewayConfig {
    GatewayConfig {
        base_url: uri.to_string(),
        api_token: "test-token".to_string(),
        timeouts: TimeoutTiers {
            short: Duration::from_millis(300),
            medium: Duration::from_secs(2),
            long: Duration::from_secs(5),
        },
        retry: RetryConfig {
            max_retries: 0,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
        },
        circuit: CircuitBreakerConfig::default(),
        cache: CacheConfig {
            enabled: true,
            ttl: Duration::from_millis(500),
            max_entries: 100,
        },
        verify_certificates: true,
        user_agent: Some("vaultgate-tests".to_string()),
    }
}

async fn client_for(server: &MockServer) -> VaultClient {
    VaultClient::from_config(test_config(&server.uri())).expect("client builds")
}

#[tokio::test]
async fn test_list_files_on_empty_vault() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vault/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let files = client.list_files().await.expect("empty vault lists fine");
    assert_eq!(files, Vec::<String>::new());
}

#[tokio::test]
async fn test_list_files_returns_entries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vault/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": ["daily/2026-01-01.md", "projects/", "inbox.md"]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let files = client.list_files().await.unwrap();
    assert_eq!(files.len(), 3);
    assert_eq!(files[0], "daily/2026-01-01.md");
}

#[tokio::test]
async fn test_get_file_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vault/notes/alpha.md"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"content": "# Alpha\n\nbody"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let content = client.get_file_content("notes/alpha.md").await.unwrap();
    assert_eq!(content, "# Alpha\n\nbody");
}

#[tokio::test]
async fn test_missing_file_classifies_as_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vault/notes/ghost.md"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.get_file_content("notes/ghost.md").await.unwrap_err();
    match err {
        VaultError::NotFound { path } => assert_eq!(path, "notes/ghost.md"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_token_classifies_as_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vault/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid token"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(matches!(
        client.list_files().await.unwrap_err(),
        VaultError::Unauthorized
    ));
}

#[tokio::test]
async fn test_backend_error_classification() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vault/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(matches!(
        client.list_files().await.unwrap_err(),
        VaultError::Backend { status: 500, .. }
    ));
}

#[tokio::test]
async fn test_unreachable_backend_classifies_as_unavailable() {
    // Nothing listens here; the connection itself fails.
    let client = VaultClient::from_config(test_config("http://127.0.0.1:1")).expect("builds");
    assert!(matches!(
        client.list_files().await.unwrap_err(),
        VaultError::Unavailable { .. }
    ));
}

#[tokio::test]
async fn test_create_file_posts_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/vault/notes/new.md"))
        .and(body_json(json!({"content": "hello"})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client.create_file("notes/new.md", "hello").await.unwrap();
}

#[tokio::test]
async fn test_update_then_read_never_sees_stale_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vault/notes/a.md"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "v1"})))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/vault/notes/a.md"))
        .and(body_json(json!({"content": "v2"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vault/notes/a.md"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"content": "v2"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;

    assert_eq!(client.get_file_content("notes/a.md").await.unwrap(), "v1");
    client.update_file("notes/a.md", "v2").await.unwrap();
    // The cached v1 was dropped before the update acknowledged.
    assert_eq!(client.get_file_content("notes/a.md").await.unwrap(), "v2");
}

#[tokio::test]
async fn test_delete_missing_file_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/vault/notes/gone.md"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.delete_file("notes/gone.md").await.unwrap_err();
    assert!(matches!(err, VaultError::NotFound { .. }));
}

#[tokio::test]
async fn test_delete_file() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/vault/notes/old.md"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client.delete_file("notes/old.md").await.unwrap();
}

#[tokio::test]
async fn test_search_with_no_matches_returns_empty_set() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/"))
        .and(query_param("query", "zxqv-nonexistent"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let results = client.search("zxqv-nonexistent", 10).await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_search_returns_scored_results() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search/"))
        .and(query_param("query", "alpha"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "path": "notes/alpha.md", "score": 0.93, "excerpt": "…alpha…" },
                { "path": "daily/2026-01-01.md", "score": 0.4 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let results = client.search("alpha", 5).await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].path, "notes/alpha.md");
    assert!(results[0].score > results[1].score);

    // Same (query, limit) is served from cache: the expect(1) above holds.
    let cached = client.search("alpha", 5).await.unwrap();
    assert_eq!(cached.len(), 2);
}

#[tokio::test]
async fn test_list_and_execute_commands() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/commands/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "commands": [
                { "id": "daily-note", "name": "Open daily note" },
                { "id": "reindex", "name": "Rebuild search index" }
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/commands/reindex"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"queued": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let commands = client.list_commands().await.unwrap();
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[1].id, "reindex");

    let outcome = client
        .execute_command("reindex", json!({"scope": "vault"}))
        .await
        .unwrap();
    assert_eq!(outcome["queued"], true);
}

#[tokio::test]
async fn test_health_check_reports_healthy_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"service": "vault"})))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let health = client.health_check().await;

    assert!(health.healthy);
    assert_eq!(health.status, Some(200));
    assert!(health.error.is_none());
    assert!(health.response_time > Duration::ZERO);
}

#[tokio::test]
async fn test_health_check_reports_unhealthy_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let health = client.health_check().await;

    assert!(!health.healthy);
    assert_eq!(health.status, Some(503));
    assert!(health.error.is_some());
}

#[tokio::test]
async fn test_health_check_never_errors_on_unreachable_backend() {
    let client = VaultClient::from_config(test_config("http://127.0.0.1:1")).expect("builds");

    // Poll a few times the way a liveness loop would; every probe must
    // come back as a value, not an error.
    for _ in 0..3 {
        let health = client.health_check().await;
        assert!(!health.healthy);
        assert_eq!(health.status, None);
        assert!(health.error.is_some());
    }
}

#[tokio::test]
async fn test_operations_are_timed_into_the_monitor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/vault/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/vault/notes/ghost.md"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client.list_files().await.unwrap();
    client.list_files().await.unwrap();
    let _ = client.get_file_content("notes/ghost.md").await;

    let listed = client.monitor().metric("vault.list_files").expect("tracked");
    assert_eq!(listed.count, 2);
    assert_eq!(listed.errors, 0);

    let read = client
        .monitor()
        .metric("vault.get_file_content")
        .expect("tracked");
    assert_eq!(read.count, 1);
    assert_eq!(read.errors, 1);

    let report = client.monitor().generate_report();
    assert!(report.total_operations >= 3);
}
