//! Mock backend tests for the request pipeline.
//!
//! These tests use wiremock to simulate the finance backend and exercise the
//! client end to end over real HTTP.

use std::sync::Arc;
use std::time::Duration;

use fintrack_core::error::{AuthError, Error, TransportError};
use fintrack_core::{
    AccessToken, ApiRequest, ApiUrl, Credentials, MemoryTokenStore, RefreshToken, TokenStore,
};
use fintrack_http::{ApiClient, ClientConfig, SessionEvent};
use serde_json::json;
use tokio::sync::broadcast::error::TryRecvError;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper to create a client config pointing at a mock server.
fn mock_config(server: &MockServer) -> ClientConfig {
    let url = ApiUrl::new(format!("http://127.0.0.1:{}", server.address().port())).unwrap();
    ClientConfig::new(url)
}

fn client_with_store(server: &MockServer, store: Arc<MemoryTokenStore>) -> ApiClient {
    ApiClient::new(mock_config(server), store).unwrap()
}

fn store_with(access: &str, refresh: Option<&str>) -> Arc<MemoryTokenStore> {
    Arc::new(MemoryTokenStore::with_tokens(
        AccessToken::new(access),
        refresh.map(RefreshToken::new),
    ))
}

async fn mount_refresh(server: &MockServer, expired_token: &str, new_token: &str, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .and(body_json(json!({ "expiredToken": expired_token })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": new_token
        })))
        .expect(calls)
        .mount(server)
        .await;
}

async fn mount_wallets(server: &MockServer, token: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path("/wallets"))
        .and(header("authorization", format!("Bearer {}", token).as_str()))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({
            "wallets": [{ "id": 1, "name": "Cash" }]
        })))
        .mount(server)
        .await;
}

// ============================================================================
// Authentication Tests
// ============================================================================

#[tokio::test]
async fn test_login_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({
            "email": "alice@example.com",
            "password": "secret123"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "token": "A1",
            "refreshToken": "R1"
        })))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let client = client_with_store(&server, store.clone());
    client
        .login(&Credentials::new("alice@example.com", "secret123"))
        .await
        .unwrap();

    let pair = store.load().await.unwrap().unwrap();
    assert_eq!(pair.access_token.as_str(), "A1");
    assert_eq!(pair.refresh_token.unwrap().as_str(), "R1");
    assert!(client.has_session().await.unwrap());
}

#[tokio::test]
async fn test_login_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "Invalid email or password"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::new());
    let client = client_with_store(&server, store.clone());
    let result = client
        .login(&Credentials::new("bad@example.com", "wrongpass"))
        .await;

    let err = result.unwrap_err().to_string();
    assert!(err.contains("401"));
    assert!(err.contains("Invalid email or password"));
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_without_token_is_invalid_credentials() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": false })))
        .mount(&server)
        .await;

    let client = client_with_store(&server, Arc::new(MemoryTokenStore::new()));
    let err = client
        .login(&Credentials::new("alice@example.com", "secret"))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::InvalidCredentials)));
}

#[tokio::test]
async fn test_logout_clears_tokens_and_notifies() {
    let server = MockServer::start().await;
    let store = store_with("A1", Some("R1"));
    let client = client_with_store(&server, store.clone());
    let mut events = client.subscribe();

    client.logout().await.unwrap();

    assert!(store.load().await.unwrap().is_none());
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Ended);
}

// ============================================================================
// Request Decoration Tests
// ============================================================================

#[tokio::test]
async fn test_request_carries_bearer_token() {
    let server = MockServer::start().await;
    mount_wallets(&server, "A1", 200).await;

    let client = client_with_store(&server, store_with("A1", None));
    let body: serde_json::Value = client.get_json("/wallets").await.unwrap();

    assert_eq!(body["wallets"][0]["name"], "Cash");
}

#[tokio::test]
async fn test_post_json_sends_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transactions"))
        .and(header("authorization", "Bearer A1"))
        .and(body_json(json!({ "amount": 1250, "category": "groceries" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 42 })))
        .mount(&server)
        .await;

    let client = client_with_store(&server, store_with("A1", None));
    let created: serde_json::Value = client
        .post_json(
            "/transactions",
            &json!({ "amount": 1250, "category": "groceries" }),
        )
        .await
        .unwrap();

    assert_eq!(created["id"], 42);
}

#[tokio::test]
async fn test_delete_with_empty_response() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/budgets/7"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let client = client_with_store(&server, store_with("A1", None));
    client.delete("/budgets/7").await.unwrap();
}

// ============================================================================
// Refresh Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_expired_session_is_refreshed_and_replayed() {
    let server = MockServer::start().await;
    mount_wallets(&server, "A1", 401).await;
    mount_wallets(&server, "A2", 200).await;
    mount_refresh(&server, "A1", "A2", 1).await;

    let store = store_with("A1", None);
    let client = client_with_store(&server, store.clone());
    let mut events = client.subscribe();

    let response = client.execute(ApiRequest::get("/wallets")).await.unwrap();

    assert!(response.is_success());
    let pair = store.load().await.unwrap().unwrap();
    assert_eq!(pair.access_token.as_str(), "A2");
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Refreshed);
    assert!(!client.is_refreshing());
}

#[tokio::test]
async fn test_refresh_prefers_refresh_token() {
    let server = MockServer::start().await;
    mount_wallets(&server, "A1", 401).await;
    mount_wallets(&server, "A2", 200).await;
    mount_refresh(&server, "R1", "A2", 1).await;

    let store = store_with("A1", Some("R1"));
    let client = client_with_store(&server, store.clone());

    client.execute(ApiRequest::get("/wallets")).await.unwrap();

    let pair = store.load().await.unwrap().unwrap();
    assert_eq!(pair.access_token.as_str(), "A2");
    assert_eq!(pair.refresh_token.unwrap().as_str(), "R1");
}

#[tokio::test]
async fn test_forbidden_triggers_refresh() {
    let server = MockServer::start().await;
    mount_wallets(&server, "A1", 403).await;
    mount_wallets(&server, "A2", 200).await;
    mount_refresh(&server, "A1", "A2", 1).await;

    let client = client_with_store(&server, store_with("A1", None));
    let response = client.execute(ApiRequest::get("/wallets")).await.unwrap();

    assert!(response.is_success());
}

#[tokio::test]
async fn test_concurrent_failures_share_one_refresh() {
    let server = MockServer::start().await;
    mount_wallets(&server, "A1", 401).await;
    mount_wallets(&server, "A2", 200).await;

    // Hold the refresh open long enough for every request to fail behind it.
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "token": "A2" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_store(&server, store_with("A1", None));
    let mut events = client.subscribe();

    let requests = (0..5).map(|_| client.execute(ApiRequest::get("/wallets")));
    let results = futures_util::future::join_all(requests).await;

    assert!(results.iter().all(|r| r.is_ok()));
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Refreshed);
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_replay_outcomes_are_independent() {
    let server = MockServer::start().await;

    for (route, replay_status) in [("/a", 200), ("/b", 403), ("/c", 500)] {
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("authorization", "Bearer A1"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "message": "jwt expired" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(route))
            .and(header("authorization", "Bearer A2"))
            .respond_with(ResponseTemplate::new(replay_status).set_body_json(json!({ "route": route })))
            .mount(&server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "token": "A2" }))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_store(&server, store_with("A1", None));

    let (a, b, c) = tokio::join!(
        client.execute(ApiRequest::get("/a")),
        client.execute(ApiRequest::get("/b")),
        client.execute(ApiRequest::get("/c")),
    );

    assert!(a.is_ok());
    assert_eq!(b.unwrap_err().as_protocol().unwrap().status, 403);
    assert_eq!(c.unwrap_err().as_protocol().unwrap().status, 500);
    assert!(!client.is_refreshing());
}

#[tokio::test]
async fn test_timed_out_refresh_ends_session_for_every_waiter() {
    let server = MockServer::start().await;

    for name in ["r1", "r2", "r3"] {
        Mock::given(method("GET"))
            .and(path(format!("/{}", name)))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
    }

    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "success": true, "token": "A2" }))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("A1", Some("R1"));
    let config = mock_config(&server).with_request_timeout(Duration::from_millis(500));
    let client = ApiClient::new(config, store.clone()).unwrap();
    let mut events = client.subscribe();

    let results = futures_util::future::join_all(
        ["/r1", "/r2", "/r3"].map(|p| client.execute(ApiRequest::get(p))),
    )
    .await;

    let causes: Vec<Arc<Error>> = results
        .into_iter()
        .map(|result| match result.unwrap_err() {
            Error::Auth(AuthError::RefreshFailed(cause)) => cause,
            other => panic!("expected refresh failure, got {}", other),
        })
        .collect();

    assert!(matches!(
        *causes[0],
        Error::Transport(TransportError::Timeout { duration_ms: 500 })
    ));
    assert!(causes.iter().all(|c| Arc::ptr_eq(c, &causes[0])));
    assert!(store.load().await.unwrap().is_none());
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Expired);
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Ended);
}

#[tokio::test]
async fn test_malformed_refresh_response_ends_session() {
    let server = MockServer::start().await;
    mount_wallets(&server, "A1", 401).await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("A1", Some("R1"));
    let client = client_with_store(&server, store.clone());

    let err = client
        .execute(ApiRequest::get("/wallets"))
        .await
        .unwrap_err();

    let Error::Auth(AuthError::RefreshFailed(cause)) = err else {
        panic!("expected refresh failure");
    };
    assert!(matches!(
        *cause,
        Error::Auth(AuthError::MalformedRefreshResponse { .. })
    ));
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_rejected_refresh_ends_session() {
    let server = MockServer::start().await;
    mount_wallets(&server, "A1", 401).await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "success": false,
            "message": "Refresh token expired"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_with("A1", Some("R1"));
    let client = client_with_store(&server, store.clone());

    let err = client
        .execute(ApiRequest::get("/wallets"))
        .await
        .unwrap_err();

    assert!(err.is_session_ended());
    assert!(err.to_string().contains("Refresh token expired"));
    assert!(store.load().await.unwrap().is_none());
}

#[tokio::test]
async fn test_auth_failure_without_session_is_not_refreshed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/wallets"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "Unauthorized",
            "message": "No token provided"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_with_store(&server, Arc::new(MemoryTokenStore::new()));
    let mut events = client.subscribe();

    let err = client
        .execute(ApiRequest::get("/wallets"))
        .await
        .unwrap_err();

    let protocol = err.as_protocol().unwrap();
    assert_eq!(protocol.status, 401);
    assert_eq!(protocol.message.as_deref(), Some("No token provided"));
    assert_eq!(events.try_recv(), Err(TryRecvError::Empty));
}

#[tokio::test]
async fn test_replayed_request_is_not_retried_again() {
    let server = MockServer::start().await;
    mount_wallets(&server, "A1", 401).await;
    mount_wallets(&server, "A2", 403).await;
    mount_refresh(&server, "A1", "A2", 1).await;

    let store = store_with("A1", None);
    let client = client_with_store(&server, store.clone());

    let err = client
        .execute(ApiRequest::get("/wallets"))
        .await
        .unwrap_err();

    assert_eq!(err.as_protocol().unwrap().status, 403);
    // The refresh itself succeeded, so the session stays.
    let pair = store.load().await.unwrap().unwrap();
    assert_eq!(pair.access_token.as_str(), "A2");
}

#[tokio::test]
async fn test_server_error_is_not_refreshed() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reports/monthly"))
        .respond_with(
            ResponseTemplate::new(503)
                .set_body_string("Service Unavailable")
                .insert_header("content-type", "text/plain"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_with("A1", Some("R1"));
    let client = client_with_store(&server, store.clone());

    let err = client
        .execute(ApiRequest::get("/reports/monthly"))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("503"));
    assert!(store.load().await.unwrap().is_some());
}

#[tokio::test]
async fn test_replay_keeps_request_body() {
    let server = MockServer::start().await;
    let body = json!({ "name": "Holiday", "target": 150000 });

    Mock::given(method("POST"))
        .and(path("/saving-goals"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/saving-goals"))
        .and(header("authorization", "Bearer A2"))
        .and(body_json(body.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 3 })))
        .expect(1)
        .mount(&server)
        .await;

    mount_refresh(&server, "A1", "A2", 1).await;

    let client = client_with_store(&server, store_with("A1", None));
    let created: serde_json::Value = client.post_json("/saving-goals", &body).await.unwrap();

    assert_eq!(created["id"], 3);
}

#[tokio::test]
async fn test_explicit_refresh_session() {
    let server = MockServer::start().await;
    mount_refresh(&server, "R1", "A2", 1).await;

    let store = store_with("A1", Some("R1"));
    let client = client_with_store(&server, store.clone());
    let mut events = client.subscribe();

    client.refresh_session().await.unwrap();

    assert_eq!(
        store.access_token().await.unwrap().unwrap().as_str(),
        "A2"
    );
    assert_eq!(events.try_recv().unwrap(), SessionEvent::Refreshed);
}

#[tokio::test]
async fn test_explicit_refresh_without_session() {
    let server = MockServer::start().await;
    let client = client_with_store(&server, Arc::new(MemoryTokenStore::new()));

    let err = client.refresh_session().await.unwrap_err();

    assert!(matches!(err, Error::Auth(AuthError::NotAuthenticated)));
    assert!(!client.is_refreshing());
}
