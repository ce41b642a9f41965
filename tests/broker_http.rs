//! End-to-end tests of the broker endpoint
//!
//! Drives the axum router in-process against a fake secret backend:
//! - Method handling
//! - Group authorization outcomes
//! - Direct and redirect delivery
//! - Body identity variant
//! - Error mapping

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tower::ServiceExt;

use vault_token_broker::backend::{
    BackendSession, LoginCredentials, Secret, SecretAuth, SecretBackend, SessionInitializer,
    SessionProvider, SessionSource, TokenCreateRequest,
};
use vault_token_broker::broker::{AllowList, DeliveryMode, TokenBroker, TokenIssuer, broker_routes};
use vault_token_broker::config::{IdentityConfig, IdentitySource, TokenConfig};
use vault_token_broker::{Error, Result};

/// Fake Vault: echoes the request into a deterministic secret.
#[derive(Default)]
struct FakeVault {
    requests: Mutex<Vec<TokenCreateRequest>>,
    reject_with: Option<String>,
}

#[async_trait]
impl SecretBackend for FakeVault {
    async fn login(&self, _credentials: &LoginCredentials) -> Result<BackendSession> {
        Ok(BackendSession::new("s.login"))
    }

    async fn issue_token(
        &self,
        session: &BackendSession,
        request: &TokenCreateRequest,
    ) -> Result<Secret> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(ref msg) = self.reject_with {
            return Err(Error::Issuance(msg.clone()));
        }
        let mut metadata = serde_json::Map::new();
        metadata.insert("display_name".into(), Value::String(request.display_name.clone()));
        metadata.insert("parent".into(), Value::String(session.token().to_string()));
        Ok(Secret {
            request_id: "2f3e-request".to_string(),
            auth: Some(SecretAuth {
                client_token: "s.issued-token".to_string(),
                accessor: "accessor-1".to_string(),
                policies: request.policies.clone(),
                token_policies: request.policies.clone(),
                metadata: Some(metadata),
                lease_duration: 43200,
                renewable: request.renewable.unwrap_or(false),
                token_type: "service".to_string(),
                ..SecretAuth::default()
            }),
            ..Secret::default()
        })
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

fn broker(
    vault: Arc<FakeVault>,
    allowed: &[&str],
    source: IdentitySource,
    delivery: DeliveryMode,
) -> axum::Router {
    let broker = TokenBroker::new(
        SessionProvider::Shared(BackendSession::new("s.broker")),
        TokenIssuer::new(vault, TokenConfig::default()),
        AllowList::new(strings(allowed)),
        IdentityConfig {
            source,
            ..IdentityConfig::default()
        },
        delivery,
    );
    broker_routes(Arc::new(broker))
}

fn get(user: &str, groups: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri("/")
        .header("X-Forwarded-User", user)
        .header("X-Forwarded-Groups", groups)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

async fn body_text(response: axum::response::Response) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn non_get_methods_are_rejected() {
    let vault = Arc::new(FakeVault::default());
    let app = broker(vault.clone(), &[], IdentitySource::Headers, DeliveryMode::Direct);

    for method in ["POST", "PUT", "DELETE", "PATCH", "HEAD", "OPTIONS"] {
        let request = Request::builder()
            .method(method)
            .uri("/")
            .header("X-Forwarded-User", "alice")
            .header("X-Forwarded-Groups", "dev")
            .body(Body::from(r#"{"name":"alice"}"#))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{method}");
        if method != "HEAD" {
            assert_eq!(body_text(response).await, "Method not allowed");
        }
    }
    assert!(vault.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn no_allowed_groups_is_a_500() {
    let vault = Arc::new(FakeVault::default());
    let app = broker(vault.clone(), &["admins", "ops"], IdentitySource::Headers, DeliveryMode::Direct);

    let response = app.oneshot(get("alice", "users|guests")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "User has no allowed groups");
    assert!(vault.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn allowed_groups_become_policies() {
    // GIVEN: allow-list {bob, andy} and claims {bob, fred, jim}
    let vault = Arc::new(FakeVault::default());
    let app = broker(vault.clone(), &["bob", "andy"], IdentitySource::Headers, DeliveryMode::Direct);

    // WHEN: the caller asks for a token
    let response = app.oneshot(get("alice", "bob|fred|jim")).await.unwrap();

    // THEN: 200 and the token carries exactly the one authorized group
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["auth"]["client_token"], "s.issued-token");
    assert_eq!(json["auth"]["policies"], serde_json::json!(["bob"]));

    let requests = vault.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].policies, strings(&["bob"]));
    assert_eq!(requests[0].display_name, "alice");
    assert_eq!(requests[0].ttl, "12h");
    assert_eq!(requests[0].explicit_max_ttl.as_deref(), Some("12h"));
    assert_eq!(requests[0].renewable, Some(false));
}

#[tokio::test]
async fn empty_allow_list_passes_claims_unfiltered() {
    let vault = Arc::new(FakeVault::default());
    let app = broker(vault.clone(), &[], IdentitySource::Headers, DeliveryMode::Direct);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header("X-Forwarded-User", "dave")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // A missing groups header claims a single empty group.
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(vault.requests.lock().unwrap()[0].policies, vec![String::new()]);
}

#[tokio::test]
async fn duplicate_matches_are_kept() {
    let vault = Arc::new(FakeVault::default());
    let app = broker(vault.clone(), &["ops", "dev"], IdentitySource::Headers, DeliveryMode::Direct);

    let response = app.oneshot(get("erin", "dev|ops|dev")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        vault.requests.lock().unwrap()[0].policies,
        strings(&["ops", "dev", "dev"])
    );
}

#[tokio::test]
async fn backend_rejection_is_embedded_in_500() {
    let vault = Arc::new(FakeVault {
        reject_with: Some("* policy \"bob\" does not exist".to_string()),
        ..FakeVault::default()
    });
    let app = broker(vault, &[], IdentitySource::Headers, DeliveryMode::Direct);

    let response = app.oneshot(get("alice", "bob")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_text(response).await,
        "Failed to get token: * policy \"bob\" does not exist"
    );
}

#[tokio::test]
async fn redirect_payload_matches_direct_body() {
    // GIVEN: the same deterministic backend behind both delivery modes
    let direct = broker(
        Arc::new(FakeVault::default()),
        &[],
        IdentitySource::Headers,
        DeliveryMode::Direct,
    );
    let redirect = broker(
        Arc::new(FakeVault::default()),
        &[],
        IdentitySource::Headers,
        DeliveryMode::Redirect,
    );

    // WHEN: the same caller asks both
    let direct_body = body_bytes(direct.oneshot(get("alice", "dev")).await.unwrap()).await;
    let response = redirect.oneshot(get("alice", "dev")).await.unwrap();

    // THEN: 307 to the loopback callback carrying the identical bytes
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    let url = url::Url::parse(location).unwrap();
    assert_eq!(url.host_str(), Some("localhost"));
    assert_eq!(url.port(), Some(63974));
    assert_eq!(url.path(), "/authed");

    let query: std::collections::HashMap<String, String> =
        url.query_pairs().into_owned().collect();
    assert_eq!(query.get("status").map(String::as_str), Some("ok"));
    let config = URL_SAFE.decode(&query["config"]).unwrap();
    assert_eq!(config, direct_body);
}

#[tokio::test]
async fn body_variant_issues_without_groups() {
    let vault = Arc::new(FakeVault::default());
    let app = broker(vault.clone(), &["admins"], IdentitySource::Body, DeliveryMode::Direct);

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .header("X-Forwarded-Groups", "nobody")
        .body(Body::from(r#"{"name": "carol"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let requests = vault.requests.lock().unwrap();
    assert_eq!(requests[0].display_name, "carol");
    assert!(requests[0].policies.is_empty());
}

#[tokio::test]
async fn body_variant_rejects_malformed_json() {
    let vault = Arc::new(FakeVault::default());
    let app = broker(vault.clone(), &[], IdentitySource::Body, DeliveryMode::Direct);

    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::from("{name: carol"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.starts_with("Failed to parse body: "));
    assert!(vault.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn oversized_body_is_a_read_failure() {
    let vault = Arc::new(FakeVault::default());
    let app = broker(vault.clone(), &[], IdentitySource::Body, DeliveryMode::Direct);

    let name = "x".repeat(128 * 1024);
    let request = Request::builder()
        .method("GET")
        .uri("/")
        .body(Body::from(format!(r#"{{"name":"{name}"}}"#)))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.starts_with("Failed to read body: "));
    assert!(vault.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn per_request_session_failure_is_a_500() {
    // GIVEN: a per-request session whose bootstrap credential is missing
    let vault = Arc::new(FakeVault::default());
    let initializer = SessionInitializer::new(
        vault.clone(),
        SessionSource::KubernetesLogin {
            login_path: "kubernetes/login".to_string(),
            role: "broker".to_string(),
            jwt_path: "/nonexistent/token".into(),
        },
    );
    let broker = TokenBroker::new(
        SessionProvider::PerRequest(initializer),
        TokenIssuer::new(vault.clone(), TokenConfig::default()),
        AllowList::default(),
        IdentityConfig::default(),
        DeliveryMode::Direct,
    );

    // WHEN: a request arrives
    let response = broker_routes(Arc::new(broker))
        .oneshot(get("alice", "dev"))
        .await
        .unwrap();

    // THEN: the request fails, the process keeps serving
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_text(response).await.starts_with("Failed to create vault session: "));
    assert!(vault.requests.lock().unwrap().is_empty());
}
