//! Provisioning RPC Integration Tests
//!
//! Exercises the HTTP/JSON surface end to end: a device walks Bootstrap →
//! Provision and receives a certificate that chains to the served root.
//! Error cases check both the HTTP status and the `{code, message}` body.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use x509_parser::pem::parse_x509_pem;

use aura_core::crypto::{CaSettings, CertificateAuthority};
use aura_server::handlers::{router, SERVICE_PATH};
use aura_server::services::{ChallengeStore, ProvisioningService, ProvisioningSettings};
use aura_server::storage::{MemoryRecordStore, RecordStore};

// ════════════════════════════════════════════════════════════════════════════
// HELPERS
// ════════════════════════════════════════════════════════════════════════════

fn app(records: Arc<MemoryRecordStore>) -> Router {
    let ca = CertificateAuthority::initialize(CaSettings::default()).unwrap();
    let settings = ProvisioningSettings::default();
    let challenges = Arc::new(ChallengeStore::new(settings.challenge_ttl));
    router(Arc::new(ProvisioningService::new(
        records,
        Arc::new(ca),
        challenges,
        settings,
    )))
}

async fn call(app: &Router, method: &str, body: Value) -> (StatusCode, Value) {
    call_raw(app, method, body.to_string()).await
}

async fn call_raw(app: &Router, method: &str, body: String) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(format!("{SERVICE_PATH}/{method}"))
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn assert_error(result: &(StatusCode, Value), status: StatusCode, code: &str) {
    assert_eq!(result.0, status, "body: {}", result.1);
    assert_eq!(result.1["code"], code);
    assert!(result.1["message"].as_str().is_some_and(|m| !m.is_empty()));
}

// ════════════════════════════════════════════════════════════════════════════
// ENROLLMENT
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn device_enrolls_and_certificate_chains_to_root() {
    let records = Arc::new(MemoryRecordStore::new());
    let device = records.create_device("factory-token").await.unwrap();
    let app = app(records.clone());

    let (status, boot) = call(&app, "Bootstrap", json!({ "bootstrap_token": "factory-token" })).await;
    assert_eq!(status, StatusCode::OK);
    let challenge = boot["challenge"].as_str().unwrap().to_string();
    assert!(boot["expires_at"].is_string());

    let (status, prov) = call(
        &app,
        "Provision",
        json!({ "challenge": challenge, "signed_challenge": "sig" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prov["device_id"], device.id.to_string());
    assert_eq!(prov["transport_port"], 8883);

    let (_, root_pem) = parse_x509_pem(prov["ca_certificate"].as_str().unwrap().as_bytes()).unwrap();
    let (_, leaf_pem) =
        parse_x509_pem(prov["client_certificate"].as_str().unwrap().as_bytes()).unwrap();
    let root = root_pem.parse_x509().unwrap();
    let leaf = leaf_pem.parse_x509().unwrap();
    assert!(leaf.verify_signature(Some(root.public_key())).is_ok());
    assert!(leaf
        .subject()
        .iter_common_name()
        .any(|cn| cn.as_str().ok() == Some(device.id.to_string().as_str())));

    let stored = records.get_device(&device.id).await.unwrap();
    assert!(stored.is_provisioned());
    assert!(stored.bootstrap_token.is_none());

    // The token is spent
    let again = call(&app, "Bootstrap", json!({ "bootstrap_token": "factory-token" })).await;
    assert_error(&again, StatusCode::NOT_FOUND, "not_found");
}

#[tokio::test]
async fn camel_case_fields_are_accepted() {
    let records = Arc::new(MemoryRecordStore::new());
    records.create_device("tok").await.unwrap();
    let app = app(records);

    let (status, boot) = call(&app, "Bootstrap", json!({ "bootstrapToken": "tok" })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        &app,
        "Provision",
        json!({ "challenge": boot["challenge"], "signedChallenge": "sig" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

// ════════════════════════════════════════════════════════════════════════════
// ERROR MAPPING
// ════════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn bootstrap_errors() {
    let app = app(Arc::new(MemoryRecordStore::new()));

    let empty = call(&app, "Bootstrap", json!({ "bootstrap_token": "" })).await;
    assert_error(&empty, StatusCode::BAD_REQUEST, "invalid_argument");

    let unknown = call(&app, "Bootstrap", json!({ "bootstrap_token": "nope" })).await;
    assert_error(&unknown, StatusCode::NOT_FOUND, "not_found");

    let malformed = call_raw(&app, "Bootstrap", "{not json".to_string()).await;
    assert_error(&malformed, StatusCode::BAD_REQUEST, "invalid_argument");
}

#[tokio::test]
async fn provision_errors() {
    let records = Arc::new(MemoryRecordStore::new());
    records.create_device("tok").await.unwrap();
    let app = app(records);

    let missing = call(&app, "Provision", json!({ "challenge": "", "signed_challenge": "s" })).await;
    assert_error(&missing, StatusCode::BAD_REQUEST, "invalid_argument");

    let unknown = call(
        &app,
        "Provision",
        json!({ "challenge": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA=", "signed_challenge": "s" }),
    )
    .await;
    assert_error(&unknown, StatusCode::BAD_REQUEST, "invalid_argument");

    let (_, boot) = call(&app, "Bootstrap", json!({ "bootstrap_token": "tok" })).await;
    let request = json!({ "challenge": boot["challenge"], "signed_challenge": "s" });
    let (status, _) = call(&app, "Provision", request.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let replay = call(&app, "Provision", request).await;
    assert_error(&replay, StatusCode::BAD_REQUEST, "invalid_argument");
}

#[tokio::test]
async fn root_certificate_and_health_routes() {
    let app = app(Arc::new(MemoryRecordStore::new()));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("{SERVICE_PATH}/RootCertificate"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    assert!(String::from_utf8(body.to_vec()).unwrap().starts_with("-----BEGIN CERTIFICATE-----"));

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
