//! Router-level tests for the gateway's authentication gates: webhook
//! signatures, the internal API key, and bearer tokens. These run against
//! local storage and a lazy database pool; every request here is answered
//! before any query would be issued.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::{TestApp, API_KEY, TOKEN_SECRET, WEBHOOK_SECRET};
use gateway_service::build_router;
use gateway_service::services::TokenService;
use service_core::utils::signature::generate_signature;

fn signed_webhook(body: &str) -> Request<Body> {
    let signature = generate_signature(WEBHOOK_SECRET, body.as_bytes()).unwrap();
    Request::builder()
        .method("POST")
        .uri("/api/content-sync/webhook")
        .header("content-type", "application/json")
        .header("X-Hub-Signature-256", signature)
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn webhook_without_signature_is_rejected() {
    let app = TestApp::detached().await;

    let req = Request::builder()
        .method("POST")
        .uri("/api/content-sync/webhook")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"ref":"refs/heads/main","commits":[]}"#))
        .unwrap();

    let (status, _) = app.request(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn webhook_with_bad_signature_is_rejected() {
    let app = TestApp::detached().await;
    let body = r#"{"ref":"refs/heads/main","commits":[]}"#;
    let signature = generate_signature("wrong-secret", body.as_bytes()).unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/api/content-sync/webhook")
        .header("content-type", "application/json")
        .header("X-Hub-Signature-256", signature)
        .body(Body::from(body))
        .unwrap();

    let (status, _) = app.request(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_tampered_body_is_rejected() {
    let app = TestApp::detached().await;
    let signature =
        generate_signature(WEBHOOK_SECRET, br#"{"ref":"refs/heads/main","commits":[]}"#).unwrap();

    let req = Request::builder()
        .method("POST")
        .uri("/api/content-sync/webhook")
        .header("content-type", "application/json")
        .header("X-Hub-Signature-256", signature)
        .body(Body::from(r#"{"ref":"refs/heads/evil","commits":[]}"#))
        .unwrap();

    let (status, _) = app.request(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn webhook_ignores_other_branches() {
    let app = TestApp::detached().await;
    let body = r#"{"ref":"refs/heads/draft","after":"abc","commits":[{"added":["content/notes/a.md"],"modified":[],"removed":[]}]}"#;

    let (status, json) = app.request(signed_webhook(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filesProcessed"], 0);
    assert!(json["message"].as_str().unwrap().contains("draft"));
}

#[tokio::test]
async fn webhook_with_no_content_changes_short_circuits() {
    let app = TestApp::detached().await;
    let body = r#"{"ref":"refs/heads/main","after":"abc","commits":[{"added":["README.md"],"modified":["src/main.rs"],"removed":[]}]}"#;

    let (status, json) = app.request(signed_webhook(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filesProcessed"], 0);
    assert_eq!(json["message"], "No content changes in push");
}

#[tokio::test]
async fn webhook_with_invalid_json_is_bad_request() {
    let app = TestApp::detached().await;
    let (status, _) = app.request(signed_webhook("not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn internal_api_requires_key() {
    let app = TestApp::detached().await;

    let req = Request::builder()
        .method("GET")
        .uri("/api/content-catalog")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.request(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method("GET")
        .uri("/api/content-catalog")
        .header("X-API-Key", "wrong-key")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.request(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn catalog_lists_synchronized_artifacts() {
    let app = TestApp::detached().await;
    app.state
        .public_storage
        .upload("notes/open-note.json", b"{}".to_vec())
        .await
        .unwrap();
    app.state
        .protected_storage
        .upload("ideas/secret-idea.json", b"{}".to_vec())
        .await
        .unwrap();

    let req = Request::builder()
        .method("GET")
        .uri("/api/content-catalog")
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, json) = app.request(req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 2);
    let docs = json["documents"].as_array().unwrap();
    assert_eq!(docs[0]["type"], "ideas");
    assert_eq!(docs[0]["slug"], "secret-idea");
    assert_eq!(docs[0]["protected"], true);
    assert_eq!(docs[1]["type"], "notes");
    assert_eq!(docs[1]["protected"], false);
}

#[tokio::test]
async fn catalog_filters_by_type() {
    let app = TestApp::detached().await;
    app.state
        .public_storage
        .upload("notes/a.json", b"{}".to_vec())
        .await
        .unwrap();
    app.state
        .public_storage
        .upload("ideas/b.json", b"{}".to_vec())
        .await
        .unwrap();

    let req = Request::builder()
        .method("GET")
        .uri("/api/content-catalog/notes")
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, json) = app.request(req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert_eq!(json["documents"][0]["slug"], "a");
}

#[tokio::test]
async fn content_requires_bearer_token() {
    let app = TestApp::detached().await;

    let req = Request::builder()
        .method("GET")
        .uri("/auth/content/notes/my-note")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.request(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .method("GET")
        .uri("/auth/content/notes/my-note")
        .header("Authorization", "Bearer garbage")
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.request(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn content_token_is_scoped_to_one_document() {
    let app = TestApp::detached().await;

    // A valid token for another document fails before any lookup.
    let token = TokenService::new(TOKEN_SECRET, 60)
        .issue("notes", "other-note", None)
        .unwrap();

    let req = Request::builder()
        .method("GET")
        .uri("/auth/content/notes/my-note")
        .header("Authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.request(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn verify_failure_body_carries_success_and_message() {
    let app = TestApp::detached().await;

    let req = Request::builder()
        .method("POST")
        .uri("/auth/verify")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"type":"","slug":"my-note"}"#))
        .unwrap();
    let (status, json) = app.request(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(!json["message"].as_str().unwrap().is_empty());
    assert!(json.get("token").is_none());
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn manual_sync_requires_a_target() {
    let app = TestApp::detached().await;

    let req = Request::builder()
        .method("POST")
        .uri("/api/content-sync/manual")
        .header("X-API-Key", API_KEY)
        .header("content-type", "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, json) = app.request(req).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("fullSync"));
}

#[tokio::test]
async fn security_headers_are_applied() {
    let app = TestApp::detached().await;
    let router = build_router(app.state.clone()).unwrap();

    let req = Request::builder()
        .method("GET")
        .uri("/auth/access/notes/missing")
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(req).await.unwrap();

    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
}
