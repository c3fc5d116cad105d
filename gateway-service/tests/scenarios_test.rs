//! End-to-end scenarios over a live PostgreSQL database.
//!
//! These read `TEST_DATABASE_URL` and skip when it is unset, so the rest of
//! the suite stays runnable without a database. Each scenario uses
//! run-unique slugs; a shared test database never causes collisions.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use uuid::Uuid;

use common::{unique_slug, StubFetcher, TestApp, API_KEY};
use gateway_service::models::{BuildKind, BuildTrigger};

async fn live_app(fetcher: StubFetcher) -> Option<TestApp> {
    let app = TestApp::with_database(fetcher).await;
    if app.is_none() {
        eprintln!("TEST_DATABASE_URL not set; skipping");
    }
    app
}

fn json_post(uri: &str, api_key: Option<&str>, body: String) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn open_rule_grants_and_audits_once() {
    let Some(app) = live_app(StubFetcher::empty()).await else {
        return;
    };
    let slug = unique_slug("open-note");

    let (status, _) = app
        .request(json_post(
            "/api/internal/access-rules",
            Some(API_KEY),
            format!(r#"{{"type":"notes","slug":"{}","accessMode":"open"}}"#, slug),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = app
        .request(json_post(
            "/auth/verify",
            None,
            format!(r#"{{"type":"notes","slug":"{}"}}"#, slug),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["accessMode"], "open");
    assert!(!json["token"].as_str().unwrap().is_empty());

    let (logs, total) = app
        .state
        .db
        .find_access_logs(false, Some("notes"), Some(&slug), None, None)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert!(logs[0].granted);
    assert_eq!(logs[0].credential_type, "none");
}

#[tokio::test]
async fn every_verification_writes_one_audit_row() {
    let Some(app) = live_app(StubFetcher::empty()).await else {
        return;
    };
    let slug = unique_slug("gated-note");

    let (status, _) = app
        .request(json_post(
            "/api/internal/access-rules",
            Some(API_KEY),
            format!(
                r#"{{"type":"notes","slug":"{}","accessMode":"shared-secret","secret":"pw1"}}"#,
                slug
            ),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    // Grant, wrong-secret denial, missing-secret rejection.
    let (status, json) = app
        .request(json_post(
            "/auth/verify",
            None,
            format!(r#"{{"type":"notes","slug":"{}","secret":"pw1"}}"#, slug),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let (status, json) = app
        .request(json_post(
            "/auth/verify",
            None,
            format!(r#"{{"type":"notes","slug":"{}","secret":"wrong"}}"#, slug),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "Invalid credential");

    let (status, json) = app
        .request(json_post(
            "/auth/verify",
            None,
            format!(r#"{{"type":"notes","slug":"{}"}}"#, slug),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(!json["message"].as_str().unwrap().is_empty());

    // Exactly one audit row per verification, grant or deny.
    let (_, total) = app
        .state
        .db
        .find_access_logs(false, Some("notes"), Some(&slug), None, None)
        .await
        .unwrap();
    assert_eq!(total, 3);

    let (_, failed) = app
        .state
        .db
        .find_access_logs(true, Some("notes"), Some(&slug), None, None)
        .await
        .unwrap();
    assert_eq!(failed, 2);
}

#[tokio::test]
async fn deleting_a_rule_cascades_its_allowlist() {
    let Some(app) = live_app(StubFetcher::empty()).await else {
        return;
    };
    let slug = unique_slug("team-note");

    let (status, json) = app
        .request(json_post(
            "/api/internal/access-rules",
            Some(API_KEY),
            format!(
                r#"{{"type":"notes","slug":"{}","accessMode":"allow-list","allowedEmails":["a@x.com","b@x.com"]}}"#,
                slug
            ),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let rule_id = Uuid::parse_str(json["id"].as_str().unwrap()).unwrap();

    let emails = app.state.db.list_allowlist(rule_id).await.unwrap();
    assert_eq!(emails.len(), 2);

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/internal/access-rules/notes/{}", slug))
        .header("X-API-Key", API_KEY)
        .body(Body::empty())
        .unwrap();
    let (status, _) = app.request(req).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // FK cascade removed the entries with the rule.
    let emails = app.state.db.list_allowlist(rule_id).await.unwrap();
    assert!(emails.is_empty());
}

#[tokio::test]
async fn sync_run_collects_per_document_failures() {
    let alpha = unique_slug("alpha");
    let beta = unique_slug("beta");
    let gamma = unique_slug("gamma");
    let alpha_path = format!("content/notes/{}.md", alpha);
    let beta_path = format!("content/notes/{}.md", beta);
    let gamma_path = format!("content/notes/{}.md", gamma);

    let fetcher = StubFetcher::with_files(vec![
        (
            alpha_path.clone(),
            "---\ntitle: Alpha\n---\nFirst body".to_string(),
        ),
        (
            beta_path.clone(),
            "---\ntitle: Beta\n---\nSecond body".to_string(),
        ),
        // gamma is in the change set but not fetchable
    ]);
    let Some(app) = live_app(fetcher).await else {
        return;
    };

    let report = app
        .state
        .sync
        .run(
            vec![alpha_path, beta_path, gamma_path.clone()],
            Vec::new(),
            BuildKind::Content,
            BuildTrigger::Manual,
            None,
            None,
        )
        .await
        .unwrap();

    assert_eq!(report.files_processed, 3);
    assert_eq!(report.uploaded, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].path, gamma_path);

    // One fetch failure does not fail the build.
    let build = app
        .state
        .db
        .find_build_log_by_id(report.build_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(build.status, "success");
    assert!(build.completed_at.is_some());

    // The two good documents landed in the public bucket (no rules exist
    // for them).
    let key = format!("notes/{}.json", alpha);
    assert!(app.state.public_storage.download(&key).await.is_ok());
}
