// REST contract: auth gate, execute envelopes, job routes, error
// bodies.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header::AUTHORIZATION, Method, Request, StatusCode},
    Router,
};
use folio_core::config::JobConfig;
use folio_core::executor::Executor;
use folio_core::jobs::JobManager;
use folio_server::auth::AuthState;
use folio_server::http::build_router;
use folio_server::ops::build_registry;
use folio_server::store::PlatformStore;
use serde_json::{json, Value};
use tower::ServiceExt;

const BOOTSTRAP_TOKEN: &str = "folio_test_bootstrap_token";

fn test_router() -> Router {
    let store = Arc::new(PlatformStore::new());
    let registry = build_registry(Arc::clone(&store)).expect("catalog should build");
    let executor = Executor::new(Arc::new(registry), JobManager::start(JobConfig::default()));
    let auth = AuthState::new(store, Some(BOOTSTRAP_TOKEN));
    build_router(executor, auth)
}

async fn call(
    router: &Router,
    method: Method,
    path: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(path);
    if let Some(token) = token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }

    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request
            .header("content-type", "application/json")
            .body(Body::from("{}")),
    }
    .expect("request should build");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("request should return a response");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body should be readable");
    let body: Value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body should be valid json")
    };
    (status, body)
}

async fn issue_key(router: &Router, scopes: &[&str]) -> String {
    let (status, body) = call(
        router,
        Method::POST,
        "/v1/operations/apikey.issue",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({ "label": "test-key", "scopes": scopes })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "key issue should succeed: {body}");
    body["result"]["secret_once"].as_str().expect("secret should be present").to_string()
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let router = test_router();
    let (status, body) = call(
        &router,
        Method::POST,
        "/v1/operations/doc.create",
        None,
        Some(json!({ "name": "a.md", "content": "x" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "AUTH_INVALID_TOKEN");
}

#[tokio::test]
async fn sync_execute_returns_the_result_envelope() {
    let router = test_router();
    let (status, body) = call(
        &router,
        Method::POST,
        "/v1/operations/doc.create",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({ "name": "notes.md", "content": "# hello" })),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "create should succeed: {body}");
    assert_eq!(body["result"]["document"]["name"], "notes.md");
    assert!(body["result"]["document"]["etag"].is_string());
}

#[tokio::test]
async fn unknown_operation_is_a_404_with_the_domain_code() {
    let router = test_router();
    let (status, body) = call(
        &router,
        Method::POST,
        "/v1/operations/doc.vanish",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({})),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "UNKNOWN_OPERATION");
}

#[tokio::test]
async fn validation_failures_list_the_offending_fields() {
    let router = test_router();
    let (status, body) = call(
        &router,
        Method::POST,
        "/v1/operations/doc.create",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({ "name": "notes.md" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
    let violations = body["error"]["details"]["violations"]
        .as_array()
        .expect("violations should be present");
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0]["field"], "content");
}

#[tokio::test]
async fn missing_scope_is_a_generic_forbidden() {
    let router = test_router();
    let reader_secret = issue_key(&router, &["documents:read"]).await;

    let (status, body) = call(
        &router,
        Method::POST,
        "/v1/operations/doc.create",
        Some(&reader_secret),
        Some(json!({ "name": "notes.md", "content": "x" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "AUTH_FORBIDDEN");
    assert_eq!(
        body["error"]["message"], "caller lacks required permission",
        "the body must not name the missing scope"
    );
}

#[tokio::test]
async fn async_execute_returns_202_and_the_job_completes() {
    let router = test_router();

    call(
        &router,
        Method::POST,
        "/v1/operations/doc.create",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({ "name": "a.md", "content": "alpha" })),
    )
    .await;

    let (status, body) = call(
        &router,
        Method::POST,
        "/v1/operations/doc.export",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({ "format": "markdown" })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED, "async dispatch should 202: {body}");
    let job_id = body["job"]["id"].as_str().expect("job id should be present").to_string();
    assert_eq!(
        body["job"]["status_url"],
        format!("/v1/jobs/{job_id}"),
        "202 body must carry the polling location"
    );

    for _ in 0..200 {
        let (status, body) = call(
            &router,
            Method::GET,
            &format!("/v1/jobs/{job_id}"),
            Some(BOOTSTRAP_TOKEN),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        match body["job"]["state"].as_str() {
            Some("succeeded") => {
                let archive =
                    body["job"]["result"]["archive"].as_str().expect("archive should be present");
                assert!(archive.contains("alpha"));
                assert!(body["job"]["error"].is_null());
                return;
            }
            Some("pending" | "running") => {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            other => panic!("unexpected job state {other:?}: {body}"),
        }
    }
    panic!("export job never finished");
}

#[tokio::test]
async fn cancelling_a_finished_job_conflicts_without_touching_its_result() {
    let router = test_router();
    let (_, body) = call(
        &router,
        Method::POST,
        "/v1/operations/doc.export",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({})),
    )
    .await;
    let job_id = body["job"]["id"].as_str().expect("job id should be present").to_string();

    // Wait until terminal.
    for _ in 0..200 {
        let (_, body) = call(
            &router,
            Method::GET,
            &format!("/v1/jobs/{job_id}"),
            Some(BOOTSTRAP_TOKEN),
            None,
        )
        .await;
        if body["job"]["state"] == "succeeded" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let (status, body) = call(
        &router,
        Method::POST,
        &format!("/v1/jobs/{job_id}/cancel"),
        Some(BOOTSTRAP_TOKEN),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "JOB_ALREADY_TERMINAL");

    let (_, body) = call(
        &router,
        Method::GET,
        &format!("/v1/jobs/{job_id}"),
        Some(BOOTSTRAP_TOKEN),
        None,
    )
    .await;
    assert_eq!(body["job"]["state"], "succeeded", "failed cancel must not alter the job");
}

#[tokio::test]
async fn jobs_are_invisible_to_callers_who_do_not_own_them() {
    let router = test_router();
    let (_, body) = call(
        &router,
        Method::POST,
        "/v1/operations/doc.export",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({})),
    )
    .await;
    let job_id = body["job"]["id"].as_str().expect("job id should be present").to_string();

    let stranger_secret = issue_key(&router, &["documents:read"]).await;
    let (status, body) = call(
        &router,
        Method::GET,
        &format!("/v1/jobs/{job_id}"),
        Some(&stranger_secret),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "non-owner must be refused: {body}");
    assert_eq!(body["error"]["code"], "JOB_FORBIDDEN");
}

#[tokio::test]
async fn issued_keys_work_until_revoked() {
    let router = test_router();

    let (status, body) = call(
        &router,
        Method::POST,
        "/v1/operations/apikey.issue",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({ "label": "ci", "scopes": ["documents:read"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let secret = body["result"]["secret_once"].as_str().expect("secret once").to_string();
    let key_id = body["result"]["api_key"]["id"].as_str().expect("key id").to_string();

    let (status, _) =
        call(&router, Method::POST, "/v1/operations/doc.list", Some(&secret), Some(json!({})))
            .await;
    assert_eq!(status, StatusCode::OK, "fresh key should authenticate");

    let (status, _) = call(
        &router,
        Method::POST,
        "/v1/operations/apikey.revoke",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({ "key_id": key_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) =
        call(&router, Method::POST, "/v1/operations/doc.list", Some(&secret), Some(json!({})))
            .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "revoked key must be refused: {body}");
}

#[tokio::test]
async fn catalog_route_lists_every_operation() {
    let router = test_router();
    let (status, body) =
        call(&router, Method::GET, "/v1/operations", Some(BOOTSTRAP_TOKEN), None).await;

    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().expect("items should be present");
    assert_eq!(
        items.len(),
        folio_common::protocol::operations::IMPLEMENTED_OPERATIONS.len()
    );
    let export = items
        .iter()
        .find(|item| item["id"] == "doc.export")
        .expect("doc.export should be listed");
    assert_eq!(export["mode"], "async");
}

#[tokio::test]
async fn doc_list_pages_with_opaque_cursors() {
    let router = test_router();
    for index in 0..3 {
        call(
            &router,
            Method::POST,
            "/v1/operations/doc.create",
            Some(BOOTSTRAP_TOKEN),
            Some(json!({ "name": format!("doc-{index}.md"), "content": "x" })),
        )
        .await;
    }

    let (status, body) = call(
        &router,
        Method::POST,
        "/v1/operations/doc.list",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({ "limit": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["items"].as_array().expect("items").len(), 2);
    let cursor = body["result"]["next_cursor"].as_str().expect("cursor should be present");

    let (status, body) = call(
        &router,
        Method::POST,
        "/v1/operations/doc.list",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({ "limit": 2, "cursor": cursor })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["items"].as_array().expect("items").len(), 1);
    assert!(body["result"]["next_cursor"].is_null());

    // A tampered cursor is rejected, not silently treated as page one.
    let (status, body) = call(
        &router,
        Method::POST,
        "/v1/operations/doc.list",
        Some(BOOTSTRAP_TOKEN),
        Some(json!({ "cursor": "!!tampered!!" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "tampered cursor: {body}");
}
