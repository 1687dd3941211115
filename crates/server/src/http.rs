// The REST surface over the execution core.
//
// Routes map straight onto the core contract: one execute route per
// call, job routes straight to the job manager, and a read-only catalog
// route fed by the registry's iterator.

use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use folio_common::types::ExecuteOutcome;
use folio_core::executor::Executor;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::{require_bearer_auth, AuthState, AuthenticatedCaller};
use crate::error::ApiError;

#[derive(Clone)]
struct AppState {
    executor: Executor,
}

/// Build the authenticated `/v1` router.
pub fn build_router(executor: Executor, auth: AuthState) -> Router {
    Router::new()
        .route("/v1/operations", get(list_operations))
        .route("/v1/operations/{id}", post(execute_operation))
        .route("/v1/jobs/{id}", get(job_status))
        .route("/v1/jobs/{id}/cancel", post(cancel_job))
        .with_state(AppState { executor })
        .route_layer(middleware::from_fn_with_state(auth, require_bearer_auth))
}

async fn execute_operation(
    State(state): State<AppState>,
    Extension(AuthenticatedCaller(caller)): Extension<AuthenticatedCaller>,
    Path(operation_id): Path<String>,
    Json(params): Json<Value>,
) -> Result<Response, ApiError> {
    let outcome = state.executor.execute(&operation_id, params, &caller).await?;

    Ok(match outcome {
        ExecuteOutcome::Result { value } => {
            (StatusCode::OK, Json(json!({ "result": value }))).into_response()
        }
        ExecuteOutcome::Job { job_id } => (
            StatusCode::ACCEPTED,
            Json(json!({
                "job": {
                    "id": job_id,
                    "status_url": format!("/v1/jobs/{job_id}"),
                }
            })),
        )
            .into_response(),
    })
}

async fn job_status(
    State(state): State<AppState>,
    Extension(AuthenticatedCaller(caller)): Extension<AuthenticatedCaller>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let snapshot = state.executor.jobs().get_status(job_id, &caller).await?;
    Ok(Json(json!({ "job": snapshot })))
}

async fn cancel_job(
    State(state): State<AppState>,
    Extension(AuthenticatedCaller(caller)): Extension<AuthenticatedCaller>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    let snapshot = state.executor.jobs().cancel(job_id, &caller).await?;
    Ok(Json(json!({ "job": snapshot })))
}

/// Catalog route for documentation surfaces; the only consumer of
/// `registry.iter()`.
async fn list_operations(
    State(state): State<AppState>,
    Extension(AuthenticatedCaller(_caller)): Extension<AuthenticatedCaller>,
) -> Json<Value> {
    let items: Vec<Value> = state
        .executor
        .registry()
        .iter()
        .map(|definition| {
            json!({
                "id": definition.id,
                "summary": definition.summary,
                "mode": definition.mode.as_str(),
                "required_scopes": definition.required_scopes,
            })
        })
        .collect();

    Json(json!({ "items": items }))
}
