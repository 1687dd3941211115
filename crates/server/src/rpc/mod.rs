// JSON-RPC dispatch for the editor command channel.
//
// The channel exposes one operation command (`folio.executeOperation`)
// whose sole argument is the opaque string built by
// `folio_common::command`, plus job status/cancel and daemon plumbing.
// Domain failures ride in `error.data` with their stable wire code.

pub mod unix;

use folio_common::command::parse_operation_command;
use folio_common::error::OperationError;
use folio_common::protocol::jsonrpc::{
    Request, RequestId, Response, RpcError, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND,
    OPERATION_ERROR, PARSE_ERROR,
};
use folio_common::protocol::operations::{
    DAEMON_SHUTDOWN, EXECUTE_OPERATION, JOB_CANCEL, JOB_STATUS, RPC_PING,
};
use folio_common::types::{Caller, KNOWN_SCOPES};
use folio_core::executor::Executor;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Identity attached to command-channel sessions. Reaching the local
/// daemon socket implies owning the machine account, so the session
/// holds every scope; remote callers go through HTTP with API keys.
pub fn local_session_caller() -> Caller {
    Caller {
        user_id: None,
        api_key_id: None,
        scopes: KNOWN_SCOPES.iter().map(|scope| (*scope).to_string()).collect(),
    }
}

#[derive(Clone)]
pub struct RpcServerState {
    executor: Executor,
    session_caller: Caller,
    shutdown_notifier: Option<broadcast::Sender<()>>,
}

impl RpcServerState {
    pub fn new(executor: Executor, session_caller: Caller) -> Self {
        Self { executor, session_caller, shutdown_notifier: None }
    }

    pub fn with_shutdown_notifier(mut self, shutdown_notifier: broadcast::Sender<()>) -> Self {
        self.shutdown_notifier = Some(shutdown_notifier);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ExecuteOperationParams {
    command: String,
}

#[derive(Debug, Clone, Deserialize)]
struct JobParams {
    job_id: Uuid,
}

pub async fn handle_raw_request(raw: &[u8], state: &RpcServerState) -> Response {
    let request = match serde_json::from_slice::<Request>(raw) {
        Ok(request) => request,
        Err(error) => {
            return Response::error(
                RequestId::Null,
                RpcError {
                    code: PARSE_ERROR,
                    message: "Parse error".to_string(),
                    data: Some(json!({ "reason": error.to_string() })),
                },
            );
        }
    };

    if request.jsonrpc != "2.0" {
        return Response::error(
            request.id,
            RpcError { code: INVALID_REQUEST, message: "Invalid Request".to_string(), data: None },
        );
    }

    dispatch_request(request, state).await
}

pub async fn dispatch_request(request: Request, state: &RpcServerState) -> Response {
    match request.method.as_str() {
        RPC_PING => Response::success(request.id, json!({ "ok": true })),
        DAEMON_SHUTDOWN => {
            if let Some(notifier) = &state.shutdown_notifier {
                let _ = notifier.send(());
            }
            Response::success(request.id, json!({ "ok": true }))
        }
        EXECUTE_OPERATION => handle_execute_operation(request, state).await,
        JOB_STATUS => handle_job_status(request, state).await,
        JOB_CANCEL => handle_job_cancel(request, state).await,
        _ => Response::error(
            request.id,
            RpcError {
                code: METHOD_NOT_FOUND,
                message: "Method not found".to_string(),
                data: None,
            },
        ),
    }
}

async fn handle_execute_operation(request: Request, state: &RpcServerState) -> Response {
    let params = match decode_params::<ExecuteOperationParams>(
        request.params,
        request.id.clone(),
        EXECUTE_OPERATION,
    ) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let (operation_id, operation_params) = match parse_operation_command(&params.command) {
        Ok(parsed) => parsed,
        Err(error) => return operation_error_response(request.id, error),
    };

    match state
        .executor
        .execute(&operation_id, operation_params, &state.session_caller)
        .await
    {
        // The result-vs-job tag survives serialization, so the editor
        // side can decide whether to poll.
        Ok(outcome) => Response::success(request.id, json!(outcome)),
        Err(error) => operation_error_response(request.id, error),
    }
}

async fn handle_job_status(request: Request, state: &RpcServerState) -> Response {
    let params =
        match decode_params::<JobParams>(request.params, request.id.clone(), JOB_STATUS) {
            Ok(params) => params,
            Err(response) => return response,
        };

    match state.executor.jobs().get_status(params.job_id, &state.session_caller).await {
        Ok(snapshot) => Response::success(request.id, json!({ "job": snapshot })),
        Err(error) => operation_error_response(request.id, error),
    }
}

async fn handle_job_cancel(request: Request, state: &RpcServerState) -> Response {
    let params =
        match decode_params::<JobParams>(request.params, request.id.clone(), JOB_CANCEL) {
            Ok(params) => params,
            Err(response) => return response,
        };

    match state.executor.jobs().cancel(params.job_id, &state.session_caller).await {
        Ok(snapshot) => Response::success(request.id, json!({ "job": snapshot })),
        Err(error) => operation_error_response(request.id, error),
    }
}

fn decode_params<T: serde::de::DeserializeOwned>(
    params: Option<serde_json::Value>,
    request_id: RequestId,
    method: &str,
) -> Result<T, Response> {
    let Some(params) = params else {
        return Err(invalid_params_response(request_id, format!("{method} requires params")));
    };

    serde_json::from_value::<T>(params).map_err(|error| {
        invalid_params_response(request_id, format!("failed to decode {method} params: {error}"))
    })
}

fn invalid_params_response(request_id: RequestId, reason: String) -> Response {
    Response::error(
        request_id,
        RpcError {
            code: INVALID_PARAMS,
            message: "Invalid params".to_string(),
            data: Some(json!({ "reason": reason })),
        },
    )
}

fn operation_error_response(request_id: RequestId, error: OperationError) -> Response {
    let mut data = json!({
        "code": error.code(),
        "retryable": error.retryable(),
    });
    if let OperationError::Validation { violations } = &error {
        data["violations"] = json!(violations);
    }

    Response::error(
        request_id,
        RpcError { code: OPERATION_ERROR, message: error.to_string(), data: Some(data) },
    )
}
