// HTTP error envelope.
//
// Every failure leaves the API as one JSON shape:
// `{"error": {"code", "message", "retryable", "details"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use folio_common::error::{FaultKind, OperationError};
use serde_json::{json, Value};

/// Anything an HTTP route can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// Authentication failed before a caller identity existed.
    Unauthorized { message: &'static str },
    /// The execution core refused or failed the call.
    Operation(OperationError),
}

impl From<OperationError> for ApiError {
    fn from(error: OperationError) -> Self {
        Self::Operation(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Operation(error) => operation_status(error),
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "AUTH_INVALID_TOKEN",
            Self::Operation(error) => error.code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Unauthorized { .. } => false,
            Self::Operation(error) => error.retryable(),
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Unauthorized { message } => (*message).to_string(),
            Self::Operation(error) => error.to_string(),
        }
    }

    fn details(&self) -> Value {
        match self {
            Self::Operation(OperationError::Validation { violations }) => {
                json!({ "violations": violations })
            }
            Self::Operation(OperationError::Handler { fault }) => {
                json!({ "fault_kind": fault.kind })
            }
            _ => json!({}),
        }
    }
}

fn operation_status(error: &OperationError) -> StatusCode {
    match error {
        OperationError::UnknownOperation { .. } => StatusCode::NOT_FOUND,
        // Registration-time only; seeing it on a request path is a bug.
        OperationError::DuplicateOperation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        OperationError::Validation { .. } => StatusCode::BAD_REQUEST,
        OperationError::Authorization => StatusCode::FORBIDDEN,
        OperationError::Handler { fault } => match fault.kind {
            FaultKind::InvalidInput => StatusCode::BAD_REQUEST,
            FaultKind::NotFound => StatusCode::NOT_FOUND,
            FaultKind::Conflict => StatusCode::CONFLICT,
            FaultKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            FaultKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        },
        OperationError::CapacityExceeded => StatusCode::TOO_MANY_REQUESTS,
        OperationError::NotFound => StatusCode::NOT_FOUND,
        OperationError::Forbidden => StatusCode::FORBIDDEN,
        OperationError::AlreadyTerminal => StatusCode::CONFLICT,
        OperationError::MalformedCommand { .. } => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(
            self,
            Self::Operation(
                OperationError::Handler { .. } | OperationError::DuplicateOperation { .. }
            )
        ) {
            tracing::error!(code = self.code(), message = %self.message(), "operation failed");
        }

        (
            self.status(),
            Json(json!({
                "error": {
                    "code": self.code(),
                    "message": self.message(),
                    "retryable": self.retryable(),
                    "details": self.details(),
                }
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use axum::{body::to_bytes, http::StatusCode, response::IntoResponse};
    use folio_common::error::{FieldViolation, HandlerFault, OperationError};
    use serde_json::Value;

    async fn body_of(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("error body should be readable");
        serde_json::from_slice(&bytes).expect("error body should be valid json")
    }

    #[tokio::test]
    async fn validation_errors_carry_field_level_details() {
        let response = ApiError::from(OperationError::Validation {
            violations: vec![FieldViolation::new("content", "is required")],
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_of(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_FAILED");
        assert_eq!(body["error"]["details"]["violations"][0]["field"], "content");
    }

    #[tokio::test]
    async fn capacity_is_a_retryable_429() {
        let response = ApiError::from(OperationError::CapacityExceeded).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_of(response).await;
        assert_eq!(body["error"]["retryable"], true);
    }

    #[tokio::test]
    async fn authorization_body_is_generic() {
        let response = ApiError::from(OperationError::Authorization).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_of(response).await;
        assert_eq!(body["error"]["message"], "caller lacks required permission");
        assert_eq!(body["error"]["details"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn handler_conflict_maps_to_409() {
        let response = ApiError::from(OperationError::Handler {
            fault: HandlerFault::conflict("document path already exists"),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_of(response).await;
        assert_eq!(body["error"]["details"]["fault_kind"], "conflict");
    }
}
