// The closed error taxonomy surfaced by the operation core.
//
// Every failure a caller can observe — over HTTP or over the command
// channel — is one of these variants. Handlers report faults through
// `HandlerFault`; the executor wraps them so nothing escapes raw.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One field-level schema violation, reported to the caller verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// Fault categories a handler may report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    InvalidInput,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

impl FaultKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal",
        }
    }
}

/// A failure raised by an operation handler.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[error("{}: {message}", .kind.as_str())]
pub struct HandlerFault {
    pub kind: FaultKind,
    pub message: String,
}

impl HandlerFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidInput, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FaultKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Conflict, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Unavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Internal, message)
    }
}

/// Everything the operation core can fail with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperationError {
    /// No definition registered under the requested id.
    #[error("unknown operation `{operation_id}`")]
    UnknownOperation { operation_id: String },

    /// Registration-time collision. Fatal at startup, never a runtime path.
    #[error("operation `{operation_id}` is already registered")]
    DuplicateOperation { operation_id: String },

    /// Input failed schema validation; carries every field-level violation.
    #[error("operation input failed validation ({} violation(s))", .violations.len())]
    Validation { violations: Vec<FieldViolation> },

    /// Caller lacks one or more required scopes. The missing scopes are
    /// logged server-side; the caller sees only a generic refusal.
    #[error("caller lacks required permission")]
    Authorization,

    /// A synchronous handler reported a fault.
    #[error("handler failed: {fault}")]
    Handler { fault: HandlerFault },

    /// The pending-job queue is at its configured bound.
    #[error("job queue is at capacity; retry later")]
    CapacityExceeded,

    /// Job id is unknown (or already swept from retention).
    #[error("job not found")]
    NotFound,

    /// Caller is neither the job owner nor a job admin.
    #[error("caller may not access this job")]
    Forbidden,

    /// Cancel on a job that already reached a terminal state. Non-fatal.
    #[error("job already reached a terminal state")]
    AlreadyTerminal,

    /// Command-channel string was not produced by a compatible encoder.
    #[error("malformed operation command: {reason}")]
    MalformedCommand { reason: String },
}

impl OperationError {
    pub fn unknown_operation(operation_id: impl Into<String>) -> Self {
        Self::UnknownOperation { operation_id: operation_id.into() }
    }

    pub fn duplicate_operation(operation_id: impl Into<String>) -> Self {
        Self::DuplicateOperation { operation_id: operation_id.into() }
    }

    pub fn malformed_command(reason: impl Into<String>) -> Self {
        Self::MalformedCommand { reason: reason.into() }
    }

    /// Stable wire code, shared by the HTTP envelope and the RPC `data`
    /// payload.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownOperation { .. } => "UNKNOWN_OPERATION",
            Self::DuplicateOperation { .. } => "DUPLICATE_OPERATION",
            Self::Validation { .. } => "VALIDATION_FAILED",
            Self::Authorization => "AUTH_FORBIDDEN",
            Self::Handler { .. } => "HANDLER_FAILED",
            Self::CapacityExceeded => "CAPACITY_EXCEEDED",
            Self::NotFound => "NOT_FOUND",
            Self::Forbidden => "JOB_FORBIDDEN",
            Self::AlreadyTerminal => "JOB_ALREADY_TERMINAL",
            Self::MalformedCommand { .. } => "MALFORMED_COMMAND",
        }
    }

    /// Whether the caller may reasonably retry the same call.
    pub fn retryable(&self) -> bool {
        match self {
            Self::CapacityExceeded => true,
            Self::Handler { fault } => fault.kind == FaultKind::Unavailable,
            _ => false,
        }
    }
}
