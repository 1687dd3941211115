// Core domain types shared across all Folio crates.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::HandlerFault;

// ── Scopes ──────────────────────────────────────────────────────────

pub const SCOPE_DOCUMENTS_READ: &str = "documents:read";
pub const SCOPE_DOCUMENTS_WRITE: &str = "documents:write";
pub const SCOPE_SHARES_MANAGE: &str = "shares:manage";
pub const SCOPE_KEYS_ADMIN: &str = "keys:admin";

/// Holders may query and cancel jobs they do not own.
pub const SCOPE_JOBS_ADMIN: &str = "jobs:admin";

/// Every scope the platform grants.
pub const KNOWN_SCOPES: &[&str] = &[
    SCOPE_DOCUMENTS_READ,
    SCOPE_DOCUMENTS_WRITE,
    SCOPE_SHARES_MANAGE,
    SCOPE_KEYS_ADMIN,
    SCOPE_JOBS_ADMIN,
];

// ── Caller ──────────────────────────────────────────────────────────

/// A verified caller identity: a user and/or the API key it presented,
/// plus the scopes granted to it. Produced by the authentication layer
/// before a call ever reaches the executor — the executor only
/// scope-checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Caller {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_id: Option<Uuid>,
    pub scopes: BTreeSet<String>,
}

impl Caller {
    pub fn for_user(user_id: Uuid, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            user_id: Some(user_id),
            api_key_id: None,
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn for_api_key(
        api_key_id: Uuid,
        user_id: Option<Uuid>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            user_id,
            api_key_id: Some(api_key_id),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }

    /// Scope-set inclusion: the caller must hold every required scope;
    /// extra scopes are permitted.
    pub fn holds_all(&self, required: &[&str]) -> bool {
        required.iter().all(|scope| self.scopes.contains(*scope))
    }

    pub fn missing_scopes<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required.iter().copied().filter(|scope| !self.scopes.contains(*scope)).collect()
    }

    /// Stable owner key for job ownership checks: the API key identity
    /// when present, otherwise the user identity.
    pub fn owner_key(&self) -> String {
        match (self.api_key_id, self.user_id) {
            (Some(key_id), _) => format!("key:{key_id}"),
            (None, Some(user_id)) => format!("user:{user_id}"),
            (None, None) => "anonymous".to_string(),
        }
    }

    pub fn is_job_admin(&self) -> bool {
        self.scopes.contains(SCOPE_JOBS_ADMIN)
    }
}

// ── Jobs ────────────────────────────────────────────────────────────

/// Job lifecycle state.
///
/// `pending → running → (succeeded | failed | cancelled)`; the three
/// right-hand states are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Immutable value copy of a job's state, as returned to callers.
/// Holders can never mutate the live job through it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobSnapshot {
    pub id: Uuid,
    pub operation_id: String,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<HandlerFault>,
}

// ── Execute outcome ─────────────────────────────────────────────────

/// What an operation call produced: an immediate result, or a handle to
/// a scheduled job the caller should poll. The tag survives both
/// transports so clients can tell the two apart.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecuteOutcome {
    Result { value: serde_json::Value },
    Job { job_id: Uuid },
}

#[cfg(test)]
mod tests {
    use super::{Caller, ExecuteOutcome, JobState, SCOPE_DOCUMENTS_READ, SCOPE_DOCUMENTS_WRITE};
    use uuid::Uuid;

    #[test]
    fn holds_all_is_superset_inclusion_not_equality() {
        let caller = Caller::for_user(
            Uuid::new_v4(),
            [SCOPE_DOCUMENTS_READ, SCOPE_DOCUMENTS_WRITE, "extra:scope"],
        );
        assert!(caller.holds_all(&[SCOPE_DOCUMENTS_READ]));
        assert!(caller.holds_all(&[SCOPE_DOCUMENTS_READ, SCOPE_DOCUMENTS_WRITE]));
        assert!(!caller.holds_all(&["shares:manage"]));
    }

    #[test]
    fn owner_key_prefers_api_key_identity() {
        let key_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let caller =
            Caller::for_api_key(key_id, Some(user_id), [SCOPE_DOCUMENTS_READ]);
        assert_eq!(caller.owner_key(), format!("key:{key_id}"));

        let user_only = Caller::for_user(user_id, [SCOPE_DOCUMENTS_READ]);
        assert_eq!(user_only.owner_key(), format!("user:{user_id}"));
    }

    #[test]
    fn terminal_states_are_exactly_the_three_final_ones() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }

    #[test]
    fn execute_outcome_wire_tag_distinguishes_result_from_job() {
        let result = ExecuteOutcome::Result { value: serde_json::json!({"ok": true}) };
        let encoded = serde_json::to_value(&result).expect("outcome should serialize");
        assert_eq!(encoded["kind"], "result");

        let job = ExecuteOutcome::Job { job_id: Uuid::new_v4() };
        let encoded = serde_json::to_value(&job).expect("outcome should serialize");
        assert_eq!(encoded["kind"], "job");
    }
}
