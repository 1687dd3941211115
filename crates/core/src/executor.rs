// The operation executor: one gate sequence for every call, whichever
// transport it arrived on.
//
// resolve → validate → authorize → dispatch. Each gate is hard: failing
// one aborts before the next, and the handler is never touched by a
// call that did not clear validation and authorization.

use std::sync::Arc;

use folio_common::error::OperationError;
use folio_common::types::{Caller, ExecuteOutcome};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::jobs::{JobInvocation, JobManager};
use crate::registry::{OperationContext, OperationMode, OperationRegistry};

/// Validates, authorizes, and dispatches operation calls against the
/// registry. Cheap to clone.
#[derive(Clone)]
pub struct Executor {
    registry: Arc<OperationRegistry>,
    jobs: JobManager,
}

impl Executor {
    pub fn new(registry: Arc<OperationRegistry>, jobs: JobManager) -> Self {
        Self { registry, jobs }
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    /// Execute one operation call for a verified caller.
    ///
    /// Synchronous operations return `ExecuteOutcome::Result` with the
    /// handler's value; asynchronous ones return `ExecuteOutcome::Job`
    /// immediately and the caller polls the job manager.
    pub async fn execute(
        &self,
        operation_id: &str,
        raw_params: Value,
        caller: &Caller,
    ) -> Result<ExecuteOutcome, OperationError> {
        let definition = self.registry.get(operation_id)?;

        let violations = definition.input_schema.validate(&raw_params);
        if !violations.is_empty() {
            debug!(operation = operation_id, count = violations.len(), "input validation failed");
            return Err(OperationError::Validation { violations });
        }

        if !caller.holds_all(definition.required_scopes) {
            // Full detail stays server-side; the caller sees a generic
            // refusal.
            warn!(
                operation = operation_id,
                caller = %caller.owner_key(),
                missing_scopes = ?caller.missing_scopes(definition.required_scopes),
                "authorization refused"
            );
            return Err(OperationError::Authorization);
        }

        match definition.mode {
            OperationMode::Sync => {
                let context = OperationContext {
                    params: raw_params,
                    caller: caller.clone(),
                    cancel: CancellationToken::new(),
                };
                let value = definition
                    .invoke(context)
                    .await
                    .map_err(|fault| OperationError::Handler { fault })?;
                Ok(ExecuteOutcome::Result { value })
            }
            OperationMode::Async => {
                let definition = Arc::clone(definition);
                let caller_for_job = caller.clone();
                let invocation: JobInvocation = Box::new(move |cancel| {
                    definition.invoke(OperationContext {
                        params: raw_params,
                        caller: caller_for_job,
                        cancel,
                    })
                });

                let job_id =
                    self.jobs.schedule(operation_id, invocation, caller.owner_key()).await?;
                Ok(ExecuteOutcome::Job { job_id })
            }
        }
    }
}
