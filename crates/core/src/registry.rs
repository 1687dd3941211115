// The operation registry: a write-once catalog built at startup.
//
// Registration happens before the daemon serves traffic; afterwards the
// registry is shared behind an `Arc` and never mutated, so dispatch
// needs no locking. Handlers are stored as boxed async functions keyed
// by operation id, resolved exactly once per call.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use folio_common::error::{HandlerFault, OperationError};
use folio_common::types::Caller;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::schema::InputSchema;

/// Whether an operation completes in the request or runs as a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationMode {
    Sync,
    Async,
}

impl OperationMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
        }
    }
}

/// Everything a handler invocation receives: validated params, the
/// verified caller, and a cancellation token (always un-cancelled for
/// synchronous dispatch; wired to `JobManager::cancel` for jobs).
pub struct OperationContext {
    pub params: Value,
    pub caller: Caller,
    pub cancel: CancellationToken,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, HandlerFault>> + Send>>;

type BoxedHandler = Arc<dyn Fn(OperationContext) -> HandlerFuture + Send + Sync>;

/// One registered operation: id, schema, scopes, mode, handler.
/// Immutable once registered.
pub struct OperationDefinition {
    pub id: &'static str,
    /// One-line description surfaced by the catalog route.
    pub summary: &'static str,
    pub input_schema: InputSchema,
    pub required_scopes: &'static [&'static str],
    pub mode: OperationMode,
    handler: BoxedHandler,
}

impl OperationDefinition {
    pub fn sync<F, Fut>(
        id: &'static str,
        summary: &'static str,
        input_schema: InputSchema,
        required_scopes: &'static [&'static str],
        handler: F,
    ) -> Self
    where
        F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerFault>> + Send + 'static,
    {
        Self::new(id, summary, input_schema, required_scopes, OperationMode::Sync, handler)
    }

    pub fn asynchronous<F, Fut>(
        id: &'static str,
        summary: &'static str,
        input_schema: InputSchema,
        required_scopes: &'static [&'static str],
        handler: F,
    ) -> Self
    where
        F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerFault>> + Send + 'static,
    {
        Self::new(id, summary, input_schema, required_scopes, OperationMode::Async, handler)
    }

    fn new<F, Fut>(
        id: &'static str,
        summary: &'static str,
        input_schema: InputSchema,
        required_scopes: &'static [&'static str],
        mode: OperationMode,
        handler: F,
    ) -> Self
    where
        F: Fn(OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerFault>> + Send + 'static,
    {
        Self {
            id,
            summary,
            input_schema,
            required_scopes,
            mode,
            handler: Arc::new(move |context| Box::pin(handler(context))),
        }
    }

    /// Invoke the handler with an already-validated, already-authorized
    /// context.
    pub fn invoke(&self, context: OperationContext) -> HandlerFuture {
        (self.handler)(context)
    }
}

impl std::fmt::Debug for OperationDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationDefinition")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("required_scopes", &self.required_scopes)
            .finish_non_exhaustive()
    }
}

/// Append-only mapping from operation id to definition. Built during
/// startup, then frozen behind `Arc`.
#[derive(Debug, Default)]
pub struct OperationRegistry {
    by_id: BTreeMap<&'static str, Arc<OperationDefinition>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition. A duplicate id is a startup-time fatal
    /// error; callers are expected to propagate it and abort boot.
    pub fn register(
        &mut self,
        definition: OperationDefinition,
    ) -> Result<(), OperationError> {
        let id = definition.id;
        if self.by_id.contains_key(id) {
            return Err(OperationError::duplicate_operation(id));
        }
        self.by_id.insert(id, Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, operation_id: &str) -> Result<&Arc<OperationDefinition>, OperationError> {
        self.by_id
            .get(operation_id)
            .ok_or_else(|| OperationError::unknown_operation(operation_id))
    }

    /// Lazy, restartable walk of the catalog in id order. Used by the
    /// documentation route, never on the dispatch path.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<OperationDefinition>> {
        self.by_id.values()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }
}
