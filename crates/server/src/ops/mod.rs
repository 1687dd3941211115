// Built-in operation catalog.
//
// Each submodule binds schemas, scopes, and handlers over the platform
// store; `build_registry` assembles the startup catalog. A duplicate id
// here aborts boot.

pub mod api_keys;
pub mod documents;
pub mod shares;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use folio_common::cursor::{decode_cursor, PageCursor};
use folio_common::error::{HandlerFault, OperationError};
use folio_core::registry::OperationRegistry;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::store::PlatformStore;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 100;

/// Assemble the full catalog against one store.
pub fn build_registry(store: Arc<PlatformStore>) -> Result<OperationRegistry, OperationError> {
    let mut registry = OperationRegistry::new();

    let definitions = documents::definitions(Arc::clone(&store))
        .into_iter()
        .chain(shares::definitions(Arc::clone(&store)))
        .chain(api_keys::definitions(store));

    for definition in definitions {
        registry.register(definition)?;
    }

    Ok(registry)
}

// ── Handler helpers ────────────────────────────────────────────────
//
// Params reaching a handler already passed the operation's schema, so
// these only guard against a schema/handler mismatch — which would be a
// server bug, reported as an internal fault rather than a panic.

pub(crate) fn to_value<T: Serialize>(value: &T) -> Result<Value, HandlerFault> {
    serde_json::to_value(value)
        .map_err(|error| HandlerFault::internal(format!("failed to serialize result: {error}")))
}

pub(crate) fn require_str<'a>(params: &'a Value, field: &str) -> Result<&'a str, HandlerFault> {
    params
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| schema_mismatch(field, "string"))
}

pub(crate) fn optional_str<'a>(params: &'a Value, field: &str) -> Option<&'a str> {
    params.get(field).and_then(Value::as_str)
}

pub(crate) fn require_uuid(params: &Value, field: &str) -> Result<Uuid, HandlerFault> {
    let raw = require_str(params, field)?;
    Uuid::parse_str(raw).map_err(|_| schema_mismatch(field, "uuid"))
}

pub(crate) fn optional_timestamp(params: &Value, field: &str) -> Option<DateTime<Utc>> {
    optional_str(params, field).and_then(|raw| raw.parse().ok())
}

/// Collect an optional array-of-strings field; non-string entries are a
/// handler-level invalid-input fault (the schema only checks the array
/// itself).
pub(crate) fn string_array(params: &Value, field: &str) -> Result<Vec<String>, HandlerFault> {
    let Some(values) = params.get(field).and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    values
        .iter()
        .map(|value| {
            value
                .as_str()
                .map(ToOwned::to_owned)
                .ok_or_else(|| HandlerFault::invalid_input(format!("{field} must contain strings")))
        })
        .collect()
}

pub(crate) fn page_limit(params: &Value) -> usize {
    match params.get("limit").and_then(Value::as_u64) {
        Some(0) | None => DEFAULT_PAGE_SIZE,
        Some(value) => (value as usize).min(MAX_PAGE_SIZE),
    }
}

/// Decode the optional `cursor` param. A malformed cursor is rejected
/// explicitly, never coerced to the first page.
pub(crate) fn page_cursor(params: &Value) -> Result<Option<PageCursor>, HandlerFault> {
    match optional_str(params, "cursor") {
        None => Ok(None),
        Some(raw) => decode_cursor(raw)
            .map(Some)
            .ok_or_else(|| HandlerFault::invalid_input("cursor is not a valid page cursor")),
    }
}

fn schema_mismatch(field: &str, expected: &str) -> HandlerFault {
    HandlerFault::internal(format!("param `{field}` missing or not a {expected} after validation"))
}

#[cfg(test)]
mod tests {
    use super::{build_registry, page_cursor, page_limit, string_array};
    use crate::store::PlatformStore;
    use folio_common::cursor::encode_cursor;
    use folio_common::protocol::operations::IMPLEMENTED_OPERATIONS;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn registry_covers_exactly_the_published_catalog() {
        let registry =
            build_registry(Arc::new(PlatformStore::new())).expect("catalog should build");

        let registered: Vec<&str> = registry.iter().map(|definition| definition.id).collect();
        let mut expected: Vec<&str> = IMPLEMENTED_OPERATIONS.to_vec();
        expected.sort();
        assert_eq!(registered, expected);
    }

    #[test]
    fn page_limit_clamps_and_defaults() {
        assert_eq!(page_limit(&json!({})), 50);
        assert_eq!(page_limit(&json!({ "limit": 0 })), 50);
        assert_eq!(page_limit(&json!({ "limit": 10 })), 10);
        assert_eq!(page_limit(&json!({ "limit": 1000 })), 100);
    }

    #[test]
    fn page_cursor_rejects_garbage_explicitly() {
        assert!(page_cursor(&json!({})).expect("absent cursor is fine").is_none());

        let valid = encode_cursor(chrono::Utc::now(), "abc");
        assert!(page_cursor(&json!({ "cursor": valid })).expect("valid cursor decodes").is_some());

        page_cursor(&json!({ "cursor": "!!garbage!!" }))
            .expect_err("malformed cursor must be rejected, not treated as page one");
    }

    #[test]
    fn string_array_rejects_mixed_entries() {
        assert_eq!(
            string_array(&json!({ "tags": ["a", "b"] }), "tags").expect("strings are fine"),
            vec!["a".to_string(), "b".to_string()]
        );
        string_array(&json!({ "tags": ["a", 7] }), "tags")
            .expect_err("non-string entry must fault");
    }
}
