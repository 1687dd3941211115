// API-key operations.

use std::collections::BTreeSet;
use std::sync::Arc;

use folio_common::protocol::operations::{APIKEY_ISSUE, APIKEY_REVOKE};
use folio_common::types::SCOPE_KEYS_ADMIN;
use folio_core::registry::OperationDefinition;
use folio_core::schema::{FieldKind, InputSchema};
use serde_json::json;

use crate::store::PlatformStore;

use super::{require_str, require_uuid, string_array, to_value};

const ADMIN_SCOPES: &[&str] = &[SCOPE_KEYS_ADMIN];

pub fn definitions(store: Arc<PlatformStore>) -> Vec<OperationDefinition> {
    vec![issue(Arc::clone(&store)), revoke(store)]
}

fn issue(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::sync(
        APIKEY_ISSUE,
        "mint an API key with granted scopes (secret shown once)",
        InputSchema::object()
            .required("label", FieldKind::String)
            .non_empty("label")
            .required("scopes", FieldKind::Array),
        ADMIN_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let label = require_str(&context.params, "label")?;
                let scopes: BTreeSet<String> =
                    string_array(&context.params, "scopes")?.into_iter().collect();

                // Keys issued over the API inherit the issuing user as
                // their subject when one is known.
                let (key, secret) =
                    store.issue_api_key(label, scopes, context.caller.user_id).await?;
                Ok(json!({
                    "api_key": to_value(&key)?,
                    "secret_once": secret,
                }))
            }
        },
    )
}

fn revoke(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::sync(
        APIKEY_REVOKE,
        "revoke an API key",
        InputSchema::object().required("key_id", FieldKind::Uuid),
        ADMIN_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let key_id = require_uuid(&context.params, "key_id")?;
                let key = store.revoke_api_key(key_id).await?;
                Ok(json!({ "api_key": to_value(&key)? }))
            }
        },
    )
}
