// Share-link operations.

use std::sync::Arc;

use chrono::Utc;
use folio_common::error::HandlerFault;
use folio_common::protocol::operations::{SHARE_CREATE, SHARE_LIST, SHARE_REVOKE};
use folio_common::types::SCOPE_SHARES_MANAGE;
use folio_core::registry::OperationDefinition;
use folio_core::schema::{FieldKind, InputSchema};
use serde_json::json;

use crate::store::{PlatformStore, SharePermission};

use super::{optional_timestamp, page_cursor, page_limit, require_str, require_uuid, to_value};

const MANAGE_SCOPES: &[&str] = &[SCOPE_SHARES_MANAGE];

pub fn definitions(store: Arc<PlatformStore>) -> Vec<OperationDefinition> {
    vec![create(Arc::clone(&store)), revoke(Arc::clone(&store)), list(store)]
}

fn create(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::sync(
        SHARE_CREATE,
        "issue a share link for a document (token shown once)",
        InputSchema::object()
            .required("doc_id", FieldKind::Uuid)
            .required("permission", FieldKind::String)
            .optional("expires_at", FieldKind::Timestamp),
        MANAGE_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let doc_id = require_uuid(&context.params, "doc_id")?;
                let permission = require_str(&context.params, "permission")?;
                let permission = SharePermission::parse(permission).ok_or_else(|| {
                    HandlerFault::invalid_input("permission must be one of: view, edit")
                })?;

                let expires_at = optional_timestamp(&context.params, "expires_at");
                if expires_at.is_some_and(|value| value <= Utc::now()) {
                    return Err(HandlerFault::invalid_input("expires_at must be in the future"));
                }

                let (share, token) = store.create_share(doc_id, permission, expires_at).await?;
                Ok(json!({
                    "share_link": to_value(&share)?,
                    "token_once": token,
                }))
            }
        },
    )
}

fn revoke(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::sync(
        SHARE_REVOKE,
        "revoke a share link",
        InputSchema::object().required("share_id", FieldKind::Uuid),
        MANAGE_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let share_id = require_uuid(&context.params, "share_id")?;
                let share = store.revoke_share(share_id).await?;
                Ok(json!({ "share_link": to_value(&share)? }))
            }
        },
    )
}

fn list(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::sync(
        SHARE_LIST,
        "cursor-paginated share-link listing",
        InputSchema::object()
            .optional("limit", FieldKind::Integer)
            .optional("cursor", FieldKind::String),
        MANAGE_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let limit = page_limit(&context.params);
                let cursor = page_cursor(&context.params)?;

                let page = store.list_shares(limit, cursor.as_ref()).await;
                to_value(&page)
            }
        },
    )
}
