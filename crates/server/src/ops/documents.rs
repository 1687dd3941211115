// Document operations: CRUD + listing, plus the export/import jobs.

use std::sync::Arc;

use folio_common::protocol::operations::{
    DOC_CREATE, DOC_DELETE, DOC_EXPORT, DOC_GET, DOC_IMPORT, DOC_LIST, DOC_UPDATE,
};
use folio_common::types::{SCOPE_DOCUMENTS_READ, SCOPE_DOCUMENTS_WRITE};
use folio_common::error::HandlerFault;
use folio_core::registry::OperationDefinition;
use folio_core::schema::{FieldKind, InputSchema};
use serde_json::{json, Value};

use crate::store::PlatformStore;

use super::{
    optional_str, page_cursor, page_limit, require_str, require_uuid, string_array, to_value,
};

const READ_SCOPES: &[&str] = &[SCOPE_DOCUMENTS_READ];
const WRITE_SCOPES: &[&str] = &[SCOPE_DOCUMENTS_WRITE];

pub fn definitions(store: Arc<PlatformStore>) -> Vec<OperationDefinition> {
    vec![
        create(Arc::clone(&store)),
        get(Arc::clone(&store)),
        update(Arc::clone(&store)),
        delete(Arc::clone(&store)),
        list(Arc::clone(&store)),
        export(Arc::clone(&store)),
        import(store),
    ]
}

fn create(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::sync(
        DOC_CREATE,
        "create a document",
        InputSchema::object()
            .required("name", FieldKind::String)
            .non_empty("name")
            .required("content", FieldKind::String)
            .optional("tags", FieldKind::Array),
        WRITE_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let name = require_str(&context.params, "name")?;
                let content = require_str(&context.params, "content")?;
                let tags = string_array(&context.params, "tags")?;

                let document = store.create_document(name, content, tags).await?;
                Ok(json!({ "document": to_value(&document)? }))
            }
        },
    )
}

fn get(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::sync(
        DOC_GET,
        "fetch one document",
        InputSchema::object().required("doc_id", FieldKind::Uuid),
        READ_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let doc_id = require_uuid(&context.params, "doc_id")?;
                let document = store.get_document(doc_id).await?;
                Ok(json!({ "document": to_value(&document)? }))
            }
        },
    )
}

fn update(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::sync(
        DOC_UPDATE,
        "update a document's name, content, or tags",
        InputSchema::object()
            .required("doc_id", FieldKind::Uuid)
            .optional("name", FieldKind::String)
            .non_empty("name")
            .optional("content", FieldKind::String)
            .optional("tags", FieldKind::Array)
            .optional("if_etag", FieldKind::String),
        WRITE_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let doc_id = require_uuid(&context.params, "doc_id")?;
                let name = optional_str(&context.params, "name");
                let content = optional_str(&context.params, "content");
                let if_etag = optional_str(&context.params, "if_etag");
                let tags = context
                    .params
                    .get("tags")
                    .filter(|value| !value.is_null())
                    .map(|_| string_array(&context.params, "tags"))
                    .transpose()?;

                if name.is_none() && content.is_none() && tags.is_none() {
                    return Err(HandlerFault::invalid_input(
                        "doc.update requires at least one of `name`, `content`, `tags`",
                    ));
                }

                let document =
                    store.update_document(doc_id, name, content, tags, if_etag).await?;
                Ok(json!({ "document": to_value(&document)? }))
            }
        },
    )
}

fn delete(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::sync(
        DOC_DELETE,
        "soft-delete a document",
        InputSchema::object().required("doc_id", FieldKind::Uuid),
        WRITE_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let doc_id = require_uuid(&context.params, "doc_id")?;
                let document = store.delete_document(doc_id).await?;
                Ok(json!({ "document": to_value(&document)? }))
            }
        },
    )
}

fn list(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::sync(
        DOC_LIST,
        "cursor-paginated document listing",
        InputSchema::object()
            .optional("limit", FieldKind::Integer)
            .optional("cursor", FieldKind::String),
        READ_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let limit = page_limit(&context.params);
                let cursor = page_cursor(&context.params)?;

                let page = store.list_documents(limit, cursor.as_ref()).await;
                to_value(&page)
            }
        },
    )
}

fn export(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::asynchronous(
        DOC_EXPORT,
        "render documents into a single archive (runs as a job)",
        InputSchema::object()
            .optional("doc_ids", FieldKind::Array)
            .optional("format", FieldKind::String),
        READ_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let format = optional_str(&context.params, "format").unwrap_or("markdown");
                if format != "markdown" && format != "json" {
                    return Err(HandlerFault::invalid_input(
                        "format must be one of: markdown, json",
                    ));
                }

                let only: Option<Vec<String>> = context
                    .params
                    .get("doc_ids")
                    .filter(|value| !value.is_null())
                    .map(|_| string_array(&context.params, "doc_ids"))
                    .transpose()?;

                let mut documents = store.live_documents().await;
                if let Some(only) = &only {
                    documents.retain(|document| only.contains(&document.id.to_string()));
                    if documents.len() != only.len() {
                        return Err(HandlerFault::not_found(
                            "one or more requested documents do not exist",
                        ));
                    }
                }

                let mut rendered = Vec::with_capacity(documents.len());
                for document in &documents {
                    // Cancellation checkpoint between documents; once
                    // cancelled the job verdict is already recorded and
                    // this output is discarded.
                    if context.cancel.is_cancelled() {
                        return Ok(Value::Null);
                    }

                    match format {
                        "markdown" => rendered.push(format!(
                            "--- {} ---\n{}\n",
                            document.name,
                            document.content.as_deref().unwrap_or_default()
                        )),
                        _ => rendered.push(
                            json!({
                                "name": document.name,
                                "content": document.content,
                                "tags": document.tags,
                            })
                            .to_string(),
                        ),
                    }
                    tokio::task::yield_now().await;
                }

                let archive = match format {
                    "markdown" => rendered.concat(),
                    _ => format!("[{}]", rendered.join(",")),
                };

                Ok(json!({
                    "format": format,
                    "documents": documents.len(),
                    "archive": archive,
                }))
            }
        },
    )
}

fn import(store: Arc<PlatformStore>) -> OperationDefinition {
    OperationDefinition::asynchronous(
        DOC_IMPORT,
        "bulk-create documents from entries (runs as a job)",
        InputSchema::object().required("entries", FieldKind::Array),
        WRITE_SCOPES,
        move |context| {
            let store = Arc::clone(&store);
            async move {
                let entries = context
                    .params
                    .get("entries")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();

                let mut doc_ids = Vec::new();
                let mut skipped = Vec::new();

                for (index, entry) in entries.iter().enumerate() {
                    if context.cancel.is_cancelled() {
                        // Already-created documents stay; the job's
                        // cancelled verdict is recorded elsewhere.
                        return Ok(Value::Null);
                    }

                    let name = entry.get("name").and_then(Value::as_str).ok_or_else(|| {
                        HandlerFault::invalid_input(format!(
                            "entries[{index}] must carry a string `name`"
                        ))
                    })?;
                    let content =
                        entry.get("content").and_then(Value::as_str).ok_or_else(|| {
                            HandlerFault::invalid_input(format!(
                                "entries[{index}] must carry a string `content`"
                            ))
                        })?;

                    match store.create_document(name, content, Vec::new()).await {
                        Ok(document) => doc_ids.push(document.id),
                        // Name collisions skip the entry rather than
                        // poisoning the whole import.
                        Err(fault)
                            if fault.kind == folio_common::error::FaultKind::Conflict =>
                        {
                            skipped.push(name.to_string());
                        }
                        Err(fault) => return Err(fault),
                    }
                    tokio::task::yield_now().await;
                }

                Ok(json!({
                    "imported": doc_ids.len(),
                    "doc_ids": doc_ids,
                    "skipped": skipped,
                }))
            }
        },
    )
}
