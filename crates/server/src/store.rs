// In-memory platform store: documents, share links, API keys.
//
// This is the storage collaborator the execution core treats as opaque;
// operation handlers reach it through `Arc<PlatformStore>`. Nothing
// here survives a restart.

use std::collections::{BTreeSet, HashMap};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use folio_common::cursor::{encode_cursor, PageCursor};
use folio_common::error::HandlerFault;
use folio_common::types::{Caller, KNOWN_SCOPES};
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use uuid::Uuid;

// ── Wire views ─────────────────────────────────────────────────────

/// A document as returned to callers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Document {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub tags: Vec<String>,
    pub etag: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A share link as returned to callers. The raw token appears only in
/// the create response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShareLink {
    pub id: Uuid,
    pub doc_id: Uuid,
    pub permission: SharePermission,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An API key as returned to callers. The secret appears only in the
/// issue response.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ApiKey {
    pub id: Uuid,
    pub label: String,
    pub scopes: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SharePermission {
    View,
    Edit,
}

impl SharePermission {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "view" => Some(Self::View),
            "edit" => Some(Self::Edit),
            _ => None,
        }
    }
}

/// One page of a cursor-paginated listing.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

// ── Records ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct DocumentRecord {
    id: Uuid,
    name: String,
    content: String,
    tags: Vec<String>,
    revision: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl DocumentRecord {
    fn etag(&self) -> String {
        format!("doc:{}:{}", self.id, self.revision)
    }

    fn to_wire(&self, include_content: bool) -> Document {
        Document {
            id: self.id,
            name: self.name.clone(),
            content: include_content.then(|| self.content.clone()),
            tags: self.tags.clone(),
            etag: self.etag(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
struct ShareLinkRecord {
    id: Uuid,
    doc_id: Uuid,
    permission: SharePermission,
    token_hash: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShareLinkRecord {
    fn to_wire(&self) -> ShareLink {
        ShareLink {
            id: self.id,
            doc_id: self.doc_id,
            permission: self.permission,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
struct ApiKeyRecord {
    id: Uuid,
    label: String,
    user_id: Option<Uuid>,
    scopes: BTreeSet<String>,
    token_hash: Vec<u8>,
    revoked_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl ApiKeyRecord {
    fn to_wire(&self) -> ApiKey {
        ApiKey {
            id: self.id,
            label: self.label.clone(),
            scopes: self.scopes.clone(),
            revoked_at: self.revoked_at,
            created_at: self.created_at,
        }
    }
}

// ── Store ──────────────────────────────────────────────────────────

#[derive(Default)]
pub struct PlatformStore {
    documents: RwLock<HashMap<Uuid, DocumentRecord>>,
    shares: RwLock<HashMap<Uuid, ShareLinkRecord>>,
    api_keys: RwLock<HashMap<Uuid, ApiKeyRecord>>,
}

impl PlatformStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Documents ──────────────────────────────────────────────────

    pub async fn create_document(
        &self,
        name: &str,
        content: &str,
        tags: Vec<String>,
    ) -> Result<Document, HandlerFault> {
        let mut documents = self.documents.write().await;

        let live_conflict = documents
            .values()
            .any(|record| record.deleted_at.is_none() && record.name == name);
        if live_conflict {
            return Err(HandlerFault::conflict(format!("document `{name}` already exists")));
        }

        let now = Utc::now();
        let record = DocumentRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            content: content.to_string(),
            tags,
            revision: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let document = record.to_wire(true);
        documents.insert(record.id, record);
        Ok(document)
    }

    pub async fn get_document(&self, doc_id: Uuid) -> Result<Document, HandlerFault> {
        let documents = self.documents.read().await;
        live_document(&documents, doc_id).map(|record| record.to_wire(true))
    }

    pub async fn update_document(
        &self,
        doc_id: Uuid,
        name: Option<&str>,
        content: Option<&str>,
        tags: Option<Vec<String>>,
        if_etag: Option<&str>,
    ) -> Result<Document, HandlerFault> {
        let mut documents = self.documents.write().await;

        if let Some(name) = name {
            let taken = documents.values().any(|record| {
                record.id != doc_id && record.deleted_at.is_none() && record.name == name
            });
            if taken {
                return Err(HandlerFault::conflict(format!("document `{name}` already exists")));
            }
        }

        let record = live_document_mut(&mut documents, doc_id)?;
        if let Some(if_etag) = if_etag {
            if if_etag != record.etag() {
                return Err(HandlerFault::conflict(format!(
                    "etag mismatch: expected `{}`",
                    record.etag()
                )));
            }
        }

        if let Some(name) = name {
            record.name = name.to_string();
        }
        if let Some(content) = content {
            record.content = content.to_string();
        }
        if let Some(tags) = tags {
            record.tags = tags;
        }
        record.revision += 1;
        record.updated_at = Utc::now();

        Ok(record.to_wire(true))
    }

    pub async fn delete_document(&self, doc_id: Uuid) -> Result<Document, HandlerFault> {
        let mut documents = self.documents.write().await;
        let record = live_document_mut(&mut documents, doc_id)?;

        let now = Utc::now();
        record.deleted_at = Some(now);
        record.updated_at = now;
        Ok(record.to_wire(false))
    }

    /// Cursor-paginated listing of live documents, most recently
    /// updated first; the id breaks timestamp ties.
    pub async fn list_documents(
        &self,
        limit: usize,
        cursor: Option<&PageCursor>,
    ) -> Page<Document> {
        let documents = self.documents.read().await;

        let mut items: Vec<&DocumentRecord> = documents
            .values()
            .filter(|record| record.deleted_at.is_none())
            .filter(|record| match cursor {
                Some(cursor) => cursor.precedes(record.updated_at, &record.id.to_string()),
                None => true,
            })
            .collect();
        items.sort_by(|a, b| {
            (b.updated_at, b.id.to_string()).cmp(&(a.updated_at, a.id.to_string()))
        });

        paginate(items, limit, |record| {
            (record.updated_at, record.id.to_string(), record.to_wire(false))
        })
    }

    /// Every live document with content, in name order. Used by the
    /// export and import jobs.
    pub async fn live_documents(&self) -> Vec<Document> {
        let documents = self.documents.read().await;
        let mut items: Vec<Document> = documents
            .values()
            .filter(|record| record.deleted_at.is_none())
            .map(|record| record.to_wire(true))
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        items
    }

    // ── Share links ────────────────────────────────────────────────

    pub async fn create_share(
        &self,
        doc_id: Uuid,
        permission: SharePermission,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(ShareLink, String), HandlerFault> {
        {
            let documents = self.documents.read().await;
            live_document(&documents, doc_id)?;
        }

        let token = generate_token();
        let now = Utc::now();
        let record = ShareLinkRecord {
            id: Uuid::new_v4(),
            doc_id,
            permission,
            token_hash: hash_token(&token),
            expires_at,
            revoked_at: None,
            created_at: now,
            updated_at: now,
        };
        let share = record.to_wire();
        self.shares.write().await.insert(record.id, record);
        Ok((share, token))
    }

    pub async fn revoke_share(&self, share_id: Uuid) -> Result<ShareLink, HandlerFault> {
        let mut shares = self.shares.write().await;
        let record = shares
            .get_mut(&share_id)
            .ok_or_else(|| HandlerFault::not_found(format!("share link {share_id} not found")))?;

        if record.revoked_at.is_some() {
            return Err(HandlerFault::conflict("share link is already revoked"));
        }

        let now = Utc::now();
        record.revoked_at = Some(now);
        record.updated_at = now;
        Ok(record.to_wire())
    }

    pub async fn list_shares(&self, limit: usize, cursor: Option<&PageCursor>) -> Page<ShareLink> {
        let shares = self.shares.read().await;

        let mut items: Vec<&ShareLinkRecord> = shares
            .values()
            .filter(|record| match cursor {
                Some(cursor) => cursor.precedes(record.updated_at, &record.id.to_string()),
                None => true,
            })
            .collect();
        items.sort_by(|a, b| {
            (b.updated_at, b.id.to_string()).cmp(&(a.updated_at, a.id.to_string()))
        });

        paginate(items, limit, |record| {
            (record.updated_at, record.id.to_string(), record.to_wire())
        })
    }

    // ── API keys ───────────────────────────────────────────────────

    pub async fn issue_api_key(
        &self,
        label: &str,
        scopes: BTreeSet<String>,
        user_id: Option<Uuid>,
    ) -> Result<(ApiKey, String), HandlerFault> {
        for scope in &scopes {
            if !KNOWN_SCOPES.contains(&scope.as_str()) {
                return Err(HandlerFault::invalid_input(format!("unknown scope `{scope}`")));
            }
        }

        let secret = generate_token();
        let record = ApiKeyRecord {
            id: Uuid::new_v4(),
            label: label.to_string(),
            user_id,
            scopes,
            token_hash: hash_token(&secret),
            revoked_at: None,
            created_at: Utc::now(),
        };
        let key = record.to_wire();
        self.api_keys.write().await.insert(record.id, record);
        Ok((key, secret))
    }

    pub async fn revoke_api_key(&self, key_id: Uuid) -> Result<ApiKey, HandlerFault> {
        let mut api_keys = self.api_keys.write().await;
        let record = api_keys
            .get_mut(&key_id)
            .ok_or_else(|| HandlerFault::not_found(format!("api key {key_id} not found")))?;

        if record.revoked_at.is_some() {
            return Err(HandlerFault::conflict("api key is already revoked"));
        }

        record.revoked_at = Some(Utc::now());
        Ok(record.to_wire())
    }

    /// Resolve a presented bearer token to a verified caller. `None`
    /// covers unknown and revoked keys alike.
    pub async fn resolve_api_key(&self, token: &str) -> Option<Caller> {
        let hash = hash_token(token);
        let api_keys = self.api_keys.read().await;
        api_keys
            .values()
            .find(|record| record.revoked_at.is_none() && record.token_hash == hash)
            .map(|record| {
                Caller::for_api_key(record.id, record.user_id, record.scopes.iter().cloned())
            })
    }
}

fn live_document(
    documents: &HashMap<Uuid, DocumentRecord>,
    doc_id: Uuid,
) -> Result<&DocumentRecord, HandlerFault> {
    documents
        .get(&doc_id)
        .filter(|record| record.deleted_at.is_none())
        .ok_or_else(|| HandlerFault::not_found(format!("document {doc_id} not found")))
}

fn live_document_mut(
    documents: &mut HashMap<Uuid, DocumentRecord>,
    doc_id: Uuid,
) -> Result<&mut DocumentRecord, HandlerFault> {
    documents
        .get_mut(&doc_id)
        .filter(|record| record.deleted_at.is_none())
        .ok_or_else(|| HandlerFault::not_found(format!("document {doc_id} not found")))
}

fn paginate<R, T>(
    records: Vec<R>,
    limit: usize,
    to_item: impl Fn(&R) -> (DateTime<Utc>, String, T),
) -> Page<T> {
    let has_more = records.len() > limit;
    let mut items = Vec::with_capacity(limit.min(records.len()));
    let mut last_key: Option<(DateTime<Utc>, String)> = None;

    for record in records.into_iter().take(limit) {
        let (updated_at, id, item) = to_item(&record);
        last_key = Some((updated_at, id));
        items.push(item);
    }

    let next_cursor = if has_more {
        last_key.map(|(updated_at, id)| encode_cursor(updated_at, &id))
    } else {
        None
    };

    Page { items, next_cursor }
}

fn generate_token() -> String {
    let mut bytes = [0_u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(crate) fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}
