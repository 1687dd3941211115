// Bearer authentication for the HTTP API.
//
// Resolves the presented token to a verified `Caller` before any route
// runs: against the API-key table, or against the configured bootstrap
// token (full scopes, intended for first-boot key issuance). Tokens are
// compared by SHA-256 digest, never as raw strings.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};
use folio_common::types::{Caller, KNOWN_SCOPES};

use crate::error::ApiError;
use crate::store::{hash_token, PlatformStore};

/// The verified caller, injected as a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedCaller(pub Caller);

#[derive(Clone)]
pub struct AuthState {
    store: Arc<PlatformStore>,
    bootstrap_hash: Option<Vec<u8>>,
}

impl AuthState {
    pub fn new(store: Arc<PlatformStore>, bootstrap_token: Option<&str>) -> Self {
        Self { store, bootstrap_hash: bootstrap_token.map(hash_token) }
    }

    async fn resolve(&self, token: &str) -> Option<Caller> {
        if self
            .bootstrap_hash
            .as_ref()
            .is_some_and(|expected| *expected == hash_token(token))
        {
            return Some(bootstrap_caller());
        }
        self.store.resolve_api_key(token).await
    }
}

/// The bootstrap identity holds every scope but owns no user record.
fn bootstrap_caller() -> Caller {
    Caller {
        user_id: None,
        api_key_id: None,
        scopes: KNOWN_SCOPES.iter().map(|scope| (*scope).to_string()).collect(),
    }
}

pub async fn require_bearer_auth(
    State(auth): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = match request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(extract_bearer_token)
    {
        Some(token) => token.to_owned(),
        None => return unauthorized("missing bearer token"),
    };

    let caller = match auth.resolve(&token).await {
        Some(caller) => caller,
        None => return unauthorized("unknown or revoked token"),
    };

    request.extensions_mut().insert(AuthenticatedCaller(caller));
    next.run(request).await
}

fn extract_bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("Bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        return None;
    }

    Some(token)
}

fn unauthorized(message: &'static str) -> Response {
    ApiError::Unauthorized { message }.into_response()
}
