//! Bearer-token principal resolution.
//!
//! Protected routes run behind [`resolve_principal`], which looks the token up
//! in a [`PrincipalProvider`] and stores the resulting [`Principal`] in the
//! request extensions for handlers to extract.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use common::{ParseLiteralError, Principal, Role, UserId};
use thiserror::Error;

use crate::error::ApiError;

/// Maps a presented bearer token to the principal it authenticates.
#[async_trait]
pub trait PrincipalProvider: Send + Sync {
    async fn resolve(&self, token: &str) -> Option<Principal>;
}

/// Errors in a token table definition.
#[derive(Debug, Error)]
pub enum TokenTableError {
    #[error("malformed token entry '{0}': expected token:user_id:role")]
    Malformed(String),

    #[error("invalid user id in token entry '{0}'")]
    InvalidUserId(String),

    #[error(transparent)]
    InvalidRole(#[from] ParseLiteralError),
}

/// Provider backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenProvider {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a token.
    pub fn with_token(mut self, token: impl Into<String>, principal: Principal) -> Self {
        self.tokens.insert(token.into(), principal);
        self
    }

    /// Parses comma-separated `token:user_id:role` entries.
    pub fn parse(table: &str) -> Result<Self, TokenTableError> {
        let mut provider = Self::new();
        for entry in table.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.split(':').map(str::trim);
            let (Some(token), Some(user_id), Some(role), None) =
                (parts.next(), parts.next(), parts.next(), parts.next())
            else {
                return Err(TokenTableError::Malformed(entry.to_string()));
            };
            if token.is_empty() {
                return Err(TokenTableError::Malformed(entry.to_string()));
            }
            let user_id: i64 = user_id
                .parse()
                .map_err(|_| TokenTableError::InvalidUserId(entry.to_string()))?;
            let role: Role = role.parse()?;
            provider = provider.with_token(token, Principal::new(UserId::new(user_id), role));
        }
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl PrincipalProvider for StaticTokenProvider {
    async fn resolve(&self, token: &str) -> Option<Principal> {
        self.tokens.get(token).copied()
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

    value
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization format".to_string()))
}

/// Middleware that authenticates the bearer token and attaches the principal.
pub async fn resolve_principal(
    State(provider): State<Arc<dyn PrincipalProvider>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers()).inspect_err(|_| {
        metrics::counter!("auth_rejections_total", "reason" => "missing_token").increment(1);
    })?;

    let principal = provider.resolve(&token).await.ok_or_else(|| {
        metrics::counter!("auth_rejections_total", "reason" => "unknown_token").increment(1);
        tracing::debug!("unknown bearer token presented");
        ApiError::Unauthorized("Invalid or expired token".to_string())
    })?;

    request.extensions_mut().insert(principal);
    Ok(next.run(request).await)
}
