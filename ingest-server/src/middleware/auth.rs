//! Authentication middleware
//!
//! Bearer tokens come from the engine config. Only their SHA-256 digests are
//! kept in memory and compared.

use std::collections::HashSet;

use axum::{
    extract::{State, Request},
    middleware::Next,
    response::Response,
    http::header::AUTHORIZATION,
};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Sha256, Digest};

use crate::{AppState, AppError};

/// Accepted token digests
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    hashes: HashSet<String>,
}

impl TokenRegistry {
    pub fn new(tokens: &[String]) -> Self {
        Self {
            hashes: tokens
                .iter()
                .filter(|t| !t.is_empty())
                .map(|t| hash_token(t))
                .collect(),
        }
    }

    pub fn contains_hash(&self, hash: &str) -> bool {
        self.hashes.contains(hash)
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

/// Caller identity for logging; never the token itself
#[derive(Debug, Clone)]
pub struct TokenContext {
    pub fingerprint: String,
}

/// Middleware: Require a configured bearer token
pub async fn require_token(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&req)?;
    let token_hash = hash_token(&token);

    if !state.tokens.contains_hash(&token_hash) {
        tracing::warn!("Rejected unknown token for {}", req.uri().path());
        return Err(AppError::Forbidden);
    }

    req.extensions_mut().insert(TokenContext {
        fingerprint: token_hash[..12].to_string(),
    });

    Ok(next.run(req).await)
}

/// Extract bearer token from Authorization header
fn extract_bearer_token(req: &Request) -> Result<String, AppError> {
    let auth_header = req.headers()
        .get(AUTHORIZATION)
        .ok_or(AppError::Unauthorized)?
        .to_str()
        .map_err(|_| AppError::Unauthorized)?;

    match auth_header.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim().to_string()),
        _ => Err(AppError::Unauthorized),
    }
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for TokenContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions
            .get::<TokenContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_matches_digest_only() {
        let registry = TokenRegistry::new(&["abc123".to_string(), String::new()]);
        assert_eq!(registry.len(), 1);
        assert!(registry.contains_hash(&hash_token("abc123")));
        assert!(!registry.contains_hash("abc123"));
        assert!(!registry.contains_hash(&hash_token("")));
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
