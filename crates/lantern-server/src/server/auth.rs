//! Bearer-token authentication.
//!
//! Token validity is a flat allow-list of SHA-256 digests: the server never
//! sees plaintext tokens at rest, and a request authenticates by hashing
//! the presented token and looking the digest up. An empty allow-list
//! disables the check (development mode); `main` logs a warning for it.

use crate::server::error::ServiceError;
use crate::server::service::handler::AppState;
use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Allow-list of accepted token digests.
pub struct TokenAuth {
    allowed: HashSet<[u8; 32]>,
}

impl TokenAuth {
    /// Build from hex-encoded SHA-256 digests.
    pub fn from_digests(digests: &[String]) -> Result<Self, InvalidDigest> {
        let mut allowed = HashSet::with_capacity(digests.len());
        for digest in digests {
            let bytes = hex::decode(digest.trim()).map_err(|_| InvalidDigest {
                digest: digest.clone(),
            })?;
            let bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| InvalidDigest {
                digest: digest.clone(),
            })?;
            allowed.insert(bytes);
        }
        Ok(Self { allowed })
    }

    pub fn is_disabled(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn verify(&self, token: &str) -> bool {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        let digest: [u8; 32] = hasher.finalize().into();
        self.allowed.contains(&digest)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid token digest {digest:?}: expected 64 hex characters")]
pub struct InvalidDigest {
    pub digest: String,
}

/// Route layer guarding the fetch and solve endpoints.
pub async fn require_bearer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    if state.auth.is_disabled() {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match token {
        Some(token) if state.auth.verify(token) => Ok(next.run(request).await),
        _ => Err(ServiceError::Unauthorized),
    }
}
