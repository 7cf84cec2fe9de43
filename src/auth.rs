//! Shared-secret authorization
//!
//! Every request must carry the node token in `x-rdfs-token`. Both sides are
//! hashed to fixed-width digests before a constant-time compare, so neither a
//! matching prefix nor the token length shows up in response timing.

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::TOKEN_HEADER;
use crate::error::AppError;
use crate::state::AppState;

/// Outcome of checking a request token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthDecision {
    Authorized,
    Unauthorized,
}

/// Validates request tokens against the configured secret
#[derive(Clone)]
pub struct AuthGate {
    expected: [u8; 32],
}

impl AuthGate {
    pub fn new(token: &str) -> Self {
        Self {
            expected: Sha256::digest(token.as_bytes()).into(),
        }
    }

    /// Check a raw header value; missing and empty headers never pass.
    pub fn check(&self, header: Option<&HeaderValue>) -> AuthDecision {
        let Some(presented) = header.map(HeaderValue::as_bytes) else {
            return AuthDecision::Unauthorized;
        };
        if presented.is_empty() {
            return AuthDecision::Unauthorized;
        }

        let presented: [u8; 32] = Sha256::digest(presented).into();
        if bool::from(presented[..].ct_eq(&self.expected[..])) {
            AuthDecision::Authorized
        } else {
            AuthDecision::Unauthorized
        }
    }
}

/// Middleware rejecting requests without a valid token before any handler runs
pub async fn authorise(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match state.auth().check(request.headers().get(TOKEN_HEADER)) {
        AuthDecision::Authorized => Ok(next.run(request).await),
        AuthDecision::Unauthorized => {
            tracing::debug!(path = %request.uri().path(), "Rejected request with missing or invalid token");
            Err(AppError::Unauthorized)
        }
    }
}
