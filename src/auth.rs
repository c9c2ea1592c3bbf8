// Webhook authentication: optional shared secret sent as a bearer token.

use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    Json,
};
use sha2::{Digest, Sha256};

/// SHA-256 a secret and hex-encode it.
fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// The configured webhook secret, kept only as its digest. When unset every
/// request is accepted.
#[derive(Debug, Clone, Default)]
pub struct WebhookSecret(Option<Arc<str>>);

impl WebhookSecret {
    pub fn new(secret: Option<&str>) -> Self {
        Self(
            secret
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Arc::from(hash_secret(s))),
        )
    }

    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    /// Compare digests rather than raw strings.
    pub fn verify(&self, token: &str) -> bool {
        match &self.0 {
            None => true,
            Some(expected) => hash_secret(token) == **expected,
        }
    }
}

// ── Axum extractor: WebhookAuth ──────────────────────────────────────

/// Proof that the caller presented the webhook secret (or that none is
/// configured). Usage: `_auth: WebhookAuth` in handler parameters.
#[derive(Debug, Clone, Copy)]
pub struct WebhookAuth;

fn unauthorized(msg: &str) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "unauthorized", "text": msg })),
    )
}

impl<S> FromRequestParts<S> for WebhookAuth
where
    WebhookSecret: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<serde_json::Value>);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let secret = WebhookSecret::from_ref(state);
        if !secret.is_enabled() {
            return Ok(WebhookAuth);
        }

        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| unauthorized("Invalid Authorization header format"))?;

        if secret.verify(token.trim()) {
            Ok(WebhookAuth)
        } else {
            tracing::warn!("Rejected webhook call with a bad secret");
            Err(unauthorized("Invalid webhook secret"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_secret_is_stable_hex() {
        let h = hash_secret("hunter2");
        assert_eq!(h.len(), 64);
        assert_eq!(h, hash_secret("hunter2"));
        assert_ne!(h, hash_secret("hunter3"));
    }

    #[test]
    fn test_disabled_secret_accepts_anything() {
        let secret = WebhookSecret::disabled();
        assert!(!secret.is_enabled());
        assert!(secret.verify(""));
        assert!(WebhookSecret::new(Some("   ")).verify("whatever"));
    }

    #[test]
    fn test_enabled_secret_checks_token() {
        let secret = WebhookSecret::new(Some("s3cret"));
        assert!(secret.is_enabled());
        assert!(secret.verify("s3cret"));
        assert!(!secret.verify("S3CRET"));
        assert!(!secret.verify(""));
    }
}
