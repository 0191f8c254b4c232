//! Session domain model

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::identity::Tier;

/// A bearer session bound to exactly one identity
///
/// Only the SHA-256 fingerprint of the token is ever persisted. The raw
/// token exists once, in the response to the sign-in that minted it.
/// Sessions are immutable; revocation deletes the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub token_fingerprint: String,
    pub tier: Tier,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Length of a well-formed bearer token (32 bytes, URL-safe base64)
    pub const TOKEN_LEN: usize = 43;

    /// Create a new session expiring `ttl_days` from now
    pub fn new(identity_id: Uuid, tier: Tier, token_fingerprint: impl Into<String>, ttl_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            identity_id,
            token_fingerprint: token_fingerprint.into(),
            tier,
            issued_at: now,
            expires_at: now + Duration::days(ttl_days),
        }
    }

    /// Generate a fresh 256-bit bearer token
    pub fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    /// SHA-256 fingerprint of a bearer token, hex encoded
    pub fn fingerprint(token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}
