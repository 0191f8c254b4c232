//! Session service - registration, sign-in, and scope minting

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::domain::{AdminScope, Error, Identity, NewIdentity, Result, Session, Tier, UserScope};
use crate::ports::IdentityProvider;

/// Generate a fresh admin key (256 bits, hex encoded)
///
/// Called once during setup; the key is shown to the operator and kept in
/// the settings file.
pub fn generate_admin_key() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Session service for authentication and scope creation
///
/// This is the only place scopes are minted. Everything downstream takes a
/// `UserScope` or `AdminScope` argument instead of re-checking credentials.
pub struct SessionService {
    identity_provider: Arc<dyn IdentityProvider>,
    session_ttl_days: i64,
    admin_key: Option<String>,
}

impl SessionService {
    pub fn new(
        identity_provider: Arc<dyn IdentityProvider>,
        session_ttl_days: i64,
        admin_key: Option<String>,
    ) -> Self {
        Self {
            identity_provider,
            session_ttl_days,
            admin_key,
        }
    }

    /// Register a new identity at the lowest privilege tier
    ///
    /// Registration is a server-side operation, so it takes an admin scope
    /// rather than a user scope.
    pub fn register(&self, _admin: &AdminScope, new_identity: &NewIdentity) -> Result<Identity> {
        self.identity_provider.register(new_identity, Tier::User)
    }

    /// Verify a password and mint a bearer session
    ///
    /// The returned token is the only copy; it cannot be recovered later.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<SignIn> {
        let (token, session) =
            self.identity_provider
                .create_session(email, password, self.session_ttl_days)?;
        let identity = self.identity_provider.validate_session(&token)?;

        Ok(SignIn {
            token,
            identity,
            expires_at: session.expires_at,
        })
    }

    /// Revoke the session behind a bearer token
    ///
    /// Unknown or already-revoked tokens are a no-op, so sign-out is safe
    /// to repeat.
    pub fn sign_out(&self, token: &str) -> Result<()> {
        self.identity_provider.revoke_session(token)
    }

    /// Resolve a bearer token to its identity
    pub fn get_session_identity(&self, token: &str) -> Result<Identity> {
        self.identity_provider.validate_session(token)
    }

    /// Exchange a bearer token for a user scope
    ///
    /// `Unauthenticated` for missing, expired, revoked, or malformed tokens.
    pub fn create_user_scope(&self, token: &str) -> Result<UserScope> {
        let identity = self.identity_provider.validate_session(token)?;
        Ok(UserScope::new(identity))
    }

    /// Exchange the configured admin key for an admin scope
    pub fn create_admin_scope(&self, presented_key: &str) -> Result<AdminScope> {
        let configured = self
            .admin_key
            .as_deref()
            .ok_or_else(|| Error::unauthenticated("no admin key is configured"))?;

        // Digest comparison; comparing raw keys would stop at the first
        // differing byte.
        if Session::fingerprint(presented_key) != Session::fingerprint(configured) {
            return Err(Error::unauthenticated("admin key does not match"));
        }

        Ok(AdminScope::new())
    }
}

/// Result of a successful sign-in
///
/// Holds the raw bearer token, so this type is neither serialized nor
/// printed whole.
pub struct SignIn {
    pub token: String,
    pub identity: Identity,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for SignIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignIn")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
