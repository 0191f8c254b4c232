//! Identity provider port
//!
//! Defines the interface for registration and session credentials. The
//! session service uses this trait without knowing whether identities live
//! in the local directory or a hosted service.

use crate::domain::result::Result;
use crate::domain::{Identity, NewIdentity, Session, Tier};

/// Identity provider trait
///
/// Implementations own password verification and session minting. Raw
/// bearer tokens pass through here exactly once, at creation; afterwards
/// only fingerprints are compared.
pub trait IdentityProvider: Send + Sync {
    /// Provider name (e.g., "directory")
    fn name(&self) -> &str;

    /// Create a new identity with the given privilege tier
    ///
    /// Fails validation on malformed input or a duplicate email.
    fn register(&self, new_identity: &NewIdentity, tier: Tier) -> Result<Identity>;

    /// Verify a password and mint a session
    ///
    /// Returns the raw bearer token together with the stored session row.
    /// This is the only place the raw token ever exists.
    fn create_session(&self, email: &str, password: &str, ttl_days: i64)
        -> Result<(String, Session)>;

    /// Resolve a bearer token to its identity
    ///
    /// `Unauthenticated` for missing, malformed, expired, or unknown tokens.
    fn validate_session(&self, token: &str) -> Result<Identity>;

    /// Revoke a session; unknown tokens are a no-op
    fn revoke_session(&self, token: &str) -> Result<()>;
}
