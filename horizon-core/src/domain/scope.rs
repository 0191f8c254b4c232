//! Capability scopes
//!
//! Every privileged operation takes an explicit scope argument. There is no
//! ambient "current user" anywhere in the crate: holding a scope IS the
//! proof that a credential was checked. Scopes are immutable and only the
//! session service can mint them.

use uuid::Uuid;

use crate::domain::identity::Identity;

/// Capability to act as one authenticated identity
#[derive(Debug, Clone)]
pub struct UserScope {
    identity: Identity,
}

impl UserScope {
    pub(crate) fn new(identity: Identity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn identity_id(&self) -> Uuid {
        self.identity.id
    }
}

/// Capability to perform server-side administrative operations
///
/// Minted only from the configured admin key, never from a client session.
#[derive(Debug, Clone)]
pub struct AdminScope {
    _guard: (),
}

impl AdminScope {
    pub(crate) fn new() -> Self {
        Self { _guard: () }
    }
}
