//! Local identity directory
//!
//! `IdentityProvider` implementation backed by the DuckDB store. Passwords
//! are hashed as argon2id PHC strings; session tokens are stored only as
//! SHA-256 fingerprints, so a leaked database cannot be replayed into
//! working credentials.

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::adapters::duckdb::DuckDbStore;
use crate::domain::result::{Error, Result};
use crate::domain::{Identity, NewIdentity, Session, Tier};
use crate::ports::IdentityProvider;

/// Store-backed identity directory
pub struct DirectoryProvider {
    store: Arc<DuckDbStore>,
}

impl DirectoryProvider {
    pub fn new(store: Arc<DuckDbStore>) -> Self {
        Self { store }
    }

    fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| Error::validation(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }

    fn verify_password(password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

impl IdentityProvider for DirectoryProvider {
    fn name(&self) -> &str {
        "directory"
    }

    fn register(&self, new_identity: &NewIdentity, tier: Tier) -> Result<Identity> {
        new_identity.validate().map_err(Error::validation)?;

        let email = Identity::normalize_email(&new_identity.email);
        if self.store.get_identity_by_email(&email)?.is_some() {
            return Err(Error::validation(format!(
                "An identity already exists for {}",
                email
            )));
        }

        let mut identity = Identity::new(
            email,
            new_identity.first_name.clone(),
            new_identity.last_name.clone(),
        );
        identity.tier = tier;
        identity.address1 = new_identity.address1.clone();
        identity.city = new_identity.city.clone();
        identity.state = new_identity.state.clone();
        identity.postal_code = new_identity.postal_code.clone();
        identity.date_of_birth = new_identity.date_of_birth;

        let password_hash = Self::hash_password(&new_identity.password)?;
        self.store.insert_identity(&identity, &password_hash)?;

        Ok(identity)
    }

    fn create_session(
        &self,
        email: &str,
        password: &str,
        ttl_days: i64,
    ) -> Result<(String, Session)> {
        let email = Identity::normalize_email(email);

        // One error message for both failure modes, so sign-in does not
        // reveal which emails are registered.
        let (identity, password_hash) = self
            .store
            .get_identity_by_email(&email)?
            .ok_or_else(|| Error::unauthenticated("invalid email or password"))?;

        if !Self::verify_password(password, &password_hash) {
            return Err(Error::unauthenticated("invalid email or password"));
        }

        let token = Session::generate_token();
        let session = Session::new(
            identity.id,
            identity.tier,
            Session::fingerprint(&token),
            ttl_days,
        );
        self.store.insert_session(&session)?;

        Ok((token, session))
    }

    fn validate_session(&self, token: &str) -> Result<Identity> {
        if token.len() != Session::TOKEN_LEN {
            return Err(Error::unauthenticated("malformed session token"));
        }

        let fingerprint = Session::fingerprint(token);
        let session = self
            .store
            .get_session_by_fingerprint(&fingerprint)?
            .ok_or_else(|| Error::unauthenticated("unknown session token"))?;

        if session.is_expired() {
            // Expired rows are dead weight; drop them on sight
            let _ = self.store.delete_session_by_fingerprint(&fingerprint);
            return Err(Error::unauthenticated("session expired"));
        }

        self.store
            .get_identity_by_id(session.identity_id)?
            .ok_or_else(|| Error::unauthenticated("session identity no longer exists"))
    }

    fn revoke_session(&self, token: &str) -> Result<()> {
        let fingerprint = Session::fingerprint(token);
        self.store.delete_session_by_fingerprint(&fingerprint)?;
        Ok(())
    }
}
