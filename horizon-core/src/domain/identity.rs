//! Identity domain model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Privilege tier of an identity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    User,
    Admin,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::User => "user",
            Tier::Admin => "admin",
        }
    }

    /// Parse a stored tier string, defaulting to the lowest privilege
    pub fn from_str_or_user(s: &str) -> Self {
        match s {
            "admin" => Tier::Admin,
            _ => Tier::User,
        }
    }
}

/// A registered person
///
/// Profile fields mirror the sign-up form. The password hash is never part
/// of this entity; it stays inside the identity store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    /// Normalized to lowercase
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub tier: Tier,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Create a new identity with required fields
    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: Self::normalize_email(&email.into()),
            first_name: first_name.into(),
            last_name: last_name.into(),
            address1: None,
            city: None,
            state: None,
            postal_code: None,
            date_of_birth: None,
            tier: Tier::User,
            created_at: now,
            updated_at: now,
        }
    }

    /// Normalize an email address for storage and lookup
    pub fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// Full display name
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Registration input for a new identity
#[derive(Debug, Clone, Deserialize)]
pub struct NewIdentity {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub address1: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

impl NewIdentity {
    /// Validate registration input
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.email.trim().is_empty() || !self.email.contains('@') {
            return Err("a valid email address is required");
        }
        if self.password.len() < 8 {
            return Err("password must be at least 8 characters");
        }
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err("first and last name are required");
        }
        Ok(())
    }
}
