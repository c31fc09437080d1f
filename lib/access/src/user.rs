//! User domain type.
//!
//! A `User` is a principal. Email is the identity-linking key: the linker
//! assumes at most one user per email, and an ambiguous match is a hard
//! error rather than a silent pick.

use chrono::{DateTime, Utc};
use keywarden_core::{Error, Result, UserId};
use serde::{Deserialize, Serialize};

use crate::role::Role;

/// A principal known to the platform.
///
/// Users are created either by the identity linker on first sight of a new
/// email, or by administrative tooling outside this crate. They are never
/// hard-deleted by the authentication core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal platform user ID.
    id: UserId,
    /// Email address; the identity-linking key.
    email: String,
    /// Given name, if known.
    first_name: Option<String>,
    /// Family name, if known.
    last_name: Option<String>,
    /// Avatar image URL, if known.
    avatar_url: Option<String>,
    /// Privilege level.
    role: Role,
    /// When the user last completed a login, if ever.
    last_login_at: Option<DateTime<Utc>>,
    /// When the user record was created.
    created_at: DateTime<Utc>,
    /// When the user record was last updated.
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates a new user with the given email and the lowest-privilege role.
    #[must_use]
    pub fn new(email: String, now: DateTime<Utc>) -> Self {
        Self {
            id: UserId::new(),
            email,
            first_name: None,
            last_name: None,
            avatar_url: None,
            role: Role::default(),
            last_login_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: UserId,
        email: String,
        first_name: Option<String>,
        last_name: Option<String>,
        avatar_url: Option<String>,
        role: Role,
        last_login_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            first_name,
            last_name,
            avatar_url,
            role,
            last_login_at,
            created_at,
            updated_at,
        }
    }

    /// Returns an `Invalid` error if required fields are missing.
    pub fn validate(&self) -> Result<()> {
        if self.email.is_empty() {
            return Err(Error::invalid("email required"));
        }
        Ok(())
    }

    /// Returns the user's internal ID.
    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    /// Returns the user's email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the user's given name, if known.
    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    /// Returns the user's family name, if known.
    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    /// Returns the user's avatar URL, if known.
    #[must_use]
    pub fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }

    /// Returns the user's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns when the user last logged in, if ever.
    #[must_use]
    pub fn last_login_at(&self) -> Option<DateTime<Utc>> {
        self.last_login_at
    }

    /// Returns when the user record was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the user record was last updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Sets the user's given name.
    pub fn set_first_name(&mut self, first_name: Option<String>, now: DateTime<Utc>) {
        self.first_name = first_name;
        self.updated_at = now;
    }

    /// Sets the user's family name.
    pub fn set_last_name(&mut self, last_name: Option<String>, now: DateTime<Utc>) {
        self.last_name = last_name;
        self.updated_at = now;
    }

    /// Sets the user's avatar URL.
    pub fn set_avatar_url(&mut self, avatar_url: Option<String>, now: DateTime<Utc>) {
        self.avatar_url = avatar_url;
        self.updated_at = now;
    }

    /// Records a completed login.
    pub fn touch_last_login(&mut self, now: DateTime<Utc>) {
        self.last_login_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keywarden_core::ErrorCode;

    #[test]
    fn new_user_defaults_to_basic_role() {
        let user = User::new("alice@example.com".to_string(), Utc::now());
        assert_eq!(user.role(), Role::Basic);
        assert!(user.last_login_at().is_none());
        assert_eq!(user.created_at(), user.updated_at());
    }

    #[test]
    fn new_user_validates() {
        let user = User::new("alice@example.com".to_string(), Utc::now());
        assert!(user.validate().is_ok());
    }

    #[test]
    fn empty_email_is_invalid() {
        let user = User::new(String::new(), Utc::now());
        let err = user.validate().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Invalid);
    }

    #[test]
    fn touch_last_login_sets_timestamps() {
        let t0 = Utc::now();
        let mut user = User::new("alice@example.com".to_string(), t0);
        let t1 = t0 + chrono::Duration::minutes(5);

        user.touch_last_login(t1);

        assert_eq!(user.last_login_at(), Some(t1));
        assert_eq!(user.updated_at(), t1);
    }

    #[test]
    fn setters_update_timestamp() {
        let t0 = Utc::now();
        let mut user = User::new("alice@example.com".to_string(), t0);
        let t1 = t0 + chrono::Duration::seconds(10);

        user.set_first_name(Some("Alice".to_string()), t1);

        assert_eq!(user.first_name(), Some("Alice"));
        assert_eq!(user.updated_at(), t1);
    }

    #[test]
    fn with_all_fields_preserves_values() {
        let id = UserId::new();
        let created = Utc::now() - chrono::Duration::days(30);
        let updated = Utc::now() - chrono::Duration::days(1);

        let user = User::with_all_fields(
            id,
            "bob@example.com".to_string(),
            Some("Bob".to_string()),
            None,
            None,
            Role::Admin,
            Some(updated),
            created,
            updated,
        );

        assert_eq!(user.id(), id);
        assert_eq!(user.email(), "bob@example.com");
        assert_eq!(user.role(), Role::Admin);
        assert_eq!(user.created_at(), created);
    }

    #[test]
    fn user_serialization_roundtrip() {
        let user = User::new("alice@example.com".to_string(), Utc::now());
        let json = serde_json::to_string(&user).expect("serialize");
        let parsed: User = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(user, parsed);
    }
}
