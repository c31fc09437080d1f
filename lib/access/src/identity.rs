//! Auth identity: the link between an external identity-provider account
//! and a local user.
//!
//! A user can hold one identity per provider; the `(provider, provider_id)`
//! pair resolves to at most one identity. Identities can be deleted
//! independently of their owning user.

use chrono::{DateTime, Utc};
use keywarden_core::{AuthId, Error, Result, UserId};
use serde::{Deserialize, Serialize};

/// A link between one external identity-provider account and one local user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    /// Unique identifier for this link.
    id: AuthId,
    /// The owning user.
    user_id: UserId,
    /// The authentication provider name, e.g. "google".
    provider: String,
    /// The provider-assigned subject ID for the account.
    provider_id: String,
    /// When the link was created.
    created_at: DateTime<Utc>,
    /// When the link was last updated (touched on repeat logins).
    updated_at: DateTime<Utc>,
}

impl AuthIdentity {
    /// Creates a new identity link for the given user.
    #[must_use]
    pub fn new(user_id: UserId, provider: String, provider_id: String, now: DateTime<Utc>) -> Self {
        Self {
            id: AuthId::new(),
            user_id,
            provider,
            provider_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates an identity with all fields specified.
    ///
    /// Use this when reconstituting an identity from storage.
    #[must_use]
    pub fn with_all_fields(
        id: AuthId,
        user_id: UserId,
        provider: String,
        provider_id: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            provider,
            provider_id,
            created_at,
            updated_at,
        }
    }

    /// Returns an `Invalid` error if required fields are missing.
    pub fn validate(&self) -> Result<()> {
        if self.provider.is_empty() {
            return Err(Error::invalid("provider required"));
        }
        if self.provider_id.is_empty() {
            return Err(Error::invalid("provider ID required"));
        }
        Ok(())
    }

    /// Returns the identity's ID.
    #[must_use]
    pub fn id(&self) -> AuthId {
        self.id
    }

    /// Returns the owning user's ID.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the provider name.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Returns the provider-assigned subject ID.
    #[must_use]
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// Returns when the link was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the link was last updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Records a repeat login through this identity.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}
