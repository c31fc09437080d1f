//! Storage capabilities required by the access operations.
//!
//! The traits here are the seam between domain logic and persistence.
//! Production code implements them against Postgres; tests use the
//! in-memory [`mem::MemStore`], which mirrors the uniqueness constraints
//! the real schema enforces.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keywarden_core::{AuthId, Result, TokenId, UserId};

use crate::identity::AuthIdentity;
use crate::token::Token;
use crate::user::User;

/// Persistence for [`User`] records.
///
/// `create_user` must reject a duplicate email with a `Conflict` error.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: &User) -> Result<()>;

    /// Finds a user by ID. Returns `NotFound` on a miss.
    async fn find_user_by_id(&self, id: UserId) -> Result<User>;

    /// Finds all users with the given email.
    ///
    /// Legacy data may hold more than one user per email; callers decide
    /// what an ambiguous result means.
    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>>;

    /// Persists changed fields of an existing user. Returns `NotFound` if
    /// the user no longer exists.
    async fn update_user(&self, user: &User) -> Result<()>;
}

/// Persistence for [`AuthIdentity`] records.
///
/// `create_identity` must reject a duplicate `(provider, provider_id)`
/// pair with a `Conflict` error.
#[async_trait]
pub trait AuthIdentityStore: Send + Sync {
    async fn create_identity(&self, identity: &AuthIdentity) -> Result<()>;

    /// Finds the identity for a provider account. Returns `NotFound` on a
    /// miss.
    async fn find_identity(&self, provider: &str, provider_id: &str) -> Result<AuthIdentity>;

    /// Finds an identity by ID. Returns `NotFound` on a miss.
    async fn find_identity_by_id(&self, id: AuthId) -> Result<AuthIdentity>;

    /// Persists changed fields of an existing identity. Returns `NotFound`
    /// if the identity no longer exists.
    async fn update_identity(&self, identity: &AuthIdentity) -> Result<()>;

    /// Deletes an identity link. Deleting a non-existent ID is not an
    /// error. The owning user is untouched.
    async fn delete_identity(&self, id: AuthId) -> Result<()>;
}

/// Field changes applied to a token on renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenUpdate {
    pub expires_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

/// Persistence for [`Token`] records.
///
/// Implementations must never persist a token's plaintext; only the hash
/// is stored. `create_token` must reject a duplicate hash with a
/// `Conflict` error.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn create_token(&self, token: &Token) -> Result<()>;

    /// Finds a token by the digest of its secret. Returns `NotFound` on a
    /// miss.
    async fn find_token_by_hash(&self, hash: &str) -> Result<Token>;

    /// Finds a token by ID. Returns `NotFound` on a miss.
    async fn find_token_by_id(&self, id: TokenId) -> Result<Token>;

    /// Applies a renewal update and returns the updated token. Returns
    /// `NotFound` if the token no longer exists.
    async fn update_token(&self, id: TokenId, update: TokenUpdate) -> Result<Token>;

    /// Deletes a token. Deleting a non-existent ID is not an error.
    async fn delete_token(&self, id: TokenId) -> Result<()>;
}

#[cfg(test)]
pub mod mem {
    //! In-memory store backing this crate's unit tests. Enforces the same
    //! uniqueness rules as the SQL schema.

    use super::*;
    use keywarden_core::Error;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    pub struct MemStore {
        users: Mutex<Vec<User>>,
        identities: Mutex<Vec<AuthIdentity>>,
        tokens: Mutex<Vec<Token>>,
    }

    impl MemStore {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Inserts a user without the email uniqueness check, standing in
        /// for legacy rows that predate the constraint.
        pub fn insert_user_unchecked(&self, user: User) {
            self.users.lock().unwrap().push(user);
        }
    }

    #[async_trait]
    impl UserStore for MemStore {
        async fn create_user(&self, user: &User) -> Result<()> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.email() == user.email()) {
                return Err(Error::conflict("email already in use"));
            }
            users.push(user.clone());
            Ok(())
        }

        async fn find_user_by_id(&self, id: UserId) -> Result<User> {
            self.users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id() == id)
                .cloned()
                .ok_or_else(|| Error::not_found("user not found"))
        }

        async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.email() == email)
                .cloned()
                .collect())
        }

        async fn update_user(&self, user: &User) -> Result<()> {
            let mut users = self.users.lock().unwrap();
            let existing = users
                .iter_mut()
                .find(|u| u.id() == user.id())
                .ok_or_else(|| Error::not_found("user not found"))?;
            *existing = user.clone();
            Ok(())
        }
    }

    #[async_trait]
    impl AuthIdentityStore for MemStore {
        async fn create_identity(&self, identity: &AuthIdentity) -> Result<()> {
            let mut identities = self.identities.lock().unwrap();
            if identities.iter().any(|i| {
                i.provider() == identity.provider() && i.provider_id() == identity.provider_id()
            }) {
                return Err(Error::conflict("identity already linked"));
            }
            identities.push(identity.clone());
            Ok(())
        }

        async fn find_identity(&self, provider: &str, provider_id: &str) -> Result<AuthIdentity> {
            self.identities
                .lock()
                .unwrap()
                .iter()
                .find(|i| i.provider() == provider && i.provider_id() == provider_id)
                .cloned()
                .ok_or_else(|| Error::not_found("identity not found"))
        }

        async fn find_identity_by_id(&self, id: AuthId) -> Result<AuthIdentity> {
            self.identities
                .lock()
                .unwrap()
                .iter()
                .find(|i| i.id() == id)
                .cloned()
                .ok_or_else(|| Error::not_found("identity not found"))
        }

        async fn update_identity(&self, identity: &AuthIdentity) -> Result<()> {
            let mut identities = self.identities.lock().unwrap();
            let existing = identities
                .iter_mut()
                .find(|i| i.id() == identity.id())
                .ok_or_else(|| Error::not_found("identity not found"))?;
            *existing = identity.clone();
            Ok(())
        }

        async fn delete_identity(&self, id: AuthId) -> Result<()> {
            self.identities.lock().unwrap().retain(|i| i.id() != id);
            Ok(())
        }
    }

    #[async_trait]
    impl TokenStore for MemStore {
        async fn create_token(&self, token: &Token) -> Result<()> {
            let mut tokens = self.tokens.lock().unwrap();
            if tokens.iter().any(|t| t.hash() == token.hash()) {
                return Err(Error::conflict("token hash already exists"));
            }
            // Persist without the plaintext, like the SQL schema does.
            tokens.push(Token::with_all_fields(
                token.id(),
                token.user_id(),
                token.auth_id(),
                token.hash().to_string(),
                token.expires_at(),
                token.last_used_at(),
                token.created_at(),
                token.updated_at(),
            ));
            Ok(())
        }

        async fn find_token_by_hash(&self, hash: &str) -> Result<Token> {
            self.tokens
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.hash() == hash)
                .cloned()
                .ok_or_else(|| Error::not_found("token not found"))
        }

        async fn find_token_by_id(&self, id: TokenId) -> Result<Token> {
            self.tokens
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.id() == id)
                .cloned()
                .ok_or_else(|| Error::not_found("token not found"))
        }

        async fn update_token(&self, id: TokenId, update: TokenUpdate) -> Result<Token> {
            let mut tokens = self.tokens.lock().unwrap();
            let existing = tokens
                .iter_mut()
                .find(|t| t.id() == id)
                .ok_or_else(|| Error::not_found("token not found"))?;
            *existing = Token::with_all_fields(
                existing.id(),
                existing.user_id(),
                existing.auth_id(),
                existing.hash().to_string(),
                update.expires_at,
                Some(update.last_used_at),
                existing.created_at(),
                update.last_used_at,
            );
            Ok(existing.clone())
        }

        async fn delete_token(&self, id: TokenId) -> Result<()> {
            self.tokens.lock().unwrap().retain(|t| t.id() != id);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mem::MemStore;
    use super::*;
    use chrono::Utc;
    use keywarden_core::ErrorCode;

    async fn linked_identity(store: &MemStore) -> AuthIdentity {
        let now = Utc::now();
        let user = User::new("owner@example.com".to_string(), now);
        let identity = AuthIdentity::new(
            user.id(),
            "google".to_string(),
            "sub-123".to_string(),
            now,
        );
        store.create_user(&user).await.unwrap();
        store.create_identity(&identity).await.unwrap();
        identity
    }

    #[tokio::test]
    async fn find_identity_by_id_hits_and_misses() {
        let store = MemStore::new();
        let identity = linked_identity(&store).await;

        let found = store.find_identity_by_id(identity.id()).await.unwrap();
        assert_eq!(found, identity);

        let err = store.find_identity_by_id(AuthId::new()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn delete_identity_leaves_user_intact() {
        let store = MemStore::new();
        let identity = linked_identity(&store).await;

        store.delete_identity(identity.id()).await.unwrap();

        let err = store.find_identity_by_id(identity.id()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(store.find_user_by_id(identity.user_id()).await.is_ok());
    }

    #[tokio::test]
    async fn delete_identity_is_idempotent() {
        let store = MemStore::new();
        let identity = linked_identity(&store).await;

        store.delete_identity(identity.id()).await.unwrap();
        assert!(store.delete_identity(identity.id()).await.is_ok());
    }
}
