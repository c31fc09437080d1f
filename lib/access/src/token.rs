//! Bearer tokens and the operations that manage them.
//!
//! A token is issued at the end of a successful login, validated on every
//! authenticated request, and renewed on each use: `expires_at` slides
//! forward from the moment of use, so a token's effective lifetime is
//! "lifetime since last use", not "lifetime since issuance".
//!
//! Only the digest of the secret is ever persisted. `plain_text` is
//! populated exactly once, on the freshly issued token, and exists nowhere
//! else.

use chrono::{DateTime, Duration, Utc};
use keywarden_core::{AuthId, Error, Result, TokenId, UserId};
use serde::{Deserialize, Serialize};

use crate::secret;
use crate::store::{TokenStore, TokenUpdate};

/// Returns the default token lifetime: 24 hours since last use.
#[must_use]
pub fn default_lifetime() -> Duration {
    Duration::hours(24)
}

/// A bearer credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Unique identifier for this token.
    id: TokenId,
    /// The owning user.
    user_id: UserId,
    /// The identity-provider login that produced this token.
    auth_id: AuthId,
    /// One-way digest of the secret; the only persisted form.
    hash: String,
    /// The secret itself. Held in memory only, returned once to the caller,
    /// never persisted or serialized.
    #[serde(skip)]
    plain_text: Option<String>,
    /// When the token stops being valid.
    expires_at: DateTime<Utc>,
    /// When the token was last presented on a successful request.
    last_used_at: Option<DateTime<Utc>>,
    /// When the token was created.
    created_at: DateTime<Utc>,
    /// When the token record was last updated.
    updated_at: DateTime<Utc>,
}

impl Token {
    /// Issues a fresh token for the given user and identity.
    ///
    /// Generates a new secret, digests it, and sets
    /// `expires_at = now + lifetime` and `last_used_at = now`. The returned
    /// token is the only place the plaintext secret ever appears.
    #[must_use]
    pub fn issue(user_id: UserId, auth_id: AuthId, lifetime: Duration, now: DateTime<Utc>) -> Self {
        let plain_text = secret::generate_secret();
        let hash = secret::digest(&plain_text);
        Self {
            id: TokenId::new(),
            user_id,
            auth_id,
            hash,
            plain_text: Some(plain_text),
            expires_at: now + lifetime,
            last_used_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a token with all fields specified and no plaintext.
    ///
    /// Use this when reconstituting a token from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: TokenId,
        user_id: UserId,
        auth_id: AuthId,
        hash: String,
        expires_at: DateTime<Utc>,
        last_used_at: Option<DateTime<Utc>>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            auth_id,
            hash,
            plain_text: None,
            expires_at,
            last_used_at,
            created_at,
            updated_at,
        }
    }

    /// Returns an `Invalid` error if required fields are missing.
    pub fn validate(&self) -> Result<()> {
        if self.hash.is_empty() {
            return Err(Error::invalid("hash required"));
        }
        Ok(())
    }

    /// Returns the token's ID.
    #[must_use]
    pub fn id(&self) -> TokenId {
        self.id
    }

    /// Returns the owning user's ID.
    #[must_use]
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the originating identity's ID.
    #[must_use]
    pub fn auth_id(&self) -> AuthId {
        self.auth_id
    }

    /// Returns the digest of the secret.
    #[must_use]
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Returns the plaintext secret, present only on a freshly issued token.
    #[must_use]
    pub fn plain_text(&self) -> Option<&str> {
        self.plain_text.as_deref()
    }

    /// Returns when the token stops being valid.
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Returns when the token was last used, if ever.
    #[must_use]
    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    /// Returns when the token was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the token record was last updated.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns true if the token is no longer valid at the given instant.
    ///
    /// A token is valid iff `now < expires_at`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Issues a new token and persists it.
///
/// The returned token carries the plaintext secret; the persisted record
/// does not.
pub async fn issue_token(
    store: &dyn TokenStore,
    user_id: UserId,
    auth_id: AuthId,
    lifetime: Duration,
    now: DateTime<Utc>,
) -> Result<Token> {
    let token = Token::issue(user_id, auth_id, lifetime, now);
    token.validate()?;
    store.create_token(&token).await?;
    Ok(token)
}

/// Looks up a token by its plaintext secret.
///
/// The input is digested and the lookup is performed on the digest;
/// plaintext values are never compared. Returns `NotFound` on a miss.
pub async fn find_token_by_secret(store: &dyn TokenStore, plaintext: &str) -> Result<Token> {
    store.find_token_by_hash(&secret::digest(plaintext)).await
}

/// Slides the token's expiry window forward from `now` and records the use.
pub async fn renew_token(
    store: &dyn TokenStore,
    id: TokenId,
    lifetime: Duration,
    now: DateTime<Utc>,
) -> Result<Token> {
    store
        .update_token(
            id,
            TokenUpdate {
                expires_at: now + lifetime,
                last_used_at: now,
            },
        )
        .await
}

/// Revokes a token by deleting its row. Deleting a non-existent ID is not
/// an error.
pub async fn revoke_token(store: &dyn TokenStore, id: TokenId) -> Result<()> {
    store.delete_token(id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::mem::MemStore;
    use keywarden_core::ErrorCode;

    #[test]
    fn issued_token_hash_matches_digest_of_plaintext() {
        let token = Token::issue(UserId::new(), AuthId::new(), default_lifetime(), Utc::now());
        let plain = token.plain_text().expect("fresh token has plaintext");
        assert_eq!(token.hash(), secret::digest(plain));
    }

    #[test]
    fn issued_token_expiry_and_last_used() {
        let now = Utc::now();
        let token = Token::issue(UserId::new(), AuthId::new(), Duration::hours(24), now);
        assert_eq!(token.expires_at(), now + Duration::hours(24));
        assert_eq!(token.last_used_at(), Some(now));
        assert!(!token.is_expired(now));
    }

    #[test]
    fn token_is_expired_at_and_after_expiry() {
        let now = Utc::now();
        let token = Token::issue(UserId::new(), AuthId::new(), Duration::hours(24), now);
        assert!(token.is_expired(now + Duration::hours(24)));
        assert!(token.is_expired(now + Duration::hours(25)));
    }

    #[test]
    fn past_expiry_is_rejected_regardless_of_recent_issue() {
        // A token issued "in the past" with a negative remaining lifetime is
        // expired no matter how recently the row was created.
        let now = Utc::now();
        let token = Token::issue(UserId::new(), AuthId::new(), Duration::seconds(-1), now);
        assert!(token.is_expired(now));
    }

    #[test]
    fn plaintext_is_not_serialized() {
        let token = Token::issue(UserId::new(), AuthId::new(), default_lifetime(), Utc::now());
        let json = serde_json::to_string(&token).expect("serialize");
        assert!(!json.contains(token.plain_text().expect("plaintext")));
        assert!(!json.contains("plain_text"));
    }

    #[test]
    fn empty_hash_is_invalid() {
        let token = Token::with_all_fields(
            TokenId::new(),
            UserId::new(),
            AuthId::new(),
            String::new(),
            Utc::now(),
            None,
            Utc::now(),
            Utc::now(),
        );
        assert_eq!(token.validate().unwrap_err().code(), ErrorCode::Invalid);
    }

    #[tokio::test]
    async fn issue_and_find_by_secret_roundtrip() {
        let store = MemStore::new();
        let now = Utc::now();

        let issued = issue_token(&store, UserId::new(), AuthId::new(), default_lifetime(), now)
            .await
            .expect("issue");
        let plain = issued.plain_text().expect("plaintext").to_string();

        let found = find_token_by_secret(&store, &plain).await.expect("find");
        assert_eq!(found.id(), issued.id());
        assert_eq!(found.hash(), secret::digest(&plain));
        // The persisted copy never carries the secret.
        assert!(found.plain_text().is_none());
    }

    #[tokio::test]
    async fn find_by_unknown_secret_is_not_found() {
        let store = MemStore::new();
        let err = find_token_by_secret(&store, "no-such-secret")
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn renew_slides_expiry_from_now() {
        let store = MemStore::new();
        let t0 = Utc::now();
        let lifetime = Duration::hours(24);

        let issued = issue_token(&store, UserId::new(), AuthId::new(), lifetime, t0)
            .await
            .expect("issue");

        // Validate one hour later: the window slides to t0 + 25h.
        let t1 = t0 + Duration::hours(1);
        let renewed = renew_token(&store, issued.id(), lifetime, t1)
            .await
            .expect("renew");

        assert_eq!(renewed.expires_at(), t0 + Duration::hours(25));
        assert_eq!(renewed.last_used_at(), Some(t1));
        assert!(renewed.expires_at() > issued.expires_at());
    }

    #[tokio::test]
    async fn unrenewed_token_expires_after_lifetime() {
        let store = MemStore::new();
        let t0 = Utc::now();
        let lifetime = Duration::hours(24);

        let issued = issue_token(&store, UserId::new(), AuthId::new(), lifetime, t0)
            .await
            .expect("issue");

        let late = t0 + Duration::hours(25) + Duration::seconds(1);
        assert!(issued.is_expired(late));
    }

    #[tokio::test]
    async fn revoke_is_idempotent() {
        let store = MemStore::new();
        let now = Utc::now();

        let issued = issue_token(&store, UserId::new(), AuthId::new(), default_lifetime(), now)
            .await
            .expect("issue");

        revoke_token(&store, issued.id()).await.expect("revoke");
        // Second delete of the same ID is not an error.
        revoke_token(&store, issued.id()).await.expect("revoke again");

        let err = store.find_token_by_id(issued.id()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
