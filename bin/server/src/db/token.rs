//! Token repository.
//!
//! Request-scoped operations implement [`TokenStore`] on the bound
//! transaction. Revocation of a token discovered expired, and the periodic
//! cleanup sweep, run directly on the pool: a 401 response rolls the
//! request transaction back, and the deletion must survive that.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keywarden_access::{Token, TokenStore, TokenUpdate};
use keywarden_core::{AuthId, Result, TokenId, UserId};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

use super::{decode_err, map_sqlx_err, no_transaction};
use crate::tx::RequestTx;

/// Row type for token queries.
#[derive(FromRow)]
struct TokenRow {
    id: String,
    user_id: String,
    auth_id: String,
    hash: String,
    expires_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TokenRow {
    fn try_into_token(self) -> Result<Token> {
        let id = TokenId::from_str(&self.id).map_err(|e| decode_err("token id", &self.id, e))?;
        let user_id =
            UserId::from_str(&self.user_id).map_err(|e| decode_err("user id", &self.user_id, e))?;
        let auth_id =
            AuthId::from_str(&self.auth_id).map_err(|e| decode_err("auth id", &self.auth_id, e))?;
        Ok(Token::with_all_fields(
            id,
            user_id,
            auth_id,
            self.hash,
            self.expires_at,
            self.last_used_at,
            self.created_at,
            self.updated_at,
        ))
    }
}

const TOKEN_COLUMNS: &str =
    "id, user_id, auth_id, hash, expires_at, last_used_at, created_at, updated_at";

/// Repository for token operations, bound to the request's transaction.
pub struct TokenRepository {
    tx: RequestTx,
}

impl TokenRepository {
    /// Creates a new token repository.
    #[must_use]
    pub fn new(tx: RequestTx) -> Self {
        Self { tx }
    }

    /// Deletes a token outside any request transaction.
    ///
    /// Used when validation finds an expired token: the request is about to
    /// be rejected, rolling its transaction back, but the revocation must
    /// stick.
    pub async fn revoke_detached(pool: &PgPool, id: TokenId) -> Result<()> {
        sqlx::query("DELETE FROM tokens WHERE id = $1")
            .bind(id.to_string())
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_err(e, "token"))?;
        Ok(())
    }

    /// Deletes all expired tokens. Returns the number of rows removed.
    pub async fn delete_expired(pool: &PgPool) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tokens WHERE expires_at < NOW()")
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_err(e, "token"))?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TokenStore for TokenRepository {
    async fn create_token(&self, token: &Token) -> Result<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        sqlx::query(
            r#"
            INSERT INTO tokens (id, user_id, auth_id, hash, expires_at, last_used_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.id().to_string())
        .bind(token.user_id().to_string())
        .bind(token.auth_id().to_string())
        .bind(token.hash())
        .bind(token.expires_at())
        .bind(token.last_used_at())
        .bind(token.created_at())
        .bind(token.updated_at())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "token"))?;

        Ok(())
    }

    async fn find_token_by_hash(&self, hash: &str) -> Result<Token> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        let row: TokenRow = sqlx::query_as(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE hash = $1"
        ))
        .bind(hash)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "token"))?;

        row.try_into_token()
    }

    async fn find_token_by_id(&self, id: TokenId) -> Result<Token> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        let row: TokenRow = sqlx::query_as(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "token"))?;

        row.try_into_token()
    }

    async fn update_token(&self, id: TokenId, update: TokenUpdate) -> Result<Token> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        let row: TokenRow = sqlx::query_as(&format!(
            r#"
            UPDATE tokens
            SET expires_at = $2, last_used_at = $3, updated_at = $3
            WHERE id = $1
            RETURNING {TOKEN_COLUMNS}
            "#
        ))
        .bind(id.to_string())
        .bind(update.expires_at)
        .bind(update.last_used_at)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "token"))?;

        row.try_into_token()
    }

    async fn delete_token(&self, id: TokenId) -> Result<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        sqlx::query("DELETE FROM tokens WHERE id = $1")
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_err(e, "token"))?;

        Ok(())
    }
}
