//! Auth identity repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keywarden_access::{AuthIdentity, AuthIdentityStore};
use keywarden_core::{AuthId, Result, UserId};
use sqlx::FromRow;
use std::str::FromStr;

use super::{decode_err, map_sqlx_err, no_transaction};
use crate::tx::RequestTx;

/// Row type for identity queries.
#[derive(FromRow)]
struct AuthIdentityRow {
    id: String,
    user_id: String,
    provider: String,
    provider_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AuthIdentityRow {
    fn try_into_identity(self) -> Result<AuthIdentity> {
        let id = AuthId::from_str(&self.id).map_err(|e| decode_err("auth id", &self.id, e))?;
        let user_id =
            UserId::from_str(&self.user_id).map_err(|e| decode_err("user id", &self.user_id, e))?;
        Ok(AuthIdentity::with_all_fields(
            id,
            user_id,
            self.provider,
            self.provider_id,
            self.created_at,
            self.updated_at,
        ))
    }
}

/// Repository for identity-link operations, bound to the request's
/// transaction.
pub struct AuthIdentityRepository {
    tx: RequestTx,
}

impl AuthIdentityRepository {
    /// Creates a new identity repository.
    #[must_use]
    pub fn new(tx: RequestTx) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl AuthIdentityStore for AuthIdentityRepository {
    async fn create_identity(&self, identity: &AuthIdentity) -> Result<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        // ON CONFLICT DO NOTHING instead of surfacing the unique violation:
        // a 23505 would abort the request transaction and break the caller's
        // retry lookup. The zero row count is the conflict signal.
        let result = sqlx::query(
            r#"
            INSERT INTO auth_identities (id, user_id, provider, provider_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(identity.id().to_string())
        .bind(identity.user_id().to_string())
        .bind(identity.provider())
        .bind(identity.provider_id())
        .bind(identity.created_at())
        .bind(identity.updated_at())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "auth identity"))?;

        if result.rows_affected() == 0 {
            return Err(keywarden_core::Error::conflict("identity already linked"));
        }
        Ok(())
    }

    async fn find_identity(&self, provider: &str, provider_id: &str) -> Result<AuthIdentity> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        let row: AuthIdentityRow = sqlx::query_as(
            r#"
            SELECT id, user_id, provider, provider_id, created_at, updated_at
            FROM auth_identities
            WHERE provider = $1 AND provider_id = $2
            "#,
        )
        .bind(provider)
        .bind(provider_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "auth identity"))?;

        row.try_into_identity()
    }

    async fn find_identity_by_id(&self, id: AuthId) -> Result<AuthIdentity> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        let row: AuthIdentityRow = sqlx::query_as(
            r#"
            SELECT id, user_id, provider, provider_id, created_at, updated_at
            FROM auth_identities
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "auth identity"))?;

        row.try_into_identity()
    }

    async fn update_identity(&self, identity: &AuthIdentity) -> Result<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        let result = sqlx::query(
            r#"
            UPDATE auth_identities
            SET provider = $2, provider_id = $3, updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(identity.id().to_string())
        .bind(identity.provider())
        .bind(identity.provider_id())
        .bind(identity.updated_at())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "auth identity"))?;

        if result.rows_affected() == 0 {
            return Err(keywarden_core::Error::not_found("auth identity not found"));
        }
        Ok(())
    }

    async fn delete_identity(&self, id: AuthId) -> Result<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        sqlx::query("DELETE FROM auth_identities WHERE id = $1")
            .bind(id.to_string())
            .execute(&mut **tx)
            .await
            .map_err(|e| map_sqlx_err(e, "auth identity"))?;

        Ok(())
    }
}
