//! User repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keywarden_access::{Role, User, UserStore};
use keywarden_core::{Result, UserId};
use sqlx::FromRow;
use std::str::FromStr;

use super::{decode_err, map_sqlx_err, no_transaction};
use crate::tx::RequestTx;

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    role: String,
    last_login_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> Result<User> {
        let id = UserId::from_str(&self.id).map_err(|e| decode_err("user id", &self.id, e))?;
        let role = Role::from_str(&self.role).map_err(|e| decode_err("role", &self.role, e))?;
        Ok(User::with_all_fields(
            id,
            self.email,
            self.first_name,
            self.last_name,
            self.avatar_url,
            role,
            self.last_login_at,
            self.created_at,
            self.updated_at,
        ))
    }
}

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, avatar_url, role, last_login_at, created_at, updated_at";

/// Repository for user operations, bound to the request's transaction.
pub struct UserRepository {
    tx: RequestTx,
}

impl UserRepository {
    /// Creates a new user repository.
    #[must_use]
    pub fn new(tx: RequestTx) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl UserStore for UserRepository {
    async fn create_user(&self, user: &User) -> Result<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        // ON CONFLICT DO NOTHING instead of surfacing the unique violation:
        // a 23505 would abort the request transaction and break the caller's
        // retry lookup. The zero row count is the conflict signal.
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, email, first_name, last_name, avatar_url, role, last_login_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.email())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.avatar_url())
        .bind(user.role().as_str())
        .bind(user.last_login_at())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "user"))?;

        if result.rows_affected() == 0 {
            return Err(keywarden_core::Error::conflict("email already in use"));
        }
        Ok(())
    }

    async fn find_user_by_id(&self, id: UserId) -> Result<User> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        let row: UserRow = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.to_string())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "user"))?;

        row.try_into_user()
    }

    async fn find_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_all(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "user"))?;

        rows.into_iter().map(UserRow::try_into_user).collect()
    }

    async fn update_user(&self, user: &User) -> Result<()> {
        let mut guard = self.tx.lock().await;
        let tx = guard.as_mut().ok_or_else(no_transaction)?;

        let result = sqlx::query(
            r#"
            UPDATE users
            SET email = $2, first_name = $3, last_name = $4, avatar_url = $5,
                role = $6, last_login_at = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.email())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.avatar_url())
        .bind(user.role().as_str())
        .bind(user.last_login_at())
        .bind(user.updated_at())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_err(e, "user"))?;

        if result.rows_affected() == 0 {
            return Err(keywarden_core::Error::not_found("user not found"));
        }
        Ok(())
    }
}
