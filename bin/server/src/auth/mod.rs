//! Authentication module for the keywarden server.
//!
//! This module provides:
//! - OIDC login, callback, logout, and status routes
//! - Bearer-token validation middleware with sliding renewal
//! - The identity-provider client boundary
//!
//! Every authenticated request renews its token, so "session timeout"
//! means idle timeout, not absolute lifetime. Token state is read and
//! written through the transaction bound to the request, except for
//! revocation of tokens discovered expired, which must outlive the 401
//! response's rollback.

pub mod middleware;
pub mod oidc;
pub mod routes;

pub use middleware::{CurrentToken, CurrentUser, authn_middleware};
pub use oidc::{IdentityProvider, OidcClient};
pub use routes::{callback, login, logout, status};

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sqlx::PgPool;
use std::sync::Arc;

use crate::config::SessionConfig;

/// Shared application state.
pub struct AppState {
    /// Database connection pool, for operations that must not run inside
    /// the request transaction.
    pub db_pool: PgPool,
    /// Identity-provider client for the login flow.
    pub idp: Arc<dyn IdentityProvider>,
    /// Session configuration.
    pub session: SessionConfig,
    /// Key for signing session cookies.
    pub cookie_key: Key,
}

impl AppState {
    /// Creates a new application state, deriving the cookie signing key
    /// from the configured session secret.
    pub fn new(db_pool: PgPool, idp: Arc<dyn IdentityProvider>, session: SessionConfig) -> Self {
        let cookie_key = Key::derive_from(session.secret.as_bytes());
        Self {
            db_pool,
            idp,
            session,
            cookie_key,
        }
    }
}

/// Newtype over the cookie signing key so it can be extracted from
/// `Arc<AppState>`; a direct `FromRef` impl on `Key` would violate the
/// orphan rules since both `Key` and `Arc` are foreign types.
#[derive(Clone)]
pub struct CookieKey(Key);

impl From<CookieKey> for Key {
    fn from(key: CookieKey) -> Self {
        key.0
    }
}

impl FromRef<Arc<AppState>> for CookieKey {
    fn from_ref(state: &Arc<AppState>) -> Self {
        CookieKey(state.cookie_key.clone())
    }
}
