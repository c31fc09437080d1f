//! Database repositories.
//!
//! Each repository implements one of the `keywarden-access` store traits
//! against Postgres, running every query on the transaction bound to the
//! current request. Operations that must survive a request's rollback
//! (expired-token revocation, periodic cleanup) run directly on the pool
//! instead.

pub mod identity;
pub mod token;
pub mod user;

pub use identity::AuthIdentityRepository;
pub use token::TokenRepository;
pub use user::UserRepository;

use keywarden_core::Error;

/// Maps a sqlx error to the domain taxonomy.
///
/// Unique-constraint violations become `Conflict` so callers can treat a
/// lost create race as a retryable signal rather than a fatal failure.
pub(crate) fn map_sqlx_err(err: sqlx::Error, what: &str) -> Error {
    match &err {
        sqlx::Error::RowNotFound => Error::not_found(format!("{what} not found")),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::conflict(format!("{what} already exists"))
        }
        _ => Error::internal(format!("{what} query failed: {err}")),
    }
}

/// Error for a request-scoped repository invoked outside a bound
/// transaction. This is a wiring bug in the router, not a runtime
/// condition.
pub(crate) fn no_transaction() -> Error {
    Error::internal("no transaction bound to request")
}

/// Error for a stored value that no longer parses, e.g. a malformed ID.
pub(crate) fn decode_err(what: &str, value: &str, detail: impl std::fmt::Display) -> Error {
    Error::internal(format!("invalid {what} '{value}' in storage: {detail}"))
}
