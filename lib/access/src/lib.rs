//! Access domain: users, provider identities, and bearer tokens.
//!
//! This crate holds the authentication core's domain types and the
//! storage-agnostic operations over them. It knows nothing about HTTP or
//! SQL; servers supply [`store`] implementations and drive the flows.

pub mod identity;
pub mod linker;
pub mod profile;
pub mod role;
pub mod secret;
pub mod store;
pub mod token;
pub mod user;

pub use identity::AuthIdentity;
pub use linker::link_identity;
pub use profile::IdpProfile;
pub use role::Role;
pub use store::{AuthIdentityStore, TokenStore, TokenUpdate, UserStore};
pub use token::{
    Token, default_lifetime, find_token_by_secret, issue_token, renew_token, revoke_token,
};
pub use user::User;
