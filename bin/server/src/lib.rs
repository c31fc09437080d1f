//! keywarden HTTP server.
//!
//! Wires the access domain to Postgres and exposes the login flow over
//! HTTP. Two middleware layers wrap every route: the outer one binds a
//! database transaction to the request and settles it from the final
//! response status, the inner one validates bearer credentials.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod tx;
