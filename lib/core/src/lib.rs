//! Core domain types and utilities for the keywarden authentication service.
//!
//! This crate provides the foundational types shared by every layer:
//! strongly-typed entity IDs and the application error taxonomy.

pub mod error;
pub mod id;

pub use error::{Error, ErrorCode, Result};
pub use id::{AuthId, TokenId, UserId};
