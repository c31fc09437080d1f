//! Application error taxonomy.
//!
//! Every fallible operation in the authentication core returns an [`Error`]
//! carrying a machine-readable [`ErrorCode`] and a human-readable message.
//! The codes map cleanly onto HTTP statuses at the server edge; anything a
//! lower layer cannot classify is reported as `Internal` and the detail is
//! kept for server-side logs only.

use std::fmt;

/// A Result type alias for operations in the authentication core.
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed or missing input to a core operation.
    Invalid,
    /// No matching user, auth identity, or token.
    NotFound,
    /// A data-integrity conflict, e.g. an ambiguous email match during
    /// identity linking or a unique-constraint violation.
    Conflict,
    /// Credential missing, unknown, or expired. Deliberately
    /// undifferentiated so callers cannot probe for valid credentials.
    Unauthorized,
    /// Storage or transport failure not otherwise classified.
    Internal,
}

impl ErrorCode {
    /// Returns the wire representation of the code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Unauthorized => "unauthorized",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An application error: a code plus a message.
///
/// Validation errors are produced at the boundary of the operation that
/// detected them and are never silently defaulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Error {
    code: ErrorCode,
    message: String,
}

impl Error {
    /// Creates an error with the given code and message.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// An `Invalid` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Invalid, message)
    }

    /// A `NotFound` error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// A `Conflict` error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// An `Unauthorized` error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// An `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    /// Returns the error code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_includes_code_and_message() {
        let err = Error::not_found("token not found");
        assert_eq!(err.to_string(), "[not_found] token not found");
    }

    #[test]
    fn helper_constructors_set_codes() {
        assert_eq!(Error::invalid("x").code(), ErrorCode::Invalid);
        assert_eq!(Error::not_found("x").code(), ErrorCode::NotFound);
        assert_eq!(Error::conflict("x").code(), ErrorCode::Conflict);
        assert_eq!(Error::unauthorized("x").code(), ErrorCode::Unauthorized);
        assert_eq!(Error::internal("x").code(), ErrorCode::Internal);
    }

    #[test]
    fn error_code_wire_names() {
        assert_eq!(ErrorCode::Invalid.as_str(), "invalid");
        assert_eq!(ErrorCode::NotFound.as_str(), "not_found");
        assert_eq!(ErrorCode::Conflict.as_str(), "conflict");
        assert_eq!(ErrorCode::Unauthorized.as_str(), "unauthorized");
        assert_eq!(ErrorCode::Internal.as_str(), "internal");
    }

    #[test]
    fn message_accessor_returns_message_only() {
        let err = Error::conflict("duplicate email");
        assert_eq!(err.message(), "duplicate email");
    }
}
