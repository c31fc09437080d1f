//! HTTP error surface.
//!
//! Handlers return [`ApiError`]; the conversion to a response decides how
//! much of the underlying error the client gets to see. Authentication
//! failures are a generic 401, conflicts and internal failures a generic
//! 500, with full detail retained only in server-side logs.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keywarden_core::{Error, ErrorCode};
use serde::Serialize;

/// JSON error body sent to clients.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    #[serde(rename = "Error")]
    pub error: String,
}

/// A domain error crossing the HTTP boundary.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// A bare 401 with the canonical body.
    #[must_use]
    pub fn not_authorized() -> Self {
        Self(Error::unauthorized("not authorized"))
    }
}

/// Maps an error code to the response status and client-visible message.
fn status_and_message(err: &Error) -> (StatusCode, String) {
    match err.code() {
        ErrorCode::Unauthorized => (StatusCode::UNAUTHORIZED, "not authorized".to_string()),
        ErrorCode::Invalid => (StatusCode::BAD_REQUEST, err.message().to_string()),
        ErrorCode::NotFound => (StatusCode::NOT_FOUND, err.message().to_string()),
        ErrorCode::Conflict | ErrorCode::Internal => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = status_and_message(&self.0);
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_generic_401() {
        let (status, message) = status_and_message(&Error::unauthorized("token expired"));
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(message, "not authorized");
    }

    #[test]
    fn conflict_detail_is_not_exposed() {
        let (status, message) = status_and_message(&Error::conflict("multiple users share email"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "internal server error");
    }

    #[test]
    fn invalid_keeps_its_message() {
        let (status, message) = status_and_message(&Error::invalid("missing state parameter"));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "missing state parameter");
    }

    #[test]
    fn error_body_uses_wire_casing() {
        let body = ErrorBody {
            error: "not authorized".to_string(),
        };
        assert_eq!(
            serde_json::to_string(&body).expect("serialize"),
            r#"{"Error":"not authorized"}"#
        );
    }
}
