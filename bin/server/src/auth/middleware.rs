//! Authentication middleware and extractors for Axum.

use axum::extract::{FromRequestParts, Request, State};
use axum::http::{HeaderMap, Method, header, request::Parts};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::Key;
use axum_extra::extract::SignedCookieJar;
use chrono::Utc;
use keywarden_access::{Token, User, UserStore, find_token_by_secret, renew_token};
use keywarden_core::{Error, ErrorCode};
use std::sync::Arc;

use super::AppState;
use crate::db::{TokenRepository, UserRepository};
use crate::error::ApiError;
use crate::tx::RequestTx;

/// Session cookie name. The signed value is the token secret itself.
pub const SESSION_COOKIE: &str = "session";

/// Paths reachable without a credential: the login flow itself plus the
/// status probe. CORS preflight requests are also exempt.
const SKIP_PATHS: [&str; 4] = ["/auth", "/auth/login", "/auth/callback", "/auth/logout"];

/// The authenticated principal, attached to the request scope by the
/// middleware.
#[derive(Clone)]
pub struct CurrentUser(pub User);

/// The validated (and renewed) token for the current request.
#[derive(Clone)]
pub struct CurrentToken(pub Token);

/// Returns true if the request may pass without authentication.
#[must_use]
pub fn skip_authn(method: &Method, path: &str) -> bool {
    *method == Method::OPTIONS || SKIP_PATHS.contains(&path)
}

/// Extracts a bearer secret from the `Authorization` header.
fn bearer_secret(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolves the candidate secret: signed session cookie first, then the
/// `Authorization: Bearer` header.
pub(crate) fn resolve_secret(headers: &HeaderMap, key: &Key) -> Option<String> {
    let jar = SignedCookieJar::from_headers(headers, key.clone());
    jar.get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| bearer_secret(headers).map(str::to_string))
}

/// Validates the request's credential and attaches the principal.
///
/// On success the token's expiry window slides forward and
/// [`CurrentToken`] / [`CurrentUser`] appear in the request scope. All
/// authentication failures are an undifferentiated 401; a caller learns
/// nothing about whether the secret was unknown or merely expired.
pub async fn authn_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if skip_authn(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    let Some(secret) = resolve_secret(req.headers(), &state.cookie_key) else {
        return ApiError::not_authorized().into_response();
    };

    let Some(tx) = req.extensions().get::<RequestTx>().cloned() else {
        return ApiError::from(Error::internal("no transaction bound to request"))
            .into_response();
    };

    let tokens = TokenRepository::new(tx.clone());
    let now = Utc::now();

    let token = match find_token_by_secret(&tokens, &secret).await {
        Ok(token) => token,
        Err(err) if err.code() == ErrorCode::NotFound => {
            return ApiError::not_authorized().into_response();
        }
        Err(err) => return ApiError::from(err).into_response(),
    };

    if token.is_expired(now) {
        // The 401 rolls the request transaction back, so the revocation
        // runs detached on the pool.
        if let Err(err) = TokenRepository::revoke_detached(&state.db_pool, token.id()).await {
            tracing::warn!(error = %err, token_id = %token.id(), "failed to revoke expired token");
        }
        return ApiError::not_authorized().into_response();
    }

    let token = match renew_token(&tokens, token.id(), state.session.token_lifetime(), now).await {
        Ok(token) => token,
        // Revoked between lookup and renewal; same undifferentiated 401.
        Err(err) if err.code() == ErrorCode::NotFound => {
            return ApiError::not_authorized().into_response();
        }
        Err(err) => return ApiError::from(err).into_response(),
    };

    let users = UserRepository::new(tx);
    let user = match users.find_user_by_id(token.user_id()).await {
        Ok(user) => user,
        Err(err) if err.code() == ErrorCode::NotFound => {
            return ApiError::not_authorized().into_response();
        }
        Err(err) => return ApiError::from(err).into_response(),
    };

    req.extensions_mut().insert(CurrentToken(token));
    req.extensions_mut().insert(CurrentUser(user));

    next.run(req).await
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(ApiError::not_authorized)
    }
}

impl<S> FromRequestParts<S> for CurrentToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentToken>()
            .cloned()
            .ok_or_else(ApiError::not_authorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn login_flow_paths_skip_authentication() {
        for path in ["/auth", "/auth/login", "/auth/callback", "/auth/logout"] {
            assert!(skip_authn(&Method::GET, path), "{path} should be exempt");
        }
    }

    #[test]
    fn other_paths_require_authentication() {
        assert!(!skip_authn(&Method::GET, "/"));
        assert!(!skip_authn(&Method::GET, "/auth/other"));
        assert!(!skip_authn(&Method::POST, "/api/items"));
    }

    #[test]
    fn preflight_requests_skip_authentication() {
        assert!(skip_authn(&Method::OPTIONS, "/api/items"));
    }

    #[test]
    fn bearer_header_yields_secret() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer some-secret"),
        );
        assert_eq!(bearer_secret(&headers), Some("some-secret"));
    }

    #[test]
    fn non_bearer_authorization_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Basic dXNlcjpwYXNz"),
        );
        assert_eq!(bearer_secret(&headers), None);
        assert_eq!(bearer_secret(&HeaderMap::new()), None);
    }

    #[test]
    fn tampered_session_cookie_is_rejected() {
        let key = Key::derive_from(&[7u8; 64]);
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("session=forged-value"),
        );
        assert_eq!(resolve_secret(&headers, &key), None);
    }
}
