//! Authentication routes for login, callback, logout, and status.

use axum::extract::{Extension, Query, State};
use axum::response::{IntoResponse, Redirect};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::SignedCookieJar;
use chrono::{DateTime, Utc};
use keywarden_access::{UserStore, find_token_by_secret, issue_token, link_identity, revoke_token};
use keywarden_core::{Error, ErrorCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::Duration as TimeDuration;

use super::middleware::{SESSION_COOKIE, resolve_secret};
use super::oidc::AuthState;
use super::{AppState, CookieKey};
use crate::db::{AuthIdentityRepository, TokenRepository, UserRepository};
use crate::error::ApiError;
use crate::tx::RequestTx;

/// Login state cookie name, carrying anti-forgery state across the
/// provider redirect.
const AUTH_STATE_COOKIE: &str = "auth_state";

/// How long a login attempt may take before its state cookie lapses.
const AUTH_STATE_TTL: TimeDuration = TimeDuration::minutes(10);

/// Query parameters for login initiation.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    /// Path to land on after a successful login.
    #[serde(rename = "returnTo")]
    return_to: Option<String>,
}

/// Query parameters for the OIDC callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// Serializable login state for cookie storage.
#[derive(Debug, Serialize, Deserialize)]
struct LoginState {
    csrf_token: String,
    pkce_verifier: String,
    nonce: String,
    return_to: Option<String>,
}

/// Initiates the OIDC login flow by redirecting to the identity provider.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: SignedCookieJar<CookieKey>,
    Query(query): Query<LoginQuery>,
) -> impl IntoResponse {
    let (auth_url, auth_state) = state.idp.authorization_url();

    let login_state = serde_json::to_string(&LoginState {
        csrf_token: auth_state.csrf_token,
        pkce_verifier: auth_state.pkce_verifier,
        nonce: auth_state.nonce,
        return_to: query.return_to,
    })
    .expect("serialize login state");

    let cookie = Cookie::build((AUTH_STATE_COOKIE, login_state))
        .path("/")
        .http_only(true)
        .secure(state.session.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(AUTH_STATE_TTL);

    (jar.add(cookie), Redirect::to(&auth_url))
}

/// Handles the OIDC callback after the user authenticates with the
/// identity provider.
///
/// On success the browser gets a signed session cookie holding the fresh
/// token secret and a redirect to the stashed return path. Every database
/// write here rides the request transaction; the redirect status commits
/// it, and any error response rolls the whole login back.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
    Extension(tx): Extension<RequestTx>,
    jar: SignedCookieJar<CookieKey>,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(provider_error) = &query.error {
        return Err(Error::invalid(format!("provider error: {provider_error}")).into());
    }

    let state_cookie = jar
        .get(AUTH_STATE_COOKIE)
        .ok_or_else(|| Error::invalid("missing login state"))?;
    let login_state: LoginState = serde_json::from_str(state_cookie.value())
        .map_err(|_| Error::invalid("invalid login state"))?;

    let state_param = query
        .state
        .as_deref()
        .ok_or_else(|| Error::invalid("missing state parameter"))?;
    if state_param != login_state.csrf_token {
        return Err(Error::invalid("state mismatch").into());
    }

    let code = query
        .code
        .as_deref()
        .ok_or_else(|| Error::invalid("missing code parameter"))?;

    let auth_state = AuthState {
        csrf_token: login_state.csrf_token,
        pkce_verifier: login_state.pkce_verifier,
        nonce: login_state.nonce,
    };

    let profile = state
        .idp
        .exchange_code(code, &auth_state)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "token exchange failed");
            Error::internal("authentication failed")
        })?;
    profile.validate()?;
    if !profile.email_verified {
        tracing::warn!(subject = %profile.subject, "provider reports unverified email");
    }

    let now = Utc::now();
    let users = UserRepository::new(tx.clone());
    let identities = AuthIdentityRepository::new(tx.clone());
    let tokens = TokenRepository::new(tx);

    let (mut user, identity) = link_identity(
        &users,
        &identities,
        state.idp.provider(),
        &profile.subject,
        &profile.email,
        now,
    )
    .await?;

    // Refresh profile fields from the provider's claims and record the
    // login.
    user.set_first_name(profile.given_name, now);
    user.set_last_name(profile.family_name, now);
    user.set_avatar_url(profile.picture, now);
    user.touch_last_login(now);
    users.update_user(&user).await?;

    let token = issue_token(
        &tokens,
        user.id(),
        identity.id(),
        state.session.token_lifetime(),
        now,
    )
    .await?;
    let secret = token
        .plain_text()
        .ok_or_else(|| Error::internal("issued token has no plaintext"))?
        .to_string();

    tracing::info!(user_id = %user.id(), "login completed");

    let jar = jar
        .add(session_cookie(secret, state.session.secure_cookies))
        .remove(Cookie::build((AUTH_STATE_COOKIE, "")).path("/"));

    let destination = sanitize_return_to(login_state.return_to.as_deref());
    Ok((jar, Redirect::to(&destination)))
}

/// Logs out by revoking the presented token.
///
/// Revocation failures are logged, not surfaced: the session cookie is
/// cleared regardless, and the redirect status lets the delete commit.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(tx): Extension<RequestTx>,
    headers: axum::http::HeaderMap,
    jar: SignedCookieJar<CookieKey>,
) -> impl IntoResponse {
    if let Some(secret) = resolve_secret(&headers, &state.cookie_key) {
        let tokens = TokenRepository::new(tx);
        match find_token_by_secret(&tokens, &secret).await {
            Ok(token) => {
                if let Err(err) = revoke_token(&tokens, token.id()).await {
                    tracing::warn!(error = %err, token_id = %token.id(), "failed to revoke token on logout");
                }
            }
            Err(err) if err.code() == ErrorCode::NotFound => {}
            Err(err) => {
                tracing::warn!(error = %err, "failed to resolve token on logout");
            }
        }
    }

    let jar = jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/"));
    (jar, Redirect::to("/"))
}

/// Authentication status as seen by the presented credential.
#[derive(Debug, Serialize)]
pub struct AuthStatus {
    #[serde(rename = "IsAuthenticated")]
    pub is_authenticated: bool,
    #[serde(rename = "Expiry")]
    pub expiry: Option<DateTime<Utc>>,
    #[serde(rename = "UserID")]
    pub user_id: Option<String>,
}

impl AuthStatus {
    fn unauthenticated() -> Self {
        Self {
            is_authenticated: false,
            expiry: None,
            user_id: None,
        }
    }
}

/// Reports whether the presented credential is currently valid.
///
/// A probe, not a use: the token's expiry window does not slide here.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Extension(tx): Extension<RequestTx>,
    headers: axum::http::HeaderMap,
) -> Json<AuthStatus> {
    let Some(secret) = resolve_secret(&headers, &state.cookie_key) else {
        return Json(AuthStatus::unauthenticated());
    };

    let tokens = TokenRepository::new(tx);
    match find_token_by_secret(&tokens, &secret).await {
        Ok(token) if !token.is_expired(Utc::now()) => Json(AuthStatus {
            is_authenticated: true,
            expiry: Some(token.expires_at()),
            user_id: Some(token.user_id().to_string()),
        }),
        Ok(_) => Json(AuthStatus::unauthenticated()),
        Err(err) => {
            if err.code() != ErrorCode::NotFound {
                tracing::warn!(error = %err, "status token lookup failed");
            }
            Json(AuthStatus::unauthenticated())
        }
    }
}

/// Builds the session cookie carrying the token secret.
///
/// No `Max-Age`: the server-side expiry slides on every authenticated
/// request, so a client-side cap would cut renewed sessions short. The
/// cookie lives as long as the browser session; the token record decides
/// validity.
fn session_cookie(secret: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, secret))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Restricts the post-login redirect to same-site paths.
fn sanitize_return_to(return_to: Option<&str>) -> String {
    match return_to {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path.to_string(),
        _ => "/".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_to_defaults_to_root() {
        assert_eq!(sanitize_return_to(None), "/");
        assert_eq!(sanitize_return_to(Some("")), "/");
    }

    #[test]
    fn return_to_keeps_local_paths() {
        assert_eq!(sanitize_return_to(Some("/dashboard")), "/dashboard");
        assert_eq!(sanitize_return_to(Some("/a/b?c=d")), "/a/b?c=d");
    }

    #[test]
    fn return_to_rejects_external_targets() {
        assert_eq!(sanitize_return_to(Some("https://evil.example")), "/");
        assert_eq!(sanitize_return_to(Some("//evil.example")), "/");
    }

    #[test]
    fn session_cookie_has_no_client_side_expiry() {
        let cookie = session_cookie("secret-value".to_string(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert!(cookie.max_age().is_none());
        assert!(cookie.expires().is_none());
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }

    #[test]
    fn status_body_uses_wire_casing() {
        let status = AuthStatus::unauthenticated();
        let json = serde_json::to_value(&status).expect("serialize");
        assert_eq!(json["IsAuthenticated"], false);
        assert!(json["Expiry"].is_null());
        assert!(json["UserID"].is_null());
    }

    #[test]
    fn login_state_roundtrips_through_json() {
        let state = LoginState {
            csrf_token: "csrf".to_string(),
            pkce_verifier: "pkce".to_string(),
            nonce: "nonce".to_string(),
            return_to: Some("/after".to_string()),
        };
        let json = serde_json::to_string(&state).expect("serialize");
        let parsed: LoginState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.csrf_token, "csrf");
        assert_eq!(parsed.return_to.as_deref(), Some("/after"));
    }
}
