//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.

use serde::Deserialize;

/// Server configuration composed from section configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// PostgreSQL database connection URL.
    pub database_url: String,

    /// Address to listen on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Session configuration.
    pub session: SessionConfig,

    /// OIDC authentication configuration.
    pub oidc: OidcConfig,
}

/// Session and token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Secret used to sign session cookies. Required; there is no safe
    /// default for a signing key.
    pub secret: String,

    /// Token lifetime in hours. Sliding: each authenticated request pushes
    /// the expiry this far past the moment of use.
    #[serde(default = "default_token_lifetime_hours")]
    pub token_lifetime_hours: i64,

    /// Interval between expired-token cleanup runs, in seconds.
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Defaults to true for production safety; set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

/// OIDC provider configuration. All provider fields are required; a server
/// that cannot complete a login flow must fail at startup, not at the first
/// callback.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcConfig {
    /// Short provider name recorded on linked identities, e.g. "google".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Issuer URL used for provider metadata discovery.
    pub issuer_url: String,

    /// OAuth client ID.
    pub client_id: String,

    /// OAuth client secret.
    pub client_secret: String,

    /// Redirect URI registered with the provider.
    pub redirect_uri: String,

    /// Scopes to request beyond "openid".
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_token_lifetime_hours() -> i64 {
    24
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

fn default_secure_cookies() -> bool {
    true
}

fn default_provider() -> String {
    "google".to_string()
}

fn default_scopes() -> Vec<String> {
    vec!["email".to_string(), "profile".to_string()]
}

impl SessionConfig {
    /// Returns the sliding token lifetime as a duration.
    #[must_use]
    pub fn token_lifetime(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_lifetime_hours)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_config_applies_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"secret": "test-signing-secret"}"#).expect("deserialize");
        assert_eq!(config.token_lifetime_hours, 24);
        assert_eq!(config.cleanup_interval_seconds, 300);
        assert!(config.secure_cookies);
    }

    #[test]
    fn session_config_requires_secret() {
        let result = serde_json::from_str::<SessionConfig>("{}");
        assert!(result.is_err());
    }

    #[test]
    fn oidc_config_requires_provider_fields() {
        let result = serde_json::from_str::<OidcConfig>(r#"{"issuer_url": "https://issuer"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn token_lifetime_is_hours() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"secret": "s", "token_lifetime_hours": 2}"#)
                .expect("deserialize");
        assert_eq!(config.token_lifetime(), chrono::Duration::hours(2));
    }
}
