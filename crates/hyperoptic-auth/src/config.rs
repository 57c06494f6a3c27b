//! Session configuration
//!
//! Precedence is decided by the caller: `AuthConfig::new` starts from the
//! deployment defaults in `constants`, the `with_*` methods apply explicit
//! overrides, and `from_env` / `apply_env` overlay `HYPEROPTIC_*` variables.
//! There is no process-wide credential state; every session owns its config.

use std::time::Duration;

use common::Secret;

use crate::constants::{
    AUTH_BASE_URL, AUTH_PATH, CLIENT_ID, DEFAULT_ACCESS_SKEW, DEFAULT_REQUEST_TIMEOUT,
    MAX_ACCESS_SKEW, REDIRECT_URI, SCOPES, TOKEN_PATH,
};

pub const ENV_EMAIL: &str = "HYPEROPTIC_EMAIL";
pub const ENV_PASSWORD: &str = "HYPEROPTIC_PASSWORD";
pub const ENV_AUTH_BASE_URL: &str = "HYPEROPTIC_AUTH_BASE_URL";
pub const ENV_CLIENT_ID: &str = "HYPEROPTIC_CLIENT_ID";
pub const ENV_REDIRECT_URI: &str = "HYPEROPTIC_REDIRECT_URI";
pub const ENV_TOKEN_SKEW_SECS: &str = "HYPEROPTIC_TOKEN_SKEW_SECS";

/// Everything an `AuthSession` needs to talk to the authorization server.
///
/// `Debug` is safe to log: the password is a `Secret`.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub auth_base_url: String,
    pub token_path: String,
    pub auth_path: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: String,
    pub email: String,
    pub password: Secret<String>,
    /// Safety margin subtracted from the access token lifetime
    pub access_skew: Duration,
    pub request_timeout: Duration,
}

impl AuthConfig {
    /// Config for the given credentials with all deployment defaults.
    pub fn new(email: impl Into<String>, password: impl Into<Secret<String>>) -> Self {
        Self {
            auth_base_url: AUTH_BASE_URL.to_string(),
            token_path: TOKEN_PATH.to_string(),
            auth_path: AUTH_PATH.to_string(),
            client_id: CLIENT_ID.to_string(),
            redirect_uri: REDIRECT_URI.to_string(),
            scopes: SCOPES.to_string(),
            email: email.into(),
            password: password.into(),
            access_skew: DEFAULT_ACCESS_SKEW,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Build from `HYPEROPTIC_EMAIL` / `HYPEROPTIC_PASSWORD` plus any
    /// optional overrides present in the environment.
    pub fn from_env() -> common::Result<Self> {
        let email = common::require_env(ENV_EMAIL)?;
        let password = common::require_env(ENV_PASSWORD)?;
        Self::new(email, password).apply_env()
    }

    /// Overlay the optional `HYPEROPTIC_*` variables onto this config.
    ///
    /// Credentials are only replaced when both halves are set, so a stray
    /// `HYPEROPTIC_EMAIL` cannot pair with a password meant for another account.
    pub fn apply_env(mut self) -> common::Result<Self> {
        if let (Some(email), Some(password)) =
            (common::env_var(ENV_EMAIL), common::env_var(ENV_PASSWORD))
        {
            self.email = email;
            self.password = Secret::new(password);
        }
        if let Some(url) = common::env_var(ENV_AUTH_BASE_URL) {
            self.auth_base_url = url;
        }
        if let Some(client_id) = common::env_var(ENV_CLIENT_ID) {
            self.client_id = client_id;
        }
        if let Some(redirect) = common::env_var(ENV_REDIRECT_URI) {
            self.redirect_uri = redirect;
        }
        if let Some(secs) = common::env_u64(ENV_TOKEN_SKEW_SECS)? {
            self.access_skew = Duration::from_secs(secs);
        }
        Ok(self)
    }

    pub fn with_auth_base_url(mut self, url: impl Into<String>) -> Self {
        self.auth_base_url = url.into();
        self
    }

    pub fn with_token_path(mut self, path: impl Into<String>) -> Self {
        self.token_path = path.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_redirect_uri(mut self, redirect_uri: impl Into<String>) -> Self {
        self.redirect_uri = redirect_uri.into();
        self
    }

    pub fn with_access_skew(mut self, skew: Duration) -> Self {
        self.access_skew = skew;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Absolute token endpoint URL.
    pub fn token_url(&self) -> String {
        join_url(&self.auth_base_url, &self.token_path)
    }

    /// Absolute authorization endpoint URL.
    pub fn auth_url(&self) -> String {
        join_url(&self.auth_base_url, &self.auth_path)
    }

    /// Reject configs that can never authenticate.
    pub fn validate(&self) -> common::Result<()> {
        if !self.auth_base_url.starts_with("http://") && !self.auth_base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "auth_base_url must start with http:// or https://, got: {}",
                self.auth_base_url
            )));
        }
        if self.email.trim().is_empty() {
            return Err(common::Error::Config("email must not be empty".into()));
        }
        if self.password.is_empty() {
            return Err(common::Error::Config("password must not be empty".into()));
        }
        if self.request_timeout.is_zero() {
            return Err(common::Error::Config(
                "request_timeout must be greater than 0".into(),
            ));
        }
        if self.access_skew > MAX_ACCESS_SKEW {
            return Err(common::Error::Config(format!(
                "access_skew must be at most {}s, got: {}s",
                MAX_ACCESS_SKEW.as_secs(),
                self.access_skew.as_secs()
            )));
        }
        Ok(())
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
