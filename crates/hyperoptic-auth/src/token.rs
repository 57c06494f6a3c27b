//! Token endpoint calls and the cached token set
//!
//! All three grants (password, refresh_token, authorization_code) POST a
//! form to the realm's token endpoint and share one response schema. A
//! successful response is turned into an immutable `TokenSet`; refreshing
//! always builds a new set, it never edits the old one.

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::constants::{DEFAULT_ACCESS_TTL_SECS, DEFAULT_REFRESH_TTL_SECS, MAX_TOKEN_TTL};
use crate::error::{Error, Result};

/// Token endpoint success payload.
///
/// Lifetimes are deltas in seconds from the response time. Keycloak sends
/// both; the defaults only cover servers that leave them out.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Absent when the server does not rotate the refresh token.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default = "default_access_ttl")]
    pub expires_in: u64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_expires_in: u64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_access_ttl() -> u64 {
    DEFAULT_ACCESS_TTL_SECS
}

fn default_refresh_ttl() -> u64 {
    DEFAULT_REFRESH_TTL_SECS
}

/// OAuth2 error body (`{"error": "...", "error_description": "..."}`).
#[derive(Debug, Default, Deserialize)]
struct TokenErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

/// Tokens from one successful login or refresh, with expiry instants
/// computed from the local clock at parse time.
#[derive(Clone)]
pub struct TokenSet {
    access_token: String,
    refresh_token: Option<String>,
    token_type: String,
    issued_at: Instant,
    access_ttl: Duration,
    refresh_ttl: Duration,
    access_expires_at: Instant,
    refresh_expires_at: Instant,
}

impl TokenSet {
    /// Build a token set from a token endpoint response received at `issued_at`.
    ///
    /// When the response carries no refresh token, the one from `previous` is
    /// kept together with its original expiry, as long as it is still valid
    /// at `issued_at`.
    pub fn from_response(
        response: TokenResponse,
        issued_at: Instant,
        previous: Option<&TokenSet>,
    ) -> Self {
        let access_ttl = Duration::from_secs(response.expires_in).min(MAX_TOKEN_TTL);
        let refresh_ttl = Duration::from_secs(response.refresh_expires_in).min(MAX_TOKEN_TTL);

        let (refresh_token, refresh_expires_at) = match response.refresh_token {
            Some(rotated) => (Some(rotated), expiry(issued_at, refresh_ttl)),
            None => match previous {
                Some(prev) if prev.refresh_token.is_some() && prev.is_refresh_valid(issued_at) => {
                    (prev.refresh_token.clone(), prev.refresh_expires_at)
                }
                _ => (None, issued_at),
            },
        };

        Self {
            access_token: response.access_token,
            refresh_token,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            issued_at,
            access_ttl,
            refresh_ttl,
            access_expires_at: expiry(issued_at, access_ttl),
            refresh_expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn access_expires_at(&self) -> Instant {
        self.access_expires_at
    }

    pub fn refresh_expires_at(&self) -> Instant {
        self.refresh_expires_at
    }

    /// True iff `now + skew < access_expires_at`.
    /// A skew too large to add to `now` makes the token stale.
    pub fn is_access_valid(&self, now: Instant, skew: Duration) -> bool {
        now.checked_add(skew)
            .is_some_and(|deadline| deadline < self.access_expires_at)
    }

    /// True iff `now < refresh_expires_at`.
    pub fn is_refresh_valid(&self, now: Instant) -> bool {
        now < self.refresh_expires_at
    }
}

/// `issued_at + ttl`; an instant the platform cannot represent counts as
/// already expired.
fn expiry(issued_at: Instant, ttl: Duration) -> Instant {
    issued_at.checked_add(ttl).unwrap_or(issued_at)
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("token_type", &self.token_type)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// Resource Owner Password Credentials grant.
pub async fn password_grant(
    client: &reqwest::Client,
    config: &AuthConfig,
) -> Result<TokenResponse> {
    post_token(
        client,
        config,
        &[
            ("grant_type", "password"),
            ("client_id", config.client_id.as_str()),
            ("username", config.email.as_str()),
            ("password", config.password.expose().as_str()),
            ("scope", config.scopes.as_str()),
        ],
    )
    .await
}

/// Refresh token grant.
pub async fn refresh_grant(
    client: &reqwest::Client,
    config: &AuthConfig,
    refresh: &str,
) -> Result<TokenResponse> {
    post_token(
        client,
        config,
        &[
            ("grant_type", "refresh_token"),
            ("client_id", config.client_id.as_str()),
            ("refresh_token", refresh),
        ],
    )
    .await
}

/// Exchange an authorization code plus its PKCE verifier for tokens.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &AuthConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    post_token(
        client,
        config,
        &[
            ("grant_type", "authorization_code"),
            ("client_id", config.client_id.as_str()),
            ("code", code),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ],
    )
    .await
}

/// POST a grant form to the token endpoint. Only HTTP 200 with a parseable,
/// non-empty access token counts as success.
async fn post_token(
    client: &reqwest::Client,
    config: &AuthConfig,
    form: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = client
        .post(config.token_url())
        .form(form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token request failed: {e}")))?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        // The body is only mined for the OAuth error fields; anything else
        // (HTML error pages, proxies) is dropped rather than echoed.
        let body = response.text().await.unwrap_or_default();
        let parsed: TokenErrorBody = serde_json::from_str(&body).unwrap_or_default();
        return Err(Error::TokenEndpoint {
            status: status.as_u16(),
            code: parsed.error,
            description: parsed.error_description,
        });
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::InvalidResponse(format!("malformed token payload: {e}")))?;

    if token.access_token.is_empty() {
        return Err(Error::InvalidResponse("empty access_token".into()));
    }
    Ok(token)
}
