//! Bearer injection with one re-login on 401
//!
//! Every API call goes through `AuthenticatedRequestGuard::send`:
//! 1. attach `Authorization: Bearer <token>` from the session
//! 2. send
//! 3. on 401, force a fresh login and send once more with the new token
//! 4. a second 401 is an authentication failure; there is no third attempt
//!
//! Other error statuses are returned untouched for the caller to map.

use std::sync::Arc;

use hyperoptic_auth::{AuthSession, bearer};
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Wraps outbound API requests with the session's access token.
#[derive(Clone)]
pub struct AuthenticatedRequestGuard {
    session: Arc<AuthSession>,
}

impl AuthenticatedRequestGuard {
    pub fn new(session: Arc<AuthSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    /// Send the request produced by `build` with a bearer token.
    ///
    /// `build` is called again for the retry, so it must produce the same
    /// request each time.
    pub async fn send<F>(&self, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let token = self.session.ensure_token().await?;
        let response = send_with(&build, &token).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        info!(url = %response.url(), "API rejected access token, re-authenticating");
        let token = self.session.force_reauthenticate(&token).await?;
        let retry = send_with(&build, &token).await?;
        if retry.status() == StatusCode::UNAUTHORIZED {
            warn!(url = %retry.url(), "API rejected freshly issued token");
            return Err(Error::Auth(hyperoptic_auth::Error::Authentication {
                status: Some(StatusCode::UNAUTHORIZED.as_u16()),
                code: None,
                detail: format!("API rejected a freshly issued token for {}", retry.url()),
            }));
        }
        Ok(retry)
    }
}

async fn send_with<F>(build: &F, token: &str) -> Result<reqwest::Response>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    build()
        .header(AUTHORIZATION, bearer(token)?)
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))
}
