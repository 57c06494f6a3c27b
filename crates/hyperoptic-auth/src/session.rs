//! Authenticated session against the Hyperoptic Keycloak realm
//!
//! `AuthSession` owns the current `TokenSet` and hands out access tokens on
//! demand. Tokens are renewed lazily, on the next `ensure_token` call:
//! - valid cached access token: returned as-is, no network call
//! - stale access token, live refresh token: refresh grant
//! - refresh missing, expired or rejected: full login
//!
//! Login tries each `GrantStrategy` in order and keeps the first success.
//!
//! All renewals run under one tokio Mutex, so at most one login or refresh
//! is in flight per session. A generation counter, bumped after every
//! attempt, lets callers that queued behind an attempt adopt its outcome
//! instead of repeating it. That matters for refresh token rotation: a
//! rotated token presented twice is rejected the second time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::browser;
use crate::config::AuthConfig;
use crate::constants::{ORIGIN, REFERER, USER_AGENT};
use crate::error::{Error, Result};
use crate::state::{self, AuthEvent, AuthState};
use crate::token::{self, TokenResponse, TokenSet};

/// Ways of obtaining a fresh token set with the account credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantStrategy {
    /// `grant_type=password` straight to the token endpoint
    Password,
    /// Emulated browser login plus `grant_type=authorization_code` with PKCE
    BrowserPkce,
}

impl GrantStrategy {
    /// Order in which login tries the strategies. Password first: it is one
    /// round-trip, and only some realms disable it.
    pub const ORDER: [GrantStrategy; 2] = [GrantStrategy::Password, GrantStrategy::BrowserPkce];

    pub fn label(&self) -> &'static str {
        match self {
            GrantStrategy::Password => "password",
            GrantStrategy::BrowserPkce => "browser_pkce",
        }
    }
}

#[derive(Default)]
struct Inner {
    tokens: Option<TokenSet>,
    last_strategy: Option<GrantStrategy>,
    /// Outcome of the most recent login, shared with callers that waited on it
    last_failure: Option<Error>,
}

/// Session holding the credentials and the current token set.
///
/// Create one per account and share it (e.g. behind an `Arc`) across all
/// requests. Dropping it releases the HTTP client; nothing runs in the
/// background and nothing is sent to the server on release.
pub struct AuthSession {
    config: AuthConfig,
    http: reqwest::Client,
    inner: Mutex<Inner>,
    generation: AtomicU64,
    state: RwLock<AuthState>,
}

impl AuthSession {
    /// Create a session with its own browser-like HTTP client. No network
    /// call is made until the first token is requested.
    pub fn new(config: AuthConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Config(e.to_string()))?;
        let http = build_http_client(&config)?;
        Ok(Self::with_http_client(config, http))
    }

    /// Create a session around an existing client. The client must not follow
    /// redirects and should keep cookies, or the browser flow cannot work.
    pub fn with_http_client(config: AuthConfig, http: reqwest::Client) -> Self {
        Self {
            config,
            http,
            inner: Mutex::new(Inner::default()),
            generation: AtomicU64::new(0),
            state: RwLock::new(AuthState::NoToken),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Current phase of the session.
    pub fn state(&self) -> AuthState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the cached token set, if any.
    pub async fn tokens(&self) -> Option<TokenSet> {
        self.inner.lock().await.tokens.clone()
    }

    /// Strategy behind the most recent successful login.
    pub async fn last_strategy(&self) -> Option<GrantStrategy> {
        self.inner.lock().await.last_strategy
    }

    /// Return a valid access token, refreshing or logging in as needed.
    ///
    /// Fails with `Error::Authentication` only when every way of obtaining a
    /// token failed. A failure leaves the session in `NoToken`; the next call
    /// starts over with a fresh login.
    pub async fn ensure_token(&self) -> Result<String> {
        let observed = self.generation.load(Ordering::Acquire);
        let mut inner = self.inner.lock().await;

        if let Some(outcome) = self.adopt_concurrent(&inner, observed) {
            return outcome;
        }

        if let Some(tokens) = inner.tokens.as_ref()
            && tokens.is_access_valid(Instant::now(), self.config.access_skew)
        {
            debug!("using cached access token");
            return Ok(tokens.access_token().to_owned());
        }

        let result = self.renew(&mut inner).await;
        self.generation.fetch_add(1, Ordering::Release);
        result
    }

    /// `Authorization: Bearer <token>` for the current access token.
    pub async fn authorization_header(&self) -> Result<HeaderMap> {
        let token = self.ensure_token().await?;
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, bearer(&token)?);
        Ok(headers)
    }

    /// Discard the cached tokens and log in from scratch.
    ///
    /// For callers whose token `rejected` was just refused by the API. If
    /// another caller finished a login or refresh while this one waited for
    /// the lock, or the cached token already differs from `rejected`, that
    /// token is returned instead of logging in again.
    pub async fn force_reauthenticate(&self, rejected: &str) -> Result<String> {
        let observed = self.generation.load(Ordering::Acquire);
        let mut inner = self.inner.lock().await;

        if let Some(outcome) = self.adopt_concurrent(&inner, observed) {
            return outcome;
        }
        if let Some(tokens) = inner.tokens.as_ref()
            && tokens.access_token() != rejected
            && tokens.is_access_valid(Instant::now(), self.config.access_skew)
        {
            debug!("rejected token already replaced, reusing the newer one");
            return Ok(tokens.access_token().to_owned());
        }

        info!("forcing re-authentication");
        inner.tokens = None;
        self.transition(AuthEvent::Invalidated);

        let result = self.login(&mut inner).await;
        self.generation.fetch_add(1, Ordering::Release);
        result
    }

    /// Drop the cached tokens. Local only: nothing is revoked server-side.
    pub async fn close(&self) {
        let mut inner = self.inner.lock().await;
        inner.tokens = None;
        inner.last_failure = None;
        self.transition(AuthEvent::Invalidated);
        debug!("session closed");
    }

    /// If an attempt completed while we waited for the lock, its outcome.
    fn adopt_concurrent(&self, inner: &Inner, observed: u64) -> Option<Result<String>> {
        if self.generation.load(Ordering::Acquire) == observed {
            return None;
        }
        if let Some(err) = &inner.last_failure {
            debug!("sharing failure of concurrent authentication attempt");
            return Some(Err(err.clone()));
        }
        inner.tokens.as_ref().map(|tokens| {
            debug!("sharing token from concurrent authentication attempt");
            Ok(tokens.access_token().to_owned())
        })
    }

    /// Refresh if the refresh token is usable, otherwise (or on failure) log in.
    async fn renew(&self, inner: &mut Inner) -> Result<String> {
        if let Some(previous) = inner.tokens.clone() {
            match previous.refresh_token() {
                Some(refresh) if previous.is_refresh_valid(Instant::now()) => {
                    match self.refresh(&previous, refresh).await {
                        Ok(tokens) => {
                            let access = tokens.access_token().to_owned();
                            inner.tokens = Some(tokens);
                            inner.last_failure = None;
                            return Ok(access);
                        }
                        Err(e) => {
                            warn!(error = %e, "token refresh failed, falling back to full login");
                        }
                    }
                }
                _ => debug!("refresh token missing or expired, performing full login"),
            }
        }
        self.login(inner).await
    }

    async fn refresh(&self, previous: &TokenSet, refresh: &str) -> Result<TokenSet> {
        self.transition(AuthEvent::RefreshStarted);
        match token::refresh_grant(&self.http, &self.config, refresh).await {
            Ok(response) => {
                let tokens = TokenSet::from_response(response, Instant::now(), Some(previous));
                metrics::counter!("hyperoptic_auth_refresh_total", "outcome" => "success")
                    .increment(1);
                self.transition(AuthEvent::Succeeded);
                debug!(
                    expires_in_secs = tokens.access_ttl().as_secs(),
                    "access token refreshed"
                );
                Ok(tokens)
            }
            Err(e) => {
                metrics::counter!("hyperoptic_auth_refresh_total", "outcome" => "failure")
                    .increment(1);
                self.transition(AuthEvent::RefreshFailed);
                Err(e)
            }
        }
    }

    /// Try every strategy in order; the first success replaces the token set.
    async fn login(&self, inner: &mut Inner) -> Result<String> {
        self.transition(AuthEvent::LoginStarted);

        let mut last_error = None;
        for strategy in GrantStrategy::ORDER {
            match self.attempt(strategy).await {
                Ok(response) => {
                    let tokens = TokenSet::from_response(response, Instant::now(), None);
                    let access = tokens.access_token().to_owned();
                    inner.tokens = Some(tokens);
                    inner.last_strategy = Some(strategy);
                    inner.last_failure = None;
                    metrics::counter!(
                        "hyperoptic_auth_logins_total",
                        "strategy" => strategy.label(),
                        "outcome" => "success"
                    )
                    .increment(1);
                    self.transition(AuthEvent::Succeeded);
                    info!(strategy = strategy.label(), "authenticated");
                    return Ok(access);
                }
                Err(e) => {
                    metrics::counter!(
                        "hyperoptic_auth_logins_total",
                        "strategy" => strategy.label(),
                        "outcome" => "failure"
                    )
                    .increment(1);
                    warn!(strategy = strategy.label(), error = %e, "grant strategy failed");
                    last_error = Some(e);
                }
            }
        }

        let err = Error::exhausted(last_error);
        inner.tokens = None;
        inner.last_failure = Some(err.clone());
        self.transition(AuthEvent::LoginFailed);
        Err(err)
    }

    async fn attempt(&self, strategy: GrantStrategy) -> Result<TokenResponse> {
        match strategy {
            GrantStrategy::Password => token::password_grant(&self.http, &self.config).await,
            GrantStrategy::BrowserPkce => browser::browser_login(&self.http, &self.config).await,
        }
    }

    fn transition(&self, event: AuthEvent) {
        let mut current = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let next = state::next(*current, event);
        if next != *current {
            debug!(from = current.label(), to = next.label(), "auth state transition");
        }
        *current = next;
    }
}

/// Sensitive `Bearer <token>` header value.
pub fn bearer(token: &str) -> Result<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
        Error::InvalidResponse(format!("access token is not a valid header value: {e}"))
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Headers the portal's browser sends with every request.
pub fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(reqwest::header::ORIGIN, HeaderValue::from_static(ORIGIN));
    headers.insert(reqwest::header::REFERER, HeaderValue::from_static(REFERER));
    headers
}

/// HTTP client for the authorization server: browser identity, cookie
/// store, manual redirects.
fn build_http_client(config: &AuthConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .default_headers(browser_headers())
        .redirect(reqwest::redirect::Policy::none())
        .cookie_store(true)
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| Error::Http(format!("building HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use mockito::{Matcher, Mock, Server, ServerGuard};

    fn session_for(server: &ServerGuard, skew: Duration) -> AuthSession {
        let config = AuthConfig::new("user@example.com", "secret")
            .with_auth_base_url(server.url())
            .with_access_skew(skew);
        AuthSession::new(config).unwrap()
    }

    fn token_body(access: &str, refresh: &str, expires_in: u64, refresh_expires_in: u64) -> String {
        serde_json::json!({
            "access_token": access,
            "refresh_token": refresh,
            "expires_in": expires_in,
            "refresh_expires_in": refresh_expires_in,
            "token_type": "Bearer",
        })
        .to_string()
    }

    async fn password_mock(server: &mut ServerGuard, status: usize, body: String, hits: usize) -> Mock {
        server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_status(status)
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    async fn refresh_mock(
        server: &mut ServerGuard,
        refresh: &str,
        status: usize,
        body: String,
        hits: usize,
    ) -> Mock {
        server
            .mock("POST", "/token")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
                Matcher::UrlEncoded("refresh_token".into(), refresh.into()),
            ]))
            .with_status(status)
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    async fn failing_login_page(server: &mut ServerGuard, hits: usize) -> Mock {
        server
            .mock("GET", "/auth")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn cached_token_is_reused_without_network() {
        let mut server = Server::new_async().await;
        let login = password_mock(&mut server, 200, token_body("A1", "R1", 300, 1800), 1).await;
        let session = session_for(&server, Duration::from_secs(30));

        assert_eq!(session.state(), AuthState::NoToken);
        let first = session.ensure_token().await.unwrap();
        let second = session.ensure_token().await.unwrap();

        assert_eq!(first, "A1");
        assert_eq!(first, second);
        assert_eq!(session.state(), AuthState::Authenticated);
        assert_eq!(session.last_strategy().await, Some(GrantStrategy::Password));
        login.assert_async().await;
    }

    #[tokio::test]
    async fn stale_access_token_triggers_exactly_one_refresh() {
        let mut server = Server::new_async().await;
        let login = password_mock(&mut server, 200, token_body("A1", "R1", 300, 1800), 1).await;
        let refresh =
            refresh_mock(&mut server, "R1", 200, token_body("A2", "R2", 300, 1800), 1).await;
        // skew beyond expires_in: every access token is stale on arrival
        let session = session_for(&server, Duration::from_secs(400));

        assert_eq!(session.ensure_token().await.unwrap(), "A1");
        assert_eq!(session.ensure_token().await.unwrap(), "A2");

        let tokens = session.tokens().await.unwrap();
        assert_eq!(tokens.refresh_token(), Some("R2"));
        assert_eq!(session.state(), AuthState::Authenticated);
        login.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_refresh_falls_back_to_login() {
        let mut server = Server::new_async().await;
        let login = password_mock(&mut server, 200, token_body("A1", "R1", 300, 1800), 2).await;
        let refresh = refresh_mock(
            &mut server,
            "R1",
            400,
            r#"{"error":"invalid_grant","error_description":"Token is not active"}"#.into(),
            1,
        )
        .await;
        let session = session_for(&server, Duration::from_secs(400));

        session.ensure_token().await.unwrap();
        let token = session.ensure_token().await.unwrap();

        assert_eq!(token, "A1");
        assert_eq!(session.state(), AuthState::Authenticated);
        login.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn expired_refresh_token_goes_straight_to_login() {
        let mut server = Server::new_async().await;
        let login = password_mock(&mut server, 200, token_body("A1", "R1", 300, 0), 2).await;
        let refresh =
            refresh_mock(&mut server, "R1", 200, token_body("A2", "R2", 300, 1800), 0).await;
        let session = session_for(&server, Duration::from_secs(400));

        session.ensure_token().await.unwrap();
        session.ensure_token().await.unwrap();

        login.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn browser_flow_used_when_password_grant_refused() {
        let mut server = Server::new_async().await;
        let login = password_mock(
            &mut server,
            400,
            r#"{"error":"unauthorized_client","error_description":"Client not allowed for direct access grants"}"#.into(),
            1,
        )
        .await;
        let form = format!(
            r#"<form id="kc-form-login" action="{}/login-actions/authenticate?session_code=s&amp;tab_id=t" method="post"></form>"#,
            server.url()
        );
        server
            .mock("GET", "/auth")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(form)
            .create_async()
            .await;
        server
            .mock("POST", "/login-actions/authenticate")
            .match_query(Matcher::Any)
            .with_status(302)
            .with_header("location", "https://account.hyperoptic.com/my-plan?code=CODE123")
            .create_async()
            .await;
        let exchange = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("code".into(), "CODE123".into()))
            .with_status(200)
            .with_body(token_body("B1", "RB1", 300, 1800))
            .create_async()
            .await;
        let session = session_for(&server, Duration::from_secs(30));

        let token = session.ensure_token().await.unwrap();

        assert_eq!(token, "B1");
        assert_eq!(session.tokens().await.unwrap().refresh_token(), Some("RB1"));
        assert_eq!(session.last_strategy().await, Some(GrantStrategy::BrowserPkce));
        login.assert_async().await;
        exchange.assert_async().await;
    }

    #[tokio::test]
    async fn exhausted_strategies_leave_session_retryable() {
        let mut server = Server::new_async().await;
        let login = password_mock(
            &mut server,
            401,
            r#"{"error":"invalid_grant","error_description":"Invalid user credentials"}"#.into(),
            2,
        )
        .await;
        let page = failing_login_page(&mut server, 2).await;
        let session = session_for(&server, Duration::from_secs(30));

        let err = session.ensure_token().await.unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }), "got: {err:?}");
        assert!(!err.to_string().contains("secret"));
        assert_eq!(session.state(), AuthState::NoToken);
        assert!(session.tokens().await.is_none());

        // a later call starts over instead of replaying the old failure
        assert!(session.ensure_token().await.is_err());
        login.assert_async().await;
        page.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_server_is_authentication_error() {
        let config = AuthConfig::new("user@example.com", "secret")
            .with_auth_base_url("http://127.0.0.1:1")
            .with_request_timeout(Duration::from_secs(2));
        let session = AuthSession::new(config).unwrap();

        let err = session.ensure_token().await.unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }), "got: {err:?}");
        assert_eq!(session.state(), AuthState::NoToken);
    }

    #[tokio::test]
    async fn force_reauthenticate_replaces_cached_token() {
        let mut server = Server::new_async().await;
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let login = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_status(200)
            .with_body_from_request(move |_| {
                let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
                token_body(&format!("A{n}"), &format!("R{n}"), 300, 1800).into_bytes()
            })
            .expect(2)
            .create_async()
            .await;
        let session = session_for(&server, Duration::from_secs(30));

        assert_eq!(session.ensure_token().await.unwrap(), "A1");
        assert_eq!(session.force_reauthenticate("A1").await.unwrap(), "A2");
        assert_eq!(session.ensure_token().await.unwrap(), "A2");
        login.assert_async().await;
    }

    #[tokio::test]
    async fn back_to_back_rejections_of_same_token_log_in_once() {
        let mut server = Server::new_async().await;
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = counter.clone();
        let login = server
            .mock("POST", "/token")
            .match_body(Matcher::UrlEncoded("grant_type".into(), "password".into()))
            .with_status(200)
            .with_body_from_request(move |_| {
                let n = seen.fetch_add(1, Ordering::SeqCst) + 1;
                token_body(&format!("A{n}"), &format!("R{n}"), 300, 1800).into_bytes()
            })
            .expect(2)
            .create_async()
            .await;
        let session = session_for(&server, Duration::from_secs(30));

        assert_eq!(session.ensure_token().await.unwrap(), "A1");
        // two requests carrying A1 both come back 401
        assert_eq!(session.force_reauthenticate("A1").await.unwrap(), "A2");
        assert_eq!(session.force_reauthenticate("A1").await.unwrap(), "A2");
        // the replacement itself being rejected does log in again
        assert_eq!(session.force_reauthenticate("A2").await.unwrap(), "A3");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_login() {
        let mut server = Server::new_async().await;
        let login = password_mock(&mut server, 200, token_body("A1", "R1", 300, 1800), 1).await;
        let session = Arc::new(session_for(&server, Duration::from_secs(30)));

        let mut handles = vec![];
        for _ in 0..8 {
            let session = session.clone();
            handles.push(tokio::spawn(async move { session.ensure_token().await }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "A1");
        }
        login.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let mut server = Server::new_async().await;
        // expires_in below the skew: A1 is stale as soon as it arrives
        let login = password_mock(&mut server, 200, token_body("A1", "R1", 10, 1800), 1).await;
        let refresh =
            refresh_mock(&mut server, "R1", 200, token_body("A2", "R2", 300, 1800), 1).await;
        let session = Arc::new(session_for(&server, Duration::from_secs(30)));
        assert_eq!(session.ensure_token().await.unwrap(), "A1");

        // hold the lock so every caller queues behind the same attempt
        let held = session.inner.lock().await;
        let mut handles = vec![];
        for _ in 0..8 {
            let session = session.clone();
            handles.push(tokio::spawn(async move { session.ensure_token().await }));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(held);

        for h in handles {
            assert_eq!(h.await.unwrap().unwrap(), "A2");
        }
        assert_eq!(session.tokens().await.unwrap().refresh_token(), Some("R2"));
        login.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_failure() {
        let mut server = Server::new_async().await;
        let login = password_mock(
            &mut server,
            401,
            r#"{"error":"invalid_grant","error_description":"Invalid user credentials"}"#.into(),
            1,
        )
        .await;
        let page = failing_login_page(&mut server, 1).await;
        let session = Arc::new(session_for(&server, Duration::from_secs(30)));

        let held = session.inner.lock().await;
        let mut handles = vec![];
        for _ in 0..8 {
            let session = session.clone();
            handles.push(tokio::spawn(async move { session.ensure_token().await }));
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(held);

        let mut messages = vec![];
        for h in handles {
            let err = h.await.unwrap().unwrap_err();
            assert!(matches!(err, Error::Authentication { .. }), "got: {err:?}");
            messages.push(err.to_string());
        }
        messages.dedup();
        assert_eq!(messages.len(), 1);
        assert_eq!(session.state(), AuthState::NoToken);
        login.assert_async().await;
        page.assert_async().await;
    }

    #[tokio::test]
    async fn huge_expires_in_is_cached_not_fatal() {
        let mut server = Server::new_async().await;
        let login = password_mock(
            &mut server,
            200,
            token_body("A1", "R1", u64::MAX, u64::MAX),
            1,
        )
        .await;
        let session = session_for(&server, Duration::from_secs(30));

        assert_eq!(session.ensure_token().await.unwrap(), "A1");
        assert_eq!(session.ensure_token().await.unwrap(), "A1");
        login.assert_async().await;
    }

    #[tokio::test]
    async fn oversized_skew_never_panics() {
        let mut server = Server::new_async().await;
        let login = password_mock(&mut server, 200, token_body("A1", "R1", 300, 1800), 1).await;
        let refresh =
            refresh_mock(&mut server, "R1", 200, token_body("A2", "R2", 300, 1800), 1).await;
        let config = AuthConfig::new("user@example.com", "secret")
            .with_auth_base_url(server.url())
            .with_access_skew(Duration::from_secs(u64::MAX));
        assert!(matches!(
            AuthSession::new(config.clone()),
            Err(Error::Config(_))
        ));

        // a caller-supplied client skips validation; the token is just stale
        let session = AuthSession::with_http_client(config, reqwest::Client::new());
        assert_eq!(session.ensure_token().await.unwrap(), "A1");
        assert_eq!(session.ensure_token().await.unwrap(), "A2");
        login.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn authorization_header_is_bearer() {
        let mut server = Server::new_async().await;
        password_mock(&mut server, 200, token_body("A1", "R1", 300, 1800), 1).await;
        let session = session_for(&server, Duration::from_secs(30));

        let headers = session.authorization_header().await.unwrap();
        let value = headers.get(AUTHORIZATION).unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer A1");
        assert!(value.is_sensitive());
    }

    #[tokio::test]
    async fn close_drops_tokens_without_network() {
        let mut server = Server::new_async().await;
        let login = password_mock(&mut server, 200, token_body("A1", "R1", 300, 1800), 2).await;
        let session = session_for(&server, Duration::from_secs(30));

        session.ensure_token().await.unwrap();
        session.close().await;
        assert_eq!(session.state(), AuthState::NoToken);
        assert!(session.tokens().await.is_none());

        session.ensure_token().await.unwrap();
        login.assert_async().await;
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = AuthConfig::new("", "secret");
        assert!(matches!(AuthSession::new(config), Err(Error::Config(_))));
    }

    #[test]
    fn strategies_run_password_first() {
        assert_eq!(
            GrantStrategy::ORDER,
            [GrantStrategy::Password, GrantStrategy::BrowserPkce]
        );
    }
}
