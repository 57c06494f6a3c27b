//! Keycloak session management for the Hyperoptic customer portal
//!
//! Obtains and keeps an OpenID Connect access token for one portal account.
//! The resource-fetch layer only ever asks `AuthSession` for a token (or a
//! ready `Authorization` header); everything about grants, expiry and
//! renewal stays in here.
//!
//! Token flow:
//! 1. `AuthSession::ensure_token()` returns the cached token while it is valid
//! 2. Stale access token → `token::refresh_grant()` with the refresh token
//! 3. No usable refresh token, or refresh rejected → full login:
//!    `token::password_grant()`, then `browser::browser_login()` (PKCE) if refused
//! 4. API answers 401 → `AuthSession::force_reauthenticate(rejected)`, done by the
//!    request guard in the client crate

pub mod browser;
pub mod config;
pub mod constants;
pub mod error;
pub mod pkce;
pub mod session;
pub mod state;
pub mod token;

pub use config::AuthConfig;
pub use error::{Error, Result};
pub use session::{AuthSession, GrantStrategy, bearer, browser_headers};
pub use state::AuthState;
pub use token::{TokenResponse, TokenSet};
