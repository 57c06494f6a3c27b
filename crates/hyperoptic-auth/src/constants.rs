//! Hyperoptic Keycloak constants
//!
//! Public client configuration of the customer portal's single-page app.
//! These identify the client and are not secrets. Every value here is only
//! a default; `AuthConfig` can override each one.

use std::time::Duration;

/// OpenID Connect base of the `hyperoptic` Keycloak realm
pub const AUTH_BASE_URL: &str =
    "https://auth.hyperoptic.com/realms/hyperoptic/protocol/openid-connect";

/// Token endpoint, relative to `AUTH_BASE_URL`
pub const TOKEN_PATH: &str = "/token";

/// Authorization endpoint (serves the login form), relative to `AUTH_BASE_URL`
pub const AUTH_PATH: &str = "/auth";

/// Public client id of the customer portal
pub const CLIENT_ID: &str = "customer-portal";

/// Redirect URI registered for the portal client
pub const REDIRECT_URI: &str = "https://account.hyperoptic.com/my-plan";

/// Scopes the portal requests. `customer_id` is needed by the account service.
pub const SCOPES: &str = "openid email customer_id atlas-chat-audience profile";

/// Access token lifetime assumed when the token response omits `expires_in`
pub const DEFAULT_ACCESS_TTL_SECS: u64 = 300;

/// Refresh token lifetime assumed when the token response omits `refresh_expires_in`
pub const DEFAULT_REFRESH_TTL_SECS: u64 = 1800;

/// Longest token lifetime taken at face value; larger `expires_in` values are capped
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Upper bound accepted for the access token skew
pub const MAX_ACCESS_SKEW: Duration = Duration::from_secs(60 * 60);

/// Margin before nominal expiry at which an access token is treated as stale
pub const DEFAULT_ACCESS_SKEW: Duration = Duration::from_secs(30);

/// Per-request timeout for all authorization server calls
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Redirect hops followed while loading the login page or hunting for the code
pub const MAX_REDIRECTS: usize = 5;

/// Browser identity presented to Keycloak and the account service.
pub const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/144.0.0.0 Safari/537.36";
pub const ORIGIN: &str = "https://account.hyperoptic.com";
pub const REFERER: &str = "https://account.hyperoptic.com/";
