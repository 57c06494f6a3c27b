//! PKCE (Proof Key for Code Exchange) per RFC 7636
//!
//! A fresh verifier/challenge pair is generated for every browser-flow login
//! attempt and dropped once the code exchange finishes. The challenge goes
//! into the authorization URL; the verifier is only ever sent to the token
//! endpoint, which proves the code was requested by this process.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::AuthConfig;
use crate::error::{Error, Result};

/// Random bytes behind each verifier. 64 bytes encode to 86 characters,
/// inside the 43-128 range RFC 7636 allows.
const VERIFIER_BYTES: usize = 64;

/// A verifier and its S256 challenge.
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

/// Generate a fresh verifier/challenge pair.
pub fn generate() -> PkcePair {
    let verifier = generate_verifier();
    let challenge = compute_challenge(&verifier);
    PkcePair {
        verifier,
        challenge,
    }
}

/// Generate a cryptographically random code verifier, URL-safe base64 without padding.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; VERIFIER_BYTES];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Authorization endpoint URL that serves the Keycloak login form for this challenge.
pub fn build_authorization_url(config: &AuthConfig, challenge: &str) -> Result<Url> {
    Url::parse_with_params(
        &config.auth_url(),
        &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", config.scopes.as_str()),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
        ],
    )
    .map_err(|e| Error::BrowserFlow(format!("invalid authorization endpoint URL: {e}")))
}
