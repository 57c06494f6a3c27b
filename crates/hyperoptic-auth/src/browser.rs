//! Simulated-browser authorization-code flow
//!
//! Used when the realm refuses the password grant. Drives Keycloak the way
//! the portal's browser would, without a renderer:
//! 1. GET the authorization endpoint (with a PKCE challenge) to get the login form
//! 2. POST the credentials to the form's `action` URL
//! 3. Walk the redirect chain until a `Location` carries `code=...`
//! 4. Exchange the code plus verifier at the token endpoint
//!
//! The HTTP client must not follow redirects on its own and must keep a
//! cookie store: Keycloak ties the form to the session cookies set in step 1.

use reqwest::StatusCode;
use reqwest::header::LOCATION;
use tracing::debug;
use url::Url;

use crate::config::AuthConfig;
use crate::constants::MAX_REDIRECTS;
use crate::error::{Error, Result};
use crate::pkce;
use crate::token::{self, TokenResponse};

/// Run the whole browser flow and return the token endpoint response.
pub async fn browser_login(client: &reqwest::Client, config: &AuthConfig) -> Result<TokenResponse> {
    let pair = pkce::generate();
    let authorize_url = pkce::build_authorization_url(config, &pair.challenge)?;

    let (page_url, html) = fetch_login_page(client, authorize_url).await?;
    let action = extract_form_action(&html)
        .ok_or_else(|| Error::BrowserFlow("login form action not found in page".into()))?;
    let action_url = page_url
        .join(&action)
        .map_err(|e| Error::BrowserFlow(format!("invalid form action URL: {e}")))?;
    debug!(host = action_url.host_str().unwrap_or_default(), "submitting login form");

    let code = submit_credentials(client, config, action_url).await?;
    token::exchange_code(client, config, &code, &pair.verifier).await
}

/// GET the login page, following up to `MAX_REDIRECTS` hops. Returns the
/// final URL (relative form actions resolve against it) and the HTML.
async fn fetch_login_page(client: &reqwest::Client, start: Url) -> Result<(Url, String)> {
    let mut current = start;
    for _ in 0..=MAX_REDIRECTS {
        let response = client
            .get(current.clone())
            .send()
            .await
            .map_err(|e| Error::Http(format!("login page request failed: {e}")))?;

        let status = response.status();
        if status.is_redirection() {
            current = next_location(&current, &response)?;
            continue;
        }
        if status != StatusCode::OK {
            return Err(Error::BrowserFlow(format!(
                "login page returned {status}"
            )));
        }
        let html = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("reading login page failed: {e}")))?;
        return Ok((current, html));
    }
    Err(Error::BrowserFlow(format!(
        "login page redirected more than {MAX_REDIRECTS} times"
    )))
}

/// POST the credentials and follow redirects until the callback URL with
/// the authorization code shows up.
async fn submit_credentials(
    client: &reqwest::Client,
    config: &AuthConfig,
    action: Url,
) -> Result<String> {
    let response = client
        .post(action.clone())
        .form(&[
            ("username", config.email.as_str()),
            ("password", config.password.expose().as_str()),
        ])
        .send()
        .await
        .map_err(|e| Error::Http(format!("login form submission failed: {e}")))?;

    let status = response.status();
    if !status.is_redirection() {
        // Keycloak re-renders the form with 200 on bad credentials
        return Err(Error::BrowserFlow(format!(
            "expected redirect after login, got {status}; check email/password"
        )));
    }

    let mut current = action;
    let mut response = response;
    for _ in 0..MAX_REDIRECTS {
        let location = next_location(&current, &response)?;
        if let Some(code) = extract_code(location.as_str()) {
            return Ok(code);
        }
        debug!(host = location.host_str().unwrap_or_default(), "following redirect for authorization code");
        response = client
            .get(location.clone())
            .send()
            .await
            .map_err(|e| Error::Http(format!("redirect request failed: {e}")))?;
        current = location;
        if !response.status().is_redirection() {
            return Err(Error::BrowserFlow(format!(
                "redirect chain ended with {} before an authorization code appeared",
                response.status()
            )));
        }
    }
    Err(Error::BrowserFlow(format!(
        "no authorization code within {MAX_REDIRECTS} redirects"
    )))
}

/// Resolve a redirect response's `Location` against the URL that produced it.
fn next_location(current: &Url, response: &reqwest::Response) -> Result<Url> {
    let location = response
        .headers()
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            Error::BrowserFlow(format!(
                "{} response without a Location header",
                response.status()
            ))
        })?;
    current
        .join(location)
        .map_err(|e| Error::BrowserFlow(format!("invalid redirect location: {e}")))
}

/// Pull the `code` query parameter out of a (possibly relative) callback URL.
pub fn extract_code(location: &str) -> Option<String> {
    let url = match Url::parse(location) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Url::parse("http://localhost/").ok()?.join(location).ok()?
        }
        Err(_) => return None,
    };
    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
        .filter(|code| !code.is_empty())
}

/// Find the `action` of the first `<form>` whose method is POST.
///
/// Attribute order, quote style and case don't matter. The value is
/// HTML-unescaped, since Keycloak writes `&amp;` between query parameters.
pub fn extract_form_action(html: &str) -> Option<String> {
    // ASCII lowercasing keeps byte offsets identical between the two strings.
    let lower = html.to_ascii_lowercase();
    let mut offset = 0;
    while let Some(found) = lower[offset..].find("<form") {
        let start = offset + found;
        let name_end = start + "<form".len();
        // `<formfield>` and friends are other tags
        if !lower
            .as_bytes()
            .get(name_end)
            .is_some_and(|b| b.is_ascii_whitespace() || *b == b'>')
        {
            offset = name_end;
            continue;
        }
        let end = lower[start..].find('>').map(|i| start + i)?;
        let tag = &html[start..end];
        let tag_lower = &lower[start..end];

        let is_post = attribute(tag, tag_lower, "method")
            .is_some_and(|method| method.eq_ignore_ascii_case("post"));
        if is_post && let Some(action) = attribute(tag, tag_lower, "action") {
            return Some(unescape_html(action));
        }
        offset = end;
    }
    None
}

/// Quoted value of attribute `name` within a single tag.
fn attribute<'a>(tag: &'a str, tag_lower: &str, name: &str) -> Option<&'a str> {
    let bytes = tag_lower.as_bytes();
    let mut search = 0;
    while let Some(found) = tag_lower[search..].find(name) {
        let at = search + found;
        search = at + name.len();

        // must be a whole attribute name, not the tail of another one
        if at == 0 || !bytes[at - 1].is_ascii_whitespace() {
            continue;
        }
        let rest = tag_lower[search..].trim_start();
        let Some(after_eq) = rest.strip_prefix('=') else {
            continue;
        };
        let value_part = after_eq.trim_start();
        let quote = value_part.chars().next()?;
        if quote != '"' && quote != '\'' {
            continue;
        }
        let value_start = tag_lower.len() - value_part.len() + 1;
        let value_len = tag_lower[value_start..].find(quote)?;
        return Some(&tag[value_start..value_start + value_len]);
    }
    None
}

/// Decode the HTML character references that show up in attribute values.
fn unescape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let candidate = &rest[amp..];
        let decoded = candidate.find(';').and_then(|semi| {
            let entity = &candidate[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "lt" => Some('<'),
                "gt" => Some('>'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|dec| dec.parse().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &candidate[consumed..];
            }
            None => {
                out.push('&');
                rest = &candidate[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
