//! Account-service API client
//!
//! Thin typed wrappers over the portal's HAL+JSON endpoints. Every call
//! goes through `AuthenticatedRequestGuard`, so the token handling lives in
//! one place.

use std::sync::Arc;
use std::time::Duration;

use hyperoptic_auth::constants::USER_AGENT;
use hyperoptic_auth::{AuthSession, browser_headers};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::guard::AuthenticatedRequestGuard;
use crate::models::{Customer, Package};

/// Account-service base URL
pub const API_BASE_URL: &str = "https://api.hyperopticportal.com/account-service";

/// Default per-request timeout for API calls
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Sort order the portal uses for package listings
pub const PACKAGE_SORT: &str = "identifier,desc";

/// Client for the customer portal's account service.
#[derive(Clone)]
pub struct PortalClient {
    guard: AuthenticatedRequestGuard,
    http: reqwest::Client,
    base_url: String,
}

impl PortalClient {
    /// Client against the production API.
    pub fn new(session: Arc<AuthSession>) -> Result<Self> {
        Self::with_options(session, API_BASE_URL, DEFAULT_API_TIMEOUT)
    }

    pub fn with_options(
        session: Arc<AuthSession>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(browser_headers())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(format!("building HTTP client: {e}")))?;
        Ok(Self {
            guard: AuthenticatedRequestGuard::new(session),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &AuthSession {
        self.guard.session()
    }

    /// All customers linked to the authenticated account.
    pub async fn get_customers(&self) -> Result<Vec<Customer>> {
        let body = self.get_json("/customers", &[]).await?;
        embedded(body, "customers")
    }

    /// The first (usually only) customer on the account.
    pub async fn get_customer(&self) -> Result<Customer> {
        self.get_customers()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Api {
                status: 404,
                message: "No customers found for this account".into(),
                url: format!("{}/customers", self.base_url),
            })
    }

    /// Packages of one customer, newest first.
    pub async fn get_packages(&self, customer_id: &str) -> Result<Vec<Package>> {
        let path = format!("/customers/{customer_id}/packages");
        let body = self.get_json(&path, &[("sort", PACKAGE_SORT)]).await?;
        embedded(body, "packages")
    }

    /// Packages of the primary customer.
    pub async fn get_my_packages(&self) -> Result<Vec<Package>> {
        let customer = self.get_customer().await?;
        self.get_packages(&customer.id).await
    }

    /// Raw connection details.
    pub async fn get_connection(&self, connection_id: &str) -> Result<Value> {
        self.get_json(&format!("/connections/{connection_id}"), &[])
            .await
    }

    /// Connection details for every linked account of the primary customer.
    /// Accounts without a connection link are skipped.
    pub async fn get_my_connections(&self) -> Result<Vec<Value>> {
        let customer = self.get_customer().await?;
        let mut connections = Vec::new();
        for id in customer.accounts.iter().filter_map(|a| a.connection_id()) {
            connections.push(self.get_connection(id).await?);
        }
        Ok(connections)
    }

    pub async fn get_total_wifi_promotion(&self, customer_id: &str) -> Result<Value> {
        self.get_json(&format!("/customers/{customer_id}/promotions/total-wifi"), &[])
            .await
    }

    /// Authenticated GET on any account-service path, for endpoints without
    /// a typed wrapper.
    pub async fn get_raw(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        self.get_json(path, query).await
    }

    async fn get_json(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self
            .guard
            .send(|| self.http.get(&url).query(query))
            .await?;

        let status = response.status();
        if status.as_u16() >= 400 {
            let url = response.url().to_string();
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status: status.as_u16(),
                message,
                url,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::Decode(format!("{url}: {e}")))
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}/{path}", self.base_url)
        }
    }
}

/// Items of a HAL `_embedded.<key>` list. A missing list is empty.
fn embedded<T: DeserializeOwned>(mut body: Value, key: &str) -> Result<Vec<T>> {
    let Some(items) = body
        .get_mut("_embedded")
        .and_then(|e| e.get_mut(key))
        .map(Value::take)
    else {
        return Ok(Vec::new());
    };
    serde_json::from_value(items).map_err(|e| Error::Decode(format!("_embedded.{key}: {e}")))
}
