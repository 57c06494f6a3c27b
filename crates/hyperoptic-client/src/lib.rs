//! Hyperoptic customer portal API client
//!
//! `PortalClient` fetches customers, packages, connections and promotions
//! from the account service. Tokens come from a shared
//! `hyperoptic_auth::AuthSession`; a 401 triggers one re-login and retry.

pub mod client;
pub mod error;
pub mod guard;
pub mod models;

pub use client::{API_BASE_URL, PortalClient};
pub use error::{Error, Result};
pub use guard::AuthenticatedRequestGuard;
pub use models::{Account, Address, BroadbandProduct, Customer, Package};
