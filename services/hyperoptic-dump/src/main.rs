//! Hyperoptic account dump
//!
//! Logs in to the customer portal and prints everything the account
//! service returns as one JSON document on stdout:
//! 1. Resolve credentials (CLI args > env vars > config file)
//! 2. Authenticate (password grant, browser PKCE fallback)
//! 3. Fetch customers, then packages, connections and promotions per customer
//!
//! Logs go to stderr as JSON, filtered by LOG_LEVEL / RUST_LOG.

mod config;
mod dump;

use std::sync::Arc;

use anyhow::{Context, Result};
use hyperoptic_auth::AuthSession;
use hyperoptic_client::PortalClient;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{CliArgs, DumpConfig};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = CliArgs::parse(std::env::args().skip(1))?;
    let config = DumpConfig::resolve(cli).context("failed to resolve configuration")?;
    info!(
        auth_base_url = %config.auth.auth_base_url,
        api_base_url = %config.api_base_url,
        "configuration loaded"
    );

    let session = Arc::new(AuthSession::new(config.auth).context("failed to create session")?);
    let client = PortalClient::with_options(
        Arc::clone(&session),
        config.api_base_url,
        config.api_timeout,
    )
    .context("failed to create API client")?;

    let data = dump::dump_all(&client)
        .await
        .context("failed to fetch customers")?;
    session.close().await;

    let out = serde_json::to_string_pretty(&data).context("failed to encode dump")?;
    println!("{out}");
    Ok(())
}
