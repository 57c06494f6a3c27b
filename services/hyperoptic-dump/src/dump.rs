//! Collects everything the account service exposes for the account
//!
//! A failed customer listing aborts the dump. Below that, each section
//! (packages, connections, promotions) fails on its own and is recorded as
//! a `<section>_error` string next to the data that did load.

use chrono::Utc;
use hyperoptic_client::{Customer, PortalClient};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

/// Fetch every customer with its packages, connections and Total WiFi
/// promotion.
pub async fn dump_all(client: &PortalClient) -> hyperoptic_client::Result<Value> {
    let customers = client.get_customers().await?;
    info!(customers = customers.len(), "fetched customers");

    let mut dumped = Vec::with_capacity(customers.len());
    for customer in &customers {
        dumped.push(dump_customer(client, customer).await);
    }

    Ok(json!({
        "timestamp": Utc::now().to_rfc3339(),
        "customers": dumped,
    }))
}

async fn dump_customer(client: &PortalClient, customer: &Customer) -> Value {
    let mut entry = match serde_json::to_value(customer) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    entry.insert("fullName".into(), Value::String(customer.full_name()));
    for account in entry
        .get_mut("accounts")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
    {
        flatten_connection_link(account);
    }

    section(
        &mut entry,
        "packages",
        client.get_packages(&customer.id).await.and_then(|packages| {
            serde_json::to_value(packages)
                .map_err(|e| hyperoptic_client::Error::Decode(e.to_string()))
        }),
    );
    section(
        &mut entry,
        "connections",
        client.get_my_connections().await.map(Value::from),
    );
    section(
        &mut entry,
        "promotions",
        client
            .get_total_wifi_promotion(&customer.id)
            .await
            .map(|promo| json!({ "total_wifi": promo })),
    );

    Value::Object(entry)
}

/// Replace an account's raw `_links` with its `connectionUrl`.
fn flatten_connection_link(account: &mut Value) {
    let Some(map) = account.as_object_mut() else {
        return;
    };
    let url = map
        .remove("_links")
        .and_then(|links| links.get("connection")?.get("href").cloned())
        .unwrap_or(Value::Null);
    map.insert("connectionUrl".into(), url);
}

fn section(entry: &mut Map<String, Value>, name: &str, result: hyperoptic_client::Result<Value>) {
    match result {
        Ok(value) => {
            entry.insert(name.to_string(), value);
        }
        Err(e) => {
            warn!(section = name, error = %e, "section failed");
            entry.insert(format!("{name}_error"), Value::String(e.to_string()));
        }
    }
}
