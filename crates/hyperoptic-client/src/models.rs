//! Account-service resources
//!
//! Field names follow the API's camelCase JSON. Everything beyond the
//! identifiers is optional; unknown fields are ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub uprn: Option<i64>,
    pub street_address: Option<String>,
    #[serde(rename = "streetAddress2")]
    pub street_address_2: Option<String>,
    pub address_locality: Option<String>,
    pub address_region: Option<String>,
    pub postal_code: Option<String>,
}

/// HAL link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub href: String,
}

/// A service address on a customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub identifier: Option<i64>,
    pub uprn: Option<i64>,
    pub address: Option<Address>,
    pub group_name: Option<String>,
    pub stage: Option<String>,
    pub sub_stage: Option<String>,
    pub order_status: Option<String>,
    pub order_state: Option<String>,
    pub bundle_name: Option<String>,
    pub bundle_type: Option<String>,
    pub activation_status: Option<String>,
    pub have_hyperhub: Option<bool>,
    #[serde(rename = "moveInDateForTakenOrder")]
    pub move_in_date: Option<String>,
    pub desired_activation_date: Option<String>,
    pub installation_date: Option<String>,
    pub activation_date: Option<String>,
    pub contract_start_date: Option<String>,
    pub contract_end_date: Option<String>,
    pub contract_duration_months: Option<i64>,
    pub cancellation_date: Option<String>,
    #[serde(default)]
    pub is_preorder: bool,
    #[serde(rename = "_links", default)]
    pub links: HashMap<String, Link>,
}

impl Account {
    /// URL of the account's connection resource, if linked.
    pub fn connection_url(&self) -> Option<&str> {
        self.links.get("connection").map(|link| link.href.as_str())
    }

    /// Connection id: the last path segment of the connection link.
    pub fn connection_id(&self) -> Option<&str> {
        let url = self.connection_url()?.trim_end_matches('/');
        let id = url.rsplit('/').next()?;
        (!id.is_empty()).then_some(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub commercial_arrangement_type: Option<String>,
    pub is_pon: Option<bool>,
}

/// Top-level object from `/customers`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub identifier: i64,
    pub additional_type: Option<String>,
    pub honorific_prefix: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub birth_date: Option<String>,
    pub email: Option<String>,
    pub telephone: Option<String>,
    pub alternate_telephone: Option<String>,
    pub mobile_telephone: Option<String>,
    pub address: Option<Address>,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub is_vulnerable: bool,
    #[serde(default)]
    pub accounts: Vec<Account>,
    pub site: Option<Site>,
    pub provider: Option<String>,
}

impl Customer {
    /// Given and family name joined by a space, skipping missing parts.
    pub fn full_name(&self) -> String {
        [self.given_name.as_deref(), self.family_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GreatFor {
    pub label: String,
    pub icon: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketingCopy {
    pub sub_heading: Option<String>,
    #[serde(default)]
    pub great_for: Vec<GreatFor>,
    pub expected_wifi_speed: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadbandProduct {
    pub web_code: Option<String>,
    pub download_speed_mbps: Option<i64>,
    pub upload_speed_mbps: Option<i64>,
    pub marketing_copy: Option<MarketingCopy>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingPeriod {
    #[serde(rename = "from")]
    pub from_date: Option<String>,
    pub until: Option<String>,
    pub price: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSpeeds {
    pub average_download: Option<String>,
    pub average_upload: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFlags {
    #[serde(default)]
    pub is_phone: bool,
    #[serde(default)]
    pub is_total_wifi: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanDetails {
    pub speeds: Option<PlanSpeeds>,
    /// Shape varies by plan; kept as raw JSON.
    pub addons: Option<serde_json::Value>,
    #[serde(default)]
    pub pricing: Vec<PricingPeriod>,
    pub flags: Option<PlanFlags>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalsMetadata {
    #[serde(rename = "isSWW", default)]
    pub is_sww: bool,
    #[serde(default)]
    pub is_business_customer: bool,
    #[serde(default)]
    pub is_serviced_apartments: bool,
    #[serde(default)]
    pub is_one_hundred_percent_service: bool,
}

/// A broadband package from `/customers/{id}/packages`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: String,
    pub identifier: i64,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub contract_rolling: bool,
    pub order_date: Option<String>,
    pub bundle_name: Option<String>,
    pub bundle_type: Option<String>,
    pub duration_months: Option<i64>,
    pub current_price: Option<f64>,
    pub broadband_product: Option<BroadbandProduct>,
    pub plan_details: Option<PlanDetails>,
    pub renewals_metadata: Option<RenewalsMetadata>,
    #[serde(default)]
    pub can_renew: bool,
}

impl Package {
    pub fn download_speed(&self) -> Option<i64> {
        self.broadband_product.as_ref()?.download_speed_mbps
    }

    pub fn upload_speed(&self) -> Option<i64> {
        self.broadband_product.as_ref()?.upload_speed_mbps
    }
}
