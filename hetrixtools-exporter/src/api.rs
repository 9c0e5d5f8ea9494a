//! Wire types for the HetrixTools v3 uptime monitor API.
//!
//! Decoding is tolerant: the upstream API omits fields, sends `null` for
//! unset values and uses varying JSON types for several settings, so the
//! descriptive settings the exporter does not map to metrics are decoded as
//! optional or raw JSON values.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, de};
use serde_json::Value;

/// Response body of `GET /v3/uptime-monitors`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitorsResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub monitors: Vec<Monitor>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub meta: Meta,
}

/// A single uptime monitor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Monitor {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub monitor_type: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub target: String,

    #[serde(default)]
    pub resolve_address: Option<String>,

    #[serde(default)]
    pub resolve_address_info: Option<ResolveAddressInfo>,

    #[serde(default)]
    pub port: Value,

    #[serde(default)]
    pub keyword: Value,

    #[serde(default)]
    pub category: Option<String>,

    /// Check timeout in seconds.
    #[serde(default, deserialize_with = "null_as_default")]
    pub timeout: u64,

    #[serde(default)]
    pub check_frequency: Option<u64>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub contact_lists: Vec<String>,

    #[serde(default)]
    pub created_at: Option<i64>,

    #[serde(default)]
    pub last_check: Option<i64>,

    #[serde(default)]
    pub last_status_change: Option<i64>,

    #[serde(default)]
    pub uptime_status: Option<String>,

    #[serde(default)]
    pub monitor_status: Option<String>,

    #[serde(default)]
    pub uptime: Value,

    #[serde(default)]
    pub uptime_incl_maint: Value,

    /// Latest check result keyed by probe location.
    #[serde(default, deserialize_with = "locations")]
    pub locations: BTreeMap<String, LocationStatus>,

    #[serde(default)]
    pub ssl_expiration_date: Value,
    #[serde(default)]
    pub ssl_expiration_warn: Option<bool>,
    #[serde(default)]
    pub ssl_expiration_warn_days: Option<u32>,

    #[serde(default)]
    pub domain_expiration_date: Value,
    #[serde(default)]
    pub domain_expiration_warn: Option<bool>,
    #[serde(default)]
    pub domain_expiration_warn_days: Option<u32>,

    #[serde(default)]
    pub nameservers: Value,
    #[serde(default)]
    pub nameservers_change_warn: Option<bool>,

    #[serde(default)]
    pub public_report: Option<bool>,
    #[serde(default)]
    pub public_target: Option<bool>,

    #[serde(default)]
    pub max_redirects: Value,
    #[serde(default)]
    pub http_method: Value,
    #[serde(default)]
    pub accepted_http_codes: Value,
    #[serde(default)]
    pub verify_ssl_certificate: Option<bool>,
    #[serde(default)]
    pub verify_ssl_hostname: Option<bool>,

    #[serde(default)]
    pub number_of_tries: Option<u32>,
    #[serde(default)]
    pub triggering_locations: Option<u32>,
    #[serde(default)]
    pub alert_after_minutes: Option<u32>,
    #[serde(default)]
    pub repeat_alert_times: Option<u32>,
    #[serde(default)]
    pub repeat_alert_frequency: Option<u32>,

    #[serde(default)]
    pub agent_id: Option<String>,
}

/// Network details of the resolved monitor target.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveAddressInfo {
    #[serde(default, rename = "ASN")]
    pub asn: Option<String>,
    #[serde(default, rename = "ISP")]
    pub isp: Option<String>,
    #[serde(default, rename = "City")]
    pub city: Option<String>,
    #[serde(default, rename = "Region")]
    pub region: Option<String>,
    #[serde(default, rename = "Country")]
    pub country: Option<String>,
}

/// Result of the most recent check from one probe location.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LocationStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub uptime_status: String,

    /// Response time in milliseconds.
    #[serde(default, deserialize_with = "null_as_default")]
    pub response_time: f64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub last_check: i64,
}

impl LocationStatus {
    /// Whether the location reported the monitor as up.
    pub fn is_up(&self) -> bool {
        self.uptime_status == "up"
    }
}

/// Listing metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Meta {
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_filtered: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub returned: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pagination: Pagination,
}

/// Page cursor. `previous`/`next` are absent or `null` at the edges.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub current: Option<u32>,
    #[serde(default)]
    pub last: Option<u32>,
    #[serde(default)]
    pub previous: Option<u32>,
    #[serde(default)]
    pub next: Option<u32>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The API encodes an empty location map as `[]`.
fn locations<'de, D>(deserializer: D) -> Result<BTreeMap<String, LocationStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null | Value::Array(_) => Ok(BTreeMap::new()),
        other => serde_json::from_value(other).map_err(de::Error::custom),
    }
}
