//! HTTP client for the HetrixTools uptime monitor API.

use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{Monitor, MonitorsResponse};
use crate::config::ApiConfig;

/// Longest slice of an error body carried in [`ClientError::Status`].
const ERROR_BODY_LIMIT: usize = 256;

/// Upstream API errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Failed to build HTTP client: {0}")]
    Build(#[source] reqwest::Error),

    #[error("Request to HetrixTools API failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HetrixTools API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("HetrixTools API rate limit exceeded (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("Failed to decode HetrixTools API response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Client for `GET /v3/uptime-monitors`.
#[derive(Debug, Clone)]
pub struct HetrixClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    per_page: u32,
    max_pages: u32,
}

impl HetrixClient {
    /// Create a new client with the configured request timeout.
    pub fn new(config: &ApiConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(ClientError::Build)?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            per_page: config.per_page,
            max_pages: config.max_pages,
        })
    }

    /// Fetch a single page of monitors.
    pub async fn fetch_page(&self, page: u32) -> Result<MonitorsResponse, ClientError> {
        debug!(url = %self.base_url, page, per_page = self.per_page, "Fetching monitors");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[("per_page", self.per_page), ("page", page)])
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            warn!(?retry_after, "HetrixTools API rate limit exceeded");
            return Err(ClientError::RateLimited { retry_after });
        }

        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::Status {
                status,
                body: truncate(&body, ERROR_BODY_LIMIT),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch monitors, following pagination up to `max_pages` pages.
    pub async fn fetch_monitors(&self) -> Result<Vec<Monitor>, ClientError> {
        let mut monitors = Vec::new();
        let mut page = 1;
        let mut fetched = 0;

        loop {
            let response = self.fetch_page(page).await?;
            fetched += 1;
            monitors.extend(response.monitors);

            match response.meta.pagination.next {
                Some(next) if next > page && fetched < self.max_pages => page = next,
                Some(next) if next > page => {
                    debug!(
                        fetched,
                        total = response.meta.total,
                        "More pages available, page limit reached"
                    );
                    break;
                }
                _ => break,
            }
        }

        Ok(monitors)
    }
}

fn truncate(body: &str, limit: usize) -> String {
    match body.char_indices().nth(limit) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
