//! Aggregate dare statistics from the admin backend
//!
//! The backend reports counts and payouts in lamports. `DareStats::summarize`
//! converts the payouts to SOL and, when a SOL price is known, to USD.

use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

use super::sol_price::{format_sol_amount, lamports_to_sol, lamports_to_usd, parse_lamports};
use super::AdminAuth;

const DARE_STATS_PATH: &str = "/api/admin/dares/stats";

/// Errors that can occur when fetching statistics
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Dare stats returned HTTP {0}")]
    Status(u16),

    #[error("Dare stats reported failure: {0}")]
    Backend(String),

    #[error("Dare stats response had no data")]
    MissingData,
}

/// Counts and payouts as the backend reports them
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DareStats {
    #[serde(default)]
    pub total_dares: u64,
    #[serde(default)]
    pub active_dares: u64,
    #[serde(default)]
    pub completed_dares: u64,
    #[serde(default)]
    pub unverified_dares: u64,
    #[serde(default, deserialize_with = "lamports")]
    pub total_payout_lamports: u64,
    #[serde(default, deserialize_with = "lamports")]
    pub average_payout_lamports: u64,
}

/// Statistics with payouts converted for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DareStatsSummary {
    pub total_dares: u64,
    pub active_dares: u64,
    pub completed_dares: u64,
    pub unverified_dares: u64,
    pub total_payout_lamports: u64,
    pub total_payout_sol: String,
    pub total_payout_usd: Option<String>,
    pub average_payout_lamports: u64,
    pub average_payout_sol: String,
    pub average_payout_usd: Option<String>,
}

impl DareStats {
    pub fn summarize(&self, sol_price: Option<f64>) -> DareStatsSummary {
        DareStatsSummary {
            total_dares: self.total_dares,
            active_dares: self.active_dares,
            completed_dares: self.completed_dares,
            unverified_dares: self.unverified_dares,
            total_payout_lamports: self.total_payout_lamports,
            total_payout_sol: format_sol_amount(lamports_to_sol(self.total_payout_lamports), 2),
            total_payout_usd: lamports_to_usd(self.total_payout_lamports, sol_price),
            average_payout_lamports: self.average_payout_lamports,
            average_payout_sol: format_sol_amount(lamports_to_sol(self.average_payout_lamports), 2),
            average_payout_usd: lamports_to_usd(self.average_payout_lamports, sol_price),
        }
    }
}

impl DareStatsSummary {
    /// USD when known, else SOL: `$1.2K` or `12.50 SOL`
    pub fn total_payout_label(&self) -> String {
        payout_label(self.total_payout_usd.as_deref(), &self.total_payout_sol)
    }

    pub fn average_payout_label(&self) -> String {
        payout_label(self.average_payout_usd.as_deref(), &self.average_payout_sol)
    }
}

fn payout_label(usd: Option<&str>, sol: &str) -> String {
    match usd {
        Some(usd) => usd.to_string(),
        None => format!("{} SOL", sol),
    }
}

/// Lamports arrive as decimal strings, occasionally as plain numbers
fn lamports<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(value) => Ok(value),
        Raw::Text(text) => parse_lamports(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid lamports: {}", text))),
    }
}

#[derive(Debug, Deserialize)]
struct DareStatsResponse {
    success: bool,
    #[serde(default)]
    data: Option<DareStats>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the admin statistics endpoint
#[derive(Debug, Clone)]
pub struct DareStatsClient {
    http_client: Client,
    base_url: String,
    auth: AdminAuth,
}

impl DareStatsClient {
    pub fn new(base_url: impl Into<String>, auth: AdminAuth) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub async fn fetch_stats(&self) -> Result<DareStats, StatsError> {
        let url = format!("{}{}", self.base_url, DARE_STATS_PATH);
        debug!(url = %url, "fetching dare stats");

        let response = self
            .auth
            .decorate(self.http_client.get(&url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StatsError::Status(status.as_u16()));
        }

        let body: DareStatsResponse = response.json().await?;
        if !body.success {
            return Err(StatsError::Backend(
                body.error
                    .or(body.message)
                    .unwrap_or_else(|| "Failed to fetch stats from backend".to_string()),
            ));
        }
        body.data.ok_or(StatsError::MissingData)
    }
}
