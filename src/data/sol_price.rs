//! SOL/USD price lookup with a short-lived in-memory cache
//!
//! Payouts are stored in lamports. The console shows them in SOL and, when a
//! price is available, in USD. A failed price fetch just hides the USD column.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{Clock, SystemClock};

/// Base URL for the CoinGecko API
const COINGECKO_BASE_URL: &str = "https://api.coingecko.com";

const SIMPLE_PRICE_PATH: &str = "/api/v3/simple/price?ids=solana&vs_currencies=usd";

/// Timeout for price requests
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

pub const LAMPORTS_PER_SOL: f64 = 1_000_000_000.0;

/// Errors that can occur when fetching the SOL price
#[derive(Debug, Error)]
pub enum PriceError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// CoinGecko answered with a non-success status
    #[error("CoinGecko API error! status: {0}")]
    Status(u16),

    /// Missing, non-numeric or non-positive price
    #[error("Invalid price from CoinGecko API")]
    InvalidPrice,
}

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    solana: Option<UsdQuote>,
}

#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: Option<serde_json::Value>,
}

/// Anything that can produce a current SOL/USD price
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_price(&self) -> Result<f64, PriceError>;
}

/// Client for the CoinGecko simple price endpoint
#[derive(Debug, Clone)]
pub struct SolPriceClient {
    http_client: Client,
    base_url: String,
}

impl Default for SolPriceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SolPriceClient {
    pub fn new() -> Self {
        Self::with_base_url(COINGECKO_BASE_URL)
    }

    /// Creates a client against a different host (for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for SolPriceClient {
    async fn fetch_price(&self) -> Result<f64, PriceError> {
        let url = format!("{}{}", self.base_url, SIMPLE_PRICE_PATH);
        let response = self
            .http_client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PriceError::Status(status.as_u16()));
        }

        let body: SimplePriceResponse = response.json().await?;
        let price = body
            .solana
            .and_then(|quote| quote.usd)
            .and_then(|value| match value {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            })
            .filter(|price| price.is_finite() && *price > 0.0)
            .ok_or(PriceError::InvalidPrice)?;

        debug!(price, "fetched SOL price");
        Ok(price)
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedPrice {
    price: f64,
    fetched_at: DateTime<Utc>,
}

/// Single-value TTL cache in front of a `PriceSource`
///
/// Failures are not cached: the next call tries again.
pub struct PriceCache<S: PriceSource> {
    source: S,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<CachedPrice>>,
}

impl<S: PriceSource> PriceCache<S> {
    /// Default freshness window for the SOL price
    pub const DEFAULT_TTL_MINUTES: i64 = 5;

    pub fn new(source: S) -> Self {
        Self::with_clock(
            source,
            Duration::minutes(Self::DEFAULT_TTL_MINUTES),
            Arc::new(SystemClock),
        )
    }

    pub fn with_clock(source: S, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            ttl,
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Current price in USD, or `None` if it cannot be fetched
    pub async fn get_price(&self) -> Option<f64> {
        let now = self.clock.now();
        let cached = *self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cached {
            if now - cached.fetched_at < self.ttl {
                debug!(price = cached.price, "using cached SOL price");
                return Some(cached.price);
            }
        }

        match self.source.fetch_price().await {
            Ok(price) => {
                *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedPrice {
                    price,
                    fetched_at: now,
                });
                Some(price)
            }
            Err(err) => {
                warn!(error = %err, "failed to fetch SOL price");
                None
            }
        }
    }
}

/// Converts lamports to SOL
pub fn lamports_to_sol(lamports: u64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL
}

/// Parses a lamport amount as sent by the backend (decimal string)
pub fn parse_lamports(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    trimmed
        .parse::<u64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u64))
}

/// Formats USD with K/M/B abbreviations: `$1.2K`, `$15.5M`, `$2.3B`, `$12.34`
pub fn format_usd_value(usd: f64) -> String {
    let abs = usd.abs();
    if abs >= 1_000_000_000.0 {
        format!("${:.1}B", usd / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("${:.1}M", usd / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("${:.1}K", usd / 1_000.0)
    } else {
        format!("${:.2}", usd)
    }
}

/// Lamports to formatted USD; `None` without a price
pub fn lamports_to_usd(lamports: u64, sol_price: Option<f64>) -> Option<String> {
    sol_price.map(|price| format_usd_value(lamports_to_sol(lamports) * price))
}

pub fn format_sol_amount(sol: f64, decimals: usize) -> String {
    format!("{:.*}", decimals, sol)
}
