//! IPFS gateway client for dare metadata
//!
//! Content is fetched by CID from an ordered list of gateways. Any error, non-2xx
//! response or timeout moves on to the next gateway; the fetch fails only once the
//! whole list is exhausted.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use super::DareMetadata;
use crate::cache::{BatchFetchError, BatchFetcher, BatchResponse};

/// Public gateways tried after any configured custom gateway
pub const PUBLIC_GATEWAYS: [&str; 4] = [
    "https://ipfs.io/ipfs/",
    "https://cloudflare-ipfs.com/ipfs/",
    "https://gateway.pinata.cloud/ipfs/",
    "https://dweb.link/ipfs/",
];

/// Per-gateway request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Errors that can occur when fetching from IPFS
#[derive(Debug, Error)]
pub enum IpfsError {
    /// Blank CID
    #[error("Invalid IPFS CID provided")]
    InvalidCid,

    /// Every gateway failed or timed out
    #[error("Failed to fetch {cid} from IPFS after trying all gateways:\n{}", .attempts.join("\n"))]
    GatewayExhausted { cid: String, attempts: Vec<String> },
}

/// Normalizes a gateway base URL so that it ends in `/ipfs/`
pub fn normalize_gateway(url: &str) -> String {
    let url = url.trim();
    if url.ends_with("/ipfs/") {
        url.to_string()
    } else if url.ends_with('/') {
        format!("{}ipfs/", url)
    } else {
        format!("{}/ipfs/", url)
    }
}

/// Gateway list with an optional custom gateway first
pub fn gateway_list(custom: Option<&str>) -> Vec<String> {
    let mut gateways = Vec::with_capacity(PUBLIC_GATEWAYS.len() + 1);
    if let Some(custom) = custom.filter(|url| !url.trim().is_empty()) {
        gateways.push(normalize_gateway(custom));
    }
    gateways.extend(PUBLIC_GATEWAYS.iter().map(|g| g.to_string()));
    gateways
}

/// Checks CIDv0 (`Qm…`, 46 chars base58) and CIDv1 (base32 `b…` / base58 `z…`) shapes
pub fn is_valid_cid(cid: &str) -> bool {
    let is_base58 = |s: &str| s.chars().all(|c| BASE58_ALPHABET.contains(c));
    let is_base32 = |s: &str| s.chars().all(|c| c.is_ascii_lowercase() || ('2'..='7').contains(&c));

    if let Some(rest) = cid.strip_prefix("Qm") {
        return rest.len() == 44 && is_base58(rest);
    }
    if let Some(rest) = cid.strip_prefix('b') {
        return rest.len() >= 58 && is_base32(rest);
    }
    if let Some(rest) = cid.strip_prefix('z') {
        return rest.len() >= 48 && is_base58(rest);
    }
    false
}

/// Client for fetching dare metadata from IPFS gateways
#[derive(Debug, Clone)]
pub struct IpfsClient {
    http_client: Client,
    gateways: Vec<String>,
    timeout: Duration,
}

impl Default for IpfsClient {
    fn default() -> Self {
        Self::new(None)
    }
}

impl IpfsClient {
    /// Creates a client using the public gateways, preceded by `custom_gateway`
    pub fn new(custom_gateway: Option<&str>) -> Self {
        Self::with_gateways(gateway_list(custom_gateway))
    }

    /// Creates a client with an explicit gateway list (used as given, in order)
    pub fn with_gateways(gateways: Vec<String>) -> Self {
        Self {
            http_client: Client::new(),
            gateways,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn gateways(&self) -> &[String] {
        &self.gateways
    }

    /// Direct URL for a CID on the primary gateway; empty for a blank CID
    pub fn ipfs_url(&self, cid: &str) -> String {
        match self.gateways.first() {
            Some(gateway) if !cid.trim().is_empty() => format!("{}{}", gateway, cid),
            _ => String::new(),
        }
    }

    /// Fetches and parses the metadata document for `cid`
    ///
    /// # Returns
    /// * `Ok(DareMetadata)` - From the first gateway that answered with valid JSON
    /// * `Err(IpfsError)` - If the CID is blank or every gateway failed
    pub async fn fetch_metadata(&self, cid: &str) -> Result<DareMetadata, IpfsError> {
        if cid.trim().is_empty() {
            return Err(IpfsError::InvalidCid);
        }

        let mut attempts = Vec::with_capacity(self.gateways.len());
        for gateway in &self.gateways {
            match self.try_gateway(gateway, cid).await {
                Ok(metadata) => {
                    debug!(cid, gateway = %gateway, "fetched metadata");
                    return Ok(metadata);
                }
                Err(reason) => {
                    debug!(cid, gateway = %gateway, reason = %reason, "gateway failed");
                    attempts.push(format!("{}: {}", gateway, reason));
                }
            }
        }

        Err(IpfsError::GatewayExhausted {
            cid: cid.to_string(),
            attempts,
        })
    }

    /// One attempt against one gateway; the error is a human-readable reason
    async fn try_gateway(&self, gateway: &str, cid: &str) -> Result<DareMetadata, String> {
        let url = format!("{}{}", gateway, cid);
        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("Request timeout after {}ms", self.timeout.as_millis())
                } else {
                    e.to_string()
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }

        response
            .json::<DareMetadata>()
            .await
            .map_err(|e| format!("Invalid JSON: {}", e))
    }
}

#[async_trait]
impl BatchFetcher for IpfsClient {
    type Value = DareMetadata;

    /// Fetches every CID concurrently; individual failures never fail the batch
    async fn fetch_batch(
        &self,
        keys: &[String],
    ) -> Result<BatchResponse<DareMetadata>, BatchFetchError> {
        let results = join_all(keys.iter().map(|cid| self.fetch_metadata(cid))).await;

        let mut response = BatchResponse::new();
        for (cid, result) in keys.iter().zip(results) {
            match result {
                Ok(metadata) => response.resolve(cid.clone(), metadata),
                Err(err) => {
                    warn!(cid = %cid, error = %err, "metadata unavailable");
                    response.fail(cid.clone());
                }
            }
        }
        Ok(response)
    }

    fn placeholder(&self, _key: &str) -> DareMetadata {
        DareMetadata::unavailable()
    }
}
