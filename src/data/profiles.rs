//! Admin backend client for batched wallet profile lookups
//!
//! Posts wallet lists to the profile batch endpoint. Plugged into a
//! `BatchedTtlCache` through its `BatchFetcher` impl, which maps every failure to
//! per-wallet placeholders.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use super::{AdminAuth, ProfileData};
use crate::cache::{BatchFetchError, BatchFetcher, BatchResponse};

/// Backend limit on wallets per batch request
pub const MAX_WALLETS_PER_REQUEST: usize = 1000;

const PROFILE_BATCH_PATH: &str = "/api/admin/profiles/batch";

/// Errors that can occur when fetching profiles
#[derive(Debug, Error)]
pub enum ProfileError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Profile backend returned HTTP {0}")]
    Status(u16),

    /// More wallets than the backend accepts in one request
    #[error("Maximum {max} wallets allowed per request, got {requested}")]
    BatchTooLarge { requested: usize, max: usize },

    /// Backend answered `success: false`
    #[error("Profile backend reported failure: {0}")]
    Backend(String),
}

impl From<ProfileError> for BatchFetchError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::HttpError(e) => BatchFetchError::Transport(e.to_string()),
            ProfileError::Status(code) => BatchFetchError::Status(code),
            other => BatchFetchError::Rejected(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct ProfileBatchRequest<'a> {
    wallets: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ProfileBatchResponse {
    success: bool,
    #[serde(default)]
    data: Vec<ProfileData>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the profile batch endpoint
#[derive(Debug, Clone)]
pub struct ProfileClient {
    http_client: Client,
    base_url: String,
    auth: AdminAuth,
}

impl ProfileClient {
    /// Creates a new ProfileClient for the given API gateway
    pub fn new(base_url: impl Into<String>, auth: AdminAuth) -> Self {
        Self::with_client(Client::new(), base_url, auth)
    }

    /// Creates a new ProfileClient with a custom HTTP client
    pub fn with_client(http_client: Client, base_url: impl Into<String>, auth: AdminAuth) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Fetches profiles for up to `MAX_WALLETS_PER_REQUEST` wallets
    ///
    /// # Returns
    /// * `Ok(Vec<ProfileData>)` - One record per wallet the backend knows, any order
    /// * `Err(ProfileError)` - If the batch is too large or the request fails
    pub async fn fetch_profiles(&self, wallets: &[String]) -> Result<Vec<ProfileData>, ProfileError> {
        if wallets.is_empty() {
            return Ok(Vec::new());
        }
        if wallets.len() > MAX_WALLETS_PER_REQUEST {
            return Err(ProfileError::BatchTooLarge {
                requested: wallets.len(),
                max: MAX_WALLETS_PER_REQUEST,
            });
        }

        let url = format!("{}{}", self.base_url, PROFILE_BATCH_PATH);
        debug!(wallets = wallets.len(), url = %url, "requesting profile batch");

        let response = self
            .auth
            .decorate(self.http_client.post(&url))
            .json(&ProfileBatchRequest { wallets })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProfileError::Status(status.as_u16()));
        }

        let body: ProfileBatchResponse = response.json().await?;
        if !body.success {
            return Err(ProfileError::Backend(
                body.error
                    .or(body.message)
                    .unwrap_or_else(|| "Failed to fetch profile batch".to_string()),
            ));
        }

        Ok(body.data)
    }
}

#[async_trait]
impl BatchFetcher for ProfileClient {
    type Value = ProfileData;

    async fn fetch_batch(
        &self,
        keys: &[String],
    ) -> Result<BatchResponse<ProfileData>, BatchFetchError> {
        let profiles = self.fetch_profiles(keys).await?;
        let mut response = BatchResponse::new();
        for profile in profiles {
            response.resolve(profile.wallet.clone(), profile);
        }
        Ok(response)
    }

    fn placeholder(&self, key: &str) -> ProfileData {
        ProfileData::empty(key)
    }
}
