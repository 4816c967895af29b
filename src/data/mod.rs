//! Core data models and backend clients
//!
//! This module contains the wire types shared by the admin backend clients
//! (dares, stats, profiles, notifications), the IPFS gateway client and the SOL price
//! client.

pub mod auth;
pub mod dares;
pub mod ipfs;
pub mod notifications;
pub mod profiles;
pub mod sol_price;
pub mod stats;

pub use auth::AdminAuth;
pub use dares::{DareListClient, DareListError};
pub use ipfs::{IpfsClient, IpfsError};
pub use notifications::{NotificationClient, NotificationError, NotificationRequest, NotificationType};
pub use profiles::{ProfileClient, ProfileError};
pub use sol_price::{PriceCache, PriceError, PriceSource, SolPriceClient};
pub use stats::{DareStats, DareStatsClient, DareStatsSummary, StatsError};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Public profile attached to a wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileData {
    pub wallet: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_cid: Option<String>,
    #[serde(default)]
    pub twitter: Option<String>,
}

impl ProfileData {
    /// Profile with every optional field empty
    pub fn empty(wallet: impl Into<String>) -> Self {
        Self {
            wallet: wallet.into(),
            username: None,
            display_name: None,
            avatar_cid: None,
            twitter: None,
        }
    }
}

/// Rules block inside dare metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataProperties {
    #[serde(default)]
    pub rules: Vec<String>,
}

/// JSON document a dare's IPFS CID points at
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DareMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: MetadataProperties,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    /// Fields this crate does not model
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl DareMetadata {
    /// Placeholder for content that could not be fetched
    pub fn unavailable() -> Self {
        Self {
            title: Some(String::new()),
            description: Some(String::new()),
            ..Default::default()
        }
    }

    /// Name if set, else title; `None` when both are blank
    pub fn display_title(&self) -> Option<&str> {
        self.name
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.title.as_deref().filter(|s| !s.trim().is_empty()))
    }
}

/// Lifecycle state of a dare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DareStatus {
    Unverified,
    Censored,
    Open,
    Accepted,
    Completed,
    Failed,
    Withdrawn,
    Expired,
}

impl DareStatus {
    pub const ALL: [DareStatus; 8] = [
        DareStatus::Unverified,
        DareStatus::Censored,
        DareStatus::Open,
        DareStatus::Accepted,
        DareStatus::Completed,
        DareStatus::Failed,
        DareStatus::Withdrawn,
        DareStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DareStatus::Unverified => "unverified",
            DareStatus::Censored => "censored",
            DareStatus::Open => "open",
            DareStatus::Accepted => "accepted",
            DareStatus::Completed => "completed",
            DareStatus::Failed => "failed",
            DareStatus::Withdrawn => "withdrawn",
            DareStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for DareStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DareStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        DareStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == lower)
            .ok_or_else(|| {
                let valid: Vec<&str> = DareStatus::ALL.iter().map(DareStatus::as_str).collect();
                format!("invalid dare status '{}'. Valid: {}", s, valid.join(", "))
            })
    }
}

/// Review state of submissions on an accepted dare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "APPROVED")]
    Approved,
    #[serde(rename = "REJECTED")]
    Rejected,
    #[serde(rename = "WINNER")]
    Winner,
    #[serde(rename = "all")]
    All,
}

impl SubmissionStatus {
    pub const ALL: [SubmissionStatus; 5] = [
        SubmissionStatus::All,
        SubmissionStatus::Pending,
        SubmissionStatus::Approved,
        SubmissionStatus::Rejected,
        SubmissionStatus::Winner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "PENDING",
            SubmissionStatus::Approved => "APPROVED",
            SubmissionStatus::Rejected => "REJECTED",
            SubmissionStatus::Winner => "WINNER",
            SubmissionStatus::All => "all",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        SubmissionStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                format!(
                    "invalid submission status '{}'. Valid: PENDING, APPROVED, REJECTED, WINNER, all",
                    s
                )
            })
    }
}

/// A dare row as listed by the admin backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DareItem {
    pub token_mint: String,
    pub creator: String,
    pub dare_status: DareStatus,
    #[serde(default)]
    pub trade_status: String,
    /// Lamports, as a decimal string
    #[serde(default)]
    pub payout: String,
    #[serde(default)]
    pub open_timestamp: i64,
    #[serde(default)]
    pub open_duration: i64,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub is_disabled: Option<bool>,
    #[serde(default)]
    pub submitters: Vec<Option<String>>,
    #[serde(default)]
    pub ipfs_cid: String,
    #[serde(default)]
    pub is_tokenless: Option<bool>,
    #[serde(default)]
    pub is_featured: Option<bool>,
}

/// Filters applied to the dare listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DareFilter {
    pub status: Option<DareStatus>,
    pub submission_status: Option<SubmissionStatus>,
}

impl DareFilter {
    /// Submission filter as sent to the backend; only meaningful for accepted dares
    pub fn effective_submission_status(&self) -> Option<SubmissionStatus> {
        match self.status {
            Some(DareStatus::Accepted) => self.submission_status,
            _ => None,
        }
    }

    /// Next status in the cycle all → unverified → … → expired → all
    pub fn cycle_status(self) -> Self {
        let status = match self.status {
            None => Some(DareStatus::ALL[0]),
            Some(current) => {
                let index = DareStatus::ALL.iter().position(|s| *s == current).unwrap_or(0);
                DareStatus::ALL.get(index + 1).copied()
            }
        };
        // Leaving accepted drops the submission filter
        let submission_status = if status == Some(DareStatus::Accepted) {
            self.submission_status
        } else {
            None
        };
        Self {
            status,
            submission_status,
        }
    }

    /// Next submission filter; unchanged unless the status filter is accepted
    pub fn cycle_submission_status(self) -> Self {
        if self.status != Some(DareStatus::Accepted) {
            return self;
        }
        let next = match self.submission_status {
            None => SubmissionStatus::ALL[1],
            Some(current) => {
                let index = SubmissionStatus::ALL
                    .iter()
                    .position(|s| *s == current)
                    .unwrap_or(0);
                SubmissionStatus::ALL[(index + 1) % SubmissionStatus::ALL.len()]
            }
        };
        Self {
            submission_status: Some(next),
            ..self
        }
    }
}
