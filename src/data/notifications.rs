//! User notifications sent after moderation actions
//!
//! Notifications are best effort. `send` reports failure as `false` instead of an
//! error, and `dispatch_detached` runs it on its own task so the caller's action
//! never waits on it. The `notify` command uses `try_send` so failures reach the
//! exit code; `dispatch_detached` is library surface for callers that must not
//! block on the backend.

use reqwest::Client;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::AdminAuth;

const NOTIFICATIONS_PATH: &str = "/api/notifications";

/// Kinds of notification the backend understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    WinnerSelectedSubmitter,
    WinnerSelectedCreator,
    SubmissionApprovedSubmitter,
    SubmissionApprovedCreator,
    SubmissionVoidedSubmitter,
    SubmissionVoidedCreator,
    SubmissionRejectedSubmitter,
    SubmissionRejectedCreator,
    TokenlessDareAcceptedPlayer,
    TokenlessDareAcceptedCreator,
    TokenizedDareAcceptedPlayer,
    TokenizedDareAcceptedCreator,
    DareSubmitted,
    DareApproved,
    DareRejected,
    DareAccepted,
    SubmissionApproved,
    SubmissionRejected,
    SubmissionWinner,
    DareCompleted,
    DareFailed,
    DareWithdrawn,
    GeneralAlert,
}

impl FromStr for NotificationType {
    type Err = String;

    /// Accepts the wire name in any case, with `-` or `_` separators
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wire = s.trim().to_ascii_uppercase().replace('-', "_");
        serde_json::from_value(serde_json::Value::String(wire))
            .map_err(|_| format!("invalid notification type '{}'", s))
    }
}

/// Body of a notification request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub wallet: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dare_mint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

impl NotificationRequest {
    pub fn new(wallet: impl Into<String>, kind: NotificationType) -> Self {
        Self {
            wallet: wallet.into(),
            kind,
            dare_mint: None,
            remarks: None,
        }
    }

    pub fn with_dare_mint(mut self, dare_mint: impl Into<String>) -> Self {
        self.dare_mint = Some(dare_mint.into()).filter(|m: &String| !m.is_empty());
        self
    }

    pub fn with_remarks(mut self, remarks: impl Into<String>) -> Self {
        self.remarks = Some(remarks.into()).filter(|r: &String| !r.is_empty());
        self
    }
}

#[derive(Debug, Deserialize)]
struct NotificationResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Errors that can occur when sending a notification
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Notification backend returned HTTP {0}")]
    Status(u16),

    #[error("Notification backend reported failure: {0}")]
    Backend(String),
}

/// Client for the notification endpoint
#[derive(Debug, Clone)]
pub struct NotificationClient {
    http_client: Client,
    base_url: String,
    auth: AdminAuth,
}

impl NotificationClient {
    pub fn new(base_url: impl Into<String>, auth: AdminAuth) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Sends a notification, reporting the exact failure
    pub async fn try_send(&self, request: &NotificationRequest) -> Result<(), NotificationError> {
        if request.wallet.trim().is_empty() {
            return Err(NotificationError::MissingParameter("wallet"));
        }

        let url = format!("{}{}", self.base_url, NOTIFICATIONS_PATH);
        let response = self
            .auth
            .decorate(self.http_client.post(&url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Status(status.as_u16()));
        }

        let body: NotificationResponse = response.json().await?;
        if body.success {
            Ok(())
        } else {
            Err(NotificationError::Backend(
                body.error
                    .or(body.message)
                    .unwrap_or_else(|| "unsuccessful response".to_string()),
            ))
        }
    }

    /// Sends a notification; failures are logged and reported as `false`
    pub async fn send(&self, request: &NotificationRequest) -> bool {
        match self.try_send(request).await {
            Ok(()) => {
                info!(kind = ?request.kind, wallet = %request.wallet, "notification sent");
                true
            }
            Err(err) => {
                warn!(
                    kind = ?request.kind,
                    wallet = %request.wallet,
                    dare_mint = ?request.dare_mint,
                    error = %err,
                    "notification failed"
                );
                false
            }
        }
    }

    /// Sends on a detached task; the caller never awaits the outcome
    pub fn dispatch_detached(&self, request: NotificationRequest) -> JoinHandle<bool> {
        let client = self.clone();
        tokio::spawn(async move { client.send(&request).await })
    }
}
