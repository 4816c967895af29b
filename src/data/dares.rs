//! Admin backend client for the dare listing
//!
//! The list endpoint pages forward only: callers pass the `tokenMint` of the last
//! row they saw as `cursor`. Disabled and expired dares are always included, as
//! moderators need to see them.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::{AdminAuth, DareFilter, DareItem};
use crate::pager::{PageCursor, PageFetchError, PageQuery, PageSource};

/// Largest page the backend serves
pub const MAX_PAGE_LIMIT: usize = 1000;

const DARE_LIST_PATH: &str = "/api/admin/dares/list";

/// Errors that can occur when listing dares
#[derive(Debug, Error)]
pub enum DareListError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("Dare list returned HTTP {0}")]
    Status(u16),

    /// Limit outside 1..=1000
    #[error("Limit must be an integer between 1 and 1000, got {0}")]
    InvalidLimit(usize),

    /// Backend answered `success: false`
    #[error("Dare list reported failure: {0}")]
    Backend(String),
}

#[derive(Debug, Deserialize)]
struct DaresListResponse {
    success: bool,
    #[serde(default)]
    data: Vec<DareItem>,
    #[serde(default)]
    message: Option<String>,
}

/// Client for the admin dare list endpoint
#[derive(Debug, Clone)]
pub struct DareListClient {
    http_client: Client,
    base_url: String,
    auth: AdminAuth,
}

impl DareListClient {
    pub fn new(base_url: impl Into<String>, auth: AdminAuth) -> Self {
        Self::with_client(Client::new(), base_url, auth)
    }

    pub fn with_client(http_client: Client, base_url: impl Into<String>, auth: AdminAuth) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    /// Fetches one page of dares
    pub async fn list_dares(
        &self,
        query: &PageQuery<DareFilter>,
    ) -> Result<Vec<DareItem>, DareListError> {
        if query.limit == 0 || query.limit > MAX_PAGE_LIMIT {
            return Err(DareListError::InvalidLimit(query.limit));
        }

        let url = format!("{}{}", self.base_url, DARE_LIST_PATH);
        let params = query_params(query);
        debug!(url = %url, ?params, "listing dares");

        let response = self
            .auth
            .decorate(self.http_client.get(&url))
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DareListError::Status(status.as_u16()));
        }

        let body: DaresListResponse = response.json().await?;
        if !body.success {
            return Err(DareListError::Backend(
                body.message
                    .unwrap_or_else(|| "Internal Server Error".to_string()),
            ));
        }
        Ok(body.data)
    }
}

/// Query string for one page request
fn query_params(query: &PageQuery<DareFilter>) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", query.limit.to_string())];
    if let Some(status) = query.filter.status {
        params.push(("status", status.as_str().to_string()));
    }
    if let Some(cursor) = &query.cursor {
        params.push(("cursor", cursor.as_str().to_string()));
    }
    if let Some(submission_status) = query.filter.effective_submission_status() {
        params.push(("submissionStatus", submission_status.as_str().to_string()));
    }
    params.push(("includeDisabled", "true".to_string()));
    params.push(("includeExpired", "true".to_string()));
    params
}

#[async_trait]
impl PageSource for DareListClient {
    type Item = DareItem;
    type Filter = DareFilter;

    async fn fetch_page(
        &self,
        query: &PageQuery<DareFilter>,
    ) -> Result<Vec<DareItem>, PageFetchError> {
        self.list_dares(query)
            .await
            .map_err(|e| PageFetchError(e.to_string()))
    }

    fn cursor_of(&self, item: &DareItem) -> PageCursor {
        PageCursor::new(item.token_mint.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DareStatus, SubmissionStatus};

    fn query(filter: DareFilter, cursor: Option<&str>) -> PageQuery<DareFilter> {
        PageQuery {
            cursor: cursor.map(PageCursor::from),
            limit: 50,
            filter,
        }
    }

    fn param<'a>(params: &'a [(&'static str, String)], name: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    #[test]
    fn test_first_page_params() {
        let params = query_params(&query(DareFilter::default(), None));
        assert_eq!(param(&params, "limit"), Some("50"));
        assert_eq!(param(&params, "cursor"), None);
        assert_eq!(param(&params, "status"), None);
        assert_eq!(param(&params, "includeDisabled"), Some("true"));
        assert_eq!(param(&params, "includeExpired"), Some("true"));
    }

    #[test]
    fn test_cursor_is_passed_verbatim() {
        let params = query_params(&query(DareFilter::default(), Some("Mint/+=abc")));
        assert_eq!(param(&params, "cursor"), Some("Mint/+=abc"));
    }

    #[test]
    fn test_submission_status_only_sent_for_accepted() {
        let open = DareFilter {
            status: Some(DareStatus::Open),
            submission_status: Some(SubmissionStatus::Pending),
        };
        let params = query_params(&query(open, None));
        assert_eq!(param(&params, "status"), Some("open"));
        assert_eq!(param(&params, "submissionStatus"), None);

        let accepted = DareFilter {
            status: Some(DareStatus::Accepted),
            ..open
        };
        let params = query_params(&query(accepted, None));
        assert_eq!(param(&params, "submissionStatus"), Some("PENDING"));
    }

    #[tokio::test]
    async fn test_limit_out_of_range_is_rejected() {
        let client = DareListClient::new("http://127.0.0.1:9", AdminAuth::none());
        let mut q = query(DareFilter::default(), None);
        q.limit = 1001;

        let err = client.list_dares(&q).await.unwrap_err();
        assert!(matches!(err, DareListError::InvalidLimit(1001)));
        assert!(err.to_string().contains("between 1 and 1000"));
    }

    #[test]
    fn test_cursor_of_uses_token_mint() {
        let client = DareListClient::new("http://localhost", AdminAuth::none());
        let item: DareItem = serde_json::from_str(
            r#"{"tokenMint":"MintX","creator":"C","dareStatus":"open"}"#,
        )
        .unwrap();
        assert_eq!(client.cursor_of(&item), PageCursor::from("MintX"));
    }
}
