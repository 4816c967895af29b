//! Cursor-based pagination over list endpoints that only page forward
//!
//! The backend hands out no offsets and no totals. The next cursor is the key of
//! the last row on the current page, and a full page is the only hint that more
//! rows may follow. Going back is handled locally by remembering the cursors the
//! pager moved forward from.

use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;
use tracing::{debug, warn};

/// Opaque position token issued by the backend
///
/// Only ever passed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageCursor(String);

impl PageCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageCursor {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl std::fmt::Display for PageCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Failure of a single page request
#[derive(Debug, Clone, Error, PartialEq)]
#[error("failed to fetch page: {0}")]
pub struct PageFetchError(pub String);

/// Everything a page request carries
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery<F> {
    pub cursor: Option<PageCursor>,
    pub limit: usize,
    pub filter: F,
}

/// Backend seam for a `CursorPager`
#[async_trait]
pub trait PageSource: Send + Sync {
    type Item: Clone + Send + Sync;
    type Filter: Clone + Debug + PartialEq + Send + Sync;

    async fn fetch_page(
        &self,
        query: &PageQuery<Self::Filter>,
    ) -> Result<Vec<Self::Item>, PageFetchError>;

    /// Cursor that continues after `item`
    fn cursor_of(&self, item: &Self::Item) -> PageCursor;
}

/// Navigation bookkeeping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PagerState {
    pub current_cursor: Option<PageCursor>,
    pub back_stack: Vec<PageCursor>,
    pub next_cursor: Option<PageCursor>,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PagerState {
    /// 1-based page number implied by the history
    pub fn page_number(&self) -> usize {
        match self.current_cursor {
            None => 1,
            Some(_) => self.back_stack.len() + 2,
        }
    }
}

/// Where the pager is in its fetch cycle
#[derive(Debug, Clone, PartialEq)]
pub enum PagerStatus {
    Idle,
    Loading,
    Loaded,
    Error(String),
}

/// How a successful fetch moves the history
#[derive(Debug, Clone, Copy, PartialEq)]
enum Move {
    Reset,
    Forward,
    /// Back to the tail of `back_stack`
    BackPop,
    /// Back to the first page when no history is left
    BackToFirst,
    Stay,
}

/// Drives forward/backward traversal of a `PageSource`
pub struct CursorPager<S: PageSource> {
    source: S,
    page_size: usize,
    filter: S::Filter,
    state: PagerState,
    status: PagerStatus,
    rows: Vec<S::Item>,
}

impl<S: PageSource> CursorPager<S> {
    pub fn new(source: S, page_size: usize, filter: S::Filter) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
            filter,
            state: PagerState::default(),
            status: PagerStatus::Idle,
            rows: Vec::new(),
        }
    }

    pub fn rows(&self) -> &[S::Item] {
        &self.rows
    }

    pub fn state(&self) -> &PagerState {
        &self.state
    }

    pub fn status(&self) -> &PagerStatus {
        &self.status
    }

    pub fn filter(&self) -> &S::Filter {
        &self.filter
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Lets callers patch a row in place (e.g. after a moderation action)
    pub fn rows_mut(&mut self) -> &mut [S::Item] {
        &mut self.rows
    }

    /// Starts over from the first page under `filter`
    ///
    /// History is cleared before the request goes out: cursors from another
    /// filter's ordering must never be replayed.
    pub async fn reset_and_fetch(&mut self, filter: S::Filter) -> Result<(), PageFetchError> {
        self.filter = filter;
        self.state = PagerState::default();
        self.load(None, Move::Reset).await
    }

    /// Changes the page size and starts over from the first page
    ///
    /// Cursors from the old page boundaries are dropped along with the history.
    pub async fn resize_and_fetch(&mut self, page_size: usize) -> Result<(), PageFetchError> {
        self.page_size = page_size.max(1);
        let filter = self.filter.clone();
        self.reset_and_fetch(filter).await
    }

    /// Moves one page forward; no-op without a known next page
    pub async fn go_next(&mut self) -> Result<(), PageFetchError> {
        let next = match (&self.state.next_cursor, self.state.has_next) {
            (Some(cursor), true) => cursor.clone(),
            _ => {
                debug!("go_next ignored: no next page");
                return Ok(());
            }
        };
        self.load(Some(next), Move::Forward).await
    }

    /// Moves one page back; no-op on the first page
    pub async fn go_prev(&mut self) -> Result<(), PageFetchError> {
        if !self.state.has_prev {
            debug!("go_prev ignored: already on first page");
            return Ok(());
        }
        match self.state.back_stack.last() {
            Some(cursor) => {
                let cursor = cursor.clone();
                self.load(Some(cursor), Move::BackPop).await
            }
            None => self.load(None, Move::BackToFirst).await,
        }
    }

    /// Fetches the current page again without moving
    pub async fn reload(&mut self) -> Result<(), PageFetchError> {
        let cursor = self.state.current_cursor.clone();
        self.load(cursor, Move::Stay).await
    }

    async fn load(&mut self, cursor: Option<PageCursor>, movement: Move) -> Result<(), PageFetchError> {
        self.status = PagerStatus::Loading;
        let query = PageQuery {
            cursor: cursor.clone(),
            limit: self.page_size,
            filter: self.filter.clone(),
        };

        let rows = match self.source.fetch_page(&query).await {
            Ok(rows) => rows,
            Err(err) => {
                warn!(cursor = ?cursor, error = %err, "page fetch failed");
                self.status = PagerStatus::Error(err.to_string());
                return Err(err);
            }
        };

        match movement {
            Move::Reset | Move::BackToFirst => {
                self.state.back_stack.clear();
            }
            Move::Forward => {
                if let Some(previous) = self.state.current_cursor.take() {
                    self.state.back_stack.push(previous);
                }
            }
            Move::BackPop => {
                self.state.back_stack.pop();
            }
            Move::Stay => {}
        }

        self.state.current_cursor = cursor;
        self.state.has_next = rows.len() == self.page_size;
        self.state.next_cursor = rows.last().map(|item| self.source.cursor_of(item));
        self.state.has_prev =
            !self.state.back_stack.is_empty() || self.state.current_cursor.is_some();
        self.rows = rows;
        self.status = PagerStatus::Loaded;

        debug!(
            page = self.state.page_number(),
            rows = self.rows.len(),
            has_next = self.state.has_next,
            has_prev = self.state.has_prev,
            "page loaded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        key: String,
        colour: &'static str,
    }

    /// In-memory ordered table paged by "rows after key"
    struct TableSource {
        rows: Vec<Row>,
        fail: AtomicBool,
        calls: AtomicUsize,
        queries: Mutex<Vec<PageQuery<Option<&'static str>>>>,
    }

    impl TableSource {
        fn new(count: usize) -> Self {
            let rows = (0..count)
                .map(|i| Row {
                    key: format!("mint-{:04}", i),
                    colour: if i % 2 == 0 { "red" } else { "blue" },
                })
                .collect();
            Self {
                rows,
                fail: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                queries: Mutex::new(Vec::new()),
            }
        }

        fn last_query(&self) -> PageQuery<Option<&'static str>> {
            self.queries.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl PageSource for TableSource {
        type Item = Row;
        type Filter = Option<&'static str>;

        async fn fetch_page(
            &self,
            query: &PageQuery<Self::Filter>,
        ) -> Result<Vec<Row>, PageFetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.clone());
            if self.fail.load(Ordering::SeqCst) {
                return Err(PageFetchError("HTTP 502".to_string()));
            }
            let rows = self
                .rows
                .iter()
                .filter(|row| query.filter.map_or(true, |colour| row.colour == colour))
                .filter(|row| {
                    query
                        .cursor
                        .as_ref()
                        .map_or(true, |cursor| row.key.as_str() > cursor.as_str())
                })
                .take(query.limit)
                .cloned()
                .collect();
            Ok(rows)
        }

        fn cursor_of(&self, item: &Row) -> PageCursor {
            PageCursor::new(item.key.clone())
        }
    }

    fn keys(rows: &[Row]) -> Vec<&str> {
        rows.iter().map(|row| row.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_initial_state_is_idle() {
        let pager = CursorPager::new(TableSource::new(10), 5, None);
        assert_eq!(pager.status(), &PagerStatus::Idle);
        assert!(pager.rows().is_empty());
        assert!(!pager.state().has_next);
        assert!(!pager.state().has_prev);
    }

    #[tokio::test]
    async fn test_full_page_sets_has_next_short_page_clears_it() {
        let mut pager = CursorPager::new(TableSource::new(87), 50, None);

        pager.reset_and_fetch(None).await.unwrap();
        assert_eq!(pager.rows().len(), 50);
        assert!(pager.state().has_next);

        pager.go_next().await.unwrap();
        assert_eq!(pager.rows().len(), 37);
        assert!(!pager.state().has_next);
    }

    #[tokio::test]
    async fn test_next_cursor_is_last_row_key() {
        let mut pager = CursorPager::new(TableSource::new(20), 5, None);

        pager.reset_and_fetch(None).await.unwrap();

        assert_eq!(pager.state().next_cursor, Some(PageCursor::from("mint-0004")));
        pager.go_next().await.unwrap();
        assert_eq!(pager.source().last_query().cursor, Some(PageCursor::from("mint-0004")));
        assert_eq!(keys(pager.rows())[0], "mint-0005");
    }

    #[tokio::test]
    async fn test_next_then_prev_reproduces_first_page() {
        let mut pager = CursorPager::new(TableSource::new(20), 5, None);

        pager.reset_and_fetch(None).await.unwrap();
        let first_rows = pager.rows().to_vec();
        let first_cursor = pager.state().current_cursor.clone();

        pager.go_next().await.unwrap();
        assert!(pager.state().has_prev);
        pager.go_prev().await.unwrap();

        assert_eq!(pager.rows(), first_rows.as_slice());
        assert_eq!(pager.state().current_cursor, first_cursor);
        assert!(!pager.state().has_prev);
    }

    #[tokio::test]
    async fn test_back_stack_walks_back_page_by_page() {
        let mut pager = CursorPager::new(TableSource::new(30), 5, None);
        pager.reset_and_fetch(None).await.unwrap();
        pager.go_next().await.unwrap();
        let second_page = pager.rows().to_vec();
        pager.go_next().await.unwrap();
        pager.go_next().await.unwrap();

        assert_eq!(pager.state().page_number(), 4);
        assert_eq!(pager.state().back_stack.len(), 2);

        pager.go_prev().await.unwrap();
        pager.go_prev().await.unwrap();
        assert_eq!(pager.rows(), second_page.as_slice());
        assert_eq!(pager.state().page_number(), 2);
        assert!(pager.state().back_stack.is_empty());

        pager.go_prev().await.unwrap();
        assert_eq!(pager.state().page_number(), 1);
        assert_eq!(keys(pager.rows())[0], "mint-0000");
    }

    #[tokio::test]
    async fn test_page_size_change_resets_history_and_keeps_filter() {
        let mut pager = CursorPager::new(TableSource::new(40), 5, None);
        pager.reset_and_fetch(Some("blue")).await.unwrap();
        pager.go_next().await.unwrap();
        pager.go_next().await.unwrap();

        pager.resize_and_fetch(10).await.unwrap();

        assert_eq!(pager.page_size(), 10);
        assert_eq!(pager.state().page_number(), 1);
        assert!(pager.state().back_stack.is_empty());
        assert!(!pager.state().has_prev);
        let query = pager.source().last_query();
        assert_eq!(query.cursor, None);
        assert_eq!(query.limit, 10);
        assert_eq!(query.filter, Some("blue"));
        assert_eq!(pager.rows().len(), 10);
        assert!(pager.state().has_next);
    }

    #[tokio::test]
    async fn test_filter_change_resets_history() {
        let mut pager = CursorPager::new(TableSource::new(40), 5, None);
        pager.reset_and_fetch(None).await.unwrap();
        pager.go_next().await.unwrap();
        pager.go_next().await.unwrap();

        pager.reset_and_fetch(Some("red")).await.unwrap();

        assert!(pager.state().back_stack.is_empty());
        assert_eq!(pager.state().current_cursor, None);
        assert!(!pager.state().has_prev);
        let query = pager.source().last_query();
        assert_eq!(query.cursor, None);
        assert_eq!(query.filter, Some("red"));
        assert!(pager.rows().iter().all(|row| row.colour == "red"));

        let calls = pager.source().calls.load(Ordering::SeqCst);
        pager.go_prev().await.unwrap();
        assert_eq!(pager.source().calls.load(Ordering::SeqCst), calls, "go_prev is a no-op");
    }

    #[tokio::test]
    async fn test_go_next_without_next_page_is_noop() {
        let mut pager = CursorPager::new(TableSource::new(3), 5, None);
        pager.reset_and_fetch(None).await.unwrap();

        pager.go_next().await.unwrap();

        assert_eq!(pager.source().calls.load(Ordering::SeqCst), 1);
        assert_eq!(pager.rows().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_rows_and_state() {
        let mut pager = CursorPager::new(TableSource::new(30), 5, None);
        pager.reset_and_fetch(None).await.unwrap();
        pager.go_next().await.unwrap();
        let rows_before = pager.rows().to_vec();
        let state_before = pager.state().clone();

        pager.source().fail.store(true, Ordering::SeqCst);
        let result = pager.go_next().await;

        assert!(result.is_err());
        assert!(matches!(pager.status(), PagerStatus::Error(_)));
        assert_eq!(pager.rows(), rows_before.as_slice());
        assert_eq!(pager.state(), &state_before);

        // Retry from the same place once the backend recovers
        pager.source().fail.store(false, Ordering::SeqCst);
        pager.go_next().await.unwrap();
        assert_eq!(pager.status(), &PagerStatus::Loaded);
        assert_eq!(pager.state().page_number(), 3);
    }

    #[tokio::test]
    async fn test_failed_prev_does_not_pop_history() {
        let mut pager = CursorPager::new(TableSource::new(30), 5, None);
        pager.reset_and_fetch(None).await.unwrap();
        pager.go_next().await.unwrap();
        pager.go_next().await.unwrap();

        pager.source().fail.store(true, Ordering::SeqCst);
        assert!(pager.go_prev().await.is_err());
        assert_eq!(pager.state().back_stack.len(), 1);
    }

    #[tokio::test]
    async fn test_reload_keeps_position() {
        let mut pager = CursorPager::new(TableSource::new(30), 5, None);
        pager.reset_and_fetch(None).await.unwrap();
        pager.go_next().await.unwrap();
        let state_before = pager.state().clone();

        pager.reload().await.unwrap();

        assert_eq!(pager.state(), &state_before);
        assert_eq!(pager.source().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_empty_result_has_no_next_cursor() {
        let mut pager = CursorPager::new(TableSource::new(0), 5, None);
        pager.reset_and_fetch(None).await.unwrap();

        assert!(pager.rows().is_empty());
        assert_eq!(pager.state().next_cursor, None);
        assert!(!pager.state().has_next);
    }

    #[test]
    fn test_page_number_from_history() {
        let state = PagerState {
            current_cursor: Some(PageCursor::from("b")),
            back_stack: vec![PageCursor::from("a")],
            ..Default::default()
        };
        assert_eq!(state.page_number(), 3);
        assert_eq!(PagerState::default().page_number(), 1);
    }
}
