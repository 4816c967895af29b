//! Application state management for the dare admin console
//!
//! This module contains the main application state, handling keyboard input,
//! page navigation and the enrichment of listed dares with creator profiles,
//! titles and USD prices. Aggregate statistics load with the first page and on
//! every reload.

use chrono::{DateTime, Local};
use crossterm::event::{KeyCode, KeyEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{BatchedTtlCache, SystemClock};
use crate::config::Config;
use crate::data::ipfs::is_valid_cid;
use crate::data::{
    DareFilter, DareItem, DareListClient, DareStats, DareStatsClient, DareStatsSummary, DareStatus,
    IpfsClient, PriceCache, ProfileClient, ProfileData, SolPriceClient,
};
use crate::pager::{CursorPager, PagerState, PagerStatus};
use crate::titles::TitleLoader;

/// Application state enum representing the current view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppState {
    /// Waiting for the first page
    Loading,
    /// Dare table
    DareList,
}

/// Rows per page offered by the page size selector
pub const PAGE_SIZE_OPTIONS: [usize; 5] = [25, 50, 100, 500, 1000];

/// Page movement requested by a key press, run by the event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAction {
    /// Apply a new filter and start from the first page
    Reset(DareFilter),
    /// Change rows per page and start from the first page
    Resize(usize),
    Next,
    Prev,
    Reload,
}

/// Main application struct managing state and data
pub struct App {
    /// Current application state/view
    pub state: AppState,
    /// Index of the selected row on the current page
    pub selected_index: usize,
    /// Flag indicating the application should quit
    pub should_quit: bool,
    /// Flag to show help overlay
    pub show_help: bool,
    /// Last error or hint, shown in the status line
    pub status_message: Option<String>,
    /// Timestamp of the last successful page load
    pub last_refresh: Option<DateTime<Local>>,
    /// SOL/USD price used for the payout column
    pub sol_price: Option<f64>,
    /// Last aggregate statistics fetched from the backend
    pub stats: Option<DareStats>,
    pending: Option<PendingAction>,
    pager: CursorPager<DareListClient>,
    profiles: BatchedTtlCache<ProfileClient>,
    creator_profiles: HashMap<String, ProfileData>,
    titles: TitleLoader<IpfsClient>,
    dare_titles: HashMap<String, Option<String>>,
    price: PriceCache<SolPriceClient>,
    stats_client: DareStatsClient,
}

impl App {
    /// Creates a new App wired to the configured backends
    pub fn from_config(config: &Config, api_gateway: &str) -> Self {
        let auth = config.auth();
        let dares = DareListClient::new(api_gateway, auth.clone());
        let stats = DareStatsClient::new(api_gateway, auth.clone());
        let profiles = BatchedTtlCache::new(
            ProfileClient::new(api_gateway, auth),
            config.profile_cache(),
        );
        let metadata = BatchedTtlCache::new(
            IpfsClient::new(config.ipfs_gateway.as_deref()).with_timeout(config.ipfs_timeout()),
            config.metadata_cache(),
        );
        let price = PriceCache::with_clock(
            SolPriceClient::new(),
            config.sol_price_ttl(),
            Arc::new(SystemClock),
        );
        Self::with_clients(dares, stats, profiles, metadata, price, config.page_size)
    }

    /// Creates a new App instance with explicit clients
    pub fn with_clients(
        dares: DareListClient,
        stats: DareStatsClient,
        profiles: BatchedTtlCache<ProfileClient>,
        metadata: BatchedTtlCache<IpfsClient>,
        price: PriceCache<SolPriceClient>,
        page_size: usize,
    ) -> Self {
        Self {
            state: AppState::Loading,
            selected_index: 0,
            should_quit: false,
            show_help: false,
            status_message: None,
            last_refresh: None,
            sol_price: None,
            stats: None,
            pending: Some(PendingAction::Reset(DareFilter::default())),
            pager: CursorPager::new(dares, page_size, DareFilter::default()),
            profiles,
            creator_profiles: HashMap::new(),
            titles: TitleLoader::new(metadata),
            dare_titles: HashMap::new(),
            price,
            stats_client: stats,
        }
    }

    pub fn rows(&self) -> &[DareItem] {
        self.pager.rows()
    }

    pub fn pager_state(&self) -> &PagerState {
        self.pager.state()
    }

    pub fn pager_status(&self) -> &PagerStatus {
        self.pager.status()
    }

    pub fn filter(&self) -> &DareFilter {
        self.pager.filter()
    }

    pub fn page_size(&self) -> usize {
        self.pager.page_size()
    }

    /// Statistics with payouts converted at the current SOL price
    pub fn stats_summary(&self) -> Option<DareStatsSummary> {
        self.stats.as_ref().map(|stats| stats.summarize(self.sol_price))
    }

    pub fn pending(&self) -> Option<PendingAction> {
        self.pending
    }

    /// Returns the currently selected dare, if any
    pub fn selected_dare(&self) -> Option<&DareItem> {
        self.rows().get(self.selected_index)
    }

    /// Profile of a creator, once the batch lookup has resolved it
    pub fn creator_profile(&self, wallet: &str) -> Option<&ProfileData> {
        self.creator_profiles.get(wallet)
    }

    /// Title state of a CID: `None` while loading, `Some(None)` without a title
    pub fn dare_title(&self, cid: &str) -> Option<Option<&str>> {
        self.dare_titles.get(cid).map(|title| title.as_deref())
    }

    pub fn titles_loading(&self) -> bool {
        self.titles.is_loading()
    }

    /// Handles keyboard input
    pub fn handle_key(&mut self, key_event: KeyEvent) {
        if self.show_help {
            if matches!(
                key_event.code,
                KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')
            ) {
                self.show_help = false;
            }
            return;
        }

        match key_event.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_selection_up();
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_selection_down();
            }
            KeyCode::Right | KeyCode::Char('n') => {
                if self.pager.state().has_next {
                    self.request(PendingAction::Next);
                }
            }
            KeyCode::Left | KeyCode::Char('p') => {
                if self.pager.state().has_prev {
                    self.request(PendingAction::Prev);
                }
            }
            KeyCode::Char('s') => {
                let filter = self.target_filter().cycle_status();
                self.request(PendingAction::Reset(filter));
            }
            KeyCode::Char('u') => {
                let target = self.target_filter();
                if target.status == Some(DareStatus::Accepted) {
                    let filter = target.cycle_submission_status();
                    self.request(PendingAction::Reset(filter));
                } else {
                    self.status_message =
                        Some("Submission filter applies to accepted dares only".to_string());
                }
            }
            KeyCode::Char('z') => {
                let size = next_page_size(self.target_page_size());
                self.request(PendingAction::Resize(size));
            }
            KeyCode::Char('r') => {
                self.request(PendingAction::Reload);
            }
            KeyCode::Char('?') => {
                self.show_help = true;
            }
            _ => {}
        }
    }

    /// Filter of a queued reset, else the one currently shown
    fn target_filter(&self) -> DareFilter {
        match self.pending {
            Some(PendingAction::Reset(filter)) => filter,
            _ => *self.pager.filter(),
        }
    }

    /// Page size of a queued resize, else the current one
    fn target_page_size(&self) -> usize {
        match self.pending {
            Some(PendingAction::Resize(size)) => size,
            _ => self.pager.page_size(),
        }
    }

    /// Queues a page movement; a newer request replaces one not yet started
    fn request(&mut self, action: PendingAction) {
        if self.pager.status() == &PagerStatus::Loading {
            return;
        }
        self.pending = Some(action);
    }

    /// Runs the queued page movement, if any
    ///
    /// Errors stay on screen in the status line; the table keeps the last good
    /// page.
    pub async fn process_pending(&mut self) {
        let Some(action) = self.pending.take() else {
            return;
        };
        debug!(?action, "processing page action");

        let result = match action {
            PendingAction::Reset(filter) => self.pager.reset_and_fetch(filter).await,
            PendingAction::Resize(size) => self.pager.resize_and_fetch(size).await,
            PendingAction::Next => self.pager.go_next().await,
            PendingAction::Prev => self.pager.go_prev().await,
            PendingAction::Reload => self.pager.reload().await,
        };
        self.state = AppState::DareList;

        match result {
            Ok(()) => {
                self.status_message = None;
                self.last_refresh = Some(Local::now());
                if action == PendingAction::Reload {
                    self.selected_index = self.selected_index.min(self.rows().len().saturating_sub(1));
                } else {
                    self.selected_index = 0;
                }
                let refresh_stats = self.stats.is_none() || action == PendingAction::Reload;
                self.enrich_rows(refresh_stats).await;
            }
            Err(err) => {
                warn!(?action, error = %err, "page action failed");
                self.status_message = Some(err.to_string());
            }
        }
    }

    /// Resolves creators and the SOL price, refreshes stats when asked, and starts
    /// title lookups
    async fn enrich_rows(&mut self, refresh_stats: bool) {
        let creators: Vec<String> = self.rows().iter().map(|d| d.creator.clone()).collect();
        let cids: Vec<String> = self
            .rows()
            .iter()
            .map(|d| d.ipfs_cid.clone())
            .filter(|cid| is_valid_cid(cid) && !self.dare_titles.contains_key(cid))
            .collect();

        self.titles.request(cids);
        let stats_client = &self.stats_client;
        let stats = async {
            if refresh_stats {
                Some(stats_client.fetch_stats().await)
            } else {
                None
            }
        };
        let (profiles, price, stats) =
            futures::join!(self.profiles.get_many(&creators), self.price.get_price(), stats);
        self.creator_profiles.extend(profiles);
        if price.is_some() {
            self.sol_price = price;
        }
        match stats {
            Some(Ok(stats)) => self.stats = Some(stats),
            Some(Err(err)) => warn!(error = %err, "dare stats unavailable"),
            None => {}
        }
    }

    /// Applies title lookups that finished since the last call
    pub fn poll_titles(&mut self) -> bool {
        match self.titles.try_recv() {
            Some(batch) => {
                self.dare_titles.extend(batch.titles);
                true
            }
            None => false,
        }
    }

    /// Waits for the outstanding title lookup and applies it
    pub async fn wait_for_titles(&mut self) {
        if let Some(batch) = self.titles.recv().await {
            self.dare_titles.extend(batch.titles);
        }
    }

    fn move_selection_up(&mut self) {
        let count = self.rows().len();
        if count == 0 {
            return;
        }
        self.selected_index = if self.selected_index == 0 {
            count - 1
        } else {
            self.selected_index - 1
        };
    }

    fn move_selection_down(&mut self) {
        let count = self.rows().len();
        if count == 0 {
            return;
        }
        self.selected_index = (self.selected_index + 1) % count;
    }
}

/// Next entry of `PAGE_SIZE_OPTIONS` above `current`, wrapping to the smallest
fn next_page_size(current: usize) -> usize {
    PAGE_SIZE_OPTIONS
        .into_iter()
        .find(|&size| size > current)
        .unwrap_or(PAGE_SIZE_OPTIONS[0])
}
