//! In-memory TTL cache that resolves misses through batched backend calls
//!
//! `BatchedTtlCache` answers `get_many` from fresh entries where it can and sends
//! every remaining key to its `BatchFetcher` in as few calls as the configured
//! maximum batch size allows. Results are always total over the requested keys:
//! anything the backend could not resolve comes back as the fetcher's placeholder.
//!
//! Misses that overlap a batch already in flight wait on that batch instead of
//! issuing their own request. Each batch runs on its own tokio task and writes its
//! results into the cache itself, so entries land even if every caller goes away.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};

/// Whole-batch failure reported by a `BatchFetcher`
///
/// Never surfaced to `get_many` callers; the affected keys get placeholders.
#[derive(Debug, Error)]
pub enum BatchFetchError {
    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status code
    #[error("backend returned HTTP {0}")]
    Status(u16),

    /// The backend answered but flagged the request as unsuccessful
    #[error("backend rejected batch: {0}")]
    Rejected(String),
}

/// Per-key outcome of one backend batch call
///
/// Keys in neither `resolved` nor `failed` are treated as unanswered and receive a
/// placeholder that expires with the normal TTL.
#[derive(Debug)]
pub struct BatchResponse<V> {
    pub resolved: HashMap<String, V>,
    pub failed: HashSet<String>,
}

impl<V> Default for BatchResponse<V> {
    fn default() -> Self {
        Self {
            resolved: HashMap::new(),
            failed: HashSet::new(),
        }
    }
}

impl<V> BatchResponse<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&mut self, key: impl Into<String>, value: V) {
        self.resolved.insert(key.into(), value);
    }

    pub fn fail(&mut self, key: impl Into<String>) {
        self.failed.insert(key.into());
    }
}

/// Backend seam for a `BatchedTtlCache`
#[async_trait]
pub trait BatchFetcher: Send + Sync + 'static {
    type Value: Clone + Send + Sync + 'static;

    /// Resolves one batch of distinct, non-blank keys
    ///
    /// Individual keys that cannot be resolved belong in `BatchResponse::failed`;
    /// `Err` is reserved for failures of the call as a whole.
    async fn fetch_batch(
        &self,
        keys: &[String],
    ) -> Result<BatchResponse<Self::Value>, BatchFetchError>;

    /// Value handed out for a key the backend could not resolve
    fn placeholder(&self, key: &str) -> Self::Value;
}

/// Tuning for one cache domain
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Label used in log events
    pub name: String,
    /// How long a fetched value stays fresh
    pub ttl: Duration,
    /// Upper bound on keys sent in a single backend call
    pub max_batch_size: usize,
    /// Remember keys that failed and never refetch them
    pub remember_failures: bool,
}

impl CacheConfig {
    /// Wallet profiles: 15 minute TTL, 1000 wallets per call
    pub fn profiles() -> Self {
        Self {
            name: "profiles".to_string(),
            ttl: Duration::minutes(15),
            max_batch_size: 1000,
            remember_failures: false,
        }
    }

    /// IPFS metadata: content addressed, so long-lived; failures are remembered
    pub fn ipfs_metadata() -> Self {
        Self {
            name: "ipfs-metadata".to_string(),
            ttl: Duration::hours(24),
            max_batch_size: 50,
            remember_failures: true,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }
}

/// What the cache currently knows about a single key
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<V> {
    /// A value fetched within the TTL window
    Fresh(V),
    /// A previous fetch failed and failures are remembered
    KnownMissing,
    /// Never fetched, or the entry has expired
    NotCached,
}

/// Snapshot of cache occupancy for diagnostics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub failed_keys: usize,
    pub in_flight_keys: usize,
    pub ttl: Duration,
}

struct CacheEntry<V> {
    value: V,
    fetched_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

type SharedBatch<V> = Shared<BoxFuture<'static, Arc<HashMap<String, V>>>>;

#[derive(Clone)]
struct PendingBatch<V> {
    id: u64,
    future: SharedBatch<V>,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    failed: HashSet<String>,
    in_flight: HashMap<String, PendingBatch<V>>,
    next_batch_id: u64,
}

impl<V> Default for CacheState<V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            failed: HashSet::new(),
            in_flight: HashMap::new(),
            next_batch_id: 0,
        }
    }
}

fn lock<V>(state: &Mutex<CacheState<V>>) -> MutexGuard<'_, CacheState<V>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drops blank keys and duplicates while keeping first-seen order
fn normalize_keys<I, S>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    keys.into_iter()
        .filter_map(|key| {
            let key = key.as_ref();
            if key.trim().is_empty() || !seen.insert(key.to_string()) {
                None
            } else {
                Some(key.to_string())
            }
        })
        .collect()
}

/// TTL cache over a batch-capable backend
///
/// Clones share the same entries, so one instance can be built by the composition
/// root and handed to every consumer.
pub struct BatchedTtlCache<F: BatchFetcher> {
    config: CacheConfig,
    fetcher: Arc<F>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<CacheState<F::Value>>>,
}

impl<F: BatchFetcher> Clone for BatchedTtlCache<F> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            fetcher: Arc::clone(&self.fetcher),
            clock: Arc::clone(&self.clock),
            state: Arc::clone(&self.state),
        }
    }
}

impl<F: BatchFetcher> BatchedTtlCache<F> {
    /// Creates a cache that reads the wall clock
    pub fn new(fetcher: F, config: CacheConfig) -> Self {
        Self::with_clock(fetcher, config, Arc::new(SystemClock))
    }

    pub fn with_clock(fetcher: F, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let config = CacheConfig {
            max_batch_size: config.max_batch_size.max(1),
            ..config
        };
        Self {
            config,
            fetcher: Arc::new(fetcher),
            clock,
            state: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Returns one value per distinct non-blank key
    ///
    /// Fresh entries are served from memory, keys already being fetched wait for
    /// that batch, and the rest go to the backend in chunks of at most
    /// `max_batch_size`. Backend failures turn into placeholders, never errors.
    pub async fn get_many<I, S>(&self, keys: I) -> HashMap<String, F::Value>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let requested = normalize_keys(keys);
        let mut result = HashMap::with_capacity(requested.len());
        if requested.is_empty() {
            return result;
        }

        let mut waiting: HashMap<u64, (SharedBatch<F::Value>, Vec<String>)> = HashMap::new();
        let fetched_count;
        let mut joined_count = 0;
        {
            let mut state = lock(&self.state);
            let now = self.clock.now();
            let mut to_fetch = Vec::new();

            for key in &requested {
                if self.config.remember_failures && state.failed.contains(key) {
                    result.insert(key.clone(), self.fetcher.placeholder(key));
                    continue;
                }
                if let Some(entry) = state.entries.get(key) {
                    if entry.is_fresh(now, self.config.ttl) {
                        result.insert(key.clone(), entry.value.clone());
                        continue;
                    }
                }
                if let Some(pending) = state.in_flight.get(key) {
                    joined_count += 1;
                    waiting
                        .entry(pending.id)
                        .or_insert_with(|| (pending.future.clone(), Vec::new()))
                        .1
                        .push(key.clone());
                    continue;
                }
                to_fetch.push(key.clone());
            }

            fetched_count = to_fetch.len();
            for chunk in to_fetch.chunks(self.config.max_batch_size) {
                let id = state.next_batch_id;
                state.next_batch_id += 1;
                let future = self.start_batch(id, chunk.to_vec());
                for key in chunk {
                    state.in_flight.insert(
                        key.clone(),
                        PendingBatch {
                            id,
                            future: future.clone(),
                        },
                    );
                }
                waiting.insert(id, (future, chunk.to_vec()));
            }
        }

        let hits = result.len();
        let batches = waiting.into_values().map(|(future, keys)| async move {
            let values = future.await;
            (values, keys)
        });
        for (values, keys) in join_all(batches).await {
            for key in keys {
                let value = values
                    .get(&key)
                    .cloned()
                    .unwrap_or_else(|| self.fetcher.placeholder(&key));
                result.insert(key, value);
            }
        }

        debug!(
            cache = %self.config.name,
            requested = requested.len(),
            hits,
            fetched = fetched_count,
            joined = joined_count,
            "resolved keys"
        );
        result
    }

    /// Single-key form of `get_many`; blank keys yield the placeholder
    pub async fn get(&self, key: &str) -> F::Value {
        let mut values = self.get_many([key]).await;
        values
            .remove(key)
            .unwrap_or_else(|| self.fetcher.placeholder(key))
    }

    /// Reports what is known about `key` without touching the backend
    pub fn lookup(&self, key: &str) -> CacheLookup<F::Value> {
        let state = lock(&self.state);
        if self.config.remember_failures && state.failed.contains(key) {
            return CacheLookup::KnownMissing;
        }
        match state.entries.get(key) {
            Some(entry) if entry.is_fresh(self.clock.now(), self.config.ttl) => {
                CacheLookup::Fresh(entry.value.clone())
            }
            _ => CacheLookup::NotCached,
        }
    }

    /// Drops every entry and failure marker; batches in flight still complete
    pub fn clear(&self) {
        let mut state = lock(&self.state);
        state.entries.clear();
        state.failed.clear();
        info!(cache = %self.config.name, "cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        let state = lock(&self.state);
        let now = self.clock.now();
        let valid_entries = state
            .entries
            .values()
            .filter(|entry| entry.is_fresh(now, self.config.ttl))
            .count();
        CacheStats {
            total_entries: state.entries.len(),
            valid_entries,
            expired_entries: state.entries.len() - valid_entries,
            failed_keys: state.failed.len(),
            in_flight_keys: state.in_flight.len(),
            ttl: self.config.ttl,
        }
    }

    /// Spawns the fetch for one chunk of keys and returns a shared handle to it
    ///
    /// The fetch runs on its own task, so it finishes and clears its `in_flight`
    /// markers even when every waiter is dropped. Must be called from within a
    /// tokio runtime.
    fn start_batch(&self, id: u64, keys: Vec<String>) -> SharedBatch<F::Value> {
        let fetcher = Arc::clone(&self.fetcher);
        let state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let name = self.config.name.clone();
        let remember_failures = self.config.remember_failures;
        let batch_keys = keys.clone();
        let batch_state = Arc::clone(&self.state);
        let batch_name = name.clone();

        let work = async move {
            info!(cache = %name, keys = keys.len(), "fetching batch");
            let mut values = HashMap::with_capacity(keys.len());
            let mut failed = Vec::new();

            match fetcher.fetch_batch(&keys).await {
                Ok(mut response) => {
                    for key in &keys {
                        match response.resolved.remove(key) {
                            Some(value) => {
                                values.insert(key.clone(), value);
                            }
                            None => {
                                if response.failed.contains(key) {
                                    failed.push(key.clone());
                                }
                                values.insert(key.clone(), fetcher.placeholder(key));
                            }
                        }
                    }
                    if !failed.is_empty() {
                        warn!(cache = %name, failed = failed.len(), "keys could not be resolved");
                    }
                }
                Err(err) => {
                    warn!(
                        cache = %name,
                        error = %err,
                        keys = keys.len(),
                        "batch fetch failed, serving placeholders"
                    );
                    for key in &keys {
                        values.insert(key.clone(), fetcher.placeholder(key));
                    }
                }
            }

            let now = clock.now();
            {
                let mut state = lock(&state);
                for (key, value) in &values {
                    if state.in_flight.get(key).map(|pending| pending.id) == Some(id) {
                        state.in_flight.remove(key);
                    }
                    if remember_failures && failed.contains(key) {
                        state.entries.remove(key);
                        state.failed.insert(key.clone());
                    } else {
                        state.entries.insert(
                            key.clone(),
                            CacheEntry {
                                value: value.clone(),
                                fetched_at: now,
                            },
                        );
                    }
                }
            }

            Arc::new(values)
        };
        let handle = tokio::spawn(work);

        async move {
            match handle.await {
                Ok(values) => values,
                Err(err) => {
                    warn!(cache = %batch_name, error = %err, "batch task ended without a result");
                    let mut state = lock(&batch_state);
                    for key in &batch_keys {
                        if state.in_flight.get(key).map(|pending| pending.id) == Some(id) {
                            state.in_flight.remove(key);
                        }
                    }
                    Arc::new(HashMap::new())
                }
            }
        }
        .boxed()
        .shared()
    }
}
