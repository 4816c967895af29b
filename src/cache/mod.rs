//! In-memory caching for backend lookups
//!
//! This module provides a TTL cache that resolves misses through batched backend
//! calls, coalesces concurrent requests for the same keys, and degrades to
//! placeholders instead of failing. Time is injected through `Clock` so freshness
//! can be tested without sleeping.

mod batched;
mod clock;

pub use batched::{
    BatchFetchError, BatchFetcher, BatchResponse, BatchedTtlCache, CacheConfig, CacheLookup,
    CacheStats,
};
pub use clock::{Clock, ManualClock, SystemClock};
