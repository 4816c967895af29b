//! Background title lookup for listed dares
//!
//! Each page load asks for the titles of its rows. Lookups run on a spawned task
//! and report back over a channel, so rendering never waits on IPFS. A new
//! request aborts the previous one, and results from an aborted request are
//! discarded even if they were already queued. Aborting only drops the waiting
//! task: batches already started keep running in the cache and store their
//! results for the next lookup.

use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::{BatchFetcher, BatchedTtlCache};
use crate::data::DareMetadata;

/// Titles resolved for one request, keyed by CID
#[derive(Debug, Clone, PartialEq)]
pub struct TitleBatch {
    generation: u64,
    /// `None` when the metadata has no usable title
    pub titles: HashMap<String, Option<String>>,
}

/// Spawns title lookups and collects their results
pub struct TitleLoader<F>
where
    F: BatchFetcher<Value = DareMetadata>,
{
    cache: BatchedTtlCache<F>,
    sender: mpsc::Sender<TitleBatch>,
    receiver: mpsc::Receiver<TitleBatch>,
    task: Option<JoinHandle<()>>,
    generation: u64,
}

impl<F> TitleLoader<F>
where
    F: BatchFetcher<Value = DareMetadata>,
{
    pub fn new(cache: BatchedTtlCache<F>) -> Self {
        let (sender, receiver) = mpsc::channel(8);
        Self {
            cache,
            sender,
            receiver,
            task: None,
            generation: 0,
        }
    }

    pub fn cache(&self) -> &BatchedTtlCache<F> {
        &self.cache
    }

    /// Starts looking up titles for `cids`, cancelling any earlier request
    ///
    /// Must be called from within a tokio runtime.
    pub fn request(&mut self, cids: Vec<String>) {
        self.cancel();
        self.generation += 1;

        let cids: Vec<String> = cids.into_iter().filter(|c| !c.trim().is_empty()).collect();
        if cids.is_empty() {
            return;
        }

        let generation = self.generation;
        let cache = self.cache.clone();
        let sender = self.sender.clone();
        debug!(generation, cids = cids.len(), "requesting dare titles");

        self.task = Some(tokio::spawn(async move {
            let metadata = cache.get_many(&cids).await;
            let titles = metadata
                .into_iter()
                .map(|(cid, meta)| {
                    let title = meta.display_title().map(str::to_string);
                    (cid, title)
                })
                .collect();
            // Receiver gone means the loader was dropped
            let _ = sender.send(TitleBatch { generation, titles }).await;
        }));
    }

    /// Aborts the outstanding request, if any
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether a request is still running
    pub fn is_loading(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Drains finished results belonging to the latest request
    pub fn try_recv(&mut self) -> Option<TitleBatch> {
        let mut latest = None;
        while let Ok(batch) = self.receiver.try_recv() {
            if batch.generation == self.generation {
                latest = Some(batch);
            } else {
                debug!(stale = batch.generation, current = self.generation, "dropping stale titles");
            }
        }
        latest
    }

    /// Waits for the latest request to report
    ///
    /// Returns `None` when nothing is pending.
    pub async fn recv(&mut self) -> Option<TitleBatch> {
        self.task.as_ref()?;
        loop {
            let batch = self.receiver.recv().await?;
            if batch.generation == self.generation {
                self.task = None;
                return Some(batch);
            }
        }
    }
}

impl<F> Drop for TitleLoader<F>
where
    F: BatchFetcher<Value = DareMetadata>,
{
    fn drop(&mut self) {
        self.cancel();
    }
}
