//! Result collector: consumes worker output and deduplicates it.
//!
//! Duplicates are decided by [`DedupKey`]: successes by the hash of their
//! body, failures by kind and URL. The collector keeps one entry per key and
//! counts everything it received so callers can check that every input URL
//! produced a result.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::types::{DedupKey, FetchResult, ResultOrder, ResultSet};

/// Incrementally builds a [`ResultSet`]
#[derive(Debug)]
pub struct ResultCollector {
    order: ResultOrder,
    slots: HashMap<DedupKey, usize>,
    entries: Vec<FetchResult>,
    received: usize,
}

impl ResultCollector {
    /// Create an empty collector
    pub fn new(order: ResultOrder) -> Self {
        Self {
            order,
            slots: HashMap::new(),
            entries: Vec::new(),
            received: 0,
        }
    }

    /// Add one result. Returns true if it was kept as a new distinct entry.
    ///
    /// With [`ResultOrder::Input`] a later duplicate from an earlier input
    /// position replaces the kept entry, so the representative of each key
    /// does not depend on completion order.
    pub fn push(&mut self, result: FetchResult) -> bool {
        self.received += 1;
        let key = result.dedup_key();

        match self.slots.get(&key) {
            Some(&slot) => {
                let kept = &mut self.entries[slot];
                tracing::debug!(
                    url = %result.url,
                    duplicate_of = %kept.url,
                    "Dropping duplicate result"
                );
                if self.order == ResultOrder::Input && result.input_index < kept.input_index {
                    *kept = result;
                }
                false
            }
            None => {
                self.slots.insert(key, self.entries.len());
                self.entries.push(result);
                true
            }
        }
    }

    /// Results received so far, duplicates included
    pub fn received(&self) -> usize {
        self.received
    }

    /// Distinct results so far
    pub fn distinct(&self) -> usize {
        self.entries.len()
    }

    /// Freeze the collected results
    pub fn finish(self) -> ResultSet {
        let mut entries = self.entries;
        if self.order == ResultOrder::Input {
            entries.sort_by_key(|r| r.input_index);
        }
        ResultSet::new(entries, self.received)
    }

    /// Consume `rx` until every sender is gone, then freeze
    pub async fn drain(mut self, mut rx: mpsc::Receiver<FetchResult>) -> ResultSet {
        while let Some(result) = rx.recv().await {
            self.push(result);
        }
        self.finish()
    }
}
