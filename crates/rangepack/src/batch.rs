//! Bounded fan-out of one prefix's fetches
//!
//! All 4096 fetches run as futures on the caller's task, at most
//! `concurrency` at a time. The controller returns only once every slot is
//! filled or the first fetch fails. A failure cancels the run token and drops
//! every outstanding fetch future, which aborts its HTTP request.

use crate::arena::BufferArena;
use crate::cancel::CancellationToken;
use crate::error::FetchError;
use crate::fetch::RecordFetcher;
use crate::key::Prefix;
use futures::stream::{self, TryStreamExt};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of a completed fetch phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Records fetched
    pub records: usize,
    /// Total body bytes fetched
    pub bytes: u64,
    /// Wall time of the fetch phase
    pub elapsed: Duration,
}

/// Fetches every record of a prefix into the arena
#[derive(Debug)]
pub struct BatchController<F> {
    fetcher: F,
    concurrency: usize,
    cancel: CancellationToken,
}

impl<F: RecordFetcher> BatchController<F> {
    /// Create a controller
    ///
    /// A `concurrency` of zero is treated as one.
    pub fn new(fetcher: F, concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// The wrapped fetcher
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Concurrency ceiling
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Token observed by every fetch
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fill every slot of `arena` with the records of `prefix`
    ///
    /// # Errors
    ///
    /// Returns the first fetch failure, or `FetchError::Cancelled` if the run
    /// was cancelled. Slot contents are unspecified after an error.
    pub async fn fetch_prefix(
        &self,
        prefix: Prefix,
        arena: &mut BufferArena,
    ) -> Result<BatchStats, FetchError> {
        let started = Instant::now();
        debug!(
            "Fetching {} records of prefix {} ({} in flight)",
            arena.len(),
            prefix,
            self.concurrency
        );

        let fetcher = &self.fetcher;
        let cancel = &self.cancel;

        let result = stream::iter(arena.iter_mut().map(Ok))
            .try_for_each_concurrent(self.concurrency, |(suffix, slot)| async move {
                let key = prefix.key(suffix);
                if cancel.is_cancelled() {
                    return Err(FetchError::Cancelled { key });
                }
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(FetchError::Cancelled { key }),
                    result = fetcher.fetch_into(key, slot) => result,
                }
            })
            .await;

        if let Err(e) = result {
            if e.is_cancelled() {
                warn!("Fetch phase of prefix {} cancelled", prefix);
            } else {
                warn!("Fetch of {} failed, cancelling run: {}", e.key(), e);
                self.cancel.cancel();
            }
            return Err(e);
        }

        let stats = BatchStats {
            records: arena.len(),
            bytes: arena.total_len() as u64,
            elapsed: started.elapsed(),
        };
        debug!(
            "Fetched prefix {}: {} records, {} bytes in {:?}",
            prefix, stats.records, stats.bytes, stats.elapsed
        );
        Ok(stats)
    }
}
