//! Prefix-by-prefix cycle driver
//!
//! The driver owns the only arena and the only archive buffer. Each prefix
//! goes through three phases, and the next prefix starts only once the last
//! phase has finished:
//!
//! ```text
//!   fetch ──► archive ──► sink ──► reclaim ──► next prefix
//!     │          │          │
//!     └──────────┴──────────┴──► error: run stops
//! ```

use crate::archive::ArchiveBuilder;
use crate::arena::{ArchiveBuffer, BufferArena};
use crate::batch::BatchController;
use crate::cancel::CancellationToken;
use crate::config::{MemoryPlan, PipelineConfig, ReclaimPolicy};
use crate::error::{PipelineError, Result};
use crate::fetch::RecordFetcher;
use crate::key::Prefix;
use crate::sink::ArchiveSink;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What happened to one prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixReport {
    /// Prefix processed
    pub prefix: Prefix,
    /// Archive entries written
    pub entries: usize,
    /// Record bytes fetched
    pub fetched_bytes: u64,
    /// Archive length in bytes
    pub archive_len: usize,
    /// Slots above the planned capacity once the records were fetched
    pub overgrown_slots: usize,
    /// Whether the archive buffer had to grow
    pub archive_regrew: bool,
    /// Bytes released at the reclaim boundary
    pub reclaimed_bytes: usize,
    /// Wall time of the fetch phase
    pub fetch_elapsed: Duration,
    /// Wall time of archiving and handoff
    pub archive_elapsed: Duration,
}

/// Totals for a completed run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Per-prefix reports in processing order
    pub prefixes: Vec<PrefixReport>,
    /// Reclaim policy in effect
    pub reclaim: ReclaimPolicy,
    /// Planned buffer footprint
    pub memory_plan: MemoryPlan,
    /// Wall time of the whole run
    pub elapsed: Duration,
}

impl RunSummary {
    /// Number of archives produced
    pub fn archives(&self) -> usize {
        self.prefixes.len()
    }

    /// Entries across all archives
    pub fn total_entries(&self) -> usize {
        self.prefixes.iter().map(|r| r.entries).sum()
    }

    /// Record bytes fetched across all prefixes
    pub fn total_fetched_bytes(&self) -> u64 {
        self.prefixes.iter().map(|r| r.fetched_bytes).sum()
    }

    /// Archive bytes produced across all prefixes
    pub fn total_archive_bytes(&self) -> u64 {
        self.prefixes.iter().map(|r| r.archive_len as u64).sum()
    }

    /// Bytes released by eager reclamation across the run
    pub fn total_reclaimed_bytes(&self) -> u64 {
        self.prefixes.iter().map(|r| r.reclaimed_bytes as u64).sum()
    }
}

/// Runs the fetch, archive and reclaim cycle over a range of prefixes
pub struct CycleDriver<F, S> {
    config: PipelineConfig,
    batch: BatchController<F>,
    sink: S,
    arena: BufferArena,
    archive: ArchiveBuffer,
}

impl<F, S> CycleDriver<F, S>
where
    F: RecordFetcher,
    S: ArchiveSink,
{
    /// Validate `config` and allocate the arena and archive buffer
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the configuration is invalid.
    pub fn new(config: PipelineConfig, fetcher: F, sink: S) -> Result<Self> {
        config.validate()?;

        let plan = config.memory_plan();
        info!(
            "Allocating buffers: arena {} bytes, archive {} bytes (reclaim: {})",
            plan.arena_bytes, plan.archive_bytes, config.reclaim
        );

        let arena = BufferArena::new(config.slot_capacity);
        let archive = ArchiveBuffer::new(config.effective_archive_capacity());
        let batch = BatchController::new(fetcher, config.concurrency, CancellationToken::new());

        Ok(Self {
            config,
            batch,
            sink,
            arena,
            archive,
        })
    }

    /// Configuration the driver was built with
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Handle that cancels this driver's run
    pub fn cancellation_token(&self) -> CancellationToken {
        self.batch.cancellation_token().clone()
    }

    /// Planned buffer footprint
    pub fn memory_plan(&self) -> MemoryPlan {
        self.config.memory_plan()
    }

    /// The record arena
    pub fn arena(&self) -> &BufferArena {
        &self.arena
    }

    /// The archive sink
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Consume the driver, returning its sink
    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Process prefixes `00` up to the configured count, in order
    ///
    /// # Errors
    ///
    /// Stops at the first failing prefix and returns its error. Prefixes
    /// already handed to the sink stay there.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let started = Instant::now();
        let token = self.cancellation_token();
        let mut reports = Vec::with_capacity(self.config.prefixes);

        for prefix in Prefix::first(self.config.prefixes) {
            if token.is_cancelled() {
                warn!("Run cancelled before prefix {}", prefix);
                return Err(PipelineError::Cancelled { prefix });
            }
            reports.push(self.run_prefix(prefix).await?);
        }

        let summary = RunSummary {
            prefixes: reports,
            reclaim: self.config.reclaim,
            memory_plan: self.memory_plan(),
            elapsed: started.elapsed(),
        };
        info!(
            "Run complete: {} archives, {} entries, {} bytes fetched in {:?}",
            summary.archives(),
            summary.total_entries(),
            summary.total_fetched_bytes(),
            summary.elapsed
        );
        Ok(summary)
    }

    /// Fetch, archive, hand off and reclaim a single prefix
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Fetch` naming the failing key,
    /// `PipelineError::Archive` or `PipelineError::Sink`.
    pub async fn run_prefix(&mut self, prefix: Prefix) -> Result<PrefixReport> {
        info!("Prefix {}: fetching", prefix);
        let stats = self
            .batch
            .fetch_prefix(prefix, &mut self.arena)
            .await
            .map_err(|source| PipelineError::Fetch { prefix, source })?;
        let overgrown_slots = self.arena.overgrown_slots();

        info!("Prefix {}: archiving", prefix);
        let archive_started = Instant::now();
        let archive = ArchiveBuilder::build(prefix, &self.arena, &mut self.archive)
            .map_err(|source| PipelineError::Archive { prefix, source })?;
        let entries = archive.entries;
        let archive_len = archive.len();
        let archive_regrew = archive.regrew;

        self.sink
            .accept(&archive)
            .await
            .map_err(|source| PipelineError::Sink { prefix, source })?;
        let archive_elapsed = archive_started.elapsed();

        let reclaimed_bytes = self.reclaim();

        info!(
            "Prefix {}: {} entries, {} bytes fetched, archive {} bytes",
            prefix, entries, stats.bytes, archive_len
        );

        Ok(PrefixReport {
            prefix,
            entries,
            fetched_bytes: stats.bytes,
            archive_len,
            overgrown_slots,
            archive_regrew,
            reclaimed_bytes,
            fetch_elapsed: stats.elapsed,
            archive_elapsed,
        })
    }

    fn reclaim(&mut self) -> usize {
        self.arena.reset();
        self.archive.reset();

        match self.config.reclaim {
            ReclaimPolicy::Retain => 0,
            ReclaimPolicy::Eager => {
                let released = self.arena.shrink_to_plan() + self.archive.shrink_to_plan();
                debug!("Eager reclaim released {} bytes", released);
                released
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::archive::Archive;
    use crate::error::{FetchError, SinkError};
    use crate::key::{RecordKey, Suffix};
    use crate::sink::DiscardSink;
    use async_trait::async_trait;
    use rangepack_formats::tar::TarReader;

    /// Body is the key text, or a long run of bytes for `oversized`
    #[derive(Default)]
    struct EchoFetcher {
        oversized: Option<Suffix>,
        fail_on: Option<RecordKey>,
        empty: bool,
    }

    #[async_trait]
    impl RecordFetcher for EchoFetcher {
        async fn fetch_into(
            &self,
            key: RecordKey,
            slot: &mut Vec<u8>,
        ) -> std::result::Result<(), FetchError> {
            if self.fail_on == Some(key) {
                return Err(FetchError::UnexpectedStatus {
                    key,
                    status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                });
            }
            slot.clear();
            if self.oversized == Some(key.suffix) {
                slot.resize(64 * 1024, 0xee);
            } else if !self.empty {
                slot.extend_from_slice(key.to_string().as_bytes());
            }
            Ok(())
        }
    }

    /// Keeps a copy of every archive
    #[derive(Default)]
    struct CollectingSink {
        archives: Vec<(Prefix, Vec<u8>)>,
    }

    #[async_trait]
    impl ArchiveSink for CollectingSink {
        async fn accept(&mut self, archive: &Archive<'_>) -> std::result::Result<(), SinkError> {
            self.archives.push((archive.prefix, archive.bytes.to_vec()));
            Ok(())
        }
    }

    fn config(prefixes: usize) -> PipelineConfig {
        PipelineConfig::new("http://origin.invalid/range", prefixes)
            .with_concurrency(16)
            .with_slot_capacity(16)
    }

    #[tokio::test]
    async fn test_one_archive_per_prefix_in_order() {
        let mut driver =
            CycleDriver::new(config(3), EchoFetcher::default(), CollectingSink::default())
                .unwrap();
        let summary = driver.run().await.unwrap();

        assert_eq!(summary.archives(), 3);
        assert_eq!(summary.total_entries(), 3 * 4096);
        assert_eq!(driver.config().prefixes, 3);
        assert_eq!(driver.config().concurrency, 16);

        let sink = driver.into_sink();
        let prefixes: Vec<_> = sink.archives.iter().map(|(p, _)| p.to_string()).collect();
        assert_eq!(prefixes, ["00", "01", "02"]);

        for (prefix, bytes) in &sink.archives {
            let mut count = 0;
            for (entry, suffix) in TarReader::new(bytes).zip(Suffix::all()) {
                let entry = entry.unwrap();
                let expected = prefix.key(suffix).to_string();
                assert_eq!(entry.name(), expected);
                assert_eq!(entry.body(), expected.as_bytes());
                count += 1;
            }
            assert_eq!(count, 4096);
        }
    }

    #[tokio::test]
    async fn test_full_key_space_with_empty_records() {
        let fetcher = EchoFetcher {
            empty: true,
            ..EchoFetcher::default()
        };
        let config = config(256).with_concurrency(64).with_slot_capacity(0);
        let mut driver = CycleDriver::new(config, fetcher, DiscardSink::new()).unwrap();

        let summary = driver.run().await.unwrap();
        assert_eq!(summary.archives(), 256);
        assert!(summary.prefixes.iter().all(|r| r.entries == 4096));
        assert_eq!(
            summary.prefixes.last().map(|r| r.prefix),
            Some(Prefix::new(0xff))
        );
        assert_eq!(driver.sink().archives(), 256);
        assert_eq!(driver.sink().bytes(), 256 * (4096 * 512 + 1024));
    }

    #[tokio::test]
    async fn test_retain_keeps_grown_capacity() {
        let fetcher = EchoFetcher {
            oversized: Some(Suffix::new(0x042).unwrap()),
            ..EchoFetcher::default()
        };
        let config = config(2).with_reclaim(ReclaimPolicy::Retain);
        let mut driver = CycleDriver::new(config, fetcher, DiscardSink::new()).unwrap();

        let summary = driver.run().await.unwrap();
        assert_eq!(summary.prefixes[0].overgrown_slots, 1);
        assert!(summary.prefixes[0].archive_regrew);
        assert_eq!(summary.total_reclaimed_bytes(), 0);
        assert_eq!(driver.arena().overgrown_slots(), 1);

        // Second prefix reuses the grown buffer without regrowing
        assert!(!summary.prefixes[1].archive_regrew);
    }

    #[tokio::test]
    async fn test_eager_returns_to_plan() {
        let fetcher = EchoFetcher {
            oversized: Some(Suffix::new(0x042).unwrap()),
            ..EchoFetcher::default()
        };
        let config = config(2).with_reclaim(ReclaimPolicy::Eager);
        let mut driver = CycleDriver::new(config, fetcher, DiscardSink::new()).unwrap();

        let summary = driver.run().await.unwrap();
        assert!(summary.prefixes[0].reclaimed_bytes > 0);
        assert!(summary.prefixes[1].archive_regrew);
        assert_eq!(driver.arena().overgrown_slots(), 0);
        assert!(driver.arena().iter().all(|(_, slot)| slot.is_empty()));
    }

    #[tokio::test]
    async fn test_fetch_failure_stops_run_without_archive() {
        let failing = Prefix::new(1).key(Suffix::new(0xabc).unwrap());
        let fetcher = EchoFetcher {
            fail_on: Some(failing),
            ..EchoFetcher::default()
        };
        let mut driver = CycleDriver::new(config(3), fetcher, DiscardSink::new()).unwrap();

        let err = driver.run().await.unwrap_err();
        assert_eq!(err.failing_key(), Some(failing));
        assert_eq!(err.prefix(), Some(Prefix::new(1)));
        assert_eq!(driver.sink().archives(), 1);
        assert!(driver.cancellation_token().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_run_produces_nothing() {
        let mut driver =
            CycleDriver::new(config(2), EchoFetcher::default(), DiscardSink::new()).unwrap();
        driver.cancellation_token().cancel();

        let err = driver.run().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Cancelled { prefix } if prefix == Prefix::new(0)
        ));
        assert_eq!(driver.sink().archives(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let result = CycleDriver::new(config(0), EchoFetcher::default(), DiscardSink::new());
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_summary_serializes() {
        let mut driver =
            CycleDriver::new(config(1), EchoFetcher::default(), DiscardSink::new()).unwrap();
        let summary = driver.run().await.unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["prefixes"][0]["prefix"], 0);
        assert_eq!(json["prefixes"][0]["entries"], 4096);
        assert_eq!(json["reclaim"], "retain");
    }
}
