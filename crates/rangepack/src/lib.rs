//! Prefix-batched record fetching and archiving.
//!
//! This crate walks a five-hex-digit record key space one prefix at a time.
//! For each prefix it fetches all 4096 records over HTTP into a reusable
//! buffer arena, serializes them into a single tar archive and hands the
//! archive to a sink before moving on.
//!
//! # Architecture
//!
//! - `key`: prefix, suffix and record key value types
//! - `fetch`: the `RecordFetcher` seam and its HTTP implementation
//! - `arena`: preallocated record slots and the archive buffer
//! - `batch`: bounded-concurrency fetch of one prefix
//! - `archive`: arena to tar serialization
//! - `sink`: destinations for finished archives
//! - `driver`: the sequential fetch, archive and reclaim cycle
//! - `config` / `cli`: configuration, memory planning and argument parsing
//!
//! # Example
//!
//! ```no_run
//! use rangepack::{CycleDriver, DiscardSink, HttpFetcher, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::new("http://localhost:8009/range", 4);
//!     let fetcher = HttpFetcher::new(&config)?;
//!
//!     let mut driver = CycleDriver::new(config, fetcher, DiscardSink::new())?;
//!     let summary = driver.run().await?;
//!
//!     println!("{} archives, {} bytes", summary.archives(), summary.total_archive_bytes());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod archive;
pub mod arena;
pub mod batch;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod key;
pub mod sink;

pub use archive::{Archive, ArchiveBuilder, ENTRY_MODE};
pub use arena::{ArchiveBuffer, BufferArena, DEFAULT_SLOT_CAPACITY};
pub use batch::{BatchController, BatchStats};
pub use cancel::CancellationToken;
pub use cli::Cli;
pub use config::{MemoryPlan, PipelineConfig, ReclaimPolicy};
pub use driver::{CycleDriver, PrefixReport, RunSummary};
pub use error::{ConfigError, FetchError, PipelineError, SinkError};
pub use fetch::{HttpFetcher, RecordFetcher};
pub use key::{Prefix, RecordKey, Suffix};
pub use sink::{ArchiveSink, DirectorySink, DiscardSink};
