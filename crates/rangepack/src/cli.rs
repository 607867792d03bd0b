//! Command-line configuration
//!
//! Every flag can also be set through a `RANGEPACK_*` environment variable.
//!
//! # Example
//!
//! ```no_run
//! use rangepack::Cli;
//!
//! let cli = Cli::from_args();
//! let config = cli.pipeline_config();
//! config.validate().expect("invalid configuration");
//! ```

use crate::arena::DEFAULT_SLOT_CAPACITY;
use crate::config::{
    DEFAULT_BASE_URL, DEFAULT_CONCURRENCY, PipelineConfig, ReclaimPolicy, detect_memory_ceiling,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Arguments of the `rangepack` binary
#[derive(Debug, Clone, Parser)]
#[command(
    name = "rangepack",
    about = "Fetch hex-keyed records over HTTP and pack each prefix into a tar archive",
    version
)]
pub struct Cli {
    /// Number of prefixes to process, starting at 00 (1-256)
    #[arg(short, long, env = "RANGEPACK_PREFIXES")]
    pub prefixes: usize,

    /// Base URL records are fetched from
    #[arg(long, env = "RANGEPACK_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Maximum fetches in flight
    #[arg(long, env = "RANGEPACK_CONCURRENCY", default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Shrink overgrown buffers back to plan after every prefix
    #[arg(long, alias = "manual", env = "RANGEPACK_EAGER_RECLAIM")]
    pub eager_reclaim: bool,

    /// Planned capacity of each record slot in bytes
    #[arg(long, env = "RANGEPACK_SLOT_CAPACITY", default_value_t = DEFAULT_SLOT_CAPACITY)]
    pub slot_capacity: usize,

    /// Planned archive buffer capacity in bytes (derived from slot capacity if unset)
    #[arg(long, env = "RANGEPACK_ARCHIVE_CAPACITY")]
    pub archive_capacity: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, env = "RANGEPACK_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout: u64,

    /// Connection timeout in seconds
    #[arg(long, env = "RANGEPACK_CONNECT_TIMEOUT", default_value_t = 10)]
    pub connect_timeout: u64,

    /// Memory ceiling in bytes (defaults to the cgroup limit, if any)
    #[arg(long, env = "RANGEPACK_MEMORY_CEILING")]
    pub memory_ceiling: Option<u64>,

    /// Write archives to `<dir>/<prefix>.tar` instead of discarding them
    #[arg(long, env = "RANGEPACK_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[arg(long, env = "RANGEPACK_SUMMARY_JSON")]
    pub summary_json: bool,
}

impl Cli {
    /// Parse arguments from the process command line and environment
    #[must_use]
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Pipeline configuration described by these arguments
    ///
    /// Without an explicit `--memory-ceiling` the enclosing cgroup's memory
    /// limit is used when one is set.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            base_url: self.base_url.clone(),
            prefixes: self.prefixes,
            concurrency: self.concurrency,
            reclaim: if self.eager_reclaim {
                ReclaimPolicy::Eager
            } else {
                ReclaimPolicy::Retain
            },
            slot_capacity: self.slot_capacity,
            archive_capacity: self.archive_capacity,
            connect_timeout: Duration::from_secs(self.connect_timeout),
            request_timeout: Duration::from_secs(self.request_timeout),
            memory_ceiling: self.memory_ceiling.or_else(detect_memory_ceiling),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_arguments() {
        let cli = Cli::try_parse_from(["rangepack", "-p", "4", "--memory-ceiling", "0"]).unwrap();
        assert_eq!(cli.prefixes, 4);
        assert_eq!(cli.base_url, DEFAULT_BASE_URL);
        assert_eq!(cli.concurrency, 64);
        assert!(!cli.eager_reclaim);
        assert!(cli.output_dir.is_none());

        let config = cli.pipeline_config();
        assert_eq!(config.prefixes, 4);
        assert_eq!(config.reclaim, ReclaimPolicy::Retain);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.memory_ceiling, Some(0));
    }

    #[test]
    fn test_manual_alias_enables_eager_reclaim() {
        let cli = Cli::try_parse_from(["rangepack", "--prefixes", "1", "--manual"]).unwrap();
        assert!(cli.eager_reclaim);
        assert_eq!(cli.pipeline_config().reclaim, ReclaimPolicy::Eager);
    }

    #[test]
    fn test_full_arguments() {
        let cli = Cli::try_parse_from([
            "rangepack",
            "--prefixes",
            "256",
            "--base-url",
            "http://origin:9000/records",
            "--concurrency",
            "8",
            "--eager-reclaim",
            "--slot-capacity",
            "1024",
            "--archive-capacity",
            "8388608",
            "--request-timeout",
            "5",
            "--connect-timeout",
            "2",
            "--memory-ceiling",
            "1073741824",
            "--output-dir",
            "/tmp/archives",
            "--summary-json",
        ])
        .unwrap();

        let config = cli.pipeline_config();
        assert_eq!(config.base_url, "http://origin:9000/records");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.slot_capacity, 1024);
        assert_eq!(config.archive_capacity, Some(8_388_608));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.memory_ceiling, Some(1 << 30));
        assert_eq!(cli.output_dir, Some(PathBuf::from("/tmp/archives")));
        assert!(cli.summary_json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_verify_command() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
