//! Error types for the fetch/archive pipeline
//!
//! Every failure is fatal to the prefix being processed and ends the run.
//! Errors carry the prefix and, for fetch failures, the exact record key so
//! the caller can report what broke.

use crate::key::{Prefix, RecordKey};
use rangepack_formats::tar::ArchiveError;
use reqwest::StatusCode;
use std::path::PathBuf;
use thiserror::Error;

/// Failure to retrieve a single record
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, timeout or body read failure
    #[error("Transport error fetching {key}: {source}")]
    Transport {
        /// Record being fetched
        key: RecordKey,
        /// Underlying HTTP client error
        #[source]
        source: reqwest::Error,
    },

    /// Origin answered with a non-success status
    #[error("Unexpected status fetching {key}: {status}")]
    UnexpectedStatus {
        /// Record being fetched
        key: RecordKey,
        /// Status returned by the origin
        status: StatusCode,
    },

    /// The run was cancelled before this fetch was dispatched
    #[error("Fetch of {key} cancelled")]
    Cancelled {
        /// Record that was not fetched
        key: RecordKey,
    },
}

impl FetchError {
    /// Key of the record that failed
    pub fn key(&self) -> RecordKey {
        match self {
            Self::Transport { key, .. }
            | Self::UnexpectedStatus { key, .. }
            | Self::Cancelled { key } => *key,
        }
    }

    /// Whether this error came from cancellation rather than the origin
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Failure handing a finished archive to its destination
#[derive(Debug, Error)]
pub enum SinkError {
    /// Writing the archive to disk failed
    #[error("Failed to write archive to {path}: {source}")]
    Io {
        /// Destination file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Invalid pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Prefix count outside 1..=256
    #[error("Prefix count must be between 1 and {max}, got {count}")]
    InvalidPrefixCount {
        /// Requested count
        count: usize,
        /// Size of the prefix space
        max: usize,
    },

    /// Concurrency ceiling of zero
    #[error("Concurrency must be at least 1")]
    InvalidConcurrency,

    /// Base URL does not parse or is not http(s)
    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl {
        /// The rejected URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Archive capacity override smaller than a single empty archive
    #[error("Archive capacity {capacity} is smaller than the {minimum}-byte minimum")]
    InvalidCapacity {
        /// Requested capacity
        capacity: usize,
        /// Smallest archive the pipeline can produce
        minimum: usize,
    },

    /// Planned buffers do not fit under the memory ceiling
    #[error("Planned buffers need {planned} bytes, memory ceiling is {ceiling}")]
    ExceedsMemoryCeiling {
        /// Arena plus archive buffer bytes
        planned: u64,
        /// Configured ceiling
        ceiling: u64,
    },
}

/// Top-level pipeline error
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration rejected before any work started
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// A record of the prefix could not be fetched
    #[error("Fetching prefix {prefix} failed: {source}")]
    Fetch {
        /// Prefix being fetched
        prefix: Prefix,
        /// The failing fetch
        #[source]
        source: FetchError,
    },

    /// The archive for the prefix could not be serialized
    #[error("Archiving prefix {prefix} failed: {source}")]
    Archive {
        /// Prefix being archived
        prefix: Prefix,
        /// Serialization error
        #[source]
        source: ArchiveError,
    },

    /// The finished archive could not be handed off
    #[error("Handing off archive for prefix {prefix} failed: {source}")]
    Sink {
        /// Prefix whose archive was rejected
        prefix: Prefix,
        /// Sink error
        #[source]
        source: SinkError,
    },

    /// The run was cancelled before the prefix started
    #[error("Run cancelled before prefix {prefix}")]
    Cancelled {
        /// First prefix not processed
        prefix: Prefix,
    },
}

impl PipelineError {
    /// Record key that caused the failure, if the failure was a fetch
    pub fn failing_key(&self) -> Option<RecordKey> {
        match self {
            Self::Fetch { source, .. } => Some(source.key()),
            _ => None,
        }
    }

    /// Prefix the run stopped at, if the failure happened mid-run
    pub fn prefix(&self) -> Option<Prefix> {
        match self {
            Self::Fetch { prefix, .. }
            | Self::Archive { prefix, .. }
            | Self::Sink { prefix, .. }
            | Self::Cancelled { prefix } => Some(*prefix),
            Self::Config(_) | Self::Client(_) => None,
        }
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::key::Suffix;

    #[test]
    fn test_fetch_error_names_key() {
        let key = Prefix::new(0x03).key(Suffix::new(0x1f0).unwrap());
        let err = FetchError::UnexpectedStatus {
            key,
            status: StatusCode::INTERNAL_SERVER_ERROR,
        };
        assert_eq!(err.key(), key);
        assert!(err.to_string().contains("031f0"));
        assert!(err.to_string().contains("500"));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_pipeline_error_exposes_failing_key() {
        let key = Prefix::new(0x10).key(Suffix::new(0xabc).unwrap());
        let err = PipelineError::Fetch {
            prefix: key.prefix,
            source: FetchError::UnexpectedStatus {
                key,
                status: StatusCode::NOT_FOUND,
            },
        };
        assert_eq!(err.failing_key(), Some(key));
        assert_eq!(err.prefix(), Some(Prefix::new(0x10)));
        assert!(err.to_string().contains("prefix 10"));

        let err = PipelineError::Cancelled {
            prefix: Prefix::new(4),
        };
        assert_eq!(err.failing_key(), None);
    }

    #[test]
    fn test_config_error_conversion() {
        let err: PipelineError = ConfigError::InvalidConcurrency.into();
        assert!(err.to_string().contains("Concurrency"));
        assert_eq!(err.prefix(), None);
    }
}
