//! Pipeline configuration
//!
//! Buffers are sized once, up front, from this configuration. Because the
//! process may run under a container memory limit it cannot otherwise see,
//! the configuration also carries an optional memory ceiling that the static
//! buffer plan is checked against before anything is allocated.

use crate::arena::{DEFAULT_SLOT_CAPACITY, planned_archive_capacity};
use crate::error::ConfigError;
use crate::key::{KEYS_PER_PREFIX, PREFIX_COUNT};
use rangepack_formats::tar::layout;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Origin used when none is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8009/range";

/// Default ceiling on concurrently in-flight fetches
pub const DEFAULT_CONCURRENCY: usize = 64;

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What to do with buffer capacity that grew past the plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReclaimPolicy {
    /// Keep grown capacity for the next prefix
    #[default]
    Retain,
    /// Shrink overgrown buffers back to the plan after every prefix
    Eager,
}

impl fmt::Display for ReclaimPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retain => f.write_str("retain"),
            Self::Eager => f.write_str("eager"),
        }
    }
}

/// Statically planned buffer footprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryPlan {
    /// Bytes reserved for the record arena
    pub arena_bytes: u64,
    /// Bytes reserved for the archive buffer
    pub archive_bytes: u64,
}

impl MemoryPlan {
    /// Total planned bytes
    pub fn total(&self) -> u64 {
        self.arena_bytes + self.archive_bytes
    }
}

/// Configuration for a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Origin base URL; records are fetched from `<base_url>/<key>`
    pub base_url: String,

    /// Number of prefixes to process, starting at `00`
    pub prefixes: usize,

    /// Maximum fetches in flight at once
    pub concurrency: usize,

    /// Reclamation policy applied between prefixes
    pub reclaim: ReclaimPolicy,

    /// Planned capacity of each record slot
    pub slot_capacity: usize,

    /// Planned archive buffer capacity; derived from `slot_capacity` if unset
    pub archive_capacity: Option<usize>,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Per-request timeout, including the body
    pub request_timeout: Duration,

    /// Memory ceiling the buffer plan must fit under
    pub memory_ceiling: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            prefixes: PREFIX_COUNT,
            concurrency: DEFAULT_CONCURRENCY,
            reclaim: ReclaimPolicy::Retain,
            slot_capacity: DEFAULT_SLOT_CAPACITY,
            archive_capacity: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            memory_ceiling: None,
        }
    }
}

impl PipelineConfig {
    /// Configuration for `prefixes` prefixes from `base_url`, defaults elsewhere
    pub fn new(base_url: impl Into<String>, prefixes: usize) -> Self {
        Self {
            base_url: base_url.into(),
            prefixes,
            ..Self::default()
        }
    }

    /// Set the concurrency ceiling
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the reclamation policy
    #[must_use]
    pub fn with_reclaim(mut self, reclaim: ReclaimPolicy) -> Self {
        self.reclaim = reclaim;
        self
    }

    /// Set the planned slot capacity
    #[must_use]
    pub fn with_slot_capacity(mut self, slot_capacity: usize) -> Self {
        self.slot_capacity = slot_capacity;
        self
    }

    /// Override the planned archive capacity
    #[must_use]
    pub fn with_archive_capacity(mut self, archive_capacity: usize) -> Self {
        self.archive_capacity = Some(archive_capacity);
        self
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the memory ceiling
    #[must_use]
    pub fn with_memory_ceiling(mut self, ceiling: u64) -> Self {
        self.memory_ceiling = Some(ceiling);
        self
    }

    /// Archive buffer capacity to allocate at startup
    pub fn effective_archive_capacity(&self) -> usize {
        self.archive_capacity
            .unwrap_or_else(|| planned_archive_capacity(self.slot_capacity))
    }

    /// Planned footprint of the arena and archive buffer
    pub fn memory_plan(&self) -> MemoryPlan {
        MemoryPlan {
            arena_bytes: (KEYS_PER_PREFIX * self.slot_capacity) as u64,
            archive_bytes: self.effective_archive_capacity() as u64,
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the prefix count is zero or larger than the key space
    /// - the concurrency ceiling is zero
    /// - the base URL is not an absolute http(s) URL
    /// - the archive capacity override cannot hold even an empty prefix
    /// - the memory plan exceeds the configured ceiling
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.prefixes == 0 || self.prefixes > PREFIX_COUNT {
            return Err(ConfigError::InvalidPrefixCount {
                count: self.prefixes,
                max: PREFIX_COUNT,
            });
        }

        if self.concurrency == 0 {
            return Err(ConfigError::InvalidConcurrency);
        }

        let url = url::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: "expected an http or https URL".to_string(),
            });
        }

        let minimum = layout::uniform_archive_len(KEYS_PER_PREFIX, 0);
        if let Some(capacity) = self.archive_capacity {
            if capacity < minimum {
                return Err(ConfigError::InvalidCapacity { capacity, minimum });
            }
        }

        if let Some(ceiling) = self.memory_ceiling {
            let planned = self.memory_plan().total();
            if planned > ceiling {
                return Err(ConfigError::ExceedsMemoryCeiling { planned, ceiling });
            }
        }

        Ok(())
    }
}

/// Memory limit imposed by the enclosing cgroup, if any
///
/// Checks the cgroup v2 `memory.max` file first, then the v1
/// `memory.limit_in_bytes` file. Unlimited or unreadable limits yield `None`.
pub fn detect_memory_ceiling() -> Option<u64> {
    [
        "/sys/fs/cgroup/memory.max",
        "/sys/fs/cgroup/memory/memory.limit_in_bytes",
    ]
    .iter()
    .find_map(|path| read_cgroup_limit(Path::new(path)))
}

fn read_cgroup_limit(path: &Path) -> Option<u64> {
    let text = std::fs::read_to_string(path).ok()?;
    parse_cgroup_limit(&text)
}

fn parse_cgroup_limit(text: &str) -> Option<u64> {
    // cgroup v1 reports "unlimited" as a page-rounded i64::MAX
    const UNLIMITED_THRESHOLD: u64 = 1 << 60;

    let value = text.trim();
    if value == "max" {
        return None;
    }
    value
        .parse::<u64>()
        .ok()
        .filter(|&limit| limit < UNLIMITED_THRESHOLD)
}
