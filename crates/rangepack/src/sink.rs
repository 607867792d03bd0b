//! Destinations for finished archives
//!
//! The driver hands each archive to an [`ArchiveSink`] before the archive
//! buffer is reused, so a sink must copy out whatever it wants to keep.

use crate::archive::Archive;
use crate::error::SinkError;
use crate::key::Prefix;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Receives one archive per prefix
#[async_trait]
pub trait ArchiveSink: Send {
    /// Take the archive for one prefix
    ///
    /// `archive.bytes` is only valid for the duration of the call.
    async fn accept(&mut self, archive: &Archive<'_>) -> Result<(), SinkError>;
}

/// Drops archives, keeping only counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscardSink {
    archives: usize,
    bytes: u64,
}

impl DiscardSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Archives accepted so far
    pub fn archives(&self) -> usize {
        self.archives
    }

    /// Archive bytes accepted so far
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

#[async_trait]
impl ArchiveSink for DiscardSink {
    async fn accept(&mut self, archive: &Archive<'_>) -> Result<(), SinkError> {
        self.archives += 1;
        self.bytes += archive.len() as u64;
        debug!("Discarded archive for prefix {}", archive.prefix);
        Ok(())
    }
}

/// Writes each archive to `<dir>/<prefix>.tar`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    /// Sink writing into `dir`, created on first use if missing
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far, in prefix order
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Path the archive for `prefix` is written to
    pub fn archive_path(&self, prefix: Prefix) -> PathBuf {
        self.dir.join(format!("{prefix}.tar"))
    }
}

#[async_trait]
impl ArchiveSink for DirectorySink {
    async fn accept(&mut self, archive: &Archive<'_>) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SinkError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let path = self.archive_path(archive.prefix);
        tokio::fs::write(&path, archive.bytes)
            .await
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;

        info!("Wrote {} ({} bytes)", path.display(), archive.len());
        self.written.push(path);
        Ok(())
    }
}
