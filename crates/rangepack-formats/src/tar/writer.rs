//! Append-only archive writer over a caller-owned buffer

use crate::tar::error::Result;
use crate::tar::header::UstarHeader;
use crate::tar::layout::{TRAILER_SIZE, padding_len};

/// Writes entries into a borrowed `Vec<u8>`
///
/// The writer never reallocates on its own account beyond what `Vec` does
/// when capacity runs out; callers that know the final size (see
/// [`archive_len`](crate::tar::layout::archive_len)) reserve it up front and
/// get a single allocation, or none at all when the buffer is reused.
pub struct TarWriter<'a> {
    out: &'a mut Vec<u8>,
    entries: usize,
}

impl<'a> TarWriter<'a> {
    /// Start an archive at the current end of `out`
    pub fn new(out: &'a mut Vec<u8>) -> Self {
        Self { out, entries: 0 }
    }

    /// Append one regular file entry
    pub fn append(&mut self, name: &str, mode: u32, body: &[u8]) -> Result<()> {
        let header = UstarHeader::regular_file(name, mode, body.len() as u64)?;
        self.out.extend_from_slice(&header.to_block()?);
        self.out.extend_from_slice(body);
        let padded = self.out.len() + padding_len(body.len());
        self.out.resize(padded, 0);
        self.entries += 1;
        Ok(())
    }

    /// Number of entries written so far
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Write the end-of-archive trailer and return the entry count
    pub fn finish(self) -> usize {
        let end = self.out.len() + TRAILER_SIZE;
        self.out.resize(end, 0);
        self.entries
    }
}
