//! Validating reader over an in-memory archive

use crate::tar::error::{ArchiveError, Result};
use crate::tar::header::UstarHeader;
use crate::tar::layout::{BLOCK_SIZE, TRAILER_SIZE, entry_len};

/// One entry borrowed from an archive buffer
#[derive(Debug, Clone)]
pub struct TarEntry<'a> {
    name: String,
    mode: u32,
    offset: usize,
    body: &'a [u8],
}

impl<'a> TarEntry<'a> {
    /// Entry name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Permission bits
    pub fn mode(&self) -> u32 {
        self.mode
    }

    /// Offset of the entry header within the archive
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Entry body without padding
    pub fn body(&self) -> &'a [u8] {
        self.body
    }
}

/// Iterates the entries of an archive, validating every header
///
/// Iteration ends cleanly at the two-block zero trailer. Anything else
/// (truncation, a missing trailer, a corrupt header) yields one error and
/// then stops.
pub struct TarReader<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> TarReader<'a> {
    /// Read entries from the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            done: false,
        }
    }

    /// Offset of the next header to be read
    pub fn offset(&self) -> usize {
        self.offset
    }

    fn read_entry(&mut self) -> Result<Option<TarEntry<'a>>> {
        let remaining = self.data.len() - self.offset;
        if remaining == 0 {
            return Err(ArchiveError::MissingTrailer {
                offset: self.offset,
            });
        }
        if remaining < BLOCK_SIZE {
            return Err(ArchiveError::Truncated {
                offset: self.offset,
                needed: BLOCK_SIZE,
                available: remaining,
            });
        }

        let block: &[u8; BLOCK_SIZE] = self.data[self.offset..self.offset + BLOCK_SIZE]
            .try_into()
            .map_err(|_| ArchiveError::Truncated {
                offset: self.offset,
                needed: BLOCK_SIZE,
                available: remaining,
            })?;

        if block.iter().all(|&b| b == 0) {
            let trailer = &self.data[self.offset..];
            if trailer.len() < TRAILER_SIZE || trailer[..TRAILER_SIZE].iter().any(|&b| b != 0) {
                return Err(ArchiveError::MissingTrailer {
                    offset: self.offset,
                });
            }
            return Ok(None);
        }

        let header = UstarHeader::from_block(block, self.offset)?;
        if !header.is_regular_file() {
            return Err(ArchiveError::UnsupportedEntryType {
                offset: self.offset,
                typeflag: char::from(header.typeflag),
            });
        }
        let name = header
            .path()
            .ok_or(ArchiveError::InvalidName {
                offset: self.offset,
            })?;
        let size = header.entry_size()? as usize;
        let mode = header.entry_mode()?;

        let body_start = self.offset + BLOCK_SIZE;
        let available = self.data.len() - body_start;
        if size > available {
            return Err(ArchiveError::Truncated {
                offset: body_start,
                needed: size,
                available,
            });
        }

        let entry = TarEntry {
            name,
            mode,
            offset: self.offset,
            body: &self.data[body_start..body_start + size],
        };
        self.offset = (self.offset + entry_len(size)).min(self.data.len());
        Ok(Some(entry))
    }
}

impl<'a> Iterator for TarReader<'a> {
    type Item = Result<TarEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
