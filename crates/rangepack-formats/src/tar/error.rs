//! Error types for the tape archive format

use thiserror::Error;

/// Errors that can occur when writing or reading tape archives
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Entry name does not fit the 100-byte ustar name field
    #[error("Entry name '{name}' is longer than {max} bytes")]
    NameTooLong {
        /// The rejected name
        name: String,
        /// Maximum supported length
        max: usize,
    },

    /// Entry name is empty or not valid UTF-8
    #[error("Invalid entry name at offset {offset}")]
    InvalidName {
        /// Byte offset of the offending header
        offset: usize,
    },

    /// Entry body exceeds what an 11-digit octal size field can express
    #[error("Entry '{name}' is {size} bytes, maximum is {max}")]
    EntryTooLarge {
        /// Entry name
        name: String,
        /// Body size in bytes
        size: u64,
        /// Largest encodable size
        max: u64,
    },

    /// Mode does not fit the 7-digit octal mode field
    #[error("Invalid entry mode {0:#o}")]
    InvalidMode(u32),

    /// Entry is not a regular file (directory, link, pax or GNU extension)
    #[error("Unsupported entry type {typeflag:?} at offset {offset}")]
    UnsupportedEntryType {
        /// Byte offset of the offending header
        offset: usize,
        /// Typeflag byte from the header
        typeflag: char,
    },

    /// Header magic is not "ustar\0"
    #[error("Invalid magic: expected 'ustar', got {0:?}")]
    InvalidMagic([u8; 6]),

    /// Header checksum does not match header contents
    #[error("Checksum mismatch at offset {offset}: header says {expected}, computed {actual}")]
    ChecksumMismatch {
        /// Byte offset of the offending header
        offset: usize,
        /// Checksum stored in the header
        expected: u32,
        /// Checksum computed from the header bytes
        actual: u32,
    },

    /// A numeric header field is not valid octal
    #[error("Invalid octal value in '{field}' field")]
    InvalidOctal {
        /// Name of the header field
        field: &'static str,
    },

    /// Data ends in the middle of a header or body
    #[error("Truncated archive: need {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        /// Offset where reading stopped
        offset: usize,
        /// Bytes required to continue
        needed: usize,
        /// Bytes actually available
        available: usize,
    },

    /// Archive is missing the two zero trailer blocks
    #[error("Missing end-of-archive trailer at offset {offset}")]
    MissingTrailer {
        /// Offset where the trailer was expected
        offset: usize,
    },

    /// Produced archive length differs from the precomputed layout
    #[error("Archive layout mismatch: expected {expected} bytes, wrote {actual}")]
    LayoutMismatch {
        /// Length computed from entry sizes
        expected: usize,
        /// Length actually written
        actual: usize,
    },

    /// Header encoding or decoding failed
    #[error("Binary header error: {0}")]
    Binary(String),
}

impl From<binrw::Error> for ArchiveError {
    fn from(e: binrw::Error) -> Self {
        Self::Binary(e.to_string())
    }
}

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, ArchiveError>;
