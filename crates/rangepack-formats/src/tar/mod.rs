//! POSIX ustar archive support
//!
//! Every entry is a 512-byte [`UstarHeader`] followed by the entry body padded
//! with zeroes to the next block boundary. The archive ends with two zero
//! blocks. Only regular files are produced; the reader accepts any regular
//! file entry with a valid ustar header.
//!
//! Headers are deterministic: uid, gid and mtime are always zero and owner
//! names are empty, so the same bodies always produce byte-identical archives.

mod error;
mod header;
pub mod layout;
mod reader;
mod writer;

pub use error::{ArchiveError, Result};
pub use header::{MAX_NAME_LEN, MAX_SIZE, UstarHeader};
pub use layout::{BLOCK_SIZE, HEADER_SIZE, TRAILER_SIZE};
pub use reader::{TarEntry, TarReader};
pub use writer::TarWriter;
