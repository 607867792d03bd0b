//! Archive format support for rangepack
//!
#![allow(clippy::cast_possible_truncation)] // octal header fields
#![allow(clippy::module_name_repetitions)]
//! This crate implements the block-aligned tape archive layout used to package
//! one prefix worth of records. Only the subset rangepack produces is
//! supported: regular-file entries with short names, written as POSIX ustar
//! headers and readable by any standard `tar` implementation.
//!
//! # Layout
//!
//! ```text
//! +-----------------+---------------------------+-----+------------------+
//! | header (512 B)  | body, zero-padded to 512  | ... | 2 x 512 B zeroes |
//! +-----------------+---------------------------+-----+------------------+
//! ```
//!
//! Sizes are computable up front from body lengths alone (see [`layout`]),
//! which lets callers reserve the exact output capacity before writing.
//!
//! # Example
//!
//! ```
//! use rangepack_formats::tar::{TarReader, TarWriter, layout};
//!
//! let bodies: [&[u8]; 2] = [b"first", b"second record"];
//! let expected = layout::archive_len(bodies.iter().map(|b| b.len()));
//!
//! let mut out = Vec::with_capacity(expected);
//! let mut writer = TarWriter::new(&mut out);
//! writer.append("00000", 0o600, bodies[0])?;
//! writer.append("00001", 0o600, bodies[1])?;
//! writer.finish();
//! assert_eq!(out.len(), expected);
//!
//! let names: Vec<String> = TarReader::new(&out)
//!     .map(|entry| entry.map(|e| e.name().to_string()))
//!     .collect::<Result<_, _>>()?;
//! assert_eq!(names, ["00000", "00001"]);
//! # Ok::<(), rangepack_formats::tar::ArchiveError>(())
//! ```

#![warn(missing_docs)]

/// Tape archive (ustar) layout, writer and reader
pub mod tar;
