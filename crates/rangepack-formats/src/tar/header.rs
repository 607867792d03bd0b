//! POSIX ustar entry header
//!
//! The header is a fixed 512-byte block made of ASCII fields. Numeric fields
//! are zero-padded octal terminated by NUL; the checksum is the byte sum of
//! the whole header computed with the checksum field itself set to spaces.

use crate::tar::error::{ArchiveError, Result};
use crate::tar::layout::BLOCK_SIZE;
use binrw::{BinRead, BinWrite};
use std::io::Cursor;

/// Longest name that fits the name field without a ustar prefix
pub const MAX_NAME_LEN: usize = 100;

/// Largest body size an 11-digit octal size field can hold (8 GiB - 1)
pub const MAX_SIZE: u64 = 0o777_7777_7777;

/// Largest mode a 7-digit octal mode field can hold
const MAX_MODE: u32 = 0o777_7777;

const USTAR_MAGIC: [u8; 6] = *b"ustar\0";
const USTAR_VERSION: [u8; 2] = *b"00";
const REGULAR_FILE: u8 = b'0';

/// One ustar header block
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct UstarHeader {
    /// Entry name, NUL padded
    pub name: [u8; 100],
    /// Permission bits, octal
    pub mode: [u8; 8],
    /// Owner user id, octal
    pub uid: [u8; 8],
    /// Owner group id, octal
    pub gid: [u8; 8],
    /// Body size in bytes, octal
    pub size: [u8; 12],
    /// Modification time in seconds since the epoch, octal
    pub mtime: [u8; 12],
    /// Header checksum: six octal digits, NUL, space
    pub checksum: [u8; 8],
    /// Entry type ('0' for a regular file)
    pub typeflag: u8,
    /// Link target, unused for regular files
    pub linkname: [u8; 100],
    /// Format magic "ustar\0"
    pub magic: [u8; 6],
    /// Format version "00"
    pub version: [u8; 2],
    /// Owner user name
    pub uname: [u8; 32],
    /// Owner group name
    pub gname: [u8; 32],
    /// Device major number, unused
    pub devmajor: [u8; 8],
    /// Device minor number, unused
    pub devminor: [u8; 8],
    /// Name prefix for long paths
    pub prefix: [u8; 155],
    /// Pads the header to a full block
    pub padding: [u8; 12],
}

impl UstarHeader {
    /// Build a regular file header with a finalized checksum
    pub fn regular_file(name: &str, mode: u32, size: u64) -> Result<Self> {
        if name.is_empty() {
            return Err(ArchiveError::InvalidName { offset: 0 });
        }
        if name.len() > MAX_NAME_LEN {
            return Err(ArchiveError::NameTooLong {
                name: name.to_string(),
                max: MAX_NAME_LEN,
            });
        }
        if size > MAX_SIZE {
            return Err(ArchiveError::EntryTooLarge {
                name: name.to_string(),
                size,
                max: MAX_SIZE,
            });
        }
        if mode > MAX_MODE {
            return Err(ArchiveError::InvalidMode(mode));
        }

        let mut header = Self {
            name: [0; 100],
            mode: [0; 8],
            uid: [0; 8],
            gid: [0; 8],
            size: [0; 12],
            mtime: [0; 12],
            checksum: [b' '; 8],
            typeflag: REGULAR_FILE,
            linkname: [0; 100],
            magic: USTAR_MAGIC,
            version: USTAR_VERSION,
            uname: [0; 32],
            gname: [0; 32],
            devmajor: [0; 8],
            devminor: [0; 8],
            prefix: [0; 155],
            padding: [0; 12],
        };
        header.name[..name.len()].copy_from_slice(name.as_bytes());
        encode_octal(&mut header.mode, u64::from(mode));
        encode_octal(&mut header.uid, 0);
        encode_octal(&mut header.gid, 0);
        encode_octal(&mut header.size, size);
        encode_octal(&mut header.mtime, 0);
        header.seal();
        Ok(header)
    }

    /// Decode a header from one block
    ///
    /// Validates the magic and checksum. `offset` is only used for error
    /// reporting.
    pub fn from_block(block: &[u8; BLOCK_SIZE], offset: usize) -> Result<Self> {
        let header = Self::read(&mut Cursor::new(&block[..]))?;
        if header.magic != USTAR_MAGIC {
            return Err(ArchiveError::InvalidMagic(header.magic));
        }
        let expected = decode_octal(&header.checksum, "checksum")? as u32;
        let actual = header.compute_checksum();
        if expected != actual {
            return Err(ArchiveError::ChecksumMismatch {
                offset,
                expected,
                actual,
            });
        }
        Ok(header)
    }

    /// Encode the header into one block
    pub fn to_block(&self) -> Result<[u8; BLOCK_SIZE]> {
        let mut block = [0u8; BLOCK_SIZE];
        self.write(&mut Cursor::new(&mut block[..]))?;
        Ok(block)
    }

    /// Entry name, joined with the ustar prefix when one is present
    pub fn path(&self) -> Option<String> {
        let name = std::str::from_utf8(until_nul(&self.name)).ok()?;
        let prefix = std::str::from_utf8(until_nul(&self.prefix)).ok()?;
        if name.is_empty() {
            return None;
        }
        if prefix.is_empty() {
            Some(name.to_string())
        } else {
            Some(format!("{prefix}/{name}"))
        }
    }

    /// Body size in bytes
    pub fn entry_size(&self) -> Result<u64> {
        decode_octal(&self.size, "size")
    }

    /// Permission bits
    pub fn entry_mode(&self) -> Result<u32> {
        Ok(decode_octal(&self.mode, "mode")? as u32)
    }

    /// Whether the entry is a regular file ('0' or the legacy NUL flag)
    pub fn is_regular_file(&self) -> bool {
        self.typeflag == REGULAR_FILE || self.typeflag == 0
    }

    /// Byte sum of the header with the checksum field read as spaces
    pub fn compute_checksum(&self) -> u32 {
        let fields: [&[u8]; 16] = [
            &self.name,
            &self.mode,
            &self.uid,
            &self.gid,
            &self.size,
            &self.mtime,
            std::slice::from_ref(&self.typeflag),
            &self.linkname,
            &self.magic,
            &self.version,
            &self.uname,
            &self.gname,
            &self.devmajor,
            &self.devminor,
            &self.prefix,
            &self.padding,
        ];
        let body: u32 = fields
            .iter()
            .flat_map(|field| field.iter())
            .map(|&b| u32::from(b))
            .sum();
        body + 8 * u32::from(b' ')
    }

    fn seal(&mut self) {
        let sum = self.compute_checksum();
        // Six digits, NUL, space: the layout GNU and Go writers emit
        let digits = format!("{sum:06o}");
        self.checksum[..6].copy_from_slice(&digits.as_bytes()[digits.len() - 6..]);
        self.checksum[6] = 0;
        self.checksum[7] = b' ';
    }
}

/// Write `value` as zero-padded octal followed by a NUL terminator.
///
/// Callers range-check `value` against the field width beforehand.
fn encode_octal(field: &mut [u8], value: u64) {
    let digits = field.len() - 1;
    let text = format!("{value:0digits$o}");
    field[..digits].copy_from_slice(&text.as_bytes()[text.len() - digits..]);
    field[digits] = 0;
}

fn decode_octal(field: &[u8], name: &'static str) -> Result<u64> {
    let text = field
        .iter()
        .copied()
        .skip_while(|&b| b == b' ')
        .take_while(|&b| b != 0 && b != b' ');

    let mut value: u64 = 0;
    let mut seen = false;
    for b in text {
        if !(b'0'..=b'7').contains(&b) {
            return Err(ArchiveError::InvalidOctal { field: name });
        }
        value = value
            .checked_mul(8)
            .and_then(|v| v.checked_add(u64::from(b - b'0')))
            .ok_or(ArchiveError::InvalidOctal { field: name })?;
        seen = true;
    }
    if !seen {
        return Err(ArchiveError::InvalidOctal { field: name });
    }
    Ok(value)
}

fn until_nul(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}
