//! Record key space
//!
//! A record key is five hex digits. The first two form the [`Prefix`] that
//! groups records into archives, the last three the [`Suffix`] that orders
//! them within one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Records sharing one prefix
pub const KEYS_PER_PREFIX: usize = 0x1000;

/// Number of distinct prefixes
pub const PREFIX_COUNT: usize = 0x100;

/// Size of the whole key space
pub const KEY_SPACE: usize = KEYS_PER_PREFIX * PREFIX_COUNT;

/// Leading two hex digits of a record key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prefix(u8);

impl Prefix {
    /// Wrap a raw prefix value
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Raw prefix value
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The first `count` prefixes in ascending order
    ///
    /// `count` is clamped to [`PREFIX_COUNT`].
    pub fn first(count: usize) -> impl Iterator<Item = Self> {
        (0..count.min(PREFIX_COUNT)).map(|p| Self(p as u8))
    }

    /// Key for a suffix within this prefix
    pub const fn key(self, suffix: Suffix) -> RecordKey {
        RecordKey {
            prefix: self,
            suffix,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}", self.0)
    }
}

/// Trailing three hex digits of a record key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Suffix(u16);

impl Suffix {
    /// Largest valid suffix
    pub const MAX: Self = Self(0xfff);

    /// Wrap a raw suffix value, rejecting anything outside `0x000..=0xfff`
    pub const fn new(value: u16) -> Option<Self> {
        if (value as usize) < KEYS_PER_PREFIX {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Raw suffix value
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Position of this suffix within a prefix's arena
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Every suffix in ascending order
    pub fn all() -> impl DoubleEndedIterator<Item = Self> + ExactSizeIterator {
        (0..KEYS_PER_PREFIX as u16).map(Self)
    }
}

impl TryFrom<u16> for Suffix {
    type Error = KeyError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(KeyError::SuffixOutOfRange(value))
    }
}

impl From<Suffix> for u16 {
    fn from(suffix: Suffix) -> Self {
        suffix.0
    }
}

impl fmt::Display for Suffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03x}", self.0)
    }
}

/// Fully qualified record key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Archive the record belongs to
    pub prefix: Prefix,
    /// Position within the archive
    pub suffix: Suffix,
}

impl RecordKey {
    /// Key for a numeric position in the key space
    pub fn from_index(index: u32) -> Option<Self> {
        if index as usize >= KEY_SPACE {
            return None;
        }
        Some(Self {
            prefix: Prefix((index >> 12) as u8),
            suffix: Suffix((index & 0xfff) as u16),
        })
    }

    /// Numeric position in the key space: `prefix * 4096 + suffix`
    pub const fn index(self) -> u32 {
        ((self.prefix.0 as u32) << 12) | self.suffix.0 as u32
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:05x}", self.index())
    }
}

impl FromStr for RecordKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 5 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(KeyError::Malformed(s.to_string()));
        }
        let index = u32::from_str_radix(s, 16).map_err(|_| KeyError::Malformed(s.to_string()))?;
        Self::from_index(index).ok_or_else(|| KeyError::Malformed(s.to_string()))
    }
}

/// Errors from parsing or constructing keys
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// Suffix outside `0x000..=0xfff`
    #[error("Suffix {0:#x} is outside 0x000..=0xfff")]
    SuffixOutOfRange(u16),

    /// Not five hex digits
    #[error("Malformed record key: {0:?}")]
    Malformed(String),
}
