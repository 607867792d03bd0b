//! Size arithmetic for block-aligned archives
//!
//! All functions are pure and depend only on body lengths, so an archive's
//! exact size is known before a single byte is written.

/// Archive block size; headers and padded bodies are multiples of this
pub const BLOCK_SIZE: usize = 512;

/// Size of one entry header
pub const HEADER_SIZE: usize = BLOCK_SIZE;

/// Size of the end-of-archive marker (two zero blocks)
pub const TRAILER_SIZE: usize = 2 * BLOCK_SIZE;

/// Body length rounded up to the next block boundary
#[must_use]
pub const fn padded_len(body_len: usize) -> usize {
    body_len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Zero bytes appended after a body of the given length
#[must_use]
pub const fn padding_len(body_len: usize) -> usize {
    padded_len(body_len) - body_len
}

/// Bytes occupied by one entry: header plus padded body
#[must_use]
pub const fn entry_len(body_len: usize) -> usize {
    HEADER_SIZE + padded_len(body_len)
}

/// Exact archive length for the given sequence of body lengths
pub fn archive_len<I>(body_lens: I) -> usize
where
    I: IntoIterator<Item = usize>,
{
    body_lens.into_iter().map(entry_len).sum::<usize>() + TRAILER_SIZE
}

/// Archive length when every one of `entries` bodies has the same length
#[must_use]
pub const fn uniform_archive_len(entries: usize, body_len: usize) -> usize {
    entries * entry_len(body_len) + TRAILER_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_len() {
        assert_eq!(padded_len(0), 0);
        assert_eq!(padded_len(1), 512);
        assert_eq!(padded_len(512), 512);
        assert_eq!(padded_len(513), 1024);
        assert_eq!(padded_len(32_000), 32_256);
    }

    #[test]
    fn test_entry_len_includes_header() {
        assert_eq!(entry_len(0), 512);
        assert_eq!(entry_len(100), 1024);
        assert_eq!(padding_len(100), 412);
        assert_eq!(padding_len(1024), 0);
    }

    #[test]
    fn test_archive_len_empty() {
        assert_eq!(archive_len(std::iter::empty()), TRAILER_SIZE);
    }

    #[test]
    fn test_uniform_matches_general() {
        let lens = vec![32_000usize; 4096];
        assert_eq!(archive_len(lens), uniform_archive_len(4096, 32_000));
        assert_eq!(
            uniform_archive_len(4096, 32_000),
            4096 * (512 + 32_000usize.div_ceil(512) * 512) + 1024
        );
    }
}
