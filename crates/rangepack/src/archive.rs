//! Serialization of a filled arena into one archive

use crate::arena::{ArchiveBuffer, BufferArena};
use crate::key::Prefix;
use rangepack_formats::tar::{ArchiveError, TarWriter, layout};
use tracing::debug;

/// Permission bits of every archived record
pub const ENTRY_MODE: u32 = 0o600;

/// One finished archive, borrowed from the archive buffer
#[derive(Debug, Clone, Copy)]
pub struct Archive<'a> {
    /// Prefix whose records the archive holds
    pub prefix: Prefix,
    /// Serialized archive
    pub bytes: &'a [u8],
    /// Number of entries
    pub entries: usize,
    /// Whether the buffer had to grow past its capacity
    pub regrew: bool,
}

impl Archive<'_> {
    /// Archive length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the archive is empty (never true for a built archive)
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Writes arena slots as archive entries in ascending suffix order
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveBuilder;

impl ArchiveBuilder {
    /// Serialize every slot of `arena` into `out`
    ///
    /// `out` is cleared first. Entry `i` is named by the five-digit key
    /// `prefix * 4096 + i`. The exact archive size is computed up front so the
    /// buffer grows at most once, and only if its capacity is short.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError` if an entry cannot be encoded or the written
    /// length differs from the computed layout.
    pub fn build<'a>(
        prefix: Prefix,
        arena: &BufferArena,
        out: &'a mut ArchiveBuffer,
    ) -> Result<Archive<'a>, ArchiveError> {
        out.reset();

        let expected = layout::archive_len(arena.iter().map(|(_, body)| body.len()));
        let regrew = out.reserve_for(expected);
        if regrew {
            debug!(
                "Archive of prefix {} needs {} bytes, buffer grown past planned {}",
                prefix,
                expected,
                out.planned_capacity()
            );
        }

        let mut writer = TarWriter::new(out.as_mut_vec());
        for (suffix, body) in arena.iter() {
            let name = prefix.key(suffix).to_string();
            writer.append(&name, ENTRY_MODE, body)?;
        }
        let entries = writer.finish();

        let actual = out.len();
        if actual != expected {
            return Err(ArchiveError::LayoutMismatch { expected, actual });
        }

        debug!(
            "Built archive for prefix {}: {} entries, {} bytes",
            prefix, entries, actual
        );

        Ok(Archive {
            prefix,
            bytes: out.as_slice(),
            entries,
            regrew,
        })
    }
}
