//! Reusable record and archive buffers
//!
//! Both buffers are allocated once when the driver starts and then cleared,
//! not freed, between prefixes. Capacities are loose upper bounds: a record
//! or archive that outgrows them simply reallocates, and the driver's
//! reclaim policy decides whether that extra capacity is kept.

use crate::key::{KEYS_PER_PREFIX, Suffix};
use rangepack_formats::tar::layout;
use tracing::debug;

/// Default per-record capacity, a loose upper bound on record size
pub const DEFAULT_SLOT_CAPACITY: usize = 48_000;

/// Archive capacity that holds a full prefix of records at `slot_capacity`
pub const fn planned_archive_capacity(slot_capacity: usize) -> usize {
    layout::uniform_archive_len(KEYS_PER_PREFIX, slot_capacity)
}

/// One reusable byte slot per suffix
#[derive(Debug)]
pub struct BufferArena {
    slots: Vec<Vec<u8>>,
    slot_capacity: usize,
}

impl BufferArena {
    /// Allocate all 4096 slots with `slot_capacity` bytes each
    pub fn new(slot_capacity: usize) -> Self {
        let slots = (0..KEYS_PER_PREFIX)
            .map(|_| Vec::with_capacity(slot_capacity))
            .collect();
        Self {
            slots,
            slot_capacity,
        }
    }

    /// Planned capacity of each slot
    pub fn slot_capacity(&self) -> usize {
        self.slot_capacity
    }

    /// Number of slots (always one per suffix)
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false; present for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Contents of one slot
    pub fn slot(&self, suffix: Suffix) -> &[u8] {
        &self.slots[suffix.index()]
    }

    /// Mutable access to one slot
    pub fn slot_mut(&mut self, suffix: Suffix) -> &mut Vec<u8> {
        &mut self.slots[suffix.index()]
    }

    /// Slots in ascending suffix order
    pub fn iter(&self) -> impl ExactSizeIterator<Item = (Suffix, &[u8])> {
        Suffix::all().zip(self.slots.iter().map(Vec::as_slice))
    }

    /// Mutable slots in ascending suffix order, each borrowed independently
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (Suffix, &mut Vec<u8>)> {
        Suffix::all().zip(self.slots.iter_mut())
    }

    /// Bytes currently held across all slots
    pub fn total_len(&self) -> usize {
        self.slots.iter().map(Vec::len).sum()
    }

    /// Bytes of backing storage currently allocated across all slots
    pub fn allocated_bytes(&self) -> usize {
        self.slots.iter().map(Vec::capacity).sum()
    }

    /// Slots whose storage grew past the planned capacity
    pub fn overgrown_slots(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.capacity() > self.slot_capacity)
            .count()
    }

    /// Clear every slot's length, keeping its storage
    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            slot.clear();
        }
    }

    /// Return overgrown slots to the planned capacity
    ///
    /// Only releases storage of empty slots, so it must follow
    /// [`reset`](Self::reset). Returns the number of bytes released.
    pub fn shrink_to_plan(&mut self) -> usize {
        let before = self.allocated_bytes();
        for slot in &mut self.slots {
            if slot.is_empty() && slot.capacity() > self.slot_capacity {
                slot.shrink_to(self.slot_capacity);
            }
        }
        let released = before.saturating_sub(self.allocated_bytes());
        if released > 0 {
            debug!("Arena released {} bytes of overgrown slot storage", released);
        }
        released
    }
}

/// The single reusable archive buffer
#[derive(Debug)]
pub struct ArchiveBuffer {
    buf: Vec<u8>,
    planned_capacity: usize,
}

impl ArchiveBuffer {
    /// Allocate the buffer with `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            planned_capacity: capacity,
        }
    }

    /// Capacity chosen at startup
    pub fn planned_capacity(&self) -> usize {
        self.planned_capacity
    }

    /// Current backing capacity
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Bytes of the current archive
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Length of the current archive
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer holds no archive
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Clear the archive, keeping storage
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Return the buffer to its planned capacity if it grew
    ///
    /// Must follow [`reset`](Self::reset). Returns the number of bytes released.
    pub fn shrink_to_plan(&mut self) -> usize {
        let before = self.buf.capacity();
        if self.buf.is_empty() && before > self.planned_capacity {
            self.buf.shrink_to(self.planned_capacity);
        }
        let released = before.saturating_sub(self.buf.capacity());
        if released > 0 {
            debug!("Archive buffer released {} bytes", released);
        }
        released
    }

    /// Make room for an archive of exactly `required` bytes
    ///
    /// Grows only when the current capacity is insufficient and reports
    /// whether it had to.
    pub(crate) fn reserve_for(&mut self, required: usize) -> bool {
        let available = self.buf.capacity() - self.buf.len();
        if required <= available {
            return false;
        }
        self.buf.reserve_exact(required);
        true
    }

    pub(crate) fn as_mut_vec(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}
