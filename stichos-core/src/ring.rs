//! Variable-length-record ring buffer shared between one producer and
//! one consumer.
//!
//! Slot layout (`depth` slots, each `max_line_size + 1` bytes):
//! - RECORD (0 to `max_line_size` bytes): line content
//! - TERMINATOR (1 byte): 0x00 sentinel written at commit time
//!
//! The extra byte per slot guarantees the terminator fits even for a
//! record of exactly `max_line_size` bytes, so a full-length line is a
//! valid record, not an overflow.
//!
//! The producer is the sole writer of `head` and of the in-progress
//! slot's bytes; the consumer is the sole writer of `tail`. Each side
//! only reads the other's index. Index updates are published with
//! release stores and observed with acquire loads, so a consumer that
//! sees an advanced `head` also sees the fully written slot beneath it,
//! and a producer that sees an advanced `tail` may safely reuse the
//! released slot. One slot is always kept unused to tell a full ring
//! from an empty one.

use core::cell::{Cell, UnsafeCell};
use core::ops::Deref;

use alloc::boxed::Box;
use alloc::vec::Vec;

use portable_atomic::{AtomicUsize, Ordering};

/// Sentinel byte marking the end of a committed record within its slot
pub const LINE_TERMINATOR: u8 = 0x00;

/// Errors that can occur while constructing or operating the ring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No free slot to begin or commit a record
    WriterFull,
    /// No committed record available to read
    ReaderEmpty,
    /// Current record exceeded `max_line_size`; it has been discarded
    BufferOverflow,
    /// Allocation failed or the requested geometry is unsatisfiable
    MemoryError,
}

/// Proof that a write cycle is in progress on the head slot.
///
/// Issued by [`LineWriter::begin_write`] and consumed by
/// [`LineWriter::commit`] or [`LineWriter::abandon`], so a commit
/// without a preceding begin cannot be expressed. `begin_write` is
/// idempotent while a slot is being filled; the position within the
/// slot is tracked by the ring, not by the handle.
#[derive(Debug)]
pub struct WriteHandle {
    slot: usize,
}

/// Fixed-capacity ring of line slots.
///
/// Construct once with [`LineRing::new`], then [`LineRing::split`] into
/// the producer and consumer halves. The halves borrow the ring, so at
/// most one of each can exist at a time and both are gone before the
/// ring can be dropped.
#[derive(Debug)]
pub struct LineRing {
    /// `depth * (max_line_size + 1)` bytes, one region per slot
    slots: Box<[UnsafeCell<u8>]>,
    depth: usize,
    max_line_size: usize,
    /// Slot being filled; written only by the producer
    head: AtomicUsize,
    /// Oldest committed, unread slot; written only by the consumer
    tail: AtomicUsize,
    /// Bytes written into the head slot since the last commit.
    /// Producer-private state; the consumer never touches it.
    write_offset: Cell<usize>,
}

// SAFETY: slot bytes are only written by the producer half (sole owner
// of the in-progress slot) and only read by the consumer half (sole
// owner of a committed slot until it releases it), with the handover
// ordered by the release/acquire index stores above. `write_offset` is
// accessed exclusively through the single `LineWriter`.
unsafe impl Sync for LineRing {}

impl LineRing {
    /// Create a ring with `depth` slots of `max_line_size` bytes each.
    ///
    /// `depth` must be at least 2 (one slot stays unused as the
    /// full/empty disambiguator) and `max_line_size` at least 1.
    /// Returns `Error::MemoryError` if the geometry is invalid or the
    /// backing storage cannot be allocated; the ring is never partially
    /// initialized.
    pub fn new(depth: usize, max_line_size: usize) -> Result<Self, Error> {
        if depth < 2 || max_line_size < 1 {
            return Err(Error::MemoryError);
        }
        let stride = max_line_size.checked_add(1).ok_or(Error::MemoryError)?;
        let total = depth.checked_mul(stride).ok_or(Error::MemoryError)?;

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(total)
            .map_err(|_| Error::MemoryError)?;
        slots.resize_with(total, || UnsafeCell::new(0));

        Ok(Self {
            slots: slots.into_boxed_slice(),
            depth,
            max_line_size,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            write_offset: Cell::new(0),
        })
    }

    /// Split into the producer and consumer halves.
    ///
    /// Both halves are `Send`, so they can be handed to two different
    /// execution contexts (thread and interrupt handler, or two
    /// threads). The mutable borrow guarantees a single producer and a
    /// single consumer.
    pub fn split(&mut self) -> (LineWriter<'_>, LineReader<'_>) {
        (LineWriter { ring: self }, LineReader { ring: self })
    }

    /// Number of slots
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Per-slot record capacity in bytes
    pub fn max_line_size(&self) -> usize {
        self.max_line_size
    }

    /// Index of the slot currently being filled (diagnostics)
    pub fn head(&self) -> usize {
        self.head.load(Ordering::Acquire)
    }

    /// Index of the oldest committed, unread slot (diagnostics)
    pub fn tail(&self) -> usize {
        self.tail.load(Ordering::Acquire)
    }

    /// Number of committed, unread records
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (head + self.depth - tail) % self.depth
    }

    /// True if no committed record is waiting
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if no free slot is available to begin a new record
    pub fn is_full(&self) -> bool {
        self.len() == self.depth - 1
    }

    fn slot_byte(&self, slot: usize, offset: usize) -> &UnsafeCell<u8> {
        debug_assert!(slot < self.depth);
        debug_assert!(offset <= self.max_line_size);
        &self.slots[slot * (self.max_line_size + 1) + offset]
    }

    /// Length of the record in a committed slot, recovered by scanning
    /// for the terminator the commit wrote.
    fn committed_len(&self, slot: usize) -> usize {
        for offset in 0..=self.max_line_size {
            // SAFETY: the slot is committed and owned by the consumer;
            // the producer will not touch it until `tail` moves past it.
            let byte = unsafe { self.slot_byte(slot, offset).get().read() };
            if byte == LINE_TERMINATOR {
                return offset;
            }
        }
        self.max_line_size
    }
}

/// Producer half of a [`LineRing`].
///
/// Safe to drive from an interrupt or high-priority context: every
/// operation is non-blocking, allocation-free, and bounded-time.
pub struct LineWriter<'a> {
    ring: &'a LineRing,
}

impl<'a> LineWriter<'a> {
    /// Begin a new record, or continue the one already in progress.
    ///
    /// Returns `Error::WriterFull` when no free slot is available, in
    /// which case no state changes and no memory is touched. While a
    /// slot is being filled, repeated calls return a handle to that
    /// same slot.
    pub fn begin_write(&mut self) -> Result<WriteHandle, Error> {
        let head = self.ring.head.load(Ordering::Relaxed);
        let tail = self.ring.tail.load(Ordering::Acquire);
        if (head + 1) % self.ring.depth == tail {
            return Err(Error::WriterFull);
        }
        Ok(WriteHandle { slot: head })
    }

    /// Append one byte to the in-progress record.
    ///
    /// Returns `Error::BufferOverflow` on the byte that would exceed
    /// `max_line_size`; the partial record is discarded and the next
    /// append starts a clean record in the same slot. Bytes past the
    /// limit are never written, so neighboring slots cannot be
    /// corrupted.
    pub fn append(&mut self, handle: &WriteHandle, byte: u8) -> Result<(), Error> {
        debug_assert_eq!(handle.slot, self.ring.head.load(Ordering::Relaxed));
        let offset = self.ring.write_offset.get();
        if offset >= self.ring.max_line_size {
            self.ring.write_offset.set(0);
            return Err(Error::BufferOverflow);
        }
        // SAFETY: the producer is the sole writer of the head slot, and
        // `offset < max_line_size` keeps the write inside it.
        unsafe { self.ring.slot_byte(handle.slot, offset).get().write(byte) };
        self.ring.write_offset.set(offset + 1);
        Ok(())
    }

    /// Append a run of bytes to the in-progress record.
    ///
    /// Applies the same overflow policy as [`append`](Self::append),
    /// byte by byte: on overflow the whole record is discarded, not
    /// just the remainder of `data`.
    pub fn append_slice(&mut self, handle: &WriteHandle, data: &[u8]) -> Result<(), Error> {
        for &byte in data {
            self.append(handle, byte)?;
        }
        Ok(())
    }

    /// Finalize the in-progress record and publish it to the consumer.
    ///
    /// Writes the terminator after the record bytes, then advances
    /// `head` with a release store so the consumer observes the slot
    /// contents before the new index. A zero-length record (commit
    /// right after begin) is valid and reads back as an empty line.
    ///
    /// Returns `Error::WriterFull` if the ring has no free slot; the
    /// record stays in progress and a later `begin_write` resumes it.
    pub fn commit(&mut self, handle: WriteHandle) -> Result<(), Error> {
        let head = self.ring.head.load(Ordering::Relaxed);
        debug_assert_eq!(handle.slot, head);
        let tail = self.ring.tail.load(Ordering::Acquire);
        let next = (head + 1) % self.ring.depth;
        if next == tail {
            return Err(Error::WriterFull);
        }
        let offset = self.ring.write_offset.get();
        // SAFETY: the slot reserves one byte past `max_line_size` for
        // the terminator, and `offset <= max_line_size` always holds.
        unsafe {
            self.ring
                .slot_byte(head, offset)
                .get()
                .write(LINE_TERMINATOR)
        };
        self.ring.write_offset.set(0);
        self.ring.head.store(next, Ordering::Release);
        Ok(())
    }

    /// Discard the in-progress record without committing it.
    ///
    /// No cleanup is required beyond resetting the write position; the
    /// slot bytes are simply overwritten on next use.
    pub fn abandon(&mut self, handle: WriteHandle) {
        debug_assert_eq!(handle.slot, self.ring.head.load(Ordering::Relaxed));
        let _ = handle;
        self.ring.write_offset.set(0);
    }

    /// True if no free slot is available to begin a new record
    pub fn is_full(&self) -> bool {
        let head = self.ring.head.load(Ordering::Relaxed);
        let tail = self.ring.tail.load(Ordering::Acquire);
        (head + 1) % self.ring.depth == tail
    }
}

/// Consumer half of a [`LineRing`].
pub struct LineReader<'a> {
    ring: &'a LineRing,
}

impl<'a> LineReader<'a> {
    /// Take the oldest committed record, if any.
    ///
    /// Returns `None` when the ring is empty, with no side effects.
    /// Otherwise the returned guard views the record bytes in place;
    /// the slot is released back to the producer when the guard drops,
    /// which the borrow checker forces before the next reader call.
    pub fn read_oldest(&mut self) -> Option<LineGuard<'_, 'a>> {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        let head = self.ring.head.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let len = self.ring.committed_len(tail);
        Some(LineGuard {
            reader: self,
            slot: tail,
            len,
        })
    }

    /// Copy the oldest committed record out and release its slot.
    ///
    /// Returns the number of bytes copied, or `Error::ReaderEmpty` when
    /// nothing is committed. A `buf` of at least `max_line_size` bytes
    /// always receives the whole record; a shorter one receives a
    /// truncated copy.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let line = self.read_oldest().ok_or(Error::ReaderEmpty)?;
        let n = line.len().min(buf.len());
        buf[..n].copy_from_slice(&line[..n]);
        Ok(n)
    }

    /// True if no committed record is waiting
    pub fn is_empty(&self) -> bool {
        let tail = self.ring.tail.load(Ordering::Relaxed);
        let head = self.ring.head.load(Ordering::Acquire);
        head == tail
    }
}

/// Read-only view of one committed record.
///
/// Dereferences to the record bytes (terminator excluded). Dropping the
/// guard releases the slot to the producer with a release store on
/// `tail`, so the view can never alias a slot being rewritten.
pub struct LineGuard<'r, 'a> {
    reader: &'r mut LineReader<'a>,
    slot: usize,
    len: usize,
}

impl Deref for LineGuard<'_, '_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        let ring = self.reader.ring;
        let base = ring.slot_byte(self.slot, 0).get() as *const u8;
        // SAFETY: the slot stays committed and unreclaimed while this
        // guard exists, `len` was recovered from the terminator the
        // commit wrote, and the slot's bytes are contiguous.
        unsafe { core::slice::from_raw_parts(base, self.len) }
    }
}

impl Drop for LineGuard<'_, '_> {
    fn drop(&mut self) {
        let ring = self.reader.ring;
        let next = (self.slot + 1) % ring.depth;
        ring.tail.store(next, Ordering::Release);
    }
}
