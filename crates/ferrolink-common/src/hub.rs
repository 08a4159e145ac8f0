// ============================================
// File: crates/ferrolink-common/src/hub.rs
// ============================================
//! # Byte Hub
//!
//! ## Creation Reason
//! Frame assembly and disassembly need a byte pipe that grows without
//! copying: the producer fills pooled blocks span by span, the consumer
//! observes the written bytes as an ordered, possibly discontiguous
//! sequence of read-only chunks.
//!
//! ## Main Functionality
//! - `ByteHub`: single-producer/single-consumer pipe over pooled blocks
//! - `HubWriter`: vends writable spans, tracks the write cursor
//! - `HubReader`: exposes the unconsumed bytes, tracks the read cursor
//!
//! ## Invariants
//! - Bytes are observed by the reader in exactly the order the writer
//!   produced them
//! - `remain_bytes == written_bytes - advanced_bytes` at all times
//! - `reset` returns every block to the pool and zeroes both cursors
//!
//! ## ⚠️ Important Note for Next Developer
//! - A span request that does not fit in the current tail block rents a new
//!   block and strands the tail's free space; the reader sequence only ever
//!   exposes the filled prefix of each block
//! - The head block is only released once fully consumed, and the tail block
//!   only after `complete()` - the writer may still be filling it
//!
//! ## Last Modified
//! v0.1.0 - Initial hub implementation

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{CommonError, Result};
use crate::pool::{BytePool, PoolBlock};

// ============================================
// ByteHub
// ============================================

/// Single-producer/single-consumer byte pipe backed by pooled blocks.
///
/// Access is mediated through [`HubWriter`] and [`HubReader`] views obtained
/// from [`ByteHub::writer`] and [`ByteHub::reader`]; the borrow checker
/// guarantees the two sides never run interleaved on the same hub.
pub struct ByteHub {
    pool: Arc<BytePool>,
    blocks: VecDeque<HubBlock>,
    /// Consumed prefix of the head block.
    head_consumed: usize,
    written: u64,
    advanced: u64,
    /// Unclaimed remainder of the last span vended to the writer.
    vended: usize,
    completed: bool,
}

struct HubBlock {
    block: PoolBlock,
    filled: usize,
}

impl ByteHub {
    /// Creates an empty hub renting from `pool`.
    #[must_use]
    pub fn new(pool: Arc<BytePool>) -> Self {
        Self {
            pool,
            blocks: VecDeque::new(),
            head_consumed: 0,
            written: 0,
            advanced: 0,
            vended: 0,
            completed: false,
        }
    }

    /// Returns the writer view of this hub.
    pub fn writer(&mut self) -> HubWriter<'_> {
        HubWriter { hub: self }
    }

    /// Returns the reader view of this hub.
    pub fn reader(&mut self) -> HubReader<'_> {
        HubReader { hub: self }
    }

    /// Total bytes ever written into this hub (monotone until `reset`).
    #[must_use]
    pub const fn written_bytes(&self) -> u64 {
        self.written
    }

    /// Bytes written but not yet consumed by the reader.
    #[must_use]
    pub const fn remain_bytes(&self) -> u64 {
        self.written - self.advanced
    }

    /// Returns every block to the pool and zeroes both cursors.
    ///
    /// After `reset` the hub behaves exactly like a freshly constructed one.
    pub fn reset(&mut self) {
        self.blocks.clear();
        self.head_consumed = 0;
        self.written = 0;
        self.advanced = 0;
        self.vended = 0;
        self.completed = false;
    }

    fn get_span(&mut self, hint: usize) -> Result<&mut [u8]> {
        if self.completed {
            return Err(CommonError::invalid_use(
                "get_span",
                "hub already completed",
            ));
        }
        let block_size = self.pool.block_size();
        let want = hint.clamp(1, block_size);
        let tail_free = self
            .blocks
            .back()
            .map_or(0, |b| b.block.len() - b.filled);
        if tail_free < want {
            self.blocks.push_back(HubBlock {
                block: self.pool.rent(),
                filled: 0,
            });
        }
        let tail = self.blocks.back_mut().expect("tail block present");
        let span = &mut tail.block[tail.filled..];
        self.vended = span.len();
        Ok(span)
    }

    fn advance_writer(&mut self, n: usize) -> Result<()> {
        if n > self.vended {
            return Err(CommonError::invalid_use(
                "advance",
                format!("advanced {} past the {}-byte span last vended", n, self.vended),
            ));
        }
        if n == 0 {
            return Ok(());
        }
        let tail = self.blocks.back_mut().expect("vended span has a block");
        tail.filled += n;
        self.vended -= n;
        self.written += n as u64;
        Ok(())
    }

    fn advance_reader(&mut self, n: usize) -> Result<()> {
        if n as u64 > self.remain_bytes() {
            return Err(CommonError::invalid_use(
                "advance",
                format!(
                    "advanced {} past the {} remaining bytes",
                    n,
                    self.remain_bytes()
                ),
            ));
        }
        let mut left = n;
        while left > 0 {
            let (avail, filled) = {
                let head = self.blocks.front().expect("remaining bytes have a block");
                (head.filled - self.head_consumed, head.filled)
            };
            let step = left.min(avail);
            self.head_consumed += step;
            self.advanced += step as u64;
            left -= step;
            if self.head_consumed == filled && self.releasable_head() {
                self.blocks.pop_front();
                self.head_consumed = 0;
            }
        }
        Ok(())
    }

    /// Whether the head block can go back to the pool: never release the
    /// tail while the writer may still be filling it.
    fn releasable_head(&self) -> bool {
        self.blocks.len() > 1 || self.completed
    }
}

impl std::fmt::Debug for ByteHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteHub")
            .field("blocks", &self.blocks.len())
            .field("written", &self.written)
            .field("advanced", &self.advanced)
            .field("completed", &self.completed)
            .finish()
    }
}

// ============================================
// HubWriter
// ============================================

/// Producer view of a [`ByteHub`].
pub struct HubWriter<'a> {
    hub: &'a mut ByteHub,
}

impl HubWriter<'_> {
    /// Vends a writable span of at least `min(hint, block_size)` bytes.
    ///
    /// # Errors
    /// Returns `invalid-use` if the hub has been completed.
    pub fn get_span(&mut self, hint: usize) -> Result<&mut [u8]> {
        self.hub.get_span(hint)
    }

    /// Marks `n` bytes of the last vended span as written.
    ///
    /// # Errors
    /// Returns `invalid-use` if `n` exceeds the span last vended.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        self.hub.advance_writer(n)
    }

    /// Copies `data` into the hub, renting blocks as needed.
    ///
    /// # Errors
    /// Returns `invalid-use` if the hub has been completed.
    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut offset = 0;
        while offset < data.len() {
            let span = self.hub.get_span(data.len() - offset)?;
            let step = span.len().min(data.len() - offset);
            span[..step].copy_from_slice(&data[offset..offset + step]);
            self.hub.advance_writer(step)?;
            offset += step;
        }
        Ok(())
    }

    /// Total bytes written so far.
    #[must_use]
    pub fn written_bytes(&self) -> u64 {
        self.hub.written_bytes()
    }

    /// Seals the hub; further span requests fail with `invalid-use`.
    pub fn complete(&mut self) {
        self.hub.completed = true;
    }
}

// ============================================
// HubReader
// ============================================

/// Consumer view of a [`ByteHub`].
pub struct HubReader<'a> {
    hub: &'a mut ByteHub,
}

impl HubReader<'_> {
    /// Ordered sequence of read-only chunks covering all unconsumed bytes.
    pub fn sequence(&self) -> impl Iterator<Item = &[u8]> {
        let head_consumed = self.hub.head_consumed;
        self.hub.blocks.iter().enumerate().filter_map(move |(i, b)| {
            let start = if i == 0 { head_consumed } else { 0 };
            (start < b.filled).then(|| &b.block[start..b.filled])
        })
    }

    /// Marks `n` bytes as consumed, releasing drained blocks to the pool.
    ///
    /// # Errors
    /// Returns `invalid-use` if `n` exceeds the remaining bytes.
    pub fn advance(&mut self, n: usize) -> Result<()> {
        self.hub.advance_reader(n)
    }

    /// Bytes written but not yet consumed.
    #[must_use]
    pub fn remain_bytes(&self) -> u64 {
        self.hub.remain_bytes()
    }

    /// Copies all remaining bytes into a `Vec` and consumes them.
    pub fn copy_to_vec(&mut self) -> Vec<u8> {
        let remain = usize::try_from(self.hub.remain_bytes()).unwrap_or(usize::MAX);
        let mut out = Vec::with_capacity(remain);
        for chunk in self.sequence() {
            out.extend_from_slice(chunk);
        }
        self.hub
            .advance_reader(out.len())
            .expect("sequence length matches remaining bytes");
        out
    }

    /// Releases any remaining buffers; equivalent to draining and resetting.
    pub fn complete(&mut self) {
        self.hub.reset();
    }
}

// ============================================
// Tests
// ============================================
