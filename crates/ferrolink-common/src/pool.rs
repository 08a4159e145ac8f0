// ============================================
// File: crates/ferrolink-common/src/pool.rs
// ============================================
//! # Pooled Block Allocator
//!
//! ## Creation Reason
//! Connection hot paths rent and release buffers on every frame. A shared
//! free-list of fixed-size blocks avoids allocator churn and gives one place
//! to enforce zeroing for buffers that may carry key material.
//!
//! ## Main Functionality
//! - `BytePool`: shared free-list of fixed-size blocks
//! - `PoolBlock`: drop-guard rental that returns its block automatically
//!
//! ## Zeroing Discipline
//! Blocks are zeroed when they re-enter the free list, and freshly allocated
//! blocks start zeroed, so every rental observes an all-zero block. Callers
//! must still track their own logical lengths: a rental may be larger than
//! what the caller asked the surrounding API for.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Retention is bounded; blocks beyond `max_retained` are dropped
//! - `PoolBlock` must never outlive intentional teardown paths; it holds an
//!   `Arc` back to its pool
//!
//! ## Last Modified
//! v0.1.0 - Initial pool implementation

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{CommonError, Result};

// ============================================
// Constants
// ============================================

/// Default block size for pools created with [`BytePool::new`].
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;

/// Default bound on the number of retained free blocks.
pub const DEFAULT_MAX_RETAINED: usize = 64;

// ============================================
// BytePool
// ============================================

/// Shared allocator of fixed-size byte blocks.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use ferrolink_common::BytePool;
///
/// let pool = Arc::new(BytePool::new(4096));
/// let block = pool.rent();
/// assert_eq!(block.len(), 4096);
/// assert!(block.iter().all(|&b| b == 0));
/// // Dropping the block returns it to the pool.
/// ```
pub struct BytePool {
    block_size: usize,
    max_retained: usize,
    free: Mutex<Vec<Box<[u8]>>>,
}

impl BytePool {
    /// Creates a pool vending blocks of `block_size` bytes.
    #[must_use]
    pub fn new(block_size: usize) -> Self {
        Self::with_max_retained(block_size, DEFAULT_MAX_RETAINED)
    }

    /// Creates a pool with an explicit retention bound.
    #[must_use]
    pub fn with_max_retained(block_size: usize, max_retained: usize) -> Self {
        Self {
            block_size: block_size.max(1),
            max_retained,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Validates that this pool can serve rentals of at least `min_size`.
    ///
    /// # Errors
    /// Returns `OutOfRange` if the pool's blocks are smaller than `min_size`.
    pub fn check_block_size(&self, min_size: usize) -> Result<()> {
        if self.block_size < min_size {
            return Err(CommonError::out_of_range(
                self.block_size,
                min_size,
                usize::MAX,
            ));
        }
        Ok(())
    }

    /// Size in bytes of every block this pool vends.
    #[must_use]
    pub const fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks currently sitting in the free list.
    #[must_use]
    pub fn retained_count(&self) -> usize {
        self.free.lock().len()
    }

    /// Rents a zeroed block from the pool.
    ///
    /// The returned guard dereferences to the full block and returns it to
    /// the pool when dropped.
    #[must_use]
    pub fn rent(self: &Arc<Self>) -> PoolBlock {
        let data = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| vec![0u8; self.block_size].into_boxed_slice());
        PoolBlock {
            data: Some(data),
            pool: Arc::clone(self),
        }
    }

    fn give_back(&self, mut data: Box<[u8]>) {
        // Scrub before retention so later renters never observe old bytes.
        data.fill(0);
        let mut free = self.free.lock();
        if free.len() < self.max_retained {
            free.push(data);
        }
    }
}

impl std::fmt::Debug for BytePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BytePool")
            .field("block_size", &self.block_size)
            .field("max_retained", &self.max_retained)
            .field("retained", &self.retained_count())
            .finish()
    }
}

// ============================================
// PoolBlock
// ============================================

/// A rented block; returns itself to its pool on drop.
pub struct PoolBlock {
    data: Option<Box<[u8]>>,
    pool: Arc<BytePool>,
}

impl Deref for PoolBlock {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data.as_deref().expect("block present until drop")
    }
}

impl DerefMut for PoolBlock {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data.as_deref_mut().expect("block present until drop")
    }
}

impl Drop for PoolBlock {
    fn drop(&mut self) {
        if let Some(data) = self.data.take() {
            self.pool.give_back(data);
        }
    }
}

impl std::fmt::Debug for PoolBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PoolBlock({} bytes)", self.len())
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rent_returns_zeroed_block_of_block_size() {
        let pool = Arc::new(BytePool::new(128));
        let block = pool.rent();
        assert_eq!(block.len(), 128);
        assert!(block.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_blocks_are_reused_and_scrubbed() {
        let pool = Arc::new(BytePool::new(64));
        {
            let mut block = pool.rent();
            block[0] = 0xAA;
            block[63] = 0x55;
        }
        assert_eq!(pool.retained_count(), 1);

        let block = pool.rent();
        assert_eq!(pool.retained_count(), 0);
        assert!(block.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_retention_is_bounded() {
        let pool = Arc::new(BytePool::with_max_retained(32, 2));
        let blocks: Vec<_> = (0..4).map(|_| pool.rent()).collect();
        drop(blocks);
        assert_eq!(pool.retained_count(), 2);
    }

    #[test]
    fn test_check_block_size() {
        let pool = BytePool::new(256);
        assert!(pool.check_block_size(256).is_ok());
        assert!(pool.check_block_size(257).is_err());
    }
}
