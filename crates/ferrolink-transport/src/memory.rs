// ============================================
// File: crates/ferrolink-transport/src/memory.rs
// ============================================
//! # In-Memory Cap Pair
//!
//! ## Creation Reason
//! Provides a loopback transport for testing framed and secure connections
//! without sockets: two caps joined by bounded in-memory byte queues.
//!
//! ## Main Functionality
//! - `MemoryCap::pair()`: two connected caps with default capacity
//! - Configurable queue capacity to exercise short writes
//! - `close()` to simulate remote teardown
//!
//! ## Usage in Tests
//! ```
//! use ferrolink_transport::{Cap, MemoryCap};
//!
//! let (a, b) = MemoryCap::pair();
//! a.send(b"ping").unwrap();
//! let mut buf = [0u8; 16];
//! let n = b.receive(&mut buf).unwrap();
//! assert_eq!(&buf[..n], b"ping");
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Capacity-bounded queues are deliberate: partial sends are exactly what
//!   the connection state machines must survive
//! - After `close()` the peer may still drain buffered bytes before it
//!   observes `ConnectionClosed` (mirrors TCP teardown)
//!
//! ## Last Modified
//! v0.1.0 - Initial in-memory cap

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cap::Cap;
use crate::error::{Result, TransportError};

// ============================================
// Constants
// ============================================

/// Default per-direction queue capacity in bytes.
pub const DEFAULT_CAPACITY: usize = 64 * 1024;

// ============================================
// MemoryCap
// ============================================

/// One endpoint of an in-memory byte-stream pair.
pub struct MemoryCap {
    /// Queue this endpoint writes into.
    outbound: Arc<Channel>,
    /// Queue this endpoint reads from.
    inbound: Arc<Channel>,
    /// Shared liveness flag for the whole pair.
    connected: Arc<AtomicBool>,
}

struct Channel {
    buf: Mutex<VecDeque<u8>>,
    capacity: usize,
}

impl Channel {
    fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            buf: Mutex::new(VecDeque::with_capacity(capacity.min(4096))),
            capacity,
        })
    }
}

impl MemoryCap {
    /// Creates a connected pair with [`DEFAULT_CAPACITY`] queues.
    #[must_use]
    pub fn pair() -> (Arc<Self>, Arc<Self>) {
        Self::pair_with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a connected pair with the given per-direction capacity.
    ///
    /// Small capacities force short writes, which is useful for exercising
    /// the connection state machines.
    #[must_use]
    pub fn pair_with_capacity(capacity: usize) -> (Arc<Self>, Arc<Self>) {
        let a_to_b = Channel::new(capacity.max(1));
        let b_to_a = Channel::new(capacity.max(1));
        let connected = Arc::new(AtomicBool::new(true));
        let a = Arc::new(Self {
            outbound: Arc::clone(&a_to_b),
            inbound: Arc::clone(&b_to_a),
            connected: Arc::clone(&connected),
        });
        let b = Arc::new(Self {
            outbound: b_to_a,
            inbound: a_to_b,
            connected,
        });
        (a, b)
    }

    /// Tears the pair down; both endpoints stop accepting writes.
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Bytes currently buffered toward the peer (test introspection).
    #[must_use]
    pub fn outbound_len(&self) -> usize {
        self.outbound.buf.lock().len()
    }
}

impl Cap for MemoryCap {
    fn can_send(&self) -> bool {
        self.is_connected() && self.outbound.buf.lock().len() < self.outbound.capacity
    }

    fn can_receive(&self) -> bool {
        !self.inbound.buf.lock().is_empty()
    }

    fn send(&self, buf: &[u8]) -> Result<usize> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }
        let mut queue = self.outbound.buf.lock();
        let space = self.outbound.capacity.saturating_sub(queue.len());
        let n = space.min(buf.len());
        queue.extend(&buf[..n]);
        Ok(n)
    }

    fn receive(&self, buf: &mut [u8]) -> Result<usize> {
        let mut queue = self.inbound.buf.lock();
        if queue.is_empty() {
            // Drained and torn down: report the end of the stream.
            if !self.connected.load(Ordering::SeqCst) {
                return Err(TransportError::ConnectionClosed);
            }
            return Ok(0);
        }
        let n = queue.len().min(buf.len());
        for slot in buf.iter_mut().take(n) {
            *slot = queue.pop_front().expect("queue holds at least n bytes");
        }
        Ok(n)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_flow_both_directions() {
        let (a, b) = MemoryCap::pair();
        a.send(b"to-b").unwrap();
        b.send(b"to-a").unwrap();

        let mut buf = [0u8; 8];
        let n = b.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"to-b");
        let n = a.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"to-a");
    }

    #[test]
    fn test_capacity_bounds_produce_short_writes() {
        let (a, _b) = MemoryCap::pair_with_capacity(4);
        let n = a.send(b"123456").unwrap();
        assert_eq!(n, 4);
        assert!(!a.can_send());
        // No space left: zero-byte progress, not an error.
        assert_eq!(a.send(b"x").unwrap(), 0);
    }

    #[test]
    fn test_receive_without_data_is_zero() {
        let (a, _b) = MemoryCap::pair();
        let mut buf = [0u8; 4];
        assert_eq!(a.receive(&mut buf).unwrap(), 0);
        assert!(!a.can_receive());
    }

    #[test]
    fn test_close_semantics() {
        let (a, b) = MemoryCap::pair();
        a.send(b"last words").unwrap();
        a.close();

        assert!(!b.is_connected());
        assert!(matches!(
            b.send(b"x"),
            Err(TransportError::ConnectionClosed)
        ));

        // Peer drains buffered bytes first, then sees the teardown.
        let mut buf = [0u8; 16];
        let n = b.receive(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"last words");
        assert!(matches!(
            b.receive(&mut buf),
            Err(TransportError::ConnectionClosed)
        ));
    }
}
