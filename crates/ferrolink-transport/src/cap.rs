// ============================================
// File: crates/ferrolink-transport/src/cap.rs
// ============================================
//! # Transport Capability Interface
//!
//! ## Creation Reason
//! Abstracts the byte-stream transport underneath a framed connection,
//! enabling testability (in-memory pairs) and flexibility in what carries
//! the bytes (sockets, pipes, tunnels).
//!
//! ## Main Functionality
//! - `Cap`: non-blocking send/receive capability with readiness hints
//!
//! ## Design Philosophy
//! - All methods are non-blocking; the dispatcher provides scheduling
//! - `can_send`/`can_receive` are hints, not guarantees
//! - Zero-byte transfers mean "no progress right now", never end-of-stream
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be Send + Sync; connections call them from the
//!   dispatcher thread while applications hold their own handles
//! - End-of-stream is reported as `ConnectionClosed`, not as `Ok(0)`
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use crate::error::Result;

// ============================================
// Cap Trait
// ============================================

/// Non-blocking transport capability.
///
/// A `Cap` is the socket-like primitive a [`crate::BaseConnection`] is built
/// over. It transfers spans of bytes without ever blocking: a call either
/// makes progress, reports `Ok(0)` (try again later), or fails with
/// [`crate::TransportError::ConnectionClosed`] when the stream has ended.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the dispatcher and application
/// tasks may hold references concurrently.
pub trait Cap: Send + Sync {
    /// Hint: `true` means a subsequent [`Cap::send`] will likely make
    /// progress.
    fn can_send(&self) -> bool;

    /// Hint: `true` means a subsequent [`Cap::receive`] will likely make
    /// progress.
    fn can_receive(&self) -> bool;

    /// Writes bytes from `buf`, returning how many were accepted.
    ///
    /// # Errors
    /// Returns `ConnectionClosed` when the transport has been torn down.
    fn send(&self, buf: &[u8]) -> Result<usize>;

    /// Reads bytes into `buf`, returning how many were transferred.
    ///
    /// # Errors
    /// Returns `ConnectionClosed` when the transport has been torn down and
    /// no buffered bytes remain.
    fn receive(&self, buf: &mut [u8]) -> Result<usize>;

    /// Returns `true` while the transport is usable.
    fn is_connected(&self) -> bool;
}
