// ============================================
// File: crates/ferrolink-transport/src/lib.rs
// ============================================
//! # Ferrolink Transport - Framed Connection Library
//!
//! ## Creation Reason
//! Provides the framed byte-stream layer every higher Ferrolink layer rides
//! on: a non-blocking transport capability ("cap") abstraction, a framed
//! connection with single-slot send/receive mailboxes, and a time-sliced
//! dispatcher that pumps registered connections within byte budgets.
//!
//! ## Main Functionality
//! - [`cap`]: The `Cap` trait - non-blocking transport primitive
//! - [`memory`]: In-memory loopback cap pair for tests and local wiring
//! - [`connection`]: `BaseConnection` - length-prefixed framing over a cap
//! - [`dispatcher`]: `ConnectionDispatcher` - cooperative per-tick pump
//!
//! ## Data Flow
//! ```text
//! application ── enqueue(writer) ──► BaseConnection ──► Cap ──► wire
//! application ◄─ dequeue(reader) ─── BaseConnection ◄── Cap ◄── wire
//!                      ▲
//!                      │ send(slice) / receive(slice)
//!              ConnectionDispatcher (1 tick ≈ 1/30 s)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Caps are non-blocking; all waiting happens on connection semaphores
//! - Exactly one frame is outstanding per direction at any time
//! - A connection is terminal after any fatal wire error; drop and redial
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cap;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod memory;

// Re-export commonly used items
pub use cap::Cap;
pub use connection::{BaseConnection, ConnectionStats, FramedConnectionConfig};
pub use dispatcher::{ConnectionDispatcher, DispatcherConfig};
pub use error::{Result, TransportError};
pub use memory::MemoryCap;
