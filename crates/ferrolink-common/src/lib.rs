// ============================================
// File: crates/ferrolink-common/src/lib.rs
// ============================================
//! # Ferrolink Common - Shared Foundations Library
//!
//! ## Creation Reason
//! Provides the foundational types shared by every Ferrolink crate: error
//! definitions, time utilities, cooperative cancellation, and the pooled
//! buffer machinery (byte pool and byte hub) that all I/O paths are built on.
//!
//! ## Main Functionality
//! - [`error`]: Common error types and result alias
//! - [`time`]: Timestamps with freshness validation
//! - [`cancel`]: Cooperative cancellation tokens usable from sync and async code
//! - [`pool`]: Pooled block allocator with drop-guard rentals
//! - [`hub`]: Single-producer/single-consumer byte pipe over pooled blocks
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │              ferrolink-core                         │
//! │                    │                                │
//! │                    ▼                                │
//! │   ferrolink-fec   ferrolink-transport               │
//! │         │                 │                         │
//! │         └────────┬────────┘                         │
//! │                  ▼                                  │
//! │           ferrolink-common  ◄── You are here        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//! - Buffer-pool rentals are drop-guards; never leak them across FFI
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod error;
pub mod hub;
pub mod pool;
pub mod time;

// Re-export commonly used items at crate root
pub use cancel::CancelToken;
pub use error::{CommonError, Result};
pub use hub::{ByteHub, HubReader, HubWriter};
pub use pool::{BytePool, PoolBlock};
pub use time::Timestamp;
