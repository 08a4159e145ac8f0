// ============================================
// File: crates/ferrolink-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types for the framed connection layer: cap teardown,
//! framing violations, and cancellation.
//!
//! ## Main Functionality
//! - `TransportError`: Primary error enum for transport operations
//! - Categorization of fatal vs local errors
//!
//! ## Error Categories
//! 1. **Wire Errors**: cap teardown and framing violations - terminal
//! 2. **Local Errors**: cancellation and API misuse - the connection survives
//!
//! ## ⚠️ Important Note for Next Developer
//! - A connection is NOT self-healing after a fatal wire error
//! - `FrameTooLong` on the receive side is fatal (the stream is desynced);
//!   on the send side it is caught before any byte hits the wire
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use ferrolink_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Framed connection layer error types.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// The cap reported end-of-stream, or the connection was closed locally.
    #[error("Connection closed")]
    ConnectionClosed,

    /// A frame length exceeded the configured limit.
    #[error("Frame too long: {length} bytes exceeds limit of {max}")]
    FrameTooLong {
        /// Declared or produced frame length
        length: u64,
        /// Configured maximum
        max: u64,
    },

    /// The operation observed a cancellation request before completing.
    #[error("Operation cancelled")]
    Cancelled,

    /// Error from the common crate (hub misuse, validation).
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    /// Creates a `FrameTooLong` error.
    #[must_use]
    pub const fn frame_too_long(length: u64, max: u64) -> Self {
        Self::FrameTooLong { length, max }
    }

    /// Returns `true` if the connection is unusable after this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionClosed | Self::FrameTooLong { .. })
    }

    /// Returns `true` if this error reports cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Common(CommonError::Cancelled)
        )
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(TransportError::ConnectionClosed.is_fatal());
        assert!(TransportError::frame_too_long(70000, 65536).is_fatal());
        assert!(!TransportError::Cancelled.is_fatal());
        assert!(TransportError::Cancelled.is_cancelled());
    }

    #[test]
    fn test_common_error_conversion() {
        let common = CommonError::invalid_use("advance", "past span");
        let transport: TransportError = common.into();
        assert!(matches!(transport, TransportError::Common(_)));
        assert!(!transport.is_fatal());
    }
}
