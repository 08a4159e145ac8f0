// ============================================
// File: crates/ferrolink-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types for the handshake protocol and the secure record
//! layer.
//!
//! ## Main Functionality
//! - `CoreError`: Primary error enum for secure-connection operations
//! - Classification helpers (handshake failures, suspicious events)
//!
//! ## Error Categories
//! 1. **Handshake Errors**: negotiation, freshness, and authentication
//! 2. **Record Errors**: framing, sequencing, and MAC validation
//! 3. **State Errors**: invalid operation order
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material or passwords in error messages
//! - Record errors are terminal; the secure connection records the first
//!   one and replays it to later callers
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use ferrolink_common::error::CommonError;
use ferrolink_transport::error::TransportError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Secure-connection error types.
///
/// # Security Note
/// Error messages are designed to be informative for debugging without
/// revealing key material or password contents.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    // ========================================
    // State Errors
    // ========================================

    /// `send`/`receive` called before the handshake completed.
    #[error("Connection not handshaked")]
    NotHandshaked,

    /// Operation not valid in current state.
    #[error("Invalid state for operation: {operation} requires {required_state}")]
    InvalidState {
        /// What operation was attempted
        operation: String,
        /// What state was required
        required_state: String,
    },

    // ========================================
    // Handshake Errors
    // ========================================

    /// The peers disagree on whether password authentication is in use.
    #[error("Authentication type mismatch: ours {ours}, theirs {theirs}")]
    AuthTypeMismatch {
        /// Our advertised authentication type
        ours: u8,
        /// The peer's advertised authentication type
        theirs: u8,
    },

    /// No algorithm of the given category is shared with the peer.
    #[error("No common {category} algorithm with peer")]
    NoCommonAlgorithm {
        /// Algorithm category that failed to intersect
        category: &'static str,
    },

    /// The negotiated algorithm is not implemented.
    #[error("Unsupported {category} algorithm: {value}")]
    Unsupported {
        /// Algorithm category
        category: &'static str,
        /// Negotiated numeric identifier
        value: u64,
    },

    /// The peer's agreement public key is too old or too far in the future.
    #[error("Stale agreement public key: {skew_secs}s outside the freshness window")]
    StalePublicKey {
        /// Observed clock distance in seconds
        skew_secs: u64,
    },

    /// Password authentication found no shared password.
    #[error("No password matched with peer")]
    PasswordMismatch,

    /// Key exchange material could not be processed.
    #[error("Key exchange failed: {reason}")]
    KeyExchange {
        /// Why key exchange failed
        reason: String,
    },

    // ========================================
    // Record Errors
    // ========================================

    /// The record's declared running total disagrees with the local count.
    #[error("Record sequence mismatch: declared {declared}, expected {expected}")]
    SequenceMismatch {
        /// Running total declared by the sender
        declared: u64,
        /// Running total maintained locally
        expected: u64,
    },

    /// Record MAC verification failed.
    #[error("Record MAC invalid")]
    MacInvalid,

    /// A record was structurally invalid.
    #[error("Malformed record: {reason}")]
    MalformedFrame {
        /// What's wrong with the record
        reason: String,
    },

    /// A handshake message was structurally invalid.
    #[error("Malformed handshake message: {reason}")]
    MalformedMessage {
        /// What's wrong with the message
        reason: String,
    },

    /// A cipher or MAC primitive failed.
    #[error("Crypto operation failed: {context}")]
    Crypto {
        /// What was being computed
        context: String,
    },

    // ========================================
    // Cancellation & Wrapped Errors
    // ========================================

    /// The operation observed a cancellation request before completing.
    #[error("Operation cancelled")]
    Cancelled,

    /// Error from the underlying framed connection, propagated as-is.
    #[error(transparent)]
    Connection(#[from] TransportError),

    /// Error from the common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    /// Creates a `MalformedFrame` error.
    pub fn malformed_frame(reason: impl Into<String>) -> Self {
        Self::MalformedFrame {
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedMessage` error.
    pub fn malformed_message(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Creates a `KeyExchange` error.
    pub fn key_exchange(reason: impl Into<String>) -> Self {
        Self::KeyExchange {
            reason: reason.into(),
        }
    }

    /// Creates a `Crypto` error.
    pub fn crypto(context: impl Into<String>) -> Self {
        Self::Crypto {
            context: context.into(),
        }
    }

    /// Creates an `InvalidState` error.
    pub fn invalid_state(
        operation: impl Into<String>,
        required_state: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            required_state: required_state.into(),
        }
    }

    /// Maps transport-layer errors into this layer, preserving the
    /// cancellation kind and propagating `ConnectionClosed` as-is.
    #[must_use]
    pub fn from_transport(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => Self::Cancelled,
            other => Self::Connection(other),
        }
    }

    /// Returns `true` if this error aborted a handshake.
    #[must_use]
    pub const fn is_handshake_failure(&self) -> bool {
        matches!(
            self,
            Self::AuthTypeMismatch { .. }
                | Self::NoCommonAlgorithm { .. }
                | Self::Unsupported { .. }
                | Self::StalePublicKey { .. }
                | Self::PasswordMismatch
                | Self::KeyExchange { .. }
        )
    }

    /// Returns `true` if this error might indicate an attack.
    ///
    /// These errors warrant additional logging/monitoring.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::MacInvalid
                | Self::SequenceMismatch { .. }
                | Self::StalePublicKey { .. }
                | Self::PasswordMismatch
        )
    }

    /// Returns `true` if the secure connection is unusable after this error.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Cancelled | Self::NotHandshaked | Self::InvalidState { .. } => false,
            Self::Connection(e) => e.is_fatal(),
            Self::Common(e) => !e.is_cancelled() && !e.is_usage_error(),
            _ => true,
        }
    }
}

// ============================================
// Tests
// ============================================
