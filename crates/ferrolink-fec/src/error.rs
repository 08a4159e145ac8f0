// ============================================
// File: crates/ferrolink-fec/src/error.rs
// ============================================
//! # FEC Error Types
//!
//! ## Creation Reason
//! Defines error types for erasure-coding operations.
//!
//! ## Main Functionality
//! - `FecError`: Primary error enum for coder operations
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for erasure-coding operations.
pub type Result<T> = std::result::Result<T, FecError>;

// ============================================
// FecError
// ============================================

/// Erasure-coding error types.
#[derive(Error, Debug, Clone)]
pub enum FecError {
    /// Coder parameters or operation inputs are inconsistent.
    #[error("Invalid parameters: {reason}")]
    InvalidParameters {
        /// What is inconsistent
        reason: String,
    },

    /// Matrix inversion found no usable pivot; the packet/index combination
    /// cannot reconstruct the data.
    #[error("Singular matrix: no pivot for column {column}")]
    SingularMatrix {
        /// Column where pivot search failed
        column: usize,
    },

    /// The decode index set names the same position twice.
    #[error("Duplicate packet index {index}")]
    DuplicateIndex {
        /// The position that appeared twice
        index: usize,
    },

    /// The operation observed a cancellation request before completing.
    #[error("Operation cancelled")]
    Cancelled,
}

impl FecError {
    /// Creates an `InvalidParameters` error.
    pub fn invalid_parameters(reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the inputs (not the coder) caused the failure.
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParameters { .. }
                | Self::SingularMatrix { .. }
                | Self::DuplicateIndex { .. }
        )
    }
}

// ============================================
// Tests
// ============================================
