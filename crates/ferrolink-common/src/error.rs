// ============================================
// File: crates/ferrolink-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Provides foundational error types and result aliases used across all
//! Ferrolink crates, enabling consistent error handling.
//!
//! ## Main Functionality
//! - `CommonError`: Base error enum for common operations
//! - `Result<T>`: Type alias using `CommonError`
//! - Convenience constructors for the frequent variants
//!
//! ## Design Philosophy
//! - Use `thiserror` for ergonomic error definitions
//! - Each crate defines its own error type that wraps `CommonError`
//! - Errors are `Clone` so terminal failures can be recorded and replayed
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never include sensitive data (keys, passwords) in error messages
//! - Keep error variants specific but not too granular
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

// ============================================
// CommonError
// ============================================

/// Common error types shared across Ferrolink crates.
///
/// # Categories
/// - **Validation**: Input validation failures
/// - **Usage**: API contract violations (`invalid-use`)
/// - **Cancellation**: Cooperative cancellation observed
#[derive(Error, Debug, Clone)]
pub enum CommonError {
    /// Invalid input data provided.
    #[error("Invalid input for '{field}': {reason}")]
    InvalidInput {
        /// Name of the field or parameter
        field: String,
        /// Description of what's wrong
        reason: String,
    },

    /// Data length doesn't match expected size.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Value is out of acceptable range.
    #[error("Value out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        /// The value that was out of range
        value: String,
        /// Minimum acceptable value
        min: String,
        /// Maximum acceptable value
        max: String,
    },

    /// An API was driven outside its contract (e.g. advancing a hub past the
    /// span it vended, or writing after completion).
    #[error("Invalid use of {operation}: {reason}")]
    InvalidUse {
        /// Operation that was misused
        operation: String,
        /// How the contract was violated
        reason: String,
    },

    /// The operation observed a cancellation request before completing.
    #[error("Operation cancelled")]
    Cancelled,
}

impl CommonError {
    /// Creates an `InvalidInput` error.
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidLength` error.
    #[must_use]
    pub const fn invalid_length(expected: usize, actual: usize) -> Self {
        Self::InvalidLength { expected, actual }
    }

    /// Creates an `OutOfRange` error from displayable bounds.
    pub fn out_of_range(
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        Self::OutOfRange {
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }

    /// Creates an `InvalidUse` error.
    pub fn invalid_use(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUse {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if this error reports an API contract violation.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(self, Self::InvalidUse { .. })
    }

    /// Returns `true` if this error reports cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommonError::invalid_length(100, 50);
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("50"));

        let err = CommonError::invalid_use("advance", "past vended span");
        assert!(err.to_string().contains("advance"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CommonError::invalid_use("op", "why").is_usage_error());
        assert!(CommonError::Cancelled.is_cancelled());
        assert!(!CommonError::invalid_length(1, 2).is_usage_error());
    }

    #[test]
    fn test_errors_are_cloneable() {
        let err = CommonError::out_of_range(512, 0, 256);
        let cloned = err.clone();
        assert_eq!(err.to_string(), cloned.to_string());
    }
}
