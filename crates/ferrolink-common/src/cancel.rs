// ============================================
// File: crates/ferrolink-common/src/cancel.rs
// ============================================
//! # Cooperative Cancellation
//!
//! ## Creation Reason
//! Every suspending operation in Ferrolink (enqueue/dequeue on a framed
//! connection, secure send/receive, coder row loops) accepts a cancellation
//! token. One token type serves both worlds: async tasks await
//! [`CancelToken::cancelled`], synchronous worker loops poll
//! [`CancelToken::is_cancelled`].
//!
//! ## Main Functionality
//! - `CancelToken`: cloneable handle around a shared flag + notifier
//! - Cancellation is sticky: once cancelled, always cancelled
//!
//! ## ⚠️ Important Note for Next Developer
//! - `cancelled()` re-checks the flag after registering interest; do not
//!   "simplify" that ordering or a cancel between the check and the await
//!   will be missed
//!
//! ## Last Modified
//! v0.1.0 - Initial cancellation token

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

// ============================================
// CancelToken
// ============================================

/// Cloneable cooperative cancellation token.
///
/// All clones share the same state; cancelling any clone cancels them all.
///
/// # Example
/// ```
/// use ferrolink_common::CancelToken;
///
/// let token = CancelToken::new();
/// let worker = token.clone();
/// assert!(!worker.is_cancelled());
/// token.cancel();
/// assert!(worker.is_cancelled());
/// ```
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelToken {
    /// Creates a new, un-cancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation and wakes all waiters.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns `true` if cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation has been requested.
    ///
    /// Returns immediately if the token is already cancelled.
    pub async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            // Register interest before re-checking so a concurrent cancel
            // between the check and the await is not lost.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_token_not_cancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_cancel() {
        let token = CancelToken::new();
        let waiter = token.clone();

        let handle = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        tokio::task::yield_now().await;
        token.cancel();
        handle.await.expect("waiter task completes");
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_already_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        // Must not hang.
        token.cancelled().await;
    }
}
