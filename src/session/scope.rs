//! Hierarchical cancellation scopes.
//!
//! A [`Scope`] is a node in a cancellation tree: process scope, then one
//! session scope per login, then per-feature child scopes (the feed
//! connection, an open chat room). Cancelling a node cancels every
//! descendant; cancelling a child never touches its parent.

use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// A cancellable lifetime that can spawn child lifetimes.
///
/// Cloning a `Scope` yields another handle to the same node.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    token: CancellationToken,
}

impl Scope {
    /// Creates a new root scope with no parent.
    #[must_use]
    pub fn new_root() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Creates a child scope that is cancelled whenever `self` is.
    ///
    /// A child created from an already-cancelled scope starts out cancelled.
    #[must_use]
    pub fn new_child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Cancels this scope and all of its descendants. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns `true` once this scope (or any ancestor) has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when this scope is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Owned variant of [`Scope::cancelled`], usable in `'static` tasks.
    #[must_use]
    pub fn cancelled_owned(&self) -> WaitForCancellationFutureOwned {
        self.token.clone().cancelled_owned()
    }
}
