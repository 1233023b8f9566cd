//! Runtime error types.

use order_lifecycle_core::OrderStoreError;
use thiserror::Error;

/// Errors surfaced by engine operations.
///
/// Expected races (a deleted order, an invalid or repeated transition, a
/// concurrent writer) are reported as `Ok(false)` by the operations and never
/// appear here. Only unexpected store failures propagate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The order store failed in a way the engine cannot absorb.
    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),
}

/// Result of a cancellation request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The order is now cancelled.
    Cancelled,
    /// The order was not cancelled; `reason` is meant to be shown to the customer.
    Rejected {
        /// User-facing explanation
        reason: String,
    },
}

impl CancelOutcome {
    /// Whether the order was cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The refusal message, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Cancelled => None,
            Self::Rejected { reason } => Some(reason),
        }
    }
}
