//! Order store trait and change notifications.
//!
//! The order store is the single source of truth for order documents. It offers
//! point reads, conditional updates, per-user queries and a live change feed per
//! order.
//!
//! # Implementations
//!
//! - `InMemoryOrderStore` (in `order-lifecycle-testing`): fast, deterministic tests and demos
//!
//! # Optimistic Concurrency
//!
//! [`OrderStore::update`] accepts the status the caller based its change on. If
//! the stored order moved on in the meantime the write is refused with
//! [`OrderStoreError::ConcurrencyConflict`], so two writers racing on the same
//! transition cannot both append to the history.

use crate::order::{DriverId, NewOrder, Order, OrderId, StatusEntry, UserId};
use crate::status::OrderStatus;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use tokio::sync::broadcast;

/// Boxed future returned by [`OrderStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, OrderStoreError>> + Send + 'a>>;

/// Errors that can occur during order store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderStoreError {
    /// The order does not exist (never created or deleted).
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The order changed status since the caller read it.
    #[error("Concurrency conflict on order {id}: expected status {expected}, found {actual}")]
    ConcurrencyConflict {
        /// Order being written
        id: OrderId,
        /// Status the caller expected
        expected: OrderStatus,
        /// Status actually stored
        actual: OrderStatus,
    },

    /// Backend connection or query failure.
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// A document could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl OrderStoreError {
    /// Whether the error is an expected race (deletion or a concurrent writer)
    /// rather than a backend failure.
    #[must_use]
    pub const fn is_race(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::ConcurrencyConflict { .. })
    }
}

/// Fields written by a status transition.
///
/// `status_history` always carries the full array so the store never has to
/// merge partial histories.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderPatch {
    /// New status
    pub status: OrderStatus,
    /// Complete history including the new entry
    pub status_history: Vec<StatusEntry>,
    /// Driver to record, if the transition assigns one
    pub driver_id: Option<DriverId>,
    /// Time of the transition, written to the matching milestone field
    pub stamped_at: Option<DateTime<Utc>>,
}

impl OrderPatch {
    /// Extracts the transition fields from an order produced by the state machine.
    #[must_use]
    pub fn from_order(updated: &Order) -> Self {
        Self {
            status: updated.status,
            status_history: updated.status_history.clone(),
            driver_id: updated.driver_id.clone(),
            stamped_at: updated.status_history.last().map(|entry| entry.timestamp),
        }
    }

    /// Writes the patch into a stored document.
    pub fn apply_to(self, order: &mut Order) {
        order.status = self.status;
        order.status_history = self.status_history;
        if let Some(driver_id) = self.driver_id {
            order.driver_id = Some(driver_id);
        }
        if let Some(at) = self.stamped_at {
            order.stamp_milestone(self.status, at);
        }
    }
}

/// A change to a watched order.
#[derive(Clone, Debug, PartialEq)]
pub enum OrderChange {
    /// The order was written; carries the full new document.
    Updated(Order),
    /// The order was deleted.
    Deleted(OrderId),
}

/// Item delivered by [`OrderWatch::recv`].
#[derive(Clone, Debug, PartialEq)]
pub enum WatchEvent {
    /// A change notification.
    Change(OrderChange),
    /// The watcher fell behind and missed this many notifications; the caller
    /// should re-read the order.
    Lagged(u64),
}

/// Live change feed for one order. Dropping it unsubscribes.
#[derive(Debug)]
pub struct OrderWatch {
    order_id: OrderId,
    receiver: broadcast::Receiver<OrderChange>,
}

impl OrderWatch {
    /// Wraps a broadcast receiver for `order_id`.
    #[must_use]
    pub const fn new(order_id: OrderId, receiver: broadcast::Receiver<OrderChange>) -> Self {
        Self { order_id, receiver }
    }

    /// The watched order.
    #[must_use]
    pub const fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    /// Waits for the next notification. Returns `None` once the store side closed.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        match self.receiver.recv().await {
            Ok(change) => Some(WatchEvent::Change(change)),
            Err(broadcast::error::RecvError::Lagged(skipped)) => Some(WatchEvent::Lagged(skipped)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

/// Document store holding orders.
///
/// # Dyn Compatibility
///
/// Methods return boxed futures so the store can be shared as
/// `Arc<dyn OrderStore>` between the engine, the scheduler and subscribers.
pub trait OrderStore: Send + Sync {
    /// Creates an order in `placed` status and returns its identifier.
    ///
    /// # Errors
    ///
    /// - `DatabaseError`: backend failure
    fn create(&self, order: NewOrder) -> StoreFuture<'_, OrderId>;

    /// Reads the current document.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the order does not exist
    /// - `DatabaseError` / `SerializationError`: backend failure
    fn get(&self, id: &OrderId) -> StoreFuture<'_, Order>;

    /// Applies `patch` and returns the stored result.
    ///
    /// When `expected_status` is `Some`, the write only happens if the stored
    /// status still equals it.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the order does not exist
    /// - `ConcurrencyConflict`: the stored status differs from `expected_status`
    /// - `DatabaseError` / `SerializationError`: backend failure
    fn update(
        &self,
        id: &OrderId,
        expected_status: Option<OrderStatus>,
        patch: OrderPatch,
    ) -> StoreFuture<'_, Order>;

    /// Point-in-time list of a user's orders, in no particular order.
    ///
    /// # Errors
    ///
    /// - `DatabaseError` / `SerializationError`: backend failure
    fn query_by_user(&self, user_id: &UserId) -> StoreFuture<'_, Vec<Order>>;

    /// Opens a live change feed for one order.
    ///
    /// Subscribing to an order that does not exist yet is allowed; the feed
    /// reports changes once it is written.
    fn subscribe(&self, id: &OrderId) -> OrderWatch;

    /// Deletes the order.
    ///
    /// # Errors
    ///
    /// - `NotFound`: the order does not exist
    /// - `DatabaseError`: backend failure
    fn delete(&self, id: &OrderId) -> StoreFuture<'_, ()>;
}
