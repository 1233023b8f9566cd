//! In-memory order store.
//!
//! Backs tests and the demo binary with a `HashMap` of documents and one
//! broadcast channel per order for change notifications.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Lock poisoning only happens after a test already panicked

use order_lifecycle_core::environment::{Clock, SystemClock};
use order_lifecycle_core::store::StoreFuture;
use order_lifecycle_core::{
    NewOrder, Order, OrderChange, OrderId, OrderPatch, OrderStatus, OrderStore, OrderStoreError,
    OrderWatch, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::broadcast;

/// Buffered notifications per order before a slow watcher lags.
const FEED_CAPACITY: usize = 16;

struct Inner {
    orders: RwLock<HashMap<OrderId, Order>>,
    feeds: Mutex<HashMap<OrderId, broadcast::Sender<OrderChange>>>,
    next_id: AtomicU64,
    writes: AtomicUsize,
    fail_update: Mutex<Option<OrderStoreError>>,
    fail_query: Mutex<Option<OrderStoreError>>,
    latency: Option<Duration>,
    clock: Arc<dyn Clock>,
}

/// In-memory order store for fast, deterministic testing.
///
/// Clones share the same data, so a clone can be handed to the engine while the
/// test keeps one for inspection.
///
/// # Example
///
/// ```
/// use order_lifecycle_core::{NewOrder, OrderStore, OrderType, UserId};
/// use order_lifecycle_testing::InMemoryOrderStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = InMemoryOrderStore::new();
/// let id = store.create(NewOrder::new(UserId::new("user-1"), OrderType::Pickup)).await?;
/// let order = store.get(&id).await?;
/// assert_eq!(order.status_history.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct InMemoryOrderStore {
    inner: Arc<Inner>,
}

impl InMemoryOrderStore {
    /// Create an empty store stamping creation times from the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store stamping creation times from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self::build(clock, None)
    }

    /// Create a store that sleeps for `latency` before every read and write.
    ///
    /// Suspending inside store calls lets concurrent tasks interleave the way
    /// they would against a remote database.
    #[must_use]
    pub fn with_latency(clock: Arc<dyn Clock>, latency: Duration) -> Self {
        Self::build(clock, Some(latency))
    }

    fn build(clock: Arc<dyn Clock>, latency: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                orders: RwLock::new(HashMap::new()),
                feeds: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                writes: AtomicUsize::new(0),
                fail_update: Mutex::new(None),
                fail_query: Mutex::new(None),
                latency,
                clock,
            }),
        }
    }

    /// Insert or replace a document directly, without notifying watchers.
    ///
    /// Useful for seeding orders with specific histories or timestamps.
    pub fn insert(&self, order: Order) {
        self.inner
            .orders
            .write()
            .unwrap()
            .insert(order.id.clone(), order);
    }

    /// Snapshot of a stored document.
    #[must_use]
    pub fn snapshot(&self, id: &OrderId) -> Option<Order> {
        self.inner.orders.read().unwrap().get(id).cloned()
    }

    /// Make the next `update` fail with `error`.
    pub fn fail_next_update(&self, error: OrderStoreError) {
        *self.inner.fail_update.lock().unwrap() = Some(error);
    }

    /// Make the next `query_by_user` fail with `error`.
    pub fn fail_next_query(&self, error: OrderStoreError) {
        *self.inner.fail_query.lock().unwrap() = Some(error);
    }

    /// Number of successful `update` calls.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Number of live watchers for an order.
    #[must_use]
    pub fn subscriber_count(&self, id: &OrderId) -> usize {
        self.inner
            .feeds
            .lock()
            .unwrap()
            .get(id)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of orders with an open change feed.
    #[must_use]
    pub fn feed_count(&self) -> usize {
        self.inner.feeds.lock().unwrap().len()
    }

    /// Number of stored orders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.orders.read().unwrap().len()
    }

    /// Check if the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.orders.read().unwrap().is_empty()
    }

    async fn pause(&self) {
        if let Some(latency) = self.inner.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn notify(&self, id: &OrderId, change: OrderChange) {
        let mut feeds = self.inner.feeds.lock().unwrap();
        if let Some(feed) = feeds.get(id) {
            // Sending fails only once every watcher is gone.
            if feed.send(change).is_err() {
                feeds.remove(id);
            }
        }
    }

    fn create_now(&self, new: NewOrder) -> OrderId {
        let n = self.inner.next_id.fetch_add(1, Ordering::SeqCst);
        let id = OrderId::new(format!("order-{n}"));
        let order = Order::from_new(id.clone(), new, self.inner.clock.now());
        self.insert(order);
        id
    }

    fn get_now(&self, id: &OrderId) -> Result<Order, OrderStoreError> {
        self.snapshot(id)
            .ok_or_else(|| OrderStoreError::NotFound(id.clone()))
    }

    fn update_now(
        &self,
        id: &OrderId,
        expected_status: Option<OrderStatus>,
        patch: OrderPatch,
    ) -> Result<Order, OrderStoreError> {
        if let Some(error) = self.inner.fail_update.lock().unwrap().take() {
            return Err(error);
        }

        let mut orders = self.inner.orders.write().unwrap();
        let order = orders
            .get_mut(id)
            .ok_or_else(|| OrderStoreError::NotFound(id.clone()))?;

        if let Some(expected) = expected_status {
            if order.status != expected {
                return Err(OrderStoreError::ConcurrencyConflict {
                    id: id.clone(),
                    expected,
                    actual: order.status,
                });
            }
        }

        patch.apply_to(order);
        let updated = order.clone();
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        // Notify while still holding the write lock so feeds see writes in order.
        self.notify(id, OrderChange::Updated(updated.clone()));
        drop(orders);
        Ok(updated)
    }

    fn delete_now(&self, id: &OrderId) -> Result<(), OrderStoreError> {
        let mut orders = self.inner.orders.write().unwrap();
        if orders.remove(id).is_none() {
            return Err(OrderStoreError::NotFound(id.clone()));
        }
        self.notify(id, OrderChange::Deleted(id.clone()));
        // Watchers drain the deletion, then see the feed close.
        self.inner.feeds.lock().unwrap().remove(id);
        drop(orders);
        Ok(())
    }
}

impl Default for InMemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryOrderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryOrderStore")
            .field("orders", &self.len())
            .field("writes", &self.write_count())
            .finish_non_exhaustive()
    }
}

impl OrderStore for InMemoryOrderStore {
    fn create(&self, order: NewOrder) -> StoreFuture<'_, OrderId> {
        Box::pin(async move {
            self.pause().await;
            Ok(self.create_now(order))
        })
    }

    fn get(&self, id: &OrderId) -> StoreFuture<'_, Order> {
        let id = id.clone();
        Box::pin(async move {
            self.pause().await;
            self.get_now(&id)
        })
    }

    fn update(
        &self,
        id: &OrderId,
        expected_status: Option<OrderStatus>,
        patch: OrderPatch,
    ) -> StoreFuture<'_, Order> {
        let id = id.clone();
        Box::pin(async move {
            self.pause().await;
            self.update_now(&id, expected_status, patch)
        })
    }

    fn query_by_user(&self, user_id: &UserId) -> StoreFuture<'_, Vec<Order>> {
        let user_id = user_id.clone();
        Box::pin(async move {
            self.pause().await;
            if let Some(error) = self.inner.fail_query.lock().unwrap().take() {
                return Err(error);
            }
            Ok(self
                .inner
                .orders
                .read()
                .unwrap()
                .values()
                .filter(|order| order.user_id == user_id)
                .cloned()
                .collect())
        })
    }

    fn subscribe(&self, id: &OrderId) -> OrderWatch {
        let receiver = self
            .inner
            .feeds
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_insert_with(|| broadcast::channel(FEED_CAPACITY).0)
            .subscribe();
        OrderWatch::new(id.clone(), receiver)
    }

    fn delete(&self, id: &OrderId) -> StoreFuture<'_, ()> {
        let id = id.clone();
        Box::pin(async move {
            self.pause().await;
            self.delete_now(&id)
        })
    }
}
