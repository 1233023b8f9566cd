//! Live order views for tracking screens.
//!
//! An [`OrderSubscriptionManager`] keeps one view coherent: the list of a
//! user's orders (fetched once, then patched by live updates) and at most one
//! selected order with a live change feed. State is published through a
//! `tokio::sync::watch` channel so any number of readers see the same snapshot.

use crate::error::LifecycleError;
use crate::scheduler::ProgressionScheduler;
use order_lifecycle_core::{
    Order, OrderChange, OrderId, OrderStore, OrderStoreError, OrderWatch, UserId, WatchEvent,
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

/// What the view currently shows.
///
/// Serializes as `{"state": "found", "order": {...}}` for UI clients.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(tag = "state", content = "order", rename_all = "snake_case")]
pub enum Selection {
    /// Nothing selected.
    #[default]
    Idle,
    /// Waiting for the first read of the order.
    Loading(OrderId),
    /// Latest snapshot of the selected order.
    Found(Order),
    /// The selected order does not exist or could not be read.
    NotFound(OrderId),
}

impl Selection {
    /// The selected order, when loaded.
    #[must_use]
    pub const fn order(&self) -> Option<&Order> {
        match self {
            Self::Found(order) => Some(order),
            _ => None,
        }
    }

    /// Identifier of the selected order.
    #[must_use]
    pub const fn order_id(&self) -> Option<&OrderId> {
        match self {
            Self::Idle => None,
            Self::Loading(id) | Self::NotFound(id) => Some(id),
            Self::Found(order) => Some(&order.id),
        }
    }
}

/// State of one tracking view.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TrackingSnapshot {
    /// Selected order
    pub selected: Selection,
    /// The user's orders, open ones first, newest first within each group
    pub orders: Vec<Order>,
}

/// Sorts orders for display: non-terminal first, then newest first.
pub fn sort_orders(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        a.is_terminal()
            .cmp(&b.is_terminal())
            .then_with(|| b.created_millis().cmp(&a.created_millis()))
    });
}

/// The order to show when the caller did not ask for one: the first open
/// order, otherwise the most recent.
#[must_use]
pub fn default_selection(orders: &[Order]) -> Option<OrderId> {
    orders
        .iter()
        .filter(|order| !order.is_terminal())
        .max_by_key(|order| order.created_millis())
        .or_else(|| orders.iter().max_by_key(|order| order.created_millis()))
        .map(|order| order.id.clone())
}

/// Merges a fresh snapshot into the list by id and re-sorts.
///
/// Orders missing from the list are appended. A snapshot with a shorter
/// history than the one held is stale and ignored. Returns whether the list
/// changed.
pub fn merge_order(orders: &mut Vec<Order>, incoming: Order) -> bool {
    match orders.iter_mut().find(|order| order.id == incoming.id) {
        Some(existing) if incoming.revision() < existing.revision() => return false,
        Some(existing) => *existing = incoming,
        None => orders.push(incoming),
    }
    sort_orders(orders);
    true
}

/// Keeps a tracking view in sync with the order store.
///
/// Dropping the manager stops its live feed.
pub struct OrderSubscriptionManager {
    store: Arc<dyn OrderStore>,
    scheduler: Arc<ProgressionScheduler>,
    state: Arc<watch::Sender<TrackingSnapshot>>,
    live: Mutex<Option<JoinHandle<()>>>,
}

impl OrderSubscriptionManager {
    /// Open an idle view.
    #[must_use]
    pub fn open(store: Arc<dyn OrderStore>, scheduler: Arc<ProgressionScheduler>) -> Self {
        let (state, _) = watch::channel(TrackingSnapshot::default());
        Self {
            store,
            scheduler,
            state: Arc::new(state),
            live: Mutex::new(None),
        }
    }

    /// Current state.
    #[must_use]
    pub fn snapshot(&self) -> TrackingSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<TrackingSnapshot> {
        self.state.subscribe()
    }

    /// Fetch the user's orders once and sort them.
    ///
    /// Live updates of the selected order are merged into this list later.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] when the query fails; the list is
    /// cleared rather than left stale.
    #[tracing::instrument(skip(self, user_id), fields(user_id = %user_id))]
    pub async fn load_orders(&self, user_id: &UserId) -> Result<Vec<Order>, LifecycleError> {
        match self.store.query_by_user(user_id).await {
            Ok(mut orders) => {
                sort_orders(&mut orders);
                tracing::debug!(count = orders.len(), "Loaded orders");
                self.state.send_modify(|state| state.orders.clone_from(&orders));
                Ok(orders)
            },
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load orders");
                self.state.send_modify(|state| state.orders.clear());
                Err(e.into())
            },
        }
    }

    /// Select an order and follow it live.
    ///
    /// With `None` the default selection of the loaded list is used. The
    /// previous live feed is fully stopped before the new one opens, so a view
    /// never holds more than one.
    #[tracing::instrument(skip(self))]
    pub async fn select(&self, requested: Option<OrderId>) -> Selection {
        let mut live = self.live.lock().await;
        stop(live.take()).await;

        let target = requested.or_else(|| default_selection(&self.state.borrow().orders));
        let Some(id) = target else {
            self.state.send_modify(|state| state.selected = Selection::Idle);
            return Selection::Idle;
        };

        self.state
            .send_modify(|state| state.selected = Selection::Loading(id.clone()));

        // Subscribe before reading so no write between the two is missed.
        let watch = self.store.subscribe(&id);
        let follower = Follower {
            store: Arc::clone(&self.store),
            scheduler: Arc::clone(&self.scheduler),
            state: Arc::clone(&self.state),
        };
        follower.refresh(&id).await;
        *live = Some(tokio::spawn(follower.follow(watch)));

        self.state.borrow().selected.clone()
    }

    /// Stop following the selected order and clear the selection.
    pub async fn close(&self) {
        stop(self.live.lock().await.take()).await;
        self.state
            .send_modify(|state| state.selected = Selection::Idle);
    }
}

impl Drop for OrderSubscriptionManager {
    fn drop(&mut self) {
        if let Some(task) = self.live.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for OrderSubscriptionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderSubscriptionManager")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

async fn stop(task: Option<JoinHandle<()>>) {
    if let Some(task) = task {
        task.abort();
        // Waiting for the abort drops the old feed before a new one opens.
        let _ = task.await;
    }
}

/// Applies one order's feed to the view state.
struct Follower {
    store: Arc<dyn OrderStore>,
    scheduler: Arc<ProgressionScheduler>,
    state: Arc<watch::Sender<TrackingSnapshot>>,
}

impl Follower {
    async fn follow(self, mut watch: OrderWatch) {
        let id = watch.order_id().clone();
        while let Some(event) = watch.recv().await {
            match event {
                WatchEvent::Change(OrderChange::Updated(order)) => self.apply(order),
                WatchEvent::Change(OrderChange::Deleted(id)) => self.vanish(&id),
                WatchEvent::Lagged(skipped) => {
                    tracing::debug!(order_id = %id, skipped, "Feed lagged, re-reading order");
                    self.refresh(&id).await;
                },
            }
        }
        tracing::debug!(order_id = %id, "Order feed closed");
    }

    async fn refresh(&self, id: &OrderId) {
        match self.store.get(id).await {
            Ok(order) => self.apply(order),
            Err(OrderStoreError::NotFound(_)) => self.vanish(id),
            Err(e) => {
                tracing::warn!(order_id = %id, error = %e, "Failed to read order");
                self.vanish(id);
            },
        }
    }

    fn apply(&self, order: Order) {
        let open = !order.is_terminal();
        let id = order.id.clone();
        self.state.send_modify(|state| {
            let fresher = match &state.selected {
                Selection::Found(held) if held.id == id => order.revision() >= held.revision(),
                Selection::Loading(selected) | Selection::NotFound(selected) => *selected == id,
                _ => false,
            };
            if fresher {
                state.selected = Selection::Found(order.clone());
            }
            merge_order(&mut state.orders, order);
        });

        if open {
            self.scheduler.drive(&id);
        }
    }

    fn vanish(&self, id: &OrderId) {
        tracing::debug!(order_id = %id, "Selected order no longer exists");
        self.state.send_modify(|state| {
            state.orders.retain(|order| order.id != *id);
            if state.selected.order_id() == Some(id) {
                state.selected = Selection::NotFound(id.clone());
            }
        });
    }
}
