//! Engine operations over the order store.
//!
//! Every operation reads a fresh snapshot, asks [`OrderStatusMachine`] whether
//! the change is legal, and writes the result with a compare-and-swap on the
//! status it read. Expected races are reported as `Ok(false)`.

use crate::countdown::{self, EstimateProjector};
use crate::error::{CancelOutcome, LifecycleError};
use crate::scheduler;
use crate::timing::{DwellPlanner, ProgressionTimings};
use chrono::{DateTime, Utc};
use order_lifecycle_core::environment::{Clock, SystemClock};
use order_lifecycle_core::{
    DriverId, Order, OrderId, OrderPatch, OrderStatus, OrderStatusMachine, OrderStore,
    OrderStoreError, TransitionError,
};
use order_lifecycle_travel::TravelTimeEstimator;
use std::sync::Arc;

/// Attempts made by [`OrderLifecycle::cancel_order`] when the order keeps
/// changing under it.
const CANCEL_ATTEMPTS: usize = 3;

/// Handle to the order lifecycle engine.
///
/// Cheap to clone; clones share the store, the clock and the planner.
///
/// # Example
///
/// ```ignore
/// let lifecycle = OrderLifecycle::new(store, TravelTimeEstimator::offline(config));
///
/// assert!(lifecycle.confirm_order(&id).await?);
/// assert!(!lifecycle.confirm_order(&id).await?); // already confirmed
/// ```
#[derive(Clone)]
pub struct OrderLifecycle {
    store: Arc<dyn OrderStore>,
    clock: Arc<dyn Clock>,
    planner: DwellPlanner,
}

impl OrderLifecycle {
    /// Create an engine using the system clock and default timings.
    #[must_use]
    pub fn new(store: Arc<dyn OrderStore>, estimator: TravelTimeEstimator) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            planner: DwellPlanner::new(estimator, ProgressionTimings::default()),
        }
    }

    /// Replace the clock used for history timestamps and waits.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the progression timings.
    #[must_use]
    pub fn with_timings(mut self, timings: ProgressionTimings) -> Self {
        self.planner = DwellPlanner::new(self.planner.estimator().clone(), timings);
        self
    }

    /// The order store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// The clock.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The dwell planner.
    #[must_use]
    pub const fn planner(&self) -> &DwellPlanner {
        &self.planner
    }

    /// Countdown projector sharing this engine's planner and clock.
    #[must_use]
    pub fn projector(&self) -> EstimateProjector {
        EstimateProjector::new(self.planner.clone(), Arc::clone(&self.clock))
    }

    /// `placed` → `confirmed`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] for unexpected store failures.
    #[tracing::instrument(skip(self, id), fields(order_id = %id))]
    pub async fn confirm_order(&self, id: &OrderId) -> Result<bool, LifecycleError> {
        self.transition(id, OrderStatus::Confirmed).await
    }

    /// `confirmed` → `preparing`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] for unexpected store failures.
    #[tracing::instrument(skip(self, id), fields(order_id = %id))]
    pub async fn start_preparing(&self, id: &OrderId) -> Result<bool, LifecycleError> {
        self.transition(id, OrderStatus::Preparing).await
    }

    /// `preparing` → `driver_assigned` for delivery orders.
    ///
    /// Records `driver_id`, or the simulated default driver when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] for unexpected store failures.
    #[tracing::instrument(skip(self, id), fields(order_id = %id))]
    pub async fn assign_driver(
        &self,
        id: &OrderId,
        driver_id: Option<DriverId>,
    ) -> Result<bool, LifecycleError> {
        self.apply(id, OrderStatus::DriverAssigned, move |order, now| {
            OrderStatusMachine::assign_driver(order, driver_id, now)
        })
        .await
    }

    /// `driver_assigned` → `driver_picked_up`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] for unexpected store failures.
    #[tracing::instrument(skip(self, id), fields(order_id = %id))]
    pub async fn driver_picked_up(&self, id: &OrderId) -> Result<bool, LifecycleError> {
        self.transition(id, OrderStatus::DriverPickedUp).await
    }

    /// `driver_picked_up` → `on_the_way`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] for unexpected store failures.
    #[tracing::instrument(skip(self, id), fields(order_id = %id))]
    pub async fn mark_on_the_way(&self, id: &OrderId) -> Result<bool, LifecycleError> {
        self.transition(id, OrderStatus::OnTheWay).await
    }

    /// Customer confirmation that a delivery order arrived.
    ///
    /// Accepted from any open delivery status; a repeat is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] for unexpected store failures.
    #[tracing::instrument(skip(self, id), fields(order_id = %id))]
    pub async fn mark_as_delivered(&self, id: &OrderId) -> Result<bool, LifecycleError> {
        self.apply(id, OrderStatus::Delivered, OrderStatusMachine::confirm_delivery)
            .await
    }

    /// `preparing` → `ready` for pickup orders.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] for unexpected store failures.
    #[tracing::instrument(skip(self, id), fields(order_id = %id))]
    pub async fn mark_order_ready(&self, id: &OrderId) -> Result<bool, LifecycleError> {
        self.transition(id, OrderStatus::Ready).await
    }

    /// Cancel an order that has not reached the driver or the counter yet.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] for unexpected store failures.
    #[tracing::instrument(skip(self, id), fields(order_id = %id))]
    pub async fn cancel_order(&self, id: &OrderId) -> Result<CancelOutcome, LifecycleError> {
        for _ in 0..CANCEL_ATTEMPTS {
            let order = match self.store.get(id).await {
                Ok(order) => order,
                Err(OrderStoreError::NotFound(_)) => {
                    return Ok(CancelOutcome::Rejected {
                        reason: "Order not found".to_string(),
                    });
                },
                Err(e) => return Err(e.into()),
            };

            let cancelled =
                match OrderStatusMachine::transition(&order, OrderStatus::Cancelled, self.clock.now())
                {
                    Ok(cancelled) => cancelled,
                    Err(error) => {
                        metrics::counter!("order_lifecycle_transitions_rejected_total").increment(1);
                        tracing::info!(status = %order.status, %error, "Cancellation refused");
                        return Ok(CancelOutcome::Rejected {
                            reason: error.to_string(),
                        });
                    },
                };

            match self
                .store
                .update(id, Some(order.status), OrderPatch::from_order(&cancelled))
                .await
            {
                Ok(_) => {
                    metrics::counter!("order_lifecycle_transitions_total", "status" => OrderStatus::Cancelled.as_str())
                        .increment(1);
                    tracing::info!(from = %order.status, "Order cancelled");
                    return Ok(CancelOutcome::Cancelled);
                },
                Err(OrderStoreError::ConcurrencyConflict { actual, .. }) => {
                    tracing::debug!(%actual, "Order changed during cancellation, retrying");
                },
                Err(OrderStoreError::NotFound(_)) => {
                    return Ok(CancelOutcome::Rejected {
                        reason: "Order not found".to_string(),
                    });
                },
                Err(e) => return Err(e.into()),
            }
        }

        Ok(CancelOutcome::Rejected {
            reason: "The order is being updated. Please try again.".to_string(),
        })
    }

    /// Drive the order to its final status or to cancellation.
    ///
    /// Safe to call repeatedly and concurrently for the same order: each step
    /// re-validates against the stored order, so duplicate runs converge
    /// without duplicating history. Returns once the order is terminal,
    /// deleted, or a step is refused.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] when the store fails unexpectedly; the
    /// run stops and is not retried.
    #[tracing::instrument(skip(self, id), fields(order_id = %id))]
    pub async fn auto_progress_order(&self, id: &OrderId) -> Result<(), LifecycleError> {
        scheduler::progress(self, id).await
    }

    /// Human-readable time until the status after `status`.
    ///
    /// `None` for terminal statuses.
    pub async fn time_estimate(&self, status: OrderStatus, order: &Order) -> Option<String> {
        self.planner
            .dwell(status, order)
            .await
            .map(countdown::describe)
    }

    /// Perform the automatic step into `target`.
    pub(crate) async fn step(&self, id: &OrderId, target: OrderStatus) -> Result<bool, LifecycleError> {
        match target {
            OrderStatus::DriverAssigned => self.assign_driver(id, None).await,
            _ => self.transition(id, target).await,
        }
    }

    async fn transition(&self, id: &OrderId, target: OrderStatus) -> Result<bool, LifecycleError> {
        self.apply(id, target, |order, now| {
            OrderStatusMachine::transition(order, target, now)
        })
        .await
    }

    async fn apply<F>(&self, id: &OrderId, target: OrderStatus, change: F) -> Result<bool, LifecycleError>
    where
        F: FnOnce(&Order, DateTime<Utc>) -> Result<Order, TransitionError>,
    {
        let order = match self.store.get(id).await {
            Ok(order) => order,
            Err(OrderStoreError::NotFound(_)) => {
                tracing::debug!(%target, "Order vanished, skipping transition");
                return Ok(false);
            },
            Err(e) => {
                tracing::warn!(%target, error = %e, "Failed to read order");
                return Err(e.into());
            },
        };

        let updated = match change(&order, self.clock.now()) {
            Ok(updated) => updated,
            Err(error) if error.is_noop() => {
                tracing::debug!(%target, %error, "Transition already applied");
                return Ok(false);
            },
            Err(error) => {
                metrics::counter!("order_lifecycle_transitions_rejected_total").increment(1);
                tracing::debug!(from = %order.status, %target, %error, "Transition refused");
                return Ok(false);
            },
        };

        match self
            .store
            .update(id, Some(order.status), OrderPatch::from_order(&updated))
            .await
        {
            Ok(stored) => {
                metrics::counter!("order_lifecycle_transitions_total", "status" => target.as_str())
                    .increment(1);
                tracing::info!(
                    from = %order.status,
                    to = %stored.status,
                    history_len = stored.status_history.len(),
                    "Order status updated"
                );
                Ok(true)
            },
            Err(e) if e.is_race() => {
                metrics::counter!("order_lifecycle_transitions_rejected_total").increment(1);
                tracing::debug!(%target, error = %e, "Lost transition race");
                Ok(false)
            },
            Err(e) => {
                tracing::warn!(%target, error = %e, "Failed to write transition");
                Err(e.into())
            },
        }
    }
}

impl std::fmt::Debug for OrderLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderLifecycle")
            .field("planner", &self.planner)
            .finish_non_exhaustive()
    }
}
