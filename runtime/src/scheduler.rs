//! Simulated restaurant and driver progression.
//!
//! [`ProgressionScheduler`] walks an order through its flow, waiting the dwell
//! of each status before writing the next one. The wait is measured from the
//! history timestamp of the current status, so a run started late (after a
//! restart or by a second screen) only waits for what is left.
//!
//! Runs do not coordinate with each other. Every step re-reads the order and
//! writes with a compare-and-swap, so concurrent runs for one order converge
//! and the losers stop.

use crate::error::LifecycleError;
use crate::lifecycle::OrderLifecycle;
use order_lifecycle_core::{OrderId, OrderStoreError};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Drives one order until it is terminal, deleted, or a step is refused.
pub(crate) async fn progress(lifecycle: &OrderLifecycle, id: &OrderId) -> Result<(), LifecycleError> {
    loop {
        let order = match lifecycle.store().get(id).await {
            Ok(order) => order,
            Err(OrderStoreError::NotFound(_)) => {
                tracing::debug!(order_id = %id, "Order vanished, stopping progression");
                return Ok(());
            },
            Err(e) => {
                tracing::warn!(order_id = %id, error = %e, "Progression stopped by store error");
                return Err(e.into());
            },
        };

        let Some(next) = order.order_type.successor(order.status) else {
            tracing::debug!(order_id = %id, status = %order.status, "Nothing left to progress");
            return Ok(());
        };
        let Some(dwell) = lifecycle.planner().dwell(order.status, &order).await else {
            return Ok(());
        };

        let entered_at = order
            .current_entry()
            .map_or(order.created_at, |entry| entry.timestamp);
        let elapsed = (lifecycle.clock().now() - entered_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let wait = dwell.saturating_sub(elapsed);

        metrics::histogram!("order_lifecycle_progression_wait_seconds").record(wait.as_secs_f64());
        tracing::debug!(
            order_id = %id,
            status = %order.status,
            %next,
            wait_secs = wait.as_secs_f64(),
            "Waiting for next status"
        );
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }

        if !lifecycle.step(id, next).await? {
            tracing::debug!(order_id = %id, %next, "Step refused, stopping progression");
            return Ok(());
        }
    }
}

/// Owns background progression tasks.
///
/// At most one task per order is kept; [`Self::drive`] is a no-op while a
/// task for that order is still running. Dropping the scheduler aborts every
/// task, and with it any pending wait.
pub struct ProgressionScheduler {
    lifecycle: OrderLifecycle,
    tasks: Mutex<HashMap<OrderId, JoinHandle<()>>>,
}

impl ProgressionScheduler {
    /// Create a scheduler with no running tasks.
    #[must_use]
    pub fn new(lifecycle: OrderLifecycle) -> Self {
        Self {
            lifecycle,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// The engine this scheduler writes through.
    #[must_use]
    pub const fn lifecycle(&self) -> &OrderLifecycle {
        &self.lifecycle
    }

    /// Drive `id` on the current task until it stops.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Store`] when the store fails unexpectedly.
    pub async fn run(&self, id: &OrderId) -> Result<(), LifecycleError> {
        progress(&self.lifecycle, id).await
    }

    /// Drive `id` on a background task.
    ///
    /// Returns `false` without spawning when a task for `id` is still running.
    /// Must be called within a tokio runtime.
    pub fn drive(&self, id: &OrderId) -> bool {
        let mut tasks = self.tasks();
        if tasks.get(id).is_some_and(|task| !task.is_finished()) {
            return false;
        }

        let lifecycle = self.lifecycle.clone();
        let order_id = id.clone();
        let task = tokio::spawn(async move {
            if let Err(error) = progress(&lifecycle, &order_id).await {
                tracing::warn!(order_id = %order_id, %error, "Background progression failed");
            }
        });
        tasks.insert(id.clone(), task);
        tracing::debug!(order_id = %id, "Started background progression");
        true
    }

    /// Whether a task for `id` is running.
    #[must_use]
    pub fn is_driving(&self, id: &OrderId) -> bool {
        self.tasks()
            .get(id)
            .is_some_and(|task| !task.is_finished())
    }

    /// Number of running tasks.
    #[must_use]
    pub fn active(&self) -> usize {
        let mut tasks = self.tasks();
        tasks.retain(|_, task| !task.is_finished());
        tasks.len()
    }

    /// Abort the task for `id`, cancelling its pending wait.
    ///
    /// Returns whether a running task was aborted.
    pub fn abort(&self, id: &OrderId) -> bool {
        self.tasks().remove(id).is_some_and(|task| {
            let running = !task.is_finished();
            task.abort();
            running
        })
    }

    /// Abort every task.
    pub fn abort_all(&self) {
        for (_, task) in self.tasks().drain() {
            task.abort();
        }
    }

    /// Abort every task and wait until all of them have stopped.
    pub async fn shutdown(&self) {
        let tasks: Vec<_> = self
            .tasks()
            .drain()
            .map(|(_, task)| {
                task.abort();
                task
            })
            .collect();
        let count = tasks.len();
        futures::future::join_all(tasks).await;
        tracing::debug!(count, "Progression tasks stopped");
    }

    fn tasks(&self) -> MutexGuard<'_, HashMap<OrderId, JoinHandle<()>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for ProgressionScheduler {
    fn drop(&mut self) {
        self.abort_all();
    }
}

impl std::fmt::Debug for ProgressionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressionScheduler")
            .field("lifecycle", &self.lifecycle)
            .field("active", &self.active())
            .finish()
    }
}
