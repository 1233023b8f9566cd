//! How long each status lasts before the next automatic transition.
//!
//! Fixed steps use [`ProgressionTimings`]. The `on_the_way` step uses the
//! travel-time estimate minus the preparation buffer it already contains,
//! never less than [`ProgressionTimings::min_final_leg`].

use order_lifecycle_core::{Order, OrderStatus, OrderType};
use order_lifecycle_travel::TravelTimeEstimator;
use std::time::Duration;

/// Dwell time of every status that is followed by an automatic step.
///
/// # Default Values
///
/// | Status | Dwell |
/// |---|---|
/// | `placed` | 30 s |
/// | `confirmed` | 10 s |
/// | `preparing` (pickup) | 5 min |
/// | `preparing` (delivery) | 2 min |
/// | `driver_assigned` | 1 min |
/// | `driver_picked_up` | 5 s |
/// | `on_the_way` without a route | 3 min |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressionTimings {
    /// `placed` → `confirmed`
    pub placed: Duration,
    /// `confirmed` → `preparing`
    pub confirmed: Duration,
    /// `preparing` → `ready`
    pub preparing_pickup: Duration,
    /// `preparing` → `driver_assigned`
    pub preparing_delivery: Duration,
    /// `driver_assigned` → `driver_picked_up`
    pub driver_assigned: Duration,
    /// `driver_picked_up` → `on_the_way`
    pub driver_picked_up: Duration,
    /// `on_the_way` → `delivered` when the order has no coordinates
    pub final_leg_default: Duration,
    /// Lower bound for the travel-derived `on_the_way` dwell
    pub min_final_leg: Duration,
    travel_scale: f64,
}

impl Default for ProgressionTimings {
    fn default() -> Self {
        Self {
            placed: Duration::from_secs(30),
            confirmed: Duration::from_secs(10),
            preparing_pickup: Duration::from_secs(5 * 60),
            preparing_delivery: Duration::from_secs(2 * 60),
            driver_assigned: Duration::from_secs(60),
            driver_picked_up: Duration::from_secs(5),
            final_leg_default: Duration::from_secs(3 * 60),
            min_final_leg: Duration::from_secs(60),
            travel_scale: 1.0,
        }
    }
}

impl ProgressionTimings {
    /// Multiply every duration by `factor`.
    ///
    /// `scaled(0.01)` runs a full delivery in seconds. Non-positive or
    /// non-finite factors leave the timings unchanged.
    #[must_use]
    pub fn scaled(self, factor: f64) -> Self {
        if !factor.is_finite() || factor <= 0.0 {
            return self;
        }
        Self {
            placed: self.placed.mul_f64(factor),
            confirmed: self.confirmed.mul_f64(factor),
            preparing_pickup: self.preparing_pickup.mul_f64(factor),
            preparing_delivery: self.preparing_delivery.mul_f64(factor),
            driver_assigned: self.driver_assigned.mul_f64(factor),
            driver_picked_up: self.driver_picked_up.mul_f64(factor),
            final_leg_default: self.final_leg_default.mul_f64(factor),
            min_final_leg: self.min_final_leg.mul_f64(factor),
            travel_scale: self.travel_scale * factor,
        }
    }

    /// Factor applied to travel-derived durations.
    #[must_use]
    pub const fn travel_scale(&self) -> f64 {
        self.travel_scale
    }

    /// Set the factor applied to travel-derived durations.
    ///
    /// Non-positive or non-finite factors are ignored.
    #[must_use]
    pub fn with_travel_scale(mut self, factor: f64) -> Self {
        if factor.is_finite() && factor > 0.0 {
            self.travel_scale = factor;
        }
        self
    }

    /// Set the `placed` dwell.
    #[must_use]
    pub const fn with_placed(mut self, dwell: Duration) -> Self {
        self.placed = dwell;
        self
    }

    /// Set the `confirmed` dwell.
    #[must_use]
    pub const fn with_confirmed(mut self, dwell: Duration) -> Self {
        self.confirmed = dwell;
        self
    }

    /// Set the `preparing` dwell for both flows.
    #[must_use]
    pub const fn with_preparing(mut self, pickup: Duration, delivery: Duration) -> Self {
        self.preparing_pickup = pickup;
        self.preparing_delivery = delivery;
        self
    }

    /// Set the driver hand-off dwells.
    #[must_use]
    pub const fn with_driver_steps(mut self, assigned: Duration, picked_up: Duration) -> Self {
        self.driver_assigned = assigned;
        self.driver_picked_up = picked_up;
        self
    }

    /// Set the lower bound of the final leg.
    #[must_use]
    pub const fn with_min_final_leg(mut self, floor: Duration) -> Self {
        self.min_final_leg = floor;
        self
    }
}

/// Computes the dwell of a status for a given order.
#[derive(Debug, Clone)]
pub struct DwellPlanner {
    estimator: TravelTimeEstimator,
    timings: ProgressionTimings,
}

impl DwellPlanner {
    /// Create a planner.
    #[must_use]
    pub const fn new(estimator: TravelTimeEstimator, timings: ProgressionTimings) -> Self {
        Self { estimator, timings }
    }

    /// The fixed timings.
    #[must_use]
    pub const fn timings(&self) -> &ProgressionTimings {
        &self.timings
    }

    /// The travel-time estimator.
    #[must_use]
    pub const fn estimator(&self) -> &TravelTimeEstimator {
        &self.estimator
    }

    /// How long `status` lasts for `order` before the next automatic step.
    ///
    /// `None` for terminal statuses. The travel-time source is only queried for
    /// `on_the_way`.
    pub async fn dwell(&self, status: OrderStatus, order: &Order) -> Option<Duration> {
        let t = &self.timings;
        match status {
            OrderStatus::Placed => Some(t.placed),
            OrderStatus::Confirmed => Some(t.confirmed),
            OrderStatus::Preparing => Some(match order.order_type {
                OrderType::Pickup => t.preparing_pickup,
                OrderType::Delivery => t.preparing_delivery,
            }),
            OrderStatus::DriverAssigned => Some(t.driver_assigned),
            OrderStatus::DriverPickedUp => Some(t.driver_picked_up),
            OrderStatus::OnTheWay => Some(self.final_leg(order).await),
            OrderStatus::Delivered | OrderStatus::Ready | OrderStatus::Cancelled => None,
        }
    }

    async fn final_leg(&self, order: &Order) -> Duration {
        let (Some(origin), Some(destination)) =
            (order.restaurant_coordinates, order.delivery_coordinates)
        else {
            return self.timings.final_leg_default;
        };

        let estimate = self.estimator.estimate(Some(origin), Some(destination)).await;
        let unscaled = estimate
            .duration
            .saturating_sub(self.estimator.preparation_buffer());
        let scaled = unscaled.as_secs_f64() * self.timings.travel_scale;
        let travel = Duration::try_from_secs_f64(scaled).unwrap_or(Duration::MAX);

        tracing::debug!(
            order_id = %order.id,
            source = ?estimate.source,
            travel_secs = travel.as_secs(),
            "Planned final leg"
        );

        travel.max(self.timings.min_final_leg)
    }
}
