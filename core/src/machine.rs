//! Pure status transition logic.
//!
//! [`OrderStatusMachine`] decides whether a requested status change is legal for an
//! order and produces the updated order value. It performs no I/O; callers read a
//! fresh snapshot, run the machine, and write the result back.

use crate::order::{DriverId, Order, StatusEntry};
use crate::status::{OrderStatus, OrderType};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Driver recorded when a driver assignment does not name one.
pub const DEFAULT_DRIVER_ID: &str = "driver_001";

/// Reasons a transition request is refused.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The order was cancelled; nothing moves it any more.
    #[error("order is cancelled")]
    Cancelled,

    /// The order already reached the requested final status.
    #[error("order is already {0}")]
    AlreadyTerminal(OrderStatus),

    /// The order is already in the requested status.
    #[error("order is already {0}")]
    AlreadyAt(OrderStatus),

    /// The requested status belongs to the other flow.
    #[error("status {status} is not part of the {order_type} flow")]
    WrongFlow {
        /// Requested status
        status: OrderStatus,
        /// Flow of the order
        order_type: OrderType,
    },

    /// The requested status is not the immediate successor of the current one.
    #[error("cannot move a {order_type} order from {from} to {to}")]
    NotNextStep {
        /// Current status
        from: OrderStatus,
        /// Requested status
        to: OrderStatus,
        /// Flow of the order
        order_type: OrderType,
    },

    /// The order is too far along to be cancelled.
    #[error("{reason}")]
    NotCancellable {
        /// Current status
        status: OrderStatus,
        /// Message shown to the customer
        reason: &'static str,
    },
}

impl TransitionError {
    /// Whether the refusal is a repeat of a change that already happened.
    ///
    /// Idempotent retries land here and must not be reported as failures.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        matches!(self, Self::AlreadyTerminal(_) | Self::AlreadyAt(_))
    }
}

/// Transition rules for both order flows.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderStatusMachine;

impl OrderStatusMachine {
    /// Checks that `target` is a legal next status for `order`.
    ///
    /// # Errors
    ///
    /// See [`TransitionError`] for the refusal reasons.
    pub fn validate(order: &Order, target: OrderStatus) -> Result<(), TransitionError> {
        let current = order.status;

        if target == OrderStatus::Cancelled {
            return match current.cancellation_refusal() {
                Some(reason) => Err(TransitionError::NotCancellable {
                    status: current,
                    reason,
                }),
                None => Ok(()),
            };
        }

        if current == OrderStatus::Cancelled {
            return Err(TransitionError::Cancelled);
        }

        if target == current {
            return Err(if current.is_terminal() {
                TransitionError::AlreadyTerminal(current)
            } else {
                TransitionError::AlreadyAt(current)
            });
        }

        if !order.order_type.admits(target) {
            return Err(TransitionError::WrongFlow {
                status: target,
                order_type: order.order_type,
            });
        }

        if order.order_type.successor(current) != Some(target) {
            return Err(TransitionError::NotNextStep {
                from: current,
                to: target,
                order_type: order.order_type,
            });
        }

        Ok(())
    }

    /// Moves `order` one step to `target`, appending a history entry.
    ///
    /// # Errors
    ///
    /// Returns the [`TransitionError`] from [`Self::validate`].
    pub fn transition(
        order: &Order,
        target: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, TransitionError> {
        Self::validate(order, target)?;
        Ok(Self::apply(order, target, now))
    }

    /// Moves a delivery order from `preparing` to `driver_assigned` and records the driver.
    ///
    /// # Errors
    ///
    /// Returns the [`TransitionError`] from [`Self::validate`].
    pub fn assign_driver(
        order: &Order,
        driver_id: Option<DriverId>,
        now: DateTime<Utc>,
    ) -> Result<Order, TransitionError> {
        let mut updated = Self::transition(order, OrderStatus::DriverAssigned, now)?;
        updated.driver_id = Some(driver_id.unwrap_or_else(|| DriverId::new(DEFAULT_DRIVER_ID)));
        Ok(updated)
    }

    /// Customer confirmation that a delivery order arrived.
    ///
    /// Unlike [`Self::transition`] this may jump forward from any open status of
    /// the delivery flow straight to `delivered`.
    ///
    /// # Errors
    ///
    /// - [`TransitionError::Cancelled`] for cancelled orders
    /// - [`TransitionError::AlreadyTerminal`] when already delivered
    /// - [`TransitionError::WrongFlow`] for pickup orders
    pub fn confirm_delivery(order: &Order, now: DateTime<Utc>) -> Result<Order, TransitionError> {
        match order.status {
            OrderStatus::Cancelled => Err(TransitionError::Cancelled),
            OrderStatus::Delivered => Err(TransitionError::AlreadyTerminal(OrderStatus::Delivered)),
            _ if order.order_type == OrderType::Pickup => Err(TransitionError::WrongFlow {
                status: OrderStatus::Delivered,
                order_type: OrderType::Pickup,
            }),
            _ => Ok(Self::apply(order, OrderStatus::Delivered, now)),
        }
    }

    fn apply(order: &Order, target: OrderStatus, now: DateTime<Utc>) -> Order {
        let mut updated = order.clone();
        updated.status = target;
        updated.status_history.push(StatusEntry::new(target, now));
        updated.stamp_milestone(target, now);
        updated
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use crate::order::{NewOrder, OrderId, UserId};
    use proptest::prelude::*;

    fn order(order_type: OrderType) -> Order {
        Order::from_new(
            OrderId::new("order-1"),
            NewOrder::new(UserId::new("user-1"), order_type),
            Utc::now(),
        )
    }

    fn at(order_type: OrderType, status: OrderStatus) -> Order {
        let mut order = order(order_type);
        for step in order_type.flow().iter().skip(1) {
            if order.status == status {
                break;
            }
            order = OrderStatusMachine::transition(&order, *step, Utc::now()).unwrap();
        }
        assert_eq!(order.status, status);
        order
    }

    #[test]
    fn single_step_advance_appends_history() {
        let placed = order(OrderType::Delivery);
        let confirmed =
            OrderStatusMachine::transition(&placed, OrderStatus::Confirmed, Utc::now()).unwrap();

        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert_eq!(confirmed.revision(), 2);
        assert_eq!(
            confirmed.status_history[1].message,
            "Restaurant has confirmed your order"
        );
        assert!(confirmed.confirmed_at.is_some());
        // input untouched
        assert_eq!(placed.revision(), 1);
    }

    #[test]
    fn skipping_is_rejected() {
        let placed = order(OrderType::Delivery);
        let err = OrderStatusMachine::transition(&placed, OrderStatus::Preparing, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            TransitionError::NotNextStep {
                from: OrderStatus::Placed,
                to: OrderStatus::Preparing,
                order_type: OrderType::Delivery,
            }
        );
        assert!(!err.is_noop());
    }

    #[test]
    fn pickup_never_reaches_driver_statuses() {
        let preparing = at(OrderType::Pickup, OrderStatus::Preparing);
        let err = OrderStatusMachine::assign_driver(&preparing, None, Utc::now()).unwrap_err();
        assert!(matches!(err, TransitionError::WrongFlow { .. }));

        let delivery = at(OrderType::Delivery, OrderStatus::Preparing);
        let err =
            OrderStatusMachine::transition(&delivery, OrderStatus::Ready, Utc::now()).unwrap_err();
        assert!(matches!(err, TransitionError::WrongFlow { .. }));
    }

    #[test]
    fn reapplying_terminal_status_is_noop() {
        let ready = at(OrderType::Pickup, OrderStatus::Ready);
        let err = OrderStatusMachine::transition(&ready, OrderStatus::Ready, Utc::now()).unwrap_err();
        assert_eq!(err, TransitionError::AlreadyTerminal(OrderStatus::Ready));
        assert!(err.is_noop());

        let confirmed = at(OrderType::Pickup, OrderStatus::Confirmed);
        let err = OrderStatusMachine::transition(&confirmed, OrderStatus::Confirmed, Utc::now())
            .unwrap_err();
        assert!(err.is_noop());
    }

    #[test]
    fn cancelled_is_sticky() {
        let placed = order(OrderType::Delivery);
        let cancelled =
            OrderStatusMachine::transition(&placed, OrderStatus::Cancelled, Utc::now()).unwrap();
        assert!(cancelled.cancelled_at.is_some());

        let err = OrderStatusMachine::transition(&cancelled, OrderStatus::Confirmed, Utc::now())
            .unwrap_err();
        assert_eq!(err, TransitionError::Cancelled);

        let err = OrderStatusMachine::transition(&cancelled, OrderStatus::Cancelled, Utc::now())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "This order has already been cancelled."
        );

        let err = OrderStatusMachine::confirm_delivery(&cancelled, Utc::now()).unwrap_err();
        assert_eq!(err, TransitionError::Cancelled);
    }

    #[test]
    fn cancellation_refused_once_driver_is_involved() {
        let assigned = at(OrderType::Delivery, OrderStatus::DriverAssigned);
        let err = OrderStatusMachine::transition(&assigned, OrderStatus::Cancelled, Utc::now())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "This order is already out for delivery and cannot be cancelled."
        );

        let preparing = at(OrderType::Pickup, OrderStatus::Preparing);
        assert!(
            OrderStatusMachine::transition(&preparing, OrderStatus::Cancelled, Utc::now()).is_ok()
        );
    }

    #[test]
    fn assign_driver_defaults_driver_id() {
        let preparing = at(OrderType::Delivery, OrderStatus::Preparing);
        let assigned = OrderStatusMachine::assign_driver(&preparing, None, Utc::now()).unwrap();
        assert_eq!(assigned.driver_id, Some(DriverId::new(DEFAULT_DRIVER_ID)));

        let named = OrderStatusMachine::assign_driver(
            &preparing,
            Some(DriverId::new("driver_042")),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(named.driver_id.unwrap().as_str(), "driver_042");
    }

    #[test]
    fn confirm_delivery_jumps_forward_once() {
        let preparing = at(OrderType::Delivery, OrderStatus::Preparing);
        let delivered = OrderStatusMachine::confirm_delivery(&preparing, Utc::now()).unwrap();
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert_eq!(delivered.revision(), preparing.revision() + 1);
        assert!(delivered.delivered_at.is_some());

        let err = OrderStatusMachine::confirm_delivery(&delivered, Utc::now()).unwrap_err();
        assert!(err.is_noop());

        let pickup = at(OrderType::Pickup, OrderStatus::Preparing);
        assert!(OrderStatusMachine::confirm_delivery(&pickup, Utc::now()).is_err());
    }

    fn any_status() -> impl Strategy<Value = OrderStatus> {
        prop::sample::select(OrderStatus::ALL.to_vec())
    }

    fn any_type() -> impl Strategy<Value = OrderType> {
        prop_oneof![Just(OrderType::Delivery), Just(OrderType::Pickup)]
    }

    proptest! {
        #[test]
        fn history_tracks_accepted_transitions(
            order_type in any_type(),
            requests in prop::collection::vec(any_status(), 0..40),
        ) {
            let mut current = order(order_type);
            let mut accepted = 0usize;
            let mut highest = 0usize;

            for target in requests {
                let was_cancelled = current.status == OrderStatus::Cancelled;
                match OrderStatusMachine::transition(&current, target, Utc::now()) {
                    Ok(next) => {
                        prop_assert!(!was_cancelled);
                        accepted += 1;
                        current = next;
                    }
                    Err(_) => continue,
                }

                prop_assert_eq!(current.revision(), accepted + 1);
                if current.status != OrderStatus::Cancelled {
                    let index = order_type.position(current.status);
                    prop_assert!(index.is_some());
                    let index = index.unwrap_or_default();
                    prop_assert!(index >= highest);
                    highest = index;
                }
            }

            // Without cancellation, history is exactly a prefix of the flow.
            let statuses: Vec<_> = current.status_history.iter().map(|e| e.status).collect();
            if !statuses.contains(&OrderStatus::Cancelled) {
                prop_assert_eq!(&statuses[..], &order_type.flow()[..statuses.len()]);
            } else {
                prop_assert_eq!(statuses.last().copied(), Some(OrderStatus::Cancelled));
            }
        }
    }
}
