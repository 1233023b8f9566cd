//! Status vocabulary and order flows.
//!
//! Every order follows exactly one flow, selected by its [`OrderType`]:
//!
//! ```text
//! Delivery: placed → confirmed → preparing → driver_assigned → driver_picked_up → on_the_way → delivered
//! Pickup:   placed → confirmed → preparing → ready
//! ```
//!
//! `cancelled` is a side exit reachable from the early statuses of either flow.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Fulfilment mode of an order. Immutable after creation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// A driver brings the order to the customer
    Delivery,
    /// The customer collects the order at the restaurant
    Pickup,
}

const DELIVERY_FLOW: [OrderStatus; 7] = [
    OrderStatus::Placed,
    OrderStatus::Confirmed,
    OrderStatus::Preparing,
    OrderStatus::DriverAssigned,
    OrderStatus::DriverPickedUp,
    OrderStatus::OnTheWay,
    OrderStatus::Delivered,
];

const PICKUP_FLOW: [OrderStatus; 4] = [
    OrderStatus::Placed,
    OrderStatus::Confirmed,
    OrderStatus::Preparing,
    OrderStatus::Ready,
];

impl OrderType {
    /// The ordered statuses this order type moves through.
    #[must_use]
    pub const fn flow(self) -> &'static [OrderStatus] {
        match self {
            Self::Delivery => &DELIVERY_FLOW,
            Self::Pickup => &PICKUP_FLOW,
        }
    }

    /// Position of `status` in this flow, `None` when the status is not part of it.
    #[must_use]
    pub fn position(self, status: OrderStatus) -> Option<usize> {
        self.flow().iter().position(|s| *s == status)
    }

    /// The status following `status`, if any.
    ///
    /// Returns `None` for the last status of the flow, for `cancelled`, and for
    /// statuses that belong to the other flow.
    #[must_use]
    pub fn successor(self, status: OrderStatus) -> Option<OrderStatus> {
        let index = self.position(status)?;
        self.flow().get(index + 1).copied()
    }

    /// The final status of the flow (`delivered` or `ready`).
    #[must_use]
    pub const fn final_status(self) -> OrderStatus {
        match self {
            Self::Delivery => OrderStatus::Delivered,
            Self::Pickup => OrderStatus::Ready,
        }
    }

    /// Whether `status` is a member of this flow.
    #[must_use]
    pub fn admits(self, status: OrderStatus) -> bool {
        self.position(status).is_some()
    }

    /// Progress through the flow as a percentage, for progress bars.
    ///
    /// Statuses outside the flow (including `cancelled`) report zero.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // flows have fewer than ten entries
    pub fn progress_percent(self, status: OrderStatus) -> f64 {
        self.position(status).map_or(0.0, |index| {
            (index + 1) as f64 / self.flow().len() as f64 * 100.0
        })
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delivery => write!(f, "delivery"),
            Self::Pickup => write!(f, "pickup"),
        }
    }
}

/// Current status of an order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Order was created by checkout
    Placed,
    /// Restaurant accepted the order
    Confirmed,
    /// Kitchen is working on the order
    Preparing,
    /// A driver has been assigned (delivery only)
    DriverAssigned,
    /// Driver collected the order from the restaurant (delivery only)
    DriverPickedUp,
    /// Driver is travelling to the customer (delivery only)
    OnTheWay,
    /// Order handed to the customer (delivery only)
    Delivered,
    /// Order waiting at the counter (pickup only)
    Ready,
    /// Order was cancelled
    Cancelled,
}

impl OrderStatus {
    /// Every status, in display order.
    pub const ALL: [Self; 9] = [
        Self::Placed,
        Self::Confirmed,
        Self::Preparing,
        Self::DriverAssigned,
        Self::DriverPickedUp,
        Self::OnTheWay,
        Self::Delivered,
        Self::Ready,
        Self::Cancelled,
    ];

    /// Wire name, matching the serde representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Placed => "placed",
            Self::Confirmed => "confirmed",
            Self::Preparing => "preparing",
            Self::DriverAssigned => "driver_assigned",
            Self::DriverPickedUp => "driver_picked_up",
            Self::OnTheWay => "on_the_way",
            Self::Delivered => "delivered",
            Self::Ready => "ready",
            Self::Cancelled => "cancelled",
        }
    }

    /// Short label for timelines.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Placed => "Order Placed",
            Self::Confirmed => "Confirmed",
            Self::Preparing => "Preparing",
            Self::DriverAssigned => "Driver Assigned",
            Self::DriverPickedUp => "Driver Picked Up",
            Self::OnTheWay => "On The Way",
            Self::Delivered => "Delivered",
            Self::Ready => "Ready for Pickup",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Message recorded in the status history when the order enters this status.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Placed => "Your order has been placed",
            Self::Confirmed => "Restaurant has confirmed your order",
            Self::Preparing => "Restaurant is preparing your order",
            Self::DriverAssigned => "A driver has been assigned to your order",
            Self::DriverPickedUp => "Driver has picked up your order from the restaurant",
            Self::OnTheWay => "Your order is on the way to you",
            Self::Delivered => "Your order has been delivered",
            Self::Ready => "Your order is ready for pickup",
            Self::Cancelled => "Order has been cancelled",
        }
    }

    /// Whether automatic progression stops at this status.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Ready | Self::Cancelled)
    }

    /// Whether a cancellation request is refused in this status.
    #[must_use]
    pub const fn blocks_cancellation(self) -> bool {
        matches!(
            self,
            Self::DriverAssigned
                | Self::DriverPickedUp
                | Self::OnTheWay
                | Self::Ready
                | Self::Delivered
                | Self::Cancelled
        )
    }

    /// User-facing reason a cancellation was refused, `None` when cancellable.
    #[must_use]
    pub const fn cancellation_refusal(self) -> Option<&'static str> {
        match self {
            Self::Ready => Some("This order is ready for pickup and cannot be cancelled."),
            Self::DriverAssigned | Self::DriverPickedUp | Self::OnTheWay => {
                Some("This order is already out for delivery and cannot be cancelled.")
            },
            Self::Delivered => {
                Some("This order has already been delivered and cannot be cancelled.")
            },
            Self::Cancelled => Some("This order has already been cancelled."),
            Self::Placed | Self::Confirmed | Self::Preparing => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flows_share_prefix() {
        assert_eq!(OrderType::Delivery.flow()[..3], OrderType::Pickup.flow()[..3]);
    }

    #[test]
    fn successor_walks_each_flow() {
        assert_eq!(
            OrderType::Delivery.successor(OrderStatus::Preparing),
            Some(OrderStatus::DriverAssigned)
        );
        assert_eq!(
            OrderType::Pickup.successor(OrderStatus::Preparing),
            Some(OrderStatus::Ready)
        );
        assert_eq!(OrderType::Pickup.successor(OrderStatus::Ready), None);
        assert_eq!(OrderType::Delivery.successor(OrderStatus::Cancelled), None);
        assert_eq!(OrderType::Pickup.successor(OrderStatus::OnTheWay), None);
    }

    #[test]
    fn pickup_flow_excludes_driver_statuses() {
        for status in [
            OrderStatus::DriverAssigned,
            OrderStatus::DriverPickedUp,
            OrderStatus::OnTheWay,
            OrderStatus::Delivered,
        ] {
            assert!(!OrderType::Pickup.admits(status));
        }
        assert!(!OrderType::Delivery.admits(OrderStatus::Ready));
    }

    #[test]
    fn cancellable_set() {
        let cancellable: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(|s| !s.blocks_cancellation())
            .collect();
        assert_eq!(
            cancellable,
            vec![OrderStatus::Placed, OrderStatus::Confirmed, OrderStatus::Preparing]
        );
        for status in OrderStatus::ALL {
            assert_eq!(
                status.blocks_cancellation(),
                status.cancellation_refusal().is_some()
            );
        }
    }

    #[test]
    fn wire_names_match_serde() {
        for status in OrderStatus::ALL {
            let json = serde_json::to_string(&status).unwrap_or_default();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn progress_percent() {
        assert!((OrderType::Pickup.progress_percent(OrderStatus::Ready) - 100.0).abs() < f64::EPSILON);
        assert!((OrderType::Pickup.progress_percent(OrderStatus::Placed) - 25.0).abs() < f64::EPSILON);
        assert!(OrderType::Delivery.progress_percent(OrderStatus::Cancelled).abs() < f64::EPSILON);
    }
}
