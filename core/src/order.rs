//! The order document and its value types.

use crate::status::{OrderStatus, OrderType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "`")]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the inner string value
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier assigned to an order by the store
    OrderId
);
string_id!(
    /// Owner of an order
    UserId
);
string_id!(
    /// Driver handling a delivery
    DriverId
);

/// A latitude/longitude pair in decimal degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude
    pub lat: f64,
    /// Longitude
    pub lng: f64,
}

impl Coordinates {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    /// Creates a coordinate pair
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Great-circle distance to `other` in kilometres (haversine).
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lng = (other.lng - self.lng).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos()
                * other.lat.to_radians().cos()
                * (d_lng / 2.0).sin().powi(2);
        2.0 * Self::EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// Money amount in cents.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a money amount from cents
    #[must_use]
    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Returns the value in cents
    #[must_use]
    pub const fn cents(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", cents / 100, cents % 100)
    }
}

/// A line in the order, carried for display only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    /// Menu item name
    pub name: String,
    /// Quantity ordered
    pub quantity: u32,
    /// Unit price
    pub price: Money,
}

/// One entry of the append-only status history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    /// Status entered
    pub status: OrderStatus,
    /// When the status was entered
    pub timestamp: DateTime<Utc>,
    /// Human-readable description
    pub message: String,
}

impl StatusEntry {
    /// Creates an entry for `status` using the standard message.
    #[must_use]
    pub fn new(status: OrderStatus, timestamp: DateTime<Utc>) -> Self {
        Self {
            status,
            timestamp,
            message: status.message().to_string(),
        }
    }
}

/// Order document as stored in the order store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    /// Store-assigned identifier
    pub id: OrderId,
    /// Owner
    pub user_id: UserId,
    /// Delivery or pickup
    pub order_type: OrderType,
    /// Current status
    pub status: OrderStatus,
    /// Every status the order entered, oldest first
    pub status_history: Vec<StatusEntry>,
    /// Where the food is collected
    pub restaurant_coordinates: Option<Coordinates>,
    /// Where the food is delivered
    pub delivery_coordinates: Option<Coordinates>,
    /// Ordered items
    pub items: Vec<OrderItem>,
    /// Sum of items
    pub subtotal: Money,
    /// Delivery fee
    pub delivery_fee: Money,
    /// Tax
    pub tax: Money,
    /// Tip
    pub tip: Money,
    /// Amount charged
    pub total: Money,
    /// Assigned driver
    pub driver_id: Option<DriverId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Creation time in epoch milliseconds, preferred by sorting when present
    pub timestamp: Option<i64>,
    /// When the restaurant confirmed
    pub confirmed_at: Option<DateTime<Utc>>,
    /// When the driver collected the order
    pub picked_up_at: Option<DateTime<Utc>>,
    /// When the driver left for the customer
    pub on_the_way_at: Option<DateTime<Utc>>,
    /// When the order was delivered
    pub delivered_at: Option<DateTime<Utc>>,
    /// When the pickup order became ready
    pub ready_at: Option<DateTime<Utc>>,
    /// When the order was cancelled
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Builds the stored document for a freshly created order.
    ///
    /// The order starts in `placed` with a single history entry.
    #[must_use]
    pub fn from_new(id: OrderId, new: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            order_type: new.order_type,
            status: OrderStatus::Placed,
            status_history: vec![StatusEntry::new(OrderStatus::Placed, created_at)],
            restaurant_coordinates: new.restaurant_coordinates,
            delivery_coordinates: new.delivery_coordinates,
            items: new.items,
            subtotal: new.subtotal,
            delivery_fee: new.delivery_fee,
            tax: new.tax,
            tip: new.tip,
            total: new.total,
            driver_id: None,
            created_at,
            timestamp: Some(created_at.timestamp_millis()),
            confirmed_at: None,
            picked_up_at: None,
            on_the_way_at: None,
            delivered_at: None,
            ready_at: None,
            cancelled_at: None,
        }
    }

    /// Number of history entries. Grows with every accepted transition, so it
    /// orders snapshots of the same order.
    #[must_use]
    pub fn revision(&self) -> usize {
        self.status_history.len()
    }

    /// Whether automatic progression has stopped for this order.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Most recent history entry for the current status.
    #[must_use]
    pub fn current_entry(&self) -> Option<&StatusEntry> {
        self.status_history
            .iter()
            .rev()
            .find(|entry| entry.status == self.status)
    }

    /// Creation time in epoch milliseconds, from `timestamp` or `created_at`.
    #[must_use]
    pub fn created_millis(&self) -> i64 {
        self.timestamp
            .unwrap_or_else(|| self.created_at.timestamp_millis())
    }

    /// Writes the convenience timestamp field that matches `status`.
    pub fn stamp_milestone(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        let field = match status {
            OrderStatus::Confirmed => &mut self.confirmed_at,
            OrderStatus::DriverPickedUp => &mut self.picked_up_at,
            OrderStatus::OnTheWay => &mut self.on_the_way_at,
            OrderStatus::Delivered => &mut self.delivered_at,
            OrderStatus::Ready => &mut self.ready_at,
            OrderStatus::Cancelled => &mut self.cancelled_at,
            OrderStatus::Placed | OrderStatus::Preparing | OrderStatus::DriverAssigned => return,
        };
        *field = Some(at);
    }
}

/// Payload submitted by checkout to create an order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    /// Owner
    pub user_id: UserId,
    /// Delivery or pickup
    pub order_type: OrderType,
    /// Restaurant location
    pub restaurant_coordinates: Option<Coordinates>,
    /// Customer location (delivery only)
    pub delivery_coordinates: Option<Coordinates>,
    /// Ordered items
    pub items: Vec<OrderItem>,
    /// Sum of items
    pub subtotal: Money,
    /// Delivery fee
    pub delivery_fee: Money,
    /// Tax
    pub tax: Money,
    /// Tip
    pub tip: Money,
    /// Amount charged
    pub total: Money,
}

impl NewOrder {
    /// Creates an empty order of the given type for `user_id`.
    #[must_use]
    pub fn new(user_id: UserId, order_type: OrderType) -> Self {
        Self {
            user_id,
            order_type,
            restaurant_coordinates: None,
            delivery_coordinates: None,
            items: Vec::new(),
            subtotal: Money::default(),
            delivery_fee: Money::default(),
            tax: Money::default(),
            tip: Money::default(),
            total: Money::default(),
        }
    }

    /// Sets both ends of the delivery route.
    #[must_use]
    pub const fn with_route(mut self, restaurant: Coordinates, delivery: Coordinates) -> Self {
        self.restaurant_coordinates = Some(restaurant);
        self.delivery_coordinates = Some(delivery);
        self
    }

    /// Adds an item and updates the totals.
    #[must_use]
    pub fn with_item(mut self, name: impl Into<String>, quantity: u32, price: Money) -> Self {
        let line = price.cents() * i64::from(quantity);
        self.items.push(OrderItem {
            name: name.into(),
            quantity,
            price,
        });
        self.subtotal = Money::from_cents(self.subtotal.cents() + line);
        self.total = Money::from_cents(
            self.subtotal.cents() + self.delivery_fee.cents() + self.tax.cents() + self.tip.cents(),
        );
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    fn placed_order() -> Order {
        let created = DateTime::parse_from_rfc3339("2025-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Order::from_new(
            OrderId::new("order-1"),
            NewOrder::new(UserId::new("user-1"), OrderType::Pickup),
            created,
        )
    }

    #[test]
    fn new_order_starts_placed_with_history() {
        let order = placed_order();
        assert_eq!(order.status, OrderStatus::Placed);
        assert_eq!(order.revision(), 1);
        assert_eq!(order.current_entry().unwrap().message, "Your order has been placed");
        assert_eq!(order.created_millis(), order.created_at.timestamp_millis());
    }

    #[test]
    fn serializes_with_document_field_names() {
        let json = serde_json::to_value(placed_order()).unwrap();
        assert_eq!(json["orderType"], "pickup");
        assert_eq!(json["statusHistory"][0]["status"], "placed");
        assert!(json.get("userId").is_some());
    }

    #[test]
    fn created_millis_prefers_numeric_timestamp() {
        let mut order = placed_order();
        order.timestamp = Some(42);
        assert_eq!(order.created_millis(), 42);
    }

    #[test]
    fn haversine_distance() {
        let a = Coordinates::new(40.7128, -74.0060);
        let b = Coordinates::new(40.7306, -73.9352);
        let km = a.distance_km(&b);
        assert!((km - 6.3).abs() < 0.2, "got {km}");
        assert!(a.distance_km(&a).abs() < 1e-9);
    }

    #[test]
    fn with_item_updates_totals() {
        let new = NewOrder::new(UserId::new("u"), OrderType::Delivery)
            .with_item("Burger", 2, Money::from_cents(1250));
        assert_eq!(new.subtotal.cents(), 2500);
        assert_eq!(new.total.to_string(), "$25.00");
    }

    #[test]
    fn money_display_keeps_sign() {
        assert_eq!(Money::from_cents(-50).to_string(), "-$0.50");
        assert_eq!(Money::from_cents(-1234).to_string(), "-$12.34");
        assert_eq!(Money::from_cents(7).to_string(), "$0.07");
        assert_eq!(Money::from_cents(i64::MIN).to_string(), "-$92233720368547758.08");
    }
}
