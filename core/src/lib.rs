//! # Order Lifecycle Core
//!
//! Domain types and pure logic for the order lifecycle engine.
//!
//! This crate provides:
//!
//! - **Order model**: [`Order`], [`OrderStatus`], [`OrderType`] and the append-only
//!   status history
//! - **State machine**: [`OrderStatusMachine`], the only way an order's status changes
//! - **Store abstraction**: [`OrderStore`] with conditional writes and per-order
//!   change feeds
//! - **Travel-time abstraction**: [`TravelTimeSource`] and [`TravelEstimate`]
//! - **Environment**: the [`Clock`](environment::Clock) trait for testable time
//!
//! Runtime behaviour (scheduling, subscriptions, countdowns) lives in
//! `order-lifecycle-runtime`.
//!
//! ## Example
//!
//! ```
//! use chrono::Utc;
//! use order_lifecycle_core::{NewOrder, Order, OrderId, OrderStatus, OrderStatusMachine, OrderType, UserId};
//!
//! let order = Order::from_new(
//!     OrderId::new("order-1"),
//!     NewOrder::new(UserId::new("user-1"), OrderType::Pickup),
//!     Utc::now(),
//! );
//!
//! let confirmed = OrderStatusMachine::transition(&order, OrderStatus::Confirmed, Utc::now())?;
//! assert_eq!(confirmed.status_history.len(), 2);
//! # Ok::<(), order_lifecycle_core::TransitionError>(())
//! ```

pub mod machine;
pub mod order;
pub mod status;
pub mod store;
pub mod travel;

/// Environment module - injected dependencies shared by every crate.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// History timestamps and countdowns read the time through this trait so
    /// tests can pin or drive it.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use machine::{OrderStatusMachine, TransitionError};
pub use order::{
    Coordinates, DriverId, Money, NewOrder, Order, OrderId, OrderItem, StatusEntry, UserId,
};
pub use status::{OrderStatus, OrderType};
pub use store::{OrderChange, OrderPatch, OrderStore, OrderStoreError, OrderWatch, WatchEvent};
pub use travel::{EstimateSource, RouteLeg, TravelEstimate, TravelTimeError, TravelTimeSource};
