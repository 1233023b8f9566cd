//! # Order Lifecycle Testing
//!
//! Testing utilities for the order lifecycle engine.
//!
//! This crate provides:
//! - [`InMemoryOrderStore`]: `HashMap`-backed [`OrderStore`](order_lifecycle_core::OrderStore)
//!   with per-order broadcast feeds, latency and failure injection
//! - Clocks: [`FixedClock`] (manually moved) and [`PausedClock`] (follows tokio's
//!   paused test time)
//! - [`StubTravelTimeSource`]: canned travel-time answers and failures
//! - [`fixtures`]: order builders for common scenarios
//!
//! ## Example
//!
//! ```ignore
//! use order_lifecycle_testing::{InMemoryOrderStore, PausedClock, fixtures};
//!
//! #[tokio::test(start_paused = true)]
//! async fn pickup_reaches_ready() {
//!     let clock = Arc::new(PausedClock::new(fixtures::epoch()));
//!     let store = Arc::new(InMemoryOrderStore::with_clock(clock.clone()));
//!     let id = store.create(fixtures::pickup_order()).await.unwrap();
//!     // drive the order with the runtime crate ...
//! }
//! ```

pub mod store;

pub use store::InMemoryOrderStore;

/// Mock implementations of environment traits.
pub mod mocks {
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use order_lifecycle_core::environment::Clock;
    use order_lifecycle_core::travel::TravelFuture;
    use order_lifecycle_core::{Coordinates, RouteLeg, TravelTimeError, TravelTimeSource};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, RwLock};
    use std::time::Duration;

    /// Manually driven clock for deterministic tests
    ///
    /// Returns the same time until moved with [`FixedClock::advance`] or
    /// [`FixedClock::set`]. Clones share the same time.
    ///
    /// # Example
    ///
    /// ```
    /// use order_lifecycle_testing::mocks::FixedClock;
    /// use order_lifecycle_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward
        ///
        /// # Panics
        ///
        /// Panics if the lock was poisoned by a panicking test.
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.write().unwrap();
            *time += to_chrono(by);
        }

        /// Jump to an absolute time
        ///
        /// # Panics
        ///
        /// Panics if the lock was poisoned by a panicking test.
        #[allow(clippy::unwrap_used)]
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap() = time;
        }
    }

    impl Clock for FixedClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap()
        }
    }

    /// Clock that follows tokio's time, for tests using `start_paused = true`.
    ///
    /// With paused time every `tokio::time::sleep` auto-advances instantly, and
    /// this clock advances by the same amount, so history timestamps match the
    /// simulated waits exactly.
    #[derive(Debug, Clone)]
    pub struct PausedClock {
        base: DateTime<Utc>,
        origin: tokio::time::Instant,
    }

    impl PausedClock {
        /// Create a clock reading `base` at the current tokio instant
        #[must_use]
        pub fn new(base: DateTime<Utc>) -> Self {
            Self {
                base,
                origin: tokio::time::Instant::now(),
            }
        }
    }

    impl Clock for PausedClock {
        fn now(&self) -> DateTime<Utc> {
            self.base + to_chrono(self.origin.elapsed())
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn to_chrono(duration: Duration) -> ChronoDuration {
        ChronoDuration::milliseconds(duration.as_millis() as i64)
    }

    /// Create a default fixed clock for tests (2025-01-01 12:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(crate::fixtures::epoch())
    }

    #[derive(Debug, Clone)]
    enum StubReply {
        Leg(RouteLeg),
        Fail(TravelTimeError),
    }

    /// Travel-time source returning a canned answer.
    ///
    /// Counts calls so tests can assert how often the network would be hit.
    #[derive(Debug, Clone)]
    pub struct StubTravelTimeSource {
        reply: StubReply,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl StubTravelTimeSource {
        /// Answer every query with `duration_seconds` of driving over `distance_meters`
        #[must_use]
        pub fn ok(duration_seconds: u64, distance_meters: u64) -> Self {
            Self::leg(RouteLeg {
                duration_seconds,
                duration_in_traffic_seconds: None,
                distance_meters,
            })
        }

        /// Answer every query with `leg`
        #[must_use]
        pub fn leg(leg: RouteLeg) -> Self {
            Self {
                reply: StubReply::Leg(leg),
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Fail every query with `error`
        #[must_use]
        pub fn failing(error: TravelTimeError) -> Self {
            Self {
                reply: StubReply::Fail(error),
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Wait `delay` before answering
        #[must_use]
        pub const fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Number of queries received
        #[must_use]
        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TravelTimeSource for StubTravelTimeSource {
        fn travel_time(&self, _origin: Coordinates, _destination: Coordinates) -> TravelFuture<'_> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if let Some(delay) = self.delay {
                    tokio::time::sleep(delay).await;
                }
                match &self.reply {
                    StubReply::Leg(leg) => Ok(*leg),
                    StubReply::Fail(error) => Err(error.clone()),
                }
            })
        }
    }
}

/// Order builders for common scenarios.
pub mod fixtures {
    use chrono::{DateTime, TimeZone, Utc};
    use order_lifecycle_core::{
        Coordinates, Money, NewOrder, Order, OrderId, OrderStatus, OrderStatusMachine, OrderType,
        UserId,
    };

    /// User owning fixture orders.
    pub const USER: &str = "user-1";

    /// Restaurant in lower Manhattan.
    pub const RESTAURANT: Coordinates = Coordinates::new(40.7128, -74.0060);

    /// Customer in Brooklyn.
    pub const CUSTOMER: Coordinates = Coordinates::new(40.6782, -73.9442);

    /// Fixed base time for tests: 2025-01-01 12:00:00 UTC.
    #[must_use]
    pub fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0)
            .single()
            .unwrap_or_default()
    }

    /// Delivery order with both ends of the route resolved.
    #[must_use]
    pub fn delivery_order() -> NewOrder {
        NewOrder::new(UserId::new(USER), OrderType::Delivery)
            .with_route(RESTAURANT, CUSTOMER)
            .with_item("Margherita Pizza", 1, Money::from_cents(1499))
    }

    /// Delivery order without coordinates.
    #[must_use]
    pub fn delivery_order_without_route() -> NewOrder {
        NewOrder::new(UserId::new(USER), OrderType::Delivery)
            .with_item("Pad Thai", 2, Money::from_cents(1150))
    }

    /// Pickup order without coordinates.
    #[must_use]
    pub fn pickup_order() -> NewOrder {
        NewOrder::new(UserId::new(USER), OrderType::Pickup)
            .with_item("Caesar Salad", 1, Money::from_cents(950))
    }

    /// Stored order walked one step at a time to `status`, each step `step_secs` apart.
    ///
    /// `cancelled` is reached by cancelling from `placed`. Returns the order as far
    /// as it got when `status` is outside the flow.
    #[must_use]
    pub fn order_at(
        id: &str,
        new: NewOrder,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        step_secs: i64,
    ) -> Order {
        let mut order = Order::from_new(OrderId::new(id), new, created_at);
        let mut at = created_at;
        if status == OrderStatus::Cancelled {
            at += chrono::Duration::seconds(step_secs);
            return OrderStatusMachine::transition(&order, OrderStatus::Cancelled, at)
                .unwrap_or(order);
        }
        for step in order.order_type.flow().iter().skip(1) {
            if order.status == status {
                break;
            }
            at += chrono::Duration::seconds(step_secs);
            match OrderStatusMachine::transition(&order, *step, at) {
                Ok(next) => order = next,
                Err(_) => break,
            }
        }
        order
    }
}

pub use fixtures::epoch;
pub use mocks::{FixedClock, PausedClock, StubTravelTimeSource, test_clock};
