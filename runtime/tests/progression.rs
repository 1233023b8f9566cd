//! End-to-end progression against the in-memory store.
//!
//! Timed flows run on tokio's paused clock: every wait completes instantly
//! while [`PausedClock`] records the simulated time in history timestamps.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use order_lifecycle_core::{
    DriverId, Order, OrderId, OrderStatus, OrderStore, OrderType, TravelTimeError,
};
use order_lifecycle_runtime::{CancelOutcome, OrderLifecycle, ProgressionTimings};
use order_lifecycle_testing::{InMemoryOrderStore, PausedClock, StubTravelTimeSource, fixtures};
use order_lifecycle_travel::{TravelTimeConfig, TravelTimeEstimator};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    store: InMemoryOrderStore,
    lifecycle: OrderLifecycle,
}

impl Harness {
    fn offline() -> Self {
        Self::build(None, None)
    }

    fn with_source(source: StubTravelTimeSource) -> Self {
        Self::build(Some(source), None)
    }

    fn with_latency(latency: Duration) -> Self {
        Self::build(None, Some(latency))
    }

    fn build(source: Option<StubTravelTimeSource>, latency: Option<Duration>) -> Self {
        let clock = Arc::new(PausedClock::new(fixtures::epoch()));
        let store = match latency {
            Some(latency) => InMemoryOrderStore::with_latency(clock.clone(), latency),
            None => InMemoryOrderStore::with_clock(clock.clone()),
        };
        let estimator = match source {
            Some(source) => TravelTimeEstimator::new(Arc::new(source), TravelTimeConfig::default()),
            None => TravelTimeEstimator::offline(TravelTimeConfig::default()),
        };
        let lifecycle = OrderLifecycle::new(Arc::new(store.clone()), estimator)
            .with_clock(clock)
            .with_timings(ProgressionTimings::default());
        Self { store, lifecycle }
    }

    fn order(&self, id: &OrderId) -> Order {
        self.store.snapshot(id).unwrap()
    }

    fn history(&self, id: &OrderId) -> Vec<OrderStatus> {
        self.order(id)
            .status_history
            .iter()
            .map(|entry| entry.status)
            .collect()
    }
}

fn gap_ms(order: &Order, from: OrderStatus, to: OrderStatus) -> i64 {
    let at = |status| {
        order
            .status_history
            .iter()
            .find(|entry| entry.status == status)
            .unwrap()
            .timestamp
    };
    (at(to) - at(from)).num_milliseconds()
}

#[tokio::test]
async fn manual_steps_follow_the_delivery_flow() {
    let h = Harness::offline();
    let id = h.store.create(fixtures::delivery_order()).await.unwrap();
    let l = &h.lifecycle;

    assert!(l.confirm_order(&id).await.unwrap());
    assert!(l.start_preparing(&id).await.unwrap());
    assert!(l.assign_driver(&id, Some(DriverId::new("driver_042"))).await.unwrap());
    assert!(l.driver_picked_up(&id).await.unwrap());
    assert!(l.mark_on_the_way(&id).await.unwrap());
    assert!(l.mark_as_delivered(&id).await.unwrap());

    let order = h.order(&id);
    assert_eq!(h.history(&id), OrderType::Delivery.flow());
    assert_eq!(order.driver_id, Some(DriverId::new("driver_042")));
    assert!(order.confirmed_at.is_some());
    assert!(order.picked_up_at.is_some());
    assert!(order.on_the_way_at.is_some());
    assert!(order.delivered_at.is_some());
}

#[tokio::test]
async fn out_of_order_steps_are_refused() {
    let h = Harness::offline();
    let id = h.store.create(fixtures::delivery_order()).await.unwrap();
    let l = &h.lifecycle;

    assert!(!l.start_preparing(&id).await.unwrap());
    assert!(!l.mark_on_the_way(&id).await.unwrap());
    assert!(!l.mark_order_ready(&id).await.unwrap());
    assert_eq!(h.history(&id), [OrderStatus::Placed]);
    assert_eq!(h.store.write_count(), 0);
}

#[tokio::test]
async fn confirm_is_idempotent() {
    let h = Harness::offline();
    let id = h.store.create(fixtures::pickup_order()).await.unwrap();

    assert!(h.lifecycle.confirm_order(&id).await.unwrap());
    assert!(!h.lifecycle.confirm_order(&id).await.unwrap());

    assert_eq!(h.history(&id), [OrderStatus::Placed, OrderStatus::Confirmed]);
}

#[tokio::test]
async fn repeated_final_step_is_a_noop() {
    let h = Harness::offline();
    let order = fixtures::order_at(
        "p",
        fixtures::pickup_order(),
        OrderStatus::Ready,
        fixtures::epoch(),
        60,
    );
    h.store.insert(order.clone());

    assert!(!h.lifecycle.mark_order_ready(&order.id).await.unwrap());
    assert_eq!(h.order(&order.id).revision(), order.revision());
}

#[tokio::test]
async fn cancellation_is_refused_once_driver_or_counter_is_reached() {
    let h = Harness::offline();

    for status in OrderStatus::ALL {
        let new = if OrderType::Delivery.admits(status) || status == OrderStatus::Cancelled {
            fixtures::delivery_order()
        } else {
            fixtures::pickup_order()
        };
        let order = fixtures::order_at(status.as_str(), new, status, fixtures::epoch(), 60);
        assert_eq!(order.status, status);
        h.store.insert(order.clone());

        let outcome = h.lifecycle.cancel_order(&order.id).await.unwrap();
        let expected_ok = matches!(
            status,
            OrderStatus::Placed | OrderStatus::Confirmed | OrderStatus::Preparing
        );
        assert_eq!(outcome.is_cancelled(), expected_ok, "cancel from {status}");

        if expected_ok {
            assert_eq!(h.order(&order.id).status, OrderStatus::Cancelled);
            assert!(h.order(&order.id).cancelled_at.is_some());
        } else {
            assert_eq!(
                outcome,
                CancelOutcome::Rejected {
                    reason: status.cancellation_refusal().unwrap().to_string()
                }
            );
            assert_eq!(h.order(&order.id).revision(), order.revision());
        }
    }
}

#[tokio::test(start_paused = true)]
async fn cancelled_orders_stay_cancelled() {
    let h = Harness::offline();
    let id = h.store.create(fixtures::delivery_order()).await.unwrap();
    let l = &h.lifecycle;

    assert!(l.cancel_order(&id).await.unwrap().is_cancelled());
    let history = h.history(&id);

    assert!(!l.confirm_order(&id).await.unwrap());
    assert!(!l.start_preparing(&id).await.unwrap());
    assert!(!l.assign_driver(&id, None).await.unwrap());
    assert!(!l.driver_picked_up(&id).await.unwrap());
    assert!(!l.mark_on_the_way(&id).await.unwrap());
    assert!(!l.mark_as_delivered(&id).await.unwrap());
    assert!(!l.mark_order_ready(&id).await.unwrap());
    assert!(!l.cancel_order(&id).await.unwrap().is_cancelled());
    l.auto_progress_order(&id).await.unwrap();

    assert_eq!(h.history(&id), history);
    assert_eq!(history, [OrderStatus::Placed, OrderStatus::Cancelled]);
}

#[tokio::test(start_paused = true)]
async fn pickup_order_progresses_to_ready() {
    let h = Harness::offline();
    let id = h.store.create(fixtures::pickup_order()).await.unwrap();

    h.lifecycle.auto_progress_order(&id).await.unwrap();

    let order = h.order(&id);
    assert_eq!(order.status, OrderStatus::Ready);
    assert_eq!(
        h.history(&id),
        [
            OrderStatus::Placed,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready
        ]
    );
    assert_eq!(order.driver_id, None);
    assert!(order.ready_at.is_some());
    let preparing = gap_ms(&order, OrderStatus::Preparing, OrderStatus::Ready);
    assert!((preparing - 300_000).abs() <= 5, "preparing took {preparing} ms");
}

#[tokio::test(start_paused = true)]
async fn delivery_final_leg_follows_travel_time() {
    let _logs = tracing::subscriber::set_default(
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .finish(),
    );
    let stub = StubTravelTimeSource::ok(600, 5_400);
    let h = Harness::with_source(stub.clone());
    let id = h.store.create(fixtures::delivery_order()).await.unwrap();

    h.lifecycle.auto_progress_order(&id).await.unwrap();

    let order = h.order(&id);
    assert_eq!(order.status, OrderStatus::Delivered);
    assert_eq!(h.history(&id), OrderType::Delivery.flow());
    assert_eq!(order.driver_id, Some(DriverId::new("driver_001")));

    let final_leg = gap_ms(&order, OrderStatus::OnTheWay, OrderStatus::Delivered);
    assert!(final_leg >= 60_000);
    // 600 s of driving: 28 min estimate minus the 18 min buffer.
    assert!((final_leg - 600_000).abs() <= 5, "final leg {final_leg} ms");
    assert_eq!(stub.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn short_trips_wait_at_least_a_minute() {
    let h = Harness::with_source(StubTravelTimeSource::ok(30, 200));
    let id = h.store.create(fixtures::delivery_order()).await.unwrap();

    h.lifecycle.auto_progress_order(&id).await.unwrap();

    let final_leg = gap_ms(&h.order(&id), OrderStatus::OnTheWay, OrderStatus::Delivered);
    assert!((final_leg - 60_000).abs() <= 5, "final leg {final_leg} ms");
}

#[tokio::test(start_paused = true)]
async fn travel_failure_uses_fallback_leg() {
    let h = Harness::with_source(StubTravelTimeSource::failing(TravelTimeError::RequestFailed(
        "connection refused".to_string(),
    )));
    let id = h.store.create(fixtures::delivery_order()).await.unwrap();

    h.lifecycle.auto_progress_order(&id).await.unwrap();

    let order = h.order(&id);
    assert_eq!(order.status, OrderStatus::Delivered);
    // 35 min fallback minus the 18 min buffer.
    let final_leg = gap_ms(&order, OrderStatus::OnTheWay, OrderStatus::Delivered);
    assert!((final_leg - 17 * 60_000).abs() <= 5, "final leg {final_leg} ms");
}

#[tokio::test(start_paused = true)]
async fn concurrent_runs_converge_without_duplicates() {
    let h = Harness::with_latency(Duration::from_millis(50));
    let id = h.store.create(fixtures::pickup_order()).await.unwrap();

    let (a, b) = tokio::join!(
        h.lifecycle.auto_progress_order(&id),
        h.lifecycle.auto_progress_order(&id)
    );
    tokio_test::assert_ok!(a);
    tokio_test::assert_ok!(b);

    assert_eq!(
        h.history(&id),
        [
            OrderStatus::Placed,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready
        ]
    );
    assert_eq!(h.store.write_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn cancellation_mid_run_stops_progression() {
    let h = Harness::offline();
    let id = h.store.create(fixtures::delivery_order()).await.unwrap();

    let run = tokio::spawn({
        let lifecycle = h.lifecycle.clone();
        let id = id.clone();
        async move { lifecycle.auto_progress_order(&id).await }
    });

    // Confirmed at 30 s, preparing at 40 s.
    tokio::time::sleep(Duration::from_secs(45)).await;
    assert!(h.lifecycle.cancel_order(&id).await.unwrap().is_cancelled());

    run.await.unwrap().unwrap();
    assert_eq!(
        h.history(&id),
        [
            OrderStatus::Placed,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Cancelled
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn deleted_order_stops_progression_silently() {
    let h = Harness::offline();
    let id = h.store.create(fixtures::pickup_order()).await.unwrap();

    let run = tokio::spawn({
        let lifecycle = h.lifecycle.clone();
        let id = id.clone();
        async move { lifecycle.auto_progress_order(&id).await }
    });

    tokio::time::sleep(Duration::from_secs(35)).await;
    h.store.delete(&id).await.unwrap();

    run.await.unwrap().unwrap();
    assert!(h.store.snapshot(&id).is_none());
}

#[tokio::test]
async fn time_estimates_are_never_negative() {
    let h = Harness::with_source(StubTravelTimeSource::ok(600, 5_400));
    let order = fixtures::order_at(
        "o",
        fixtures::delivery_order(),
        OrderStatus::OnTheWay,
        fixtures::epoch(),
        60,
    );

    for status in OrderStatus::ALL {
        let estimate = h.lifecycle.time_estimate(status, &order).await;
        if status.is_terminal() {
            assert_eq!(estimate, None, "{status}");
        } else {
            let text = estimate.unwrap();
            assert!(text.starts_with("About") || text == "Less than a minute", "{text}");
            assert!(!text.contains('-'), "{text}");
        }
    }

    assert_eq!(
        h.lifecycle
            .time_estimate(OrderStatus::OnTheWay, &order)
            .await
            .as_deref(),
        Some("About 10 minutes")
    );
}
