//! Order tracking demo.
//!
//! Places a delivery and a pickup order in an in-memory store, follows each one
//! the way a tracking screen would, and logs every status change with its
//! countdown. A third order shows cancellation.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin order-tracking
//!
//! # Real travel times and a slower clock
//! GOOGLE_MAPS_API_KEY=... ORDER_DEMO_TIME_SCALE=0.2 cargo run --bin order-tracking
//! ```
//!
//! `ORDER_DEMO_TIME_SCALE` multiplies every wait (default `0.05`, i.e. twenty
//! times faster than real time). `RUST_LOG` controls log output.

use anyhow::Context;
use order_lifecycle_core::environment::Clock;
use order_lifecycle_core::{OrderId, OrderStore, UserId};
use order_lifecycle_runtime::{
    CancelOutcome, OrderLifecycle, OrderSubscriptionManager, ProgressionScheduler,
    ProgressionTimings, metrics,
};
use order_lifecycle_testing::{InMemoryOrderStore, fixtures};
use order_lifecycle_travel::{DistanceMatrixClient, TravelTimeConfig, TravelTimeEstimator};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_TIME_SCALE: f64 = 0.05;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    metrics::register_metrics();

    let scale = time_scale()?;
    info!(scale, "=== Order Tracking Demo ===");

    let config = TravelTimeConfig::from_env();
    let estimator = if config.api_key.is_some() {
        info!(base_url = %config.base_url, "Using distance-matrix API for travel times");
        let client = DistanceMatrixClient::new(config.clone()).context("building HTTP client")?;
        TravelTimeEstimator::new(Arc::new(client), config)
    } else {
        info!("No GOOGLE_MAPS_API_KEY set, travel times use the fixed fallback");
        TravelTimeEstimator::offline(config)
    };

    let store = Arc::new(InMemoryOrderStore::new());
    let lifecycle = OrderLifecycle::new(store.clone(), estimator)
        .with_timings(ProgressionTimings::default().scaled(scale));
    let scheduler = Arc::new(ProgressionScheduler::new(lifecycle.clone()));
    let manager = OrderSubscriptionManager::open(store.clone(), Arc::clone(&scheduler));

    let delivery = store.create(fixtures::delivery_order()).await?;
    let pickup = store.create(fixtures::pickup_order()).await?;
    let doomed = store.create(fixtures::pickup_order()).await?;
    info!(%delivery, %pickup, %doomed, "Placed orders");

    match lifecycle.cancel_order(&doomed).await? {
        CancelOutcome::Cancelled => info!(order_id = %doomed, "Cancelled while still placed"),
        CancelOutcome::Rejected { reason } => info!(order_id = %doomed, %reason, "Cancel refused"),
    }

    let orders = manager
        .load_orders(&UserId::new(fixtures::USER))
        .await
        .context("loading orders")?;
    for order in &orders {
        info!(order_id = %order.id, order_type = %order.order_type, status = %order.status, "Listed");
    }

    // Default selection: the newest open order.
    follow(&manager, &lifecycle, None).await?;
    follow(&manager, &lifecycle, Some(delivery.clone())).await?;

    if let CancelOutcome::Rejected { reason } = lifecycle.cancel_order(&delivery).await? {
        info!(order_id = %delivery, %reason, "Late cancellation refused");
    }

    manager.close().await;
    scheduler.shutdown().await;
    info!("Demo complete");
    Ok(())
}

/// Follow one order until it is terminal, logging each status with its countdown.
async fn follow(
    manager: &OrderSubscriptionManager,
    lifecycle: &OrderLifecycle,
    requested: Option<OrderId>,
) -> anyhow::Result<()> {
    let projector = lifecycle.projector();
    let selection = manager.select(requested).await;
    let id = selection
        .order_id()
        .cloned()
        .context("no order to follow")?;
    info!(order_id = %id, "Following order");

    let mut updates = manager.watch();
    let mut last = None;
    loop {
        let order = updates.borrow_and_update().selected.order().cloned();
        let Some(order) = order else {
            anyhow::bail!("order {id} disappeared");
        };

        if last != Some(order.status) {
            last = Some(order.status);
            let progress = order.order_type.progress_percent(order.status);
            let estimate = projector.time_estimate(order.status, &order).await;
            let remaining = projector
                .countdown(&order)
                .await
                .and_then(|countdown| countdown.remaining(lifecycle.clock().now()));
            info!(
                order_id = %order.id,
                status = order.status.label(),
                progress,
                estimate = estimate.as_deref().unwrap_or("-"),
                next_update_in = %remaining.map(|r| r.to_string()).unwrap_or_default(),
                "{}",
                order.status.message()
            );
        }

        if order.is_terminal() {
            return Ok(());
        }
        updates.changed().await.context("view closed")?;
    }
}

fn time_scale() -> anyhow::Result<f64> {
    match std::env::var("ORDER_DEMO_TIME_SCALE") {
        Ok(raw) => {
            let scale: f64 = raw
                .parse()
                .with_context(|| format!("ORDER_DEMO_TIME_SCALE is not a number: {raw}"))?;
            anyhow::ensure!(scale > 0.0, "ORDER_DEMO_TIME_SCALE must be positive");
            Ok(scale)
        },
        Err(_) => Ok(DEFAULT_TIME_SCALE),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "order_tracking=info,order_lifecycle_runtime=info,order_lifecycle_travel=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
