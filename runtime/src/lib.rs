//! # Order Lifecycle Runtime
//!
//! The engine that moves orders through their flow and keeps tracking views
//! up to date.
//!
//! - [`OrderLifecycle`]: validated, compare-and-swap status writes
//!   (`confirm_order`, `cancel_order`, `auto_progress_order`, ...)
//! - [`ProgressionScheduler`]: simulated restaurant and driver steps with
//!   realistic waits, as owned and abortable tokio tasks
//! - [`OrderSubscriptionManager`]: one view's order list and live selection
//! - [`EstimateProjector`]: "About N minutes" strings and per-second countdowns
//! - [`ProgressionTimings`] / [`DwellPlanner`]: how long each status lasts
//!
//! ## Example
//!
//! ```no_run
//! use order_lifecycle_core::OrderStore;
//! use order_lifecycle_runtime::{OrderLifecycle, ProgressionScheduler};
//! use order_lifecycle_testing::{InMemoryOrderStore, fixtures};
//! use order_lifecycle_travel::{TravelTimeConfig, TravelTimeEstimator};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemoryOrderStore::new());
//! let lifecycle = OrderLifecycle::new(
//!     store.clone(),
//!     TravelTimeEstimator::offline(TravelTimeConfig::default()),
//! );
//!
//! let id = store.create(fixtures::pickup_order()).await?;
//! lifecycle.auto_progress_order(&id).await?;
//! assert!(store.get(&id).await?.is_terminal());
//!
//! // Or in the background:
//! let scheduler = ProgressionScheduler::new(lifecycle);
//! scheduler.drive(&id);
//! # Ok(())
//! # }
//! ```

pub mod countdown;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod scheduler;
pub mod subscription;
pub mod timing;

pub use countdown::{Countdown, CountdownTicker, EstimateProjector, Remaining};
pub use error::{CancelOutcome, LifecycleError};
pub use lifecycle::OrderLifecycle;
pub use scheduler::ProgressionScheduler;
pub use subscription::{OrderSubscriptionManager, Selection, TrackingSnapshot};
pub use timing::{DwellPlanner, ProgressionTimings};
