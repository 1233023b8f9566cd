//! # Order Lifecycle Travel
//!
//! Travel-time estimation for delivery orders.
//!
//! - [`DistanceMatrixClient`]: HTTP client for a distance-matrix API, implementing
//!   [`TravelTimeSource`](order_lifecycle_core::TravelTimeSource)
//! - [`TravelTimeEstimator`]: adds the preparation buffer, bounds the wait, and
//!   falls back to a fixed 35-minute estimate on any failure
//! - [`TravelTimeConfig`]: API key, endpoint, timeout and buffer settings
//!
//! # Example
//!
//! ```no_run
//! use order_lifecycle_core::Coordinates;
//! use order_lifecycle_travel::{DistanceMatrixClient, TravelTimeConfig, TravelTimeEstimator};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TravelTimeConfig::from_env();
//! let client = DistanceMatrixClient::new(config.clone())?;
//! let estimator = TravelTimeEstimator::new(Arc::new(client), config);
//!
//! let estimate = estimator
//!     .estimate(
//!         Some(Coordinates::new(40.7128, -74.0060)),
//!         Some(Coordinates::new(40.6782, -73.9442)),
//!     )
//!     .await;
//! println!("{} ms ({:?})", estimate.duration_ms(), estimate.source);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod estimator;

pub use client::DistanceMatrixClient;
pub use config::TravelTimeConfig;
pub use estimator::TravelTimeEstimator;
pub use order_lifecycle_core::TravelTimeError;
