//! Travel-time source abstraction.
//!
//! A [`TravelTimeSource`] answers "how long does it take to drive from A to B".
//! Sources are unreliable by nature; the estimator in `order-lifecycle-travel`
//! turns every failure into a fixed fallback so callers always get a
//! [`TravelEstimate`].

use crate::order::Coordinates;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a travel-time source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TravelTimeError {
    /// No API key configured
    #[error("travel-time API key is not configured")]
    MissingApiKey,

    /// HTTP request failed (connection, DNS, TLS)
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Upstream answered with a non-success HTTP status
    #[error("HTTP error (status {0})")]
    Http(u16),

    /// Upstream answered but reported a non-`OK` status for the route
    #[error("API status: {0}")]
    ApiStatus(String),

    /// Response parsing failed
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// The source did not answer in time
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}

/// A single origin/destination answer from a travel-time source.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RouteLeg {
    /// Duration without traffic
    pub duration_seconds: u64,
    /// Duration with current traffic, when the source provides it
    pub duration_in_traffic_seconds: Option<u64>,
    /// Driving distance
    pub distance_meters: u64,
}

impl RouteLeg {
    /// Traffic-aware duration when available, otherwise the static duration.
    #[must_use]
    pub fn best_duration_seconds(&self) -> u64 {
        self.duration_in_traffic_seconds
            .unwrap_or(self.duration_seconds)
    }
}

/// Where an estimate came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EstimateSource {
    /// Computed from a travel-time source response
    Api,
    /// Fixed fallback or local calculation
    Estimated,
}

/// Estimated total time until delivery, including the preparation buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TravelEstimate {
    /// Total duration (travel plus preparation buffer)
    pub duration: Duration,
    /// Driving distance when known
    pub distance_km: Option<f64>,
    /// Provenance
    pub source: EstimateSource,
}

impl TravelEstimate {
    /// Duration in whole milliseconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // estimates are minutes, far below u64::MAX ms
    pub const fn duration_ms(&self) -> u64 {
        self.duration.as_millis() as u64
    }
}

/// Boxed future returned by [`TravelTimeSource::travel_time`].
pub type TravelFuture<'a> = Pin<Box<dyn Future<Output = Result<RouteLeg, TravelTimeError>> + Send + 'a>>;

/// External service answering travel-time queries.
pub trait TravelTimeSource: Send + Sync {
    /// Driving time and distance from `origin` to `destination`.
    ///
    /// # Errors
    ///
    /// Any [`TravelTimeError`]; callers are expected to fall back.
    fn travel_time(&self, origin: Coordinates, destination: Coordinates) -> TravelFuture<'_>;
}
