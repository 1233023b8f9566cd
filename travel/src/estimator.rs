//! Travel-time estimation with fallback.
//!
//! [`TravelTimeEstimator`] never fails: missing coordinates, a missing source,
//! upstream errors and timeouts all produce the fixed fallback estimate.

use crate::config::TravelTimeConfig;
use order_lifecycle_core::{Coordinates, EstimateSource, RouteLeg, TravelEstimate, TravelTimeSource};
use std::sync::Arc;
use std::time::Duration;

/// Converts travel-time answers into delivery estimates.
///
/// # Example
///
/// ```
/// use order_lifecycle_core::EstimateSource;
/// use order_lifecycle_travel::{TravelTimeConfig, TravelTimeEstimator};
/// use std::time::Duration;
///
/// # async fn example() {
/// let estimator = TravelTimeEstimator::offline(TravelTimeConfig::default());
/// let estimate = estimator.estimate(None, None).await;
/// assert_eq!(estimate.duration, Duration::from_secs(35 * 60));
/// assert_eq!(estimate.source, EstimateSource::Estimated);
/// # }
/// ```
#[derive(Clone)]
pub struct TravelTimeEstimator {
    source: Option<Arc<dyn TravelTimeSource>>,
    config: TravelTimeConfig,
}

impl TravelTimeEstimator {
    /// Create an estimator querying `source`.
    #[must_use]
    pub fn new(source: Arc<dyn TravelTimeSource>, config: TravelTimeConfig) -> Self {
        Self {
            source: Some(source),
            config,
        }
    }

    /// Create an estimator that never queries a network source.
    #[must_use]
    pub const fn offline(config: TravelTimeConfig) -> Self {
        Self {
            source: None,
            config,
        }
    }

    /// Preparation buffer included in every estimate.
    #[must_use]
    pub const fn preparation_buffer(&self) -> Duration {
        self.config.preparation_buffer
    }

    /// The fixed fallback estimate.
    #[must_use]
    pub fn fallback(&self) -> TravelEstimate {
        TravelEstimate {
            duration: self.config.fallback_total(),
            distance_km: None,
            source: EstimateSource::Estimated,
        }
    }

    /// Estimate total delivery time from `origin` to `destination`.
    ///
    /// Waits at most the configured timeout for the source.
    pub async fn estimate(
        &self,
        origin: Option<Coordinates>,
        destination: Option<Coordinates>,
    ) -> TravelEstimate {
        let (Some(origin), Some(destination), Some(source)) = (origin, destination, &self.source)
        else {
            tracing::debug!("Route or travel-time source unavailable, using fallback estimate");
            return self.record(self.fallback());
        };

        let estimate = match tokio::time::timeout(
            self.config.timeout,
            source.travel_time(origin, destination),
        )
        .await
        {
            Ok(Ok(leg)) => self.leg_estimate(&leg),
            Ok(Err(error)) => {
                tracing::warn!(%error, "Travel-time lookup failed, using fallback estimate");
                self.fallback()
            },
            Err(_) => {
                tracing::warn!(
                    timeout = ?self.config.timeout,
                    "Travel-time lookup timed out, using fallback estimate"
                );
                self.fallback()
            },
        };

        self.record(estimate)
    }

    /// Estimate from a straight-line distance and the configured average speed.
    ///
    /// Unknown or non-positive distances, and travel times too large to
    /// represent, produce the fallback.
    #[must_use]
    pub fn estimate_from_distance(&self, distance_km: Option<f64>) -> TravelEstimate {
        let Some(km) = distance_km.filter(|km| *km > 0.0) else {
            return self.fallback();
        };
        let minutes = (km / self.config.average_speed_kmh * 60.0).ceil();
        let duration = Duration::try_from_secs_f64(minutes * 60.0)
            .ok()
            .and_then(|travel| travel.checked_add(self.config.preparation_buffer));
        match duration {
            Some(duration) => TravelEstimate {
                duration,
                distance_km: Some(km),
                source: EstimateSource::Estimated,
            },
            None => {
                tracing::warn!(distance_km = km, "Distance estimate out of range, using fallback");
                self.fallback()
            },
        }
    }

    /// Local estimate between two points without any network call.
    #[must_use]
    pub fn estimate_local(
        &self,
        origin: Option<Coordinates>,
        destination: Option<Coordinates>,
    ) -> TravelEstimate {
        let distance = origin
            .zip(destination)
            .map(|(origin, destination)| origin.distance_km(&destination));
        self.estimate_from_distance(distance)
    }

    #[allow(clippy::cast_precision_loss)] // distances in metres fit f64 exactly
    fn leg_estimate(&self, leg: &RouteLeg) -> TravelEstimate {
        let duration = leg
            .best_duration_seconds()
            .div_ceil(60)
            .checked_mul(60)
            .map(Duration::from_secs)
            .and_then(|travel| travel.checked_add(self.config.preparation_buffer));
        let Some(duration) = duration else {
            tracing::warn!(
                duration_seconds = leg.best_duration_seconds(),
                "Travel time out of range, using fallback estimate"
            );
            return self.fallback();
        };
        let distance_km = (leg.distance_meters as f64 / 1000.0 * 100.0).round() / 100.0;
        TravelEstimate {
            duration,
            distance_km: Some(distance_km),
            source: EstimateSource::Api,
        }
    }

    fn record(&self, estimate: TravelEstimate) -> TravelEstimate {
        let source = match estimate.source {
            EstimateSource::Api => "api",
            EstimateSource::Estimated => "estimated",
        };
        metrics::counter!("order_lifecycle_travel_estimates_total", "source" => source)
            .increment(1);
        estimate
    }
}

impl std::fmt::Debug for TravelTimeEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TravelTimeEstimator")
            .field("has_source", &self.source.is_some())
            .field("config", &self.config)
            .finish()
    }
}
