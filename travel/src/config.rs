//! Travel-time configuration.

use std::time::Duration;

/// Default distance-matrix endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com/maps/api";

/// Configuration for the distance-matrix client and the estimator.
///
/// # Default Values
///
/// - `api_key`: none (every estimate falls back)
/// - `base_url`: [`DEFAULT_BASE_URL`]
/// - `timeout`: 5 seconds
/// - `preparation_buffer`: 18 minutes
/// - `fallback_travel`: 17 minutes (35 minutes total with the buffer)
/// - `average_speed_kmh`: 30 km/h for local estimates
#[derive(Debug, Clone, PartialEq)]
pub struct TravelTimeConfig {
    /// API key for the distance-matrix service
    pub api_key: Option<String>,
    /// Endpoint root; `/distancematrix/json` is appended
    pub base_url: String,
    /// Upper bound on a single travel-time request
    pub timeout: Duration,
    /// Restaurant preparation time added to every estimate
    pub preparation_buffer: Duration,
    /// Travel time assumed when no estimate is available
    pub fallback_travel: Duration,
    /// Assumed driving speed for distance-based estimates
    pub average_speed_kmh: f64,
}

impl Default for TravelTimeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(5),
            preparation_buffer: Duration::from_secs(18 * 60),
            fallback_travel: Duration::from_secs(17 * 60),
            average_speed_kmh: 30.0,
        }
    }
}

impl TravelTimeConfig {
    /// Load configuration from environment variables.
    ///
    /// - `GOOGLE_MAPS_API_KEY`: API key (optional; placeholder values are ignored)
    /// - `TRAVEL_TIME_BASE_URL`: endpoint root
    /// - `TRAVEL_TIME_TIMEOUT_MS`: request timeout in milliseconds
    ///
    /// Unset or unparsable variables keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(key) = std::env::var("GOOGLE_MAPS_API_KEY") {
            let key = key.trim();
            if key.is_empty() || key.starts_with("your-") {
                tracing::warn!("GOOGLE_MAPS_API_KEY is empty or a placeholder; travel estimates will use the fallback");
            } else {
                config.api_key = Some(key.to_string());
            }
        }

        if let Ok(url) = std::env::var("TRAVEL_TIME_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }

        if let Some(ms) = std::env::var("TRAVEL_TIME_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.timeout = Duration::from_millis(ms);
        }

        config
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the endpoint root.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the preparation buffer.
    #[must_use]
    pub const fn with_preparation_buffer(mut self, buffer: Duration) -> Self {
        self.preparation_buffer = buffer;
        self
    }

    /// Set the driving speed used for distance-based estimates.
    #[must_use]
    pub const fn with_average_speed(mut self, kmh: f64) -> Self {
        self.average_speed_kmh = kmh;
        self
    }

    /// Total duration reported when no estimate is available.
    #[must_use]
    pub fn fallback_total(&self) -> Duration {
        self.fallback_travel.saturating_add(self.preparation_buffer)
    }
}
