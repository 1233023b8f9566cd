//! Distance-matrix HTTP client.

use crate::config::TravelTimeConfig;
use order_lifecycle_core::travel::TravelFuture;
use order_lifecycle_core::{Coordinates, RouteLeg, TravelTimeError, TravelTimeSource};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    status: String,
    #[serde(default)]
    rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
struct MatrixRow {
    #[serde(default)]
    elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
struct MatrixElement {
    status: String,
    duration: Option<MatrixValue>,
    duration_in_traffic: Option<MatrixValue>,
    distance: Option<MatrixValue>,
}

#[derive(Debug, Deserialize)]
struct MatrixValue {
    value: u64,
}

/// Client for a Google-style distance-matrix API.
///
/// Sends one origin and one destination per request and asks for a
/// traffic-aware driving duration.
#[derive(Clone, Debug)]
pub struct DistanceMatrixClient {
    client: Client,
    config: TravelTimeConfig,
}

impl DistanceMatrixClient {
    /// Create a client with configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns `TravelTimeError::RequestFailed` if the HTTP client cannot be built
    pub fn from_env() -> Result<Self, TravelTimeError> {
        Self::new(TravelTimeConfig::from_env())
    }

    /// Create a client with explicit configuration
    ///
    /// # Errors
    ///
    /// Returns `TravelTimeError::RequestFailed` if the HTTP client cannot be built
    pub fn new(config: TravelTimeConfig) -> Result<Self, TravelTimeError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TravelTimeError::RequestFailed(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// The configuration this client was built with
    #[must_use]
    pub const fn config(&self) -> &TravelTimeConfig {
        &self.config
    }

    /// Query driving time between two points
    ///
    /// # Errors
    ///
    /// - `MissingApiKey` when no key is configured (no request is sent)
    /// - `RequestFailed` for network failures or client timeouts
    /// - `Http` for non-success HTTP statuses
    /// - `ApiStatus` when the response or the route element is not `OK`
    /// - `ResponseParseFailed` for malformed bodies
    pub async fn route(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<RouteLeg, TravelTimeError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(TravelTimeError::MissingApiKey)?;

        let response = self
            .client
            .get(format!("{}/distancematrix/json", self.config.base_url))
            .query(&[
                ("origins", format!("{},{}", origin.lat, origin.lng)),
                ("destinations", format!("{},{}", destination.lat, destination.lng)),
                ("mode", "driving".to_string()),
                ("units", "metric".to_string()),
                ("departure_time", "now".to_string()),
                ("traffic_model", "best_guess".to_string()),
                ("key", api_key.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TravelTimeError::Timeout(self.config.timeout)
                } else {
                    TravelTimeError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TravelTimeError::Http(status.as_u16()));
        }

        let body = response
            .json::<MatrixResponse>()
            .await
            .map_err(|e| TravelTimeError::ResponseParseFailed(e.to_string()))?;

        Self::leg_from_response(body)
    }

    fn leg_from_response(body: MatrixResponse) -> Result<RouteLeg, TravelTimeError> {
        if body.status != "OK" {
            return Err(TravelTimeError::ApiStatus(body.status));
        }

        let element = body
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.elements.into_iter().next())
            .ok_or_else(|| TravelTimeError::ResponseParseFailed("no route element".to_string()))?;

        if element.status != "OK" {
            return Err(TravelTimeError::ApiStatus(element.status));
        }

        let duration = element
            .duration
            .ok_or_else(|| TravelTimeError::ResponseParseFailed("missing duration".to_string()))?;

        Ok(RouteLeg {
            duration_seconds: duration.value,
            duration_in_traffic_seconds: element.duration_in_traffic.map(|d| d.value),
            distance_meters: element.distance.map_or(0, |d| d.value),
        })
    }
}

impl TravelTimeSource for DistanceMatrixClient {
    fn travel_time(&self, origin: Coordinates, destination: Coordinates) -> TravelFuture<'_> {
        Box::pin(self.route(origin, destination))
    }
}
