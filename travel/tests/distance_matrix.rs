//! HTTP behaviour of the distance-matrix client and the estimator's fallback.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use order_lifecycle_core::{Coordinates, EstimateSource, TravelTimeError};
use order_lifecycle_testing::fixtures::{CUSTOMER, RESTAURANT};
use order_lifecycle_travel::{DistanceMatrixClient, TravelTimeConfig, TravelTimeEstimator};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OK_BODY: &str = r#"{
    "status": "OK",
    "origin_addresses": ["New York, NY"],
    "destination_addresses": ["Brooklyn, NY"],
    "rows": [{
        "elements": [{
            "status": "OK",
            "duration": {"value": 600, "text": "10 mins"},
            "duration_in_traffic": {"value": 840, "text": "14 mins"},
            "distance": {"value": 9876, "text": "9.9 km"}
        }]
    }]
}"#;

fn config(server: &MockServer) -> TravelTimeConfig {
    TravelTimeConfig::default()
        .with_api_key("test-key")
        .with_base_url(server.uri())
}

fn estimator(config: TravelTimeConfig) -> TravelTimeEstimator {
    let client = DistanceMatrixClient::new(config.clone()).unwrap();
    TravelTimeEstimator::new(Arc::new(client), config)
}

#[tokio::test]
async fn sends_route_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/distancematrix/json"))
        .and(query_param("origins", "40.7128,-74.006"))
        .and(query_param("destinations", "40.6782,-73.9442"))
        .and(query_param("mode", "driving"))
        .and(query_param("departure_time", "now"))
        .and(query_param("key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_BODY))
        .expect(1)
        .mount(&server)
        .await;

    let client = assert_ok!(DistanceMatrixClient::new(config(&server)));
    let leg = assert_ok!(client.route(RESTAURANT, CUSTOMER).await);

    assert_eq!(leg.duration_seconds, 600);
    assert_eq!(leg.duration_in_traffic_seconds, Some(840));
    assert_eq!(leg.distance_meters, 9876);
}

#[tokio::test]
async fn api_estimate_prefers_traffic_and_adds_buffer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_BODY))
        .mount(&server)
        .await;

    let estimate = estimator(config(&server))
        .estimate(Some(RESTAURANT), Some(CUSTOMER))
        .await;

    // 840 s in traffic = 14 minutes, plus 18 minutes preparation.
    assert_eq!(estimate.duration, Duration::from_secs(32 * 60));
    assert_eq!(estimate.distance_km, Some(9.88));
    assert_eq!(estimate.source, EstimateSource::Api);
}

#[tokio::test]
async fn http_error_is_reported_by_client_and_absorbed_by_estimator() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = DistanceMatrixClient::new(config(&server)).unwrap();
    let err = assert_err!(client.route(RESTAURANT, CUSTOMER).await);
    assert_eq!(err, TravelTimeError::Http(500));

    let estimate = estimator(config(&server))
        .estimate(Some(RESTAURANT), Some(CUSTOMER))
        .await;
    assert_eq!(estimate.duration_ms(), 35 * 60_000);
    assert_eq!(estimate.source, EstimateSource::Estimated);
}

#[tokio::test]
async fn non_ok_status_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"status":"OVER_QUERY_LIMIT","rows":[]}"#),
        )
        .mount(&server)
        .await;

    let client = DistanceMatrixClient::new(config(&server)).unwrap();
    assert_eq!(
        client.route(RESTAURANT, CUSTOMER).await.unwrap_err(),
        TravelTimeError::ApiStatus("OVER_QUERY_LIMIT".to_string())
    );

    let estimate = estimator(config(&server))
        .estimate(Some(RESTAURANT), Some(CUSTOMER))
        .await;
    assert_eq!(estimate.source, EstimateSource::Estimated);
}

#[tokio::test]
async fn malformed_body_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = DistanceMatrixClient::new(config(&server)).unwrap();
    assert!(matches!(
        client.route(RESTAURANT, CUSTOMER).await.unwrap_err(),
        TravelTimeError::ResponseParseFailed(_)
    ));
}

#[tokio::test]
async fn slow_upstream_times_out_to_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(OK_BODY)
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let estimate = estimator(config(&server).with_timeout(Duration::from_millis(200)))
        .estimate(Some(RESTAURANT), Some(CUSTOMER))
        .await;

    assert_eq!(estimate.duration_ms(), 35 * 60_000);
    assert_eq!(estimate.source, EstimateSource::Estimated);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn missing_coordinates_skip_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_BODY))
        .expect(0)
        .mount(&server)
        .await;

    let estimate = estimator(config(&server))
        .estimate(Some(Coordinates::new(1.0, 2.0)), None)
        .await;
    assert_eq!(estimate.source, EstimateSource::Estimated);
    assert_eq!(estimate.duration_ms(), 35 * 60_000);
}

#[tokio::test]
async fn unconfigured_key_falls_back_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(OK_BODY))
        .expect(0)
        .mount(&server)
        .await;

    let config = TravelTimeConfig::default().with_base_url(server.uri());
    let estimate = estimator(config)
        .estimate(Some(RESTAURANT), Some(CUSTOMER))
        .await;
    assert_eq!(estimate.source, EstimateSource::Estimated);
}
