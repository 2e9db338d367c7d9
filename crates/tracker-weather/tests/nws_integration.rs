//! Integration tests for NwsClient and GridCache using wiremock.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use chrono::NaiveDate;
use tempfile::TempDir;
use tracker_core::{HttpConfig, Location, NwsConfig, ProviderError, ResolutionError};
use tracker_weather::{
    ForecastRequest, ForecastSource, GridCache, GridResolver, HttpClient, NwsClient, RetryConfig,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn chicago() -> Location {
    Location::new("KORD", 41.9786, -87.9048, "Chicago O'Hare")
}

fn client(server: &MockServer) -> NwsClient {
    let http = HttpClient::new(&HttpConfig::default())
        .unwrap()
        .with_retry_config(RetryConfig::new(0, 1, 1));
    let config = NwsConfig {
        api_url: server.uri(),
        ..NwsConfig::default()
    };
    NwsClient::new(http, &config)
}

fn points_body(server: &MockServer) -> serde_json::Value {
    serde_json::json!({
        "properties": {
            "gridId": "LOT",
            "gridX": 65,
            "gridY": 76,
            "forecast": format!("{}/gridpoints/LOT/65,76/forecast", server.uri())
        }
    })
}

async fn mount_points(server: &MockServer, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/points/41.9786,-87.9048"))
        .respond_with(ResponseTemplate::new(200).set_body_json(points_body(server)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_resolve_grid_sends_user_agent() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/points/41.9786,-87.9048"))
        .and(header("accept", "application/geo+json, application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(points_body(&server)))
        .expect(1)
        .mount(&server)
        .await;

    let token = client(&server).resolve_grid(&chicago()).await.unwrap();

    assert_eq!(token.grid_id, "LOT");
    assert_eq!(token.grid_x, 65);
    assert_eq!(token.grid_y, 76);
    assert!(token.forecast_url.ends_with("/gridpoints/LOT/65,76/forecast"));

    let requests = server.received_requests().await.unwrap();
    let agent = requests[0].headers.get("user-agent").unwrap().to_str().unwrap();
    assert!(agent.starts_with("ForecastTracker/"));
}

#[tokio::test]
async fn test_resolve_grid_incomplete_properties() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/points/41.9786,-87.9048"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "properties": { "gridId": "LOT" }
        })))
        .mount(&server)
        .await;

    let err = client(&server).resolve_grid(&chicago()).await.unwrap_err();
    assert!(matches!(err, ProviderError::NoData(_)));
}

#[tokio::test]
async fn test_cache_resolves_each_location_once() {
    let server = MockServer::start().await;
    mount_points(&server, 1).await;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nws_grid_cache.json");
    let nws = client(&server);

    let mut cache = GridCache::load(&path).unwrap();
    let first = cache.resolve(&chicago(), &nws).await.unwrap();
    cache.save().unwrap();

    let mut reloaded = GridCache::load(&path).unwrap();
    let second = reloaded.resolve(&chicago(), &nws).await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_cache_maps_unknown_point_to_resolution_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/points/41.9786,-87.9048"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "title": "Invalid Point",
            "detail": "Unable to provide data for requested point 41.9786,-87.9048"
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut cache = GridCache::load(&dir.path().join("grid.json")).unwrap();
    let err = cache.resolve(&chicago(), &client(&server)).await.unwrap_err();

    match err {
        ResolutionError::Provider { location, source } => {
            assert_eq!(location, "KORD");
            assert!(matches!(source, ProviderError::Status { status: 404, .. }));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_forecast_from_grid() {
    let server = MockServer::start().await;
    mount_points(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/gridpoints/LOT/65,76/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "properties": {
                "periods": [
                    {
                        "number": 1, "name": "Today",
                        "startTime": "2026-10-19T09:00:00-05:00",
                        "isDaytime": true, "temperature": 58, "temperatureUnit": "F",
                        "shortForecast": "Sunny", "windSpeed": "5 mph", "windDirection": "W"
                    },
                    {
                        "number": 2, "name": "Tonight",
                        "startTime": "2026-10-19T18:00:00-05:00",
                        "isDaytime": false, "temperature": 39, "temperatureUnit": "F",
                        "shortForecast": "Clear"
                    },
                    {
                        "number": 3, "name": "Monday",
                        "startTime": "2026-10-20T06:00:00-05:00",
                        "isDaytime": true, "temperature": 61, "temperatureUnit": "F",
                        "temperatureTrend": "falling",
                        "probabilityOfPrecipitation": {"unitCode": "wmoUnit:percent", "value": 70},
                        "relativeHumidity": {"unitCode": "wmoUnit:percent", "value": 85},
                        "shortForecast": "Showers And Thunderstorms Likely",
                        "windSpeed": "15 to 20 mph", "windDirection": "SW"
                    },
                    {
                        "number": 4, "name": "Monday Night",
                        "startTime": "2026-10-20T18:00:00-05:00",
                        "isDaytime": false, "temperature": 44, "temperatureUnit": "F",
                        "probabilityOfPrecipitation": {"unitCode": "wmoUnit:percent", "value": null},
                        "shortForecast": "Mostly Cloudy"
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let nws = client(&server);
    let location = chicago();
    let grid = nws.resolve_grid(&location).await.unwrap();

    let request = ForecastRequest {
        location: &location,
        issued: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        lead_times: &[1, 5],
        grid: Some(&grid),
    };
    let records = nws.fetch_forecasts(&request).await.unwrap();

    assert_eq!(records.len(), 1);
    let r = &records[0];
    assert_eq!(r.lead_time, 1);
    assert_eq!(r.high, Some(61.0));
    assert_eq!(r.low, Some(44.0));
    assert_eq!(r.precipitation, None);
    assert_eq!(r.extended.precipitation_probability, Some(70.0));
    assert_eq!(r.extended.relative_humidity, Some(85.0));
    assert_eq!(r.extended.temperature_trend.as_deref(), Some("falling"));
    assert_eq!(r.extended.wind_direction.as_deref(), Some("SW"));
}

#[tokio::test]
async fn test_forecast_without_grid_fails() {
    let server = MockServer::start().await;
    let location = chicago();
    let request = ForecastRequest {
        location: &location,
        issued: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        lead_times: &[1],
        grid: None,
    };

    let nws = client(&server);
    assert!(nws.grid_resolver().is_some());
    let err = nws.fetch_forecasts(&request).await.unwrap_err();
    assert!(matches!(err, ProviderError::NoData(_)));
}

#[tokio::test]
async fn test_forecast_issued_on_another_day_is_refused() {
    let server = MockServer::start().await;
    mount_points(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/gridpoints/LOT/65,76/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "properties": {
                "periods": [
                    {
                        "number": 1, "name": "Overnight",
                        "startTime": "2026-10-19T00:30:00-05:00",
                        "isDaytime": false, "temperature": 40, "temperatureUnit": "F",
                        "shortForecast": "Clear"
                    },
                    {
                        "number": 2, "name": "Monday",
                        "startTime": "2026-10-19T06:00:00-05:00",
                        "isDaytime": true, "temperature": 58, "temperatureUnit": "F",
                        "shortForecast": "Sunny"
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let nws = client(&server);
    let location = chicago();
    let grid = nws.resolve_grid(&location).await.unwrap();

    // A run for the 18th that starts after midnight sees the 19th's forecast.
    let request = ForecastRequest {
        location: &location,
        issued: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        lead_times: &[1],
        grid: Some(&grid),
    };
    let err = nws.fetch_forecasts(&request).await.unwrap_err();

    match err {
        ProviderError::IssueDateMismatch { requested, served } => {
            assert_eq!(requested, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
            assert_eq!(served, NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!ProviderError::IssueDateMismatch {
        requested: NaiveDate::from_ymd_opt(2026, 10, 18).unwrap(),
        served: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
    }
    .is_transient());
}
