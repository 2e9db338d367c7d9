//! National Weather Service client.
//!
//! NWS addresses forecasts by forecast-office grid cell, so every location is
//! first resolved through `/points/{lat},{lon}`. The resulting token is cached
//! by [`crate::cache::GridCache`].

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Deserialize;
use tracker_core::{Location, NwsConfig, ProviderError};
use url::Url;

use crate::http::HttpClient;
use crate::source::{ForecastRequest, ForecastSource, GridResolver};
use crate::types::{target_date, ExtendedFields, ForecastRecord, GridToken, Provider, WeatherCondition};

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: Option<PointsProperties>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PointsProperties {
    grid_id: Option<String>,
    grid_x: Option<i64>,
    grid_y: Option<i64>,
    forecast: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    properties: Option<ForecastProperties>,
}

#[derive(Debug, Deserialize)]
struct ForecastProperties {
    #[serde(default)]
    periods: Vec<Period>,
}

#[derive(Debug, Deserialize)]
struct QuantitativeValue {
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Period {
    start_time: DateTime<FixedOffset>,
    is_daytime: bool,
    temperature: Option<f64>,
    temperature_unit: Option<String>,
    temperature_trend: Option<String>,
    probability_of_precipitation: Option<QuantitativeValue>,
    relative_humidity: Option<QuantitativeValue>,
    wind_speed: Option<String>,
    wind_direction: Option<String>,
    short_forecast: Option<String>,
}

impl Period {
    /// Local calendar date the period starts on.
    fn date(&self) -> NaiveDate {
        self.start_time.date_naive()
    }

    fn temperature_f(&self) -> Option<f64> {
        let t = self.temperature?;
        match self.temperature_unit.as_deref() {
            Some("C") => Some(t * 9.0 / 5.0 + 32.0),
            _ => Some(t),
        }
    }
}

/// Leading number of a wind text like "10 to 15 mph".
fn parse_wind_mph(text: &str) -> Option<f64> {
    text.split_whitespace().find_map(|w| w.parse::<f64>().ok())
}

#[derive(Debug, Clone)]
pub struct NwsClient {
    http: HttpClient,
    api_url: String,
}

impl NwsClient {
    pub fn new(http: HttpClient, config: &NwsConfig) -> Self {
        Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
        }
    }

    fn points_url(&self, location: &Location) -> Result<Url, ProviderError> {
        let raw = format!(
            "{}/points/{:.4},{:.4}",
            self.api_url, location.latitude, location.longitude
        );
        Url::parse(&raw).map_err(|e| ProviderError::InvalidResponse(format!("bad points url: {}", e)))
    }
}

#[async_trait]
impl GridResolver for NwsClient {
    async fn resolve_grid(&self, location: &Location) -> Result<GridToken, ProviderError> {
        let url = self.points_url(location)?;
        let body: PointsResponse = self.http.get_json(&url).await?;

        let props = body
            .properties
            .ok_or_else(|| ProviderError::NoData(format!("grid point for {}", location.id)))?;

        let (Some(grid_id), Some(grid_x), Some(grid_y), Some(forecast_url)) =
            (props.grid_id, props.grid_x, props.grid_y, props.forecast)
        else {
            return Err(ProviderError::NoData(format!(
                "incomplete grid point for {}",
                location.id
            )));
        };

        Url::parse(&forecast_url).map_err(|e| {
            ProviderError::InvalidResponse(format!("forecast url {}: {}", forecast_url, e))
        })?;

        tracing::info!(
            location = %location.id,
            grid = %format!("{}/{},{}", grid_id, grid_x, grid_y),
            "Resolved NWS grid point"
        );

        Ok(GridToken {
            grid_id,
            grid_x,
            grid_y,
            forecast_url,
            resolved_at: Utc::now(),
        })
    }
}

#[async_trait]
impl ForecastSource for NwsClient {
    fn provider(&self) -> Provider {
        Provider::Nws
    }

    fn grid_resolver(&self) -> Option<&dyn GridResolver> {
        Some(self)
    }

    async fn fetch_forecasts(
        &self,
        request: &ForecastRequest<'_>,
    ) -> Result<Vec<ForecastRecord>, ProviderError> {
        let grid = request
            .grid
            .ok_or_else(|| ProviderError::NoData(format!("no grid for {}", request.location.id)))?;
        let url = Url::parse(&grid.forecast_url)
            .map_err(|e| ProviderError::InvalidResponse(format!("forecast url: {}", e)))?;

        let body: ForecastResponse = self.http.get_json(&url).await?;
        let periods = body.properties.map(|p| p.periods).unwrap_or_default();
        let Some(first) = periods.first() else {
            return Err(ProviderError::NoData(format!(
                "forecast periods for {}",
                request.location.id
            )));
        };
        request.check_served(first.date())?;

        Ok(build_records(request, &periods))
    }
}

fn build_records(request: &ForecastRequest<'_>, periods: &[Period]) -> Vec<ForecastRecord> {
    let mut records = Vec::new();

    for &lead_time in request.lead_times {
        let target = target_date(request.issued, lead_time);
        let day = periods.iter().find(|p| p.is_daytime && p.date() == target);
        let night = periods.iter().find(|p| !p.is_daytime && p.date() == target);

        if day.is_none() && night.is_none() {
            tracing::debug!(
                location = %request.location.id,
                lead_time,
                target = %target,
                "Target date outside NWS forecast horizon"
            );
            continue;
        }

        let mut record = ForecastRecord::new(
            request.issued,
            lead_time,
            request.location.id.clone(),
            Provider::Nws,
        );
        record.high = day.and_then(Period::temperature_f);
        record.low = night.and_then(Period::temperature_f);

        // Daytime text describes the target day better than the night's.
        let primary = day.or(night);
        if let Some(p) = primary {
            let short_forecast = p.short_forecast.clone();
            record.condition = short_forecast
                .as_deref()
                .map(WeatherCondition::from_short_forecast);
            record.extended = ExtendedFields {
                precipitation_probability: p
                    .probability_of_precipitation
                    .as_ref()
                    .and_then(|q| q.value),
                wind_speed_mph: p.wind_speed.as_deref().and_then(parse_wind_mph),
                wind_range_text: p.wind_speed.clone(),
                wind_direction: p.wind_direction.clone(),
                relative_humidity: p.relative_humidity.as_ref().and_then(|q| q.value),
                temperature_trend: p.temperature_trend.clone(),
                short_forecast,
                ..ExtendedFields::default()
            };
        }

        records.push(record);
    }

    records
}
