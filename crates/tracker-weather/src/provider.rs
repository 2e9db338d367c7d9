//! Open-Meteo forecast and historical archive client.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracker_core::config::OPEN_METEO_FORECAST_DAYS;
use tracker_core::{Location, OpenMeteoConfig, ProviderError};
use url::Url;

use crate::http::HttpClient;
use crate::source::{ActualsSource, ForecastRequest, ForecastSource};
use crate::types::{
    target_date, ActualObservation, ExtendedFields, ForecastRecord, Provider, WeatherCondition,
};

const FORECAST_DAILY: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum,weather_code,precipitation_probability_max,wind_speed_10m_max";
const ARCHIVE_DAILY: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum,weather_code";

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: Option<Daily>,
}

/// Column-oriented daily block. Columns the endpoint does not return stay
/// empty.
#[derive(Debug, Default, Deserialize)]
struct Daily {
    time: Vec<NaiveDate>,
    #[serde(default)]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default)]
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    weather_code: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m_max: Vec<Option<f64>>,
}

impl Daily {
    fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.time.iter().position(|d| *d == date)
    }

    fn weather_code(&self, idx: usize) -> Option<i32> {
        at(&self.weather_code, idx).map(|c| c.round() as i32)
    }
}

fn at(column: &[Option<f64>], idx: usize) -> Option<f64> {
    column.get(idx).copied().flatten()
}

/// Open-Meteo client. Serves forecasts (scored provider) and the historical
/// actuals every scored provider is compared against.
#[derive(Debug, Clone)]
pub struct OpenMeteoClient {
    http: HttpClient,
    forecast_url: String,
    archive_url: String,
    timezone: String,
}

impl OpenMeteoClient {
    pub fn new(http: HttpClient, config: &OpenMeteoConfig) -> Self {
        Self {
            http,
            forecast_url: config.forecast_url.clone(),
            archive_url: config.archive_url.clone(),
            timezone: config.timezone.clone(),
        }
    }

    fn forecast_request_url(&self, location: &Location, days: u32) -> Result<Url, ProviderError> {
        let params = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("daily", FORECAST_DAILY.to_string()),
            ("temperature_unit", "fahrenheit".to_string()),
            ("precipitation_unit", "inch".to_string()),
            ("wind_speed_unit", "mph".to_string()),
            ("timezone", self.timezone.clone()),
            ("forecast_days", days.to_string()),
        ];
        Url::parse_with_params(&self.forecast_url, &params)
            .map_err(|e| ProviderError::InvalidResponse(format!("bad forecast url: {}", e)))
    }

    fn archive_request_url(&self, location: &Location, date: NaiveDate) -> Result<Url, ProviderError> {
        let day = date.format("%Y-%m-%d").to_string();
        let params = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("start_date", day.clone()),
            ("end_date", day),
            ("daily", ARCHIVE_DAILY.to_string()),
            ("temperature_unit", "fahrenheit".to_string()),
            ("precipitation_unit", "inch".to_string()),
            ("timezone", self.timezone.clone()),
        ];
        Url::parse_with_params(&self.archive_url, &params)
            .map_err(|e| ProviderError::InvalidResponse(format!("bad archive url: {}", e)))
    }
}

#[async_trait]
impl ForecastSource for OpenMeteoClient {
    fn provider(&self) -> Provider {
        Provider::OpenMeteo
    }

    async fn fetch_forecasts(
        &self,
        request: &ForecastRequest<'_>,
    ) -> Result<Vec<ForecastRecord>, ProviderError> {
        let max_lead = request.lead_times.iter().copied().max().unwrap_or(0);
        let days = (max_lead + 1).clamp(1, OPEN_METEO_FORECAST_DAYS);
        let url = self.forecast_request_url(request.location, days)?;

        let body: DailyResponse = self.http.get_json(&url).await?;
        let daily = body
            .daily
            .ok_or_else(|| ProviderError::InvalidResponse("response has no daily block".into()))?;
        let first_day = daily
            .time
            .first()
            .copied()
            .ok_or_else(|| ProviderError::InvalidResponse("daily block has no days".into()))?;
        request.check_served(first_day)?;

        let mut records = Vec::with_capacity(request.lead_times.len());
        for &lead_time in request.lead_times {
            let target = target_date(request.issued, lead_time);
            let Some(idx) = daily.index_of(target) else {
                tracing::warn!(
                    location = %request.location.id,
                    provider = %Provider::OpenMeteo,
                    lead_time,
                    target = %target,
                    "No forecast row for target date"
                );
                continue;
            };

            let mut record = ForecastRecord::new(
                request.issued,
                lead_time,
                request.location.id.clone(),
                Provider::OpenMeteo,
            );
            record.high = at(&daily.temperature_2m_max, idx);
            record.low = at(&daily.temperature_2m_min, idx);
            record.precipitation = at(&daily.precipitation_sum, idx);

            let weather_code = daily.weather_code(idx);
            record.condition = weather_code.map(WeatherCondition::from_wmo_code);
            record.extended = ExtendedFields {
                weather_code,
                precipitation_probability: at(&daily.precipitation_probability_max, idx),
                wind_speed_mph: at(&daily.wind_speed_10m_max, idx),
                ..ExtendedFields::default()
            };

            records.push(record);
        }

        tracing::debug!(
            location = %request.location.id,
            records = records.len(),
            "Parsed Open-Meteo forecast"
        );
        Ok(records)
    }
}

#[async_trait]
impl ActualsSource for OpenMeteoClient {
    async fn fetch_actual(
        &self,
        location: &Location,
        date: NaiveDate,
    ) -> Result<ActualObservation, ProviderError> {
        let url = self.archive_request_url(location, date)?;
        let body: DailyResponse = self.http.get_json(&url).await?;

        let no_data = || ProviderError::NoData(format!("{} on {}", location.id, date));
        let daily = body.daily.ok_or_else(no_data)?;
        let idx = daily.index_of(date).ok_or_else(no_data)?;

        let high = at(&daily.temperature_2m_max, idx);
        let low = at(&daily.temperature_2m_min, idx);
        let precipitation = at(&daily.precipitation_sum, idx);

        // The archive publishes rows before the values are in.
        if high.is_none() && low.is_none() && precipitation.is_none() {
            return Err(no_data());
        }

        let weather_code = daily.weather_code(idx);
        Ok(ActualObservation {
            date,
            location_id: location.id.clone(),
            high,
            low,
            precipitation,
            weather_code,
            condition: weather_code.map(WeatherCondition::from_wmo_code),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn daily_block_tolerates_nulls_and_missing_columns() {
        let daily: Daily = serde_json::from_str(
            r#"{
                "time": ["2026-10-19", "2026-10-20"],
                "temperature_2m_max": [61.3, null],
                "temperature_2m_min": [44.0, 45.1],
                "weather_code": [3.0, 61]
            }"#,
        )
        .unwrap();

        let idx = daily
            .index_of(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap())
            .unwrap();
        assert_eq!(idx, 1);
        assert_eq!(at(&daily.temperature_2m_max, idx), None);
        assert_eq!(at(&daily.temperature_2m_min, idx), Some(45.1));
        assert_eq!(at(&daily.precipitation_sum, idx), None);
        assert_eq!(daily.weather_code(0), Some(3));
        assert_eq!(daily.weather_code(1), Some(61));
    }

    #[test]
    fn archive_url_pins_single_day() {
        let http = HttpClient::new(&tracker_core::HttpConfig::default()).unwrap();
        let client = OpenMeteoClient::new(http, &OpenMeteoConfig::default());
        let location = Location::new("KOMA", 41.3032, -95.8941, "Omaha Eppley");
        let url = client
            .archive_request_url(&location, NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
            .unwrap();

        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("start_date".into(), "2026-03-01".into())));
        assert!(query.contains(&("end_date".into(), "2026-03-01".into())));
        assert!(query.contains(&("temperature_unit".into(), "fahrenheit".into())));
    }
}
