use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Forecast data source
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    OpenMeteo,
    Nws,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenMeteo => "open_meteo",
            Self::Nws => "nws",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "open_meteo" => Some(Self::OpenMeteo),
            "nws" => Some(Self::Nws),
            _ => None,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weather condition categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WeatherCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Foggy,
    Drizzle,
    Rainy,
    Snowy,
    Stormy,
    #[default]
    Unknown,
}

impl WeatherCondition {
    /// Convert WMO weather code to WeatherCondition
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1..=2 => Self::PartlyCloudy,
            3 => Self::Cloudy,
            45 | 48 => Self::Foggy,
            51 | 53 | 55 | 56 | 57 => Self::Drizzle,
            61 | 63 | 65 | 66 | 67 | 80 | 81 | 82 => Self::Rainy,
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snowy,
            95 | 96 | 99 => Self::Stormy,
            _ => Self::Unknown,
        }
    }

    /// Best-effort mapping of an NWS short forecast ("Chance Rain Showers").
    /// The most severe phenomenon mentioned wins.
    pub fn from_short_forecast(text: &str) -> Self {
        let t = text.to_ascii_lowercase();
        if t.contains("thunder") {
            Self::Stormy
        } else if t.contains("snow") || t.contains("sleet") || t.contains("flurries") {
            Self::Snowy
        } else if t.contains("rain") || t.contains("showers") {
            Self::Rainy
        } else if t.contains("drizzle") {
            Self::Drizzle
        } else if t.contains("fog") || t.contains("haze") {
            Self::Foggy
        } else if t.contains("partly") || t.contains("mostly sunny") || t.contains("mostly clear") {
            Self::PartlyCloudy
        } else if t.contains("cloudy") || t.contains("overcast") {
            Self::Cloudy
        } else if t.contains("sunny") || t.contains("clear") || t.contains("fair") {
            Self::Clear
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::PartlyCloudy => "partly_cloudy",
            Self::Cloudy => "cloudy",
            Self::Foggy => "foggy",
            Self::Drizzle => "drizzle",
            Self::Rainy => "rainy",
            Self::Snowy => "snowy",
            Self::Stormy => "stormy",
            Self::Unknown => "unknown",
        }
    }
}

/// Provider-specific addressing for NWS: the forecast office grid cell that
/// covers a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridToken {
    pub grid_id: String,
    pub grid_x: i64,
    pub grid_y: i64,
    pub forecast_url: String,
    pub resolved_at: DateTime<Utc>,
}

/// Composite key of an archived forecast.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ForecastKey {
    pub issued: NaiveDate,
    pub lead_time: u32,
    pub location_id: String,
    pub provider: Provider,
}

/// Raw provider fields kept alongside the scored values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_code: Option<i32>,
    /// Percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precipitation_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_speed_mph: Option<f64>,
    /// Provider text such as "10 to 15 mph"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_range_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<String>,
    /// Percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_humidity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_trend: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_forecast: Option<String>,
}

/// One provider's prediction for one location, `lead_time` days ahead of the
/// day it was issued. Temperatures in °F, precipitation in inches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub issued: NaiveDate,
    pub lead_time: u32,
    pub target: NaiveDate,
    pub location_id: String,
    pub provider: Provider,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub precipitation: Option<f64>,
    pub condition: Option<WeatherCondition>,
    #[serde(default)]
    pub extended: ExtendedFields,
    pub fetched_at: DateTime<Utc>,
}

impl ForecastRecord {
    /// Empty record for `issued + lead_time`; the caller fills in values.
    pub fn new(
        issued: NaiveDate,
        lead_time: u32,
        location_id: impl Into<String>,
        provider: Provider,
    ) -> Self {
        Self {
            issued,
            lead_time,
            target: target_date(issued, lead_time),
            location_id: location_id.into(),
            provider,
            high: None,
            low: None,
            precipitation: None,
            condition: None,
            extended: ExtendedFields::default(),
            fetched_at: Utc::now(),
        }
    }

    pub fn key(&self) -> ForecastKey {
        ForecastKey {
            issued: self.issued,
            lead_time: self.lead_time,
            location_id: self.location_id.clone(),
            provider: self.provider,
        }
    }

    /// True if no scored value is present.
    pub fn is_empty(&self) -> bool {
        self.high.is_none() && self.low.is_none() && self.precipitation.is_none()
    }
}

/// Observed weather for one location and day. Consumed during
/// reconciliation, never archived on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualObservation {
    pub date: NaiveDate,
    pub location_id: String,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub precipitation: Option<f64>,
    pub weather_code: Option<i32>,
    pub condition: Option<WeatherCondition>,
}

/// `issued + lead_time` days.
pub fn target_date(issued: NaiveDate, lead_time: u32) -> NaiveDate {
    issued + chrono::Days::new(u64::from(lead_time))
}

/// `today - lead_time` days: the issue date whose forecast targets today.
pub fn issued_date(today: NaiveDate, lead_time: u32) -> NaiveDate {
    today - chrono::Days::new(u64::from(lead_time))
}
