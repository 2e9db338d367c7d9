use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;
use crate::location::{default_stations, Location};

/// Open-Meteo returns at most this many forecast days (today included).
pub const OPEN_METEO_FORECAST_DAYS: u32 = 16;

const DATA_DIR_ENV: &str = "FORECAST_TRACKER_DATA_DIR";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// All errors joined into one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Immutable run configuration. Built once and passed by reference to the
/// collection and reconciliation phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the archive database, grid cache and results file
    pub data_dir: PathBuf,

    /// Lead times (days) that are collected and scored
    pub lead_times: Vec<u32>,

    /// Tracked sites, in collection order
    pub locations: Vec<Location>,

    pub tolerances: Tolerances,

    pub providers: ProvidersConfig,

    pub http: HttpConfig,
}

/// Scoring tolerances. Temperatures in °F, precipitation in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tolerances {
    /// Max |predicted - actual| for the high to count as accurate.
    ///
    /// Inclusive, with 1e-9 °F of slack for float rounding: a difference
    /// of `temp_high + 1e-9` still counts, anything larger does not.
    pub temp_high: f64,
    /// Max |predicted - actual| for the low; same boundary as `temp_high`
    pub temp_low: f64,
    /// Amounts strictly above this count as measurable precipitation
    pub precip_threshold: f64,
    /// Whether the weather condition category counts toward the overall verdict
    pub score_condition: bool,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            temp_high: 3.0,
            temp_low: 3.0,
            precip_threshold: 0.1,
            score_condition: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub open_meteo: OpenMeteoConfig,
    pub nws: NwsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenMeteoConfig {
    /// Collect forecasts from Open-Meteo
    pub enabled: bool,
    /// Compare collected forecasts against actuals
    pub scoring_enabled: bool,
    pub forecast_url: String,
    /// Historical endpoint, also the source of actuals for every provider
    pub archive_url: String,
    /// Timezone used for daily aggregation ("auto" = local to the site)
    pub timezone: String,
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scoring_enabled: true,
            forecast_url: "https://api.open-meteo.com/v1/forecast".to_string(),
            archive_url: "https://archive-api.open-meteo.com/v1/archive".to_string(),
            timezone: "auto".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NwsConfig {
    pub enabled: bool,
    /// NWS forecasts are collected for later use but not scored by default
    pub scoring_enabled: bool,
    pub api_url: String,
}

impl Default for NwsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scoring_enabled: false,
            api_url: "https://api.weather.gov".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Extra attempts after a transient failure
    pub max_retries: u32,
    /// Delay before the first retry (doubles each attempt)
    pub retry_delay_ms: u64,
    /// Sent on every request; NWS rejects anonymous clients
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 1,
            retry_delay_ms: 500,
            user_agent: concat!("ForecastTracker/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            lead_times: vec![1, 3, 7, 15],
            locations: default_stations(),
            tolerances: Tolerances::default(),
            providers: ProvidersConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing the default config there if
    /// no file exists yet.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_path()?;

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load from an explicit path. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load (explicit path or default), apply overrides and validate.
    ///
    /// `data_dir` wins over `FORECAST_TRACKER_DATA_DIR`, which wins over the
    /// file. Warnings are logged; any error rejects the config.
    pub fn load_validated(
        path: Option<&Path>,
        data_dir: Option<&Path>,
    ) -> Result<(Self, ValidationResult), ConfigError> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_data_dir_override(std::env::var_os(DATA_DIR_ENV).map(PathBuf::from));
        config.apply_data_dir_override(data_dir.map(Path::to_path_buf));
        config.validated()
    }

    fn apply_data_dir_override(&mut self, data_dir: Option<PathBuf>) {
        if let Some(dir) = data_dir.filter(|d| !d.as_os_str().is_empty()) {
            tracing::debug!("Using data dir {}", dir.display());
            self.data_dir = dir;
        }
    }

    /// Validate an already-built config, logging warnings.
    fn validated(self) -> Result<(Self, ValidationResult), ConfigError> {
        let validation = self.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()));
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((self, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        // Locations
        if self.locations.is_empty() {
            result.add_error("locations", "At least one location is required");
        }
        let mut seen = HashSet::new();
        for (i, location) in self.locations.iter().enumerate() {
            let field = format!("locations[{}]", i);
            if location.id.trim().is_empty() {
                result.add_error(&field, "Location id must not be empty");
            } else if !seen.insert(location.id.as_str()) {
                result.add_error(&field, format!("Duplicate location id: {}", location.id));
            }
            if !location.has_valid_coordinates() {
                result.add_error(
                    &field,
                    format!(
                        "Coordinates out of range: {}, {}",
                        location.latitude, location.longitude
                    ),
                );
            }
        }

        // Lead times
        if self.lead_times.is_empty() {
            result.add_error("lead_times", "At least one lead time is required");
        }
        if self.lead_times.contains(&0) {
            result.add_error("lead_times", "Lead times must be at least 1 day");
        }
        let unique: HashSet<u32> = self.lead_times.iter().copied().collect();
        if unique.len() != self.lead_times.len() {
            result.add_warning("lead_times", "Duplicate lead times are ignored");
        }
        if self
            .lead_times
            .iter()
            .any(|&l| l >= OPEN_METEO_FORECAST_DAYS)
        {
            result.add_warning(
                "lead_times",
                format!(
                    "Open-Meteo forecasts only reach {} days ahead",
                    OPEN_METEO_FORECAST_DAYS - 1
                ),
            );
        }

        // Tolerances
        let t = &self.tolerances;
        for (field, value) in [
            ("tolerances.temp_high", t.temp_high),
            ("tolerances.temp_low", t.temp_low),
            ("tolerances.precip_threshold", t.precip_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                result.add_error(field, "Tolerance must be a non-negative number");
            }
        }

        // Providers
        let om = &self.providers.open_meteo;
        let nws = &self.providers.nws;
        if !om.enabled && !nws.enabled {
            result.add_error("providers", "At least one provider must be enabled");
        }
        if om.enabled {
            self.validate_url(&om.forecast_url, "providers.open_meteo.forecast_url", &mut result);
        }
        if om.scoring_enabled || nws.scoring_enabled {
            self.validate_url(&om.archive_url, "providers.open_meteo.archive_url", &mut result);
        }
        if nws.enabled {
            self.validate_url(&nws.api_url, "providers.nws.api_url", &mut result);
        }
        if om.scoring_enabled && !om.enabled {
            result.add_warning(
                "providers.open_meteo.scoring_enabled",
                "Scoring enabled but collection disabled; only previously archived forecasts will be scored",
            );
        }
        if nws.scoring_enabled && !nws.enabled {
            result.add_warning(
                "providers.nws.scoring_enabled",
                "Scoring enabled but collection disabled; only previously archived forecasts will be scored",
            );
        }

        // HTTP
        if self.http.timeout_secs == 0 {
            result.add_error("http.timeout_secs", "Timeout must be greater than 0");
        }
        if self.http.user_agent.trim().is_empty() {
            result.add_error("http.user_agent", "User agent must not be empty");
        }
        if self.http.max_retries > 5 {
            result.add_warning("http.max_retries", "More than 5 retries per request");
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }
                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Lead times in ascending order without duplicates.
    pub fn active_lead_times(&self) -> Vec<u32> {
        let mut lead_times = self.lead_times.clone();
        lead_times.sort_unstable();
        lead_times.dedup();
        lead_times
    }

    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join("forecasts.db")
    }

    pub fn grid_cache_path(&self) -> PathBuf {
        self.data_dir.join("nws_grid_cache.json")
    }

    pub fn results_path(&self) -> PathBuf {
        self.data_dir.join("results.json")
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Io(format!("{}: {}", parent.display(), e)))?;
        }

        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))?;

        std::fs::write(path, contents)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))
    }

    /// `<config dir>/forecast-tracker/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ConfigError::NotFound("platform config directory".to_string()))?
            .join("forecast-tracker");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        let result = config.validate();
        assert!(result.is_valid(), "Default config should be valid: {:?}", result.errors);
    }

    #[test]
    fn test_default_lead_times_and_tolerances() {
        let config = Config::default();
        assert_eq!(config.lead_times, vec![1, 3, 7, 15]);
        assert_eq!(config.tolerances.temp_high, 3.0);
        assert_eq!(config.tolerances.temp_low, 3.0);
        assert_eq!(config.tolerances.precip_threshold, 0.1);
        assert!(config.providers.open_meteo.scoring_enabled);
        assert!(!config.providers.nws.scoring_enabled);
    }

    #[test]
    fn test_invalid_url() {
        let mut config = Config::default();
        config.providers.nws.api_url = "not-a-url".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "providers.nws.api_url"));
    }

    #[test]
    fn test_invalid_url_scheme() {
        let mut config = Config::default();
        config.providers.open_meteo.archive_url = "ftp://archive.example.com".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_duplicate_location_ids() {
        let mut config = Config::default();
        config.locations.push(Location::new("KBOS", 42.0, -71.0, "Boston again"));
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("Duplicate location id")));
    }

    #[test]
    fn test_zero_lead_time_rejected() {
        let mut config = Config::default();
        config.lead_times = vec![0, 1];
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_long_lead_time_is_warning() {
        let mut config = Config::default();
        config.lead_times = vec![1, 20];
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "lead_times"));
    }

    #[test]
    fn test_negative_tolerance_rejected() {
        let mut config = Config::default();
        config.tolerances.temp_low = -1.0;
        let result = config.validate();
        assert!(result.errors.iter().any(|e| e.field == "tolerances.temp_low"));
    }

    #[test]
    fn test_no_provider_enabled() {
        let mut config = Config::default();
        config.providers.open_meteo.enabled = false;
        config.providers.nws.enabled = false;
        assert!(!config.validate().is_valid());
    }

    #[test]
    fn test_active_lead_times_sorted_and_deduped() {
        let mut config = Config::default();
        config.lead_times = vec![7, 1, 3, 1];
        assert_eq!(config.active_lead_times(), vec![1, 3, 7]);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            lead_times = [1, 3]

            [[locations]]
            id = "KMSP"
            latitude = 44.8848
            longitude = -93.2223
            name = "Minneapolis"

            [tolerances]
            temp_high = 2.5
            "#,
        )
        .unwrap();

        assert_eq!(config.lead_times, vec![1, 3]);
        assert_eq!(config.locations.len(), 1);
        assert_eq!(config.tolerances.temp_high, 2.5);
        assert_eq!(config.tolerances.temp_low, 3.0);
        assert!(config.providers.open_meteo.enabled);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.lead_times = vec![2, 5];

        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();

        assert_eq!(loaded.lead_times, vec![2, 5]);
        assert_eq!(loaded.locations, config.locations);
    }

    #[test]
    fn test_data_dir_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.data_dir = PathBuf::from("/srv/from-file");
        config.save_to(&path).unwrap();

        // Only this test touches the variable.
        std::env::set_var(DATA_DIR_ENV, dir.path().join("from-env"));
        let (from_env, _) = Config::load_validated(Some(&path), None).unwrap();
        let cli_dir = dir.path().join("from-cli");
        let (from_cli, _) = Config::load_validated(Some(&path), Some(&cli_dir)).unwrap();
        std::env::remove_var(DATA_DIR_ENV);
        let (from_file, _) = Config::load_validated(Some(&path), None).unwrap();

        assert_eq!(from_env.data_dir, dir.path().join("from-env"));
        assert_eq!(from_cli.data_dir, cli_dir);
        assert_eq!(from_file.data_dir, PathBuf::from("/srv/from-file"));
    }

    #[test]
    fn test_empty_data_dir_override_is_ignored() {
        let mut config = Config::default();
        config.apply_data_dir_override(Some(PathBuf::new()));
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = Config::load_from(&dir.path().join("absent.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
