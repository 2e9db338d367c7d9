//! Run orchestration: load state, collect, reconcile, save.

use chrono::NaiveDate;
use tracker_core::{Config, ProviderError, TrackerError};
use tracker_weather::{ActualsSource, ForecastSource, GridCache, HttpClient, NwsClient, OpenMeteoClient, Provider};

use crate::archive::SqliteForecastArchive;
use crate::collect::Collector;
use crate::reconcile::{MemoizedActuals, Reconciler};
use crate::registry::LocationRegistry;
use crate::report::RunReport;
use crate::results::ResultsStore;

/// Which phases a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Collect then reconcile (the daily job)
    Full,
    CollectOnly,
    ReconcileOnly,
}

impl RunMode {
    fn collects(self) -> bool {
        matches!(self, Self::Full | Self::CollectOnly)
    }

    fn reconciles(self) -> bool {
        matches!(self, Self::Full | Self::ReconcileOnly)
    }
}

/// Providers whose archived forecasts are scored.
pub fn scoring_providers(config: &Config) -> Vec<Provider> {
    let mut providers = Vec::new();
    if config.providers.open_meteo.scoring_enabled {
        providers.push(Provider::OpenMeteo);
    }
    if config.providers.nws.scoring_enabled {
        providers.push(Provider::Nws);
    }
    providers
}

/// Owns the configuration and the outside-world capabilities for one
/// invocation.
pub struct Tracker {
    config: Config,
    registry: LocationRegistry,
    sources: Vec<Box<dyn ForecastSource>>,
    actuals: Box<dyn ActualsSource>,
}

impl Tracker {
    pub fn new(
        config: Config,
        sources: Vec<Box<dyn ForecastSource>>,
        actuals: Box<dyn ActualsSource>,
    ) -> Self {
        let registry = LocationRegistry::from_config(&config);
        Self {
            config,
            registry,
            sources,
            actuals,
        }
    }

    /// Wire up the HTTP clients for every enabled provider.
    pub fn from_config(config: Config) -> Result<Self, ProviderError> {
        let http = HttpClient::new(&config.http)?;
        let open_meteo = OpenMeteoClient::new(http.clone(), &config.providers.open_meteo);

        let mut sources: Vec<Box<dyn ForecastSource>> = Vec::new();
        if config.providers.open_meteo.enabled {
            sources.push(Box::new(open_meteo.clone()));
        }
        if config.providers.nws.enabled {
            sources.push(Box::new(NwsClient::new(http, &config.providers.nws)));
        }

        Ok(Self::new(config, sources, Box::new(open_meteo)))
    }

    /// Execute one run for `as_of`.
    ///
    /// Every state file is opened before anything is written, so an unusable
    /// file aborts the run untouched. Per-item failures are reported in the
    /// returned `RunReport`; a total fetch outage is an error, raised after
    /// state has been saved.
    pub async fn run(
        &self,
        as_of: NaiveDate,
        mode: RunMode,
        rescore: bool,
    ) -> Result<RunReport, TrackerError> {
        let mut grid_cache = GridCache::load(&self.config.grid_cache_path())?;
        let mut results = ResultsStore::load(&self.config.results_path())?;
        let archive = SqliteForecastArchive::open(&self.config.archive_path())?;

        let mut report = RunReport::new(as_of);
        tracing::info!(run_id = %report.run_id, as_of = %as_of, mode = ?mode, "Starting run");

        if mode.collects() {
            let sources: Vec<&dyn ForecastSource> = self.sources.iter().map(|s| s.as_ref()).collect();
            let collection = Collector::new(&self.config, &self.registry)
                .collect(as_of, &sources, &mut grid_cache, &archive)
                .await;

            // Successful resolutions are kept even when the phase aborts.
            grid_cache.save()?;
            report.collection = Some(collection?);
        }

        if mode.reconciles() {
            let mut actuals = MemoizedActuals::new(self.actuals.as_ref());
            let reconciliation = Reconciler::new(&self.config, &self.registry)
                .reconcile(
                    as_of,
                    &scoring_providers(&self.config),
                    &archive,
                    &mut actuals,
                    &mut results,
                    rescore,
                )
                .await?;

            results.save(as_of)?;
            report.reconciliation = Some(reconciliation);
        }

        report.log_summary();

        if report.is_total_outage() {
            let what = if report.collection.is_some() {
                "forecast"
            } else {
                "actual"
            };
            tracing::error!(run_id = %report.run_id, as_of = %as_of, "Every {} fetch failed", what);
            return Err(TrackerError::NoProgress(format!(
                "no {} could be fetched for any location on {}",
                what, as_of
            )));
        }

        Ok(report)
    }
}
