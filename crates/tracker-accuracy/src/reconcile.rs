//! Reconciliation phase: score archived forecasts whose target date is the
//! run date.

use std::collections::HashMap;

use chrono::NaiveDate;
use tracker_core::{Config, Location, PersistenceError, ProviderError};
use tracker_weather::{issued_date, ActualObservation, ActualsSource, ForecastKey, Provider};

use crate::archive::ForecastArchive;
use crate::registry::LocationRegistry;
use crate::report::{ItemOutcome, Outcome, PhaseReport};
use crate::results::ResultsStore;
use crate::scorer::{score, ComparisonKey};

/// Actuals fetched at most once per (location, date) for the lifetime of the
/// value. Failures are remembered too.
pub struct MemoizedActuals<'a> {
    source: &'a dyn ActualsSource,
    seen: HashMap<(String, NaiveDate), Result<ActualObservation, ProviderError>>,
}

impl<'a> MemoizedActuals<'a> {
    pub fn new(source: &'a dyn ActualsSource) -> Self {
        Self {
            source,
            seen: HashMap::new(),
        }
    }

    pub async fn get(
        &mut self,
        location: &Location,
        date: NaiveDate,
    ) -> Result<ActualObservation, ProviderError> {
        let key = (location.id.clone(), date);
        if let Some(cached) = self.seen.get(&key) {
            tracing::debug!(location = %location.id, date = %date, "Actuals served from memo");
            return cached.clone();
        }

        let result = self.source.fetch_actual(location, date).await;
        self.seen.insert(key, result.clone());
        result
    }
}

pub struct Reconciler<'a> {
    config: &'a Config,
    registry: &'a LocationRegistry,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a Config, registry: &'a LocationRegistry) -> Self {
        Self { config, registry }
    }

    /// Score every (lead time, location, provider) whose forecast targets
    /// `today`.
    ///
    /// With `rescore` off an existing comparison is left alone and its
    /// actuals are not fetched. Only archive failures abort.
    pub async fn reconcile(
        &self,
        today: NaiveDate,
        providers: &[Provider],
        archive: &dyn ForecastArchive,
        actuals: &mut MemoizedActuals<'_>,
        results: &mut ResultsStore,
        rescore: bool,
    ) -> Result<PhaseReport, PersistenceError> {
        let mut report = PhaseReport::default();

        tracing::info!(
            today = %today,
            providers = ?providers,
            rescore,
            "Reconciling forecasts"
        );

        for lead_time in self.config.active_lead_times() {
            let issued = issued_date(today, lead_time);

            for location in self.registry.locations() {
                for &provider in providers {
                    let key = ForecastKey {
                        issued,
                        lead_time,
                        location_id: location.id.clone(),
                        provider,
                    };

                    let outcome = self
                        .reconcile_one(today, &key, location, archive, actuals, results, rescore)
                        .await?;

                    report.push(ItemOutcome {
                        location_id: location.id.clone(),
                        provider,
                        lead_time: Some(lead_time),
                        outcome,
                    });
                }
            }
        }

        Ok(report)
    }

    async fn reconcile_one(
        &self,
        today: NaiveDate,
        key: &ForecastKey,
        location: &Location,
        archive: &dyn ForecastArchive,
        actuals: &mut MemoizedActuals<'_>,
        results: &mut ResultsStore,
        rescore: bool,
    ) -> Result<Outcome, PersistenceError> {
        let Some(forecast) = archive.lookup(key)? else {
            tracing::debug!(
                location = %key.location_id,
                provider = %key.provider,
                lead_time = key.lead_time,
                issued = %key.issued,
                "No archived forecast"
            );
            return Ok(Outcome::NoArchivedForecast);
        };

        let comparison_key = ComparisonKey {
            target: today,
            lead_time: key.lead_time,
            location_id: key.location_id.clone(),
            provider: key.provider,
        };
        if !rescore && results.contains(&comparison_key) {
            tracing::debug!(
                location = %key.location_id,
                provider = %key.provider,
                lead_time = key.lead_time,
                target = %today,
                "Already scored"
            );
            return Ok(Outcome::AlreadyScored);
        }

        let actual = match actuals.get(location, today).await {
            Ok(actual) => actual,
            Err(e) => {
                tracing::warn!(
                    location = %key.location_id,
                    provider = %key.provider,
                    lead_time = key.lead_time,
                    target = %today,
                    error = %e,
                    "Actuals fetch failed, skipping"
                );
                return Ok(Outcome::FetchFailed {
                    reason: e.to_string(),
                });
            }
        };

        let comparison = score(&forecast, &actual, &self.config.tolerances, today);
        let accurate = comparison.accurate;
        tracing::info!(
            location = %key.location_id,
            provider = %key.provider,
            lead_time = key.lead_time,
            target = %today,
            accurate,
            scored_fields = comparison.scored_fields,
            "Scored forecast"
        );
        results.append(comparison);

        Ok(Outcome::Matched { accurate })
    }
}
