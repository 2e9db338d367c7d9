//! Collection phase: fetch today's forecasts for every location and archive
//! them.

use chrono::NaiveDate;
use tracker_core::{Config, PersistenceError, ProviderError};
use tracker_weather::{ForecastRequest, ForecastSource, GridCache};

use crate::archive::ForecastArchive;
use crate::registry::LocationRegistry;
use crate::report::{ItemOutcome, Outcome, PhaseReport};

pub struct Collector<'a> {
    config: &'a Config,
    registry: &'a LocationRegistry,
}

impl<'a> Collector<'a> {
    pub fn new(config: &'a Config, registry: &'a LocationRegistry) -> Self {
        Self { config, registry }
    }

    /// Fetch and archive forecasts issued on `issued` from every source.
    ///
    /// Provider and grid failures become outcomes; only archive failures
    /// abort. A provider whose current forecast was not issued on `issued`
    /// is skipped, so a late or back-dated run never overwrites records
    /// under the wrong key.
    pub async fn collect(
        &self,
        issued: NaiveDate,
        sources: &[&dyn ForecastSource],
        grid_cache: &mut GridCache,
        archive: &dyn ForecastArchive,
    ) -> Result<PhaseReport, PersistenceError> {
        let lead_times = self.config.active_lead_times();
        let mut report = PhaseReport::default();

        tracing::info!(
            issued = %issued,
            locations = self.registry.len(),
            sources = sources.len(),
            "Collecting forecasts"
        );

        for location in self.registry.locations() {
            for source in sources {
                let provider = source.provider();

                let grid = match source.grid_resolver() {
                    Some(resolver) => match grid_cache.resolve(location, resolver).await {
                        Ok(token) => Some(token),
                        Err(e) => {
                            tracing::warn!(
                                location = %location.id,
                                provider = %provider,
                                issued = %issued,
                                error = %e,
                                "Skipping location, grid resolution failed"
                            );
                            report.push(ItemOutcome {
                                location_id: location.id.clone(),
                                provider,
                                lead_time: None,
                                outcome: Outcome::ResolutionFailed {
                                    reason: e.to_string(),
                                },
                            });
                            continue;
                        }
                    },
                    None => None,
                };

                let request = ForecastRequest {
                    location,
                    issued,
                    lead_times: &lead_times,
                    grid: grid.as_ref(),
                };

                let outcome = match source.fetch_forecasts(&request).await {
                    Ok(records) => {
                        for record in &records {
                            archive.record(record)?;
                        }
                        tracing::info!(
                            location = %location.id,
                            provider = %provider,
                            issued = %issued,
                            records = records.len(),
                            "Archived forecasts"
                        );
                        Outcome::Archived {
                            count: records.len(),
                        }
                    }
                    Err(ProviderError::IssueDateMismatch { served, .. }) => {
                        tracing::warn!(
                            location = %location.id,
                            provider = %provider,
                            issued = %issued,
                            served = %served,
                            "Provider is not serving a forecast issued on the run date, skipping"
                        );
                        Outcome::IssueDateMismatch { served }
                    }
                    Err(e) => {
                        tracing::warn!(
                            location = %location.id,
                            provider = %provider,
                            issued = %issued,
                            lead_times = ?lead_times,
                            error = %e,
                            "Forecast fetch failed, skipping"
                        );
                        Outcome::FetchFailed {
                            reason: e.to_string(),
                        }
                    }
                };

                report.push(ItemOutcome {
                    location_id: location.id.clone(),
                    provider,
                    lead_time: None,
                    outcome,
                });
            }
        }

        Ok(report)
    }
}
