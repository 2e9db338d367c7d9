//! Capabilities the tracker needs from the outside world.
//!
//! The HTTP clients in this crate implement them; tests substitute fakes.

use async_trait::async_trait;
use chrono::NaiveDate;
use tracker_core::{Location, ProviderError};

use crate::types::{ActualObservation, ForecastRecord, GridToken, Provider};

/// What to fetch from a forecast provider in one call.
#[derive(Debug, Clone, Copy)]
pub struct ForecastRequest<'a> {
    pub location: &'a Location,
    /// Date the forecasts are issued (the run date)
    pub issued: NaiveDate,
    pub lead_times: &'a [u32],
    /// Resolved addressing, present only for providers that need it
    pub grid: Option<&'a GridToken>,
}

impl ForecastRequest<'_> {
    /// Fails unless the provider's current forecast starts on the requested
    /// issue date. Rows from any other day would land under the wrong key.
    pub fn check_served(&self, served: NaiveDate) -> Result<(), ProviderError> {
        if served != self.issued {
            return Err(ProviderError::IssueDateMismatch {
                requested: self.issued,
                served,
            });
        }
        Ok(())
    }
}

#[async_trait]
pub trait ForecastSource: Send + Sync {
    fn provider(&self) -> Provider;

    /// Resolver for providers that address forecasts by grid cell.
    fn grid_resolver(&self) -> Option<&dyn GridResolver> {
        None
    }

    /// One record per requested lead time the provider covers. Lead times
    /// beyond the provider's horizon are left out rather than failing.
    async fn fetch_forecasts(
        &self,
        request: &ForecastRequest<'_>,
    ) -> Result<Vec<ForecastRecord>, ProviderError>;
}

/// Historical weather for a past date.
#[async_trait]
pub trait ActualsSource: Send + Sync {
    async fn fetch_actual(
        &self,
        location: &Location,
        date: NaiveDate,
    ) -> Result<ActualObservation, ProviderError>;
}

/// Resolves coordinates to a provider grid cell.
#[async_trait]
pub trait GridResolver: Send + Sync {
    async fn resolve_grid(&self, location: &Location) -> Result<GridToken, ProviderError>;
}
