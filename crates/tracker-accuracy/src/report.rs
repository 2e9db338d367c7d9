//! Per-item outcomes and the run report built from them.

use chrono::NaiveDate;
use serde::Serialize;
use tracker_weather::Provider;
use uuid::Uuid;

/// What happened to one unit of work. Skips are outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    /// Collection stored `count` forecast records
    Archived { count: usize },
    /// Reconciliation scored a forecast
    Matched { accurate: bool },
    /// A comparison already exists and re-scoring was not requested
    AlreadyScored,
    /// No forecast was archived for the lookback key (warm-up)
    NoArchivedForecast,
    /// The provider is serving a forecast issued on `served`, not the run
    /// date; nothing was archived
    IssueDateMismatch { served: NaiveDate },
    FetchFailed { reason: String },
    ResolutionFailed { reason: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::FetchFailed { .. } | Self::ResolutionFailed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemOutcome {
    pub location_id: String,
    pub provider: Provider,
    /// Absent for collection, which covers every lead time in one request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_time: Option<u32>,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub archived_items: usize,
    pub archived_records: usize,
    pub matched: usize,
    pub matched_accurate: usize,
    pub already_scored: usize,
    pub no_archived_forecast: usize,
    pub issue_date_mismatch: usize,
    pub fetch_failed: usize,
    pub resolution_failed: usize,
}

impl OutcomeCounts {
    pub fn add(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Archived { count } => {
                self.archived_items += 1;
                self.archived_records += count;
            }
            Outcome::Matched { accurate } => {
                self.matched += 1;
                if *accurate {
                    self.matched_accurate += 1;
                }
            }
            Outcome::AlreadyScored => self.already_scored += 1,
            Outcome::NoArchivedForecast => self.no_archived_forecast += 1,
            Outcome::IssueDateMismatch { .. } => self.issue_date_mismatch += 1,
            Outcome::FetchFailed { .. } => self.fetch_failed += 1,
            Outcome::ResolutionFailed { .. } => self.resolution_failed += 1,
        }
    }

    pub fn failures(&self) -> usize {
        self.fetch_failed + self.resolution_failed
    }
}

/// Outcomes of one phase, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PhaseReport {
    pub counts: OutcomeCounts,
    pub items: Vec<ItemOutcome>,
}

impl PhaseReport {
    pub fn push(&mut self, item: ItemOutcome) {
        self.counts.add(&item.outcome);
        self.items.push(item);
    }

    /// Work was attempted and every item failed.
    pub fn is_total_failure(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.outcome.is_failure())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub as_of: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<PhaseReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconciliation: Option<PhaseReport>,
}

impl RunReport {
    pub fn new(as_of: NaiveDate) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            as_of,
            collection: None,
            reconciliation: None,
        }
    }

    /// Share of comparisons scored in this run that were accurate.
    pub fn new_accuracy_rate(&self) -> Option<f64> {
        let counts = &self.reconciliation.as_ref()?.counts;
        if counts.matched == 0 {
            return None;
        }
        Some(counts.matched_accurate as f64 / counts.matched as f64)
    }

    /// Every fetch the run depended on failed.
    ///
    /// When collection ran it decides alone: actuals for the run date often
    /// lag, so a daily run that archived forecasts has made progress. A
    /// reconcile-only run is an outage when it needed actuals and every
    /// fetch failed.
    pub fn is_total_outage(&self) -> bool {
        match (&self.collection, &self.reconciliation) {
            (Some(collection), _) => collection.is_total_failure(),
            (None, Some(reconciliation)) => {
                reconciliation.counts.fetch_failed > 0 && reconciliation.counts.matched == 0
            }
            (None, None) => false,
        }
    }

    pub fn log_summary(&self) {
        if let Some(c) = &self.collection {
            tracing::info!(
                run_id = %self.run_id,
                as_of = %self.as_of,
                archived = c.counts.archived_records,
                issue_date_mismatch = c.counts.issue_date_mismatch,
                fetch_failed = c.counts.fetch_failed,
                resolution_failed = c.counts.resolution_failed,
                "Collection finished"
            );
        }
        if let Some(r) = &self.reconciliation {
            tracing::info!(
                run_id = %self.run_id,
                as_of = %self.as_of,
                matched = r.counts.matched,
                accurate = r.counts.matched_accurate,
                already_scored = r.counts.already_scored,
                no_archived_forecast = r.counts.no_archived_forecast,
                fetch_failed = r.counts.fetch_failed,
                "Reconciliation finished"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    fn item(outcome: Outcome) -> ItemOutcome {
        ItemOutcome {
            location_id: "KDFW".into(),
            provider: Provider::OpenMeteo,
            lead_time: None,
            outcome,
        }
    }

    #[test]
    fn counts_by_kind() {
        let mut phase = PhaseReport::default();
        phase.push(item(Outcome::Archived { count: 4 }));
        phase.push(item(Outcome::Archived { count: 2 }));
        phase.push(item(Outcome::FetchFailed { reason: "timeout".into() }));

        assert_eq!(phase.counts.archived_items, 2);
        assert_eq!(phase.counts.archived_records, 6);
        assert_eq!(phase.counts.failures(), 1);
        assert!(!phase.is_total_failure());
    }

    #[test]
    fn total_failure_needs_attempted_work() {
        let mut phase = PhaseReport::default();
        assert!(!phase.is_total_failure());

        phase.push(item(Outcome::ResolutionFailed { reason: "no grid".into() }));
        phase.push(item(Outcome::FetchFailed { reason: "503".into() }));
        assert!(phase.is_total_failure());
    }

    #[test]
    fn new_accuracy_rate() {
        let mut report = RunReport::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        assert_eq!(report.new_accuracy_rate(), None);

        let mut phase = PhaseReport::default();
        phase.push(item(Outcome::Matched { accurate: true }));
        phase.push(item(Outcome::Matched { accurate: false }));
        phase.push(item(Outcome::NoArchivedForecast));
        report.reconciliation = Some(phase);

        assert_eq!(report.new_accuracy_rate(), Some(0.5));
        assert!(!report.is_total_outage());
    }

    #[test]
    fn reconcile_only_outage_when_every_actuals_fetch_fails() {
        let mut report = RunReport::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        let mut phase = PhaseReport::default();
        phase.push(item(Outcome::NoArchivedForecast));
        report.reconciliation = Some(phase.clone());
        assert!(!report.is_total_outage());

        phase.push(item(Outcome::FetchFailed { reason: "timeout".into() }));
        phase.push(item(Outcome::FetchFailed { reason: "timeout".into() }));
        report.reconciliation = Some(phase.clone());
        assert!(report.is_total_outage());

        phase.push(item(Outcome::Matched { accurate: true }));
        report.reconciliation = Some(phase);
        assert!(!report.is_total_outage());
    }

    #[test]
    fn collection_decides_outage_when_it_ran() {
        let mut report = RunReport::new(NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
        let mut collection = PhaseReport::default();
        collection.push(item(Outcome::Archived { count: 3 }));
        let mut reconciliation = PhaseReport::default();
        reconciliation.push(item(Outcome::FetchFailed { reason: "no data".into() }));
        report.collection = Some(collection);
        report.reconciliation = Some(reconciliation);

        assert!(!report.is_total_outage());
    }

    #[test]
    fn issue_date_mismatch_is_not_a_failure() {
        let mut phase = PhaseReport::default();
        phase.push(item(Outcome::IssueDateMismatch {
            served: NaiveDate::from_ymd_opt(2026, 10, 19).unwrap(),
        }));

        assert_eq!(phase.counts.issue_date_mismatch, 1);
        assert_eq!(phase.counts.failures(), 0);
        assert!(!phase.is_total_failure());
    }

    #[test]
    fn outcome_serializes_tagged() {
        let json = serde_json::to_value(item(Outcome::Archived { count: 3 })).unwrap();
        assert_eq!(json["kind"], "archived");
        assert_eq!(json["count"], 3);
        assert_eq!(json["location_id"], "KDFW");
    }
}
