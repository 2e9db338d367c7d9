//! Scored comparisons and their summary, persisted as `results.json` for the
//! dashboard.
//!
//! The summary is always recomputed from the full comparison list; it is never
//! updated incrementally.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracker_core::persist::{load_json, save_json_atomic};
use tracker_core::PersistenceError;

use crate::scorer::{ComparisonKey, FieldVerdict, ScoredComparison};

pub const RESULTS_SCHEMA_VERSION: u32 = 1;

/// Accuracy counts for one slice of the comparisons. Rates are fractions in
/// `0.0..=1.0`, `None` when nothing in the slice was scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub total: u32,
    pub scored: u32,
    pub accurate: u32,
    pub accuracy_rate: Option<f64>,
    pub temp_high_rate: Option<f64>,
    pub temp_low_rate: Option<f64>,
    pub precipitation_rate: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Summary {
    pub overall: Bucket,
    pub by_lead_time: BTreeMap<u32, Bucket>,
    pub by_location: BTreeMap<String, Bucket>,
    pub by_provider: BTreeMap<String, Bucket>,
    pub by_lead_time_location: BTreeMap<u32, BTreeMap<String, Bucket>>,
}

#[derive(Debug, Default, Clone, Copy)]
struct FieldTally {
    scored: u32,
    accurate: u32,
}

impl FieldTally {
    fn add(&mut self, verdict: FieldVerdict) {
        if verdict.is_scored() {
            self.scored += 1;
        }
        if verdict.is_accurate() {
            self.accurate += 1;
        }
    }
}

#[derive(Debug, Default, Clone)]
struct Tally {
    total: u32,
    scored: u32,
    accurate: u32,
    high: FieldTally,
    low: FieldTally,
    precipitation: FieldTally,
}

impl Tally {
    fn add(&mut self, c: &ScoredComparison) {
        self.total += 1;
        if c.has_scored_fields() {
            self.scored += 1;
            if c.accurate {
                self.accurate += 1;
            }
        }
        self.high.add(c.high.verdict);
        self.low.add(c.low.verdict);
        self.precipitation.add(c.precipitation.verdict);
    }

    fn finish(&self) -> Bucket {
        Bucket {
            total: self.total,
            scored: self.scored,
            accurate: self.accurate,
            accuracy_rate: rate(self.accurate, self.scored),
            temp_high_rate: rate(self.high.accurate, self.high.scored),
            temp_low_rate: rate(self.low.accurate, self.low.scored),
            precipitation_rate: rate(self.precipitation.accurate, self.precipitation.scored),
        }
    }
}

fn rate(accurate: u32, scored: u32) -> Option<f64> {
    if scored == 0 {
        return None;
    }
    let r = f64::from(accurate) / f64::from(scored);
    Some((r * 10_000.0).round() / 10_000.0)
}

/// Recompute every summary slice from `comparisons`.
pub fn summarize<'a, I>(comparisons: I) -> Summary
where
    I: IntoIterator<Item = &'a ScoredComparison>,
{
    let mut overall = Tally::default();
    let mut by_lead_time: BTreeMap<u32, Tally> = BTreeMap::new();
    let mut by_location: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_provider: BTreeMap<String, Tally> = BTreeMap::new();
    let mut by_lead_time_location: BTreeMap<u32, BTreeMap<String, Tally>> = BTreeMap::new();

    for c in comparisons {
        overall.add(c);
        by_lead_time.entry(c.lead_time).or_default().add(c);
        by_location.entry(c.location_id.clone()).or_default().add(c);
        by_provider
            .entry(c.provider.as_str().to_string())
            .or_default()
            .add(c);
        by_lead_time_location
            .entry(c.lead_time)
            .or_default()
            .entry(c.location_id.clone())
            .or_default()
            .add(c);
    }

    Summary {
        overall: overall.finish(),
        by_lead_time: by_lead_time.into_iter().map(|(k, t)| (k, t.finish())).collect(),
        by_location: by_location.into_iter().map(|(k, t)| (k, t.finish())).collect(),
        by_provider: by_provider.into_iter().map(|(k, t)| (k, t.finish())).collect(),
        by_lead_time_location: by_lead_time_location
            .into_iter()
            .map(|(lead, locs)| (lead, locs.into_iter().map(|(k, t)| (k, t.finish())).collect()))
            .collect(),
    }
}

/// On-disk layout of `results.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub schema_version: u32,
    pub last_updated: Option<NaiveDate>,
    #[serde(default)]
    pub comparisons: Vec<ScoredComparison>,
    #[serde(default)]
    pub summary: Summary,
}

impl Default for ResultsFile {
    fn default() -> Self {
        Self {
            schema_version: RESULTS_SCHEMA_VERSION,
            last_updated: None,
            comparisons: Vec::new(),
            summary: Summary::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Inserted,
    Replaced,
}

#[derive(Debug)]
pub struct ResultsStore {
    path: PathBuf,
    last_updated: Option<NaiveDate>,
    comparisons: BTreeMap<ComparisonKey, ScoredComparison>,
}

impl ResultsStore {
    pub fn load(path: &Path) -> Result<Self, PersistenceError> {
        let file: ResultsFile = load_json(path)?;
        if file.schema_version > RESULTS_SCHEMA_VERSION {
            return Err(PersistenceError::corrupt(
                path,
                format!("unsupported schema version {}", file.schema_version),
            ));
        }

        let before = file.comparisons.len();
        let comparisons: BTreeMap<ComparisonKey, ScoredComparison> =
            file.comparisons.into_iter().map(|c| (c.key(), c)).collect();
        if comparisons.len() != before {
            tracing::warn!(
                path = %path.display(),
                dropped = before - comparisons.len(),
                "Collapsed duplicate comparisons in results file"
            );
        }

        tracing::debug!(path = %path.display(), comparisons = comparisons.len(), "Loaded results");
        Ok(Self {
            path: path.to_path_buf(),
            last_updated: file.last_updated,
            comparisons,
        })
    }

    pub fn contains(&self, key: &ComparisonKey) -> bool {
        self.comparisons.contains_key(key)
    }

    /// Upsert by key: reconciling the same item twice keeps one entry.
    pub fn append(&mut self, comparison: ScoredComparison) -> AppendOutcome {
        match self.comparisons.insert(comparison.key(), comparison) {
            Some(_) => AppendOutcome::Replaced,
            None => AppendOutcome::Inserted,
        }
    }

    /// Sorted by (target date, lead time, location, provider).
    pub fn comparisons(&self) -> impl Iterator<Item = &ScoredComparison> {
        self.comparisons.values()
    }

    pub fn len(&self) -> usize {
        self.comparisons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comparisons.is_empty()
    }

    pub fn last_updated(&self) -> Option<NaiveDate> {
        self.last_updated
    }

    pub fn summarize(&self) -> Summary {
        summarize(self.comparisons.values())
    }

    /// Write the file with a freshly computed summary.
    pub fn save(&mut self, as_of: NaiveDate) -> Result<(), PersistenceError> {
        self.last_updated = Some(self.last_updated.map_or(as_of, |d| d.max(as_of)));

        let file = ResultsFile {
            schema_version: RESULTS_SCHEMA_VERSION,
            last_updated: self.last_updated,
            comparisons: self.comparisons.values().cloned().collect(),
            summary: self.summarize(),
        };
        save_json_atomic(&self.path, &file)?;

        tracing::info!(
            path = %self.path.display(),
            comparisons = file.comparisons.len(),
            "Saved results"
        );
        Ok(())
    }
}
