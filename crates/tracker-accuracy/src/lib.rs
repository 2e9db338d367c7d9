//! Forecast accuracy tracking
//!
//! Archives each day's forecasts, scores them against the observed weather
//! once their target date arrives, and keeps the results file the dashboard
//! reads.

pub mod archive;
pub mod collect;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod results;
pub mod run;
pub mod scorer;

pub use archive::{ForecastArchive, SqliteForecastArchive};
pub use collect::Collector;
pub use reconcile::{MemoizedActuals, Reconciler};
pub use registry::LocationRegistry;
pub use report::{ItemOutcome, Outcome, OutcomeCounts, PhaseReport, RunReport};
pub use results::{AppendOutcome, Bucket, ResultsFile, ResultsStore, Summary};
pub use run::{scoring_providers, RunMode, Tracker};
pub use scorer::{score, ComparisonKey, FieldVerdict, ScoredComparison};
