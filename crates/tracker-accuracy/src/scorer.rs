//! Fixed-tolerance scoring of a forecast against the observed weather.
//!
//! Scoring never fails. A field missing on either side is recorded as
//! [`FieldVerdict::NotApplicable`] and left out of the overall verdict.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracker_core::Tolerances;
use tracker_weather::{ActualObservation, ForecastRecord, Provider, WeatherCondition};

/// Absorbs float noise such as 70.3 - 67.0 landing a hair above 3.3.
/// Differences up to `tolerance + TEMP_EPSILON` count as accurate.
const TEMP_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldVerdict {
    Accurate,
    Inaccurate,
    NotApplicable,
}

impl FieldVerdict {
    fn from_bool(accurate: bool) -> Self {
        if accurate {
            Self::Accurate
        } else {
            Self::Inaccurate
        }
    }

    pub fn is_scored(&self) -> bool {
        !matches!(self, Self::NotApplicable)
    }

    pub fn is_accurate(&self) -> bool {
        matches!(self, Self::Accurate)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureScore {
    pub predicted: Option<f64>,
    pub actual: Option<f64>,
    /// predicted - actual, rounded to 0.1 °F
    pub diff: Option<f64>,
    pub verdict: FieldVerdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrecipitationScore {
    pub predicted_amount: Option<f64>,
    pub actual_amount: Option<f64>,
    /// Measurable precipitation predicted
    pub predicted: Option<bool>,
    /// Measurable precipitation observed
    pub actual: Option<bool>,
    pub verdict: FieldVerdict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionScore {
    pub predicted: Option<WeatherCondition>,
    pub actual: Option<WeatherCondition>,
    pub verdict: FieldVerdict,
    /// Whether the verdict took part in the overall result
    pub counted: bool,
}

/// Identity of a scored comparison. One stored comparison per key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComparisonKey {
    pub target: NaiveDate,
    pub lead_time: u32,
    pub location_id: String,
    pub provider: Provider,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredComparison {
    pub location_id: String,
    pub provider: Provider,
    pub lead_time: u32,
    pub issued: NaiveDate,
    pub target: NaiveDate,
    /// Run date that produced this comparison
    pub scored_on: NaiveDate,
    pub high: TemperatureScore,
    pub low: TemperatureScore,
    pub precipitation: PrecipitationScore,
    pub condition: ConditionScore,
    /// All scored fields accurate, and at least one field scored
    pub accurate: bool,
    pub scored_fields: u32,
    pub accurate_fields: u32,
}

impl ScoredComparison {
    pub fn key(&self) -> ComparisonKey {
        ComparisonKey {
            target: self.target,
            lead_time: self.lead_time,
            location_id: self.location_id.clone(),
            provider: self.provider,
        }
    }

    pub fn has_scored_fields(&self) -> bool {
        self.scored_fields > 0
    }
}

pub fn score_temperature(
    predicted: Option<f64>,
    actual: Option<f64>,
    tolerance: f64,
) -> TemperatureScore {
    match (predicted, actual) {
        (Some(p), Some(a)) => {
            let diff = p - a;
            TemperatureScore {
                predicted,
                actual,
                diff: Some((diff * 10.0).round() / 10.0),
                verdict: FieldVerdict::from_bool(diff.abs() <= tolerance + TEMP_EPSILON),
            }
        }
        _ => TemperatureScore {
            predicted,
            actual,
            diff: None,
            verdict: FieldVerdict::NotApplicable,
        },
    }
}

/// `amount > threshold` is measurable precipitation; exactly at the threshold is not.
pub fn is_measurable(amount: f64, threshold: f64) -> bool {
    amount > threshold
}

pub fn score_precipitation(
    predicted_amount: Option<f64>,
    actual_amount: Option<f64>,
    threshold: f64,
) -> PrecipitationScore {
    let predicted = predicted_amount.map(|a| is_measurable(a, threshold));
    let actual = actual_amount.map(|a| is_measurable(a, threshold));
    let verdict = match (predicted, actual) {
        (Some(p), Some(a)) => FieldVerdict::from_bool(p == a),
        _ => FieldVerdict::NotApplicable,
    };

    PrecipitationScore {
        predicted_amount,
        actual_amount,
        predicted,
        actual,
        verdict,
    }
}

pub fn score_condition(
    predicted: Option<WeatherCondition>,
    actual: Option<WeatherCondition>,
    counted: bool,
) -> ConditionScore {
    let known = |c: Option<WeatherCondition>| c.filter(|c| *c != WeatherCondition::Unknown);
    let verdict = match (known(predicted), known(actual)) {
        (Some(p), Some(a)) => FieldVerdict::from_bool(p == a),
        _ => FieldVerdict::NotApplicable,
    };

    ConditionScore {
        predicted,
        actual,
        verdict,
        counted,
    }
}

/// Compare `forecast` with what was observed on its target date.
pub fn score(
    forecast: &ForecastRecord,
    actual: &ActualObservation,
    tolerances: &Tolerances,
    scored_on: NaiveDate,
) -> ScoredComparison {
    let high = score_temperature(forecast.high, actual.high, tolerances.temp_high);
    let low = score_temperature(forecast.low, actual.low, tolerances.temp_low);
    let precipitation = score_precipitation(
        forecast.precipitation,
        actual.precipitation,
        tolerances.precip_threshold,
    );
    let condition = score_condition(forecast.condition, actual.condition, tolerances.score_condition);

    let mut verdicts = vec![high.verdict, low.verdict, precipitation.verdict];
    if condition.counted {
        verdicts.push(condition.verdict);
    }
    let scored_fields = verdicts.iter().filter(|v| v.is_scored()).count() as u32;
    let accurate_fields = verdicts.iter().filter(|v| v.is_accurate()).count() as u32;

    ScoredComparison {
        location_id: forecast.location_id.clone(),
        provider: forecast.provider,
        lead_time: forecast.lead_time,
        issued: forecast.issued,
        target: forecast.target,
        scored_on,
        high,
        low,
        precipitation,
        condition,
        accurate: scored_fields > 0 && accurate_fields == scored_fields,
        scored_fields,
        accurate_fields,
    }
}
