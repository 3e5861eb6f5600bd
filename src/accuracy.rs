//! Windowed accuracy summaries bucketed by forecast horizon

use crate::error::Result;
use crate::ledger::ForecastLedger;
use crate::record::ForecastEvaluation;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// How many days back a summary looks when no window is given
pub const DEFAULT_WINDOW_DAYS: u32 = 90;

/// A labelled, inclusive range of horizon steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HorizonBucket {
    /// Label the bucket is reported under
    pub label: String,
    /// Smallest horizon in the bucket
    pub min_steps: u32,
    /// Largest horizon in the bucket; unbounded when absent
    pub max_steps: Option<u32>,
}

impl HorizonBucket {
    /// Create a bucket
    pub fn new(label: impl Into<String>, min_steps: u32, max_steps: Option<u32>) -> Self {
        Self {
            label: label.into(),
            min_steps,
            max_steps,
        }
    }

    /// Whether a horizon falls in this bucket, both bounds inclusive
    pub fn contains(&self, horizon_steps: u32) -> bool {
        horizon_steps >= self.min_steps
            && self.max_steps.map_or(true, |max| horizon_steps <= max)
    }
}

/// Short, medium and long range buckets used when none are given
pub fn default_horizon_buckets() -> Vec<HorizonBucket> {
    vec![
        HorizonBucket::new("1-7", 1, Some(7)),
        HorizonBucket::new("8-30", 8, Some(30)),
        HorizonBucket::new("31+", 31, None),
    ]
}

/// Aggregate accuracy numbers over a set of evaluations.
///
/// The ratio fields are absent rather than zero when nothing was evaluated,
/// so "no data" stays distinguishable from "everything was wrong".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyStats {
    /// Number of evaluations aggregated
    pub num_forecasts: usize,
    /// Evaluations that fell within tolerance
    pub num_correct: usize,
    /// Share of evaluations within tolerance
    pub accuracy: Option<f64>,
    /// Mean absolute error
    pub mae: Option<f64>,
    /// Mean relative error
    pub mape: Option<f64>,
}

fn stats_over<'a, I>(evaluations: I) -> AccuracyStats
where
    I: Iterator<Item = &'a ForecastEvaluation>,
{
    let mut num_forecasts = 0;
    let mut num_correct = 0;
    let mut abs_errors = Vec::new();
    let mut rel_errors = Vec::new();

    for evaluation in evaluations {
        num_forecasts += 1;
        if evaluation.within_tolerance {
            num_correct += 1;
        }
        abs_errors.push(evaluation.error.abs());
        rel_errors.push(evaluation.relative_error);
    }

    if num_forecasts == 0 {
        return AccuracyStats {
            num_forecasts: 0,
            num_correct: 0,
            accuracy: None,
            mae: None,
            mape: None,
        };
    }

    AccuracyStats {
        num_forecasts,
        num_correct,
        accuracy: Some(num_correct as f64 / num_forecasts as f64),
        mae: Some(abs_errors.iter().mean()),
        mape: Some(rel_errors.iter().mean()),
    }
}

/// Accuracy of one bucket of horizons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizonBucketStats {
    /// Label of the bucket
    pub horizon_range: String,
    /// Aggregates over the bucket's evaluations
    #[serde(flatten)]
    pub stats: AccuracyStats,
}

/// Accuracy of one metric over a trailing window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    /// Metric the summary is about
    pub metric_id: String,
    /// Length of the trailing window in days
    pub window_days: u32,
    /// Aggregates over every evaluation in the window
    pub overall: AccuracyStats,
    /// Aggregates split by horizon bucket
    pub by_horizon: Vec<HorizonBucketStats>,
}

/// Summarize a metric's accuracy over the default trailing window.
///
/// Uses [`DEFAULT_WINDOW_DAYS`] and [`default_horizon_buckets`], anchored at
/// the current time.
pub fn compute_accuracy_summary<L: ForecastLedger>(
    ledger: &L,
    metric_id: &str,
) -> Result<AccuracySummary> {
    compute_accuracy_summary_with_params(
        ledger,
        metric_id,
        DEFAULT_WINDOW_DAYS,
        &default_horizon_buckets(),
        Utc::now(),
    )
}

/// Summarize a metric's accuracy with full control over window, buckets and
/// anchor time.
///
/// The window keeps evaluations performed within `window_days` before
/// `as_of`. Buckets are evaluated independently; overlapping or gapped
/// bucket sets are reported as given.
pub fn compute_accuracy_summary_with_params<L: ForecastLedger>(
    ledger: &L,
    metric_id: &str,
    window_days: u32,
    buckets: &[HorizonBucket],
    as_of: DateTime<Utc>,
) -> Result<AccuracySummary> {
    let cutoff = as_of - Duration::days(i64::from(window_days));
    let evaluations = ledger.evaluations_since(metric_id, cutoff)?;

    let overall = stats_over(evaluations.iter().map(|(e, _)| e));
    let by_horizon = buckets
        .iter()
        .map(|bucket| HorizonBucketStats {
            horizon_range: bucket.label.clone(),
            stats: stats_over(
                evaluations
                    .iter()
                    .filter(|(_, horizon)| bucket.contains(*horizon))
                    .map(|(e, _)| e),
            ),
        })
        .collect();

    tracing::debug!(
        metric_id = %metric_id,
        window_days,
        num_forecasts = overall.num_forecasts,
        "computed accuracy summary"
    );

    Ok(AccuracySummary {
        metric_id: metric_id.to_string(),
        window_days,
        overall,
        by_horizon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_bounds_are_inclusive() {
        let bucket = HorizonBucket::new("8-30", 8, Some(30));

        assert!(!bucket.contains(7));
        assert!(bucket.contains(8));
        assert!(bucket.contains(30));
        assert!(!bucket.contains(31));
    }

    #[test]
    fn unbounded_bucket_has_no_upper_limit() {
        let bucket = HorizonBucket::new("31+", 31, None);

        assert!(!bucket.contains(30));
        assert!(bucket.contains(31));
        assert!(bucket.contains(10_000));
    }
}
