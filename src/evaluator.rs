//! Evaluation of pending forecasts against observed ground truth

use crate::error::{AccuracyError, Result};
use crate::ledger::{ForecastLedger, SaveOutcome};
use crate::record::{EvaluationDraft, ForecastEvaluation, ForecastIssuance};
use crate::tolerance::ToleranceConfig;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;

/// Smallest magnitude the actual value is clamped to when scaling the error
pub const RELATIVE_ERROR_FLOOR: f64 = 1e-9;

/// Why a pending forecast was left untouched by an evaluation pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The forecast's metric was outside the requested set
    FilteredOut,
    /// Ground truth has not caught up with the target time yet
    NotReady,
    /// Observations reach past the target but the target day itself is missing
    DataGap,
    /// A concurrent pass settled the forecast first
    AlreadyEvaluated,
}

/// What happened to one pending forecast
#[derive(Debug)]
pub enum EvaluationOutcome {
    /// The forecast was settled and its evaluation stored
    Evaluated(ForecastEvaluation),
    /// The forecast stays pending
    Skipped(SkipReason),
    /// The attempt failed; the forecast stays pending
    Failed(AccuracyError),
}

/// Counters for one metric over one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricCounts {
    /// Forecasts settled with a stored evaluation
    pub evaluated: usize,
    /// Forecasts left pending on purpose
    pub skipped: usize,
    /// Forecasts left pending because the attempt errored
    pub failed: usize,
}

/// Counters for every metric touched by a pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EvaluationSummary {
    /// Counts keyed by metric id
    pub per_metric: BTreeMap<String, MetricCounts>,
}

impl EvaluationSummary {
    fn counts_mut(&mut self, metric_id: &str) -> &mut MetricCounts {
        self.per_metric.entry(metric_id.to_string()).or_default()
    }

    /// Forecasts settled across all metrics
    pub fn total_evaluated(&self) -> usize {
        self.per_metric.values().map(|c| c.evaluated).sum()
    }

    /// Forecasts deliberately left pending across all metrics
    pub fn total_skipped(&self) -> usize {
        self.per_metric.values().map(|c| c.skipped).sum()
    }

    /// Failed evaluation attempts across all metrics
    pub fn total_failed(&self) -> usize {
        self.per_metric.values().map(|c| c.failed).sum()
    }
}

/// Settles pending forecasts once their ground truth is in.
///
/// One pass scans every pending forecast and evaluates those whose target
/// time the observation history has caught up with. A forecast whose
/// evaluation cannot proceed is skipped or marked failed without disturbing
/// the rest of the pass.
pub struct Evaluator<'a, L> {
    ledger: &'a L,
    tolerances: ToleranceConfig,
}

impl<'a, L: ForecastLedger> Evaluator<'a, L> {
    /// Create an evaluator on top of a ledger and tolerance settings
    pub fn new(ledger: &'a L, tolerances: ToleranceConfig) -> Self {
        Self { ledger, tolerances }
    }

    /// Evaluate every pending forecast
    pub fn evaluate_pending(&self) -> Result<EvaluationSummary> {
        self.run_pass(None)
    }

    /// Evaluate pending forecasts of the given metrics only.
    ///
    /// Forecasts outside the set still show up in the summary, counted as
    /// skipped under their own metric.
    pub fn evaluate_pending_for(&self, metrics: &[String]) -> Result<EvaluationSummary> {
        self.run_pass(Some(metrics))
    }

    fn run_pass(&self, metrics: Option<&[String]>) -> Result<EvaluationSummary> {
        let pending = self.ledger.list_pending(None, None)?;
        let mut summary = EvaluationSummary::default();

        for forecast in &pending {
            let selected = metrics.map_or(true, |m| m.iter().any(|id| *id == forecast.metric_id));
            let outcome = if selected {
                self.evaluate_forecast(forecast)
            } else {
                EvaluationOutcome::Skipped(SkipReason::FilteredOut)
            };

            let counts = summary.counts_mut(&forecast.metric_id);
            match outcome {
                EvaluationOutcome::Evaluated(_) => counts.evaluated += 1,
                EvaluationOutcome::Skipped(_) => counts.skipped += 1,
                EvaluationOutcome::Failed(err) => {
                    counts.failed += 1;
                    tracing::error!(
                        metric_id = %forecast.metric_id,
                        forecast_id = forecast.id,
                        target_time = %forecast.target_time,
                        error = %err,
                        "forecast evaluation failed, leaving forecast pending"
                    );
                }
            }
        }

        tracing::info!(
            scanned = pending.len(),
            evaluated = summary.total_evaluated(),
            skipped = summary.total_skipped(),
            failed = summary.total_failed(),
            "evaluation pass finished"
        );
        Ok(summary)
    }

    /// Evaluate one pending forecast.
    ///
    /// The forecast is settled only when the metric's observations have
    /// caught up with its target time and the target day holds a value. The
    /// store decides races: losing one reports an
    /// [`SkipReason::AlreadyEvaluated`] skip, never an error.
    pub fn evaluate_forecast(&self, forecast: &ForecastIssuance) -> EvaluationOutcome {
        match self.try_evaluate(forecast) {
            Ok(outcome) => outcome,
            Err(err) => EvaluationOutcome::Failed(err),
        }
    }

    fn try_evaluate(&self, forecast: &ForecastIssuance) -> Result<EvaluationOutcome> {
        let latest = self.ledger.latest_observation_timestamp(&forecast.metric_id)?;
        let ready = matches!(latest, Some(latest) if latest >= forecast.target_time);
        if !ready {
            return Ok(EvaluationOutcome::Skipped(SkipReason::NotReady));
        }

        let actual_value = match self
            .ledger
            .observation_value_at(&forecast.metric_id, forecast.target_time)?
        {
            Some(value) => value,
            None => {
                tracing::warn!(
                    metric_id = %forecast.metric_id,
                    forecast_id = forecast.id,
                    target_time = %forecast.target_time,
                    "no observation on the target day, leaving forecast pending"
                );
                return Ok(EvaluationOutcome::Skipped(SkipReason::DataGap));
            }
        };

        let error = actual_value - forecast.yhat;
        let relative_error = error.abs() / actual_value.abs().max(RELATIVE_ERROR_FLOOR);
        let tolerance = self.tolerances.resolve(&forecast.metric_id);
        let (within_tolerance, tolerance_used) = tolerance.check(error, relative_error);

        let draft = EvaluationDraft {
            metric_id: forecast.metric_id.clone(),
            target_time: forecast.target_time,
            actual_value,
            error,
            relative_error,
            within_tolerance,
            happened: within_tolerance,
            tolerance_used,
            evaluated_at: Utc::now(),
        };

        match self.ledger.save_evaluation(forecast.id, draft)? {
            SaveOutcome::Saved(evaluation) => {
                tracing::debug!(
                    metric_id = %evaluation.metric_id,
                    forecast_id = forecast.id,
                    error = evaluation.error,
                    within_tolerance = evaluation.within_tolerance,
                    "forecast evaluated"
                );
                Ok(EvaluationOutcome::Evaluated(evaluation))
            }
            SaveOutcome::AlreadyEvaluated => {
                Ok(EvaluationOutcome::Skipped(SkipReason::AlreadyEvaluated))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_totals_sum_over_metrics() {
        let mut summary = EvaluationSummary::default();
        summary.counts_mut("cpu_load").evaluated = 2;
        summary.counts_mut("cpu_load").skipped = 1;
        summary.counts_mut("disk_used").evaluated = 1;
        summary.counts_mut("disk_used").failed = 3;

        assert_eq!(summary.total_evaluated(), 3);
        assert_eq!(summary.total_skipped(), 1);
        assert_eq!(summary.total_failed(), 3);
    }
}
