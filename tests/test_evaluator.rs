use assert_approx_eq::assert_approx_eq;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use forecast_accuracy::error::{AccuracyError, Result};
use forecast_accuracy::evaluator::{EvaluationOutcome, Evaluator, SkipReason};
use forecast_accuracy::ledger::{
    ForecastLedger, HistoryEntry, HistoryQuery, MemoryLedger, ObservationStore, SaveOutcome,
};
use forecast_accuracy::observations::Observation;
use forecast_accuracy::record::{
    EvaluationDraft, ForecastEvaluation, ForecastId, ForecastIssuance, IssuanceDraft,
};
use forecast_accuracy::tolerance::{Tolerance, ToleranceConfig};
use rstest::rstest;

/// Record one three-day-ahead forecast targeting the given January day
fn record_forecast(ledger: &impl ForecastLedger, metric: &str, target_day: u32, yhat: f64) {
    let draft = IssuanceDraft::new(
        metric,
        "v1",
        Utc.with_ymd_and_hms(2024, 1, target_day - 3, 6, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 1, target_day, 0, 0, 0).unwrap(),
        3,
        yhat,
    );
    ledger.record_issuances(&[draft]).unwrap();
}

/// Store an observed value for the given January day
fn observe(ledger: &impl ForecastLedger, metric: &str, day: u32, value: f64) {
    let ds = NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
    ledger.add_observations(metric, &[Observation::new(ds, value)]).unwrap();
}

#[test]
fn test_forecast_without_ground_truth_stays_pending() {
    let ledger = MemoryLedger::new();
    record_forecast(&ledger, "cpu_load", 10, 95.0);

    let evaluator = Evaluator::new(&ledger, ToleranceConfig::new());
    let summary = evaluator.evaluate_pending().unwrap();

    assert_eq!(summary.total_evaluated(), 0);
    assert_eq!(summary.total_skipped(), 1);
    assert_eq!(ledger.list_pending(None, None).unwrap().len(), 1);
}

#[test]
fn test_forecast_is_settled_once_ground_truth_catches_up() {
    let ledger = MemoryLedger::new();
    record_forecast(&ledger, "cpu_load", 10, 95.0);
    observe(&ledger, "cpu_load", 9, 98.0);

    let evaluator = Evaluator::new(&ledger, ToleranceConfig::new());

    // Observations end the day before the target
    let early = evaluator.evaluate_pending().unwrap();
    assert_eq!(early.total_evaluated(), 0);
    assert_eq!(early.total_skipped(), 1);

    observe(&ledger, "cpu_load", 10, 100.0);
    let late = evaluator.evaluate_pending().unwrap();
    assert_eq!(late.total_evaluated(), 1);
    assert!(ledger.list_pending(None, None).unwrap().is_empty());
}

#[test]
fn test_missing_target_day_is_a_data_gap() {
    let ledger = MemoryLedger::new();
    record_forecast(&ledger, "cpu_load", 10, 95.0);
    observe(&ledger, "cpu_load", 9, 98.0);
    observe(&ledger, "cpu_load", 11, 101.0);

    let evaluator = Evaluator::new(&ledger, ToleranceConfig::new());
    let pending = ledger.list_pending(None, None).unwrap();
    let outcome = evaluator.evaluate_forecast(&pending[0]);

    assert!(matches!(outcome, EvaluationOutcome::Skipped(SkipReason::DataGap)));
    assert_eq!(ledger.list_pending(None, None).unwrap().len(), 1);
}

// An actual of 100 against a forecast of 95 is off by exactly five percent
#[rstest]
#[case(0.05, true)]
#[case(0.04, false)]
fn test_relative_tolerance_decides_the_verdict(#[case] bound: f64, #[case] expected_within: bool) {
    let ledger = MemoryLedger::new();
    record_forecast(&ledger, "cpu_load", 10, 95.0);
    observe(&ledger, "cpu_load", 10, 100.0);

    let mut tolerances = ToleranceConfig::new();
    tolerances.insert("cpu_load", Tolerance::rel(bound));

    let evaluator = Evaluator::new(&ledger, tolerances);
    let summary = evaluator.evaluate_pending().unwrap();
    assert_eq!(summary.total_evaluated(), 1);

    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let evaluations = ledger.evaluations_since("cpu_load", since).unwrap();
    let stored = &evaluations[0].0;

    assert_eq!(stored.actual_value, 100.0);
    assert_eq!(stored.error, 5.0);
    assert_approx_eq!(stored.relative_error, 0.05, 1e-12);
    assert_eq!(stored.within_tolerance, expected_within);
    assert_eq!(stored.happened, expected_within);
    assert_eq!(stored.tolerance_used, Some(bound));
}

#[test]
fn test_absolute_bound_decides_when_both_are_set() {
    let ledger = MemoryLedger::new();
    record_forecast(&ledger, "cpu_load", 10, 95.0);
    observe(&ledger, "cpu_load", 10, 100.0);

    // The error of 5.0 passes the generous relative bound but not the
    // absolute one, and the absolute one has the final say
    let mut tolerances = ToleranceConfig::new();
    tolerances.insert(
        "cpu_load",
        Tolerance {
            tolerance_abs: Some(2.0),
            tolerance_rel: Some(0.06),
        },
    );

    let evaluator = Evaluator::new(&ledger, tolerances);
    evaluator.evaluate_pending().unwrap();

    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let stored = &ledger.evaluations_since("cpu_load", since).unwrap()[0].0;

    assert!(!stored.within_tolerance);
    assert_eq!(stored.tolerance_used, Some(2.0));
}

#[test]
fn test_generous_absolute_bound_overrides_a_tight_relative_one() {
    let ledger = MemoryLedger::new();
    record_forecast(&ledger, "cpu_load", 10, 95.0);
    observe(&ledger, "cpu_load", 10, 100.0);

    let mut tolerances = ToleranceConfig::new();
    tolerances.insert(
        "cpu_load",
        Tolerance {
            tolerance_abs: Some(10.0),
            tolerance_rel: Some(0.01),
        },
    );

    let evaluator = Evaluator::new(&ledger, tolerances);
    evaluator.evaluate_pending().unwrap();

    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let stored = &ledger.evaluations_since("cpu_load", since).unwrap()[0].0;

    assert!(stored.within_tolerance);
    assert_eq!(stored.tolerance_used, Some(10.0));
}

#[test]
fn test_metric_filter_leaves_other_metrics_pending() {
    let ledger = MemoryLedger::new();
    record_forecast(&ledger, "cpu_load", 10, 95.0);
    record_forecast(&ledger, "memory_used", 10, 40.0);
    observe(&ledger, "cpu_load", 10, 100.0);
    observe(&ledger, "memory_used", 10, 41.0);

    let evaluator = Evaluator::new(&ledger, ToleranceConfig::new());
    let summary = evaluator.evaluate_pending_for(&["cpu_load".to_string()]).unwrap();

    assert_eq!(summary.per_metric["cpu_load"].evaluated, 1);
    assert_eq!(summary.per_metric["memory_used"].skipped, 1);

    let still_pending = ledger.list_pending(None, None).unwrap();
    assert_eq!(still_pending.len(), 1);
    assert_eq!(still_pending[0].metric_id, "memory_used");
}

#[test]
fn test_already_settled_forecast_is_not_evaluated_twice() {
    let ledger = MemoryLedger::new();
    record_forecast(&ledger, "cpu_load", 10, 95.0);
    observe(&ledger, "cpu_load", 10, 100.0);

    // Hold on to the pending snapshot, then settle the forecast behind its back
    let snapshot = ledger.list_pending(None, None).unwrap().remove(0);
    let evaluator = Evaluator::new(&ledger, ToleranceConfig::new());
    let first = evaluator.evaluate_forecast(&snapshot);
    assert!(matches!(first, EvaluationOutcome::Evaluated(_)));

    let second = evaluator.evaluate_forecast(&snapshot);
    assert!(matches!(
        second,
        EvaluationOutcome::Skipped(SkipReason::AlreadyEvaluated)
    ));

    let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    assert_eq!(ledger.evaluations_since("cpu_load", since).unwrap().len(), 1);
}

/// Ledger that refuses to persist evaluations for one metric
struct FlakyLedger {
    inner: MemoryLedger,
}

impl ObservationStore for FlakyLedger {
    fn add_observations(&self, metric_id: &str, observations: &[Observation]) -> Result<usize> {
        self.inner.add_observations(metric_id, observations)
    }

    fn latest_observation_timestamp(&self, metric_id: &str) -> Result<Option<DateTime<Utc>>> {
        self.inner.latest_observation_timestamp(metric_id)
    }

    fn observation_value_at(
        &self,
        metric_id: &str,
        target_time: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        self.inner.observation_value_at(metric_id, target_time)
    }
}

impl ForecastLedger for FlakyLedger {
    fn record_issuances(&self, drafts: &[IssuanceDraft]) -> Result<usize> {
        self.inner.record_issuances(drafts)
    }

    fn list_pending(
        &self,
        metrics: Option<&[String]>,
        upto: Option<DateTime<Utc>>,
    ) -> Result<Vec<ForecastIssuance>> {
        self.inner.list_pending(metrics, upto)
    }

    fn save_evaluation(
        &self,
        forecast_id: ForecastId,
        draft: EvaluationDraft,
    ) -> Result<SaveOutcome> {
        if draft.metric_id == "broken" {
            return Err(AccuracyError::StorageError("disk full".to_string()));
        }
        self.inner.save_evaluation(forecast_id, draft)
    }

    fn history(&self, metric_id: &str, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        self.inner.history(metric_id, query)
    }

    fn evaluations_since(
        &self,
        metric_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(ForecastEvaluation, u32)>> {
        self.inner.evaluations_since(metric_id, cutoff)
    }
}

#[test]
fn test_one_failure_does_not_stop_the_pass() {
    let ledger = FlakyLedger {
        inner: MemoryLedger::new(),
    };
    record_forecast(&ledger, "broken", 10, 95.0);
    record_forecast(&ledger, "cpu_load", 10, 95.0);
    observe(&ledger, "broken", 10, 100.0);
    observe(&ledger, "cpu_load", 10, 100.0);

    let evaluator = Evaluator::new(&ledger, ToleranceConfig::new());
    let summary = evaluator.evaluate_pending().unwrap();

    assert_eq!(summary.per_metric["broken"].failed, 1);
    assert_eq!(summary.per_metric["cpu_load"].evaluated, 1);

    let still_pending = ledger.list_pending(None, None).unwrap();
    assert_eq!(still_pending.len(), 1);
    assert_eq!(still_pending[0].metric_id, "broken");
}
