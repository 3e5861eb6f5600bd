use chrono::{TimeZone, Utc};
use forecast_accuracy::record::{
    EvaluationDraft, ForecastEvaluation, ForecastStatus, IssuanceDraft,
};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_status_string_round_trip() {
    assert_eq!(ForecastStatus::Pending.as_str(), "PENDING");
    assert_eq!(ForecastStatus::Evaluated.as_str(), "EVALUATED");

    assert_eq!(
        "PENDING".parse::<ForecastStatus>().unwrap(),
        ForecastStatus::Pending
    );
    assert_eq!(
        "EVALUATED".parse::<ForecastStatus>().unwrap(),
        ForecastStatus::Evaluated
    );
}

#[test]
fn test_unknown_status_is_rejected() {
    let result = "DRAFT".parse::<ForecastStatus>();
    assert!(result.is_err());
}

#[test]
fn test_status_serde_uses_uppercase_names() {
    let serialized = serde_json::to_string(&ForecastStatus::Pending).unwrap();
    assert_eq!(serialized, "\"PENDING\"");

    let deserialized: ForecastStatus = serde_json::from_str("\"EVALUATED\"").unwrap();
    assert_eq!(deserialized, ForecastStatus::Evaluated);
}

#[test]
fn test_draft_builder_fills_optional_fields() {
    let issued_at = Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap();
    let target_time = Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap();

    let draft = IssuanceDraft::new("cpu_load", "v1.2.0", issued_at, target_time, 3, 72.5)
        .with_bounds(65.0, 80.0)
        .with_extra_info(json!({"run": "nightly"}));

    assert_eq!(draft.metric_id, "cpu_load");
    assert_eq!(draft.model_version, "v1.2.0");
    assert_eq!(draft.horizon_steps, 3);
    assert_eq!(draft.yhat, 72.5);
    assert_eq!(draft.yhat_lower, Some(65.0));
    assert_eq!(draft.yhat_upper, Some(80.0));
    assert_eq!(draft.extra_info, Some(json!({"run": "nightly"})));
}

#[test]
fn test_evaluation_from_draft_copies_measurements() {
    let target_time = Utc.with_ymd_and_hms(2024, 1, 4, 0, 0, 0).unwrap();
    let evaluated_at = Utc.with_ymd_and_hms(2024, 1, 4, 6, 30, 0).unwrap();

    let draft = EvaluationDraft {
        metric_id: "cpu_load".to_string(),
        target_time,
        actual_value: 100.0,
        error: 5.0,
        relative_error: 0.05,
        within_tolerance: true,
        happened: true,
        tolerance_used: Some(0.05),
        evaluated_at,
    };

    let evaluation = ForecastEvaluation::from_draft(17, 4, draft);

    assert_eq!(evaluation.id, 17);
    assert_eq!(evaluation.forecast_id, 4);
    assert_eq!(evaluation.metric_id, "cpu_load");
    assert_eq!(evaluation.target_time, target_time);
    assert_eq!(evaluation.actual_value, 100.0);
    assert_eq!(evaluation.error, 5.0);
    assert_eq!(evaluation.relative_error, 0.05);
    assert!(evaluation.within_tolerance);
    assert!(evaluation.happened);
    assert_eq!(evaluation.tolerance_used, Some(0.05));
    assert_eq!(evaluation.evaluated_at, evaluated_at);
}
