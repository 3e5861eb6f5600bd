//! Core record types for forecast issuance and evaluation

use crate::error::AccuracyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier assigned by the store to a recorded forecast
pub type ForecastId = i64;

/// Identifier assigned by the store to a saved evaluation
pub type EvaluationId = i64;

/// Lifecycle state of a recorded forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastStatus {
    /// Recorded and awaiting ground truth
    #[serde(rename = "PENDING")]
    Pending,
    /// Reconciled against an observed value
    #[serde(rename = "EVALUATED")]
    Evaluated,
}

impl ForecastStatus {
    /// Canonical storage form of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastStatus::Pending => "PENDING",
            ForecastStatus::Evaluated => "EVALUATED",
        }
    }
}

impl std::str::FromStr for ForecastStatus {
    type Err = AccuracyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ForecastStatus::Pending),
            "EVALUATED" => Ok(ForecastStatus::Evaluated),
            other => Err(AccuracyError::DataError(format!(
                "Unknown forecast status: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ForecastStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prediction as the model component hands it over for recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuanceDraft {
    /// Metric the prediction is about
    pub metric_id: String,
    /// Version tag of the model that produced the prediction
    pub model_version: String,
    /// When the prediction was made
    pub issued_at: DateTime<Utc>,
    /// The future moment the prediction refers to
    pub target_time: DateTime<Utc>,
    /// Number of forecast steps between issuance and target
    pub horizon_steps: u32,
    /// Predicted value
    pub yhat: f64,
    /// Lower bound of the prediction interval
    pub yhat_lower: Option<f64>,
    /// Upper bound of the prediction interval
    pub yhat_upper: Option<f64>,
    /// Free-form context carried along with the forecast
    pub extra_info: Option<serde_json::Value>,
}

impl IssuanceDraft {
    /// Create a draft with the required fields, leaving bounds and context unset
    pub fn new(
        metric_id: impl Into<String>,
        model_version: impl Into<String>,
        issued_at: DateTime<Utc>,
        target_time: DateTime<Utc>,
        horizon_steps: u32,
        yhat: f64,
    ) -> Self {
        Self {
            metric_id: metric_id.into(),
            model_version: model_version.into(),
            issued_at,
            target_time,
            horizon_steps,
            yhat,
            yhat_lower: None,
            yhat_upper: None,
            extra_info: None,
        }
    }

    /// Attach a prediction interval
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.yhat_lower = Some(lower);
        self.yhat_upper = Some(upper);
        self
    }

    /// Attach free-form context
    pub fn with_extra_info(mut self, extra_info: serde_json::Value) -> Self {
        self.extra_info = Some(extra_info);
        self
    }
}

/// A recorded forecast as the store returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastIssuance {
    /// Store-assigned identifier
    pub id: ForecastId,
    /// Metric the prediction is about
    pub metric_id: String,
    /// Version tag of the model that produced the prediction
    pub model_version: String,
    /// When the prediction was made
    pub issued_at: DateTime<Utc>,
    /// The future moment the prediction refers to
    pub target_time: DateTime<Utc>,
    /// Number of forecast steps between issuance and target
    pub horizon_steps: u32,
    /// Predicted value
    pub yhat: f64,
    /// Lower bound of the prediction interval
    pub yhat_lower: Option<f64>,
    /// Upper bound of the prediction interval
    pub yhat_upper: Option<f64>,
    /// Free-form context carried along with the forecast
    pub extra_info: Option<serde_json::Value>,
    /// Lifecycle state
    pub status: ForecastStatus,
    /// Identifier of the evaluation that settled this forecast
    pub evaluation_id: Option<EvaluationId>,
}

/// Evaluation fields as the evaluator hands them to the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDraft {
    /// Metric the evaluated forecast is about
    pub metric_id: String,
    /// Target moment of the evaluated forecast
    pub target_time: DateTime<Utc>,
    /// Observed ground-truth value
    pub actual_value: f64,
    /// Signed error, actual minus predicted
    pub error: f64,
    /// Absolute error scaled by the magnitude of the actual value
    pub relative_error: f64,
    /// Whether the error fell within the resolved tolerance
    pub within_tolerance: bool,
    /// Whether the forecast counts as having come true
    pub happened: bool,
    /// The tolerance value that was applied, if any was configured
    pub tolerance_used: Option<f64>,
    /// When the evaluation ran
    pub evaluated_at: DateTime<Utc>,
}

/// A settled evaluation as the store returns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastEvaluation {
    /// Store-assigned identifier
    pub id: EvaluationId,
    /// The forecast this evaluation settles
    pub forecast_id: ForecastId,
    /// Metric the evaluated forecast is about
    pub metric_id: String,
    /// Target moment of the evaluated forecast
    pub target_time: DateTime<Utc>,
    /// Observed ground-truth value
    pub actual_value: f64,
    /// Signed error, actual minus predicted
    pub error: f64,
    /// Absolute error scaled by the magnitude of the actual value
    pub relative_error: f64,
    /// Whether the error fell within the resolved tolerance
    pub within_tolerance: bool,
    /// Whether the forecast counts as having come true
    pub happened: bool,
    /// The tolerance value that was applied, if any was configured
    pub tolerance_used: Option<f64>,
    /// When the evaluation ran
    pub evaluated_at: DateTime<Utc>,
}

impl ForecastEvaluation {
    /// Assemble the stored evaluation from its draft and assigned identifiers
    pub fn from_draft(id: EvaluationId, forecast_id: ForecastId, draft: EvaluationDraft) -> Self {
        Self {
            id,
            forecast_id,
            metric_id: draft.metric_id,
            target_time: draft.target_time,
            actual_value: draft.actual_value,
            error: draft.error,
            relative_error: draft.relative_error,
            within_tolerance: draft.within_tolerance,
            happened: draft.happened,
            tolerance_used: draft.tolerance_used,
            evaluated_at: draft.evaluated_at,
        }
    }
}
