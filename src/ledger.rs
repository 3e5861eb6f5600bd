//! Storage contract for forecasts, evaluations and observations

pub mod memory;
pub mod sqlite;

pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;

use crate::error::Result;
use crate::observations::Observation;
use crate::record::{
    EvaluationDraft, ForecastEvaluation, ForecastId, ForecastIssuance, IssuanceDraft,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on history rows returned when a query does not set one
pub const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Read and write access to observed ground truth
pub trait ObservationStore: Send + Sync {
    /// Append observations for a metric, overwriting values for days already
    /// present. Returns how many new days were added.
    fn add_observations(&self, metric_id: &str, observations: &[Observation]) -> Result<usize>;

    /// Midnight UTC of the newest observed day for a metric, if any
    fn latest_observation_timestamp(&self, metric_id: &str) -> Result<Option<DateTime<Utc>>>;

    /// Observed value on the calendar day of `target_time`, if one exists
    fn observation_value_at(
        &self,
        metric_id: &str,
        target_time: DateTime<Utc>,
    ) -> Result<Option<f64>>;
}

/// Outcome of persisting an evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The forecast was pending and is now settled by this evaluation
    Saved(ForecastEvaluation),
    /// The forecast had already been settled; nothing was written
    AlreadyEvaluated,
}

/// Filters for reading back recorded forecasts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Keep forecasts issued at or after this moment
    pub start: Option<DateTime<Utc>>,
    /// Keep forecasts issued at or before this moment
    pub end: Option<DateTime<Utc>>,
    /// Keep forecasts with at least this many horizon steps
    pub horizon_min: Option<u32>,
    /// Keep forecasts with at most this many horizon steps
    pub horizon_max: Option<u32>,
    /// Maximum number of rows to return
    pub limit: usize,
}

impl Default for HistoryQuery {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            horizon_min: None,
            horizon_max: None,
            limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl HistoryQuery {
    /// Whether a forecast passes every filter of this query
    pub fn matches(&self, forecast: &ForecastIssuance) -> bool {
        if let Some(start) = self.start {
            if forecast.issued_at < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if forecast.issued_at > end {
                return false;
            }
        }
        if let Some(min) = self.horizon_min {
            if forecast.horizon_steps < min {
                return false;
            }
        }
        if let Some(max) = self.horizon_max {
            if forecast.horizon_steps > max {
                return false;
            }
        }
        true
    }
}

/// A recorded forecast together with its evaluation, once settled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// The recorded forecast
    pub forecast: ForecastIssuance,
    /// Its evaluation, absent while the forecast is pending
    pub evaluation: Option<ForecastEvaluation>,
}

/// Durable home of the forecast lifecycle
pub trait ForecastLedger: ObservationStore {
    /// Record drafts as new PENDING forecasts. A draft identical to an already
    /// recorded forecast in metric, issuance time, target time and model
    /// version is skipped. Returns how many rows were written.
    fn record_issuances(&self, drafts: &[IssuanceDraft]) -> Result<usize>;

    /// Forecasts still awaiting evaluation, oldest first. `metrics` narrows to
    /// the given metric ids; `upto` keeps only targets at or before the given
    /// moment.
    fn list_pending(
        &self,
        metrics: Option<&[String]>,
        upto: Option<DateTime<Utc>>,
    ) -> Result<Vec<ForecastIssuance>>;

    /// Atomically store an evaluation and flip its forecast out of PENDING.
    ///
    /// When the forecast was settled in the meantime nothing is written and
    /// [`SaveOutcome::AlreadyEvaluated`] is reported. An unknown forecast id
    /// is an error.
    fn save_evaluation(
        &self,
        forecast_id: ForecastId,
        draft: EvaluationDraft,
    ) -> Result<SaveOutcome>;

    /// Recorded forecasts for a metric, newest issuance first, each paired
    /// with its evaluation where one exists
    fn history(&self, metric_id: &str, query: &HistoryQuery) -> Result<Vec<HistoryEntry>>;

    /// Evaluations of a metric performed at or after `cutoff`, each paired
    /// with the horizon steps of the forecast it settled
    fn evaluations_since(
        &self,
        metric_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(ForecastEvaluation, u32)>>;
}
