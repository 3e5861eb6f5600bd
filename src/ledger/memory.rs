//! In-process store backed by plain collections

use crate::error::{AccuracyError, Result};
use crate::ledger::{ForecastLedger, HistoryEntry, HistoryQuery, ObservationStore, SaveOutcome};
use crate::observations::Observation;
use crate::record::{
    EvaluationDraft, EvaluationId, ForecastEvaluation, ForecastId, ForecastIssuance,
    ForecastStatus, IssuanceDraft,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

/// Uniqueness key of a recorded forecast
type IssuedKey = (String, DateTime<Utc>, DateTime<Utc>, String);

#[derive(Debug, Default)]
struct MemoryState {
    next_forecast_id: ForecastId,
    next_evaluation_id: EvaluationId,
    forecasts: BTreeMap<ForecastId, ForecastIssuance>,
    evaluations: BTreeMap<EvaluationId, ForecastEvaluation>,
    issued_keys: HashSet<IssuedKey>,
    observations: HashMap<String, BTreeMap<NaiveDate, f64>>,
}

/// Forecast ledger that lives entirely in process memory.
///
/// Useful for tests and short-lived experiments; nothing survives the
/// process. All operations lock one mutex, so a shared instance is safe to
/// use from several threads.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<MemoryState>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| AccuracyError::StorageError("ledger state lock poisoned".to_string()))
    }
}

impl ObservationStore for MemoryLedger {
    fn add_observations(&self, metric_id: &str, observations: &[Observation]) -> Result<usize> {
        let mut state = self.state()?;
        let series = state.observations.entry(metric_id.to_string()).or_default();

        let mut added = 0;
        for observation in observations {
            if series.insert(observation.ds, observation.value).is_none() {
                added += 1;
            }
        }
        Ok(added)
    }

    fn latest_observation_timestamp(&self, metric_id: &str) -> Result<Option<DateTime<Utc>>> {
        let state = self.state()?;
        let latest = state
            .observations
            .get(metric_id)
            .and_then(|series| series.keys().next_back())
            .map(|ds| {
                DateTime::<Utc>::from_naive_utc_and_offset(ds.and_time(NaiveTime::MIN), Utc)
            });
        Ok(latest)
    }

    fn observation_value_at(
        &self,
        metric_id: &str,
        target_time: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        let state = self.state()?;
        let value = state
            .observations
            .get(metric_id)
            .and_then(|series| series.get(&target_time.date_naive()))
            .copied();
        Ok(value)
    }
}

impl ForecastLedger for MemoryLedger {
    fn record_issuances(&self, drafts: &[IssuanceDraft]) -> Result<usize> {
        let mut state = self.state()?;

        let mut recorded = 0;
        for draft in drafts {
            let key: IssuedKey = (
                draft.metric_id.clone(),
                draft.issued_at,
                draft.target_time,
                draft.model_version.clone(),
            );
            if !state.issued_keys.insert(key) {
                continue;
            }

            state.next_forecast_id += 1;
            let id = state.next_forecast_id;
            state.forecasts.insert(
                id,
                ForecastIssuance {
                    id,
                    metric_id: draft.metric_id.clone(),
                    model_version: draft.model_version.clone(),
                    issued_at: draft.issued_at,
                    target_time: draft.target_time,
                    horizon_steps: draft.horizon_steps,
                    yhat: draft.yhat,
                    yhat_lower: draft.yhat_lower,
                    yhat_upper: draft.yhat_upper,
                    extra_info: draft.extra_info.clone(),
                    status: ForecastStatus::Pending,
                    evaluation_id: None,
                },
            );
            recorded += 1;
        }
        Ok(recorded)
    }

    fn list_pending(
        &self,
        metrics: Option<&[String]>,
        upto: Option<DateTime<Utc>>,
    ) -> Result<Vec<ForecastIssuance>> {
        let state = self.state()?;
        let pending = state
            .forecasts
            .values()
            .filter(|f| f.status == ForecastStatus::Pending)
            .filter(|f| metrics.map_or(true, |m| m.iter().any(|id| *id == f.metric_id)))
            .filter(|f| upto.map_or(true, |upto| f.target_time <= upto))
            .cloned()
            .collect();
        Ok(pending)
    }

    fn save_evaluation(
        &self,
        forecast_id: ForecastId,
        draft: EvaluationDraft,
    ) -> Result<SaveOutcome> {
        let mut state = self.state()?;

        match state.forecasts.get(&forecast_id) {
            None => return Err(AccuracyError::ForecastNotFound(forecast_id)),
            Some(forecast) if forecast.status == ForecastStatus::Evaluated => {
                return Ok(SaveOutcome::AlreadyEvaluated);
            }
            Some(_) => {}
        }

        state.next_evaluation_id += 1;
        let evaluation_id = state.next_evaluation_id;
        let evaluation = ForecastEvaluation::from_draft(evaluation_id, forecast_id, draft);
        state.evaluations.insert(evaluation_id, evaluation.clone());

        // Status check above makes this the single flip for the forecast
        if let Some(forecast) = state.forecasts.get_mut(&forecast_id) {
            forecast.status = ForecastStatus::Evaluated;
            forecast.evaluation_id = Some(evaluation_id);
        }

        Ok(SaveOutcome::Saved(evaluation))
    }

    fn history(&self, metric_id: &str, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        let state = self.state()?;

        let mut matches: Vec<&ForecastIssuance> = state
            .forecasts
            .values()
            .filter(|f| f.metric_id == metric_id)
            .filter(|f| query.matches(f))
            .collect();
        matches.sort_by(|a, b| (b.issued_at, b.id).cmp(&(a.issued_at, a.id)));
        matches.truncate(query.limit);

        let entries = matches
            .into_iter()
            .map(|forecast| HistoryEntry {
                forecast: forecast.clone(),
                evaluation: forecast
                    .evaluation_id
                    .and_then(|id| state.evaluations.get(&id))
                    .cloned(),
            })
            .collect();
        Ok(entries)
    }

    fn evaluations_since(
        &self,
        metric_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(ForecastEvaluation, u32)>> {
        let state = self.state()?;
        let rows = state
            .evaluations
            .values()
            .filter(|e| e.metric_id == metric_id && e.evaluated_at >= cutoff)
            .filter_map(|e| {
                state
                    .forecasts
                    .get(&e.forecast_id)
                    .map(|f| (e.clone(), f.horizon_steps))
            })
            .collect();
        Ok(rows)
    }
}
