//! Recording newly issued forecasts

use crate::error::{AccuracyError, Result};
use crate::ledger::ForecastLedger;
use crate::record::IssuanceDraft;
use crate::utils::future_target_times;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

/// Counts from one recording call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssuanceReport {
    /// Drafts written as new pending forecasts
    pub recorded: usize,
    /// Drafts whose target was not beyond the latest known observation
    pub discarded_stale: usize,
    /// Drafts identical to an already recorded forecast
    pub duplicates: usize,
}

/// Check one draft before it reaches the store
fn validate_draft(draft: &IssuanceDraft) -> Result<()> {
    if draft.metric_id.trim().is_empty() {
        return Err(AccuracyError::ValidationError(
            "metric_id must not be empty".to_string(),
        ));
    }
    if draft.model_version.trim().is_empty() {
        return Err(AccuracyError::ValidationError(
            "model_version must not be empty".to_string(),
        ));
    }
    if draft.horizon_steps == 0 {
        return Err(AccuracyError::ValidationError(format!(
            "horizon_steps must be at least 1 for metric {}",
            draft.metric_id
        )));
    }
    if !draft.yhat.is_finite() {
        return Err(AccuracyError::ValidationError(format!(
            "yhat must be finite for metric {}",
            draft.metric_id
        )));
    }
    for bound in [draft.yhat_lower, draft.yhat_upper].into_iter().flatten() {
        if !bound.is_finite() {
            return Err(AccuracyError::ValidationError(format!(
                "prediction bounds must be finite for metric {}",
                draft.metric_id
            )));
        }
    }
    Ok(())
}

/// Record a batch of forecast drafts as pending forecasts.
///
/// Drafts whose target time is not strictly after the latest observation of
/// their metric are dropped before anything is written; a forecast about a
/// moment ground truth already covers can never be meaningfully evaluated.
/// Drafts identical to an already recorded forecast are skipped by the store.
/// Any invalid draft fails the whole batch before it touches the store.
pub fn issue_forecasts<L: ForecastLedger>(
    ledger: &L,
    drafts: &[IssuanceDraft],
) -> Result<IssuanceReport> {
    for draft in drafts {
        validate_draft(draft)?;
    }

    // One latest-observation lookup per metric in the batch
    let mut latest_by_metric: HashMap<&str, Option<DateTime<Utc>>> = HashMap::new();
    let mut fresh: Vec<IssuanceDraft> = Vec::with_capacity(drafts.len());
    let mut discarded_stale = 0;

    for draft in drafts {
        let latest = match latest_by_metric.get(draft.metric_id.as_str()) {
            Some(latest) => *latest,
            None => {
                let latest = ledger.latest_observation_timestamp(&draft.metric_id)?;
                latest_by_metric.insert(draft.metric_id.as_str(), latest);
                latest
            }
        };

        match latest {
            Some(latest) if draft.target_time <= latest => {
                tracing::debug!(
                    metric_id = %draft.metric_id,
                    target_time = %draft.target_time,
                    latest_observation = %latest,
                    "discarding stale forecast draft"
                );
                discarded_stale += 1;
            }
            _ => fresh.push(draft.clone()),
        }
    }

    let recorded = ledger.record_issuances(&fresh)?;
    let duplicates = fresh.len() - recorded;

    tracing::info!(recorded, discarded_stale, duplicates, "forecast batch recorded");
    Ok(IssuanceReport {
        recorded,
        discarded_stale,
        duplicates,
    })
}

/// Build drafts for consecutive horizon steps out of a model output vector.
///
/// Step `k` gets `target_time = anchor + k * step(frequency)` and
/// `horizon_steps = k`, counting from one.
pub fn draft_series(
    metric_id: &str,
    model_version: &str,
    issued_at: DateTime<Utc>,
    anchor: DateTime<Utc>,
    frequency: &str,
    values: &[f64],
) -> Result<Vec<IssuanceDraft>> {
    let targets = future_target_times(anchor, values.len(), frequency)?;

    let drafts = targets
        .into_iter()
        .zip(values.iter())
        .enumerate()
        .map(|(i, (target_time, &yhat))| {
            IssuanceDraft::new(
                metric_id,
                model_version,
                issued_at,
                target_time,
                (i + 1) as u32,
                yhat,
            )
        })
        .collect();
    Ok(drafts)
}
