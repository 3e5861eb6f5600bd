//! Per-metric accuracy tolerance resolution

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Relative tolerance applied when neither a metric entry nor the default provides one
pub const FALLBACK_TOLERANCE_REL: f64 = 0.05;

/// Tolerance settings for one metric
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Tolerance {
    /// Maximum absolute error still counted as correct
    #[serde(default)]
    pub tolerance_abs: Option<f64>,
    /// Maximum relative error still counted as correct
    #[serde(default)]
    pub tolerance_rel: Option<f64>,
}

impl Tolerance {
    /// Tolerance with only an absolute bound
    pub fn abs(value: f64) -> Self {
        Self {
            tolerance_abs: Some(value),
            tolerance_rel: None,
        }
    }

    /// Tolerance with only a relative bound
    pub fn rel(value: f64) -> Self {
        Self {
            tolerance_abs: None,
            tolerance_rel: Some(value),
        }
    }

    /// Decide whether an error falls within this tolerance.
    ///
    /// The absolute bound wins when both are set. Returns the verdict and the
    /// bound that was applied; with neither bound set the verdict is false and
    /// no bound is reported.
    pub fn check(&self, error: f64, relative_error: f64) -> (bool, Option<f64>) {
        if let Some(abs) = self.tolerance_abs {
            (error.abs() <= abs, Some(abs))
        } else if let Some(rel) = self.tolerance_rel {
            (relative_error <= rel, Some(rel))
        } else {
            (false, None)
        }
    }
}

/// Resolve per-metric tolerance settings with sensible fallbacks
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToleranceConfig {
    /// Fallback entry consulted for fields a metric entry leaves unset
    default: Tolerance,
    /// Per-metric entries
    metrics: HashMap<String, Tolerance>,
}

impl ToleranceConfig {
    /// Create an empty configuration; every metric resolves to the relative fallback
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a configuration from a map of metric entries.
    ///
    /// The entry under the key `"default"` becomes the fallback for all metrics.
    pub fn from_map(mut entries: HashMap<String, Tolerance>) -> Self {
        let default = entries.remove("default").unwrap_or_default();
        Self {
            default,
            metrics: entries,
        }
    }

    /// Parse a configuration from a JSON object of metric entries
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: HashMap<String, Tolerance> = serde_json::from_str(json)?;
        Ok(Self::from_map(entries))
    }

    /// Load a configuration from a JSON file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Set the fallback entry
    pub fn set_default(&mut self, tolerance: Tolerance) {
        self.default = tolerance;
    }

    /// Set the entry for one metric
    pub fn insert(&mut self, metric_id: impl Into<String>, tolerance: Tolerance) {
        self.metrics.insert(metric_id.into(), tolerance);
    }

    /// Resolve the tolerance for a metric.
    ///
    /// Each field cascades independently: the metric's own entry wins, then the
    /// default entry, and for the relative bound finally
    /// [`FALLBACK_TOLERANCE_REL`]. Resolution never fails; an unknown metric
    /// gets the default cascade.
    pub fn resolve(&self, metric_id: &str) -> Tolerance {
        let entry = self.metrics.get(metric_id).copied().unwrap_or_default();
        Tolerance {
            tolerance_abs: entry.tolerance_abs.or(self.default.tolerance_abs),
            tolerance_rel: entry
                .tolerance_rel
                .or(self.default.tolerance_rel)
                .or(Some(FALLBACK_TOLERANCE_REL)),
        }
    }
}
