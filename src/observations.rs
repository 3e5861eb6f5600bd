//! Observed ground-truth series and CSV ingestion

use crate::error::Result;
use crate::ledger::ObservationStore;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

/// One observed value of a metric on a calendar day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Calendar day of the observation
    pub ds: NaiveDate,
    /// Observed value
    pub value: f64,
}

impl Observation {
    /// Create an observation
    pub fn new(ds: NaiveDate, value: f64) -> Self {
        Self { ds, value }
    }
}

/// One row of an observation history file
#[derive(Debug, Clone, Deserialize)]
struct ObservationRow {
    metric_id: String,
    ds: NaiveDate,
    value: f64,
}

/// Loader for observation history files
#[derive(Debug)]
pub struct ObservationLoader;

impl ObservationLoader {
    /// Read a `metric_id,ds,value` CSV file into per-metric observation series
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<HashMap<String, Vec<Observation>>> {
        let file = File::open(path)?;
        let mut reader = csv::Reader::from_reader(file);

        let mut series: HashMap<String, Vec<Observation>> = HashMap::new();
        for row in reader.deserialize() {
            let row: ObservationRow = row?;
            series
                .entry(row.metric_id)
                .or_default()
                .push(Observation::new(row.ds, row.value));
        }

        Ok(series)
    }

    /// Read a CSV file and append its rows to a store, returning how many
    /// new observations were added
    pub fn load_into<S, P>(store: &S, path: P) -> Result<usize>
    where
        S: ObservationStore,
        P: AsRef<Path>,
    {
        let series = Self::from_csv(path)?;

        let mut added = 0;
        for (metric_id, observations) in &series {
            added += store.add_observations(metric_id, observations)?;
            tracing::debug!(
                metric_id = %metric_id,
                count = observations.len(),
                "loaded observation series"
            );
        }

        Ok(added)
    }
}
