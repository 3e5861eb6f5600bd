//! # Forecast Accuracy
//!
//! A Rust library for tracking forecast accuracy against later-observed ground truth.
//!
//! ## Features
//!
//! - Idempotent recording of issued forecasts with stale-target filtering
//! - Per-metric tolerance cascades with absolute and relative bounds
//! - Pending-forecast evaluation with exactly-once settlement
//! - Windowed accuracy summaries bucketed by forecast horizon
//! - In-memory and SQLite-backed stores behind one trait
//!
//! ## Forecast Lifecycle
//!
//! A recorded forecast moves through exactly two states:
//!
//! ```rust
//! pub enum ForecastStatus {
//!     Pending,
//!     Evaluated,
//! }
//! ```
//!
//! The evaluator flips a forecast to `Evaluated` at most once. The flip is a
//! conditional update inside the store, so concurrent evaluation passes agree
//! on a single winner and the losers see a skip, not an error.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use forecast_accuracy::accuracy::compute_accuracy_summary;
//! use forecast_accuracy::evaluator::Evaluator;
//! use forecast_accuracy::issuance::issue_forecasts;
//! use forecast_accuracy::ledger::sqlite::SqliteLedger;
//! use forecast_accuracy::record::IssuanceDraft;
//! use forecast_accuracy::tolerance::ToleranceConfig;
//!
//! # fn main() -> forecast_accuracy::Result<()> {
//! let ledger = SqliteLedger::open("history.db")?;
//!
//! // Record a prediction about tomorrow
//! let issued_at = Utc::now();
//! let draft = IssuanceDraft::new(
//!     "cpu_load",
//!     "prophet-v1",
//!     issued_at,
//!     issued_at + Duration::days(1),
//!     1,
//!     42.0,
//! );
//! issue_forecasts(&ledger, &[draft])?;
//!
//! // Later, once observations have caught up, settle what is due
//! let evaluator = Evaluator::new(&ledger, ToleranceConfig::new());
//! let summary = evaluator.evaluate_pending()?;
//! println!("evaluated {} forecasts", summary.total_evaluated());
//!
//! // Accuracy over the last 90 days
//! let report = compute_accuracy_summary(&ledger, "cpu_load")?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```

pub mod accuracy;
pub mod error;
pub mod evaluator;
pub mod issuance;
pub mod ledger;
pub mod observations;
pub mod record;
pub mod tolerance;
pub mod utils;

// Re-export commonly used types
pub use crate::accuracy::{
    compute_accuracy_summary, compute_accuracy_summary_with_params, default_horizon_buckets,
    AccuracyStats, AccuracySummary, HorizonBucket,
};
pub use crate::error::{AccuracyError, Result};
pub use crate::evaluator::{EvaluationOutcome, EvaluationSummary, Evaluator, SkipReason};
pub use crate::issuance::{draft_series, issue_forecasts, IssuanceReport};
pub use crate::ledger::memory::MemoryLedger;
pub use crate::ledger::sqlite::SqliteLedger;
pub use crate::ledger::{
    ForecastLedger, HistoryEntry, HistoryQuery, ObservationStore, SaveOutcome,
};
pub use crate::observations::{Observation, ObservationLoader};
pub use crate::record::{
    EvaluationDraft, ForecastEvaluation, ForecastIssuance, ForecastStatus, IssuanceDraft,
};
pub use crate::tolerance::{Tolerance, ToleranceConfig};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
