//! SQLite-backed store for the forecast lifecycle

use crate::error::{AccuracyError, Result};
use crate::ledger::{ForecastLedger, HistoryEntry, HistoryQuery, ObservationStore, SaveOutcome};
use crate::observations::Observation;
use crate::record::{
    EvaluationDraft, ForecastEvaluation, ForecastId, ForecastIssuance, ForecastStatus,
    IssuanceDraft,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, ToSql};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS forecast_issuances (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  metric_id TEXT NOT NULL,
  model_version TEXT NOT NULL,
  issued_at TEXT NOT NULL,
  target_time TEXT NOT NULL,
  horizon_steps INTEGER NOT NULL CHECK (horizon_steps >= 1),
  yhat REAL NOT NULL,
  yhat_lower REAL,
  yhat_upper REAL,
  extra_info TEXT,
  status TEXT NOT NULL DEFAULT 'PENDING' CHECK (status IN ('PENDING', 'EVALUATED')),
  evaluation_id INTEGER REFERENCES forecast_evaluations(id),
  UNIQUE (metric_id, issued_at, target_time, model_version)
);

CREATE INDEX IF NOT EXISTS idx_issuances_metric_target
  ON forecast_issuances(metric_id, target_time);
CREATE INDEX IF NOT EXISTS idx_issuances_status
  ON forecast_issuances(status);

CREATE TABLE IF NOT EXISTS forecast_evaluations (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  forecast_id INTEGER NOT NULL UNIQUE REFERENCES forecast_issuances(id),
  metric_id TEXT NOT NULL,
  target_time TEXT NOT NULL,
  actual_value REAL NOT NULL,
  error REAL NOT NULL,
  relative_error REAL NOT NULL,
  within_tolerance INTEGER NOT NULL CHECK (within_tolerance IN (0, 1)),
  happened INTEGER NOT NULL CHECK (happened IN (0, 1)),
  tolerance_used REAL,
  evaluated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_evaluations_metric_evaluated
  ON forecast_evaluations(metric_id, evaluated_at);

CREATE TABLE IF NOT EXISTS metric_observations (
  metric_id TEXT NOT NULL,
  ds TEXT NOT NULL,
  value REAL NOT NULL,
  PRIMARY KEY (metric_id, ds)
);
";

/// Forecast ledger stored in a SQLite database.
///
/// Timestamps are kept as RFC 3339 text in UTC, so lexical comparisons in SQL
/// follow chronological order for the values this crate writes.
#[derive(Debug)]
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    /// Open a database file, creating it and the schema when missing
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AccuracyError::StorageError("database connection lock poisoned".to_string()))
    }
}

fn parse_issuance_row(row: &Row<'_>) -> rusqlite::Result<ForecastIssuance> {
    let status: String = row.get(10)?;
    let status = status.parse::<ForecastStatus>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(10, Type::Text, Box::new(err))
    })?;

    let extra_info = match row.get::<_, Option<String>>(9)? {
        Some(text) => Some(serde_json::from_str(&text).map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(err))
        })?),
        None => None,
    };

    Ok(ForecastIssuance {
        id: row.get(0)?,
        metric_id: row.get(1)?,
        model_version: row.get(2)?,
        issued_at: row.get(3)?,
        target_time: row.get(4)?,
        horizon_steps: row.get(5)?,
        yhat: row.get(6)?,
        yhat_lower: row.get(7)?,
        yhat_upper: row.get(8)?,
        extra_info,
        status,
        evaluation_id: row.get(11)?,
    })
}

fn parse_evaluation_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<ForecastEvaluation> {
    Ok(ForecastEvaluation {
        id: row.get(offset)?,
        forecast_id: row.get(offset + 1)?,
        metric_id: row.get(offset + 2)?,
        target_time: row.get(offset + 3)?,
        actual_value: row.get(offset + 4)?,
        error: row.get(offset + 5)?,
        relative_error: row.get(offset + 6)?,
        within_tolerance: row.get(offset + 7)?,
        happened: row.get(offset + 8)?,
        tolerance_used: row.get(offset + 9)?,
        evaluated_at: row.get(offset + 10)?,
    })
}

impl ObservationStore for SqliteLedger {
    fn add_observations(&self, metric_id: &str, observations: &[Observation]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut added = 0;
        {
            let mut insert = tx.prepare(
                "INSERT OR IGNORE INTO metric_observations(metric_id, ds, value) \
                 VALUES (?1, ?2, ?3)",
            )?;
            let mut update = tx.prepare(
                "UPDATE metric_observations SET value = ?3 WHERE metric_id = ?1 AND ds = ?2",
            )?;
            for observation in observations {
                let inserted =
                    insert.execute(params![metric_id, observation.ds, observation.value])?;
                if inserted == 0 {
                    // Same day loaded again, keep the newest value
                    update.execute(params![metric_id, observation.ds, observation.value])?;
                } else {
                    added += 1;
                }
            }
        }
        tx.commit()?;
        Ok(added)
    }

    fn latest_observation_timestamp(&self, metric_id: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let latest: Option<NaiveDate> = conn.query_row(
            "SELECT MAX(ds) FROM metric_observations WHERE metric_id = ?1",
            params![metric_id],
            |row| row.get(0),
        )?;
        Ok(latest.map(|ds| {
            DateTime::<Utc>::from_naive_utc_and_offset(ds.and_time(NaiveTime::MIN), Utc)
        }))
    }

    fn observation_value_at(
        &self,
        metric_id: &str,
        target_time: DateTime<Utc>,
    ) -> Result<Option<f64>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM metric_observations WHERE metric_id = ?1 AND ds = ?2",
                params![metric_id, target_time.date_naive()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }
}

impl ForecastLedger for SqliteLedger {
    fn record_issuances(&self, drafts: &[IssuanceDraft]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut recorded = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO forecast_issuances(
                    metric_id, model_version, issued_at, target_time, horizon_steps,
                    yhat, yhat_lower, yhat_upper, extra_info, status
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 'PENDING')",
            )?;
            for draft in drafts {
                let extra_info = draft
                    .extra_info
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                recorded += stmt.execute(params![
                    draft.metric_id,
                    draft.model_version,
                    draft.issued_at,
                    draft.target_time,
                    draft.horizon_steps,
                    draft.yhat,
                    draft.yhat_lower,
                    draft.yhat_upper,
                    extra_info,
                ])?;
            }
        }
        tx.commit()?;
        Ok(recorded)
    }

    fn list_pending(
        &self,
        metrics: Option<&[String]>,
        upto: Option<DateTime<Utc>>,
    ) -> Result<Vec<ForecastIssuance>> {
        let conn = self.conn()?;

        let mut sql = String::from(
            "SELECT id, metric_id, model_version, issued_at, target_time, horizon_steps, \
                    yhat, yhat_lower, yhat_upper, extra_info, status, evaluation_id \
             FROM forecast_issuances WHERE status = 'PENDING'",
        );
        let mut args: Vec<&dyn ToSql> = Vec::new();

        if let Some(metrics) = metrics {
            if metrics.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(" AND metric_id IN (");
            for (i, metric_id) in metrics.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                sql.push('?');
                args.push(metric_id);
            }
            sql.push(')');
        }
        if let Some(ref upto) = upto {
            sql.push_str(" AND target_time <= ?");
            args.push(upto);
        }
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(&args[..], parse_issuance_row)?;

        let mut pending = Vec::new();
        for row in rows {
            pending.push(row?);
        }
        Ok(pending)
    }

    fn save_evaluation(
        &self,
        forecast_id: ForecastId,
        draft: EvaluationDraft,
    ) -> Result<SaveOutcome> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let known = tx
            .query_row(
                "SELECT id FROM forecast_issuances WHERE id = ?1",
                params![forecast_id],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        if known.is_none() {
            return Err(AccuracyError::ForecastNotFound(forecast_id));
        }

        // The unique index on forecast_id turns a lost race into an ignored
        // insert instead of a constraint error
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO forecast_evaluations(
                forecast_id, metric_id, target_time, actual_value, error,
                relative_error, within_tolerance, happened, tolerance_used, evaluated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                forecast_id,
                draft.metric_id,
                draft.target_time,
                draft.actual_value,
                draft.error,
                draft.relative_error,
                draft.within_tolerance,
                draft.happened,
                draft.tolerance_used,
                draft.evaluated_at,
            ],
        )?;
        if inserted == 0 {
            tx.rollback()?;
            return Ok(SaveOutcome::AlreadyEvaluated);
        }
        let evaluation_id = tx.last_insert_rowid();

        let flipped = tx.execute(
            "UPDATE forecast_issuances SET status = 'EVALUATED', evaluation_id = ?1 \
             WHERE id = ?2 AND status = 'PENDING'",
            params![evaluation_id, forecast_id],
        )?;
        if flipped == 0 {
            tx.rollback()?;
            return Ok(SaveOutcome::AlreadyEvaluated);
        }

        tx.commit()?;
        Ok(SaveOutcome::Saved(ForecastEvaluation::from_draft(
            evaluation_id,
            forecast_id,
            draft,
        )))
    }

    fn history(&self, metric_id: &str, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        let conn = self.conn()?;

        let mut sql = String::from(
            "SELECT f.id, f.metric_id, f.model_version, f.issued_at, f.target_time, \
                    f.horizon_steps, f.yhat, f.yhat_lower, f.yhat_upper, f.extra_info, \
                    f.status, f.evaluation_id, \
                    e.id, e.forecast_id, e.metric_id, e.target_time, e.actual_value, \
                    e.error, e.relative_error, e.within_tolerance, e.happened, \
                    e.tolerance_used, e.evaluated_at \
             FROM forecast_issuances f \
             LEFT JOIN forecast_evaluations e ON e.forecast_id = f.id \
             WHERE f.metric_id = ?",
        );
        let mut args: Vec<&dyn ToSql> = vec![&metric_id];

        if let Some(ref start) = query.start {
            sql.push_str(" AND f.issued_at >= ?");
            args.push(start);
        }
        if let Some(ref end) = query.end {
            sql.push_str(" AND f.issued_at <= ?");
            args.push(end);
        }
        if let Some(ref min) = query.horizon_min {
            sql.push_str(" AND f.horizon_steps >= ?");
            args.push(min);
        }
        if let Some(ref max) = query.horizon_max {
            sql.push_str(" AND f.horizon_steps <= ?");
            args.push(max);
        }
        sql.push_str(" ORDER BY f.issued_at DESC, f.id DESC LIMIT ?");
        let limit = query.limit as i64;
        args.push(&limit);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(&args[..], |row| {
            let forecast = parse_issuance_row(row)?;
            let evaluation = match row.get::<_, Option<i64>>(12)? {
                Some(_) => Some(parse_evaluation_row(row, 12)?),
                None => None,
            };
            Ok(HistoryEntry {
                forecast,
                evaluation,
            })
        })?;

        let mut entries = Vec::new();
        for entry in rows {
            entries.push(entry?);
        }
        Ok(entries)
    }

    fn evaluations_since(
        &self,
        metric_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<(ForecastEvaluation, u32)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT e.id, e.forecast_id, e.metric_id, e.target_time, e.actual_value, \
                    e.error, e.relative_error, e.within_tolerance, e.happened, \
                    e.tolerance_used, e.evaluated_at, f.horizon_steps \
             FROM forecast_evaluations e \
             JOIN forecast_issuances f ON f.id = e.forecast_id \
             WHERE e.metric_id = ?1 AND e.evaluated_at >= ?2 \
             ORDER BY e.id",
        )?;
        let rows = stmt.query_map(params![metric_id, cutoff], |row| {
            let evaluation = parse_evaluation_row(row, 0)?;
            let horizon_steps: u32 = row.get(11)?;
            Ok((evaluation, horizon_steps))
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}
