//! SQLite experiment tracking.
//!
//! RULE: Only store.rs talks to the database.
//! The training pipeline calls store methods and never executes SQL directly.

use crate::{
    error::{ScoreError, ScoreResult},
    types::RunId,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Finished,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running  => "running",
            Self::Finished => "finished",
            Self::Failed   => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "finished" => Self::Finished,
            "failed"   => Self::Failed,
            _          => Self::Running,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id:      RunId,
    pub experiment:  String,
    pub run_name:    String,
    pub status:      RunStatus,
    pub started_at:  String,
    pub finished_at: Option<String>,
}

pub struct ExperimentStore {
    conn: Connection,
}

impl ExperimentStore {
    /// Open (or create) the tracking database at `path`.
    pub fn open(path: &str) -> ScoreResult<Self> {
        let conn = Connection::open(path)?;
        // WAL only matters for real files; ignore the result elsewhere.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ScoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ScoreResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_experiments.sql"))?;
        Ok(())
    }

    // ── Runs ───────────────────────────────────────────────────

    pub fn start_run(&self, experiment: &str, run_name: &str) -> ScoreResult<RunId> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.conn.execute(
            "INSERT INTO experiment_run (run_id, experiment, run_name, status, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![run_id, experiment, run_name, RunStatus::Running.as_str(), now()],
        )?;
        log::info!("store: started run {run_id} ({experiment}/{run_name})");
        Ok(run_id)
    }

    pub fn finish_run(&self, run_id: &str, status: RunStatus) -> ScoreResult<()> {
        let updated = self.conn.execute(
            "UPDATE experiment_run SET status = ?2, finished_at = ?3 WHERE run_id = ?1",
            params![run_id, status.as_str(), now()],
        )?;
        if updated == 0 {
            return Err(ScoreError::RunNotFound { run_id: run_id.to_string() });
        }
        Ok(())
    }

    pub fn get_run(&self, run_id: &str) -> ScoreResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT run_id, experiment, run_name, status, started_at, finished_at
                 FROM experiment_run WHERE run_id = ?1",
                params![run_id],
                row_to_run,
            )
            .optional()?;
        Ok(run)
    }

    pub fn runs_for_experiment(&self, experiment: &str) -> ScoreResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, experiment, run_name, status, started_at, finished_at
             FROM experiment_run WHERE experiment = ?1
             ORDER BY started_at ASC, rowid ASC",
        )?;
        let runs = stmt
            .query_map(params![experiment], row_to_run)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // ── Params / metrics / artifacts ───────────────────────────

    pub fn log_param(&self, run_id: &str, key: &str, value: &str) -> ScoreResult<()> {
        self.conn.execute(
            "INSERT INTO run_param (run_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(run_id, key) DO UPDATE SET value = excluded.value",
            params![run_id, key, value],
        )?;
        Ok(())
    }

    pub fn log_metric(&self, run_id: &str, key: &str, value: f64) -> ScoreResult<()> {
        self.conn.execute(
            "INSERT INTO run_metric (run_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT(run_id, key) DO UPDATE SET value = excluded.value",
            params![run_id, key, value],
        )?;
        Ok(())
    }

    pub fn log_artifact(&self, run_id: &str, name: &str, path: &str) -> ScoreResult<()> {
        self.conn.execute(
            "INSERT INTO run_artifact (run_id, name, path) VALUES (?1, ?2, ?3)
             ON CONFLICT(run_id, name) DO UPDATE SET path = excluded.path",
            params![run_id, name, path],
        )?;
        Ok(())
    }

    pub fn run_params(&self, run_id: &str) -> ScoreResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM run_param WHERE run_id = ?1 ORDER BY key ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn run_metrics(&self, run_id: &str) -> ScoreResult<Vec<(String, f64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM run_metric WHERE run_id = ?1 ORDER BY key ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn run_metric(&self, run_id: &str, key: &str) -> ScoreResult<Option<f64>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM run_metric WHERE run_id = ?1 AND key = ?2",
                params![run_id, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn run_artifacts(&self, run_id: &str) -> ScoreResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, path FROM run_artifact WHERE run_id = ?1 ORDER BY name ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn row_to_run(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        run_id:      row.get(0)?,
        experiment:  row.get(1)?,
        run_name:    row.get(2)?,
        status:      RunStatus::parse(&row.get::<_, String>(3)?),
        started_at:  row.get(4)?,
        finished_at: row.get(5)?,
    })
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}
