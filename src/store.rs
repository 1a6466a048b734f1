//! SQLite run store.
//!
//! One `runs` row per saved result plus one `daily_states` row per day, keyed
//! by `(run_id, day)`. Ids come from SQLite's AUTOINCREMENT, so separate
//! processes sharing one database file never hand out the same id.

use std::{fs, path::Path, time::Duration};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::SimulationResult;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("run {0} not found")]
    RunNotFound(u64),

    #[error("cannot store a result with an empty timeline")]
    EmptyTimeline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: u64,
    pub scenario_name: String,
    pub seed: u64,
    pub days: u32,
    pub average_resilience: f64,
    pub final_resilience: f64,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl RunRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get::<_, i64>(0)? as u64,
            scenario_name: row.get(1)?,
            seed: row.get::<_, i64>(2)? as u64,
            days: row.get(3)?,
            average_resilience: row.get(4)?,
            final_resilience: row.get(5)?,
            metadata: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRow {
    pub run_id: u64,
    pub day: u32,
    pub weather_stress: f64,
    pub soil_moisture: f64,
    pub pollinators: f64,
    pub pests: f64,
    pub crop_health: f64,
    pub resilience_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRun {
    pub run: RunRecord,
    pub days: Vec<DailyRow>,
}

const RUN_COLUMNS: &str = "id, scenario_name, seed, days, average_resilience, \
                           final_resilience, metadata_json, created_at";

pub struct RunStore {
    conn: Connection,
}

impl RunStore {
    /// Open (or create) the run database at `path`, creating parent
    /// directories as needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::with_connection(conn)
    }

    /// In-memory database, used in tests.
    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(include_str!("../migrations/001_runs.sql"))?;
        Ok(Self { conn })
    }

    /// Persists the summary row and every day row in one transaction and
    /// returns the new run id.
    pub fn save(
        &self,
        result: &SimulationResult,
        metadata: serde_json::Value,
    ) -> Result<u64, StoreError> {
        let last = result.timeline.last().ok_or(StoreError::EmptyTimeline)?;
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        tx.execute(
            "INSERT INTO runs (scenario_name, seed, days, average_resilience, final_resilience, \
             metadata_json, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                result.scenario_name,
                result.seed as i64,
                result.days,
                result.average_resilience,
                last.resilience_score,
                metadata,
                Utc::now(),
            ],
        )?;
        let id = tx.last_insert_rowid();
        {
            let mut insert_day = tx.prepare(
                "INSERT INTO daily_states (run_id, day, weather_stress, soil_moisture, \
                 pollinators, pests, crop_health, resilience_score) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for day in &result.timeline {
                insert_day.execute(params![
                    id,
                    day.day,
                    day.weather_stress,
                    day.soil_moisture,
                    day.pollinators,
                    day.pests,
                    day.crop_health,
                    day.resilience_score,
                ])?;
            }
        }
        tx.commit()?;

        let id = id as u64;
        tracing::info!(run_id = id, scenario = %result.scenario_name, "run saved");
        Ok(id)
    }

    pub fn get(&self, id: u64) -> Result<StoredRun, StoreError> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
                params![id as i64],
                RunRecord::from_row,
            )
            .optional()?
            .ok_or(StoreError::RunNotFound(id))?;

        let mut stmt = self.conn.prepare(
            "SELECT run_id, day, weather_stress, soil_moisture, pollinators, pests, \
             crop_health, resilience_score FROM daily_states WHERE run_id = ?1 ORDER BY day",
        )?;
        let days = stmt
            .query_map(params![id as i64], |row| {
                Ok(DailyRow {
                    run_id: row.get::<_, i64>(0)? as u64,
                    day: row.get(1)?,
                    weather_stress: row.get(2)?,
                    soil_moisture: row.get(3)?,
                    pollinators: row.get(4)?,
                    pests: row.get(5)?,
                    crop_health: row.get(6)?,
                    resilience_score: row.get(7)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(StoredRun { run, days })
    }

    /// Best runs first: average resilience, then final resilience, descending.
    pub fn top_runs(&self, limit: usize) -> Result<Vec<RunRecord>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM runs \
             ORDER BY average_resilience DESC, final_resilience DESC, id ASC LIMIT ?1"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let records = stmt
            .query_map(params![limit], RunRecord::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::ScenarioConfig, engine};

    fn result(days: u32) -> SimulationResult {
        engine::run(&ScenarioConfig {
            days,
            ..ScenarioConfig::default()
        })
    }

    #[test]
    fn test_ids_increment_from_one() {
        let store = RunStore::in_memory().unwrap();
        let result = result(4);
        assert_eq!(store.save(&result, serde_json::json!({})).unwrap(), 1);
        assert_eq!(store.save(&result, serde_json::json!({})).unwrap(), 2);
    }

    #[test]
    fn test_missing_run() {
        let store = RunStore::in_memory().unwrap();
        assert!(matches!(store.get(9), Err(StoreError::RunNotFound(9))));
    }

    #[test]
    fn test_day_rows_are_ordered_and_keyed() {
        let store = RunStore::in_memory().unwrap();
        let id = store.save(&result(6), serde_json::json!({ "mode": "single" })).unwrap();
        let stored = store.get(id).unwrap();
        let days: Vec<u32> = stored.days.iter().map(|row| row.day).collect();
        assert_eq!(days, [1, 2, 3, 4, 5, 6]);
        assert!(stored.days.iter().all(|row| row.run_id == id));
        assert_eq!(stored.run.metadata["mode"], "single");
    }

    #[test]
    fn test_empty_timeline_rejected_without_insert() {
        let store = RunStore::in_memory().unwrap();
        let mut empty = result(3);
        empty.timeline.clear();
        assert!(matches!(
            store.save(&empty, serde_json::json!({})),
            Err(StoreError::EmptyTimeline)
        ));
        assert!(store.top_runs(5).unwrap().is_empty());
    }

    #[test]
    fn test_large_seed_survives_storage() {
        let store = RunStore::in_memory().unwrap();
        let result = engine::run(&ScenarioConfig {
            days: 2,
            seed: u64::MAX - 3,
            ..ScenarioConfig::default()
        });
        let id = store.save(&result, serde_json::json!({})).unwrap();
        assert_eq!(store.get(id).unwrap().run.seed, u64::MAX - 3);
    }
}
