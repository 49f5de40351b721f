//! SQLite database for Stepwright state persistence

use crate::store::{EnvironmentStore, TestRunStore, TestSpecStore};
use crate::types::*;
use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper for state persistence
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path.as_ref())?;

        // WAL lets the CLI read run history while a run is being written
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS environments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                base_url TEXT NOT NULL,
                username TEXT NOT NULL,
                password TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS test_specs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                steps TEXT NOT NULL DEFAULT '[]',
                environment_id INTEGER REFERENCES environments(id),
                generation_state TEXT NOT NULL DEFAULT 'not_started',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Run history is append-only; executed_at is written once on insert
            CREATE TABLE IF NOT EXISTS test_runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                test_id INTEGER NOT NULL,
                status TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                executed_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_test_runs_test ON test_runs(test_id, executed_at);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }
}

// ============================================================================
// Test specs
// ============================================================================

struct SpecRow {
    id: i64,
    name: String,
    description: String,
    steps: String,
    environment_id: Option<i64>,
    generation_state: String,
}

impl SpecRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            steps: row.get(3)?,
            environment_id: row.get(4)?,
            generation_state: row.get(5)?,
        })
    }

    fn into_spec(self, conn: &Connection) -> Result<TestSpec> {
        let environment = match self.environment_id {
            Some(env_id) => load_environment(conn, env_id)?,
            None => None,
        };
        Ok(TestSpec {
            id: self.id,
            name: self.name,
            description: self.description,
            steps: serde_json::from_str(&self.steps)?,
            environment,
            generation_state: self.generation_state.parse()?,
        })
    }
}

const SPEC_COLUMNS: &str = "id, name, description, steps, environment_id, generation_state";

impl TestSpecStore for Database {
    fn insert(&self, spec: NewTestSpec) -> Result<TestSpec> {
        let conn = self.conn.lock();
        let now = Utc::now().timestamp();

        if let Some(env_id) = spec.environment_id {
            if load_environment(&conn, env_id)?.is_none() {
                return Err(Error::not_found("environment", env_id));
            }
        }

        conn.execute(
            "INSERT INTO test_specs (name, description, steps, environment_id, generation_state, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                spec.name,
                spec.description,
                serde_json::to_string(&spec.steps)?,
                spec.environment_id,
                GenerationState::NotStarted.as_str(),
                now,
                now,
            ],
        )?;
        let id = conn.last_insert_rowid();

        debug!("Inserted test spec {} ({} steps)", id, spec.steps.len());

        let environment = match spec.environment_id {
            Some(env_id) => load_environment(&conn, env_id)?,
            None => None,
        };

        Ok(TestSpec {
            id,
            name: spec.name,
            description: spec.description,
            steps: spec.steps,
            environment,
            generation_state: GenerationState::NotStarted,
        })
    }

    fn find_by_id(&self, id: i64) -> Result<Option<TestSpec>> {
        let conn = self.conn.lock();

        let row = conn
            .query_row(
                &format!("SELECT {} FROM test_specs WHERE id = ?1", SPEC_COLUMNS),
                params![id],
                SpecRow::from_row,
            )
            .optional()?;

        match row {
            Some(raw) => Ok(Some(raw.into_spec(&conn)?)),
            None => Ok(None),
        }
    }

    fn exists_by_id(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM test_specs WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn save(&self, spec: &TestSpec) -> Result<()> {
        let conn = self.conn.lock();
        let now = Utc::now().timestamp();

        let rows = conn.execute(
            "UPDATE test_specs
             SET name = ?1, description = ?2, steps = ?3, environment_id = ?4,
                 generation_state = ?5, updated_at = ?6
             WHERE id = ?7",
            params![
                spec.name,
                spec.description,
                serde_json::to_string(&spec.steps)?,
                spec.environment.as_ref().and_then(|e| e.id),
                spec.generation_state.as_str(),
                now,
                spec.id,
            ],
        )?;

        if rows == 0 {
            return Err(Error::not_found("test", spec.id));
        }

        debug!("Saved test spec {}", spec.id);
        Ok(())
    }

    fn set_generation_state(&self, id: i64, state: GenerationState) -> Result<()> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE test_specs SET generation_state = ?1, updated_at = ?2 WHERE id = ?3",
            params![state.as_str(), Utc::now().timestamp(), id],
        )?;

        if rows == 0 {
            return Err(Error::not_found("test", id));
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<TestSpec>> {
        let conn = self.conn.lock();

        let raw: Vec<SpecRow> = {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM test_specs ORDER BY id", SPEC_COLUMNS))?;
            let rows = stmt.query_map([], SpecRow::from_row)?;
            let collected = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            collected
        };

        raw.into_iter().map(|r| r.into_spec(&conn)).collect()
    }
}

// ============================================================================
// Environments
// ============================================================================

fn environment_from_row(row: &Row<'_>) -> rusqlite::Result<TargetEnvironment> {
    Ok(TargetEnvironment {
        id: Some(row.get(0)?),
        name: row.get(1)?,
        base_url: row.get(2)?,
        username: row.get(3)?,
        password: Secret::new(row.get::<_, String>(4)?),
    })
}

fn load_environment(conn: &Connection, id: i64) -> Result<Option<TargetEnvironment>> {
    let env = conn
        .query_row(
            "SELECT id, name, base_url, username, password FROM environments WHERE id = ?1",
            params![id],
            environment_from_row,
        )
        .optional()?;
    Ok(env)
}

impl EnvironmentStore for Database {
    fn insert_environment(&self, env: &TargetEnvironment) -> Result<TargetEnvironment> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO environments (name, base_url, username, password, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                env.name,
                env.base_url,
                env.username,
                env.password.expose(),
                Utc::now().timestamp(),
            ],
        )?;

        let mut stored = env.clone();
        stored.id = Some(conn.last_insert_rowid());
        debug!("Inserted environment {} ({})", env.name, env.base_url);
        Ok(stored)
    }

    fn find_environment(&self, id: i64) -> Result<Option<TargetEnvironment>> {
        let conn = self.conn.lock();
        load_environment(&conn, id)
    }

    fn list_environments(&self) -> Result<Vec<TargetEnvironment>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, name, base_url, username, password FROM environments ORDER BY id",
        )?;
        let rows = stmt.query_map([], environment_from_row)?;
        let envs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(envs)
    }
}

// ============================================================================
// Test runs
// ============================================================================

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, i64, String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

impl TestRunStore for Database {
    fn create(&self, run: &TestRun) -> Result<TestRun> {
        let conn = self.conn.lock();
        let executed_at = run.executed_at.unwrap_or_else(Utc::now);

        conn.execute(
            "INSERT INTO test_runs (test_id, status, description, executed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                run.test_id,
                run.status.as_str(),
                run.description,
                executed_at.timestamp_millis(),
            ],
        )?;

        let mut stored = run.clone();
        stored.id = Some(conn.last_insert_rowid());
        stored.executed_at = Some(executed_at);

        debug!("Created run {:?} for test {}", stored.id, run.test_id);
        Ok(stored)
    }

    fn finalize(&self, run: &TestRun) -> Result<()> {
        let id = run
            .id
            .ok_or_else(|| Error::not_found("test run", "<unsaved>"))?;

        if !run.status.is_terminal() {
            return Err(Error::InvalidStateTransition {
                from: RunStatus::Pending.to_string(),
                to: run.status.to_string(),
            });
        }

        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE test_runs SET status = ?1, description = ?2
             WHERE id = ?3 AND status = 'pending'",
            params![run.status.as_str(), run.description, id],
        )?;

        if rows == 0 {
            let current: Option<String> = conn
                .query_row(
                    "SELECT status FROM test_runs WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match current {
                Some(from) => Error::InvalidStateTransition {
                    from,
                    to: run.status.to_string(),
                },
                None => Error::not_found("test run", id),
            });
        }

        debug!("Finalized run {} as {}", id, run.status);
        Ok(())
    }

    fn find_by_test_newest_first(&self, test_id: i64) -> Result<Vec<TestRun>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT id, test_id, status, description, executed_at FROM test_runs
             WHERE test_id = ?1 ORDER BY executed_at DESC, id DESC",
        )?;
        let rows = stmt.query_map(params![test_id], run_from_row)?;

        let mut runs = Vec::new();
        for row in rows {
            let (id, test_id, status, description, executed_at) = row?;
            runs.push(TestRun {
                id: Some(id),
                test_id,
                status: status.parse()?,
                description,
                executed_at: millis_to_datetime(executed_at),
            });
        }

        Ok(runs)
    }
}
