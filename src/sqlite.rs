use crate::dlog;
use crate::error::{StoreError, StoreResult};
use crate::store::WorkoutStore;
use crate::types::{Workout, WorkoutEntry};
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior, params};
use std::path::Path;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r"
    CREATE TABLE IF NOT EXISTS workouts (
      id                INTEGER PRIMARY KEY AUTOINCREMENT,
      title             TEXT NOT NULL,
      description       TEXT NOT NULL DEFAULT '',
      duration_minutes  INTEGER NOT NULL,
      calories_burned   INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS workout_entries (
      id                INTEGER PRIMARY KEY AUTOINCREMENT,
      workout_id        INTEGER NOT NULL REFERENCES workouts(id),
      exercise          TEXT NOT NULL,
      sets              INTEGER NOT NULL,
      reps              INTEGER,
      duration_seconds  INTEGER,
      weight            REAL,
      notes             TEXT NOT NULL DEFAULT '',
      order_index       INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS workout_entries_workout_order_idx
      ON workout_entries (workout_id, order_index);
";

/// Opens a SQLite database file with the pragmas the store relies on.
///
/// Does not touch the schema; see [`ensure_sqlite_schema`].
pub fn open_sqlite(path: &Path) -> Result<Connection> {
    let display = path.display();
    let conn =
        Connection::open(path).with_context(|| format!("Opening SQLite DB: {display}"))?;
    configure(&conn)?;
    Ok(conn)
}

/// In-memory database with the schema applied. Each call is a separate database.
pub fn open_sqlite_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("Opening in-memory SQLite DB")?;
    configure(&conn)?;
    ensure_sqlite_schema(&conn)?;
    Ok(conn)
}

pub fn ensure_sqlite_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Ensuring SQLite schema")?;
    for table in ["workouts", "workout_entries"] {
        if !table_exists(conn, table)? {
            anyhow::bail!("SQLite schema is missing table {table} after migration");
        }
    }
    Ok(())
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
        .context("Enabling SQLite foreign keys")?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("Setting SQLite busy timeout")?;
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt =
        conn.prepare("SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1 LIMIT 1")?;
    let mut rows = stmt.query([table])?;
    Ok(rows.next()?.is_some())
}

/// Workout store over a single SQLite connection.
pub struct SqliteWorkoutStore {
    conn: Connection,
}

impl SqliteWorkoutStore {
    /// The connection must already carry the schema.
    #[must_use]
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    pub fn into_inner(self) -> Connection {
        self.conn
    }
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<WorkoutEntry> {
    Ok(WorkoutEntry {
        id: row.get(0)?,
        exercise: row.get(1)?,
        sets: row.get(2)?,
        reps: row.get(3)?,
        duration_seconds: row.get(4)?,
        weight: row.get(5)?,
        notes: row.get(6)?,
        order_index: row.get(7)?,
    })
}

impl WorkoutStore for SqliteWorkoutStore {
    fn create_workout(&mut self, mut workout: Workout) -> StoreResult<Workout> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let workout_id: i64 = tx.query_row(
            "INSERT INTO workouts (title, description, duration_minutes, calories_burned)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING id",
            params![
                workout.title,
                workout.description,
                workout.duration_minutes,
                workout.calories_burned,
            ],
            |row| row.get(0),
        )?;

        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO workout_entries
                   (workout_id, exercise, sets, reps, duration_seconds, weight, notes, order_index)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 RETURNING id",
            )?;
            for entry in &mut workout.entries {
                entry.id = stmt.query_row(
                    params![
                        workout_id,
                        entry.exercise,
                        entry.sets,
                        entry.reps,
                        entry.duration_seconds,
                        entry.weight,
                        entry.notes,
                        entry.order_index,
                    ],
                    |row| row.get(0),
                )?;
            }
        }

        tx.commit()?;

        workout.id = workout_id;
        tracing::info!(
            workout_id,
            entries = workout.entries.len(),
            backend = "sqlite",
            "workout created"
        );
        Ok(workout)
    }

    fn get_workout_by_id(&mut self, id: i64) -> StoreResult<Workout> {
        let header = self
            .conn
            .query_row(
                "SELECT id, title, description, duration_minutes, calories_burned
                 FROM workouts WHERE id = ?1",
                [id],
                |row| {
                    Ok(Workout {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        description: row.get(2)?,
                        duration_minutes: row.get(3)?,
                        calories_burned: row.get(4)?,
                        entries: Vec::new(),
                    })
                },
            )
            .optional()?;

        let Some(mut workout) = header else {
            return Err(StoreError::workout_not_found(id));
        };

        let mut stmt = self.conn.prepare_cached(
            "SELECT id, exercise, sets, reps, duration_seconds, weight, notes, order_index
             FROM workout_entries
             WHERE workout_id = ?1
             ORDER BY order_index, id",
        )?;
        workout.entries = stmt
            .query_map([id], entry_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        dlog!(workout_id = id, entries = workout.entries.len(), "workout loaded");
        Ok(workout)
    }

    fn update_workout(&mut self, workout: &Workout) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE workouts
             SET title = ?1, description = ?2, duration_minutes = ?3, calories_burned = ?4
             WHERE id = ?5",
            params![
                workout.title,
                workout.description,
                workout.duration_minutes,
                workout.calories_burned,
                workout.id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::workout_not_found(workout.id));
        }
        dlog!(workout_id = workout.id, "workout header updated");
        Ok(())
    }

    fn update_workout_entry(&mut self, entry: &WorkoutEntry) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE workout_entries
             SET exercise = ?1,
                 sets = ?2,
                 reps = ?3,
                 duration_seconds = ?4,
                 weight = ?5,
                 notes = ?6,
                 order_index = ?7
             WHERE id = ?8",
            params![
                entry.exercise,
                entry.sets,
                entry.reps,
                entry.duration_seconds,
                entry.weight,
                entry.notes,
                entry.order_index,
                entry.id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::entry_not_found(entry.id));
        }
        dlog!(entry_id = entry.id, "workout entry updated");
        Ok(())
    }

    fn delete_workout(&mut self, id: i64) -> StoreResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let entries = tx.execute("DELETE FROM workout_entries WHERE workout_id = ?1", [id])?;
        let headers = tx.execute("DELETE FROM workouts WHERE id = ?1", [id])?;
        if headers == 0 {
            // `tx` drops here and rolls the entry delete back.
            return Err(StoreError::workout_not_found(id));
        }

        tx.commit()?;
        tracing::info!(workout_id = id, entries, backend = "sqlite", "workout deleted");
        Ok(())
    }

    fn delete_workout_entry_by_id(&mut self, id: i64) -> StoreResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM workout_entries WHERE id = ?1", [id])?;
        if changed == 0 {
            return Err(StoreError::entry_not_found(id));
        }
        dlog!(entry_id = id, "workout entry deleted");
        Ok(())
    }
}
