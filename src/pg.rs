use crate::dlog;
use crate::error::{StoreError, StoreResult};
use crate::store::WorkoutStore;
use crate::types::{Workout, WorkoutEntry};
use anyhow::{Context, Result, bail};
use postgres::{Client, NoTls, Row};
use std::time::Duration;

const SQLSTATE_INVALID_CATALOG_NAME: &str = "3D000";
const SQLSTATE_DUPLICATE_DATABASE: &str = "42P04";
const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

/// Workout store over a single PostgreSQL client.
pub struct PgWorkoutStore {
    client: Client,
}

impl PgWorkoutStore {
    /// The client must point at a database that already carries the schema.
    #[must_use]
    pub const fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn into_inner(self) -> Client {
        self.client
    }
}

fn entry_from_row(row: &Row) -> WorkoutEntry {
    WorkoutEntry {
        id: row.get(0),
        exercise: row.get(1),
        sets: row.get(2),
        reps: row.get(3),
        duration_seconds: row.get(4),
        weight: row.get(5),
        notes: row.get(6),
        order_index: row.get(7),
    }
}

impl WorkoutStore for PgWorkoutStore {
    fn create_workout(&mut self, mut workout: Workout) -> StoreResult<Workout> {
        // Dropping `tx` without commit rolls back, on every exit path.
        let mut tx = self.client.transaction()?;

        let row = tx.query_one(
            "INSERT INTO workouts (title, description, duration_minutes, calories_burned)
             VALUES ($1, $2, $3, $4)
             RETURNING id",
            &[
                &workout.title,
                &workout.description,
                &workout.duration_minutes,
                &workout.calories_burned,
            ],
        )?;
        let workout_id: i64 = row.get(0);

        let stmt = tx.prepare(
            "INSERT INTO workout_entries
               (workout_id, exercise, sets, reps, duration_seconds, weight, notes, order_index)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING id",
        )?;
        for entry in &mut workout.entries {
            let row = tx.query_one(
                &stmt,
                &[
                    &workout_id,
                    &entry.exercise,
                    &entry.sets,
                    &entry.reps,
                    &entry.duration_seconds,
                    &entry.weight,
                    &entry.notes,
                    &entry.order_index,
                ],
            )?;
            entry.id = row.get(0);
        }

        tx.commit()?;

        workout.id = workout_id;
        tracing::info!(
            workout_id,
            entries = workout.entries.len(),
            backend = "postgres",
            "workout created"
        );
        Ok(workout)
    }

    fn get_workout_by_id(&mut self, id: i64) -> StoreResult<Workout> {
        let Some(row) = self.client.query_opt(
            "SELECT id, title, description, duration_minutes, calories_burned
             FROM workouts WHERE id = $1",
            &[&id],
        )?
        else {
            return Err(StoreError::workout_not_found(id));
        };

        let entries = self
            .client
            .query(
                "SELECT id, exercise, sets, reps, duration_seconds, weight, notes, order_index
                 FROM workout_entries
                 WHERE workout_id = $1
                 ORDER BY order_index, id",
                &[&id],
            )?
            .iter()
            .map(entry_from_row)
            .collect::<Vec<_>>();

        dlog!(workout_id = id, entries = entries.len(), "workout loaded");
        Ok(Workout {
            id: row.get(0),
            title: row.get(1),
            description: row.get(2),
            duration_minutes: row.get(3),
            calories_burned: row.get(4),
            entries,
        })
    }

    fn update_workout(&mut self, workout: &Workout) -> StoreResult<()> {
        let changed = self.client.execute(
            "UPDATE workouts
             SET title = $1, description = $2, duration_minutes = $3, calories_burned = $4
             WHERE id = $5",
            &[
                &workout.title,
                &workout.description,
                &workout.duration_minutes,
                &workout.calories_burned,
                &workout.id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::workout_not_found(workout.id));
        }
        dlog!(workout_id = workout.id, "workout header updated");
        Ok(())
    }

    fn update_workout_entry(&mut self, entry: &WorkoutEntry) -> StoreResult<()> {
        let changed = self.client.execute(
            "UPDATE workout_entries
             SET exercise = $1,
                 sets = $2,
                 reps = $3,
                 duration_seconds = $4,
                 weight = $5,
                 notes = $6,
                 order_index = $7
             WHERE id = $8",
            &[
                &entry.exercise,
                &entry.sets,
                &entry.reps,
                &entry.duration_seconds,
                &entry.weight,
                &entry.notes,
                &entry.order_index,
                &entry.id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::entry_not_found(entry.id));
        }
        dlog!(entry_id = entry.id, "workout entry updated");
        Ok(())
    }

    fn delete_workout(&mut self, id: i64) -> StoreResult<()> {
        let mut tx = self.client.transaction()?;

        let entries = tx.execute("DELETE FROM workout_entries WHERE workout_id = $1", &[&id])?;
        let headers = tx.execute("DELETE FROM workouts WHERE id = $1", &[&id])?;
        if headers == 0 {
            return Err(StoreError::workout_not_found(id));
        }

        tx.commit()?;
        tracing::info!(workout_id = id, entries, backend = "postgres", "workout deleted");
        Ok(())
    }

    fn delete_workout_entry_by_id(&mut self, id: i64) -> StoreResult<()> {
        let changed = self
            .client
            .execute("DELETE FROM workout_entries WHERE id = $1", &[&id])?;
        if changed == 0 {
            return Err(StoreError::entry_not_found(id));
        }
        dlog!(entry_id = id, "workout entry deleted");
        Ok(())
    }

    /// A terminated backend is only noticed on the next round trip, so this
    /// pings the server rather than trusting `is_closed` alone.
    fn is_healthy(&mut self) -> bool {
        if self.client.is_closed() {
            return false;
        }
        match self.client.is_valid(HEALTH_CHECK_TIMEOUT) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(err = %e, "postgres connection failed health check");
                false
            }
        }
    }
}

pub fn ensure_pg_schema(pg: &mut Client) -> Result<()> {
    pg.batch_execute(
        r"
        CREATE TABLE IF NOT EXISTS workouts (
          id                BIGSERIAL PRIMARY KEY,
          title             TEXT NOT NULL,
          description       TEXT NOT NULL DEFAULT '',
          duration_minutes  INTEGER NOT NULL,
          calories_burned   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS workout_entries (
          id                BIGSERIAL PRIMARY KEY,
          workout_id        BIGINT NOT NULL REFERENCES workouts(id),
          exercise          TEXT NOT NULL,
          sets              INTEGER NOT NULL,
          reps              INTEGER,
          duration_seconds  INTEGER,
          weight            DOUBLE PRECISION,
          notes             TEXT NOT NULL DEFAULT '',
          order_index       INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS workout_entries_workout_order_idx
          ON workout_entries (workout_id, order_index);
        ",
    )
    .context("Ensuring PostgreSQL schema")?;
    Ok(())
}

pub fn connect(pg_url: &str) -> Result<Client> {
    Client::connect(pg_url, NoTls).context("Connecting to PostgreSQL")
}

/// Connect to `pg_url`. If the database in the URL doesn't exist, create it and retry.
///
/// Creating requires the CREATE DATABASE privilege on the maintenance database.
pub fn connect_or_create_db(pg_url: &str) -> Result<Client> {
    match Client::connect(pg_url, NoTls) {
        Ok(pg) => return Ok(pg),
        Err(e) if has_sqlstate(&e, SQLSTATE_INVALID_CATALOG_NAME) => {
            tracing::warn!(err = %e, "database does not exist; attempting to create it");
        }
        Err(e) => return Err(e).context("Connecting to PostgreSQL"),
    }

    let admin = AdminUrls::derive(pg_url)?;

    let mut pg = Client::connect(&admin.postgres, NoTls)
        .or_else(|_| Client::connect(&admin.template1, NoTls))
        .context("Connecting to maintenance DB (postgres/template1) to create target DB")?;

    if database_exists(&mut pg, &admin.db_name)? {
        tracing::info!(db = %admin.db_name, "database already exists");
    } else {
        tracing::info!(db = %admin.db_name, "creating database");
        create_database(&mut pg, &admin.db_name)?;
    }

    Client::connect(pg_url, NoTls).context("Connecting to PostgreSQL after creating database")
}

fn has_sqlstate(e: &postgres::Error, code: &str) -> bool {
    e.as_db_error().is_some_and(|d| d.code().code() == code)
}

fn database_exists(pg: &mut Client, db_name: &str) -> Result<bool> {
    Ok(pg
        .query_opt("SELECT 1 FROM pg_database WHERE datname = $1", &[&db_name])?
        .is_some())
}

fn create_database(pg: &mut Client, db_name: &str) -> Result<()> {
    // CREATE DATABASE cannot take a bind parameter.
    if !is_plain_identifier(db_name) {
        bail!("Refusing to create database with unsafe name: {db_name:?}");
    }

    match pg.batch_execute(&format!("CREATE DATABASE \"{db_name}\"")) {
        Ok(()) => Ok(()),
        Err(e) if has_sqlstate(&e, SQLSTATE_DUPLICATE_DATABASE) => Ok(()),
        Err(e) => Err(e).context("Creating database"),
    }
}

fn is_plain_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Maintenance-database URLs derived from a URI-style target URL such as
/// `postgres://127.0.0.1:5432/workouts?sslmode=disable`.
#[derive(Debug, PartialEq, Eq)]
struct AdminUrls {
    db_name: String,
    postgres: String,
    template1: String,
}

impl AdminUrls {
    fn derive(pg_url: &str) -> Result<Self> {
        let (base, query) = match pg_url.split_once('?') {
            Some((a, b)) => (a, Some(b)),
            None => (pg_url, None),
        };

        let slash = base
            .rfind('/')
            .filter(|&i| !base[..i].ends_with('/'))
            .context("database URL must include a database name (e.g. .../workouts)")?;
        let db_name = &base[slash + 1..];
        if db_name.is_empty() {
            bail!("database URL must include a database name (e.g. .../workouts)");
        }

        let prefix = &base[..=slash];
        let with_query = |db: &str| match query {
            Some(q) => format!("{prefix}{db}?{q}"),
            None => format!("{prefix}{db}"),
        };

        Ok(Self {
            db_name: db_name.to_string(),
            postgres: with_query("postgres"),
            template1: with_query("template1"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_urls_keep_query_string() {
        let admin = AdminUrls::derive("postgres://u:p@db:5432/workouts?sslmode=disable").unwrap();
        assert_eq!(
            admin,
            AdminUrls {
                db_name: "workouts".into(),
                postgres: "postgres://u:p@db:5432/postgres?sslmode=disable".into(),
                template1: "postgres://u:p@db:5432/template1?sslmode=disable".into(),
            }
        );
    }

    #[test]
    fn admin_urls_require_database_name() {
        assert!(AdminUrls::derive("postgres://db:5432/").is_err());
        assert!(AdminUrls::derive("postgres://db:5432").is_err());
    }

    #[test]
    fn admin_urls_handle_multibyte_path_segments() {
        let admin = AdminUrls::derive("postgres://h/café/x").unwrap();
        assert_eq!(admin.db_name, "x");
        assert_eq!(admin.postgres, "postgres://h/café/postgres");
    }

    #[test]
    fn only_plain_identifiers_are_created() {
        assert!(is_plain_identifier("workouts_dev"));
        assert!(!is_plain_identifier("x\"; DROP"));
        assert!(!is_plain_identifier(""));
    }
}
