//! Backend selection from a database URL.

use crate::pg::{self, PgWorkoutStore};
use crate::sqlite::{SqliteWorkoutStore, ensure_sqlite_schema, open_sqlite};
use crate::store::WorkoutStore;
use anyhow::{Result, bail};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub type BoxedStore = Box<dyn WorkoutStore + Send>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageUrl {
    Postgres(String),
    Sqlite(PathBuf),
}

impl FromStr for StorageUrl {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            return Ok(Self::Postgres(s.to_string()));
        }

        if let Some(path) = s
            .strip_prefix("sqlite://")
            .or_else(|| s.strip_prefix("sqlite:"))
        {
            if path.is_empty() {
                bail!("sqlite URL needs a file path, e.g. sqlite://./workouts.db");
            }
            return Ok(Self::Sqlite(PathBuf::from(path)));
        }

        bail!("unsupported database URL {s:?}; expected postgres://… or sqlite://<path>")
    }
}

impl fmt::Display for StorageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Never echo credentials.
            Self::Postgres(url) => match url.split_once('@') {
                Some((_, host)) => write!(f, "postgres://…@{host}"),
                None => f.write_str(url),
            },
            Self::Sqlite(path) => write!(f, "sqlite://{}", path.display()),
        }
    }
}

impl StorageUrl {
    #[must_use]
    pub const fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Sqlite(_) => "sqlite",
        }
    }
}

/// Creates the database if needed and applies the schema. Run once, before
/// any worker connects.
pub fn migrate(url: &StorageUrl) -> Result<()> {
    match url {
        StorageUrl::Postgres(pg_url) => {
            let mut client = pg::connect_or_create_db(pg_url)?;
            pg::ensure_pg_schema(&mut client)?;
        }
        StorageUrl::Sqlite(path) => {
            let conn = open_sqlite(path)?;
            ensure_sqlite_schema(&conn)?;
        }
    }
    tracing::info!(db = %url, "schema ready");
    Ok(())
}

/// Opens a fresh connection and wraps it in the matching store.
pub fn connect(url: &StorageUrl) -> Result<BoxedStore> {
    let store: BoxedStore = match url {
        StorageUrl::Postgres(pg_url) => Box::new(PgWorkoutStore::new(pg::connect(pg_url)?)),
        StorageUrl::Sqlite(path) => Box::new(SqliteWorkoutStore::new(open_sqlite(path)?)),
    };
    crate::dlog!(db = %url, backend = url.backend(), "store connected");
    Ok(store)
}
