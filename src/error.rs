use std::fmt;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Which table a not-found lookup targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Workout,
    Entry,
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workout => f.write_str("workout"),
            Self::Entry => f.write_str("workout entry"),
        }
    }
}

/// Errors from workout store operations.
///
/// `NotFound` is only raised from zero affected/returned rows, never parsed out
/// of driver messages. Everything else is opaque and not retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{record} {id} not found")]
    NotFound { record: Record, id: i64 },

    #[error("postgres: {0}")]
    Postgres(#[from] postgres::Error),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) const fn workout_not_found(id: i64) -> Self {
        Self::NotFound {
            record: Record::Workout,
            id,
        }
    }

    pub(crate) const fn entry_not_found(id: i64) -> Self {
        Self::NotFound {
            record: Record::Entry,
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_record() {
        assert_eq!(
            StoreError::entry_not_found(7).to_string(),
            "workout entry 7 not found"
        );
        assert!(StoreError::workout_not_found(1).is_not_found());
    }
}
