pub mod api;
pub mod cli;
pub mod error;
pub mod pg;
pub mod server;
pub mod sqlite;
pub mod storage;
pub mod store;
pub mod types;
pub mod utils;

pub use error::{Record, StoreError, StoreResult};
pub use pg::PgWorkoutStore;
pub use sqlite::SqliteWorkoutStore;
pub use store::WorkoutStore;
pub use types::{Workout, WorkoutEntry};
