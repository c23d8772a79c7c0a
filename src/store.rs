use crate::error::StoreResult;
use crate::types::{Workout, WorkoutEntry};

/// Transactional persistence for workouts and their entries.
///
/// Implementations hold no in-process shared state; consistency between a
/// workout and its entries comes from the backend's transactions. Any
/// transaction left uncommitted (error, early return, panic) is rolled back
/// when its guard drops.
pub trait WorkoutStore {
    /// Inserts the workout header and then each entry in input order, all in
    /// one transaction. Returns the input with `id`s populated.
    fn create_workout(&mut self, workout: Workout) -> StoreResult<Workout>;

    /// Loads the header, then its entries sorted by `order_index` (ties by
    /// insertion order). The two reads are not isolated from concurrent writers.
    fn get_workout_by_id(&mut self, id: i64) -> StoreResult<Workout>;

    /// Overwrites the header fields of `workout.id`. Entries are untouched.
    fn update_workout(&mut self, workout: &Workout) -> StoreResult<()>;

    /// Overwrites every mutable field of `entry.id`, including `order_index`.
    fn update_workout_entry(&mut self, entry: &WorkoutEntry) -> StoreResult<()>;

    /// Deletes the entries and then the header in one transaction. A missing
    /// header rolls the whole unit back.
    fn delete_workout(&mut self, id: i64) -> StoreResult<()>;

    fn delete_workout_entry_by_id(&mut self, id: i64) -> StoreResult<()>;

    /// Whether the underlying connection can still serve requests. Callers
    /// that hold a store across requests reconnect when this is false.
    fn is_healthy(&mut self) -> bool {
        true
    }
}

impl<S: WorkoutStore + ?Sized> WorkoutStore for Box<S> {
    fn create_workout(&mut self, workout: Workout) -> StoreResult<Workout> {
        (**self).create_workout(workout)
    }

    fn get_workout_by_id(&mut self, id: i64) -> StoreResult<Workout> {
        (**self).get_workout_by_id(id)
    }

    fn update_workout(&mut self, workout: &Workout) -> StoreResult<()> {
        (**self).update_workout(workout)
    }

    fn update_workout_entry(&mut self, entry: &WorkoutEntry) -> StoreResult<()> {
        (**self).update_workout_entry(entry)
    }

    fn delete_workout(&mut self, id: i64) -> StoreResult<()> {
        (**self).delete_workout(id)
    }

    fn delete_workout_entry_by_id(&mut self, id: i64) -> StoreResult<()> {
        (**self).delete_workout_entry_by_id(id)
    }

    fn is_healthy(&mut self) -> bool {
        (**self).is_healthy()
    }
}
