mod common;

use common::{entry, expected_read, leg_day, sqlite_store, workout};
use pretty_assertions::assert_eq;
use rusqlite::Connection;
use setbook::sqlite::open_sqlite_in_memory;
use setbook::{Record, SqliteWorkoutStore, StoreError, WorkoutEntry, WorkoutStore};

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn leg_day_scenario() {
    let mut store = sqlite_store();

    let created = store.create_workout(leg_day()).unwrap();
    assert!(created.id > 0);
    assert_eq!(created.entries.len(), 2);
    assert!(created.entries.iter().all(|e| e.id > 0));
    assert_ne!(created.entries[0].id, created.entries[1].id);

    let read = store.get_workout_by_id(created.id).unwrap();
    let names: Vec<&str> = read.entries.iter().map(|e| e.exercise.as_str()).collect();
    assert_eq!(names, ["Squat", "Lunge"]);

    store.delete_workout(created.id).unwrap();
    let err = store.get_workout_by_id(created.id).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn create_then_read_round_trips() {
    for n in [0usize, 1, 4] {
        let mut store = sqlite_store();
        let entries = (0..n)
            .map(|i| entry(&format!("ex{i}"), i32::try_from(n - i).unwrap()))
            .collect();
        let input = workout("Mixed", entries);

        let created = store.create_workout(input.clone()).unwrap();
        assert_eq!(created.without_ids(), input);

        let read = store.get_workout_by_id(created.id).unwrap();
        assert_eq!(read, expected_read(&created));
    }
}

#[test]
fn workout_without_entries_reads_back_empty_list() {
    let mut store = sqlite_store();
    let created = store.create_workout(workout("Rest", Vec::new())).unwrap();
    let read = store.get_workout_by_id(created.id).unwrap();
    assert!(read.entries.is_empty());
}

#[test]
fn duplicate_order_index_keeps_insertion_order() {
    let mut store = sqlite_store();
    let created = store
        .create_workout(workout(
            "Ties",
            vec![entry("b", 1), entry("first-zero", 0), entry("second-zero", 0)],
        ))
        .unwrap();

    let read = store.get_workout_by_id(created.id).unwrap();
    let names: Vec<&str> = read.entries.iter().map(|e| e.exercise.as_str()).collect();
    assert_eq!(names, ["first-zero", "second-zero", "b"]);
}

#[test]
fn optional_fields_keep_absence() {
    let mut store = sqlite_store();
    let deadlift = WorkoutEntry {
        reps: None,
        duration_seconds: None,
        weight: Some(142.75),
        notes: "belt on last set".into(),
        ..entry("Deadlift", 0)
    };
    let created = store
        .create_workout(workout("Pull", vec![deadlift]))
        .unwrap();

    let read = store.get_workout_by_id(created.id).unwrap();
    let e = &read.entries[0];
    assert_eq!(e.reps, None);
    assert_eq!(e.duration_seconds, None);
    assert_eq!(e.weight, Some(142.75));
    assert_eq!(e.notes, "belt on last set");
}

#[test]
fn failed_entry_insert_leaves_nothing_behind() {
    for k in 0..3 {
        let conn = open_sqlite_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TRIGGER fail_entry BEFORE INSERT ON workout_entries
             WHEN NEW.exercise = 'boom'
             BEGIN SELECT RAISE(ABORT, 'forced entry failure'); END;",
        )
        .unwrap();
        let mut store = SqliteWorkoutStore::new(conn);

        let mut entries = vec![entry("a", 0), entry("b", 1), entry("c", 2)];
        entries[k].exercise = "boom".into();

        let err = store
            .create_workout(workout("Doomed", entries))
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)), "k={k}: {err}");
        assert!(store.get_workout_by_id(1).unwrap_err().is_not_found());

        let conn = store.into_inner();
        assert_eq!(count(&conn, "workouts"), 0, "k={k}");
        assert_eq!(count(&conn, "workout_entries"), 0, "k={k}");
    }
}

#[test]
fn store_is_usable_after_a_rolled_back_create() {
    let conn = open_sqlite_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER fail_entry BEFORE INSERT ON workout_entries
         WHEN NEW.exercise = 'boom'
         BEGIN SELECT RAISE(ABORT, 'forced entry failure'); END;",
    )
    .unwrap();
    let mut store = SqliteWorkoutStore::new(conn);

    store
        .create_workout(workout("Doomed", vec![entry("boom", 0)]))
        .unwrap_err();
    let created = store.create_workout(leg_day()).unwrap();
    assert_eq!(
        store.get_workout_by_id(created.id).unwrap(),
        expected_read(&created)
    );
}

#[test]
fn missing_ids_are_not_found() {
    let mut store = sqlite_store();

    let err = store.get_workout_by_id(404).unwrap_err();
    assert!(matches!(
        err,
        StoreError::NotFound {
            record: Record::Workout,
            id: 404
        }
    ));

    let mut ghost = workout("Ghost", Vec::new());
    ghost.id = 404;
    assert!(store.update_workout(&ghost).unwrap_err().is_not_found());

    let mut ghost_entry = entry("Ghost", 0);
    ghost_entry.id = 404;
    assert!(matches!(
        store.update_workout_entry(&ghost_entry).unwrap_err(),
        StoreError::NotFound {
            record: Record::Entry,
            id: 404
        }
    ));

    assert!(store.delete_workout(404).unwrap_err().is_not_found());
    assert!(store.delete_workout_entry_by_id(404).unwrap_err().is_not_found());
}

#[test]
fn update_workout_changes_header_only() {
    let mut store = sqlite_store();
    let created = store.create_workout(leg_day()).unwrap();

    let mut header = created.clone();
    header.title = "Leg Day (heavy)".into();
    header.description = String::new();
    header.duration_minutes = 60;
    header.calories_burned = 420;
    header.entries.clear();
    store.update_workout(&header).unwrap();

    let read = store.get_workout_by_id(created.id).unwrap();
    assert_eq!(read.title, "Leg Day (heavy)");
    assert_eq!(read.description, "");
    assert_eq!(read.duration_minutes, 60);
    assert_eq!(read.calories_burned, 420);
    assert_eq!(read.entries, expected_read(&created).entries);
}

#[test]
fn update_entry_overwrites_fields_and_reorders() {
    let mut store = sqlite_store();
    let created = store.create_workout(leg_day()).unwrap();

    let mut squat = created.entries[0].clone();
    squat.order_index = 5;
    squat.reps = None;
    squat.weight = Some(100.0);
    squat.notes = "moved to the end".into();
    store.update_workout_entry(&squat).unwrap();

    let read = store.get_workout_by_id(created.id).unwrap();
    let names: Vec<&str> = read.entries.iter().map(|e| e.exercise.as_str()).collect();
    assert_eq!(names, ["Lunge", "Squat"]);
    assert_eq!(read.entries[1], squat);
}

#[test]
fn deleting_one_entry_leaves_siblings() {
    let mut store = sqlite_store();
    let created = store
        .create_workout(workout(
            "Push",
            vec![entry("Bench", 0), entry("Dip", 1), entry("Fly", 2)],
        ))
        .unwrap();

    store
        .delete_workout_entry_by_id(created.entries[1].id)
        .unwrap();

    let read = store.get_workout_by_id(created.id).unwrap();
    let mut expected = created.clone();
    expected.entries.remove(1);
    assert_eq!(read, expected);

    assert!(
        store
            .delete_workout_entry_by_id(created.entries[1].id)
            .unwrap_err()
            .is_not_found()
    );
}

#[test]
fn delete_workout_removes_entry_rows() {
    let mut store = sqlite_store();
    let doomed = store.create_workout(leg_day()).unwrap();
    let kept = store
        .create_workout(workout("Arms", vec![entry("Curl", 0)]))
        .unwrap();

    store.delete_workout(doomed.id).unwrap();

    assert!(store.get_workout_by_id(doomed.id).unwrap_err().is_not_found());
    assert_eq!(store.get_workout_by_id(kept.id).unwrap(), kept);

    let conn = store.into_inner();
    assert_eq!(count(&conn, "workouts"), 1);
    assert_eq!(count(&conn, "workout_entries"), 1);
}

#[test]
fn failed_header_delete_restores_entries() {
    let conn = open_sqlite_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TRIGGER keep_locked BEFORE DELETE ON workouts
         WHEN OLD.title = 'locked'
         BEGIN SELECT RAISE(ABORT, 'forced header delete failure'); END;",
    )
    .unwrap();
    let mut store = SqliteWorkoutStore::new(conn);

    let created = store
        .create_workout(workout("locked", vec![entry("a", 0), entry("b", 1)]))
        .unwrap();

    let err = store.delete_workout(created.id).unwrap_err();
    assert!(!err.is_not_found());

    assert_eq!(
        store.get_workout_by_id(created.id).unwrap(),
        expected_read(&created)
    );
}

#[test]
fn not_found_delete_rolls_back_entry_deletes() {
    // Orphans can only exist with foreign keys off; they stand in for entry
    // rows whose header is already gone.
    let conn = open_sqlite_in_memory().unwrap();
    conn.execute_batch(
        "PRAGMA foreign_keys = OFF;
         INSERT INTO workout_entries (workout_id, exercise, sets, notes, order_index)
         VALUES (77, 'orphan', 1, '', 0);
         PRAGMA foreign_keys = ON;",
    )
    .unwrap();
    let mut store = SqliteWorkoutStore::new(conn);

    assert!(store.delete_workout(77).unwrap_err().is_not_found());

    let conn = store.into_inner();
    assert_eq!(count(&conn, "workout_entries"), 1);
}
