#![allow(dead_code)]

use setbook::sqlite::open_sqlite_in_memory;
use setbook::{SqliteWorkoutStore, Workout, WorkoutEntry};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};

pub fn entry(exercise: &str, order_index: i32) -> WorkoutEntry {
    WorkoutEntry {
        id: 0,
        exercise: exercise.to_string(),
        sets: 3,
        reps: Some(10),
        duration_seconds: None,
        weight: None,
        notes: String::new(),
        order_index,
    }
}

pub fn workout(title: &str, entries: Vec<WorkoutEntry>) -> Workout {
    Workout {
        id: 0,
        title: title.to_string(),
        description: format!("{title} session"),
        duration_minutes: 45,
        calories_burned: 300,
        entries,
    }
}

/// The "Leg Day" example: Squat with reps, then a timed Lunge without reps.
pub fn leg_day() -> Workout {
    let lunge = WorkoutEntry {
        reps: None,
        duration_seconds: Some(60),
        ..entry("Lunge", 1)
    };
    workout("Leg Day", vec![entry("Squat", 0), lunge])
}

pub fn sqlite_store() -> SqliteWorkoutStore {
    SqliteWorkoutStore::new(open_sqlite_in_memory().expect("in-memory sqlite"))
}

/// What a read should return for `created`: entries by order index, ties by id.
pub fn expected_read(created: &Workout) -> Workout {
    let mut expected = created.clone();
    expected
        .entries
        .sort_by_key(|e| (e.order_index, e.id));
    expected
}

/// One HTTP/1.0 exchange; returns the status code and the response body.
pub fn send(addr: SocketAddr, method: &str, path: &str, body: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).unwrap();
    write!(
        stream,
        "{method} {path} HTTP/1.0\r\nHost: localhost\r\nConnection: close\r\n\
         Content-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
    .unwrap();

    let mut raw = String::new();
    stream.read_to_string(&mut raw).unwrap();

    let status = raw
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap();
    let body = raw
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_default();
    (status, body)
}
