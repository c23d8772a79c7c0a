//! Request routing and handlers, independent of the HTTP transport.
//!
//! Handlers only translate between JSON and store calls; `NotFound` maps to
//! 404 and every other store failure to a generic 500.

use crate::error::StoreError;
use crate::store::WorkoutStore;
use crate::types::{Workout, WorkoutEntry};
use serde::Serialize;
use serde_json::json;
use tiny_http::Method;

const HEALTH_BODY: &str = "setbook is up";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl ApiResponse {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self {
                status,
                content_type: "application/json",
                body,
            },
            Err(e) => {
                tracing::error!(err = %e, "failed to encode response");
                Self::error(500, "failed to encode response")
            }
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: json!({ "error": message }).to_string().into_bytes(),
        }
    }

    fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            body: body.as_bytes().to_vec(),
        }
    }

    const fn no_content() -> Self {
        Self {
            status: 204,
            content_type: "text/plain; charset=utf-8",
            body: Vec::new(),
        }
    }
}

/// Resource a path resolved to, before method dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resource<'a> {
    Health,
    Workouts,
    Workout(&'a str),
    Entry(&'a str),
}

fn resource(url: &str) -> Option<Resource<'_>> {
    let path = url.split_once('?').map_or(url, |(p, _)| p);
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["health"] => Some(Resource::Health),
        ["workouts"] => Some(Resource::Workouts),
        ["workouts", id] => Some(Resource::Workout(*id)),
        ["workout-entries", id] => Some(Resource::Entry(*id)),
        _ => None,
    }
}

/// Identifiers in paths must be positive integers.
fn parse_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

pub fn handle<S>(store: &mut S, method: &Method, url: &str, body: &[u8]) -> ApiResponse
where
    S: WorkoutStore + ?Sized,
{
    let Some(res) = resource(url) else {
        return ApiResponse::error(404, "no such route");
    };

    match (res, method) {
        (Resource::Health, Method::Get) => ApiResponse::text(200, HEALTH_BODY),
        (Resource::Workouts, Method::Post) => create_workout(store, body),
        (Resource::Workout(raw), Method::Get) => {
            with_id(raw, "invalid workout id", |id| get_workout(store, id))
        }
        (Resource::Workout(raw), Method::Put) => {
            with_id(raw, "invalid workout id", |id| update_workout(store, id, body))
        }
        (Resource::Workout(raw), Method::Delete) => {
            with_id(raw, "invalid workout id", |id| delete_workout(store, id))
        }
        (Resource::Entry(raw), Method::Put) => {
            with_id(raw, "invalid entry id", |id| update_entry(store, id, body))
        }
        (Resource::Entry(raw), Method::Delete) => {
            with_id(raw, "invalid entry id", |id| delete_entry(store, id))
        }
        _ => ApiResponse::error(405, "method not allowed"),
    }
}

fn with_id(raw: &str, message: &str, f: impl FnOnce(i64) -> ApiResponse) -> ApiResponse {
    parse_id(raw).map_or_else(|| ApiResponse::error(400, message), f)
}

/// 404 for `NotFound`, 500 for anything else.
fn store_failure(err: &StoreError, not_found: &str, failed: &str) -> ApiResponse {
    if err.is_not_found() {
        crate::dlog!(err = %err, "not found");
        ApiResponse::error(404, not_found)
    } else {
        tracing::error!(err = %err, "{failed}");
        ApiResponse::error(500, failed)
    }
}

fn create_workout<S: WorkoutStore + ?Sized>(store: &mut S, body: &[u8]) -> ApiResponse {
    let workout: Workout = match serde_json::from_slice(body) {
        Ok(w) => w,
        Err(e) => {
            crate::dlog!(err = %e, "rejecting workout payload");
            return ApiResponse::error(400, "invalid workout payload");
        }
    };

    match store.create_workout(workout.without_ids()) {
        Ok(created) => ApiResponse::json(201, &created),
        Err(e) => {
            tracing::error!(err = %e, "workout creation failed");
            ApiResponse::error(500, "failed to create workout")
        }
    }
}

fn get_workout<S: WorkoutStore + ?Sized>(store: &mut S, id: i64) -> ApiResponse {
    match store.get_workout_by_id(id) {
        Ok(workout) => ApiResponse::json(200, &workout),
        Err(e) => store_failure(&e, "workout not found", "failed to fetch workout"),
    }
}

fn update_workout<S: WorkoutStore + ?Sized>(store: &mut S, id: i64, body: &[u8]) -> ApiResponse {
    let mut workout: Workout = match serde_json::from_slice(body) {
        Ok(w) => w,
        Err(_) => return ApiResponse::error(400, "invalid workout payload"),
    };
    workout.id = id;

    if let Err(e) = store.update_workout(&workout) {
        return store_failure(&e, "workout not found", "failed to update workout");
    }
    ApiResponse::no_content()
}

fn update_entry<S: WorkoutStore + ?Sized>(store: &mut S, id: i64, body: &[u8]) -> ApiResponse {
    let mut entry: WorkoutEntry = match serde_json::from_slice(body) {
        Ok(e) => e,
        Err(_) => return ApiResponse::error(400, "invalid workout entry payload"),
    };
    entry.id = id;

    match store.update_workout_entry(&entry) {
        Ok(()) => ApiResponse::no_content(),
        Err(e) => store_failure(&e, "workout entry not found", "failed to update workout entry"),
    }
}

fn delete_workout<S: WorkoutStore + ?Sized>(store: &mut S, id: i64) -> ApiResponse {
    match store.delete_workout(id) {
        Ok(()) => ApiResponse::no_content(),
        Err(e) => store_failure(&e, "workout not found", "failed to delete workout"),
    }
}

fn delete_entry<S: WorkoutStore + ?Sized>(store: &mut S, id: i64) -> ApiResponse {
    match store.delete_workout_entry_by_id(id) {
        Ok(()) => ApiResponse::no_content(),
        Err(e) => store_failure(&e, "workout entry not found", "failed to delete workout entry"),
    }
}
