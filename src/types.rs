use serde::{Deserialize, Serialize};

/// A logged workout session and the exercises performed in it.
///
/// `id` is assigned by storage on create; values supplied by callers are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub duration_minutes: i32,
    pub calories_burned: i32,
    #[serde(default)]
    pub entries: Vec<WorkoutEntry>,
}

/// One exercise inside a workout, ordered among its siblings by `order_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutEntry {
    #[serde(default)]
    pub id: i64,
    pub exercise: String,
    pub sets: i32,
    #[serde(default)]
    pub reps: Option<i32>,
    #[serde(default)]
    pub duration_seconds: Option<i32>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub order_index: i32,
}

impl Workout {
    /// Copy without any storage-assigned identifiers.
    #[must_use]
    pub fn without_ids(&self) -> Self {
        Self {
            id: 0,
            entries: self
                .entries
                .iter()
                .map(|e| WorkoutEntry { id: 0, ..e.clone() })
                .collect(),
            ..self.clone()
        }
    }
}
