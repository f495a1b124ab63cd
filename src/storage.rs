//! Persistence seams the engines are driven through.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{
    ExerciseIdentity, PersonalRecord, TrainingProgram, UserProfile, Workout, WorkoutTemplate,
};
use crate::types::WorkoutKind;

#[async_trait]
pub trait WorkoutStore: Send + Sync {
    /// Every logged workout, oldest first.
    async fn fetch_workouts(&self) -> Result<Vec<Workout>>;

    /// The `limit` most recent workouts, newest first.
    async fn fetch_recent_workouts(&self, limit: usize) -> Result<Vec<Workout>>;

    async fn fetch_workouts_by_kind(&self, kind: WorkoutKind) -> Result<Vec<Workout>>;

    /// Insert or replace a workout together with its exercises and sets.
    async fn save_workout(&self, workout: &Workout) -> Result<()>;

    async fn delete_workout(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait PersonalRecordStore: Send + Sync {
    /// All records, oldest first.
    async fn fetch_records(&self) -> Result<Vec<PersonalRecord>>;

    async fn save_record(&self, record: &PersonalRecord) -> Result<()>;

    async fn clear_records(&self) -> Result<()>;

    /// Clear and reinsert as one unit: readers see either the old set or
    /// the new one, never a partial replay.
    async fn replace_records(&self, records: &[PersonalRecord]) -> Result<()>;
}

#[async_trait]
pub trait ProgramStore: Send + Sync {
    async fn fetch_program(&self, id: &str) -> Result<Option<TrainingProgram>>;

    async fn fetch_program_by_name(&self, name: &str) -> Result<Option<TrainingProgram>>;

    async fn fetch_programs(&self) -> Result<Vec<TrainingProgram>>;

    /// Store a program and the templates it references in one unit.
    async fn save_program(
        &self,
        program: &TrainingProgram,
        templates: &[WorkoutTemplate],
    ) -> Result<()>;

    /// Persist the bookkeeping fields (`usage_count`, `last_used_at`).
    async fn update_program(&self, program: &TrainingProgram) -> Result<()>;

    async fn delete_program(&self, id: &str) -> Result<()>;

    async fn fetch_template(&self, id: &str) -> Result<Option<WorkoutTemplate>>;

    async fn fetch_templates(&self) -> Result<Vec<WorkoutTemplate>>;

    async fn delete_template(&self, id: &str) -> Result<()>;
}

#[async_trait]
pub trait UserProfileStore: Send + Sync {
    async fn fetch_or_create_profile(&self) -> Result<UserProfile>;

    async fn persist_profile(&self, profile: &UserProfile) -> Result<()>;
}

#[async_trait]
pub trait ExerciseResolver: Send + Sync {
    async fn resolve_exercise(&self, id: &str) -> Result<Option<ExerciseIdentity>>;

    /// Case-insensitive exact name match.
    async fn find_exercise(&self, name: &str) -> Result<Option<ExerciseIdentity>>;

    async fn list_exercises(&self) -> Result<Vec<ExerciseIdentity>>;

    /// Insert if the name is new; returns the stored identity either way.
    async fn add_exercise(&self, exercise: &ExerciseIdentity) -> Result<ExerciseIdentity>;
}
