use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ExerciseResolver, PersonalRecordStore, ProgramStore, UserProfileStore, WorkoutStore};
use crate::models::{
    ExerciseIdentity, PersonalRecord, TrainingProgram, UserProfile, Workout, WorkoutTemplate,
};
use crate::types::WorkoutKind;

#[derive(Default)]
struct State {
    workouts: Vec<Workout>,
    records: Vec<PersonalRecord>,
    programs: BTreeMap<String, TrainingProgram>,
    templates: BTreeMap<String, WorkoutTemplate>,
    exercises: BTreeMap<String, ExerciseIdentity>,
    profile: Option<UserProfile>,
}

/// Process-local store behind one async mutex. Every operation takes the
/// lock for its whole duration, so batch writes are atomic to readers.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkoutStore for MemoryStore {
    async fn fetch_workouts(&self) -> Result<Vec<Workout>> {
        let state = self.state.lock().await;
        let mut out = state.workouts.clone();
        out.sort_by_key(|w| w.date);
        Ok(out)
    }

    async fn fetch_recent_workouts(&self, limit: usize) -> Result<Vec<Workout>> {
        let mut all = self.fetch_workouts().await?;
        all.reverse();
        all.truncate(limit);
        Ok(all)
    }

    async fn fetch_workouts_by_kind(&self, kind: WorkoutKind) -> Result<Vec<Workout>> {
        let mut all = self.fetch_workouts().await?;
        all.retain(|w| w.kind == kind);
        Ok(all)
    }

    async fn save_workout(&self, workout: &Workout) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.workouts.iter_mut().find(|w| w.id == workout.id) {
            Some(existing) => *existing = workout.clone(),
            None => state.workouts.push(workout.clone()),
        }
        Ok(())
    }

    async fn delete_workout(&self, id: &str) -> Result<()> {
        self.state.lock().await.workouts.retain(|w| w.id != id);
        Ok(())
    }
}

#[async_trait]
impl PersonalRecordStore for MemoryStore {
    async fn fetch_records(&self) -> Result<Vec<PersonalRecord>> {
        let mut out = self.state.lock().await.records.clone();
        out.sort_by_key(|r| r.achieved_at);
        Ok(out)
    }

    async fn save_record(&self, record: &PersonalRecord) -> Result<()> {
        self.state.lock().await.records.push(record.clone());
        Ok(())
    }

    async fn clear_records(&self) -> Result<()> {
        self.state.lock().await.records.clear();
        Ok(())
    }

    async fn replace_records(&self, records: &[PersonalRecord]) -> Result<()> {
        self.state.lock().await.records = records.to_vec();
        Ok(())
    }
}

#[async_trait]
impl ProgramStore for MemoryStore {
    async fn fetch_program(&self, id: &str) -> Result<Option<TrainingProgram>> {
        Ok(self.state.lock().await.programs.get(id).cloned())
    }

    async fn fetch_program_by_name(&self, name: &str) -> Result<Option<TrainingProgram>> {
        let state = self.state.lock().await;
        Ok(state.programs.values().find(|p| p.name == name).cloned())
    }

    async fn fetch_programs(&self) -> Result<Vec<TrainingProgram>> {
        let state = self.state.lock().await;
        let mut out: Vec<_> = state.programs.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn save_program(
        &self,
        program: &TrainingProgram,
        templates: &[WorkoutTemplate],
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        for t in templates {
            for ex in &t.exercises {
                state
                    .exercises
                    .entry(ex.exercise.id.clone())
                    .or_insert_with(|| ex.exercise.clone());
            }
            state.templates.insert(t.id.clone(), t.clone());
        }
        state.programs.insert(program.id.clone(), program.clone());
        Ok(())
    }

    async fn update_program(&self, program: &TrainingProgram) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(existing) = state.programs.get_mut(&program.id) {
            existing.usage_count = program.usage_count;
            existing.last_used_at = program.last_used_at;
        }
        Ok(())
    }

    async fn delete_program(&self, id: &str) -> Result<()> {
        self.state.lock().await.programs.remove(id);
        Ok(())
    }

    async fn fetch_template(&self, id: &str) -> Result<Option<WorkoutTemplate>> {
        Ok(self.state.lock().await.templates.get(id).cloned())
    }

    async fn fetch_templates(&self) -> Result<Vec<WorkoutTemplate>> {
        Ok(self.state.lock().await.templates.values().cloned().collect())
    }

    async fn delete_template(&self, id: &str) -> Result<()> {
        self.state.lock().await.templates.remove(id);
        Ok(())
    }
}

#[async_trait]
impl UserProfileStore for MemoryStore {
    async fn fetch_or_create_profile(&self) -> Result<UserProfile> {
        let mut state = self.state.lock().await;
        Ok(state.profile.get_or_insert_with(UserProfile::default).clone())
    }

    async fn persist_profile(&self, profile: &UserProfile) -> Result<()> {
        self.state.lock().await.profile = Some(profile.clone());
        Ok(())
    }
}

#[async_trait]
impl ExerciseResolver for MemoryStore {
    async fn resolve_exercise(&self, id: &str) -> Result<Option<ExerciseIdentity>> {
        Ok(self.state.lock().await.exercises.get(id).cloned())
    }

    async fn find_exercise(&self, name: &str) -> Result<Option<ExerciseIdentity>> {
        let state = self.state.lock().await;
        Ok(state
            .exercises
            .values()
            .find(|e| e.name.eq_ignore_ascii_case(name.trim()))
            .cloned())
    }

    async fn list_exercises(&self) -> Result<Vec<ExerciseIdentity>> {
        let state = self.state.lock().await;
        let mut out: Vec<_> = state.exercises.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn add_exercise(&self, exercise: &ExerciseIdentity) -> Result<ExerciseIdentity> {
        if let Some(existing) = self.find_exercise(&exercise.name).await? {
            return Ok(existing);
        }
        let mut state = self.state.lock().await;
        state
            .exercises
            .insert(exercise.id.clone(), exercise.clone());
        Ok(exercise.clone())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;

    fn workout(id: &str, days: i64, kind: WorkoutKind) -> Workout {
        Workout {
            id: id.into(),
            date: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + Duration::days(days),
            kind,
            duration_minutes: 60,
            template_id: None,
            notes: None,
            rating: None,
            exercises: vec![],
        }
    }

    #[tokio::test]
    async fn test_workouts_are_ordered_and_filtered() {
        let store = MemoryStore::new();
        store.save_workout(&workout("b", 2, WorkoutKind::Cardio)).await.unwrap();
        store.save_workout(&workout("a", 0, WorkoutKind::Lifting)).await.unwrap();
        store.save_workout(&workout("c", 5, WorkoutKind::Lifting)).await.unwrap();

        let ids: Vec<_> = store.fetch_workouts().await.unwrap().into_iter().map(|w| w.id).collect();
        assert_eq!(ids, ["a", "b", "c"]);

        let recent: Vec<_> = store
            .fetch_recent_workouts(2)
            .await
            .unwrap()
            .into_iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(recent, ["c", "b"]);

        let lifting = store.fetch_workouts_by_kind(WorkoutKind::Lifting).await.unwrap();
        assert_eq!(lifting.len(), 2);

        store.delete_workout("a").await.unwrap();
        assert_eq!(store.fetch_workouts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_save_workout_replaces_by_id() {
        let store = MemoryStore::new();
        let mut w = workout("a", 0, WorkoutKind::Lifting);
        store.save_workout(&w).await.unwrap();
        w.notes = Some("felt heavy".into());
        store.save_workout(&w).await.unwrap();
        let all = store.fetch_workouts().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].notes.as_deref(), Some("felt heavy"));
    }

    #[tokio::test]
    async fn test_profile_is_created_once() {
        let store = MemoryStore::new();
        let mut p = store.fetch_or_create_profile().await.unwrap();
        assert_eq!(p, UserProfile::default());
        p.active_program_id = Some("x".into());
        p.active_program_start = Some(Utc::now());
        p.current_week = Some(1);
        store.persist_profile(&p).await.unwrap();
        assert_eq!(store.fetch_or_create_profile().await.unwrap(), p);
    }

    #[tokio::test]
    async fn test_add_exercise_is_idempotent_by_name() {
        let store = MemoryStore::new();
        let first = store
            .add_exercise(&ExerciseIdentity::new("ex-1", "Deadlift"))
            .await
            .unwrap();
        let again = store
            .add_exercise(&ExerciseIdentity::new("ex-2", "deadlift"))
            .await
            .unwrap();
        assert_eq!(first, again);
        assert_eq!(store.list_exercises().await.unwrap().len(), 1);
        assert!(store.resolve_exercise("ex-2").await.unwrap().is_none());
    }
}
