//! Personal-record detection.
//!
//! A record is written whenever a workout's best estimated 1RM for an
//! exercise strictly beats everything chronologically before it. History
//! is append-only so every step of an exercise's progression survives.

use std::collections::HashMap;

use anyhow::Result;
use itertools::Itertools;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{ExerciseIdentity, PersonalRecord, Workout, WorkoutSet};
use crate::storage::PersonalRecordStore;
use crate::types::{OneRmFormula, WorkoutKind};
use crate::utils::calculate_1rm;

/// The strongest candidate set of one exercise within a workout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestSet<'w> {
    pub exercise: &'w ExerciseIdentity,
    pub set: &'w WorkoutSet,
    pub estimated_1rm: f64,
}

/// Best completed candidate set per exercise, in the order exercises first
/// appear. Sets with no load or no reps never qualify. On equal e1RM the
/// earlier set is kept.
pub fn best_sets(workout: &Workout) -> Vec<BestSet<'_>> {
    let mut best: Vec<BestSet<'_>> = Vec::new();
    let exercises = workout.exercises.iter().sorted_by_key(|e| e.order_index);

    for we in exercises {
        for set in we.completed_sets().filter(|s| s.is_pr_candidate()) {
            let estimated_1rm = calculate_1rm(set.weight, set.reps, OneRmFormula::Brzycki);
            match best.iter_mut().find(|b| b.exercise.id == we.exercise.id) {
                Some(b) if estimated_1rm > b.estimated_1rm => {
                    *b = BestSet {
                        exercise: &we.exercise,
                        set,
                        estimated_1rm,
                    };
                }
                Some(_) => {}
                None => best.push(BestSet {
                    exercise: &we.exercise,
                    set,
                    estimated_1rm,
                }),
            }
        }
    }
    best
}

/// Highest e1RM per exercise id, optionally ignoring one workout's records.
pub fn all_time_best(
    records: &[PersonalRecord],
    excluding_workout: Option<&str>,
) -> HashMap<String, f64> {
    let mut best: HashMap<String, f64> = HashMap::new();
    for r in records
        .iter()
        .filter(|r| Some(r.workout_id.as_str()) != excluding_workout)
    {
        let entry = best.entry(r.exercise.id.clone()).or_insert(f64::MIN);
        *entry = entry.max(r.estimated_1rm);
    }
    best
}

/// New records `workout` sets against `prior_best`. Ties are not records.
pub fn detect(workout: &Workout, prior_best: &HashMap<String, f64>) -> Vec<PersonalRecord> {
    best_sets(workout)
        .into_iter()
        .filter(|b| {
            prior_best
                .get(&b.exercise.id)
                .is_none_or(|prior| b.estimated_1rm > *prior)
        })
        .map(|b| PersonalRecord {
            id: Uuid::new_v4().to_string(),
            exercise: b.exercise.clone(),
            estimated_1rm: b.estimated_1rm,
            weight: b.set.weight,
            reps: b.set.reps,
            achieved_at: workout.date,
            workout_id: workout.id.clone(),
        })
        .collect()
}

/// Rebuild the full record history by replaying lifting workouts oldest
/// first. Same-instant workouts keep their input order.
pub fn replay(workouts: &[Workout]) -> Vec<PersonalRecord> {
    let mut best: HashMap<String, f64> = HashMap::new();
    let mut records = Vec::new();

    for workout in workouts
        .iter()
        .filter(|w| w.kind == WorkoutKind::Lifting)
        .sorted_by_key(|w| w.date)
    {
        for record in detect(workout, &best) {
            best.insert(record.exercise.id.clone(), record.estimated_1rm);
            records.push(record);
        }
    }
    records
}

/// One record per exercise: the one with the highest e1RM. Ties go to the
/// earlier record. Sorted by exercise name.
pub fn current_records(records: &[PersonalRecord]) -> Vec<&PersonalRecord> {
    records
        .iter()
        .into_group_map_by(|r| r.exercise.id.as_str())
        .into_values()
        .filter_map(|group| {
            group.into_iter().reduce(|best, r| {
                if r.estimated_1rm > best.estimated_1rm {
                    r
                } else {
                    best
                }
            })
        })
        .sorted_by(|a, b| a.exercise.name.cmp(&b.exercise.name))
        .collect()
}

pub fn progression<'r>(records: &'r [PersonalRecord], exercise_id: &str) -> Vec<&'r PersonalRecord> {
    records
        .iter()
        .filter(|r| r.exercise.id == exercise_id)
        .sorted_by_key(|r| r.achieved_at)
        .collect()
}

/// Detect and persist the records a freshly logged workout sets. History
/// is compared without this workout's own earlier records, so re-saving a
/// workout never competes with itself.
pub async fn detect_and_save(
    store: &dyn PersonalRecordStore,
    workout: &Workout,
) -> Result<Vec<PersonalRecord>> {
    if workout.kind != WorkoutKind::Lifting {
        debug!(workout = %workout.id, kind = %workout.kind, "not a lifting workout; no PR check");
        return Ok(Vec::new());
    }

    let existing = store.fetch_records().await?;
    let prior = all_time_best(&existing, Some(&workout.id));
    let mut saved = Vec::new();

    for record in detect(workout, &prior) {
        let already_stored = existing.iter().any(|r| {
            r.workout_id == record.workout_id
                && r.exercise.id == record.exercise.id
                && r.estimated_1rm >= record.estimated_1rm
        });
        if already_stored {
            continue;
        }
        store.save_record(&record).await?;
        info!(
            exercise = %record.exercise.name,
            e1rm = record.estimated_1rm,
            weight = record.weight,
            reps = record.reps,
            "new personal record"
        );
        saved.push(record);
    }
    Ok(saved)
}

/// Clear and rebuild every record from `workouts` as one unit.
pub async fn recalculate_all(
    store: &dyn PersonalRecordStore,
    workouts: &[Workout],
) -> Result<Vec<PersonalRecord>> {
    let records = replay(workouts);
    store.replace_records(&records).await?;
    info!(
        workouts = workouts.len(),
        records = records.len(),
        "personal records recalculated"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::*;
    use crate::models::WorkoutExercise;
    use crate::storage::MemoryStore;

    fn squat() -> ExerciseIdentity {
        ExerciseIdentity::new("ex-squat", "Back Squat")
    }

    fn bench() -> ExerciseIdentity {
        ExerciseIdentity::new("ex-bench", "Bench Press")
    }

    fn at(day: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 17, 0, 0).unwrap() + Duration::days(day)
    }

    fn lifting(id: &str, day: i64, exercises: Vec<(ExerciseIdentity, Vec<WorkoutSet>)>) -> Workout {
        Workout {
            id: id.into(),
            date: at(day),
            kind: WorkoutKind::Lifting,
            duration_minutes: 60,
            template_id: None,
            notes: None,
            rating: None,
            exercises: exercises
                .into_iter()
                .enumerate()
                .map(|(i, (exercise, sets))| WorkoutExercise {
                    exercise,
                    order_index: i as u32,
                    sets,
                })
                .collect(),
        }
    }

    fn key(records: &[PersonalRecord]) -> Vec<(String, String, u64, u32)> {
        records
            .iter()
            .map(|r| {
                (
                    r.workout_id.clone(),
                    r.exercise.id.clone(),
                    r.estimated_1rm.to_bits(),
                    r.reps,
                )
            })
            .collect()
    }

    #[test]
    fn test_best_set_ignores_incomplete_and_malformed_sets() {
        let w = lifting(
            "w",
            0,
            vec![(
                squat(),
                vec![
                    WorkoutSet::done(100.0, 5),
                    WorkoutSet {
                        reps: 5,
                        weight: 140.0,
                        completed: false,
                    },
                    WorkoutSet::done(0.0, 20),
                    WorkoutSet::done(200.0, 0),
                ],
            )],
        );
        let best = best_sets(&w);
        assert_eq!(best.len(), 1);
        assert_eq!(best[0].set.weight, 100.0);
        assert!((best[0].estimated_1rm - 112.5).abs() < 1e-9);
    }

    #[test]
    fn test_best_set_tie_keeps_earliest() {
        // 100x1 and 100x1 tie; the first one wins.
        let w = lifting(
            "w",
            0,
            vec![(squat(), vec![WorkoutSet::done(100.0, 1), WorkoutSet::done(100.0, 1)])],
        );
        let best = best_sets(&w);
        assert!(std::ptr::eq(best[0].set, &w.exercises[0].sets[0]));
    }

    #[test]
    fn test_strict_improvement_only() {
        let prior = HashMap::from([("ex-squat".to_string(), 112.5)]);

        let equal = lifting("w1", 1, vec![(squat(), vec![WorkoutSet::done(100.0, 5)])]);
        assert!(detect(&equal, &prior).is_empty());

        let lower = lifting("w2", 1, vec![(squat(), vec![WorkoutSet::done(90.0, 5)])]);
        assert!(detect(&lower, &prior).is_empty());

        let higher = lifting("w3", 1, vec![(squat(), vec![WorkoutSet::done(102.5, 5)])]);
        let found = detect(&higher, &prior);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].weight, 102.5);
        assert_eq!(found[0].workout_id, "w3");
        assert_eq!(found[0].achieved_at, at(1));
    }

    #[test]
    fn test_independent_records_per_exercise() {
        let w = lifting(
            "w",
            0,
            vec![
                (squat(), vec![WorkoutSet::done(100.0, 5)]),
                (bench(), vec![WorkoutSet::done(80.0, 3)]),
            ],
        );
        let found = detect(&w, &HashMap::new());
        let ids: Vec<_> = found.iter().map(|r| r.exercise.id.as_str()).collect();
        assert_eq!(ids, ["ex-squat", "ex-bench"]);
    }

    #[test]
    fn test_replay_is_chronological() {
        // Given newest first; replay must still walk oldest first.
        let workouts = vec![
            lifting("w3", 3, vec![(squat(), vec![WorkoutSet::done(110.0, 5)])]),
            lifting("w2", 2, vec![(squat(), vec![WorkoutSet::done(100.0, 5)])]),
            lifting("w1", 1, vec![(squat(), vec![WorkoutSet::done(105.0, 5)])]),
        ];
        let records = replay(&workouts);
        let ids: Vec<_> = records.iter().map(|r| r.workout_id.as_str()).collect();
        assert_eq!(ids, ["w1", "w3"]);

        let current = current_records(&records);
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].workout_id, "w3");
        assert_eq!(progression(&records, "ex-squat").len(), 2);
        assert!(progression(&records, "ex-bench").is_empty());
    }

    #[test]
    fn test_replay_skips_non_lifting() {
        let mut cardio = lifting("c", 0, vec![(squat(), vec![WorkoutSet::done(100.0, 5)])]);
        cardio.kind = WorkoutKind::Cardio;
        assert!(replay(&[cardio]).is_empty());
    }

    #[tokio::test]
    async fn test_detect_and_save_excludes_own_records() {
        let store = MemoryStore::new();
        let first = lifting("w1", 0, vec![(squat(), vec![WorkoutSet::done(100.0, 5)])]);
        assert_eq!(detect_and_save(&store, &first).await.unwrap().len(), 1);

        // Saving the same workout again must not create a duplicate.
        assert!(detect_and_save(&store, &first).await.unwrap().is_empty());
        assert_eq!(store.fetch_records().await.unwrap().len(), 1);

        let tie = lifting("w2", 1, vec![(squat(), vec![WorkoutSet::done(100.0, 5)])]);
        assert!(detect_and_save(&store, &tie).await.unwrap().is_empty());

        let better = lifting("w3", 2, vec![(squat(), vec![WorkoutSet::done(100.0, 6)])]);
        assert_eq!(detect_and_save(&store, &better).await.unwrap().len(), 1);
        assert_eq!(store.fetch_records().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_recalculate_all_is_idempotent() {
        let store = MemoryStore::new();
        let workouts = vec![
            lifting("w1", 1, vec![(squat(), vec![WorkoutSet::done(100.0, 5)])]),
            lifting(
                "w2",
                2,
                vec![
                    (squat(), vec![WorkoutSet::done(95.0, 5)]),
                    (bench(), vec![WorkoutSet::done(70.0, 8)]),
                ],
            ),
            lifting("w3", 3, vec![(squat(), vec![WorkoutSet::done(105.0, 5)])]),
        ];

        recalculate_all(&store, &workouts).await.unwrap();
        let once = store.fetch_records().await.unwrap();
        recalculate_all(&store, &workouts).await.unwrap();
        let twice = store.fetch_records().await.unwrap();

        assert_eq!(once.len(), 3);
        assert_eq!(key(&once), key(&twice));
    }
}
