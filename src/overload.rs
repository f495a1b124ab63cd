//! Progressive-overload suggestions.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::{
    ExerciseIdentity, PersonalRecord, TemplateExercise, Workout, WorkoutSet, WorkoutTemplate,
};
use crate::progression;
use crate::records;
use crate::storage::{PersonalRecordStore, ProgramStore, UserProfileStore, WorkoutStore};
use crate::utils::{percent_of_max, recommended_rep_range};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviousBest {
    pub workout_id: String,
    pub date: DateTime<Utc>,
    pub weight: f64,
    pub reps: u32,
}

/// Suggested load relative to the exercise's current PR.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntensityGuide {
    pub current_1rm: f64,
    pub percent_of_max: f64,
    pub recommended_reps: (u32, u32),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestedExercise {
    pub exercise: ExerciseIdentity,
    pub order_index: u32,
    pub set_count: u32,
    pub rep_min: u32,
    pub rep_max: u32,
    /// Unrounded; 0 when there is no history to build on.
    pub weight: f64,
    pub reps: u32,
    pub previous: Option<PreviousBest>,
    pub intensity: Option<IntensityGuide>,
}

impl SuggestedExercise {
    /// Prescribed sets scaled by a week's volume modifier, never below one.
    pub fn display_sets(&self, volume_modifier: f64) -> u32 {
        let scaled = (f64::from(self.set_count) * volume_modifier).round();
        if scaled.is_nan() || scaled < 1.0 {
            1
        } else {
            scaled as u32
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestedWorkout {
    pub template_id: String,
    pub template_name: String,
    pub week_modifier: f64,
    pub exercises: Vec<SuggestedExercise>,
}

fn completed_sets_of<'w>(
    workout: &'w Workout,
    exercise_id: &str,
) -> impl Iterator<Item = &'w WorkoutSet> {
    workout
        .exercises
        .iter()
        .filter(move |e| e.exercise.id == exercise_id)
        .flat_map(|e| e.completed_sets())
}

/// Heaviest completed set of `exercise_id` in the most recent workout that
/// has any. Equal weights go to more reps, then to the earlier set.
pub fn best_prior_set<'w>(
    exercise_id: &str,
    previous_workouts: &'w [Workout],
) -> Option<(&'w Workout, &'w WorkoutSet)> {
    let mut latest: Option<&Workout> = None;
    for w in previous_workouts {
        if completed_sets_of(w, exercise_id).next().is_none() {
            continue;
        }
        if latest.is_none_or(|l| w.date > l.date) {
            latest = Some(w);
        }
    }
    let session = latest?;

    let mut best: Option<&WorkoutSet> = None;
    for set in completed_sets_of(session, exercise_id) {
        let better = best.is_none_or(|b| {
            set.weight > b.weight || (set.weight == b.weight && set.reps > b.reps)
        });
        if better {
            best = Some(set);
        }
    }
    best.map(|set| (session, set))
}

fn suggest_exercise(
    te: &TemplateExercise,
    week_modifier: f64,
    previous_workouts: &[Workout],
) -> SuggestedExercise {
    let prior = best_prior_set(&te.exercise.id, previous_workouts);
    let (weight, previous) = match prior {
        Some((w, set)) => (
            set.weight * week_modifier,
            Some(PreviousBest {
                workout_id: w.id.clone(),
                date: w.date,
                weight: set.weight,
                reps: set.reps,
            }),
        ),
        None => (0.0, None),
    };

    SuggestedExercise {
        exercise: te.exercise.clone(),
        order_index: te.order_index,
        set_count: te.set_count(),
        rep_min: te.rep_min(),
        rep_max: te.rep_max(),
        weight,
        reps: te.rep_min(),
        previous,
        intensity: None,
    }
}

/// Per-exercise targets for `template` at `week_modifier`. Deterministic
/// in its inputs.
pub fn suggest(
    template: &WorkoutTemplate,
    week_modifier: f64,
    previous_workouts: &[Workout],
) -> SuggestedWorkout {
    let exercises = template
        .ordered_exercises()
        .into_iter()
        .map(|te| suggest_exercise(te, week_modifier, previous_workouts))
        .collect();

    SuggestedWorkout {
        template_id: template.id.clone(),
        template_name: template.name.clone(),
        week_modifier,
        exercises,
    }
}

/// `suggest`, with each loaded exercise placed against its current PR.
pub fn suggest_with_records(
    template: &WorkoutTemplate,
    week_modifier: f64,
    previous_workouts: &[Workout],
    records: &[PersonalRecord],
) -> SuggestedWorkout {
    let mut suggestion = suggest(template, week_modifier, previous_workouts);
    let current = records::current_records(records);

    for ex in &mut suggestion.exercises {
        let Some(pr) = current.iter().find(|r| r.exercise.id == ex.exercise.id) else {
            continue;
        };
        if ex.weight <= 0.0 {
            continue;
        }
        let pct = percent_of_max(ex.weight, pr.estimated_1rm);
        // Above the current max still means a max-effort rep range.
        let range = recommended_rep_range(pct.min(1.0));
        ex.intensity = Some(IntensityGuide {
            current_1rm: pr.estimated_1rm,
            percent_of_max: pct,
            recommended_reps: (*range.start(), *range.end()),
        });
    }
    suggestion
}

/// What the active program asks of the user on a given day.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum SessionPlan {
    NoActiveProgram,
    /// The program has no entry for this date.
    Unscheduled,
    Rest {
        week_number: u32,
    },
    /// The day names a template that no longer exists.
    MissingTemplate {
        week_number: u32,
        template_id: String,
    },
    Train {
        week_number: u32,
        volume_modifier: f64,
        is_deload: bool,
        suggestion: SuggestedWorkout,
    },
}

/// Session-start path: gather profile, history and records concurrently,
/// then resolve today's program day and suggest loads for it.
pub async fn plan_session(
    profiles: &dyn UserProfileStore,
    programs: &dyn ProgramStore,
    workouts: &dyn WorkoutStore,
    record_store: &dyn PersonalRecordStore,
    today: NaiveDate,
    recent_limit: usize,
) -> Result<SessionPlan> {
    let (profile, recent, records) = tokio::join!(
        profiles.fetch_or_create_profile(),
        workouts.fetch_recent_workouts(recent_limit),
        record_store.fetch_records(),
    );
    let (profile, recent, records) = (profile?, recent?, records?);

    let Some(program_id) = profile.active_program_id.as_deref() else {
        return Ok(SessionPlan::NoActiveProgram);
    };
    let Some(program) = programs.fetch_program(program_id).await? else {
        warn!(program_id, "active program is missing");
        return Ok(SessionPlan::NoActiveProgram);
    };
    let Some(scheduled) = progression::todays_workout(&profile, &program, today) else {
        return Ok(SessionPlan::Unscheduled);
    };
    let week_number = scheduled.week_number;

    let Some(template_id) = scheduled.day.template_id.as_deref() else {
        return Ok(SessionPlan::Rest { week_number });
    };
    let Some(template) = programs.fetch_template(template_id).await? else {
        warn!(template_id, program = %program.name, "scheduled template not found");
        return Ok(SessionPlan::MissingTemplate {
            week_number,
            template_id: template_id.to_string(),
        });
    };

    let suggestion = suggest_with_records(
        &template,
        scheduled.intensity_modifier(),
        &recent,
        &records,
    );
    debug!(
        template = %template.name,
        week_number,
        modifier = scheduled.intensity_modifier(),
        history = recent.len(),
        "session planned"
    );
    Ok(SessionPlan::Train {
        week_number,
        volume_modifier: scheduled.week.volume_modifier(),
        is_deload: scheduled.week.is_deload(),
        suggestion,
    })
}
