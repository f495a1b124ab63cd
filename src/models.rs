use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{DayOfWeek, WorkoutKind};

/// Stable exercise id plus the name it had when referenced.
/// The name is a display snapshot; matching always uses `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExerciseIdentity {
    pub id: String,
    pub name: String,
}

impl ExerciseIdentity {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateExercise {
    pub order_index: u32,
    pub exercise: ExerciseIdentity,
    set_count: u32,
    rep_min: u32,
    rep_max: u32,
}

impl TemplateExercise {
    pub const MAX_SETS: u32 = 10;

    pub fn new(
        order_index: u32,
        exercise: ExerciseIdentity,
        set_count: u32,
        rep_min: u32,
        rep_max: u32,
    ) -> Result<Self, ValidationError> {
        Self::check_sets(set_count)?;
        Self::check_reps(rep_min, rep_max)?;
        Ok(Self {
            order_index,
            exercise,
            set_count,
            rep_min,
            rep_max,
        })
    }

    pub fn set_count(&self) -> u32 {
        self.set_count
    }

    pub fn rep_min(&self) -> u32 {
        self.rep_min
    }

    pub fn rep_max(&self) -> u32 {
        self.rep_max
    }

    pub fn set_set_count(&mut self, set_count: u32) -> Result<(), ValidationError> {
        Self::check_sets(set_count)?;
        self.set_count = set_count;
        Ok(())
    }

    pub fn set_rep_range(&mut self, min: u32, max: u32) -> Result<(), ValidationError> {
        Self::check_reps(min, max)?;
        self.rep_min = min;
        self.rep_max = max;
        Ok(())
    }

    fn check_sets(set_count: u32) -> Result<(), ValidationError> {
        if (1..=Self::MAX_SETS).contains(&set_count) {
            Ok(())
        } else {
            Err(ValidationError::SetCount(set_count))
        }
    }

    fn check_reps(min: u32, max: u32) -> Result<(), ValidationError> {
        if min == 0 || min > max {
            Err(ValidationError::RepRange { min, max })
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkoutTemplate {
    pub id: String,
    pub name: String,
    pub category: String,
    pub is_preset: bool,
    pub exercises: Vec<TemplateExercise>,
}

impl WorkoutTemplate {
    pub fn ordered_exercises(&self) -> Vec<&TemplateExercise> {
        let mut out: Vec<_> = self.exercises.iter().collect();
        out.sort_by_key(|e| e.order_index);
        out
    }
}

/// A scheduled weekday inside a program week. No template means rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramDay {
    pub day_of_week: DayOfWeek,
    pub template_id: Option<String>,
    pub name: Option<String>,
}

impl ProgramDay {
    pub fn training(day_of_week: DayOfWeek, template_id: impl Into<String>) -> Self {
        Self {
            day_of_week,
            template_id: Some(template_id.into()),
            name: None,
        }
    }

    pub fn rest(day_of_week: DayOfWeek) -> Self {
        Self {
            day_of_week,
            template_id: None,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn is_rest(&self) -> bool {
        self.template_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramWeek {
    week_number: u32,
    intensity_modifier: f64,
    volume_modifier: f64,
    is_deload: bool,
    pub days: Vec<ProgramDay>,
}

impl ProgramWeek {
    pub fn new(
        week_number: u32,
        intensity_modifier: f64,
        volume_modifier: f64,
        is_deload: bool,
    ) -> Result<Self, ValidationError> {
        for (field, value) in [("intensity", intensity_modifier), ("volume", volume_modifier)] {
            if value.is_nan() || value < 0.0 {
                return Err(ValidationError::NegativeModifier {
                    week: week_number,
                    field,
                    value,
                });
            }
        }
        if is_deload && (intensity_modifier >= 1.0 || volume_modifier >= 1.0) {
            return Err(ValidationError::DeloadNotReduced(week_number));
        }
        Ok(Self {
            week_number,
            intensity_modifier,
            volume_modifier,
            is_deload,
            days: Vec::new(),
        })
    }

    pub fn standard(week_number: u32) -> Self {
        Self {
            week_number,
            intensity_modifier: 1.0,
            volume_modifier: 1.0,
            is_deload: false,
            days: Vec::new(),
        }
    }

    pub fn with_days(mut self, days: Vec<ProgramDay>) -> Self {
        self.days = days;
        self
    }

    pub fn week_number(&self) -> u32 {
        self.week_number
    }

    pub fn intensity_modifier(&self) -> f64 {
        self.intensity_modifier
    }

    pub fn volume_modifier(&self) -> f64 {
        self.volume_modifier
    }

    pub fn is_deload(&self) -> bool {
        self.is_deload
    }

    pub fn day(&self, dow: DayOfWeek) -> Option<&ProgramDay> {
        self.days.iter().find(|d| d.day_of_week == dow)
    }
}

/// A multi-week plan. Presets are immutable; only the usage bookkeeping
/// changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingProgram {
    pub id: String,
    pub name: String,
    pub category: String,
    pub difficulty: String,
    pub is_preset: bool,
    pub weeks: Vec<ProgramWeek>,
    pub usage_count: u32,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl TrainingProgram {
    pub fn duration_weeks(&self) -> u32 {
        self.weeks.len() as u32
    }

    pub fn week(&self, week_number: u32) -> Option<&ProgramWeek> {
        self.weeks.iter().find(|w| w.week_number == week_number)
    }

    pub fn day(&self, week_number: u32, dow: DayOfWeek) -> Option<(&ProgramWeek, &ProgramDay)> {
        let week = self.week(week_number)?;
        week.day(dow).map(|d| (week, d))
    }

    pub fn template_ids(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.weeks
            .iter()
            .flat_map(|w| w.days.iter())
            .filter_map(|d| d.template_id.as_deref())
            .filter(|id| seen.insert(*id))
            .collect()
    }

    /// Week numbers contiguous from 1 and no weekday scheduled twice in a week.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty("program name"));
        }
        for (i, week) in self.weeks.iter().enumerate() {
            let expected = i as u32 + 1;
            if week.week_number != expected {
                return Err(ValidationError::WeekSequence {
                    expected,
                    found: week.week_number,
                });
            }
            let mut days = HashSet::new();
            for d in &week.days {
                if !days.insert(d.day_of_week) {
                    return Err(ValidationError::DuplicateDay {
                        week: week.week_number,
                        day: d.day_of_week.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    pub reps: u32,
    pub weight: f64,
    pub completed: bool,
}

impl WorkoutSet {
    pub fn done(weight: f64, reps: u32) -> Self {
        Self {
            reps,
            weight,
            completed: true,
        }
    }

    /// Only sets with real load and reps can set a record.
    pub fn is_pr_candidate(&self) -> bool {
        self.reps > 0 && self.weight > 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutExercise {
    pub exercise: ExerciseIdentity,
    pub order_index: u32,
    pub sets: Vec<WorkoutSet>,
}

impl WorkoutExercise {
    pub fn completed_sets(&self) -> impl Iterator<Item = &WorkoutSet> {
        self.sets.iter().filter(|s| s.completed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub date: DateTime<Utc>,
    pub kind: WorkoutKind,
    pub duration_minutes: u32,
    pub template_id: Option<String>,
    pub notes: Option<String>,
    pub rating: Option<u8>,
    pub exercises: Vec<WorkoutExercise>,
}

impl Workout {
    pub fn day(&self) -> NaiveDate {
        self.date.date_naive()
    }
}

/// A point where an exercise's best estimated 1RM went up. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalRecord {
    pub id: String,
    pub exercise: ExerciseIdentity,
    pub estimated_1rm: f64,
    pub weight: f64,
    pub reps: u32,
    pub achieved_at: DateTime<Utc>,
    pub workout_id: String,
}

/// Program-state fields of the single user profile.
///
/// `active_program_id`, `active_program_start` and `current_week` are
/// either all set or all empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub active_program_id: Option<String>,
    pub active_program_start: Option<DateTime<Utc>>,
    pub current_week: Option<u32>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn is_consistent(&self) -> bool {
        let set = [
            self.active_program_id.is_some(),
            self.active_program_start.is_some(),
            self.current_week.is_some(),
        ];
        let all_or_none = set.iter().all(|s| *s) || set.iter().all(|s| !*s);
        all_or_none && (self.completed_at.is_none() || self.active_program_id.is_some())
    }

    pub fn clear_program(&mut self) {
        self.active_program_id = None;
        self.active_program_start = None;
        self.current_week = None;
        self.completed_at = None;
    }
}
