//! Active-program state machine.

use anyhow::{Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ProgramStateError, ValidationError};
use crate::models::{ProgramDay, ProgramWeek, TrainingProgram, UserProfile};
use crate::storage::{ProgramStore, UserProfileStore};
use crate::types::DayOfWeek;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProgramState {
    Inactive,
    Active { week: u32 },
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvanceOutcome {
    Advanced(u32),
    /// The final week was finished; the stored week stays put.
    Completed,
    AlreadyCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScheduledDay<'p> {
    pub week_number: u32,
    pub week: &'p ProgramWeek,
    pub day: &'p ProgramDay,
}

impl ScheduledDay<'_> {
    pub fn intensity_modifier(&self) -> f64 {
        self.week.intensity_modifier()
    }

    pub fn is_rest(&self) -> bool {
        self.day.is_rest()
    }
}

/// Week number and weekday of `date` for a program started on `start`.
/// Dates before the start have no position.
pub fn program_position(start: NaiveDate, date: NaiveDate) -> Option<(u32, DayOfWeek)> {
    let days = (date - start).num_days();
    if days < 0 {
        return None;
    }
    Some(((days / 7) as u32 + 1, DayOfWeek::of(date)))
}

pub fn scheduled_day(
    program: &TrainingProgram,
    start: NaiveDate,
    date: NaiveDate,
) -> Option<ScheduledDay<'_>> {
    let (week_number, dow) = program_position(start, date)?;
    let (week, day) = program.day(week_number, dow)?;
    Some(ScheduledDay {
        week_number,
        week,
        day,
    })
}

fn is_active_for(profile: &UserProfile, program: &TrainingProgram) -> bool {
    profile.active_program_id.as_deref() == Some(program.id.as_str())
}

pub fn state(profile: &UserProfile, program: Option<&TrainingProgram>) -> ProgramState {
    match (profile.current_week, program) {
        (Some(week), Some(p)) if is_active_for(profile, p) => {
            if is_completed(profile, p) {
                ProgramState::Completed
            } else {
                ProgramState::Active { week }
            }
        }
        _ => ProgramState::Inactive,
    }
}

/// Start `program` at week 1. Only valid while no program is active.
pub fn activate(
    profile: &mut UserProfile,
    program: &mut TrainingProgram,
    now: DateTime<Utc>,
) -> Result<(), ProgramStateError> {
    if let Some(active) = &profile.active_program_id {
        return Err(ProgramStateError::AlreadyActive {
            active: active.clone(),
        });
    }
    if program.weeks.is_empty() {
        return Err(ProgramStateError::EmptyProgram(program.name.clone()));
    }

    profile.active_program_id = Some(program.id.clone());
    profile.active_program_start = Some(now);
    profile.current_week = Some(1);
    profile.completed_at = None;

    program.usage_count += 1;
    program.last_used_at = Some(now);
    Ok(())
}

/// Move the stored week forward by one. At the final week the program is
/// marked completed instead; the stored week never exceeds the duration.
pub fn advance_week(
    profile: &mut UserProfile,
    program: &TrainingProgram,
    now: DateTime<Utc>,
) -> Result<AdvanceOutcome, ProgramStateError> {
    let week = match profile.current_week {
        Some(w) if is_active_for(profile, program) => w,
        _ => return Err(ProgramStateError::NotActive),
    };

    if is_completed(profile, program) {
        return Ok(AdvanceOutcome::AlreadyCompleted);
    }
    if week < program.duration_weeks() {
        profile.current_week = Some(week + 1);
        Ok(AdvanceOutcome::Advanced(week + 1))
    } else {
        profile.completed_at = Some(now);
        Ok(AdvanceOutcome::Completed)
    }
}

pub fn deactivate(profile: &mut UserProfile) {
    profile.clear_program();
}

pub fn is_completed(profile: &UserProfile, program: &TrainingProgram) -> bool {
    if !is_active_for(profile, program) {
        return false;
    }
    profile.completed_at.is_some()
        || profile
            .current_week
            .is_some_and(|w| w > program.duration_weeks())
}

/// Share of the program behind the user, in [0, 1].
pub fn progress_percentage(profile: &UserProfile, program: &TrainingProgram) -> f64 {
    let duration = program.duration_weeks();
    match profile.current_week {
        _ if is_completed(profile, program) => 1.0,
        Some(week) if duration > 0 && is_active_for(profile, program) => {
            (f64::from(week.saturating_sub(1)) / f64::from(duration)).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

/// The program day scheduled for `today`, from elapsed calendar time.
/// Independent of the stored week.
pub fn todays_workout<'p>(
    profile: &UserProfile,
    program: &'p TrainingProgram,
    today: NaiveDate,
) -> Option<ScheduledDay<'p>> {
    if !is_active_for(profile, program) {
        return None;
    }
    let start = profile.active_program_start?.date_naive();
    scheduled_day(program, start, today)
}

pub fn calendar_week(profile: &UserProfile, today: NaiveDate) -> Option<u32> {
    let start = profile.active_program_start?.date_naive();
    program_position(start, today).map(|(w, _)| w)
}

/// Set the stored week to the calendar week, capped at the program length.
pub fn sync_to_calendar(
    profile: &mut UserProfile,
    program: &TrainingProgram,
    today: NaiveDate,
) -> Result<u32, ProgramStateError> {
    if !is_active_for(profile, program) {
        return Err(ProgramStateError::NotActive);
    }
    let week = calendar_week(profile, today)
        .unwrap_or(1)
        .clamp(1, program.duration_weeks().max(1));
    profile.current_week = Some(week);
    Ok(week)
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgramStatus {
    pub program_id: String,
    pub program_name: String,
    pub started_on: Option<NaiveDate>,
    pub state: ProgramState,
    pub current_week: u32,
    pub calendar_week: Option<u32>,
    pub duration_weeks: u32,
    pub progress: f64,
    pub is_behind_schedule: bool,
}

pub fn status(profile: &UserProfile, program: &TrainingProgram, today: NaiveDate) -> ProgramStatus {
    let current_week = profile.current_week.unwrap_or(0);
    let calendar_week = calendar_week(profile, today);
    ProgramStatus {
        program_id: program.id.clone(),
        program_name: program.name.clone(),
        started_on: profile.active_program_start.map(|s| s.date_naive()),
        state: state(profile, Some(program)),
        current_week,
        calendar_week,
        duration_weeks: program.duration_weeks(),
        progress: progress_percentage(profile, program),
        is_behind_schedule: calendar_week
            .is_some_and(|cw| cw.min(program.duration_weeks()) > current_week),
    }
}

//
// Store-backed operations.
//

/// The profile and the program it points at. A dangling pointer (program
/// deleted elsewhere) is cleared and reported as no active program.
pub async fn load_active(
    programs: &dyn ProgramStore,
    profiles: &dyn UserProfileStore,
) -> Result<Option<(UserProfile, TrainingProgram)>> {
    let mut profile = profiles.fetch_or_create_profile().await?;
    let Some(id) = profile.active_program_id.clone() else {
        return Ok(None);
    };
    match programs.fetch_program(&id).await? {
        Some(program) => Ok(Some((profile, program))),
        None => {
            warn!(program_id = %id, "active program no longer exists; clearing it");
            profile.clear_program();
            profiles.persist_profile(&profile).await?;
            Ok(None)
        }
    }
}

pub async fn activate_program(
    programs: &dyn ProgramStore,
    profiles: &dyn UserProfileStore,
    program_id: &str,
    now: DateTime<Utc>,
) -> Result<TrainingProgram> {
    // Resolve a dangling pointer first so it cannot block activation.
    let mut profile = match load_active(programs, profiles).await? {
        Some((profile, _)) => profile,
        None => profiles.fetch_or_create_profile().await?,
    };
    let Some(mut program) = programs.fetch_program(program_id).await? else {
        bail!("no program with id `{program_id}`");
    };

    activate(&mut profile, &mut program, now)?;
    profiles.persist_profile(&profile).await?;
    programs.update_program(&program).await?;

    info!(program = %program.name, weeks = program.duration_weeks(), "program activated");
    Ok(program)
}

pub async fn advance_active(
    programs: &dyn ProgramStore,
    profiles: &dyn UserProfileStore,
    now: DateTime<Utc>,
) -> Result<AdvanceOutcome> {
    let Some((mut profile, program)) = load_active(programs, profiles).await? else {
        return Err(ProgramStateError::NotActive.into());
    };
    let outcome = advance_week(&mut profile, &program, now)?;
    if outcome != AdvanceOutcome::AlreadyCompleted {
        profiles.persist_profile(&profile).await?;
    }
    info!(program = %program.name, ?outcome, "advanced program week");
    Ok(outcome)
}

pub async fn deactivate_active(profiles: &dyn UserProfileStore) -> Result<Option<String>> {
    let mut profile = profiles.fetch_or_create_profile().await?;
    let previous = profile.active_program_id.clone();
    deactivate(&mut profile);
    profiles.persist_profile(&profile).await?;
    debug!(?previous, "program deactivated");
    Ok(previous)
}

pub async fn sync_active(
    programs: &dyn ProgramStore,
    profiles: &dyn UserProfileStore,
    today: NaiveDate,
) -> Result<u32> {
    let Some((mut profile, program)) = load_active(programs, profiles).await? else {
        return Err(ProgramStateError::NotActive.into());
    };
    let week = sync_to_calendar(&mut profile, &program, today)?;
    profiles.persist_profile(&profile).await?;
    info!(program = %program.name, week, "stored week synced to calendar");
    Ok(week)
}

/// Delete a user program. Clears the profile's pointer if it was active.
pub async fn delete_program(
    programs: &dyn ProgramStore,
    profiles: &dyn UserProfileStore,
    program_id: &str,
) -> Result<()> {
    let Some(program) = programs.fetch_program(program_id).await? else {
        bail!("no program with id `{program_id}`");
    };
    if program.is_preset {
        return Err(ValidationError::PresetImmutable(program.name).into());
    }

    programs.delete_program(program_id).await?;

    let mut profile = profiles.fetch_or_create_profile().await?;
    if profile.active_program_id.as_deref() == Some(program_id) {
        profile.clear_program();
        profiles.persist_profile(&profile).await?;
        info!(program = %program.name, "deleted the active program; profile cleared");
    }
    Ok(())
}
