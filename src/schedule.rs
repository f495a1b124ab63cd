//! Calendar view: logged workouts merged with upcoming program days.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::models::{ProgramDay, TrainingProgram, Workout};
use crate::progression;

/// What the calendar needs to know about the active program.
/// `current_week` is carried for display; planning follows the calendar.
#[derive(Debug, Clone, Copy)]
pub struct ActiveSchedule<'a> {
    pub program: &'a TrainingProgram,
    pub start_date: NaiveDate,
    pub current_week: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalendarEntry<'a> {
    Completed {
        workout: &'a Workout,
    },
    Planned {
        day: &'a ProgramDay,
        week_number: u32,
        intensity_modifier: f64,
        is_deload: bool,
    },
    Rest {
        day: &'a ProgramDay,
        week_number: u32,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CalendarItem<'a> {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub entry: CalendarEntry<'a>,
}

impl CalendarItem<'_> {
    pub fn is_completed(&self) -> bool {
        matches!(self.entry, CalendarEntry::Completed { .. })
    }
}

/// Merge history with the program's plan for the next `window_days` days
/// (from today, inclusive). A date with a logged workout never also gets a
/// planned item. Output is sorted by date; same-day items keep input order.
pub fn merge<'a>(
    workouts: &'a [Workout],
    active: Option<ActiveSchedule<'a>>,
    today: NaiveDate,
    window_days: u32,
) -> Vec<CalendarItem<'a>> {
    let mut items: Vec<CalendarItem<'a>> = workouts
        .iter()
        .map(|workout| CalendarItem {
            date: workout.day(),
            entry: CalendarEntry::Completed { workout },
        })
        .collect();

    if let Some(active) = active {
        let logged: HashSet<NaiveDate> = workouts.iter().map(Workout::day).collect();
        let duration = active.program.duration_weeks();
        for offset in 0..window_days {
            let Some(date) = today.checked_add_signed(Duration::days(i64::from(offset))) else {
                break;
            };
            if progression::program_position(active.start_date, date)
                .is_some_and(|(week, _)| week > duration)
            {
                break;
            }
            if logged.contains(&date) {
                continue;
            }
            if let Some(entry) = planned_entry(&active, date) {
                items.push(CalendarItem { date, entry });
            }
        }
    }

    // Stable: workouts keep their relative order within a day.
    items.sort_by_key(|item| item.date);
    items
}

fn planned_entry<'a>(active: &ActiveSchedule<'a>, date: NaiveDate) -> Option<CalendarEntry<'a>> {
    let scheduled = progression::scheduled_day(active.program, active.start_date, date)?;
    Some(if scheduled.is_rest() {
        CalendarEntry::Rest {
            day: scheduled.day,
            week_number: scheduled.week_number,
        }
    } else {
        CalendarEntry::Planned {
            day: scheduled.day,
            week_number: scheduled.week_number,
            intensity_modifier: scheduled.intensity_modifier(),
            is_deload: scheduled.week.is_deload(),
        }
    })
}
