use std::collections::HashMap;

use anyhow::Result;
use chrono::{Duration, NaiveDate, Utc};
use colored::Colorize;
use ironplan::{
    progression,
    schedule::{self, ActiveSchedule, CalendarEntry, CalendarItem},
    storage::{ProgramStore, SqliteStore, WorkoutStore},
    types::{DayOfWeek, OutputFmt, emit},
    utils::format_duration,
};

pub async fn handle(days: u32, store: &SqliteStore, fmt: OutputFmt) -> Result<()> {
    let today = Utc::now().date_naive();
    let workouts = store.fetch_workouts().await?;
    let active = progression::load_active(store, store).await?;

    let schedule = active.as_ref().and_then(|(profile, program)| {
        Some(ActiveSchedule {
            program,
            start_date: profile.active_program_start?.date_naive(),
            current_week: profile.current_week?,
        })
    });
    let items = schedule::merge(&workouts, schedule, today, days);

    let template_names: HashMap<String, String> = store
        .fetch_templates()
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();

    let since = history_start(today, days);
    emit(fmt, &items, || pretty_print(&items, &template_names, since));
    Ok(())
}

/// Earliest date shown: `days` back from today, or the start of the calendar.
fn history_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_signed(Duration::days(i64::from(days)))
        .unwrap_or(NaiveDate::MIN)
}

fn pretty_print(
    items: &[CalendarItem<'_>],
    template_names: &HashMap<String, String>,
    since: NaiveDate,
) {
    let shown: Vec<_> = items.iter().filter(|i| i.date >= since).collect();
    if shown.is_empty() {
        println!("{}", "  (nothing logged or planned)".dimmed());
        return;
    }

    println!("{}", "Calendar:".cyan().bold());
    for item in shown {
        let date = format!("{} {}", DayOfWeek::of(item.date).short(), item.date.format("%Y-%m-%d"));
        match &item.entry {
            CalendarEntry::Completed { workout } => {
                let label = workout
                    .template_id
                    .as_ref()
                    .and_then(|id| template_names.get(id))
                    .cloned()
                    .unwrap_or_else(|| workout.kind.to_string());
                println!(
                    "  {}  {} {} ({})",
                    date.green(),
                    "✓".green().bold(),
                    label.bold(),
                    format_duration(Duration::minutes(i64::from(workout.duration_minutes)))
                );
            }
            CalendarEntry::Planned {
                day,
                week_number,
                intensity_modifier,
                is_deload,
            } => {
                let label = day
                    .name
                    .clone()
                    .or_else(|| {
                        day.template_id
                            .as_ref()
                            .and_then(|id| template_names.get(id))
                            .cloned()
                    })
                    .unwrap_or_else(|| "(missing template)".into());
                let deload = if *is_deload { " deload" } else { "" };
                println!(
                    "  {}  {} {} {}",
                    date.yellow(),
                    "•".yellow(),
                    label,
                    format!("(week {week_number}{deload}, ×{intensity_modifier:.3})").dimmed()
                );
            }
            CalendarEntry::Rest { week_number, .. } => {
                println!(
                    "  {}  {}",
                    date.dimmed(),
                    format!("rest (week {week_number})").dimmed()
                );
            }
        }
    }
}
