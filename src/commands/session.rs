use std::fs::read_to_string;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use colored::Colorize;
use ironplan::{
    models::{PersonalRecord, Workout, WorkoutExercise, WorkoutSet},
    overload::{self, SessionPlan, SuggestedWorkout},
    progression, records,
    storage::{ExerciseResolver, PersonalRecordStore, ProgramStore, SqliteStore, WorkoutStore},
    types::{Config, OutputFmt, WorkoutKind, best_name_suggestion, emit},
    utils::{format_duration, round_to_increment},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cli::SessionCmd;

/// How much history the suggestion engine looks at.
const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
struct WorkoutToml {
    date: Option<DateTime<Utc>>,
    #[serde(default = "default_kind")]
    kind: WorkoutKind,
    #[serde(default)]
    duration_minutes: u32,
    /// Template name the session followed.
    template: Option<String>,
    notes: Option<String>,
    rating: Option<u8>,
    #[serde(default, rename = "exercise")]
    exercises: Vec<ExerciseToml>,
}

#[derive(Debug, Deserialize)]
struct ExerciseToml {
    name: String,
    #[serde(default, rename = "set")]
    sets: Vec<SetToml>,
}

#[derive(Debug, Deserialize)]
struct SetToml {
    #[serde(default)]
    weight: f64,
    reps: u32,
    #[serde(default = "yes")]
    completed: bool,
}

fn default_kind() -> WorkoutKind {
    WorkoutKind::Lifting
}

fn yes() -> bool {
    true
}

#[derive(Serialize)]
struct LoggedJson<'a> {
    workout: &'a Workout,
    new_records: &'a [PersonalRecord],
}

fn print_suggestion(
    s: &SuggestedWorkout,
    volume_modifier: f64,
    increment: f64,
    header: &str,
) {
    println!("{} {}", header.cyan().bold(), s.template_name.bold());
    for ex in &s.exercises {
        let sets = ex.display_sets(volume_modifier);
        let load = if ex.previous.is_none() {
            "pick a starting load".dimmed().to_string()
        } else {
            format!("{}kg", round_to_increment(ex.weight, increment))
                .green()
                .to_string()
        };
        println!(
            "  • {} {}×{} @ {}",
            ex.exercise.name.bold(),
            sets,
            ex.reps,
            load
        );
        if let Some(prev) = &ex.previous {
            println!(
                "    {}",
                format!(
                    "last: {}kg × {} on {}",
                    prev.weight,
                    prev.reps,
                    prev.date.format("%Y-%m-%d")
                )
                .dimmed()
            );
        }
        if let Some(guide) = &ex.intensity {
            println!(
                "    {}",
                format!(
                    "{:.0}% of e1RM {:.1}kg, {}-{} reps suit this load",
                    guide.percent_of_max * 100.0,
                    guide.current_1rm,
                    guide.recommended_reps.0,
                    guide.recommended_reps.1
                )
                .dimmed()
            );
        }
    }
}

async fn suggest_template(
    store: &SqliteStore,
    name: &str,
    cfg: &Config,
    fmt: OutputFmt,
) -> Result<()> {
    let templates = store.fetch_templates().await?;
    let Some(template) = templates
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
    else {
        match best_name_suggestion(name, templates.iter().map(|t| t.name.as_str())) {
            Some(s) => println!(
                "{} no template named `{}` – did you mean `{}`?",
                "error:".red().bold(),
                name,
                s
            ),
            None => println!("{} no template named `{}`", "error:".red().bold(), name),
        }
        return Ok(());
    };

    // Without a date to go by, the stored week sets the modifiers.
    let (intensity, volume) = match progression::load_active(store, store).await? {
        Some((profile, program)) => profile
            .current_week
            .and_then(|w| program.week(w))
            .map(|w| (w.intensity_modifier(), w.volume_modifier()))
            .unwrap_or((1.0, 1.0)),
        None => (1.0, 1.0),
    };

    let (history, prs) = tokio::join!(
        store.fetch_recent_workouts(HISTORY_LIMIT),
        store.fetch_records()
    );
    let suggestion = overload::suggest_with_records(template, intensity, &history?, &prs?);
    emit(fmt, &suggestion, || {
        print_suggestion(&suggestion, volume, cfg.weight_increment(), "Suggested:")
    });
    Ok(())
}

async fn resolve_log(store: &SqliteStore, def: WorkoutToml) -> Result<Option<Workout>> {
    let known = store.list_exercises().await?;
    let mut exercises = Vec::with_capacity(def.exercises.len());
    let mut missing = Vec::new();

    for (i, ex) in def.exercises.into_iter().enumerate() {
        match store.find_exercise(&ex.name).await? {
            Some(identity) => exercises.push(WorkoutExercise {
                exercise: identity,
                order_index: i as u32,
                sets: ex
                    .sets
                    .into_iter()
                    .map(|s| WorkoutSet {
                        reps: s.reps,
                        weight: s.weight.max(0.0),
                        completed: s.completed,
                    })
                    .collect(),
            }),
            None => {
                let hint = best_name_suggestion(&ex.name, known.iter().map(|e| e.name.as_str()))
                    .map(|s| format!(" (did you mean `{s}`?)"))
                    .unwrap_or_default();
                missing.push(format!("{}{}", ex.name, hint));
            }
        }
    }
    if !missing.is_empty() {
        println!(
            "{} unknown exercises: {} – add them with `exercise add`",
            "error:".red().bold(),
            missing.join(", ")
        );
        return Ok(None);
    }

    let template_id = match &def.template {
        Some(name) => store
            .fetch_templates()
            .await?
            .into_iter()
            .find(|t| t.name.eq_ignore_ascii_case(name.trim()))
            .map(|t| t.id),
        None => None,
    };

    Ok(Some(Workout {
        id: Uuid::new_v4().to_string(),
        date: def.date.unwrap_or_else(Utc::now),
        kind: def.kind,
        duration_minutes: def.duration_minutes,
        template_id,
        notes: def.notes,
        rating: def.rating,
        exercises,
    }))
}

pub async fn handle(cmd: SessionCmd, store: &SqliteStore, cfg: &Config, fmt: OutputFmt) -> Result<()> {
    match cmd {
        SessionCmd::Suggest { template: Some(name) } => {
            suggest_template(store, &name, cfg, fmt).await?;
        }

        SessionCmd::Suggest { template: None } => {
            let plan = overload::plan_session(
                store,
                store,
                store,
                store,
                Utc::now().date_naive(),
                HISTORY_LIMIT,
            )
            .await?;
            emit(fmt, &plan, || match &plan {
                SessionPlan::NoActiveProgram => println!(
                    "{} no active program – name a template: `session suggest <TEMPLATE>`",
                    "info:".blue().bold()
                ),
                SessionPlan::Unscheduled => {
                    println!("{} nothing scheduled today", "info:".blue().bold())
                }
                SessionPlan::Rest { week_number } => {
                    println!("{} rest day (week {})", "info:".blue().bold(), week_number)
                }
                SessionPlan::MissingTemplate { template_id, .. } => println!(
                    "{} today's template `{}` no longer exists; treat it as a rest day",
                    "warning:".yellow().bold(),
                    template_id
                ),
                SessionPlan::Train {
                    week_number,
                    volume_modifier,
                    is_deload,
                    suggestion,
                } => {
                    let header = if *is_deload {
                        format!("Week {week_number} (deload):")
                    } else {
                        format!("Week {week_number}:")
                    };
                    print_suggestion(suggestion, *volume_modifier, cfg.weight_increment(), &header);
                }
            });
        }

        SessionCmd::Log { file } => {
            let src = read_to_string(&file).with_context(|| format!("reading `{file}`"))?;
            let def: WorkoutToml =
                toml::from_str(&src).with_context(|| format!("parsing `{file}`"))?;
            let Some(workout) = resolve_log(store, def).await? else {
                return Ok(());
            };

            store.save_workout(&workout).await?;
            let new_records = records::detect_and_save(store, &workout).await?;

            let out = LoggedJson {
                workout: &workout,
                new_records: &new_records,
            };
            emit(fmt, &out, || {
                println!(
                    "{} logged {} session on {}",
                    "ok:".green().bold(),
                    workout.kind,
                    workout.date.format("%Y-%m-%d")
                );
                for pr in &new_records {
                    println!(
                        "{} new personal record: {} {}kg × {} (e1RM {:.1}kg)",
                        "note:".yellow().bold(),
                        pr.exercise.name.bold(),
                        pr.weight,
                        pr.reps,
                        pr.estimated_1rm
                    );
                }
            });
        }

        SessionCmd::List { limit, kind } => {
            let workouts = match kind {
                Some(kind) => {
                    let mut all = store.fetch_workouts_by_kind(kind).await?;
                    all.reverse();
                    all.truncate(limit);
                    all
                }
                None => store.fetch_recent_workouts(limit).await?,
            };

            emit(fmt, &workouts, || {
                if workouts.is_empty() {
                    println!("{}", "  (no sessions logged)".dimmed());
                    return;
                }
                println!("{}", "Sessions:".cyan().bold());
                for w in &workouts {
                    let sets: usize = w.exercises.iter().map(|e| e.completed_sets().count()).sum();
                    println!(
                        "  {} {} ({}) – {} exercises, {} sets",
                        w.date.format("%a %b %d %H:%M").to_string().green(),
                        w.kind.to_string().bold(),
                        format_duration(Duration::minutes(i64::from(w.duration_minutes))),
                        w.exercises.len(),
                        sets
                    );
                    if let Some(notes) = w.notes.as_deref().filter(|n| !n.is_empty()) {
                        println!("    {}", notes.dimmed());
                    }
                }
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workout_file_defaults() {
        let def: WorkoutToml = toml::from_str(
            r#"
            duration_minutes = 55

            [[exercise]]
            name = "Back Squat"
              [[exercise.set]]
              weight = 100
              reps = 5
              [[exercise.set]]
              weight = 105.5
              reps = 3
              completed = false
            "#,
        )
        .unwrap();

        assert_eq!(def.kind, WorkoutKind::Lifting);
        assert!(def.date.is_none());
        assert_eq!(def.exercises[0].sets.len(), 2);
        assert!(def.exercises[0].sets[0].completed);
        assert!(!def.exercises[0].sets[1].completed);
        assert_eq!(def.exercises[0].sets[0].weight, 100.0);
    }
}
