use std::{collections::HashMap, fs::read_to_string};

use anyhow::{Context, Result};
use chrono::Utc;
use colored::Colorize;
use ironplan::{
    catalog::{self, ImportOutcome},
    error::{ProgramStateError, ValidationError},
    models::{TrainingProgram, UserProfile},
    progression::{self, AdvanceOutcome, ProgramState},
    storage::{ProgramStore, SqliteStore, UserProfileStore},
    types::{OutputFmt, emit},
};
use serde::Serialize;

use crate::cli::ProgramCmd;

#[derive(Serialize)]
struct ProgJson {
    idx: usize,
    id: String,
    name: String,
    category: String,
    difficulty: String,
    weeks: u32,
    is_preset: bool,
    is_active: bool,
    usage_count: u32,
}

fn plain_len(s: &str) -> usize {
    let mut n = 0;
    let mut esc = false;
    for c in s.chars() {
        match (esc, c) {
            (true, 'm') => esc = false,
            (true, _) => {}
            (false, '\x1B') => esc = true,
            (false, _) => n += 1,
        }
    }
    n
}

/// Match a program by its 1-based index in `program list` or by name.
async fn resolve_program(store: &SqliteStore, arg: &str) -> Result<Option<TrainingProgram>> {
    let programs = store.fetch_programs().await?;
    if let Ok(idx) = arg.trim().parse::<usize>() {
        return Ok(idx.checked_sub(1).and_then(|i| programs.get(i)).cloned());
    }
    Ok(programs
        .into_iter()
        .find(|p| p.name.eq_ignore_ascii_case(arg.trim())))
}

fn not_found(arg: &str) {
    println!("{} no program matches `{}`", "error:".red().bold(), arg);
}

fn print_list(progs: &[ProgJson]) {
    if progs.is_empty() {
        println!("{}", "  (no programs found)".dimmed());
        return;
    }

    println!("{}", "Programs:".cyan().bold());

    let idx_w = progs.len().to_string().len();
    let mut left = Vec::<String>::new();
    let mut right = Vec::<String>::new();

    for p in progs {
        let idx = format!("{:>width$}", p.idx, width = idx_w).yellow();
        let marker = if p.is_active {
            " (active)".green().bold().to_string()
        } else {
            String::new()
        };
        let preset = if p.is_preset {
            " preset".dimmed().to_string()
        } else {
            String::new()
        };
        left.push(format!(" {} • {}{}{}", idx, p.name.bold(), marker, preset));
        right.push(
            format!(
                "{} weeks, {}, {}, used {}×",
                p.weeks, p.category, p.difficulty, p.usage_count
            )
            .dimmed()
            .to_string(),
        );
    }

    let pad_plain = left.iter().map(|s| plain_len(s)).max().unwrap_or(0);
    for (l, r) in left.into_iter().zip(right) {
        let pad = pad_plain + (l.len() - plain_len(&l));
        println!("{:<pad$} {} {}", l, "|".blue(), r, pad = pad);
    }
}

fn print_program(program: &TrainingProgram, template_names: &HashMap<String, String>) {
    println!(
        "{} {}",
        program.name.cyan().bold(),
        format!(
            "– {} weeks, {}, {}",
            program.duration_weeks(),
            program.category,
            program.difficulty
        )
        .dimmed()
    );

    for (wi, week) in program.weeks.iter().enumerate() {
        let connector = if wi + 1 == program.weeks.len() {
            "└─"
        } else {
            "├─"
        };
        let deload = if week.is_deload() {
            " deload".magenta().to_string()
        } else {
            String::new()
        };
        println!(
            " {} {}{} {}",
            connector,
            format!("week {}", week.week_number()).bold(),
            deload,
            format!(
                "(intensity ×{:.3}, volume ×{:.2})",
                week.intensity_modifier(),
                week.volume_modifier()
            )
            .dimmed()
        );

        let mut days: Vec<_> = week.days.iter().collect();
        days.sort_by_key(|d| d.day_of_week);
        let pipe = if wi + 1 == program.weeks.len() { " " } else { "│" };
        for d in days {
            let label = match &d.template_id {
                Some(id) => template_names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| "(missing template)".into())
                    .normal(),
                None => "rest".dimmed(),
            };
            let name = d
                .name
                .as_ref()
                .map(|n| format!(" – {n}").dimmed().to_string())
                .unwrap_or_default();
            println!(
                " {}    {} {}{}",
                pipe,
                d.day_of_week.short().yellow(),
                label,
                name
            );
        }
    }
}

async fn print_today(store: &SqliteStore, profile: &UserProfile, program: &TrainingProgram) -> Result<()> {
    let today = Utc::now().date_naive();
    let Some(scheduled) = progression::todays_workout(profile, program, today) else {
        println!(
            "{} nothing scheduled today in `{}`",
            "info:".blue().bold(),
            program.name
        );
        return Ok(());
    };

    let Some(template_id) = scheduled.day.template_id.as_deref() else {
        println!(
            "{} rest day (week {} of `{}`)",
            "info:".blue().bold(),
            scheduled.week_number,
            program.name
        );
        return Ok(());
    };

    let Some(template) = store.fetch_template(template_id).await? else {
        println!(
            "{} today's template no longer exists; treat it as a rest day",
            "warning:".yellow().bold()
        );
        return Ok(());
    };

    let deload = if scheduled.week.is_deload() { ", deload" } else { "" };
    println!(
        "{} {} {}",
        "Today:".cyan().bold(),
        template.name.bold(),
        format!(
            "(week {}{}, intensity ×{:.3})",
            scheduled.week_number,
            deload,
            scheduled.intensity_modifier()
        )
        .dimmed()
    );
    for te in template.ordered_exercises() {
        let reps = if te.rep_min() == te.rep_max() {
            te.rep_min().to_string()
        } else {
            format!("{}-{}", te.rep_min(), te.rep_max())
        };
        println!("  • {} {}×{}", te.exercise.name, te.set_count(), reps);
    }
    Ok(())
}

pub async fn handle(cmd: ProgramCmd, store: &SqliteStore, fmt: OutputFmt) -> Result<()> {
    match cmd {
        ProgramCmd::Import { files } => {
            if files.is_empty() {
                println!("{} no program file provided", "warning:".yellow().bold());
            }
            for f in files {
                let src = match read_to_string(&f) {
                    Ok(s) => s,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        println!(
                            "{} cannot open file `{}` – file not found",
                            "error:".red().bold(),
                            f
                        );
                        continue;
                    }
                    Err(e) => return Err(e).with_context(|| format!("reading `{f}`")),
                };

                let outcome = catalog::import_program(store, store, &src)
                    .await
                    .with_context(|| format!("importing `{f}`"))?;
                match &outcome {
                    ImportOutcome::Imported { program } => {
                        println!("{} `{}`", "ok:".green().bold(), program.name)
                    }
                    ImportOutcome::AlreadyExists { name } => println!(
                        "{} program `{}` already exists – skipping",
                        "warning:".yellow().bold(),
                        name
                    ),
                    ImportOutcome::MissingExercises { missing } => {
                        let names: Vec<String> = missing
                            .iter()
                            .map(|m| match &m.suggestion {
                                Some(s) => format!("{} (did you mean `{}`?)", m.name, s),
                                None => m.name.clone(),
                            })
                            .collect();
                        println!(
                            "{} cannot import `{}` – missing exercises: {}",
                            "warning:".yellow().bold(),
                            f,
                            names.join(", ")
                        );
                    }
                }
            }
        }

        ProgramCmd::List => {
            let profile = store.fetch_or_create_profile().await?;
            let progs: Vec<ProgJson> = store
                .fetch_programs()
                .await?
                .into_iter()
                .enumerate()
                .map(|(i, p)| ProgJson {
                    idx: i + 1,
                    is_active: profile.active_program_id.as_deref() == Some(p.id.as_str()),
                    weeks: p.duration_weeks(),
                    id: p.id,
                    name: p.name,
                    category: p.category,
                    difficulty: p.difficulty,
                    is_preset: p.is_preset,
                    usage_count: p.usage_count,
                })
                .collect();

            emit(fmt, &progs, || print_list(&progs));
        }

        ProgramCmd::Show { program } => {
            let Some(p) = resolve_program(store, &program).await? else {
                not_found(&program);
                return Ok(());
            };
            let template_names: HashMap<String, String> = store
                .fetch_templates()
                .await?
                .into_iter()
                .map(|t| (t.id, t.name))
                .collect();
            emit(fmt, &p, || print_program(&p, &template_names));
        }

        ProgramCmd::Activate { program } => {
            let Some(p) = resolve_program(store, &program).await? else {
                not_found(&program);
                return Ok(());
            };
            match progression::activate_program(store, store, &p.id, Utc::now()).await {
                Ok(p) => println!(
                    "{} started `{}` – week 1 of {}",
                    "ok:".green().bold(),
                    p.name,
                    p.duration_weeks()
                ),
                Err(e) => match e.downcast_ref::<ProgramStateError>() {
                    Some(state_err) => println!("{} {}", "error:".red().bold(), state_err),
                    None => return Err(e),
                },
            }
        }

        ProgramCmd::Advance => match progression::advance_active(store, store, Utc::now()).await {
            Ok(AdvanceOutcome::Advanced(week)) => {
                println!("{} now in week {}", "ok:".green().bold(), week)
            }
            Ok(AdvanceOutcome::Completed) => println!(
                "{} program completed – run `program deactivate` to start another",
                "ok:".green().bold()
            ),
            Ok(AdvanceOutcome::AlreadyCompleted) => {
                println!("{} program is already completed", "info:".blue().bold())
            }
            Err(e) => match e.downcast_ref::<ProgramStateError>() {
                Some(state_err) => println!("{} {}", "error:".red().bold(), state_err),
                None => return Err(e),
            },
        },

        ProgramCmd::Deactivate => match progression::deactivate_active(store).await? {
            Some(_) => println!("{} program stopped", "ok:".green().bold()),
            None => println!("{} no active program", "info:".blue().bold()),
        },

        ProgramCmd::Status => {
            let Some((profile, program)) = progression::load_active(store, store).await? else {
                println!("{} no active program", "info:".blue().bold());
                return Ok(());
            };
            let status = progression::status(&profile, &program, Utc::now().date_naive());
            emit(fmt, &status, || {
                let state = match status.state {
                    ProgramState::Completed => "completed".green().bold(),
                    ProgramState::Active { .. } => "active".yellow().bold(),
                    ProgramState::Inactive => "inactive".dimmed(),
                };
                println!("{} {}", status.program_name.cyan().bold(), state);
                if let Some(started) = status.started_on {
                    println!("  started   {}", started);
                }
                println!(
                    "  week      {} of {}",
                    status.current_week, status.duration_weeks
                );
                if let Some(cw) = status.calendar_week {
                    println!("  calendar  week {}", cw);
                }
                println!("  progress  {:.0}%", status.progress * 100.0);
                if status.is_behind_schedule {
                    println!(
                        "{} the calendar is ahead of your stored week – `program advance` or `program sync`",
                        "warning:".yellow().bold()
                    );
                }
            });
        }

        ProgramCmd::Sync => match progression::sync_active(store, store, Utc::now().date_naive()).await
        {
            Ok(week) => println!("{} stored week set to {}", "ok:".green().bold(), week),
            Err(e) => match e.downcast_ref::<ProgramStateError>() {
                Some(state_err) => println!("{} {}", "error:".red().bold(), state_err),
                None => return Err(e),
            },
        },

        ProgramCmd::Today => {
            let Some((profile, program)) = progression::load_active(store, store).await? else {
                println!("{} no active program", "info:".blue().bold());
                return Ok(());
            };
            print_today(store, &profile, &program).await?;
        }

        ProgramCmd::Delete { program } => {
            let Some(p) = resolve_program(store, &program).await? else {
                not_found(&program);
                return Ok(());
            };
            match progression::delete_program(store, store, &p.id).await {
                Ok(()) => println!("{} deleted `{}`", "ok:".green().bold(), p.name),
                Err(e) => match e.downcast_ref::<ValidationError>() {
                    Some(v) => println!("{} {}", "error:".red().bold(), v),
                    None => return Err(e),
                },
            }
        }
    }
    Ok(())
}
