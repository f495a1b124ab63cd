use anyhow::Result;
use colored::Colorize;
use ironplan::{
    models::ExerciseIdentity,
    storage::{ExerciseResolver, SqliteStore},
    types::{OutputFmt, best_name_suggestion, emit},
};
use uuid::Uuid;

use crate::cli::ExerciseCmd;

pub async fn handle(cmd: ExerciseCmd, store: &SqliteStore, fmt: OutputFmt) -> Result<()> {
    match cmd {
        ExerciseCmd::List => {
            let exercises = store.list_exercises().await?;
            emit(fmt, &exercises, || {
                if exercises.is_empty() {
                    println!("{}", "  (no exercises found)".dimmed());
                    return;
                }
                println!("{}", "Exercises:".cyan().bold());
                let idx_w = exercises.len().to_string().len();
                for (i, ex) in exercises.iter().enumerate() {
                    let idx_col = format!("{:>width$}", i + 1, width = idx_w).yellow();
                    let preset = if ex.id.starts_with("preset-") {
                        " preset".dimmed().to_string()
                    } else {
                        String::new()
                    };
                    println!(" {} • {}{}", idx_col, ex.name.bold(), preset);
                }
            });
        }

        ExerciseCmd::Add { name } => {
            let name = name.join(" ").trim().to_string();
            if name.is_empty() {
                println!("{} exercise name must not be empty", "error:".red().bold());
                return Ok(());
            }

            if let Some(existing) = store.find_exercise(&name).await? {
                println!(
                    "{} exercise `{}` already exists",
                    "warning:".yellow().bold(),
                    existing.name
                );
                return Ok(());
            }

            let known = store.list_exercises().await?;
            if let Some(similar) = best_name_suggestion(&name, known.iter().map(|e| e.name.as_str()))
            {
                println!(
                    "{} `{}` looks a lot like existing `{}`",
                    "note:".yellow().bold(),
                    name,
                    similar
                );
            }

            let added = store
                .add_exercise(&ExerciseIdentity::new(Uuid::new_v4().to_string(), name))
                .await?;
            emit(fmt, &added, || {
                println!("{} added `{}`", "ok:".green().bold(), added.name)
            });
        }
    }
    Ok(())
}
