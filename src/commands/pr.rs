use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::Colorize;
use ironplan::{
    models::PersonalRecord,
    records,
    storage::{ExerciseResolver, PersonalRecordStore, SqliteStore, WorkoutStore},
    types::{OutputFmt, best_name_suggestion, emit},
};

use crate::cli::PrCmd;

fn create_ascii_graph(
    data: &[(DateTime<Utc>, f64)],
    width: usize,
    height: usize,
    title: &str,
) -> Vec<String> {
    let (Some(first), Some(last)) = (data.first(), data.last()) else {
        return vec!["No data available".to_string()];
    };

    let min_value = data.iter().map(|(_, v)| *v).fold(f64::INFINITY, f64::min);
    let max_value = data.iter().map(|(_, v)| *v).fold(f64::NEG_INFINITY, f64::max);
    let range = max_value - min_value;

    if range == 0.0 || data.len() < 2 {
        return vec!["No variation in data".to_string()];
    }

    let mut grid = vec![vec![' '; width]; height];
    let col = |i: usize| (i as f64 / (data.len() - 1) as f64 * (width - 1) as f64) as usize;
    let row = |v: f64| height - 1 - ((v - min_value) / range * (height - 1) as f64) as usize;

    for (i, (_, value)) in data.iter().enumerate() {
        let (x, y) = (col(i), row(*value));
        grid[y][x] = '●';

        if i > 0 {
            let (prev_x, prev_y) = (col(i - 1), row(data[i - 1].1));
            let dx = x as isize - prev_x as isize;
            let dy = y as isize - prev_y as isize;
            let steps = dx.abs().max(dy.abs());

            for step in 1..steps {
                let px = (prev_x as isize + dx * step / steps) as usize;
                let py = (prev_y as isize + dy * step / steps) as usize;
                if px < width && py < height && grid[py][px] == ' ' {
                    grid[py][px] = '·';
                }
            }
        }
    }

    let mut result = Vec::new();
    let step = range / (height - 1) as f64;

    result.push(format!("\n{} {}", title.bold(), "e1RM"));
    result.push("─".repeat(width + 7));

    for (i, r) in grid.iter().enumerate() {
        let value = min_value + step * (height - 1 - i) as f64;
        result.push(format!("{:4.0} │{}", value, r.iter().collect::<String>()));
    }

    result.push(format!("     └{}", "─".repeat(width)));
    result.push(format!(
        "     {}  {}",
        first.0.format("%Y-%m-%d"),
        last.0.format("%Y-%m-%d")
    ));
    result
}

fn print_record_line(r: &PersonalRecord) {
    println!(
        "  {} {} {}kg × {} {}",
        r.achieved_at.format("%Y-%m-%d").to_string().dimmed(),
        r.exercise.name.bold(),
        r.weight,
        r.reps,
        format!("(e1RM {:.1}kg)", r.estimated_1rm).green()
    );
}

pub async fn handle(cmd: PrCmd, store: &SqliteStore, fmt: OutputFmt) -> Result<()> {
    match cmd {
        PrCmd::List => {
            let all = store.fetch_records().await?;
            let current = records::current_records(&all);
            emit(fmt, &current, || {
                if current.is_empty() {
                    println!("{}", "  (no personal records yet)".dimmed());
                    return;
                }
                println!("{}", "Personal records:".cyan().bold());
                for r in &current {
                    print_record_line(r);
                }
            });
        }

        PrCmd::Show { exercise, graph } => {
            let name = exercise.join(" ");
            let Some(identity) = store.find_exercise(&name).await? else {
                let known = store.list_exercises().await?;
                match best_name_suggestion(&name, known.iter().map(|e| e.name.as_str())) {
                    Some(s) => println!(
                        "{} no exercise named `{}` – did you mean `{}`?",
                        "error:".red().bold(),
                        name,
                        s
                    ),
                    None => println!("{} no exercise named `{}`", "error:".red().bold(), name),
                }
                return Ok(());
            };

            let all = store.fetch_records().await?;
            let history = records::progression(&all, &identity.id);
            emit(fmt, &history, || {
                if history.is_empty() {
                    println!(
                        "{} no records for `{}` yet",
                        "info:".blue().bold(),
                        identity.name
                    );
                    return;
                }
                println!("{}", format!("{} records:", identity.name).cyan().bold());
                for r in &history {
                    print_record_line(r);
                }

                if graph {
                    let data: Vec<(DateTime<Utc>, f64)> = history
                        .iter()
                        .map(|r| (r.achieved_at, r.estimated_1rm))
                        .collect();
                    let (term_width, term_height) = term_size::dimensions().unwrap_or((80, 24));
                    let width = (term_width / 2).clamp(10, 60);
                    let height = (term_height / 2).clamp(3, 15);
                    for line in create_ascii_graph(&data, width, height, &identity.name) {
                        println!("{}", line);
                    }
                }
            });
        }

        PrCmd::Recalc => {
            let workouts = store.fetch_workouts().await?;
            let rebuilt = records::recalculate_all(store, &workouts).await?;
            emit(fmt, &rebuilt, || {
                println!(
                    "{} rebuilt {} records from {} sessions",
                    "ok:".green().bold(),
                    rebuilt.len(),
                    workouts.len()
                )
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_graph_has_axis_and_dates() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let data = vec![
            (start, 100.0),
            (start + Duration::days(7), 110.0),
            (start + Duration::days(14), 120.0),
        ];
        let lines = create_ascii_graph(&data, 20, 5, "Squat");
        // Title, rule, five rows, axis, dates.
        assert_eq!(lines.len(), 9);
        assert!(lines.last().unwrap().contains("2024-01-01"));
        assert!(lines.last().unwrap().contains("2024-01-15"));
        assert_eq!(lines.iter().filter(|l| l.contains('●')).count(), 3);
    }

    #[test]
    fn test_graph_flat_or_empty() {
        assert_eq!(create_ascii_graph(&[], 20, 5, "x"), vec!["No data available"]);
        let one = [(Utc::now(), 100.0)];
        assert_eq!(create_ascii_graph(&one, 20, 5, "x"), vec!["No variation in data"]);
    }
}
