use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};

use super::{ExerciseResolver, PersonalRecordStore, ProgramStore, UserProfileStore, WorkoutStore};
use crate::models::{
    ExerciseIdentity, PersonalRecord, ProgramDay, ProgramWeek, TemplateExercise, TrainingProgram,
    UserProfile, Workout, WorkoutExercise, WorkoutSet, WorkoutTemplate,
};
use crate::types::{DayOfWeek, WorkoutKind};

const WORKOUT_COLUMNS: &str =
    "id, date, kind, duration_minutes, template_id, notes, rating";

const PROGRAM_COLUMNS: &str =
    "id, name, category, difficulty, is_preset, usage_count, last_used_at";

/// Store backed by the SQLite pool from [`crate::db::open`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn hydrate_workouts(&self, rows: Vec<SqliteRow>) -> Result<Vec<Workout>> {
        let mut workouts = rows.iter().map(workout_header).collect::<Result<Vec<_>>>()?;
        if workouts.is_empty() {
            return Ok(workouts);
        }

        let q_marks = std::iter::repeat("?")
            .take(workouts.len())
            .collect::<Vec<_>>()
            .join(",");

        let ex_sql = format!(
            "SELECT workout_id, order_index, exercise_id, exercise_name
             FROM workout_exercises WHERE workout_id IN ({q_marks})
             ORDER BY workout_id, order_index"
        );
        let set_sql = format!(
            "SELECT workout_id, exercise_order, reps, weight, completed
             FROM workout_sets WHERE workout_id IN ({q_marks})
             ORDER BY workout_id, exercise_order, set_index"
        );

        let mut ex_q = sqlx::query(&ex_sql);
        let mut set_q = sqlx::query(&set_sql);
        for w in &workouts {
            ex_q = ex_q.bind(&w.id);
            set_q = set_q.bind(&w.id);
        }
        let ex_rows = ex_q.fetch_all(&self.pool).await?;
        let set_rows = set_q.fetch_all(&self.pool).await?;

        let mut sets: HashMap<(String, u32), Vec<WorkoutSet>> = HashMap::new();
        for r in &set_rows {
            sets.entry((r.try_get("workout_id")?, r.try_get("exercise_order")?))
                .or_default()
                .push(WorkoutSet {
                    reps: r.try_get("reps")?,
                    weight: r.try_get("weight")?,
                    completed: r.try_get("completed")?,
                });
        }

        let mut exercises: HashMap<String, Vec<WorkoutExercise>> = HashMap::new();
        for r in &ex_rows {
            let workout_id: String = r.try_get("workout_id")?;
            let order_index: u32 = r.try_get("order_index")?;
            let ex_sets = sets
                .remove(&(workout_id.clone(), order_index))
                .unwrap_or_default();
            exercises.entry(workout_id).or_default().push(WorkoutExercise {
                exercise: ExerciseIdentity::new(
                    r.try_get::<String, _>("exercise_id")?,
                    r.try_get::<String, _>("exercise_name")?,
                ),
                order_index,
                sets: ex_sets,
            });
        }

        for w in &mut workouts {
            w.exercises = exercises.remove(&w.id).unwrap_or_default();
        }
        Ok(workouts)
    }

    async fn load_program(&self, row: &SqliteRow) -> Result<TrainingProgram> {
        let id: String = row.try_get("id")?;

        let week_rows = sqlx::query(
            r#"
            SELECT week_number, intensity_modifier, volume_modifier, is_deload
            FROM   program_weeks
            WHERE  program_id = ?
            ORDER  BY week_number
            "#,
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        let day_rows = sqlx::query(
            r#"
            SELECT week_number, day_of_week, template_id, name
            FROM   program_days
            WHERE  program_id = ?
            ORDER  BY week_number, day_of_week
            "#,
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        let mut days_by_week = day_rows
            .iter()
            .map(|r| -> Result<(u32, ProgramDay)> {
                let n: u32 = r.try_get("day_of_week")?;
                let day_of_week = DayOfWeek::from_number(n)
                    .with_context(|| format!("program `{id}` has invalid weekday {n}"))?;
                Ok((
                    r.try_get("week_number")?,
                    ProgramDay {
                        day_of_week,
                        template_id: r.try_get("template_id")?,
                        name: r.try_get("name")?,
                    },
                ))
            })
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .into_group_map();

        let mut weeks = Vec::with_capacity(week_rows.len());
        for r in &week_rows {
            let n: u32 = r.try_get("week_number")?;
            let week = ProgramWeek::new(
                n,
                r.try_get("intensity_modifier")?,
                r.try_get("volume_modifier")?,
                r.try_get("is_deload")?,
            )
            .with_context(|| format!("program `{id}` week {n} is invalid"))?
            .with_days(days_by_week.remove(&n).unwrap_or_default());
            weeks.push(week);
        }

        Ok(TrainingProgram {
            id,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            difficulty: row.try_get("difficulty")?,
            is_preset: row.try_get("is_preset")?,
            weeks,
            usage_count: row.try_get("usage_count")?,
            last_used_at: row.try_get("last_used_at")?,
        })
    }

    async fn load_template(&self, row: &SqliteRow) -> Result<WorkoutTemplate> {
        let id: String = row.try_get("id")?;
        let ex_rows = sqlx::query(
            r#"
            SELECT order_index, exercise_id, exercise_name, set_count, rep_min, rep_max
            FROM   template_exercises
            WHERE  template_id = ?
            ORDER  BY order_index
            "#,
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await?;

        let exercises = ex_rows
            .iter()
            .map(|r| -> Result<TemplateExercise> {
                Ok(TemplateExercise::new(
                    r.try_get("order_index")?,
                    ExerciseIdentity::new(
                        r.try_get::<String, _>("exercise_id")?,
                        r.try_get::<String, _>("exercise_name")?,
                    ),
                    r.try_get("set_count")?,
                    r.try_get("rep_min")?,
                    r.try_get("rep_max")?,
                )?)
            })
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("template `{id}` has an invalid exercise"))?;

        Ok(WorkoutTemplate {
            id,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            is_preset: row.try_get("is_preset")?,
            exercises,
        })
    }
}

fn workout_header(r: &SqliteRow) -> Result<Workout> {
    let kind: String = r.try_get("kind")?;
    Ok(Workout {
        id: r.try_get("id")?,
        date: r.try_get("date")?,
        kind: kind.parse().map_err(anyhow::Error::msg)?,
        duration_minutes: r.try_get("duration_minutes")?,
        template_id: r.try_get("template_id")?,
        notes: r.try_get("notes")?,
        rating: r.try_get("rating")?,
        exercises: Vec::new(),
    })
}

fn record_from_row(r: &SqliteRow) -> Result<PersonalRecord> {
    Ok(PersonalRecord {
        id: r.try_get("id")?,
        exercise: ExerciseIdentity::new(
            r.try_get::<String, _>("exercise_id")?,
            r.try_get::<String, _>("exercise_name")?,
        ),
        estimated_1rm: r.try_get("estimated_1rm")?,
        weight: r.try_get("weight")?,
        reps: r.try_get("reps")?,
        achieved_at: r.try_get("achieved_at")?,
        workout_id: r.try_get("workout_id")?,
    })
}

async fn insert_record<'c, E>(exec: E, record: &PersonalRecord) -> Result<()>
where
    E: sqlx::Executor<'c, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO personal_records
          (id, exercise_id, exercise_name, estimated_1rm, weight, reps, achieved_at, workout_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&record.id)
    .bind(&record.exercise.id)
    .bind(&record.exercise.name)
    .bind(record.estimated_1rm)
    .bind(record.weight)
    .bind(record.reps)
    .bind(record.achieved_at)
    .bind(&record.workout_id)
    .execute(exec)
    .await?;
    Ok(())
}

#[async_trait]
impl WorkoutStore for SqliteStore {
    async fn fetch_workouts(&self) -> Result<Vec<Workout>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts ORDER BY date, rowid"
        ))
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_workouts(rows).await
    }

    async fn fetch_recent_workouts(&self, limit: usize) -> Result<Vec<Workout>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts ORDER BY date DESC, rowid DESC LIMIT ?"
        ))
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_workouts(rows).await
    }

    async fn fetch_workouts_by_kind(&self, kind: WorkoutKind) -> Result<Vec<Workout>> {
        let rows = sqlx::query(&format!(
            "SELECT {WORKOUT_COLUMNS} FROM workouts WHERE kind = ? ORDER BY date, rowid"
        ))
        .bind(kind.to_string())
        .fetch_all(&self.pool)
        .await?;
        self.hydrate_workouts(rows).await
    }

    async fn save_workout(&self, workout: &Workout) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO workouts (id, date, kind, duration_minutes, template_id, notes, rating)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                date = excluded.date,
                kind = excluded.kind,
                duration_minutes = excluded.duration_minutes,
                template_id = excluded.template_id,
                notes = excluded.notes,
                rating = excluded.rating
            "#,
        )
        .bind(&workout.id)
        .bind(workout.date)
        .bind(workout.kind.to_string())
        .bind(workout.duration_minutes)
        .bind(workout.template_id.as_deref())
        .bind(workout.notes.as_deref())
        .bind(workout.rating)
        .execute(&mut *tx)
        .await?;

        // Children are rewritten wholesale.
        sqlx::query("DELETE FROM workout_exercises WHERE workout_id = ?")
            .bind(&workout.id)
            .execute(&mut *tx)
            .await?;

        for ex in &workout.exercises {
            sqlx::query(
                r#"INSERT INTO workout_exercises
                     (workout_id, order_index, exercise_id, exercise_name)
                   VALUES (?1, ?2, ?3, ?4)"#,
            )
            .bind(&workout.id)
            .bind(ex.order_index)
            .bind(&ex.exercise.id)
            .bind(&ex.exercise.name)
            .execute(&mut *tx)
            .await?;

            for (set_index, set) in ex.sets.iter().enumerate() {
                sqlx::query(
                    r#"INSERT INTO workout_sets
                         (workout_id, exercise_order, set_index, reps, weight, completed)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
                )
                .bind(&workout.id)
                .bind(ex.order_index)
                .bind(set_index as i64)
                .bind(set.reps)
                .bind(set.weight)
                .bind(set.completed)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_workout(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM workouts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PersonalRecordStore for SqliteStore {
    async fn fetch_records(&self) -> Result<Vec<PersonalRecord>> {
        let rows = sqlx::query("SELECT * FROM personal_records ORDER BY achieved_at, rowid")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn save_record(&self, record: &PersonalRecord) -> Result<()> {
        insert_record(&self.pool, record).await
    }

    async fn clear_records(&self) -> Result<()> {
        sqlx::query("DELETE FROM personal_records")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn replace_records(&self, records: &[PersonalRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM personal_records")
            .execute(&mut *tx)
            .await?;
        for r in records {
            insert_record(&mut *tx, r).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ProgramStore for SqliteStore {
    async fn fetch_program(&self, id: &str) -> Result<Option<TrainingProgram>> {
        let row = sqlx::query(&format!("SELECT {PROGRAM_COLUMNS} FROM programs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Some(self.load_program(&r).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_program_by_name(&self, name: &str) -> Result<Option<TrainingProgram>> {
        let row = sqlx::query(&format!(
            "SELECT {PROGRAM_COLUMNS} FROM programs WHERE name = ?"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(r) => Ok(Some(self.load_program(&r).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_programs(&self) -> Result<Vec<TrainingProgram>> {
        let rows = sqlx::query(&format!("SELECT {PROGRAM_COLUMNS} FROM programs ORDER BY name"))
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            out.push(self.load_program(r).await?);
        }
        Ok(out)
    }

    async fn save_program(
        &self,
        program: &TrainingProgram,
        templates: &[WorkoutTemplate],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for t in templates {
            sqlx::query(
                r#"
                INSERT INTO workout_templates (id, name, category, is_preset)
                VALUES (?1, ?2, ?3, ?4)
                ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    category = excluded.category,
                    is_preset = excluded.is_preset
                "#,
            )
            .bind(&t.id)
            .bind(&t.name)
            .bind(&t.category)
            .bind(t.is_preset)
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM template_exercises WHERE template_id = ?")
                .bind(&t.id)
                .execute(&mut *tx)
                .await?;

            for ex in &t.exercises {
                sqlx::query("INSERT OR IGNORE INTO exercises (id, name) VALUES (?1, ?2)")
                    .bind(&ex.exercise.id)
                    .bind(&ex.exercise.name)
                    .execute(&mut *tx)
                    .await?;

                sqlx::query(
                    r#"INSERT INTO template_exercises
                         (template_id, order_index, exercise_id, exercise_name,
                          set_count, rep_min, rep_max)
                       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#,
                )
                .bind(&t.id)
                .bind(ex.order_index)
                .bind(&ex.exercise.id)
                .bind(&ex.exercise.name)
                .bind(ex.set_count())
                .bind(ex.rep_min())
                .bind(ex.rep_max())
                .execute(&mut *tx)
                .await?;
            }
        }

        sqlx::query(
            r#"
            INSERT INTO programs
              (id, name, category, difficulty, is_preset, usage_count, last_used_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                difficulty = excluded.difficulty,
                is_preset = excluded.is_preset
            "#,
        )
        .bind(&program.id)
        .bind(&program.name)
        .bind(&program.category)
        .bind(&program.difficulty)
        .bind(program.is_preset)
        .bind(program.usage_count)
        .bind(program.last_used_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM program_weeks WHERE program_id = ?")
            .bind(&program.id)
            .execute(&mut *tx)
            .await?;

        for week in &program.weeks {
            sqlx::query(
                r#"INSERT INTO program_weeks
                     (program_id, week_number, intensity_modifier, volume_modifier, is_deload)
                   VALUES (?1, ?2, ?3, ?4, ?5)"#,
            )
            .bind(&program.id)
            .bind(week.week_number())
            .bind(week.intensity_modifier())
            .bind(week.volume_modifier())
            .bind(week.is_deload())
            .execute(&mut *tx)
            .await?;

            for day in &week.days {
                sqlx::query(
                    r#"INSERT INTO program_days
                         (program_id, week_number, day_of_week, template_id, name)
                       VALUES (?1, ?2, ?3, ?4, ?5)"#,
                )
                .bind(&program.id)
                .bind(week.week_number())
                .bind(day.day_of_week.number())
                .bind(day.template_id.as_deref())
                .bind(day.name.as_deref())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_program(&self, program: &TrainingProgram) -> Result<()> {
        sqlx::query("UPDATE programs SET usage_count = ?, last_used_at = ? WHERE id = ?")
            .bind(program.usage_count)
            .bind(program.last_used_at)
            .bind(&program.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_program(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM programs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn fetch_template(&self, id: &str) -> Result<Option<WorkoutTemplate>> {
        let row = sqlx::query("SELECT id, name, category, is_preset FROM workout_templates WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Some(self.load_template(&r).await?)),
            None => Ok(None),
        }
    }

    async fn fetch_templates(&self) -> Result<Vec<WorkoutTemplate>> {
        let rows = sqlx::query("SELECT id, name, category, is_preset FROM workout_templates ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for r in &rows {
            out.push(self.load_template(r).await?);
        }
        Ok(out)
    }

    async fn delete_template(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM workout_templates WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserProfileStore for SqliteStore {
    async fn fetch_or_create_profile(&self) -> Result<UserProfile> {
        sqlx::query("INSERT OR IGNORE INTO user_profile (id) VALUES (1)")
            .execute(&self.pool)
            .await?;
        let row = sqlx::query(
            r#"
            SELECT active_program_id, active_program_start, current_week, completed_at
            FROM   user_profile
            WHERE  id = 1
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(UserProfile {
            active_program_id: row.try_get("active_program_id")?,
            active_program_start: row.try_get::<Option<DateTime<Utc>>, _>("active_program_start")?,
            current_week: row.try_get("current_week")?,
            completed_at: row.try_get::<Option<DateTime<Utc>>, _>("completed_at")?,
        })
    }

    async fn persist_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_profile
              (id, active_program_id, active_program_start, current_week, completed_at)
            VALUES (1, ?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                active_program_id = excluded.active_program_id,
                active_program_start = excluded.active_program_start,
                current_week = excluded.current_week,
                completed_at = excluded.completed_at
            "#,
        )
        .bind(profile.active_program_id.as_deref())
        .bind(profile.active_program_start)
        .bind(profile.current_week)
        .bind(profile.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl ExerciseResolver for SqliteStore {
    async fn resolve_exercise(&self, id: &str) -> Result<Option<ExerciseIdentity>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, name FROM exercises WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, name)| ExerciseIdentity { id, name }))
    }

    async fn find_exercise(&self, name: &str) -> Result<Option<ExerciseIdentity>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, name FROM exercises WHERE name = ? COLLATE NOCASE")
                .bind(name.trim())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id, name)| ExerciseIdentity { id, name }))
    }

    async fn list_exercises(&self) -> Result<Vec<ExerciseIdentity>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, name FROM exercises ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| ExerciseIdentity { id, name })
            .collect())
    }

    async fn add_exercise(&self, exercise: &ExerciseIdentity) -> Result<ExerciseIdentity> {
        sqlx::query("INSERT OR IGNORE INTO exercises (id, name) VALUES (?1, ?2)")
            .bind(&exercise.id)
            .bind(exercise.name.trim())
            .execute(&self.pool)
            .await?;
        self.find_exercise(&exercise.name)
            .await?
            .with_context(|| format!("exercise `{}` missing after insert", exercise.name))
    }
}
