//! Program catalog: the seeded presets and TOML program import.

use std::collections::{BTreeSet, HashMap};

use anyhow::{Context, Result, bail};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::{
    ExerciseIdentity, ProgramDay, ProgramWeek, TemplateExercise, TrainingProgram, WorkoutTemplate,
};
use crate::storage::{ExerciseResolver, ProgramStore};
use crate::types::{DayOfWeek, best_name_suggestion};

/// A preset program together with the templates its days point at.
#[derive(Debug, Clone)]
pub struct Preset {
    pub program: TrainingProgram,
    pub templates: Vec<WorkoutTemplate>,
}

/// Exercises seeded alongside the presets.
pub const PRESET_EXERCISES: &[&str] = &[
    "Back Squat",
    "Barbell Row",
    "Bench Press",
    "Deadlift",
    "Front Squat",
    "Incline Bench Press",
    "Overhead Press",
    "Pull-Up",
    "Romanian Deadlift",
    "Walking Lunge",
];

static PRESETS: Lazy<Result<Vec<Preset>, ValidationError>> =
    Lazy::new(|| Ok(vec![linear_strength()?, upper_lower()?]));

pub fn presets() -> Result<&'static [Preset], ValidationError> {
    PRESETS.as_deref().map_err(Clone::clone)
}

fn slug(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

pub fn preset_exercise(name: &str) -> ExerciseIdentity {
    ExerciseIdentity::new(format!("preset-ex-{}", slug(name)), name)
}

fn preset_template(
    id: &str,
    name: &str,
    category: &str,
    items: &[(&str, u32, u32, u32)],
) -> Result<WorkoutTemplate, ValidationError> {
    let exercises = items
        .iter()
        .enumerate()
        .map(|(i, &(ex, sets, rep_min, rep_max))| {
            TemplateExercise::new(i as u32, preset_exercise(ex), sets, rep_min, rep_max)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(WorkoutTemplate {
        id: id.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        is_preset: true,
        exercises,
    })
}

/// One week over a full Monday..Sunday layout; unlisted days are rest.
fn preset_week(
    number: u32,
    intensity: f64,
    volume: f64,
    deload: bool,
    training: &[(DayOfWeek, &str)],
) -> Result<ProgramWeek, ValidationError> {
    let days = DayOfWeek::ALL
        .iter()
        .map(|&dow| match training.iter().find(|(d, _)| *d == dow) {
            Some((_, tpl)) => ProgramDay::training(dow, *tpl),
            None => ProgramDay::rest(dow),
        })
        .collect();
    Ok(ProgramWeek::new(number, intensity, volume, deload)?.with_days(days))
}

fn linear_strength() -> Result<Preset, ValidationError> {
    use DayOfWeek::*;

    let a = preset_template(
        "preset-tpl-strength-a",
        "Strength A",
        "strength",
        &[("Back Squat", 3, 5, 5), ("Bench Press", 3, 5, 5), ("Barbell Row", 3, 5, 8)],
    )?;
    let b = preset_template(
        "preset-tpl-strength-b",
        "Strength B",
        "strength",
        &[("Back Squat", 3, 5, 5), ("Overhead Press", 3, 5, 5), ("Deadlift", 1, 5, 5)],
    )?;
    let layout = [(Monday, a.id.as_str()), (Wednesday, b.id.as_str()), (Friday, a.id.as_str())];

    let weeks = vec![
        preset_week(1, 1.0, 1.0, false, &layout)?,
        preset_week(2, 1.025, 1.0, false, &layout)?,
        preset_week(3, 1.05, 1.0, false, &layout)?,
        preset_week(4, 0.6, 0.5, true, &layout)?,
    ];

    Ok(Preset {
        program: TrainingProgram {
            id: "preset-linear-strength".into(),
            name: "Linear Strength".into(),
            category: "strength".into(),
            difficulty: "beginner".into(),
            is_preset: true,
            weeks,
            usage_count: 0,
            last_used_at: None,
        },
        templates: vec![a, b],
    })
}

fn upper_lower() -> Result<Preset, ValidationError> {
    use DayOfWeek::*;

    let upper = preset_template(
        "preset-tpl-upper",
        "Upper",
        "hypertrophy",
        &[
            ("Bench Press", 4, 6, 8),
            ("Barbell Row", 4, 6, 8),
            ("Overhead Press", 3, 8, 10),
            ("Pull-Up", 3, 6, 10),
        ],
    )?;
    let lower = preset_template(
        "preset-tpl-lower",
        "Lower",
        "hypertrophy",
        &[
            ("Back Squat", 4, 6, 8),
            ("Romanian Deadlift", 3, 8, 10),
            ("Walking Lunge", 3, 10, 12),
        ],
    )?;
    let layout = [
        (Monday, upper.id.as_str()),
        (Tuesday, lower.id.as_str()),
        (Thursday, upper.id.as_str()),
        (Friday, lower.id.as_str()),
    ];

    let weeks = vec![
        preset_week(1, 1.0, 1.0, false, &layout)?,
        preset_week(2, 1.025, 1.0, false, &layout)?,
        preset_week(3, 1.05, 1.1, false, &layout)?,
        preset_week(4, 0.7, 0.6, true, &layout)?,
        preset_week(5, 1.075, 1.0, false, &layout)?,
        preset_week(6, 1.1, 1.1, false, &layout)?,
    ];

    Ok(Preset {
        program: TrainingProgram {
            id: "preset-upper-lower".into(),
            name: "Upper/Lower".into(),
            category: "hypertrophy".into(),
            difficulty: "intermediate".into(),
            is_preset: true,
            weeks,
            usage_count: 0,
            last_used_at: None,
        },
        templates: vec![upper, lower],
    })
}

/// Store any preset that is not there yet. Existing presets keep their
/// usage bookkeeping. Returns how many programs were added.
pub async fn seed_presets(
    programs: &dyn ProgramStore,
    exercises: &dyn ExerciseResolver,
) -> Result<usize> {
    for name in PRESET_EXERCISES {
        exercises.add_exercise(&preset_exercise(name)).await?;
    }

    let mut added = 0;
    for preset in presets()? {
        if programs.fetch_program(&preset.program.id).await?.is_some() {
            continue;
        }
        programs
            .save_program(&preset.program, &preset.templates)
            .await
            .with_context(|| format!("seeding preset `{}`", preset.program.name))?;
        debug!(program = %preset.program.name, "seeded preset");
        added += 1;
    }
    if added > 0 {
        info!(added, "preset programs seeded");
    }
    Ok(added)
}

/// Remove a user template. Presets stay.
pub async fn delete_template(programs: &dyn ProgramStore, template_id: &str) -> Result<()> {
    let Some(template) = programs.fetch_template(template_id).await? else {
        bail!("no template with id `{template_id}`");
    };
    if template.is_preset {
        return Err(ValidationError::PresetImmutable(template.name).into());
    }
    programs.delete_template(template_id).await
}

//
// TOML import.
//

#[derive(Debug, Deserialize)]
pub struct ProgramToml {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_difficulty")]
    pub difficulty: String,
    #[serde(default, rename = "template")]
    pub templates: Vec<TemplateToml>,
    #[serde(default, rename = "week")]
    pub weeks: Vec<WeekToml>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateToml {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default, rename = "exercise")]
    pub exercises: Vec<TemplateExerciseToml>,
}

#[derive(Debug, Deserialize)]
pub struct TemplateExerciseToml {
    pub name: String,
    pub sets: u32,
    pub rep_min: u32,
    /// Defaults to `rep_min`.
    pub rep_max: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct WeekToml {
    pub number: Option<u32>,
    #[serde(default = "one")]
    pub intensity: f64,
    #[serde(default = "one")]
    pub volume: f64,
    #[serde(default)]
    pub deload: bool,
    #[serde(default, rename = "day")]
    pub days: Vec<DayToml>,
}

#[derive(Debug, Deserialize)]
pub struct DayToml {
    pub day: DayOfWeek,
    /// Template name; absent means rest.
    pub template: Option<String>,
    pub name: Option<String>,
}

fn default_category() -> String {
    "general".into()
}

fn default_difficulty() -> String {
    "intermediate".into()
}

fn one() -> f64 {
    1.0
}

impl ProgramToml {
    pub fn parse(src: &str) -> Result<Self> {
        Ok(toml::from_str(src)?)
    }

    fn exercise_names(&self) -> BTreeSet<&str> {
        self.templates
            .iter()
            .flat_map(|t| t.exercises.iter())
            .map(|e| e.name.trim())
            .collect()
    }
}

/// An exercise name the library does not know, with its closest match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingExercise {
    pub name: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImportOutcome {
    Imported { program: TrainingProgram },
    AlreadyExists { name: String },
    MissingExercises { missing: Vec<MissingExercise> },
}

/// A definition resolved against the exercise library.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltProgram {
    Ready {
        program: TrainingProgram,
        templates: Vec<WorkoutTemplate>,
    },
    MissingExercises(Vec<MissingExercise>),
}

/// Turn a parsed definition into a program plus its templates. Every
/// exercise must already exist; otherwise the missing names come back.
pub async fn build_program(
    def: &ProgramToml,
    resolver: &dyn ExerciseResolver,
) -> Result<BuiltProgram> {
    let mut resolved: HashMap<&str, ExerciseIdentity> = HashMap::new();
    let mut missing = Vec::new();
    let known = resolver.list_exercises().await?;

    for name in def.exercise_names() {
        match resolver.find_exercise(name).await? {
            Some(ex) => {
                resolved.insert(name, ex);
            }
            None => missing.push(MissingExercise {
                name: name.to_string(),
                suggestion: best_name_suggestion(name, known.iter().map(|e| e.name.as_str()))
                    .map(str::to_string),
            }),
        }
    }
    if !missing.is_empty() {
        return Ok(BuiltProgram::MissingExercises(missing));
    }

    let mut templates = Vec::with_capacity(def.templates.len());
    let mut template_ids: HashMap<&str, String> = HashMap::new();
    for t in &def.templates {
        if template_ids.contains_key(t.name.as_str()) {
            bail!("template `{}` is defined twice", t.name);
        }
        let mut exercises = Vec::with_capacity(t.exercises.len());
        for (i, e) in t.exercises.iter().enumerate() {
            let identity = resolved
                .get(e.name.trim())
                .cloned()
                .with_context(|| format!("exercise `{}` was not resolved", e.name))?;
            let te = TemplateExercise::new(
                i as u32,
                identity,
                e.sets,
                e.rep_min,
                e.rep_max.unwrap_or(e.rep_min),
            )
            .with_context(|| format!("template `{}`, exercise `{}`", t.name, e.name))?;
            exercises.push(te);
        }
        let id = Uuid::new_v4().to_string();
        template_ids.insert(t.name.as_str(), id.clone());
        templates.push(WorkoutTemplate {
            id,
            name: t.name.clone(),
            category: t.category.clone(),
            is_preset: false,
            exercises,
        });
    }

    let mut weeks = Vec::with_capacity(def.weeks.len());
    for (i, w) in def.weeks.iter().enumerate() {
        let number = w.number.unwrap_or(i as u32 + 1);
        let mut days = Vec::with_capacity(w.days.len());
        for d in &w.days {
            let template_id = match &d.template {
                Some(name) => Some(
                    template_ids
                        .get(name.as_str())
                        .cloned()
                        .with_context(|| format!("week {number}, {}: unknown template `{name}`", d.day))?,
                ),
                None => None,
            };
            days.push(ProgramDay {
                day_of_week: d.day,
                template_id,
                name: d.name.clone(),
            });
        }
        weeks.push(ProgramWeek::new(number, w.intensity, w.volume, w.deload)?.with_days(days));
    }

    let program = TrainingProgram {
        id: Uuid::new_v4().to_string(),
        name: def.name.trim().to_string(),
        category: def.category.clone(),
        difficulty: def.difficulty.clone(),
        is_preset: false,
        weeks,
        usage_count: 0,
        last_used_at: None,
    };
    program.validate()?;
    Ok(BuiltProgram::Ready { program, templates })
}

/// Parse, resolve and store a program definition as one unit.
pub async fn import_program(
    programs: &dyn ProgramStore,
    resolver: &dyn ExerciseResolver,
    src: &str,
) -> Result<ImportOutcome> {
    let def = ProgramToml::parse(src)?;
    if programs.fetch_program_by_name(def.name.trim()).await?.is_some() {
        return Ok(ImportOutcome::AlreadyExists {
            name: def.name.trim().to_string(),
        });
    }

    match build_program(&def, resolver).await? {
        BuiltProgram::Ready { program, templates } => {
            programs.save_program(&program, &templates).await?;
            info!(
                program = %program.name,
                weeks = program.duration_weeks(),
                templates = templates.len(),
                "program imported"
            );
            Ok(ImportOutcome::Imported { program })
        }
        BuiltProgram::MissingExercises(missing) => Ok(ImportOutcome::MissingExercises { missing }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    const BLOCK: &str = r#"
name = "Push Pull"
category = "strength"

[[template]]
name = "Push"
  [[template.exercise]]
  name = "bench press"
  sets = 3
  rep_min = 5
  rep_max = 8

[[template]]
name = "Pull"
  [[template.exercise]]
  name = "Barbell Row"
  sets = 3
  rep_min = 8

[[week]]
  [[week.day]]
  day = "monday"
  template = "Push"
  [[week.day]]
  day = "tuesday"
  [[week.day]]
  day = "thursday"
  template = "Pull"

[[week]]
intensity = 0.7
volume = 0.5
deload = true
  [[week.day]]
  day = "monday"
  template = "Push"
"#;

    #[test]
    fn test_presets_are_valid() {
        let presets = presets().unwrap();
        assert!(presets.len() >= 2);
        for p in presets {
            p.program.validate().unwrap();
            assert!(p.program.is_preset);
            assert!(p.program.weeks.iter().any(|w| w.is_deload()));
            for id in p.program.template_ids() {
                assert!(p.templates.iter().any(|t| t.id == id), "dangling template {id}");
            }
        }
        let ul = presets.iter().find(|p| p.program.id == "preset-upper-lower").unwrap();
        assert_eq!(ul.program.duration_weeks(), 6);
        assert!(ul.program.week(4).unwrap().is_deload());
    }

    #[test]
    fn test_preset_exercise_ids_are_stable() {
        assert_eq!(preset_exercise("Pull-Up").id, "preset-ex-pull-up");
        assert_eq!(preset_exercise("Back Squat").id, "preset-ex-back-squat");
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let store = MemoryStore::new();
        assert_eq!(seed_presets(&store, &store).await.unwrap(), 2);
        assert_eq!(seed_presets(&store, &store).await.unwrap(), 0);
        assert_eq!(store.fetch_programs().await.unwrap().len(), 2);
        assert_eq!(store.list_exercises().await.unwrap().len(), PRESET_EXERCISES.len());
    }

    #[tokio::test]
    async fn test_preset_templates_cannot_be_deleted() {
        let store = MemoryStore::new();
        seed_presets(&store, &store).await.unwrap();
        let err = delete_template(&store, "preset-tpl-upper").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ValidationError>(),
            Some(ValidationError::PresetImmutable(_))
        ));
        assert!(store.fetch_template("preset-tpl-upper").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_import_program() {
        let store = MemoryStore::new();
        seed_presets(&store, &store).await.unwrap();

        let outcome = import_program(&store, &store, BLOCK).await.unwrap();
        let ImportOutcome::Imported { program } = outcome else {
            panic!("expected import, got {outcome:?}");
        };
        assert_eq!(program.duration_weeks(), 2);
        assert!(program.week(2).unwrap().is_deload());
        assert!(program.day(1, DayOfWeek::Tuesday).unwrap().1.is_rest());

        let (_, monday) = program.day(1, DayOfWeek::Monday).unwrap();
        let push = store
            .fetch_template(monday.template_id.as_deref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(push.exercises[0].exercise, preset_exercise("Bench Press"));
        assert_eq!((push.exercises[0].rep_min(), push.exercises[0].rep_max()), (5, 8));

        let again = import_program(&store, &store, BLOCK).await.unwrap();
        assert_eq!(
            again,
            ImportOutcome::AlreadyExists {
                name: "Push Pull".into()
            }
        );
    }

    #[tokio::test]
    async fn test_import_refuses_unknown_exercises() {
        let store = MemoryStore::new();
        seed_presets(&store, &store).await.unwrap();
        let src = BLOCK.replace("Barbell Row", "Barbel Rows");

        let outcome = import_program(&store, &store, &src).await.unwrap();
        let ImportOutcome::MissingExercises { missing } = outcome else {
            panic!("expected missing exercises, got {outcome:?}");
        };
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "Barbel Rows");
        assert_eq!(missing[0].suggestion.as_deref(), Some("Barbell Row"));
        assert!(store.fetch_program_by_name("Push Pull").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_import_rejects_unknown_template_and_bad_deload() {
        let store = MemoryStore::new();
        seed_presets(&store, &store).await.unwrap();

        let unknown = BLOCK.replace("template = \"Pull\"", "template = \"Legs\"");
        assert!(import_program(&store, &store, &unknown).await.is_err());

        let bad_deload = BLOCK.replace("intensity = 0.7", "intensity = 1.2");
        let err = import_program(&store, &store, &bad_deload).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ValidationError>(),
            Some(&ValidationError::DeloadNotReduced(2))
        );
    }

    #[tokio::test]
    async fn test_build_program_reports_missing_or_ready() {
        let store = MemoryStore::new();
        seed_presets(&store, &store).await.unwrap();

        let def = ProgramToml::parse(BLOCK).unwrap();
        let BuiltProgram::Ready { program, templates } = build_program(&def, &store).await.unwrap()
        else {
            panic!("every exercise in the block is seeded");
        };
        assert_eq!(templates.len(), 2);
        assert_eq!(program.template_ids().len(), 2);
        // Building alone stores nothing.
        assert!(store.fetch_program_by_name("Push Pull").await.unwrap().is_none());

        let def = ProgramToml::parse(&BLOCK.replace("bench press", "Zercher Squat")).unwrap();
        match build_program(&def, &store).await.unwrap() {
            BuiltProgram::MissingExercises(missing) => {
                assert_eq!(missing[0].name, "Zercher Squat");
            }
            other => panic!("expected missing exercises, got {other:?}"),
        }
    }
}
