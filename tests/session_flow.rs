use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use ironplan::{
    catalog,
    db,
    models::{
        ExerciseIdentity, ProgramDay, ProgramWeek, TemplateExercise, TrainingProgram, Workout,
        WorkoutExercise, WorkoutSet, WorkoutTemplate,
    },
    overload::{self, SessionPlan},
    progression, records,
    schedule::{self, ActiveSchedule, CalendarEntry},
    storage::{
        MemoryStore, PersonalRecordStore, ProgramStore, SqliteStore, UserProfileStore,
        WorkoutStore,
    },
    types::{DayOfWeek, WorkoutKind},
};

fn squat() -> ExerciseIdentity {
    ExerciseIdentity::new("ex-squat", "Back Squat")
}

fn deadlift() -> ExerciseIdentity {
    ExerciseIdentity::new("ex-deadlift", "Deadlift")
}

/// Monday 2024-01-01, 07:00 UTC.
fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 7, 0, 0).unwrap()
}

fn day(offset: i64) -> NaiveDate {
    (start() + Duration::days(offset)).date_naive()
}

fn templates() -> Vec<WorkoutTemplate> {
    vec![
        WorkoutTemplate {
            id: "tpl-a".into(),
            name: "A".into(),
            category: "strength".into(),
            is_preset: false,
            exercises: vec![
                TemplateExercise::new(0, squat(), 3, 5, 5).unwrap(),
                TemplateExercise::new(1, deadlift(), 1, 5, 5).unwrap(),
            ],
        },
        WorkoutTemplate {
            id: "tpl-b".into(),
            name: "B".into(),
            category: "strength".into(),
            is_preset: false,
            exercises: vec![TemplateExercise::new(0, squat(), 3, 8, 10).unwrap()],
        },
    ]
}

fn four_week_program() -> TrainingProgram {
    let days = || {
        vec![
            ProgramDay::training(DayOfWeek::Monday, "tpl-a"),
            ProgramDay::rest(DayOfWeek::Tuesday),
            ProgramDay::training(DayOfWeek::Thursday, "tpl-b"),
        ]
    };
    TrainingProgram {
        id: "prog".into(),
        name: "Four Week Block".into(),
        category: "strength".into(),
        difficulty: "beginner".into(),
        is_preset: false,
        weeks: vec![
            ProgramWeek::standard(1).with_days(days()),
            ProgramWeek::new(2, 1.05, 1.0, false).unwrap().with_days(days()),
            ProgramWeek::new(3, 1.1, 1.0, false).unwrap().with_days(days()),
            ProgramWeek::new(4, 0.6, 0.5, true).unwrap().with_days(days()),
        ],
        usage_count: 0,
        last_used_at: None,
    }
}

fn squat_session(id: &str, offset_days: i64, weight: f64, reps: u32) -> Workout {
    Workout {
        id: id.into(),
        date: start() + Duration::days(offset_days) + Duration::hours(10),
        kind: WorkoutKind::Lifting,
        duration_minutes: 60,
        template_id: Some("tpl-a".into()),
        notes: None,
        rating: Some(4),
        exercises: vec![WorkoutExercise {
            exercise: squat(),
            order_index: 0,
            sets: vec![WorkoutSet::done(weight, reps)],
        }],
    }
}

async fn seeded_memory_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .save_program(&four_week_program(), &templates())
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn week_two_suggestion_builds_on_last_session() {
    let store = seeded_memory_store().await;
    progression::activate_program(&store, &store, "prog", start())
        .await
        .unwrap();

    let first = squat_session("w1", 0, 100.0, 5);
    store.save_workout(&first).await.unwrap();
    let prs = records::detect_and_save(&store, &first).await.unwrap();
    assert_eq!(prs.len(), 1);

    // Monday of week 2, no explicit advance.
    let plan = overload::plan_session(&store, &store, &store, &store, day(7), 20)
        .await
        .unwrap();
    let SessionPlan::Train {
        week_number,
        suggestion,
        is_deload,
        ..
    } = plan
    else {
        panic!("expected a training day, got {plan:?}");
    };
    assert_eq!(week_number, 2);
    assert!(!is_deload);

    let sq = &suggestion.exercises[0];
    assert_eq!(sq.exercise.id, "ex-squat");
    assert!((sq.weight - 105.0).abs() < 1e-9);
    assert_eq!(sq.reps, 5);

    let dl = &suggestion.exercises[1];
    assert_eq!(dl.exercise.id, "ex-deadlift");
    assert_eq!(dl.weight, 0.0);
    assert_eq!(dl.reps, 5);

    assert_eq!(
        store.fetch_or_create_profile().await.unwrap().current_week,
        Some(1)
    );
}

#[tokio::test]
async fn elapsed_days_pick_the_week_not_the_stored_counter() {
    let store = seeded_memory_store().await;
    progression::activate_program(&store, &store, "prog", start())
        .await
        .unwrap();

    let (profile, program) = progression::load_active(&store, &store)
        .await
        .unwrap()
        .unwrap();
    // Ten days in: Thursday of week 2.
    let today = progression::todays_workout(&profile, &program, day(10)).unwrap();
    assert_eq!(today.week_number, 2);
    assert_eq!(today.day.template_id.as_deref(), Some("tpl-b"));
    assert_eq!(profile.current_week, Some(1));

    let status = progression::status(&profile, &program, day(10));
    assert!(status.is_behind_schedule);
}

#[tokio::test]
async fn rest_and_deload_days_are_planned() {
    let store = seeded_memory_store().await;
    progression::activate_program(&store, &store, "prog", start())
        .await
        .unwrap();

    let rest = overload::plan_session(&store, &store, &store, &store, day(1), 20)
        .await
        .unwrap();
    assert_eq!(rest, SessionPlan::Rest { week_number: 1 });

    let nothing = overload::plan_session(&store, &store, &store, &store, day(2), 20)
        .await
        .unwrap();
    assert_eq!(nothing, SessionPlan::Unscheduled);

    let deload = overload::plan_session(&store, &store, &store, &store, day(21), 20)
        .await
        .unwrap();
    let SessionPlan::Train {
        is_deload,
        volume_modifier,
        suggestion,
        ..
    } = deload
    else {
        panic!("expected deload training day, got {deload:?}");
    };
    assert!(is_deload);
    assert_eq!(suggestion.exercises[0].display_sets(volume_modifier), 2);
}

#[tokio::test]
async fn full_program_lifecycle() {
    let store = seeded_memory_store().await;
    progression::activate_program(&store, &store, "prog", start())
        .await
        .unwrap();

    for _ in 0..3 {
        progression::advance_active(&store, &store, start())
            .await
            .unwrap();
    }
    let (profile, program) = progression::load_active(&store, &store)
        .await
        .unwrap()
        .unwrap();
    assert!(!progression::is_completed(&profile, &program));

    assert_eq!(
        progression::advance_active(&store, &store, start())
            .await
            .unwrap(),
        progression::AdvanceOutcome::Completed
    );
    let (profile, program) = progression::load_active(&store, &store)
        .await
        .unwrap()
        .unwrap();
    assert!(progression::is_completed(&profile, &program));
    assert_eq!(profile.current_week, Some(4));

    progression::deactivate_active(&store).await.unwrap();
    let again = progression::activate_program(&store, &store, "prog", start())
        .await
        .unwrap();
    assert_eq!(again.usage_count, 2);
}

#[tokio::test]
async fn calendar_never_plans_over_logged_days() {
    let store = seeded_memory_store().await;
    progression::activate_program(&store, &store, "prog", start())
        .await
        .unwrap();
    store
        .save_workout(&squat_session("mon", 0, 100.0, 5))
        .await
        .unwrap();
    store
        .save_workout(&squat_session("thu", 3, 102.5, 5))
        .await
        .unwrap();

    let workouts = store.fetch_workouts().await.unwrap();
    let (profile, program) = progression::load_active(&store, &store)
        .await
        .unwrap()
        .unwrap();
    let active = ActiveSchedule {
        program: &program,
        start_date: profile.active_program_start.unwrap().date_naive(),
        current_week: profile.current_week.unwrap(),
    };
    let items = schedule::merge(&workouts, Some(active), day(0), 30);

    for w in &workouts {
        let same_day: Vec<_> = items.iter().filter(|i| i.date == w.day()).collect();
        assert!(same_day.iter().all(|i| i.is_completed()));
    }
    assert!(items.windows(2).all(|p| p[0].date <= p[1].date));

    // Four weeks of Mon/Tue/Thu minus the two logged days.
    let planned = items
        .iter()
        .filter(|i| !i.is_completed())
        .count();
    assert_eq!(planned, 4 * 3 - 2);
    assert!(items.iter().any(|i| matches!(
        i.entry,
        CalendarEntry::Planned { is_deload: true, .. }
    )));
}

#[tokio::test]
async fn sqlite_store_runs_the_same_flow() {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::open(&dir.path().join("ironplan.db")).await.unwrap();
    let store = SqliteStore::new(pool);

    assert_eq!(catalog::seed_presets(&store, &store).await.unwrap(), 2);
    assert_eq!(catalog::seed_presets(&store, &store).await.unwrap(), 0);

    let program = progression::activate_program(&store, &store, "preset-linear-strength", start())
        .await
        .unwrap();
    assert_eq!(program.usage_count, 1);

    let squat = catalog::preset_exercise("Back Squat");
    let mut history = Vec::new();
    for (i, (w, r)) in [(100.0, 5), (100.0, 5), (102.5, 5), (95.0, 8)].iter().enumerate() {
        let mut session = squat_session(&format!("w{i}"), i as i64 * 2, *w, *r);
        session.template_id = Some("preset-tpl-strength-a".into());
        session.exercises[0].exercise = squat.clone();
        store.save_workout(&session).await.unwrap();
        records::detect_and_save(&store, &session).await.unwrap();
        history.push(session);
    }

    // 100x5 (112.5), tie, 102.5x5 (115.3), 95x8 (118.2).
    let logged = store.fetch_records().await.unwrap();
    assert_eq!(logged.len(), 3);

    let rebuilt = records::recalculate_all(&store, &store.fetch_workouts().await.unwrap())
        .await
        .unwrap();
    let rebuilt_again = records::recalculate_all(&store, &history).await.unwrap();
    let key = |rs: &[ironplan::models::PersonalRecord]| {
        rs.iter()
            .map(|r| (r.workout_id.clone(), r.estimated_1rm.to_bits()))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&rebuilt), key(&rebuilt_again));
    assert_eq!(key(&rebuilt), key(&store.fetch_records().await.unwrap()));

    let current = records::current_records(&rebuilt);
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].workout_id, "w3");

    let err = progression::delete_program(&store, &store, "preset-linear-strength")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("preset"));
}
