use clap::{Parser, Subcommand};
use ironplan::types::WorkoutKind;

#[derive(Parser)]
#[command(name = "ironplan", version, about = "Training program planner and PR tracker")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Emit machine-readable JSON instead of colorful text.
    #[arg(global = true, long)]
    pub json: bool,

    /// Verbose logging on stderr.
    #[arg(global = true, short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Program management and progression
    #[command(subcommand, visible_alias = "p")]
    Program(ProgramCmd),

    /// Logged workouts merged with the upcoming program days
    #[command(visible_alias = "cal")]
    Calendar {
        /// Days to look ahead (defaults to the `window_days` config key, else 30)
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Session suggestions and logging
    #[command(subcommand, visible_alias = "s")]
    Session(SessionCmd),

    /// Personal records
    #[command(subcommand)]
    Pr(PrCmd),

    /// Exercise library
    #[command(subcommand, visible_alias = "ex")]
    Exercise(ExerciseCmd),

    /// View or edit ironplan config
    #[command(subcommand)]
    Config(ConfigCmd),
}

//
// Commands
//

#[derive(Subcommand)]
pub enum ProgramCmd {
    /// Import one or more programs from TOML files
    #[command(visible_alias = "i")]
    Import { files: Vec<String> },

    /// List programs
    #[command(visible_alias = "l")]
    List,

    /// Show a single program in detail
    #[command(visible_alias = "s")]
    Show {
        /// Program index (from `p list`) or exact name
        program: String,
    },

    /// Start a program at week 1
    #[command(visible_alias = "a")]
    Activate {
        /// Program index (from `p list`) or exact name
        program: String,
    },

    /// Move the active program to its next week
    Advance,

    /// Stop the active program
    Deactivate,

    /// Show the active program's progress
    #[command(visible_alias = "st")]
    Status,

    /// Set the stored week to the week the calendar says
    Sync,

    /// Show what the program schedules for today
    #[command(visible_alias = "t")]
    Today,

    /// Delete a program
    #[command(visible_alias = "d")]
    Delete {
        /// Program index (from `p list`) or exact name
        program: String,
    },
}

#[derive(Subcommand)]
pub enum SessionCmd {
    /// Suggest loads for today's program day, or for a named template
    Suggest {
        /// Template name (defaults to today's program day)
        template: Option<String>,
    },

    /// Log a completed session from a TOML file
    Log { file: String },

    /// List recent sessions
    #[command(visible_alias = "l")]
    List {
        /// Number of sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Only sessions of this kind
        #[arg(short, long)]
        kind: Option<WorkoutKind>,
    },
}

#[derive(Subcommand)]
pub enum PrCmd {
    /// Current record for every exercise
    #[command(visible_alias = "l")]
    List,

    /// Record history of one exercise
    #[command(visible_alias = "s", trailing_var_arg = true)]
    Show {
        /// Exercise name
        exercise: Vec<String>,

        /// Show progression graph
        #[arg(short, long)]
        graph: bool,
    },

    /// Rebuild every record from the full workout history
    Recalc,
}

#[derive(Subcommand)]
pub enum ExerciseCmd {
    /// List all exercises
    #[command(visible_alias = "l")]
    List,

    /// Add a new exercise
    #[command(visible_alias = "a", trailing_var_arg = true)]
    Add {
        /// Exercise name
        name: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Show all config keys
    List,

    /// Get the value of a key
    Get { key: String },

    /// Set or override a key
    Set { key: String, val: String },

    /// Remove a key
    Unset { key: String },
}
