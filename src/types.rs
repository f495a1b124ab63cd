use std::{
    collections::BTreeMap,
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use strsim::jaro_winkler;

/// Day of the week, numbered ISO 8601 style: Monday = 1 … Sunday = 7.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
    Sunday = 7,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    pub fn of(date: NaiveDate) -> Self {
        date.weekday().into()
    }

    pub fn number(self) -> u32 {
        self as u32
    }

    pub fn from_number(n: u32) -> Option<Self> {
        Self::ALL.get(n.checked_sub(1)? as usize).copied()
    }

    pub fn short(self) -> &'static str {
        match self {
            Self::Monday => "Mon",
            Self::Tuesday => "Tue",
            Self::Wednesday => "Wed",
            Self::Thursday => "Thu",
            Self::Friday => "Fri",
            Self::Saturday => "Sat",
            Self::Sunday => "Sun",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(w: Weekday) -> Self {
        match w {
            Weekday::Mon => Self::Monday,
            Weekday::Tue => Self::Tuesday,
            Weekday::Wed => Self::Wednesday,
            Weekday::Thu => Self::Thursday,
            Weekday::Fri => Self::Friday,
            Weekday::Sat => Self::Saturday,
            Weekday::Sun => Self::Sunday,
        }
    }
}

impl Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        };

        write!(f, "{}", s)
    }
}

impl FromStr for DayOfWeek {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if let Ok(n) = lower.parse::<u32>() {
            return Self::from_number(n).ok_or_else(|| format!("day number {n} is outside 1..=7"));
        }
        Self::ALL
            .iter()
            .copied()
            .find(|d| d.to_string() == lower || d.short().to_ascii_lowercase() == lower)
            .ok_or_else(|| format!("unknown day of week: {s}"))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkoutKind {
    Lifting,
    Cardio,
    Metcon,
}

impl Display for WorkoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Lifting => "lifting",
            Self::Cardio => "cardio",
            Self::Metcon => "metcon",
        };

        write!(f, "{}", s)
    }
}

impl FromStr for WorkoutKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lifting" => Ok(Self::Lifting),
            "cardio" => Ok(Self::Cardio),
            "metcon" => Ok(Self::Metcon),
            _ => Err(format!("unknown workout kind: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OneRmFormula {
    #[default]
    Brzycki,
    Epley,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFmt {
    Human,
    Json,
}

/// Print `value` as JSON, or run the human renderer.
pub fn emit<T: Serialize, F: FnOnce()>(fmt: OutputFmt, value: &T, human: F) {
    match fmt {
        OutputFmt::Json => match serde_json::to_string_pretty(value) {
            Ok(s) => println!("{s}"),
            Err(e) => tracing::error!(error = %e, "failed to serialize output"),
        },
        OutputFmt::Human => human(),
    }
}

/// Return the closest candidate for `input`
/// if similarity ≥ 0.80 *and* clearly better than the runner-up.
pub fn best_name_suggestion<'a, I>(input: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let inp = input.trim().to_ascii_lowercase();
    if inp.is_empty() {
        return None;
    }

    let mut scores: Vec<(&'a str, f64)> = candidates
        .into_iter()
        .map(|c| (c, jaro_winkler(&inp, &c.to_ascii_lowercase())))
        .collect();

    // Highest score first.
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));

    let (best, best_score) = *scores.first()?;
    let second_score = scores.get(1).map(|(_, s)| *s).unwrap_or(0.0);

    const MIN_SCORE: f64 = 0.80;
    const GAP: f64 = 0.02;

    if best_score >= MIN_SCORE && best_score - second_score >= GAP {
        Some(best)
    } else {
        None
    }
}

pub const DEFAULT_WEIGHT_INCREMENT: f64 = 2.5;
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Keys ironplan reads. Anything else is stored but ignored.
pub const KNOWN_KEYS: &[&str] = &["db_path", "weight_increment", "window_days", "log_level"];

/// Flat key/value settings persisted as TOML.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    pub map: BTreeMap<String, String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join("ironplan").join("config.toml"))
            .context("Could not determine config directory")
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        let raw = toml::to_string(self)?;
        fs::write(path, raw).with_context(|| format!("Failed to save config to {}", path.display()))
    }

    /// Database location: `IRONPLAN_DB`, then `db_path`, then the user data dir.
    pub fn db_path(&self) -> Result<PathBuf> {
        if let Ok(p) = std::env::var("IRONPLAN_DB") {
            if !p.is_empty() {
                return Ok(PathBuf::from(p));
            }
        }
        if let Some(p) = self.map.get("db_path") {
            return Ok(PathBuf::from(p));
        }
        dirs::data_dir()
            .map(|d| d.join("ironplan").join("ironplan.db"))
            .context("Could not determine data directory")
    }

    pub fn weight_increment(&self) -> f64 {
        self.parsed("weight_increment")
            .filter(|v: &f64| *v > 0.0)
            .unwrap_or(DEFAULT_WEIGHT_INCREMENT)
    }

    pub fn window_days(&self) -> u32 {
        self.parsed("window_days").unwrap_or(DEFAULT_WINDOW_DAYS)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.map.get("log_level").map(String::as_str)
    }

    /// Reject values a known key could never use.
    pub fn check_value(key: &str, val: &str) -> Result<()> {
        match key {
            "weight_increment" => match val.parse::<f64>() {
                Ok(v) if v > 0.0 => Ok(()),
                _ => anyhow::bail!("`weight_increment` must be a positive number, got `{val}`"),
            },
            "window_days" => match val.parse::<u32>() {
                Ok(v) if v > 0 => Ok(()),
                _ => anyhow::bail!("`window_days` must be a whole number of days, got `{val}`"),
            },
            "db_path" | "log_level" if val.trim().is_empty() => {
                anyhow::bail!("`{key}` must not be empty")
            }
            _ => Ok(()),
        }
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        let raw = self.map.get(key)?;
        match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(key, value = %raw, "ignoring unparsable config value");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_day_of_week_is_iso_numbered() {
        // 2024-01-01 was a Monday.
        let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(DayOfWeek::of(monday), DayOfWeek::Monday);
        assert_eq!(DayOfWeek::of(monday).number(), 1);
        let sunday = NaiveDate::from_ymd_opt(2024, 1, 7).unwrap();
        assert_eq!(DayOfWeek::of(sunday).number(), 7);
        assert_eq!(DayOfWeek::from_number(0), None);
        assert_eq!(DayOfWeek::from_number(8), None);
    }

    #[test]
    fn test_day_of_week_parses_names_and_numbers() {
        assert_eq!("mon".parse::<DayOfWeek>(), Ok(DayOfWeek::Monday));
        assert_eq!("Friday".parse::<DayOfWeek>(), Ok(DayOfWeek::Friday));
        assert_eq!("7".parse::<DayOfWeek>(), Ok(DayOfWeek::Sunday));
        assert!("someday".parse::<DayOfWeek>().is_err());
    }

    #[test]
    fn test_best_name_suggestion() {
        let names = ["Back Squat", "Bench Press", "Deadlift", "Overhead Press"];
        assert_eq!(best_name_suggestion("deadlfit", names), Some("Deadlift"));
        assert_eq!(best_name_suggestion("zzz", names), None);
        assert_eq!(best_name_suggestion("   ", names), None);
    }

    #[test]
    fn test_config_round_trip_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = Config::load(&path).unwrap();
        assert!(cfg.map.is_empty());
        assert_eq!(cfg.weight_increment(), DEFAULT_WEIGHT_INCREMENT);
        assert_eq!(cfg.window_days(), DEFAULT_WINDOW_DAYS);

        let mut cfg = cfg;
        cfg.map.insert("weight_increment".into(), "5".into());
        cfg.map.insert("window_days".into(), "14".into());
        cfg.map.insert("unit".into(), "lb".into());
        cfg.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.weight_increment(), 5.0);
        assert_eq!(loaded.window_days(), 14);
        assert_eq!(loaded.map.get("unit").map(String::as_str), Some("lb"));
    }

    #[test]
    fn test_config_ignores_bad_values() {
        let mut cfg = Config::default();
        cfg.map.insert("weight_increment".into(), "heavy".into());
        cfg.map.insert("window_days".into(), "-3".into());
        assert_eq!(cfg.weight_increment(), DEFAULT_WEIGHT_INCREMENT);
        assert_eq!(cfg.window_days(), DEFAULT_WINDOW_DAYS);
    }

    #[test]
    fn test_check_value_guards_known_keys() {
        assert!(Config::check_value("weight_increment", "1.25").is_ok());
        assert!(Config::check_value("weight_increment", "0").is_err());
        assert!(Config::check_value("window_days", "two weeks").is_err());
        assert!(Config::check_value("db_path", " ").is_err());
        assert!(Config::check_value("unit", "").is_ok());
    }
}
