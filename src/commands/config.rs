use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use ironplan::types::{Config, KNOWN_KEYS, OutputFmt, emit};

use crate::cli::ConfigCmd;

pub async fn handle(cmd: ConfigCmd, config_path: &Path, fmt: OutputFmt) -> Result<()> {
    let mut cfg = Config::load(config_path)?;

    match cmd {
        ConfigCmd::List => {
            emit(fmt, &cfg, || {
                println!("{}", "Settings:".cyan().bold());
                for (k, v) in &cfg.map {
                    println!("  {} = {}", k.green(), v);
                }
                let unset: Vec<_> = KNOWN_KEYS
                    .iter()
                    .filter(|k| !cfg.map.contains_key(**k))
                    .collect();
                if !unset.is_empty() {
                    println!(
                        "  {}",
                        format!(
                            "using defaults for: {}",
                            unset.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
                        )
                        .dimmed()
                    );
                }
            });
        }

        ConfigCmd::Get { key } => match cfg.map.get(&key) {
            Some(val) => emit(fmt, val, || println!("{}", val)),
            None if KNOWN_KEYS.contains(&key.as_str()) => {
                println!("{} `{}` is unset; the default applies", "info:".blue().bold(), key)
            }
            None => println!("{} no setting `{}`", "warning:".yellow().bold(), key),
        },

        ConfigCmd::Set { key, val } => {
            if let Err(e) = Config::check_value(&key, &val) {
                println!("{} {}", "error:".red().bold(), e);
                return Ok(());
            }
            if !KNOWN_KEYS.contains(&key.as_str()) {
                println!(
                    "{} ironplan does not read `{}`; storing it anyway",
                    "note:".yellow().bold(),
                    key
                );
            }
            cfg.map.insert(key.clone(), val.clone());
            cfg.save(config_path)?;
            println!("{} {} = {}", "ok:".green().bold(), key.green(), val);
        }

        ConfigCmd::Unset { key } => {
            if cfg.map.remove(&key).is_some() {
                cfg.save(config_path)?;
                println!("{} cleared `{}`", "ok:".green().bold(), key.green());
            } else {
                println!("{} no setting `{}`", "warning:".yellow().bold(), key);
            }
        }
    }

    Ok(())
}
