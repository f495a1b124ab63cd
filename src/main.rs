use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use ironplan::{
    catalog, db,
    storage::SqliteStore,
    types::{Config, OutputFmt},
};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

fn init_tracing(verbose: bool, configured: Option<&str>) {
    let filter = if verbose {
        EnvFilter::new("ironplan=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(configured.unwrap_or("warn")))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = Config::default_path()?;
    let cfg = Config::load(&config_path)?;
    init_tracing(cli.verbose, cfg.log_level());

    let fmt = if cli.json {
        OutputFmt::Json
    } else {
        OutputFmt::Human
    };

    // Config edits must work even when the database cannot be opened.
    match cli.cmd {
        Commands::Config(cmd) => commands::config::handle(cmd, &config_path, fmt).await?,
        cmd => run(cmd, &cfg, fmt).await?,
    }

    Ok(())
}

async fn run(cmd: Commands, cfg: &Config, fmt: OutputFmt) -> Result<()> {
    let pool = db::open(&cfg.db_path()?).await?;
    let store = SqliteStore::new(pool);
    catalog::seed_presets(&store, &store).await?;

    match cmd {
        Commands::Program(cmd) => commands::program::handle(cmd, &store, fmt).await?,
        Commands::Calendar { days } => {
            let days = days.unwrap_or_else(|| cfg.window_days());
            commands::calendar::handle(days, &store, fmt).await?
        }
        Commands::Session(cmd) => commands::session::handle(cmd, &store, cfg, fmt).await?,
        Commands::Pr(cmd) => commands::pr::handle(cmd, &store, fmt).await?,
        Commands::Exercise(cmd) => commands::exercise::handle(cmd, &store, fmt).await?,
        Commands::Config(cmd) => {
            commands::config::handle(cmd, &Config::default_path()?, fmt).await?
        }
    }

    Ok(())
}
