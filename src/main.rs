//! Carousel - Transient cycling for selection commands
//!
//! CLI entry point: replay scripted sessions against the in-memory
//! workspace, or diagnose configuration and journal health.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use carousel::cli::{render_diagnostic_report, ReplayDisplay};
use carousel::doctor::diagnose;
use carousel::log::SelectionLogger;
use carousel::replay::ReplayRunner;
use carousel::Config;

/// Transient cycling for selection commands
///
/// Replays scripted editing sessions through the cycling engine and
/// analyzes configuration and journal health.
#[derive(Parser, Debug)]
#[command(name = "carousel", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the carousel.toml configuration file
    #[arg(long, global = true, default_value = "carousel.toml")]
    config: PathBuf,

    /// Directory for the selection journal (.carousel by default)
    #[arg(long, global = true, default_value = ".carousel")]
    log_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a replay script against a fresh workspace
    Replay {
        /// Path to the script file
        script: PathBuf,
    },
    /// Analyze carousel.toml and the selection journal for problems
    Doctor,
}

/// Load configuration, falling back to defaults when the file is absent.
fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        Config::from_path(path)
            .with_context(|| format!("Failed to load config from '{}'", path.display()))
    } else {
        Ok(Config::default())
    }
}

fn run_replay(config: Config, script_path: &Path, log_dir: &Path) -> Result<()> {
    let content = std::fs::read_to_string(script_path)
        .with_context(|| format!("Failed to read script '{}'", script_path.display()))?;

    let display = ReplayDisplay::new(&script_path.display().to_string());
    display.print_header();

    let result = ReplayRunner::new(config).run(&content)?;
    for line in &result.transcript {
        display.render_line(line);
    }

    let logger = SelectionLogger::new(log_dir).context("Failed to initialize journal")?;
    for record in &result.records {
        logger.append(record).context("Failed to write to journal")?;
    }

    display.render_summary(&result);
    Ok(())
}

fn run_doctor(config: &Config, log_dir: &Path) -> Result<()> {
    let logger = SelectionLogger::new(log_dir).context("Failed to initialize journal")?;
    let log = logger.read_all().context("Failed to read journal")?;

    let report = diagnose(config, &log);
    render_diagnostic_report(&report);

    if report.error_count() > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Replay { script } => run_replay(config, &script, &cli.log_dir),
        Commands::Doctor => run_doctor(&config, &cli.log_dir),
    }
}
