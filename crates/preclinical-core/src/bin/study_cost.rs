//! Study cost report CLI.
//!
//! Usage:
//!   study-cost [--config <file>] [--database <db>] [--format json|csv | --lines] <STUDY_ID>

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use preclinical_core::config::load_config;
use preclinical_core::{CostEngine, Database};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "study-cost")]
#[command(version)]
#[command(about = "Print the cost report of a preclinical study", long_about = None)]
struct Cli {
    /// Study to report on
    study_id: String,

    /// Config file (defaults to PRECLINICAL_CONFIG_PATH, then built-in defaults)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file, overriding the configured one
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Output format [default: json]
    #[arg(short, long, value_enum)]
    format: Option<Format>,

    /// Print per-visit cost lines as JSON instead of the summary
    #[arg(long, conflicts_with = "format")]
    lines: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Format {
    Json,
    Csv,
}

/// Cost lines of one visit.
#[derive(Serialize)]
struct VisitLines {
    visit_id: String,
    visit_name: String,
    lines: Vec<preclinical_core::VisitCostLine>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(path) = cli.database {
        config.database.path = Some(path);
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if config.database.path.is_none() {
        tracing::warn!("no database path configured; reporting from an empty in-memory database");
    }
    let db = Database::from_config(&config.database).context("Failed to open database")?;
    let engine = CostEngine::new(&db);
    let report = engine
        .study_cost(&cli.study_id)
        .with_context(|| format!("Failed to cost study {}", cli.study_id))?;

    let output = if cli.lines {
        let mut visits = Vec::with_capacity(report.visit_costs.len());
        for entry in &report.visit_costs {
            visits.push(VisitLines {
                visit_id: entry.visit_id.clone(),
                visit_name: entry.visit_name.clone(),
                lines: engine.visit_cost_lines(&entry.visit_id)?,
            });
        }
        serde_json::to_string_pretty(&visits)?
    } else {
        match cli.format.unwrap_or(Format::Json) {
            Format::Json => report.to_json()?,
            Format::Csv => report.to_csv(),
        }
    };

    println!("{}", output.trim_end());
    Ok(())
}
