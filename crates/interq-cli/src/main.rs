//! InterQ CLI - Interchange fee downgrade advisor
//!
//! Usage:
//!   interq upload FILE --generate     Upload a CSV and generate its report
//!   interq reports --search visa      List reports
//!   interq show REPORT_ID             Show a report
//!   interq export REPORT_ID           Export a report as PDF

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    // Templates are built locally and need no config
    if let Commands::Template { brand, output } = &cli.command {
        commands::cmd_template(*brand, output.as_deref())?;
        return Ok(());
    }

    let config = commands::load_config(cli.config.as_deref(), cli.api_base.as_deref())?;

    match cli.command {
        Commands::Upload { file, generate } => commands::cmd_upload(&config, &file, generate).await,
        Commands::Generate { file_id } => commands::cmd_generate(&config, &file_id).await,
        Commands::Reports { table } => commands::cmd_reports(&config, &table).await,
        Commands::Files { table } => commands::cmd_files(&config, &table).await,
        Commands::Show { report_id, json } => commands::cmd_show(&config, &report_id, json).await,
        Commands::Export {
            report,
            output,
            png,
            headless,
        } => commands::cmd_export(
            &config,
            &report,
            output.as_deref(),
            png.as_deref(),
            headless,
        )
        .await
        .map(|_| ()),
        Commands::Template { .. } => Ok(()),
        Commands::Compliance {
            file_id,
            min_severity,
            format,
            csv,
            json,
        } => commands::cmd_compliance(&config, &file_id, min_severity, format, csv, json)
            .await
            .map(|_| ()),
    }
}
