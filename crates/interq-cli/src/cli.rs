//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use interq_core::compliance::Severity;
use interq_core::models::Brand;
use interq_core::table::SortOrder;

/// InterQ - Interchange fee downgrade advisor
#[derive(Parser)]
#[command(name = "interq")]
#[command(about = "Upload transaction files, generate downgrade reports and export them", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to ~/.config/interq/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Advisory API base URL (overrides config and INTERQ_API_BASE)
    #[arg(long, global = true)]
    pub api_base: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload a transaction file (.csv)
    Upload {
        /// CSV file to upload
        file: PathBuf,

        /// Generate a report right after the upload
        #[arg(short, long)]
        generate: bool,
    },

    /// Generate a report for an uploaded file
    Generate {
        /// File id returned by upload
        file_id: String,
    },

    /// List generated reports
    Reports {
        #[command(flatten)]
        table: TableArgs,
    },

    /// List uploaded files
    Files {
        #[command(flatten)]
        table: TableArgs,
    },

    /// Show a report's feature importances and transactions
    Show {
        /// Report id
        report_id: String,

        /// Output the aggregated report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a report as a multi-page PDF
    Export {
        /// Report id, or a report URL (`/reports/{id}?download=1` runs unattended)
        report: String,

        /// Output file (defaults to report-{id}.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Paginate an existing PNG screenshot instead of rendering the charts
        #[arg(long)]
        png: Option<PathBuf>,

        /// Run unattended: wait for data, settle, export, bounded by a timeout
        #[arg(long)]
        headless: bool,
    },

    /// Write a header-only CSV template for a brand
    Template {
        /// Brand: visa or mastercard
        brand: Brand,

        /// Output file (defaults to {brand}_template.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run a compliance check on an uploaded file
    Compliance {
        /// File id returned by upload
        file_id: String,

        /// Lowest severity that counts as a failure: low, medium, high
        #[arg(long, default_value = "medium")]
        min_severity: Severity,

        /// Force a brand mapping instead of auto-detection
        #[arg(long)]
        format: Option<Brand>,

        /// Ask the server for a results CSV
        #[arg(long)]
        csv: bool,

        /// Output the raw summary as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Search, sort and paging options shared by the listing commands
#[derive(clap::Args, Debug, Clone)]
pub struct TableArgs {
    /// Case-insensitive file name filter
    #[arg(short, long)]
    pub search: Option<String>,

    /// Date sort: asc or desc
    #[arg(long, default_value = "desc")]
    pub sort: SortOrder,

    /// Page to show
    #[arg(short, long, default_value = "1")]
    pub page: usize,

    /// Rows per page (defaults to the configured page size)
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Output as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}
