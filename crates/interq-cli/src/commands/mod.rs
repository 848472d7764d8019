//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `files` - Upload, file listing and CSV templates
//! - `reports` - Report generation, listing and detail
//! - `export` - PDF export, attended and unattended
//! - `compliance` - Compliance checks on uploaded files

pub mod compliance;
pub mod export;
pub mod files;
pub mod reports;

// Re-export command functions for main.rs
pub use compliance::*;
pub use export::*;
pub use files::*;
pub use reports::*;

use std::path::Path;

use anyhow::{Context, Result};
use interq_core::lifecycle::{Notice, NoticeLevel};
use interq_core::models::parse_timestamp;
use interq_core::{ClientConfig, HttpStore};

/// Resolve config: file (or defaults), then environment, then `--api-base`
pub fn load_config(path: Option<&Path>, api_base: Option<&str>) -> Result<ClientConfig> {
    let config = ClientConfig::load(path).context("Failed to load config")?;
    Ok(match api_base {
        Some(base) => config.with_api_base(base),
        None => config,
    })
}

/// HTTP client for the configured advisory API
pub fn open_store(config: &ClientConfig) -> Result<HttpStore> {
    HttpStore::from_config(config).context("Failed to create HTTP client")
}

/// Print lifecycle notices in order
pub fn print_notices(notices: &[Notice]) {
    for notice in notices {
        match notice.level {
            NoticeLevel::Success => println!("✅ {}", notice.message),
            NoticeLevel::Error => println!("⚠️  {}", notice.message),
        }
    }
}

/// Short display form of a server timestamp, or the raw text if unparseable
pub fn format_timestamp(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => raw.to_string(),
    }
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
