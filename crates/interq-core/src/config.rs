//! Client configuration
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a layered resolution:
//! 1. Explicit path (e.g. `--config`), if it exists
//! 2. Override in the config dir (~/.config/interq/config.toml)
//! 3. Embedded defaults (compiled into binary)
//!
//! `INTERQ_API_BASE` then overrides the API base URL.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/interq.toml");

/// Environment variable overriding the API base URL
pub const API_BASE_ENV: &str = "INTERQ_API_BASE";

/// Resolved client configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the advisory API (no trailing slash)
    pub api_base: String,
    /// Timeout for a single HTTP request
    pub request_timeout: Duration,
    /// Downgrade lookups in flight at once while reloading reports
    pub enrichment_concurrency: usize,
    /// Rows per page in the reports and files tables
    pub page_size: usize,
    /// Wait between data arrival and headless capture
    pub settle_delay: Duration,
    /// Bound on a headless export
    pub headless_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:8000".to_string(),
            request_timeout: Duration::from_secs(30),
            enrichment_concurrency: 4,
            page_size: 10,
            settle_delay: Duration::from_millis(350),
            headless_timeout: Duration::from_secs(30),
        }
    }
}

impl ClientConfig {
    /// Load config from an optional explicit path, falling back to the
    /// default override location and then to the embedded defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let content = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(p) if p.exists() => {
                debug!("Loading config from {}", p.display());
                fs::read_to_string(&p)
                    .map_err(|e| Error::Config(format!("Failed to read {}: {}", p.display(), e)))?
            }
            _ => DEFAULT_CONFIG.to_string(),
        };

        let mut config = parse_config(&content)?;
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                config.api_base = normalize_base(&base);
            }
        }
        Ok(config)
    }

    /// Override the API base URL (CLI flag)
    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = normalize_base(base);
        self
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("interq").join("config.toml"))
}

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    api: Option<RawApi>,
    tables: Option<RawTables>,
    export: Option<RawExport>,
}

#[derive(Debug, Deserialize)]
struct RawApi {
    base: Option<String>,
    request_timeout_secs: Option<u64>,
    enrichment_concurrency: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawTables {
    page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawExport {
    settle_delay_ms: Option<u64>,
    headless_timeout_secs: Option<u64>,
}

/// Parse config from TOML content, filling gaps with defaults
fn parse_config(content: &str) -> Result<ClientConfig> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = ClientConfig::default();

    if let Some(api) = raw.api {
        if let Some(base) = api.base {
            config.api_base = normalize_base(&base);
        }
        if let Some(secs) = api.request_timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = api.enrichment_concurrency {
            if limit == 0 {
                return Err(Error::Config("api.enrichment_concurrency must be > 0".into()));
            }
            config.enrichment_concurrency = limit;
        }
    }

    if let Some(tables) = raw.tables {
        if let Some(size) = tables.page_size {
            if size == 0 {
                return Err(Error::Config("tables.page_size must be > 0".into()));
            }
            config.page_size = size;
        }
    }

    if let Some(export) = raw.export {
        if let Some(ms) = export.settle_delay_ms {
            config.settle_delay = Duration::from_millis(ms);
        }
        if let Some(secs) = export.headless_timeout_secs {
            config.headless_timeout = Duration::from_secs(secs);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = parse_config(
            r#"
[api]
base = "https://advisor.example.com/"

[export]
settle_delay_ms = 10
"#,
        )
        .unwrap();
        assert_eq!(config.api_base, "https://advisor.example.com");
        assert_eq!(config.settle_delay, Duration::from_millis(10));
        assert_eq!(config.page_size, 10);
        assert_eq!(config.headless_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = parse_config("[tables]\npage_size = 0\n").unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_enrichment_concurrency() {
        let config = parse_config("[api]\nenrichment_concurrency = 2\n").unwrap();
        assert_eq!(config.enrichment_concurrency, 2);

        let err = parse_config("[api]\nenrichment_concurrency = 0\n").unwrap_err();
        assert!(err.to_string().contains("enrichment_concurrency"));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(parse_config("[api"), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tables]\npage_size = 25").unwrap();

        let config = ClientConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.page_size, 25);
    }

    #[test]
    fn test_with_api_base_trims_slash() {
        let config = ClientConfig::default().with_api_base("http://127.0.0.1:9000/");
        assert_eq!(config.api_base, "http://127.0.0.1:9000");
    }
}
