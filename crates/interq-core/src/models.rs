//! Data models for files, reports and report details
//!
//! Wire shapes follow the advisory API. The API is loose about types (numbers
//! arrive as strings, ids as numbers or strings), so the deserializers here
//! accept either form.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// File extension accepted for upload
pub const ACCEPTED_EXTENSION: &str = ".csv";

/// Payment network a transaction file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    Visa,
    Mastercard,
}

impl Brand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
        }
    }

    /// Column prefix the brand's files use (`visa_...`, `mc_...`)
    pub fn column_prefix(&self) -> &'static str {
        match self {
            Self::Visa => "visa_",
            Self::Mastercard => "mc_",
        }
    }

    pub fn all() -> &'static [Brand] {
        &[Self::Visa, Self::Mastercard]
    }
}

impl std::str::FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "visa" => Ok(Self::Visa),
            "mastercard" | "mc" | "master_card" => Ok(Self::Mastercard),
            _ => Err(format!("Unknown brand: {}", s)),
        }
    }
}

impl std::fmt::Display for Brand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A locally selected file awaiting submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub display_name: String,
}

impl UploadedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, display_name }
    }

    /// Whether the name ends in `.csv`, ignoring case
    pub fn has_accepted_extension(&self) -> bool {
        has_accepted_extension(&self.display_name)
    }
}

/// Case-insensitive `.csv` suffix check
pub fn has_accepted_extension(name: &str) -> bool {
    name.to_lowercase().ends_with(ACCEPTED_EXTENSION)
}

/// The store's record of an uploaded file (upload response)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFileRecord {
    #[serde(default, deserialize_with = "de_string_lenient")]
    pub message: String,
    #[serde(rename = "file_id", deserialize_with = "de_string_lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string_lenient")]
    pub path: String,
    /// Raw brand tag as sent by the server
    #[serde(default, deserialize_with = "de_string_lenient")]
    pub brand: String,
    #[serde(
        rename = "downgraded_transaction",
        default,
        deserialize_with = "de_u64_lenient"
    )]
    pub downgrade_count: u64,
}

impl RemoteFileRecord {
    /// Parsed brand tag, if the server sent a known one
    pub fn brand(&self) -> Option<Brand> {
        self.brand.parse().ok()
    }
}

/// An uploaded file as listed by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(deserialize_with = "de_string_lenient")]
    pub id: String,
    #[serde(default, deserialize_with = "de_string_lenient")]
    pub name: String,
    #[serde(default, deserialize_with = "de_string_lenient")]
    pub timestamp: String,
}

impl FileEntry {
    pub fn uploaded_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileList {
    #[serde(default)]
    pub files: Vec<FileEntry>,
}

/// File metadata lookup, used only for the downgrade count
#[derive(Debug, Deserialize)]
pub(crate) struct FileMetadata {
    #[serde(
        default,
        alias = "downgradedTransaction",
        deserialize_with = "de_u64_lenient"
    )]
    pub downgraded_transaction: u64,
}

/// One generated report, as listed by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    #[serde(deserialize_with = "de_string_lenient")]
    pub id: String,
    #[serde(
        rename = "source_file_id",
        alias = "source_file",
        default,
        deserialize_with = "de_string_lenient"
    )]
    pub source_file_id: String,
    #[serde(default, deserialize_with = "de_string_lenient")]
    pub timestamp: String,
    /// Filled in by the enrichment lookup, not sent by the listing
    #[serde(default)]
    pub downgrade_count: u64,
}

impl ReportSummary {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportList {
    #[serde(default)]
    pub reports: Vec<ReportSummary>,
}

/// A report summary joined with its source file's display name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(flatten)]
    pub summary: ReportSummary,
    pub file_name: String,
}

/// Full report payload (`GET /reports/{id}`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportDetail {
    #[serde(default)]
    pub overall: OverallFeatures,
    #[serde(default)]
    pub per_transaction: Vec<TransactionDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallFeatures {
    #[serde(default)]
    pub features: Vec<OverallFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallFeature {
    #[serde(rename = "feature_name", deserialize_with = "de_string_lenient")]
    pub name: String,
    #[serde(
        rename = "importance_normalized",
        default,
        deserialize_with = "de_f64_lenient"
    )]
    pub importance: f64,
    #[serde(rename = "feature_reason", default, deserialize_with = "de_string_lenient")]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDetail {
    #[serde(
        rename = "transaction_index",
        default,
        deserialize_with = "de_u64_lenient"
    )]
    pub index: u64,
    #[serde(default, deserialize_with = "de_string_lenient")]
    pub predicted_fee: String,
    #[serde(default, deserialize_with = "de_string_lenient")]
    pub actual_fee: String,
    #[serde(rename = "downgrade", default, deserialize_with = "de_bool_lenient")]
    pub downgraded: bool,
    #[serde(rename = "transaction_features", default)]
    pub features: Vec<TransactionFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFeature {
    #[serde(rename = "feature_name", deserialize_with = "de_string_lenient")]
    pub name: String,
    #[serde(rename = "feature_value", default, deserialize_with = "de_string_lenient")]
    pub value: String,
    #[serde(
        rename = "importance_normalized",
        default,
        deserialize_with = "de_f64_lenient"
    )]
    pub importance: f64,
    #[serde(rename = "feature_reason", default, deserialize_with = "de_string_lenient")]
    pub reason: String,
}

/// Parse the timestamp formats the store emits
///
/// Accepts RFC 3339, Python's `str(datetime)` (space separator, optional
/// offset and fraction) and bare dates. Naive values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn de_string_lenient<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

fn de_f64_lenient<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn de_u64_lenient<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn de_bool_lenient<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(b) => b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "t" | "yes" | "y" | "1"
        ),
        _ => false,
    })
}
