//! Compliance check requests and results
//!
//! The check runs server-side against a previously uploaded file. A failed
//! check is a normal outcome shown inline next to the file, so it is modelled
//! as [`ComplianceOutcome::Failed`] rather than an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::Brand;

/// Lowest rule severity that counts as a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            _ => Err(format!("Unknown severity: {} (use low, medium or high)", s)),
        }
    }
}

/// Parameters of a compliance check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplianceRequest {
    pub file_id: String,
    pub min_fail_severity: Severity,
    /// Force a brand mapping instead of detecting it from the columns
    pub force_format: Option<Brand>,
    /// Ask the server to write a results CSV
    pub return_csv: bool,
}

impl ComplianceRequest {
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            min_fail_severity: Severity::default(),
            force_format: None,
            return_csv: false,
        }
    }

    /// Form-encoded body fields
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("file_id", self.file_id.clone()),
            ("min_fail_severity", self.min_fail_severity.as_str().to_string()),
            (
                "force_format",
                self.force_format
                    .map(|b| b.as_str().to_string())
                    .unwrap_or_else(|| "auto".to_string()),
            ),
            ("return_csv", self.return_csv.to_string()),
        ]
    }
}

/// Risk level of a flagged transaction (its most severe finding)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub enum RiskLevel {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a server severity string; anything unrecognised is `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "HIGH" => Self::High,
            "MEDIUM" => Self::Medium,
            "LOW" => Self::Low,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Value::deserialize(deserializer)? {
            Value::String(s) => Self::parse(&s),
            _ => Self::Unknown,
        })
    }
}

/// A transaction with at least one violated rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedTransaction {
    pub id: String,
    #[serde(rename = "riskLevel", default)]
    pub risk_level: RiskLevel,
    /// Findings as sent by the server (strings or rule objects)
    #[serde(default)]
    pub findings: Vec<Value>,
}

impl FlaggedTransaction {
    /// Human-readable lines for each finding
    pub fn finding_lines(&self) -> Vec<String> {
        self.findings.iter().map(describe_finding).collect()
    }

    /// Highest severity among the structured findings
    pub fn max_severity(&self) -> RiskLevel {
        self.findings
            .iter()
            .filter_map(|f| f.get("severity").and_then(Value::as_str))
            .map(RiskLevel::parse)
            .max()
            .unwrap_or(self.risk_level)
    }
}

fn describe_finding(finding: &Value) -> String {
    match finding {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let text = ["message", "description", "rule_id", "id"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| finding.to_string());
            match map.get("severity").and_then(Value::as_str) {
                Some(sev) => format!("[{}] {}", sev.to_uppercase(), text),
                None => text,
            }
        }
        other => other.to_string(),
    }
}

/// Summary returned by a successful check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplianceSummary {
    #[serde(default)]
    pub rows: u64,
    #[serde(default)]
    pub non_compliant: u64,
    #[serde(default)]
    pub compliance_rate: f64,
    #[serde(default)]
    pub total_estimated_impact: f64,
    #[serde(default)]
    pub rule_counts: BTreeMap<String, u64>,
    #[serde(default)]
    pub download: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<FlaggedTransaction>>,
}

impl ComplianceSummary {
    pub fn flagged(&self) -> &[FlaggedTransaction] {
        self.results.as_deref().unwrap_or(&[])
    }
}

/// Result of a compliance check
#[derive(Debug, Clone, PartialEq)]
pub enum ComplianceOutcome {
    Summary(ComplianceSummary),
    /// Inline error payload (server detail or generic message)
    Failed { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_fields_defaults() {
        let fields = ComplianceRequest::new("f-1").form_fields();
        assert_eq!(
            fields,
            vec![
                ("file_id", "f-1".to_string()),
                ("min_fail_severity", "MEDIUM".to_string()),
                ("force_format", "auto".to_string()),
                ("return_csv", "false".to_string()),
            ]
        );
    }

    #[test]
    fn test_form_fields_forced_brand() {
        let mut req = ComplianceRequest::new("f-2");
        req.force_format = Some(Brand::Mastercard);
        req.min_fail_severity = Severity::High;
        req.return_csv = true;
        let fields = req.form_fields();
        assert!(fields.contains(&("force_format", "mastercard".to_string())));
        assert!(fields.contains(&("min_fail_severity", "HIGH".to_string())));
        assert!(fields.contains(&("return_csv", "true".to_string())));
    }

    #[test]
    fn test_summary_parses_results() {
        let summary: ComplianceSummary = serde_json::from_str(
            r#"{
                "rows": 4, "non_compliant": 1, "compliance_rate": 0.75,
                "total_estimated_impact": 12.5, "rule_counts": {"CVV_MISSING": 1},
                "download": null,
                "results": [{
                    "id": "tx-9", "riskLevel": "HIGH",
                    "findings": [
                        {"rule_id": "CVV_MISSING", "severity": "high", "message": "CVV2 not verified"},
                        "plain text finding"
                    ]
                }]
            }"#,
        )
        .unwrap();
        let flagged = &summary.flagged()[0];
        assert_eq!(flagged.risk_level, RiskLevel::High);
        assert_eq!(flagged.max_severity(), RiskLevel::High);
        assert_eq!(
            flagged.finding_lines(),
            vec!["[HIGH] CVV2 not verified", "plain text finding"]
        );
    }

    #[test]
    fn test_unknown_risk_level() {
        let flagged: FlaggedTransaction =
            serde_json::from_str(r#"{"id":"1","riskLevel":"Unknown","findings":[]}"#).unwrap();
        assert_eq!(flagged.risk_level, RiskLevel::Unknown);
        let flagged: FlaggedTransaction = serde_json::from_str(r#"{"id":"1"}"#).unwrap();
        assert_eq!(flagged.risk_level, RiskLevel::Unknown);
        assert!(flagged.finding_lines().is_empty());
    }

    #[test]
    fn test_summary_without_results() {
        let summary: ComplianceSummary = serde_json::from_str(r#"{"rows":0}"#).unwrap();
        assert!(summary.flagged().is_empty());
        assert_eq!(summary.compliance_rate, 0.0);
    }

    #[test]
    fn test_severity_from_str() {
        assert_eq!("low".parse::<Severity>(), Ok(Severity::Low));
        assert!("critical".parse::<Severity>().is_err());
    }
}
