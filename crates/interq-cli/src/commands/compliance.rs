//! Compliance check command implementation

use anyhow::Result;
use interq_core::aggregate::percent;
use interq_core::api::RemoteStore;
use interq_core::compliance::{ComplianceOutcome, ComplianceRequest, ComplianceSummary, Severity};
use interq_core::models::Brand;
use interq_core::ClientConfig;

use super::open_store;

/// Run a compliance check; a failed check is printed, not returned as an error
pub async fn cmd_compliance(
    config: &ClientConfig,
    file_id: &str,
    min_severity: Severity,
    format: Option<Brand>,
    csv: bool,
    json: bool,
) -> Result<ComplianceOutcome> {
    let store = open_store(config)?;
    let request = ComplianceRequest {
        file_id: file_id.to_string(),
        min_fail_severity: min_severity,
        force_format: format,
        return_csv: csv,
    };

    let outcome = store.check_compliance(&request).await;
    match &outcome {
        ComplianceOutcome::Summary(summary) if json => {
            println!("{}", serde_json::to_string_pretty(summary)?);
        }
        ComplianceOutcome::Summary(summary) => print_summary(file_id, summary),
        ComplianceOutcome::Failed { detail } => {
            println!("❌ Compliance check failed for {}: {}", file_id, detail);
        }
    }
    Ok(outcome)
}

fn print_summary(file_id: &str, summary: &ComplianceSummary) {
    println!();
    println!("🛡️  Compliance check for {}", file_id);
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Rows:               {}", summary.rows);
    println!("   Non-compliant:      {}", summary.non_compliant);
    println!("   Compliance rate:    {}", percent(summary.compliance_rate));
    println!("   Estimated impact:   {:.2}", summary.total_estimated_impact);

    if !summary.rule_counts.is_empty() {
        println!();
        println!("   Rules triggered");
        for (rule, count) in &summary.rule_counts {
            println!("   {:<32} {:>6}", rule, count);
        }
    }

    let flagged = summary.flagged();
    if !flagged.is_empty() {
        println!();
        println!("   Flagged transactions");
        for tx in flagged {
            println!("   {} [{}]", tx.id, tx.risk_level);
            for line in tx.finding_lines() {
                println!("      - {}", line);
            }
        }
    }

    if let Some(download) = &summary.download {
        println!();
        println!("   Results CSV: {}", download);
    }
    println!();
}
