//! Report command implementations (generate, reports, show)

use anyhow::{Context, Result};
use interq_core::aggregate::{aggregate, percent, AggregatedReport};
use interq_core::api::RemoteStore;
use interq_core::lifecycle::UploadLifecycle;
use interq_core::pagination::render_pager;
use interq_core::table::TableState;
use interq_core::ClientConfig;
use tracing::info;

use super::{format_timestamp, open_store, print_notices, truncate};
use crate::cli::TableArgs;

pub async fn cmd_generate(config: &ClientConfig, file_id: &str) -> Result<()> {
    let store = open_store(config)?;

    println!("⏳ Generating report for {}...", file_id);
    store
        .generate_report(file_id)
        .await
        .context("Report generation failed")?;
    info!(file_id, "Generation dispatched");

    let newest = store
        .list_reports()
        .await
        .context("Report generated, but the report list could not be loaded")?
        .into_iter()
        .filter(|r| r.source_file_id == file_id)
        .max_by_key(|r| r.created_at());

    println!("✅ Report generated");
    if let Some(report) = newest {
        println!("   Report id: {}", report.id);
    }
    Ok(())
}

pub async fn cmd_reports(config: &ClientConfig, args: &TableArgs) -> Result<()> {
    let mut lifecycle = UploadLifecycle::new(open_store(config)?)
        .with_enrichment_concurrency(config.enrichment_concurrency);
    lifecycle
        .refresh_reports()
        .await
        .context("Could not list reports")?;
    print_notices(&lifecycle.take_notices());

    let mut state = TableState::new(args.page_size.unwrap_or(config.page_size));
    if let Some(query) = &args.search {
        state.set_query(query.clone());
    }
    state.set_order(args.sort);
    state.set_page(args.page);
    let view = state.render(lifecycle.reports());

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view.slice)?);
        return Ok(());
    }

    if view.total_matches == 0 {
        match &args.search {
            Some(query) => println!("No reports match '{}'.", query),
            None => println!("No reports yet. Upload a file with 'interq upload <FILE> --generate'."),
        }
        return Ok(());
    }

    println!();
    println!("📋 Reports");
    println!(
        "   {:<32} {:<16} {:>10}  {}",
        "File", "Created", "Downgrades", "Report ID"
    );
    println!("   ─────────────────────────────────────────────────────────────────────────────────────");
    for row in &view.slice {
        println!(
            "   {:<32} {:<16} {:>10}  {}",
            truncate(&row.file_name, 32),
            format_timestamp(&row.summary.timestamp),
            row.summary.downgrade_count,
            row.summary.id
        );
    }
    println!();
    println!(
        "   {}   page {} of {} ({} reports)",
        render_pager(&view.markers, view.page),
        view.page,
        view.total_pages,
        view.total_matches
    );
    Ok(())
}

/// Fetch and aggregate a report; a failed fetch shows nothing partial
pub async fn load_report(config: &ClientConfig, report_id: &str) -> Result<AggregatedReport> {
    let store = open_store(config)?;
    let detail = store
        .report_detail(report_id)
        .await
        .context("Could not load report")?;
    Ok(aggregate(&detail))
}

pub async fn cmd_show(config: &ClientConfig, report_id: &str, json: bool) -> Result<()> {
    let report = load_report(config, report_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(report_id, &report);
    Ok(())
}

fn print_report(report_id: &str, report: &AggregatedReport) {
    let summary = &report.summary;

    println!();
    println!("📊 Report {}", report_id);
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Features analysed:      {}", summary.features_analyzed);
    println!("   Transactions reviewed:  {}", summary.transactions_reviewed);
    println!("   Downgraded:             {}", summary.downgraded_transactions);
    if let Some(driver) = &summary.primary_driver {
        println!(
            "   Primary driver:         {} ({})",
            driver.label,
            percent(driver.importance)
        );
    }

    if !report.overall_series.is_empty() {
        println!();
        println!("   Feature importance");
        for point in &report.overall_series {
            println!(
                "   {:<30} {:>7}  {}",
                truncate(&point.label, 30),
                percent(point.importance),
                point.reason
            );
        }
    }

    if !report.relative_share.is_empty() {
        println!();
        println!("   Relative share");
        for (point, fraction) in report.relative_share.iter().zip(report.share_fractions()) {
            let width = (fraction * 30.0).round() as usize;
            println!(
                "   {:<30} {:>7}  {}",
                truncate(&point.label, 30),
                percent(fraction),
                "█".repeat(width.min(30))
            );
        }
    }

    if !report.per_transaction_series.is_empty() {
        println!();
        println!(
            "   {:<18} {:>10} {:>10} {:>6} {:>10}",
            "Transaction", "Predicted", "Actual", "Risk", "Downgrade"
        );
        for tx in &report.per_transaction_series {
            println!(
                "   {:<18} {:>10} {:>10} {:>6.2} {:>10}",
                tx.label,
                tx.predicted_fee,
                tx.actual_fee,
                tx.risk_score,
                if tx.downgraded { "yes" } else { "no" }
            );
        }
    }
    println!();
}
