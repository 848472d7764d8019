//! CLI command tests
//!
//! Commands run against the mock advisory server from interq-core.

use std::path::PathBuf;

use interq_core::compliance::{ComplianceOutcome, Severity};
use interq_core::models::Brand;
use interq_core::table::SortOrder;
use interq_core::test_utils::MockInterqServer;
use interq_core::ClientConfig;
use tempfile::TempDir;

use crate::cli::TableArgs;
use crate::commands::{self, report_id_from_target, truncate};

fn config_for(server: &MockInterqServer) -> ClientConfig {
    ClientConfig::default().with_api_base(&server.url())
}

fn table_args(search: Option<&str>) -> TableArgs {
    TableArgs {
        search: search.map(str::to_string),
        sort: SortOrder::Desc,
        page: 1,
        page_size: None,
        json: false,
    }
}

fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// Server with one visa file and one report for it; returns the report id
fn seeded(server: &MockInterqServer) -> String {
    let file = server.add_file("visa_june.csv", "visa", 2, "2024-06-01 08:00:00");
    server.add_report(&file, "2024-06-02 08:00:00")
}

// ========== Upload / Generate ==========

#[tokio::test]
async fn test_cmd_upload_and_generate() {
    let server = MockInterqServer::start().await;
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "tx.csv", "visa_arn,downgraded\n123,1\n");

    commands::cmd_upload(&config_for(&server), &path, true)
        .await
        .unwrap();
    assert_eq!(server.report_count(), 1);
    assert_eq!(server.generate_calls().len(), 1);
}

#[tokio::test]
async fn test_cmd_upload_only() {
    let server = MockInterqServer::start().await;
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "tx.csv", "mc_mti\n0100\n");

    commands::cmd_upload(&config_for(&server), &path, false)
        .await
        .unwrap();
    assert_eq!(server.report_count(), 0);
}

#[tokio::test]
async fn test_cmd_upload_rejects_non_csv() {
    let server = MockInterqServer::start().await;
    let dir = TempDir::new().unwrap();
    let path = write_csv(&dir, "tx.txt", "visa_arn\n1\n");

    let err = commands::cmd_upload(&config_for(&server), &path, false)
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("Invalid file"));
}

#[tokio::test]
async fn test_cmd_generate_server_fault() {
    let server = MockInterqServer::start().await;
    let file = server.add_file("a.csv", "visa", 0, "2024-01-01 00:00:00");
    server.set_generate_status(Some(500));

    let err = commands::cmd_generate(&config_for(&server), &file)
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("please try again"));
}

#[tokio::test]
async fn test_cmd_generate_ok() {
    let server = MockInterqServer::start().await;
    let file = server.add_file("a.csv", "visa", 0, "2024-01-01 00:00:00");

    commands::cmd_generate(&config_for(&server), &file)
        .await
        .unwrap();
    assert_eq!(server.report_count(), 1);
}

// ========== Listings ==========

#[tokio::test]
async fn test_cmd_reports() {
    let server = MockInterqServer::start().await;
    seeded(&server);
    let config = config_for(&server);

    assert!(commands::cmd_reports(&config, &table_args(None)).await.is_ok());
    assert!(commands::cmd_reports(&config, &table_args(Some("JUNE")))
        .await
        .is_ok());
    assert!(commands::cmd_reports(&config, &table_args(Some("nothing")))
        .await
        .is_ok());

    let mut args = table_args(None);
    args.json = true;
    args.page = 7;
    assert!(commands::cmd_reports(&config, &args).await.is_ok());
}

#[tokio::test]
async fn test_cmd_reports_listing_failure() {
    let server = MockInterqServer::start().await;
    server.set_fail_reports(true);

    let err = commands::cmd_reports(&config_for(&server), &table_args(None))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Could not list reports"));
}

#[tokio::test]
async fn test_cmd_files() {
    let server = MockInterqServer::start().await;
    seeded(&server);
    assert!(commands::cmd_files(&config_for(&server), &table_args(Some("visa")))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_cmd_show() {
    let server = MockInterqServer::start().await;
    let report = seeded(&server);
    let config = config_for(&server);

    assert!(commands::cmd_show(&config, &report, false).await.is_ok());
    assert!(commands::cmd_show(&config, &report, true).await.is_ok());
    assert!(commands::cmd_show(&config, "missing", false).await.is_err());
}

// ========== Export ==========

#[tokio::test]
async fn test_cmd_export_writes_pdf() {
    let server = MockInterqServer::start().await;
    let report = seeded(&server);
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("out.pdf");

    let written = commands::cmd_export(&config_for(&server), &report, Some(output.as_path()), None, false)
        .await
        .unwrap();
    assert_eq!(written, output);
    let bytes = std::fs::read(&output).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_cmd_export_headless_from_url() {
    let server = MockInterqServer::start().await;
    let report = seeded(&server);
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("headless.pdf");

    let mut config = config_for(&server);
    config.settle_delay = std::time::Duration::from_millis(10);
    let target = format!("/reports/{}?download=1", report);

    commands::cmd_export(&config, &target, Some(output.as_path()), None, false)
        .await
        .unwrap();
    assert!(output.exists());
}

#[tokio::test]
async fn test_cmd_export_missing_report_fails() {
    let server = MockInterqServer::start().await;
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("none.pdf");

    let result =
        commands::cmd_export(&config_for(&server), "missing", Some(output.as_path()), None, false).await;
    assert!(result.is_err());
    assert!(!output.exists());
}

#[test]
fn test_report_id_from_target() {
    assert_eq!(report_id_from_target("report-7"), "report-7");
    assert_eq!(report_id_from_target("/reports/report-7?download=1"), "report-7");
    assert_eq!(
        report_id_from_target("http://localhost:3000/reports/42/#charts"),
        "42"
    );
}

// ========== Templates / Compliance ==========

#[test]
fn test_cmd_template() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("mc.csv");

    let written = commands::cmd_template(Brand::Mastercard, Some(output.as_path())).unwrap();
    let text = std::fs::read_to_string(written).unwrap();
    assert!(text.starts_with("mc_mti,"));
    assert_eq!(text.lines().count(), 1);
}

#[tokio::test]
async fn test_cmd_compliance() {
    let server = MockInterqServer::start().await;
    let file = server.add_file("a.csv", "visa", 4, "2024-01-01 00:00:00");
    let config = config_for(&server);

    let outcome = commands::cmd_compliance(&config, &file, Severity::Low, None, true, false)
        .await
        .unwrap();
    assert!(matches!(outcome, ComplianceOutcome::Summary(_)));

    let outcome = commands::cmd_compliance(&config, "unknown", Severity::High, Some(Brand::Visa), false, true)
        .await
        .unwrap();
    assert!(matches!(outcome, ComplianceOutcome::Failed { .. }));
}

// ========== Helpers ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a_very_long_file_name.csv", 10), "a_very_...");
    assert_eq!(truncate("äöüäöüäöüä", 5), "äö...");
}

#[test]
fn test_format_timestamp() {
    assert_eq!(
        commands::format_timestamp("2024-06-02 08:00:00.123+00:00"),
        "2024-06-02 08:00"
    );
    assert_eq!(commands::format_timestamp("n/a"), "n/a");
}
