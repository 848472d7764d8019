//! InterQ Core Library
//!
//! Client-side logic for the InterQ interchange fee advisor:
//! - Upload → generate → reload lifecycle with stale-result guarding
//! - Compact pagination and filter/sort/paginate tables
//! - Report aggregation into chart series and risk scores
//! - Multi-page PDF export, including unattended (headless) export
//! - Advisory API client, compliance checks and CSV templates

pub mod aggregate;
pub mod api;
pub mod compliance;
pub mod config;
pub mod error;
pub mod export;
pub mod headless;
pub mod lifecycle;
pub mod models;
pub mod pagination;
pub mod table;
pub mod templates;

/// Test utilities including mock advisory server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use aggregate::{aggregate, AggregatedReport, FeaturePoint, TransactionPoint};
pub use api::{HttpStore, RemoteStore};
pub use compliance::{ComplianceOutcome, ComplianceRequest, ComplianceSummary, RiskLevel, Severity};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use export::{export_region, ExportedDocument, PageFormat, PngCapture, Rasterizer, ReportCanvas};
pub use headless::{is_autonomous, ExportOutcome, HeadlessExport, SurfaceRegistry, COMPLETION_SIGNAL};
pub use lifecycle::{Applied, LifecyclePhase, Notice, NoticeLevel, UploadLifecycle};
pub use models::{
    Brand, FileEntry, RemoteFileRecord, ReportDetail, ReportRow, ReportSummary, UploadedFile,
};
pub use pagination::{compact, PageMarker, PaginationState};
pub use table::{view, SortOrder, TableRow, TableState, TableView};
