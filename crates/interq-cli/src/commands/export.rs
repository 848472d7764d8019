//! Export command implementation

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use interq_core::aggregate::aggregate;
use interq_core::api::{HttpStore, RemoteStore};
use interq_core::export::{export_region, PageFormat, PngCapture, Rasterizer, ReportCanvas};
use interq_core::headless::{is_autonomous, ExportOutcome, HeadlessExport, COMPLETION_SIGNAL};
use interq_core::ClientConfig;
use tracing::debug;

use super::open_store;

/// Report id from either a bare id or a report URL (`/reports/{id}?download=1`)
pub fn report_id_from_target(target: &str) -> &str {
    let path = target.split(&['?', '#'][..]).next().unwrap_or(target);
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}

/// Export a report to PDF; returns the path written
pub async fn cmd_export(
    config: &ClientConfig,
    target: &str,
    output: Option<&Path>,
    png: Option<&Path>,
    headless: bool,
) -> Result<PathBuf> {
    let report_id = report_id_from_target(target).to_string();
    if report_id.is_empty() {
        bail!("No report id in '{}'", target);
    }
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(format!("report-{}.pdf", report_id)));
    let store = open_store(config)?;
    let png = png.map(Path::to_path_buf);

    let unattended = headless || is_autonomous(target);
    let document = if unattended {
        debug!("Unattended export of {}", report_id);
        let export = HeadlessExport::from_config(config);
        match export.run(load_region(store, report_id, png)).await? {
            ExportOutcome::Completed(document) => document,
            ExportOutcome::TimedOut => bail!(
                "Export did not complete within {}s",
                config.headless_timeout.as_secs()
            ),
        }
    } else {
        let region = load_region(store, report_id, png).await?;
        export_region(&region, PageFormat::A4).context("Failed to build PDF")?
    };

    document
        .write_to(&output)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "✅ Exported {} page(s) to {}",
        document.page_count,
        output.display()
    );
    if unattended {
        // Openers waiting on the unattended export watch for this line
        println!("{}", COMPLETION_SIGNAL);
    }
    Ok(output)
}

/// The region to capture: a screenshot if given, else the rendered charts
async fn load_region(
    store: HttpStore,
    report_id: String,
    png: Option<PathBuf>,
) -> interq_core::Result<Box<dyn Rasterizer>> {
    if let Some(path) = png {
        return Ok(Box::new(PngCapture::from_path(&path)?));
    }
    let detail = store.report_detail(&report_id).await?;
    Ok(Box::new(ReportCanvas::new(aggregate(&detail))))
}
