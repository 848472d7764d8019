//! File command implementations (upload, files, template)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use interq_core::api::RemoteStore;
use interq_core::lifecycle::UploadLifecycle;
use interq_core::models::{Brand, FileEntry};
use interq_core::pagination::render_pager;
use interq_core::table::TableState;
use interq_core::templates::{template, template_file_name};
use interq_core::ClientConfig;

use super::{format_timestamp, open_store, print_notices, truncate};
use crate::cli::TableArgs;

pub async fn cmd_upload(config: &ClientConfig, file: &Path, generate: bool) -> Result<()> {
    let mut lifecycle = UploadLifecycle::new(open_store(config)?)
        .with_enrichment_concurrency(config.enrichment_concurrency);

    let result = lifecycle.upload(file).await;
    let notices = lifecycle.take_notices();
    result.with_context(|| format!("Could not upload {}", file.display()))?;
    print_notices(&notices);

    if let Some(record) = lifecycle.uploaded() {
        println!("   File id:     {}", record.id);
        let brand = record
            .brand()
            .map(|b| b.to_string())
            .unwrap_or_else(|| record.brand.clone());
        println!("   Brand:       {}", brand);
        println!("   Downgraded:  {}", record.downgrade_count);
    }

    if !generate {
        println!();
        println!("Run 'interq generate <FILE_ID>' to build the report.");
        return Ok(());
    }

    println!("⏳ Generating report...");
    let result = lifecycle.generate().await;
    let notices = lifecycle.take_notices();
    result.context("Report generation failed")?;
    print_notices(&notices);

    if let Some(newest) = lifecycle
        .reports()
        .iter()
        .max_by_key(|r| r.summary.created_at())
    {
        println!("   Report id:   {}", newest.summary.id);
    }
    Ok(())
}

pub async fn cmd_files(config: &ClientConfig, args: &TableArgs) -> Result<()> {
    let store = open_store(config)?;
    let files = store.list_files().await;

    let mut state = TableState::new(args.page_size.unwrap_or(config.page_size));
    if let Some(query) = &args.search {
        state.set_query(query.clone());
    }
    state.set_order(args.sort);
    state.set_page(args.page);
    let view = state.render(&files);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view.slice)?);
        return Ok(());
    }

    if view.total_matches == 0 {
        println!("No files found.");
        return Ok(());
    }

    println!();
    println!("📁 Files");
    println!("   {:<36} {:<32} {:<16}", "ID", "Name", "Uploaded");
    println!("   ─────────────────────────────────────────────────────────────────────────────────────");
    for file in &view.slice {
        print_file(file);
    }
    println!();
    println!(
        "   {}   page {} of {} ({} files)",
        render_pager(&view.markers, view.page),
        view.page,
        view.total_pages,
        view.total_matches
    );
    Ok(())
}

fn print_file(file: &FileEntry) {
    println!(
        "   {:<36} {:<32} {:<16}",
        truncate(&file.id, 36),
        truncate(&file.name, 32),
        format_timestamp(&file.timestamp)
    );
}

/// Write a brand's header-only template; returns the path written
pub fn cmd_template(brand: Brand, output: Option<&Path>) -> Result<PathBuf> {
    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(template_file_name(brand)));
    let bytes = template(brand).context("Failed to build template")?;
    std::fs::write(&path, bytes)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("✅ Wrote {} template to {}", brand, path.display());
    println!(
        "   The first column must start with {} so the brand can be detected.",
        brand.column_prefix()
    );
    Ok(path)
}
