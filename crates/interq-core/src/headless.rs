//! Unattended export
//!
//! A report opened with `download=1` exports itself without interaction. The
//! export runs as a task that waits for the report data, lets rendering
//! settle, produces the PDF and then sends [`COMPLETION_SIGNAL`] once. The
//! opener races that signal against a timeout and aborts the task when the
//! timeout wins. Either way the export's [`CaptureSurface`] slot is released
//! before [`HeadlessExport::run`] returns. The raster itself is owned by the
//! [`Rasterizer`](crate::export::Rasterizer) and dropped with the task.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::export::{export_region, ExportedDocument, PageFormat, Rasterizer};

/// Message sent to the opener when an unattended export finishes
pub const COMPLETION_SIGNAL: &str = "interq:pdf-export-complete";

/// Query parameter that requests an unattended export
pub const DOWNLOAD_PARAM: &str = "download";

/// Whether a report URL asks for an unattended export (`download=1`)
///
/// Relative URLs (`/reports/42?download=1`) are accepted.
pub fn is_autonomous(url: &str) -> bool {
    let parsed = Url::parse(url).or_else(|_| {
        Url::parse("http://localhost/").and_then(|base| base.join(url))
    });
    match parsed {
        Ok(url) => url
            .query_pairs()
            .any(|(key, value)| key == DOWNLOAD_PARAM && value == "1"),
        Err(_) => false,
    }
}

#[derive(Debug, Default)]
struct Surfaces {
    next_id: u64,
    live: BTreeMap<u64, String>,
}

/// Tracks which unattended exports currently hold a capture slot
#[derive(Debug, Clone, Default)]
pub struct SurfaceRegistry {
    inner: Arc<Mutex<Surfaces>>,
}

impl SurfaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the capture slot; only one export may hold it at a time
    pub fn acquire(&self, label: &str) -> Result<CaptureSurface> {
        let mut surfaces = self.lock();
        if let Some(existing) = surfaces.live.values().next() {
            return Err(Error::InvalidData(format!(
                "Capture surface {} is still in use",
                existing
            )));
        }
        surfaces.next_id += 1;
        let id = surfaces.next_id;
        surfaces.live.insert(id, label.to_string());
        debug!("Capture surface {} ({}) created", id, label);
        Ok(CaptureSurface {
            id,
            registry: self.clone(),
        })
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    fn lock(&self) -> MutexGuard<'_, Surfaces> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Registration of one in-progress unattended export
///
/// Holds no pixels. It marks the registry's single capture slot as taken
/// and frees it when dropped.
#[derive(Debug)]
pub struct CaptureSurface {
    id: u64,
    registry: SurfaceRegistry,
}

impl CaptureSurface {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for CaptureSurface {
    fn drop(&mut self) {
        if self.registry.lock().live.remove(&self.id).is_some() {
            debug!("Capture surface {} removed", self.id);
        }
    }
}

/// How an unattended export ended
#[derive(Debug)]
pub enum ExportOutcome {
    Completed(ExportedDocument),
    TimedOut,
}

/// Runs one unattended export at a time
#[derive(Debug, Clone)]
pub struct HeadlessExport {
    settle_delay: Duration,
    timeout: Duration,
    format: PageFormat,
    registry: SurfaceRegistry,
}

impl HeadlessExport {
    pub fn new(settle_delay: Duration, timeout: Duration) -> Self {
        Self {
            settle_delay,
            timeout,
            format: PageFormat::A4,
            registry: SurfaceRegistry::new(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.settle_delay, config.headless_timeout)
    }

    pub fn registry(&self) -> &SurfaceRegistry {
        &self.registry
    }

    /// Export once `data` resolves
    ///
    /// Data errors end the run with that error. If no completion signal
    /// arrives within the timeout the task is aborted and
    /// [`ExportOutcome::TimedOut`] is returned.
    pub async fn run<F, R>(&self, data: F) -> Result<ExportOutcome>
    where
        F: Future<Output = Result<R>> + Send + 'static,
        R: Rasterizer + 'static,
    {
        let surface = self.registry.acquire("report-export")?;
        let (signal_tx, signal_rx) = oneshot::channel::<&'static str>();
        let settle_delay = self.settle_delay;
        let format = self.format;

        let mut task = tokio::spawn(async move {
            let region = data.await?;
            tokio::time::sleep(settle_delay).await;
            let document = export_region(&region, format)?;
            // The receiver is gone only if the opener already gave up
            let _ = signal_tx.send(COMPLETION_SIGNAL);
            Ok::<_, Error>(document)
        });

        let outcome = tokio::select! {
            signal = signal_rx => match signal {
                Ok(message) if message == COMPLETION_SIGNAL => {
                    let document = join(&mut task).await?;
                    info!("Unattended export finished ({} pages)", document.page_count);
                    Ok(ExportOutcome::Completed(document))
                }
                Ok(other) => Err(Error::InvalidData(format!("Unexpected export signal: {}", other))),
                // Sender dropped without signalling: the task failed
                Err(_) => join(&mut task).await.map(ExportOutcome::Completed),
            },
            _ = tokio::time::sleep(self.timeout) => {
                task.abort();
                warn!("Unattended export timed out after {:?}", self.timeout);
                Ok(ExportOutcome::TimedOut)
            }
        };

        drop(surface);
        outcome
    }
}

async fn join(task: &mut tokio::task::JoinHandle<Result<ExportedDocument>>) -> Result<ExportedDocument> {
    match task.await {
        Ok(result) => result,
        Err(e) => Err(Error::InvalidData(format!("Export task failed: {}", e))),
    }
}
