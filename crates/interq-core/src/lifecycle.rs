//! Upload → generate → reload lifecycle
//!
//! [`UploadLifecycle`] owns the selected file, the store's record of the
//! uploaded file and the current [`LifecyclePhase`]. Views read that state
//! through the controller instead of sharing a global "current file".
//!
//! # Transitions
//!
//! ```text
//! Idle ──submit──▶ Uploading ──ok──▶ Uploaded ──generate──▶ Generating ──ok──▶ Completed
//!   ▲                  │ err                                    │ err
//!   └──────────────────┘              Uploaded ◀────────────────┘
//! ```
//!
//! Selecting a new file from any phase supersedes the current upload: the
//! held record is dropped and the lifecycle epoch advances. Through
//! [`UploadLifecycle::choose`], a file picked in `Uploaded` or `Completed`
//! goes straight back to `Uploading`. Each network
//! round-trip carries a [`Ticket`] stamped with the epoch it started in, so a
//! slow response landing after a newer transition is ignored.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::RemoteStore;
use crate::error::{Error, Result};
use crate::models::{RemoteFileRecord, ReportRow, UploadedFile};

/// Where the lifecycle currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecyclePhase {
    Idle,
    Uploading,
    Uploaded,
    Generating,
    Completed,
}

impl LifecyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Generating => "generating",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// A user-visible message produced by a transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// The failed transition behind the most recent error notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    /// Phase the failure happened in (`Uploading` or `Generating`)
    pub during: LifecyclePhase,
    /// Phase control returned to
    pub returned_to: LifecyclePhase,
    pub message: String,
}

/// Proof that a round-trip was started in a given epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    epoch: u64,
}

/// Whether a finished round-trip was applied or dropped as stale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Applied,
    Stale,
}

/// Downgrade lookups in flight at once during a reload
pub const DEFAULT_ENRICHMENT_CONCURRENCY: usize = 4;

pub struct UploadLifecycle<S: RemoteStore> {
    store: S,
    enrichment_concurrency: usize,
    phase: LifecyclePhase,
    selected: Option<UploadedFile>,
    uploaded: Option<RemoteFileRecord>,
    reports: Vec<ReportRow>,
    notices: Vec<Notice>,
    last_failure: Option<Failure>,
    epoch: u64,
}

impl<S: RemoteStore> UploadLifecycle<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            enrichment_concurrency: DEFAULT_ENRICHMENT_CONCURRENCY,
            phase: LifecyclePhase::Idle,
            selected: None,
            uploaded: None,
            reports: Vec::new(),
            notices: Vec::new(),
            last_failure: None,
            epoch: 0,
        }
    }

    /// Cap the downgrade lookups a reload runs concurrently (at least 1)
    pub fn with_enrichment_concurrency(mut self, limit: usize) -> Self {
        self.enrichment_concurrency = limit.max(1);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn selected_file(&self) -> Option<&UploadedFile> {
        self.selected.as_ref()
    }

    /// The store's record of the held upload, if any
    pub fn uploaded(&self) -> Option<&RemoteFileRecord> {
        self.uploaded.as_ref()
    }

    pub fn can_generate(&self) -> bool {
        self.phase == LifecyclePhase::Uploaded && self.uploaded.is_some()
    }

    /// Last successfully loaded report collection
    pub fn reports(&self) -> &[ReportRow] {
        &self.reports
    }

    pub fn last_failure(&self) -> Option<&Failure> {
        self.last_failure.as_ref()
    }

    /// Drain pending notices, oldest first
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Validate and hold a file, without contacting the store
    ///
    /// Only `.csv` files (any case) are accepted; anything else is rejected
    /// locally and leaves the lifecycle untouched. An accepted selection
    /// supersedes whatever upload was held or in flight and parks the
    /// lifecycle in `Idle` until [`submit`](Self::submit). Use
    /// [`choose`](Self::choose) for the upload form's behaviour, which goes
    /// straight back to `Uploading` after an earlier upload.
    pub fn select(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        let file = UploadedFile::new(path);
        if !file.has_accepted_extension() {
            let err = Error::Validation(format!(
                "{} is not a CSV file, please choose a .csv file",
                file.display_name
            ));
            self.notify(NoticeLevel::Error, err.to_string());
            return Err(err);
        }

        if self.uploaded.is_some() || self.phase != LifecyclePhase::Idle {
            debug!(
                "Selection of {} supersedes phase {}",
                file.display_name, self.phase
            );
        }
        self.epoch += 1;
        self.uploaded = None;
        self.phase = LifecyclePhase::Idle;
        self.selected = Some(file);
        Ok(())
    }

    /// Start uploading the selected file (`Idle → Uploading`)
    pub fn begin_upload(&mut self) -> Result<(Ticket, UploadedFile)> {
        let file = match self.selected.clone() {
            Some(file) if self.phase == LifecyclePhase::Idle => file,
            Some(_) => {
                return Err(Error::InvalidData(format!(
                    "Cannot upload while {}",
                    self.phase
                )))
            }
            None => {
                let err = Error::Validation("No file selected".to_string());
                self.notify(NoticeLevel::Error, err.to_string());
                return Err(err);
            }
        };
        self.epoch += 1;
        self.phase = LifecyclePhase::Uploading;
        info!("Uploading {}", file.display_name);
        Ok((self.ticket(), file))
    }

    /// Apply the outcome of an upload round-trip
    ///
    /// Success moves to `Uploaded`; failure returns to `Idle` with the
    /// server's detail (or a generic network message) surfaced. Results
    /// from a superseded upload are dropped.
    pub fn finish_upload(
        &mut self,
        ticket: Ticket,
        result: Result<RemoteFileRecord>,
    ) -> Result<Applied> {
        if self.is_stale(ticket, "upload") {
            return Ok(Applied::Stale);
        }

        match result {
            Ok(record) => {
                let name = self
                    .selected
                    .as_ref()
                    .map(|f| f.display_name.clone())
                    .unwrap_or_default();
                info!(file_id = %record.id, brand = %record.brand, "Upload complete");
                let brand = record
                    .brand()
                    .map(|b| format!(" ({})", b))
                    .unwrap_or_default();
                self.notify(
                    NoticeLevel::Success,
                    format!("Uploaded {}{}", name, brand),
                );
                self.uploaded = Some(record);
                self.phase = LifecyclePhase::Uploaded;
                self.last_failure = None;
                Ok(Applied::Applied)
            }
            Err(err) => {
                self.fail(LifecyclePhase::Uploading, LifecyclePhase::Idle, &err);
                Err(err)
            }
        }
    }

    /// Upload the selected file
    pub async fn submit(&mut self) -> Result<Applied> {
        let (ticket, file) = self.begin_upload()?;
        let result = self.store.upload_file(&file).await;
        self.finish_upload(ticket, result)
    }

    /// Pick a file the way the upload form does
    ///
    /// From `Uploaded` or `Completed` the new file supersedes the previous
    /// one and re-enters `Uploading` immediately. From `Idle` the file is
    /// only held until [`submit`](Self::submit).
    pub async fn choose(&mut self, path: impl Into<PathBuf>) -> Result<Applied> {
        let resubmit = matches!(
            self.phase,
            LifecyclePhase::Uploaded | LifecyclePhase::Completed
        );
        self.select(path)?;
        if resubmit {
            self.submit().await
        } else {
            Ok(Applied::Applied)
        }
    }

    /// Select and upload in one step
    pub async fn upload(&mut self, path: impl Into<PathBuf>) -> Result<Applied> {
        self.select(path)?;
        self.submit().await
    }

    /// Start report generation (`Uploaded → Generating`)
    ///
    /// Fails fast with [`Error::MissingReference`] when nothing has been
    /// uploaded; the server is not contacted.
    pub fn begin_generate(&mut self) -> Result<(Ticket, String)> {
        let file_id = match &self.uploaded {
            Some(record) => record.id.clone(),
            None => {
                let err = Error::MissingReference;
                self.notify(NoticeLevel::Error, err.to_string());
                return Err(err);
            }
        };
        if self.phase != LifecyclePhase::Uploaded {
            return Err(Error::InvalidData(format!(
                "Cannot generate while {}",
                self.phase
            )));
        }
        self.epoch += 1;
        self.phase = LifecyclePhase::Generating;
        info!(file_id = %file_id, "Generating report");
        Ok((self.ticket(), file_id))
    }

    /// Apply the outcome of a generation dispatch
    ///
    /// On failure the lifecycle returns to `Uploaded` with the uploaded file
    /// kept. Success leaves the phase at `Generating` until
    /// [`complete_generation`](Self::complete_generation).
    pub fn finish_generate(&mut self, ticket: Ticket, result: Result<()>) -> Result<Applied> {
        if self.is_stale(ticket, "generate") {
            return Ok(Applied::Stale);
        }
        match result {
            Ok(()) => Ok(Applied::Applied),
            Err(err) => {
                self.fail(LifecyclePhase::Generating, LifecyclePhase::Uploaded, &err);
                Err(err)
            }
        }
    }

    /// Finish a successful generation once the reports have been reloaded:
    /// move to `Completed` and release the file so a new one can be chosen
    pub fn complete_generation(&mut self, ticket: Ticket) -> Applied {
        if self.is_stale(ticket, "generation completion") {
            return Applied::Stale;
        }
        self.phase = LifecyclePhase::Completed;
        self.selected = None;
        self.uploaded = None;
        self.last_failure = None;
        self.notify(NoticeLevel::Success, "Report generated".to_string());
        Applied::Applied
    }

    /// Generate a report for the uploaded file, then reload the reports
    ///
    /// The reload only starts after the server acknowledged the dispatch.
    pub async fn generate(&mut self) -> Result<Applied> {
        let (ticket, file_id) = self.begin_generate()?;
        let result = self.store.generate_report(&file_id).await;
        if self.finish_generate(ticket, result)? == Applied::Stale {
            return Ok(Applied::Stale);
        }

        // A failed reload is surfaced on its own; the job itself succeeded
        if let Err(err) = self.refresh_reports().await {
            debug!("Reload after generation failed: {}", err);
        }
        Ok(self.complete_generation(ticket))
    }

    /// Reload the report collection
    ///
    /// Reports and files are listed concurrently, then every report is
    /// enriched with its source file's downgrade count. Each distinct source
    /// file is looked up once, with at most `enrichment_concurrency` lookups
    /// in flight. A failed count lookup shows as zero; a failed file listing
    /// falls back to the file id as name. Only a failed report listing is an error, and it leaves the
    /// previous collection in place.
    pub async fn refresh_reports(&mut self) -> Result<()> {
        let (reports, files) = futures::join!(self.store.list_reports(), self.store.list_files());

        let reports = match reports {
            Ok(reports) => reports,
            Err(err) => {
                warn!("Failed to load reports: {}", err);
                self.notify(NoticeLevel::Error, err.to_string());
                return Err(err);
            }
        };

        let names: HashMap<String, String> =
            files.into_iter().map(|f| (f.id, f.name)).collect();

        let file_ids: Vec<String> = {
            let mut seen = HashSet::new();
            reports
                .iter()
                .filter(|r| seen.insert(r.source_file_id.as_str()))
                .map(|r| r.source_file_id.clone())
                .collect()
        };

        debug!(
            "Enriching {} reports from {} files with concurrency limit: {}",
            reports.len(),
            file_ids.len(),
            self.enrichment_concurrency
        );

        let store = &self.store;
        let counts: HashMap<String, u64> = stream::iter(file_ids)
            .map(|file_id| async move {
                let count = match store.file_downgrades(&file_id).await {
                    Ok(count) => count,
                    Err(err) => {
                        warn!(file_id = %file_id, "Downgrade lookup failed, showing 0: {}", err);
                        0
                    }
                };
                (file_id, count)
            })
            .buffered(self.enrichment_concurrency)
            .collect()
            .await;

        let rows: Vec<ReportRow> = reports
            .into_iter()
            .map(|mut summary| {
                summary.downgrade_count =
                    counts.get(&summary.source_file_id).copied().unwrap_or(0);
                let file_name = names
                    .get(&summary.source_file_id)
                    .filter(|n| !n.is_empty())
                    .cloned()
                    .unwrap_or_else(|| summary.source_file_id.clone());
                ReportRow { summary, file_name }
            })
            .collect();

        debug!("Loaded {} reports", rows.len());
        self.reports = rows;
        Ok(())
    }

    fn ticket(&self) -> Ticket {
        Ticket { epoch: self.epoch }
    }

    fn is_stale(&self, ticket: Ticket, what: &str) -> bool {
        let stale = ticket.epoch != self.epoch;
        if stale {
            debug!(
                "Ignoring stale {} result (epoch {} < {})",
                what, ticket.epoch, self.epoch
            );
        }
        stale
    }

    fn fail(&mut self, during: LifecyclePhase, returned_to: LifecyclePhase, err: &Error) {
        let message = user_message(err);
        warn!("{} failed: {}", during, message);
        self.phase = returned_to;
        self.last_failure = Some(Failure {
            during,
            returned_to,
            message: message.clone(),
        });
        self.notify(NoticeLevel::Error, message);
    }

    fn notify(&mut self, level: NoticeLevel, message: String) {
        self.notices.push(Notice { level, message });
    }
}

/// Text shown to the user for a failed round-trip
pub fn user_message(err: &Error) -> String {
    match err {
        Error::Upload(detail) => detail.clone(),
        Error::GenerationRejected { detail, .. } => detail.clone(),
        other => other.to_string(),
    }
}
