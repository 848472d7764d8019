//! Advisory API client
//!
//! [`RemoteStore`] is the seam between the client logic and the service.
//! [`HttpStore`] is the reqwest implementation; tests use the same client
//! against the mock server in `test_utils`.
//!
//! Every method classifies failures at the call site into the error classes
//! the callers surface (see [`crate::error::Error`]).

use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::compliance::{ComplianceOutcome, ComplianceRequest, ComplianceSummary};
use crate::config::ClientConfig;
use crate::error::{Error, Result, GENERIC_NETWORK_MESSAGE};
use crate::models::{
    FileEntry, FileList, FileMetadata, RemoteFileRecord, ReportDetail, ReportList,
    ReportSummary, UploadedFile,
};

/// Operations the advisory service offers the client
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Submit a transaction file. Fails with [`Error::Upload`].
    async fn upload_file(&self, file: &UploadedFile) -> Result<RemoteFileRecord>;

    /// List uploaded files. Degrades to an empty list on any failure.
    async fn list_files(&self) -> Vec<FileEntry>;

    /// List generated reports. Fails with [`Error::Load`].
    async fn list_reports(&self) -> Result<Vec<ReportSummary>>;

    /// Downgraded transaction count of an uploaded file
    async fn file_downgrades(&self, file_id: &str) -> Result<u64>;

    /// Dispatch report generation for an uploaded file. Fails with
    /// [`Error::GenerationServerFault`] on HTTP 500, otherwise
    /// [`Error::GenerationRejected`].
    async fn generate_report(&self, file_id: &str) -> Result<()>;

    /// Fetch a full report. Fails with [`Error::DetailFetch`].
    async fn report_detail(&self, report_id: &str) -> Result<ReportDetail>;

    /// Run a compliance check. Failures come back inline, never as `Err`.
    async fn check_compliance(&self, request: &ComplianceRequest) -> ComplianceOutcome;
}

/// HTTP implementation of [`RemoteStore`]
#[derive(Clone)]
pub struct HttpStore {
    http_client: Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Build from config, applying the request timeout
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            http_client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint URL under the API base; each segment is percent-encoded, so
    /// an id containing `/`, `?` or `#` stays a single path segment
    fn endpoint(&self, segments: &[&str]) -> std::result::Result<Url, String> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| format!("Invalid API base {}: {}", self.base_url, e))?;
        url.path_segments_mut()
            .map_err(|_| format!("Invalid API base {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> std::result::Result<T, String> {
        let response = self
            .http_client
            .get(self.endpoint(segments)?)
            .send()
            .await
            .map_err(|e| transport_message(&e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(failure_detail(response)
                .await
                .unwrap_or_else(|| format!("Request failed ({})", status.as_u16())));
        }
        response.json::<T>().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl RemoteStore for HttpStore {
    async fn upload_file(&self, file: &UploadedFile) -> Result<RemoteFileRecord> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|e| Error::Upload(format!("Cannot read {}: {}", file.display_name, e)))?;

        let part = multipart::Part::bytes(bytes)
            .file_name(file.display_name.clone())
            .mime_str("text/csv")
            .map_err(|e| Error::Upload(e.to_string()))?;
        let form = multipart::Form::new().part("file", part);

        debug!("Uploading {} to {}", file.display_name, self.base_url);
        let url = self.endpoint(&["files", "upload"]).map_err(Error::Upload)?;
        let response = self
            .http_client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Upload(transport_message(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = failure_detail(response)
                .await
                .unwrap_or_else(|| format!("Upload failed ({})", status.as_u16()));
            return Err(Error::Upload(detail));
        }

        response
            .json::<RemoteFileRecord>()
            .await
            .map_err(|e| Error::Upload(format!("Unexpected upload response: {}", e)))
    }

    async fn list_files(&self) -> Vec<FileEntry> {
        match self.get_json::<FileList>(&["files", "all"]).await {
            Ok(list) => list.files,
            Err(detail) => {
                warn!("Failed to list files: {}", detail);
                Vec::new()
            }
        }
    }

    async fn list_reports(&self) -> Result<Vec<ReportSummary>> {
        self.get_json::<ReportList>(&["reports"])
            .await
            .map(|list| list.reports)
            .map_err(|detail| Error::Load {
                what: "reports",
                detail,
            })
    }

    async fn file_downgrades(&self, file_id: &str) -> Result<u64> {
        self.get_json::<FileMetadata>(&["files", file_id])
            .await
            .map(|m| m.downgraded_transaction)
            .map_err(|detail| Error::Load {
                what: "file metadata",
                detail,
            })
    }

    async fn generate_report(&self, file_id: &str) -> Result<()> {
        let url = self
            .endpoint(&["reports", "generate", file_id])
            .map_err(|detail| Error::GenerationRejected { status: 0, detail })?;
        let response = self
            .http_client
            .post(url)
            .send()
            .await
            .map_err(|e| Error::GenerationRejected {
                status: 0,
                detail: transport_message(&e),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return Err(Error::GenerationServerFault);
        }
        let detail = failure_detail(response)
            .await
            .unwrap_or_else(|| format!("Request failed ({})", status.as_u16()));
        Err(Error::GenerationRejected {
            status: status.as_u16(),
            detail,
        })
    }

    async fn report_detail(&self, report_id: &str) -> Result<ReportDetail> {
        self.get_json::<ReportDetail>(&["reports", report_id])
            .await
            .map_err(|detail| Error::DetailFetch {
                report_id: report_id.to_string(),
                detail,
            })
    }

    async fn check_compliance(&self, request: &ComplianceRequest) -> ComplianceOutcome {
        let url = match self.endpoint(&["api", "compliance", "check"]) {
            Ok(url) => url,
            Err(detail) => return ComplianceOutcome::Failed { detail },
        };
        let response = match self
            .http_client
            .post(url)
            .form(&request.form_fields())
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return ComplianceOutcome::Failed {
                    detail: transport_message(&e),
                }
            }
        };

        let status = response.status();
        if !status.is_success() {
            let detail = failure_detail(response)
                .await
                .unwrap_or_else(|| format!("Compliance check failed ({})", status.as_u16()));
            return ComplianceOutcome::Failed { detail };
        }

        match response.json::<ComplianceSummary>().await {
            Ok(summary) => ComplianceOutcome::Summary(summary),
            Err(e) => ComplianceOutcome::Failed {
                detail: format!("Unexpected compliance response: {}", e),
            },
        }
    }
}

/// Message for a request that never produced a response
fn transport_message(err: &reqwest::Error) -> String {
    debug!("Transport error: {}", err);
    if err.is_timeout() {
        "The server took too long to respond".to_string()
    } else {
        GENERIC_NETWORK_MESSAGE.to_string()
    }
}

/// Server-provided detail text of a failed response, if any
///
/// FastAPI puts it in `detail` (string, or a list of validation errors);
/// other handlers use `error` or `message`.
async fn failure_detail(response: Response) -> Option<String> {
    let body = response.text().await.ok()?;
    detail_from_body(&body)
}

pub(crate) fn detail_from_body(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    for key in ["detail", "error", "message"] {
        match value.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.clone()),
            Some(Value::Array(items)) if !items.is_empty() => {
                let msgs: Vec<String> = items
                    .iter()
                    .map(|item| match item.get("msg") {
                        Some(Value::String(m)) => m.clone(),
                        _ => item.to_string(),
                    })
                    .collect();
                return Some(msgs.join("; "));
            }
            _ => {}
        }
    }
    None
}
