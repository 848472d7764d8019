//! Error types for InterQ

use thiserror::Error;

/// Generic message shown when the server gave no detail of its own
pub const GENERIC_NETWORK_MESSAGE: &str = "Network error, please check your connection";

#[derive(Error, Debug)]
pub enum Error {
    /// Bad local input (e.g. wrong file type). Never reaches the server.
    #[error("Invalid file: {0}")]
    Validation(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    /// Generate was attempted without a previously uploaded file
    #[error("No uploaded file to generate a report from")]
    MissingReference,

    /// HTTP 500 on generate: the job did not run
    #[error("The server failed to generate the report, please try again")]
    GenerationServerFault,

    /// Any other non-success status on generate
    #[error("Report generation rejected ({status}): {detail}")]
    GenerationRejected { status: u16, detail: String },

    #[error("Failed to load {what}: {detail}")]
    Load { what: &'static str, detail: String },

    #[error("Could not load report {report_id}: {detail}")]
    DetailFetch { report_id: String, detail: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// True for the error classes that are resolved locally, without a round-trip
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::MissingReference)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
