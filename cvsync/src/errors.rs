use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::export::ExportStatus;
use crate::ingest::TextEncoding;
use crate::publisher::PublishPhase;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("No export file matching *.{extension} appeared in {} after {attempts} attempts ({waited:?})", dir.display())]
    DownloadTimeout {
        dir: PathBuf,
        extension: String,
        attempts: u32,
        waited: Duration,
    },

    #[error("Unreadable export file {}: {reason} (tried {attempted:?})", path.display())]
    UnreadableFile {
        path: PathBuf,
        attempted: Vec<TextEncoding>,
        reason: String,
    },

    #[error("Publish phase '{phase}' failed: {message}")]
    PublishPhaseFailure { phase: PublishPhase, message: String },

    #[error("Invalid export job transition from {from:?} to {to:?}")]
    InvalidTransition { from: ExportStatus, to: ExportStatus },

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("WebDriver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Spreadsheet authentication failed: {0}")]
    Auth(String),

    #[error("Spreadsheet API error: {0}")]
    Sheets(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether the error must abort the run before anything is published.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::ElementNotFound(_) | SyncError::PublishPhaseFailure { .. }
        )
    }
}

impl From<thirtyfour::error::WebDriverError> for SyncError {
    fn from(e: thirtyfour::error::WebDriverError) -> Self {
        SyncError::Driver(e.to_string())
    }
}
