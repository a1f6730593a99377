//! Replacing the destination sheet's contents with the ingested table.

use std::fmt;

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::errors::SyncError;
use crate::ingest::IngestedTable;

/// How the spreadsheet interprets written cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ValueInputOption {
    Raw,
    /// Parsed as if typed by a user, so numbers and dates become typed cells
    #[default]
    UserEntered,
}

impl ValueInputOption {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueInputOption::Raw => "RAW",
            ValueInputOption::UserEntered => "USER_ENTERED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PublishPhase {
    Clear,
    Write,
}

impl fmt::Display for PublishPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishPhase::Clear => write!(f, "clear"),
            PublishPhase::Write => write!(f, "write"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetTarget {
    pub spreadsheet_id: String,
    pub sheet_name: String,
}

impl SheetTarget {
    pub fn new(spreadsheet_id: impl Into<String>, sheet_name: impl Into<String>) -> Self {
        Self {
            spreadsheet_id: spreadsheet_id.into(),
            sheet_name: sheet_name.into(),
        }
    }

    /// A1 notation for the whole sheet.
    pub fn clear_range(&self) -> String {
        quote_sheet_name(&self.sheet_name)
    }

    /// Top-left cell; the write grows from here.
    pub fn anchor_range(&self) -> String {
        format!("{}!A1", quote_sheet_name(&self.sheet_name))
    }
}

fn quote_sheet_name(name: &str) -> String {
    if name
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '\'' | '!' | ':' | ','))
    {
        format!("'{}'", name.replace('\'', "''"))
    } else {
        name.to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub updated_cells: Option<u64>,
}

/// Minimal spreadsheet values API the publisher needs.
#[async_trait::async_trait]
pub trait SheetsApi: Send + Sync {
    async fn clear(&self, spreadsheet_id: &str, range: &str) -> Result<(), SyncError>;

    async fn update(
        &self,
        spreadsheet_id: &str,
        range: &str,
        input: ValueInputOption,
        rows: &[Vec<String>],
    ) -> Result<UpdateSummary, SyncError>;
}

/// What happened to each phase. Neither phase aborts the other.
#[derive(Debug, Default)]
pub struct PublishReport {
    pub clear_error: Option<SyncError>,
    pub write_error: Option<SyncError>,
    pub updated_cells: Option<u64>,
}

impl PublishReport {
    pub fn is_complete(&self) -> bool {
        self.clear_error.is_none() && self.write_error.is_none()
    }
}

pub struct SheetPublisher<'a> {
    api: &'a dyn SheetsApi,
    target: SheetTarget,
    input: ValueInputOption,
}

impl<'a> SheetPublisher<'a> {
    pub fn new(api: &'a dyn SheetsApi, target: SheetTarget) -> Self {
        Self {
            api,
            target,
            input: ValueInputOption::default(),
        }
    }

    pub fn with_input_option(mut self, input: ValueInputOption) -> Self {
        self.input = input;
        self
    }

    pub fn target(&self) -> &SheetTarget {
        &self.target
    }

    /// Clear the sheet, then write `table` at A1.
    ///
    /// A failed clear is logged and the write still happens: stale rows beyond the new
    /// table may survive, which is preferable to publishing nothing.
    #[instrument(skip_all, fields(sheet = %self.target.sheet_name, rows = table.len()))]
    pub async fn publish(&self, table: &IngestedTable) -> PublishReport {
        let mut report = PublishReport::default();
        let id = &self.target.spreadsheet_id;

        if let Err(e) = self.api.clear(id, &self.target.clear_range()).await {
            error!("Failed to clear sheet '{}': {}", self.target.sheet_name, e);
            report.clear_error = Some(phase_failure(PublishPhase::Clear, e));
        }

        match self
            .api
            .update(id, &self.target.anchor_range(), self.input, table.rows())
            .await
        {
            Ok(summary) => {
                info!(
                    updated_cells = ?summary.updated_cells,
                    "Wrote {} rows to '{}'",
                    table.len(),
                    self.target.sheet_name
                );
                report.updated_cells = summary.updated_cells;
            }
            Err(e) => {
                error!("Failed to write sheet '{}': {}", self.target.sheet_name, e);
                report.write_error = Some(phase_failure(PublishPhase::Write, e));
            }
        }

        if report.clear_error.is_some() && report.write_error.is_none() {
            warn!("Sheet written without a prior clear; trailing rows may be stale");
        }
        report
    }
}

fn phase_failure(phase: PublishPhase, e: SyncError) -> SyncError {
    match e {
        already @ SyncError::PublishPhaseFailure { .. } => already,
        other => SyncError::PublishPhaseFailure {
            phase,
            message: other.to_string(),
        },
    }
}
