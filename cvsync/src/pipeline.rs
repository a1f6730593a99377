//! One end-to-end run: login, filter, export, ingest, publish.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::NaiveDate;
use futures::FutureExt;
use tracing::{error, info, instrument, warn};

use crate::config::{Credential, Settings};
use crate::drivers::BrowserEngine;
use crate::errors::SyncError;
use crate::export::ExportPoller;
use crate::filter::{FilterComposer, FilterReport, FilterSpec};
use crate::ingest::FileIngestor;
use crate::publisher::{PublishReport, SheetPublisher, SheetTarget, SheetsApi};
use crate::utils::settle;
use crate::Page;

#[derive(Debug)]
pub enum RunOutcome {
    /// The sheet now holds the export (see the report for partial failures)
    Published {
        rows: usize,
        filters: FilterReport,
        report: PublishReport,
    },
    /// The export had no rows; the sheet was left untouched
    NothingToReport { filters: FilterReport },
}

pub struct Pipeline<'a> {
    settings: &'a Settings,
    credential: &'a Credential,
    page: Page,
    sheets: &'a dyn SheetsApi,
    today: NaiveDate,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        settings: &'a Settings,
        credential: &'a Credential,
        engine: Arc<dyn BrowserEngine>,
        sheets: &'a dyn SheetsApi,
        today: NaiveDate,
    ) -> Self {
        Self {
            settings,
            credential,
            page: Page::new(engine).with_locate_timeout(settings.locate_timeout),
            sheets,
            today,
        }
    }

    /// Open the target with credentials embedded, then load it again so the SPA boots
    /// with the session already established.
    #[instrument(skip(self), fields(user = %self.credential.identifier()))]
    pub async fn login(&self) -> Result<(), SyncError> {
        let url = self.credential.authenticated_url(&self.settings.target_url)?;
        self.page.goto(&url).await?;
        settle("login", self.settings.pacing.after_login).await;
        self.page.goto(&url).await?;
        settle("reload", self.settings.pacing.after_reload).await;
        info!("Logged in to console");
        Ok(())
    }

    pub async fn run(&self) -> Result<RunOutcome, SyncError> {
        let s = self.settings;
        info!(date = %self.today, sheet = %s.sheet_name, "Starting sync run");

        self.login().await?;

        let spec = FilterSpec::for_day(&s.labels, self.today);
        let filters = FilterComposer::new(&self.page, &s.pacing, &s.focus_wait)
            .apply(&spec)
            .await;
        for step in filters.degraded() {
            warn!(step = %step.step, "Running with a weaker filter than requested");
        }

        let job = ExportPoller::new(
            &self.page,
            &s.labels,
            &s.pacing,
            &s.download_poll,
            &s.download_dir,
            &s.export_extension,
        )
        .run()
        .await?;
        let path = job
            .file_path()
            .ok_or_else(|| SyncError::Internal("export job finished without a file".into()))?;

        let table = FileIngestor::new().ingest(path)?;
        if table.is_empty() {
            info!("Export is empty, leaving the sheet as it is");
            return Ok(RunOutcome::NothingToReport { filters });
        }

        let target = SheetTarget::new(&s.spreadsheet_id, &s.sheet_name);
        let report = SheetPublisher::new(self.sheets, target)
            .publish(&table)
            .await;
        Ok(RunOutcome::Published {
            rows: table.len(),
            filters,
            report,
        })
    }
}

/// Run the pipeline once and end the browser session whatever happens, panics included.
pub async fn run_once(
    settings: &Settings,
    credential: &Credential,
    engine: Arc<dyn BrowserEngine>,
    sheets: &dyn SheetsApi,
    today: NaiveDate,
) -> Result<RunOutcome, SyncError> {
    let pipeline = Pipeline::new(settings, credential, engine.clone(), sheets, today);
    let result = match AssertUnwindSafe(pipeline.run()).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Sync run panicked: {}", message);
            Err(SyncError::Internal(format!("run panicked: {message}")))
        }
    };

    if let Err(e) = engine.quit().await {
        warn!("Failed to end browser session: {}", e);
    }
    result
}
