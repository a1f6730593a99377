//! Submitting the query, requesting the CSV export and waiting for it to land on disk.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConsoleLabels, Pacing};
use crate::drivers::Key;
use crate::errors::SyncError;
use crate::retry::{poll_until, RetryPolicy};
use crate::selector::Selector;
use crate::utils::settle;
use crate::Page;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportStatus {
    Triggered,
    Polling,
    Found,
    TimedOut,
}

impl ExportStatus {
    fn can_become(self, next: ExportStatus) -> bool {
        use ExportStatus::*;
        matches!(
            (self, next),
            (Triggered, Polling) | (Polling, Found) | (Polling, TimedOut)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExportStatus::Found | ExportStatus::TimedOut)
    }
}

/// One export request and what became of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportJob {
    status: ExportStatus,
    file_path: Option<PathBuf>,
}

impl Default for ExportJob {
    fn default() -> Self {
        Self::new()
    }
}

impl ExportJob {
    pub fn new() -> Self {
        Self {
            status: ExportStatus::Triggered,
            file_path: None,
        }
    }

    pub fn status(&self) -> ExportStatus {
        self.status
    }

    /// Set exactly when the job is [`ExportStatus::Found`].
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn transition(&mut self, next: ExportStatus) -> Result<(), SyncError> {
        if !self.status.can_become(next) {
            return Err(SyncError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        debug!(from = ?self.status, to = ?next, "Export job transition");
        self.status = next;
        Ok(())
    }

    pub fn begin_polling(&mut self) -> Result<(), SyncError> {
        self.transition(ExportStatus::Polling)
    }

    pub fn mark_found(&mut self, path: PathBuf) -> Result<(), SyncError> {
        self.transition(ExportStatus::Found)?;
        self.file_path = Some(path);
        Ok(())
    }

    pub fn mark_timed_out(&mut self) -> Result<(), SyncError> {
        self.transition(ExportStatus::TimedOut)
    }
}

/// The first file in `dir` (by name) whose extension matches `extension`, ignoring case.
///
/// An unreadable or missing directory is reported as "nothing yet".
pub fn find_export_file(dir: &Path, extension: &str) -> Option<PathBuf> {
    match matching_files(dir, extension) {
        Ok(files) => files.into_iter().next(),
        Err(e) => {
            debug!("Cannot list {}: {}", dir.display(), e);
            None
        }
    }
}

/// Delete files a previous run left behind, so the poll can only find the new export.
pub fn remove_stale_exports(dir: &Path, extension: &str) -> Result<usize, SyncError> {
    let stale = match matching_files(dir, extension) {
        Ok(files) => files,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    for path in &stale {
        warn!("Removing leftover export {}", path.display());
        std::fs::remove_file(path)?;
    }
    Ok(stale.len())
}

fn matching_files(dir: &Path, extension: &str) -> std::io::Result<Vec<PathBuf>> {
    let wanted = extension.trim_start_matches('.');
    let mut matches: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
        })
        .collect();
    matches.sort();
    Ok(matches)
}

pub struct ExportPoller<'a> {
    page: &'a Page,
    labels: &'a ConsoleLabels,
    pacing: &'a Pacing,
    download_poll: &'a RetryPolicy,
    download_dir: &'a Path,
    extension: &'a str,
}

impl<'a> ExportPoller<'a> {
    pub fn new(
        page: &'a Page,
        labels: &'a ConsoleLabels,
        pacing: &'a Pacing,
        download_poll: &'a RetryPolicy,
        download_dir: &'a Path,
        extension: &'a str,
    ) -> Self {
        Self {
            page,
            labels,
            pacing,
            download_poll,
            download_dir,
            extension,
        }
    }

    /// Search, export, then wait for the file. Only a missing export control, a download
    /// that never arrives or a leftover file that cannot be removed is an error.
    #[instrument(skip_all, fields(dir = %self.download_dir.display()))]
    pub async fn run(&self) -> Result<ExportJob, SyncError> {
        remove_stale_exports(self.download_dir, self.extension)?;
        self.submit_query().await;
        settle("search results", self.pacing.search_render).await;
        self.trigger_export().await?;

        let mut job = ExportJob::new();
        job.begin_polling()?;
        match self.await_download().await {
            Ok(path) => {
                job.mark_found(path)?;
                Ok(job)
            }
            Err(e) => {
                job.mark_timed_out()?;
                Err(e)
            }
        }
    }

    /// Force-click the visible search control, or press Enter on the page when there is none.
    ///
    /// The console renders one search button per form section; the last visible one
    /// belongs to the filter panel.
    pub async fn submit_query(&self) {
        let label = &self.labels.search_button;
        let selector = Selector::attr("value", label)
            .on("input")
            .or(Selector::text(label).on("button"));

        let mut visible = None;
        for candidate in self.page.locate_all(selector).await {
            if candidate.is_displayed().await.unwrap_or(false) {
                visible = Some(candidate);
            }
        }

        let clicked = match visible {
            Some(button) => match button.click_forced().await {
                Ok(()) => {
                    info!("Search submitted via '{}'", label);
                    true
                }
                Err(e) => {
                    warn!("Search button click failed: {}", e);
                    false
                }
            },
            None => false,
        };

        if !clicked {
            warn!("No usable search button, submitting with Enter");
            if let Err(e) = self.page.press_key(Key::Enter).await {
                warn!("Enter fallback failed: {}", e);
            }
        }
    }

    /// Click the export control. Without it there is nothing to wait for, so absence is fatal.
    pub async fn trigger_export(&self) -> Result<(), SyncError> {
        let label = &self.labels.export_button;
        let selector = Selector::attr("value", label).or(Selector::text(label));
        let button = self
            .page
            .locate(selector)
            .await
            .ok_or_else(|| SyncError::ElementNotFound(format!("export control '{label}'")))?;
        button.click_forced().await?;
        info!("Export requested via '{}'", label);
        Ok(())
    }

    pub async fn await_download(&self) -> Result<PathBuf, SyncError> {
        let policy = self.download_poll;
        let found = poll_until(policy, |attempt| async move {
            let hit = find_export_file(self.download_dir, self.extension);
            if hit.is_none() {
                debug!(
                    attempt = attempt + 1,
                    max = policy.max_attempts,
                    "Export file not there yet"
                );
            }
            hit
        })
        .await;

        match found {
            Some(path) => {
                info!("Export file arrived: {}", path.display());
                Ok(path)
            }
            None => Err(SyncError::DownloadTimeout {
                dir: self.download_dir.to_path_buf(),
                extension: self.extension.to_string(),
                attempts: policy.max_attempts,
                waited: policy.budget(),
            }),
        }
    }
}
