//! Daily conversion-log export from an ad-tracking admin console into a shared spreadsheet.
//!
//! The pipeline drives a browser through login, filter composition and export, waits for the
//! exported CSV to land on disk, decodes it (UTF-8 or CP932) and replaces the contents of a
//! destination sheet with the rows:
//!
//! ```text
//! Locator -> FilterComposer -> ExportPoller -> FileIngestor -> SheetPublisher
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::instrument;

pub mod config;
pub mod drivers;
pub mod element;
pub mod errors;
pub mod export;
pub mod filter;
pub mod google_sheets;
pub mod ingest;
pub mod locator;
pub mod pipeline;
pub mod publisher;
pub mod retry;
pub mod selector;
#[cfg(test)]
mod tests;
pub mod utils;

pub use config::{Config, Credential, Settings};
pub use drivers::{BrowserEngine, ElementId, Key};
pub use element::Element;
pub use errors::SyncError;
pub use export::{ExportJob, ExportPoller, ExportStatus};
pub use filter::{DateRange, FilterComposer, FilterReport, FilterSpec, StepOutcome};
pub use ingest::{FileIngestor, IngestedTable, TextEncoding};
pub use locator::Locator;
pub use pipeline::{run_once, Pipeline, RunOutcome};
pub use publisher::{PublishReport, SheetPublisher, SheetTarget, SheetsApi, ValueInputOption};
pub use retry::RetryPolicy;
pub use selector::Selector;

/// The main entry point for interacting with the console page
#[derive(Clone)]
pub struct Page {
    engine: Arc<dyn BrowserEngine>,
    locate_timeout: Duration,
}

impl Page {
    pub fn new(engine: Arc<dyn BrowserEngine>) -> Self {
        Self {
            engine,
            locate_timeout: locator::DEFAULT_LOCATOR_TIMEOUT,
        }
    }

    /// Set how long every lookup made through this page waits for a match.
    pub fn with_locate_timeout(mut self, timeout: Duration) -> Self {
        self.locate_timeout = timeout;
        self
    }

    pub fn locator(&self, selector: impl Into<Selector>) -> Locator {
        Locator::new(self.engine.clone(), selector.into()).set_default_timeout(self.locate_timeout)
    }

    /// First element matching `selector`, or `None` once the lookup wait has elapsed.
    pub async fn locate(&self, selector: impl Into<Selector>) -> Option<Element> {
        self.locator(selector).first().await
    }

    pub async fn locate_all(&self, selector: impl Into<Selector>) -> Vec<Element> {
        self.locator(selector).all().await
    }

    #[instrument(skip(self, url))]
    pub async fn goto(&self, url: &str) -> Result<(), SyncError> {
        self.engine.navigate(url).await
    }

    pub async fn focused_element(&self) -> Result<Option<Element>, SyncError> {
        Ok(self
            .engine
            .focused_element()
            .await?
            .map(|id| Element::new(id, self.engine.clone())))
    }

    /// Send a key to whatever has focus.
    pub async fn press_key(&self, key: Key) -> Result<(), SyncError> {
        self.engine.press_page_key(key).await
    }
}
