use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};

use crate::drivers::BrowserEngine;
use crate::element::Element;
use crate::errors::SyncError;
use crate::selector::Selector;

// Default wait if none is specified on the locator itself
pub const DEFAULT_LOCATOR_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A high-level API for finding elements that may not have rendered yet
///
/// Absence is never an error: after the wait elapses the locator reports `None` (or an
/// empty list) and the caller decides whether that is fatal.
#[derive(Clone)]
pub struct Locator {
    engine: Arc<dyn BrowserEngine>,
    selector: Selector,
    timeout: Duration,
    poll_interval: Duration,
}

impl Locator {
    pub(crate) fn new(engine: Arc<dyn BrowserEngine>, selector: Selector) -> Self {
        Self {
            engine,
            selector,
            timeout: DEFAULT_LOCATOR_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set how long lookups on this locator keep polling before giving up.
    pub fn set_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }

    /// All current matches, waiting until at least one exists or the timeout passes.
    #[instrument(level = "debug", skip(self), fields(selector = %self.selector))]
    pub async fn all(&self) -> Vec<Element> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.engine.find_elements(&self.selector).await {
                Ok(found) if !found.is_empty() => {
                    debug!(count = found.len(), "Selector matched");
                    return found
                        .into_iter()
                        .map(|id| Element::new(id, self.engine.clone()))
                        .collect();
                }
                Ok(_) => {}
                Err(e @ SyncError::InvalidSelector(_)) => {
                    warn!("Selector can never match: {}", e);
                    return Vec::new();
                }
                Err(e) => debug!("Lookup failed, treating as absent: {}", e),
            }
            if Instant::now() >= deadline {
                debug!(timeout = ?self.timeout, "No match before timeout");
                return Vec::new();
            }
            sleep(self.poll_interval).await;
        }
    }

    /// The first match in document order.
    pub async fn first(&self) -> Option<Element> {
        self.all().await.into_iter().next()
    }

    pub fn selector_string(&self) -> String {
        self.selector.to_string()
    }
}
