//! [`BrowserEngine`] over the W3C WebDriver protocol (chromedriver).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thirtyfour::prelude::*;
use thirtyfour::ChromiumLikeCapabilities;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use super::{BrowserEngine, ElementId, Key};
use crate::errors::SyncError;
use crate::selector::Selector;

const CLICK_FORCED_JS: &str =
    "arguments[0].scrollIntoView({block: 'center'}); arguments[0].click();";
const SET_VALUE_JS: &str = "arguments[0].value = arguments[1];";

/// How to reach and configure the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Endpoint of an already running WebDriver server
    pub webdriver_url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            window_width: 1920,
            window_height: 1080,
        }
    }
}

/// Handles issued so far, one per distinct WebDriver element reference. An [`ElementId`] is
/// an index into the list, so repeated lookups of the same node reuse its handle.
struct HandleRegistry<T> {
    entries: Vec<(serde_json::Value, T)>,
}

impl<T: Clone> HandleRegistry<T> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn issue(&mut self, reference: serde_json::Value, item: T) -> ElementId {
        let index = match self.entries.iter().position(|(r, _)| *r == reference) {
            Some(index) => index,
            None => {
                self.entries.push((reference, item));
                self.entries.len() - 1
            }
        };
        ElementId(index.to_string())
    }

    fn get(&self, id: &ElementId) -> Result<T, SyncError> {
        let index: usize = id
            .0
            .parse()
            .map_err(|_| SyncError::Driver(format!("foreign element handle {id}")))?;
        self.entries
            .get(index)
            .map(|(_, item)| item.clone())
            .ok_or_else(|| SyncError::Driver(format!("unknown element handle {id}")))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

pub struct WebDriverEngine {
    driver: WebDriver,
    elements: Mutex<HandleRegistry<WebElement>>,
}

impl WebDriverEngine {
    /// Start a Chrome session whose downloads land in `download_dir` without prompting.
    #[instrument(skip(config), fields(webdriver_url = %config.webdriver_url))]
    pub async fn connect(config: &DriverConfig, download_dir: &Path) -> Result<Self, SyncError> {
        let mut caps = DesiredCapabilities::chrome();
        if config.headless {
            caps.set_headless()?;
        }
        caps.set_no_sandbox()?;
        caps.set_disable_dev_shm_usage()?;
        caps.add_arg(&format!(
            "--window-size={},{}",
            config.window_width, config.window_height
        ))?;
        caps.add_experimental_option(
            "prefs",
            serde_json::json!({
                "download.default_directory": download_dir.display().to_string(),
                "download.prompt_for_download": false,
                "download.directory_upgrade": true,
                "safebrowsing.enabled": true,
            }),
        )?;

        let driver = WebDriver::new(config.webdriver_url.as_str(), caps).await?;
        info!(download_dir = %download_dir.display(), "Browser session started");
        Ok(Self {
            driver,
            elements: Mutex::new(HandleRegistry::new()),
        })
    }

    async fn register(&self, element: WebElement) -> Result<ElementId, SyncError> {
        let reference = element.to_json()?;
        let mut elements = self.elements.lock().await;
        let id = elements.issue(reference, element);
        debug!(handles = elements.len(), "Registered {}", id);
        Ok(id)
    }

    async fn resolve(&self, id: &ElementId) -> Result<WebElement, SyncError> {
        self.elements.lock().await.get(id)
    }
}

fn to_driver_key(key: Key) -> thirtyfour::Key {
    match key {
        Key::Enter => thirtyfour::Key::Enter,
    }
}

#[async_trait::async_trait]
impl BrowserEngine for WebDriverEngine {
    async fn navigate(&self, url: &str) -> Result<(), SyncError> {
        self.driver.goto(url).await?;
        Ok(())
    }

    async fn find_elements(&self, selector: &Selector) -> Result<Vec<ElementId>, SyncError> {
        let xpath = selector.to_xpath()?;
        debug!(%xpath, "find_elements");
        let found = self.driver.find_all(By::XPath(xpath)).await?;
        let mut ids = Vec::with_capacity(found.len());
        for element in found {
            ids.push(self.register(element).await?);
        }
        Ok(ids)
    }

    async fn click(&self, element: &ElementId) -> Result<(), SyncError> {
        self.resolve(element).await?.click().await?;
        Ok(())
    }

    async fn click_forced(&self, element: &ElementId) -> Result<(), SyncError> {
        let el = self.resolve(element).await?;
        self.driver
            .execute(CLICK_FORCED_JS, vec![el.to_json()?])
            .await?;
        Ok(())
    }

    async fn set_value(&self, element: &ElementId, value: &str) -> Result<(), SyncError> {
        let el = self.resolve(element).await?;
        self.driver
            .execute(SET_VALUE_JS, vec![el.to_json()?, serde_json::json!(value)])
            .await?;
        Ok(())
    }

    async fn type_text(&self, element: &ElementId, text: &str) -> Result<(), SyncError> {
        self.resolve(element).await?.send_keys(text).await?;
        Ok(())
    }

    async fn press_key(&self, element: &ElementId, key: Key) -> Result<(), SyncError> {
        self.resolve(element)
            .await?
            .send_keys(to_driver_key(key))
            .await?;
        Ok(())
    }

    async fn press_page_key(&self, key: Key) -> Result<(), SyncError> {
        self.driver
            .action_chain()
            .send_keys(to_driver_key(key))
            .perform()
            .await?;
        Ok(())
    }

    async fn focused_element(&self) -> Result<Option<ElementId>, SyncError> {
        let active = self.driver.active_element().await?;
        Ok(Some(self.register(active).await?))
    }

    async fn attribute(
        &self,
        element: &ElementId,
        name: &str,
    ) -> Result<Option<String>, SyncError> {
        Ok(self.resolve(element).await?.attr(name).await?)
    }

    async fn tag_name(&self, element: &ElementId) -> Result<String, SyncError> {
        Ok(self.resolve(element).await?.tag_name().await?)
    }

    async fn is_displayed(&self, element: &ElementId) -> Result<bool, SyncError> {
        Ok(self.resolve(element).await?.is_displayed().await?)
    }

    async fn quit(&self) -> Result<(), SyncError> {
        self.elements.lock().await.clear();
        self.driver.clone().quit().await?;
        info!("Browser session closed");
        Ok(())
    }
}
