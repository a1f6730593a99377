use crate::errors::SyncError;
use crate::selector::Selector;

pub mod webdriver;

pub use webdriver::{DriverConfig, WebDriverEngine};

/// Opaque handle to an element owned by a [`BrowserEngine`].
///
/// Handles are only meaningful to the engine that issued them and stay valid until the
/// session ends (the page may still detach the underlying node, in which case calls fail).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Keys the pipeline sends as confirmation keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
}

/// The common trait that all browser backends must implement
#[async_trait::async_trait]
pub trait BrowserEngine: Send + Sync {
    /// Load a URL in the current tab and wait for the navigation to commit
    async fn navigate(&self, url: &str) -> Result<(), SyncError>;

    /// Find all elements matching a selector, in document order, without waiting
    async fn find_elements(&self, selector: &Selector) -> Result<Vec<ElementId>, SyncError>;

    /// Simulated (native) click
    async fn click(&self, element: &ElementId) -> Result<(), SyncError>;

    /// Scroll the element to the viewport centre and dispatch a click from script,
    /// bypassing overlays that would intercept a native click
    async fn click_forced(&self, element: &ElementId) -> Result<(), SyncError>;

    /// Assign the element's value directly, skipping keystroke validation
    async fn set_value(&self, element: &ElementId, value: &str) -> Result<(), SyncError>;

    /// Simulated keystroke entry
    async fn type_text(&self, element: &ElementId, text: &str) -> Result<(), SyncError>;

    async fn press_key(&self, element: &ElementId, key: Key) -> Result<(), SyncError>;

    /// Send a key to whatever currently has focus on the page
    async fn press_page_key(&self, key: Key) -> Result<(), SyncError>;

    /// The element the page reports as focused, if any
    async fn focused_element(&self) -> Result<Option<ElementId>, SyncError>;

    async fn attribute(&self, element: &ElementId, name: &str)
        -> Result<Option<String>, SyncError>;

    async fn tag_name(&self, element: &ElementId) -> Result<String, SyncError>;

    async fn is_displayed(&self, element: &ElementId) -> Result<bool, SyncError>;

    /// End the browser session. Called exactly once per run.
    async fn quit(&self) -> Result<(), SyncError>;
}
