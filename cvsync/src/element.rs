use std::fmt;
use std::sync::Arc;

use tracing::instrument;

use crate::drivers::{BrowserEngine, ElementId, Key};
use crate::errors::SyncError;

/// Represents a live element on the console page
#[derive(Clone)]
pub struct Element {
    id: ElementId,
    engine: Arc<dyn BrowserEngine>,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element").field("id", &self.id).finish()
    }
}

impl Element {
    pub(crate) fn new(id: ElementId, engine: Arc<dyn BrowserEngine>) -> Self {
        Self { id, engine }
    }

    pub fn id(&self) -> &ElementId {
        &self.id
    }

    pub async fn click(&self) -> Result<(), SyncError> {
        self.engine.click(&self.id).await
    }

    /// Click through script after centring the element, for controls that an overlay
    /// would swallow a native click on.
    #[instrument(level = "debug", skip(self), fields(element = %self.id))]
    pub async fn click_forced(&self) -> Result<(), SyncError> {
        self.engine.click_forced(&self.id).await
    }

    /// Assign `value` directly to the element's value property.
    #[instrument(level = "debug", skip(self), fields(element = %self.id))]
    pub async fn set_value(&self, value: &str) -> Result<(), SyncError> {
        self.engine.set_value(&self.id, value).await
    }

    pub async fn type_text(&self, text: &str) -> Result<(), SyncError> {
        self.engine.type_text(&self.id, text).await
    }

    pub async fn press_key(&self, key: Key) -> Result<(), SyncError> {
        self.engine.press_key(&self.id, key).await
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>, SyncError> {
        self.engine.attribute(&self.id, name).await
    }

    pub async fn tag_name(&self) -> Result<String, SyncError> {
        self.engine.tag_name(&self.id).await
    }

    pub async fn is_displayed(&self) -> Result<bool, SyncError> {
        self.engine.is_displayed(&self.id).await
    }

    /// Whether keystrokes sent to this element would edit text.
    pub async fn is_editable(&self) -> Result<bool, SyncError> {
        let tag = self.tag_name().await?.to_lowercase();
        if tag == "input" || tag == "textarea" {
            return Ok(true);
        }
        Ok(self
            .attribute("contenteditable")
            .await?
            .is_some_and(|v| v.is_empty() || v.eq_ignore_ascii_case("true")))
    }
}
