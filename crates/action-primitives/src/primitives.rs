//! Action primitives implementation

use async_trait::async_trait;
use cdp_adapter::ChromeSession;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::{
    errors::ActionError,
    types::{KeyStroke, ENTER_KEY},
};

/// Action primitives trait
///
/// The browser capability set the interpreter drives. Locators are XPath
/// expressions and are treated as opaque strings. Element lookups honour the
/// implementation's implicit wait; `count` never fails because nothing matched.
#[async_trait]
pub trait ActionPrimitives: Send + Sync {
    /// Navigate the page to a URL
    async fn navigate(&self, url: &str) -> Result<(), ActionError>;

    /// Reload the current page
    async fn refresh(&self) -> Result<(), ActionError>;

    /// Number of elements currently matching the locator
    async fn count(&self, locator: &str) -> Result<usize, ActionError>;

    /// Click the first matching element
    async fn click(&self, locator: &str) -> Result<(), ActionError>;

    /// Clear the first matching input field
    async fn clear(&self, locator: &str) -> Result<(), ActionError>;

    /// Send a key press or literal text to the first matching element
    async fn send_keys(&self, locator: &str, keys: &KeyStroke) -> Result<(), ActionError>;

    /// Visible text of the first matching element
    async fn read_text(&self, locator: &str) -> Result<String, ActionError>;
}

/// Default implementation backed by a Chromium session
pub struct DefaultActionPrimitives {
    session: Arc<ChromeSession>,
}

impl DefaultActionPrimitives {
    /// Create a primitives implementation over a launched session
    pub fn new(session: Arc<ChromeSession>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl ActionPrimitives for DefaultActionPrimitives {
    async fn navigate(&self, url: &str) -> Result<(), ActionError> {
        let start = Instant::now();
        self.session
            .navigate(url)
            .await
            .map_err(|err| ActionError::from_adapter(err, url))?;
        info!(
            url,
            latency_ms = start.elapsed().as_millis() as u64,
            "Navigation completed"
        );
        Ok(())
    }

    async fn refresh(&self) -> Result<(), ActionError> {
        self.session
            .refresh()
            .await
            .map_err(|err| ActionError::from_adapter(err, "document"))
    }

    async fn count(&self, locator: &str) -> Result<usize, ActionError> {
        let found = self
            .session
            .find_all(locator)
            .await
            .map_err(|err| ActionError::from_adapter(err, locator))?;
        debug!(locator, matches = found.len(), "Counted matching elements");
        Ok(found.len())
    }

    async fn click(&self, locator: &str) -> Result<(), ActionError> {
        let start = Instant::now();
        self.session
            .click(locator)
            .await
            .map_err(|err| ActionError::from_adapter(err, locator))?;
        debug!(
            locator,
            latency_ms = start.elapsed().as_millis() as u64,
            "Click completed"
        );
        Ok(())
    }

    async fn clear(&self, locator: &str) -> Result<(), ActionError> {
        self.session
            .clear(locator)
            .await
            .map_err(|err| ActionError::from_adapter(err, locator))
    }

    async fn send_keys(&self, locator: &str, keys: &KeyStroke) -> Result<(), ActionError> {
        debug!(locator, keys = %keys, "Sending keys");
        let result = match keys {
            KeyStroke::Enter => self.session.press_key(locator, ENTER_KEY).await,
            KeyStroke::Text(text) => self.session.type_text(locator, text).await,
        };
        result.map_err(|err| ActionError::from_adapter(err, locator))
    }

    async fn read_text(&self, locator: &str) -> Result<String, ActionError> {
        self.session
            .read_text(locator)
            .await
            .map_err(|err| ActionError::from_adapter(err, locator))
    }
}
