//! Browser session abstraction
//!
//! The runner never reaches for an ambient browser. Every scenario gets a
//! [`BrowserSession`] handle passed in explicitly, and a
//! [`SessionLauncher`] hands out a fresh one per scenario.

use std::path::Path;

use async_trait::async_trait;

use crate::error::E2eResult;
use crate::scenario::Action;
use crate::selector::Selector;

/// A live browser page that can perform primitive actions.
///
/// Each call resolves only once the automation engine has finished the
/// action or reported its failure.
#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate to an absolute URL
    async fn visit(&mut self, url: &str) -> E2eResult<()>;

    /// Click exactly one element
    async fn click(&mut self, selector: &Selector) -> E2eResult<()>;

    /// Type text into exactly one element
    async fn type_text(&mut self, selector: &Selector, text: &str) -> E2eResult<()>;

    /// Click the element that submits the current form
    async fn submit(&mut self, selector: &Selector) -> E2eResult<()>;

    /// Capture the page to `path`. Returns `false` when unsupported.
    async fn screenshot(&mut self, _path: &Path) -> E2eResult<bool> {
        Ok(false)
    }

    /// Release the browser
    async fn close(&mut self) -> E2eResult<()>;

    /// Dispatch a primitive action. `Visit` URLs must already be absolute.
    async fn perform(&mut self, action: &Action) -> E2eResult<()> {
        match action {
            Action::Visit { url } => self.visit(url).await,
            Action::Click { selector } => self.click(selector).await,
            Action::Type { selector, text } => self.type_text(selector, text).await,
            Action::Submit { selector } => self.submit(selector).await,
        }
    }
}

/// Produces a fresh, isolated session for each scenario
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: BrowserSession;

    async fn launch(&self) -> E2eResult<Self::Session>;
}
