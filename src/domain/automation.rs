//! Browser automation seam
//!
//! The retrieval loop only talks to these traits. The WebDriver backend in
//! `infrastructure` implements them for a real browser; tests script them.

use async_trait::async_trait;
use thiserror::Error;

/// Opaque reference to an element inside the current page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Browser session could not be created: {0}")]
    SessionNotCreated(String),

    #[error("Browser driver failed: {0}")]
    Driver(String),

    #[error("Driver did not become ready within {seconds}s")]
    DriverNotReady { seconds: u64 },

    #[error("Element '{id}' not found")]
    ElementNotFound { id: String },

    #[error("WebDriver error '{error}': {message}")]
    Protocol { error: String, message: String },

    #[error("WebDriver transport failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Unexpected WebDriver response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AutomationResult<T> = Result<T, AutomationError>;

/// A live browser session, used by one worker at a time
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> AutomationResult<()>;

    /// Look an element up by its DOM id. `Ok(None)` when it is absent.
    async fn find_by_id(&self, id: &str) -> AutomationResult<Option<ElementRef>>;

    async fn clear(&self, element: &ElementRef) -> AutomationResult<()>;

    async fn type_text(&self, element: &ElementRef, text: &str) -> AutomationResult<()>;

    async fn click(&self, element: &ElementRef) -> AutomationResult<()>;

    async fn is_displayed(&self, element: &ElementRef) -> AutomationResult<bool>;

    async fn is_enabled(&self, element: &ElementRef) -> AutomationResult<bool>;

    async fn scroll_into_view(&self, element: &ElementRef) -> AutomationResult<()>;

    /// Activate a control ignoring the standard visibility and
    /// interactability gating.
    ///
    /// This is an escape hatch: the portal renders its download control in a
    /// way the regular click model refuses, so the click is dispatched from a
    /// page script instead. Use [`BrowserSession::click`] everywhere else.
    async fn force_click(&self, element: &ElementRef) -> AutomationResult<()>;

    /// End the session and release the browser. Safe to call once per session.
    async fn quit(&self) -> AutomationResult<()>;
}

/// Creates one browser session per retrieval run
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> AutomationResult<Box<dyn BrowserSession>>;
}
