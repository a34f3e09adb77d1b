//! Domain module - keys, statuses and the browser automation seam
//!
//! Nothing in here knows about Tauri, spreadsheets or HTTP.

pub mod automation;
pub mod key;
pub mod status;

// Re-export commonly used items
pub use automation::{AutomationError, AutomationResult, BrowserLauncher, BrowserSession, ElementRef};
pub use key::{DocumentKey, KEY_LENGTH, KeyColumn, select_key_column};
pub use status::{ItemStatus, KeyRow, RunSummary, StatusUpdate};
