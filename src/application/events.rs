//! Event flow between the worker and the window
//!
//! The worker never touches the window. It sends [`RunEvent`]s over a channel;
//! the pump applies them to the key table and hands them to a [`UiSink`],
//! which is the only thing that talks to the display.

use serde::Serialize;
use tauri::{AppHandle, Emitter};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tracing::{debug, error};

use crate::domain::status::{RunSummary, StatusUpdate};

/// Window event carrying a [`StatusUpdate`]
pub const STATUS_EVENT: &str = "retrieval-status";
/// Window event carrying a [`RunSummary`]
pub const FINISHED_EVENT: &str = "retrieval-finished";

/// Messages produced by the retrieval worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Status(StatusUpdate),
    /// The run aborted; carries the operator-facing reason
    Failed(String),
    /// Always the last event of a run
    Finished(RunSummary),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// A one-off message for the operator (rendered as a native dialog)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, title, message)
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, title, message)
    }

    fn new(level: NoticeLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Display side of the application
pub trait UiSink: Send + Sync {
    fn status_changed(&self, update: &StatusUpdate);

    fn notify(&self, notice: Notice);

    fn run_finished(&self, summary: &RunSummary);
}

/// [`UiSink`] backed by the Tauri window and the dialog plugin
#[derive(Clone)]
pub struct TauriUiSink {
    app_handle: AppHandle,
}

impl TauriUiSink {
    pub const fn new(app_handle: AppHandle) -> Self {
        Self { app_handle }
    }

    fn emit<S: Serialize + Clone>(&self, event_name: &str, payload: S) {
        match self.app_handle.emit(event_name, payload) {
            Ok(()) => debug!("Emitted event: {}", event_name),
            Err(e) => error!("Failed to emit event {}: {}", event_name, e),
        }
    }
}

impl UiSink for TauriUiSink {
    fn status_changed(&self, update: &StatusUpdate) {
        self.emit(STATUS_EVENT, update);
    }

    fn notify(&self, notice: Notice) {
        let kind = match notice.level {
            NoticeLevel::Info => MessageDialogKind::Info,
            NoticeLevel::Warning => MessageDialogKind::Warning,
            NoticeLevel::Error => MessageDialogKind::Error,
        };
        self.app_handle
            .dialog()
            .message(notice.message)
            .title(notice.title)
            .kind(kind)
            .show(|_| {});
    }

    fn run_finished(&self, summary: &RunSummary) {
        self.emit(FINISHED_EVENT, summary);
    }
}
