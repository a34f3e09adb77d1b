//! Run controller
//!
//! Entry points behind the window's buttons. Loading replaces the key table;
//! starting claims the run flag, spawns the retrieval worker and a pump that
//! drains the worker's events into the key table and the [`UiSink`].

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::events::{Notice, RunEvent, UiSink};
use crate::application::key_loader::{KeyLoadError, KeyLoader};
use crate::application::retrieval::{RetrievalPlan, execute_run};
use crate::application::run_state::RunGuard;
use crate::application::state::AppState;
use crate::domain::status::RunSummary;

/// Result of a spreadsheet load, as reported to the window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LoadOutcome {
    Loaded { count: usize },
    NoValidColumn,
    Unreadable { reason: String },
    /// Refused because a run is active
    Busy,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    #[error("A retrieval run is already in progress")]
    AlreadyRunning,

    #[error("No keys loaded")]
    NoKeys,
}

/// A run that has been started
#[derive(Debug)]
pub struct RunHandle {
    pub run_id: String,
    /// Completes once the completion notice has been sent
    pub completion: JoinHandle<()>,
}

/// Load `path` into the key table.
///
/// Unreadable files leave the table untouched; a readable file without a key
/// column empties it. The run flag is held for the whole load, so a run
/// cannot start against a half-replaced table.
pub async fn load_spreadsheet(state: &AppState, sink: &dyn UiSink, path: &Path) -> LoadOutcome {
    let Some(_load_guard) = state.try_begin_run() else {
        warn!("Refusing to load {} during a run", path.display());
        sink.notify(Notice::warning(
            "Retrieval in progress",
            "Wait for the current run to finish before loading another spreadsheet.",
        ));
        return LoadOutcome::Busy;
    };

    let loader = KeyLoader::new(state.config.read().await.loader.has_header_row);
    let owned_path = path.to_path_buf();
    let loaded = match tokio::task::spawn_blocking(move || loader.load(&owned_path)).await {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("Spreadsheet loader task failed: {}", e);
            sink.notify(Notice::error("Spreadsheet error", format!("Loading failed: {e}")));
            return LoadOutcome::Unreadable { reason: e.to_string() };
        }
    };

    match loaded {
        Ok(keys) => {
            let count = keys.len();
            state.replace_keys(keys).await;
            LoadOutcome::Loaded { count }
        }
        Err(KeyLoadError::NoValidColumn) => {
            state.clear_keys().await;
            sink.notify(Notice::warning("No keys found", KeyLoadError::NoValidColumn.to_string()));
            LoadOutcome::NoValidColumn
        }
        Err(e @ KeyLoadError::Unreadable(_)) => {
            error!("Failed to load {}: {}", path.display(), e);
            let reason = e.to_string();
            sink.notify(Notice::error("Spreadsheet error", reason.clone()));
            LoadOutcome::Unreadable { reason }
        }
    }
}

/// Start a retrieval run over the loaded keys.
///
/// Rejected while another run is active or when the table is empty. On
/// success the worker and the pump are already running.
pub async fn start_retrieval(state: &AppState, sink: Arc<dyn UiSink>) -> Result<RunHandle, StartError> {
    let Some(guard) = state.try_begin_run() else {
        warn!("Start requested while a run is active");
        return Err(StartError::AlreadyRunning);
    };

    let keys = state.keys().await;
    if keys.is_empty() {
        warn!("Start requested with no keys loaded");
        return Err(StartError::NoKeys);
    }

    state.reset_statuses().await;
    let plan = RetrievalPlan::from_config(&state.config().await);
    let run_id = Uuid::new_v4().to_string();
    let total = keys.len();
    let (tx, rx) = mpsc::unbounded_channel();

    let launcher = state.launcher();
    let worker_run_id = run_id.clone();
    tokio::spawn(async move {
        execute_run(launcher.as_ref(), keys, &plan, worker_run_id, tx).await;
    });

    let completion = tokio::spawn(pump_events(state.clone(), sink, rx, guard, run_id.clone(), total));
    info!("Run {} started for {} key(s)", run_id, total);

    Ok(RunHandle { run_id, completion })
}

/// Sole consumer of a run's events. Releases the run flag once the run is
/// over, then announces completion.
async fn pump_events(
    state: AppState,
    sink: Arc<dyn UiSink>,
    mut events: UnboundedReceiver<RunEvent>,
    guard: RunGuard,
    run_id: String,
    total: usize,
) {
    let mut finished = None;

    while let Some(event) = events.recv().await {
        match event {
            RunEvent::Status(update) => {
                if state.apply_status(&update).await {
                    sink.status_changed(&update);
                }
            }
            RunEvent::Failed(reason) => sink.notify(Notice::error("Retrieval aborted", reason)),
            RunEvent::Finished(summary) => {
                finished = Some(summary);
                break;
            }
        }
    }

    drop(guard);

    let summary = finished.unwrap_or_else(|| {
        error!("Run {} ended without a summary", run_id);
        let mut summary = RunSummary::new(run_id, total);
        summary.aborted = true;
        summary.finished_at = Some(chrono::Utc::now());
        summary
    });

    sink.run_finished(&summary);
    sink.notify(Notice::info("Retrieval finished", completion_message(&summary)));
}

fn completion_message(summary: &RunSummary) -> String {
    let mut message = format!(
        "{} of {} key(s) downloaded, {} not found.",
        summary.downloaded, summary.total, summary.not_found
    );
    if summary.aborted {
        message.push_str(&format!(
            " The run stopped early after {} key(s).",
            summary.attempted
        ));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_message() {
        let mut summary = RunSummary::new("run", 3);
        summary.attempted = 3;
        summary.downloaded = 2;
        summary.not_found = 1;
        assert_eq!(completion_message(&summary), "2 of 3 key(s) downloaded, 1 not found.");

        summary.aborted = true;
        summary.attempted = 2;
        assert!(completion_message(&summary).ends_with("stopped early after 2 key(s)."));
    }

    #[test]
    fn test_load_outcome_serializes_tagged() {
        let json = serde_json::to_value(LoadOutcome::Loaded { count: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({ "outcome": "loaded", "count": 2 }));
    }
}
