//! Retrieval run commands

use serde::Serialize;
use std::sync::Arc;
use tauri::{AppHandle, State};
use tauri_plugin_opener::OpenerExt;
use tracing::info;

use crate::application::controller;
use crate::application::events::TauriUiSink;
use crate::application::state::AppState;
use crate::domain::status::KeyRow;
use crate::infrastructure::paths::ensure_output_dir;

/// What the window needs to redraw itself
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalSnapshot {
    pub running: bool,
    pub rows: Vec<KeyRow>,
}

/// Start a run over the loaded keys and return its id
#[tauri::command]
pub async fn start_retrieval(app: AppHandle, state: State<'_, AppState>) -> Result<String, String> {
    let sink = Arc::new(TauriUiSink::new(app));
    let handle = controller::start_retrieval(&state, sink)
        .await
        .map_err(|e| e.to_string())?;
    Ok(handle.run_id)
}

#[tauri::command]
pub async fn retrieval_snapshot(state: State<'_, AppState>) -> Result<RetrievalSnapshot, String> {
    Ok(RetrievalSnapshot {
        running: state.is_running(),
        rows: state.rows().await,
    })
}

/// Show the download folder in the system file manager
#[tauri::command]
pub async fn open_output_dir(app: AppHandle, state: State<'_, AppState>) -> Result<String, String> {
    let dir = ensure_output_dir(state.output_dir()).map_err(|e| e.to_string())?;
    let dir = dir.to_string_lossy().into_owned();
    info!("Opening output folder {}", dir);
    app.opener()
        .open_path(dir.clone(), None::<&str>)
        .map_err(|e| format!("Failed to open {dir}: {e}"))?;
    Ok(dir)
}
