//! Spreadsheet selection and key table commands

use std::path::PathBuf;
use tauri::{AppHandle, State};
use tauri_plugin_dialog::DialogExt;
use tokio::sync::oneshot;
use tracing::info;

use crate::application::controller::{self, LoadOutcome};
use crate::application::events::TauriUiSink;
use crate::application::state::AppState;
use crate::domain::status::KeyRow;
use crate::infrastructure::spreadsheet::SUPPORTED_EXTENSIONS;

/// Open the native file picker and load the chosen spreadsheet.
///
/// Returns `None` when the operator cancels the dialog.
#[tauri::command]
pub async fn pick_spreadsheet(app: AppHandle, state: State<'_, AppState>) -> Result<Option<LoadOutcome>, String> {
    let (tx, rx) = oneshot::channel();
    app.dialog()
        .file()
        .set_title("Select spreadsheet")
        .add_filter("Spreadsheets", SUPPORTED_EXTENSIONS)
        .pick_file(move |picked| {
            let _ = tx.send(picked);
        });

    let Some(picked) = rx.await.map_err(|e| format!("File dialog closed unexpectedly: {e}"))? else {
        info!("Spreadsheet selection cancelled");
        return Ok(None);
    };
    let path = picked
        .into_path()
        .map_err(|e| format!("Unsupported file location: {e}"))?;

    let sink = TauriUiSink::new(app);
    Ok(Some(controller::load_spreadsheet(&state, &sink, &path).await))
}

/// Load a spreadsheet from a known path
#[tauri::command]
pub async fn load_spreadsheet(
    app: AppHandle,
    state: State<'_, AppState>,
    path: String,
) -> Result<LoadOutcome, String> {
    let sink = TauriUiSink::new(app);
    Ok(controller::load_spreadsheet(&state, &sink, &PathBuf::from(path)).await)
}

#[tauri::command]
pub async fn list_keys(state: State<'_, AppState>) -> Result<Vec<KeyRow>, String> {
    Ok(state.rows().await)
}
