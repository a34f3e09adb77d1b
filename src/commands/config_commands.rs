//! Configuration commands for Tauri IPC
//!
//! The window reads settings from the backend only; the file on disk is the
//! single source of truth.

use tauri::State;

use crate::application::state::AppState;
use crate::infrastructure::config::AppConfig;

#[tauri::command]
pub async fn get_config(state: State<'_, AppState>) -> Result<AppConfig, String> {
    Ok(state.config().await)
}
