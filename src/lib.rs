//! NF-e XML Fetcher - spreadsheet-driven document retrieval
//!
//! Loads 44-character NF-e access keys from a spreadsheet and drives a
//! browser through a lookup portal once per key, letting the browser save
//! each document's XML into a folder next to the executable.

// Module declarations
pub mod application;
pub mod commands;
pub mod domain;
pub mod infrastructure;
pub mod utils;

use std::sync::Arc;
use tracing::{error, info};

use crate::application::state::AppState;
use crate::infrastructure::chrome::ChromeLauncher;
use crate::infrastructure::config::{AppConfig, ConfigManager};
use crate::infrastructure::logging::{init_logging_with_config, log_system_info};
use crate::infrastructure::paths;

/// Read the configuration file, falling back to defaults when it cannot be
/// located or written. Runs before logging exists, so problems go to stderr.
async fn load_startup_config() -> AppConfig {
    let manager = match ConfigManager::new() {
        Ok(manager) => manager,
        Err(e) => {
            eprintln!("Config directory unavailable, using defaults: {e:#}");
            return AppConfig::default();
        }
    };
    manager.load_config().await.unwrap_or_else(|e| {
        eprintln!("Failed to load configuration, using defaults: {e:#}");
        AppConfig::default()
    })
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let config = tauri::async_runtime::block_on(load_startup_config());

    if let Err(e) = init_logging_with_config(&config.logging) {
        eprintln!("Failed to initialize logging: {e:#}");
    }
    log_system_info();

    let output_dir = paths::output_dir(&config.browser.output_dir_name);
    info!("Downloads go to {}", output_dir.display());
    if config.browser.driver_path.is_none() {
        info!("Using WebDriver at {}", config.browser.webdriver_url);
    }

    let launcher = Arc::new(ChromeLauncher::new(config.browser.clone(), output_dir.clone()));
    let state = AppState::new(config, launcher, output_dir);

    let result = tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .manage(state)
        .invoke_handler(tauri::generate_handler![
            commands::key_commands::pick_spreadsheet,
            commands::key_commands::load_spreadsheet,
            commands::key_commands::list_keys,
            commands::retrieval_commands::start_retrieval,
            commands::retrieval_commands::retrieval_snapshot,
            commands::retrieval_commands::open_output_dir,
            commands::config_commands::get_config,
        ])
        .run(tauri::generate_context!());

    if let Err(e) = result {
        error!("Error while running tauri application: {}", e);
        std::process::exit(1);
    }
}
