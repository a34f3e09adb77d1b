//! Application state management for Tauri
//!
//! One [`AppState`] is managed by Tauri and cloned into background tasks.
//! The key table is written only by the load path and by the run pump; both
//! hold the run flag while they do.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::application::run_state::{RunGuard, RunState};
use crate::domain::automation::BrowserLauncher;
use crate::domain::key::DocumentKey;
use crate::domain::status::{ItemStatus, KeyRow, StatusUpdate};
use crate::infrastructure::config::AppConfig;

/// Global application state managed by Tauri
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<RwLock<AppConfig>>,

    /// Loaded keys and their statuses, in spreadsheet order
    rows: Arc<RwLock<Vec<KeyRow>>>,

    run_state: RunState,

    /// Opens one browser session per run
    launcher: Arc<dyn BrowserLauncher>,

    /// Where the browser saves downloaded files
    output_dir: PathBuf,
}

impl AppState {
    pub fn new(config: AppConfig, launcher: Arc<dyn BrowserLauncher>, output_dir: PathBuf) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            rows: Arc::new(RwLock::new(Vec::new())),
            run_state: RunState::new(),
            launcher,
            output_dir,
        }
    }

    pub fn launcher(&self) -> Arc<dyn BrowserLauncher> {
        Arc::clone(&self.launcher)
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub async fn config(&self) -> AppConfig {
        self.config.read().await.clone()
    }

    /// Replace the key table with freshly loaded keys, all Waiting
    pub async fn replace_keys(&self, keys: Vec<DocumentKey>) {
        let rows: Vec<KeyRow> = keys
            .into_iter()
            .enumerate()
            .map(|(index, key)| KeyRow::new(index, key))
            .collect();
        info!("Key table holds {} key(s)", rows.len());
        *self.rows.write().await = rows;
    }

    pub async fn clear_keys(&self) {
        self.rows.write().await.clear();
        info!("Key table cleared");
    }

    pub async fn rows(&self) -> Vec<KeyRow> {
        self.rows.read().await.clone()
    }

    pub async fn keys(&self) -> Vec<DocumentKey> {
        self.rows.read().await.iter().map(|row| row.key.clone()).collect()
    }

    pub async fn key_count(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Put every row back to Waiting before a new run
    pub async fn reset_statuses(&self) {
        for row in self.rows.write().await.iter_mut() {
            row.reset();
        }
    }

    /// Apply a status update to its row. Returns whether the row changed.
    pub async fn apply_status(&self, update: &StatusUpdate) -> bool {
        let mut rows = self.rows.write().await;
        let Some(row) = rows.get_mut(update.index).filter(|row| row.key == update.key) else {
            debug!("Status update for unknown row {} ignored", update.index);
            return false;
        };
        let applied = row.advance(update.status, update.message.clone());
        if !applied {
            debug!(
                "Ignored transition {} -> {} for row {}",
                row.status, update.status, update.index
            );
        }
        applied
    }

    pub async fn status_of(&self, index: usize) -> Option<ItemStatus> {
        self.rows.read().await.get(index).map(|row| row.status)
    }

    pub fn try_begin_run(&self) -> Option<RunGuard> {
        self.run_state.try_begin()
    }

    pub fn is_running(&self) -> bool {
        self.run_state.is_running()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::automation::{AutomationError, AutomationResult, BrowserSession};
    use async_trait::async_trait;

    struct NoBrowser;

    #[async_trait]
    impl BrowserLauncher for NoBrowser {
        async fn launch(&self) -> AutomationResult<Box<dyn BrowserSession>> {
            Err(AutomationError::SessionNotCreated("no browser in tests".into()))
        }
    }

    fn state() -> AppState {
        AppState::new(AppConfig::default(), Arc::new(NoBrowser), PathBuf::from("downloaded-xml"))
    }

    fn key(c: char) -> DocumentKey {
        DocumentKey::parse(&std::iter::repeat_n(c, 44).collect::<String>()).unwrap()
    }

    fn update(index: usize, key: DocumentKey, status: ItemStatus) -> StatusUpdate {
        StatusUpdate {
            index,
            key,
            status,
            message: None,
        }
    }

    #[tokio::test]
    async fn test_replace_keys_starts_waiting() {
        let state = state();
        state.replace_keys(vec![key('1'), key('2')]).await;

        let rows = state.rows().await;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|row| row.status == ItemStatus::Waiting));
        assert_eq!(rows[1].index, 1);
    }

    #[tokio::test]
    async fn test_apply_status_follows_transitions() {
        let state = state();
        state.replace_keys(vec![key('1')]).await;

        assert!(!state.apply_status(&update(0, key('1'), ItemStatus::Downloaded)).await);
        assert!(state.apply_status(&update(0, key('1'), ItemStatus::Processing)).await);
        assert!(state.apply_status(&update(0, key('1'), ItemStatus::NotFound)).await);
        assert_eq!(state.status_of(0).await, Some(ItemStatus::NotFound));
    }

    #[tokio::test]
    async fn test_apply_status_ignores_mismatched_row() {
        let state = state();
        state.replace_keys(vec![key('1')]).await;

        assert!(!state.apply_status(&update(0, key('2'), ItemStatus::Processing)).await);
        assert!(!state.apply_status(&update(5, key('1'), ItemStatus::Processing)).await);
    }

    #[tokio::test]
    async fn test_reset_statuses() {
        let state = state();
        state.replace_keys(vec![key('1')]).await;
        state.apply_status(&update(0, key('1'), ItemStatus::Processing)).await;

        state.reset_statuses().await;
        assert_eq!(state.status_of(0).await, Some(ItemStatus::Waiting));
    }
}
