//! Application layer - key loading, the retrieval loop and run control
//!
//! Coordinates the domain types with the infrastructure backends and exposes
//! the operations the Tauri commands call.

pub mod controller;
pub mod events;
pub mod key_loader;
pub mod retrieval;
pub mod run_state;
pub mod state;

// Re-export commonly used items
pub use controller::{LoadOutcome, RunHandle, StartError, load_spreadsheet, start_retrieval};
pub use events::{Notice, NoticeLevel, RunEvent, TauriUiSink, UiSink};
pub use key_loader::{KeyLoadError, KeyLoader};
pub use retrieval::{RetrievalError, RetrievalPlan, execute_run};
pub use run_state::{RunGuard, RunState};
pub use state::AppState;
