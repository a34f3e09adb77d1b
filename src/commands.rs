//! Tauri commands
//!
//! Thin wrappers over the application layer. Errors cross the IPC boundary
//! as plain strings.

pub mod config_commands;
pub mod key_commands;
pub mod retrieval_commands;

// Re-export all commands
pub use config_commands::*;
pub use key_commands::*;
pub use retrieval_commands::*;
