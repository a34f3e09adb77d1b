//! Infrastructure layer: configuration, logging, file locations, spreadsheet
//! reading and the WebDriver browser backend.

pub mod chrome;
pub mod config;
pub mod logging;
pub mod paths;
pub mod spreadsheet;
pub mod webdriver;

// Re-export commonly used items
pub use chrome::ChromeLauncher;
pub use config::{AppConfig, ConfigManager};
pub use logging::{get_log_directory, init_logging, init_logging_with_config};
pub use spreadsheet::{SpreadsheetError, Table, read_table};
pub use webdriver::{WebDriverClient, WebDriverSession};
