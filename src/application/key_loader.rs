//! Key loading: spreadsheet file -> ordered key list

use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::key::{DocumentKey, KEY_LENGTH, KeyColumn, select_key_column};
use crate::infrastructure::spreadsheet::{SpreadsheetError, read_table};

#[derive(Error, Debug)]
pub enum KeyLoadError {
    /// The file could not be opened or parsed at all
    #[error("Failed to read the spreadsheet: {0}")]
    Unreadable(#[from] SpreadsheetError),

    /// The file was read but no column holds only document keys
    #[error("No column containing only {KEY_LENGTH}-character keys was found")]
    NoValidColumn,
}

/// Reads spreadsheets and extracts the key column
#[derive(Debug, Clone, Copy)]
pub struct KeyLoader {
    has_header_row: bool,
}

impl Default for KeyLoader {
    fn default() -> Self {
        Self { has_header_row: true }
    }
}

impl KeyLoader {
    pub const fn new(has_header_row: bool) -> Self {
        Self { has_header_row }
    }

    pub fn load(&self, path: &Path) -> Result<Vec<DocumentKey>, KeyLoadError> {
        let table = read_table(path, self.has_header_row)?;
        let column_count = table.columns.len();
        let headers = table.headers;

        match select_key_column(table.columns) {
            Some(KeyColumn { index, keys }) => {
                let title = headers.get(index).filter(|h| !h.is_empty()).map_or("<untitled>", String::as_str);
                info!(
                    "Loaded {} key(s) from column {} '{}' of {}",
                    keys.len(),
                    index + 1,
                    title,
                    path.display()
                );
                Ok(keys)
            }
            None => {
                warn!("No key column among {} column(s) of {}", column_count, path.display());
                Err(KeyLoadError::NoValidColumn)
            }
        }
    }
}
