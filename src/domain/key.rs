//! Document key value object and key-column selection
//!
//! A key is the 44-character NF-e access key typed into the portal's lookup
//! form. Only the length is checked; the check digit is not verified.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Exact length of a document key after trimming
pub const KEY_LENGTH: usize = 44;

/// A trimmed, 44-character document key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKey(String);

impl DocumentKey {
    /// Parse a raw cell value, trimming surrounding whitespace
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.chars().count() == KEY_LENGTH {
            Some(Self(trimmed.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for DocumentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<DocumentKey> for String {
    fn from(key: DocumentKey) -> Self {
        key.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The column a key list was taken from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyColumn {
    /// Zero-based position of the column in the sheet
    pub index: usize,
    pub keys: Vec<DocumentKey>,
}

/// Pick the key list out of a set of text columns.
///
/// A column qualifies when it has at least one non-blank value and every
/// non-blank value is a valid [`DocumentKey`]. The first qualifying column in
/// column order wins; later columns are never inspected.
pub fn select_key_column<C, V>(columns: C) -> Option<KeyColumn>
where
    C: IntoIterator<Item = V>,
    V: IntoIterator<Item = Option<String>>,
{
    columns.into_iter().enumerate().find_map(|(index, column)| {
        let mut keys = Vec::new();
        for value in column.into_iter().flatten() {
            if value.trim().is_empty() {
                continue;
            }
            keys.push(DocumentKey::parse(&value)?);
        }
        (!keys.is_empty()).then_some(KeyColumn { index, keys })
    })
}
