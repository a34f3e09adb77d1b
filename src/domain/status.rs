//! Per-key retrieval status and the rows rendered in the key table

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::key::DocumentKey;

/// Status of a single key within a run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Loaded, not yet picked up by the loop
    #[default]
    Waiting,
    /// The loop is submitting this key
    Processing,
    /// The download control was activated
    Downloaded,
    /// The download control never became available
    NotFound,
}

impl ItemStatus {
    /// Waiting -> Processing -> {Downloaded, NotFound}; nothing else.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Waiting, Self::Processing)
                | (Self::Processing, Self::Downloaded | Self::NotFound)
        )
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Downloaded | Self::NotFound)
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Waiting => write!(f, "Waiting"),
            Self::Processing => write!(f, "Processing"),
            Self::Downloaded => write!(f, "Downloaded"),
            Self::NotFound => write!(f, "Not found"),
        }
    }
}

/// One line of the key table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyRow {
    pub index: usize,
    pub key: DocumentKey,
    pub status: ItemStatus,
    pub message: Option<String>,
}

impl KeyRow {
    pub const fn new(index: usize, key: DocumentKey) -> Self {
        Self {
            index,
            key,
            status: ItemStatus::Waiting,
            message: None,
        }
    }

    /// Move to `next` if the transition is legal. Returns whether it applied.
    pub fn advance(&mut self, next: ItemStatus, message: Option<String>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.message = message;
        true
    }

    pub fn reset(&mut self) {
        self.status = ItemStatus::Waiting;
        self.message = None;
    }
}

/// Status change produced by the retrieval loop for one key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusUpdate {
    pub index: usize,
    pub key: DocumentKey,
    pub status: ItemStatus,
    pub message: Option<String>,
}

/// Outcome counters for a finished run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub total: usize,
    pub attempted: usize,
    pub downloaded: usize,
    pub not_found: usize,
    pub aborted: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>, total: usize) -> Self {
        Self {
            run_id: run_id.into(),
            total,
            attempted: 0,
            downloaded: 0,
            not_found: 0,
            aborted: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, status: ItemStatus) {
        match status {
            ItemStatus::Downloaded => self.downloaded += 1,
            ItemStatus::NotFound => self.not_found += 1,
            ItemStatus::Waiting | ItemStatus::Processing => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample_key() -> DocumentKey {
        DocumentKey::parse("35240112345678000190550010000012341000012345").unwrap()
    }

    #[rstest]
    #[case(ItemStatus::Waiting, ItemStatus::Processing, true)]
    #[case(ItemStatus::Processing, ItemStatus::Downloaded, true)]
    #[case(ItemStatus::Processing, ItemStatus::NotFound, true)]
    #[case(ItemStatus::Waiting, ItemStatus::Downloaded, false)]
    #[case(ItemStatus::Downloaded, ItemStatus::Processing, false)]
    #[case(ItemStatus::NotFound, ItemStatus::Waiting, false)]
    #[case(ItemStatus::Downloaded, ItemStatus::NotFound, false)]
    fn test_transitions(#[case] from: ItemStatus, #[case] to: ItemStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn test_row_never_reverts() {
        let mut row = KeyRow::new(0, sample_key());
        assert!(row.advance(ItemStatus::Processing, None));
        assert!(row.advance(ItemStatus::Downloaded, None));
        assert!(!row.advance(ItemStatus::Processing, None));
        assert_eq!(row.status, ItemStatus::Downloaded);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ItemStatus::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }
}
