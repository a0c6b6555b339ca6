//! Shared test utilities
//!
//! Common helpers used across test modules. Only compiled in test builds.

use crate::log::jsonl::SelectionRecord;
use chrono::Utc;

/// Create a minimal `SelectionRecord` for testing with sensible defaults.
///
/// Marks the selection as a plain document pick: not cycled, no net moves,
/// no escalation.
#[must_use]
pub fn make_test_record(command: &str, target: &str) -> SelectionRecord {
    SelectionRecord {
        timestamp: Utc::now(),
        command: command.to_string(),
        target: target.to_string(),
        kind: "document".to_string(),
        cycled: false,
        net_moves: 0,
        escalation: 1,
    }
}
