//! Logging and observability
//!
//! This module provides the append-only JSONL journal of committed
//! selections that the diagnostics command analyzes.

pub mod jsonl;

pub use jsonl::{SelectionLogger, SelectionRecord};
