//! Transient cycling
//!
//! This module holds the cycling engine: the candidate ring, the two
//! candidate-construction heuristics, the command-variant wrapper, and the
//! cycling session itself.

pub mod config;
pub mod console;
pub mod engine;
pub mod ring;
pub mod session;
pub mod siblings;
pub mod variants;
