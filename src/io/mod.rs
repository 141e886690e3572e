//! I/O utilities for file processing and data handling.
//!
//! This module provides NDJSON reading and writing, used to export and
//! re-load giveaway participant lists.

pub mod ndjson;

// Re-export commonly used types and functions
pub use ndjson::{read_participants, write_participants, ParticipantFileError, TimestampedEntry};
