//! NDJSON (Newline Delimited JSON) file processing utilities.
//!
//! Participant snapshots are exported one JSON object per line so a giveaway
//! can be audited or re-drawn later.

use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use thiserror::Error;

use crate::address::{AddressValidator, Base58PubkeyValidator};
use crate::chat::{Participant, ParticipantRegistry};

/// Error types for file I/O and parsing operations.
#[derive(Error, Debug)]
pub enum ParticipantFileError {
    /// I/O error when reading or writing files
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error at line {line}: {source}")]
    JsonParse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Invalid file format
    #[error("Invalid file format: {reason}")]
    InvalidFormat { reason: String },

    /// Empty or invalid data
    #[error("No valid data found: {context}")]
    NoData { context: String },

    /// Generic error with context
    #[error("Error in {context}: {message}")]
    Generic { context: String, message: String },
}

impl ParticipantFileError {
    /// Create a new generic error with context
    pub fn generic(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generic {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create an invalid format error
    pub fn invalid_format(reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            reason: reason.into(),
        }
    }

    /// Create a no data error
    pub fn no_data(context: impl Into<String>) -> Self {
        Self::NoData {
            context: context.into(),
        }
    }
}

/// Generic entry in an NDJSON file with timestamp and data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEntry<T> {
    /// Unix timestamp when the entry was written
    pub timestamp: u64,
    /// The actual data payload
    pub data: T,
}

impl<T> TimestampedEntry<T> {
    pub fn now(data: T) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp().max(0) as u64,
            data,
        }
    }
}

/// Parse an NDJSON file.
///
/// Each non-empty line is deserialized into `T` and optionally validated.
///
/// # Arguments
/// * `path` - Path to the NDJSON file
/// * `validate_entry` - Optional validation function for each entry
///
/// # Returns
/// A vector of entries or a ParticipantFileError
pub fn parse_ndjson_file_generic<T, F>(
    path: impl AsRef<Path>,
    validate_entry: Option<F>,
) -> Result<Vec<T>, ParticipantFileError>
where
    T: for<'de> Deserialize<'de>,
    F: Fn(&T) -> Result<(), ParticipantFileError>,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        ParticipantFileError::generic(
            "opening file",
            format!("Failed to open '{}': {}", path.display(), e),
        )
    })?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_number, line) in reader.lines().enumerate() {
        let line = line?;

        // Skip empty lines
        if line.trim().is_empty() {
            continue;
        }

        let entry: T = serde_json::from_str(&line).map_err(|e| ParticipantFileError::JsonParse {
            line: line_number + 1,
            source: e,
        })?;

        if let Some(ref validator) = validate_entry {
            validator(&entry)?;
        }

        entries.push(entry);
    }

    if entries.is_empty() {
        return Err(ParticipantFileError::no_data(format!(
            "No valid entries found in file '{}'",
            path.display()
        )));
    }

    Ok(entries)
}

/// Parse an NDJSON file of timestamped entries, rejecting zero timestamps.
pub fn parse_ndjson_file_timestamped<T>(
    path: impl AsRef<Path>,
) -> Result<Vec<TimestampedEntry<T>>, ParticipantFileError>
where
    T: for<'de> Deserialize<'de>,
{
    parse_ndjson_file_generic(
        path,
        Some(|entry: &TimestampedEntry<T>| {
            if entry.timestamp == 0 {
                Err(ParticipantFileError::invalid_format("Invalid timestamp (zero)"))
            } else {
                Ok(())
            }
        }),
    )
}

/// Write entries as NDJSON, appending or truncating the file.
pub fn write_ndjson_file<T: Serialize>(
    path: impl AsRef<Path>,
    entries: &[T],
    append: bool,
) -> Result<usize, ParticipantFileError> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path.as_ref())?;
    let mut writer = BufWriter::new(file);

    for entry in entries {
        serde_json::to_writer(&mut writer, entry)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;

    Ok(entries.len())
}

/// Export a participant snapshot, replacing any previous export.
pub fn write_participants(
    path: impl AsRef<Path>,
    participants: &[Participant],
) -> Result<usize, ParticipantFileError> {
    let entries: Vec<_> = participants
        .iter()
        .cloned()
        .map(TimestampedEntry::now)
        .collect();
    let written = write_ndjson_file(path.as_ref(), &entries, false)?;

    tracing::debug!(
        path = %path.as_ref().display(),
        participants = written,
        "💾 Participants exported"
    );
    Ok(written)
}

/// Read an exported participant list.
///
/// Every address must be a valid payout address. An empty export yields an
/// empty list. Entries are deduplicated by address; the first entry for an
/// address wins.
pub fn read_participants(path: impl AsRef<Path>) -> Result<Vec<Participant>, ParticipantFileError> {
    let validator = Base58PubkeyValidator;
    let parsed = parse_ndjson_file_generic(
        path,
        Some(|entry: &TimestampedEntry<Participant>| {
            if entry.timestamp == 0 {
                return Err(ParticipantFileError::invalid_format("Invalid timestamp (zero)"));
            }
            if !validator.is_valid_address(entry.data.address.as_str()) {
                return Err(ParticipantFileError::invalid_format(format!(
                    "Invalid payout address '{}' for {}",
                    entry.data.address, entry.data.author_name
                )));
            }
            Ok(())
        }),
    );

    let entries = match parsed {
        Ok(entries) => entries,
        Err(ParticipantFileError::NoData { .. }) => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let registry: ParticipantRegistry = entries.into_iter().map(|entry| entry.data).collect();
    Ok(registry.snapshot())
}
