//! JSONL file I/O for provider feeds and outboxes.
//!
//! Each line is one complete JSON record.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{BugError, Result};

/// Load every record from a JSONL file, skipping blank lines.
///
/// # Errors
///
/// Returns `Io` if the file cannot be read, or `JsonlParse` if any line is invalid.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let record = serde_json::from_str(trimmed).map_err(|e| BugError::JsonlParse {
            path: path.to_path_buf(),
            line: line_num + 1,
            reason: e.to_string(),
        })?;
        records.push(record);
    }

    tracing::debug!(count = records.len(), path = %path.display(), "Loaded JSONL records");
    Ok(records)
}

/// Replace the file with `records`, using write-to-temp + rename.
///
/// # Errors
///
/// Returns `Io` if the file cannot be written.
pub fn save<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let tmp_path = path.with_extension("jsonl.tmp");
    let mut file = fs::File::create(&tmp_path)?;

    for record in records {
        let json = serde_json::to_string(record)?;
        writeln!(file, "{json}")?;
    }

    file.flush()?;
    drop(file);

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Append records to the end of the file, creating it if needed.
///
/// # Errors
///
/// Returns `Io` if the file cannot be opened or written.
pub fn append<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    for record in records {
        let json = serde_json::to_string(record)?;
        writeln!(file, "{json}")?;
    }
    file.flush()?;
    Ok(())
}
