//! Output module for writing scrape results
//!
//! This module handles:
//! - Serializing records as a pretty-printed JSON array
//! - Writing to standard output or to a file
//! - A one-line human summary of a finished run

use crate::crawler::{ScrapeOutcome, StopReason};
use crate::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Writes items as a pretty-printed JSON array followed by a newline
///
/// Unset optional fields appear as `null`.
pub fn write_json<W: Write, T: Serialize>(writer: &mut W, items: &[T]) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, items)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Writes items to `path`, or to standard output when no path is given
///
/// # Arguments
///
/// * `items` - Records to serialize
/// * `path` - Destination file; created or truncated
///
/// # Returns
///
/// * `Ok(())` - Output written
/// * `Err(ScrapeError)` - Serialization or I/O failure
pub fn write_output<T: Serialize>(items: &[T], path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path)?);
            write_json(&mut writer, items)?;
            tracing::info!("Wrote {} records to {}", items.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut writer = stdout.lock();
            write_json(&mut writer, items)?;
        }
    }
    Ok(())
}

/// One-line description of how a run ended
pub fn summarize(outcome: &ScrapeOutcome) -> String {
    let ending = match &outcome.stop_reason {
        StopReason::PageCap => "page cap reached".to_string(),
        StopReason::Exhausted => "no more results".to_string(),
        StopReason::PageFailed { page, reason } => {
            format!("stopped early at page {}: {}", page, reason)
        }
        StopReason::Cancelled => "cancelled".to_string(),
    };
    format!(
        "{} records from {} pages ({})",
        outcome.records.len(),
        outcome.pages_fetched,
        ending
    )
}
