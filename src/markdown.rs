//! Reading hand-edited chapter tables back into records.
//!
//! The markdown written by [`crate::markdown_encoder::MarkdownEncoder`] is the file people
//! correct by hand, so on read the `Start Time` column wins and `seconds` is re-derived from it.

use tracing::warn;

use crate::report::{ChapterRecord, ChapterStatus, format_hms};
use crate::{Error, Result};

const TABLE_HEADER: &str = "| Chapter | Start Time";

/// Parse `HH:MM:SS` or `MM:SS` (seconds may be fractional) into seconds.
pub fn parse_timestamp(text: &str) -> Result<f64> {
    let parts: Vec<&str> = text.trim().split(':').map(str::trim).collect();
    let bad = || Error::msg(format!("invalid timestamp: {text:?}"));

    let whole = |s: &str| s.parse::<u64>().map(|v| v as f64).map_err(|_| bad());
    let secs = |s: &str| {
        s.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && (0.0..60.0).contains(v))
            .ok_or_else(bad)
    };

    match parts.as_slice() {
        [h, m, s] => {
            let m = whole(m)?;
            if m >= 60.0 {
                return Err(bad());
            }
            Ok(whole(h)? * 3600.0 + m * 60.0 + secs(s)?)
        }
        [m, s] => Ok(whole(m)? * 60.0 + secs(s)?),
        _ => Err(bad()),
    }
}

/// Read the chapter table out of a markdown document.
///
/// Rows before the table, the header and the separator are skipped. Rows with an empty
/// start time are kept as unconfirmed; rows with an unreadable one are kept unconfirmed too,
/// with a warning, so one typo does not lose the rest of the table.
pub fn parse_table(markdown: &str) -> Result<Vec<ChapterRecord>> {
    let mut records = Vec::new();
    let mut in_table = false;

    for line in markdown.lines() {
        let line = line.trim();
        if !line.starts_with('|') {
            continue;
        }
        if line.contains("Start Time") || is_separator(line) {
            in_table = true;
            continue;
        }
        if !in_table {
            continue;
        }

        let cells = cells(line);
        let Some(title) = cells.first().filter(|t| !t.is_empty()) else {
            continue;
        };
        let start = cells.get(1).copied().unwrap_or("");

        let record = if start.is_empty() {
            unconfirmed(title)
        } else {
            match parse_timestamp(start) {
                Ok(seconds) => ChapterRecord {
                    chapter_id: None,
                    title: (*title).to_owned(),
                    start_time: format_hms(seconds),
                    seconds: Some(seconds),
                    status: ChapterStatus::Confirmed,
                },
                Err(err) => {
                    warn!(title = %title, error = %err, "ignoring unreadable start time");
                    unconfirmed(title)
                }
            }
        };
        records.push(record);
    }

    if records.is_empty() {
        return Err(Error::msg("no chapter rows found in markdown table"));
    }
    Ok(records)
}

/// Everything before the chapter table, so a rewrite can keep hand-written metadata.
///
/// Returns `None` when the document has no table.
pub fn preamble(markdown: &str) -> Option<&str> {
    markdown.find(TABLE_HEADER).map(|at| &markdown[..at])
}

fn unconfirmed(title: &str) -> ChapterRecord {
    ChapterRecord {
        chapter_id: None,
        title: title.to_owned(),
        start_time: String::new(),
        seconds: None,
        status: ChapterStatus::Failed,
    }
}

fn cells(line: &str) -> Vec<&str> {
    let inner = line.trim_start_matches('|');
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(str::trim).collect()
}

fn is_separator(line: &str) -> bool {
    line.contains("---") && line.chars().all(|c| matches!(c, '|' | '-' | ':' | ' '))
}
