//! Dated transcript files (`YYYY-MM-DD.txt`) and the records they hold for
//! one time range. Streams that cross midnight span two files; they are read
//! in date order so the concatenated records stay chronological.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;
use walkdir::WalkDir;

use crate::error::{ChatReelError, ChatReelResult};
use crate::log_parser::{read_transcript, ChatRecord};
use crate::timeline::Timeline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedLog {
    pub date: NaiveDate,
    pub path: PathBuf,
}

fn dated_file_name(name: &str) -> Option<NaiveDate> {
    static DATED_LOG_RE: OnceLock<Regex> = OnceLock::new();
    let re = DATED_LOG_RE.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2})\.txt$").expect("dated log regex should compile")
    });
    let captures = re.captures(name)?;
    NaiveDate::parse_from_str(&captures[1], "%Y-%m-%d").ok()
}

/// Every `YYYY-MM-DD.txt` below `dir`, oldest first.
pub fn discover_logs(dir: &Path) -> ChatReelResult<Vec<DatedLog>> {
    let mut logs = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|error| {
            let path = error.path().unwrap_or(dir).to_path_buf();
            ChatReelError::resource(path, error.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(date) = entry.file_name().to_str().and_then(dated_file_name) else {
            continue;
        };
        logs.push(DatedLog {
            date,
            path: entry.into_path(),
        });
    }
    logs.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.path.cmp(&b.path)));
    Ok(logs)
}

/// Logs whose day falls between the day of `start` and `end` rounded up to
/// the next midnight.
pub fn select_logs(logs: &[DatedLog], start: NaiveDateTime, end: NaiveDateTime) -> Vec<DatedLog> {
    let first = start.date();
    let last = if end.time().num_seconds_from_midnight() == 0 && end.nanosecond() == 0 {
        end.date()
    } else {
        end.date().succ_opt().unwrap_or(end.date())
    };
    logs.iter()
        .filter(|log| first <= log.date && log.date <= last)
        .cloned()
        .collect()
}

/// Records in `[start, end)` from the dated logs under `dir`.
pub fn load_range(
    dir: &Path,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> ChatReelResult<Vec<ChatRecord>> {
    let timeline = Timeline::new(start, end)?;
    let selected = select_logs(&discover_logs(dir)?, start, end);
    if selected.is_empty() {
        tracing::warn!(dir = %dir.display(), %start, %end, "no dated logs cover the requested range");
    }

    let mut records = Vec::new();
    for log in &selected {
        let day = read_transcript(&log.path)?;
        records.extend(day.into_iter().filter(|r| timeline.contains(r.timestamp())));
    }
    tracing::info!(
        files = selected.len(),
        records = records.len(),
        "loaded records for range"
    );
    Ok(records)
}
