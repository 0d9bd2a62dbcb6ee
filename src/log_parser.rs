use std::fs;
use std::ops::Range;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::error::{ChatReelError, ChatReelResult};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Byte window holding `YYYY-MM-DD HH:MM:SS` right after the opening bracket.
const DATE_FIELD: Range<usize> = 1..20;

/// One chat message. Every field is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatRecord {
    timestamp: NaiveDateTime,
    speaker: String,
    message: String,
}

impl ChatRecord {
    /// Returns `None` when speaker or message is blank after trimming.
    pub fn new(
        timestamp: NaiveDateTime,
        speaker: impl AsRef<str>,
        message: impl AsRef<str>,
    ) -> Option<Self> {
        let speaker = speaker.as_ref().trim();
        let message = message.as_ref().trim();
        if speaker.is_empty() || message.is_empty() {
            return None;
        }
        Some(Self {
            timestamp,
            speaker: speaker.to_owned(),
            message: message.to_owned(),
        })
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn speaker(&self) -> &str {
        &self.speaker
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Why a transcript line produced no record. Never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineSkip {
    Blank,
    MissingTimestamp,
    BadTimestamp,
    MissingSpeaker,
    MissingMessage,
}

/// Lenient form for user input: surrounding whitespace is ignored.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).ok()
}

/// Strict form for the transcript date field: exactly `YYYY-MM-DD HH:MM:SS`,
/// zero-padded, no surrounding whitespace.
fn parse_date_field(field: &str) -> Option<NaiveDateTime> {
    let shaped = field.len() == DATE_FIELD.len()
        && field.bytes().enumerate().all(|(idx, byte)| match idx {
            4 | 7 => byte == b'-',
            10 => byte == b' ',
            13 | 16 => byte == b':',
            _ => byte.is_ascii_digit(),
        });
    if !shaped {
        return None;
    }
    NaiveDateTime::parse_from_str(field, TIMESTAMP_FORMAT).ok()
}

/// Parses `[YYYY-MM-DD HH:MM:SS] speaker: message`. A zone tag before the
/// closing bracket (`[2019-12-29 00:00:04 UTC]`) is accepted and ignored.
pub fn parse_line(line: &str) -> Result<ChatRecord, LineSkip> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(LineSkip::Blank);
    }

    let date = line.get(DATE_FIELD).ok_or(LineSkip::MissingTimestamp)?;
    if date.trim().is_empty() {
        return Err(LineSkip::MissingTimestamp);
    }
    let timestamp = parse_date_field(date).ok_or(LineSkip::BadTimestamp)?;

    let after_date = &line[DATE_FIELD.end..];
    let close = after_date.find(']').ok_or(LineSkip::MissingSpeaker)?;
    let tail = &after_date[close + 1..];
    let colon = tail.find(':').ok_or(LineSkip::MissingSpeaker)?;

    let speaker = tail[..colon].trim();
    if speaker.is_empty() {
        return Err(LineSkip::MissingSpeaker);
    }
    let message = tail[colon + 1..].trim();
    if message.is_empty() {
        return Err(LineSkip::MissingMessage);
    }

    ChatRecord::new(timestamp, speaker, message).ok_or(LineSkip::MissingMessage)
}

/// Parses every line, silently dropping the ones that do not form a record.
/// Line order is preserved; nothing is sorted.
pub fn parse_transcript(raw: &str) -> Vec<ChatRecord> {
    let mut records = Vec::new();
    let mut skipped = 0usize;

    for (idx, line) in raw.lines().enumerate() {
        match parse_line(line) {
            Ok(record) => records.push(record),
            Err(LineSkip::Blank) => skipped += 1,
            Err(reason) => {
                skipped += 1;
                tracing::debug!(line = idx + 1, ?reason, "skipping transcript line");
            }
        }
    }

    if skipped > 0 {
        tracing::debug!(kept = records.len(), skipped, "transcript parsed");
    }
    records
}

pub fn read_transcript(path: &Path) -> ChatReelResult<Vec<ChatRecord>> {
    let bytes = fs::read(path).map_err(|error| ChatReelError::resource(path, error))?;
    let records = parse_transcript(&String::from_utf8_lossy(&bytes));
    tracing::info!(path = %path.display(), records = records.len(), "read transcript");
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(raw: &str) -> NaiveDateTime {
        parse_timestamp(raw).unwrap()
    }

    #[test]
    fn well_formed_line_yields_one_record() {
        let record = parse_line("[2021-05-01 12:00:00] alice: hi there").unwrap();
        assert_eq!(record.timestamp(), at("2021-05-01 12:00:00"));
        assert_eq!(record.speaker(), "alice");
        assert_eq!(record.message(), "hi there");
    }

    #[test]
    fn zone_tag_and_crlf_are_tolerated() {
        let record = parse_line("[2019-12-29 00:00:04 UTC] jerma: hello: world\r\n").unwrap();
        assert_eq!(record.timestamp(), at("2019-12-29 00:00:04"));
        assert_eq!(record.speaker(), "jerma");
        assert_eq!(record.message(), "hello: world");
    }

    #[test]
    fn malformed_lines_are_skipped_with_a_reason() {
        assert_eq!(parse_line("").unwrap_err(), LineSkip::Blank);
        assert_eq!(parse_line("   ").unwrap_err(), LineSkip::Blank);
        assert_eq!(parse_line("[short] a: b").unwrap_err(), LineSkip::MissingTimestamp);
        assert_eq!(
            parse_line("[2021-13-01 12:00:00] alice: hi").unwrap_err(),
            LineSkip::BadTimestamp
        );
        assert_eq!(
            parse_line("[2021/05/01 12:00:00] alice: hi").unwrap_err(),
            LineSkip::BadTimestamp
        );
        assert_eq!(
            parse_line("[2021-05-01 12:00:00] no colon here").unwrap_err(),
            LineSkip::MissingSpeaker
        );
        assert_eq!(
            parse_line("[2021-05-01 12:00:00] : orphan").unwrap_err(),
            LineSkip::MissingSpeaker
        );
        assert_eq!(
            parse_line("[2021-05-01 12:00:00] alice:   ").unwrap_err(),
            LineSkip::MissingMessage
        );
        assert_eq!(
            parse_line("[2021-05-01 12:00:00 alice: hi").unwrap_err(),
            LineSkip::MissingSpeaker
        );
    }

    #[test]
    fn date_field_must_be_zero_padded_and_unpadded_by_spaces() {
        assert_eq!(
            parse_line("[2021-05-01 1:00:00 ] alice: hi").unwrap_err(),
            LineSkip::BadTimestamp
        );
        assert_eq!(
            parse_line("[ 2021-05-01 12:00:0] alice: hi").unwrap_err(),
            LineSkip::BadTimestamp
        );
        assert_eq!(
            parse_line("[2021-5-01 12:00:00 ] alice: hi").unwrap_err(),
            LineSkip::BadTimestamp
        );
        assert_eq!(at(" 2021-05-01 01:00:00 "), at("2021-05-01 01:00:00"));
    }

    #[test]
    fn multibyte_text_never_panics() {
        assert!(parse_line("[ünïcödé ünïcödé ünï] a: b").is_err());
        let record = parse_line("[2021-05-01 12:00:00] zoë: ça va 👋").unwrap();
        assert_eq!(record.speaker(), "zoë");
        assert_eq!(record.message(), "ça va 👋");
    }

    #[test]
    fn transcript_keeps_line_order_including_first_line() {
        let raw = "[2021-05-01 12:00:02] bob: second\n\
                   \n\
                   garbage\n\
                   [2021-05-01 12:00:01] alice: first\n";
        let records = parse_transcript(raw);
        let speakers = records.iter().map(ChatRecord::speaker).collect::<Vec<_>>();
        assert_eq!(speakers, vec!["bob", "alice"]);
    }

    #[test]
    fn record_constructor_enforces_non_empty_fields() {
        let ts = at("2021-05-01 12:00:00");
        assert!(ChatRecord::new(ts, "", "msg").is_none());
        assert!(ChatRecord::new(ts, "alice", "  ").is_none());
        assert!(ChatRecord::new(ts, " alice ", " msg ").is_some());
    }

    #[test]
    fn missing_file_is_a_resource_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_transcript(&dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, ChatReelError::Resource { .. }), "{err}");
    }
}
