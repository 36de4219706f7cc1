//! Parsing of hashcat `--status-json` progress logs.
//!
//! A log mixes free-form output with one JSON status object per line. Only
//! lines that start with `{` and mention `time_start` are candidates; the
//! object is cut out with a brace-depth counter (no string awareness, the
//! status format never puts braces in strings) and decoded with serde.
//! Lines that fail to decode are skipped.
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::io::{InputError, line_text, open_lines};

const START_MARKER: &str = "time_start";

/// One status record: when the run started (epoch seconds), how many hashes
/// were recovered so far and how many guesses were tried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    pub start_time: f64,
    pub recovered: u64,
    pub progress: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("not a status line")]
    NotStatus,
    #[error("unbalanced braces")]
    Unbalanced,
    #[error("malformed status record: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct StatusRecord {
    time_start: f64,
    recovered_hashes: Vec<u64>,
    #[serde(default)]
    progress: Vec<u64>,
}

/// Slice from the first `{` up to its matching `}`.
pub fn extract_balanced(line: &str) -> Option<&str> {
    let start = line.find('{')?;
    let mut depth = 0usize;
    for (i, b) in line.bytes().enumerate().skip(start) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&line[start..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

pub fn parse_status_line(line: &str) -> Result<ProgressSnapshot, DecodeError> {
    let line = line.trim();
    if !line.starts_with('{') || !line.contains(START_MARKER) {
        return Err(DecodeError::NotStatus);
    }
    let json = extract_balanced(line).ok_or(DecodeError::Unbalanced)?;
    let record: StatusRecord = serde_json::from_str(json)?;
    Ok(ProgressSnapshot {
        start_time: record.time_start,
        recovered: record.recovered_hashes.first().copied().unwrap_or(0),
        progress: record.progress.first().copied().unwrap_or(0),
    })
}

/// Every decodable snapshot in `path`, in file order.
pub fn parse_status_log(path: &Path, mmap_threshold: u64) -> Result<Vec<ProgressSnapshot>, InputError> {
    let mut snapshots = Vec::new();
    for (idx, line) in open_lines(path, mmap_threshold)?.enumerate() {
        let line = line.map_err(|e| InputError::read(path, e))?;
        match parse_status_line(&line_text(&line)) {
            Ok(s) => snapshots.push(s),
            Err(DecodeError::NotStatus) => {}
            Err(e) => debug!("{}:{}: skipping status line: {}", path.display(), idx + 1, e),
        }
    }
    Ok(snapshots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn extracts_first_balanced_object() {
        assert_eq!(
            extract_balanced(r#"{"a":{"b":1}} trailing {"c":2}"#),
            Some(r#"{"a":{"b":1}}"#)
        );
        assert_eq!(extract_balanced("{\"a\":{"), None);
        assert_eq!(extract_balanced("no braces"), None);
    }

    #[test]
    fn parses_hashcat_status_record() {
        let line = r#"{ "session": "hashcat", "status": 3, "time_start": 1700000000, "progress": [5000, 14344384], "recovered_hashes": [3, 50], "devices": [{"device_id": 1}] }"#;
        let s = parse_status_line(line).unwrap();
        assert_eq!(s.start_time, 1_700_000_000.0);
        assert_eq!(s.recovered, 3);
        assert_eq!(s.progress, 5000);
    }

    #[test]
    fn missing_progress_defaults_to_zero() {
        let s = parse_status_line(r#"{"time_start": 10, "recovered_hashes": []}"#).unwrap();
        assert_eq!(s.recovered, 0);
        assert_eq!(s.progress, 0);
    }

    #[test]
    fn rejects_lines_missing_required_fields() {
        assert!(matches!(
            parse_status_line(r#"{"time_start": 10}"#),
            Err(DecodeError::Json(_))
        ));
        assert!(matches!(
            parse_status_line("Session..........: hashcat time_start"),
            Err(DecodeError::NotStatus)
        ));
        assert!(matches!(
            parse_status_line(r#"{"time_start": 10, "recovered_hashes": [1"#),
            Err(DecodeError::Unbalanced)
        ));
    }

    #[test]
    fn log_skips_noise_and_keeps_order() {
        let dir = tempdir().unwrap();
        let log = dir.path().join("run.log");
        std::fs::write(
            &log,
            concat!(
                "hashcat (v6.2.6) starting\n",
                "{\"time_start\": 100, \"recovered_hashes\": [0, 5], \"progress\": [0, 100]}\n",
                "{\"time_start\": broken, \"recovered_hashes\": [1]}\n",
                "\n",
                "  {\"time_start\": 160, \"recovered_hashes\": [2, 5], \"progress\": [50, 100]}\r\n",
            ),
        )
        .unwrap();
        let snaps = parse_status_log(&log, 0).unwrap();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[1].start_time, 160.0);
        assert_eq!(snaps[1].recovered, 2);
    }
}
