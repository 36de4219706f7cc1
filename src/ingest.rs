//! Ingest: streams a wordlist, hashes each line with one algorithm and writes
//! rows to storage in batches. Each flushed batch is committed together with
//! its own `ingest_runs` audit row.
//!
//! Typical usage:
//!
//! ```no_run
//! use cracklab::algorithm::Algorithm;
//! use cracklab::ingest::{IngestOptions, ingest_wordlist};
//! use cracklab::store::Store;
//! # fn main() -> anyhow::Result<()> {
//! let mut store = Store::open("cracklab.sqlite")?;
//! let opts = IngestOptions::new("/path/to/rockyou.txt", Algorithm::Md5);
//! let report = ingest_wordlist(&mut store, &opts)?;
//! println!("{} rows in {} batches", report.rows_written, report.batches);
//! # Ok(())
//! # }
//! ```
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use log::info;

use crate::algorithm::Algorithm;
use crate::config::{DEFAULT_BATCH_SIZE, DEFAULT_START_LINE};
use crate::hashing::{Argon2Settings, Digester};
use crate::io::{DEFAULT_MMAP_THRESHOLD_BYTES, InputError, line_text, open_lines};
use crate::model::{NewHash, NewIngestRun};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub source: PathBuf,
    pub algorithm: Algorithm,
    pub batch_size: usize,
    /// 1-based; earlier lines are skipped.
    pub start_line: u64,
    pub max_lines: Option<u64>,
    pub argon2: Argon2Settings,
    pub mmap_threshold: u64,
}

impl IngestOptions {
    pub fn new<P: Into<PathBuf>>(source: P, algorithm: Algorithm) -> Self {
        Self {
            source: source.into(),
            algorithm,
            batch_size: DEFAULT_BATCH_SIZE,
            start_line: DEFAULT_START_LINE,
            max_lines: None,
            argon2: Argon2Settings::default(),
            mmap_threshold: DEFAULT_MMAP_THRESHOLD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub rows_written: u64,
    pub batches: u64,
}

struct Batch {
    rows: Vec<NewHash>,
    hash_ms_total: f64,
    started: Instant,
}

impl Batch {
    fn new(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            hash_ms_total: 0.0,
            started: Instant::now(),
        }
    }
}

pub fn ingest_wordlist(store: &mut Store, opts: &IngestOptions) -> Result<IngestReport> {
    let batch_size = opts.batch_size.max(1);
    let digester = Digester::new(opts.algorithm, opts.argon2)?;
    let lines = open_lines(&opts.source, opts.mmap_threshold)?;
    let source = opts.source.display().to_string();

    let mut report = IngestReport::default();
    let mut batch = Batch::new(batch_size);
    for (idx, line) in lines.enumerate() {
        let line = line.map_err(|e| InputError::read(&opts.source, e))?;
        let line_no = idx as u64 + 1;
        if line_no < opts.start_line {
            continue;
        }
        if opts.max_lines.is_some_and(|max| report.rows_written >= max) {
            break;
        }

        let t0 = Instant::now();
        let hash = digester
            .digest(&line)
            .with_context(|| format!("hash line {}", line_no))?;
        let elapsed_ms = t0.elapsed().as_secs_f64() * 1000.0;

        batch.rows.push(NewHash {
            line_no: line_no as i64,
            plaintext: line_text(&line),
            hash,
            elapsed_ms,
        });
        batch.hash_ms_total += elapsed_ms;
        report.rows_written += 1;

        if batch.rows.len() >= batch_size {
            flush(store, opts.algorithm, &source, &batch)?;
            report.batches += 1;
            batch = Batch::new(batch_size);
        }
    }
    if !batch.rows.is_empty() {
        flush(store, opts.algorithm, &source, &batch)?;
        report.batches += 1;
    }
    Ok(report)
}

fn flush(store: &mut Store, algorithm: Algorithm, source: &str, batch: &Batch) -> Result<()> {
    let (Some(first), Some(last)) = (batch.rows.first(), batch.rows.last()) else {
        return Ok(());
    };
    let count = batch.rows.len();
    let duration = batch.started.elapsed();
    let avg_hash_ms = batch.hash_ms_total / count as f64;
    let run = NewIngestRun {
        source_file: source.to_string(),
        start_line: first.line_no,
        end_line: last.line_no,
        batch_size: count as i64,
        rows_written: count as i64,
        duration_ms: duration.as_millis() as i64,
        avg_hash_time_ms: avg_hash_ms,
    };
    store
        .ingest_batch(algorithm, &run, &batch.rows)
        .with_context(|| format!("write batch for lines {}-{}", first.line_no, last.line_no))?;

    let secs = duration.as_secs_f64();
    let throughput = if secs > 0.0 { count as f64 / secs } else { 0.0 };
    info!(
        "batch complete | lines {}-{} | rows {} | {:.2} ms avg | {:.0} H/s",
        first.line_no, last.line_no, count, avg_hash_ms, throughput
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn wordlist(contents: &[u8]) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let p = dir.path().join("words.txt");
        std::fs::write(&p, contents).unwrap();
        (dir, p)
    }

    #[test]
    fn batches_and_line_numbers() {
        let (_dir, p) = wordlist(b"password\n123456\nletmein\nqwerty\nabc123\n");
        let mut store = Store::open_in_memory().unwrap();
        let mut opts = IngestOptions::new(&p, Algorithm::Md5);
        opts.batch_size = 2;
        opts.start_line = 2;
        opts.max_lines = Some(3);
        let report = ingest_wordlist(&mut store, &opts).unwrap();
        assert_eq!(report, IngestReport { rows_written: 3, batches: 2 });
        let runs = store.ingest_runs().unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!((runs[0].start_line, runs[0].end_line), (2, 3));
        assert_eq!((runs[1].start_line, runs[1].end_line, runs[1].rows_written), (4, 4, 1));
        assert_eq!(runs[1].algorithm, "md5");
        assert!(store.hash_by_line(Algorithm::Md5, 1).unwrap().is_none());
        let row = store.hash_by_line(Algorithm::Md5, 4).unwrap().unwrap();
        assert_eq!(row.plaintext, "qwerty");
        assert_eq!(row.md5_hash.as_deref(), Some("d8578edf8458ce06fbc5bb76a58c5ca4"));
        assert!(store.hash_by_line(Algorithm::Md5, 5).unwrap().is_none());
    }

    #[test]
    fn hashes_raw_bytes_and_keeps_empty_lines() {
        let (_dir, p) = wordlist(b"\xff\xfe\n\nend");
        let mut store = Store::open_in_memory().unwrap();
        let report = ingest_wordlist(&mut store, &IngestOptions::new(&p, Algorithm::Sha3)).unwrap();
        assert_eq!(report.rows_written, 3);
        let empty = store.hash_by_line(Algorithm::Sha3, 2).unwrap().unwrap();
        assert_eq!(
            empty.sha3_hash.as_deref(),
            Some("a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a")
        );
        let raw = store.hash_by_line(Algorithm::Sha3, 1).unwrap().unwrap();
        assert_eq!(raw.plaintext, "\u{fffd}\u{fffd}");
    }

    #[test]
    fn missing_wordlist_is_not_found() {
        let mut store = Store::open_in_memory().unwrap();
        let opts = IngestOptions::new("/definitely/not/here.txt", Algorithm::Md5);
        let err = ingest_wordlist(&mut store, &opts).unwrap_err();
        assert!(matches!(err.downcast_ref::<InputError>(), Some(InputError::NotFound(_))));
    }
}
