//! Persisted record types.
//!
//! A [`HashRecord`] is created by ingestion and later touched by potfile
//! reconciliation: `cracked_at` and `crack_time_s` are first-write-wins,
//! while `crack_run_id` and `crack_plaintext` follow the most recent match.
//! [`IngestRun`]s and [`CrackRun`]s are audit rows, written once and never
//! updated.
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HashRecord {
    pub id: i64,
    pub ingest_run_id: Option<i64>,
    pub line_no: i64,
    /// Stored in cleartext; this is a lab dataset.
    pub plaintext: String,
    pub md5_hash: Option<String>,
    pub sha3_hash: Option<String>,
    pub blake2b_hash: Option<String>,
    pub argon2id_hash: Option<String>,
    pub elapsed_ms: f64,
    pub created_at: String,
    pub updated_at: String,
    pub cracked_at: Option<String>,
    pub crack_run_id: Option<i64>,
    pub crack_time_s: Option<f64>,
    pub crack_plaintext: Option<String>,
}

/// One wordlist line ready for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewHash {
    pub line_no: i64,
    pub plaintext: String,
    pub hash: String,
    pub elapsed_ms: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewIngestRun {
    pub source_file: String,
    pub start_line: i64,
    pub end_line: i64,
    pub batch_size: i64,
    pub rows_written: i64,
    pub duration_ms: i64,
    pub avg_hash_time_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestRun {
    pub id: i64,
    pub algorithm: String,
    pub source_file: String,
    pub start_line: i64,
    pub end_line: i64,
    pub batch_size: i64,
    pub rows_written: i64,
    pub duration_ms: i64,
    pub avg_hash_time_ms: f64,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCrackRun {
    pub run_name: String,
    pub hash_mode: i64,
    pub wordlist: Option<String>,
    pub hash_file: Option<String>,
    pub options_json: Option<String>,
    pub status_json_path: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub duration_s: Option<f64>,
    pub hashes_total: Option<i64>,
    pub hashes_cracked: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrackRun {
    pub id: i64,
    pub run_name: String,
    pub hash_mode: i64,
    pub wordlist: Option<String>,
    pub hash_file: Option<String>,
    pub options_json: Option<String>,
    pub status_json_path: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub duration_s: Option<f64>,
    pub hashes_total: Option<i64>,
    pub hashes_cracked: Option<i64>,
    pub created_at: String,
}

/// A cracked row as the estimator sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct CrackedHash {
    pub id: i64,
    pub hash: String,
    pub cracked_at: String,
    pub crack_time_s: Option<f64>,
}

/// Timestamp format for every wall-clock column we write; UTC with
/// microseconds so it sorts lexically.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

pub fn now_timestamp() -> String {
    chrono::Utc::now().format(TIMESTAMP_FORMAT).to_string()
}
