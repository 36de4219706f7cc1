//! SQLite storage gateway.
//!
//! Owns the connection and every SQL statement the crate issues. Column
//! names are only ever interpolated from [`Algorithm::column`], never from
//! user input.
use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::algorithm::Algorithm;
use crate::model::{
    CrackRun, CrackedHash, HashRecord, IngestRun, NewCrackRun, NewHash, NewIngestRun,
    now_timestamp,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// How a new `crack_time_s` value interacts with an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrackTimePolicy {
    /// Only write rows whose `crack_time_s` is still NULL.
    FillMissing,
    /// Replace whatever is stored.
    Overwrite,
}

/// Aggregates over one algorithm's rows (or every row).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HashTotals {
    pub total: i64,
    pub cracked: i64,
    pub avg_hash_ms: Option<f64>,
    pub avg_crack_time_s: Option<f64>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS ingest_runs (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    algorithm        TEXT    NOT NULL,
    source_file      TEXT    NOT NULL,
    start_line       INTEGER NOT NULL,
    end_line         INTEGER NOT NULL,
    batch_size       INTEGER NOT NULL,
    rows_written     INTEGER NOT NULL,
    duration_ms      INTEGER NOT NULL,
    avg_hash_time_ms REAL    NOT NULL,
    created_at       TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS hashcat_runs (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    run_name         TEXT    NOT NULL UNIQUE,
    hash_mode        INTEGER NOT NULL,
    wordlist         TEXT,
    hash_file        TEXT,
    options_json     TEXT,
    status_json_path TEXT,
    started_at       TEXT,
    completed_at     TEXT,
    duration_s       REAL,
    hashes_total     INTEGER,
    hashes_cracked   INTEGER,
    created_at       TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS hashes (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    ingest_run_id   INTEGER REFERENCES ingest_runs(id),
    line_no         INTEGER NOT NULL,
    plaintext       TEXT    NOT NULL,
    md5_hash        TEXT UNIQUE,
    sha3_hash       TEXT UNIQUE,
    blake2b_hash    TEXT UNIQUE,
    argon2id_hash   TEXT UNIQUE,
    elapsed_ms      REAL    NOT NULL,
    created_at      TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at      TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP,
    cracked_at      TEXT,
    crack_run_id    INTEGER REFERENCES hashcat_runs(id),
    crack_time_s    REAL,
    crack_plaintext TEXT
);

CREATE INDEX IF NOT EXISTS hashes_cracked_at ON hashes (cracked_at);
"#;

const HASH_COLUMNS: &str = "id, ingest_run_id, line_no, plaintext, md5_hash, sha3_hash, \
     blake2b_hash, argon2id_hash, elapsed_ms, created_at, updated_at, cracked_at, \
     crack_run_id, crack_time_s, crack_plaintext";

const CRACK_RUN_COLUMNS: &str = "id, run_name, hash_mode, wordlist, hash_file, options_json, \
     status_json_path, started_at, completed_at, duration_s, hashes_total, hashes_cracked, \
     created_at";

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Write one ingest batch: the audit row plus every hash row, committed
    /// together. Dropping the transaction on error rolls the batch back.
    pub fn ingest_batch(
        &mut self,
        algorithm: Algorithm,
        run: &NewIngestRun,
        rows: &[NewHash],
    ) -> Result<i64> {
        let now = now_timestamp();
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO ingest_runs (algorithm, source_file, start_line, end_line, batch_size,
                                      rows_written, duration_ms, avg_hash_time_ms, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                algorithm.name(),
                run.source_file,
                run.start_line,
                run.end_line,
                run.batch_size,
                run.rows_written,
                run.duration_ms,
                run.avg_hash_time_ms,
                now,
            ],
        )?;
        let run_id = tx.last_insert_rowid();
        {
            let col = algorithm.column();
            let sql = format!(
                "INSERT INTO hashes (ingest_run_id, line_no, plaintext, {col}, elapsed_ms,
                                     created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                 ON CONFLICT({col}) DO UPDATE SET
                     plaintext = excluded.plaintext,
                     elapsed_ms = excluded.elapsed_ms,
                     updated_at = excluded.updated_at"
            );
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                stmt.execute(params![
                    run_id,
                    row.line_no,
                    row.plaintext,
                    row.hash,
                    row.elapsed_ms,
                    now,
                ])?;
            }
        }
        tx.commit()?;
        Ok(run_id)
    }

    /// Uncracked digests for `algorithm`, oldest first. `None` means no limit.
    pub fn hashes_for_export(&self, algorithm: Algorithm, limit: Option<u64>) -> Result<Vec<String>> {
        let col = algorithm.column();
        let sql = format!(
            "SELECT {col} FROM hashes
             WHERE cracked_at IS NULL AND {col} IS NOT NULL
             ORDER BY id LIMIT ?1"
        );
        let limit = limit.map(|l| l.min(i64::MAX as u64) as i64).unwrap_or(-1);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![limit], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    pub fn insert_crack_run(&self, run: &NewCrackRun) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO hashcat_runs (run_name, hash_mode, wordlist, hash_file, options_json,
                                       status_json_path, started_at, completed_at, duration_s,
                                       hashes_total, hashes_cracked, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                run.run_name,
                run.hash_mode,
                run.wordlist,
                run.hash_file,
                run.options_json,
                run.status_json_path,
                run.started_at,
                run.completed_at,
                run.duration_s,
                run.hashes_total,
                run.hashes_cracked,
                now_timestamp(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn latest_crack_run(&self) -> Result<Option<CrackRun>> {
        let sql = format!(
            "SELECT {CRACK_RUN_COLUMNS} FROM hashcat_runs ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, [], crack_run_from_row)
            .optional()?)
    }

    /// Mark every row whose `algorithm` digest equals `hash` as cracked.
    /// `cracked_at` and `crack_time_s` keep an existing value; the run id and
    /// recovered plaintext always take the new one. Returns rows matched.
    pub fn record_crack(
        &self,
        algorithm: Algorithm,
        hash: &str,
        run_id: i64,
        duration_s: Option<f64>,
        plaintext: &str,
    ) -> Result<usize> {
        let col = algorithm.column();
        let sql = format!(
            "UPDATE hashes
             SET cracked_at = COALESCE(cracked_at, ?1),
                 crack_run_id = ?2,
                 crack_time_s = COALESCE(crack_time_s, ?3),
                 crack_plaintext = ?4
             WHERE {col} = ?5"
        );
        let mut stmt = self.conn.prepare_cached(&sql)?;
        Ok(stmt.execute(params![now_timestamp(), run_id, duration_s, plaintext, hash])?)
    }

    /// Cracked rows for `algorithm` in crack order (ties broken by id).
    pub fn cracked_hashes(&self, algorithm: Algorithm) -> Result<Vec<CrackedHash>> {
        let col = algorithm.column();
        let sql = format!(
            "SELECT id, {col}, cracked_at, crack_time_s FROM hashes
             WHERE {col} IS NOT NULL AND cracked_at IS NOT NULL
             ORDER BY cracked_at ASC, id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            Ok(CrackedHash {
                id: row.get(0)?,
                hash: row.get(1)?,
                cracked_at: row.get(2)?,
                crack_time_s: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Returns 1 if the row was written, 0 if it is missing or the policy
    /// kept an existing value.
    pub fn set_crack_time(&self, id: i64, seconds: f64, policy: CrackTimePolicy) -> Result<usize> {
        let sql = match policy {
            CrackTimePolicy::FillMissing => {
                "UPDATE hashes SET crack_time_s = ?1 WHERE id = ?2 AND crack_time_s IS NULL"
            }
            CrackTimePolicy::Overwrite => "UPDATE hashes SET crack_time_s = ?1 WHERE id = ?2",
        };
        let mut stmt = self.conn.prepare_cached(sql)?;
        Ok(stmt.execute(params![seconds, id])?)
    }

    pub fn find_hash(&self, algorithm: Algorithm, hash: &str) -> Result<Option<HashRecord>> {
        let col = algorithm.column();
        let sql = format!("SELECT {HASH_COLUMNS} FROM hashes WHERE {col} = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![hash], hash_record_from_row)
            .optional()?)
    }

    pub fn hash_by_line(&self, algorithm: Algorithm, line_no: i64) -> Result<Option<HashRecord>> {
        let col = algorithm.column();
        let sql = format!(
            "SELECT {HASH_COLUMNS} FROM hashes WHERE {col} IS NOT NULL AND line_no = ?1
             ORDER BY id LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![line_no], hash_record_from_row)
            .optional()?)
    }

    /// Audit rows in insertion order.
    pub fn ingest_runs(&self) -> Result<Vec<IngestRun>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, algorithm, source_file, start_line, end_line, batch_size,
                    rows_written, duration_ms, avg_hash_time_ms, created_at
             FROM ingest_runs ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(IngestRun {
                id: row.get(0)?,
                algorithm: row.get(1)?,
                source_file: row.get(2)?,
                start_line: row.get(3)?,
                end_line: row.get(4)?,
                batch_size: row.get(5)?,
                rows_written: row.get(6)?,
                duration_ms: row.get(7)?,
                avg_hash_time_ms: row.get(8)?,
                created_at: row.get(9)?,
            })
        })?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Per-row hashing latency in ms, for one algorithm or every row.
    pub fn hash_times(&self, algorithm: Option<Algorithm>) -> Result<Vec<f64>> {
        self.real_column("elapsed_ms", algorithm)
    }

    /// Recorded `crack_time_s` values, skipping rows without one.
    pub fn crack_times(&self, algorithm: Option<Algorithm>) -> Result<Vec<f64>> {
        self.real_column("crack_time_s", algorithm)
    }

    fn real_column(&self, column: &'static str, algorithm: Option<Algorithm>) -> Result<Vec<f64>> {
        let mut sql = format!("SELECT {column} FROM hashes WHERE {column} IS NOT NULL");
        if let Some(a) = algorithm {
            sql.push_str(&format!(" AND {} IS NOT NULL", a.column()));
        }
        sql.push_str(" ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, f64>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }

    /// Totals for one algorithm, or across every row when `algorithm` is None.
    pub fn totals(&self, algorithm: Option<Algorithm>) -> Result<HashTotals> {
        let filter = match algorithm {
            Some(a) => format!("WHERE {} IS NOT NULL", a.column()),
            None => String::new(),
        };
        let sql = format!(
            "SELECT COUNT(*),
                    COUNT(cracked_at),
                    AVG(elapsed_ms),
                    AVG(crack_time_s)
             FROM hashes {filter}"
        );
        Ok(self.conn.query_row(&sql, [], |row| {
            Ok(HashTotals {
                total: row.get(0)?,
                cracked: row.get(1)?,
                avg_hash_ms: row.get(2)?,
                avg_crack_time_s: row.get(3)?,
            })
        })?)
    }
}

fn hash_record_from_row(row: &Row<'_>) -> rusqlite::Result<HashRecord> {
    Ok(HashRecord {
        id: row.get(0)?,
        ingest_run_id: row.get(1)?,
        line_no: row.get(2)?,
        plaintext: row.get(3)?,
        md5_hash: row.get(4)?,
        sha3_hash: row.get(5)?,
        blake2b_hash: row.get(6)?,
        argon2id_hash: row.get(7)?,
        elapsed_ms: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
        cracked_at: row.get(11)?,
        crack_run_id: row.get(12)?,
        crack_time_s: row.get(13)?,
        crack_plaintext: row.get(14)?,
    })
}

fn crack_run_from_row(row: &Row<'_>) -> rusqlite::Result<CrackRun> {
    Ok(CrackRun {
        id: row.get(0)?,
        run_name: row.get(1)?,
        hash_mode: row.get(2)?,
        wordlist: row.get(3)?,
        hash_file: row.get(4)?,
        options_json: row.get(5)?,
        status_json_path: row.get(6)?,
        started_at: row.get(7)?,
        completed_at: row.get(8)?,
        duration_s: row.get(9)?,
        hashes_total: row.get(10)?,
        hashes_cracked: row.get(11)?,
        created_at: row.get(12)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn seed(store: &mut Store, algorithm: Algorithm, hashes: &[(&str, &str)]) {
        let rows: Vec<NewHash> = hashes
            .iter()
            .enumerate()
            .map(|(i, (plain, hash))| NewHash {
                line_no: i as i64 + 1,
                plaintext: plain.to_string(),
                hash: hash.to_string(),
                elapsed_ms: 0.5,
            })
            .collect();
        let run = NewIngestRun {
            source_file: "words.txt".into(),
            start_line: 1,
            end_line: rows.len() as i64,
            batch_size: rows.len() as i64,
            rows_written: rows.len() as i64,
            duration_ms: 1,
            avg_hash_time_ms: 0.5,
        };
        store.ingest_batch(algorithm, &run, &rows).unwrap();
    }

    pub(crate) fn crack_run(store: &Store, name: &str) -> i64 {
        store
            .insert_crack_run(&NewCrackRun {
                run_name: name.into(),
                hash_mode: 0,
                wordlist: None,
                hash_file: None,
                options_json: None,
                status_json_path: None,
                started_at: None,
                completed_at: None,
                duration_s: None,
                hashes_total: None,
                hashes_cracked: None,
            })
            .unwrap()
    }

    #[test]
    fn ingest_upserts_on_duplicate_digest() {
        let mut s = Store::open_in_memory().unwrap();
        seed(&mut s, Algorithm::Md5, &[("a", "h1"), ("b", "h2")]);
        seed(&mut s, Algorithm::Md5, &[("a2", "h1")]);
        let r = s.find_hash(Algorithm::Md5, "h1").unwrap().unwrap();
        assert_eq!(r.plaintext, "a2");
        assert_eq!(s.totals(Some(Algorithm::Md5)).unwrap().total, 2);
        assert_eq!(s.ingest_runs().unwrap().len(), 2);
    }

    #[test]
    fn failed_batch_rolls_back_audit_row() {
        let mut s = Store::open_in_memory().unwrap();
        let run = NewIngestRun {
            source_file: "w".into(),
            start_line: 1,
            end_line: 1,
            batch_size: 1,
            rows_written: 1,
            duration_ms: 0,
            avg_hash_time_ms: 0.0,
        };
        s.conn
            .execute_batch(
                "CREATE TRIGGER reject_bad BEFORE INSERT ON hashes
                 WHEN NEW.plaintext = 'bad' BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();
        let rows = vec![
            NewHash {
                line_no: 1,
                plaintext: "ok".into(),
                hash: "h-ok".into(),
                elapsed_ms: 0.1,
            },
            NewHash {
                line_no: 2,
                plaintext: "bad".into(),
                hash: "h-bad".into(),
                elapsed_ms: 0.1,
            },
        ];
        assert!(s.ingest_batch(Algorithm::Md5, &run, &rows).is_err());
        assert!(s.ingest_runs().unwrap().is_empty());
        assert_eq!(s.totals(None).unwrap().total, 0);
    }

    #[test]
    fn export_skips_cracked_and_respects_limit() {
        let mut s = Store::open_in_memory().unwrap();
        seed(&mut s, Algorithm::Sha3, &[("a", "x1"), ("b", "x2"), ("c", "x3")]);
        let run = crack_run(&s, "r1");
        s.record_crack(Algorithm::Sha3, "x2", run, None, "b").unwrap();
        assert_eq!(
            s.hashes_for_export(Algorithm::Sha3, None).unwrap(),
            vec!["x1", "x3"]
        );
        assert_eq!(
            s.hashes_for_export(Algorithm::Sha3, Some(1)).unwrap(),
            vec!["x1"]
        );
        assert!(s.hashes_for_export(Algorithm::Md5, None).unwrap().is_empty());
    }

    #[test]
    fn record_crack_keeps_first_time_and_tracks_latest_run() {
        let mut s = Store::open_in_memory().unwrap();
        seed(&mut s, Algorithm::Md5, &[("pw", "abc")]);
        let r1 = crack_run(&s, "first");
        let r2 = crack_run(&s, "second");
        assert_eq!(s.record_crack(Algorithm::Md5, "abc", r1, Some(10.0), "pw").unwrap(), 1);
        let first = s.find_hash(Algorithm::Md5, "abc").unwrap().unwrap();
        assert_eq!(s.record_crack(Algorithm::Md5, "abc", r2, Some(99.0), "pw2").unwrap(), 1);
        let second = s.find_hash(Algorithm::Md5, "abc").unwrap().unwrap();
        assert_eq!(second.cracked_at, first.cracked_at);
        assert_eq!(second.crack_time_s, Some(10.0));
        assert_eq!(second.crack_run_id, Some(r2));
        assert_eq!(second.crack_plaintext.as_deref(), Some("pw2"));
        assert_eq!(s.record_crack(Algorithm::Md5, "zzz", r2, None, "x").unwrap(), 0);
    }

    #[test]
    fn value_columns_filter_by_algorithm() {
        let mut s = Store::open_in_memory().unwrap();
        seed(&mut s, Algorithm::Md5, &[("a", "m1"), ("b", "m2")]);
        seed(&mut s, Algorithm::Sha3, &[("a", "s1")]);
        let run = crack_run(&s, "r");
        s.record_crack(Algorithm::Md5, "m2", run, Some(3.0), "b").unwrap();
        assert_eq!(s.hash_times(Some(Algorithm::Md5)).unwrap(), vec![0.5, 0.5]);
        assert_eq!(s.hash_times(None).unwrap().len(), 3);
        assert_eq!(s.crack_times(Some(Algorithm::Md5)).unwrap(), vec![3.0]);
        assert!(s.crack_times(Some(Algorithm::Sha3)).unwrap().is_empty());
    }

    #[test]
    fn crack_time_policy() {
        let mut s = Store::open_in_memory().unwrap();
        seed(&mut s, Algorithm::Md5, &[("pw", "abc")]);
        let id = s.find_hash(Algorithm::Md5, "abc").unwrap().unwrap().id;
        assert_eq!(s.set_crack_time(id, 5.0, CrackTimePolicy::FillMissing).unwrap(), 1);
        assert_eq!(s.set_crack_time(id, 6.0, CrackTimePolicy::FillMissing).unwrap(), 0);
        assert_eq!(s.set_crack_time(id, 7.0, CrackTimePolicy::Overwrite).unwrap(), 1);
        let r = s.find_hash(Algorithm::Md5, "abc").unwrap().unwrap();
        assert_eq!(r.crack_time_s, Some(7.0));
    }

    #[test]
    fn duplicate_run_name_is_a_storage_error() {
        let s = Store::open_in_memory().unwrap();
        crack_run(&s, "dup");
        let again = s.insert_crack_run(&NewCrackRun {
            run_name: "dup".into(),
            hash_mode: 0,
            wordlist: None,
            hash_file: None,
            options_json: None,
            status_json_path: None,
            started_at: None,
            completed_at: None,
            duration_s: None,
            hashes_total: None,
            hashes_cracked: None,
        });
        assert!(matches!(again, Err(StoreError::Sqlite(_))));
        assert_eq!(s.latest_crack_run().unwrap().unwrap().run_name, "dup");
    }
}
