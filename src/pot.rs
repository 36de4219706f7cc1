//! Potfile parsing and reconciliation into storage.
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;

use crate::algorithm::Algorithm;
use crate::io::{InputError, line_text, open_lines};
use crate::store::Store;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotEntry {
	pub hash: String,
	pub plaintext: String,
}

/// Split `hash:plaintext` at the first ':' only, so plaintexts may contain
/// colons. A line without a colon yields an empty plaintext; an empty hash
/// field yields `None`. Nothing is trimmed.
pub fn parse_pot_line(line: &str) -> Option<PotEntry> {
	let (hash, plaintext) = line.split_once(':').unwrap_or((line, ""));
	if hash.is_empty() {
		return None;
	}
	Some(PotEntry {
		hash: hash.to_string(),
		plaintext: plaintext.to_string(),
	})
}

/// Apply every potfile line to the rows of `algorithm`, attributing cracks to
/// `run_id`. Returns the number of rows matched across all lines.
///
/// Each line is its own update; the first storage error aborts the run.
pub fn apply_potfile(
	store: &Store,
	potfile: &Path,
	algorithm: Algorithm,
	run_id: i64,
	duration_s: Option<f64>,
	mmap_threshold: u64,
) -> Result<usize> {
	let lines = open_lines(potfile, mmap_threshold)?;
	let hash_format = algorithm.format();
	let mut updated = 0;
	for line in lines {
		let line = line.map_err(|e| InputError::read(potfile, e))?;
		if line.is_empty() {
			continue;
		}
		let Some(entry) = parse_pot_line(&line_text(&line)) else {
			continue;
		};
		let hash = hash_format.parse(&entry.hash);
		let n = store
			.record_crack(algorithm, hash, run_id, duration_s, &entry.plaintext)
			.with_context(|| format!("apply potfile entry for {hash}"))?;
		if n == 0 {
			debug!("no {} row for potfile hash {}", algorithm, hash);
		}
		updated += n;
	}
	Ok(updated)
}
