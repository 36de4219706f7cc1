//! Export of uncracked hashes as a hashcat hash file.
//!
//! One hash per line, formatted by the algorithm's [`HashFormat`], so
//! BLAKE2b lines carry the `$BLAKE2$` marker mode 600 expects.
//!
//! [`HashFormat`]: crate::algorithm::HashFormat
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::Result;

use crate::algorithm::Algorithm;
use crate::io::OutputError;
use crate::store::Store;

/// Storage failures surface as `StoreError`, anything touching `path` as
/// [`OutputError`].
pub fn export_hashes<P: AsRef<Path>>(
    store: &Store,
    algorithm: Algorithm,
    limit: Option<u64>,
    path: P,
) -> Result<usize> {
    let path = path.as_ref();
    let hashes = store.hashes_for_export(algorithm, limit)?;
    let write_err = |e: std::io::Error| OutputError::new(path, e);
    let file = File::create(path).map_err(write_err)?;
    let mut out = BufWriter::new(file);
    let hash_format = algorithm.format();
    for h in &hashes {
        writeln!(out, "{}", hash_format.format(h)).map_err(write_err)?;
    }
    out.flush().map_err(write_err)?;
    Ok(hashes.len())
}
