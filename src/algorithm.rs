//! Hash algorithm variants and how each one is represented in hashcat's input
//! and potfile formats.
//!
//! Every [`Algorithm`] owns one column of the `hashes` table and one
//! [`HashFormat`] strategy. Exporters call [`HashFormat::format`] and potfile
//! reconciliation calls [`HashFormat::parse`], so the `$BLAKE2$` convention
//! lives in exactly one place.
use std::fmt;

use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// MD5, fast digest
    Md5,
    /// SHA3-256, fast digest
    Sha3,
    /// BLAKE2b-512 keyed digest (empty key)
    Blake2b,
    /// Argon2id memory-hard digest (PHC string)
    Argon2id,
}

impl Algorithm {
    pub const ALL: [Algorithm; 4] = [
        Algorithm::Md5,
        Algorithm::Sha3,
        Algorithm::Blake2b,
        Algorithm::Argon2id,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha3 => "sha3",
            Algorithm::Blake2b => "blake2b",
            Algorithm::Argon2id => "argon2id",
        }
    }

    /// Column of the `hashes` table holding this algorithm's digest.
    pub fn column(self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5_hash",
            Algorithm::Sha3 => "sha3_hash",
            Algorithm::Blake2b => "blake2b_hash",
            Algorithm::Argon2id => "argon2id_hash",
        }
    }

    /// Default hashcat `-m` value recorded on crack runs.
    pub fn hashcat_mode(self) -> i64 {
        match self {
            Algorithm::Md5 => 0,
            Algorithm::Sha3 => 17400,
            Algorithm::Blake2b => 600,
            Algorithm::Argon2id => 34000,
        }
    }

    pub fn format(self) -> &'static dyn HashFormat {
        match self {
            Algorithm::Blake2b => &BLAKE2_FORMAT,
            _ => &BARE_FORMAT,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Conversion between stored digests and hashcat's textual representation.
pub trait HashFormat: Send + Sync {
    /// Render a stored digest as one line of a hashcat hash file.
    fn format(&self, hash: &str) -> String;
    /// Recover the stored digest from a potfile hash field.
    fn parse<'a>(&self, field: &'a str) -> &'a str;
}

/// Digests that hashcat accepts and reports verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bare;

impl HashFormat for Bare {
    fn format(&self, hash: &str) -> String {
        hash.to_string()
    }

    fn parse<'a>(&self, field: &'a str) -> &'a str {
        field
    }
}

/// Digests hashcat expects behind a fixed marker, e.g. `$BLAKE2$<hex>` for
/// mode 600. Potfile fields without the marker are passed through.
#[derive(Debug, Clone, Copy)]
pub struct Prefixed(pub &'static str);

impl HashFormat for Prefixed {
    fn format(&self, hash: &str) -> String {
        format!("{}{}", self.0, hash)
    }

    fn parse<'a>(&self, field: &'a str) -> &'a str {
        field.strip_prefix(self.0).unwrap_or(field)
    }
}

pub const BLAKE2_PREFIX: &str = "$BLAKE2$";

static BARE_FORMAT: Bare = Bare;
static BLAKE2_FORMAT: Prefixed = Prefixed(BLAKE2_PREFIX);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake2b_round_trips_through_prefix() {
        let f = Algorithm::Blake2b.format();
        assert_eq!(f.format("abcd"), "$BLAKE2$abcd");
        assert_eq!(f.parse("$BLAKE2$abcd"), "abcd");
        assert_eq!(f.parse("abcd"), "abcd");
    }

    #[test]
    fn bare_formats_leave_argon_phc_strings_alone() {
        let phc = "$argon2id$v=19$m=65536,t=4,p=1$c2FsdA$aGFzaA";
        let f = Algorithm::Argon2id.format();
        assert_eq!(f.format(phc), phc);
        assert_eq!(f.parse(phc), phc);
    }

    #[test]
    fn columns_are_distinct() {
        let cols: std::collections::HashSet<_> = Algorithm::ALL.iter().map(|a| a.column()).collect();
        assert_eq!(cols.len(), Algorithm::ALL.len());
    }
}
