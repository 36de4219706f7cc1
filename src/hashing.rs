//! Digest computation for every [`Algorithm`].
use argon2::password_hash::{PasswordHasher, SaltString, rand_core::OsRng};
use argon2::{Argon2, Params, Version};
use blake2::Blake2b512;
use md5::Md5;
use sha3::{Digest, Sha3_256};

use crate::algorithm::Algorithm;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid argon2id parameters: {0}")]
    InvalidParams(String),
    #[error("argon2id hashing failed: {0}")]
    Argon2(String),
}

/// Argon2id cost parameters. `memory_kib` is in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Settings {
    pub memory_kib: u32,
    pub iterations: u32,
    pub lanes: u32,
}

impl Default for Argon2Settings {
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 4,
            lanes: 1,
        }
    }
}

/// A configured hasher for one algorithm, reused across a whole ingest.
pub enum Digester {
    Md5,
    Sha3,
    Blake2b,
    Argon2id(Argon2<'static>),
}

impl Digester {
    pub fn new(algorithm: Algorithm, settings: Argon2Settings) -> Result<Self, HashError> {
        Ok(match algorithm {
            Algorithm::Md5 => Digester::Md5,
            Algorithm::Sha3 => Digester::Sha3,
            Algorithm::Blake2b => Digester::Blake2b,
            Algorithm::Argon2id => {
                let params = Params::new(
                    settings.memory_kib,
                    settings.iterations,
                    settings.lanes,
                    None,
                )
                .map_err(|e| HashError::InvalidParams(e.to_string()))?;
                Digester::Argon2id(Argon2::new(
                    argon2::Algorithm::Argon2id,
                    Version::V0x13,
                    params,
                ))
            }
        })
    }

    /// Hash one plaintext. Fixed-output digests come back as lowercase hex,
    /// Argon2id as a PHC string with a fresh random salt.
    pub fn digest(&self, plaintext: &[u8]) -> Result<String, HashError> {
        match self {
            Digester::Md5 => Ok(hex::encode(Md5::digest(plaintext))),
            Digester::Sha3 => Ok(hex::encode(Sha3_256::digest(plaintext))),
            Digester::Blake2b => Ok(hex::encode(Blake2b512::digest(plaintext))),
            Digester::Argon2id(argon) => {
                let salt = SaltString::generate(&mut OsRng);
                let hash = argon
                    .hash_password(plaintext, &salt)
                    .map_err(|e| HashError::Argon2(e.to_string()))?;
                Ok(hash.to_string())
            }
        }
    }
}
