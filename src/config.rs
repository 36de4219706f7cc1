//! Runtime configuration.
//!
//! Values are layered from the process environment and then `KEY=value` env
//! files (later files win). The env files are read with `dotenv`'s iterator
//! API and never exported into the process environment; the resulting
//! [`Config`] is built once in `main` and handed to each command.
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::debug;

pub const DEFAULT_ENV_FILES: [&str; 2] = [".env", "env.local"];
pub const DEFAULT_DATABASE: &str = "cracklab.sqlite";
pub const DEFAULT_BATCH_SIZE: usize = 1000;
pub const DEFAULT_START_LINE: u64 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unable to parse env file {}: {source}", path.display())]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenv::Error,
    },
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database: PathBuf,
    pub wordlist: Option<PathBuf>,
    pub batch_size: usize,
    pub start_line: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            wordlist: None,
            batch_size: DEFAULT_BATCH_SIZE,
            start_line: DEFAULT_START_LINE,
        }
    }
}

impl Config {
    /// Process environment overlaid with each existing env file in order.
    pub fn load<P: AsRef<Path>>(env_files: &[P]) -> Result<Self, ConfigError> {
        Self::load_from(std::env::vars_os(), env_files)
    }

    /// Like [`Config::load`] with an explicit base environment. Entries that
    /// are not valid UTF-8 are ignored; none of our keys can hold them.
    pub fn load_from<I, P>(base: I, env_files: &[P]) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
        P: AsRef<Path>,
    {
        let mut vars: HashMap<String, String> = base
            .into_iter()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        for path in env_files {
            let path = path.as_ref();
            if !path.is_file() {
                debug!("env file {} not present, skipping", path.display());
                continue;
            }
            let iter = dotenv::from_path_iter(path).map_err(|source| ConfigError::EnvFile {
                path: path.to_path_buf(),
                source,
            })?;
            for item in iter {
                let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                    path: path.to_path_buf(),
                    source,
                })?;
                vars.insert(key, value);
            }
        }
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            database: lookup(vars, "DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database),
            wordlist: lookup(vars, "ROCKYOU_PATH").map(PathBuf::from),
            batch_size: parse_or(vars, "BATCH_SIZE", defaults.batch_size)?,
            start_line: parse_or(vars, "START_LINE", defaults.start_line)?,
        })
    }
}

// Empty values count as unset.
fn lookup<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(vars, key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        }),
    }
}
