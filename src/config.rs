use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Run configuration, loaded from a JSON file before any trade is read.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub dataset_path: PathBuf,
    pub symbols_path: PathBuf,
    pub mode: Mode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Mode {
    /// Same-user pairs are not reported at all.
    A,
    /// Same-user pairs are reported and tagged as violations.
    B,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// The two users under investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserPair {
    pub first: i32,
    pub second: i32,
}

impl UserPair {
    pub fn new(first: i32, second: i32) -> Result<Self, ConfigError> {
        if first == second {
            return Err(ConfigError::IdenticalUsers { user_id: first });
        }
        Ok(Self { first, second })
    }

    pub fn contains(&self, user_id: i32) -> bool {
        user_id == self.first || user_id == self.second
    }
}

/// Symbol-id to symbol-name dictionary: a JSON array whose index is the id.
/// Used only for report formatting; the matching core never consults it.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    names: Vec<String>,
}

impl SymbolTable {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::SymbolsUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let names: Vec<String> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::SymbolsMalformed {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { names })
    }

    pub fn from_names(names: Vec<String>) -> Self {
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, symbol: i32) -> Option<&str> {
        usize::try_from(symbol).ok().and_then(|i| self.names.get(i)).map(String::as_str)
    }
}
