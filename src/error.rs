use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file `{path}`: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config file `{path}` is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot read symbols file `{path}`: {source}")]
    SymbolsUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("symbols file `{path}` is malformed: {source}")]
    SymbolsMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("the two user ids must differ, got {user_id} twice")]
    IdenticalUsers { user_id: i32 },
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset length {len} is not a multiple of the {record_size}-byte record size")]
    MisalignedLength { len: u64, record_size: usize },
    #[error("invalid side byte {byte:#04x} at offset {offset}")]
    InvalidSide { byte: u8, offset: u64 },
    #[error("negative lot size {lot} at offset {offset}")]
    NegativeLot { lot: i64, offset: u64 },
}

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("trade stream is not sorted: open_ts {current} after {last} (trade {trade_id})")]
    NonMonotonicOpenTs { current: i64, last: i64, trade_id: i32 },
    #[error("symbol id {symbol} is outside the dictionary of {known} symbols (trade {trade_id})")]
    UnknownSymbol { symbol: i32, known: usize, trade_id: i32 },
}

/// Umbrella error for a full scan run.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("report I/O error: {0}")]
    Report(#[from] std::io::Error),
}
