pub mod config;
pub mod dataset;
pub mod detection;
pub mod error;
pub mod generator;
pub mod report;
pub mod types;

pub use config::{Config, Mode, SymbolTable, UserPair};
pub use detection::{BatchSink, MatchPolicy, Matcher, MATCH_WINDOW_MS};
pub use error::{ConfigError, DatasetError, MatchError, ScanError};
pub use types::{Batch, PatternKind, Side, Trade};
