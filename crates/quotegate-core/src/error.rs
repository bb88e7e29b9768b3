use thiserror::Error;

/// Validation errors for domain types and configuration values.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("symbol cannot be empty")]
    EmptySymbol,
    #[error("symbol length {len} exceeds max {max}")]
    SymbolTooLong { len: usize, max: usize },
    #[error("symbol must start with an ASCII letter or '^': '{ch}'")]
    SymbolInvalidStart { ch: char },
    #[error("symbol contains invalid character '{ch}' at index {index}")]
    SymbolInvalidChar { ch: char, index: usize },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("currency must be a 3-letter uppercase ISO code: '{value}'")]
    InvalidCurrency { value: String },

    #[error("price band for '{class}' is invalid: min {min} must be below max {max}")]
    InvalidPriceBand { class: String, min: f64, max: f64 },

    #[error("unknown asset class '{value}'")]
    UnknownAssetClass { value: String },

    #[error("at least one symbol must be requested")]
    NoSymbols,
}

/// Failure to turn a structured response body into a usable batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("structured response is not valid JSON: {0}")]
    Malformed(String),
    #[error("structured response reported an upstream error: {0}")]
    Upstream(String),
    #[error("structured response contained no usable quote records")]
    Empty,
}

/// Snapshot read/write failures. Never fatal to a run.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("snapshot could not be moved into place: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("refusing to persist {count} cached record(s) as a live snapshot")]
    CachedRecords { count: usize },

    #[error("refusing to persist an empty batch")]
    EmptyBatch,
}

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Failure reported by an external generation or publishing collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("report generation failed: {0}")]
    Generation(String),
    #[error("publishing failed: {0}")]
    Publishing(String),
}

/// Why one acquisition tier produced no batch.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TierError {
    #[error("transport failed: {0}")]
    Transport(#[from] crate::transport::TransportError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("none of {attempted} symbol document(s) yielded extractable data")]
    NoData { attempted: usize },

    #[error("no usable snapshot is available")]
    SnapshotUnavailable,
}

impl TierError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Transport(error) => error.code(),
            Self::Extraction(ExtractionError::Malformed(_)) => "extraction.malformed",
            Self::Extraction(ExtractionError::Upstream(_)) => "extraction.upstream",
            Self::Extraction(ExtractionError::Empty) => "extraction.empty",
            Self::NoData { .. } => "tier.no_data",
            Self::SnapshotUnavailable => "snapshot.unavailable",
        }
    }
}
