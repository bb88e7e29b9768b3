use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] quotegate_core::ConfigError),

    #[error(transparent)]
    Validation(#[from] quotegate_core::ValidationError),

    #[error(transparent)]
    Exhausted(#[from] quotegate_core::CascadeExhausted),

    #[error(transparent)]
    Tier(#[from] quotegate_core::TierError),

    #[error("no usable snapshot at '{path}'")]
    NoSnapshot { path: String },

    #[error("logging setup failed: {0}")]
    Logging(String),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Validation(_) => 2,
            Self::Exhausted(_) => 3,
            Self::Tier(_) => 3,
            Self::NoSnapshot { .. } => 3,
            Self::Logging(_) => 2,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
