//! Pipeline configuration.
//!
//! Loaded from TOML, then optionally overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `QUOTEGATE_SYMBOLS` | `symbols` (comma separated) |
//! | `QUOTEGATE_SNAPSHOT_PATH` | `snapshot_path` |
//!
//! Every component receives the pieces it needs at construction; nothing
//! reads configuration from process-wide state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::adapters::{DEFAULT_DOCUMENT_URL, DEFAULT_STRUCTURED_URL, DEFAULT_USER_AGENT};
use crate::error::ConfigError;
use crate::gate::{BandTable, PriceBand};
use crate::headlines::DEFAULT_FEED_URL;
use crate::retry::{Backoff, RetryConfig};
use crate::snapshot::DEFAULT_SNAPSHOT_PATH;
use crate::{AssetClass, Symbol, ValidationError};

pub const ENV_SYMBOLS: &str = "QUOTEGATE_SYMBOLS";
pub const ENV_SNAPSHOT_PATH: &str = "QUOTEGATE_SNAPSHOT_PATH";

pub const DEFAULT_SYMBOLS: [&str; 6] = ["SMR", "URA", "URNM", "XLU", "^TNX", "^VIX"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub symbols: Vec<String>,
    pub structured_url: String,
    pub document_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub retry: RetrySettings,
    pub snapshot_path: PathBuf,
    pub parallel_documents: bool,
    pub feeds: Vec<String>,
    pub max_headlines: usize,
    pub bands: BandSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbols: DEFAULT_SYMBOLS.iter().map(|symbol| (*symbol).to_owned()).collect(),
            structured_url: DEFAULT_STRUCTURED_URL.to_owned(),
            document_url: DEFAULT_DOCUMENT_URL.to_owned(),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            timeout_ms: 8_000,
            retry: RetrySettings::default(),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            parallel_documents: false,
            feeds: vec![DEFAULT_FEED_URL.to_owned()],
            max_headlines: 3,
            bands: BandSettings::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_owned(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// Apply `QUOTEGATE_*` overrides from the process environment.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides_from(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(symbols) = lookup(ENV_SYMBOLS).filter(|value| !value.trim().is_empty()) {
            self.symbols = split_symbols(&symbols);
        }
        if let Some(path) = lookup(ENV_SNAPSHOT_PATH).filter(|value| !value.trim().is_empty()) {
            self.snapshot_path = PathBuf::from(path);
        }
        self.validate()?;
        Ok(self)
    }

    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_symbols()?;
        self.band_table()?;
        Ok(())
    }

    /// Validated, de-duplicated symbols in configured order.
    pub fn parsed_symbols(&self) -> Result<Vec<Symbol>, ValidationError> {
        let mut symbols = Vec::with_capacity(self.symbols.len());
        for raw in &self.symbols {
            let symbol = Symbol::parse(raw)?;
            if !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        if symbols.is_empty() {
            return Err(ValidationError::NoSymbols);
        }
        Ok(symbols)
    }

    pub fn retry_config(&self) -> RetryConfig {
        self.retry.to_retry_config()
    }

    pub fn band_table(&self) -> Result<BandTable, ValidationError> {
        self.bands.to_table()
    }
}

/// Comma-separated symbol list, blanks dropped.
pub fn split_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|symbol| !symbol.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: f64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_500,
            factor: 1.5,
            max_delay_ms: 5_000,
            jitter_ms: 500,
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts.max(1),
            backoff: Backoff::Exponential {
                base: Duration::from_millis(self.base_delay_ms),
                factor: self.factor,
                max: Duration::from_millis(self.max_delay_ms),
                jitter: Duration::from_millis(self.jitter_ms),
            },
        }
    }
}

/// Band table as written in TOML: class names are strings. Entries are
/// laid over the built-in table, so empty settings keep the defaults.
///
/// ```toml
/// [bands]
/// default_class = "equity"
///
/// [bands.classes.etf]
/// min = 0.0
/// max = 1000.0
///
/// [bands.symbols]
/// URA = "etf"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandSettings {
    pub classes: BTreeMap<String, BandLimits>,
    pub symbols: BTreeMap<String, String>,
    pub default_class: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandLimits {
    pub min: f64,
    pub max: f64,
}

impl BandSettings {
    /// Built-in bands overlaid with configured classes and symbols.
    pub fn to_table(&self) -> Result<BandTable, ValidationError> {
        let mut table = BandTable::default();

        for (name, limits) in &self.classes {
            let class: AssetClass = name.parse()?;
            table = table.with_band(class, PriceBand::new(class, limits.min, limits.max)?);
        }
        for (symbol, class) in &self.symbols {
            table = table.with_symbol(Symbol::parse(symbol)?, class.parse()?);
        }
        if let Some(class) = &self.default_class {
            table = table.with_default_class(Some(class.parse()?));
        }

        Ok(table)
    }
}
