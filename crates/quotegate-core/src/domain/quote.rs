use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Symbol, ValidationError};

/// Which acquisition tier produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Provenance {
    LiveStructured,
    LiveUnstructured,
    Cached,
}

impl Provenance {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LiveStructured => "live-structured",
            Self::LiveUnstructured => "live-unstructured",
            Self::Cached => "cached",
        }
    }

    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Cached)
    }
}

impl Display for Provenance {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instrument class used to pick a plausibility band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    SmallCapEquity,
    Equity,
    Etf,
    Index,
    Rate,
    Leveraged,
    Other,
}

impl AssetClass {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SmallCapEquity => "small_cap_equity",
            Self::Equity => "equity",
            Self::Etf => "etf",
            Self::Index => "index",
            Self::Rate => "rate",
            Self::Leveraged => "leveraged",
            Self::Other => "other",
        }
    }
}

impl FromStr for AssetClass {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "small_cap_equity" => Ok(Self::SmallCapEquity),
            "equity" => Ok(Self::Equity),
            "etf" => Ok(Self::Etf),
            "index" => Ok(Self::Index),
            "rate" => Ok(Self::Rate),
            "leveraged" => Ok(Self::Leveraged),
            "other" => Ok(Self::Other),
            _ => Err(ValidationError::UnknownAssetClass {
                value: value.to_owned(),
            }),
        }
    }
}

impl Display for AssetClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One symbol's market state at acquisition time.
///
/// Every market field is optional: an absent price and a zero price mean
/// different things to the plausibility gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRecord {
    pub symbol: Symbol,
    pub price: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<i64>,
    pub currency: Option<String>,
    pub as_of: Option<i64>,
    pub provenance: Provenance,
}

impl QuoteRecord {
    /// Record with every market field absent.
    pub fn empty(symbol: Symbol, provenance: Provenance) -> Self {
        Self {
            symbol,
            price: None,
            change_percent: None,
            volume: None,
            currency: None,
            as_of: None,
            provenance,
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_change_percent(mut self, change_percent: f64) -> Self {
        self.change_percent = Some(change_percent);
        self
    }

    pub fn with_volume(mut self, volume: i64) -> Self {
        self.volume = Some(volume);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_as_of(mut self, as_of: i64) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// True when at least one market field was extracted.
    pub fn has_data(&self) -> bool {
        self.price.is_some()
            || self.change_percent.is_some()
            || self.volume.is_some()
            || self.currency.is_some()
            || self.as_of.is_some()
    }

    pub fn retagged(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }
}

/// Quote records for one acquisition, keyed by symbol.
///
/// Records follow the order of `requested`, whatever order upstream returned
/// them in, so rendered output is stable across runs. A requested symbol may
/// have no record at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    requested: Vec<Symbol>,
    records: Vec<QuoteRecord>,
}

impl Batch {
    pub fn new(requested: Vec<Symbol>) -> Self {
        let mut deduped: Vec<Symbol> = Vec::with_capacity(requested.len());
        for symbol in requested {
            if !deduped.contains(&symbol) {
                deduped.push(symbol);
            }
        }
        Self {
            requested: deduped,
            records: Vec::new(),
        }
    }

    /// Build a batch whose requested set is exactly the records' symbols.
    pub fn from_records(records: impl IntoIterator<Item = QuoteRecord>) -> Self {
        let mut batch = Self::default();
        for record in records {
            batch.insert(record);
        }
        batch
    }

    /// Insert or replace the record for its symbol.
    ///
    /// A symbol that was not requested is added to the requested set.
    pub fn insert(&mut self, record: QuoteRecord) {
        if !self.requested.contains(&record.symbol) {
            self.requested.push(record.symbol.clone());
        }

        match self
            .records
            .iter_mut()
            .find(|existing| existing.symbol == record.symbol)
        {
            Some(existing) => *existing = record,
            None => {
                let rank = self.rank(&record.symbol);
                let at = self
                    .records
                    .iter()
                    .position(|existing| self.rank(&existing.symbol) > rank)
                    .unwrap_or(self.records.len());
                self.records.insert(at, record);
            }
        }
    }

    fn rank(&self, symbol: &Symbol) -> usize {
        self.requested
            .iter()
            .position(|requested| requested == symbol)
            .unwrap_or(usize::MAX)
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&QuoteRecord> {
        self.records.iter().find(|record| &record.symbol == symbol)
    }

    pub fn records(&self) -> &[QuoteRecord] {
        &self.records
    }

    pub fn requested(&self) -> &[Symbol] {
        &self.requested
    }

    /// Requested symbols without any record.
    pub fn missing(&self) -> Vec<&Symbol> {
        self.requested
            .iter()
            .filter(|symbol| self.get(symbol).is_none())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Retag every record with the given provenance.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.records = self
            .records
            .into_iter()
            .map(|record| record.retagged(provenance))
            .collect();
        self
    }

    /// Keep only records for `symbols` and make them the requested set.
    pub fn restricted_to(self, symbols: &[Symbol]) -> Self {
        let mut restricted = Self::new(symbols.to_vec());
        for record in self.records {
            if symbols.contains(&record.symbol) {
                restricted.insert(record);
            }
        }
        restricted
    }
}

pub fn validate_currency_code(input: &str) -> Result<String, ValidationError> {
    let normalized = input.trim().to_ascii_uppercase();
    let is_valid = normalized.len() == 3 && normalized.chars().all(|ch| ch.is_ascii_alphabetic());

    if !is_valid {
        return Err(ValidationError::InvalidCurrency {
            value: input.to_owned(),
        });
    }

    Ok(normalized)
}
