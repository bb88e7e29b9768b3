//! Rule-based plausibility gate.
//!
//! Per-symbol rules run for every requested symbol:
//!
//! | Rule | Finding |
//! |------|---------|
//! | price absent (or no record at all) | `price missing` |
//! | price `<= 0` | `non-positive price` |
//! | price outside the asset-class band | `price outside band` |
//! | volume `< 0` | `negative volume` |
//!
//! Aggregate rules then decide the verdict: a total price blackout always
//! rejects, and so does a batch where more than half of the symbols carry a
//! finding. A minority of findings is tolerated and reported separately.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{AssetClass, Batch, Symbol, ValidationError};

/// Inclusive price range considered plausible for an asset class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceBand {
    pub min: f64,
    pub max: f64,
}

impl PriceBand {
    pub fn new(class: AssetClass, min: f64, max: f64) -> Result<Self, ValidationError> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(ValidationError::InvalidPriceBand {
                class: class.to_string(),
                min,
                max,
            });
        }
        Ok(Self { min, max })
    }

    pub fn contains(self, price: f64) -> bool {
        price >= self.min && price <= self.max
    }
}

/// Symbol classification and per-class bands.
///
/// Lookup order for a symbol: explicit entry, then `^`-prefixed tickers as
/// indices, then the default class. A symbol with no class skips the band
/// rule.
#[derive(Debug, Clone, PartialEq)]
pub struct BandTable {
    classes: BTreeMap<AssetClass, PriceBand>,
    symbols: BTreeMap<Symbol, AssetClass>,
    default_class: Option<AssetClass>,
}

impl Default for BandTable {
    /// Order-of-magnitude sanity bands for the default nuclear-sector watchlist.
    fn default() -> Self {
        let bands = [
            (AssetClass::SmallCapEquity, 500.0),
            (AssetClass::Equity, 10_000.0),
            (AssetClass::Etf, 1_000.0),
            (AssetClass::Index, 100_000.0),
            (AssetClass::Rate, 100.0),
            (AssetClass::Leveraged, 100_000.0),
        ];
        let symbols = [
            ("SMR", AssetClass::SmallCapEquity),
            ("URA", AssetClass::Etf),
            ("URNM", AssetClass::Etf),
            ("XLU", AssetClass::Etf),
            ("^VIX", AssetClass::Index),
            ("^TNX", AssetClass::Rate),
        ];

        let mut table = Self::empty();
        for (class, max) in bands {
            table.classes.insert(class, PriceBand { min: 0.0, max });
        }
        for (symbol, class) in symbols {
            if let Ok(symbol) = Symbol::parse(symbol) {
                table.symbols.insert(symbol, class);
            }
        }
        table
    }
}

impl BandTable {
    /// Table that classifies nothing.
    pub fn empty() -> Self {
        Self {
            classes: BTreeMap::new(),
            symbols: BTreeMap::new(),
            default_class: None,
        }
    }

    pub fn with_band(mut self, class: AssetClass, band: PriceBand) -> Self {
        self.classes.insert(class, band);
        self
    }

    pub fn with_symbol(mut self, symbol: Symbol, class: AssetClass) -> Self {
        self.symbols.insert(symbol, class);
        self
    }

    pub fn with_default_class(mut self, class: Option<AssetClass>) -> Self {
        self.default_class = class;
        self
    }

    pub fn classify(&self, symbol: &Symbol) -> Option<AssetClass> {
        if let Some(class) = self.symbols.get(symbol) {
            return Some(*class);
        }
        if symbol.as_str().starts_with('^') {
            return Some(AssetClass::Index);
        }
        self.default_class
    }

    pub fn band_for(&self, symbol: &Symbol) -> Option<(AssetClass, PriceBand)> {
        let class = self.classify(symbol)?;
        self.classes.get(&class).map(|band| (class, *band))
    }
}

/// Outcome of gating one batch.
///
/// `ok` holds exactly when `issues` is empty. Findings on a tolerated
/// minority of symbols are listed in `tolerated` and never block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationVerdict {
    pub ok: bool,
    pub issues: Vec<String>,
    pub tolerated: Vec<String>,
    pub summary: String,
}

impl ValidationVerdict {
    fn accepted(tolerated: Vec<String>) -> Self {
        Self {
            ok: true,
            issues: Vec::new(),
            tolerated,
            summary: String::from("stable"),
        }
    }

    fn rejected(issues: Vec<String>) -> Self {
        Self {
            ok: false,
            summary: format!("suspect, {} incidents", issues.len()),
            issues,
            tolerated: Vec::new(),
        }
    }
}

/// Pure evaluator; holds only configuration.
#[derive(Debug, Clone, Default)]
pub struct PlausibilityGate {
    bands: BandTable,
}

impl PlausibilityGate {
    pub fn new(bands: BandTable) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &BandTable {
        &self.bands
    }

    pub fn evaluate(&self, batch: &Batch) -> ValidationVerdict {
        let symbols = batch.requested();
        let mut findings = Vec::new();
        let mut priced = 0_usize;

        for symbol in symbols {
            let symbol_findings = self.symbol_findings(batch, symbol);
            if batch.get(symbol).and_then(|record| record.price).is_some() {
                priced += 1;
            }
            if !symbol_findings.is_empty() {
                findings.push(format!("{symbol}: {}", symbol_findings.join("; ")));
            }
        }

        let mut reasons = Vec::new();
        if priced == 0 {
            reasons.push(if symbols.is_empty() {
                String::from("blackout: batch contains no symbols")
            } else {
                format!("blackout: none of {} symbols has a price", symbols.len())
            });
        }
        if !symbols.is_empty() && findings.len() * 2 > symbols.len() {
            reasons.push(format!(
                "majority flagged: {} of {} symbols have findings",
                findings.len(),
                symbols.len()
            ));
        }

        if reasons.is_empty() {
            return ValidationVerdict::accepted(findings);
        }

        findings.extend(reasons);
        ValidationVerdict::rejected(findings)
    }

    fn symbol_findings(&self, batch: &Batch, symbol: &Symbol) -> Vec<String> {
        let mut findings = Vec::new();
        let Some(record) = batch.get(symbol) else {
            findings.push(String::from("price missing (no record)"));
            return findings;
        };

        match record.price {
            None => findings.push(String::from("price missing")),
            Some(price) if price <= 0.0 => {
                findings.push(format!("non-positive price {price}"));
            }
            Some(price) => {
                if let Some((class, band)) = self.bands.band_for(symbol) {
                    if !band.contains(price) {
                        findings.push(format!(
                            "price {price} outside {class} band [{}, {}]",
                            band.min, band.max
                        ));
                    }
                }
            }
        }

        if let Some(volume) = record.volume.filter(|volume| *volume < 0) {
            findings.push(format!("negative volume {volume}"));
        }

        findings
    }
}
