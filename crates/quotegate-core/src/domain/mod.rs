//! # Domain Models
//!
//! Canonical types shared by every acquisition tier and the plausibility gate.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`QuoteRecord`] | One symbol's market state, every field optional |
//! | [`Batch`] | Symbol-unique, insertion-ordered records plus the requested set |
//! | [`Provenance`] | Tier that produced a record |
//! | [`AssetClass`] | Instrument class used to pick a plausibility band |
//! | [`Symbol`] | Validated ticker (`SMR`, `^VIX`, `CL=F`) |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! Absent fields are modelled with `Option`, never with sentinel numbers:
//!
//! ```rust
//! use quotegate_core::{Provenance, QuoteRecord, Symbol};
//!
//! let record = QuoteRecord::empty(Symbol::parse("URA").unwrap(), Provenance::LiveStructured);
//! assert_eq!(record.price, None);
//! assert!(!record.has_data());
//! ```

mod quote;
mod symbol;
mod timestamp;

pub use quote::{validate_currency_code, AssetClass, Batch, Provenance, QuoteRecord};
pub use symbol::Symbol;
pub use timestamp::UtcDateTime;
