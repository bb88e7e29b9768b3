//! # Quotegate Core
//!
//! Resilient market-data acquisition with a plausibility gate in front of
//! every downstream consumer.
//!
//! ## Overview
//!
//! - **Three-tier cascade**: structured quote endpoint, then per-symbol quote
//!   pages, then the last persisted snapshot
//! - **Robust transport** with bounded retry, jittered backoff and
//!   compression sniffing for mis-declared bodies
//! - **Write-through snapshot** replaced atomically after every live success
//! - **Plausibility gate** with table-driven price bands per asset class
//! - **Session orchestration** that never hands rejected data to report
//!   generation or publishing
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Structured and document quote clients |
//! | [`cascade`] | Tier trait, standard tiers and the cascade controller |
//! | [`config`] | TOML configuration with environment overrides |
//! | [`decode`] | Response body decompression and text decoding |
//! | [`domain`] | Quote records, batches, symbols, timestamps |
//! | [`error`] | Core error types |
//! | [`gate`] | Plausibility gate and price bands |
//! | [`headlines`] | RSS headline titles |
//! | [`http_client`] | HTTP client abstraction |
//! | [`render`] | Deterministic context text |
//! | [`retry`] | Retry bounds and backoff |
//! | [`session`] | Run orchestration and collaborator traits |
//! | [`snapshot`] | Durable last-known-good batch |
//! | [`transport`] | Retrying fetch with body normalization |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quotegate_core::{PipelineConfig, ReqwestHttpClient, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default().with_env_overrides()?;
//!     let client = Arc::new(ReqwestHttpClient::new(&config.user_agent));
//!     let session = Session::from_config(&config, client)?;
//!
//!     let report = session.run(&config.parsed_symbols()?).await?;
//!     println!("{}", report.acquisition.verdict.summary);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / Session  │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Cascade         │────▶│ Snapshot Store   │
//! │ Controller      │     │ (write-through)  │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Tiers           │────▶│ Transport        │
//! │ (structured,    │     │ (retry, decode)  │
//! │  document,      │     └──────────────────┘
//! │  snapshot)      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Plausibility    │
//! │ Gate            │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Only cascade exhaustion ends a run without data. Everything below it is
//! classified and escalated to the next tier:
//!
//! ```rust
//! use quotegate_core::{TierError, TransportErrorKind};
//!
//! fn describe(error: &TierError) -> &'static str {
//!     match error {
//!         TierError::Transport(error) if error.kind() == TransportErrorKind::RateLimited => {
//!             "upstream is throttling us"
//!         }
//!         TierError::Transport(_) => "network trouble",
//!         TierError::Extraction(_) => "upstream answered with nothing usable",
//!         TierError::NoData { .. } => "no quote page exposed data",
//!         TierError::SnapshotUnavailable => "no fallback snapshot",
//!     }
//! }
//! ```

pub mod adapters;
pub mod cascade;
pub mod config;
pub mod decode;
pub mod domain;
pub mod error;
pub mod gate;
pub mod headlines;
pub mod http_client;
pub mod render;
pub mod retry;
pub mod session;
pub mod snapshot;
pub mod transport;

// Adapters
pub use adapters::{
    parse_document, parse_structured, request_headers, DocumentQuoteClient, StructuredQuoteClient,
};

// Cascade
pub use cascade::{
    AcquisitionTier, CascadeController, CascadeExhausted, CascadeResult, CascadeSuccess,
    DocumentTier, SnapshotTier, StructuredTier, TierFailure, TierFuture,
};

// Configuration
pub use config::{BandLimits, BandSettings, PipelineConfig, RetrySettings};

// Decoding
pub use decode::decode_body;

// Domain models
pub use domain::{
    validate_currency_code, AssetClass, Batch, Provenance, QuoteRecord, Symbol, UtcDateTime,
};

// Error types
pub use error::{
    CollaboratorError, ConfigError, ExtractionError, PersistenceError, TierError, ValidationError,
};

// Gate
pub use gate::{BandTable, PlausibilityGate, PriceBand, ValidationVerdict};

// Headlines
pub use headlines::{extract_titles, HeadlineFeed};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse, ReqwestHttpClient,
};

// Rendering
pub use render::{format_volume, render_context};

// Retry logic
pub use retry::{Backoff, RetryConfig};

// Session
pub use session::{
    Acquisition, DryRunGenerator, LogPublisher, Publisher, ReportGenerator, Session,
    SessionOutcome, SessionReport,
};

// Snapshot store
pub use snapshot::{Snapshot, SnapshotStore};

// Transport
pub use transport::{FetchedBody, Transport, TransportError, TransportErrorKind};
