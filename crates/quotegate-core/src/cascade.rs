use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;

use crate::adapters::{DocumentQuoteClient, StructuredQuoteClient};
use crate::error::TierError;
use crate::snapshot::SnapshotStore;
use crate::{Batch, Provenance, QuoteRecord, Symbol};

pub type TierFuture<'a> = Pin<Box<dyn Future<Output = Result<Batch, TierError>> + Send + 'a>>;

/// One acquisition strategy in the fallback chain.
pub trait AcquisitionTier: Send + Sync {
    /// Provenance stamped on every record this tier returns.
    fn provenance(&self) -> Provenance;

    fn acquire<'a>(&'a self, symbols: &'a [Symbol]) -> TierFuture<'a>;
}

/// Whole symbol set in one structured request.
pub struct StructuredTier {
    client: StructuredQuoteClient,
}

impl StructuredTier {
    pub fn new(client: StructuredQuoteClient) -> Self {
        Self { client }
    }
}

impl AcquisitionTier for StructuredTier {
    fn provenance(&self) -> Provenance {
        Provenance::LiveStructured
    }

    fn acquire<'a>(&'a self, symbols: &'a [Symbol]) -> TierFuture<'a> {
        Box::pin(self.client.fetch(symbols))
    }
}

/// One quote page per symbol.
///
/// Sequential mode stops at the first rate-limited symbol. Parallel mode
/// fans out every fetch and merges only after all of them completed, so a
/// 429 there does not spare the remaining pages.
pub struct DocumentTier {
    client: DocumentQuoteClient,
    parallel: bool,
}

impl DocumentTier {
    pub fn new(client: DocumentQuoteClient) -> Self {
        Self {
            client,
            parallel: false,
        }
    }

    /// Issue every page request at once.
    ///
    /// Requests are already on the wire when the first 429 comes back, so
    /// parallel mode requests every page even under rate limiting. Leave it
    /// off for hosts that throttle.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    async fn fetch_sequential(
        &self,
        symbols: &[Symbol],
    ) -> Vec<(Symbol, Result<QuoteRecord, TierError>)> {
        let mut results = Vec::with_capacity(symbols.len());
        for (index, symbol) in symbols.iter().enumerate() {
            let result = self.client.fetch(symbol).await;
            let rate_limited = matches!(&result, Err(TierError::Transport(error)) if error.is_rate_limited());
            results.push((symbol.clone(), result));

            if rate_limited {
                tracing::warn!(
                    symbol = %symbol,
                    skipped = symbols.len() - index - 1,
                    "quote pages rate limited, skipping remaining symbols"
                );
                break;
            }
        }
        results
    }

    async fn fetch_parallel(
        &self,
        symbols: &[Symbol],
    ) -> Vec<(Symbol, Result<QuoteRecord, TierError>)> {
        join_all(symbols.iter().map(|symbol| async move {
            (symbol.clone(), self.client.fetch(symbol).await)
        }))
        .await
    }

    async fn acquire_documents(&self, symbols: &[Symbol]) -> Result<Batch, TierError> {
        let results = if self.parallel {
            self.fetch_parallel(symbols).await
        } else {
            self.fetch_sequential(symbols).await
        };

        let mut batch = Batch::new(symbols.to_vec());
        let mut answered = 0_usize;
        let mut errors = Vec::new();
        for (symbol, result) in results {
            match result {
                Ok(record) => {
                    answered += 1;
                    if record.has_data() {
                        batch.insert(record);
                    } else {
                        tracing::debug!(symbol = %symbol, "quote page exposed no fields");
                    }
                }
                Err(error) => {
                    tracing::warn!(symbol = %symbol, code = error.code(), %error, "quote page fetch failed");
                    errors.push(error);
                }
            }
        }

        if batch.is_empty() {
            // No page answered at all: surface why.
            if answered == 0 {
                if let Some(first) = errors.into_iter().next() {
                    return Err(first);
                }
            }
            return Err(TierError::NoData {
                attempted: symbols.len(),
            });
        }

        Ok(batch)
    }
}

impl AcquisitionTier for DocumentTier {
    fn provenance(&self) -> Provenance {
        Provenance::LiveUnstructured
    }

    fn acquire<'a>(&'a self, symbols: &'a [Symbol]) -> TierFuture<'a> {
        Box::pin(self.acquire_documents(symbols))
    }
}

/// Last persisted live batch, restricted to the requested symbols.
pub struct SnapshotTier {
    store: SnapshotStore,
}

impl SnapshotTier {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store }
    }
}

impl AcquisitionTier for SnapshotTier {
    fn provenance(&self) -> Provenance {
        Provenance::Cached
    }

    fn acquire<'a>(&'a self, symbols: &'a [Symbol]) -> TierFuture<'a> {
        Box::pin(async move {
            let batch = self
                .store
                .load()
                .ok_or(TierError::SnapshotUnavailable)?
                .restricted_to(symbols);
            if batch.is_empty() {
                return Err(TierError::SnapshotUnavailable);
            }
            Ok(batch)
        })
    }
}

/// Failure recorded for one tier of the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct TierFailure {
    pub provenance: Provenance,
    pub code: &'static str,
    pub message: String,
}

impl TierFailure {
    fn new(provenance: Provenance, error: &TierError) -> Self {
        Self {
            provenance,
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl Display for TierFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {} ({})", self.provenance, self.message, self.code)
    }
}

/// Batch chosen by the cascade.
#[derive(Debug, Clone)]
pub struct CascadeSuccess {
    pub batch: Batch,
    pub provenance: Provenance,
    pub chain: Vec<Provenance>,
    pub warnings: Vec<String>,
    pub failures: Vec<TierFailure>,
    pub latency_ms: u64,
}

/// Every tier failed; the run has no data to act on.
#[derive(Debug, Clone)]
pub struct CascadeExhausted {
    pub chain: Vec<Provenance>,
    pub failures: Vec<TierFailure>,
    pub latency_ms: u64,
}

impl Display for CascadeExhausted {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "all {} acquisition tier(s) failed", self.chain.len())?;
        for failure in &self.failures {
            write!(f, "; {failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for CascadeExhausted {}

pub type CascadeResult = Result<CascadeSuccess, CascadeExhausted>;

/// Ordered tier chain with write-through persistence of live results.
pub struct CascadeController {
    tiers: Vec<Arc<dyn AcquisitionTier>>,
    store: Option<SnapshotStore>,
}

impl CascadeController {
    pub fn new(tiers: Vec<Arc<dyn AcquisitionTier>>) -> Self {
        Self { tiers, store: None }
    }

    /// Structured, then per-symbol documents, then the snapshot in `store`.
    pub fn standard(
        structured: StructuredQuoteClient,
        documents: DocumentTier,
        store: SnapshotStore,
    ) -> Self {
        Self::new(vec![
            Arc::new(StructuredTier::new(structured)),
            Arc::new(documents),
            Arc::new(SnapshotTier::new(store.clone())),
        ])
        .with_store(store)
    }

    /// Persist every live success to `store`.
    pub fn with_store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn chain(&self) -> Vec<Provenance> {
        self.tiers.iter().map(|tier| tier.provenance()).collect()
    }

    /// Try each tier once, in order, and stop at the first success.
    pub async fn acquire(&self, symbols: &[Symbol]) -> CascadeResult {
        let started = Instant::now();
        let mut chain = Vec::with_capacity(self.tiers.len());
        let mut failures = Vec::new();

        for tier in &self.tiers {
            let provenance = tier.provenance();
            chain.push(provenance);

            match tier.acquire(symbols).await {
                Ok(batch) => {
                    let batch = batch.with_provenance(provenance);
                    let mut warnings = Vec::new();
                    if !failures.is_empty() {
                        warnings.push(format!(
                            "fell back to '{provenance}' after {} failed tier(s)",
                            failures.len()
                        ));
                    }
                    if provenance.is_live() {
                        if let Some(warning) = self.write_through(&batch) {
                            warnings.push(warning);
                        }
                    }

                    tracing::info!(
                        tier = %provenance,
                        records = batch.len(),
                        requested = batch.requested().len(),
                        "acquisition succeeded"
                    );
                    return Ok(CascadeSuccess {
                        batch,
                        provenance,
                        chain,
                        warnings,
                        failures,
                        latency_ms: elapsed_ms(started),
                    });
                }
                Err(error) => {
                    tracing::warn!(tier = %provenance, code = error.code(), %error, "acquisition tier failed");
                    failures.push(TierFailure::new(provenance, &error));
                }
            }
        }

        tracing::error!(tiers = chain.len(), "every acquisition tier failed");
        Err(CascadeExhausted {
            chain,
            failures,
            latency_ms: elapsed_ms(started),
        })
    }

    // Best effort: a failed write is reported, never fatal.
    fn write_through(&self, batch: &Batch) -> Option<String> {
        let store = self.store.as_ref()?;
        match store.save(batch) {
            Ok(()) => None,
            Err(error) => {
                tracing::warn!(path = %store.path().display(), %error, "snapshot write failed");
                Some(format!("snapshot not updated: {error}"))
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}
