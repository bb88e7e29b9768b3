//! One pipeline run: acquire, render, gate, then hand off to collaborators.
//!
//! Report generation and publishing sit behind [`ReportGenerator`] and
//! [`Publisher`]. A negative verdict skips both; the rejection is logged and
//! the run still ends cleanly.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

use crate::adapters::{request_headers, DocumentQuoteClient, StructuredQuoteClient};
use crate::cascade::{CascadeController, CascadeExhausted, CascadeSuccess, DocumentTier};
use crate::config::PipelineConfig;
use crate::error::{CollaboratorError, ConfigError};
use crate::gate::{PlausibilityGate, ValidationVerdict};
use crate::headlines::HeadlineFeed;
use crate::http_client::HttpClient;
use crate::render::render_context;
use crate::snapshot::SnapshotStore;
use crate::transport::Transport;
use crate::{Provenance, Symbol, UtcDateTime};

pub type CollaboratorFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, CollaboratorError>> + Send + 'a>>;

/// Turns a rendered market context into report text.
pub trait ReportGenerator: Send + Sync {
    fn generate<'a>(&'a self, context: &'a str) -> CollaboratorFuture<'a, String>;
}

/// Delivers a generated report.
pub trait Publisher: Send + Sync {
    fn publish<'a>(&'a self, report: &'a str) -> CollaboratorFuture<'a, ()>;
}

/// Deterministic stand-in that makes no external call.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunGenerator;

impl ReportGenerator for DryRunGenerator {
    fn generate<'a>(&'a self, context: &'a str) -> CollaboratorFuture<'a, String> {
        Box::pin(async move {
            let quotes = context
                .lines()
                .skip_while(|line| *line != "[market data]")
                .take_while(|line| *line != "[headlines]")
                .filter(|line| line.contains(": ") && line.contains("(chg"))
                .count();
            Ok(format!("[dry-run report: {quotes} quote line(s)]\n{context}"))
        })
    }
}

/// Writes the report to the log instead of publishing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

impl Publisher for LogPublisher {
    fn publish<'a>(&'a self, report: &'a str) -> CollaboratorFuture<'a, ()> {
        Box::pin(async move {
            tracing::info!(bytes = report.len(), "publishing report (dry run)");
            tracing::debug!(report, "report body");
            Ok(())
        })
    }
}

/// Gated market data for one run, before any collaborator is involved.
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub run_id: Uuid,
    pub acquired_at: UtcDateTime,
    pub cascade: CascadeSuccess,
    pub headlines: Vec<String>,
    pub context: String,
    pub verdict: ValidationVerdict,
}

impl Acquisition {
    pub fn provenance(&self) -> Provenance {
        self.cascade.provenance
    }
}

/// What happened after the gate.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Published { report: String },
    Rejected { issues: Vec<String> },
    GenerationFailed { error: String },
    PublishFailed { report: String, error: String },
}

impl SessionOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::Rejected { .. } => "rejected",
            Self::GenerationFailed { .. } => "generation_failed",
            Self::PublishFailed { .. } => "publish_failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionReport {
    pub acquisition: Acquisition,
    pub outcome: SessionOutcome,
    pub latency_ms: u64,
}

/// Fully wired pipeline.
pub struct Session {
    cascade: CascadeController,
    headlines: Option<HeadlineFeed>,
    gate: PlausibilityGate,
    generator: Arc<dyn ReportGenerator>,
    publisher: Arc<dyn Publisher>,
}

impl Session {
    pub fn new(cascade: CascadeController, gate: PlausibilityGate) -> Self {
        Self {
            cascade,
            headlines: None,
            gate,
            generator: Arc::new(DryRunGenerator),
            publisher: Arc::new(LogPublisher),
        }
    }

    /// Standard three-tier pipeline with dry-run collaborators.
    pub fn from_config(
        config: &PipelineConfig,
        client: Arc<dyn HttpClient>,
    ) -> Result<Self, ConfigError> {
        let gate = PlausibilityGate::new(config.band_table()?);
        let transport = Transport::new(client, config.retry_config());
        let headers = request_headers(&config.user_agent);

        let structured = StructuredQuoteClient::new(transport.clone(), &config.structured_url)
            .with_headers(headers.clone())
            .with_timeout_ms(config.timeout_ms);
        let documents = DocumentTier::new(
            DocumentQuoteClient::new(transport.clone(), &config.document_url)
                .with_headers(headers.clone())
                .with_timeout_ms(config.timeout_ms),
        )
        .with_parallel(config.parallel_documents);
        let store = SnapshotStore::new(&config.snapshot_path);

        let mut session = Self::new(CascadeController::standard(structured, documents, store), gate);
        if !config.feeds.is_empty() && config.max_headlines > 0 {
            session = session.with_headlines(
                HeadlineFeed::new(transport, config.feeds.clone(), config.max_headlines)
                    .with_headers(headers)
                    .with_timeout_ms(config.timeout_ms),
            );
        }
        Ok(session)
    }

    pub fn with_headlines(mut self, headlines: HeadlineFeed) -> Self {
        self.headlines = Some(headlines);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn ReportGenerator>) -> Self {
        self.generator = generator;
        self
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Acquire, render and gate without invoking any collaborator.
    pub async fn acquire(&self, symbols: &[Symbol]) -> Result<Acquisition, CascadeExhausted> {
        self.acquire_with_id(Uuid::new_v4(), symbols).await
    }

    async fn acquire_with_id(
        &self,
        run_id: Uuid,
        symbols: &[Symbol],
    ) -> Result<Acquisition, CascadeExhausted> {
        let cascade = self.cascade.acquire(symbols).await?;
        let acquired_at = UtcDateTime::now();

        let headlines = match &self.headlines {
            Some(feed) => feed.fetch().await,
            None => Vec::new(),
        };

        let context = render_context(&cascade.batch, cascade.provenance, acquired_at, &headlines);
        let verdict = self.gate.evaluate(&cascade.batch);

        for finding in &verdict.tolerated {
            tracing::warn!(finding = %finding, "tolerated data finding");
        }

        Ok(Acquisition {
            run_id,
            acquired_at,
            cascade,
            headlines,
            context,
            verdict,
        })
    }

    /// Full run. Only cascade exhaustion is an error.
    pub async fn run(&self, symbols: &[Symbol]) -> Result<SessionReport, CascadeExhausted> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("session", run_id = %run_id);
        self.run_inner(run_id, symbols).instrument(span).await
    }

    async fn run_inner(
        &self,
        run_id: Uuid,
        symbols: &[Symbol],
    ) -> Result<SessionReport, CascadeExhausted> {
        let started = Instant::now();
        tracing::info!(symbols = symbols.len(), "run started");

        let acquisition = self.acquire_with_id(run_id, symbols).await?;
        let outcome = self.hand_off(&acquisition).await;

        tracing::info!(
            provenance = %acquisition.provenance(),
            outcome = outcome.label(),
            summary = %acquisition.verdict.summary,
            "run finished"
        );
        Ok(SessionReport {
            acquisition,
            outcome,
            latency_ms: started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64,
        })
    }

    async fn hand_off(&self, acquisition: &Acquisition) -> SessionOutcome {
        let verdict = &acquisition.verdict;
        if !verdict.ok {
            for issue in &verdict.issues {
                tracing::warn!(issue = %issue, "gate finding");
            }
            tracing::warn!(summary = %verdict.summary, "batch rejected, skipping generation and publishing");
            return SessionOutcome::Rejected {
                issues: verdict.issues.clone(),
            };
        }

        let report = match self.generator.generate(&acquisition.context).await {
            Ok(report) => report,
            Err(error) => {
                tracing::error!(%error, "report generation failed");
                return SessionOutcome::GenerationFailed {
                    error: error.to_string(),
                };
            }
        };

        match self.publisher.publish(&report).await {
            Ok(()) => SessionOutcome::Published { report },
            Err(error) => {
                tracing::error!(%error, "publishing failed");
                SessionOutcome::PublishFailed {
                    report,
                    error: error.to_string(),
                }
            }
        }
    }
}
