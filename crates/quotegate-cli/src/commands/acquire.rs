use std::process::ExitCode;

use serde::Serialize;

use quotegate_core::{
    Acquisition, PipelineConfig, Provenance, QuoteRecord, Session, Symbol, UtcDateTime,
    ValidationVerdict,
};

use crate::cli::{AcquireArgs, OutputFormat};
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct AcquireResponseData<'a> {
    run_id: String,
    acquired_at: UtcDateTime,
    provenance: Provenance,
    chain: &'a [Provenance],
    quotes: &'a [QuoteRecord],
    missing: Vec<&'a Symbol>,
    headlines: &'a [String],
    verdict: &'a ValidationVerdict,
    warnings: &'a [String],
    failures: Vec<String>,
    latency_ms: u64,
}

impl<'a> AcquireResponseData<'a> {
    fn from_acquisition(acquisition: &'a Acquisition) -> Self {
        let cascade = &acquisition.cascade;
        Self {
            run_id: acquisition.run_id.to_string(),
            acquired_at: acquisition.acquired_at,
            provenance: cascade.provenance,
            chain: &cascade.chain,
            quotes: cascade.batch.records(),
            missing: cascade.batch.missing(),
            headlines: &acquisition.headlines,
            verdict: &acquisition.verdict,
            warnings: &cascade.warnings,
            failures: cascade.failures.iter().map(ToString::to_string).collect(),
            latency_ms: cascade.latency_ms,
        }
    }
}

pub async fn run(args: &AcquireArgs, config: &PipelineConfig) -> Result<ExitCode, CliError> {
    let symbols = config.parsed_symbols()?;
    let session = Session::from_config(config, super::http_client(config))?;
    let acquisition = session.acquire(&symbols).await?;

    match args.format {
        OutputFormat::Text => print!(
            "{}",
            render_verdict(
                &acquisition.context,
                &acquisition.verdict,
                &acquisition.cascade.warnings,
            )
        ),
        OutputFormat::Json => {
            let data = AcquireResponseData::from_acquisition(&acquisition);
            let json = if args.pretty {
                serde_json::to_string_pretty(&data)?
            } else {
                serde_json::to_string(&data)?
            };
            println!("{json}");
        }
    }

    // A rejected batch is a clean outcome, not a failure.
    Ok(ExitCode::SUCCESS)
}

fn render_verdict(context: &str, verdict: &ValidationVerdict, warnings: &[String]) -> String {
    let mut out = context.to_owned();
    out.push_str("[verdict]\n");
    out.push_str(&format!("summary: {}\n", verdict.summary));
    for issue in &verdict.issues {
        out.push_str(&format!("issue: {issue}\n"));
    }
    for finding in &verdict.tolerated {
        out.push_str(&format!("tolerated: {finding}\n"));
    }
    for warning in warnings {
        out.push_str(&format!("warning: {warning}\n"));
    }
    out
}
