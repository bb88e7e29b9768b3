use std::process::ExitCode;

use quotegate_core::{PipelineConfig, Session, SessionOutcome};

use crate::error::CliError;

// Collaborator failures are not gate rejections; they get their own code.
const COLLABORATOR_FAILED: u8 = 5;

pub async fn run(config: &PipelineConfig) -> Result<ExitCode, CliError> {
    let symbols = config.parsed_symbols()?;
    let session = Session::from_config(config, super::http_client(config))?;

    let report = session.run(&symbols).await?;
    let acquisition = &report.acquisition;

    println!(
        "run {}: {} via {} in {} ms ({})",
        acquisition.run_id,
        report.outcome.label(),
        acquisition.provenance(),
        report.latency_ms,
        acquisition.verdict.summary
    );
    for warning in &acquisition.cascade.warnings {
        println!("warning: {warning}");
    }

    match &report.outcome {
        SessionOutcome::Published { report } => {
            println!("{report}");
            Ok(ExitCode::SUCCESS)
        }
        SessionOutcome::Rejected { issues } => {
            for issue in issues {
                println!("rejected: {issue}");
            }
            Ok(ExitCode::SUCCESS)
        }
        SessionOutcome::GenerationFailed { error } | SessionOutcome::PublishFailed { error, .. } => {
            eprintln!("error: {error}");
            Ok(ExitCode::from(COLLABORATOR_FAILED))
        }
    }
}
