mod acquire;
mod debug_document;
mod run;
mod snapshot;

use std::process::ExitCode;
use std::sync::Arc;

use quotegate_core::{HttpClient, PipelineConfig, ReqwestHttpClient};

use crate::cli::{Cli, Command, SnapshotCommand};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let config = load_config(cli)?;
    tracing::debug!(
        symbols = config.symbols.len(),
        snapshot = %config.snapshot_path.display(),
        "configuration loaded"
    );

    match &cli.command {
        Command::Run => run::run(&config).await,
        Command::Acquire(args) => acquire::run(args, &config).await,
        Command::Snapshot(args) => match args.command {
            SnapshotCommand::Show => snapshot::show(&config),
        },
        Command::DebugDocument(args) => debug_document::run(args, &config).await,
    }
}

/// File (or defaults), then environment, then command-line flags.
fn load_config(cli: &Cli) -> Result<PipelineConfig, CliError> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };
    let mut config = config.with_env_overrides()?;

    if !cli.symbols.is_empty() {
        config = config.with_symbols(cli.symbols.clone());
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_timeout_ms(timeout_ms);
    }

    config.validate()?;
    Ok(config)
}

fn http_client(config: &PipelineConfig) -> Arc<dyn HttpClient> {
    Arc::new(ReqwestHttpClient::new(&config.user_agent))
}
