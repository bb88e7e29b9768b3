use std::process::ExitCode;

use quotegate_core::{render_context, PipelineConfig, PlausibilityGate, Provenance, SnapshotStore};

use crate::error::CliError;

pub fn show(config: &PipelineConfig) -> Result<ExitCode, CliError> {
    let store = SnapshotStore::new(&config.snapshot_path);
    let snapshot = store.load_snapshot().ok_or_else(|| CliError::NoSnapshot {
        path: store.path().display().to_string(),
    })?;

    let verdict = PlausibilityGate::new(config.band_table()?).evaluate(&snapshot.batch);

    println!("path: {}", store.path().display());
    println!("saved_at: {}", snapshot.saved_at);
    print!(
        "{}",
        render_context(&snapshot.batch, Provenance::Cached, snapshot.saved_at, &[])
    );
    println!("verdict: {}", verdict.summary);
    for issue in &verdict.issues {
        println!("issue: {issue}");
    }

    Ok(ExitCode::SUCCESS)
}
