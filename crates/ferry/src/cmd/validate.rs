//! Validate command - check configuration before a run

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use ferry_config::validate_credentials;
use ferry_pipeline::{FileProgressStore, ProgressStore};
use ferry_sinks::build_collector;
use ferry_sources::build_source;

use super::{expected_columns, load_config};

/// Validate command arguments
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also open the source at the committed cursor and check its columns
    #[arg(long)]
    pub check_source: bool,
}

pub async fn run(config_path: &Path, args: ValidateArgs) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    validate_credentials(&config).context("sink credentials")?;
    build_collector(&config.sink).context("collector configuration")?;

    println!("pipeline:   {}", config.pipeline.name);
    println!("source:     {}", config.source.type_name());
    println!(
        "sink:       {}{}",
        config.sink.payload_type.as_str(),
        if config.sink.dry_run { " (dry run)" } else { "" }
    );
    println!(
        "batch:      {} hits / {} bytes",
        config.batch.max_hits, config.batch.max_bytes
    );

    if args.check_source {
        let store = FileProgressStore::new(&config.progress.dir);
        let committed = store
            .load(&config.pipeline.name)
            .context("failed to load committed cursor")?;
        let mut source = build_source(&config.source, expected_columns(&config))
            .context("failed to build source")?;
        let cursor = source
            .open(committed)
            .await
            .context("source check failed")?;
        println!("source ok:  {} at {}", source.describe(), cursor);
    }

    println!("configuration ok");
    Ok(ExitCode::SUCCESS)
}
