//! Run command - transfer rows from the committed cursor until drained
//!
//! The run summary is printed to stdout as JSON. Exit status is 0 when the
//! source drained (even with failed hits, which the summary lists) and 2
//! when the run aborted.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use ferry_config::validate_credentials;
use ferry_pipeline::{FileProgressStore, PipelineRunner, RunLock};
use ferry_protocol::RunState;
use ferry_sinks::{RetryPolicy, Sender, build_collector};
use ferry_sources::build_source;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{expected_columns, load_config};

/// Exit status for an aborted run
const EXIT_ABORTED: u8 = 2;

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Log payloads instead of sending them
    #[arg(long)]
    pub dry_run: bool,

    /// Print the summary as a single line
    #[arg(long)]
    pub compact: bool,
}

/// Run the pipeline
pub async fn run(config_path: &Path, args: RunArgs) -> Result<ExitCode> {
    let mut config = load_config(config_path)?;
    if args.dry_run {
        config.sink.dry_run = true;
    }
    validate_credentials(&config).context("sink credentials")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pipeline = %config.pipeline.name,
        source = config.source.type_name(),
        dry_run = config.sink.dry_run,
        "ferry starting"
    );

    let _lock = RunLock::acquire(&config.progress.dir, &config.pipeline.name)
        .context("another run of this pipeline may be in progress")?;

    let source =
        build_source(&config.source, expected_columns(&config)).context("failed to build source")?;
    let collector = build_collector(&config.sink).context("failed to build collector")?;
    let sender = Sender::new(collector, RetryPolicy::from(&config.retry));
    let store = Arc::new(FileProgressStore::new(&config.progress.dir));

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("shutdown signal received, stopping after the current batch");
        signal_cancel.cancel();
    });

    let summary = PipelineRunner::new(&config, source, sender, store)
        .run(cancel)
        .await;

    let rendered = if args.compact {
        serde_json::to_string(&summary)
    } else {
        serde_json::to_string_pretty(&summary)
    }
    .context("failed to serialize run summary")?;
    println!("{}", rendered);

    Ok(match summary.state {
        RunState::Drained => ExitCode::SUCCESS,
        _ => ExitCode::from(EXIT_ABORTED),
    })
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
