use crate::config::Config;
use crate::error::AppError;
use crate::models::summary::RunSummary;
use crate::pipeline::{Pipeline, PipelineSettings};
use crate::shutdown::{drain_within, spawn_signal_listener};
use crate::validation::dnsmx::{DnsMxLookup, MxLookup};
use chrono::Utc;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How a run ended. Every variant maps to exit code 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// All input was processed.
    Completed(RunSummary),
    /// A signal arrived and the pipeline drained in time.
    Interrupted(RunSummary),
    /// A signal arrived and the drain deadline passed first.
    Abandoned,
    /// The configured expiry has passed; nothing was done.
    Expired,
}

/// Opens the configured files, installs the signal listener, and runs the
/// pipeline against the system DNS resolver.
///
/// # Errors
/// Setup failures ([`AppError::OpenInput`], [`AppError::CreateOutput`]) are
/// returned before any lookup happens. Pipeline and summary errors are
/// passed through.
pub async fn run(config: &Config) -> Result<RunStatus, AppError> {
    if check_expiry(config) {
        return Ok(RunStatus::Expired);
    }

    let input = File::open(&config.input)
        .await
        .map_err(|source| AppError::OpenInput {
            path: config.input.clone(),
            source,
        })?;
    let output = File::create(&config.output)
        .await
        .map_err(|source| AppError::CreateOutput {
            path: config.output.clone(),
            source,
        })?;

    let lookup: Arc<dyn MxLookup> = Arc::new(DnsMxLookup::new(config.dns));
    let shutdown = CancellationToken::new();
    let listener = spawn_signal_listener(shutdown.clone());

    let status = run_with(config, lookup, BufReader::new(input), output, shutdown.clone()).await;

    listener.abort();
    status
}

/// Runs the pipeline over already opened streams.
///
/// Split from [`run`] so the whole flow, including the expiry gate, the drain
/// deadline and the summary file, can run against in-memory streams.
pub async fn run_with<R, W>(
    config: &Config,
    lookup: Arc<dyn MxLookup>,
    input: R,
    output: W,
    shutdown: CancellationToken,
) -> Result<RunStatus, AppError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    if check_expiry(config) {
        return Ok(RunStatus::Expired);
    }

    let started_at = Utc::now();
    let pipeline = Pipeline::new(
        PipelineSettings {
            workers: config.workers,
            batch_size: config.batch_size,
            echo: config.echo,
        },
        lookup,
        shutdown.clone(),
    );

    let run = pipeline.run(input, output);
    let Some(result) = drain_within(run, &shutdown, config.drain_timeout).await else {
        return Ok(RunStatus::Abandoned);
    };
    let (report, _sink) = result?;

    let summary = RunSummary::finish(
        started_at,
        report.submitted,
        report.stats.valid,
        report.stats.invalid,
        report.cancelled,
    );
    if let Some(path) = &config.summary {
        summary.write_to(path).await?;
        info!(path = %path.display(), "run summary written");
    }

    if summary.cancelled {
        warn!(
            unresolved = summary.unresolved,
            "run interrupted; unresolved addresses were not written"
        );
        Ok(RunStatus::Interrupted(summary))
    } else {
        Ok(RunStatus::Completed(summary))
    }
}

fn check_expiry(config: &Config) -> bool {
    if config.expiry.is_expired() {
        info!(
            expires_at = ?config.expiry.expires_at(),
            "configured expiry has passed; skipping validation"
        );
        return true;
    }
    false
}
