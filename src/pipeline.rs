use crate::collector::{Collector, CollectorStats};
use crate::error::AppError;
use crate::job_queue::{Feeder, intake_queue};
use crate::validation::dnsmx::MxLookup;
use crate::worker::WorkerPool;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Knobs the pipeline needs from the run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub workers: usize,
    pub batch_size: usize,
    pub echo: bool,
}

/// What one pipeline pass produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineReport {
    /// Addresses the feeder enqueued.
    pub submitted: usize,
    /// Addresses the workers resolved.
    pub resolved: usize,
    pub stats: CollectorStats,
    /// Whether the external shutdown token fired during the run.
    pub cancelled: bool,
}

/// Feeder → intake queue → worker pool → outcome channel → collector.
pub struct Pipeline {
    settings: PipelineSettings,
    lookup: Arc<dyn MxLookup>,
    shutdown: CancellationToken,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings,
        lookup: Arc<dyn MxLookup>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            settings,
            lookup,
            shutdown,
        }
    }

    /// Validates every address in `input` and writes the accepted ones to
    /// `sink`.
    ///
    /// All stages run as separate tasks against a child of the shutdown
    /// token. A fatal error in the feeder or collector cancels that child so
    /// the remaining stages wind down; an external cancellation stops the
    /// feeder, lets each worker finish its current address, and lets the
    /// collector flush what it already has.
    ///
    /// # Returns
    /// The run report and the flushed sink.
    ///
    /// # Errors
    /// The first of [`AppError::InputRead`], [`AppError::OutputWrite`] or
    /// [`AppError::Task`] encountered.
    pub async fn run<R, W>(&self, input: R, sink: W) -> Result<(PipelineReport, W), AppError>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let run_token = self.shutdown.child_token();
        let (intake_tx, intake_rx) = intake_queue(self.settings.workers);
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = oneshot::channel();

        info!(
            workers = self.settings.workers,
            batch_size = self.settings.batch_size,
            "starting validation pipeline"
        );

        let feeder = Feeder::new(input, self.settings.batch_size);
        let feeder_token = run_token.clone();
        let feeder_task = tokio::spawn(async move {
            let result = feeder.run(intake_tx, feeder_token.clone()).await;
            match &result {
                Ok(enqueued) => {
                    let _ = count_tx.send(*enqueued);
                }
                Err(e) => {
                    error!(error = %e, "feeder failed; stopping pipeline");
                    feeder_token.cancel();
                }
            }
            result
        });

        let pool = WorkerPool::spawn(
            self.settings.workers,
            self.lookup.clone(),
            intake_rx,
            outcome_tx,
            run_token.clone(),
        );
        debug!(workers = pool.size(), "worker pool started");

        let collector = Collector::new(sink, self.settings.echo);
        let collector_token = run_token.clone();
        let collector_task = tokio::spawn(async move {
            let result = collector.run(outcome_rx, count_rx).await;
            if let Err(e) = &result {
                error!(error = %e, "collector failed; stopping pipeline");
                collector_token.cancel();
            }
            result
        });

        let collected = collector_task.await?;
        let resolved = pool.join().await?;
        let submitted = feeder_task.await?;

        let submitted = submitted?;
        let (stats, sink) = collected?;

        let report = PipelineReport {
            submitted,
            resolved,
            stats,
            cancelled: self.shutdown.is_cancelled(),
        };
        info!(
            submitted = report.submitted,
            valid = report.stats.valid,
            invalid = report.stats.invalid,
            cancelled = report.cancelled,
            "validation pipeline finished"
        );

        Ok((report, sink))
    }
}

#[cfg(test)]
#[path = "pipeline_test.rs"]
mod pipeline_test;
