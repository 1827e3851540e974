use crate::error::AppError;
use crate::job_queue::IntakeReceiver;
use crate::models::outcome::Outcome;
use crate::validation::dnsmx::{MxLookup, resolve};
use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One validator: claims batches from the intake queue and reports an
/// [`Outcome`] per address.
pub struct ValidationWorker {
    id: usize,
    lookup: Arc<dyn MxLookup>,
    intake: IntakeReceiver,
    outcomes: mpsc::UnboundedSender<Outcome>,
    shutdown: CancellationToken,
}

impl ValidationWorker {
    pub fn new(
        id: usize,
        lookup: Arc<dyn MxLookup>,
        intake: IntakeReceiver,
        outcomes: mpsc::UnboundedSender<Outcome>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            id,
            lookup,
            intake,
            outcomes,
            shutdown,
        }
    }

    /// Runs until the intake queue is closed and empty, the collector hangs
    /// up, or the shutdown token fires.
    ///
    /// Cancellation is checked before each claim and before each address, so
    /// an address whose lookup has started is always finished and reported.
    /// Returns the number of addresses this worker resolved.
    pub async fn start(self) -> usize {
        debug!(worker = self.id, "validation worker started");
        let mut resolved = 0;

        'claim: loop {
            let batch = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                batch = self.intake.claim() => match batch {
                    Some(batch) => batch,
                    None => break,
                },
            };

            for address in batch {
                if self.shutdown.is_cancelled() {
                    break 'claim;
                }

                let outcome = self.validate(address).await;
                resolved += 1;
                if self.outcomes.send(outcome).is_err() {
                    debug!(worker = self.id, "outcome channel closed");
                    break 'claim;
                }
            }
        }

        debug!(worker = self.id, resolved, "validation worker completed");
        resolved
    }

    async fn validate(&self, address: String) -> Outcome {
        match resolve(self.lookup.as_ref(), &address).await {
            Ok(annotated) => {
                debug!(
                    worker = self.id,
                    address = annotated.address(),
                    host = annotated.host(),
                    "address accepted"
                );
                Outcome::Valid(annotated)
            }
            Err(reason) => {
                warn!(worker = self.id, %address, error = %reason, "address rejected");
                Outcome::Invalid { address, reason }
            }
        }
    }
}

/// Fixed set of [`ValidationWorker`] tasks sharing one intake queue and one
/// outcome channel.
pub struct WorkerPool {
    workers: Vec<JoinHandle<usize>>,
}

impl WorkerPool {
    /// Spawns `size` workers (at least one).
    ///
    /// Takes ownership of `outcomes` and hands a clone to each worker, so the
    /// outcome channel closes once the last worker exits.
    pub fn spawn(
        size: usize,
        lookup: Arc<dyn MxLookup>,
        intake: IntakeReceiver,
        outcomes: mpsc::UnboundedSender<Outcome>,
        shutdown: CancellationToken,
    ) -> Self {
        let workers = (0..size.max(1))
            .map(|id| {
                let worker = ValidationWorker::new(
                    id,
                    lookup.clone(),
                    intake.clone(),
                    outcomes.clone(),
                    shutdown.clone(),
                );
                tokio::spawn(worker.start())
            })
            .collect();

        Self { workers }
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Waits for every worker and returns the total number of addresses
    /// resolved.
    pub async fn join(self) -> Result<usize, AppError> {
        let mut total = 0;
        for result in join_all(self.workers).await {
            total += result?;
        }
        Ok(total)
    }
}
