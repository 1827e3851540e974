use crate::error::AppError;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Addresses handed to one worker as a single queue item.
pub type Batch = Vec<String>;

/// Producer half of the intake queue. Only the [`Feeder`] holds one, so the
/// queue closes exactly when the feeder returns.
pub type IntakeSender = mpsc::Sender<Batch>;

/// Consumer half of the intake queue, shared by every worker.
///
/// The inner receiver is locked only while claiming the next batch, so a
/// worker resolving addresses never blocks the others from claiming.
#[derive(Clone)]
pub struct IntakeReceiver {
    inner: Arc<Mutex<mpsc::Receiver<Batch>>>,
}

impl IntakeReceiver {
    /// Waits for the next batch. `None` once the queue is closed and drained.
    pub async fn claim(&self) -> Option<Batch> {
        let mut rx = self.inner.lock().await;
        rx.recv().await
    }
}

/// Creates the bounded intake queue holding at most `capacity` batches.
pub fn intake_queue(capacity: usize) -> (IntakeSender, IntakeReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        tx,
        IntakeReceiver {
            inner: Arc::new(Mutex::new(rx)),
        },
    )
}

/// Streams addresses from a line-delimited source into the intake queue.
pub struct Feeder<R> {
    reader: R,
    batch_size: usize,
}

impl<R> Feeder<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: R, batch_size: usize) -> Self {
        Self {
            reader,
            batch_size: batch_size.max(1),
        }
    }

    /// Reads every line, trims it, skips blanks, and enqueues the rest in
    /// batches of `batch_size`, waiting whenever the queue is full.
    ///
    /// Lines are decoded lossily: bytes that are not UTF-8 become U+FFFD and
    /// the line is still submitted, so it fails its own lookup instead of
    /// ending the run.
    ///
    /// Consumes `queue`; dropping it on return is what closes the intake
    /// queue for the workers.
    ///
    /// # Returns
    /// The exact number of addresses enqueued. On cancellation, or when every
    /// worker has gone away, this is the count enqueued so far; a partially
    /// filled batch is discarded and not counted.
    ///
    /// # Errors
    /// [`AppError::InputRead`] if the source itself fails mid-stream.
    pub async fn run(
        self,
        queue: IntakeSender,
        shutdown: CancellationToken,
    ) -> Result<usize, AppError> {
        let mut lines = self.reader.split(b'\n');
        let mut batch = Batch::with_capacity(self.batch_size);
        let mut enqueued = 0;

        loop {
            let line = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!(enqueued, "feeder cancelled");
                    return Ok(enqueued);
                }
                line = lines.next_segment() => line.map_err(AppError::InputRead)?,
            };

            let Some(line) = line else { break };
            let line = String::from_utf8_lossy(&line);
            let address = line.trim();
            if address.is_empty() {
                continue;
            }

            batch.push(address.to_owned());
            if batch.len() == self.batch_size {
                let full = std::mem::replace(&mut batch, Batch::with_capacity(self.batch_size));
                match submit(&queue, full, &shutdown).await {
                    Some(sent) => enqueued += sent,
                    None => return Ok(enqueued),
                }
            }
        }

        if !batch.is_empty() {
            if let Some(sent) = submit(&queue, batch, &shutdown).await {
                enqueued += sent;
            }
        }

        debug!(enqueued, "feeder reached end of input");
        Ok(enqueued)
    }
}

/// Sends one batch, giving up on cancellation or a closed queue.
async fn submit(
    queue: &IntakeSender,
    batch: Batch,
    shutdown: &CancellationToken,
) -> Option<usize> {
    let len = batch.len();
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => None,
        sent = queue.send(batch) => sent.ok().map(|()| len),
    }
}

#[cfg(test)]
#[path = "job_queue_tests.rs"]
mod tests;
