use crate::error::AppError;
use crate::models::outcome::Outcome;
use std::io::Write;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// Tallies of the outcomes a collector consumed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectorStats {
    pub received: usize,
    pub valid: usize,
    pub invalid: usize,
}

/// Sole owner of the output sink. Writes each valid outcome as one
/// `address:host` line, in the order outcomes arrive.
pub struct Collector<W>
where
    W: AsyncWrite + Unpin,
{
    sink: BufWriter<W>,
    echo: Option<Box<dyn Write + Send>>,
}

impl<W> Collector<W>
where
    W: AsyncWrite + Unpin,
{
    /// `echo` also prints every accepted line to stdout.
    pub fn new(sink: W, echo: bool) -> Self {
        let collector = Self {
            sink: BufWriter::new(sink),
            echo: None,
        };
        if echo {
            collector.with_echo(std::io::stdout())
        } else {
            collector
        }
    }

    /// Echoes accepted lines to `console` instead of stdout.
    ///
    /// The echo is best-effort: the first failed write (a closed pipe, say)
    /// turns it off and the output file keeps being written.
    pub fn with_echo(mut self, console: impl Write + Send + 'static) -> Self {
        self.echo = Some(Box::new(console));
        self
    }

    /// Consumes outcomes until the feeder's count is reached or the outcome
    /// channel closes, then flushes the sink.
    ///
    /// `expected` carries the number of addresses the feeder actually
    /// enqueued. Until it arrives the collector keeps reading. If the feeder
    /// ends without reporting (failure or cancellation), the collector stops
    /// when the last worker drops its sender.
    ///
    /// # Returns
    /// The tallies and the underlying sink, flushed.
    ///
    /// # Errors
    /// [`AppError::OutputWrite`] on the first failed write or flush.
    pub async fn run(
        mut self,
        mut outcomes: mpsc::UnboundedReceiver<Outcome>,
        mut expected: oneshot::Receiver<usize>,
    ) -> Result<(CollectorStats, W), AppError> {
        let mut stats = CollectorStats::default();
        let mut target: Option<usize> = None;
        let mut feeder_reported = false;

        loop {
            if target.is_some_and(|n| stats.received >= n) {
                break;
            }

            tokio::select! {
                count = &mut expected, if !feeder_reported => {
                    feeder_reported = true;
                    match count {
                        Ok(n) => {
                            debug!(expected = n, "feeder reported submitted count");
                            target = Some(n);
                        }
                        Err(_) => debug!("feeder ended without reporting a count"),
                    }
                }
                outcome = outcomes.recv() => match outcome {
                    Some(outcome) => self.record(outcome, &mut stats).await?,
                    None => {
                        if let Some(n) = target.filter(|n| stats.received < *n) {
                            warn!(
                                expected = n,
                                received = stats.received,
                                "outcome channel closed before every address was resolved"
                            );
                        }
                        break;
                    }
                },
            }
        }

        self.sink.flush().await.map_err(AppError::OutputWrite)?;
        Ok((stats, self.sink.into_inner()))
    }

    async fn record(
        &mut self,
        outcome: Outcome,
        stats: &mut CollectorStats,
    ) -> Result<(), AppError> {
        stats.received += 1;
        match outcome {
            Outcome::Valid(annotated) => {
                let line = annotated.to_string();
                self.echo_line(&line);
                self.sink
                    .write_all(line.as_bytes())
                    .await
                    .map_err(AppError::OutputWrite)?;
                self.sink.write_all(b"\n").await.map_err(AppError::OutputWrite)?;
                stats.valid += 1;
            }
            Outcome::Invalid { .. } => stats.invalid += 1,
        }
        Ok(())
    }

    fn echo_line(&mut self, line: &str) {
        let Some(console) = self.echo.as_mut() else {
            return;
        };
        if let Err(e) = writeln!(console, "{line}").and_then(|()| console.flush()) {
            warn!(error = %e, "console echo failed; continuing without it");
            self.echo = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::outcome::AnnotatedAddress;
    use crate::validation::dnsmx::ResolveError;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn valid(address: &str, host: &str) -> Outcome {
        Outcome::Valid(AnnotatedAddress::new(address, host))
    }

    fn invalid(address: &str) -> Outcome {
        Outcome::Invalid {
            address: address.to_string(),
            reason: ResolveError::NoMxRecord {
                domain: "example.invalid".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_writes_only_valid_outcomes_in_arrival_order() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = oneshot::channel();

        tx.send(valid("b@example.com", "mx.example.com")).unwrap();
        tx.send(invalid("x@example.invalid")).unwrap();
        tx.send(valid("a@example.com", "mx.example.com")).unwrap();
        count_tx.send(3).unwrap();

        let (stats, sink) = Collector::new(Vec::new(), false)
            .run(rx, count_rx)
            .await
            .unwrap();

        assert_eq!(
            stats,
            CollectorStats {
                received: 3,
                valid: 2,
                invalid: 1
            }
        );
        assert_eq!(
            String::from_utf8(sink).unwrap(),
            "b@example.com:mx.example.com\na@example.com:mx.example.com\n"
        );
    }

    #[tokio::test]
    async fn test_stops_at_reported_count_while_senders_remain() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = oneshot::channel();

        tx.send(valid("a@example.com", "mx.example.com")).unwrap();
        tx.send(invalid("b@example.invalid")).unwrap();
        count_tx.send(2).unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            Collector::new(Vec::new(), false).run(rx, count_rx),
        )
        .await
        .expect("collector should stop once the reported count is reached");

        let (stats, _) = result.unwrap();
        assert_eq!(stats.received, 2);
        drop(tx);
    }

    #[tokio::test]
    async fn test_waits_for_outcomes_beyond_those_already_queued() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = oneshot::channel();
        count_tx.send(2).unwrap();
        tx.send(valid("a@example.com", "mx.example.com")).unwrap();

        let collector = tokio::spawn(Collector::new(Vec::new(), false).run(rx, count_rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!collector.is_finished());

        tx.send(valid("b@example.com", "mx.example.com")).unwrap();
        let (stats, sink) = collector.await.unwrap().unwrap();

        assert_eq!(stats.valid, 2);
        assert_eq!(sink.iter().filter(|b| **b == b'\n').count(), 2);
    }

    #[tokio::test]
    async fn test_zero_count_finishes_immediately() {
        let (_tx, rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = oneshot::channel();
        count_tx.send(0).unwrap();

        let (stats, sink) = Collector::new(Vec::new(), false)
            .run(rx, count_rx)
            .await
            .unwrap();

        assert_eq!(stats, CollectorStats::default());
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_channel_close_without_count_drains() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = oneshot::channel::<usize>();
        drop(count_tx);

        tx.send(valid("a@example.com", "mx.example.com")).unwrap();
        drop(tx);

        let (stats, sink) = Collector::new(Vec::new(), false)
            .run(rx, count_rx)
            .await
            .unwrap();

        assert_eq!(stats.valid, 1);
        assert_eq!(sink, b"a@example.com:mx.example.com\n");
    }

    /// Console that accepts `budget` writes and then reports a broken pipe.
    struct ClosingConsole {
        budget: usize,
        written: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for ClosingConsole {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::Error::from(io::ErrorKind::BrokenPipe));
            }
            self.budget -= 1;
            self.written.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_echo_goes_to_console() {
        let written = Arc::new(Mutex::new(Vec::new()));
        let console = ClosingConsole {
            budget: usize::MAX,
            written: written.clone(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = oneshot::channel();
        tx.send(valid("a@example.com", "mx.example.com")).unwrap();
        tx.send(invalid("b@example.invalid")).unwrap();
        count_tx.send(2).unwrap();

        Collector::new(Vec::new(), false)
            .with_echo(console)
            .run(rx, count_rx)
            .await
            .unwrap();

        assert_eq!(*written.lock().unwrap(), b"a@example.com:mx.example.com\n");
    }

    #[tokio::test]
    async fn test_broken_console_does_not_stop_the_output() {
        let console = ClosingConsole {
            budget: 0,
            written: Arc::new(Mutex::new(Vec::new())),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = oneshot::channel();
        tx.send(valid("a@example.com", "mx.example.com")).unwrap();
        tx.send(valid("b@example.com", "mx.example.com")).unwrap();
        count_tx.send(2).unwrap();

        let (stats, sink) = Collector::new(Vec::new(), false)
            .with_echo(console)
            .run(rx, count_rx)
            .await
            .unwrap();

        assert_eq!(stats.valid, 2);
        assert_eq!(
            String::from_utf8(sink).unwrap(),
            "a@example.com:mx.example.com\nb@example.com:mx.example.com\n"
        );
    }

    #[tokio::test]
    async fn test_write_failure_is_fatal() {
        let sink = tokio_test::io::Builder::new()
            .write_error(io::Error::other("disk full"))
            .build();
        let (tx, rx) = mpsc::unbounded_channel();
        let (count_tx, count_rx) = oneshot::channel();
        tx.send(valid("a@example.com", "mx.example.com")).unwrap();
        count_tx.send(1).unwrap();

        let result = Collector::new(sink, false).run(rx, count_rx).await;
        assert!(matches!(result, Err(AppError::OutputWrite(_))));
    }
}
