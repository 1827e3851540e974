use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Exit status used when a second interrupt cuts the drain short.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Spawns a task that cancels `shutdown` on SIGINT or SIGTERM.
///
/// The first signal starts the graceful drain. A second one exits the process
/// immediately with [`FORCED_EXIT_CODE`]. If the token is cancelled from
/// elsewhere before any signal, the task exits quietly. Once draining, the
/// task lives until the caller aborts it.
pub fn spawn_signal_listener(shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let signals = match os_signals() {
            Ok(signals) => signals,
            Err(e) => {
                error!(error = %e, "failed to install signal handlers");
                return;
            }
        };
        supervise(signals, shutdown, |_| std::process::exit(FORCED_EXIT_CODE)).await;
    })
}

async fn supervise<S, F>(mut signals: S, shutdown: CancellationToken, force_exit: F)
where
    S: Stream<Item = &'static str> + Unpin,
    F: FnOnce(&'static str),
{
    let first = tokio::select! {
        signal = signals.next() => signal,
        _ = shutdown.cancelled() => return,
    };
    let Some(name) = first else { return };

    info!(signal = name, "interrupt received; printing results");
    shutdown.cancel();

    if let Some(name) = signals.next().await {
        warn!(signal = name, "second interrupt received; exiting without draining");
        force_exit(name);
    }
}

#[cfg(unix)]
fn os_signals() -> io::Result<BoxStream<'static, &'static str>> {
    use tokio::signal::unix::{SignalKind, signal as unix_signal};

    let interrupt = unix_signal(SignalKind::interrupt())?;
    let terminate = unix_signal(SignalKind::terminate())?;

    let signals = stream::unfold(
        (interrupt, terminate),
        |(mut interrupt, mut terminate)| async move {
            let name = tokio::select! {
                Some(()) = interrupt.recv() => "SIGINT",
                Some(()) = terminate.recv() => "SIGTERM",
                else => return None,
            };
            Some((name, (interrupt, terminate)))
        },
    );
    Ok(signals.boxed())
}

#[cfg(not(unix))]
fn os_signals() -> io::Result<BoxStream<'static, &'static str>> {
    let signals = stream::unfold((), |()| async {
        tokio::signal::ctrl_c().await.ok().map(|()| ("ctrl-c", ()))
    });
    Ok(signals.boxed())
}

/// Drives `run` to completion, but once `shutdown` fires allows it at most
/// `deadline` more to drain.
///
/// Returns `None` if the deadline elapsed and the work was abandoned.
pub async fn drain_within<F>(
    run: F,
    shutdown: &CancellationToken,
    deadline: Duration,
) -> Option<F::Output>
where
    F: Future,
{
    tokio::pin!(run);

    tokio::select! {
        output = &mut run => Some(output),
        _ = shutdown.cancelled() => match tokio::time::timeout(deadline, &mut run).await {
            Ok(output) => Some(output),
            Err(_) => {
                warn!(?deadline, "drain deadline elapsed; abandoning in-flight work");
                None
            }
        },
    }
}
