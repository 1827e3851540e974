use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors that end a run.
///
/// Per-address DNS failures are not represented here; they are recovered in
/// the workers and surface as [`crate::models::outcome::Outcome::Invalid`].
#[derive(Debug, Error)]
pub enum AppError {
    /// The input list could not be opened.
    #[error("cannot open input file {}: {source}", .path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The output file could not be created or truncated.
    #[error("cannot create output file {}: {source}", .path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Reading the input failed part way through.
    #[error("failed to read input: {0}")]
    InputRead(#[source] io::Error),

    /// Writing an accepted address to the output sink failed.
    #[error("failed to write output: {0}")]
    OutputWrite(#[source] io::Error),

    #[error("failed to write run summary to {}: {source}", .path.display())]
    SummaryWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode run summary: {0}")]
    SummaryEncode(#[from] serde_json::Error),

    /// A pipeline task panicked or was aborted.
    #[error("pipeline task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
