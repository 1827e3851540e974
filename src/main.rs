use anyhow::Context;
use clap::Parser;
use mx_sanitizer::app::{self, RunStatus};
use mx_sanitizer::config::{Cli, Config};
use mx_sanitizer::telemetry;
use std::process::ExitCode;
use tracing::{error, info};

/// MX Sanitizer Entry Point
///
/// Reads a list of email addresses, keeps those whose domain publishes an MX
/// record, and writes them as `address:mx-host` lines.
///
/// # Configuration
/// - Flags are documented by `--help`; each one can also be set through its
///   `MX_SANITIZER_*` environment variable
/// - Environment variables are loaded from `.env` (if present)
/// - Log verbosity follows `RUST_LOG` (default `info`)
///
/// # Exit codes
/// - `0`: completed, interrupted, or past the configured expiry
/// - `1`: setup, input, output, or summary failure
/// - `130`: a second interrupt arrived while draining
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    telemetry::init_tracing();

    let config = Config::from(Cli::parse());

    match try_main(&config).await {
        Ok(status) => {
            if let RunStatus::Completed(summary) | RunStatus::Interrupted(summary) = &status {
                info!(
                    submitted = summary.submitted,
                    valid = summary.valid,
                    invalid = summary.invalid,
                    unresolved = summary.unresolved,
                    "done"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn try_main(config: &Config) -> anyhow::Result<RunStatus> {
    app::run(config)
        .await
        .with_context(|| format!("validating addresses from {}", config.input.display()))
}
