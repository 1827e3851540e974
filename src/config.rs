use crate::validation::dnsmx::DnsSettings;
use chrono::{DateTime, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line flags. Every flag can also come from the environment (or a
/// `.env` file loaded at startup).
#[derive(Debug, Parser)]
#[command(name = "mx-sanitizer")]
#[command(about = "Keep only the email addresses whose domain publishes an MX record")]
#[command(version)]
pub struct Cli {
    /// Line-delimited list of candidate addresses
    #[arg(short = 'i', long, env = "MX_SANITIZER_INPUT", default_value = "input.csv")]
    pub input: PathBuf,

    /// File receiving one `address:mx-host` line per accepted address
    #[arg(short = 'o', long, env = "MX_SANITIZER_OUTPUT", default_value = "output.csv")]
    pub output: PathBuf,

    /// Addresses handed to a worker per queue item
    #[arg(short = 'b', long, env = "MX_SANITIZER_BATCH_SIZE", default_value_t = 1)]
    pub batch_size: usize,

    /// Number of validation workers (defaults to the number of CPUs)
    #[arg(long, env = "MX_SANITIZER_WORKERS")]
    pub workers: Option<usize>,

    /// Per-query DNS timeout in seconds
    #[arg(long, env = "MX_SANITIZER_DNS_TIMEOUT_SECS", default_value_t = 2)]
    pub dns_timeout_secs: u64,

    /// DNS attempts per query
    #[arg(long, env = "MX_SANITIZER_DNS_ATTEMPTS", default_value_t = 2)]
    pub dns_attempts: usize,

    /// Seconds to wait for in-flight work after an interrupt
    #[arg(long, env = "MX_SANITIZER_DRAIN_TIMEOUT_SECS", default_value_t = 10)]
    pub drain_timeout_secs: u64,

    /// RFC 3339 instant after which the tool refuses to run
    #[arg(long, env = "MX_SANITIZER_EXPIRES_AT")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Write a JSON run summary to this path
    #[arg(long, env = "MX_SANITIZER_SUMMARY")]
    pub summary: Option<PathBuf>,

    /// Do not echo accepted addresses to stdout
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Optional cut-off after which no validation work is done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpiryPolicy {
    expires_at: Option<DateTime<Utc>>,
}

impl ExpiryPolicy {
    pub fn new(expires_at: Option<DateTime<Utc>>) -> Self {
        Self { expires_at }
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// `true` once `now` is on or after the cut-off. Never expires when no
    /// cut-off is configured.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|cutoff| now >= cutoff)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Run configuration, built once from [`Cli`] and passed down by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub output: PathBuf,
    pub batch_size: usize,
    pub workers: usize,
    pub dns: DnsSettings,
    pub drain_timeout: Duration,
    pub expiry: ExpiryPolicy,
    pub summary: Option<PathBuf>,
    pub echo: bool,
}

impl From<Cli> for Config {
    fn from(cli: Cli) -> Self {
        Self {
            input: cli.input,
            output: cli.output,
            batch_size: cli.batch_size.max(1),
            workers: cli.workers.unwrap_or_else(num_cpus::get).max(1),
            dns: DnsSettings {
                timeout: Duration::from_secs(cli.dns_timeout_secs),
                attempts: cli.dns_attempts.max(1),
            },
            drain_timeout: Duration::from_secs(cli.drain_timeout_secs),
            expiry: ExpiryPolicy::new(cli.expires_at),
            summary: cli.summary,
            echo: !cli.quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["mx-sanitizer"];
        argv.extend_from_slice(args);
        Config::from(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);

        assert_eq!(config.input, PathBuf::from("input.csv"));
        assert_eq!(config.output, PathBuf::from("output.csv"));
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.workers, num_cpus::get().max(1));
        assert_eq!(config.dns, DnsSettings::default());
        assert_eq!(config.drain_timeout, Duration::from_secs(10));
        assert_eq!(config.expiry.expires_at(), None);
        assert!(config.summary.is_none());
        assert!(config.echo);
    }

    #[test]
    fn test_short_flags() {
        let config = parse(&["-i", "in.txt", "-o", "out.txt", "-b", "5", "-q"]);

        assert_eq!(config.input, PathBuf::from("in.txt"));
        assert_eq!(config.output, PathBuf::from("out.txt"));
        assert_eq!(config.batch_size, 5);
        assert!(!config.echo);
    }

    #[test]
    fn test_zero_counts_are_clamped() {
        let config = parse(&["--workers", "0", "--batch-size", "0", "--dns-attempts", "0"]);

        assert_eq!(config.workers, 1);
        assert_eq!(config.batch_size, 1);
        assert_eq!(config.dns.attempts, 1);
    }

    #[test]
    fn test_expires_at_parses_rfc3339() {
        let config = parse(&["--expires-at", "2023-09-29T18:00:00Z"]);

        assert_eq!(
            config.expiry.expires_at(),
            Some(Utc.with_ymd_and_hms(2023, 9, 29, 18, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_invalid_expires_at_is_rejected() {
        let result = Cli::try_parse_from(["mx-sanitizer", "--expires-at", "next tuesday"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_expiry_boundary() {
        let cutoff = Utc.with_ymd_and_hms(2023, 9, 29, 18, 0, 0).unwrap();
        let policy = ExpiryPolicy::new(Some(cutoff));

        assert!(!policy.is_expired_at(cutoff - chrono::Duration::seconds(1)));
        assert!(policy.is_expired_at(cutoff));
        assert!(policy.is_expired_at(cutoff + chrono::Duration::days(1)));
    }

    #[test]
    fn test_no_cutoff_never_expires() {
        let policy = ExpiryPolicy::default();
        assert!(!policy.is_expired());
        assert!(!policy.is_expired_at(DateTime::<Utc>::MAX_UTC));
    }
}
