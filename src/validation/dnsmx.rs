use crate::models::outcome::AnnotatedAddress;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{ResolverConfig, ResolverOpts},
    error::{ResolveError as DnsError, ResolveErrorKind},
    proto::op::ResponseCode,
    system_conf,
};

/// Why an address was classified invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The MX query itself failed: NXDOMAIN, timeout, or a network error.
    #[error("MX lookup for {domain} failed: {reason}")]
    LookupFailed { domain: String, reason: String },

    /// The query succeeded but the domain publishes no MX records.
    #[error("mx record is empty for {domain}")]
    NoMxRecord { domain: String },
}

/// Source of MX answers.
///
/// Returns the exchange host names in the order the resolver produced them.
/// An empty vector means the domain exists but has no MX records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MxLookup: Send + Sync {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, ResolveError>;
}

/// Resolver tuning applied to every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsSettings {
    pub timeout: Duration,
    pub attempts: usize,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(2),
            attempts: 2,
        }
    }
}

/// [`MxLookup`] backed by the system DNS resolver.
pub struct DnsMxLookup {
    resolver: TokioAsyncResolver,
}

impl DnsMxLookup {
    /// Creates a resolver from the host's resolver configuration.
    ///
    /// Falls back to the library default name servers when the system
    /// configuration cannot be read. Timeout and attempts from `settings`
    /// override whatever the system configuration specifies.
    pub fn new(settings: DnsSettings) -> Self {
        let (config, mut opts) = match system_conf::read_system_conf() {
            Ok(conf) => conf,
            Err(e) => {
                warn!(error = %e, "system resolver configuration unavailable, using defaults");
                (ResolverConfig::default(), ResolverOpts::default())
            }
        };
        opts.timeout = settings.timeout;
        opts.attempts = settings.attempts;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

#[async_trait]
impl MxLookup for DnsMxLookup {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<String>, ResolveError> {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| exchange_host(&mx.exchange().to_utf8()))
                .collect()),
            Err(err) if is_empty_answer(&err) => Ok(Vec::new()),
            Err(err) => Err(ResolveError::LookupFailed {
                domain: domain.to_owned(),
                reason: err.to_string(),
            }),
        }
    }
}

/// The resolver reports an MX-less domain as `NoRecordsFound` with a
/// `NoError` response code. NXDOMAIN arrives as the same kind with a
/// different code and stays a lookup failure.
fn is_empty_answer(err: &DnsError) -> bool {
    matches!(
        err.kind(),
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NoError
    )
}

/// Strips the root label dot from a fully qualified exchange name.
fn exchange_host(name: &str) -> String {
    name.strip_suffix('.').unwrap_or(name).to_owned()
}

/// Returns the part of `address` after the last `@`, or the whole address
/// when there is none.
///
/// No syntax checking happens here; a malformed domain is left for the DNS
/// query to reject.
pub fn domain_of(address: &str) -> &str {
    address
        .rsplit_once('@')
        .map_or(address, |(_, domain)| domain)
}

/// Checks that the domain of `address` publishes an MX record.
///
/// # Arguments
/// * `lookup` - MX source to query; exactly one query is issued
/// * `address` - The candidate address, used verbatim in the result
///
/// # Returns
/// The address annotated with the first host in the answer, in the order the
/// resolver returned them. No priority sort is applied.
///
/// # Errors
/// * [`ResolveError::LookupFailed`] if the query fails
/// * [`ResolveError::NoMxRecord`] if the answer is empty
///
/// # Examples
/// ```no_run
/// # async fn example() {
/// use mx_sanitizer::validation::dnsmx::{DnsMxLookup, DnsSettings, resolve};
///
/// let lookup = DnsMxLookup::new(DnsSettings::default());
/// let annotated = resolve(&lookup, "user@gmail.com").await.unwrap();
/// assert!(annotated.to_string().starts_with("user@gmail.com:"));
/// # }
/// ```
pub async fn resolve<L>(lookup: &L, address: &str) -> Result<AnnotatedAddress, ResolveError>
where
    L: MxLookup + ?Sized,
{
    let domain = domain_of(address);
    let host = lookup
        .lookup_mx(domain)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ResolveError::NoMxRecord {
            domain: domain.to_owned(),
        })?;

    Ok(AnnotatedAddress::new(address, host))
}
