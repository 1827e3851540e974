/// Validates an email address domain by checking its MX records.
///
/// Extracts the domain after the last `@` and issues a single MX query for it:
/// 1. A failed query classifies the address as `LookupFailed`
/// 2. An empty answer classifies it as `NoMxRecord`
/// 3. Otherwise the address is annotated with the first exchange host
///
/// The DNS client sits behind the [`dnsmx::MxLookup`] trait so the pipeline
/// can run against a fixed table in tests.
///
/// # Examples
/// ```no_run
/// # async fn example() {
/// use mx_sanitizer::validation::dnsmx::{DnsMxLookup, DnsSettings, resolve};
///
/// let lookup = DnsMxLookup::new(DnsSettings::default());
/// assert!(resolve(&lookup, "user@gmail.com").await.is_ok());
/// assert!(resolve(&lookup, "user@nonexistent.invalid").await.is_err());
/// # }
/// ```
pub mod dnsmx;
