/// Per-address validation results.
///
/// An [`outcome::Outcome`] is either `Valid`, carrying the address annotated
/// with its first MX host (`user@example.com:mail.example.com`), or
/// `Invalid`, carrying the address and the [`ResolveError`] that rejected it.
///
/// [`ResolveError`]: crate::validation::dnsmx::ResolveError
pub mod outcome;

/// End-of-run totals, serializable to JSON.
pub mod summary;
