use crate::validation::dnsmx::ResolveError;
use std::fmt;

/// An address that passed the MX check, paired with the mail host that
/// accepted responsibility for its domain.
///
/// Displays as `address:host`, which is also the output file line format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedAddress {
    address: String,
    host: String,
}

impl AnnotatedAddress {
    pub fn new(address: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            host: host.into(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

impl fmt::Display for AnnotatedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.host)
    }
}

/// Result of validating one address. Exactly one is produced for every
/// address a worker claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Valid(AnnotatedAddress),
    Invalid {
        address: String,
        reason: ResolveError,
    },
}

impl Outcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, Outcome::Valid(_))
    }
}
