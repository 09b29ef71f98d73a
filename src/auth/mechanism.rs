//! Authentication mechanism names and inference

use crate::metrics::labels;
use crate::Error;

/// Authentication mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMechanism {
    /// Credentials sent in the clear; requires a confidential channel
    Plain,
    /// Salted SHA-1 challenge/response proof
    Mysql41,
    /// Proof against a server-side memory cache populated out-of-band.
    ///
    /// Authentication fails with an access-denied classification when the
    /// server holds no cached entry for the principal; the client cannot
    /// detect this in advance.
    Sha256Memory,
}

impl AuthMechanism {
    /// Infer the mechanism for a channel.
    ///
    /// Confidential channels (TLS or a local socket) use `PLAIN`; everything
    /// else uses a hashed proof so the raw secret never crosses the wire.
    pub fn infer(confidential: bool) -> Self {
        if confidential {
            Self::Plain
        } else {
            Self::Mysql41
        }
    }

    /// Wire name of the mechanism
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Mysql41 => "MYSQL41",
            Self::Sha256Memory => "SHA256_MEMORY",
        }
    }

    /// Metric label for the mechanism
    pub(crate) fn metric_label(&self) -> &'static str {
        match self {
            Self::Plain => labels::MECHANISM_PLAIN,
            Self::Mysql41 => labels::MECHANISM_MYSQL41,
            Self::Sha256Memory => labels::MECHANISM_SHA256_MEMORY,
        }
    }
}

impl std::fmt::Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthMechanism {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "MYSQL41" => Ok(Self::Mysql41),
            "SHA256_MEMORY" => Ok(Self::Sha256Memory),
            _ => Err(Error::Config(format!(
                "invalid auth mechanism '{}': expected PLAIN, MYSQL41, or SHA256_MEMORY",
                s
            ))),
        }
    }
}
