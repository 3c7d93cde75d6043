//! Fatal configuration errors.
//!
//! Anything in here aborts the run: there is no meaningful partial result
//! without a valid address source. Per-candidate network failures are not
//! modelled here, they never leave the probing stage.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("'{input}' is neither an IP address nor a CIDR prefix")]
    Invalid { input: String },

    #[error("invalid prefix length in '{input}': {reason}")]
    Prefix { input: String, reason: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuotaError {
    #[error("quota is empty")]
    Empty,

    #[error("invalid quota '{input}', expected n, n+m or n-m")]
    Malformed { input: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read range file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Range(#[from] RangeError),
}
