use std::net::SocketAddr;

use thiserror::Error;

/// Why a single candidate failed a probe or download.
///
/// These never abort a run; the candidate is dropped or ranked last.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("connect to {addr} timed out")]
    Timeout { addr: SocketAddr },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("status {status} is not accepted")]
    Status { status: u16 },

    #[error("datacenter {} is not accepted", colo.as_deref().unwrap_or("<none>"))]
    Colo { colo: Option<String> },

    #[error("invalid url '{url}': {reason}")]
    Url { url: String, reason: String },
}
