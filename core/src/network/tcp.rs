use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::ProbeError;

/// Time taken to complete one TCP handshake. The stream is dropped right away.
pub async fn handshake_latency(
    socket_addr: SocketAddr,
    connect_timeout: Duration,
) -> Result<Duration, ProbeError> {
    let started: Instant = Instant::now();

    match timeout(connect_timeout, TcpStream::connect(socket_addr)).await {
        Ok(Ok(_stream)) => Ok(started.elapsed()),
        Ok(Err(source)) => Err(ProbeError::Connect {
            addr: socket_addr,
            source,
        }),
        Err(_elapsed) => Err(ProbeError::Timeout { addr: socket_addr }),
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
