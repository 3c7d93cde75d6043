use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use edgeprobe_common::config::ProbeConfig;
use edgeprobe_common::measurement::ProbeResult;
use tracing::trace;

use super::Probe;
use super::http::HttpProbe;
use crate::network::tcp::handshake_latency;

/// Times `ping_times` TCP handshakes against the configured port.
pub struct TcpProbe {
    port: u16,
    ping_times: u32,
    connect_timeout: Duration,
    /// Extra HEAD request that only labels the datacenter.
    colo: Option<HttpProbe>,
}

impl TcpProbe {
    pub fn new(config: &ProbeConfig, colo: Option<HttpProbe>) -> Self {
        Self {
            port: config.port,
            ping_times: config.ping_times,
            connect_timeout: config.connect_timeout,
            colo,
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn probe(&self, addr: IpAddr) -> ProbeResult {
        let socket_addr: SocketAddr = SocketAddr::new(addr, self.port);
        let mut received: u32 = 0;
        let mut total: Duration = Duration::ZERO;

        for attempt in 0..self.ping_times {
            match handshake_latency(socket_addr, self.connect_timeout).await {
                Ok(latency) => {
                    received += 1;
                    total += latency;
                }
                Err(e) => trace!("{socket_addr} attempt {attempt}: {e}"),
            }
        }

        let result: ProbeResult = ProbeResult::new(addr, self.ping_times, received, total);
        match &self.colo {
            Some(lookup) if result.is_reachable() => result.with_colo(lookup.lookup_colo(addr).await),
            _ => result,
        }
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
