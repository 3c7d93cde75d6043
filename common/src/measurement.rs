//! Per-address measurement records and their textual row form.

use std::net::IpAddr;
use std::time::Duration;

/// Bytes in one MB as shown in the result table.
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Latency statistics collected for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub addr: IpAddr,
    sent: u32,
    received: u32,
    total_delay: Duration,
    loss_rate: f32,
    pub colo: Option<String>,
}

impl ProbeResult {
    /// `received` is clamped to `sent`.
    pub fn new(addr: IpAddr, sent: u32, received: u32, total_delay: Duration) -> Self {
        let received: u32 = received.min(sent);
        let loss_rate: f32 = if sent == 0 {
            1.0
        } else {
            (sent - received) as f32 / sent as f32
        };

        Self {
            addr,
            sent,
            received,
            total_delay,
            loss_rate,
            colo: None,
        }
    }

    pub fn with_colo(mut self, colo: Option<String>) -> Self {
        self.colo = colo;
        self
    }

    pub fn sent(&self) -> u32 {
        self.sent
    }

    pub fn received(&self) -> u32 {
        self.received
    }

    pub fn loss_rate(&self) -> f32 {
        self.loss_rate
    }

    /// Average over successful attempts; `None` when nothing came back.
    pub fn mean_delay(&self) -> Option<Duration> {
        (self.received > 0).then(|| self.total_delay / self.received)
    }

    pub fn is_reachable(&self) -> bool {
        self.received > 0
    }
}

/// A probed candidate after the download stage.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeedResult {
    pub probe: ProbeResult,
    /// Bytes per second, 0 when untested or failed.
    pub download_speed: f64,
}

impl SpeedResult {
    pub fn new(probe: ProbeResult, download_speed: f64) -> Self {
        Self {
            probe,
            download_speed,
        }
    }

    pub fn untested(probe: ProbeResult) -> Self {
        Self::new(probe, 0.0)
    }

    pub fn addr(&self) -> IpAddr {
        self.probe.addr
    }

    pub fn speed_mb(&self) -> f64 {
        self.download_speed / BYTES_PER_MB
    }
}

/// One exported line, every column already rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    pub addr: String,
    pub sent: String,
    pub received: String,
    pub loss_rate: String,
    pub delay_ms: String,
    pub speed_mb: String,
    pub colo: String,
}

impl ResultRow {
    pub const HEADERS: [&'static str; 7] = [
        "IP Address",
        "Sent",
        "Received",
        "Loss Rate",
        "Avg Delay (ms)",
        "Speed (MB/s)",
        "Colo",
    ];

    pub fn fields(&self) -> [&str; 7] {
        [
            &self.addr,
            &self.sent,
            &self.received,
            &self.loss_rate,
            &self.delay_ms,
            &self.speed_mb,
            &self.colo,
        ]
    }
}

pub trait ToRow {
    fn to_row(&self) -> ResultRow;
}

impl ToRow for ProbeResult {
    fn to_row(&self) -> ResultRow {
        let delay_ms: f64 = self
            .mean_delay()
            .map(|delay| delay.as_secs_f64() * 1000.0)
            .unwrap_or(0.0);

        ResultRow {
            addr: format_addr(self.addr),
            sent: self.sent.to_string(),
            received: self.received.to_string(),
            loss_rate: format!("{:.2}", self.loss_rate),
            delay_ms: format!("{delay_ms:.2}"),
            speed_mb: format!("{:.2}", 0.0),
            colo: self.colo.clone().unwrap_or_default(),
        }
    }
}

impl ToRow for SpeedResult {
    fn to_row(&self) -> ResultRow {
        ResultRow {
            speed_mb: format!("{:.2}", self.speed_mb()),
            ..self.probe.to_row()
        }
    }
}

/// IPv6 addresses are bracketed so they stay unambiguous next to ports.
pub fn format_addr(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
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
