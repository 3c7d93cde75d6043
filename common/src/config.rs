//! Run configuration.
//!
//! One [`Config`] value is built by the CLI, passed through [`Config::sanitized`]
//! once, and then handed by reference to every stage. Nothing mutates it after
//! the pipeline starts.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::network::quota::Quota;
use crate::network::source::RangeSource;

pub const DEFAULT_URL: &str = "https://speed.cloudflare.com/__down?bytes=200000000";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.80 Safari/537.36";
pub const DEFAULT_PORT: u16 = 443;
pub const DEFAULT_CONCURRENCY: usize = 200;
pub const MAX_CONCURRENCY: usize = 1000;
pub const DEFAULT_PING_TIMES: u32 = 4;
pub const DEFAULT_STATUS_CODES: [u16; 3] = [200, 301, 302];
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(9999);
pub const DEFAULT_MIN_DELAY: Duration = Duration::ZERO;
pub const DEFAULT_MAX_LOSS_RATE: f32 = 1.0;
pub const DEFAULT_TIE_TOLERANCE: Duration = Duration::from_millis(5);
pub const DEFAULT_TEST_COUNT: usize = 10;
pub const DEFAULT_DOWNLOAD_DURATION: Duration = Duration::from_secs(10);
pub const DEFAULT_SLICES: u32 = 100;
pub const DEFAULT_IPV4_MAX_EXPONENT: u32 = 16;
pub const DEFAULT_IPV6_MAX_EXPONENT: u32 = 18;
pub const DEFAULT_MAX_CANDIDATES: usize = 1 << 18;
pub const DEFAULT_PRINT_COUNT: usize = 10;
pub const DEFAULT_OUTPUT: &str = "result.csv";

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub source: SourceConfig,
    pub probe: ProbeConfig,
    pub filter: FilterConfig,
    pub speed: SpeedConfig,
    pub output: OutputConfig,
}

impl Config {
    /// Clamps every section into its supported range.
    pub fn sanitized(self) -> Self {
        Self {
            source: self.source.sanitized(),
            probe: self.probe.sanitized(),
            filter: self.filter,
            speed: self.speed.sanitized(),
            output: self.output,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SourceConfig {
    pub ranges: RangeSource,
    /// `None` keeps the default policy (one address per /24 for IPv4, one per prefix for IPv6).
    pub ipv4_quota: Option<Quota>,
    pub ipv6_quota: Option<Quota>,
    pub ipv4_max_exponent: u32,
    pub ipv6_max_exponent: u32,
    /// Ceiling on the number of candidates across all ranges.
    pub max_candidates: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            ranges: RangeSource::default(),
            ipv4_quota: None,
            ipv6_quota: None,
            ipv4_max_exponent: DEFAULT_IPV4_MAX_EXPONENT,
            ipv6_max_exponent: DEFAULT_IPV6_MAX_EXPONENT,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }
}

impl SourceConfig {
    fn sanitized(mut self) -> Self {
        if self.max_candidates == 0 {
            self.max_candidates = DEFAULT_MAX_CANDIDATES;
        }
        self.ipv4_max_exponent = self.ipv4_max_exponent.min(32);
        self.ipv6_max_exponent = self.ipv6_max_exponent.min(64);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    #[default]
    Tcp,
    Http,
}

impl std::fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeMode::Tcp => write!(f, "TCP"),
            ProbeMode::Http => write!(f, "HTTP"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Maximum number of candidates probed at the same time.
    pub concurrency: usize,
    /// Timed attempts per candidate.
    pub ping_times: u32,
    pub mode: ProbeMode,
    pub port: u16,
    pub url: String,
    /// Status codes accepted by the HTTP verification request.
    pub status_codes: Vec<u16>,
    /// Upper-case datacenter codes a candidate must report, `None` accepts any.
    pub colos: Option<BTreeSet<String>>,
    /// Look up datacenter codes even in TCP mode.
    pub report_colo: bool,
    pub connect_timeout: Duration,
    pub http_timeout: Duration,
    /// Probe the candidates in slices of this size instead of all at once.
    pub batch_size: Option<usize>,
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            ping_times: DEFAULT_PING_TIMES,
            mode: ProbeMode::Tcp,
            port: DEFAULT_PORT,
            url: DEFAULT_URL.to_string(),
            status_codes: DEFAULT_STATUS_CODES.to_vec(),
            colos: None,
            report_colo: false,
            connect_timeout: Duration::from_secs(1),
            http_timeout: Duration::from_secs(2),
            batch_size: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ProbeConfig {
    fn sanitized(mut self) -> Self {
        if self.concurrency == 0 {
            self.concurrency = DEFAULT_CONCURRENCY;
        }
        self.concurrency = self.concurrency.min(MAX_CONCURRENCY);
        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }
        if self.ping_times == 0 {
            self.ping_times = DEFAULT_PING_TIMES;
        }
        if self.url.trim().is_empty() {
            self.url = DEFAULT_URL.to_string();
        }
        self.status_codes.retain(|code| (100..=599).contains(code));
        if self.status_codes.is_empty() {
            self.status_codes = DEFAULT_STATUS_CODES.to_vec();
        }
        self.colos = self.colos.map(|colos| {
            colos
                .into_iter()
                .map(|colo| colo.trim().to_ascii_uppercase())
                .filter(|colo| !colo.is_empty())
                .collect()
        });
        if self.colos.as_ref().is_some_and(BTreeSet::is_empty) {
            self.colos = None;
        }
        self.batch_size = self.batch_size.filter(|size| *size > 0);
        self
    }

    pub fn wants_colo(&self) -> bool {
        self.mode == ProbeMode::Http || self.report_colo
    }
}

#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub max_delay: Duration,
    pub min_delay: Duration,
    pub max_loss_rate: f32,
    /// Results whose delays sit within this distance of a group's fastest
    /// member are treated as ties.
    pub tie_tolerance: Duration,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_delay: DEFAULT_MAX_DELAY,
            min_delay: DEFAULT_MIN_DELAY,
            max_loss_rate: DEFAULT_MAX_LOSS_RATE,
            tie_tolerance: DEFAULT_TIE_TOLERANCE,
        }
    }
}

impl FilterConfig {
    /// False when both delay bounds are at (or beyond) their defaults.
    pub fn delay_bounds_active(&self) -> bool {
        self.max_delay < DEFAULT_MAX_DELAY || self.min_delay > DEFAULT_MIN_DELAY
    }

    pub fn loss_bound_active(&self) -> bool {
        self.max_loss_rate < DEFAULT_MAX_LOSS_RATE
    }
}

#[derive(Debug, Clone)]
pub struct SpeedConfig {
    /// `false` turns the download stage into a pass-through.
    pub enabled: bool,
    pub test_count: usize,
    /// Minimum accepted speed in bytes per second, 0 disables the floor.
    pub min_speed: f64,
    pub max_duration: Duration,
    pub url: String,
    pub port: u16,
    /// Number of equal time slices `max_duration` is divided into.
    pub slices: u32,
    /// Divisor of the final rescale step, defaults to `slices`.
    pub rescale_divisor: Option<f64>,
    /// Downloads running at the same time.
    pub concurrency: usize,
    /// How often an in-flight download refreshes its live rate.
    pub bandwidth_interval: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            test_count: DEFAULT_TEST_COUNT,
            min_speed: 0.0,
            max_duration: DEFAULT_DOWNLOAD_DURATION,
            url: DEFAULT_URL.to_string(),
            port: DEFAULT_PORT,
            slices: DEFAULT_SLICES,
            rescale_divisor: None,
            concurrency: 1,
            bandwidth_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(2),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl SpeedConfig {
    fn sanitized(mut self) -> Self {
        if self.test_count == 0 {
            self.test_count = DEFAULT_TEST_COUNT;
        }
        if !self.min_speed.is_finite() || self.min_speed < 0.0 {
            self.min_speed = 0.0;
        }
        if self.max_duration.is_zero() {
            self.max_duration = DEFAULT_DOWNLOAD_DURATION;
        }
        if self.url.trim().is_empty() {
            self.url = DEFAULT_URL.to_string();
        }
        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }
        if self.slices == 0 {
            self.slices = DEFAULT_SLICES;
        }
        self.rescale_divisor = self
            .rescale_divisor
            .filter(|divisor| divisor.is_finite() && *divisor > 0.0);
        self.concurrency = self.concurrency.clamp(1, MAX_CONCURRENCY);
        if self.bandwidth_interval.is_zero() {
            self.bandwidth_interval = Duration::from_secs(1);
        }
        self
    }

    pub fn rescale_divisor(&self) -> f64 {
        self.rescale_divisor.unwrap_or(f64::from(self.slices))
    }
}

#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Rows printed to the terminal, 0 disables the table.
    pub print_count: usize,
    /// CSV destination, `None` disables the export.
    pub path: Option<PathBuf>,
    pub show_colo: bool,
    pub quiet: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            print_count: DEFAULT_PRINT_COUNT,
            path: Some(PathBuf::from(DEFAULT_OUTPUT)),
            show_colo: false,
            quiet: 0,
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
