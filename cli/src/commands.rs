pub mod run;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use edgeprobe_common::config::{
    Config, DEFAULT_MAX_CANDIDATES, DEFAULT_OUTPUT, DEFAULT_URL, FilterConfig, OutputConfig,
    ProbeConfig, ProbeMode, SourceConfig, SpeedConfig,
};
use edgeprobe_common::measurement::BYTES_PER_MB;
use edgeprobe_common::network::quota::Quota;
use edgeprobe_common::network::source::{DEFAULT_RANGE_FILE, RangeSource};
use edgeprobe_common::warn;

#[derive(Parser, Debug)]
#[command(name = "edgeprobe", version)]
#[command(about = "Find the fastest CDN edge addresses by latency and download speed.")]
pub struct CommandLine {
    /// Latency probes running at once (1-1000)
    #[arg(short = 'n', default_value_t = 200)]
    pub concurrency: usize,

    /// Attempts per address
    #[arg(short = 't', default_value_t = 4)]
    pub ping_times: u32,

    /// Number of addresses to download test
    #[arg(long = "dn", default_value_t = 10)]
    pub test_count: usize,

    /// Maximum seconds per download test
    #[arg(long = "dt", default_value_t = 10)]
    pub download_secs: u64,

    /// Port used for probing and downloading
    #[arg(long = "tp", default_value_t = 443)]
    pub port: u16,

    /// URL used for HTTP probing and downloading
    #[arg(long, default_value = DEFAULT_URL)]
    pub url: String,

    /// Probe with HTTP HEAD requests instead of TCP handshakes
    #[arg(long)]
    pub httping: bool,

    /// Status codes accepted in HTTP mode, comma separated
    #[arg(long = "httping-code", value_delimiter = ',')]
    pub httping_code: Vec<u16>,

    /// Datacenter codes accepted in HTTP mode, comma separated (e.g. HKG,LAX)
    #[arg(long = "cfcolo", value_delimiter = ',')]
    pub cfcolo: Vec<String>,

    /// Maximum average delay in ms
    #[arg(long = "tl", default_value_t = 9999)]
    pub max_delay_ms: u64,

    /// Minimum average delay in ms
    #[arg(long = "tll", default_value_t = 0)]
    pub min_delay_ms: u64,

    /// Maximum loss rate (0.00-1.00)
    #[arg(long = "tlr", default_value_t = 1.0)]
    pub max_loss_rate: f32,

    /// Minimum download speed in MB/s
    #[arg(long = "sl", default_value_t = 0.0)]
    pub min_speed_mb: f64,

    /// Rows printed after the run, 0 disables the table
    #[arg(short = 'p', default_value_t = 10)]
    pub print_count: usize,

    /// File with one address or CIDR prefix per line
    #[arg(short = 'f', default_value = DEFAULT_RANGE_FILE)]
    pub file: PathBuf,

    /// Inline comma separated addresses and prefixes, replaces -f
    #[arg(long = "ip")]
    pub ip: Option<String>,

    /// CSV output path, empty disables the export
    #[arg(short = 'o', default_value = DEFAULT_OUTPUT)]
    pub output: String,

    /// Skip download testing and rank by delay
    #[arg(long = "dd")]
    pub disable_download: bool,

    /// Probe every IPv4 address of each prefix
    #[arg(long)]
    pub all4: bool,

    /// Sample 2^12 addresses per IPv4 prefix
    #[arg(long)]
    pub many4: bool,

    /// Sample 2^18 addresses per IPv6 prefix
    #[arg(long)]
    pub more6: bool,

    /// Sample 2^16 addresses per IPv6 prefix
    #[arg(long)]
    pub lots6: bool,

    /// Sample 2^12 addresses per IPv6 prefix
    #[arg(long)]
    pub many6: bool,

    /// Sample 2^8 addresses per IPv6 prefix
    #[arg(long)]
    pub some6: bool,

    /// IPv4 quota per prefix: n, n+m or n-m meaning 2^n±m
    #[arg(long = "v4")]
    pub v4: Option<Quota>,

    /// IPv6 quota per prefix: n, n+m or n-m meaning 2^n±m
    #[arg(long = "v6")]
    pub v6: Option<Quota>,

    /// Report datacenter codes in TCP mode too
    #[arg(long = "aprt")]
    pub report_colo: bool,

    /// Ceiling on the number of sampled addresses
    #[arg(long = "max-ips", default_value_t = DEFAULT_MAX_CANDIDATES)]
    pub max_ips: usize,

    /// Probe addresses in batches of this size
    #[arg(long)]
    pub batch: Option<usize>,

    /// Downloads running at once
    #[arg(long = "dl-threads", default_value_t = 1)]
    pub download_threads: usize,

    /// Divisor of the final speed rescale (defaults to the slice count)
    #[arg(long = "speed-rescale")]
    pub speed_rescale: Option<f64>,

    /// Delays within this many ms count as a tie
    #[arg(long = "tie-ms", default_value_t = 5)]
    pub tie_ms: u64,

    /// More log output, repeatable
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Less output, repeatable
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Logs hints about option combinations that rarely do what was meant.
    pub fn tips(&self) {
        if self.min_speed_mb > 0.0 && self.max_delay_ms == FilterConfig::default().max_delay.as_millis() as u64 {
            warn!("--sl without --tl may download test a long list of slow addresses, consider setting --tl");
        }
        if !self.cfcolo.is_empty() && !self.httping {
            warn!("--cfcolo only filters in HTTP mode (--httping)");
        }
    }

    fn ipv4_quota(&self) -> Option<Quota> {
        let preset: Option<Quota> = if self.all4 {
            Some(Quota::All)
        } else if self.many4 {
            Some(Quota::power(12))
        } else {
            None
        };
        combine(preset, self.v4, SourceConfig::default().ipv4_max_exponent)
    }

    fn ipv6_quota(&self) -> Option<Quota> {
        let max_exponent: u32 = SourceConfig::default().ipv6_max_exponent;
        let preset: Option<Quota> = [
            (self.more6, 18),
            (self.lots6, 16),
            (self.many6, 12),
            (self.some6, 8),
        ]
        .into_iter()
        .filter(|(set, _)| *set)
        .map(|(_, exponent)| Quota::power(exponent))
        .reduce(|a, b| a.smaller(b, max_exponent));
        combine(preset, self.v6, max_exponent)
    }

    pub fn to_config(&self) -> Config {
        let source: SourceConfig = SourceConfig {
            ranges: match &self.ip {
                Some(list) => RangeSource::Inline(list.clone()),
                None => RangeSource::File(self.file.clone()),
            },
            ipv4_quota: self.ipv4_quota(),
            ipv6_quota: self.ipv6_quota(),
            max_candidates: self.max_ips,
            ..SourceConfig::default()
        };

        let probe: ProbeConfig = ProbeConfig {
            concurrency: self.concurrency,
            ping_times: self.ping_times,
            mode: if self.httping {
                ProbeMode::Http
            } else {
                ProbeMode::Tcp
            },
            port: self.port,
            url: self.url.clone(),
            status_codes: if self.httping_code.is_empty() {
                ProbeConfig::default().status_codes
            } else {
                self.httping_code.clone()
            },
            colos: (!self.cfcolo.is_empty()).then(|| self.cfcolo.iter().cloned().collect::<BTreeSet<String>>()),
            report_colo: self.report_colo,
            batch_size: self.batch,
            ..ProbeConfig::default()
        };

        let filter: FilterConfig = FilterConfig {
            max_delay: Duration::from_millis(self.max_delay_ms),
            min_delay: Duration::from_millis(self.min_delay_ms),
            max_loss_rate: self.max_loss_rate,
            tie_tolerance: Duration::from_millis(self.tie_ms),
        };

        let speed: SpeedConfig = SpeedConfig {
            enabled: !self.disable_download,
            test_count: self.test_count,
            min_speed: self.min_speed_mb * BYTES_PER_MB,
            max_duration: Duration::from_secs(self.download_secs),
            url: self.url.clone(),
            port: self.port,
            rescale_divisor: self.speed_rescale,
            concurrency: self.download_threads,
            ..SpeedConfig::default()
        };

        let output: OutputConfig = OutputConfig {
            print_count: self.print_count,
            path: Some(self.output.trim())
                .filter(|path| !path.is_empty())
                .map(PathBuf::from),
            show_colo: probe.wants_colo(),
            quiet: self.quiet,
        };

        Config {
            source,
            probe,
            filter,
            speed,
            output,
        }
        .sanitized()
    }
}

/// A preset and an explicit quota together keep the smaller one.
fn combine(preset: Option<Quota>, explicit: Option<Quota>, max_exponent: u32) -> Option<Quota> {
    match (preset, explicit) {
        (Some(preset), Some(explicit)) => Some(preset.smaller(explicit, max_exponent)),
        (preset, explicit) => preset.or(explicit),
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
