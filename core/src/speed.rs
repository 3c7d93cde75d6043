//! # Download Speed Testing
//!
//! Streams the test file from the best ranked candidates and keeps those that
//! reach the minimum speed until `test_count` of them are found.
//!
//! Each download runs for at most `max_duration`; the rate is smoothed by a
//! [`estimator::RateEstimator`]. With more than one download in flight, each
//! one also publishes its live rate to a [`bandwidth::BandwidthRegistry`] so
//! the aggregate can be shown.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use edgeprobe_common::config::SpeedConfig;
use edgeprobe_common::measurement::{ProbeResult, SpeedResult};
use reqwest::{Client, Response, StatusCode};
use tokio::task::JoinSet;
use tokio::time::timeout_at;
use tracing::{debug, info, trace, warn};

use crate::error::ProbeError;
use crate::network::client::{ClientOptions, PinnedUrl, TargetUrl, pinned_client};
use crate::report::Reporter;

pub mod bandwidth;
pub mod estimator;

use bandwidth::{BandwidthRegistry, RateSampler};
use estimator::RateEstimator;

/// Downloads from a prefix of `ranked` and returns the results fastest first.
pub async fn measure(
    ranked: Vec<ProbeResult>,
    config: &SpeedConfig,
    reporter: Arc<dyn Reporter>,
) -> anyhow::Result<Vec<SpeedResult>> {
    if !config.enabled {
        return Ok(pass_through(ranked));
    }

    let target: TargetUrl = TargetUrl::parse(&config.url, config.port).context("invalid download url")?;
    let queue: Vec<ProbeResult> = queue(ranked, config);
    if queue.is_empty() {
        return Ok(Vec::new());
    }
    debug!("Downloading {} from up to {} candidates", target.as_str(), queue.len());

    let live: Option<Arc<BandwidthRegistry>> = (config.concurrency > 1).then(|| Arc::new(BandwidthRegistry::new()));
    let downloader: Arc<Downloader> = Arc::new(Downloader::new(config, target, live, reporter.clone()));

    reporter.speed_started(config.test_count, queue.len());
    let (accepted, attempted) = if config.concurrency > 1 {
        run_concurrent(queue, config, downloader, reporter.as_ref()).await
    } else {
        run_sequential(queue, config, &downloader, reporter.as_ref()).await
    };
    reporter.speed_finished();

    Ok(rank(accepted, attempted, config.test_count))
}

/// Delay-ranked input with every speed left at zero.
pub fn pass_through(ranked: Vec<ProbeResult>) -> Vec<SpeedResult> {
    ranked.into_iter().map(SpeedResult::untested).collect()
}

/// Candidates eligible for testing: the first `test_count`, or all of them
/// when a speed floor may force going further down the list.
fn queue(mut ranked: Vec<ProbeResult>, config: &SpeedConfig) -> Vec<ProbeResult> {
    if config.min_speed <= 0.0 {
        ranked.truncate(config.test_count);
    }
    ranked
}

type Outcome = (Vec<SpeedResult>, Vec<SpeedResult>);

async fn run_sequential(
    queue: Vec<ProbeResult>,
    config: &SpeedConfig,
    downloader: &Downloader,
    reporter: &dyn Reporter,
) -> Outcome {
    let mut accepted: Vec<SpeedResult> = Vec::new();
    let mut attempted: Vec<SpeedResult> = Vec::with_capacity(queue.len());

    for probe in queue {
        if accepted.len() >= config.test_count {
            break;
        }

        let speed: f64 = downloader.speed_of(probe.addr).await;
        let result: SpeedResult = SpeedResult::new(probe, speed);
        if speed >= config.min_speed {
            accepted.push(result.clone());
            reporter.speed_progress(accepted.len());
        }
        attempted.push(result);
    }

    (accepted, attempted)
}

async fn run_concurrent(
    queue: Vec<ProbeResult>,
    config: &SpeedConfig,
    downloader: Arc<Downloader>,
    reporter: &dyn Reporter,
) -> Outcome {
    let mut accepted: Vec<SpeedResult> = Vec::new();
    let mut attempted: Vec<SpeedResult> = Vec::with_capacity(queue.len());
    let mut pending = queue.into_iter();
    let mut tasks: JoinSet<SpeedResult> = JoinSet::new();

    loop {
        while tasks.len() < config.concurrency && accepted.len() < config.test_count {
            let Some(probe) = pending.next() else {
                break;
            };
            let downloader: Arc<Downloader> = downloader.clone();
            tasks.spawn(async move {
                let speed: f64 = downloader.speed_of(probe.addr).await;
                SpeedResult::new(probe, speed)
            });
        }

        match tasks.join_next().await {
            None => break,
            Some(Ok(result)) => {
                if result.download_speed >= config.min_speed {
                    accepted.push(result.clone());
                    reporter.speed_progress(accepted.len().min(config.test_count));
                }
                attempted.push(result);
            }
            Some(Err(e)) => warn!("Download task failed: {e}"),
        }
    }

    (accepted, attempted)
}

fn rank(accepted: Vec<SpeedResult>, attempted: Vec<SpeedResult>, test_count: usize) -> Vec<SpeedResult> {
    if accepted.is_empty() {
        info!("No candidate reached the minimum speed, keeping every tested one");
        let mut all: Vec<SpeedResult> = attempted;
        sort_by_speed(&mut all);
        return all;
    }

    let mut ranked: Vec<SpeedResult> = accepted;
    sort_by_speed(&mut ranked);
    ranked.truncate(test_count);
    ranked
}

/// Descending download speed, stable for equal speeds.
pub fn sort_by_speed(results: &mut [SpeedResult]) {
    results.sort_by(|a, b| b.download_speed.total_cmp(&a.download_speed));
}

struct Downloader {
    target: TargetUrl,
    options: ClientOptions,
    max_duration: Duration,
    slices: u32,
    rescale_divisor: f64,
    bandwidth_interval: Duration,
    live: Option<Arc<BandwidthRegistry>>,
    reporter: Arc<dyn Reporter>,
}

impl Downloader {
    fn new(
        config: &SpeedConfig,
        target: TargetUrl,
        live: Option<Arc<BandwidthRegistry>>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            target,
            options: ClientOptions {
                connect_timeout: config.connect_timeout,
                request_timeout: None,
                user_agent: config.user_agent.clone(),
            },
            max_duration: config.max_duration,
            slices: config.slices,
            rescale_divisor: config.rescale_divisor(),
            bandwidth_interval: config.bandwidth_interval,
            live,
            reporter,
        }
    }

    /// Bytes per second, 0 on any failure.
    async fn speed_of(&self, addr: IpAddr) -> f64 {
        let speed: f64 = match self.download(addr).await {
            Ok(speed) => speed,
            Err(e) => {
                debug!("Download from {addr} failed: {e}");
                0.0
            }
        };

        if let Some(live) = &self.live {
            self.reporter.bandwidth(live.remove(addr));
        }
        trace!("{addr}: {speed:.0} B/s");
        speed
    }

    async fn download(&self, addr: IpAddr) -> Result<f64, ProbeError> {
        let pinned: PinnedUrl = self.target.pin(addr);
        let client: Client = pinned_client(&pinned, &self.options)?;

        let request_deadline: tokio::time::Instant = tokio::time::Instant::now() + self.max_duration;
        let mut response: Response = timeout_at(request_deadline, client.get(pinned.url).send())
            .await
            .map_err(|_| ProbeError::Timeout {
                addr: SocketAddr::new(addr, self.target.port()),
            })??;

        if response.status() != StatusCode::OK {
            return Err(ProbeError::Status {
                status: response.status().as_u16(),
            });
        }

        let expected: Option<u64> = response.content_length();
        let started: Instant = Instant::now();
        let deadline: tokio::time::Instant = tokio::time::Instant::from_std(started + self.max_duration);
        let mut estimator: RateEstimator =
            RateEstimator::new(started, self.max_duration, self.slices, self.rescale_divisor);
        let mut sampler: RateSampler = RateSampler::new(started, self.bandwidth_interval);
        let mut total: u64 = 0;

        loop {
            match timeout_at(deadline, response.chunk()).await {
                Err(_elapsed) => {
                    estimator.record(Instant::now(), total);
                    break;
                }
                Ok(Err(e)) => {
                    trace!("{addr}: read failed after {total} bytes: {e}");
                    break;
                }
                Ok(Ok(None)) => {
                    estimator.finish(Instant::now(), total);
                    break;
                }
                Ok(Ok(Some(chunk))) => {
                    total += chunk.len() as u64;
                    let now: Instant = Instant::now();

                    if expected.is_some_and(|length| total >= length) {
                        estimator.finish(now, total);
                        break;
                    }
                    estimator.record(now, total);

                    if let (Some(live), Some(rate)) = (&self.live, sampler.sample(now, total)) {
                        self.reporter.bandwidth(live.update(addr, rate));
                    }
                }
            }
        }

        Ok(estimator.speed())
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
