//! # Latency Probing
//!
//! Every candidate is probed by an independent task. A semaphore bounds how
//! many run at once; results of reachable candidates are appended to a shared
//! list and unreachable ones are dropped.
//!
//! The actual measurement is a [`Probe`] strategy:
//! * [`tcp::TcpProbe`] times TCP handshakes.
//! * [`http::HttpProbe`] verifies the endpoint with a HEAD request and then
//!   times further HEAD requests.

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Context;
use async_trait::async_trait;
use edgeprobe_common::config::{ProbeConfig, ProbeMode};
use edgeprobe_common::measurement::ProbeResult;
use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, warn};

use crate::report::Reporter;

pub mod http;
pub mod tcp;

use http::HttpProbe;
use tcp::TcpProbe;

#[async_trait]
pub trait Probe: Send + Sync {
    /// Measures one candidate. Failures show up as a zero-received result.
    async fn probe(&self, addr: IpAddr) -> ProbeResult;
}

/// Picks the strategy for the configured mode.
pub fn strategy(config: &ProbeConfig) -> anyhow::Result<Arc<dyn Probe>> {
    match config.mode {
        ProbeMode::Tcp => {
            let colo: Option<HttpProbe> = if config.report_colo {
                Some(HttpProbe::new(config).context("invalid probe url")?)
            } else {
                None
            };
            Ok(Arc::new(TcpProbe::new(config, colo)))
        }
        ProbeMode::Http => Ok(Arc::new(
            HttpProbe::new(config).context("invalid probe url")?,
        )),
    }
}

/// Probes candidates and keeps running progress across several calls to
/// [`LatencyProber::run`], so batches report one continuous count.
pub struct LatencyProber {
    probe: Arc<dyn Probe>,
    concurrency: usize,
    reporter: Arc<dyn Reporter>,
    done: Arc<AtomicUsize>,
    usable: Arc<AtomicUsize>,
}

impl LatencyProber {
    pub fn new(config: &ProbeConfig, reporter: Arc<dyn Reporter>) -> anyhow::Result<Self> {
        Ok(Self::with_probe(strategy(config)?, config.concurrency, reporter))
    }

    pub fn with_probe(probe: Arc<dyn Probe>, concurrency: usize, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            probe,
            concurrency: concurrency.max(1),
            reporter,
            done: Arc::new(AtomicUsize::new(0)),
            usable: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Probes `candidates` and returns the reachable ones, unordered.
    pub async fn run(&self, candidates: &[IpAddr]) -> Vec<ProbeResult> {
        let results: Arc<Mutex<Vec<ProbeResult>>> = Arc::new(Mutex::new(Vec::new()));
        let semaphore: Arc<Semaphore> = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks: JoinSet<()> = JoinSet::new();

        for &addr in candidates {
            let permit: OwnedSemaphorePermit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let probe: Arc<dyn Probe> = self.probe.clone();
            let results: Arc<Mutex<Vec<ProbeResult>>> = results.clone();
            let reporter: Arc<dyn Reporter> = self.reporter.clone();
            let done: Arc<AtomicUsize> = self.done.clone();
            let usable: Arc<AtomicUsize> = self.usable.clone();

            tasks.spawn(async move {
                let _permit: OwnedSemaphorePermit = permit;
                let result: ProbeResult = probe.probe(addr).await;

                let usable_now: usize = if result.is_reachable() {
                    results.lock().push(result);
                    usable.fetch_add(1, Ordering::Relaxed) + 1
                } else {
                    usable.load(Ordering::Relaxed)
                };
                let done_now: usize = done.fetch_add(1, Ordering::Relaxed) + 1;
                reporter.probe_progress(done_now, usable_now);
            });

            while let Some(joined) = tasks.try_join_next() {
                log_failed_task(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_failed_task(joined);
        }

        let results: Vec<ProbeResult> = std::mem::take(&mut *results.lock());
        debug!("{} of {} candidates answered", results.len(), candidates.len());
        results
    }
}

fn log_failed_task(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        warn!("Probe task failed: {e}");
    }
}

/// Probes every candidate in one go.
pub async fn probe(
    candidates: &[IpAddr],
    config: &ProbeConfig,
    reporter: Arc<dyn Reporter>,
) -> anyhow::Result<Vec<ProbeResult>> {
    let prober: LatencyProber = LatencyProber::new(config, reporter.clone())?;

    reporter.probe_started(candidates.len());
    let results: Vec<ProbeResult> = prober.run(candidates).await;
    reporter.probe_finished();

    Ok(results)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
