//! End-to-end run: ranges → candidates → latency → ranking → download.

use std::net::IpAddr;
use std::sync::Arc;

use edgeprobe_common::config::Config;
use edgeprobe_common::measurement::{ProbeResult, SpeedResult};
use edgeprobe_common::network::range::RangeSpec;
use tracing::{Instrument, debug, info, info_span};

use crate::filter;
use crate::prober::LatencyProber;
use crate::report::Reporter;
use crate::sampler::{self, SamplePolicy};
use crate::speed;

#[derive(Debug, Clone, Default)]
pub struct Outcome {
    /// Addresses drawn from the ranges.
    pub candidates: usize,
    /// Candidates that answered and passed the bounds.
    pub probed: usize,
    /// Final order: by speed, or by delay when downloading is disabled.
    pub results: Vec<SpeedResult>,
}

pub async fn run(config: &Config, reporter: Arc<dyn Reporter>) -> anyhow::Result<Outcome> {
    let specs: Vec<RangeSpec> = sampler::load_ranges(&config.source.ranges)?;
    let policy: SamplePolicy = SamplePolicy::from(&config.source);
    let candidates: Vec<IpAddr> = sampler::sample_all(&specs, &policy, &mut rand::rng());
    info!(
        "Sampled {} candidates from {} ranges",
        candidates.len(),
        specs.len()
    );

    if candidates.is_empty() {
        info!("No candidates to probe");
        return Ok(Outcome::default());
    }

    let ranked: Vec<ProbeResult> = latency_stage(&candidates, config, reporter.clone())
        .instrument(info_span!("latency"))
        .await?;

    let mut outcome: Outcome = Outcome {
        candidates: candidates.len(),
        probed: ranked.len(),
        results: Vec::new(),
    };

    if ranked.is_empty() {
        info!("No candidate answered within the configured bounds");
        return Ok(outcome);
    }

    outcome.results = speed::measure(ranked, &config.speed, reporter)
        .instrument(info_span!("download"))
        .await?;

    Ok(outcome)
}

async fn latency_stage(
    candidates: &[IpAddr],
    config: &Config,
    reporter: Arc<dyn Reporter>,
) -> anyhow::Result<Vec<ProbeResult>> {
    let prober: LatencyProber = LatencyProber::new(&config.probe, reporter.clone())?;
    info!(
        "Probing {} candidates ({} on port {}, {} attempts each)",
        candidates.len(),
        config.probe.mode,
        config.probe.port,
        config.probe.ping_times
    );

    reporter.probe_started(candidates.len());
    let ranked: Vec<ProbeResult> = match config.probe.batch_size {
        None => filter::filter(prober.run(candidates).await, &config.filter),
        Some(size) => {
            let mut kept: Vec<ProbeResult> = Vec::new();
            for (index, batch) in candidates.chunks(size).enumerate() {
                let survivors: Vec<ProbeResult> = filter::filter(prober.run(batch).await, &config.filter);
                debug!("Batch {} kept {} of {}", index + 1, survivors.len(), batch.len());
                reporter.batch_finished(index, &survivors);
                kept.extend(survivors);
            }
            filter::rank(&mut kept, config.filter.tie_tolerance, &mut rand::rng());
            kept
        }
    };
    reporter.probe_finished();

    Ok(ranked)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
