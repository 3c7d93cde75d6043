//! Bound filtering and ranking of latency results.
//!
//! Filters keep the relative order of what they retain. Ranking sorts by loss
//! rate then delay, then shuffles each run of near-equal delays so that
//! measurement noise does not decide who gets download-tested first.

use std::cmp::Ordering;
use std::ops::Range;
use std::time::Duration;

use edgeprobe_common::config::FilterConfig;
use edgeprobe_common::measurement::ProbeResult;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::debug;

/// Full stage: bounds, canonical order, tie shuffling.
pub fn filter(results: Vec<ProbeResult>, config: &FilterConfig) -> Vec<ProbeResult> {
    filter_with_rng(results, config, &mut rand::rng())
}

pub fn filter_with_rng<R: Rng + ?Sized>(
    results: Vec<ProbeResult>,
    config: &FilterConfig,
    rng: &mut R,
) -> Vec<ProbeResult> {
    let before: usize = results.len();
    let results: Vec<ProbeResult> = filter_delay(results, config);
    let mut results: Vec<ProbeResult> = filter_loss_rate(results, config);
    debug!("Kept {} of {} results within bounds", results.len(), before);

    rank(&mut results, config.tie_tolerance, rng);
    results
}

/// Sorts canonically and shuffles delay groups.
pub fn rank<R: Rng + ?Sized>(results: &mut [ProbeResult], tolerance: Duration, rng: &mut R) {
    sort_canonical(results);
    group_and_shuffle(results, tolerance, rng);
}

pub fn filter_delay(mut results: Vec<ProbeResult>, config: &FilterConfig) -> Vec<ProbeResult> {
    if !config.delay_bounds_active() {
        return results;
    }

    results.retain(|result| {
        result
            .mean_delay()
            .is_some_and(|delay| delay >= config.min_delay && delay <= config.max_delay)
    });
    results
}

pub fn filter_loss_rate(mut results: Vec<ProbeResult>, config: &FilterConfig) -> Vec<ProbeResult> {
    if !config.loss_bound_active() {
        return results;
    }

    results.retain(|result| result.loss_rate() <= config.max_loss_rate);
    results
}

/// Ascending loss rate, then ascending mean delay. Stable.
pub fn sort_canonical(results: &mut [ProbeResult]) {
    results.sort_by(compare);
}

fn compare(a: &ProbeResult, b: &ProbeResult) -> Ordering {
    a.loss_rate()
        .total_cmp(&b.loss_rate())
        .then_with(|| delay_of(a).cmp(&delay_of(b)))
}

fn delay_of(result: &ProbeResult) -> Duration {
    result.mean_delay().unwrap_or(Duration::MAX)
}

/// Index ranges of the delay groups of a canonically sorted slice.
///
/// A group shares one loss rate and every member's delay is within
/// `tolerance` of the group's first (smallest) delay.
pub fn delay_groups(results: &[ProbeResult], tolerance: Duration) -> Vec<Range<usize>> {
    let mut groups: Vec<Range<usize>> = Vec::new();
    let mut start: usize = 0;

    while start < results.len() {
        let loss: f32 = results[start].loss_rate();
        let floor: Duration = delay_of(&results[start]);

        let mut end: usize = start + 1;
        while end < results.len()
            && results[end].loss_rate() == loss
            && delay_of(&results[end]).saturating_sub(floor) <= tolerance
        {
            end += 1;
        }

        groups.push(start..end);
        start = end;
    }

    groups
}

pub fn group_and_shuffle<R: Rng + ?Sized>(
    results: &mut [ProbeResult],
    tolerance: Duration,
    rng: &mut R,
) {
    for group in delay_groups(results, tolerance) {
        results[group].shuffle(rng);
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
