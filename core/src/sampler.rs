//! # Address Space Sampling
//!
//! Turns parsed [`RangeSpec`]s into a bounded list of concrete candidates.
//!
//! * A single host always yields itself.
//! * With a quota, that many distinct addresses are drawn uniformly from the
//!   block (or the whole block when the quota covers it).
//! * Without a quota, IPv4 prefixes yield one random address per /24 and IPv6
//!   prefixes yield one random address.
//!
//! The combined list is capped by a reservoir so no range is favored.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use anyhow::Context;
use edgeprobe_common::config::SourceConfig;
use edgeprobe_common::network::quota::Quota;
use edgeprobe_common::network::range::{Family, RangeSpec};
use edgeprobe_common::network::source::RangeSource;
use rand::Rng;
use rand::seq::index;
use tracing::{debug, info};

const IPV4_BLOCK: u128 = 256;

#[derive(Debug, Clone)]
pub struct SamplePolicy {
    pub ipv4_quota: Option<Quota>,
    pub ipv6_quota: Option<Quota>,
    pub ipv4_max_exponent: u32,
    pub ipv6_max_exponent: u32,
    pub max_candidates: usize,
}

impl SamplePolicy {
    fn quota_for(&self, family: Family) -> (Option<Quota>, u32) {
        match family {
            Family::V4 => (self.ipv4_quota, self.ipv4_max_exponent),
            Family::V6 => (self.ipv6_quota, self.ipv6_max_exponent),
        }
    }
}

impl From<&SourceConfig> for SamplePolicy {
    fn from(config: &SourceConfig) -> Self {
        Self {
            ipv4_quota: config.ipv4_quota,
            ipv6_quota: config.ipv6_quota,
            ipv4_max_exponent: config.ipv4_max_exponent,
            ipv6_max_exponent: config.ipv6_max_exponent,
            max_candidates: config.max_candidates.max(1),
        }
    }
}

pub fn load_ranges(source: &RangeSource) -> anyhow::Result<Vec<RangeSpec>> {
    let specs: Vec<RangeSpec> = source.load().context("failed to load address ranges")?;
    debug!("Loaded {} range specifications", specs.len());
    Ok(specs)
}

/// Draws candidates from one range.
///
/// `limit` bounds the count of a single range so `all` on a huge IPv6 block
/// stays finite.
pub fn sample<R: Rng + ?Sized>(
    spec: &RangeSpec,
    quota: Option<Quota>,
    max_exponent: u32,
    limit: usize,
    rng: &mut R,
) -> Vec<IpAddr> {
    if spec.is_host() {
        return vec![spec.base()];
    }

    let size: u128 = spec.size();
    let limit: u128 = limit as u128;

    let offsets: Vec<u128> = match (spec.family(), quota) {
        (_, Some(quota)) => {
            let count: u128 = quota.resolve(max_exponent, size).min(limit);
            sample_offsets(size, count, rng)
        }
        (Family::V4, None) => one_per_block(size, limit, rng),
        (Family::V6, None) => vec![rng.random_range(0..size)],
    };

    offsets
        .into_iter()
        .map(|offset| offset_addr(spec.base(), offset))
        .collect()
}

/// Samples every range and applies the global ceiling.
pub fn sample_all<R: Rng + ?Sized>(
    specs: &[RangeSpec],
    policy: &SamplePolicy,
    rng: &mut R,
) -> Vec<IpAddr> {
    let mut reservoir: Reservoir<IpAddr> = Reservoir::new(policy.max_candidates);
    let mut seen: HashSet<IpAddr> = HashSet::new();

    for spec in specs {
        let (quota, max_exponent) = policy.quota_for(spec.family());
        let drawn: Vec<IpAddr> = sample(spec, quota, max_exponent, policy.max_candidates, rng);
        debug!("{spec}: {} candidates", drawn.len());

        for addr in drawn {
            if seen.insert(addr) {
                reservoir.offer(addr, rng);
            }
        }
    }

    if reservoir.seen > policy.max_candidates {
        info!(
            "Capped {} candidates to {}",
            reservoir.seen, policy.max_candidates
        );
    }

    reservoir.items
}

/// `count` distinct offsets in `0..total`, in draw order.
fn sample_offsets<R: Rng + ?Sized>(total: u128, count: u128, rng: &mut R) -> Vec<u128> {
    if count >= total {
        return (0..total).collect();
    }

    let count: usize = count as usize;
    if let Ok(length) = usize::try_from(total) {
        return index::sample(rng, length, count)
            .into_iter()
            .map(|i| i as u128)
            .collect();
    }

    // Too wide for index sampling; collisions are negligible at this size.
    let mut seen: HashSet<u128> = HashSet::with_capacity(count);
    let mut offsets: Vec<u128> = Vec::with_capacity(count);
    while offsets.len() < count {
        let offset: u128 = rng.random_range(0..total);
        if seen.insert(offset) {
            offsets.push(offset);
        }
    }
    offsets
}

/// One random offset inside every 256-address block; a block smaller than
/// that counts as one.
fn one_per_block<R: Rng + ?Sized>(size: u128, limit: u128, rng: &mut R) -> Vec<u128> {
    if size <= IPV4_BLOCK {
        return vec![rng.random_range(0..size)];
    }

    let blocks: u128 = size / IPV4_BLOCK;
    let chosen: Vec<u128> = if blocks > limit {
        sample_offsets(blocks, limit, rng)
    } else {
        (0..blocks).collect()
    };

    chosen
        .into_iter()
        .map(|block| block * IPV4_BLOCK + rng.random_range(0..IPV4_BLOCK))
        .collect()
}

fn offset_addr(base: IpAddr, offset: u128) -> IpAddr {
    match base {
        IpAddr::V4(v4) => {
            IpAddr::V4(Ipv4Addr::from(u32::from(v4).wrapping_add(offset as u32)))
        }
        IpAddr::V6(v6) => IpAddr::V6(Ipv6Addr::from(u128::from(v6).wrapping_add(offset))),
    }
}

/// Algorithm R: keeps a uniform sample of everything offered.
struct Reservoir<T> {
    capacity: usize,
    seen: usize,
    items: Vec<T>,
}

impl<T> Reservoir<T> {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seen: 0,
            items: Vec::new(),
        }
    }

    fn offer<R: Rng + ?Sized>(&mut self, item: T, rng: &mut R) {
        self.seen += 1;
        if self.items.len() < self.capacity {
            self.items.push(item);
            return;
        }

        let slot: usize = rng.random_range(0..self.seen);
        if slot < self.capacity {
            self.items[slot] = item;
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
