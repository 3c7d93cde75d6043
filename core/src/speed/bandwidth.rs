//! Live rates of the downloads currently in flight.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct BandwidthRegistry {
    rates: Mutex<HashMap<IpAddr, f64>>,
}

impl BandwidthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the latest rate of `addr` and returns the new total.
    pub fn update(&self, addr: IpAddr, bytes_per_sec: f64) -> f64 {
        let mut rates = self.rates.lock();
        rates.insert(addr, bytes_per_sec);
        rates.values().sum()
    }

    /// Drops `addr` and returns the remaining total.
    pub fn remove(&self, addr: IpAddr) -> f64 {
        let mut rates = self.rates.lock();
        rates.remove(&addr);
        rates.values().sum()
    }
}

/// Turns cumulative byte counts into a rate once per interval.
#[derive(Debug, Clone)]
pub struct RateSampler {
    interval: Duration,
    last_at: Instant,
    last_bytes: u64,
}

impl RateSampler {
    pub fn new(started: Instant, interval: Duration) -> Self {
        Self {
            interval,
            last_at: started,
            last_bytes: 0,
        }
    }

    /// Rate since the previous sample, or `None` if the interval has not passed.
    pub fn sample(&mut self, now: Instant, total: u64) -> Option<f64> {
        let elapsed: Duration = now.saturating_duration_since(self.last_at);
        if elapsed < self.interval || elapsed.is_zero() {
            return None;
        }

        let rate: f64 = total.saturating_sub(self.last_bytes) as f64 / elapsed.as_secs_f64();
        self.last_at = now;
        self.last_bytes = total;
        Some(rate)
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
