//! Smoothed download rate from a stream of (time, bytes so far) readings.
//!
//! The download window is cut into equal slices. Whenever a reading lands
//! past one or more slice boundaries, the bytes received since the previous
//! boundary are split evenly over the crossed slices and each share is fed
//! to an exponentially weighted moving average.

use std::time::{Duration, Instant};

pub const DEFAULT_AGE: f64 = 30.0;

/// Moving average seeded with its first sample.
#[derive(Debug, Clone)]
pub struct Ewma {
    decay: f64,
    value: Option<f64>,
}

impl Ewma {
    /// `age` is the average age of the samples, giving a smoothing factor of
    /// `2 / (age + 1)`.
    pub fn new(age: f64) -> Self {
        Self {
            decay: 2.0 / (age + 1.0),
            value: None,
        }
    }

    pub fn add(&mut self, sample: f64) {
        self.value = Some(match self.value {
            None => sample,
            Some(value) => value + self.decay * (sample - value),
        });
    }

    pub fn value(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    pub fn is_seeded(&self) -> bool {
        self.value.is_some()
    }
}

impl Default for Ewma {
    fn default() -> Self {
        Self::new(DEFAULT_AGE)
    }
}

#[derive(Debug, Clone)]
pub struct RateEstimator {
    started: Instant,
    slice: Duration,
    slices: u32,
    /// Seconds per slice after rescaling: `max_duration / rescale_divisor`.
    scale: f64,
    completed: u64,
    bytes: u64,
    bytes_at_boundary: u64,
    ewma: Ewma,
}

impl RateEstimator {
    pub fn new(started: Instant, max_duration: Duration, slices: u32, rescale_divisor: f64) -> Self {
        let slices: u32 = slices.max(1);
        Self {
            started,
            slice: max_duration / slices,
            slices,
            scale: max_duration.as_secs_f64() / rescale_divisor,
            completed: 0,
            bytes: 0,
            bytes_at_boundary: 0,
            ewma: Ewma::default(),
        }
    }

    /// Records that `total` bytes had arrived by `now`.
    pub fn record(&mut self, now: Instant, total: u64) {
        self.bytes = total;

        let elapsed: u64 = self.slices_elapsed(now);
        let crossed: u64 = elapsed.saturating_sub(self.completed);
        if crossed == 0 {
            return;
        }

        let share: f64 = (self.bytes - self.bytes_at_boundary) as f64 / crossed as f64;
        for _ in 0..crossed.min(u64::from(self.slices)) {
            self.ewma.add(share);
        }

        self.completed = elapsed;
        self.bytes_at_boundary = self.bytes;
    }

    /// Folds the unfinished slice in when the body ended early, weighted by
    /// how much of the slice had passed.
    pub fn finish(&mut self, now: Instant, total: u64) {
        self.record(now, total);

        let offset: Duration = self
            .slice
            .saturating_mul(u32::try_from(self.completed).unwrap_or(u32::MAX));
        let Some(slice_start) = self.started.checked_add(offset) else {
            return;
        };
        let partial: f64 = now.saturating_duration_since(slice_start).as_secs_f64() / self.slice.as_secs_f64();
        if partial <= 0.0 {
            return;
        }

        let pending: u64 = self.bytes - self.bytes_at_boundary;
        self.ewma.add(pending as f64 / partial);
        self.bytes_at_boundary = self.bytes;
    }

    /// Bytes per second.
    pub fn speed(&self) -> f64 {
        if !self.ewma.is_seeded() || self.scale <= 0.0 {
            return 0.0;
        }
        self.ewma.value() / self.scale
    }

    fn slices_elapsed(&self, now: Instant) -> u64 {
        let slice_nanos: u128 = self.slice.as_nanos().max(1);
        let elapsed: u128 = now.saturating_duration_since(self.started).as_nanos();
        u64::try_from(elapsed / slice_nanos).unwrap_or(u64::MAX)
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

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(10);

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= b.abs() * 1e-9
    }

    #[test]
    fn ewma_is_seeded_by_first_sample() {
        let mut ewma: Ewma = Ewma::default();
        assert_eq!(ewma.value(), 0.0);

        ewma.add(10.0);
        assert_eq!(ewma.value(), 10.0);

        ewma.add(41.0);
        assert!(close(ewma.value(), 12.0));
    }

    #[test]
    fn fixed_rate_stream_converges_to_its_rate() {
        let rate: u64 = 1_000_000;
        let start: Instant = Instant::now();
        let mut estimator: RateEstimator = RateEstimator::new(start, WINDOW, 100, 100.0);

        let mut total: u64 = 0;
        for step in 1..=1000u32 {
            total += rate / 100;
            estimator.record(start + Duration::from_millis(10) * step, total);
        }

        assert!(close(estimator.speed(), rate as f64));
    }

    #[test]
    fn skipped_slices_share_the_bytes() {
        let start: Instant = Instant::now();
        let mut estimator: RateEstimator = RateEstimator::new(start, WINDOW, 100, 100.0);

        estimator.record(start + Duration::from_millis(300), 30_000);
        assert!(close(estimator.speed(), 100_000.0));
    }

    #[test]
    fn partial_slice_is_folded_on_finish() {
        let start: Instant = Instant::now();
        let mut estimator: RateEstimator = RateEstimator::new(start, WINDOW, 100, 100.0);

        estimator.record(start + Duration::from_millis(100), 10_000);
        estimator.finish(start + Duration::from_millis(150), 15_000);

        assert!(close(estimator.speed(), 100_000.0));
    }

    #[test]
    fn short_download_still_gets_a_rate() {
        let start: Instant = Instant::now();
        let mut estimator: RateEstimator = RateEstimator::new(start, WINDOW, 100, 100.0);

        estimator.finish(start + Duration::from_millis(50), 2_500);
        assert!(close(estimator.speed(), 50_000.0));
    }

    #[test]
    fn nothing_received_is_zero() {
        let start: Instant = Instant::now();
        let estimator: RateEstimator = RateEstimator::new(start, WINDOW, 100, 100.0);
        assert_eq!(estimator.speed(), 0.0);
    }

    #[test]
    fn historic_divisor_scales_the_result() {
        let start: Instant = Instant::now();
        let mut estimator: RateEstimator = RateEstimator::new(start, WINDOW, 100, 120.0);

        estimator.record(start + Duration::from_millis(100), 10_000);
        assert!(close(estimator.speed(), 120_000.0));
    }
}
