//! Progress port between the engine and whatever renders it.
//!
//! All methods are observational and default to doing nothing.

use edgeprobe_common::measurement::ProbeResult;

pub trait Reporter: Send + Sync {
    fn probe_started(&self, _total: usize) {}

    /// `done` candidates finished so far, `usable` of them answered.
    fn probe_progress(&self, _done: usize, _usable: usize) {}

    /// A batch finished and survived filtering.
    fn batch_finished(&self, _index: usize, _results: &[ProbeResult]) {}

    fn probe_finished(&self) {}

    fn speed_started(&self, _target: usize, _queued: usize) {}

    fn speed_progress(&self, _accepted: usize) {}

    /// Sum of the live rates of all in-flight downloads, bytes per second.
    fn bandwidth(&self, _bytes_per_sec: f64) {}

    fn speed_finished(&self) {}
}

/// Reporter that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl Reporter for Silent {}
