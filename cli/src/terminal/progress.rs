//! Progress bars for the latency and download stages.
//!
//! Bars live in one global [`MultiProgress`]; log output is written through
//! [`ProgressWriter`], which suspends the bars while a line is printed so
//! they are redrawn below it instead of being torn.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Duration;

use colored::*;
use edgeprobe_common::measurement::{BYTES_PER_MB, ProbeResult};
use edgeprobe_core::report::Reporter;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;
use tracing::info;

const TICK_STRINGS: &[&str] = &[
    "▁▁▁▁▁",
    "▁▂▂▂▁",
    "▁▄▂▄▁",
    "▂▄▆▄▂",
    "▄▆█▆▄",
    "▂▄▆▄▂",
    "▁▄▂▄▁",
    "▁▂▂▂▁",
];

static MULTI: OnceLock<MultiProgress> = OnceLock::new();

pub fn multi() -> &'static MultiProgress {
    MULTI.get_or_init(MultiProgress::new)
}

pub struct ProgressWriter;

impl Write for ProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        multi().suspend(|| std::io::stdout().lock().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stdout().lock().flush()
    }
}

pub fn writer() -> ProgressWriter {
    ProgressWriter
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_strings(TICK_STRINGS)
        .progress_chars("━╸─")
}

/// Renders engine progress on the terminal.
pub struct TerminalReporter {
    hidden: bool,
    latency: Mutex<Option<ProgressBar>>,
    download: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    /// `quiet > 1` hides the bars entirely.
    pub fn new(quiet: u8) -> Self {
        Self {
            hidden: quiet > 1,
            latency: Mutex::new(None),
            download: Mutex::new(None),
        }
    }

    fn bar(&self, len: usize, template: &str) -> ProgressBar {
        if self.hidden {
            return ProgressBar::with_draw_target(Some(len as u64), ProgressDrawTarget::hidden());
        }

        let bar: ProgressBar = multi().add(ProgressBar::new(len as u64));
        bar.set_style(style(template));
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }
}

impl Reporter for TerminalReporter {
    fn probe_started(&self, total: usize) {
        let bar: ProgressBar = self.bar(
            total,
            "{spinner:.blue} {bar:32.green/black} {pos}/{len} {prefix} {msg}",
        );
        bar.set_prefix(format!("{}", "usable:".bright_black()));
        bar.set_message("0");
        *self.latency.lock() = Some(bar);
    }

    fn probe_progress(&self, done: usize, usable: usize) {
        if let Some(bar) = self.latency.lock().as_ref() {
            bar.set_position(done as u64);
            bar.set_message(format!("{}", usable.to_string().green().bold()));
        }
    }

    fn batch_finished(&self, index: usize, results: &[ProbeResult]) {
        info!("Batch {} finished with {} usable addresses", index + 1, results.len());
    }

    fn probe_finished(&self) {
        if let Some(bar) = self.latency.lock().take() {
            bar.finish_and_clear();
        }
    }

    fn speed_started(&self, target: usize, queued: usize) {
        let bar: ProgressBar = self.bar(
            target,
            "{spinner:.blue} {bar:32.cyan/black} {pos}/{len} {msg}",
        );
        bar.set_message(format!("{}", format!("{queued} queued").bright_black()));
        *self.download.lock() = Some(bar);
    }

    fn speed_progress(&self, accepted: usize) {
        if let Some(bar) = self.download.lock().as_ref() {
            bar.set_position(accepted as u64);
        }
    }

    fn bandwidth(&self, bytes_per_sec: f64) {
        if let Some(bar) = self.download.lock().as_ref() {
            let rate: String = format!("{:.2} MB/s", bytes_per_sec / BYTES_PER_MB);
            bar.set_message(format!("{}", rate.yellow()));
        }
    }

    fn speed_finished(&self) {
        if let Some(bar) = self.download.lock().take() {
            bar.finish_and_clear();
        }
    }
}
