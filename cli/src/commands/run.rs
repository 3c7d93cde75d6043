use std::sync::Arc;
use std::time::{Duration, Instant};

use colored::*;
use edgeprobe_common::config::Config;
use edgeprobe_common::network::source::RangeSource;
use edgeprobe_common::success;
use edgeprobe_core::pipeline::{self, Outcome};
use edgeprobe_core::report::Reporter;

use crate::export;
use crate::mprint;
use crate::terminal::progress::TerminalReporter;
use crate::terminal::{colors, format, print};

pub async fn run(config: &Config) -> anyhow::Result<()> {
    let quiet: u8 = config.output.quiet;

    print::header("settings", quiet);
    if quiet == 0 {
        print_settings(config);
    }

    let reporter: Arc<dyn Reporter> = Arc::new(TerminalReporter::new(quiet));
    let start_time: Instant = Instant::now();
    let outcome: Outcome = pipeline::run(config, reporter).await?;

    run_ends(&outcome, start_time.elapsed(), config)
}

fn print_settings(config: &Config) {
    print::align_keys(&["Source", "Mode", "Bounds", "Download"]);

    let source: String = match &config.source.ranges {
        RangeSource::Inline(list) => list.clone(),
        RangeSource::File(path) => path.display().to_string(),
    };
    print::aligned_line("Source", source);
    print::aligned_line(
        "Mode",
        format!(
            "{} :{} x{} ({} at once)",
            config.probe.mode, config.probe.port, config.probe.ping_times, config.probe.concurrency
        ),
    );
    print::aligned_line(
        "Bounds",
        format!(
            "{} ~ {} ms, loss <= {:.2}",
            config.filter.min_delay.as_millis(),
            config.filter.max_delay.as_millis(),
            config.filter.max_loss_rate
        ),
    );

    let download: String = if config.speed.enabled {
        format!(
            "{} addresses, {}s each, >= {:.2} MB/s",
            config.speed.test_count,
            config.speed.max_duration.as_secs(),
            config.speed.min_speed / edgeprobe_common::measurement::BYTES_PER_MB
        )
    } else {
        "disabled".to_string()
    };
    print::aligned_line("Download", download);
}

fn run_ends(outcome: &Outcome, total_time: Duration, config: &Config) -> anyhow::Result<()> {
    if outcome.results.is_empty() {
        print::header("no results", config.output.quiet);
        print::no_results();
        return Ok(());
    }

    if config.output.print_count > 0 {
        if config.output.quiet > 0 {
            mprint!();
        }
        print::header("results", config.output.quiet);
        format::print_table(&outcome.results, config.output.print_count, config.output.show_colo);
    }

    if let Some(path) = &config.output.path {
        if export::write_csv(path, &outcome.results, config.output.show_colo)? {
            success!("Results written to {}", path.display());
        }
    }

    print_summary(outcome, total_time, config);
    Ok(())
}

fn print_summary(outcome: &Outcome, total_time: Duration, config: &Config) {
    let usable: ColoredString = format!("{} of {}", outcome.probed, outcome.candidates).bold().green();
    let total_time: ColoredString = format!("{:.2}s", total_time.as_secs_f64()).bold().yellow();
    let output: String = format!("Run complete: {usable} usable in {total_time}")
        .color(colors::TEXT_DEFAULT)
        .to_string();

    match config.output.quiet {
        0 => {
            print::fat_separator();
            print::centerln(&output);
            print::end_of_program();
        }
        _ => success!("{}", output),
    }
}
