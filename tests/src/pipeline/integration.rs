#![cfg(test)]

use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use edgeprobe_common::config::Config;
use edgeprobe_common::network::source::RangeSource;
use edgeprobe_core::pipeline::{self, Outcome};
use edgeprobe_common::measurement::ProbeResult;
use edgeprobe_core::report::{Reporter, Silent};
use tempfile::NamedTempFile;

use crate::fixtures::{self, Behavior, HttpFixture};

fn range_file(lines: &str) -> NamedTempFile {
    let mut file: NamedTempFile = NamedTempFile::new().expect("create range file");
    file.write_all(lines.as_bytes()).expect("write range file");
    file
}

fn loopback_config(file: &NamedTempFile, port: u16) -> Config {
    let mut config: Config = Config::default();
    config.source.ranges = RangeSource::File(file.path().to_path_buf());
    config.probe.port = port;
    config.probe.concurrency = 4;
    config.speed.url = "http://speedtest.local/file".to_string();
    config.speed.port = port;
    config.speed.test_count = 1;
    config.speed.max_duration = Duration::from_secs(1);
    config
}

#[tokio::test]
async fn range_file_to_ranked_speed() {
    let fixture: HttpFixture = fixtures::serve(fixtures::loopback(1), 0, Behavior::throttled(800 * 1000))
        .await
        .expect("bind fixture");
    let file: NamedTempFile = range_file("# loopback\n127.0.0.1\n\n");

    let outcome: Outcome = pipeline::run(&loopback_config(&file, fixture.addr.port()), Arc::new(Silent))
        .await
        .unwrap();

    assert_eq!(outcome.candidates, 1);
    assert_eq!(outcome.probed, 1);
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].addr(), fixtures::loopback(1));
    assert!(outcome.results[0].download_speed > 0.0);
}

#[tokio::test]
async fn disabled_download_ranks_by_delay() {
    let fixture: HttpFixture = fixtures::serve(fixtures::loopback(1), 0, Behavior::ok())
        .await
        .expect("bind fixture");
    let file: NamedTempFile = range_file("127.0.0.1\n");
    let mut config: Config = loopback_config(&file, fixture.addr.port());
    config.speed.enabled = false;

    let outcome: Outcome = pipeline::run(&config, Arc::new(Silent)).await.unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].download_speed, 0.0);
    assert!(outcome.results[0].probe.mean_delay().is_some());
}

#[tokio::test]
async fn unreachable_ranges_produce_empty_results() {
    let port: u16 = fixtures::closed_port().await;
    let file: NamedTempFile = range_file("127.0.0.1\n");

    let outcome: Outcome = pipeline::run(&loopback_config(&file, port), Arc::new(Silent))
        .await
        .unwrap();

    assert_eq!(outcome.candidates, 1);
    assert_eq!(outcome.probed, 0);
    assert!(outcome.results.is_empty());
}

#[tokio::test]
async fn missing_range_file_is_an_error() {
    let mut config: Config = Config::default();
    config.source.ranges = RangeSource::File("/nonexistent/edgeprobe/ip.txt".into());

    assert!(pipeline::run(&config, Arc::new(Silent)).await.is_err());
}

/// Survivor counts per finished batch, in call order.
#[derive(Default)]
struct BatchLog {
    batches: Mutex<Vec<(usize, usize)>>,
}

impl Reporter for BatchLog {
    fn batch_finished(&self, index: usize, results: &[ProbeResult]) {
        self.batches.lock().unwrap().push((index, results.len()));
    }
}

// Extra loopback addresses beyond 127.0.0.1 are only routable on Linux.
#[cfg(target_os = "linux")]
#[tokio::test]
async fn batches_are_filtered_then_merged_in_rank_order() {
    let servers: Vec<HttpFixture> = fixtures::serve_many(vec![
        (fixtures::loopback(1), Behavior::ok()),
        (fixtures::loopback(2), Behavior::ok()),
        (fixtures::loopback(3), Behavior::ok()),
    ])
    .await
    .expect("bind fixtures");
    let file: NamedTempFile = range_file("127.0.0.1\n127.0.0.2\n127.0.0.3\n127.0.0.9\n");
    let mut config: Config = loopback_config(&file, servers[0].addr.port());
    config.speed.enabled = false;
    config.probe.batch_size = Some(2);
    config.filter.tie_tolerance = Duration::ZERO;
    let reporter: Arc<BatchLog> = Arc::new(BatchLog::default());

    let outcome: Outcome = pipeline::run(&config, reporter.clone()).await.unwrap();

    assert_eq!(outcome.candidates, 4);
    assert_eq!(outcome.probed, 3, "127.0.0.9 has no listener");
    assert_eq!(outcome.results.len(), 3);
    assert!(
        outcome
            .results
            .iter()
            .all(|r| r.addr() != fixtures::loopback(9))
    );

    let merged: Vec<&ProbeResult> = outcome.results.iter().map(|r| &r.probe).collect();
    assert!(
        merged.windows(2).all(|w| {
            w[0].loss_rate() < w[1].loss_rate()
                || (w[0].loss_rate() == w[1].loss_rate() && w[0].mean_delay() <= w[1].mean_delay())
        }),
        "merged batches must be ordered by loss, then delay"
    );

    let batches: Vec<(usize, usize)> = reporter.batches.lock().unwrap().clone();
    assert_eq!(batches.len(), 2, "four candidates in batches of two");
    assert_eq!(batches.iter().map(|(index, _)| *index).collect::<Vec<usize>>(), vec![0, 1]);
    assert_eq!(batches.iter().map(|(_, kept)| kept).sum::<usize>(), 3);
}
