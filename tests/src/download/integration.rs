#![cfg(test)]

use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use edgeprobe_common::config::SpeedConfig;
use edgeprobe_common::measurement::{ProbeResult, SpeedResult};
use edgeprobe_core::report::{Reporter, Silent};
use edgeprobe_core::speed;

use crate::fixtures::{self, Behavior, HttpFixture};

const KB: u64 = 1000;

fn speed_config(port: u16) -> SpeedConfig {
    SpeedConfig {
        url: "http://speedtest.local/file".to_string(),
        port,
        max_duration: Duration::from_secs(1),
        ..SpeedConfig::default()
    }
}

fn addrs(results: &[SpeedResult]) -> Vec<IpAddr> {
    results.iter().map(SpeedResult::addr).collect()
}

#[derive(Default)]
struct Recording {
    peak_bandwidth: Mutex<f64>,
    accepted: Mutex<usize>,
}

impl Reporter for Recording {
    fn speed_progress(&self, accepted: usize) {
        *self.accepted.lock().unwrap() = accepted;
    }

    fn bandwidth(&self, bytes_per_sec: f64) {
        let mut peak = self.peak_bandwidth.lock().unwrap();
        *peak = peak.max(bytes_per_sec);
    }
}

#[tokio::test]
async fn non_ok_status_scores_zero() {
    let fixture: HttpFixture = fixtures::serve(fixtures::loopback(1), 0, Behavior::status(404))
        .await
        .expect("bind fixture");
    let config: SpeedConfig = SpeedConfig {
        test_count: 1,
        ..speed_config(fixture.addr.port())
    };

    let results: Vec<SpeedResult> = speed::measure(
        vec![fixtures::reachable(fixtures::loopback(1))],
        &config,
        Arc::new(Silent),
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 1, "every attempt is kept when none qualifies");
    assert_eq!(results[0].download_speed, 0.0);
}

#[tokio::test]
async fn body_finishing_early_still_scores() {
    let fixture: HttpFixture = fixtures::serve(
        fixtures::loopback(1),
        0,
        Behavior::ok().with_body(200 * KB, 2_000 * KB),
    )
    .await
    .expect("bind fixture");
    let config: SpeedConfig = SpeedConfig {
        test_count: 1,
        ..speed_config(fixture.addr.port())
    };

    let results: Vec<SpeedResult> = speed::measure(
        vec![fixtures::reachable(fixtures::loopback(1))],
        &config,
        Arc::new(Silent),
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].download_speed > 0.0, "partial slice must be folded in");
}

#[tokio::test]
async fn disabled_download_keeps_delay_order() {
    let ranked: Vec<ProbeResult> = (1..=3).map(|i| fixtures::reachable(fixtures::loopback(i))).collect();
    let config: SpeedConfig = SpeedConfig {
        enabled: false,
        ..speed_config(1)
    };

    let results: Vec<SpeedResult> = speed::measure(ranked, &config, Arc::new(Silent)).await.unwrap();

    assert_eq!(
        addrs(&results),
        vec![fixtures::loopback(1), fixtures::loopback(2), fixtures::loopback(3)]
    );
    assert!(results.iter().all(|r| r.download_speed == 0.0));
}

// Extra loopback addresses beyond 127.0.0.1 are only routable on Linux.
#[cfg(target_os = "linux")]
mod loopback_range {
    use super::*;

    fn ranked(count: u8) -> Vec<ProbeResult> {
        (1..=count).map(|i| fixtures::reachable(fixtures::loopback(i))).collect()
    }

    #[tokio::test]
    async fn fastest_of_the_tested_prefix_come_first() {
        let servers: Vec<HttpFixture> = fixtures::serve_many(vec![
            (fixtures::loopback(1), Behavior::throttled(400 * KB)),
            (fixtures::loopback(2), Behavior::throttled(1_600 * KB)),
            (fixtures::loopback(3), Behavior::throttled(800 * KB)),
            (fixtures::loopback(4), Behavior::throttled(100 * KB)),
            (fixtures::loopback(5), Behavior::throttled(100 * KB)),
        ])
        .await
        .expect("bind fixtures");
        let config: SpeedConfig = SpeedConfig {
            test_count: 3,
            ..speed_config(servers[0].addr.port())
        };

        let results: Vec<SpeedResult> = speed::measure(ranked(5), &config, Arc::new(Silent)).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(
            addrs(&results),
            vec![fixtures::loopback(2), fixtures::loopback(3), fixtures::loopback(1)]
        );
        assert!(results.windows(2).all(|w| w[0].download_speed >= w[1].download_speed));
    }

    #[tokio::test]
    async fn speed_floor_walks_down_the_list() {
        let servers: Vec<HttpFixture> = fixtures::serve_many(vec![
            (fixtures::loopback(1), Behavior::throttled(100 * KB)),
            (fixtures::loopback(2), Behavior::throttled(1_600 * KB)),
            (fixtures::loopback(3), Behavior::throttled(1_600 * KB)),
        ])
        .await
        .expect("bind fixtures");
        let config: SpeedConfig = SpeedConfig {
            test_count: 1,
            min_speed: 500.0 * KB as f64,
            ..speed_config(servers[0].addr.port())
        };

        let results: Vec<SpeedResult> = speed::measure(ranked(3), &config, Arc::new(Silent)).await.unwrap();

        assert_eq!(addrs(&results), vec![fixtures::loopback(2)], "stops after the first qualifying one");
    }

    #[tokio::test]
    async fn concurrent_downloads_report_bandwidth() {
        let servers: Vec<HttpFixture> = fixtures::serve_many(vec![
            (fixtures::loopback(1), Behavior::throttled(400 * KB)),
            (fixtures::loopback(2), Behavior::throttled(1_600 * KB)),
            (fixtures::loopback(3), Behavior::throttled(800 * KB)),
        ])
        .await
        .expect("bind fixtures");
        let config: SpeedConfig = SpeedConfig {
            test_count: 3,
            concurrency: 3,
            bandwidth_interval: Duration::from_millis(100),
            ..speed_config(servers[0].addr.port())
        };
        let reporter: Arc<Recording> = Arc::new(Recording::default());

        let results: Vec<SpeedResult> = speed::measure(ranked(3), &config, reporter.clone()).await.unwrap();

        assert_eq!(
            addrs(&results),
            vec![fixtures::loopback(2), fixtures::loopback(3), fixtures::loopback(1)]
        );
        assert_eq!(*reporter.accepted.lock().unwrap(), 3);
        assert!(*reporter.peak_bandwidth.lock().unwrap() > 0.0);
    }
}
