#![cfg(test)]

use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;

use edgeprobe_common::config::{FilterConfig, ProbeConfig, ProbeMode, SpeedConfig};
use edgeprobe_common::measurement::{ProbeResult, SpeedResult};
use edgeprobe_core::report::Silent;
use edgeprobe_core::{filter, prober, speed};

use crate::fixtures::{self, Behavior, HttpFixture};

const RAY: &str = "7bd32409eda7b020-SJC";

fn tcp_config(port: u16) -> ProbeConfig {
    ProbeConfig {
        concurrency: 8,
        port,
        url: "http://edge.test/cdn-cgi/trace".to_string(),
        ..ProbeConfig::default()
    }
}

fn http_config(port: u16) -> ProbeConfig {
    ProbeConfig {
        mode: ProbeMode::Http,
        ..tcp_config(port)
    }
}

fn colos(codes: &[&str]) -> Option<BTreeSet<String>> {
    Some(codes.iter().map(|code| code.to_string()).collect())
}

#[tokio::test]
async fn tcp_probe_counts_every_handshake() {
    let fixture: HttpFixture = fixtures::serve(fixtures::loopback(1), 0, Behavior::ok())
        .await
        .expect("bind fixture");

    let results: Vec<ProbeResult> = prober::probe(
        &[fixtures::loopback(1)],
        &tcp_config(fixture.addr.port()),
        Arc::new(Silent),
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 1, "loopback listener should answer");
    let result: &ProbeResult = &results[0];
    assert_eq!(result.sent(), 4);
    assert_eq!(result.received(), 4);
    assert_eq!(result.loss_rate(), 0.0);
    assert_eq!(result.colo, None, "TCP mode reports no colo by default");
}

#[tokio::test]
async fn unreachable_candidates_end_the_run_quietly() {
    let port: u16 = fixtures::closed_port().await;
    let candidates: Vec<IpAddr> = vec![fixtures::loopback(1)];

    let results: Vec<ProbeResult> = prober::probe(&candidates, &tcp_config(port), Arc::new(Silent))
        .await
        .unwrap();
    assert!(results.is_empty(), "refused connections must be dropped");

    let ranked: Vec<ProbeResult> = filter::filter(results, &FilterConfig::default());
    assert!(ranked.is_empty());

    let speeds: Vec<SpeedResult> = speed::measure(ranked, &SpeedConfig::default(), Arc::new(Silent))
        .await
        .unwrap();
    assert!(speeds.is_empty(), "nothing to download from");
}

#[tokio::test]
async fn http_probe_extracts_the_colo() {
    let fixture: HttpFixture = fixtures::serve(fixtures::loopback(1), 0, Behavior::cloudflare(RAY))
        .await
        .expect("bind fixture");

    let results: Vec<ProbeResult> = prober::probe(
        &[fixtures::loopback(1)],
        &http_config(fixture.addr.port()),
        Arc::new(Silent),
    )
    .await
    .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].received(), 4);
    assert_eq!(results[0].colo.as_deref(), Some("SJC"));
    assert!(results[0].mean_delay().is_some());
}

#[tokio::test]
async fn http_probe_accepts_listed_colo() {
    let fixture: HttpFixture = fixtures::serve(fixtures::loopback(1), 0, Behavior::cloudflare(RAY))
        .await
        .expect("bind fixture");
    let config: ProbeConfig = ProbeConfig {
        colos: colos(&["LAX", "SJC"]),
        ..http_config(fixture.addr.port())
    };

    let results: Vec<ProbeResult> = prober::probe(&[fixtures::loopback(1)], &config, Arc::new(Silent))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
}

#[tokio::test]
async fn http_probe_rejects_unlisted_colo() {
    let fixture: HttpFixture = fixtures::serve(fixtures::loopback(1), 0, Behavior::cloudflare(RAY))
        .await
        .expect("bind fixture");
    let config: ProbeConfig = ProbeConfig {
        colos: colos(&["LAX"]),
        ..http_config(fixture.addr.port())
    };

    let results: Vec<ProbeResult> = prober::probe(&[fixtures::loopback(1)], &config, Arc::new(Silent))
        .await
        .unwrap();
    assert!(results.is_empty(), "SJC is not in the allow-set");
}

#[tokio::test]
async fn http_probe_rejects_missing_colo_when_filtering() {
    let fixture: HttpFixture = fixtures::serve(fixtures::loopback(1), 0, Behavior::ok())
        .await
        .expect("bind fixture");
    let config: ProbeConfig = ProbeConfig {
        colos: colos(&["SJC"]),
        ..http_config(fixture.addr.port())
    };

    let results: Vec<ProbeResult> = prober::probe(&[fixtures::loopback(1)], &config, Arc::new(Silent))
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn http_probe_rejects_unexpected_status() {
    let fixture: HttpFixture = fixtures::serve(fixtures::loopback(1), 0, Behavior::status(403))
        .await
        .expect("bind fixture");

    let results: Vec<ProbeResult> = prober::probe(
        &[fixtures::loopback(1)],
        &http_config(fixture.addr.port()),
        Arc::new(Silent),
    )
    .await
    .unwrap();
    assert!(results.is_empty(), "403 is not an accepted status");

    let config: ProbeConfig = ProbeConfig {
        status_codes: vec![403],
        ..http_config(fixture.addr.port())
    };
    let results: Vec<ProbeResult> = prober::probe(&[fixtures::loopback(1)], &config, Arc::new(Silent))
        .await
        .unwrap();
    assert_eq!(results.len(), 1, "403 accepted once listed");
}

#[tokio::test]
async fn tcp_probe_can_report_colo() {
    let fixture: HttpFixture = fixtures::serve(fixtures::loopback(1), 0, Behavior::cloudflare(RAY))
        .await
        .expect("bind fixture");
    let config: ProbeConfig = ProbeConfig {
        report_colo: true,
        ..tcp_config(fixture.addr.port())
    };

    let results: Vec<ProbeResult> = prober::probe(&[fixtures::loopback(1)], &config, Arc::new(Silent))
        .await
        .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].colo.as_deref(), Some("SJC"));
}

#[tokio::test]
async fn http_probe_closes_after_the_last_timed_request() {
    let fixture: HttpFixture = fixtures::serve(fixtures::loopback(1), 0, Behavior::cloudflare(RAY))
        .await
        .expect("bind fixture");
    let config: ProbeConfig = http_config(fixture.addr.port());

    let results: Vec<ProbeResult> = prober::probe(&[fixtures::loopback(1)], &config, Arc::new(Silent))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(
        fixture.counters.requests(),
        config.ping_times as usize + 1,
        "one verification request plus one per timed attempt"
    );
    assert_eq!(
        fixture.counters.closing_requests(),
        1,
        "only the last timed request asks to close"
    );
}
