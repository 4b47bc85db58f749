//! Batch tests: every line yields one outcome and the worker bound holds

mod common;

use common::{
    checker, dead_port, spawn_fraud_service, spawn_geo_proxy, spawn_server, MockServer, GEO_URL,
};
use futures::future::join_all;
use proxy_score::export::{filter, render_tabular, Column, ExportSelection, FilterSpec};
use proxy_score::proxy::FailureReason;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_good_and_malformed_line() {
    let proxy = spawn_geo_proxy("10.0.0.2").await;
    let fraud = spawn_fraud_service().await;
    let checker = checker(&fraud.url(), 2);

    let lines = vec![
        format!("127.0.0.1:{}:alice:secret", proxy.port),
        "badline".to_string(),
    ];
    let aggregate = checker.run_batch(lines).await;

    assert_eq!(aggregate.rows.len(), 1);
    assert_eq!(aggregate.failures.len(), 1);
    assert_eq!(aggregate.failures[0].reason, FailureReason::MalformedInput);
    assert_eq!(aggregate.failures[0].original_input, "badline");
    assert_eq!(aggregate.summary.total, 1);
    assert_eq!(aggregate.summary.high_risk, 0);
    assert!(aggregate.finished_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_hundred_lines_counted_exactly_once() {
    let fraud = spawn_fraud_service().await;
    let proxies: Vec<MockServer> = join_all(
        ["10.0.0.1", "10.0.0.2", "10.0.0.5"]
            .into_iter()
            .map(spawn_geo_proxy),
    )
    .await;
    let dead = dead_port().await;

    let lines: Vec<String> = (0..100)
        .map(|i| match i % 5 {
            0 => format!("127.0.0.1:{}:user{}:pass", proxies[0].port, i),
            1 => format!("127.0.0.1:{}:user{}:pass", proxies[1].port, i),
            2 => format!("127.0.0.1:{}:user{}:pass", proxies[2].port, i),
            3 => format!("127.0.0.1:{}:user{}:pass", dead, i),
            _ => format!("malformed-{}", i),
        })
        .collect();

    for _ in 0..5 {
        let aggregate = checker(&fraud.url(), 10).run_batch(lines.clone()).await;

        assert_eq!(aggregate.rows.len() + aggregate.failures.len(), 100);
        assert_eq!(aggregate.rows.len(), 60);
        assert_eq!(aggregate.summary.total, aggregate.rows.len());
        let high_risk = aggregate.rows.iter().filter(|r| r.fraud_score >= 75).count();
        assert_eq!(aggregate.summary.high_risk, high_risk);
        assert_eq!(high_risk, 20);

        let unreachable = aggregate
            .failures
            .iter()
            .filter(|f| f.reason == FailureReason::GeolocationUnreachable)
            .count();
        let malformed = aggregate
            .failures
            .iter()
            .filter(|f| f.reason == FailureReason::MalformedInput)
            .count();
        assert_eq!(unreachable, 20);
        assert_eq!(malformed, 20);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_bound_is_respected() {
    let body = r#"{"status":"success","query":"10.0.0.2","city":"Oslo","regionName":"Oslo"}"#;
    let proxy = spawn_server(
        Arc::new(move |_| body.to_string()),
        Duration::from_millis(50),
    )
    .await;
    let fraud = spawn_fraud_service().await;

    let lines: Vec<String> = (0..20)
        .map(|i| format!("127.0.0.1:{}:user{}:pass", proxy.port, i))
        .collect();
    let aggregate = checker(&fraud.url(), 4).run_batch(lines).await;

    assert_eq!(aggregate.rows.len(), 20);
    assert_eq!(proxy.request_count(), 20);
    let peak = proxy.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 4, "saw {} probes in flight", peak);
    assert!(peak >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_progress_reports_every_outcome() {
    let proxy = spawn_geo_proxy("10.0.0.1").await;
    let fraud = spawn_fraud_service().await;
    let checker = checker(&fraud.url(), 3);

    let mut lines: Vec<String> = (0..8)
        .map(|i| format!("127.0.0.1:{}:user{}:pass", proxy.port, i))
        .collect();
    lines.push("bad".to_string());
    lines.push("also:bad".to_string());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let aggregate = checker.run_batch_with_progress(lines, Some(tx)).await;

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    assert_eq!(events.len(), 10);
    assert!(events.iter().all(|e| e.total == 10));
    let mut completed: Vec<usize> = events.iter().map(|e| e.completed).collect();
    completed.sort_unstable();
    assert_eq!(completed, (1..=10).collect::<Vec<_>>());
    let successes = events.iter().filter(|e| e.outcome.is_success()).count();
    assert_eq!(successes, aggregate.rows.len());
    assert_eq!(successes, 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_checked_rows_filter_and_export() {
    let fraud = spawn_fraud_service().await;
    let high = spawn_geo_proxy("10.0.0.1").await;
    let low = spawn_geo_proxy("10.0.0.2").await;
    let checker = checker(&fraud.url(), 2);

    let lines = vec![
        format!("127.0.0.1:{}:a:b", high.port),
        format!("127.0.0.1:{}:c:d", low.port),
    ];
    let aggregate = checker.run_batch(lines).await;
    assert_eq!(aggregate.rows.len(), 2);

    let kept = filter(&aggregate.rows, &FilterSpec::new().with_max_fraud_score(50));
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].public_ip, "10.0.0.2");

    let csv = render_tabular(&ExportSelection::new(
        kept,
        vec![Column::PublicIp, Column::FraudScore, Column::Vpn],
    ))
    .unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, vec!["Public IP,Fraud Score,VPN", "10.0.0.2,20,False"]);
}

#[tokio::test]
async fn test_unparseable_geo_body_is_rejected() {
    let proxy = spawn_server(Arc::new(|_| "not json".to_string()), Duration::ZERO).await;
    let fraud = spawn_fraud_service().await;
    let checker = checker(&fraud.url(), 1);

    let aggregate = checker
        .run_batch(vec![format!("127.0.0.1:{}:u:p", proxy.port)])
        .await;
    assert_eq!(aggregate.failures.len(), 1);
    assert_eq!(
        aggregate.failures[0].reason,
        FailureReason::GeolocationRejected
    );
    assert!(proxy.requests.lock().unwrap()[0].contains(GEO_URL));
    assert_eq!(fraud.request_count(), 0);
}
