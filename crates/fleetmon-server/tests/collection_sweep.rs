mod common;

use axum::http::StatusCode;
use axum::routing::get;
use common::{add_machine, build_test_context, spawn_server, CountingSource, RejectingMetrics};
use fleetmon_server::collect::scheduler::CollectorScheduler;
use fleetmon_server::collect::SweepError;
use fleetmon_server::mock;
use fleetmon_storage::MetricStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn sweep_stores_healthy_machines_and_reports_failures() {
    let ctx = build_test_context().unwrap();
    let router = mock::router(3)
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "{}"
            }),
        )
        .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
    let addr = spawn_server(router).await.unwrap();

    let mut healthy = Vec::new();
    for i in 1..=3 {
        healthy.push(
            add_machine(
                &ctx.storage,
                &mock::machine_name(i),
                &format!("http://{addr}/m/{i}/metrics"),
            )
            .unwrap(),
        );
    }
    let slow = add_machine(&ctx.storage, "slow", &format!("http://{addr}/slow")).unwrap();
    add_machine(&ctx.storage, "down", &format!("http://{addr}/down")).unwrap();

    let report = ctx.state.collector.run_sweep().await.unwrap();
    assert_eq!(report.machines, 5);
    assert_eq!(report.dispatched, 5);
    assert_eq!(report.persisted, 3);
    assert_eq!(report.store_failures, 0);

    let kinds: BTreeSet<&str> = report.failures.iter().map(|f| f.kind).collect();
    assert_eq!(kinds, BTreeSet::from(["status", "timeout"]));

    for machine in &healthy {
        let samples = ctx.storage.most_recent(&machine.id, 10).unwrap();
        assert_eq!(samples.len(), 1, "{} should have one sample", machine.name);
        assert!((1..=95).contains(&samples[0].cpu));
    }
    assert!(ctx.storage.most_recent(&slow.id, 10).unwrap().is_empty());
}

#[tokio::test]
async fn sweep_never_exceeds_max_concurrent() {
    let ctx = build_test_context().unwrap();
    for i in 1..=10 {
        add_machine(&ctx.storage, &mock::machine_name(i), &format!("http://unused/{i}")).unwrap();
    }

    let source = Arc::new(CountingSource::new(Duration::from_millis(50)));
    let collector = CollectorScheduler::new(
        ctx.storage.clone(),
        ctx.storage.clone(),
        source.clone(),
        900,
        3,
    );

    let report = collector.run_sweep().await.unwrap();
    assert_eq!(report.persisted, 10);
    assert!(source.peak() <= 3, "peak concurrency was {}", source.peak());
    assert!(source.peak() >= 1);
}

#[tokio::test]
async fn cancelled_sweep_dispatches_nothing_new() {
    let ctx = build_test_context().unwrap();
    let mut machines = Vec::new();
    for i in 1..=5 {
        machines.push(
            add_machine(&ctx.storage, &mock::machine_name(i), &format!("http://unused/{i}"))
                .unwrap(),
        );
    }

    let collector = CollectorScheduler::new(
        ctx.storage.clone(),
        ctx.storage.clone(),
        Arc::new(CountingSource::new(Duration::from_millis(1))),
        900,
        2,
    );

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = collector.run_sweep_until(&cancel).await.unwrap();
    assert_eq!(report.machines, 5);
    assert_eq!(report.dispatched, 0);
    assert_eq!(report.skipped(), 5);
    for machine in &machines {
        assert!(ctx.storage.most_recent(&machine.id, 1).unwrap().is_empty());
    }
}

#[tokio::test]
async fn store_failure_is_reported_after_the_sweep_completes() {
    let ctx = build_test_context().unwrap();
    let a = add_machine(&ctx.storage, "node-01", "http://unused/1").unwrap();
    let b = add_machine(&ctx.storage, "node-02", "http://unused/2").unwrap();
    let c = add_machine(&ctx.storage, "node-03", "http://unused/3").unwrap();

    let metrics = Arc::new(RejectingMetrics {
        inner: ctx.storage.clone(),
        reject_machine_id: b.id.clone(),
    });
    let collector = CollectorScheduler::new(
        ctx.storage.clone(),
        metrics,
        Arc::new(CountingSource::new(Duration::from_millis(1))),
        900,
        4,
    );

    match collector.run_sweep().await {
        Err(SweepError::Store { report, .. }) => {
            assert_eq!(report.persisted, 2);
            assert_eq!(report.store_failures, 1);
            assert!(report.failures.is_empty());
        }
        other => panic!("expected a store error, got {other:?}"),
    }

    assert_eq!(ctx.storage.most_recent(&a.id, 5).unwrap().len(), 1);
    assert!(ctx.storage.most_recent(&b.id, 5).unwrap().is_empty());
    assert_eq!(ctx.storage.most_recent(&c.id, 5).unwrap().len(), 1);
}

#[tokio::test]
async fn scheduler_loop_stops_on_cancel() {
    let ctx = build_test_context().unwrap();
    let machine = add_machine(&ctx.storage, "node-01", "http://unused/1").unwrap();

    let collector = Arc::new(CollectorScheduler::new(
        ctx.storage.clone(),
        ctx.storage.clone(),
        Arc::new(CountingSource::new(Duration::from_millis(1))),
        3600,
        1,
    ));

    let cancel = CancellationToken::new();
    let handle = {
        let collector = collector.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { collector.run(cancel).await })
    };

    // The first tick fires immediately.
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();

    assert_eq!(ctx.storage.most_recent(&machine.id, 5).unwrap().len(), 1);
}
