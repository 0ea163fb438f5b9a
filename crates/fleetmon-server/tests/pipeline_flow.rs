mod common;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};
use common::{add_machine, build_test_context, push_sample, spawn_server};
use fleetmon_common::types::IncidentType;
use fleetmon_server::seed::{recent_incidents, seed_demo, seed_machines};
use fleetmon_storage::{IncidentStore, MachineStore};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

async fn fixed_metrics(State(cpu): State<Arc<AtomicI64>>) -> Json<Value> {
    Json(json!({
        "cpu": cpu.load(Ordering::SeqCst),
        "mem": "20%",
        "disk": "30%",
        "uptime": "3d 4h 5m 6s",
    }))
}

#[tokio::test]
async fn collected_cpu_spike_opens_and_then_resolves() {
    let ctx = build_test_context().unwrap();
    let cpu = Arc::new(AtomicI64::new(96));
    let router = Router::new()
        .route("/m/{mid}/metrics", get(fixed_metrics))
        .with_state(cpu.clone());
    let addr = spawn_server(router).await.unwrap();
    let machine = add_machine(&ctx.storage, "node-01", &format!("http://{addr}/m/1/metrics")).unwrap();

    let sweep = ctx.state.collector.run_sweep().await.unwrap();
    assert_eq!(sweep.persisted, 1);

    let pass = ctx.state.evaluator.run_pass().await.unwrap();
    assert_eq!(pass.opened, 1);
    let active = ctx
        .storage
        .find_active(&machine.id, IncidentType::CpuHigh)
        .unwrap()
        .expect("cpu incident should be active");
    assert_eq!(active.details["cpu"], 96);

    // Still high: the same incident is kept alive.
    ctx.state.collector.run_sweep().await.unwrap();
    let pass = ctx.state.evaluator.run_pass().await.unwrap();
    assert_eq!(pass.opened, 0);
    assert_eq!(pass.touched, 1);

    cpu.store(10, Ordering::SeqCst);
    ctx.state.collector.run_sweep().await.unwrap();
    let pass = ctx.state.evaluator.run_pass().await.unwrap();
    assert_eq!(pass.resolved, 1);

    let history = ctx.storage.incidents_for_machine(&machine.id).unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].is_active);
    assert_eq!(history[0].id, active.id);
    assert!(history[0].resolved_at.is_some());
}

#[tokio::test]
async fn seeding_machines_is_idempotent() {
    let ctx = build_test_context().unwrap();

    let first = seed_machines(ctx.storage.as_ref(), "http://mock:8001/", 5).unwrap();
    assert_eq!(first.created, 5);
    assert_eq!(first.existing, 0);

    let second = seed_machines(ctx.storage.as_ref(), "http://mock:8001", 5).unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.existing, 5);

    let machines = ctx.storage.list_active_machines().unwrap();
    assert_eq!(machines.len(), 5);
    let node_03 = ctx.storage.find_machine_by_name("node-03").unwrap().unwrap();
    assert_eq!(node_03.endpoint, "http://mock:8001/m/3/metrics");
}

#[tokio::test]
async fn demo_seed_opens_one_incident_of_each_type() {
    let ctx = build_test_context().unwrap();
    seed_machines(ctx.storage.as_ref(), "http://127.0.0.1:9", 3).unwrap();

    let demo = seed_demo(ctx.storage.as_ref(), ctx.storage.as_ref(), Utc::now()).unwrap();
    assert_eq!(demo.seeded.len(), 3);
    assert_eq!(demo.samples, 11);

    let pass = ctx.state.evaluator.run_pass().await.unwrap();
    assert_eq!(pass.machines, 3);
    assert_eq!(pass.opened, 3);

    let listing = recent_incidents(ctx.storage.as_ref(), Utc::now(), 24).unwrap();
    let seen: BTreeSet<(String, IncidentType)> = listing
        .iter()
        .map(|entry| (entry.machine.clone(), entry.incident_type))
        .collect();
    assert_eq!(
        seen,
        BTreeSet::from([
            ("node-01".to_string(), IncidentType::CpuHigh),
            ("node-02".to_string(), IncidentType::MemHigh),
            ("node-03".to_string(), IncidentType::DiskHigh),
        ])
    );
    assert!(listing.iter().all(|entry| entry.is_active));
}

#[tokio::test]
async fn demo_seed_skips_missing_machines() {
    let ctx = build_test_context().unwrap();
    add_machine(&ctx.storage, "node-02", "http://unused/2").unwrap();

    let demo = seed_demo(ctx.storage.as_ref(), ctx.storage.as_ref(), Utc::now()).unwrap();
    assert_eq!(demo.seeded.len(), 1);
    assert_eq!(demo.samples, 2);
}

#[tokio::test]
async fn incident_listing_only_covers_the_requested_window() {
    let ctx = build_test_context().unwrap();
    let machine = add_machine(&ctx.storage, "node-01", "http://unused/1").unwrap();
    let now = Utc::now();
    let base = now - Duration::hours(30);

    push_sample(&ctx.storage, &machine, base, 0, 99, 10.0, 10.0).unwrap();
    ctx.storage
        .open(&machine.id, IncidentType::CpuHigh, &json!({}), base)
        .unwrap();
    ctx.storage
        .resolve_active(&machine.id, IncidentType::CpuHigh, base + Duration::minutes(15))
        .unwrap();

    assert!(recent_incidents(ctx.storage.as_ref(), now, 24).unwrap().is_empty());
    assert_eq!(recent_incidents(ctx.storage.as_ref(), now, 48).unwrap().len(), 1);
}
