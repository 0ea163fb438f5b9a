//! Stand-in metrics endpoint for local runs and demos.
//!
//! Serves the same payload shape real machines expose, with random values,
//! so a collector can be pointed at it without any real fleet.

use axum::extract::Path;
use axum::routing::get;
use axum::{Json, Router};
use rand::Rng;
use serde::Serialize;
use serde_json::{json, Value};

pub const DEFAULT_ADDR: &str = "0.0.0.0:8001";
pub const DEFAULT_MACHINE_COUNT: u32 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct MockMachine {
    pub id: u32,
    pub name: String,
}

/// Display name used for the `index`-th machine, e.g. `node-07`.
pub fn machine_name(index: u32) -> String {
    format!("node-{index:02}")
}

pub fn router(machine_count: u32) -> Router {
    Router::new()
        .route("/m/list", get(move || list_machines(machine_count)))
        .route("/m/{mid}/metrics", get(machine_metrics))
}

async fn list_machines(machine_count: u32) -> Json<Vec<MockMachine>> {
    let machines = (1..=machine_count)
        .map(|id| MockMachine {
            id,
            name: machine_name(id),
        })
        .collect();
    Json(machines)
}

async fn machine_metrics(Path(_mid): Path<u32>) -> Json<Value> {
    Json(random_payload())
}

fn random_payload() -> Value {
    let mut rng = rand::thread_rng();
    json!({
        "cpu": rng.gen_range(1..=95),
        "mem": format!("{}%", rng.gen_range(10..=85)),
        "disk": format!("{}%", rng.gen_range(5..=90)),
        "uptime": format!(
            "{}d {}h {}m {}s",
            rng.gen_range(0..=5),
            rng.gen_range(0..=23),
            rng.gen_range(0..=59),
            rng.gen_range(0..=59)
        ),
    })
}
