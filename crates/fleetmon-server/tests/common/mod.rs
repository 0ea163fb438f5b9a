#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use fleetmon_common::types::{Machine, MetricReading, MetricSample};
use fleetmon_server::config::FleetmonConfig;
use fleetmon_server::state::AppState;
use fleetmon_source::{HttpMetricSource, MetricSource};
use fleetmon_storage::engine::SqliteStorageEngine;
use fleetmon_storage::{MachineStore, MetricStore, StorageError};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub struct TestContext {
    pub temp_dir: TempDir,
    pub storage: Arc<SqliteStorageEngine>,
    pub state: AppState,
}

/// Config tuned for tests: short HTTP timeout, small fan-out.
pub fn test_config(temp_dir: &TempDir) -> FleetmonConfig {
    let mut config = FleetmonConfig::default();
    config.data_dir = temp_dir.path().to_string_lossy().into_owned();
    config.collector.interval_secs = 900;
    config.collector.max_concurrent = 4;
    config.collector.request_timeout_secs = 1;
    config.evaluator.interval_secs = 300;
    config
}

pub fn build_test_context() -> Result<TestContext> {
    build_test_context_with(|_| {})
}

pub fn build_test_context_with(tweak: impl FnOnce(&mut FleetmonConfig)) -> Result<TestContext> {
    fleetmon_common::id::init(1, 1);

    let temp_dir = tempfile::tempdir()?;
    let mut config = test_config(&temp_dir);
    tweak(&mut config);
    config.validate()?;

    let storage = Arc::new(SqliteStorageEngine::new(temp_dir.path())?);
    let source: Arc<dyn MetricSource> = Arc::new(HttpMetricSource::new(
        std::time::Duration::from_secs(config.collector.request_timeout_secs),
    )?);
    let state = AppState::with_source(config, storage.clone(), source);

    Ok(TestContext {
        temp_dir,
        storage,
        state,
    })
}

/// Serves `router` on an ephemeral local port.
pub async fn spawn_server(router: Router) -> Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    Ok(addr)
}

pub fn add_machine(storage: &SqliteStorageEngine, name: &str, endpoint: &str) -> Result<Machine> {
    let (machine, _) = storage.ensure_machine(name, endpoint)?;
    Ok(machine)
}

/// Pushes a sample `minutes` after `base`.
pub fn push_sample(
    storage: &SqliteStorageEngine,
    machine: &Machine,
    base: DateTime<Utc>,
    minutes: i64,
    cpu: i64,
    mem: f64,
    disk: f64,
) -> Result<MetricSample> {
    let reading = MetricReading {
        cpu,
        mem_percent: mem,
        disk_percent: disk,
        uptime_label: format!("t+{minutes}m"),
    };
    Ok(storage.append_at(&machine.id, &reading, base + Duration::minutes(minutes))?)
}

/// Metric store that refuses appends for one machine and forwards the rest.
pub struct RejectingMetrics {
    pub inner: Arc<SqliteStorageEngine>,
    pub reject_machine_id: String,
}

impl MetricStore for RejectingMetrics {
    fn append_at(
        &self,
        machine_id: &str,
        reading: &MetricReading,
        received_at: DateTime<Utc>,
    ) -> fleetmon_storage::Result<MetricSample> {
        if machine_id == self.reject_machine_id {
            return Err(StorageError::NotFound {
                entity: "machine",
                id: machine_id.to_string(),
            });
        }
        self.inner.append_at(machine_id, reading, received_at)
    }

    fn most_recent(&self, machine_id: &str, n: usize) -> fleetmon_storage::Result<Vec<MetricSample>> {
        self.inner.most_recent(machine_id, n)
    }

    fn most_recent_within(
        &self,
        machine_id: &str,
        window: Duration,
    ) -> fleetmon_storage::Result<Vec<MetricSample>> {
        self.inner.most_recent_within(machine_id, window)
    }
}

/// Source that never touches the network and tracks peak concurrency.
pub struct CountingSource {
    pub in_flight: std::sync::atomic::AtomicUsize,
    pub peak: std::sync::atomic::AtomicUsize,
    pub delay: std::time::Duration,
}

impl CountingSource {
    pub fn new(delay: std::time::Duration) -> Self {
        Self {
            in_flight: Default::default(),
            peak: Default::default(),
            delay,
        }
    }

    pub fn peak(&self) -> usize {
        self.peak.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch(&self, _endpoint: &str) -> fleetmon_source::error::Result<MetricReading> {
        use std::sync::atomic::Ordering;

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(MetricReading {
            cpu: 10,
            mem_percent: 20.0,
            disk_percent: 30.0,
            uptime_label: "1d 0h 0m 0s".to_string(),
        })
    }
}
