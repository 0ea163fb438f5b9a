use crate::collect::scheduler::CollectorScheduler;
use crate::config::FleetmonConfig;
use crate::evaluate::scheduler::EvaluationScheduler;
use anyhow::Context;
use fleetmon_alert::engine::IncidentEngine;
use fleetmon_alert::rules::build_rules;
use fleetmon_source::{HttpMetricSource, MetricSource};
use fleetmon_storage::engine::SqliteStorageEngine;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Everything the binary wires together from one config file.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<SqliteStorageEngine>,
    pub collector: Arc<CollectorScheduler>,
    pub evaluator: Arc<EvaluationScheduler>,
    pub config: Arc<FleetmonConfig>,
}

impl AppState {
    pub fn build(config: FleetmonConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(
            SqliteStorageEngine::new(Path::new(&config.data_dir))
                .with_context(|| format!("Failed to open storage in '{}'", config.data_dir))?,
        );
        let source: Arc<dyn MetricSource> = Arc::new(HttpMetricSource::new(
            Duration::from_secs(config.collector.request_timeout_secs),
        )?);
        Ok(Self::with_source(config, storage, source))
    }

    /// Wires the schedulers around an already opened store and a given
    /// metric source.
    pub fn with_source(
        config: FleetmonConfig,
        storage: Arc<SqliteStorageEngine>,
        source: Arc<dyn MetricSource>,
    ) -> Self {
        let collector = Arc::new(CollectorScheduler::new(
            storage.clone(),
            storage.clone(),
            source,
            config.collector.interval_secs,
            config.collector.max_concurrent,
        ));

        let rules = build_rules(&config.rules, config.sample_interval_secs());
        let engine = Arc::new(IncidentEngine::new(
            storage.clone(),
            storage.clone(),
            storage.clone(),
            rules,
        ));
        let evaluator = Arc::new(EvaluationScheduler::new(
            engine,
            config.evaluator.interval_secs,
        ));

        Self {
            storage,
            collector,
            evaluator,
            config: Arc::new(config),
        }
    }
}
