use super::{FetchFailure, SweepError, SweepReport};
use fleetmon_common::types::{Machine, MetricSample};
use fleetmon_source::{FetchError, MetricSource};
use fleetmon_storage::{MachineStore, MetricStore, StorageError};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

enum MachineOutcome {
    Stored(MetricSample),
    FetchFailed(FetchError),
    StoreFailed(StorageError),
}

/// Periodically fetches every active machine's metrics and appends one
/// sample per successful fetch.
pub struct CollectorScheduler {
    machines: Arc<dyn MachineStore>,
    metrics: Arc<dyn MetricStore>,
    source: Arc<dyn MetricSource>,
    interval_secs: u64,
    max_concurrent: usize,
}

impl CollectorScheduler {
    pub fn new(
        machines: Arc<dyn MachineStore>,
        metrics: Arc<dyn MetricStore>,
        source: Arc<dyn MetricSource>,
        interval_secs: u64,
        max_concurrent: usize,
    ) -> Self {
        Self {
            machines,
            metrics,
            source,
            interval_secs,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Sweeps on every tick until `cancel` fires. A sweep that is running
    /// when cancellation arrives stops dispatching and drains what is in
    /// flight before the loop exits.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval_secs,
            max_concurrent = self.max_concurrent,
            source = self.source.name(),
            "Collector scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.interval_secs));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            if let Err(e) = self.run_sweep_until(&cancel).await {
                tracing::error!(error = %e, "Collection sweep failed");
            }
        }

        tracing::info!("Collector scheduler stopped");
    }

    /// Runs one full sweep.
    pub async fn run_sweep(&self) -> Result<SweepReport, SweepError> {
        self.run_sweep_until(&CancellationToken::new()).await
    }

    /// Runs one sweep, dispatching no new fetches once `cancel` fires.
    /// Fetches already started always complete and are persisted.
    pub async fn run_sweep_until(&self, cancel: &CancellationToken) -> Result<SweepReport, SweepError> {
        let machines = self
            .machines
            .list_active_machines()
            .map_err(SweepError::MachineListing)?;

        let mut report = SweepReport {
            machines: machines.len(),
            ..Default::default()
        };
        if machines.is_empty() {
            tracing::debug!("No active machines to collect");
            return Ok(report);
        }

        let started = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(machines.len());

        for machine in machines {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = semaphore.clone().acquire_owned() => permit.ok(),
            };
            let Some(permit) = permit else {
                tracing::info!(
                    dispatched = handles.len(),
                    "Sweep cancelled, draining in-flight fetches"
                );
                break;
            };

            let source = self.source.clone();
            let metrics = self.metrics.clone();
            handles.push(tokio::spawn(async move {
                let fetched = source.fetch(&machine.endpoint).await;
                drop(permit);

                let outcome = match fetched {
                    Ok(reading) => match metrics.append(&machine.id, &reading) {
                        Ok(sample) => MachineOutcome::Stored(sample),
                        Err(e) => MachineOutcome::StoreFailed(e),
                    },
                    Err(e) => MachineOutcome::FetchFailed(e),
                };
                (machine, outcome)
            }));
        }
        report.dispatched = handles.len();

        let mut first_store_error = None;
        for handle in handles {
            match handle.await {
                Ok((machine, outcome)) => {
                    record_outcome(&mut report, &mut first_store_error, machine, outcome)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Collection task panicked");
                    report.panicked += 1;
                }
            }
        }

        tracing::info!(
            machines = report.machines,
            dispatched = report.dispatched,
            persisted = report.persisted,
            failed = report.failures.len(),
            store_failures = report.store_failures,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collection sweep finished"
        );

        match first_store_error {
            Some(first) => Err(SweepError::Store { first, report }),
            None => Ok(report),
        }
    }
}

fn record_outcome(
    report: &mut SweepReport,
    first_store_error: &mut Option<StorageError>,
    machine: Machine,
    outcome: MachineOutcome,
) {
    match outcome {
        MachineOutcome::Stored(sample) => {
            tracing::debug!(
                machine_id = %machine.id,
                machine = %machine.name,
                cpu = sample.cpu,
                mem = sample.mem_percent,
                disk = sample.disk_percent,
                "Sample stored"
            );
            report.persisted += 1;
        }
        MachineOutcome::FetchFailed(e) => {
            tracing::warn!(
                machine_id = %machine.id,
                machine = %machine.name,
                endpoint = %machine.endpoint,
                kind = e.kind(),
                error = %e,
                "Metric fetch failed"
            );
            report.failures.push(FetchFailure {
                machine_id: machine.id,
                machine: machine.name,
                endpoint: machine.endpoint,
                kind: e.kind(),
                error: e.to_string(),
            });
        }
        MachineOutcome::StoreFailed(e) => {
            tracing::error!(
                machine_id = %machine.id,
                machine = %machine.name,
                error = %e,
                "Failed to store sample"
            );
            report.store_failures += 1;
            first_store_error.get_or_insert(e);
        }
    }
}
