use super::PassError;
use chrono::Utc;
use fleetmon_alert::engine::{IncidentEngine, PassReport};
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Runs incident evaluation passes on a fixed interval.
///
/// The engine and the SQLite store are synchronous, so each pass runs on
/// the blocking pool.
pub struct EvaluationScheduler {
    engine: Arc<IncidentEngine>,
    interval_secs: u64,
}

impl EvaluationScheduler {
    pub fn new(engine: Arc<IncidentEngine>, interval_secs: u64) -> Self {
        Self {
            engine,
            interval_secs,
        }
    }

    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = self.interval_secs,
            rules = self.engine.rules().len(),
            "Evaluation scheduler started"
        );

        let mut tick = interval(Duration::from_secs(self.interval_secs));
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {}
            }
            if let Err(e) = self.run_pass().await {
                tracing::error!(error = %e, "Evaluation pass failed");
            }
        }

        tracing::info!("Evaluation scheduler stopped");
    }

    /// Runs one pass stamped with the current time.
    pub async fn run_pass(&self) -> Result<PassReport, PassError> {
        let engine = self.engine.clone();
        let report = tokio::task::spawn_blocking(move || engine.run_pass(Utc::now())).await??;
        Ok(report)
    }
}
