pub mod scheduler;

use fleetmon_storage::StorageError;
use serde::Serialize;

/// One machine whose fetch produced no sample during a sweep.
#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    pub machine_id: String,
    pub machine: String,
    pub endpoint: String,
    pub kind: &'static str,
    pub error: String,
}

/// Outcome of a single collection sweep.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// Active machines listed at the start of the sweep.
    pub machines: usize,
    /// Fetches actually started. Lower than `machines` only when the sweep
    /// was cancelled part way.
    pub dispatched: usize,
    pub persisted: usize,
    pub failures: Vec<FetchFailure>,
    pub store_failures: usize,
    pub panicked: usize,
}

impl SweepReport {
    pub fn skipped(&self) -> usize {
        self.machines - self.dispatched
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("failed to list active machines: {0}")]
    MachineListing(#[source] StorageError),

    /// Every other machine was still collected; `report` has the counts.
    #[error("{} sample(s) could not be stored; first error: {first}", .report.store_failures)]
    Store {
        #[source]
        first: StorageError,
        report: SweepReport,
    },
}
