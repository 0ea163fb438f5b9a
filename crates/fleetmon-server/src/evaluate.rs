pub mod scheduler;

use fleetmon_alert::engine::EvaluationError;

#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("evaluation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
