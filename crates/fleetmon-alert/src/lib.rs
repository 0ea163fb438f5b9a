//! Incident rule engine.
//!
//! Each [`IncidentRule`] looks at a machine's most recent samples and returns
//! a [`Verdict`]. The [`engine::IncidentEngine`] turns verdicts into incident
//! transitions (open, touch, resolve) against an
//! [`IncidentStore`](fleetmon_storage::IncidentStore). Built-in rules cover
//! instantaneous CPU load and windowed memory and disk usage.

pub mod engine;
pub mod rules;


use fleetmon_common::types::{IncidentType, MetricSample};

/// Result of evaluating one rule for one machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// The condition holds. `details` is stored if this opens an incident.
    Triggered { details: serde_json::Value },
    /// Enough data, condition does not hold.
    Clear,
    /// Not enough samples to decide. Treated as not triggered.
    Unevaluable { available: usize, required: usize },
}

impl Verdict {
    pub fn is_triggered(&self) -> bool {
        matches!(self, Self::Triggered { .. })
    }
}

/// A rule evaluated against a machine's most recent samples.
///
/// The engine fetches `required_samples()` samples (newest first) and hands
/// them to `evaluate`; the slice may be shorter when the machine has less
/// history.
pub trait IncidentRule: Send + Sync {
    /// The incident slot this rule drives.
    fn kind(&self) -> IncidentType;

    /// How many of the newest samples the rule needs to decide.
    fn required_samples(&self) -> usize;

    /// Evaluates the newest-first `samples`.
    fn evaluate(&self, samples: &[MetricSample]) -> Verdict;
}
