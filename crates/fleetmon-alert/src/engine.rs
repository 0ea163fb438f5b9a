use crate::{IncidentRule, Verdict};
use chrono::{DateTime, Utc};
use fleetmon_common::types::{Incident, IncidentType, Machine};
use fleetmon_storage::{IncidentStore, MachineStore, MetricStore, OpenOutcome, StorageError};
use serde::Serialize;
use std::sync::Arc;

/// What one evaluation did to one `(machine, type)` slot.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Opened(Incident),
    Touched(Incident),
    Resolved(Incident),
    Unchanged,
}

/// Counters for one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub machines: usize,
    pub opened: usize,
    pub touched: usize,
    pub resolved: usize,
    pub unchanged: usize,
    /// `(machine, type)` units that hit a store error.
    pub failed_units: usize,
}

impl PassReport {
    fn record(&mut self, transition: &Transition) {
        match transition {
            Transition::Opened(_) => self.opened += 1,
            Transition::Touched(_) => self.touched += 1,
            Transition::Resolved(_) => self.resolved += 1,
            Transition::Unchanged => self.unchanged += 1,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("failed to list active machines: {0}")]
    MachineListing(#[source] StorageError),

    /// The pass finished every other unit; `report` has the partial counts.
    #[error("{} rule evaluation(s) failed on the store; first error: {first}", .report.failed_units)]
    Store {
        #[source]
        first: StorageError,
        report: PassReport,
    },
}

/// Evaluates every rule for every active machine and applies the resulting
/// incident transitions.
///
/// Machines are processed one at a time, so a `(machine, type)` slot is
/// never evaluated twice concurrently by the same engine. The store's
/// atomic `open` / `resolve_active` covers the case of two engines.
pub struct IncidentEngine {
    machines: Arc<dyn MachineStore>,
    metrics: Arc<dyn MetricStore>,
    incidents: Arc<dyn IncidentStore>,
    rules: Vec<Box<dyn IncidentRule>>,
}

impl IncidentEngine {
    pub fn new(
        machines: Arc<dyn MachineStore>,
        metrics: Arc<dyn MetricStore>,
        incidents: Arc<dyn IncidentStore>,
        rules: Vec<Box<dyn IncidentRule>>,
    ) -> Self {
        Self {
            machines,
            metrics,
            incidents,
            rules,
        }
    }

    pub fn rules(&self) -> &[Box<dyn IncidentRule>] {
        &self.rules
    }

    /// Runs one evaluation pass stamped with `now`.
    ///
    /// Store errors on one unit do not stop the others; they are reported
    /// together once the pass is done.
    pub fn run_pass(&self, now: DateTime<Utc>) -> Result<PassReport, EvaluationError> {
        let machines = self
            .machines
            .list_active_machines()
            .map_err(EvaluationError::MachineListing)?;

        let mut report = PassReport {
            machines: machines.len(),
            ..Default::default()
        };
        let mut first_error = None;

        for machine in &machines {
            let results = match self.evaluate_machine(machine, now) {
                Ok(results) => results,
                Err(e) => {
                    tracing::error!(
                        machine_id = %machine.id,
                        machine = %machine.name,
                        error = %e,
                        "Failed to read samples for evaluation"
                    );
                    report.failed_units += self.rules.len();
                    first_error.get_or_insert(e);
                    continue;
                }
            };

            for result in results {
                match result {
                    Ok(transition) => report.record(&transition),
                    Err((kind, e)) => {
                        tracing::error!(
                            machine_id = %machine.id,
                            machine = %machine.name,
                            incident_type = %kind,
                            error = %e,
                            "Incident evaluation failed"
                        );
                        report.failed_units += 1;
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        tracing::info!(
            machines = report.machines,
            opened = report.opened,
            touched = report.touched,
            resolved = report.resolved,
            failed = report.failed_units,
            "Evaluation pass finished"
        );

        match first_error {
            Some(first) => Err(EvaluationError::Store { first, report }),
            None => Ok(report),
        }
    }

    /// Evaluates every rule for a single machine. The newest samples are read
    /// once and shared by all rules; a failed read fails the whole machine.
    pub fn evaluate_machine(
        &self,
        machine: &Machine,
        now: DateTime<Utc>,
    ) -> Result<Vec<Result<Transition, (IncidentType, StorageError)>>, StorageError> {
        let depth = self
            .rules
            .iter()
            .map(|r| r.required_samples())
            .max()
            .unwrap_or(0);
        let samples = self.metrics.most_recent(&machine.id, depth)?;

        let results = self
            .rules
            .iter()
            .map(|rule| {
                let verdict = rule.evaluate(&samples);
                if let Verdict::Unevaluable {
                    available,
                    required,
                } = verdict
                {
                    tracing::debug!(
                        machine_id = %machine.id,
                        incident_type = %rule.kind(),
                        available,
                        required,
                        "Not enough samples, treating as not triggered"
                    );
                }
                self.apply(machine, rule.kind(), verdict, now)
                    .map_err(|e| (rule.kind(), e))
            })
            .collect::<Vec<_>>();
        Ok(results)
    }

    /// Applies one verdict to the `(machine, kind)` slot.
    pub fn apply(
        &self,
        machine: &Machine,
        kind: IncidentType,
        verdict: Verdict,
        now: DateTime<Utc>,
    ) -> Result<Transition, StorageError> {
        match verdict {
            Verdict::Triggered { details } => {
                match self.incidents.open(&machine.id, kind, &details, now)? {
                    OpenOutcome::Opened(incident) => {
                        tracing::info!(
                            machine_id = %machine.id,
                            machine = %machine.name,
                            incident_type = %kind,
                            incident_id = %incident.id,
                            "Incident opened"
                        );
                        Ok(Transition::Opened(incident))
                    }
                    OpenOutcome::Touched(incident) => {
                        tracing::debug!(
                            machine_id = %machine.id,
                            incident_type = %kind,
                            incident_id = %incident.id,
                            "Incident still active"
                        );
                        Ok(Transition::Touched(incident))
                    }
                }
            }
            Verdict::Clear | Verdict::Unevaluable { .. } => {
                match self.incidents.resolve_active(&machine.id, kind, now)? {
                    Some(incident) => {
                        tracing::info!(
                            machine_id = %machine.id,
                            machine = %machine.name,
                            incident_type = %kind,
                            incident_id = %incident.id,
                            "Incident resolved"
                        );
                        Ok(Transition::Resolved(incident))
                    }
                    None => Ok(Transition::Unchanged),
                }
            }
        }
    }
}
