//! Persistence for machines, metric samples and incidents.
//!
//! The pipeline talks to three narrow traits so the collector and the rule
//! engine never share anything but these stores. [`engine::SqliteStorageEngine`]
//! implements all three on a single SQLite database in WAL mode.

pub mod engine;
pub mod error;
mod schema;


use chrono::{DateTime, Duration, Utc};
use fleetmon_common::types::{
    Incident, IncidentListEntry, IncidentType, Machine, MetricReading, MetricSample,
};

pub use error::{Result, StorageError};

/// Read access to the machine inventory, plus the get-or-create used by the
/// seeding commands.
pub trait MachineStore: Send + Sync {
    /// Returns every machine with `active = true`, ordered by name.
    fn list_active_machines(&self) -> Result<Vec<Machine>>;

    /// Looks up a machine by display name.
    fn find_machine_by_name(&self, name: &str) -> Result<Option<Machine>>;

    /// Returns the machine with this exact `(name, endpoint)` pair, creating
    /// an active one if it does not exist. The flag is `true` when a row was
    /// created.
    fn ensure_machine(&self, name: &str, endpoint: &str) -> Result<(Machine, bool)>;

    /// Flips the active flag. Returns false if the machine does not exist.
    fn set_machine_active(&self, machine_id: &str, active: bool) -> Result<bool>;
}

/// Append-only per-machine sample log. All reads are ordered by
/// `received_at` descending, newest insert first on ties.
pub trait MetricStore: Send + Sync {
    /// Persists a reading stamped with the current time.
    fn append(&self, machine_id: &str, reading: &MetricReading) -> Result<MetricSample> {
        self.append_at(machine_id, reading, Utc::now())
    }

    /// Persists a reading with an explicit `received_at` (seeding, tests).
    fn append_at(
        &self,
        machine_id: &str,
        reading: &MetricReading,
        received_at: DateTime<Utc>,
    ) -> Result<MetricSample>;

    /// Returns up to `n` most recent samples, newest first.
    fn most_recent(&self, machine_id: &str, n: usize) -> Result<Vec<MetricSample>>;

    /// Returns the newest sample, if any.
    fn latest(&self, machine_id: &str) -> Result<Option<MetricSample>> {
        Ok(self.most_recent(machine_id, 1)?.into_iter().next())
    }

    /// Returns all samples received within `window` of now, newest first.
    fn most_recent_within(&self, machine_id: &str, window: Duration) -> Result<Vec<MetricSample>>;
}

/// Outcome of [`IncidentStore::open`].
#[derive(Debug, Clone, PartialEq)]
pub enum OpenOutcome {
    /// No active incident existed; a new one was inserted.
    Opened(Incident),
    /// An active incident already existed and only its `last_seen_at` moved.
    Touched(Incident),
}

impl OpenOutcome {
    pub fn incident(&self) -> &Incident {
        match self {
            Self::Opened(incident) | Self::Touched(incident) => incident,
        }
    }
}

/// Incident lifecycle storage.
///
/// Implementations must make `open` and `resolve_active` atomic per
/// `(machine_id, incident_type)` so that concurrent callers can never create
/// a second active row or resolve one twice.
pub trait IncidentStore: Send + Sync {
    /// Returns the active incident for `(machine_id, kind)`, if any.
    fn find_active(&self, machine_id: &str, kind: IncidentType) -> Result<Option<Incident>>;

    /// Opens an incident, or touches the active one if it already exists.
    /// `details` is only stored when a new row is created.
    fn open(
        &self,
        machine_id: &str,
        kind: IncidentType,
        details: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<OpenOutcome>;

    /// Advances `last_seen_at` to `now` (never backwards). Returns `None` if
    /// the incident is no longer active.
    fn touch(&self, incident: &Incident, now: DateTime<Utc>) -> Result<Option<Incident>>;

    /// Closes the incident. Returns `None` if it was already resolved.
    fn resolve(&self, incident: &Incident, now: DateTime<Utc>) -> Result<Option<Incident>>;

    /// Closes the active incident for `(machine_id, kind)` in one statement.
    /// Returns `None` when nothing was active.
    fn resolve_active(
        &self,
        machine_id: &str,
        kind: IncidentType,
        now: DateTime<Utc>,
    ) -> Result<Option<Incident>>;

    /// Incidents for one machine, newest first.
    fn incidents_for_machine(&self, machine_id: &str) -> Result<Vec<Incident>>;

    /// Incidents started at or after `since`: active first, then by
    /// `last_seen_at` descending.
    fn list_recent(&self, since: DateTime<Utc>) -> Result<Vec<IncidentListEntry>>;
}
