use crate::error::{Result, StorageError};
use crate::schema::{INCIDENTS_SCHEMA, MACHINES_SCHEMA, METRICS_SCHEMA};
use crate::{IncidentStore, MachineStore, MetricStore, OpenOutcome};
use chrono::{DateTime, Duration, Utc};
use fleetmon_common::types::{
    Incident, IncidentListEntry, IncidentType, Machine, MetricReading, MetricSample,
};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const DB_FILE: &str = "fleetmon.db";

const MACHINE_COLUMNS: &str = "id, name, endpoint, active, created_at";
const SAMPLE_COLUMNS: &str =
    "id, machine_id, cpu, mem_percent, disk_percent, uptime_label, received_at";
const INCIDENT_COLUMNS: &str =
    "id, machine_id, incident_type, is_active, started_at, last_seen_at, resolved_at, details";

/// SQLite-backed implementation of every store trait.
///
/// A single connection guarded by a mutex serialises writers; each incident
/// transition is one statement, so the lock is never held across a
/// read-then-write.
pub struct SqliteStorageEngine {
    conn: Mutex<Connection>,
}

impl SqliteStorageEngine {
    /// Opens (or creates) `fleetmon.db` inside `data_dir`.
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(DB_FILE);
        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let engine = Self::with_connection(conn)?;
        tracing::info!(path = %path.display(), "Opened fleetmon database");
        Ok(engine)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(MACHINES_SCHEMA)?;
        conn.execute_batch(METRICS_SCHEMA)?;
        conn.execute_batch(INCIDENTS_SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock_conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn read_machine(row: &rusqlite::Row<'_>) -> rusqlite::Result<Machine> {
    Ok(Machine {
        id: row.get(0)?,
        name: row.get(1)?,
        endpoint: row.get(2)?,
        active: row.get(3)?,
        created_at: from_millis(row.get(4)?),
    })
}

fn read_sample(row: &rusqlite::Row<'_>) -> rusqlite::Result<MetricSample> {
    Ok(MetricSample {
        id: row.get(0)?,
        machine_id: row.get(1)?,
        cpu: row.get(2)?,
        mem_percent: row.get(3)?,
        disk_percent: row.get(4)?,
        uptime_label: row.get(5)?,
        received_at: from_millis(row.get(6)?),
    })
}

/// Raw incident columns; the type and details are decoded outside the
/// rusqlite row closure so their errors keep their own variants.
struct IncidentRow {
    id: String,
    machine_id: String,
    incident_type: String,
    is_active: bool,
    started_at: i64,
    last_seen_at: i64,
    resolved_at: Option<i64>,
    details: String,
}

fn read_incident(row: &rusqlite::Row<'_>) -> rusqlite::Result<IncidentRow> {
    Ok(IncidentRow {
        id: row.get(0)?,
        machine_id: row.get(1)?,
        incident_type: row.get(2)?,
        is_active: row.get(3)?,
        started_at: row.get(4)?,
        last_seen_at: row.get(5)?,
        resolved_at: row.get(6)?,
        details: row.get(7)?,
    })
}

impl TryFrom<IncidentRow> for Incident {
    type Error = StorageError;

    fn try_from(row: IncidentRow) -> Result<Self> {
        let incident_type = row
            .incident_type
            .parse::<IncidentType>()
            .map_err(|_| StorageError::UnknownIncidentType(row.incident_type.clone()))?;
        Ok(Incident {
            id: row.id,
            machine_id: row.machine_id,
            incident_type,
            is_active: row.is_active,
            started_at: from_millis(row.started_at),
            last_seen_at: from_millis(row.last_seen_at),
            resolved_at: row.resolved_at.map(from_millis),
            details: serde_json::from_str(&row.details)?,
        })
    }
}

fn decode_optional(row: Option<IncidentRow>) -> Result<Option<Incident>> {
    row.map(Incident::try_from).transpose()
}

impl MachineStore for SqliteStorageEngine {
    fn list_active_machines(&self) -> Result<Vec<Machine>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {MACHINE_COLUMNS} FROM machines WHERE active = 1 ORDER BY name ASC, id ASC"
        ))?;
        let machines = stmt
            .query_map([], read_machine)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(machines)
    }

    fn find_machine_by_name(&self, name: &str) -> Result<Option<Machine>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {MACHINE_COLUMNS} FROM machines WHERE name = ?1 ORDER BY created_at ASC LIMIT 1"
        ))?;
        Ok(stmt.query_row([name], read_machine).optional()?)
    }

    fn ensure_machine(&self, name: &str, endpoint: &str) -> Result<(Machine, bool)> {
        let conn = self.lock_conn();
        let tx = conn.unchecked_transaction()?;
        let existing = tx
            .query_row(
                &format!("SELECT {MACHINE_COLUMNS} FROM machines WHERE name = ?1 AND endpoint = ?2"),
                rusqlite::params![name, endpoint],
                read_machine,
            )
            .optional()?;
        if let Some(machine) = existing {
            return Ok((machine, false));
        }

        let machine = Machine {
            id: fleetmon_common::id::next_id(),
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            active: true,
            created_at: Utc::now(),
        };
        tx.execute(
            "INSERT INTO machines (id, name, endpoint, active, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![
                &machine.id,
                &machine.name,
                &machine.endpoint,
                machine.active,
                machine.created_at.timestamp_millis(),
            ],
        )?;
        tx.commit()?;
        Ok((machine, true))
    }

    fn set_machine_active(&self, machine_id: &str, active: bool) -> Result<bool> {
        let conn = self.lock_conn();
        let changed = conn.execute(
            "UPDATE machines SET active = ?2 WHERE id = ?1",
            rusqlite::params![machine_id, active],
        )?;
        Ok(changed > 0)
    }
}

impl MetricStore for SqliteStorageEngine {
    fn append_at(
        &self,
        machine_id: &str,
        reading: &MetricReading,
        received_at: DateTime<Utc>,
    ) -> Result<MetricSample> {
        let sample = MetricSample {
            id: fleetmon_common::id::next_id(),
            machine_id: machine_id.to_string(),
            cpu: reading.cpu,
            mem_percent: reading.mem_percent,
            disk_percent: reading.disk_percent,
            uptime_label: reading.uptime_label.clone(),
            received_at: from_millis(received_at.timestamp_millis()),
        };
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(&format!(
            "INSERT INTO metric_samples ({SAMPLE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ))?;
        stmt.execute(rusqlite::params![
            &sample.id,
            &sample.machine_id,
            sample.cpu,
            sample.mem_percent,
            sample.disk_percent,
            &sample.uptime_label,
            sample.received_at.timestamp_millis(),
        ])?;
        Ok(sample)
    }

    fn most_recent(&self, machine_id: &str, n: usize) -> Result<Vec<MetricSample>> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM metric_samples
             WHERE machine_id = ?1
             ORDER BY received_at DESC, rowid DESC
             LIMIT ?2"
        ))?;
        let samples = stmt
            .query_map(rusqlite::params![machine_id, limit], read_sample)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(samples)
    }

    fn most_recent_within(&self, machine_id: &str, window: Duration) -> Result<Vec<MetricSample>> {
        let cutoff = (Utc::now() - window).timestamp_millis();
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SAMPLE_COLUMNS} FROM metric_samples
             WHERE machine_id = ?1 AND received_at >= ?2
             ORDER BY received_at DESC, rowid DESC"
        ))?;
        let samples = stmt
            .query_map(rusqlite::params![machine_id, cutoff], read_sample)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(samples)
    }
}

impl IncidentStore for SqliteStorageEngine {
    fn find_active(&self, machine_id: &str, kind: IncidentType) -> Result<Option<Incident>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents
             WHERE machine_id = ?1 AND incident_type = ?2 AND is_active = 1"
        ))?;
        let row = stmt
            .query_row(rusqlite::params![machine_id, kind.as_str()], read_incident)
            .optional()?;
        decode_optional(row)
    }

    fn open(
        &self,
        machine_id: &str,
        kind: IncidentType,
        details: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<OpenOutcome> {
        let new_id = fleetmon_common::id::next_id();
        let details_json = serde_json::to_string(details)?;
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(&format!(
            "INSERT INTO incidents ({INCIDENT_COLUMNS})
             VALUES (?1, ?2, ?3, 1, ?4, ?4, NULL, ?5)
             ON CONFLICT(machine_id, incident_type) WHERE is_active = 1
             DO UPDATE SET last_seen_at = MAX(incidents.last_seen_at, excluded.last_seen_at)
             RETURNING {INCIDENT_COLUMNS}"
        ))?;
        let row = stmt.query_row(
            rusqlite::params![
                &new_id,
                machine_id,
                kind.as_str(),
                now.timestamp_millis(),
                details_json,
            ],
            read_incident,
        )?;
        let incident = Incident::try_from(row)?;
        if incident.id == new_id {
            Ok(OpenOutcome::Opened(incident))
        } else {
            Ok(OpenOutcome::Touched(incident))
        }
    }

    fn touch(&self, incident: &Incident, now: DateTime<Utc>) -> Result<Option<Incident>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(&format!(
            "UPDATE incidents SET last_seen_at = MAX(last_seen_at, ?2)
             WHERE id = ?1 AND is_active = 1
             RETURNING {INCIDENT_COLUMNS}"
        ))?;
        let row = stmt
            .query_row(
                rusqlite::params![&incident.id, now.timestamp_millis()],
                read_incident,
            )
            .optional()?;
        decode_optional(row)
    }

    fn resolve(&self, incident: &Incident, now: DateTime<Utc>) -> Result<Option<Incident>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(&format!(
            "UPDATE incidents SET is_active = 0, resolved_at = MAX(last_seen_at, ?2)
             WHERE id = ?1 AND is_active = 1
             RETURNING {INCIDENT_COLUMNS}"
        ))?;
        let row = stmt
            .query_row(
                rusqlite::params![&incident.id, now.timestamp_millis()],
                read_incident,
            )
            .optional()?;
        decode_optional(row)
    }

    fn resolve_active(
        &self,
        machine_id: &str,
        kind: IncidentType,
        now: DateTime<Utc>,
    ) -> Result<Option<Incident>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(&format!(
            "UPDATE incidents SET is_active = 0, resolved_at = MAX(last_seen_at, ?3)
             WHERE machine_id = ?1 AND incident_type = ?2 AND is_active = 1
             RETURNING {INCIDENT_COLUMNS}"
        ))?;
        let row = stmt
            .query_row(
                rusqlite::params![machine_id, kind.as_str(), now.timestamp_millis()],
                read_incident,
            )
            .optional()?;
        decode_optional(row)
    }

    fn incidents_for_machine(&self, machine_id: &str) -> Result<Vec<Incident>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {INCIDENT_COLUMNS} FROM incidents
             WHERE machine_id = ?1
             ORDER BY started_at DESC, rowid DESC"
        ))?;
        let rows = stmt
            .query_map([machine_id], read_incident)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(Incident::try_from).collect()
    }

    fn list_recent(&self, since: DateTime<Utc>) -> Result<Vec<IncidentListEntry>> {
        let conn = self.lock_conn();
        let mut stmt = conn.prepare_cached(
            "SELECT i.id, m.name, i.incident_type, i.is_active, i.started_at, i.last_seen_at, i.resolved_at
             FROM incidents i
             JOIN machines m ON m.id = i.machine_id
             WHERE i.started_at >= ?1
             ORDER BY i.is_active DESC, i.last_seen_at DESC",
        )?;
        let rows = stmt
            .query_map([since.timestamp_millis()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, Option<i64>>(6)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(id, machine, incident_type, is_active, started_at, last_seen_at, resolved_at)| {
                    let incident_type = incident_type
                        .parse::<IncidentType>()
                        .map_err(|_| StorageError::UnknownIncidentType(incident_type.clone()))?;
                    Ok::<_, StorageError>(IncidentListEntry {
                        id,
                        machine,
                        incident_type,
                        is_active,
                        started_at: from_millis(started_at),
                        last_seen_at: from_millis(last_seen_at),
                        resolved_at: resolved_at.map(from_millis),
                    })
                },
            )
            .collect()
    }
}
