pub(crate) const MACHINES_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS machines (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    endpoint TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    UNIQUE (name, endpoint)
);
CREATE INDEX IF NOT EXISTS idx_machines_active ON machines(active);
";

pub(crate) const METRICS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS metric_samples (
    id TEXT PRIMARY KEY,
    machine_id TEXT NOT NULL REFERENCES machines(id),
    cpu INTEGER NOT NULL,
    mem_percent REAL NOT NULL,
    disk_percent REAL NOT NULL,
    uptime_label TEXT NOT NULL,
    received_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_samples_machine_time
    ON metric_samples(machine_id, received_at);
";

// The partial unique index is what keeps (machine, type) down to a single
// active row; `open` upserts against it.
pub(crate) const INCIDENTS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS incidents (
    id TEXT PRIMARY KEY,
    machine_id TEXT NOT NULL REFERENCES machines(id),
    incident_type TEXT NOT NULL,
    is_active INTEGER NOT NULL,
    started_at INTEGER NOT NULL,
    last_seen_at INTEGER NOT NULL,
    resolved_at INTEGER,
    details TEXT NOT NULL DEFAULT '{}'
);
CREATE UNIQUE INDEX IF NOT EXISTS uq_incidents_one_active
    ON incidents(machine_id, incident_type) WHERE is_active = 1;
CREATE INDEX IF NOT EXISTS idx_incidents_started ON incidents(started_at);
";
