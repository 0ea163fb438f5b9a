use crate::mock::machine_name;
use chrono::{DateTime, Duration, Utc};
use fleetmon_common::types::{IncidentListEntry, Machine, MetricReading};
use fleetmon_storage::{IncidentStore, MachineStore, MetricStore};

pub const DEFAULT_SEED_HOST: &str = "http://127.0.0.1:8001";
pub const DEFAULT_SEED_COUNT: u32 = 30;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedSummary {
    pub created: usize,
    pub existing: usize,
}

/// Creates `node-01..node-{count}` pointing at `{host}/m/{i}/metrics`.
/// Pairs that already exist are left untouched.
pub fn seed_machines(
    store: &dyn MachineStore,
    host: &str,
    count: u32,
) -> fleetmon_storage::Result<SeedSummary> {
    let host = host.trim_end_matches('/');
    let mut summary = SeedSummary::default();

    for i in 1..=count {
        let name = machine_name(i);
        let endpoint = format!("{host}/m/{i}/metrics");
        let (machine, created) = store.ensure_machine(&name, &endpoint)?;
        if created {
            tracing::info!(machine_id = %machine.id, name = %machine.name, endpoint = %machine.endpoint, "Machine created");
            summary.created += 1;
        } else {
            summary.existing += 1;
        }
    }

    Ok(summary)
}

/// Machines that received demo samples.
#[derive(Debug, Default, Clone)]
pub struct DemoSeed {
    pub seeded: Vec<Machine>,
    pub samples: usize,
}

fn reading(cpu: i64, mem_percent: f64, disk_percent: f64, label: String) -> MetricReading {
    MetricReading {
        cpu,
        mem_percent,
        disk_percent,
        uptime_label: label,
    }
}

/// Inserts samples that trip each rule once evaluated at `now`:
/// a cpu spike on node-01, two high-memory samples on node-02 and eight
/// high-disk samples on node-03, spaced 15 minutes apart.
///
/// Missing machines are skipped.
pub fn seed_demo(
    machines: &dyn MachineStore,
    metrics: &dyn MetricStore,
    now: DateTime<Utc>,
) -> fleetmon_storage::Result<DemoSeed> {
    let step = Duration::minutes(15);
    let mut demo = DemoSeed::default();

    let plans: [(&str, Vec<(DateTime<Utc>, MetricReading)>); 3] = [
        (
            "node-01",
            vec![(now, reading(96, 20.0, 20.0, "cpu_spike".to_string()))],
        ),
        (
            "node-02",
            vec![
                (now - step, reading(10, 95.0, 20.0, "mem1".to_string())),
                (now, reading(12, 96.0, 25.0, "mem2".to_string())),
            ],
        ),
        (
            "node-03",
            (0..8)
                .rev()
                .map(|i| (now - step * i, reading(8, 30.0, 98.0, format!("disk{i}"))))
                .collect(),
        ),
    ];

    for (name, samples) in plans {
        let Some(machine) = machines.find_machine_by_name(name)? else {
            tracing::warn!(name, "Demo machine not found, skipping");
            continue;
        };
        for (received_at, reading) in &samples {
            metrics.append_at(&machine.id, reading, *received_at)?;
        }
        demo.samples += samples.len();
        demo.seeded.push(machine);
    }

    Ok(demo)
}

/// Incidents started within the last `hours`, active first.
pub fn recent_incidents(
    incidents: &dyn IncidentStore,
    now: DateTime<Utc>,
    hours: i64,
) -> fleetmon_storage::Result<Vec<IncidentListEntry>> {
    incidents.list_recent(now - Duration::hours(hours))
}
