use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A monitored host. Provisioned outside the pipeline; the collector only
/// reads `active` machines and their `endpoint`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    pub name: String,
    /// Metrics URL, e.g. `http://host:8001/m/1/metrics`
    pub endpoint: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// One parsed response from a machine's metrics endpoint, before it is
/// persisted and stamped with `received_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricReading {
    pub cpu: i64,
    pub mem_percent: f64,
    pub disk_percent: f64,
    /// Free-form uptime text, stored verbatim.
    pub uptime_label: String,
}

/// A persisted reading. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub id: String,
    pub machine_id: String,
    pub cpu: i64,
    pub mem_percent: f64,
    pub disk_percent: f64,
    pub uptime_label: String,
    pub received_at: DateTime<Utc>,
}

/// Incident category, one per rule.
///
/// # Examples
///
/// ```
/// use fleetmon_common::types::IncidentType;
///
/// let kind: IncidentType = "MEM_HIGH".parse().unwrap();
/// assert_eq!(kind, IncidentType::MemHigh);
/// assert_eq!(kind.to_string(), "MEM_HIGH");
/// assert_eq!(IncidentType::ALL.len(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentType {
    CpuHigh,
    MemHigh,
    DiskHigh,
}

impl IncidentType {
    pub const ALL: [IncidentType; 3] = [Self::CpuHigh, Self::MemHigh, Self::DiskHigh];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CpuHigh => "CPU_HIGH",
            Self::MemHigh => "MEM_HIGH",
            Self::DiskHigh => "DISK_HIGH",
        }
    }
}

impl std::fmt::Display for IncidentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IncidentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CPU_HIGH" => Ok(Self::CpuHigh),
            "MEM_HIGH" => Ok(Self::MemHigh),
            "DISK_HIGH" => Ok(Self::DiskHigh),
            _ => Err(format!("unknown incident type: {s}")),
        }
    }
}

/// An incident record. At most one row per (machine, type) has
/// `is_active == true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    pub machine_id: String,
    pub incident_type: IncidentType,
    pub is_active: bool,
    /// Set once when the incident opens.
    pub started_at: DateTime<Utc>,
    /// Refreshed on every evaluation that still sees the condition.
    pub last_seen_at: DateTime<Utc>,
    /// Set once when the incident closes.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Rule snapshot captured at open time.
    pub details: serde_json::Value,
}

/// Read-only view used by the incident listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentListEntry {
    pub id: String,
    pub machine: String,
    #[serde(rename = "type")]
    pub incident_type: IncidentType,
    pub is_active: bool,
    pub started_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incident_type_serializes_screaming_snake() {
        let json = serde_json::to_string(&IncidentType::DiskHigh).unwrap();
        assert_eq!(json, "\"DISK_HIGH\"");
        let back: IncidentType = serde_json::from_str("\"CPU_HIGH\"").unwrap();
        assert_eq!(back, IncidentType::CpuHigh);
    }

    #[test]
    fn incident_type_parse_rejects_unknown() {
        assert!("NET_HIGH".parse::<IncidentType>().is_err());
        assert_eq!("disk_high".parse::<IncidentType>(), Ok(IncidentType::DiskHigh));
    }

    #[test]
    fn list_entry_uses_type_key() {
        let now = Utc::now();
        let entry = IncidentListEntry {
            id: "1".into(),
            machine: "node-01".into(),
            incident_type: IncidentType::CpuHigh,
            is_active: true,
            started_at: now,
            last_seen_at: now,
            resolved_at: None,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "CPU_HIGH");
        assert!(value["resolved_at"].is_null());
    }
}
