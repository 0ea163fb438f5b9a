pub mod cpu_high;
pub mod window;

use crate::IncidentRule;
use serde::{Deserialize, Serialize};

pub use cpu_high::CpuHighRule;
pub use window::{window_sample_count, WindowMetric, WindowRule};

/// Thresholds and windows for the three built-in rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSettings {
    /// CPU_HIGH fires when the latest `cpu` is strictly above this.
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: i64,
    #[serde(default = "default_mem_threshold")]
    pub mem_threshold: f64,
    #[serde(default = "default_mem_window_secs")]
    pub mem_window_secs: u64,
    #[serde(default = "default_disk_threshold")]
    pub disk_threshold: f64,
    #[serde(default = "default_disk_window_secs")]
    pub disk_window_secs: u64,
    /// Lower bound on the sample count of any window rule.
    #[serde(default = "default_min_window_samples")]
    pub min_window_samples: usize,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            cpu_threshold: default_cpu_threshold(),
            mem_threshold: default_mem_threshold(),
            mem_window_secs: default_mem_window_secs(),
            disk_threshold: default_disk_threshold(),
            disk_window_secs: default_disk_window_secs(),
            min_window_samples: default_min_window_samples(),
        }
    }
}

fn default_cpu_threshold() -> i64 {
    85
}

fn default_mem_threshold() -> f64 {
    90.0
}

fn default_mem_window_secs() -> u64 {
    30 * 60
}

fn default_disk_threshold() -> f64 {
    95.0
}

fn default_disk_window_secs() -> u64 {
    120 * 60
}

fn default_min_window_samples() -> usize {
    2
}

/// Builds CPU_HIGH, MEM_HIGH and DISK_HIGH. `sample_interval_secs` is the
/// collector cadence the window rules assume between consecutive samples.
pub fn build_rules(settings: &RuleSettings, sample_interval_secs: u64) -> Vec<Box<dyn IncidentRule>> {
    vec![
        Box::new(CpuHighRule {
            threshold: settings.cpu_threshold,
        }),
        Box::new(WindowRule::new(
            WindowMetric::Memory,
            settings.mem_threshold,
            settings.mem_window_secs,
            sample_interval_secs,
            settings.min_window_samples,
        )),
        Box::new(WindowRule::new(
            WindowMetric::Disk,
            settings.disk_threshold,
            settings.disk_window_secs,
            sample_interval_secs,
            settings.min_window_samples,
        )),
    ]
}
