use crate::{IncidentRule, Verdict};
use fleetmon_common::types::{IncidentType, MetricSample};
use serde_json::json;

/// Which sample column a window rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMetric {
    Memory,
    Disk,
}

impl WindowMetric {
    fn value(self, sample: &MetricSample) -> f64 {
        match self {
            Self::Memory => sample.mem_percent,
            Self::Disk => sample.disk_percent,
        }
    }

    fn kind(self) -> IncidentType {
        match self {
            Self::Memory => IncidentType::MemHigh,
            Self::Disk => IncidentType::DiskHigh,
        }
    }
}

/// Number of consecutive samples that stand in for a `window_secs` window
/// when samples arrive every `sample_interval_secs`.
///
/// # Examples
///
/// ```
/// use fleetmon_alert::rules::window_sample_count;
///
/// assert_eq!(window_sample_count(30 * 60, 15 * 60, 2), 2);
/// assert_eq!(window_sample_count(120 * 60, 15 * 60, 2), 8);
/// assert_eq!(window_sample_count(20 * 60, 15 * 60, 1), 2);
/// assert_eq!(window_sample_count(60, 15 * 60, 2), 2);
/// ```
pub fn window_sample_count(window_secs: u64, sample_interval_secs: u64, min_samples: usize) -> usize {
    let interval = sample_interval_secs.max(1);
    let count = window_secs.div_ceil(interval);
    usize::try_from(count).unwrap_or(usize::MAX).max(min_samples).max(1)
}

/// Fires when every one of the newest `required` samples is strictly above
/// `threshold`.
pub struct WindowRule {
    metric: WindowMetric,
    threshold: f64,
    window_secs: u64,
    required: usize,
}

impl WindowRule {
    pub fn new(
        metric: WindowMetric,
        threshold: f64,
        window_secs: u64,
        sample_interval_secs: u64,
        min_samples: usize,
    ) -> Self {
        Self {
            metric,
            threshold,
            window_secs,
            required: window_sample_count(window_secs, sample_interval_secs, min_samples),
        }
    }
}

impl IncidentRule for WindowRule {
    fn kind(&self) -> IncidentType {
        self.metric.kind()
    }

    fn required_samples(&self) -> usize {
        self.required
    }

    fn evaluate(&self, samples: &[MetricSample]) -> Verdict {
        if samples.len() < self.required {
            return Verdict::Unevaluable {
                available: samples.len(),
                required: self.required,
            };
        }

        let window = &samples[..self.required];
        if !window
            .iter()
            .all(|s| self.metric.value(s) > self.threshold)
        {
            return Verdict::Clear;
        }

        let values: Vec<f64> = window.iter().map(|s| self.metric.value(s)).collect();
        Verdict::Triggered {
            details: json!({
                "threshold": self.threshold,
                "window_secs": self.window_secs,
                "window_samples": self.required,
                "sample_count": window.len(),
                "values": values,
                "latest_received_at": window[0].received_at.to_rfc3339(),
            }),
        }
    }
}
