use crate::{IncidentRule, Verdict};
use fleetmon_common::types::{IncidentType, MetricSample};
use serde_json::json;

/// Instantaneous rule: the newest sample alone decides.
pub struct CpuHighRule {
    pub threshold: i64,
}

impl IncidentRule for CpuHighRule {
    fn kind(&self) -> IncidentType {
        IncidentType::CpuHigh
    }

    fn required_samples(&self) -> usize {
        1
    }

    fn evaluate(&self, samples: &[MetricSample]) -> Verdict {
        let Some(latest) = samples.first() else {
            return Verdict::Unevaluable {
                available: 0,
                required: 1,
            };
        };

        if latest.cpu > self.threshold {
            Verdict::Triggered {
                details: json!({
                    "cpu": latest.cpu,
                    "threshold": self.threshold,
                    "sample_id": latest.id,
                    "received_at": latest.received_at.to_rfc3339(),
                }),
            }
        } else {
            Verdict::Clear
        }
    }
}
