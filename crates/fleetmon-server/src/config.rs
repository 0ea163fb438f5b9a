use anyhow::{bail, Context};
use fleetmon_alert::rules::RuleSettings;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FleetmonConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
    #[serde(default)]
    pub rules: RuleSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between sweeps.
    #[serde(default = "default_collector_interval_secs")]
    pub interval_secs: u64,
    /// Maximum fetches in flight during one sweep.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_collector_interval_secs(),
            max_concurrent: default_max_concurrent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Seconds between evaluation passes.
    #[serde(default = "default_evaluator_interval_secs")]
    pub interval_secs: u64,
    /// Spacing the window rules assume between samples. Falls back to
    /// `collector.interval_secs` when unset.
    #[serde(default)]
    pub sample_interval_secs: Option<u64>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_secs: default_evaluator_interval_secs(),
            sample_interval_secs: None,
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_enabled() -> bool {
    true
}

fn default_collector_interval_secs() -> u64 {
    15 * 60
}

fn default_max_concurrent() -> usize {
    30
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_evaluator_interval_secs() -> u64 {
    5 * 60
}

impl FleetmonConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{path}'"))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file '{path}'"))
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.collector.interval_secs == 0 {
            bail!("collector.interval_secs must be greater than 0");
        }
        if self.collector.max_concurrent == 0 {
            bail!("collector.max_concurrent must be greater than 0");
        }
        if self.collector.request_timeout_secs == 0 {
            bail!("collector.request_timeout_secs must be greater than 0");
        }
        if self.evaluator.interval_secs == 0 {
            bail!("evaluator.interval_secs must be greater than 0");
        }
        if self.evaluator.sample_interval_secs == Some(0) {
            bail!("evaluator.sample_interval_secs must be greater than 0");
        }
        if self.rules.min_window_samples == 0 {
            bail!("rules.min_window_samples must be greater than 0");
        }
        Ok(())
    }

    /// Sample spacing handed to the window rules.
    pub fn sample_interval_secs(&self) -> u64 {
        self.evaluator
            .sample_interval_secs
            .unwrap_or(self.collector.interval_secs)
    }
}
