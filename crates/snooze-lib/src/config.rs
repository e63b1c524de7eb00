//! Environment configuration
//!
//! Every component reads `KUBESNOOZE_*` variables through the `config`
//! crate into [`EnvSettings`], then validates the fields it needs. An
//! empty variable counts as unset, which is how the controller renders
//! optional overrides into runner CronJobs.

use crate::error::SnoozeError;
use crate::models::{Action, ActionTargets, SleepWakeTargets};
use crate::pipeline::Trigger;
use serde::Deserialize;

pub const ENV_PREFIX: &str = "KUBESNOOZE";

pub const ENV_ACTION: &str = "KUBESNOOZE_ACTION";
pub const ENV_NAMESPACE: &str = "KUBESNOOZE_NAMESPACE";
pub const ENV_LABEL_SELECTOR: &str = "KUBESNOOZE_LABEL_SELECTOR";
pub const ENV_SLEEP_REPLICAS: &str = "KUBESNOOZE_SLEEP_REPLICAS";
pub const ENV_WAKE_REPLICAS: &str = "KUBESNOOZE_WAKE_REPLICAS";
pub const ENV_SLEEP_HPA_MIN_REPLICAS: &str = "KUBESNOOZE_SLEEP_HPA_MIN_REPLICAS";
pub const ENV_WAKE_HPA_MIN_REPLICAS: &str = "KUBESNOOZE_WAKE_HPA_MIN_REPLICAS";
pub const ENV_SLEEP_SUSPEND_CRONJOBS: &str = "KUBESNOOZE_SLEEP_SUSPEND_CRONJOBS";
pub const ENV_WAKE_SUSPEND_CRONJOBS: &str = "KUBESNOOZE_WAKE_SUSPEND_CRONJOBS";

/// Raw `KUBESNOOZE_*` variables, keyed without the prefix
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EnvSettings {
    pub action: Option<String>,
    pub namespace: Option<String>,
    pub label_selector: Option<String>,
    pub sleep_replicas: Option<String>,
    pub wake_replicas: Option<String>,
    pub sleep_hpa_min_replicas: Option<String>,
    pub wake_hpa_min_replicas: Option<String>,
    pub sleep_suspend_cronjobs: Option<String>,
    pub wake_suspend_cronjobs: Option<String>,
    pub port: Option<String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub runner_image: Option<String>,
    pub watch_namespace: Option<String>,
}

impl EnvSettings {
    /// Load from the process environment
    pub fn load() -> Result<Self, SnoozeError> {
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX))
    }

    /// Load from an explicit variable map, e.g. `[("KUBESNOOZE_ACTION", "sleep")]`
    pub fn from_vars<'a>(
        vars: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Result<Self, SnoozeError> {
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<config::Map<String, String>>();
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX).source(Some(vars)))
    }

    fn from_source(source: config::Environment) -> Result<Self, SnoozeError> {
        config::Config::builder()
            .add_source(source)
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| SnoozeError::configuration(e.to_string()))
    }

    pub fn sleep_targets(&self) -> Result<SleepWakeTargets, SnoozeError> {
        Ok(SleepWakeTargets {
            replicas: optional_count(&self.sleep_replicas, ENV_SLEEP_REPLICAS)?,
            autoscaler_min_replicas: optional_count(
                &self.sleep_hpa_min_replicas,
                ENV_SLEEP_HPA_MIN_REPLICAS,
            )?,
            suspend_periodic_jobs: optional_flag(
                &self.sleep_suspend_cronjobs,
                ENV_SLEEP_SUSPEND_CRONJOBS,
            )?,
        })
    }

    pub fn wake_targets(&self) -> Result<SleepWakeTargets, SnoozeError> {
        Ok(SleepWakeTargets {
            replicas: optional_count(&self.wake_replicas, ENV_WAKE_REPLICAS)?,
            autoscaler_min_replicas: optional_count(
                &self.wake_hpa_min_replicas,
                ENV_WAKE_HPA_MIN_REPLICAS,
            )?,
            suspend_periodic_jobs: optional_flag(
                &self.wake_suspend_cronjobs,
                ENV_WAKE_SUSPEND_CRONJOBS,
            )?,
        })
    }
}

/// Configuration of a single scheduled run
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub trigger: Trigger,
}

impl RunnerConfig {
    pub fn load() -> Result<Self, SnoozeError> {
        Self::from_settings(&EnvSettings::load()?)
    }

    pub fn from_settings(settings: &EnvSettings) -> Result<Self, SnoozeError> {
        let action = required(&settings.action, ENV_ACTION)?
            .parse::<Action>()
            .map_err(SnoozeError::Configuration)?;
        let namespace = required(&settings.namespace, ENV_NAMESPACE)?;
        let selector = required(&settings.label_selector, ENV_LABEL_SELECTOR)?;

        let targets = ActionTargets {
            sleep: settings.sleep_targets()?,
            wake: settings.wake_targets()?,
        };

        Ok(Self {
            trigger: Trigger::new(action, namespace, &selector, targets)?,
        })
    }
}

/// A non-empty, trimmed variable
pub fn required(value: &Option<String>, name: &str) -> Result<String, SnoozeError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(SnoozeError::configuration(format!("{} is required", name))),
    }
}

/// An optional non-negative integer
pub fn optional_count(value: &Option<String>, name: &str) -> Result<Option<i32>, SnoozeError> {
    let Some(raw) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match raw.parse::<i32>() {
        Ok(n) if n >= 0 => Ok(Some(n)),
        _ => Err(SnoozeError::configuration(format!(
            "{} must be a non-negative integer, got {:?}",
            name, raw
        ))),
    }
}

/// An optional boolean (`true`/`false`, `1`/`0`, `t`/`f`, any case)
pub fn optional_flag(value: &Option<String>, name: &str) -> Result<Option<bool>, SnoozeError> {
    let Some(raw) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" => Ok(Some(true)),
        "false" | "f" | "0" => Ok(Some(false)),
        _ => Err(SnoozeError::configuration(format!(
            "{} must be a boolean, got {:?}",
            name, raw
        ))),
    }
}
