//! Controller configuration

use snooze_lib::config::EnvSettings;
use snooze_lib::SnoozeError;

pub const DEFAULT_RUNNER_IMAGE: &str = "ghcr.io/kubesnooze/kubesnooze-runner:latest";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Image for runner CronJobs when a KubeSnooze does not set one
    pub runner_image: String,
    /// Restrict the controller to one namespace; all namespaces when unset
    pub watch_namespace: Option<String>,
}

impl ControllerConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self, SnoozeError> {
        Ok(Self::from_settings(&EnvSettings::load()?))
    }

    pub fn from_settings(settings: &EnvSettings) -> Self {
        Self {
            runner_image: non_empty(&settings.runner_image)
                .unwrap_or(DEFAULT_RUNNER_IMAGE)
                .to_string(),
            watch_namespace: non_empty(&settings.watch_namespace).map(str::to_string),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
