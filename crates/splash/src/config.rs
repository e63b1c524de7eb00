//! Splash configuration

use snooze_lib::config::{required, EnvSettings, ENV_LABEL_SELECTOR, ENV_NAMESPACE};
use snooze_lib::{Action, ActionTargets, SnoozeError, Trigger};

pub const ENV_PORT: &str = "KUBESNOOZE_PORT";

#[derive(Debug, Clone)]
pub struct SplashConfig {
    /// Always a wake trigger; only wake overrides are read
    pub trigger: Trigger,
    pub port: u16,
    pub title: String,
    pub message: String,
}

fn default_port() -> u16 {
    8080
}

fn default_title() -> String {
    "KubeSnooze".to_string()
}

fn default_message() -> String {
    "Waking up this environment...".to_string()
}

impl SplashConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self, SnoozeError> {
        Self::from_settings(&EnvSettings::load()?)
    }

    pub fn from_settings(settings: &EnvSettings) -> Result<Self, SnoozeError> {
        let namespace = required(&settings.namespace, ENV_NAMESPACE)?;
        let selector = required(&settings.label_selector, ENV_LABEL_SELECTOR)?;
        let targets = ActionTargets {
            sleep: Default::default(),
            wake: settings.wake_targets()?,
        };

        let port = match non_empty(&settings.port) {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                SnoozeError::configuration(format!(
                    "{} must be a port number, got {:?}",
                    ENV_PORT, raw
                ))
            })?,
            None => default_port(),
        };

        Ok(Self {
            trigger: Trigger::new(Action::Wake, namespace, &selector, targets)?,
            port,
            title: non_empty(&settings.title).map_or_else(default_title, str::to_string),
            message: non_empty(&settings.message).map_or_else(default_message, str::to_string),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EnvSettings::from_vars([
            ("KUBESNOOZE_NAMESPACE", "dev"),
            ("KUBESNOOZE_LABEL_SELECTOR", "env=dev"),
        ])
        .unwrap();

        let config = SplashConfig::from_settings(&settings).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.title, "KubeSnooze");
        assert_eq!(config.message, "Waking up this environment...");
        assert_eq!(config.trigger.action(), Action::Wake);
    }

    #[test]
    fn test_overrides() {
        let settings = EnvSettings::from_vars([
            ("KUBESNOOZE_NAMESPACE", "dev"),
            ("KUBESNOOZE_LABEL_SELECTOR", "env=dev"),
            ("KUBESNOOZE_WAKE_REPLICAS", "2"),
            ("KUBESNOOZE_SLEEP_REPLICAS", "5"),
            ("KUBESNOOZE_PORT", "9000"),
            ("KUBESNOOZE_TITLE", "Staging"),
        ])
        .unwrap();

        let config = SplashConfig::from_settings(&settings).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.title, "Staging");
        assert_eq!(config.trigger.targets().wake.replicas, Some(2));
        // the splash never sleeps anything
        assert_eq!(config.trigger.targets().sleep.replicas, None);
    }

    #[test]
    fn test_bad_port() {
        let settings = EnvSettings::from_vars([
            ("KUBESNOOZE_NAMESPACE", "dev"),
            ("KUBESNOOZE_LABEL_SELECTOR", "env=dev"),
            ("KUBESNOOZE_PORT", "http"),
        ])
        .unwrap();
        assert!(SplashConfig::from_settings(&settings).is_err());
    }
}
