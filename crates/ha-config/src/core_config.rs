//! Hub configuration
//!
//! `homeassistant:` holds the core settings; `automation:` is kept as raw
//! YAML for the automation engine to parse.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::YamlLoader;

/// Temperature unit shown to users
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[default]
    #[serde(rename = "C", alias = "c")]
    Celsius,
    #[serde(rename = "F", alias = "f")]
    Fahrenheit,
}

/// Core settings from the `homeassistant:` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Name of the location (e.g., "Home")
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Elevation in meters
    pub elevation: i32,
    /// Informational; local-time matching uses the process time zone
    pub time_zone: String,
    pub temperature_unit: TemperatureUnit,

    /// Job pool worker threads
    pub worker_count: usize,
    /// Seconds between `time_changed` events
    pub timer_interval: u64,
    /// Seconds a blocking service call waits
    pub service_call_timeout: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            name: "Home".to_string(),
            latitude: 0.0,
            longitude: 0.0,
            elevation: 0,
            time_zone: "UTC".to_string(),
            temperature_unit: TemperatureUnit::Celsius,
            worker_count: 2,
            timer_interval: 1,
            service_call_timeout: 10,
        }
    }
}

impl CoreConfig {
    pub fn timer_interval(&self) -> Duration {
        Duration::from_secs(self.timer_interval)
    }

    pub fn service_call_timeout(&self) -> Duration {
        Duration::from_secs(self.service_call_timeout)
    }

    /// Reject values the hub cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.worker_count == 0 {
            return Err(invalid("worker_count", "must be at least 1"));
        }
        if self.timer_interval == 0 || 60 % self.timer_interval != 0 {
            return Err(invalid("timer_interval", "must be a divisor of 60"));
        }
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(invalid("latitude", "must be between -90 and 90"));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(invalid("longitude", "must be between -180 and 180"));
        }
        Ok(())
    }
}

/// The whole hub configuration file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubConfig {
    pub core: CoreConfig,
    /// Raw automation rules, one entry per rule
    pub automations: Vec<Value>,
}

impl HubConfig {
    /// Load and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let yaml = YamlLoader::new().load_file(path)?;
        let config = Self::from_yaml(&yaml)?;
        info!(
            path = %path.display(),
            name = %config.core.name,
            automations = config.automations.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let yaml = YamlLoader::new().load_str(content, Path::new("<inline>"))?;
        Self::from_yaml(&yaml)
    }

    pub fn from_yaml(yaml: &Value) -> ConfigResult<Self> {
        let mapping = match yaml {
            Value::Null => return Ok(Self::default()),
            Value::Mapping(mapping) => mapping,
            _ => return Err(invalid("root", "configuration must be a mapping")),
        };

        let core = match mapping.get("homeassistant") {
            None | Some(Value::Null) => CoreConfig::default(),
            Some(section) => serde_yaml::from_value(section.clone())
                .map_err(|e| invalid("homeassistant", e))?,
        };
        core.validate()?;

        let automations = match mapping.get("automation") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Sequence(rules)) => rules.clone(),
            Some(rule @ Value::Mapping(_)) => vec![rule.clone()],
            Some(_) => return Err(invalid("automation", "expected a rule or a list of rules")),
        };

        Ok(Self { core, automations })
    }
}

fn invalid(key: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
