//! YAML configuration loading for the hub
//!
//! # Example
//!
//! ```ignore
//! use ha_config::HubConfig;
//!
//! let config = HubConfig::load("/config/configuration.yaml")?;
//! println!("{} workers", config.core.worker_count);
//! ```

mod core_config;
mod error;
mod loader;

pub use core_config::{CoreConfig, HubConfig, TemperatureUnit};
pub use error::{ConfigError, ConfigResult};
pub use loader::YamlLoader;

pub use serde_yaml::Value;
