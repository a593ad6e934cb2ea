//! YAML configuration loading for Home Assistant
//!
//! Loads `configuration.yaml` from the config directory, resolving the
//! custom tags used by Home Assistant configs:
//!
//! - `!include path` - Include another YAML file
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Environment variable substitution
//!
//! The result is split into the [`CoreConfig`] (the `homeassistant:`,
//! `http:` and `frontend:` sections) and a [`ConfigType`] holding every
//! top-level domain section as JSON, which is what integrations receive
//! at setup.
//!
//! # Example
//!
//! ```ignore
//! let (core, config) = ha_config::load_configuration("/config")?;
//! let section = config.get("advanced_ui_cards");
//! ```

mod core_config;
mod error;
mod loader;

pub use core_config::{load_configuration, to_config_type, CoreConfig, HttpConfig};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_yaml, YamlLoader};

/// Top-level configuration as handed to integrations, keyed by domain
pub type ConfigType = serde_json::Map<String, serde_json::Value>;

/// Main configuration file name inside the config directory
pub const YAML_CONFIG_FILE: &str = "configuration.yaml";
