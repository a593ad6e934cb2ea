//! Core Home Assistant configuration
//!
//! Parses the `homeassistant:`, `http:` and `frontend:` sections from
//! configuration.yaml and remembers the config directory.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;
use crate::{ConfigType, YAML_CONFIG_FILE};

/// `http:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: default_server_port(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct HomeAssistantSection {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FrontendSection {
    #[serde(default)]
    frontend_path: Option<PathBuf>,
    #[serde(default)]
    theme_color: Option<String>,
}

/// Core configuration shared by the host services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Directory holding configuration.yaml, `.storage/` and `custom_components/`
    pub config_dir: PathBuf,

    /// Name of the location (e.g., "Home")
    pub name: String,

    /// HTTP server settings
    pub http: HttpConfig,

    /// Directory with the built frontend (index.html and assets)
    pub frontend_path: PathBuf,

    /// Theme color injected into the frontend page
    pub theme_color: String,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8123
}

fn default_name() -> String {
    "Home".to_string()
}

fn default_frontend_path() -> PathBuf {
    PathBuf::from("/usr/share/hass_frontend")
}

fn default_theme_color() -> String {
    "#18BCF2".to_string()
}

impl CoreConfig {
    /// Defaults for a given config directory
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            name: default_name(),
            http: HttpConfig::default(),
            frontend_path: default_frontend_path(),
            theme_color: default_theme_color(),
        }
    }

    /// Resolve a path relative to the config directory
    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.config_dir.join(relative)
    }

    /// Parse core configuration from the root YAML value
    pub fn from_yaml(config_dir: impl Into<PathBuf>, yaml: &Value) -> ConfigResult<Self> {
        let mapping = yaml.as_mapping().ok_or_else(|| ConfigError::InvalidValue {
            key: "root".to_string(),
            reason: "configuration must be a mapping".to_string(),
        })?;

        let homeassistant: HomeAssistantSection = section(mapping, "homeassistant")?;
        let http: HttpConfig = section(mapping, "http")?;
        let frontend: FrontendSection = section(mapping, "frontend")?;

        Ok(Self {
            config_dir: config_dir.into(),
            name: homeassistant.name.unwrap_or_else(default_name),
            http,
            frontend_path: frontend.frontend_path.unwrap_or_else(default_frontend_path),
            theme_color: frontend.theme_color.unwrap_or_else(default_theme_color),
        })
    }
}

/// Deserialize a top-level section, treating a missing or empty section as defaults
fn section<T>(mapping: &serde_yaml::Mapping, key: &str) -> ConfigResult<T>
where
    T: Default + serde::de::DeserializeOwned,
{
    match mapping.get(key) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => {
            serde_yaml::from_value(value.clone()).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                reason: e.to_string(),
            })
        }
    }
}

/// Convert the root YAML mapping into per-domain JSON sections
pub fn to_config_type(yaml: &Value) -> ConfigResult<ConfigType> {
    match serde_json::to_value(yaml) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(serde_json::Value::Null) => Ok(ConfigType::new()),
        Ok(_) => Err(ConfigError::InvalidValue {
            key: "root".to_string(),
            reason: "configuration must be a mapping".to_string(),
        }),
        Err(e) => Err(ConfigError::InvalidValue {
            key: "root".to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Load configuration.yaml from `config_dir`
pub fn load_configuration(config_dir: impl AsRef<Path>) -> ConfigResult<(CoreConfig, ConfigType)> {
    let config_dir = config_dir.as_ref();
    let yaml = load_yaml(config_dir, YAML_CONFIG_FILE)?;

    let yaml = match yaml {
        Value::Null => Value::Mapping(serde_yaml::Mapping::new()),
        other => other,
    };

    let core = CoreConfig::from_yaml(config_dir, &yaml)?;
    let config = to_config_type(&yaml)?;
    Ok((core, config))
}
