//! YAML loader with custom tag support

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

const SECRETS_FILE: &str = "secrets.yaml";

/// YAML loader resolving `!include`, `!secret` and `!env_var`
pub struct YamlLoader {
    config_dir: PathBuf,
    /// Loaded on first `!secret`
    secrets: Option<HashMap<String, Value>>,
    /// Files currently being loaded, for cycle detection
    include_stack: Vec<PathBuf>,
}

impl YamlLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets: None,
            include_stack: Vec::new(),
        }
    }

    /// Load and process a YAML file, relative paths resolve against the config dir
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = self.resolve(&self.config_dir, path.as_ref());
        debug!("Loading YAML file: {:?}", path);

        if self.include_stack.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }

        let content = read(&path)?;
        self.include_stack.push(path.clone());
        let result = self.load_str(&content, &path);
        self.include_stack.pop();

        result
    }

    /// Process YAML text as if it were read from `source_path`
    pub fn load_str(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let value: Value = serde_yaml::from_str(content).map_err(|e| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source: e,
        })?;

        self.process(value, source_path)
    }

    fn process(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        match value {
            Value::Tagged(tagged) => {
                let serde_yaml::value::TaggedValue { tag, value } = *tagged;
                trace!("Processing tag '{}'", tag);
                match tag.to_string().as_str() {
                    "!include" => {
                        let target = expect_str(&value, "!include")?;
                        let base = source_path.parent().unwrap_or(&self.config_dir);
                        let path = self.resolve(base, Path::new(target));
                        self.load_file(path)
                    }
                    "!secret" => {
                        let key = expect_str(&value, "!secret")?;
                        self.secret(key)
                    }
                    "!env_var" => {
                        let var = expect_str(&value, "!env_var")?;
                        std::env::var(var)
                            .map(Value::String)
                            .map_err(|_| ConfigError::EnvVarNotFound {
                                var: var.to_string(),
                            })
                    }
                    _ => {
                        let value = self.process(value, source_path)?;
                        Ok(Value::Tagged(Box::new(serde_yaml::value::TaggedValue {
                            tag,
                            value,
                        })))
                    }
                }
            }
            Value::Mapping(map) => {
                let mut out = serde_yaml::Mapping::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k, self.process(v, source_path)?);
                }
                Ok(Value::Mapping(out))
            }
            Value::Sequence(seq) => seq
                .into_iter()
                .map(|v| self.process(v, source_path))
                .collect::<ConfigResult<Vec<_>>>()
                .map(Value::Sequence),
            other => Ok(other),
        }
    }

    fn secret(&mut self, key: &str) -> ConfigResult<Value> {
        if self.secrets.is_none() {
            let path = self.config_dir.join(SECRETS_FILE);
            let secrets = if path.exists() {
                let content = read(&path)?;
                serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseYaml {
                    path: path.clone(),
                    source: e,
                })?
            } else {
                debug!("No secrets.yaml found at {:?}", path);
                HashMap::new()
            };
            self.secrets = Some(secrets);
        }

        self.secrets
            .as_ref()
            .and_then(|secrets| secrets.get(key))
            .cloned()
            .ok_or_else(|| ConfigError::SecretNotFound {
                key: key.to_string(),
            })
    }

    fn resolve(&self, base: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base.join(path)
        }
    }
}

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

fn expect_str<'a>(value: &'a Value, tag: &str) -> ConfigResult<&'a str> {
    value.as_str().ok_or_else(|| ConfigError::InvalidValue {
        key: tag.to_string(),
        reason: "argument must be a string".to_string(),
    })
}

/// Load a YAML file from a config directory
pub fn load_yaml(config_dir: impl AsRef<Path>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir.as_ref()).load_file(file)
}
