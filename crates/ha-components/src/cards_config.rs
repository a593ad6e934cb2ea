//! Replacer configuration shared by the card integrations
//!
//! ```yaml
//! advanced_ui_cards:
//!   replacer:
//!     - brand: advanced_ui_cards
//!       image: /brands/logo.svg
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const CONF_REPLACER: &str = "replacer";
pub const CONF_BRAND: &str = "brand";
pub const CONF_IMAGE: &str = "image";

/// A section as stored in the shared data
pub type Section = Map<String, Value>;

#[derive(Debug, Error, PartialEq)]
pub enum SectionError {
    #[error("section must be a mapping, got {0}")]
    NotAMapping(&'static str),
}

/// Image override for one brand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrandEntry {
    pub brand: String,
    pub image: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BrandEntry {
    pub fn new(brand: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            image: image.into(),
            extra: Map::new(),
        }
    }
}

impl From<BrandEntry> for Value {
    fn from(entry: BrandEntry) -> Self {
        let mut map = entry.extra;
        map.insert(CONF_BRAND.to_string(), Value::String(entry.brand));
        map.insert(CONF_IMAGE.to_string(), Value::String(entry.image));
        Value::Object(map)
    }
}

/// The built-in configuration of a card integration
///
/// User sections are never parsed into this type. They are kept as the
/// mapping that was supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacer: Option<Vec<BrandEntry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CardsConfig {
    pub fn with_replacer(replacer: Vec<BrandEntry>) -> Self {
        Self {
            replacer: Some(replacer),
            extra: Map::new(),
        }
    }

    /// Pick the configuration in effect
    ///
    /// A user section replaces the default entirely; it is never merged
    /// with it.
    pub fn resolve(user: Option<Section>, default: CardsConfig) -> Section {
        user.unwrap_or_else(|| default.into())
    }

    /// Read a YAML section; `null` means "use the default"
    ///
    /// Any mapping is accepted as is. Its keys and entries are not checked.
    pub fn from_section(section: &Value) -> Result<Option<Section>, SectionError> {
        match section {
            Value::Null => Ok(None),
            Value::Object(map) => Ok(Some(map.clone())),
            Value::Bool(_) => Err(SectionError::NotAMapping("a boolean")),
            Value::Number(_) => Err(SectionError::NotAMapping("a number")),
            Value::String(_) => Err(SectionError::NotAMapping("a string")),
            Value::Array(_) => Err(SectionError::NotAMapping("a list")),
        }
    }
}

impl From<CardsConfig> for Section {
    fn from(config: CardsConfig) -> Self {
        let mut section = config.extra;
        if let Some(replacer) = config.replacer {
            section.insert(
                CONF_REPLACER.to_string(),
                Value::Array(replacer.into_iter().map(Value::from).collect()),
            );
        }
        section
    }
}
