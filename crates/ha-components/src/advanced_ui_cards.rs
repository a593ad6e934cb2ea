//! Advanced UI cards
//!
//! Serves the card bundle from the integration's `lovelace/` directory and
//! injects its scripts into the dashboard. The `replacer` section of the
//! configuration is kept in the shared data for the cards to pick up.

use std::sync::Arc;

use async_trait::async_trait;
use ha_api::{Frontend, StaticPathConfig, StaticPaths};
use ha_config::{ConfigType, CoreConfig};
use ha_config_entries::{ConfigEntries, ConfigEntry, EntryHandler, HandlerResult};
use ha_core::{DataRegistry, HomeAssistant, Integration, IntegrationError, IntegrationResult, Record};
use serde_json::Value;
use tracing::info;

use crate::cards_config::{BrandEntry, CardsConfig};

pub const DOMAIN: &str = "advanced_ui_cards";
pub const NAME: &str = "UI Lovelace";
pub const BASE_URL: &str = "/lovelace_cards_files";

const BRAND_RESOLVER_JS: &str = "brand-resolver.js";
const CARDS_JS: &str = "advanced-ui-cards.js";

/// Replacer used when the domain is configured without a body
pub fn default_config() -> CardsConfig {
    CardsConfig::with_replacer(vec![BrandEntry::new(DOMAIN, "/brands/logo.svg")])
}

fn script_url(file: &str) -> String {
    format!("{}/{}", BASE_URL, file)
}

/// The `advanced_ui_cards` integration
pub struct AdvancedUiCards {
    config: Arc<CoreConfig>,
    data: Arc<DataRegistry>,
    http: Arc<StaticPaths>,
    frontend: Arc<Frontend>,
    platforms: Vec<&'static str>,
}

impl AdvancedUiCards {
    pub fn new(hass: &HomeAssistant) -> Self {
        Self {
            config: hass.config.clone(),
            data: hass.data.clone(),
            http: hass.http.clone(),
            frontend: hass.frontend.clone(),
            platforms: Vec::new(),
        }
    }

    /// Platforms the config entry is forwarded to (none by default)
    pub fn with_platforms(mut self, platforms: &[&'static str]) -> Self {
        self.platforms = platforms.to_vec();
        self
    }
}

#[async_trait]
impl Integration for AdvancedUiCards {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn setup(&self, hass: &HomeAssistant, config: &ConfigType) -> IntegrationResult<bool> {
        self.data.set(DOMAIN, Record::new());

        let Some(section) = config.get(DOMAIN) else {
            return Ok(true);
        };

        let user = CardsConfig::from_section(section).map_err(|e| IntegrationError::InvalidConfig {
            domain: DOMAIN.to_string(),
            reason: e.to_string(),
        })?;
        let record = CardsConfig::resolve(user, default_config());

        self.data.set(DOMAIN, record.clone());
        let logged = Value::Object(record.clone());
        info!("Setup {} with {}", DOMAIN, logged);

        hass.create_import_flow(DOMAIN, Value::Object(record));
        Ok(true)
    }
}

#[async_trait]
impl EntryHandler for AdvancedUiCards {
    fn title(&self) -> &str {
        NAME
    }

    async fn setup_entry(&self, entries: &ConfigEntries, entry: &ConfigEntry) -> HandlerResult<bool> {
        let integration_dir = self.config.path(format!("custom_components/{}", DOMAIN));
        let bundle_dir = integration_dir.join("lovelace");

        info!("Register paths: {}", BASE_URL);
        info!("Register paths: {}", script_url(BRAND_RESOLVER_JS));
        info!("Register paths: {}", script_url(CARDS_JS));

        self.http
            .register_static_paths(vec![
                StaticPathConfig::new(BASE_URL, &bundle_dir, false),
                StaticPathConfig::new(
                    script_url(BRAND_RESOLVER_JS),
                    bundle_dir.join(BRAND_RESOLVER_JS),
                    false,
                ),
                StaticPathConfig::new(script_url(CARDS_JS), bundle_dir.join(CARDS_JS), false),
            ])
            .await?;

        self.frontend
            .add_extra_js_url(&script_url(BRAND_RESOLVER_JS), false);
        self.frontend.add_extra_js_url(&script_url(CARDS_JS), false);

        let mut base = Record::new();
        base.insert("name".to_string(), Value::from(NAME));
        self.data.merge_under(DOMAIN, base);

        entries.forward_entry_setups(entry, &self.platforms).await?;

        info!("Finish setup {}", DOMAIN);
        Ok(true)
    }

    async fn unload_entry(&self, entries: &ConfigEntries, entry: &ConfigEntry) -> HandlerResult<bool> {
        self.frontend
            .remove_extra_js_url(&script_url(BRAND_RESOLVER_JS), false);
        self.frontend
            .remove_extra_js_url(&script_url(CARDS_JS), false);

        let unload_ok = entries.unload_platforms(entry, &self.platforms).await?;
        if unload_ok {
            self.data.remove(DOMAIN);
        }

        Ok(unload_ok)
    }
}
