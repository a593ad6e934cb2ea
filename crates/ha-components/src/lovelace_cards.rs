//! Dashboard UI cards
//!
//! Registers the card bundle once at component setup. The entry only
//! publishes the display name.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ha_config::{ConfigType, CoreConfig};
use ha_config_entries::{ConfigEntries, ConfigEntry, EntryHandler, HandlerResult};
use ha_core::{DataRegistry, HomeAssistant, Integration, IntegrationResult, Record};
use serde_json::Value;
use tracing::info;

pub const DOMAIN: &str = "lovelace_cards";
pub const NAME: &str = "Dashboard UI Cards";
pub const BASE_URL: &str = "/lovelace-cards";

/// The `lovelace_cards` integration
pub struct LovelaceCards {
    config: Arc<CoreConfig>,
    data: Arc<DataRegistry>,
    platforms: Vec<&'static str>,
}

impl LovelaceCards {
    pub fn new(hass: &HomeAssistant) -> Self {
        Self {
            config: hass.config.clone(),
            data: hass.data.clone(),
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
impl Integration for LovelaceCards {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn setup(&self, hass: &HomeAssistant, config: &ConfigType) -> IntegrationResult<bool> {
        let card_file_path = self
            .config
            .path(format!("custom_components/{}", DOMAIN))
            .join("lovelace");
        hass.http
            .register_static_path(BASE_URL, &card_file_path, false)?;

        // Cache buster so browsers pick up a new bundle after a restart
        let url = format!("{}/lovelace-cards.js?cache={}", BASE_URL, Utc::now().timestamp());
        hass.frontend.add_extra_js_url(&url, false);
        info!("Registered {} cards at {}", DOMAIN, BASE_URL);

        let data = config
            .get(DOMAIN)
            .cloned()
            .unwrap_or_else(|| Value::Object(Default::default()));
        hass.create_import_flow(DOMAIN, data);
        Ok(true)
    }
}

#[async_trait]
impl EntryHandler for LovelaceCards {
    fn title(&self) -> &str {
        NAME
    }

    async fn setup_entry(&self, entries: &ConfigEntries, entry: &ConfigEntry) -> HandlerResult<bool> {
        let mut record = Record::new();
        record.insert("name".to_string(), Value::from(NAME));
        self.data.set(DOMAIN, record);

        entries.forward_entry_setups(entry, &self.platforms).await?;
        Ok(true)
    }

    async fn unload_entry(&self, entries: &ConfigEntries, entry: &ConfigEntry) -> HandlerResult<bool> {
        let unload_ok = entries.unload_platforms(entry, &self.platforms).await?;
        if unload_ok {
            self.data.remove(DOMAIN);
        }

        Ok(unload_ok)
    }
}
