//! Integration contract
//!
//! An integration has a component-level `setup` run once with the YAML
//! configuration, plus the config entry hooks of [`EntryHandler`].

use std::sync::Arc;

use async_trait::async_trait;
use ha_api::HttpError;
use ha_config::ConfigType;
use ha_config_entries::{ConfigEntries, ConfigEntriesError, ConfigEntry, EntryHandler, HandlerResult};
use thiserror::Error;

use crate::hass::HomeAssistant;

/// Errors raised while setting up an integration
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("Invalid configuration for {domain}: {reason}")]
    InvalidConfig { domain: String, reason: String },

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}

pub type IntegrationResult<T> = Result<T, IntegrationError>;

/// A loadable integration
#[async_trait]
pub trait Integration: EntryHandler {
    /// Integration domain (e.g., "lovelace_cards")
    fn domain(&self) -> &str;

    /// Component-level setup with the full configuration
    async fn setup(&self, hass: &HomeAssistant, config: &ConfigType) -> IntegrationResult<bool>;
}

/// Registers an integration's entry hooks with the config entries manager
pub(crate) struct IntegrationEntryHandler(pub(crate) Arc<dyn Integration>);

#[async_trait]
impl EntryHandler for IntegrationEntryHandler {
    fn title(&self) -> &str {
        self.0.title()
    }

    async fn setup_entry(&self, entries: &ConfigEntries, entry: &ConfigEntry) -> HandlerResult<bool> {
        self.0.setup_entry(entries, entry).await
    }

    async fn unload_entry(
        &self,
        entries: &ConfigEntries,
        entry: &ConfigEntry,
    ) -> HandlerResult<bool> {
        self.0.unload_entry(entries, entry).await
    }
}
