//! Startup sequence: configuration, hub, integrations, stored entries

use std::path::Path;

use anyhow::{Context, Result};
use ha_config::{load_configuration, ConfigType, CoreConfig, YAML_CONFIG_FILE};
use ha_core::HomeAssistant;
use tracing::{error, info, warn};

/// Build a running hub from `config_dir`
pub async fn async_setup_hass(config_dir: &Path) -> Result<HomeAssistant> {
    let (core_config, config) = if config_dir.join(YAML_CONFIG_FILE).exists() {
        load_configuration(config_dir)
            .with_context(|| format!("Failed to load {}", config_dir.join(YAML_CONFIG_FILE).display()))?
    } else {
        warn!(
            "No {} in {}, starting with defaults",
            YAML_CONFIG_FILE,
            config_dir.display()
        );
        (CoreConfig::new(config_dir), ConfigType::new())
    };

    let hass = HomeAssistant::new(core_config);
    hass.config_entries
        .load()
        .await
        .context("Failed to load config entries")?;

    async_setup_integrations(&hass, &config).await;
    hass.block_till_done().await;

    for result in hass.config_entries.setup_all().await {
        if let Err(e) = result {
            error!("Error setting up config entry: {}", e);
        }
    }

    info!("Loaded components: {:?}", hass.components());
    Ok(hass)
}

/// Set up every card integration that is configured or has a stored entry
async fn async_setup_integrations(hass: &HomeAssistant, config: &ConfigType) {
    for integration in ha_components::card_integrations(hass) {
        let domain = integration.domain().to_string();
        let configured = config.contains_key(&domain);
        let stored = !hass.config_entries.get_by_domain(&domain).is_empty();
        if !configured && !stored {
            continue;
        }

        match hass.setup_component(integration, config).await {
            Ok(true) => {}
            Ok(false) => error!("Setup failed for {}", domain),
            Err(e) => error!("Error during setup of component {}: {}", domain, e),
        }
    }
}
