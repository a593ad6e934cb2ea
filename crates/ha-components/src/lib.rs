//! Lovelace card integrations
//!
//! Two integrations that ship dashboard card bundles: they register the
//! bundle's static paths, inject its scripts into the frontend and keep a
//! small shared record for the cards.

pub mod advanced_ui_cards;
pub mod cards_config;
pub mod lovelace_cards;

use std::sync::Arc;

use ha_core::{HomeAssistant, Integration};

pub use advanced_ui_cards::AdvancedUiCards;
pub use cards_config::{BrandEntry, CardsConfig, Section, SectionError};
pub use lovelace_cards::LovelaceCards;

/// All card integrations, wired to `hass`
pub fn card_integrations(hass: &HomeAssistant) -> Vec<Arc<dyn Integration>> {
    vec![
        Arc::new(AdvancedUiCards::new(hass)),
        Arc::new(LovelaceCards::new(hass)),
    ]
}
