//! Core host for Home Assistant integrations
//!
//! This crate ties the host services together: the [`HomeAssistant`] hub,
//! the per-domain [`DataRegistry`], background [`TaskTracker`] and the
//! [`Integration`] contract integrations implement.

mod data;
mod hass;
mod integration;
mod tasks;

pub use data::{DataRegistry, Record};
pub use hass::HomeAssistant;
pub use integration::{Integration, IntegrationError, IntegrationResult};
pub use tasks::TaskTracker;
