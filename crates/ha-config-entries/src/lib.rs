//! Config Entries
//!
//! This crate provides the configuration entry system for Home Assistant.
//! Config entries represent individual integration instances and manage
//! their lifecycle (setup, unload, reload).
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntryState`] - Lifecycle state of an entry
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`EntryHandler`] - Integration side of entry setup/unload
//! - [`FlowResult`] - Outcome of a config flow
//!
//! # Storage
//!
//! Config entries are persisted in `.storage/core.config_entries` with
//! version tracking.

pub mod entry;
pub mod flow;
pub mod handler;
pub mod manager;
pub mod state_machine;

// Re-export main types
pub use entry::{ConfigEntry, ConfigEntryDisabledBy, ConfigEntrySource, ConfigEntryState, ConfigEntryUpdate};
pub use flow::{FlowResult, ABORT_ALREADY_CONFIGURED};
pub use handler::{EntryHandler, HandlerError, HandlerResult, PlatformHandler};
pub use manager::{
    ConfigEntries, ConfigEntriesData, ConfigEntriesError, ConfigEntriesResult, STORAGE_KEY,
    STORAGE_MINOR_VERSION, STORAGE_VERSION,
};
pub use state_machine::InvalidTransition;
