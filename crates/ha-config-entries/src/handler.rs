//! Integration-side hooks invoked by the config entries manager

use async_trait::async_trait;

use crate::entry::ConfigEntry;
use crate::manager::ConfigEntries;

/// Error type returned by integration hooks
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by integration hooks
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Entry setup/unload for one integration domain
///
/// The manager is passed in so handlers can forward platform setups and
/// unloads for the entry.
#[async_trait]
pub trait EntryHandler: Send + Sync {
    /// Title given to entries created by a config flow
    fn title(&self) -> &str;

    /// Set up a config entry. `Ok(false)` marks the entry as failed.
    async fn setup_entry(&self, entries: &ConfigEntries, entry: &ConfigEntry)
        -> HandlerResult<bool>;

    /// Unload a config entry. `Ok(false)` marks the unload as failed.
    async fn unload_entry(
        &self,
        entries: &ConfigEntries,
        entry: &ConfigEntry,
    ) -> HandlerResult<bool>;
}

/// A platform (sensor, light, ...) an integration forwards its entry to
#[async_trait]
pub trait PlatformHandler: Send + Sync {
    async fn setup_platform(&self, entry: &ConfigEntry) -> HandlerResult<()>;

    async fn unload_platform(&self, entry: &ConfigEntry) -> HandlerResult<bool>;
}
