//! Config Entries Manager
//!
//! Manages the lifecycle of configuration entries.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use ha_storage::{Storable, StorageError, Store};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState, ConfigEntryUpdate};
use crate::handler::{EntryHandler, PlatformHandler};
use crate::state_machine::InvalidTransition;

/// Storage key for config entries
pub const STORAGE_KEY: &str = "core.config_entries";
/// Current storage version
pub const STORAGE_VERSION: u32 = 1;
/// Current minor version
pub const STORAGE_MINOR_VERSION: u32 = 5;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup failed: {0}")]
    SetupFailed(String),

    #[error("Unload failed: {0}")]
    UnloadFailed(String),

    #[error("No config flow handler registered for domain {0}")]
    NoHandler(String),

    #[error("Invalid entry data: {0}")]
    InvalidData(String),

    #[error("Platform {platform} not registered for domain {domain}")]
    PlatformNotFound { domain: String, platform: String },

    #[error("Platform {platform} failed: {reason}")]
    PlatformFailed { platform: String, reason: String },

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config entries data for storage
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigEntriesData {
    /// All config entries
    pub entries: Vec<ConfigEntry>,
}

impl Storable for ConfigEntriesData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

/// Config Entries Manager
///
/// Manages the lifecycle of configuration entries including:
/// - Loading/saving from storage
/// - Entry creation and removal
/// - Setup/unload through the registered [`EntryHandler`]s
/// - Platform forwarding
pub struct ConfigEntries {
    /// Storage backend
    store: Store<ConfigEntriesData>,

    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Index: (domain, unique_id) -> entry_id
    by_unique_id: DashMap<(String, String), String>,

    /// Setup lock to prevent concurrent setup/unload
    setup_lock: Mutex<()>,

    /// Serializes writes to the storage file
    save_lock: Mutex<()>,

    /// Entry handlers by domain
    handlers: DashMap<String, Arc<dyn EntryHandler>>,

    /// Platform handlers by (domain, platform)
    platforms: DashMap<(String, String), Arc<dyn PlatformHandler>>,

    /// Platforms currently set up, by entry_id
    forwarded: DashMap<String, HashSet<String>>,
}

impl ConfigEntries {
    /// Create a manager persisting into `config_dir/.storage`
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self {
            store: Store::new(config_dir),
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            by_unique_id: DashMap::new(),
            setup_lock: Mutex::new(()),
            save_lock: Mutex::new(()),
            handlers: DashMap::new(),
            platforms: DashMap::new(),
            forwarded: DashMap::new(),
        }
    }

    /// Load entries from storage
    pub async fn load(&self) -> ConfigEntriesResult<()> {
        if let Some(data) = self.store.load().await? {
            info!("Loading {} config entries from storage", data.entries.len());
            for entry in data.entries {
                self.index_entry(&entry);
            }
        }
        Ok(())
    }

    /// Save entries to storage
    pub async fn save(&self) -> ConfigEntriesResult<()> {
        let _lock = self.save_lock.lock().await;
        let data = ConfigEntriesData {
            entries: self.entries.iter().map(|r| r.value().clone()).collect(),
        };
        self.store.save(&data).await?;
        debug!("Saved {} config entries to storage", data.entries.len());
        Ok(())
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        let entry_id = entry.entry_id.clone();

        self.entries.insert(entry_id.clone(), entry.clone());

        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry_id.clone());

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .insert((entry.domain.clone(), unique_id.clone()), entry_id);
        }
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }

        if let Some(ref unique_id) = entry.unique_id {
            self.by_unique_id
                .remove(&(entry.domain.clone(), unique_id.clone()));
        }

        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        let ids: Vec<String> = self
            .by_domain
            .get(domain)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Get entry by unique_id
    pub fn get_by_unique_id(&self, domain: &str, unique_id: &str) -> Option<ConfigEntry> {
        let entry_id = self
            .by_unique_id
            .get(&(domain.to_string(), unique_id.to_string()))
            .map(|r| r.value().clone())?;
        self.get(&entry_id)
    }

    /// Add a new config entry
    pub async fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            if self.get_by_unique_id(&entry.domain, unique_id).is_some() {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(&entry);
        self.save().await?;

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );

        Ok(entry)
    }

    /// Update an existing entry
    pub async fn update(
        &self,
        entry_id: &str,
        update: ConfigEntryUpdate,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let updated = {
            let mut entry = self
                .entries
                .get_mut(entry_id)
                .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

            if let Some(title) = update.title {
                entry.title = title;
            }
            if let Some(data) = update.data {
                entry.data = data;
            }
            if let Some(options) = update.options {
                entry.options = options;
            }
            entry.modified_at = Utc::now();
            entry.clone()
        };

        self.save().await?;

        debug!("Updated config entry: {}", entry_id);
        Ok(updated)
    }

    /// Unload (if needed) and remove an entry
    pub async fn remove(&self, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.is_loaded() && !self.unload(entry_id).await? {
            return Err(ConfigEntriesError::UnloadFailed(entry_id.to_string()));
        }

        self.unindex_entry(&entry);
        self.forwarded.remove(entry_id);
        self.save().await?;

        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );

        Ok(entry)
    }

    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<()> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(())
    }

    /// Register the entry handler for a domain
    pub fn register_handler(&self, domain: &str, handler: Arc<dyn EntryHandler>) {
        self.handlers.insert(domain.to_string(), handler);
        debug!("Registered entry handler for domain: {}", domain);
    }

    /// Drop the entry handler for a domain
    pub fn unregister_handler(&self, domain: &str) -> bool {
        let removed = self.handlers.remove(domain).is_some();
        if removed {
            debug!("Unregistered entry handler for domain: {}", domain);
        }
        removed
    }

    /// Get the entry handler for a domain
    pub fn handler(&self, domain: &str) -> Option<Arc<dyn EntryHandler>> {
        self.handlers.get(domain).map(|r| r.value().clone())
    }

    /// Register a platform an integration can forward entries to
    pub fn register_platform(
        &self,
        domain: &str,
        platform: &str,
        handler: Arc<dyn PlatformHandler>,
    ) {
        self.platforms
            .insert((domain.to_string(), platform.to_string()), handler);
        debug!("Registered platform {}.{}", domain, platform);
    }

    fn platform(&self, domain: &str, platform: &str) -> ConfigEntriesResult<Arc<dyn PlatformHandler>> {
        self.platforms
            .get(&(domain.to_string(), platform.to_string()))
            .map(|r| r.value().clone())
            .ok_or_else(|| ConfigEntriesError::PlatformNotFound {
                domain: domain.to_string(),
                platform: platform.to_string(),
            })
    }

    /// Setup an entry (call the integration's entry setup)
    pub async fn setup(&self, entry_id: &str) -> ConfigEntriesResult<()> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.is_disabled() {
            debug!("Skipping setup for disabled entry: {}", entry_id);
            return Ok(());
        }

        self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;

        let outcome = match self.handler(&entry.domain) {
            Some(handler) => handler.setup_entry(self, &entry).await,
            None => {
                debug!(
                    "No entry handler for domain {}, marking as loaded",
                    entry.domain
                );
                Ok(true)
            }
        };

        let reason = match outcome {
            Ok(true) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                return Ok(());
            }
            Ok(false) => format!("Setup of {} returned false", entry.domain),
            Err(e) => e.to_string(),
        };

        warn!("Setup failed for entry {}: {}", entry_id, reason);
        self.transition(entry_id, ConfigEntryState::SetupError, Some(reason.clone()))?;
        Err(ConfigEntriesError::SetupFailed(reason))
    }

    /// Unload an entry, returning whether the integration unloaded cleanly
    pub async fn unload(&self, entry_id: &str) -> ConfigEntriesResult<bool> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if !entry.state.is_recoverable() {
            return Err(ConfigEntriesError::CannotUnload(entry.state));
        }
        if entry.state == ConfigEntryState::NotLoaded {
            return Ok(true);
        }

        self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        let outcome = match self.handler(&entry.domain) {
            Some(handler) => handler.unload_entry(self, &entry).await,
            None => Ok(true),
        };

        match outcome {
            Ok(true) => {
                self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
                info!("Unloaded entry: {} ({})", entry.title, entry_id);
                Ok(true)
            }
            Ok(false) => {
                warn!("Unload of entry {} reported failure", entry_id);
                self.transition(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some("Unload returned false".to_string()),
                )?;
                Ok(false)
            }
            Err(e) => {
                let reason = e.to_string();
                warn!("Unload failed for entry {}: {}", entry_id, reason);
                self.transition(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some(reason.clone()),
                )?;
                Err(ConfigEntriesError::UnloadFailed(reason))
            }
        }
    }

    /// Reload an entry (unload + setup)
    pub async fn reload(&self, entry_id: &str) -> ConfigEntriesResult<bool> {
        if !self.unload(entry_id).await? {
            return Ok(false);
        }
        self.setup(entry_id).await?;
        Ok(true)
    }

    /// Set up the given platforms for an entry
    pub async fn forward_entry_setups(
        &self,
        entry: &ConfigEntry,
        platforms: &[&str],
    ) -> ConfigEntriesResult<()> {
        for platform in platforms {
            let handler = self.platform(&entry.domain, platform)?;
            handler
                .setup_platform(entry)
                .await
                .map_err(|e| ConfigEntriesError::PlatformFailed {
                    platform: platform.to_string(),
                    reason: e.to_string(),
                })?;

            self.forwarded
                .entry(entry.entry_id.clone())
                .or_default()
                .insert(platform.to_string());
            debug!("Forwarded entry {} to {}", entry.entry_id, platform);
        }
        Ok(())
    }

    /// Unload the given platforms for an entry
    ///
    /// Platforms that were never set up are skipped. Returns `false` if any
    /// platform reported an unclean unload.
    pub async fn unload_platforms(
        &self,
        entry: &ConfigEntry,
        platforms: &[&str],
    ) -> ConfigEntriesResult<bool> {
        let mut unload_ok = true;

        for platform in platforms {
            let is_forwarded = self
                .forwarded
                .get(&entry.entry_id)
                .map(|set| set.contains(*platform))
                .unwrap_or(false);
            if !is_forwarded {
                continue;
            }

            let handler = self.platform(&entry.domain, platform)?;
            let ok = handler
                .unload_platform(entry)
                .await
                .map_err(|e| ConfigEntriesError::PlatformFailed {
                    platform: platform.to_string(),
                    reason: e.to_string(),
                })?;

            if ok {
                if let Some(mut set) = self.forwarded.get_mut(&entry.entry_id) {
                    set.remove(*platform);
                }
            } else {
                warn!("Platform {} of entry {} failed to unload", platform, entry.entry_id);
                unload_ok = false;
            }
        }

        Ok(unload_ok)
    }

    /// Platforms currently set up for an entry
    pub fn forwarded_platforms(&self, entry_id: &str) -> Vec<String> {
        let mut platforms: Vec<String> = self
            .forwarded
            .get(entry_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        platforms.sort();
        platforms
    }

    /// Get all entry IDs
    pub fn entry_ids(&self) -> Vec<String> {
        self.entries.iter().map(|r| r.key().clone()).collect()
    }

    /// Get all domains with entries
    pub fn domains(&self) -> Vec<String> {
        self.by_domain
            .iter()
            .filter(|r| !r.value().is_empty())
            .map(|r| r.key().clone())
            .collect()
    }

    /// Get count of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Setup all entries that are not loaded yet
    ///
    /// Entries of domains without a registered handler are left as they are.
    pub async fn setup_all(&self) -> Vec<ConfigEntriesResult<()>> {
        let mut results = Vec::new();

        for entry_id in self.entry_ids() {
            let Some(entry) = self.get(&entry_id) else {
                continue;
            };
            if entry.state != ConfigEntryState::NotLoaded {
                continue;
            }
            if self.handler(&entry.domain).is_none() {
                debug!("Skipping entry {}: no handler for {}", entry_id, entry.domain);
                continue;
            }
            results.push(self.setup(&entry_id).await);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ConfigEntrySource;
    use crate::handler::HandlerResult;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn create_test_manager() -> (TempDir, ConfigEntries) {
        let temp_dir = TempDir::new().unwrap();
        let manager = ConfigEntries::new(temp_dir.path());
        (temp_dir, manager)
    }

    #[derive(Default)]
    struct TestHandler {
        setup_result: Option<bool>,
        unload_result: Option<bool>,
        setups: AtomicUsize,
        unloads: AtomicUsize,
    }

    #[async_trait]
    impl EntryHandler for TestHandler {
        fn title(&self) -> &str {
            "Test"
        }

        async fn setup_entry(
            &self,
            _entries: &ConfigEntries,
            _entry: &ConfigEntry,
        ) -> HandlerResult<bool> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            self.setup_result.ok_or_else(|| "Connection failed".into())
        }

        async fn unload_entry(
            &self,
            _entries: &ConfigEntries,
            _entry: &ConfigEntry,
        ) -> HandlerResult<bool> {
            self.unloads.fetch_add(1, Ordering::SeqCst);
            self.unload_result.ok_or_else(|| "Unload exploded".into())
        }
    }

    struct TestPlatform {
        unload_ok: bool,
        set_up: AtomicBool,
    }

    #[async_trait]
    impl PlatformHandler for TestPlatform {
        async fn setup_platform(&self, _entry: &ConfigEntry) -> HandlerResult<()> {
            self.set_up.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn unload_platform(&self, _entry: &ConfigEntry) -> HandlerResult<bool> {
            Ok(self.unload_ok)
        }
    }

    #[tokio::test]
    async fn test_add_entry() {
        let (_dir, manager) = create_test_manager();

        let entry = ConfigEntry::new("advanced_ui_cards", "UI Lovelace")
            .with_unique_id("advanced_ui_cards")
            .with_source(ConfigEntrySource::Import);

        let added = manager.add(entry).await.unwrap();
        assert_eq!(added.domain, "advanced_ui_cards");
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_unique_id_rejected() {
        let (_dir, manager) = create_test_manager();

        let entry1 = ConfigEntry::new("cards", "One").with_unique_id("same-id");
        let entry2 = ConfigEntry::new("cards", "Two").with_unique_id("same-id");

        manager.add(entry1).await.unwrap();
        let result = manager.add(entry2).await;

        assert!(matches!(
            result,
            Err(ConfigEntriesError::AlreadyExists { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_by_domain() {
        let (_dir, manager) = create_test_manager();

        manager.add(ConfigEntry::new("hue", "Hue 1")).await.unwrap();
        manager.add(ConfigEntry::new("hue", "Hue 2")).await.unwrap();
        manager.add(ConfigEntry::new("mqtt", "MQTT")).await.unwrap();

        assert_eq!(manager.get_by_domain("hue").len(), 2);
        assert_eq!(manager.get_by_domain("mqtt").len(), 1);
        assert!(manager.get_by_domain("zha").is_empty());
    }

    #[tokio::test]
    async fn test_update_entry() {
        let (_dir, manager) = create_test_manager();

        let entry = manager
            .add(ConfigEntry::new("hue", "Old Name"))
            .await
            .unwrap();

        let updated = manager
            .update(&entry.entry_id, ConfigEntryUpdate::new().title("New Name"))
            .await
            .unwrap();

        assert_eq!(updated.title, "New Name");
        assert_eq!(manager.get(&entry.entry_id).unwrap().title, "New Name");
    }

    #[tokio::test]
    async fn test_setup_and_unload_without_handler() {
        let (_dir, manager) = create_test_manager();

        let entry = manager.add(ConfigEntry::new("hue", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());

        assert!(manager.unload(&entry.entry_id).await.unwrap());
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
    }

    #[tokio::test]
    async fn test_setup_calls_handler() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(TestHandler {
            setup_result: Some(true),
            unload_result: Some(true),
            ..Default::default()
        });
        manager.register_handler("hue", handler.clone());

        let entry = manager.add(ConfigEntry::new("hue", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
        assert_eq!(handler.setups.load(Ordering::SeqCst), 1);

        assert!(manager.unload(&entry.entry_id).await.unwrap());
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_setup_handler_error() {
        let (_dir, manager) = create_test_manager();
        manager.register_handler("hue", Arc::new(TestHandler::default()));

        let entry = manager.add(ConfigEntry::new("hue", "Test")).await.unwrap();
        let result = manager.setup(&entry.entry_id).await;

        assert!(matches!(result, Err(ConfigEntriesError::SetupFailed(_))));
        let entry = manager.get(&entry.entry_id).unwrap();
        assert_eq!(entry.state, ConfigEntryState::SetupError);
        assert_eq!(entry.reason.as_deref(), Some("Connection failed"));
    }

    #[tokio::test]
    async fn test_setup_handler_returns_false() {
        let (_dir, manager) = create_test_manager();
        manager.register_handler(
            "hue",
            Arc::new(TestHandler {
                setup_result: Some(false),
                ..Default::default()
            }),
        );

        let entry = manager.add(ConfigEntry::new("hue", "Test")).await.unwrap();
        assert!(manager.setup(&entry.entry_id).await.is_err());
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::SetupError
        );
    }

    #[tokio::test]
    async fn test_setup_twice_rejected() {
        let (_dir, manager) = create_test_manager();

        let entry = manager.add(ConfigEntry::new("hue", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();

        let result = manager.setup(&entry.entry_id).await;
        assert!(matches!(
            result,
            Err(ConfigEntriesError::InvalidTransition(_))
        ));
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_disabled_entry_not_set_up() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(TestHandler {
            setup_result: Some(true),
            ..Default::default()
        });
        manager.register_handler("hue", handler.clone());

        let entry = manager
            .add(
                ConfigEntry::new("hue", "Test")
                    .disabled(crate::entry::ConfigEntryDisabledBy::User),
            )
            .await
            .unwrap();
        manager.setup(&entry.entry_id).await.unwrap();

        assert_eq!(handler.setups.load(Ordering::SeqCst), 0);
        assert!(!manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_unload_returning_false_fails_unload() {
        let (_dir, manager) = create_test_manager();
        manager.register_handler(
            "hue",
            Arc::new(TestHandler {
                setup_result: Some(true),
                unload_result: Some(false),
                ..Default::default()
            }),
        );

        let entry = manager.add(ConfigEntry::new("hue", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();

        assert!(!manager.unload(&entry.entry_id).await.unwrap());
        assert_eq!(
            manager.get(&entry.entry_id).unwrap().state,
            ConfigEntryState::FailedUnload
        );

        // Terminal
        assert!(matches!(
            manager.unload(&entry.entry_id).await,
            Err(ConfigEntriesError::CannotUnload(ConfigEntryState::FailedUnload))
        ));
    }

    #[tokio::test]
    async fn test_unload_not_loaded_is_noop() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(TestHandler::default());
        manager.register_handler("hue", handler.clone());

        let entry = manager.add(ConfigEntry::new("hue", "Test")).await.unwrap();
        assert!(manager.unload(&entry.entry_id).await.unwrap());
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_reload() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(TestHandler {
            setup_result: Some(true),
            unload_result: Some(true),
            ..Default::default()
        });
        manager.register_handler("hue", handler.clone());

        let entry = manager.add(ConfigEntry::new("hue", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();
        assert!(manager.reload(&entry.entry_id).await.unwrap());

        assert_eq!(handler.setups.load(Ordering::SeqCst), 2);
        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);
        assert!(manager.get(&entry.entry_id).unwrap().is_loaded());
    }

    #[tokio::test]
    async fn test_remove_unloads_first() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(TestHandler {
            setup_result: Some(true),
            unload_result: Some(true),
            ..Default::default()
        });
        manager.register_handler("hue", handler.clone());

        let entry = manager.add(ConfigEntry::new("hue", "Test")).await.unwrap();
        manager.setup(&entry.entry_id).await.unwrap();
        manager.remove(&entry.entry_id).await.unwrap();

        assert_eq!(handler.unloads.load(Ordering::SeqCst), 1);
        assert!(manager.is_empty());
        assert!(manager.domains().is_empty());
    }

    #[tokio::test]
    async fn test_forward_empty_platforms_is_noop() {
        let (_dir, manager) = create_test_manager();
        let entry = ConfigEntry::new("hue", "Test");

        manager.forward_entry_setups(&entry, &[]).await.unwrap();
        assert!(manager.forwarded_platforms(&entry.entry_id).is_empty());
        assert!(manager.unload_platforms(&entry, &[]).await.unwrap());
    }

    #[tokio::test]
    async fn test_forward_unknown_platform() {
        let (_dir, manager) = create_test_manager();
        let entry = ConfigEntry::new("hue", "Test");

        let result = manager.forward_entry_setups(&entry, &["light"]).await;
        assert!(matches!(
            result,
            Err(ConfigEntriesError::PlatformNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_forward_and_unload_platforms() {
        let (_dir, manager) = create_test_manager();
        let platform = Arc::new(TestPlatform {
            unload_ok: true,
            set_up: AtomicBool::new(false),
        });
        manager.register_platform("hue", "light", platform.clone());
        let entry = ConfigEntry::new("hue", "Test");

        manager.forward_entry_setups(&entry, &["light"]).await.unwrap();
        assert!(platform.set_up.load(Ordering::SeqCst));
        assert_eq!(manager.forwarded_platforms(&entry.entry_id), vec!["light"]);

        assert!(manager.unload_platforms(&entry, &["light"]).await.unwrap());
        assert!(manager.forwarded_platforms(&entry.entry_id).is_empty());
    }

    #[tokio::test]
    async fn test_failed_platform_unload_reports_false() {
        let (_dir, manager) = create_test_manager();
        manager.register_platform(
            "hue",
            "light",
            Arc::new(TestPlatform {
                unload_ok: false,
                set_up: AtomicBool::new(false),
            }),
        );
        let entry = ConfigEntry::new("hue", "Test");

        manager.forward_entry_setups(&entry, &["light"]).await.unwrap();
        assert!(!manager.unload_platforms(&entry, &["light"]).await.unwrap());
        assert_eq!(manager.forwarded_platforms(&entry.entry_id), vec!["light"]);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();

        {
            let manager = ConfigEntries::new(temp_dir.path());
            manager
                .add(
                    ConfigEntry::new("lovelace_cards", "Dashboard UI Cards")
                        .with_unique_id("lovelace_cards")
                        .with_source(ConfigEntrySource::Import),
                )
                .await
                .unwrap();
        }

        {
            let manager = ConfigEntries::new(temp_dir.path());
            manager.load().await.unwrap();

            assert_eq!(manager.len(), 1);
            let entry = manager
                .get_by_unique_id("lovelace_cards", "lovelace_cards")
                .unwrap();
            assert_eq!(entry.title, "Dashboard UI Cards");
            assert_eq!(entry.source, ConfigEntrySource::Import);
            assert_eq!(entry.state, ConfigEntryState::NotLoaded);
        }
    }

    #[tokio::test]
    async fn test_setup_all_skips_loaded() {
        let (_dir, manager) = create_test_manager();
        let handler = Arc::new(TestHandler {
            setup_result: Some(true),
            ..Default::default()
        });
        manager.register_handler("hue", handler.clone());
        let first = manager.add(ConfigEntry::new("hue", "One")).await.unwrap();
        manager.add(ConfigEntry::new("hue", "Two")).await.unwrap();

        manager.setup(&first.entry_id).await.unwrap();
        let results = manager.setup_all().await;

        assert_eq!(results.len(), 1);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(manager.get_by_domain("hue").iter().all(|e| e.is_loaded()));
        assert_eq!(handler.setups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_setup_all_skips_domains_without_handler() {
        let (_dir, manager) = create_test_manager();
        let orphan = manager
            .add(ConfigEntry::new("advanced_ui_cards", "UI Lovelace"))
            .await
            .unwrap();
        manager.add(ConfigEntry::new("hue", "Hue")).await.unwrap();
        manager.register_handler(
            "hue",
            Arc::new(TestHandler {
                setup_result: Some(true),
                ..Default::default()
            }),
        );
        let results = manager.setup_all().await;

        assert_eq!(results.len(), 1);
        assert_eq!(
            manager.get(&orphan.entry_id).unwrap().state,
            ConfigEntryState::NotLoaded
        );
        assert!(manager.get_by_domain("hue")[0].is_loaded());
    }

    #[tokio::test]
    async fn test_unregister_handler() {
        let (_dir, manager) = create_test_manager();
        manager.register_handler("hue", Arc::new(TestHandler::default()));

        assert!(manager.unregister_handler("hue"));
        assert!(manager.handler("hue").is_none());
        assert!(!manager.unregister_handler("hue"));
    }
}
