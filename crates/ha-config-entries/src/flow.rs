//! Import config flow
//!
//! Integrations configured in YAML hand their section over to the config
//! entries manager through an import flow. Only one entry per domain is
//! created; later imports refresh the stored data.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::entry::{ConfigEntry, ConfigEntrySource, ConfigEntryUpdate};
use crate::manager::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult};

/// Abort reason when the domain already has an entry
pub const ABORT_ALREADY_CONFIGURED: &str = "already_configured";

/// Outcome of a config flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    /// A new entry was created
    CreateEntry {
        flow_id: String,
        handler: String,
        entry_id: String,
        title: String,
    },
    /// The flow stopped without creating an entry
    Abort {
        flow_id: String,
        handler: String,
        reason: String,
    },
}

impl FlowResult {
    /// Entry id for a `create_entry` result
    pub fn entry_id(&self) -> Option<&str> {
        match self {
            FlowResult::CreateEntry { entry_id, .. } => Some(entry_id),
            FlowResult::Abort { .. } => None,
        }
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, FlowResult::Abort { .. })
    }
}

impl ConfigEntries {
    /// Run an import flow for `domain` with YAML-provided `data`
    ///
    /// `data` must be a JSON object (or null, treated as empty).
    pub async fn flow_init_import(
        &self,
        domain: &str,
        data: serde_json::Value,
    ) -> ConfigEntriesResult<FlowResult> {
        let flow_id = ulid::Ulid::new().to_string();
        let data: HashMap<String, serde_json::Value> = match data {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            serde_json::Value::Null => HashMap::new(),
            other => {
                return Err(ConfigEntriesError::InvalidData(format!(
                    "import data for {} must be a mapping, got {}",
                    domain, other
                )))
            }
        };

        let handler = self
            .handler(domain)
            .ok_or_else(|| ConfigEntriesError::NoHandler(domain.to_string()))?;

        if let Some(existing) = self.get_by_unique_id(domain, domain) {
            if existing.data != data {
                debug!("Updating imported data for entry {}", existing.entry_id);
                self.update(&existing.entry_id, ConfigEntryUpdate::new().data(data))
                    .await?;
            }
            debug!("Import flow for {} aborted: already configured", domain);
            return Ok(FlowResult::Abort {
                flow_id,
                handler: domain.to_string(),
                reason: ABORT_ALREADY_CONFIGURED.to_string(),
            });
        }

        let entry = ConfigEntry::new(domain, handler.title())
            .with_data(data)
            .with_unique_id(domain)
            .with_source(ConfigEntrySource::Import);
        let entry = self.add(entry).await?;
        info!("Imported {} from configuration.yaml", domain);

        if let Err(e) = self.setup(&entry.entry_id).await {
            warn!("Imported entry {} failed to set up: {}", entry.entry_id, e);
        }

        Ok(FlowResult::CreateEntry {
            flow_id,
            handler: domain.to_string(),
            entry_id: entry.entry_id,
            title: entry.title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::ConfigEntryState;
    use crate::handler::{EntryHandler, HandlerResult};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingHandler {
        setups: AtomicUsize,
    }

    #[async_trait]
    impl EntryHandler for CountingHandler {
        fn title(&self) -> &str {
            "UI Lovelace"
        }

        async fn setup_entry(
            &self,
            _entries: &ConfigEntries,
            _entry: &ConfigEntry,
        ) -> HandlerResult<bool> {
            self.setups.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }

        async fn unload_entry(
            &self,
            _entries: &ConfigEntries,
            _entry: &ConfigEntry,
        ) -> HandlerResult<bool> {
            Ok(true)
        }
    }

    fn manager_with_handler() -> (TempDir, ConfigEntries, Arc<CountingHandler>) {
        let dir = TempDir::new().unwrap();
        let manager = ConfigEntries::new(dir.path());
        let handler = Arc::new(CountingHandler::default());
        manager.register_handler("advanced_ui_cards", handler.clone());
        (dir, manager, handler)
    }

    #[tokio::test]
    async fn test_import_creates_and_sets_up_entry() {
        let (_dir, manager, handler) = manager_with_handler();

        let result = manager
            .flow_init_import("advanced_ui_cards", json!({"replacer": []}))
            .await
            .unwrap();

        let entry_id = result.entry_id().unwrap();
        let entry = manager.get(entry_id).unwrap();
        assert_eq!(entry.title, "UI Lovelace");
        assert_eq!(entry.source, ConfigEntrySource::Import);
        assert_eq!(entry.unique_id.as_deref(), Some("advanced_ui_cards"));
        assert_eq!(entry.data.get("replacer"), Some(&json!([])));
        assert_eq!(entry.state, ConfigEntryState::Loaded);
        assert_eq!(handler.setups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_import_aborts_and_updates_data() {
        let (_dir, manager, handler) = manager_with_handler();

        manager
            .flow_init_import("advanced_ui_cards", json!({"replacer": []}))
            .await
            .unwrap();
        let result = manager
            .flow_init_import(
                "advanced_ui_cards",
                json!({"replacer": [{"brand": "x", "image": "/x.svg"}]}),
            )
            .await
            .unwrap();

        match result {
            FlowResult::Abort { reason, .. } => assert_eq!(reason, ABORT_ALREADY_CONFIGURED),
            other => panic!("expected abort, got {:?}", other),
        }
        assert_eq!(manager.len(), 1);
        assert_eq!(handler.setups.load(Ordering::SeqCst), 1);

        let entry = manager
            .get_by_unique_id("advanced_ui_cards", "advanced_ui_cards")
            .unwrap();
        assert_eq!(entry.data["replacer"][0]["brand"], "x");
    }

    #[tokio::test]
    async fn test_import_null_data_is_empty() {
        let (_dir, manager, _handler) = manager_with_handler();

        let result = manager
            .flow_init_import("advanced_ui_cards", serde_json::Value::Null)
            .await
            .unwrap();
        let entry = manager.get(result.entry_id().unwrap()).unwrap();
        assert!(entry.data.is_empty());
    }

    #[tokio::test]
    async fn test_import_rejects_non_mapping() {
        let (_dir, manager, _handler) = manager_with_handler();

        let result = manager
            .flow_init_import("advanced_ui_cards", json!([1, 2]))
            .await;
        assert!(matches!(result, Err(ConfigEntriesError::InvalidData(_))));
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_import_without_handler() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigEntries::new(dir.path());

        let result = manager.flow_init_import("lovelace_cards", json!({})).await;
        assert!(matches!(result, Err(ConfigEntriesError::NoHandler(_))));
    }

    #[test]
    fn test_flow_result_serialization() {
        let result = FlowResult::Abort {
            flow_id: "01H".to_string(),
            handler: "lovelace_cards".to_string(),
            reason: ABORT_ALREADY_CONFIGURED.to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "abort");
        assert_eq!(json["reason"], "already_configured");
        assert!(result.is_abort());
    }
}
