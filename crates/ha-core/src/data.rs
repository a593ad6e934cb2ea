//! Per-domain shared data
//!
//! Integrations keep their runtime record here, keyed by domain. Records are
//! JSON objects so they can be inspected and logged without knowing the
//! integration's types.

use dashmap::DashMap;
use serde_json::Value;
use tracing::debug;

/// A domain record
pub type Record = serde_json::Map<String, Value>;

/// Registry of domain records
#[derive(Debug, Default)]
pub struct DataRegistry {
    records: DashMap<String, Record>,
}

impl DataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or replace the record for `domain`
    pub fn set(&self, domain: &str, record: Record) {
        debug!("Storing data for {}", domain);
        self.records.insert(domain.to_string(), record);
    }

    pub fn get(&self, domain: &str) -> Option<Record> {
        self.records.get(domain).map(|r| r.value().clone())
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.records.contains_key(domain)
    }

    pub fn remove(&self, domain: &str) -> Option<Record> {
        debug!("Removing data for {}", domain);
        self.records.remove(domain).map(|(_, record)| record)
    }

    /// Overlay the stored record on top of `base` and store the result
    ///
    /// Keys already stored for `domain` win over keys in `base`.
    pub fn merge_under(&self, domain: &str, base: Record) -> Record {
        let mut entry = self.records.entry(domain.to_string()).or_default();
        let mut merged = base;
        for (key, value) in entry.iter() {
            merged.insert(key.clone(), value.clone());
        }
        *entry = merged.clone();
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_set_get_remove() {
        let data = DataRegistry::new();
        assert!(!data.contains("lovelace_cards"));

        data.set("lovelace_cards", record(json!({"name": "Dashboard UI Cards"})));
        assert!(data.contains("lovelace_cards"));
        assert_eq!(data.get("lovelace_cards").unwrap()["name"], "Dashboard UI Cards");

        let removed = data.remove("lovelace_cards").unwrap();
        assert_eq!(removed["name"], "Dashboard UI Cards");
        assert!(data.get("lovelace_cards").is_none());
        assert!(data.remove("lovelace_cards").is_none());
    }

    #[test]
    fn test_merge_under_stored_keys_win() {
        let data = DataRegistry::new();
        data.set("cards", record(json!({"name": "Custom", "replacer": []})));

        let merged = data.merge_under("cards", record(json!({"name": "UI Lovelace"})));

        assert_eq!(merged, record(json!({"name": "Custom", "replacer": []})));
        assert_eq!(data.get("cards").unwrap(), merged);
    }

    #[test]
    fn test_merge_under_missing_domain() {
        let data = DataRegistry::new();
        let merged = data.merge_under("cards", record(json!({"name": "UI Lovelace"})));

        assert_eq!(merged, record(json!({"name": "UI Lovelace"})));
        assert!(data.contains("cards"));
    }
}
