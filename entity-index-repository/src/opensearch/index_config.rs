//! OpenSearch index configuration and mappings.
//!
//! This module defines the index settings and mappings for the entity index.

use serde_json::{json, Value};

/// The default name of the search index.
pub const DEFAULT_INDEX_NAME: &str = "entities";

/// Index name and shard layout.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Name of the index documents are written to.
    pub name: String,
    /// Number of primary shards.
    pub number_of_shards: u32,
    /// Number of replicas per shard.
    pub number_of_replicas: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_NAME)
    }
}

impl IndexConfig {
    /// Create a config for the named index with a single shard and replica.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            number_of_shards: 1,
            number_of_replicas: 1,
        }
    }

    /// Get the index settings and mappings.
    ///
    /// The configuration includes:
    /// - **Keyword fields**: identity and type, for filtering and exact lookups
    /// - **version**: the external version stamp of the indexed entity
    /// - **fields**: the entity's property map, mapped dynamically
    pub fn settings(&self) -> Value {
        json!({
            "settings": {
                "number_of_shards": self.number_of_shards,
                "number_of_replicas": self.number_of_replicas
            },
            "mappings": {
                "properties": {
                    "entity_id": {
                        "type": "keyword"
                    },
                    "entity_type": {
                        "type": "keyword"
                    },
                    "version": {
                        "type": "long"
                    },
                    "fields": {
                        "type": "object",
                        "dynamic": true
                    },
                    "indexed_at": {
                        "type": "date"
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_settings_structure() {
        let settings = IndexConfig::default().settings();

        assert_eq!(settings["settings"]["number_of_shards"], 1);
        assert_eq!(settings["settings"]["number_of_replicas"], 1);

        assert_eq!(
            settings["mappings"]["properties"]["entity_id"]["type"],
            "keyword"
        );
        assert_eq!(
            settings["mappings"]["properties"]["entity_type"]["type"],
            "keyword"
        );
        assert_eq!(settings["mappings"]["properties"]["version"]["type"], "long");
        assert!(settings["mappings"]["properties"]["fields"].is_object());
    }

    #[test]
    fn test_index_name() {
        assert_eq!(IndexConfig::default().name, "entities");
        assert_eq!(IndexConfig::new("widgets").name, "widgets");
    }
}
