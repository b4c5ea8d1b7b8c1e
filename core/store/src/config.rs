// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::collection::Collection;
use crate::memory::MemoryCollection;

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default)]
    pub kind: StoreKind,

    /// Name of the collection holding the documents
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::default(),
            collection: default_collection(),
        }
    }
}

fn default_collection() -> String {
    "blog".to_string()
}

impl StoreConfig {
    /// Open the configured collection
    pub fn build(&self) -> Arc<dyn Collection> {
        match self.kind {
            StoreKind::Memory => {
                tracing::info!(collection = %self.collection, "using in-memory collection");
                Arc::new(MemoryCollection::new(self.collection.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_yaml() {
        let config: StoreConfig = serde_yaml::from_str("kind: memory").unwrap();
        assert_eq!(config, StoreConfig::default());

        let config: StoreConfig = serde_yaml::from_str("collection: posts").unwrap();
        assert_eq!(config.collection, "posts");
        assert_eq!(config.build().name(), "posts");

        assert!(serde_yaml::from_str::<StoreConfig>("kind: mongo").is_err());
    }
}
