use crate::error::{EnsembleError, Result};
use serde::Serialize;
use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::Path,
};
use tracing::warn;

/// A separation model the backend can load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    /// Display key callers select the model by.
    pub key: String,
    /// Model file handed to the backend.
    pub file_name: String,
    pub category: String,
}

/// Flat `key -> model` lookup built once from a category tree
/// (`{ "Category": { "Display key": "model_file.ckpt" } }`).
#[derive(Clone, Debug, Default)]
pub struct ModelRegistry {
    entries: HashMap<String, ModelEntry>,
    categories: BTreeMap<String, Vec<String>>,
}

const REGISTRY_JSON: &str = include_str!("../../models/registry.json");

impl ModelRegistry {
    pub fn embedded() -> Result<Self> {
        Self::from_json(REGISTRY_JSON)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            EnsembleError::Registry(format!("cannot read registry {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let tree: BTreeMap<String, BTreeMap<String, String>> = serde_json::from_str(json)
            .map_err(|e| EnsembleError::Registry(format!("malformed registry: {e}")))?;

        let mut registry = ModelRegistry::default();
        for (category, models) in tree {
            let mut keys = Vec::with_capacity(models.len());
            for (key, file_name) in models {
                if let Some(existing) = registry.entries.get(&key) {
                    warn!(
                        "Model `{}` listed in both `{}` and `{}`; keeping `{}`",
                        key, existing.category, category, existing.category
                    );
                    continue;
                }
                keys.push(key.clone());
                registry.entries.insert(
                    key.clone(),
                    ModelEntry {
                        key,
                        file_name,
                        category: category.clone(),
                    },
                );
            }
            registry.categories.insert(category, keys);
        }
        Ok(registry)
    }

    pub fn resolve(&self, key: &str) -> Result<&ModelEntry> {
        self.entries
            .get(key)
            .ok_or_else(|| EnsembleError::UnknownModel {
                model: key.to_string(),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Models in `category`, sorted by key.
    pub fn models_in(&self, category: &str) -> Vec<&ModelEntry> {
        self.categories
            .get(category)
            .map(|keys| keys.iter().filter_map(|k| self.entries.get(k)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
