//! In-memory reference store for testing and ephemeral use.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde_json::Value;

use crate::error::{RefError, Result};
use crate::names::normalize_name;
use crate::traits::ReferenceRepository;

/// An in-memory implementation of [`ReferenceRepository`].
///
/// Data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryRefStore {
    refs: RwLock<BTreeMap<String, Value>>,
}

impl InMemoryRefStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferenceRepository for InMemoryRefStore {
    fn get(&self, name: &str) -> Result<Option<Value>> {
        let key = normalize_name(name)?;
        let refs = self
            .refs
            .read()
            .map_err(|e| RefError::Serialization(format!("lock poisoned: {e}")))?;
        Ok(refs.get(&key).cloned())
    }

    fn put(&self, name: &str, value: Option<&Value>) -> Result<()> {
        let key = normalize_name(name)?;
        let mut refs = self
            .refs
            .write()
            .map_err(|e| RefError::Serialization(format!("lock poisoned: {e}")))?;
        match value {
            Some(v) => {
                refs.insert(key, v.clone());
            }
            None => {
                refs.remove(&key);
            }
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let refs = self
            .refs
            .read()
            .map_err(|e| RefError::Serialization(format!("lock poisoned: {e}")))?;
        Ok(refs.keys().cloned().collect())
    }
}
