//! The [`ReferenceRepository`] trait defining the reference storage interface.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::Result;

/// Storage backend for named references.
///
/// Implementations must be thread-safe (`Send + Sync`). Every name passes
/// through [`normalize_name`](crate::names::normalize_name) before it touches
/// storage, and a single `put` is atomic. There are no transactions across
/// names.
pub trait ReferenceRepository: Send + Sync {
    /// Read a reference. Returns `Ok(None)` if it does not exist.
    fn get(&self, name: &str) -> Result<Option<Value>>;

    /// Write a reference, or delete it when `value` is `None`.
    fn put(&self, name: &str, value: Option<&Value>) -> Result<()>;

    /// All stored reference names, normalized and sorted.
    fn list(&self) -> Result<Vec<String>>;
}

/// Typed access on top of the JSON values.
pub trait ReferenceRepositoryExt: ReferenceRepository {
    /// Read and deserialize a reference.
    fn get_typed<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.get(name)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serialize and write a reference.
    fn put_typed<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.put(name, Some(&value))
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.put(name, None)
    }

    /// Names starting with `prefix`, with the prefix removed.
    fn list_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .list()?
            .into_iter()
            .filter_map(|name| name.strip_prefix(prefix).map(str::to_string))
            .collect())
    }
}

impl<R: ReferenceRepository + ?Sized> ReferenceRepositoryExt for R {}
