use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::FileDescriptor;
use crate::hash::ContentHash;

/// Well-known source tags.
pub mod tags {
    /// The source accepts bytes but its commit pointer is never moved by a pull.
    pub const READONLY: &str = "readonly";
    /// The source is picked up by secondary indexers.
    pub const INDEXED: &str = "indexed";
}

/// Mutable pointer record of one source (a named backup target).
///
/// The transaction fields are only populated while a transaction is open.
/// `readonly` is the legacy spelling of the `readonly` tag and is kept equal
/// to it by [`SourceState::set_tag`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceState {
    pub id: String,
    #[serde(default)]
    pub current_transaction_id: Option<String>,
    #[serde(default)]
    pub current_transaction_content: Option<BTreeMap<String, FileDescriptor>>,
    #[serde(default)]
    pub current_commit_sha: Option<ContentHash>,
    #[serde(default)]
    pub tags: BTreeMap<String, bool>,
    #[serde(default)]
    pub readonly: bool,
}

impl SourceState {
    /// A fresh state with no transaction, no commit and no tags.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn has_open_transaction(&self) -> bool {
        self.current_transaction_id.is_some()
    }

    /// Returns `true` if the transaction id matches the open transaction.
    pub fn is_current_transaction(&self, tx: &str) -> bool {
        self.current_transaction_id.as_deref() == Some(tx)
    }

    pub fn tag(&self, name: &str) -> bool {
        self.tags.get(name).copied().unwrap_or(false)
    }

    /// Set a tag, mirroring `readonly` into the legacy field.
    pub fn set_tag(&mut self, name: &str, value: bool) {
        self.tags.insert(name.to_string(), value);
        if name == tags::READONLY {
            self.readonly = value;
        }
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly || self.tag(tags::READONLY)
    }

    /// Open a transaction with an empty entry set.
    pub fn open_transaction(&mut self, tx: impl Into<String>) {
        self.current_transaction_id = Some(tx.into());
        self.current_transaction_content = Some(BTreeMap::new());
    }

    /// Drop the transaction and return its entries.
    pub fn close_transaction(&mut self) -> BTreeMap<String, FileDescriptor> {
        self.current_transaction_id = None;
        self.current_transaction_content.take().unwrap_or_default()
    }
}
