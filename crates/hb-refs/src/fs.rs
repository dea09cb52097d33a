//! File-per-reference store.
//!
//! Each reference is one JSON file named after its normalized name. Writes
//! go to a temporary file in the same directory which is then renamed over
//! the target, so readers see either the old or the new document.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::Result;
use crate::names::normalize_name;
use crate::traits::ReferenceRepository;

/// A [`ReferenceRepository`] backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FsRefStore {
    dir: PathBuf,
}

impl FsRefStore {
    /// Open (creating if needed) the reference directory `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf> {
        Ok(self.dir.join(normalize_name(name)?))
    }
}

impl ReferenceRepository for FsRefStore {
    fn get(&self, name: &str) -> Result<Option<Value>> {
        let path = self.path_for(name)?;
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn put(&self, name: &str, value: Option<&Value>) -> Result<()> {
        let path = self.path_for(name)?;
        match value {
            Some(value) => {
                let mut tmp = NamedTempFile::new_in(&self.dir)?;
                tmp.write_all(&serde_json::to_vec_pretty(value)?)?;
                tmp.as_file().sync_all()?;
                tmp.persist(&path).map_err(|e| e.error)?;
                debug!(path = %path.display(), "wrote ref");
            }
            None => match fs::remove_file(&path) {
                Ok(()) => debug!(path = %path.display(), "deleted ref"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // Temp files from in-flight writes start with '.'.
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
