//! Naming-override store
//!
//! Holds user-chosen display names for lights whose resource cannot be
//! renamed on the peer. The store is injected wherever names are resolved.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NameStoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("name store lock poisoned")]
    Poisoned,
}

/// Persisted `uri -> name` overrides
pub trait NameStore: Send + Sync {
    fn has_uri(&self, uri: &str) -> bool;

    fn name_for_uri(&self, uri: &str) -> Option<String>;

    fn set_name_for_uri(&self, uri: &str, name: &str) -> Result<(), NameStoreError>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryNameStore {
    names: RwLock<BTreeMap<String, String>>,
}

impl MemoryNameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NameStore for MemoryNameStore {
    fn has_uri(&self, uri: &str) -> bool {
        self.names
            .read()
            .map(|names| names.contains_key(uri))
            .unwrap_or(false)
    }

    fn name_for_uri(&self, uri: &str) -> Option<String> {
        self.names.read().ok()?.get(uri).cloned()
    }

    fn set_name_for_uri(&self, uri: &str, name: &str) -> Result<(), NameStoreError> {
        let mut names = self.names.write().map_err(|_| NameStoreError::Poisoned)?;
        names.insert(uri.to_string(), name.to_string());
        Ok(())
    }
}

/// Store backed by a JSON object on disk, rewritten on every change
#[derive(Debug)]
pub struct FileNameStore {
    path: PathBuf,
    names: RwLock<BTreeMap<String, String>>,
}

impl FileNameStore {
    /// Open the store, starting empty when the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self, NameStoreError> {
        let path = path.as_ref().to_path_buf();
        let names = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path,
            names: RwLock::new(names),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self, names: &BTreeMap<String, String>) -> Result<(), NameStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(names)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl NameStore for FileNameStore {
    fn has_uri(&self, uri: &str) -> bool {
        self.names
            .read()
            .map(|names| names.contains_key(uri))
            .unwrap_or(false)
    }

    fn name_for_uri(&self, uri: &str) -> Option<String> {
        self.names.read().ok()?.get(uri).cloned()
    }

    fn set_name_for_uri(&self, uri: &str, name: &str) -> Result<(), NameStoreError> {
        let mut names = self.names.write().map_err(|_| NameStoreError::Poisoned)?;
        names.insert(uri.to_string(), name.to_string());
        self.save(&names)
    }
}
