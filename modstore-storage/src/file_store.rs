//! JSON-file backing store.
//!
//! Layout under the root directory:
//!
//! ```text
//! users/<uuid>.json
//! worlds/<uuid>.json
//! general.json
//! aggregate/<name>.json
//! ```

use crate::{BackingStore, DocumentKey, StorageError, StorageResult};
use modstore_model::Document;
use modstore_types::EntityKey;
use serde_json::Value;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const USERS_DIR: &str = "users";
const WORLDS_DIR: &str = "worlds";
const AGGREGATE_DIR: &str = "aggregate";
const GENERAL_FILE: &str = "general.json";
const EXTENSION: &str = "json";

/// Stores each document as a JSON file under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (or creates) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        for dir in [USERS_DIR, WORLDS_DIR, AGGREGATE_DIR] {
            fs::create_dir_all(root.join(dir))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the file backing `key`.
    pub fn path_for(&self, key: &DocumentKey) -> StorageResult<PathBuf> {
        let path = match key {
            DocumentKey::Entity(EntityKey::User(id)) => {
                self.root.join(USERS_DIR).join(format!("{id}.{EXTENSION}"))
            }
            DocumentKey::Entity(EntityKey::World(id)) => {
                self.root.join(WORLDS_DIR).join(format!("{id}.{EXTENSION}"))
            }
            DocumentKey::Entity(EntityKey::General) => self.root.join(GENERAL_FILE),
            DocumentKey::Aggregate(name) => {
                if !is_valid_aggregate_name(name) {
                    return Err(StorageError::Unavailable(format!(
                        "invalid aggregate name '{name}'"
                    )));
                }
                self.root.join(AGGREGATE_DIR).join(format!("{name}.{EXTENSION}"))
            }
        };
        Ok(path)
    }

    fn list_dir(&self, dir: &str, make: fn(Uuid) -> EntityKey) -> StorageResult<Vec<EntityKey>> {
        let mut keys = Vec::new();
        let entries = match fs::read_dir(self.root.join(dir)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            let parsed = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| Uuid::parse_str(s).ok());
            match parsed {
                Some(id) => keys.push(make(id)),
                None => warn!(path = %path.display(), "Skipping file with non-UUID name"),
            }
        }
        Ok(keys)
    }
}

impl BackingStore for FileStore {
    fn load_document(&self, key: &DocumentKey) -> StorageResult<Document> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(key = %key, "No stored document, handing out virtual");
                return Ok(Document::new_virtual());
            }
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Document::new_virtual());
        }
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| StorageError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Document::from_value(value).map_err(|e| StorageError::Malformed {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn save_document(&self, key: &DocumentKey, document: &Document) -> StorageResult<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(document.as_value())?;
        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn contains(&self, key: &DocumentKey) -> StorageResult<bool> {
        Ok(self.path_for(key)?.try_exists()?)
    }

    fn list_entities(&self) -> StorageResult<Vec<EntityKey>> {
        let mut keys = self.list_dir(USERS_DIR, EntityKey::User)?;
        keys.extend(self.list_dir(WORLDS_DIR, EntityKey::World)?);
        if self.root.join(GENERAL_FILE).try_exists()? {
            keys.push(EntityKey::General);
        }
        keys.sort();
        Ok(keys)
    }
}

fn is_valid_aggregate_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
