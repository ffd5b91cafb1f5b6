//! Admin tool configuration, read from an optional TOML file.
//!
//! ```toml
//! data_dir = "/var/lib/modstore"
//! cleanup_interval = 10
//! listen = "127.0.0.1:4010"
//!
//! [index.flags]
//! muted = "/flags/muted"
//!
//! [index.timestamps]
//! last_seen = "/seen/at"
//! ```

use crate::AdminResult;
use modstore_index::{IndexConfig, PathExtractor};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Root of the file store.
    pub data_dir: PathBuf,
    /// Entities processed between idle-record cleanups during a scan.
    pub cleanup_interval: usize,
    /// Address `serve` binds to.
    pub listen: String,
    pub index: IndexPaths,
}

/// Summary fields the index extracts, as name → JSON pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexPaths {
    pub flags: BTreeMap<String, String>,
    pub timestamps: BTreeMap<String, String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("modstore-data"),
            cleanup_interval: IndexConfig::default().cleanup_interval,
            listen: "127.0.0.1:4010".to_string(),
            index: IndexPaths::default(),
        }
    }
}

impl AdminConfig {
    /// Reads `path`, or returns the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> AdminResult<Self> {
        match path {
            Some(path) => Self::parse(&fs::read_to_string(path)?),
            None => Ok(Self::default()),
        }
    }

    pub fn parse(text: &str) -> AdminResult<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn index_config(&self) -> IndexConfig {
        IndexConfig {
            cleanup_interval: self.cleanup_interval,
            ..IndexConfig::default()
        }
    }

    pub fn extractor(&self) -> PathExtractor {
        let extractor = self
            .index
            .flags
            .iter()
            .fold(PathExtractor::new(), |e, (name, path)| e.flag(name, path));
        self.index
            .timestamps
            .iter()
            .fold(extractor, |e, (name, path)| e.timestamp(name, path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        assert_eq!(AdminConfig::parse("").unwrap(), AdminConfig::default());
    }

    #[test]
    fn parses_index_tables() {
        let config = AdminConfig::parse(
            r#"
            data_dir = "/tmp/store"
            cleanup_interval = 3

            [index.flags]
            muted = "/flags/muted"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/store"));
        assert_eq!(config.index_config().cleanup_interval, 3);
        assert_eq!(config.index.flags["muted"], "/flags/muted");
        assert_eq!(config.listen, "127.0.0.1:4010");
    }

    #[test]
    fn rejects_bad_types() {
        assert!(AdminConfig::parse("cleanup_interval = \"ten\"").is_err());
    }
}
