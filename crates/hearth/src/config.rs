//! Store configuration.

use std::fs;
use std::path::{Path, PathBuf};

use hearth_archive::{ReaderConfig, WriterConfig};
use hearth_recovery::RecoveryConfig;
use serde::{Deserialize, Serialize};

use crate::error::{HearthError, Result};

/// Configuration for a [`HomeStore`](crate::HomeStore).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub writer: WriterConfig,
    pub reader: ReaderConfig,
    pub recovery: RecoveryConfig,
    /// Where saves are staged. Defaults to the system temporary directory.
    pub temp_dir: Option<PathBuf>,
}

impl StoreConfig {
    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|source| HearthError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_writer(mut self, writer: WriterConfig) -> Self {
        self.writer = writer;
        self
    }

    pub fn with_reader(mut self, reader: ReaderConfig) -> Self {
        self.reader = reader;
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_archive::{CodecKind, ContentPolicy};

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hearth.json");
        fs::write(
            &path,
            r#"{
                "writer": { "codec": "xml", "compression_level": 9 },
                "reader": { "copy_source": false },
                "recovery": { "directory": "/var/lib/hearth/recovery" }
            }"#,
        )
        .unwrap();

        let config = StoreConfig::from_json_file(&path).unwrap();
        assert_eq!(config.writer.codec, CodecKind::Xml);
        assert_eq!(config.writer.compression_level, 9);
        assert_eq!(config.writer.content_policy, ContentPolicy::All);
        assert!(!config.reader.copy_source);
        assert_eq!(config.recovery.directory, PathBuf::from("/var/lib/hearth/recovery"));
        assert_eq!(config.temp_dir, None);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ writer: ").unwrap();
        assert!(matches!(
            StoreConfig::from_json_file(&path),
            Err(HearthError::Config { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            StoreConfig::from_json_file(&dir.path().join("none.json")),
            Err(HearthError::Io(_))
        ));
    }
}
