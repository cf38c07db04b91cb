//! Recovery configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Minimum delay between two snapshot rounds, whatever the interval.
pub const MIN_COOLDOWN: Duration = Duration::from_secs(30);

/// Configuration for auto-recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Folder holding recovery files.
    pub directory: PathBuf,
    /// Timer period. Zero disables auto-recovery.
    pub interval: Duration,
    /// Minimum delay since the last completed snapshot round.
    pub min_cooldown: Duration,
    /// Deflate level of recovery archives.
    pub compression_level: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir().join("hearth").join("recovery"),
            interval: Duration::from_secs(600),
            min_cooldown: MIN_COOLDOWN,
            compression_level: 0,
        }
    }
}

impl RecoveryConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_min_cooldown(mut self, cooldown: Duration) -> Self {
        self.min_cooldown = cooldown;
        self
    }

    pub fn with_compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero()
    }
}
