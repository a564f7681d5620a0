//! Configuration
//!
//! `config.toml` with every field optional. A missing file means defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ConfigError;
use crate::gate::GateConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    FlatFile,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    pub kind: StorageKind,
    /// File stem of the flat file or sqlite database
    pub database: String,
    /// Prepended to every sqlite table name
    pub table_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::FlatFile,
            database: "brewery-data".to_string(),
            table_prefix: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    /// Legacy brews untouched for longer than this are dropped on import
    pub retention_days: u32,
    pub gate_attempts: u32,
    pub gate_backoff_ms: u64,
}

impl Default for LegacyConfig {
    fn default() -> Self {
        Self {
            retention_days: 120,
            gate_attempts: 60,
            gate_backoff_ms: 1000,
        }
    }
}

/// A world the host has loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldConfig {
    pub id: Uuid,
    pub name: String,
    /// Legacy key of a `DXL_` dungeon world, when it differs from its name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dxl_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreweryConfig {
    pub data_dir: PathBuf,
    pub storage: StorageConfig,
    pub new_barrel_type_algorithm: bool,
    /// 0 turns periodic saving off
    pub autosave_minutes: u64,
    pub legacy: LegacyConfig,
    pub worlds: Vec<WorldConfig>,
}

impl Default for BreweryConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            storage: StorageConfig::default(),
            new_barrel_type_algorithm: true,
            autosave_minutes: 3,
            legacy: LegacyConfig::default(),
            worlds: Vec::new(),
        }
    }
}

impl BreweryConfig {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        info!(
            "Loaded config from {:?} ({:?} storage, data dir {:?})",
            path, config.storage.kind, config.data_dir
        );
        Ok(config)
    }

    /// `<data_dir>/<database>.toml` or `.db` depending on the backend
    pub fn storage_path(&self) -> PathBuf {
        let extension = match self.storage.kind {
            StorageKind::FlatFile => "toml",
            StorageKind::Sqlite => "db",
        };
        self.data_dir
            .join(format!("{}.{}", self.storage.database, extension))
    }

    pub fn autosave_interval(&self) -> Option<Duration> {
        (self.autosave_minutes > 0).then(|| Duration::from_secs(self.autosave_minutes * 60))
    }

    pub fn gate_config(&self) -> GateConfig {
        GateConfig {
            attempts: self.legacy.gate_attempts,
            backoff: Duration::from_millis(self.legacy.gate_backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = BreweryConfig::load(&temp_dir.path().join("config.toml")).unwrap();
        assert_eq!(config, BreweryConfig::default());
        assert_eq!(config.storage_path(), PathBuf::from("./brewery-data.toml"));
        assert_eq!(config.autosave_interval(), Some(Duration::from_secs(180)));
        assert_eq!(config.gate_config(), GateConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            data_dir = "/srv/brewery"
            autosave_minutes = 0
            new_barrel_type_algorithm = false

            [storage]
            type = "sqlite"
            table_prefix = "brew_"

            [legacy]
            retention_days = 30

            [[worlds]]
            id = "5f2b7c1e-0d5b-4d7e-9b83-2a7c7a1e9d10"
            name = "world"
            "#,
        )
        .unwrap();

        let config = BreweryConfig::load(&path).unwrap();
        assert_eq!(config.storage.kind, StorageKind::Sqlite);
        assert_eq!(config.storage.database, "brewery-data");
        assert_eq!(config.storage.table_prefix, "brew_");
        assert_eq!(config.storage_path(), PathBuf::from("/srv/brewery/brewery-data.db"));
        assert_eq!(config.autosave_interval(), None);
        assert!(!config.new_barrel_type_algorithm);
        assert_eq!(config.legacy.retention_days, 30);
        assert_eq!(config.legacy.gate_attempts, 60);
        assert_eq!(config.worlds.len(), 1);
        assert_eq!(config.worlds[0].name, "world");
        assert_eq!(config.worlds[0].dxl_key, None);
    }

    #[test]
    fn test_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[storage]\ntype = \"mongodb\"\n").unwrap();
        assert!(matches!(BreweryConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
