//! Flat-file backend
//!
//! One TOML document holds every table as a top-level table keyed by entity
//! id. The document is kept in memory and rewritten after each change.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::Storage;
use super::entities::Persisted;
use crate::error::StorageError;
use crate::ingredient::KindRegistry;

pub struct FlatFileStorage {
    path: PathBuf,
    document: Mutex<toml::Table>,
    registry: KindRegistry,
}

impl FlatFileStorage {
    /// Open or create the document at `path`.
    ///
    /// A new file is written immediately so an unwritable location fails
    /// here instead of on the first save.
    pub async fn open(path: &Path) -> Result<Self, StorageError> {
        let document = if tokio::fs::try_exists(path).await? {
            let content = tokio::fs::read_to_string(path).await?;
            toml::from_str::<toml::Table>(&content)?
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            toml::Table::new()
        };

        let storage = Self {
            path: path.to_path_buf(),
            document: Mutex::new(document),
            registry: KindRegistry::with_builtin(),
        };
        storage.flush(&*storage.document.lock().await).await?;
        debug!("Opened flat-file storage at {:?}", path);
        Ok(storage)
    }

    /// Decode ingredient records with `registry` instead of the builtin kinds
    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write through a temporary file so a crash never leaves half a document.
    async fn flush(&self, document: &toml::Table) -> Result<(), StorageError> {
        let content = toml::to_string(document)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn encode<T: Persisted>(table: &str, entity: &T) -> Result<toml::Value, StorageError> {
        toml::Value::try_from(entity).map_err(|e| StorageError::MalformedRecord {
            table: table.to_string(),
            id: entity.id(),
            reason: e.to_string(),
        })
    }

    fn decode<T: Persisted>(&self, table: &str, id: &str, value: &toml::Value) -> Result<T, StorageError> {
        serde_json::to_value(value)
            .map_err(|e| e.to_string())
            .and_then(|row| T::from_row(row, &self.registry))
            .map_err(|reason| StorageError::MalformedRecord {
                table: table.to_string(),
                id: id.to_string(),
                reason,
            })
    }
}

fn section<'a>(document: &'a toml::Table, table: &str) -> Option<&'a toml::Table> {
    document.get(table).and_then(toml::Value::as_table)
}

fn section_mut<'a>(document: &'a mut toml::Table, table: &str) -> &'a mut toml::Table {
    let entry = document
        .entry(table.to_string())
        .or_insert_with(|| toml::Value::Table(toml::Table::new()));
    if !entry.is_table() {
        warn!("Replacing non-table value at '{}' in flat-file storage", table);
        *entry = toml::Value::Table(toml::Table::new());
    }
    match entry {
        toml::Value::Table(t) => t,
        _ => unreachable!("entry was just made a table"),
    }
}

impl Storage for FlatFileStorage {
    async fn create_table(&self, name: &str, _max_id_len: usize) -> Result<(), StorageError> {
        let mut document = self.document.lock().await;
        if section(&document, name).is_some() {
            return Ok(());
        }
        section_mut(&mut document, name);
        self.flush(&document).await
    }

    async fn drop_table(&self, name: &str) -> Result<(), StorageError> {
        let mut document = self.document.lock().await;
        if document.remove(name).is_some() {
            self.flush(&document).await?;
        }
        Ok(())
    }

    async fn get_generic<T: Persisted>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<Option<T>, StorageError> {
        let document = self.document.lock().await;
        match section(&document, table).and_then(|s| s.get(id)) {
            Some(value) => self.decode(table, id, value).map(Some),
            None => Ok(None),
        }
    }

    async fn get_all_generic<T: Persisted>(&self, table: &str) -> Result<Vec<T>, StorageError> {
        let document = self.document.lock().await;
        let Some(entries) = section(&document, table) else {
            return Ok(Vec::new());
        };

        let mut loaded = Vec::with_capacity(entries.len());
        for (id, value) in entries {
            match self.decode(table, id, value) {
                Ok(entity) => loaded.push(entity),
                Err(e) => warn!("Skipping entry: {}", e),
            }
        }
        Ok(loaded)
    }

    async fn save_generic<T: Persisted>(&self, table: &str, entity: &T) -> Result<(), StorageError> {
        let value = Self::encode(table, entity)?;
        let mut document = self.document.lock().await;
        section_mut(&mut document, table).insert(entity.id(), value);
        self.flush(&document).await
    }

    async fn save_all_generic<T: Persisted>(
        &self,
        table: &str,
        entities: &[T],
    ) -> Result<(), StorageError> {
        let mut replacement = toml::Table::new();
        for entity in entities {
            replacement.insert(entity.id(), Self::encode(table, entity)?);
        }

        let mut document = self.document.lock().await;
        *section_mut(&mut document, table) = replacement;
        self.flush(&document).await
    }

    async fn delete_generic(&self, table: &str, id: &str) -> Result<(), StorageError> {
        let mut document = self.document.lock().await;
        let removed = document
            .get_mut(table)
            .and_then(toml::Value::as_table_mut)
            .and_then(|s| s.remove(id))
            .is_some();
        if removed {
            self.flush(&document).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingredient::{IngredientCollection, IngredientKind, PluginItem, SimpleItem};
    use crate::storage::entities::{Barrel, BlockPos, BoundingBox, BreweryPlayer, MiscData};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn player(quality: i32) -> BreweryPlayer {
        BreweryPlayer {
            id: Uuid::new_v4(),
            quality,
            drunkenness: quality * 2,
            offline_drunkenness: 0,
        }
    }

    #[tokio::test]
    async fn test_barrel_contents_use_registry() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.toml");

        let mut contents = IngredientCollection::with_cooked_time(6);
        contents.add_with_amount(IngredientKind::Simple(SimpleItem::new("WHEAT")), 2);
        contents.add_with_amount(IngredientKind::Plugin(PluginItem::new("slimefun", "HOPS")), 1);
        let barrel = Barrel {
            id: Uuid::new_v4(),
            spigot: BlockPos::new(Uuid::new_v4(), 0, 64, 0),
            bounds: BoundingBox::from_points(&[0, 64, 0, 2, 66, 2]),
            wood: Default::default(),
            time: 1.5,
            sign_offset: 0,
            contents: contents.clone(),
        };
        {
            let storage = FlatFileStorage::open(&path).await.unwrap();
            storage.save_generic("barrels", &barrel).await.unwrap();
        }

        let storage = FlatFileStorage::open(&path).await.unwrap();
        let loaded: Barrel = storage.get_generic("barrels", &barrel.id()).await.unwrap().unwrap();
        assert_eq!(loaded, barrel);

        // Without the plugin kind only the entries before it survive
        let mut registry = KindRegistry::with_builtin();
        registry.unregister("PI");
        let storage = FlatFileStorage::open(&path).await.unwrap().with_registry(registry);
        let loaded: Barrel = storage.get_generic("barrels", &barrel.id()).await.unwrap().unwrap();
        assert_eq!(loaded.contents.cooked_time, 6);
        assert_eq!(loaded.contents.ingredients_count(), 2);
        assert_eq!(loaded.time, 1.5);
    }

    #[tokio::test]
    async fn test_save_and_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.toml");
        let p = player(7);

        {
            let storage = FlatFileStorage::open(&path).await.unwrap();
            storage.create_table("players", 36).await.unwrap();
            storage.save_generic("players", &p).await.unwrap();
            storage.save_generic("misc", &MiscData::new(42)).await.unwrap();
        }

        let storage = FlatFileStorage::open(&path).await.unwrap();
        let loaded: Option<BreweryPlayer> =
            storage.get_generic("players", &p.id.to_string()).await.unwrap();
        assert_eq!(loaded, Some(p));
        let misc: Option<MiscData> = storage.get_generic("misc", "misc").await.unwrap();
        assert_eq!(misc.unwrap().install_time, 42);
    }

    #[tokio::test]
    async fn test_save_all_replaces_section() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FlatFileStorage::open(&temp_dir.path().join("data.toml"))
            .await
            .unwrap();

        let old = vec![player(1), player(2), player(3)];
        storage.save_all_generic("players", &old).await.unwrap();

        let new = vec![old[1].clone(), player(9)];
        storage.save_all_generic("players", &new).await.unwrap();

        let mut ids: Vec<Uuid> = storage
            .get_all_generic::<BreweryPlayer>("players")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        ids.sort();
        let mut expected: Vec<Uuid> = new.iter().map(|p| p.id).collect();
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_malformed_entry_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.toml");
        let good = player(4);
        std::fs::write(
            &path,
            format!(
                "[players.{id}]\nid = \"{id}\"\nquality = 4\ndrunkenness = 8\n\n[players.broken]\nquality = \"high\"\n",
                id = good.id
            ),
        )
        .unwrap();

        let storage = FlatFileStorage::open(&path).await.unwrap();
        let all: Vec<BreweryPlayer> = storage.get_all_generic("players").await.unwrap();
        assert_eq!(all, vec![good]);

        let broken = storage.get_generic::<BreweryPlayer>("players", "broken").await;
        assert!(matches!(broken, Err(StorageError::MalformedRecord { .. })));
    }

    #[tokio::test]
    async fn test_delete_and_drop() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FlatFileStorage::open(&temp_dir.path().join("data.toml"))
            .await
            .unwrap();
        let p = player(1);
        storage.save_generic("players", &p).await.unwrap();

        storage.delete_generic("players", &p.id.to_string()).await.unwrap();
        assert!(storage
            .get_generic::<BreweryPlayer>("players", &p.id.to_string())
            .await
            .unwrap()
            .is_none());

        storage.drop_table("players").await.unwrap();
        assert!(storage.get_all_generic::<BreweryPlayer>("players").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_invalid_document() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        assert!(FlatFileStorage::open(&path).await.is_err());
    }
}
