//! Storage
//!
//! A small key/value layer over two backends. Tables hold [`Persisted`]
//! entities keyed by id. `save_all` on a table replaces its whole content.
//!
//! [`DataManager`] picks the backend from configuration and wraps the
//! generic operations in per-entity helpers that log failures and degrade
//! to "not found" or "not saved".

pub mod entities;
pub mod flatfile;
pub mod sqlite;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use entities::{
    Barrel, BlockPos, BoundingBox, BrewStats, BreweryPlayer, Cauldron, LegacyBrew, MiscData,
    Persisted, Wakeup, WakeupLocation,
};
pub use flatfile::FlatFileStorage;
pub use sqlite::SqliteStorage;

use crate::config::{BreweryConfig, StorageKind};
use crate::error::{GateError, StorageError};
use crate::gate::DataGate;
use crate::ingredient::KindRegistry;
use crate::state::BreweryState;

pub const BARRELS: &str = "barrels";
pub const CAULDRONS: &str = "cauldrons";
pub const PLAYERS: &str = "players";
pub const WAKEUPS: &str = "wakeups";
pub const MISC: &str = "misc";
pub const LEGACY_BREWS: &str = "legacy_brews";

/// Every table with its id column width
pub const TABLES: [(&str, usize); 6] = [
    (BARRELS, 36),
    (CAULDRONS, 36),
    (PLAYERS, 36),
    (WAKEUPS, 36),
    (MISC, 4),
    (LEGACY_BREWS, 11),
];

/// Generic table operations shared by the backends.
#[allow(async_fn_in_trait)]
pub trait Storage {
    async fn create_table(&self, name: &str, max_id_len: usize) -> Result<(), StorageError>;

    async fn drop_table(&self, name: &str) -> Result<(), StorageError>;

    async fn get_generic<T: Persisted>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<Option<T>, StorageError>;

    /// Every decodable entity. Malformed entries are logged and skipped.
    async fn get_all_generic<T: Persisted>(&self, table: &str) -> Result<Vec<T>, StorageError>;

    /// Insert or replace one entity.
    async fn save_generic<T: Persisted>(&self, table: &str, entity: &T) -> Result<(), StorageError>;

    /// Make the table hold exactly `entities`.
    async fn save_all_generic<T: Persisted>(
        &self,
        table: &str,
        entities: &[T],
    ) -> Result<(), StorageError>;

    async fn delete_generic(&self, table: &str, id: &str) -> Result<(), StorageError>;
}

// ============================================================================
// Data Manager
// ============================================================================

pub enum DataManager {
    FlatFile(FlatFileStorage),
    Sqlite(SqliteStorage),
}

impl DataManager {
    /// Bring up the configured backend and make sure every table exists.
    ///
    /// Any failure here is [`StorageError::Init`].
    pub async fn open(config: &BreweryConfig) -> Result<Self, StorageError> {
        Self::open_with_registry(config, KindRegistry::with_builtin()).await
    }

    /// Like [`DataManager::open`], decoding stored ingredients with `registry`.
    pub async fn open_with_registry(
        config: &BreweryConfig,
        registry: KindRegistry,
    ) -> Result<Self, StorageError> {
        let path = config.storage_path();
        let manager = match config.storage.kind {
            StorageKind::FlatFile => FlatFileStorage::open(&path)
                .await
                .map(|s| Self::FlatFile(s.with_registry(registry))),
            StorageKind::Sqlite => SqliteStorage::open(&path, &config.storage.table_prefix)
                .await
                .map(|s| Self::Sqlite(s.with_registry(registry))),
        }
        .map_err(|e| StorageError::Init(format!("{:?} storage at {:?}: {}", config.storage.kind, path, e)))?;

        for (table, max_id_len) in TABLES {
            manager
                .create_table(table, max_id_len)
                .await
                .map_err(|e| StorageError::Init(format!("failed to create table {}: {}", table, e)))?;
        }

        info!("Opened {:?} storage at {:?}", config.storage.kind, path);
        Ok(manager)
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::FlatFile(_) => "flatfile",
            Self::Sqlite(_) => "sqlite",
        }
    }

    // ------------------------------------------------------------------------
    // Logged generic helpers
    // ------------------------------------------------------------------------

    async fn get_logged<T: Persisted>(&self, table: &str, id: &str) -> Option<T> {
        match self.get_generic(table, id).await {
            Ok(entity) => entity,
            Err(e) => {
                error!("Failed to load {} from {}: {}", id, table, e);
                None
            }
        }
    }

    async fn get_all_logged<T: Persisted>(&self, table: &str) -> Vec<T> {
        match self.get_all_generic(table).await {
            Ok(entities) => entities,
            Err(e) => {
                error!("Failed to load table {}: {}", table, e);
                Vec::new()
            }
        }
    }

    async fn save_logged<T: Persisted>(&self, table: &str, entity: &T) -> bool {
        match self.save_generic(table, entity).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save {} to {}: {}", entity.id(), table, e);
                false
            }
        }
    }

    async fn save_all_logged<T: Persisted>(&self, table: &str, entities: &[T]) -> bool {
        match self.save_all_generic(table, entities).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to save {} entries to {}: {}", entities.len(), table, e);
                false
            }
        }
    }

    async fn delete_logged(&self, table: &str, id: &str) -> bool {
        match self.delete_generic(table, id).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to delete {} from {}: {}", id, table, e);
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Barrels
    // ------------------------------------------------------------------------

    pub async fn get_barrel(&self, id: Uuid) -> Option<Barrel> {
        self.get_logged(BARRELS, &id.to_string()).await
    }

    pub async fn get_all_barrels(&self) -> Vec<Barrel> {
        self.get_all_logged(BARRELS).await
    }

    pub async fn save_barrel(&self, barrel: &Barrel) -> bool {
        if barrel.bounds.is_none() {
            warn!("Not saving barrel {} without bounds", barrel.id);
            return false;
        }
        self.save_logged(BARRELS, barrel).await
    }

    /// Barrels without bounds cannot be rebuilt and are left out.
    pub async fn save_all_barrels(&self, barrels: &[Barrel]) -> bool {
        let (complete, incomplete): (Vec<Barrel>, Vec<Barrel>) =
            barrels.iter().cloned().partition(|b| b.bounds.is_some());
        for barrel in &incomplete {
            warn!("Not saving barrel {} without bounds", barrel.id);
        }
        self.save_all_logged(BARRELS, &complete).await
    }

    pub async fn delete_barrel(&self, id: Uuid) -> bool {
        self.delete_logged(BARRELS, &id.to_string()).await
    }

    // ------------------------------------------------------------------------
    // Cauldrons
    // ------------------------------------------------------------------------

    pub async fn get_cauldron(&self, id: Uuid) -> Option<Cauldron> {
        self.get_logged(CAULDRONS, &id.to_string()).await
    }

    pub async fn get_all_cauldrons(&self) -> Vec<Cauldron> {
        self.get_all_logged(CAULDRONS).await
    }

    pub async fn save_cauldron(&self, cauldron: &Cauldron) -> bool {
        self.save_logged(CAULDRONS, cauldron).await
    }

    pub async fn save_all_cauldrons(&self, cauldrons: &[Cauldron]) -> bool {
        self.save_all_logged(CAULDRONS, cauldrons).await
    }

    pub async fn delete_cauldron(&self, id: Uuid) -> bool {
        self.delete_logged(CAULDRONS, &id.to_string()).await
    }

    // ------------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------------

    pub async fn get_player(&self, id: Uuid) -> Option<BreweryPlayer> {
        self.get_logged(PLAYERS, &id.to_string()).await
    }

    pub async fn get_all_players(&self) -> Vec<BreweryPlayer> {
        self.get_all_logged(PLAYERS).await
    }

    pub async fn save_player(&self, player: &BreweryPlayer) -> bool {
        self.save_logged(PLAYERS, player).await
    }

    pub async fn save_all_players(&self, players: &[BreweryPlayer]) -> bool {
        self.save_all_logged(PLAYERS, players).await
    }

    pub async fn delete_player(&self, id: Uuid) -> bool {
        self.delete_logged(PLAYERS, &id.to_string()).await
    }

    // ------------------------------------------------------------------------
    // Wakeups
    // ------------------------------------------------------------------------

    pub async fn get_wakeup(&self, id: Uuid) -> Option<Wakeup> {
        self.get_logged(WAKEUPS, &id.to_string()).await
    }

    pub async fn get_all_wakeups(&self) -> Vec<Wakeup> {
        self.get_all_logged(WAKEUPS).await
    }

    pub async fn save_wakeup(&self, wakeup: &Wakeup) -> bool {
        self.save_logged(WAKEUPS, wakeup).await
    }

    pub async fn save_all_wakeups(&self, wakeups: &[Wakeup]) -> bool {
        self.save_all_logged(WAKEUPS, wakeups).await
    }

    pub async fn delete_wakeup(&self, id: Uuid) -> bool {
        self.delete_logged(WAKEUPS, &id.to_string()).await
    }

    // ------------------------------------------------------------------------
    // Legacy brews
    // ------------------------------------------------------------------------

    pub async fn get_all_legacy_brews(&self) -> Vec<LegacyBrew> {
        self.get_all_logged(LEGACY_BREWS).await
    }

    pub async fn save_all_legacy_brews(&self, brews: &[LegacyBrew]) -> bool {
        self.save_all_logged(LEGACY_BREWS, brews).await
    }

    // ------------------------------------------------------------------------
    // Misc
    // ------------------------------------------------------------------------

    /// The misc record, or a fresh one stamped with the current time.
    pub async fn get_misc(&self) -> MiscData {
        match self.get_logged(MISC, entities::MISC_ID).await {
            Some(misc) => misc,
            None => {
                debug!("No misc record stored, starting a new one");
                MiscData::default()
            }
        }
    }

    pub async fn save_misc(&self, misc: &MiscData) -> bool {
        self.save_logged(MISC, misc).await
    }

    // ------------------------------------------------------------------------
    // Checkpoints
    // ------------------------------------------------------------------------

    async fn save_tables(&self, state: &BreweryState) -> usize {
        let start = Instant::now();
        let barrels: Vec<Barrel> = state.barrels.values().cloned().collect();
        let cauldrons: Vec<Cauldron> = state.cauldrons.values().cloned().collect();
        let players: Vec<BreweryPlayer> = state.players.values().cloned().collect();
        let wakeups: Vec<Wakeup> = state.wakeups.values().cloned().collect();
        let brews: Vec<LegacyBrew> = state.legacy_brews.values().cloned().collect();

        let results = [
            self.save_all_barrels(&barrels).await,
            self.save_all_cauldrons(&cauldrons).await,
            self.save_all_players(&players).await,
            self.save_all_wakeups(&wakeups).await,
            self.save_all_legacy_brews(&brews).await,
            self.save_misc(&state.misc).await,
        ];
        let failed = results.iter().filter(|ok| !**ok).count();

        info!(
            "Saved {} barrels, {} cauldrons, {} players, {} wakeups in {}ms ({} tables failed)",
            barrels.len(),
            cauldrons.len(),
            players.len(),
            wakeups.len(),
            start.elapsed().as_millis(),
            failed
        );
        failed
    }

    /// Write every table from the live state.
    ///
    /// Waits for in-flight loaders to finish first. Returns the number of
    /// tables that failed to save.
    pub async fn save_all(
        &self,
        state: &BreweryState,
        gate: &Arc<DataGate>,
    ) -> Result<usize, GateError> {
        let _permit = gate.wait_save().await?;
        Ok(self.save_tables(state).await)
    }

    /// Save when `interval` has passed since `last_save`.
    ///
    /// Skipped while legacy loaders hold the gate; the next tick retries.
    pub async fn try_auto_save(
        &self,
        state: &BreweryState,
        gate: &Arc<DataGate>,
        last_save: &mut Instant,
        interval: Duration,
    ) -> bool {
        if last_save.elapsed() < interval {
            return false;
        }
        let Some(_permit) = gate.try_acquire_save() else {
            debug!("Auto-save skipped, data gate busy (state {})", gate.state());
            return false;
        };
        self.save_tables(state).await;
        *last_save = Instant::now();
        true
    }
}

impl Storage for DataManager {
    async fn create_table(&self, name: &str, max_id_len: usize) -> Result<(), StorageError> {
        match self {
            Self::FlatFile(s) => s.create_table(name, max_id_len).await,
            Self::Sqlite(s) => s.create_table(name, max_id_len).await,
        }
    }

    async fn drop_table(&self, name: &str) -> Result<(), StorageError> {
        match self {
            Self::FlatFile(s) => s.drop_table(name).await,
            Self::Sqlite(s) => s.drop_table(name).await,
        }
    }

    async fn get_generic<T: Persisted>(
        &self,
        table: &str,
        id: &str,
    ) -> Result<Option<T>, StorageError> {
        match self {
            Self::FlatFile(s) => s.get_generic(table, id).await,
            Self::Sqlite(s) => s.get_generic(table, id).await,
        }
    }

    async fn get_all_generic<T: Persisted>(&self, table: &str) -> Result<Vec<T>, StorageError> {
        match self {
            Self::FlatFile(s) => s.get_all_generic(table).await,
            Self::Sqlite(s) => s.get_all_generic(table).await,
        }
    }

    async fn save_generic<T: Persisted>(&self, table: &str, entity: &T) -> Result<(), StorageError> {
        match self {
            Self::FlatFile(s) => s.save_generic(table, entity).await,
            Self::Sqlite(s) => s.save_generic(table, entity).await,
        }
    }

    async fn save_all_generic<T: Persisted>(
        &self,
        table: &str,
        entities: &[T],
    ) -> Result<(), StorageError> {
        match self {
            Self::FlatFile(s) => s.save_all_generic(table, entities).await,
            Self::Sqlite(s) => s.save_all_generic(table, entities).await,
        }
    }

    async fn delete_generic(&self, table: &str, id: &str) -> Result<(), StorageError> {
        match self {
            Self::FlatFile(s) => s.delete_generic(table, id).await,
            Self::Sqlite(s) => s.delete_generic(table, id).await,
        }
    }
}
