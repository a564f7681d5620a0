//! Live registries
//!
//! Owned by the main task. Background work hands its results back as values
//! and they are merged here, never applied from another thread.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};
use uuid::Uuid;

use crate::legacy::{LegacyImport, WorldImport, fallback_brew_stats};
use crate::storage::{Barrel, BreweryPlayer, Cauldron, DataManager, LegacyBrew, MiscData, Wakeup};

#[derive(Debug, Clone, Default)]
pub struct BreweryState {
    /// Worlds currently loaded
    pub worlds: HashSet<Uuid>,
    pub barrels: HashMap<Uuid, Barrel>,
    pub cauldrons: HashMap<Uuid, Cauldron>,
    pub players: HashMap<Uuid, BreweryPlayer>,
    pub wakeups: HashMap<Uuid, Wakeup>,
    pub legacy_brews: HashMap<i32, LegacyBrew>,
    pub misc: MiscData,
}

impl BreweryState {
    pub fn new(misc: MiscData) -> Self {
        Self {
            worlds: HashSet::new(),
            barrels: HashMap::new(),
            cauldrons: HashMap::new(),
            players: HashMap::new(),
            wakeups: HashMap::new(),
            legacy_brews: HashMap::new(),
            misc,
        }
    }

    /// Load every table. Worlds referenced by stored blocks count as loaded.
    pub async fn from_storage(storage: &DataManager) -> Self {
        let mut state = Self::new(storage.get_misc().await);

        for barrel in storage.get_all_barrels().await {
            state.worlds.insert(barrel.spigot.world);
            state.barrels.insert(barrel.id, barrel);
        }
        for cauldron in storage.get_all_cauldrons().await {
            state.worlds.insert(cauldron.block.world);
            state.cauldrons.insert(cauldron.id, cauldron);
        }
        for wakeup in storage.get_all_wakeups().await {
            state.worlds.insert(wakeup.location.world);
            state.wakeups.insert(wakeup.id, wakeup);
        }
        for player in storage.get_all_players().await {
            state.players.insert(player.id, player);
        }
        for brew in storage.get_all_legacy_brews().await {
            state.legacy_brews.insert(brew.id, brew);
        }

        info!(
            "Loaded state from {}: {} barrels, {} cauldrons, {} players, {} wakeups",
            storage.backend_name(),
            state.barrels.len(),
            state.cauldrons.len(),
            state.players.len(),
            state.wakeups.len()
        );
        state
    }

    pub fn add_world(&mut self, world: Uuid) -> bool {
        self.worlds.insert(world)
    }

    /// Forget a world and everything placed in it.
    pub fn remove_world(&mut self, world: Uuid) -> bool {
        if !self.worlds.remove(&world) {
            return false;
        }
        self.barrels.retain(|_, b| b.spigot.world != world);
        self.cauldrons.retain(|_, c| c.block.world != world);
        self.wakeups.retain(|_, w| w.location.world != world);
        true
    }

    /// Register one world's imported entities if the world is still loaded.
    pub fn merge_world(&mut self, import: WorldImport) -> bool {
        if !self.worlds.contains(&import.world) {
            debug!("World {} is gone, dropping its imported data", import.world);
            return false;
        }

        for barrel in import.barrels {
            self.barrels.insert(barrel.id, barrel);
        }
        for cauldron in import.cauldrons {
            self.cauldrons.insert(cauldron.id, cauldron);
        }
        for wakeup in import.wakeups {
            self.wakeups.insert(wakeup.id, wakeup);
        }
        true
    }

    /// Apply the global part of a legacy import. Worlds are merged one by
    /// one through [`BreweryState::merge_world`] as their loads finish.
    pub fn merge_legacy(&mut self, import: LegacyImport) {
        match import.misc {
            Some(misc) => self.misc = misc,
            None => {
                if let Some(found) = import.brews_found {
                    if fallback_brew_stats(&mut self.misc, found) {
                        info!("Created-brew statistics reset to {} legacy brews", found);
                    }
                }
            }
        }
        for brew in import.brews {
            self.legacy_brews.insert(brew.id, brew);
        }
        for player in import.players {
            self.players.insert(player.id, player);
        }
    }
}
