//! Legacy data import
//!
//! Reads the old `data.yml` / `worlddata.yml` pair once and turns it into
//! current entities. The global part runs on a blocking worker under a load
//! permit. Each world then loads on its own worker with its own permit, and
//! the caller merges worlds as they finish. [`LegacyLoader::finalize`] retires
//! the files so the import never runs twice.

pub mod world;
mod yaml;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yml::Mapping;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::codec::deserialize_ingredients;
use crate::config::BreweryConfig;
use crate::error::LegacyError;
use crate::gate::DataGate;
use crate::ingredient::{Ingredient, IngredientCollection, IngredientKind, KindRegistry, SimpleItem};
use crate::recipe::BarrelWoodType;
use crate::storage::entities::list_hash;
use crate::storage::{Barrel, BrewStats, BreweryPlayer, Cauldron, LegacyBrew, MiscData, Wakeup};

pub const DATA_FILE: &str = "data.yml";
pub const WORLD_DATA_FILE: &str = "worlddata.yml";
pub const WORLD_DATA_BACKUP_FILE: &str = "worlddataBackup.yml";

const HOUR_MS: i64 = 3_600_000;

/// A world known to the host when the import runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyWorld {
    pub id: Uuid,
    pub name: String,
    /// Key a dungeon plugin stored this world's data under
    pub dxl_key: Option<String>,
}

impl LegacyWorld {
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            dxl_key: None,
        }
    }

    pub fn with_dxl_key(mut self, key: impl Into<String>) -> Self {
        self.dxl_key = Some(key.into());
        self
    }

    /// Dungeon instance world, stored under its dungeon key
    pub fn is_dungeon(&self) -> bool {
        self.name.starts_with("DXL_")
    }

    /// Section keys to look for, in order
    pub fn section_keys(&self) -> Vec<String> {
        let id = self.id.to_string();
        if self.is_dungeon() {
            let key = self.dxl_key.clone().unwrap_or_else(|| self.name.clone());
            vec![key, id]
        } else {
            vec![id]
        }
    }
}

/// Entities parsed for one world
#[derive(Debug, Clone, Default)]
pub struct WorldImport {
    pub world: Uuid,
    pub barrels: Vec<Barrel>,
    pub cauldrons: Vec<Cauldron>,
    pub wakeups: Vec<Wakeup>,
}

/// The global part of a legacy import. Worlds load separately through
/// [`LegacyLoader::spawn_world_loads`].
#[derive(Debug, Clone, Default)]
pub struct LegacyImport {
    /// Present only when `data.yml` existed
    pub misc: Option<MiscData>,
    pub brews: Vec<LegacyBrew>,
    pub players: Vec<BreweryPlayer>,
    /// Legacy brews found before purging, when `worlddata.yml` existed
    pub brews_found: Option<i32>,
    pub(crate) world_data: Option<Arc<Mapping>>,
}

/// Reset unusable created-brew statistics to the number of legacy brews.
pub fn fallback_brew_stats(misc: &mut MiscData, brews_found: i32) -> bool {
    if misc.stats().is_some_and(|s| s.created > 0) {
        return false;
    }
    misc.set_stats(BrewStats {
        created: brews_found,
        ..Default::default()
    });
    true
}

/// World loads running on blocking workers
#[derive(Debug, Default)]
pub struct WorldLoads {
    tasks: JoinSet<Result<WorldImport, LegacyError>>,
}

impl WorldLoads {
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Next world to finish. `None` once every load has been returned.
    pub async fn next(&mut self) -> Option<Result<WorldImport, LegacyError>> {
        let joined = self.tasks.join_next().await?;
        Some(joined.map_err(|e| LegacyError::Worker(e.to_string())).and_then(|r| r))
    }
}

/// Ingredients from the oldest layout: `"MATERIAL[,durability]": amount`
pub fn ingredients_from_counts(counts: &Mapping, cooked_time: i32) -> IngredientCollection {
    let mut ingredients = Vec::new();
    for (key, value) in yaml::entries(counts) {
        let mut parts = key.split(',');
        let material = parts.next().unwrap_or_default().trim();
        if material.is_empty() {
            continue;
        }
        let material = match material {
            "LONG_GRASS" => "SHORT_GRASS",
            other => other,
        };
        let item = match parts.next() {
            Some(durability) => {
                SimpleItem::with_durability(material, yaml::parse_int_or_zero(durability) as i16)
            }
            None => SimpleItem::new(material),
        };
        let amount = yaml::key_string(value)
            .map(|v| yaml::parse_int_or_zero(&v))
            .unwrap_or(0);
        ingredients.push(Ingredient::new(IngredientKind::Simple(item), amount));
    }
    IngredientCollection::from_ingredients(ingredients, cooked_time)
}

#[derive(Debug, Clone)]
pub struct LegacyLoader {
    data_dir: PathBuf,
    retention_hours: i64,
    registry: KindRegistry,
    now_ms: Option<i64>,
    install_time: Option<i64>,
}

impl LegacyLoader {
    pub fn new(data_dir: &Path, retention_days: u32) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            retention_hours: i64::from(retention_days) * 24,
            registry: KindRegistry::with_builtin(),
            now_ms: None,
            install_time: None,
        }
    }

    pub fn from_config(config: &BreweryConfig) -> Self {
        Self::new(&config.data_dir, config.legacy.retention_days)
    }

    /// Fixed clock in unix millis
    pub fn with_clock(mut self, now_ms: i64) -> Self {
        self.now_ms = Some(now_ms);
        self
    }

    /// Install time to purge against when `data.yml` is missing
    pub fn with_install_time(mut self, install_time: i64) -> Self {
        self.install_time = Some(install_time);
        self
    }

    pub fn with_registry(mut self, registry: KindRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Whether `data_dir` holds legacy data
    pub fn detect(data_dir: &Path) -> bool {
        data_dir.join(DATA_FILE).exists() || data_dir.join(WORLD_DATA_FILE).exists()
    }

    pub fn exists(&self) -> bool {
        Self::detect(&self.data_dir)
    }

    fn now(&self) -> i64 {
        self.now_ms
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis())
    }

    /// Parse the global data on a blocking worker while holding a load permit.
    pub async fn run(self, gate: Arc<DataGate>) -> Result<LegacyImport, LegacyError> {
        tokio::task::spawn_blocking(move || {
            let _permit = gate.acquire_load()?;
            let import = self.load()?;
            info!(
                "Legacy data loaded: {} brews, {} players",
                import.brews.len(),
                import.players.len()
            );
            Ok::<_, LegacyError>(import)
        })
        .await
        .map_err(|e| LegacyError::Worker(e.to_string()))?
    }

    /// Start one blocking load per world, each under its own load permit.
    pub fn spawn_world_loads(
        &self,
        gate: &Arc<DataGate>,
        import: &LegacyImport,
        worlds: Vec<LegacyWorld>,
    ) -> WorldLoads {
        let mut loads = WorldLoads::default();
        let Some(data) = import.world_data.as_ref() else {
            return loads;
        };

        for world in worlds {
            let gate = Arc::clone(gate);
            let data = Arc::clone(data);
            let registry = self.registry.clone();
            loads.tasks.spawn_blocking(move || {
                let _permit = gate.acquire_load()?;
                let import = world::load_world(&data, &world, &registry);
                debug!(
                    "Legacy world {} loaded: {} barrels, {} cauldrons, {} wakeups",
                    world.name,
                    import.barrels.len(),
                    import.cauldrons.len(),
                    import.wakeups.len()
                );
                Ok(import)
            });
        }
        loads
    }

    /// Entities of one world from an already parsed import. Blocks on nothing.
    pub fn load_world(&self, import: &LegacyImport, world: &LegacyWorld) -> WorldImport {
        match import.world_data.as_ref() {
            Some(data) => world::load_world(data, world, &self.registry),
            None => WorldImport {
                world: world.id,
                ..Default::default()
            },
        }
    }

    /// Parse both legacy files. Blocks on file I/O.
    pub fn load(&self) -> Result<LegacyImport, LegacyError> {
        let now = self.now();

        let mut misc = yaml::read_file(&self.data_dir.join(DATA_FILE))?
            .as_ref()
            .and_then(yaml::root)
            .map(|root| read_misc(root, now));

        let Some(world_data) = yaml::read_file(&self.data_dir.join(WORLD_DATA_FILE))? else {
            return Ok(LegacyImport {
                misc,
                ..Default::default()
            });
        };
        let root = match world_data {
            serde_yml::Value::Mapping(root) => root,
            _ => {
                warn!("{} is not a mapping, ignoring its content", WORLD_DATA_FILE);
                Mapping::new()
            }
        };

        let ingredients = self.read_ingredients(&root);
        let mut brews = read_brews(&root, &ingredients);

        let brews_found = brews.len() as i32;
        if let Some(misc) = misc.as_mut() {
            fallback_brew_stats(misc, brews_found);
        }

        let install_time = misc
            .as_ref()
            .map(|m| m.install_time)
            .or(self.install_time)
            .unwrap_or(now);
        self.purge(&mut brews, install_time, now);

        let players = read_players(&root);

        Ok(LegacyImport {
            misc,
            brews,
            players,
            brews_found: Some(brews_found),
            world_data: Some(Arc::new(root)),
        })
    }

    fn read_ingredients(&self, root: &Mapping) -> HashMap<String, IngredientCollection> {
        let mut ingredients = HashMap::new();
        let Some(section) = yaml::section(root, "Ingredients") else {
            return ingredients;
        };

        for (id, value) in yaml::entries(section) {
            let Some(entry) = value.as_mapping() else {
                error!("Ingredient id '{}' incomplete in {}", id, WORLD_DATA_FILE);
                continue;
            };
            let collection = match yaml::field(entry, "mats") {
                Some(serde_yml::Value::Mapping(counts)) => {
                    ingredients_from_counts(counts, yaml::get_i32(entry, "cookedTime").unwrap_or(0))
                }
                Some(other) => match yaml::key_string(other) {
                    Some(text) => deserialize_ingredients(&text, &self.registry),
                    None => {
                        error!("Ingredient id '{}' incomplete in {}", id, WORLD_DATA_FILE);
                        continue;
                    }
                },
                None => {
                    error!("Ingredient id '{}' incomplete in {}", id, WORLD_DATA_FILE);
                    continue;
                }
            };
            ingredients.insert(id, collection);
        }
        ingredients
    }

    /// Drop brews untouched for longer than the retention window.
    fn purge(&self, brews: &mut Vec<LegacyBrew>, install_time: i64, now: i64) -> usize {
        let hours_after_install = ((now - install_time) as f64 / HOUR_MS as f64) as i64;
        let purge_before = hours_after_install - self.retention_hours;
        if purge_before <= 0 {
            return 0;
        }

        let before = brews.len();
        brews.retain(|brew| i64::from(brew.last_update) >= purge_before);
        let removed = before - brews.len();
        if removed > 0 {
            info!(
                "Removed {} legacy brews untouched for more than {} days",
                removed,
                self.retention_hours / 24
            );
        }
        removed
    }

    /// Rename the legacy files to `<name>.old`. Returns how many were moved.
    pub fn finalize(&self) -> Result<usize, LegacyError> {
        let mut renamed = 0;
        for name in [DATA_FILE, WORLD_DATA_FILE, WORLD_DATA_BACKUP_FILE] {
            let path = self.data_dir.join(name);
            if path.exists() {
                std::fs::rename(&path, self.data_dir.join(format!("{}.old", name)))?;
                renamed += 1;
            }
        }
        info!("Legacy data migration finalized, {} files renamed", renamed);
        Ok(renamed)
    }
}

fn read_misc(root: &Mapping, now: i64) -> MiscData {
    let mut misc = MiscData::new(yaml::get_i64(root, "installTime").unwrap_or(now));
    misc.mc_barrel_time = yaml::get_i64(root, "MCBarrelTime").unwrap_or(0);
    misc.prev_save_seeds = yaml::get_i64_list(root, "prevSaveSeeds");

    let created = yaml::get_i32_list(root, "brewsCreated");
    if let Some(stats) = BrewStats::from_slice(&created) {
        let hash = yaml::get_i32(root, "brewsCreatedH").unwrap_or(0);
        if list_hash(&created) == hash {
            misc.set_stats(stats);
        } else {
            warn!("Brew statistics in {} fail their checksum, ignoring them", DATA_FILE);
        }
    }
    misc
}

fn read_brews(root: &Mapping, ingredients: &HashMap<String, IngredientCollection>) -> Vec<LegacyBrew> {
    let mut brews = Vec::new();
    let Some(section) = yaml::section(root, "Brew") else {
        return brews;
    };

    for (uid, value) in yaml::entries(section) {
        let Ok(id) = uid.trim().parse::<i32>() else {
            error!("Legacy brew id '{}' is not a number, skipping", uid);
            continue;
        };
        let Some(entry) = value.as_mapping() else {
            error!("Legacy brew {} has no data, skipping", uid);
            continue;
        };

        let ing_id = yaml::get_text(entry, "ingId");
        let collection = match ing_id.as_ref().and_then(|k| ingredients.get(k)) {
            Some(collection) => collection.clone(),
            None => {
                error!(
                    "Ingredient id '{}' not found in {}",
                    ing_id.as_deref().unwrap_or("none"),
                    WORLD_DATA_FILE
                );
                IngredientCollection::new()
            }
        };

        brews.push(LegacyBrew {
            id,
            ingredients: collection,
            quality: yaml::get_i32(entry, "quality").unwrap_or(0),
            alcohol: yaml::get_i32(entry, "alc").unwrap_or(0),
            // Stored as a byte by the old writer
            distill_runs: i32::from(yaml::get_i32(entry, "distillRuns").unwrap_or(0) as i8),
            age_time: yaml::get_f64(entry, "ageTime").unwrap_or(0.0) as f32,
            wood: BarrelWoodType::from_any_f32(yaml::get_f64(entry, "wood").unwrap_or(-1.0) as f32),
            recipe: yaml::get_str(entry, "recipe").map(str::to_string),
            unlabeled: yaml::get_bool(entry, "unlabeled").unwrap_or(false),
            persistent: yaml::get_bool(entry, "persist").unwrap_or(false),
            stat: yaml::get_bool(entry, "stat").unwrap_or(false),
            last_update: yaml::get_i32(entry, "lastUpdate").unwrap_or(0),
        });
    }
    brews
}

fn read_players(root: &Mapping) -> Vec<BreweryPlayer> {
    let mut players = Vec::new();
    let Some(section) = yaml::section(root, "Player") else {
        return players;
    };

    for (key, value) in yaml::entries(section) {
        let Ok(id) = Uuid::parse_str(key.trim()) else {
            warn!("Legacy player key '{}' is not a UUID, skipping", key);
            continue;
        };
        let Some(entry) = value.as_mapping() else {
            continue;
        };
        players.push(BreweryPlayer {
            id,
            quality: yaml::get_i32(entry, "quality").unwrap_or(0),
            drunkenness: yaml::get_i32(entry, "drunk").unwrap_or(0),
            offline_drunkenness: yaml::get_i32(entry, "offDrunk").unwrap_or(0),
        });
    }
    players
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::serialize_ingredients;
    use crate::gate::GateConfig;
    use crate::state::BreweryState;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    const DAY_MS: i64 = 24 * HOUR_MS;
    const INSTALL: i64 = 1_600_000_000_000;

    fn write_purge_fixture(dir: &Path) {
        fs::write(dir.join(DATA_FILE), format!("installTime: {}\n", INSTALL)).unwrap();
        // Brew 1 was last touched one month after install
        fs::write(
            dir.join(WORLD_DATA_FILE),
            r#"
Ingredients:
  '0':
    mats:
      WHEAT: 3
    cookedTime: 5
Brew:
  '1':
    ingId: '0'
    quality: 8
    lastUpdate: 720
"#,
        )
        .unwrap();
    }

    #[test]
    fn test_purge_keeps_recent_brews() {
        let temp_dir = TempDir::new().unwrap();
        write_purge_fixture(temp_dir.path());

        let import = LegacyLoader::new(temp_dir.path(), 120)
            .with_clock(INSTALL + 90 * DAY_MS)
            .load()
            .unwrap();
        assert_eq!(import.brews.len(), 1);
        assert_eq!(import.brews[0].quality, 8);
    }

    #[test]
    fn test_purge_drops_old_brews() {
        let temp_dir = TempDir::new().unwrap();
        write_purge_fixture(temp_dir.path());

        let import = LegacyLoader::new(temp_dir.path(), 120)
            .with_clock(INSTALL + 180 * DAY_MS)
            .load()
            .unwrap();
        assert!(import.brews.is_empty());
        assert_eq!(import.misc.unwrap().install_time, INSTALL);
    }

    #[test]
    fn test_both_ingredient_layouts() {
        let temp_dir = TempDir::new().unwrap();
        let mut current = IngredientCollection::with_cooked_time(9);
        current.add_with_amount(IngredientKind::Simple(SimpleItem::new("POTATO")), 10);
        let text = serialize_ingredients(&current);

        fs::write(
            temp_dir.path().join(WORLD_DATA_FILE),
            format!(
                r#"
Ingredients:
  old:
    mats:
      "SAPLING,2": 4
      LONG_GRASS: 1
    cookedTime: 7
  new:
    mats: "{text}"
Brew:
  '5':
    ingId: old
    wood: 3.0
    distillRuns: 2
  '6':
    ingId: new
    recipe: Vodka
  '7':
    quality: 1
"#
            ),
        )
        .unwrap();

        let import = LegacyLoader::new(temp_dir.path(), 120)
            .with_clock(INSTALL)
            .with_install_time(INSTALL)
            .load()
            .unwrap();
        assert!(import.misc.is_none());

        let brew = |id: i32| import.brews.iter().find(|b| b.id == id).unwrap();

        let old = &brew(5).ingredients;
        assert_eq!(old.cooked_time, 7);
        assert_eq!(old.ingredients_count(), 5);
        assert!(old.ingredients().iter().any(|i| i.kind
            == IngredientKind::Simple(SimpleItem::with_durability("SAPLING", 2))));
        assert!(old
            .ingredients()
            .iter()
            .any(|i| i.kind == IngredientKind::Simple(SimpleItem::new("SHORT_GRASS"))));
        assert_eq!(brew(5).wood, BarrelWoodType::Jungle);
        assert_eq!(brew(5).distill_runs, 2);

        assert_eq!(brew(6).ingredients, current);
        assert_eq!(brew(6).recipe.as_deref(), Some("Vodka"));
        assert!(brew(7).ingredients.is_empty());
        assert_eq!(brew(7).wood, BarrelWoodType::Any);
    }

    #[test]
    fn test_misc_and_players() {
        let temp_dir = TempDir::new().unwrap();
        let stats = [20, 2, 3, 5, 6, 3, 1];
        let player = Uuid::new_v4();
        fs::write(
            temp_dir.path().join(DATA_FILE),
            format!(
                "installTime: 1000\nMCBarrelTime: 55\nprevSaveSeeds: [4, 8]\nbrewsCreated: [20, 2, 3, 5, 6, 3, 1]\nbrewsCreatedH: {}\n",
                list_hash(&stats)
            ),
        )
        .unwrap();
        fs::write(
            temp_dir.path().join(WORLD_DATA_FILE),
            format!("Player:\n  {player}:\n    quality: 40\n    drunk: 12\n  not-a-uuid:\n    drunk: 1\n"),
        )
        .unwrap();

        let import = LegacyLoader::new(temp_dir.path(), 120).load().unwrap();
        let misc = import.misc.unwrap();
        assert_eq!(misc.install_time, 1000);
        assert_eq!(misc.mc_barrel_time, 55);
        assert_eq!(misc.prev_save_seeds, vec![4, 8]);
        assert_eq!(misc.stats(), BrewStats::from_slice(&stats));

        assert_eq!(
            import.players,
            vec![BreweryPlayer {
                id: player,
                quality: 40,
                drunkenness: 12,
                offline_drunkenness: 0,
            }]
        );
    }

    #[test]
    fn test_tampered_stats_fall_back_to_brew_count() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(DATA_FILE),
            "installTime: 1000\nbrewsCreated: [900, 0, 0, 0, 0, 0, 0]\nbrewsCreatedH: 1\n",
        )
        .unwrap();
        fs::write(
            temp_dir.path().join(WORLD_DATA_FILE),
            "Brew:\n  '1':\n    lastUpdate: 0\n  '2':\n    lastUpdate: 0\n",
        )
        .unwrap();

        let import = LegacyLoader::new(temp_dir.path(), 120)
            .with_clock(1000)
            .load()
            .unwrap();
        assert_eq!(import.misc.unwrap().stats().unwrap().created, 2);
    }

    #[test]
    fn test_stats_fallback_without_data_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join(WORLD_DATA_FILE),
            "Brew:\n  '1':\n    lastUpdate: 0\n  '2':\n    lastUpdate: 0\n  '3':\n    lastUpdate: 0\n",
        )
        .unwrap();

        let import = LegacyLoader::new(temp_dir.path(), 120)
            .with_clock(INSTALL)
            .with_install_time(INSTALL)
            .load()
            .unwrap();
        assert!(import.misc.is_none());
        assert_eq!(import.brews_found, Some(3));

        let mut fresh = MiscData::new(INSTALL);
        assert!(fallback_brew_stats(&mut fresh, 3));
        assert_eq!(fresh.stats().unwrap().created, 3);

        let mut counted = MiscData::new(INSTALL);
        counted.set_stats(BrewStats {
            created: 40,
            ..Default::default()
        });
        assert!(!fallback_brew_stats(&mut counted, 3));
        assert_eq!(counted.stats().unwrap().created, 40);
    }

    fn write_world_fixture(dir: &Path, worlds: &[&LegacyWorld]) {
        let mut text = String::from("BCauldron:\n");
        for world in worlds {
            text.push_str(&format!(
                "  {}:\n    '0':\n      block: 1/2/3\n      ingredients:\n        WHEAT: 2\n",
                world.id
            ));
        }
        fs::write(dir.join(WORLD_DATA_FILE), text).unwrap();
    }

    #[test]
    fn test_world_loaded_by_id() {
        let temp_dir = TempDir::new().unwrap();
        let kept = LegacyWorld::new(Uuid::new_v4(), "world");
        write_world_fixture(temp_dir.path(), &[&kept]);

        let loader = LegacyLoader::new(temp_dir.path(), 120);
        let import = loader.load().unwrap();
        let world = loader.load_world(&import, &kept);
        assert_eq!(world.world, kept.id);
        assert_eq!(world.cauldrons[0].ingredients.ingredients_count(), 2);

        let other = loader.load_world(&import, &LegacyWorld::new(Uuid::new_v4(), "other"));
        assert!(other.cauldrons.is_empty());
    }

    #[tokio::test]
    async fn test_world_loads_merge_as_they_finish() {
        let temp_dir = TempDir::new().unwrap();
        let a = LegacyWorld::new(Uuid::new_v4(), "a");
        let b = LegacyWorld::new(Uuid::new_v4(), "b");
        let dungeon = LegacyWorld::new(Uuid::new_v4(), "DXL_Raid");
        write_world_fixture(temp_dir.path(), &[&a, &b, &dungeon]);
        let gate = Arc::new(DataGate::default());

        let mut state = BreweryState::default();
        for world in [&a, &b, &dungeon] {
            state.add_world(world.id);
        }

        let loader = LegacyLoader::new(temp_dir.path(), 120);
        let import = loader.clone().run(Arc::clone(&gate)).await.unwrap();
        let mut loads =
            loader.spawn_world_loads(&gate, &import, vec![a.clone(), b.clone(), dungeon.clone()]);
        assert_eq!(loads.len(), 3);
        state.merge_legacy(import);

        // b is unloaded while its data is still being read
        state.remove_world(b.id);

        let mut merged = Vec::new();
        while let Some(result) = loads.next().await {
            let world = result.unwrap();
            let id = world.world;
            if state.merge_world(world) {
                merged.push(id);
            }
        }
        merged.sort();
        let mut expected = vec![a.id, dungeon.id];
        expected.sort();
        assert_eq!(merged, expected);
        assert_eq!(state.cauldrons.len(), 2);
        assert!(state.cauldrons.values().all(|c| c.block.world != b.id));
        assert_eq!(gate.state(), 0);
    }

    #[tokio::test]
    async fn test_world_loads_wait_for_gate() {
        let temp_dir = TempDir::new().unwrap();
        let world = LegacyWorld::new(Uuid::new_v4(), "world");
        write_world_fixture(temp_dir.path(), &[&world]);
        let gate = Arc::new(DataGate::new(GateConfig {
            attempts: 2,
            backoff: Duration::from_millis(5),
        }));

        let loader = LegacyLoader::new(temp_dir.path(), 120);
        let import = loader.load().unwrap();
        let save = gate.try_acquire_save().unwrap();
        let mut loads = loader.spawn_world_loads(&gate, &import, vec![world]);
        assert!(matches!(loads.next().await, Some(Err(LegacyError::Gate(_)))));
        assert!(loads.next().await.is_none());
        drop(save);
        assert_eq!(gate.state(), 0);

        let empty = LegacyImport::default();
        assert!(loader.spawn_world_loads(&gate, &empty, Vec::new()).is_empty());
    }

    #[test]
    fn test_detect_and_finalize() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!LegacyLoader::detect(temp_dir.path()));

        fs::write(temp_dir.path().join(WORLD_DATA_FILE), "{}").unwrap();
        fs::write(temp_dir.path().join(WORLD_DATA_BACKUP_FILE), "{}").unwrap();
        assert!(LegacyLoader::detect(temp_dir.path()));

        let loader = LegacyLoader::new(temp_dir.path(), 120);
        assert_eq!(loader.finalize().unwrap(), 2);
        assert!(!loader.exists());
        assert!(temp_dir.path().join("worlddata.yml.old").exists());
        assert!(temp_dir.path().join("worlddataBackup.yml.old").exists());
        assert_eq!(loader.finalize().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_run_releases_gate() {
        let temp_dir = TempDir::new().unwrap();
        write_purge_fixture(temp_dir.path());
        let gate = Arc::new(DataGate::default());

        let import = LegacyLoader::new(temp_dir.path(), 120)
            .with_clock(INSTALL)
            .run(Arc::clone(&gate))
            .await
            .unwrap();
        assert_eq!(import.brews.len(), 1);
        assert_eq!(gate.state(), 0);
    }

    #[tokio::test]
    async fn test_run_times_out_while_saving() {
        let temp_dir = TempDir::new().unwrap();
        write_purge_fixture(temp_dir.path());
        let gate = Arc::new(DataGate::new(GateConfig {
            attempts: 2,
            backoff: Duration::from_millis(5),
        }));
        let _save = gate.try_acquire_save().unwrap();

        let result = LegacyLoader::new(temp_dir.path(), 120)
            .run(Arc::clone(&gate))
            .await;
        assert!(matches!(result, Err(LegacyError::Gate(_))));
    }
}
