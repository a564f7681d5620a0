//! Per-world sections of `worlddata.yml`
//!
//! Blocks were written relative to the world section as `x/y/z`.

use serde_yml::{Mapping, Value};
use tracing::{error, warn};
use uuid::Uuid;

use super::yaml;
use super::{ingredients_from_counts, LegacyWorld, WorldImport};
use crate::codec::deserialize_ingredients;
use crate::ingredient::{IngredientCollection, KindRegistry};
use crate::storage::{Barrel, BlockPos, BoundingBox, Cauldron, Wakeup, WakeupLocation};

fn parse_block(world: Uuid, text: &str) -> Option<BlockPos> {
    let parts: Vec<&str> = text.split('/').collect();
    let [x, y, z] = parts.as_slice() else {
        return None;
    };
    Some(BlockPos::new(
        world,
        x.trim().parse().ok()?,
        y.trim().parse().ok()?,
        z.trim().parse().ok()?,
    ))
}

fn parse_wakeup(world: Uuid, text: &str) -> Option<WakeupLocation> {
    let parts: Vec<&str> = text.split('/').map(str::trim).collect();
    let [x, y, z, pitch, yaw] = parts.as_slice() else {
        return None;
    };
    Some(WakeupLocation {
        world,
        x: x.parse().ok()?,
        y: y.parse().ok()?,
        z: z.parse().ok()?,
        pitch: pitch.parse().ok()?,
        yaw: yaw.parse().ok()?,
    })
}

fn parse_ints(text: &str) -> Option<Vec<i32>> {
    text.split(',')
        .map(|part| part.trim().parse().ok())
        .collect()
}

/// Bounds from `bounds` or from the older stair and wood point lists.
fn barrel_bounds(entry: &Mapping, path: &str) -> Option<BoundingBox> {
    if yaml::field(entry, "bounds").is_some() {
        let text = yaml::get_text(entry, "bounds").unwrap_or_default();
        let coords = parse_ints(&text).filter(|c| c.len() == 6);
        if coords.is_none() {
            warn!("Unreadable barrel bounds at {}: '{}'", path, text);
        }
        return coords.and_then(|c| BoundingBox::from_points(&c));
    }

    let stairs = yaml::get_text(entry, "st")?;
    let mut points = parse_ints(&stairs);
    if let Some(wood) = yaml::get_text(entry, "wo") {
        // A single value means the wood list was empty
        if wood.split(',').count() > 1 {
            points = points.zip(parse_ints(&wood)).map(|(mut st, wo)| {
                st.extend(wo);
                st
            });
        }
    }

    let bounds = points.as_deref().and_then(BoundingBox::from_points);
    if bounds.is_none() {
        error!("Failed to build barrel bounds from stair and wood points at {}", path);
    }
    bounds
}

/// Ingredients stored either as a material-count section or as record text.
fn cauldron_ingredients(
    value: Option<&Value>,
    registry: &KindRegistry,
    path: &str,
) -> IngredientCollection {
    match value {
        Some(Value::Mapping(counts)) => ingredients_from_counts(counts, 0),
        Some(other) => match yaml::key_string(other) {
            Some(text) => deserialize_ingredients(&text, registry),
            None => {
                error!("Cauldron at {} has unreadable ingredients", path);
                IngredientCollection::new()
            }
        },
        None => {
            error!("Cauldron at {} is missing its ingredient section", path);
            IngredientCollection::new()
        }
    }
}

fn load_cauldrons(
    section: &Mapping,
    world: Uuid,
    path: &str,
    registry: &KindRegistry,
) -> Vec<Cauldron> {
    let mut cauldrons = Vec::new();
    for (key, value) in yaml::entries(section) {
        let entry_path = format!("{}.{}", path, key);
        let Some(entry) = value.as_mapping() else {
            error!("Missing block data in worlddata.yml: {}", entry_path);
            continue;
        };
        let Some(block) = yaml::get_str(entry, "block") else {
            error!("Missing block data in worlddata.yml: {}", entry_path);
            continue;
        };
        let Some(block) = parse_block(world, block) else {
            error!("Incomplete block data in worlddata.yml: {}", entry_path);
            continue;
        };

        cauldrons.push(Cauldron {
            id: Uuid::new_v4(),
            block,
            ingredients: cauldron_ingredients(
                yaml::field(entry, "ingredients"),
                registry,
                &entry_path,
            ),
            state: yaml::get_i32(entry, "state").unwrap_or(0),
        });
    }
    cauldrons
}

fn load_barrels(section: &Mapping, world: Uuid, path: &str) -> Vec<Barrel> {
    let mut barrels = Vec::new();
    for (key, value) in yaml::entries(section) {
        let entry_path = format!("{}.{}", path, key);
        let Some(entry) = value.as_mapping() else {
            error!("Missing block data in worlddata.yml: {}", entry_path);
            continue;
        };
        let Some(spigot) = yaml::get_str(entry, "spigot") else {
            error!("Missing block data in worlddata.yml: {}", entry_path);
            continue;
        };
        let Some(spigot) = parse_block(world, spigot) else {
            error!("Incomplete block data in worlddata.yml: {}", entry_path);
            continue;
        };
        if yaml::field(entry, "inv").is_some() {
            warn!("Barrel inventory at {} cannot be imported, barrel starts empty", entry_path);
        }

        barrels.push(Barrel {
            id: Uuid::new_v4(),
            spigot,
            bounds: barrel_bounds(entry, &entry_path),
            wood: Default::default(),
            time: yaml::get_f64(entry, "time").unwrap_or(0.0) as f32,
            sign_offset: yaml::get_i32(entry, "sign").unwrap_or(0) as i8,
            contents: IngredientCollection::new(),
        });
    }
    barrels
}

fn load_wakeups(section: &Mapping, world: Uuid, path: &str) -> Vec<Wakeup> {
    let mut wakeups = Vec::new();
    for (key, value) in yaml::entries(section) {
        let Some(text) = value.as_str() else {
            continue;
        };
        let location = parse_wakeup(world, text);
        match location {
            Some(location) => wakeups.push(Wakeup {
                id: Uuid::new_v4(),
                location,
            }),
            None => error!("Incomplete location data in worlddata.yml: {}.{}", path, key),
        }
    }
    wakeups
}

/// First `<kind>.<key>` section present for the world's keys, with its path
fn world_section<'a>(
    data: &'a Mapping,
    kind: &str,
    keys: &[String],
) -> Option<(&'a Mapping, String)> {
    keys.iter().find_map(|key| {
        let path = format!("{}.{}", kind, key);
        yaml::section(data, &path).map(|section| (section, path))
    })
}

/// Everything stored for one world
pub fn load_world(data: &Mapping, world: &LegacyWorld, registry: &KindRegistry) -> WorldImport {
    let keys = world.section_keys();

    let cauldrons = world_section(data, "BCauldron", &keys)
        .map(|(s, path)| load_cauldrons(s, world.id, &path, registry))
        .unwrap_or_default();
    let barrels = world_section(data, "Barrel", &keys)
        .map(|(s, path)| load_barrels(s, world.id, &path))
        .unwrap_or_default();
    let wakeups = world_section(data, "Wakeup", &keys)
        .map(|(s, path)| load_wakeups(s, world.id, &path))
        .unwrap_or_default();

    WorldImport {
        world: world.id,
        barrels,
        cauldrons,
        wakeups,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Mapping {
        serde_yml::from_str::<Value>(yaml)
            .unwrap()
            .as_mapping()
            .cloned()
            .unwrap()
    }

    fn world() -> LegacyWorld {
        LegacyWorld::new(
            Uuid::parse_str("5f2b7c1e-0d5b-4d7e-9b83-2a7c7a1e9d10").unwrap(),
            "world",
        )
    }

    #[test]
    fn test_block_parsing() {
        let id = Uuid::new_v4();
        assert_eq!(parse_block(id, "1/-2/3"), Some(BlockPos::new(id, 1, -2, 3)));
        assert_eq!(parse_block(id, "1/2"), None);
        assert_eq!(parse_block(id, "1/b/3"), None);
    }

    #[test]
    fn test_barrel_bounds_sources() {
        let data = parse(
            r#"
            a:
              bounds: "4,1,4,0,0,0"
            b:
              st: "0,0,0,1,1,1"
              wo: "3,2,0"
            c:
              st: "0,0,0,1,1,1"
              wo: ""
            d:
              spigot: "1/2/3"
            "#,
        );
        let bounds = |key: &str| barrel_bounds(yaml::section(&data, key).unwrap(), key);

        assert_eq!(bounds("a"), BoundingBox::from_points(&[0, 0, 0, 4, 1, 4]));
        assert_eq!(bounds("b"), BoundingBox::from_points(&[0, 0, 0, 3, 2, 1]));
        assert_eq!(bounds("c"), BoundingBox::from_points(&[0, 0, 0, 1, 1, 1]));
        assert_eq!(bounds("d"), None);
    }

    #[test]
    fn test_load_world_sections() {
        let data = parse(
            r#"
            BCauldron:
              5f2b7c1e-0d5b-4d7e-9b83-2a7c7a1e9d10:
                '0':
                  block: "10/64/-5"
                  state: 3
                  ingredients:
                    WHEAT: 4
                    "SUGAR_CANE,0": 2
                '1':
                  block: "10/64"
            Barrel:
              5f2b7c1e-0d5b-4d7e-9b83-2a7c7a1e9d10:
                '0':
                  spigot: "1/70/1"
                  time: 12.5
                  sign: 1
                  bounds: "0,70,0,2,72,2"
                  inv:
                    '0': something
            Wakeup:
              5f2b7c1e-0d5b-4d7e-9b83-2a7c7a1e9d10:
                '0': "0.5/65.0/0.5/10.0/90.0"
                '1': "0.5/65.0"
            "#,
        );

        let import = load_world(&data, &world(), &KindRegistry::with_builtin());

        assert_eq!(import.cauldrons.len(), 1);
        let cauldron = &import.cauldrons[0];
        assert_eq!(cauldron.block, BlockPos::new(world().id, 10, 64, -5));
        assert_eq!(cauldron.state, 3);
        assert_eq!(cauldron.ingredients.ingredients_count(), 6);

        assert_eq!(import.barrels.len(), 1);
        let barrel = &import.barrels[0];
        assert_eq!(barrel.time, 12.5);
        assert_eq!(barrel.sign_offset, 1);
        assert!(barrel.bounds.is_some());
        assert!(barrel.contents.is_empty());

        assert_eq!(import.wakeups.len(), 1);
        assert_eq!(import.wakeups[0].location.pitch, 10.0);
        assert_eq!(import.wakeups[0].location.yaw, 90.0);
    }

    #[test]
    fn test_dungeon_world_keys() {
        let dungeon = LegacyWorld::new(
            Uuid::parse_str("0c9a4e52-7d3b-4a38-a1f6-55e0b2c1d7aa").unwrap(),
            "DXL_Game_1",
        );
        let data = parse(
            r#"
            BCauldron:
              DXL_Game_1:
                '0':
                  block: "1/2/3"
                  ingredients:
                    WHEAT: 1
              0c9a4e52-7d3b-4a38-a1f6-55e0b2c1d7aa:
                '0':
                  block: "7/7/7"
                '1':
                  block: "8/8/8"
            Barrel:
              0c9a4e52-7d3b-4a38-a1f6-55e0b2c1d7aa:
                '0':
                  spigot: "5/6/7"
                  bounds: "5,6,7,6,7,8"
            "#,
        );
        let registry = KindRegistry::with_builtin();

        // The dungeon name is tried before the world id
        let import = load_world(&data, &dungeon, &registry);
        assert_eq!(import.world, dungeon.id);
        assert_eq!(import.cauldrons.len(), 1);
        assert_eq!(import.cauldrons[0].block, BlockPos::new(dungeon.id, 1, 2, 3));
        assert_eq!(import.barrels.len(), 1);
        assert_eq!(import.barrels[0].spigot, BlockPos::new(dungeon.id, 5, 6, 7));

        let marked = dungeon.clone().with_dxl_key("id_42");
        let import = load_world(&data, &marked, &registry);
        assert_eq!(import.cauldrons.len(), 2);

        // Regular worlds only use their id
        assert_eq!(world().section_keys(), vec![world().id.to_string()]);
    }
}
