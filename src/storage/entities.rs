//! Persisted entities
//!
//! Everything the data manager stores. Locations are written as fixed-order
//! comma-separated strings so both backends store them as one readable value.
//! Ingredient collections are written as radix-91 record text and decoded
//! with the backend's [`KindRegistry`] when a row is read back.

use std::fmt;
use std::str::FromStr;

use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::codec::deserialize_ingredients;
use crate::ingredient::{IngredientCollection, KindRegistry};
use crate::recipe::BarrelWoodType;

/// Something with a stable storage key.
pub trait Persisted: Serialize + DeserializeOwned + Send + Sync {
    fn id(&self) -> String;

    /// Rebuild an entity from its stored row. Entities holding ingredient
    /// records decode them with `registry`.
    fn from_row(row: serde_json::Value, _registry: &KindRegistry) -> Result<Self, String> {
        serde_json::from_value(row).map_err(|e| e.to_string())
    }
}

/// Remove an ingredient text field from `row` and decode it.
fn take_ingredients(
    row: &mut serde_json::Value,
    field: &str,
    registry: &KindRegistry,
) -> Result<IngredientCollection, String> {
    match row.as_object_mut().and_then(|fields| fields.remove(field)) {
        Some(serde_json::Value::String(text)) => Ok(deserialize_ingredients(&text, registry)),
        Some(_) => Err(format!("field `{}` is not ingredient text", field)),
        None => Err(format!("missing field `{}`", field)),
    }
}

// ============================================================================
// Locations
// ============================================================================

/// Parse error for location strings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationParseError(pub String);

impl fmt::Display for LocationParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid location '{}'", self.0)
    }
}

impl std::error::Error for LocationParseError {}

fn split_fields<'a>(text: &'a str, expected: usize) -> Result<Vec<&'a str>, LocationParseError> {
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    if fields.len() != expected {
        return Err(LocationParseError(text.to_string()));
    }
    Ok(fields)
}

fn parse_field<T: FromStr>(field: &str, text: &str) -> Result<T, LocationParseError> {
    field.parse().map_err(|_| LocationParseError(text.to_string()))
}

/// Implements Serialize/Deserialize through Display/FromStr
macro_rules! string_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(de::Error::custom)
            }
        }
    };
}

/// A block in a world, `world,x,y,z`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockPos {
    pub world: Uuid,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub fn new(world: Uuid, x: i32, y: i32, z: i32) -> Self {
        Self { world, x, y, z }
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.world, self.x, self.y, self.z)
    }
}

impl FromStr for BlockPos {
    type Err = LocationParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let fields = split_fields(text, 4)?;
        Ok(Self {
            world: parse_field(fields[0], text)?,
            x: parse_field(fields[1], text)?,
            y: parse_field(fields[2], text)?,
            z: parse_field(fields[3], text)?,
        })
    }
}

string_serde!(BlockPos);

/// Axis-aligned block box, `x1,y1,z1,x2,y2,z2` with min corner first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BoundingBox {
    pub min: [i32; 3],
    pub max: [i32; 3],
}

impl BoundingBox {
    /// Smallest box around a flat list of x,y,z triples.
    pub fn from_points(coords: &[i32]) -> Option<Self> {
        if coords.is_empty() || coords.len() % 3 != 0 {
            return None;
        }
        let mut min = [i32::MAX; 3];
        let mut max = [i32::MIN; 3];
        for point in coords.chunks_exact(3) {
            for axis in 0..3 {
                min[axis] = min[axis].min(point[axis]);
                max[axis] = max[axis].max(point[axis]);
            }
        }
        Some(Self { min, max })
    }

    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        let point = [x, y, z];
        (0..3).all(|axis| self.min[axis] <= point[axis] && point[axis] <= self.max[axis])
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.min[0], self.min[1], self.min[2], self.max[0], self.max[1], self.max[2]
        )
    }
}

impl FromStr for BoundingBox {
    type Err = LocationParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let fields = split_fields(text, 6)?;
        let coords = fields
            .iter()
            .map(|f| parse_field::<i32>(f, text))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_points(&coords).ok_or_else(|| LocationParseError(text.to_string()))
    }
}

string_serde!(BoundingBox);

/// A precise position with view direction, `world,x,y,z,pitch,yaw`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WakeupLocation {
    pub world: Uuid,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub pitch: f32,
    pub yaw: f32,
}

impl fmt::Display for WakeupLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.world, self.x, self.y, self.z, self.pitch, self.yaw
        )
    }
}

impl FromStr for WakeupLocation {
    type Err = LocationParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let fields = split_fields(text, 6)?;
        Ok(Self {
            world: parse_field(fields[0], text)?,
            x: parse_field(fields[1], text)?,
            y: parse_field(fields[2], text)?,
            z: parse_field(fields[3], text)?,
            pitch: parse_field(fields[4], text)?,
            yaw: parse_field(fields[5], text)?,
        })
    }
}

string_serde!(WakeupLocation);

// ============================================================================
// Ingredient field
// ============================================================================

/// Writes an [`IngredientCollection`] as one text value. Reading it back
/// needs a registry, so those fields are skipped by `Deserialize` and filled
/// in by [`Persisted::from_row`].
fn ingredient_text<S: Serializer>(
    collection: &IngredientCollection,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&crate::codec::serialize_ingredients(collection))
}

// ============================================================================
// Entities
// ============================================================================

/// An aging barrel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Barrel {
    pub id: Uuid,
    pub spigot: BlockPos,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<BoundingBox>,
    #[serde(default)]
    pub wood: BarrelWoodType,
    /// Years spent aging
    #[serde(default)]
    pub time: f32,
    #[serde(default)]
    pub sign_offset: i8,
    #[serde(serialize_with = "ingredient_text", skip_deserializing)]
    pub contents: IngredientCollection,
}

impl Persisted for Barrel {
    fn id(&self) -> String {
        self.id.to_string()
    }

    fn from_row(mut row: serde_json::Value, registry: &KindRegistry) -> Result<Self, String> {
        let contents = take_ingredients(&mut row, "contents", registry)?;
        let mut barrel: Self = serde_json::from_value(row).map_err(|e| e.to_string())?;
        barrel.contents = contents;
        Ok(barrel)
    }
}

/// A brewing cauldron
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cauldron {
    pub id: Uuid,
    pub block: BlockPos,
    #[serde(serialize_with = "ingredient_text", skip_deserializing)]
    pub ingredients: IngredientCollection,
    /// Minutes cooked so far
    #[serde(default)]
    pub state: i32,
}

impl Persisted for Cauldron {
    fn id(&self) -> String {
        self.id.to_string()
    }

    fn from_row(mut row: serde_json::Value, registry: &KindRegistry) -> Result<Self, String> {
        let ingredients = take_ingredients(&mut row, "ingredients", registry)?;
        let mut cauldron: Self = serde_json::from_value(row).map_err(|e| e.to_string())?;
        cauldron.ingredients = ingredients;
        Ok(cauldron)
    }
}

/// Per-player drinking state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreweryPlayer {
    pub id: Uuid,
    #[serde(default)]
    pub quality: i32,
    #[serde(default)]
    pub drunkenness: i32,
    #[serde(default)]
    pub offline_drunkenness: i32,
}

impl Persisted for BreweryPlayer {
    fn id(&self) -> String {
        self.id.to_string()
    }
}

/// A wakeup point players are sent to after passing out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wakeup {
    pub id: Uuid,
    pub location: WakeupLocation,
}

impl Persisted for Wakeup {
    fn id(&self) -> String {
        self.id.to_string()
    }
}

/// A brew item from the old data layout, keyed by its small integer id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyBrew {
    pub id: i32,
    #[serde(serialize_with = "ingredient_text", skip_deserializing)]
    pub ingredients: IngredientCollection,
    #[serde(default)]
    pub quality: i32,
    #[serde(default)]
    pub alcohol: i32,
    #[serde(default)]
    pub distill_runs: i32,
    #[serde(default)]
    pub age_time: f32,
    #[serde(default)]
    pub wood: BarrelWoodType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<String>,
    #[serde(default)]
    pub unlabeled: bool,
    #[serde(default)]
    pub persistent: bool,
    #[serde(default)]
    pub stat: bool,
    /// Hours after install at which this brew was last touched
    #[serde(default)]
    pub last_update: i32,
}

impl Persisted for LegacyBrew {
    fn id(&self) -> String {
        self.id.to_string()
    }

    fn from_row(mut row: serde_json::Value, registry: &KindRegistry) -> Result<Self, String> {
        let ingredients = take_ingredients(&mut row, "ingredients", registry)?;
        let mut brew: Self = serde_json::from_value(row).map_err(|e| e.to_string())?;
        brew.ingredients = ingredients;
        Ok(brew)
    }
}

/// Key of the single misc record
pub const MISC_ID: &str = "misc";

/// Created-brew counters: total, by command, then per quality band
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrewStats {
    pub created: i32,
    pub created_by_command: i32,
    pub excellent: i32,
    pub good: i32,
    pub normal: i32,
    pub bad: i32,
    pub terrible: i32,
}

impl BrewStats {
    pub fn to_vec(self) -> Vec<i32> {
        vec![
            self.created,
            self.created_by_command,
            self.excellent,
            self.good,
            self.normal,
            self.bad,
            self.terrible,
        ]
    }

    pub fn from_slice(values: &[i32]) -> Option<Self> {
        match *values {
            [created, created_by_command, excellent, good, normal, bad, terrible] => Some(Self {
                created,
                created_by_command,
                excellent,
                good,
                normal,
                bad,
                terrible,
            }),
            _ => None,
        }
    }
}

/// Hash over an int list matching the old data writer's list hash, used to
/// detect hand-edited statistics.
pub fn list_hash(values: &[i32]) -> i32 {
    values
        .iter()
        .fold(1i32, |hash, v| hash.wrapping_mul(31).wrapping_add(*v))
}

/// Global counters and timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiscData {
    /// Unix millis of first install
    pub install_time: i64,
    #[serde(default)]
    pub mc_barrel_time: i64,
    #[serde(default)]
    pub prev_save_seeds: Vec<i64>,
    #[serde(default)]
    pub brews_created: Vec<i32>,
    #[serde(default)]
    pub brews_created_hash: i32,
}

impl MiscData {
    pub fn new(install_time: i64) -> Self {
        Self {
            install_time,
            mc_barrel_time: 0,
            prev_save_seeds: Vec::new(),
            brews_created: Vec::new(),
            brews_created_hash: 0,
        }
    }

    /// Stats stored with this record, if the hash still matches
    pub fn stats(&self) -> Option<BrewStats> {
        if list_hash(&self.brews_created) != self.brews_created_hash {
            return None;
        }
        BrewStats::from_slice(&self.brews_created)
    }

    pub fn set_stats(&mut self, stats: BrewStats) {
        self.brews_created = stats.to_vec();
        self.brews_created_hash = list_hash(&self.brews_created);
    }
}

impl Default for MiscData {
    fn default() -> Self {
        Self::new(chrono::Utc::now().timestamp_millis())
    }
}

impl Persisted for MiscData {
    fn id(&self) -> String {
        MISC_ID.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{radix, RecordWriter};
    use crate::error::DecodeError;
    use crate::ingredient::{IngredientKind, ItemLoader, SimpleItem};

    #[test]
    fn test_block_pos_string() {
        let world = Uuid::new_v4();
        let pos = BlockPos::new(world, 10, -64, 3);
        let text = pos.to_string();
        assert_eq!(text, format!("{},10,-64,3", world));
        assert_eq!(text.parse::<BlockPos>().unwrap(), pos);
        assert!("world,1,2".parse::<BlockPos>().is_err());
    }

    #[test]
    fn test_bounding_box_orders_corners() {
        let bounds: BoundingBox = "5,1,9,2,4,3".parse().unwrap();
        assert_eq!(bounds.min, [2, 1, 3]);
        assert_eq!(bounds.max, [5, 4, 9]);
        assert_eq!(bounds.to_string(), "2,1,3,5,4,9");
        assert!(bounds.contains(3, 2, 5));
        assert!(!bounds.contains(6, 2, 5));
    }

    #[test]
    fn test_bounding_box_from_many_points() {
        let bounds = BoundingBox::from_points(&[0, 0, 0, 3, 1, 2, -1, 5, 1]).unwrap();
        assert_eq!(bounds.min, [-1, 0, 0]);
        assert_eq!(bounds.max, [3, 5, 2]);
        assert!(BoundingBox::from_points(&[1, 2]).is_none());
    }

    #[test]
    fn test_wakeup_location_string() {
        let loc = WakeupLocation {
            world: Uuid::new_v4(),
            x: 1.5,
            y: 64.0,
            z: -3.25,
            pitch: 10.5,
            yaw: -90.0,
        };
        assert_eq!(loc.to_string().parse::<WakeupLocation>().unwrap(), loc);
    }

    #[test]
    fn test_cauldron_json_shape() {
        let mut ingredients = IngredientCollection::with_cooked_time(4);
        ingredients.add_with_amount(IngredientKind::Simple(SimpleItem::new("WHEAT")), 3);
        let cauldron = Cauldron {
            id: Uuid::new_v4(),
            block: BlockPos::new(Uuid::new_v4(), 1, 2, 3),
            ingredients,
            state: 4,
        };

        let json = serde_json::to_value(&cauldron).unwrap();
        assert!(json["block"].is_string());
        assert!(json["ingredients"].is_string());

        let back = Cauldron::from_row(json, &KindRegistry::with_builtin()).unwrap();
        assert_eq!(back, cauldron);
    }

    #[test]
    fn test_rows_decode_with_given_registry() {
        fn sugar_token(loader: &mut ItemLoader<'_>) -> Result<IngredientKind, DecodeError> {
            loader.reader().read_u8()?;
            Ok(IngredientKind::Simple(SimpleItem::new("SUGAR")))
        }

        // One entry of a host-defined kind
        let mut record = RecordWriter::new();
        record.write_u8(1);
        record.write_i32(0);
        record.write_u8(1);
        record.write_utf("XI");
        record.write_u8(7);
        record.write_u16(2);
        let row = serde_json::json!({
            "id": Uuid::new_v4(),
            "block": BlockPos::new(Uuid::new_v4(), 0, 0, 0).to_string(),
            "ingredients": radix::encode(&record.into_bytes()),
        });

        let builtin = Cauldron::from_row(row.clone(), &KindRegistry::with_builtin()).unwrap();
        assert!(builtin.ingredients.is_empty());

        let mut registry = KindRegistry::with_builtin();
        registry.register("XI", sugar_token);
        let cauldron = Cauldron::from_row(row, &registry).unwrap();
        assert_eq!(cauldron.ingredients.ingredients().len(), 1);
        assert_eq!(cauldron.ingredients.ingredients_count(), 2);
    }

    #[test]
    fn test_row_without_ingredients_rejected() {
        let row = serde_json::json!({
            "id": Uuid::new_v4(),
            "block": BlockPos::new(Uuid::new_v4(), 0, 0, 0).to_string(),
        });
        assert!(Cauldron::from_row(row, &KindRegistry::with_builtin()).is_err());
    }

    #[test]
    fn test_list_hash() {
        // Same as the old writer: h = 31 * h + e starting at 1
        assert_eq!(list_hash(&[]), 1);
        assert_eq!(list_hash(&[1, 2, 3]), 30817);
        assert_eq!(list_hash(&[i32::MAX, i32::MAX]), list_hash(&[i32::MAX, i32::MAX]));
    }

    #[test]
    fn test_misc_stats_hash() {
        let mut misc = MiscData::new(0);
        assert_eq!(misc.stats(), None);

        let stats = BrewStats {
            created: 12,
            excellent: 2,
            good: 4,
            normal: 3,
            bad: 2,
            terrible: 1,
            ..Default::default()
        };
        misc.set_stats(stats);
        assert_eq!(misc.stats(), Some(stats));

        misc.brews_created[0] = 9000;
        assert_eq!(misc.stats(), None);
    }
}
