//! Barrel wood types

use serde::{Deserialize, Serialize};

/// Wood a barrel is built from. The discriminant is the stable index used
/// for wood distance and for legacy data.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BarrelWoodType {
    #[default]
    Any = 0,
    Birch = 1,
    Oak = 2,
    Jungle = 3,
    Spruce = 4,
    Acacia = 5,
    DarkOak = 6,
    Crimson = 7,
    Warped = 8,
    Mangrove = 9,
    Cherry = 10,
    Bamboo = 11,
    CutCopper = 12,
    PaleOak = 13,
}

impl BarrelWoodType {
    pub const ALL: [BarrelWoodType; 14] = [
        BarrelWoodType::Any,
        BarrelWoodType::Birch,
        BarrelWoodType::Oak,
        BarrelWoodType::Jungle,
        BarrelWoodType::Spruce,
        BarrelWoodType::Acacia,
        BarrelWoodType::DarkOak,
        BarrelWoodType::Crimson,
        BarrelWoodType::Warped,
        BarrelWoodType::Mangrove,
        BarrelWoodType::Cherry,
        BarrelWoodType::Bamboo,
        BarrelWoodType::CutCopper,
        BarrelWoodType::PaleOak,
    ];

    pub fn index(self) -> i32 {
        self as i32
    }

    pub fn from_index(index: i32) -> Option<Self> {
        usize::try_from(index).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Legacy data stored the wood as a float index. Out of range or
    /// negative values mean "any".
    pub fn from_any_f32(value: f32) -> Self {
        if !value.is_finite() || value < 0.0 {
            return BarrelWoodType::Any;
        }
        Self::from_index(value as i32).unwrap_or(BarrelWoodType::Any)
    }

    /// Case-insensitive name lookup, accepting spaces or underscores.
    /// Plain numbers are read as an index.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if let Ok(index) = name.parse::<i32>() {
            return Self::from_index(index);
        }
        let normalized = name.to_uppercase().replace([' ', '-'], "_");
        Self::ALL.iter().copied().find(|w| w.name() == normalized)
    }

    pub fn name(self) -> &'static str {
        match self {
            BarrelWoodType::Any => "ANY",
            BarrelWoodType::Birch => "BIRCH",
            BarrelWoodType::Oak => "OAK",
            BarrelWoodType::Jungle => "JUNGLE",
            BarrelWoodType::Spruce => "SPRUCE",
            BarrelWoodType::Acacia => "ACACIA",
            BarrelWoodType::DarkOak => "DARK_OAK",
            BarrelWoodType::Crimson => "CRIMSON",
            BarrelWoodType::Warped => "WARPED",
            BarrelWoodType::Mangrove => "MANGROVE",
            BarrelWoodType::Cherry => "CHERRY",
            BarrelWoodType::Bamboo => "BAMBOO",
            BarrelWoodType::CutCopper => "CUT_COPPER",
            BarrelWoodType::PaleOak => "PALE_OAK",
        }
    }

    /// Index distance between two wood types
    pub fn distance(self, other: BarrelWoodType) -> i32 {
        (self.index() - other.index()).abs()
    }
}
