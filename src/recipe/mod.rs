//! Recipes
//!
//! Declarative brewing recipes, the woods and colors they refer to, and the
//! ordered catalog they live in.

pub mod catalog;
pub mod color;
pub mod definition;
pub mod wood;

pub use catalog::RecipeCatalog;
pub use color::PotionColor;
pub use definition::{QualityText, RawRecipeDefinition, Recipe, RecipeBuilder, RecipeCommand};
pub use wood::BarrelWoodType;
