//! Ingredients
//!
//! Kinds, the decoder registry and the collections a cauldron or barrel holds.

pub mod collection;
pub mod kinds;
pub mod registry;

pub use collection::{Ingredient, IngredientCollection};
pub use kinds::{CustomItem, IngredientKind, PluginItem, SimpleItem};
pub use registry::{DecodeFn, ItemLoader, KindRegistry};
