//! Brew Quality
//!
//! Scores an ingredient collection against recipes and picks the best
//! fitting one. Every score is 0-10, with -1 meaning "cannot be this recipe".
//! Rounding is half-up throughout.

use std::sync::Arc;
use tracing::debug;

use crate::ingredient::IngredientCollection;
use crate::recipe::{BarrelWoodType, Recipe, RecipeCatalog};

/// Sentinel for "recipe does not match at all"
pub const NO_MATCH: i32 = -1;

/// Round half up, `floor(x + 0.5)`.
pub fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

// ============================================================================
// Individual scores
// ============================================================================

/// How well the offered ingredients fit the recipe's ingredient list.
pub fn ingredient_quality(collection: &IngredientCollection, recipe: &Recipe) -> i32 {
    let offered = collection.ingredients();
    if recipe.is_missing_ingredients(offered) {
        return NO_MATCH;
    }

    let total = collection.ingredients_count();
    let mut quality: f32 = 10.0;
    let mut foreign = 0usize;

    for ingredient in offered {
        let required = recipe.amount_of(&ingredient.kind);
        let count = ingredient.amount;

        if required == 0 {
            // More than half the brew does not belong in it
            if count > total / 2 {
                return NO_MATCH;
            }
            foreign += 1;
            if foreign < offered.len() {
                quality = (quality as f64 - count as f64 * (recipe.difficulty as f64 / 2.0)) as f32;
                continue;
            }
            return NO_MATCH;
        }

        let off = (count - required).abs() as f32 / recipe.allowed_count_diff(required) as f32;
        quality = (quality as f64 - off as f64 * 10.0) as f32;
    }

    if quality >= 0.0 {
        round_half_up(quality as f64)
    } else {
        NO_MATCH
    }
}

/// How well the cooking time fits. `distilled` must agree with whether the
/// recipe needs distilling.
pub fn cooking_quality(collection: &IngredientCollection, recipe: &Recipe, distilled: bool) -> i32 {
    if recipe.needs_distilling() != distilled {
        return NO_MATCH;
    }
    if collection.cooked_time < 1 {
        return 0;
    }

    let off = (collection.cooked_time - recipe.cooking_time).abs() as f32
        / recipe.allowed_time_diff(recipe.cooking_time) as f32;
    let quality = 10 - round_half_up(off as f64 * 10.0);
    if quality >= 0 { quality } else { NO_MATCH }
}

/// How well the time spent aging fits the target age.
pub fn age_quality(recipe: &Recipe, time: f32) -> i32 {
    let off = (time - recipe.age as f32).abs() * (recipe.difficulty as f32 / 2.0);
    (10 - round_half_up(off as f64)).max(0)
}

/// How well the number of distill runs fits.
pub fn distill_quality(recipe: &Recipe, runs: i32) -> i32 {
    if recipe.needs_distilling() != (runs > 0) {
        return 0;
    }
    10 - (recipe.distill_runs - runs).abs()
}

// ============================================================================
// Engine
// ============================================================================

/// Base wood score by distance for the distance-table algorithm
const WOOD_DISTANCE_QUALITY: [f32; 6] = [10.0, 9.0, 7.75, 6.25, 4.5, 2.5];

/// Result of taking a brew out of the cauldron
#[derive(Debug, Clone, PartialEq)]
pub enum CookOutcome {
    /// A cooking-only recipe fits best
    Brewed {
        recipe: Arc<Recipe>,
        quality: i32,
        alcohol: i32,
    },
    /// Taken out before it cooked at all
    ThickBrew,
    /// Cooked, but not towards any cooking-only recipe
    Undefined,
}

/// Recipe scoring with the configurable wood-fit algorithm.
#[derive(Debug, Clone, Copy)]
pub struct QualityEngine {
    /// Distance-table wood scoring instead of the linear one
    pub new_wood_algorithm: bool,
}

impl QualityEngine {
    pub fn new(new_wood_algorithm: bool) -> Self {
        Self { new_wood_algorithm }
    }

    /// How well the barrel wood fits the recipe's acceptable woods.
    pub fn wood_quality(&self, recipe: &Recipe, wood: BarrelWoodType) -> i32 {
        if recipe.uses_any_wood() {
            return 10;
        }
        let distance = recipe.wood_distance(wood);
        let difficulty = recipe.difficulty as f32;

        if self.new_wood_algorithm {
            // At difficulty 1 distances 0-5 give 10, 10, 9, 8, 7, 6
            // At difficulty 5 they give 10, 8, 4, 1, 0, 0
            let Some(base) = usize::try_from(distance)
                .ok()
                .and_then(|d| WOOD_DISTANCE_QUALITY.get(d))
            else {
                return 0;
            };
            let quality = 10.0 - (10.0 - base) * 0.5 * difficulty;
            round_half_up(quality as f64).max(0)
        } else {
            (10 - round_half_up((distance as f32 * difficulty) as f64)).max(0)
        }
    }

    /// Highest scoring recipe for these ingredients and process values.
    ///
    /// Aging and wood only count when the recipe ages or `time` is past half
    /// a year. Ties keep the recipe that comes first in the catalog, and a
    /// recipe needs a score above 0 to be picked.
    pub fn best_recipe(
        &self,
        collection: &IngredientCollection,
        catalog: &RecipeCatalog,
        wood: BarrelWoodType,
        time: f32,
        distilled: bool,
    ) -> Option<Arc<Recipe>> {
        let mut best_quality: f32 = 0.0;
        let mut best: Option<&Arc<Recipe>> = None;

        for recipe in catalog.iter() {
            let ingredient = ingredient_quality(collection, recipe);
            let cooking = cooking_quality(collection, recipe, distilled);
            if ingredient <= NO_MATCH || cooking <= NO_MATCH {
                continue;
            }

            let quality = if recipe.needs_to_age() || time > 0.5 {
                let age = age_quality(recipe, time);
                let wood = self.wood_quality(recipe, wood);
                debug!(
                    "Ingredient Quality: {} Cooking Quality: {} Wood Quality: {} Age Quality: {} for {}",
                    ingredient,
                    cooking,
                    wood,
                    age,
                    recipe.recipe_name()
                );
                (ingredient + cooking + wood + age) as f32 / 4.0
            } else {
                debug!(
                    "Ingredient Quality: {} Cooking Quality: {} for {}",
                    ingredient,
                    cooking,
                    recipe.recipe_name()
                );
                (ingredient + cooking) as f32 / 2.0
            };

            if quality > best_quality {
                best_quality = quality;
                best = Some(recipe);
            }
        }

        if let Some(recipe) = best {
            debug!("Best recipe: {} has Quality= {}", recipe.recipe_name(), best_quality);
        }
        best.cloned()
    }

    /// Best recipe straight from the cauldron, if it is cooking-only.
    ///
    /// The type check runs after the search, so a better scoring recipe of
    /// another type hides a cooking-only one.
    pub fn cook_recipe(
        &self,
        collection: &IngredientCollection,
        catalog: &RecipeCatalog,
    ) -> Option<Arc<Recipe>> {
        self.best_recipe(collection, catalog, BarrelWoodType::Any, 0.0, false)
            .filter(|r| r.is_cooking_only())
    }

    /// Best recipe after distilling, if it needs distilling.
    pub fn distill_recipe(
        &self,
        collection: &IngredientCollection,
        catalog: &RecipeCatalog,
        wood: BarrelWoodType,
        time: f32,
    ) -> Option<Arc<Recipe>> {
        self.best_recipe(collection, catalog, wood, time, true)
            .filter(|r| r.needs_distilling())
    }

    /// Best recipe after barrel aging, if it needs aging.
    pub fn age_recipe(
        &self,
        collection: &IngredientCollection,
        catalog: &RecipeCatalog,
        wood: BarrelWoodType,
        time: f32,
        distilled: bool,
    ) -> Option<Arc<Recipe>> {
        self.best_recipe(collection, catalog, wood, time, distilled)
            .filter(|r| r.needs_to_age())
    }

    /// Finish cooking at `state` minutes and work out what came out.
    pub fn cook(
        &self,
        collection: &mut IngredientCollection,
        state: i32,
        catalog: &RecipeCatalog,
    ) -> CookOutcome {
        collection.cooked_time = state;

        if let Some(recipe) = self.cook_recipe(collection, catalog) {
            let ingredient = ingredient_quality(collection, &recipe);
            let cooking = cooking_quality(collection, &recipe, false);
            let quality = round_half_up((ingredient + cooking) as f64 / 2.0);
            let alcohol = round_half_up((recipe.alcohol as f32 * (quality as f32 / 10.0)) as f64);
            debug!("Cooked potion has Quality: {}, Alc: {}", quality, alcohol);
            return CookOutcome::Brewed {
                recipe,
                quality,
                alcohol,
            };
        }

        if state <= 0 {
            CookOutcome::ThickBrew
        } else {
            CookOutcome::Undefined
        }
    }
}

impl Default for QualityEngine {
    fn default() -> Self {
        Self::new(true)
    }
}
