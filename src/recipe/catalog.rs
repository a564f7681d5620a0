//! Recipe Catalog
//!
//! Loads recipe files and keeps the ordered recipe list. Recipes from
//! configuration always come first, recipes added at runtime after them.
//! Iteration order is the tie-break order for recipe selection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::definition::{RawRecipeDefinition, Recipe};

/// Ordered recipe catalog
#[derive(Debug, Default)]
pub struct RecipeCatalog {
    config: Vec<Arc<Recipe>>,
    added: Vec<Arc<Recipe>>,
}

impl RecipeCatalog {
    pub fn new() -> Self {
        Self {
            config: Vec::new(),
            added: Vec::new(),
        }
    }

    /// Load `<data_dir>/recipes/*.toml` as the configuration recipes.
    ///
    /// Files are read in file-name order and recipes in document order.
    /// Unreadable files and recipes that fail validation are logged and left
    /// out. Only an unreadable directory is an error.
    pub fn load_from_directory(&mut self, data_dir: &Path) -> Result<(), String> {
        let recipes_dir = data_dir.join("recipes");

        if !recipes_dir.exists() {
            warn!("Recipes directory does not exist: {:?}", recipes_dir);
            self.config.clear();
            return Ok(());
        }

        let entries = std::fs::read_dir(&recipes_dir)
            .map_err(|e| format!("Failed to read recipes directory: {}", e))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| format!("Failed to read entry: {}", e))?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "toml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut loaded = Vec::new();
        for path in paths {
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    error!("Failed to read {:?}, skipping: {}", path, e);
                    continue;
                }
            };

            // Table keeps document order with preserve_order
            let table: toml::Table = match toml::from_str(&content) {
                Ok(table) => table,
                Err(e) => {
                    error!("Failed to parse {:?}, skipping: {}", path, e);
                    continue;
                }
            };

            for (id, value) in table {
                let raw: RawRecipeDefinition = match value.try_into() {
                    Ok(raw) => raw,
                    Err(e) => {
                        error!("Invalid recipe '{}' in {:?}: {}", id, path, e);
                        continue;
                    }
                };
                match Recipe::from_raw(&id, &raw) {
                    Ok(recipe) => {
                        if loaded.iter().any(|r: &Arc<Recipe>| r.id.as_deref() == Some(id.as_str())) {
                            warn!("Duplicate recipe ID '{}' in {:?}, keeping both", id, path);
                        }
                        info!(
                            "Loaded recipe: {} ({}) - {} ingredients",
                            recipe.recipe_name(),
                            id,
                            recipe.ingredients().len()
                        );
                        loaded.push(Arc::new(recipe));
                    }
                    Err(e) => error!("Recipe '{}' in {:?} excluded: {}", id, path, e),
                }
            }
        }

        info!("Loaded {} recipe definitions", loaded.len());
        self.config = loaded;

        Ok(())
    }

    /// Replace the configuration part, keeping added recipes after it
    pub fn replace_config(&mut self, recipes: Vec<Recipe>) {
        self.config = recipes.into_iter().map(Arc::new).collect();
    }

    /// Append a runtime recipe after all others
    pub fn add(&mut self, recipe: Recipe) -> Arc<Recipe> {
        let recipe = Arc::new(recipe);
        self.added.push(Arc::clone(&recipe));
        recipe
    }

    /// Remove a runtime recipe. Configuration recipes cannot be removed.
    pub fn remove_added(&mut self, recipe: &Arc<Recipe>) -> bool {
        let before = self.added.len();
        self.added.retain(|r| !Arc::ptr_eq(r, recipe));
        self.added.len() != before
    }

    /// Every recipe, configuration first
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Recipe>> {
        self.config.iter().chain(self.added.iter())
    }

    pub fn config_recipes(&self) -> &[Arc<Recipe>] {
        &self.config
    }

    pub fn added_recipes(&self) -> &[Arc<Recipe>] {
        &self.added
    }

    /// Lookup by normal-quality name, ignoring case
    pub fn get(&self, name: &str) -> Option<&Arc<Recipe>> {
        self.iter().find(|r| r.recipe_name().eq_ignore_ascii_case(name))
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Arc<Recipe>> {
        self.iter().find(|r| r.id.as_deref() == Some(id))
    }

    /// Name, then bad or good name, then id
    pub fn get_matching(&self, name: &str) -> Option<&Arc<Recipe>> {
        self.get(name)
            .or_else(|| {
                self.iter().find(|r| {
                    r.name_for_quality(1).eq_ignore_ascii_case(name)
                        || r.name_for_quality(10).eq_ignore_ascii_case(name)
                })
            })
            .or_else(|| {
                self.iter()
                    .find(|r| r.id.as_deref().is_some_and(|id| id.eq_ignore_ascii_case(name)))
            })
    }

    pub fn len(&self) -> usize {
        self.config.len() + self.added.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingredient::{IngredientKind, SimpleItem};
    use std::fs;
    use tempfile::TempDir;

    fn recipe(name: &str) -> Recipe {
        Recipe::builder(name)
            .ingredient(IngredientKind::Simple(SimpleItem::new("WHEAT")), 1)
            .cook(5)
            .build()
            .unwrap()
    }

    #[test]
    fn test_load_from_directory() {
        let temp_dir = TempDir::new().unwrap();
        let recipes_dir = temp_dir.path().join("recipes");
        fs::create_dir(&recipes_dir).unwrap();

        fs::write(
            recipes_dir.join("b_spirits.toml"),
            r#"
            [vodka]
            name = "Lousy Vodka/Vodka/Russian Vodka"
            cooking_time = 15
            distill_runs = 3
            [[vodka.ingredients]]
            type = "simple"
            material = "POTATO"
            amount = 10

            [broken]
            name = "Broken"
            cooking_time = 0
            [[broken.ingredients]]
            type = "simple"
            material = "DIRT"

            [absinthe]
            name = "Absinthe"
            cooking_time = 3
            distill_runs = 6
            [[absinthe.ingredients]]
            type = "simple"
            material = "SHORT_GRASS"
            amount = 15
            "#,
        )
        .unwrap();

        fs::write(
            recipes_dir.join("a_beer.toml"),
            r#"
            [wheat_beer]
            name = "Wheatbeer"
            cooking_time = 8
            [[wheat_beer.ingredients]]
            type = "simple"
            material = "WHEAT"
            amount = 3
            "#,
        )
        .unwrap();

        let mut catalog = RecipeCatalog::new();
        catalog.load_from_directory(temp_dir.path()).unwrap();

        // File order then document order; the invalid recipe is skipped
        let ids: Vec<&str> = catalog.iter().filter_map(|r| r.id.as_deref()).collect();
        assert_eq!(ids, vec!["wheat_beer", "vodka", "absinthe"]);
        assert_eq!(catalog.get_matching("russian vodka").unwrap().id.as_deref(), Some("vodka"));
        assert_eq!(catalog.get_matching("ABSINTHE").unwrap().id.as_deref(), Some("absinthe"));
        assert!(catalog.get_by_id("broken").is_none());
    }

    #[test]
    fn test_unparsable_file_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let recipes_dir = temp_dir.path().join("recipes");
        fs::create_dir(&recipes_dir).unwrap();

        fs::write(
            recipes_dir.join("a.toml"),
            r#"
            [ale]
            name = "Ale"
            cooking_time = 4
            [[ale.ingredients]]
            type = "simple"
            material = "WHEAT"
            amount = 2
            "#,
        )
        .unwrap();
        fs::write(recipes_dir.join("b.toml"), "[oops\nname = ").unwrap();

        let mut catalog = RecipeCatalog::new();
        assert!(catalog.load_from_directory(temp_dir.path()).is_ok());
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.get_by_id("ale").unwrap().recipe_name(), "Ale");
    }

    #[test]
    fn test_added_stay_after_config() {
        let mut catalog = RecipeCatalog::new();
        let added = catalog.add(recipe("Runtime"));
        catalog.replace_config(vec![recipe("First"), recipe("Second")]);

        let names: Vec<&str> = catalog.iter().map(|r| r.recipe_name()).collect();
        assert_eq!(names, vec!["First", "Second", "Runtime"]);
        assert_eq!(catalog.config_recipes().len(), 2);

        assert!(catalog.remove_added(&added));
        assert!(!catalog.remove_added(&added));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut catalog = RecipeCatalog::new();
        catalog.load_from_directory(temp_dir.path()).unwrap();
        assert!(catalog.is_empty());
    }
}
