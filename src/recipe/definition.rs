//! Recipe Definitions
//!
//! Raw TOML structures for recipe files and the validated, immutable
//! [`Recipe`] they resolve into.

use serde::Deserialize;

use super::color::PotionColor;
use super::wood::BarrelWoodType;
use crate::error::RecipeError;
use crate::ingredient::{CustomItem, Ingredient, IngredientKind, PluginItem, SimpleItem};
use crate::quality::round_half_up;

/// Distill runs are capped to fit a signed byte.
pub const MAX_DISTILL_RUNS: i32 = i8::MAX as i32;

// ============================================================================
// Quality-tiered text
// ============================================================================

/// A line of lore or a command, shown for one quality band.
///
/// Tier 0 applies to every quality, tiers 1, 2 and 3 to bad, normal and good.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityText {
    pub tier: u8,
    pub text: String,
}

impl QualityText {
    /// Parse the `+` / `++` / `+++` prefixed config form.
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim_start();
        let tier = trimmed.chars().take(3).take_while(|c| *c == '+').count();
        Self {
            tier: tier as u8,
            text: trimmed[tier..].trim().to_string(),
        }
    }
}

/// Quality band 1, 2 or 3 for a 0-10 quality.
pub fn quality_tier(quality: i32) -> u8 {
    if quality <= 3 {
        1
    } else if quality <= 7 {
        2
    } else {
        3
    }
}

/// Entries of `source` that apply at `quality`.
pub fn strings_for_quality(quality: i32, source: &[QualityText]) -> Vec<&str> {
    let tier = quality_tier(quality);
    source
        .iter()
        .filter(|line| line.tier == 0 || line.tier == tier)
        .map(|line| line.text.as_str())
        .collect()
}

/// A command run on drinking, with an optional delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeCommand {
    pub command: String,
    /// Game ticks to wait, 20 per second
    pub delay_ticks: u64,
}

impl RecipeCommand {
    /// Parse `cmd args` or `cmd args/10s` / `cmd args/2m`, leading `/` optional.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.strip_prefix('/').unwrap_or(raw);
        if let Some((command, delay)) = raw.split_once('/') {
            let delay = delay.trim();
            let ticks = if let Some(seconds) = delay.strip_suffix('s') {
                seconds.parse::<u64>().map_or(0, |s| s * 20)
            } else if let Some(minutes) = delay.strip_suffix('m') {
                minutes.parse::<u64>().map_or(0, |m| m * 1200)
            } else {
                0
            };
            return Self {
                command: command.trim().to_string(),
                delay_ticks: ticks,
            };
        }
        Self {
            command: raw.trim().to_string(),
            delay_ticks: 0,
        }
    }
}

// ============================================================================
// Recipe
// ============================================================================

/// A validated recipe. Built through [`RecipeBuilder`] or a recipe file.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: Option<String>,
    names: Vec<String>,
    ingredients: Vec<Ingredient>,
    pub difficulty: i32,
    pub cooking_time: i32,
    pub distill_runs: i32,
    /// Seconds per distill run
    pub distill_time: i32,
    woods: Vec<BarrelWoodType>,
    /// Target age in barrel years
    pub age: i32,
    pub color: PotionColor,
    pub alcohol: i32,
    pub lore: Vec<QualityText>,
    pub player_commands: Vec<QualityText>,
    pub server_commands: Vec<QualityText>,
    pub drink_message: Option<String>,
    pub drink_title: Option<String>,
    pub glint: bool,
    pub model_data: Option<[i32; 3]>,
    /// Kept across restarts when added at runtime
    pub save_in_data: bool,
}

impl Recipe {
    pub fn builder(name: impl Into<String>) -> RecipeBuilder {
        RecipeBuilder::new(vec![name.into()])
    }

    /// Builder for a recipe with bad, normal and good names
    pub fn builder_tiered(bad: &str, normal: &str, good: &str) -> RecipeBuilder {
        RecipeBuilder::new(vec![bad.to_string(), normal.to_string(), good.to_string()])
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name_for_quality(&self, quality: i32) -> &str {
        if self.names.len() > 2 {
            &self.names[quality_tier(quality) as usize - 1]
        } else {
            &self.names[0]
        }
    }

    /// The normal-quality name
    pub fn recipe_name(&self) -> &str {
        self.name_for_quality(5)
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }

    pub fn woods(&self) -> &[BarrelWoodType] {
        &self.woods
    }

    /// First acceptable wood
    pub fn primary_wood(&self) -> BarrelWoodType {
        self.woods.first().copied().unwrap_or_default()
    }

    pub fn uses_any_wood(&self) -> bool {
        self.primary_wood() == BarrelWoodType::Any
    }

    /// Smallest distance from `wood` to any acceptable wood
    pub fn wood_distance(&self, wood: BarrelWoodType) -> i32 {
        self.woods.iter().map(|w| w.distance(wood)).min().unwrap_or(0)
    }

    pub fn is_cooking_only(&self) -> bool {
        self.age == 0 && self.distill_runs == 0
    }

    pub fn needs_distilling(&self) -> bool {
        self.distill_runs != 0
    }

    pub fn needs_to_age(&self) -> bool {
        self.age != 0
    }

    pub fn is_alcoholic(&self) -> bool {
        self.alcohol > 0
    }

    /// Required amount of the first recipe ingredient `offered` matches, or 0.
    pub fn amount_of(&self, offered: &IngredientKind) -> i32 {
        self.ingredients
            .iter()
            .find(|required| required.kind.matches(offered))
            .map_or(0, |required| required.amount)
    }

    /// True if some required ingredient has no match among `offered`.
    pub fn is_missing_ingredients(&self, offered: &[Ingredient]) -> bool {
        if offered.len() < self.ingredients.len() {
            return true;
        }
        self.ingredients
            .iter()
            .any(|required| !offered.iter().any(|used| required.kind.matches(&used.kind)))
    }

    pub fn missing_ingredients(&self, offered: &[Ingredient]) -> Vec<&Ingredient> {
        self.ingredients
            .iter()
            .filter(|required| !offered.iter().any(|used| required.kind.matches(&used.kind)))
            .collect()
    }

    /// How far an ingredient count may be off at this difficulty. Never 0.
    pub fn allowed_count_diff(&self, count: i32) -> i32 {
        allowed_diff(self.difficulty, count)
    }

    /// How far the cooking time may be off at this difficulty. Never 0.
    pub fn allowed_time_diff(&self, time: i32) -> i32 {
        allowed_diff(self.difficulty, time)
    }

    pub fn lore_for_quality(&self, quality: i32) -> Vec<&str> {
        strings_for_quality(quality, &self.lore)
    }

    pub fn player_commands_for_quality(&self, quality: i32) -> Vec<RecipeCommand> {
        strings_for_quality(quality, &self.player_commands)
            .into_iter()
            .map(RecipeCommand::parse)
            .collect()
    }

    pub fn server_commands_for_quality(&self, quality: i32) -> Vec<RecipeCommand> {
        strings_for_quality(quality, &self.server_commands)
            .into_iter()
            .map(RecipeCommand::parse)
            .collect()
    }

    pub fn model_data_for_quality(&self, quality: i32) -> Option<i32> {
        self.model_data
            .map(|data| data[quality_tier(quality) as usize - 1])
    }

    /// Create a resolved recipe from raw TOML data
    pub fn from_raw(id: &str, raw: &RawRecipeDefinition) -> Result<Self, RecipeError> {
        let names: Vec<String> = raw.name.split('/').map(str::to_string).collect();
        // Two names are not a tier set, only the first one is used
        let names = if names.len() > 2 {
            names
        } else {
            names.into_iter().take(1).collect()
        };

        let mut builder = RecipeBuilder::new(names)
            .id(id)
            .difficulty(raw.difficulty)
            .cook(raw.cooking_time)
            .distill(raw.distill_runs, raw.distill_time)
            .alcohol(raw.alcohol)
            .glint(raw.glint);

        for ingredient in &raw.ingredients {
            let (kind, amount) = ingredient.resolve();
            builder = builder.ingredient(kind, amount);
        }

        let woods = raw
            .wood
            .clone()
            .map(RawWood::into_specs)
            .unwrap_or_default()
            .iter()
            .map(WoodSpec::resolve)
            .collect::<Result<Vec<_>, _>>()?;
        builder = builder.age(raw.age, woods);

        if let Some(color) = &raw.color {
            builder = builder.color(PotionColor::parse(color)?);
        }
        for line in &raw.lore {
            builder = builder.quality_lore(QualityText::parse(line));
        }
        for line in &raw.player_commands {
            builder = builder.player_command(QualityText::parse(line));
        }
        for line in &raw.server_commands {
            builder = builder.server_command(QualityText::parse(line));
        }
        if let Some(message) = &raw.drink_message {
            builder = builder.drink_message(message);
        }
        if let Some(title) = &raw.drink_title {
            builder = builder.drink_title(title);
        }
        if let Some(data) = &raw.custom_model_data {
            builder = builder.model_data(parse_model_data(data));
        }

        builder.build()
    }
}

fn allowed_diff(difficulty: i32, value: i32) -> i32 {
    let value = value.max(8);
    let allowed = round_half_up(((11.0 - difficulty as f64) * (value as f64 / 10.0)) as f32 as f64);
    if allowed == 0 { 1 } else { allowed }
}

/// `a/b/c` model data, missing entries repeat the one before.
fn parse_model_data(raw: &str) -> [i32; 3] {
    let parts: Vec<&str> = raw.split('/').collect();
    let mut data = [0i32; 3];
    for i in 0..3 {
        data[i] = match parts.get(i).and_then(|p| p.trim().parse().ok()) {
            Some(value) => value,
            None if i == 0 => 0,
            None => data[i - 1],
        };
    }
    data
}

// ============================================================================
// Builder
// ============================================================================

/// Staged recipe construction; validation happens in [`RecipeBuilder::build`].
#[derive(Debug, Clone)]
pub struct RecipeBuilder {
    recipe: Recipe,
}

impl RecipeBuilder {
    fn new(names: Vec<String>) -> Self {
        Self {
            recipe: Recipe {
                id: None,
                names,
                ingredients: Vec::new(),
                difficulty: 5,
                cooking_time: 0,
                distill_runs: 0,
                distill_time: 0,
                woods: Vec::new(),
                age: 0,
                color: PotionColor::default(),
                alcohol: 0,
                lore: Vec::new(),
                player_commands: Vec::new(),
                server_commands: Vec::new(),
                drink_message: None,
                drink_title: None,
                glint: false,
                model_data: None,
                save_in_data: false,
            },
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.recipe.id = Some(id.to_string());
        self
    }

    pub fn ingredient(mut self, kind: IngredientKind, amount: i32) -> Self {
        self.recipe.ingredients.push(Ingredient::new(kind, amount));
        self
    }

    pub fn difficulty(mut self, difficulty: i32) -> Self {
        self.recipe.difficulty = difficulty;
        self
    }

    pub fn cook(mut self, cooking_time: i32) -> Self {
        self.recipe.cooking_time = cooking_time;
        self
    }

    pub fn distill(mut self, runs: i32, time: i32) -> Self {
        self.recipe.distill_runs = runs.min(MAX_DISTILL_RUNS);
        self.recipe.distill_time = time;
        self
    }

    /// Aging target and acceptable woods. Any `Any` in the list accepts all woods.
    pub fn age(mut self, age: i32, woods: Vec<BarrelWoodType>) -> Self {
        self.recipe.age = age;
        self.recipe.woods = if woods.contains(&BarrelWoodType::Any) {
            vec![BarrelWoodType::Any]
        } else {
            woods
        };
        self
    }

    pub fn color(mut self, color: PotionColor) -> Self {
        self.recipe.color = color;
        self
    }

    pub fn alcohol(mut self, alcohol: i32) -> Self {
        self.recipe.alcohol = alcohol;
        self
    }

    pub fn quality_lore(mut self, line: QualityText) -> Self {
        self.recipe.lore.push(line);
        self
    }

    pub fn player_command(mut self, line: QualityText) -> Self {
        self.recipe.player_commands.push(line);
        self
    }

    pub fn server_command(mut self, line: QualityText) -> Self {
        self.recipe.server_commands.push(line);
        self
    }

    pub fn drink_message(mut self, message: &str) -> Self {
        self.recipe.drink_message = Some(message.to_string());
        self
    }

    pub fn drink_title(mut self, title: &str) -> Self {
        self.recipe.drink_title = Some(title.to_string());
        self
    }

    pub fn glint(mut self, glint: bool) -> Self {
        self.recipe.glint = glint;
        self
    }

    pub fn model_data(mut self, data: [i32; 3]) -> Self {
        self.recipe.model_data = Some(data);
        self
    }

    pub fn save_in_data(mut self, save: bool) -> Self {
        self.recipe.save_in_data = save;
        self
    }

    pub fn build(self) -> Result<Recipe, RecipeError> {
        let recipe = self.recipe;

        if !(recipe.names.len() == 1 || recipe.names.len() == 3)
            || recipe.names.iter().any(|n| n.trim().is_empty())
        {
            return Err(RecipeError::NameCount(recipe.names.len()));
        }
        if recipe.ingredients.is_empty() {
            return Err(RecipeError::NoIngredients);
        }
        if let Some(bad) = recipe.ingredients.iter().find(|i| i.amount < 1) {
            return Err(RecipeError::IngredientAmount(bad.kind.describe(), bad.amount));
        }
        if recipe.cooking_time < 1 {
            return Err(RecipeError::CookingTime(recipe.cooking_time));
        }
        if recipe.distill_time < 0 {
            return Err(RecipeError::DistillTime(recipe.distill_time));
        }
        if recipe.age < 0 {
            return Err(RecipeError::Age(recipe.age));
        }
        if !(0..=10).contains(&recipe.difficulty) {
            return Err(RecipeError::Difficulty(recipe.difficulty));
        }
        let tiers = recipe
            .lore
            .iter()
            .chain(&recipe.player_commands)
            .chain(&recipe.server_commands);
        for line in tiers {
            if line.tier > 3 {
                return Err(RecipeError::QualityTier(line.tier));
            }
        }

        Ok(recipe)
    }
}

// ============================================================================
// Raw TOML Structures
// ============================================================================

fn default_amount() -> i32 {
    1
}

/// Raw ingredient entry from TOML, tagged by `type`
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawIngredient {
    Simple {
        material: String,
        #[serde(default)]
        durability: i16,
        #[serde(default = "default_amount")]
        amount: i32,
    },
    Custom {
        material: Option<String>,
        name: Option<String>,
        #[serde(default)]
        lore: Vec<String>,
        #[serde(default)]
        model_data: i32,
        #[serde(default = "default_amount")]
        amount: i32,
    },
    Plugin {
        plugin: String,
        item_id: String,
        #[serde(default = "default_amount")]
        amount: i32,
    },
}

impl RawIngredient {
    fn resolve(&self) -> (IngredientKind, i32) {
        match self {
            RawIngredient::Simple {
                material,
                durability,
                amount,
            } => (
                IngredientKind::Simple(SimpleItem::with_durability(material.as_str(), *durability)),
                *amount,
            ),
            RawIngredient::Custom {
                material,
                name,
                lore,
                model_data,
                amount,
            } => (
                IngredientKind::Custom(CustomItem {
                    material: material.as_deref().map(crate::ingredient::kinds::normalize_material),
                    name: name.clone(),
                    lore: lore.clone(),
                    model_data: *model_data,
                }),
                *amount,
            ),
            RawIngredient::Plugin {
                plugin,
                item_id,
                amount,
            } => (
                IngredientKind::Plugin(PluginItem::new(plugin.as_str(), item_id.as_str())),
                *amount,
            ),
        }
    }
}

/// A wood given by name or index
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WoodSpec {
    Index(i32),
    Name(String),
}

impl WoodSpec {
    fn resolve(&self) -> Result<BarrelWoodType, RecipeError> {
        match self {
            WoodSpec::Index(index) => BarrelWoodType::from_index(*index)
                .ok_or_else(|| RecipeError::UnknownWood(index.to_string())),
            WoodSpec::Name(name) => {
                BarrelWoodType::from_name(name).ok_or_else(|| RecipeError::UnknownWood(name.clone()))
            }
        }
    }
}

/// One wood or a ranked list of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawWood {
    One(WoodSpec),
    Many(Vec<WoodSpec>),
}

impl RawWood {
    fn into_specs(self) -> Vec<WoodSpec> {
        match self {
            RawWood::One(spec) => vec![spec],
            RawWood::Many(specs) => specs,
        }
    }
}

/// Raw recipe definition from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecipeDefinition {
    /// One name, or `bad/normal/good`
    pub name: String,
    #[serde(default)]
    pub ingredients: Vec<RawIngredient>,
    #[serde(default)]
    pub cooking_time: i32,
    #[serde(default)]
    pub distill_runs: i32,
    #[serde(default)]
    pub distill_time: i32,
    pub wood: Option<RawWood>,
    #[serde(default)]
    pub age: i32,
    pub color: Option<String>,
    #[serde(default)]
    pub difficulty: i32,
    #[serde(default)]
    pub alcohol: i32,
    #[serde(default)]
    pub lore: Vec<String>,
    #[serde(default)]
    pub player_commands: Vec<String>,
    #[serde(default)]
    pub server_commands: Vec<String>,
    pub drink_message: Option<String>,
    pub drink_title: Option<String>,
    #[serde(default)]
    pub glint: bool,
    pub custom_model_data: Option<String>,
}
