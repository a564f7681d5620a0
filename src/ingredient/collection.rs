//! Ingredient collections

use super::kinds::IngredientKind;

/// One ingredient kind with how many of it are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub kind: IngredientKind,
    pub amount: i32,
}

impl Ingredient {
    pub fn new(kind: IngredientKind, amount: i32) -> Self {
        Self { kind, amount }
    }
}

/// Ordered ingredients plus how long they have been cooking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngredientCollection {
    ingredients: Vec<Ingredient>,
    /// Minutes spent cooking
    pub cooked_time: i32,
}

impl IngredientCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cooked_time(cooked_time: i32) -> Self {
        Self {
            ingredients: Vec::new(),
            cooked_time,
        }
    }

    pub fn from_ingredients(ingredients: Vec<Ingredient>, cooked_time: i32) -> Self {
        Self {
            ingredients,
            cooked_time,
        }
    }

    /// Add a single item, stacking onto a similar entry if there is one
    pub fn add(&mut self, kind: IngredientKind) {
        self.add_with_amount(kind, 1);
    }

    pub fn add_with_amount(&mut self, kind: IngredientKind, amount: i32) {
        match self.ingredients.iter_mut().find(|i| i.kind.is_similar(&kind)) {
            Some(existing) => existing.amount += amount,
            None => self.ingredients.push(Ingredient::new(kind, amount)),
        }
    }

    /// Append without merging. Used when rebuilding a stored record as-is.
    pub fn push(&mut self, ingredient: Ingredient) {
        self.ingredients.push(ingredient);
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.ingredients
    }

    /// Total item count over all entries
    pub fn ingredients_count(&self) -> i32 {
        self.ingredients.iter().map(|i| i.amount).sum()
    }

    /// Number of distinct entries
    pub fn len(&self) -> usize {
        self.ingredients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }
}
