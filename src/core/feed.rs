//! Feed recipes and the ration calculator.
//!
//! A recipe is a list of ingredients, each a percentage of the mix. The
//! calculator scales a recipe to a target batch weight and estimates how many
//! days the batch lasts at a given daily consumption.

use crate::{
    core::policy::{self, lenient_number, null_as_default},
    errors::{Error, Result},
    store::{KeyValueStore, generate_id, keys, read_list, write_json},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use tracing::info;

/// Percentage total a recipe must reach to count as balanced
pub const BALANCED_TOTAL: RangeInclusive<f64> = 99.0..=101.0;

/// A named feed mix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedRecipe {
    /// Unique identifier of the recipe
    pub id: String,
    /// Producer owning the recipe
    pub owner_id: String,
    /// Display name
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    /// When the recipe was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// How an ingredient share is expressed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProportionType {
    /// Share of the mix in percent
    #[default]
    Percent,
}

/// One ingredient line of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredient {
    /// Unique identifier of the line
    pub id: String,
    /// Recipe the line belongs to
    pub recipe_id: String,
    /// Ingredient name
    #[serde(default, deserialize_with = "null_as_default")]
    pub ingredient_name: String,
    /// Unit of the share
    #[serde(default, deserialize_with = "null_as_default")]
    pub proportion_type: ProportionType,
    /// Share of the mix, 0..=100. Older records stored it as typed text.
    #[serde(default, deserialize_with = "lenient_number")]
    pub proportion_value: f64,
}

/// Values for an ingredient line
#[derive(Debug, Clone, Default)]
pub struct IngredientInput {
    /// Ingredient name, required
    pub ingredient_name: String,
    /// Share in percent, within (0, 100]
    pub proportion_value: f64,
}

/// Quantity of one ingredient in a calculated batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientAmount {
    /// Ingredient name
    pub name: String,
    /// Kilograms needed for the batch
    pub kg: f64,
}

/// Result of scaling a recipe to a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedCalculation {
    /// Recipe scaled
    pub recipe_id: String,
    /// Name of the recipe
    pub recipe_name: String,
    /// Batch weight
    pub target_kg: f64,
    /// Kilograms eaten per day, when given
    pub daily_consumption: Option<f64>,
    /// Days the batch lasts
    pub estimated_days: Option<f64>,
    /// Amount of each ingredient
    pub ingredients: Vec<IngredientAmount>,
}

// ----- Recipes -----

/// Recipes of a producer.
pub async fn list_recipes<S>(store: &S, owner_id: &str) -> Result<Vec<FeedRecipe>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(read_list::<FeedRecipe, _>(store, keys::FEED_RECIPES)
        .await?
        .into_iter()
        .filter(|r| r.owner_id == owner_id)
        .collect())
}

/// Looks a recipe up by id.
pub async fn get_recipe<S>(store: &S, id: &str) -> Result<Option<FeedRecipe>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(read_list::<FeedRecipe, _>(store, keys::FEED_RECIPES)
        .await?
        .into_iter()
        .find(|r| r.id == id))
}

/// Creates a recipe, or renames `recipe_id` when given. `None` when
/// `recipe_id` does not exist.
///
/// # Errors
/// Returns `MissingField` without an owner or name.
pub async fn save_recipe<S>(
    store: &S,
    owner_id: &str,
    recipe_id: Option<&str>,
    name: &str,
) -> Result<Option<FeedRecipe>>
where
    S: KeyValueStore + ?Sized,
{
    if owner_id.trim().is_empty() {
        return Err(Error::MissingField { field: "owner_id" });
    }
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::MissingField { field: "name" });
    }

    let mut recipes: Vec<FeedRecipe> = read_list(store, keys::FEED_RECIPES).await?;
    let recipe = if let Some(id) = recipe_id {
        let Some(existing) = recipes.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        existing.name = name.to_string();
        existing.clone()
    } else {
        let recipe = FeedRecipe {
            id: generate_id(),
            owner_id: owner_id.to_string(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        recipes.push(recipe.clone());
        recipe
    };

    write_json(store, keys::FEED_RECIPES, &recipes).await?;
    info!("Saved feed recipe '{}'", recipe.name);
    Ok(Some(recipe))
}

/// Deletes a recipe and its ingredients.
pub async fn remove_recipe<S>(store: &S, id: &str) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    let recipes: Vec<FeedRecipe> = read_list(store, keys::FEED_RECIPES).await?;
    let before = recipes.len();
    let kept: Vec<FeedRecipe> = recipes.into_iter().filter(|r| r.id != id).collect();
    let removed = kept.len() != before;
    write_json(store, keys::FEED_RECIPES, &kept).await?;

    let items: Vec<RecipeIngredient> = read_list(store, keys::FEED_RECIPE_ITEMS).await?;
    let items: Vec<RecipeIngredient> = items.into_iter().filter(|i| i.recipe_id != id).collect();
    write_json(store, keys::FEED_RECIPE_ITEMS, &items).await?;

    Ok(removed)
}

// ----- Ingredients -----

/// Ingredient lines of a recipe, in stored order.
pub async fn list_ingredients<S>(store: &S, recipe_id: &str) -> Result<Vec<RecipeIngredient>>
where
    S: KeyValueStore + ?Sized,
{
    Ok(read_list::<RecipeIngredient, _>(store, keys::FEED_RECIPE_ITEMS)
        .await?
        .into_iter()
        .filter(|i| i.recipe_id == recipe_id)
        .collect())
}

/// Adds an ingredient line, or replaces `ingredient_id` when given. `None`
/// when `ingredient_id` does not exist.
///
/// # Errors
/// Returns `MissingField` without a name and `InvalidAmount` when the share is
/// not within (0, 100].
pub async fn save_ingredient<S>(
    store: &S,
    recipe_id: &str,
    ingredient_id: Option<&str>,
    input: IngredientInput,
) -> Result<Option<RecipeIngredient>>
where
    S: KeyValueStore + ?Sized,
{
    let name = input.ingredient_name.trim();
    if name.is_empty() {
        return Err(Error::MissingField {
            field: "ingredient_name",
        });
    }
    let value = input.proportion_value;
    if !value.is_finite() || value <= 0.0 || value > 100.0 {
        return Err(Error::InvalidAmount { amount: value });
    }

    let mut items: Vec<RecipeIngredient> = read_list(store, keys::FEED_RECIPE_ITEMS).await?;
    let item = if let Some(id) = ingredient_id {
        let Some(existing) = items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        existing.ingredient_name = name.to_string();
        existing.proportion_value = value;
        existing.clone()
    } else {
        let item = RecipeIngredient {
            id: generate_id(),
            recipe_id: recipe_id.to_string(),
            ingredient_name: name.to_string(),
            proportion_type: ProportionType::Percent,
            proportion_value: value,
        };
        items.push(item.clone());
        item
    };

    write_json(store, keys::FEED_RECIPE_ITEMS, &items).await?;
    Ok(Some(item))
}

/// Deletes an ingredient line; returns whether it existed.
pub async fn remove_ingredient<S>(store: &S, id: &str) -> Result<bool>
where
    S: KeyValueStore + ?Sized,
{
    let items: Vec<RecipeIngredient> = read_list(store, keys::FEED_RECIPE_ITEMS).await?;
    let before = items.len();
    let kept: Vec<RecipeIngredient> = items.into_iter().filter(|i| i.id != id).collect();
    let removed = kept.len() != before;
    write_json(store, keys::FEED_RECIPE_ITEMS, &kept).await?;
    Ok(removed)
}

// ----- Calculator -----

/// Sum of the ingredient shares of a recipe.
#[must_use]
pub fn total_percentage(items: &[RecipeIngredient]) -> f64 {
    items.iter().map(|i| policy::safe_number(i.proportion_value)).sum()
}

/// Whether the shares add up to roughly 100%.
#[must_use]
pub fn is_balanced(items: &[RecipeIngredient]) -> bool {
    BALANCED_TOTAL.contains(&total_percentage(items))
}

/// Scales a recipe to `target_kg`.
///
/// # Errors
/// Returns `InvalidAmount` unless `target_kg` is a positive number.
pub fn calculate(
    recipe: &FeedRecipe,
    items: &[RecipeIngredient],
    target_kg: f64,
    daily_consumption: f64,
) -> Result<FeedCalculation> {
    if !target_kg.is_finite() || target_kg <= 0.0 {
        return Err(Error::InvalidAmount { amount: target_kg });
    }

    let daily = Some(daily_consumption).filter(|d| d.is_finite() && *d > 0.0);

    Ok(FeedCalculation {
        recipe_id: recipe.id.clone(),
        recipe_name: recipe.name.clone(),
        target_kg,
        daily_consumption: daily,
        estimated_days: daily.map(|d| target_kg / d),
        ingredients: items
            .iter()
            .map(|item| IngredientAmount {
                name: item.ingredient_name.clone(),
                kg: target_kg * item.proportion_value / 100.0,
            })
            .collect(),
    })
}

/// Runs the calculator on typed input; decimals may use a comma. `None` when
/// the recipe does not exist.
pub async fn calculate_for_recipe<S>(
    store: &S,
    recipe_id: &str,
    target_kg: &str,
    daily_consumption: &str,
) -> Result<Option<FeedCalculation>>
where
    S: KeyValueStore + ?Sized,
{
    let Some(recipe) = get_recipe(store, recipe_id).await? else {
        return Ok(None);
    };
    let items = list_ingredients(store, recipe_id).await?;

    calculate(
        &recipe,
        &items,
        policy::parse_decimal(target_kg),
        policy::parse_decimal(daily_consumption),
    )
    .map(Some)
}
