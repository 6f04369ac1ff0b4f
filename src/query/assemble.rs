//! Result assembly.
//!
//! Joins neighbor hits with their recipe rows, coerces each row's scalar fields,
//! and computes which of the recipe's ingredients the user has and which are
//! missing. A row that fails coercion is dropped with a warning; the rest of
//! the batch is unaffected.

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{NutritionFacts, RawField, RecipeRecord, RecipeRow, RecommendationResult};
use crate::normalize::{ingredient_key, normalize};

/// A field of one recipe row could not be coerced to its documented type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordCoercionError {
    #[error("row {row}: field '{field}' is missing")]
    Missing { row: usize, field: &'static str },

    #[error("row {row}: field '{field}' has malformed value '{value}'")]
    Malformed {
        row: usize,
        field: &'static str,
        value: String,
    },
}

/// One neighbor joined with its recipe row.
#[derive(Debug, Clone, Copy)]
pub struct Hit<'a> {
    /// Position in the recipe table
    pub row: usize,
    pub recipe: &'a RecipeRow,
    /// Cosine distance to the query
    pub distance: f64,
}

fn float_field(row: usize, field: &'static str, raw: &RawField) -> Result<f64, RecordCoercionError> {
    if raw.is_missing() {
        return Err(RecordCoercionError::Missing { row, field });
    }
    raw.as_f64().ok_or_else(|| RecordCoercionError::Malformed {
        row,
        field,
        value: raw.to_string(),
    })
}

fn int_field(row: usize, field: &'static str, raw: &RawField) -> Result<i64, RecordCoercionError> {
    if raw.is_missing() {
        return Err(RecordCoercionError::Missing { row, field });
    }
    raw.as_i64().ok_or_else(|| RecordCoercionError::Malformed {
        row,
        field,
        value: raw.to_string(),
    })
}

/// Coerce a stored row into a typed record.
///
/// # Errors
/// Returns `RecordCoercionError` naming the first field that is missing or malformed
pub fn coerce_record(row: usize, recipe: &RecipeRow) -> Result<RecipeRecord, RecordCoercionError> {
    let review_nums = int_field(row, "review_nums", &recipe.review_nums)?;
    let review_count = u64::try_from(review_nums).map_err(|_| RecordCoercionError::Malformed {
        row,
        field: "review_nums",
        value: recipe.review_nums.to_string(),
    })?;

    Ok(RecipeRecord {
        id: int_field(row, "recipe_id", &recipe.recipe_id)?,
        name: recipe.recipe_name.clone(),
        image_url: recipe.image_url.clone(),
        rating: float_field(row, "aver_rate", &recipe.aver_rate)?,
        review_count,
        nutrition: NutritionFacts {
            calories: float_field(row, "calories", &recipe.calories)?,
            fat: float_field(row, "fat", &recipe.fat)?,
            carbohydrates: float_field(row, "carbohydrates", &recipe.carbohydrates)?,
            protein: float_field(row, "protein", &recipe.protein)?,
            cholesterol: float_field(row, "cholesterol", &recipe.cholesterol)?,
            sodium: float_field(row, "sodium", &recipe.sodium)?,
            fiber: float_field(row, "fiber", &recipe.fiber)?,
        },
    })
}

/// Convert a cosine distance to a similarity in [0, 1], rounded to two decimals.
pub fn similarity_from_distance(distance: f64) -> f64 {
    let similarity = 1.0 - distance;
    if !similarity.is_finite() {
        return 0.0;
    }
    (similarity.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

/// Case-folded, de-duplicated ingredient set; blank names are dropped.
pub fn ingredient_set<S: AsRef<str>>(ingredients: &[S]) -> BTreeSet<String> {
    ingredients
        .iter()
        .map(|name| ingredient_key(name.as_ref()))
        .filter(|key| !key.is_empty())
        .collect()
}

/// Build recommendation results for `hits`, preserving their order.
///
/// # Arguments
/// * `query` - The user's ingredients
/// * `hits` - Neighbors in ranked order, joined with their recipe rows
///
/// # Returns
/// One result per hit whose row coerces cleanly
pub fn assemble<'a, I>(query: &[String], hits: I) -> Vec<RecommendationResult>
where
    I: IntoIterator<Item = Hit<'a>>,
{
    let query_set = ingredient_set(query);

    hits.into_iter()
        .filter_map(|hit| {
            let recipe = match coerce_record(hit.row, hit.recipe) {
                Ok(recipe) => recipe,
                Err(e) => {
                    warn!(error = %e, "Dropping recipe from results");
                    return None;
                }
            };

            let ingredients = normalize(&hit.recipe.ingredients_list);
            let recipe_set = ingredient_set(&ingredients);
            let available: BTreeSet<String> = recipe_set.intersection(&query_set).cloned().collect();
            let missing: BTreeSet<String> = recipe_set.difference(&query_set).cloned().collect();

            debug!(
                recipe = %recipe.name,
                available = ?available,
                missing = ?missing,
                "Assembled result"
            );

            Some(RecommendationResult {
                recipe,
                ingredients,
                available,
                missing,
                similarity: similarity_from_distance(hit.distance),
            })
        })
        .collect()
}
