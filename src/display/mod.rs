//! Presentation helpers shared by the CLI and HTTP front-ends.
//!
//! Front-ends accept free text, hand clean ingredient tokens to the query
//! engine, and apply display-only filters to what comes back. None of this
//! changes ranking: filters remove results after the engine has chosen them.

use std::collections::BTreeSet;

use crate::models::RecommendationResult;

/// Split user text such as `"Egg, flour ,, milk"` into ingredient tokens.
///
/// Splits on commas, trims, lower-cases, and drops empty pieces.
pub fn parse_ingredient_input(text: &str) -> Vec<String> {
    text.split(',')
        .map(|piece| piece.trim().to_lowercase())
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Render an ingredient set as a comma-separated list, or `-` when empty.
pub fn format_ingredient_set(set: &BTreeSet<String>) -> String {
    if set.is_empty() {
        "-".to_string()
    } else {
        set.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Display-only thresholds applied after the engine returns.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisplayFilter {
    /// Keep results rated at least this high
    pub min_rating: Option<f64>,

    /// Keep results with at most this many calories
    pub max_calories: Option<f64>,
}

impl DisplayFilter {
    pub fn new(min_rating: Option<f64>, max_calories: Option<f64>) -> Self {
        Self {
            min_rating,
            max_calories,
        }
    }

    /// `true` when no threshold is set.
    pub fn is_empty(&self) -> bool {
        self.min_rating.is_none() && self.max_calories.is_none()
    }

    /// Whether a result passes every threshold (bounds are inclusive).
    pub fn matches(&self, result: &RecommendationResult) -> bool {
        let rating_ok = self
            .min_rating
            .map_or(true, |min| result.recipe.rating >= min);
        let calories_ok = self
            .max_calories
            .map_or(true, |max| result.recipe.nutrition.calories <= max);
        rating_ok && calories_ok
    }

    /// Drop results that fail a threshold, keeping the engine's order.
    pub fn apply(&self, results: Vec<RecommendationResult>) -> Vec<RecommendationResult> {
        if self.is_empty() {
            return results;
        }
        results.into_iter().filter(|r| self.matches(r)).collect()
    }
}
