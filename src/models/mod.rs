//! Core data models for the recipe recommender.
//!
//! This module contains the data structures shared by the offline indexer and
//! the online query path: the stored corpus row, its coerced form, and the
//! per-query recommendation output.
//!
//! Corpus rows keep their fields exactly as they were found in the source file.
//! Numeric fields are only coerced when a row is turned into a result, so a
//! malformed value costs one result instead of the whole index build.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered, trimmed ingredient names. Duplicates are preserved.
pub type NormalizedIngredients = Vec<String>;

/// Ingredient list as stored in the corpus.
///
/// The corpus mixes several shapes: a native list, a string holding a list
/// literal (`"['egg', 'flour']"`), loosely bracketed comma text (`"[egg, flour]"`),
/// or nothing at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum RawIngredients {
    /// Already an ordered sequence of names
    List(Vec<String>),

    /// Text encoding of a sequence
    Text(String),

    /// Null or absent
    #[default]
    Missing,

    /// Any other JSON shape (numbers, objects, mixed arrays)
    Other(serde_json::Value),
}

impl From<Vec<String>> for RawIngredients {
    fn from(items: Vec<String>) -> Self {
        RawIngredients::List(items)
    }
}

impl From<&str> for RawIngredients {
    fn from(text: &str) -> Self {
        RawIngredients::Text(text.to_string())
    }
}

/// A scalar corpus field before coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum RawField {
    Number(f64),
    Text(String),
    #[default]
    Missing,
}

impl RawField {
    /// Build a field from a CSV cell; blank cells count as missing.
    pub fn from_cell(cell: Option<String>) -> Self {
        match cell {
            Some(text) if !text.trim().is_empty() => RawField::Text(text),
            _ => RawField::Missing,
        }
    }

    /// Interpret the field as a finite float.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            RawField::Number(n) => *n,
            RawField::Text(text) => text.trim().parse::<f64>().ok()?,
            RawField::Missing => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Interpret the field as an integer. Floats with no fractional part are accepted.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawField::Text(text) => {
                let text = text.trim();
                text.parse::<i64>().ok().or_else(|| whole_number(text.parse::<f64>().ok()?))
            }
            RawField::Number(n) => whole_number(*n),
            RawField::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RawField::Missing)
    }
}

fn whole_number(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

impl fmt::Display for RawField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawField::Number(n) => write!(f, "{}", n),
            RawField::Text(text) => f.write_str(text),
            RawField::Missing => f.write_str("<missing>"),
        }
    }
}

impl From<f64> for RawField {
    fn from(value: f64) -> Self {
        RawField::Number(value)
    }
}

impl From<&str> for RawField {
    fn from(value: &str) -> Self {
        RawField::Text(value.to_string())
    }
}

/// One row of the recipe corpus, as loaded and as persisted in the bundle.
///
/// Field names follow the corpus columns. The position of a row in the table
/// is its join key into the neighbor index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRow {
    /// Unique recipe identifier (integer once coerced)
    #[serde(default)]
    pub recipe_id: RawField,

    /// Display name
    pub recipe_name: String,

    /// Ingredient list in whatever shape the corpus stored it
    #[serde(default)]
    pub ingredients_list: RawIngredients,

    #[serde(default)]
    pub image_url: String,

    /// Average rating, 0 to 5
    #[serde(default)]
    pub aver_rate: RawField,

    /// Number of reviews
    #[serde(default)]
    pub review_nums: RawField,

    #[serde(default)]
    pub calories: RawField,
    #[serde(default)]
    pub fat: RawField,
    #[serde(default)]
    pub carbohydrates: RawField,
    #[serde(default)]
    pub protein: RawField,
    #[serde(default)]
    pub cholesterol: RawField,
    #[serde(default)]
    pub sodium: RawField,
    #[serde(default)]
    pub fiber: RawField,
}

/// Nutritional facts of a recipe (kcal, grams, milligrams as in the corpus).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutritionFacts {
    pub calories: f64,
    pub fat: f64,
    pub carbohydrates: f64,
    pub protein: f64,
    pub cholesterol: f64,
    pub sodium: f64,
    pub fiber: f64,
}

/// A corpus row with every scalar field coerced to its documented type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRecord {
    #[serde(rename = "recipe_id")]
    pub id: i64,

    #[serde(rename = "recipe_name")]
    pub name: String,

    pub image_url: String,

    /// Average rating (0.0 to 5.0)
    #[serde(rename = "aver_rate")]
    pub rating: f64,

    #[serde(rename = "review_nums")]
    pub review_count: u64,

    #[serde(flatten)]
    pub nutrition: NutritionFacts,
}

/// A corpus row index paired with its cosine distance to a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Position in the recipe table
    pub row: usize,

    /// Cosine distance (1 - cosine similarity)
    pub distance: f64,
}

/// A single recommendation returned to the presentation layer.
///
/// Ingredient sets are `BTreeSet`s so their display order is sorted and
/// deterministic for a given input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    #[serde(flatten)]
    pub recipe: RecipeRecord,

    /// The recipe's normalized ingredient list, in corpus order
    #[serde(rename = "ingredients_list")]
    pub ingredients: NormalizedIngredients,

    /// Recipe ingredients the user already has
    #[serde(rename = "available_ingredients")]
    pub available: BTreeSet<String>,

    /// Recipe ingredients the user lacks
    #[serde(rename = "missing_ingredients")]
    pub missing: BTreeSet<String>,

    /// `1 - distance`, clamped to [0, 1] and rounded to two decimals
    pub similarity: f64,
}
