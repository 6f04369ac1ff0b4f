//! CSV corpus reader.
//!
//! Reads the cleaned recipe export: one row per recipe with the columns
//! `recipe_id, recipe_name, aver_rate, image_url, review_nums, ingredients_list,
//! calories, fat, carbohydrates, protein, cholesterol, sodium, fiber`.
//! Columns are matched by header name; extra columns are ignored and missing
//! ones read as empty. `ingredients_list` is kept as text for the normalizer.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use super::{ProviderError, ProviderResult, RecipeProvider};
use crate::models::{RawField, RawIngredients, RecipeRow};

#[derive(Debug, Deserialize)]
struct CsvRecipe {
    #[serde(default)]
    recipe_id: Option<String>,
    #[serde(default)]
    recipe_name: Option<String>,
    #[serde(default)]
    ingredients_list: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    aver_rate: Option<String>,
    #[serde(default)]
    review_nums: Option<String>,
    #[serde(default)]
    calories: Option<String>,
    #[serde(default)]
    fat: Option<String>,
    #[serde(default)]
    carbohydrates: Option<String>,
    #[serde(default)]
    protein: Option<String>,
    #[serde(default)]
    cholesterol: Option<String>,
    #[serde(default)]
    sodium: Option<String>,
    #[serde(default)]
    fiber: Option<String>,
}

impl From<CsvRecipe> for RecipeRow {
    fn from(raw: CsvRecipe) -> Self {
        Self {
            recipe_id: RawField::from_cell(raw.recipe_id),
            recipe_name: raw.recipe_name.unwrap_or_default(),
            ingredients_list: raw
                .ingredients_list
                .map_or(RawIngredients::Missing, RawIngredients::Text),
            image_url: raw.image_url.unwrap_or_default(),
            aver_rate: RawField::from_cell(raw.aver_rate),
            review_nums: RawField::from_cell(raw.review_nums),
            calories: RawField::from_cell(raw.calories),
            fat: RawField::from_cell(raw.fat),
            carbohydrates: RawField::from_cell(raw.carbohydrates),
            protein: RawField::from_cell(raw.protein),
            cholesterol: RawField::from_cell(raw.cholesterol),
            sodium: RawField::from_cell(raw.sodium),
            fiber: RawField::from_cell(raw.fiber),
        }
    }
}

/// Recipe provider backed by a CSV file, read once at construction.
#[derive(Debug, Clone)]
pub struct CsvRecipeProvider {
    path: PathBuf,
    name: String,
    rows: Vec<RecipeRow>,
}

impl CsvRecipeProvider {
    /// Read and parse a CSV corpus file.
    ///
    /// # Errors
    /// `IoError` if the file cannot be read, `ParseError` if a record is malformed
    pub async fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await?;
        let rows = Self::parse(&bytes)?;
        Ok(Self {
            name: format!("CSV corpus {}", path.display()),
            path,
            rows,
        })
    }

    /// Parse CSV bytes with a header row into recipe rows.
    pub fn parse(bytes: &[u8]) -> ProviderResult<Vec<RecipeRow>> {
        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        reader
            .deserialize::<CsvRecipe>()
            .enumerate()
            .map(|(idx, record)| {
                record.map(RecipeRow::from).map_err(|e| {
                    ProviderError::ParseError(format!("CSV record {}: {}", idx + 1, e))
                })
            })
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecipeProvider for CsvRecipeProvider {
    async fn fetch_recipes(&self) -> ProviderResult<Vec<RecipeRow>> {
        Ok(self.rows.clone())
    }

    async fn count_recipes(&self) -> ProviderResult<usize> {
        Ok(self.rows.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
