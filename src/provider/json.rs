//! JSON corpus reader.
//!
//! Accepts a JSON array of recipe objects using the same field names as the
//! CSV export. `ingredients_list` may be a native array or a string, and
//! numeric fields may be numbers or strings.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{ProviderError, ProviderResult, RecipeProvider};
use crate::models::RecipeRow;

/// Recipe provider backed by a JSON file, read once at construction.
#[derive(Debug, Clone)]
pub struct JsonRecipeProvider {
    path: PathBuf,
    name: String,
    rows: Vec<RecipeRow>,
}

impl JsonRecipeProvider {
    /// Read and parse a JSON corpus file.
    ///
    /// # Errors
    /// `IoError` if the file cannot be read, `ParseError` if it is not an array of recipes
    pub async fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = tokio::fs::read(&path).await?;
        let rows = serde_json::from_slice::<Vec<RecipeRow>>(&bytes)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            name: format!("JSON corpus {}", path.display()),
            path,
            rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl RecipeProvider for JsonRecipeProvider {
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
