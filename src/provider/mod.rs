//! Recipe corpus providers.
//!
//! This module defines the interface for sourcing recipe rows and includes
//! readers for the corpus formats the indexer accepts.
//!
//! The `RecipeProvider` trait abstracts the source of the corpus so the indexer
//! does not care whether rows come from a CSV export, a JSON dump, or a test
//! fixture. Providers return rows exactly as stored: no coercion, no
//! normalization, no deduplication.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::RecipeRow;

pub mod csv;
pub mod json;

pub use self::csv::CsvRecipeProvider;
pub use self::json::JsonRecipeProvider;

/// Errors that can occur when reading a recipe corpus.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),

    /// The file extension does not name a supported format
    #[error("Unsupported corpus format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for sourcing recipe rows.
#[async_trait]
pub trait RecipeProvider: Send + Sync {
    /// Fetch every recipe row, in corpus order.
    ///
    /// # Errors
    /// Returns `ProviderError` if rows cannot be read or parsed
    async fn fetch_recipes(&self) -> ProviderResult<Vec<RecipeRow>>;

    /// Fetch at most `limit` rows, useful for trial builds.
    async fn fetch_recipes_limit(&self, limit: usize) -> ProviderResult<Vec<RecipeRow>> {
        let all = self.fetch_recipes().await?;
        Ok(all.into_iter().take(limit).collect())
    }

    /// Total number of rows available.
    async fn count_recipes(&self) -> ProviderResult<usize> {
        self.fetch_recipes().await.map(|rows| rows.len())
    }

    /// Human-readable description, for logging.
    fn name(&self) -> &str;
}

/// Corpus file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorpusFormat {
    Csv,
    Json,
}

impl CorpusFormat {
    /// Infer the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> ProviderResult<Self> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => Ok(CorpusFormat::Csv),
            Some("json") => Ok(CorpusFormat::Json),
            _ => Err(ProviderError::UnsupportedFormat(format!(
                "{} (expected .csv or .json)",
                path.display()
            ))),
        }
    }
}
