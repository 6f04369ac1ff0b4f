//! Offline corpus indexing.
//!
//! This module turns a recipe corpus into a fitted index bundle: it normalizes
//! every recipe's ingredient list, joins it into a bag-of-words text, fits the
//! TF-IDF vectorizer over all texts, fits the cosine neighbor index over the
//! resulting rows, and hands the three pieces to storage as one unit.
//!
//! # Usage
//!
//! ```ignore
//! use recipe_recommender::ingestion::CorpusIndexer;
//! use recipe_recommender::provider::CsvRecipeProvider;
//! use recipe_recommender::storage::DirectoryStorage;
//!
//! let provider = CsvRecipeProvider::from_file("cleaned_recipe_data.csv").await?;
//! let indexer = CorpusIndexer::new(DirectoryStorage::new("recipe_index"));
//! let stats = indexer.build(&provider).await?;
//! println!("Indexed {} recipes, vocabulary {}", stats.rows_indexed, stats.vocabulary_size);
//! ```
//!
//! Rows whose ingredients normalize to an empty list are kept. Their text is
//! empty, their vector is zero, and they sit at distance 1 from every query, but
//! they still occupy their row so the recipe table and the matrix stay aligned.

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::index::BruteForceIndex;
use crate::models::RecipeRow;
use crate::normalize::{bag_of_words, normalize_with_outcome, NormalizeOutcome};
use crate::provider::{ProviderError, RecipeProvider};
use crate::storage::{BundleStorage, IndexBundle, StorageError};
use crate::vectorize::{TfidfVectorizer, VectorizeError, Vectorizer};

/// Errors that can occur while building an index.
#[derive(Debug, Error)]
pub enum IndexingError {
    /// Provider operation failed
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    /// The corpus contained no rows
    #[error("Corpus is empty")]
    EmptyCorpus,

    /// Vectorizer fitting failed
    #[error("Vectorizer error: {0}")]
    VectorizeError(#[from] VectorizeError),

    /// Bundle could not be assembled or persisted
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
}

/// Result type for indexing operations.
pub type IndexingResult<T> = Result<T, IndexingError>;

/// Statistics from an indexing run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexingStats {
    /// Rows written to the index (every corpus row)
    pub rows_indexed: usize,

    /// Rows whose ingredients normalized to an empty list
    pub empty_ingredients: usize,

    /// Rows whose ingredient text needed the comma-splitting fallback
    pub fallback_parsed: usize,

    /// Rows repeating a recipe id seen earlier in the corpus
    pub duplicate_ids: usize,

    /// Size of the fitted vocabulary
    pub vocabulary_size: usize,
}

impl IndexingStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one row and how its ingredients were normalized.
    pub fn record_row(&mut self, outcome: NormalizeOutcome, ingredient_count: usize) {
        self.rows_indexed += 1;
        if outcome == NormalizeOutcome::Fallback {
            self.fallback_parsed += 1;
        }
        if ingredient_count == 0 {
            self.empty_ingredients += 1;
        }
    }

    /// Record a row whose id was already seen.
    pub fn record_duplicate_id(&mut self) {
        self.duplicate_ids += 1;
    }
}

/// Fit vectorizer and neighbor index over `recipes` and assemble a bundle.
///
/// This is the pure part of indexing: no I/O happens here.
///
/// # Errors
/// `EmptyCorpus` if `recipes` is empty, `VectorizeError` if no recipe has a
/// usable term.
pub fn build_bundle(recipes: Vec<RecipeRow>) -> IndexingResult<(IndexBundle, IndexingStats)> {
    if recipes.is_empty() {
        return Err(IndexingError::EmptyCorpus);
    }

    let mut stats = IndexingStats::new();
    let mut seen_ids = HashSet::new();
    let mut documents = Vec::with_capacity(recipes.len());

    for (row, recipe) in recipes.iter().enumerate() {
        let (ingredients, outcome) = normalize_with_outcome(&recipe.ingredients_list);
        stats.record_row(outcome, ingredients.len());

        if !recipe.recipe_id.is_missing() && !seen_ids.insert(recipe.recipe_id.to_string()) {
            warn!(row, recipe_id = %recipe.recipe_id, "Duplicate recipe id in corpus");
            stats.record_duplicate_id();
        }

        documents.push(bag_of_words(&ingredients));
    }

    let (vectorizer, rows) = TfidfVectorizer::fit_transform(&documents)?;
    stats.vocabulary_size = vectorizer.vocabulary_size();
    debug!(
        documents = documents.len(),
        vocabulary = stats.vocabulary_size,
        "Fitted TF-IDF vectorizer"
    );

    let index = BruteForceIndex::fit(rows, stats.vocabulary_size);
    let bundle = IndexBundle::new(vectorizer, index, recipes)?;

    Ok((bundle, stats))
}

/// Offline indexer: reads a corpus, fits the index, and persists the bundle.
pub struct CorpusIndexer<S>
where
    S: BundleStorage,
{
    storage: S,
}

impl<S> CorpusIndexer<S>
where
    S: BundleStorage,
{
    /// Create an indexer that writes bundles to `storage`.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Build and persist an index over every row `provider` returns.
    ///
    /// # Arguments
    /// * `provider` - Source of corpus rows
    ///
    /// # Returns
    /// Statistics describing the indexed corpus
    ///
    /// # Errors
    /// Returns `IndexingError` if the corpus cannot be read, is empty, has no
    /// usable terms, or the bundle cannot be saved
    pub async fn build<P>(&self, provider: &P) -> IndexingResult<IndexingStats>
    where
        P: RecipeProvider,
    {
        info!(provider = provider.name(), "Reading corpus");
        let recipes = provider.fetch_recipes().await?;
        self.build_from_rows(recipes).await
    }

    /// Build and persist an index over rows already in memory.
    pub async fn build_from_rows(&self, recipes: Vec<RecipeRow>) -> IndexingResult<IndexingStats> {
        let (bundle, stats) = build_bundle(recipes)?;

        info!(
            rows = stats.rows_indexed,
            vocabulary = stats.vocabulary_size,
            empty = stats.empty_ingredients,
            fallback = stats.fallback_parsed,
            location = %self.storage.location(),
            "Saving index bundle"
        );
        self.storage.save(&bundle).await?;

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::NeighborSearch;
    use crate::models::{RawField, RawIngredients};
    use crate::storage::{LoadError, StorageResult};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    // Mock storage for testing
    #[derive(Clone, Default)]
    struct MockStorage {
        saved: Arc<Mutex<Vec<IndexBundle>>>,
        fail_save: bool,
    }

    impl MockStorage {
        fn failing() -> Self {
            Self {
                fail_save: true,
                ..Self::default()
            }
        }

        fn save_count(&self) -> usize {
            self.saved.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl BundleStorage for MockStorage {
        async fn save(&self, bundle: &IndexBundle) -> StorageResult<()> {
            if self.fail_save {
                return Err(StorageError::SerializationError("Mock save failure".to_string()));
            }
            self.saved.lock().unwrap().push(bundle.clone());
            Ok(())
        }

        async fn load(&self) -> Result<IndexBundle, LoadError> {
            self.saved
                .lock()
                .unwrap()
                .last()
                .cloned()
                .ok_or_else(|| LoadError::Missing("mock".to_string()))
        }

        fn location(&self) -> String {
            "mock".to_string()
        }
    }

    // Mock provider for testing
    struct MockProvider {
        rows: Vec<RecipeRow>,
        should_fail: bool,
    }

    impl MockProvider {
        fn new(rows: Vec<RecipeRow>) -> Self {
            Self {
                rows,
                should_fail: false,
            }
        }

        fn with_failure(mut self) -> Self {
            self.should_fail = true;
            self
        }
    }

    #[async_trait]
    impl RecipeProvider for MockProvider {
        async fn fetch_recipes(&self) -> Result<Vec<RecipeRow>, ProviderError> {
            if self.should_fail {
                return Err(ProviderError::ParseError("Mock provider failure".to_string()));
            }
            Ok(self.rows.clone())
        }

        fn name(&self) -> &str {
            "MockProvider"
        }
    }

    fn create_test_row(id: f64, ingredients: RawIngredients) -> RecipeRow {
        RecipeRow {
            recipe_id: RawField::Number(id),
            recipe_name: format!("Recipe {}", id),
            ingredients_list: ingredients,
            image_url: String::new(),
            aver_rate: RawField::Number(4.0),
            review_nums: RawField::Number(10.0),
            calories: RawField::Number(200.0),
            fat: RawField::Number(5.0),
            carbohydrates: RawField::Number(20.0),
            protein: RawField::Number(8.0),
            cholesterol: RawField::Number(30.0),
            sodium: RawField::Number(100.0),
            fiber: RawField::Number(2.0),
        }
    }

    fn corpus() -> Vec<RecipeRow> {
        vec![
            create_test_row(1.0, RawIngredients::from("['egg', 'flour']")),
            create_test_row(2.0, RawIngredients::from(vec![
                "egg".to_string(),
                "milk".to_string(),
                "sugar".to_string(),
            ])),
            create_test_row(3.0, RawIngredients::from("[chicken, rice]")),
        ]
    }

    #[test]
    fn test_build_bundle_aligns_rows_with_recipes() {
        let (bundle, stats) = build_bundle(corpus()).unwrap();

        assert_eq!(bundle.index.len(), 3);
        assert_eq!(bundle.recipes.len(), 3);
        assert_eq!(bundle.index.n_features(), 6);
        assert_eq!(stats.rows_indexed, 3);
        assert_eq!(stats.vocabulary_size, 6);
        assert_eq!(stats.fallback_parsed, 1);
        assert_eq!(stats.empty_ingredients, 0);
        assert!(bundle.validate().is_ok());
    }

    #[test]
    fn test_build_bundle_keeps_empty_ingredient_rows() {
        let mut rows = corpus();
        rows.push(create_test_row(4.0, RawIngredients::Missing));

        let (bundle, stats) = build_bundle(rows).unwrap();
        assert_eq!(bundle.index.len(), 4);
        assert!(bundle.index.rows()[3].is_zero());
        assert_eq!(stats.empty_ingredients, 1);
    }

    #[test]
    fn test_build_bundle_counts_duplicate_ids() {
        let mut rows = corpus();
        rows.push(create_test_row(1.0, RawIngredients::from("['tofu']")));

        let (_, stats) = build_bundle(rows).unwrap();
        assert_eq!(stats.duplicate_ids, 1);
        assert_eq!(stats.rows_indexed, 4);
    }

    #[test]
    fn test_build_bundle_errors() {
        assert!(matches!(build_bundle(Vec::new()), Err(IndexingError::EmptyCorpus)));

        let rows = vec![create_test_row(1.0, RawIngredients::Missing)];
        assert!(matches!(
            build_bundle(rows),
            Err(IndexingError::VectorizeError(VectorizeError::EmptyVocabulary))
        ));
    }

    #[tokio::test]
    async fn test_build_saves_bundle() {
        let storage = MockStorage::default();
        let indexer = CorpusIndexer::new(storage.clone());

        let stats = indexer.build(&MockProvider::new(corpus())).await.unwrap();
        assert_eq!(stats.rows_indexed, 3);
        assert_eq!(storage.save_count(), 1);

        let saved = storage.load().await.unwrap();
        assert_eq!(saved.recipes, corpus());
    }

    #[tokio::test]
    async fn test_build_provider_error() {
        let storage = MockStorage::default();
        let indexer = CorpusIndexer::new(storage.clone());

        let result = indexer.build(&MockProvider::new(corpus()).with_failure()).await;
        assert!(matches!(result, Err(IndexingError::ProviderError(_))));
        assert_eq!(storage.save_count(), 0);
    }

    #[tokio::test]
    async fn test_build_storage_error() {
        let indexer = CorpusIndexer::new(MockStorage::failing());
        let result = indexer.build(&MockProvider::new(corpus())).await;
        assert!(matches!(result, Err(IndexingError::StorageError(_))));
    }

    #[test]
    fn test_stats_record_methods() {
        let mut stats = IndexingStats::new();
        stats.record_row(NormalizeOutcome::Literal, 2);
        stats.record_row(NormalizeOutcome::Fallback, 1);
        stats.record_row(NormalizeOutcome::Empty, 0);
        stats.record_duplicate_id();

        assert_eq!(stats.rows_indexed, 3);
        assert_eq!(stats.fallback_parsed, 1);
        assert_eq!(stats.empty_ingredients, 1);
        assert_eq!(stats.duplicate_ids, 1);
    }
}
