//! Query processing and ranking module.
//!
//! This module holds the in-memory index used to answer queries and the
//! serving state that guards it. A query flows:
//!
//! ```text
//! ingredients -> lower-cased bag of words -> TF-IDF vector
//!             -> k nearest rows (cosine) -> assembled results
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use recipe_recommender::query::{LoadedIndex, Recommender, DEFAULT_TOP_K};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let index = LoadedIndex::load("recipe_index").await?;
//!
//! let query = vec!["egg".to_string(), "flour".to_string()];
//! for result in index.recommend(&query, DEFAULT_TOP_K)? {
//!     println!("{} - similarity {:.2}", result.recipe.name, result.similarity);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! `LoadedIndex` is immutable once built and is shared between request
//! handlers behind an `Arc`. `ModelSlot` is the serving-side handle: it starts
//! empty, is filled exactly once by the loader, and answers every query with
//! `ModelUnavailable` until then (or forever, if the load failed).

pub mod assemble;

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::index::{BruteForceIndex, NeighborSearch};
use crate::models::{Neighbor, NormalizedIngredients, RecipeRow, RecommendationResult};
use crate::normalize::{bag_of_words, ingredient_key};
use crate::storage::{BundleStorage, DirectoryStorage, IndexBundle, LoadError};
use crate::vectorize::{TfidfVectorizer, Vectorizer};

pub use assemble::{assemble, coerce_record, Hit, RecordCoercionError};

/// Number of results returned when the caller does not ask for a specific count.
pub const DEFAULT_TOP_K: usize = 5;

/// Errors that can occur during query processing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    /// Caller error: empty ingredient list or zero result count
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// No index is loaded, either because loading is in progress or failed
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Trim, lower-case, and drop blank entries from a query.
///
/// # Errors
/// Returns `InvalidQuery` if nothing is left
pub fn prepare_query(ingredients: &[String]) -> QueryResult<NormalizedIngredients> {
    let prepared: NormalizedIngredients = ingredients
        .iter()
        .map(|name| ingredient_key(name))
        .filter(|name| !name.is_empty())
        .collect();

    if prepared.is_empty() {
        return Err(QueryError::InvalidQuery(
            "no ingredients provided".to_string(),
        ));
    }
    Ok(prepared)
}

/// Trait for anything that can answer recommendation queries.
pub trait Recommender: Send + Sync {
    /// Recommend up to `k` recipes for the given ingredients.
    ///
    /// # Arguments
    /// * `ingredients` - Ingredient names the user has on hand
    /// * `k` - Maximum number of results; clamped to the corpus size
    ///
    /// # Returns
    /// Results ordered by ascending distance, ties in corpus order
    ///
    /// # Errors
    /// `InvalidQuery` for an empty ingredient list or `k == 0`,
    /// `ModelUnavailable` when no index is loaded
    fn recommend(&self, ingredients: &[String], k: usize) -> QueryResult<Vec<RecommendationResult>>;
}

/// A fully loaded, validated index ready to serve queries.
#[derive(Debug)]
pub struct LoadedIndex {
    vectorizer: TfidfVectorizer,
    index: BruteForceIndex,
    recipes: Vec<RecipeRow>,
    snapshot: String,
}

impl LoadedIndex {
    /// Load the bundle stored in the directory at `path`.
    ///
    /// # Errors
    /// Returns `LoadError` if any artifact is missing, unreadable, corrupt, or
    /// inconsistent with the others
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        Self::load_from(&DirectoryStorage::new(path)).await
    }

    /// Load a bundle from any storage backend.
    pub async fn load_from<S>(storage: &S) -> Result<Self, LoadError>
    where
        S: BundleStorage + ?Sized,
    {
        info!(location = %storage.location(), "Loading index bundle");
        let bundle = storage.load().await?;
        Self::from_bundle(bundle)
    }

    /// Take ownership of an in-memory bundle after checking its invariants.
    pub fn from_bundle(bundle: IndexBundle) -> Result<Self, LoadError> {
        bundle.validate()?;
        Ok(Self {
            vectorizer: bundle.vectorizer,
            index: bundle.index,
            recipes: bundle.recipes,
            snapshot: bundle.snapshot,
        })
    }

    /// Number of recipes in the corpus.
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn recipes(&self) -> &[RecipeRow] {
        &self.recipes
    }

    pub fn snapshot(&self) -> &str {
        &self.snapshot
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vectorizer.vocabulary_size()
    }

    /// Find the `k` corpus rows closest to the given ingredients.
    ///
    /// Out-of-vocabulary ingredients contribute nothing. A query made only of
    /// unknown terms is valid and returns the first `k` rows at distance 1.
    ///
    /// # Errors
    /// `InvalidQuery` for an empty ingredient list or `k == 0`
    pub fn neighbors(&self, ingredients: &[String], k: usize) -> QueryResult<Vec<Neighbor>> {
        let query = prepare_query(ingredients)?;
        if k == 0 {
            return Err(QueryError::InvalidQuery(
                "result count must be positive".to_string(),
            ));
        }

        let vector = self.vectorizer.transform(&bag_of_words(&query));
        if vector.is_zero() {
            debug!(query = ?query, "No query term is in the vocabulary");
        }

        Ok(self.index.kneighbors(&vector, k))
    }
}

impl Recommender for LoadedIndex {
    fn recommend(&self, ingredients: &[String], k: usize) -> QueryResult<Vec<RecommendationResult>> {
        let query = prepare_query(ingredients)?;
        let neighbors = self.neighbors(&query, k)?;

        let hits = neighbors
            .iter()
            .filter_map(|neighbor| {
                self.recipes.get(neighbor.row).map(|recipe| Hit {
                    row: neighbor.row,
                    recipe,
                    distance: neighbor.distance,
                })
            });

        Ok(assemble(&query, hits))
    }
}

/// Serving-side holder for the index, filled once at startup.
#[derive(Debug, Default)]
pub struct ModelSlot {
    cell: OnceCell<Result<Arc<LoadedIndex>, String>>,
}

/// Observable state of a `ModelSlot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Loading,
    Ready,
    Failed,
}

impl ModelSlot {
    /// Create an empty slot; queries fail with `ModelUnavailable` until `install`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a slot already holding `index`.
    pub fn ready(index: LoadedIndex) -> Self {
        let slot = Self::new();
        slot.install(Ok(index));
        slot
    }

    /// Record the outcome of the startup load.
    ///
    /// # Returns
    /// `false` if the slot was already filled; the first outcome wins
    pub fn install(&self, outcome: Result<LoadedIndex, LoadError>) -> bool {
        let value = match outcome {
            Ok(index) => {
                info!(recipes = index.len(), snapshot = %index.snapshot(), "Index ready");
                Ok(Arc::new(index))
            }
            Err(e) => {
                error!(error = %e, "Index failed to load, queries will be rejected");
                Err(e.to_string())
            }
        };
        self.cell.set(value).is_ok()
    }

    /// Get the loaded index.
    ///
    /// # Errors
    /// `ModelUnavailable` while loading or after a failed load
    pub fn get(&self) -> QueryResult<Arc<LoadedIndex>> {
        match self.cell.get() {
            Some(Ok(index)) => Ok(Arc::clone(index)),
            Some(Err(reason)) => Err(QueryError::ModelUnavailable(reason.clone())),
            None => Err(QueryError::ModelUnavailable(
                "index is still loading".to_string(),
            )),
        }
    }

    pub fn state(&self) -> SlotState {
        match self.cell.get() {
            None => SlotState::Loading,
            Some(Ok(_)) => SlotState::Ready,
            Some(Err(_)) => SlotState::Failed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == SlotState::Ready
    }
}

impl Recommender for ModelSlot {
    fn recommend(&self, ingredients: &[String], k: usize) -> QueryResult<Vec<RecommendationResult>> {
        self.get()?.recommend(ingredients, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::build_bundle;
    use crate::models::{RawField, RawIngredients};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn create_test_row(id: f64, ingredients: &str) -> RecipeRow {
        RecipeRow {
            recipe_id: RawField::Number(id),
            recipe_name: format!("Recipe {}", id),
            ingredients_list: RawIngredients::from(ingredients),
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

    fn create_test_index() -> LoadedIndex {
        let recipes = vec![
            create_test_row(1.0, "['egg', 'flour']"),
            create_test_row(2.0, "['egg', 'milk', 'sugar']"),
            create_test_row(3.0, "['chicken', 'rice']"),
        ];
        let (bundle, _) = build_bundle(recipes).unwrap();
        LoadedIndex::from_bundle(bundle).unwrap()
    }

    #[test]
    fn test_prepare_query() {
        assert_eq!(
            prepare_query(&strings(&[" Egg ", "", "FLOUR"])).unwrap(),
            strings(&["egg", "flour"])
        );
        assert!(matches!(
            prepare_query(&strings(&["  ", ""])),
            Err(QueryError::InvalidQuery(_))
        ));
        assert!(prepare_query(&[]).is_err());
    }

    #[test]
    fn test_neighbors_ranking() {
        let index = create_test_index();
        let neighbors = index.neighbors(&strings(&["egg", "flour"]), 3).unwrap();

        let rows: Vec<usize> = neighbors.iter().map(|n| n.row).collect();
        assert_eq!(rows, vec![0, 1, 2]);
        assert!(neighbors[0].distance.abs() < 1e-9);
        assert!(neighbors[1].distance > 0.0 && neighbors[1].distance < 1.0);
        assert!((neighbors[2].distance - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_recommend_end_to_end() {
        let index = create_test_index();
        let results = index.recommend(&strings(&["egg", "flour"]), 2).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].recipe.id, 1);
        assert_eq!(results[1].recipe.id, 2);
        assert_eq!(results[0].similarity, 1.0);
        assert!(results[0].missing.is_empty());
        assert_eq!(results[0].available.len(), 2);
        assert!(results[1].available.contains("egg"));
        assert!(results[1].missing.contains("milk"));
    }

    #[test]
    fn test_recommend_is_case_insensitive() {
        let index = create_test_index();
        let lower = index.recommend(&strings(&["egg", "flour"]), 3).unwrap();
        let upper = index.recommend(&strings(&["EGG", " Flour "]), 3).unwrap();
        assert_eq!(lower, upper);
    }

    #[test]
    fn test_recommend_clamps_k_to_corpus_size() {
        let index = create_test_index();
        let results = index.recommend(&strings(&["rice"]), 50).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].recipe.id, 3);
    }

    #[test]
    fn test_recommend_rejects_invalid_input() {
        let index = create_test_index();
        assert!(matches!(
            index.recommend(&[], 5),
            Err(QueryError::InvalidQuery(_))
        ));
        assert!(matches!(
            index.recommend(&strings(&["egg"]), 0),
            Err(QueryError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_unknown_terms_fall_back_to_corpus_order() {
        let index = create_test_index();
        let results = index.recommend(&strings(&["tofu"]), 2).unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.recipe.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(results.iter().all(|r| r.similarity == 0.0));
    }

    #[test]
    fn test_model_slot_lifecycle() {
        let slot = ModelSlot::new();
        assert_eq!(slot.state(), SlotState::Loading);
        assert!(matches!(
            slot.recommend(&strings(&["egg"]), 1),
            Err(QueryError::ModelUnavailable(_))
        ));

        assert!(slot.install(Ok(create_test_index())));
        assert!(slot.is_ready());
        assert_eq!(slot.recommend(&strings(&["egg"]), 1).unwrap().len(), 1);

        // first outcome wins
        assert!(!slot.install(Err(LoadError::Missing("late".to_string()))));
        assert!(slot.is_ready());
    }

    #[test]
    fn test_model_slot_failed_load() {
        let slot = ModelSlot::new();
        slot.install(Err(LoadError::RowCountMismatch {
            index_rows: 2,
            recipes: 3,
        }));

        assert_eq!(slot.state(), SlotState::Failed);
        match slot.recommend(&strings(&["egg"]), 1) {
            Err(QueryError::ModelUnavailable(reason)) => assert!(reason.contains("2 rows")),
            other => panic!("expected ModelUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_from_bundle_rejects_row_mismatch() {
        let (mut bundle, _) = build_bundle(vec![
            create_test_row(1.0, "['egg']"),
            create_test_row(2.0, "['milk']"),
        ])
        .unwrap();
        bundle.recipes.push(create_test_row(3.0, "['rice']"));

        assert!(matches!(
            LoadedIndex::from_bundle(bundle),
            Err(LoadError::RowCountMismatch {
                index_rows: 2,
                recipes: 3
            })
        ));
    }

    #[tokio::test]
    async fn test_load_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = LoadedIndex::load(dir.path().join("absent")).await;
        assert!(matches!(result, Err(LoadError::Missing(_))));
    }
}
