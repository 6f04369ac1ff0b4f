//! Recipe Recommender - ingredient-based recipe search.
//!
//! This library provides the core of a recipe recommender: given the
//! ingredients a user has on hand, it finds the recipes whose ingredient lists
//! are lexically closest and reports, per recipe, which ingredients the user
//! already has and which are missing.
//!
//! # Architecture
//!
//! The system is organized into several key modules:
//!
//! - **models**: Core data structures (RecipeRow, RecipeRecord, RecommendationResult)
//! - **normalize**: Ingredient list normalization for every stored shape
//! - **vectorize**: Tokenizer, sparse vectors, and the TF-IDF vectorizer
//! - **index**: Cosine k-nearest-neighbor search
//! - **provider**: CSV and JSON corpus readers
//! - **ingestion**: Offline corpus indexing
//! - **storage**: Index bundle persistence and verification
//! - **query**: Loaded index, recommendation, and serving state
//! - **display**: Input parsing and display filters for front-ends
//! - **server**: HTTP front-end
//!
//! # Workflow
//!
//! ## Offline Indexing
//!
//! 1. Read recipe rows from a CSV or JSON corpus
//! 2. Normalize each recipe's ingredient list
//! 3. Fit TF-IDF weights over the per-recipe bag-of-words texts
//! 4. Fit the cosine neighbor index over the resulting vectors
//! 5. Save vectorizer, index, and recipe table as one bundle
//!
//! ## Online Recommendation
//!
//! 1. Load and verify the bundle once at startup
//! 2. Lower-case the user's ingredients and vectorize them
//! 3. Retrieve the k nearest recipes by cosine distance
//! 4. Compute available and missing ingredients for each recipe
//!
//! # Example
//!
//! ```ignore
//! use recipe_recommender::{
//!     ingestion::CorpusIndexer,
//!     provider::CsvRecipeProvider,
//!     query::{LoadedIndex, Recommender},
//!     storage::DirectoryStorage,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Build the index once
//!     let provider = CsvRecipeProvider::from_file("cleaned_recipe_data.csv").await?;
//!     CorpusIndexer::new(DirectoryStorage::new("recipe_index"))
//!         .build(&provider)
//!         .await?;
//!
//!     // Serve queries from it
//!     let index = LoadedIndex::load("recipe_index").await?;
//!     let query = vec!["egg".to_string(), "flour".to_string()];
//!     for result in index.recommend(&query, 5)? {
//!         println!("{}: {:?} missing", result.recipe.name, result.missing);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Public modules
pub mod display;
pub mod index;
pub mod ingestion;
pub mod models;
pub mod normalize;
pub mod provider;
pub mod query;
pub mod server;
pub mod storage;
pub mod vectorize;

// Re-export commonly used types at the crate root
pub use models::{NormalizedIngredients, RawIngredients, RecipeRecord, RecipeRow, RecommendationResult};
pub use normalize::normalize;
pub use query::{LoadedIndex, ModelSlot, QueryError, Recommender, DEFAULT_TOP_K};
pub use storage::{BundleStorage, DirectoryStorage, LoadError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default bundle directory written by the indexer and read by the front-ends
pub const DEFAULT_BUNDLE_DIR: &str = "recipe_index";
