//! Index bundle persistence.
//!
//! This module defines the artifact bundle produced by the indexer and consumed
//! by the query engine, plus the interface for persisting it. A bundle holds
//! three pieces that are only meaningful together:
//!
//! - the fitted vectorizer (vocabulary and IDF weights)
//! - the fitted neighbor index (one row per recipe)
//! - the recipe table, in corpus order
//!
//! Every artifact is wrapped in an envelope carrying a format version and a
//! snapshot id (SHA-256 of the serialized recipe table). A load only succeeds
//! when all three artifacts share the same snapshot and their shapes agree.

pub mod fs;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::index::{BruteForceIndex, NeighborSearch};
use crate::models::RecipeRow;
use crate::vectorize::{TfidfVectorizer, Vectorizer};

pub use fs::DirectoryStorage;

/// Version of the on-disk artifact envelope.
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

/// File name of the vectorizer artifact inside a bundle directory.
pub const VECTORIZER_FILE: &str = "vectorizer.json";

/// File name of the neighbor index artifact inside a bundle directory.
pub const NEIGHBORS_FILE: &str = "neighbors.json";

/// File name of the recipe table artifact inside a bundle directory.
pub const RECIPES_FILE: &str = "recipes.json";

/// Errors that can occur while writing a bundle.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Data serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The bundle is inconsistent and was not written
    #[error("Invalid bundle: {0}")]
    InvalidBundle(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that prevent a bundle from being loaded for serving.
///
/// All variants are fatal: a process that fails to load its bundle must not
/// answer queries.
#[derive(Debug, Error)]
pub enum LoadError {
    /// An artifact file does not exist
    #[error("Bundle artifact missing: {0}")]
    Missing(String),

    /// An artifact file exists but could not be read
    #[error("Bundle artifact unreadable: {path}: {reason}")]
    Unreadable { path: String, reason: String },

    /// An artifact file is not valid JSON of the expected shape
    #[error("Bundle artifact corrupt: {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// An artifact was written by an incompatible version
    #[error("Bundle artifact {path} has format version {found}, expected {expected}")]
    VersionMismatch {
        path: String,
        found: u32,
        expected: u32,
    },

    /// Artifacts come from different corpus snapshots
    #[error("Bundle artifacts are not co-versioned: {0}")]
    SnapshotMismatch(String),

    /// Neighbor index row count differs from the recipe table length
    #[error("Neighbor index has {index_rows} rows but the recipe table has {recipes} recipes")]
    RowCountMismatch { index_rows: usize, recipes: usize },

    /// Neighbor index column count differs from the vocabulary size
    #[error("Neighbor index has {index_columns} columns but the vocabulary has {vocabulary} terms")]
    ColumnCountMismatch {
        index_columns: usize,
        vocabulary: usize,
    },

    /// Fitted state failed validation
    #[error("Invalid bundle state: {0}")]
    InvalidState(String),
}

/// Envelope written around every artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact<T> {
    pub format_version: u32,

    /// Snapshot id of the recipe table this artifact belongs to
    pub snapshot: String,

    pub created_at: DateTime<Utc>,

    pub payload: T,
}

impl<T> Artifact<T> {
    pub fn new(snapshot: &str, created_at: DateTime<Utc>, payload: T) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            snapshot: snapshot.to_string(),
            created_at,
            payload,
        }
    }
}

/// Snapshot id of a recipe table: hex SHA-256 of its JSON serialization.
///
/// # Errors
/// Returns `SerializationError` if the table cannot be serialized
pub fn snapshot_of(recipes: &[RecipeRow]) -> StorageResult<String> {
    let bytes =
        serde_json::to_vec(recipes).map_err(|e| StorageError::SerializationError(e.to_string()))?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{:02x}", b)).collect())
}

/// The three co-versioned pieces of a fitted index.
#[derive(Debug, Clone)]
pub struct IndexBundle {
    pub vectorizer: TfidfVectorizer,
    pub index: BruteForceIndex,
    pub recipes: Vec<RecipeRow>,

    /// Snapshot id shared by all three artifacts
    pub snapshot: String,
}

impl IndexBundle {
    /// Assemble a bundle and stamp it with the recipe table's snapshot id.
    ///
    /// # Errors
    /// Returns `InvalidBundle` if the pieces do not fit together
    pub fn new(
        vectorizer: TfidfVectorizer,
        index: BruteForceIndex,
        recipes: Vec<RecipeRow>,
    ) -> StorageResult<Self> {
        let snapshot = snapshot_of(&recipes)?;
        let bundle = Self {
            vectorizer,
            index,
            recipes,
            snapshot,
        };
        bundle
            .validate()
            .map_err(|e| StorageError::InvalidBundle(e.to_string()))?;
        Ok(bundle)
    }

    /// Check the shape invariants that tie the three pieces together.
    ///
    /// # Errors
    /// `RowCountMismatch` when index rows != recipes, `ColumnCountMismatch`
    /// when index columns != vocabulary size, `InvalidState` for malformed
    /// fitted state.
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.index.len() != self.recipes.len() {
            return Err(LoadError::RowCountMismatch {
                index_rows: self.index.len(),
                recipes: self.recipes.len(),
            });
        }

        if self.index.n_features() != self.vectorizer.vocabulary_size() {
            return Err(LoadError::ColumnCountMismatch {
                index_columns: self.index.n_features(),
                vocabulary: self.vectorizer.vocabulary_size(),
            });
        }

        self.vectorizer
            .validate()
            .map_err(|e| LoadError::InvalidState(e.to_string()))?;

        if let Some(row) = self.index.first_invalid_row() {
            return Err(LoadError::InvalidState(format!(
                "neighbor index row {} is malformed",
                row
            )));
        }

        Ok(())
    }
}

/// Trait for bundle storage backends.
#[async_trait]
pub trait BundleStorage: Send + Sync {
    /// Persist a bundle, replacing any previous one as a single unit.
    ///
    /// # Errors
    /// Returns `StorageError` if writing fails; a previous bundle is left intact
    async fn save(&self, bundle: &IndexBundle) -> StorageResult<()>;

    /// Load and verify a bundle.
    ///
    /// # Errors
    /// Returns `LoadError` if any artifact is missing, unreadable, corrupt,
    /// or inconsistent with the others
    async fn load(&self) -> Result<IndexBundle, LoadError>;

    /// Human-readable location of the bundle, for logging.
    fn location(&self) -> String;
}
