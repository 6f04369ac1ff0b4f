//! Text vectorization.
//!
//! This module defines the interface for turning bag-of-words text into sparse
//! term-weighted vectors, and the sparse vector type shared by the vectorizer
//! and the neighbor index.
//!
//! Similarity is purely lexical: a query term that is not in the fitted
//! vocabulary contributes nothing to the query vector.

pub mod tfidf;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use tfidf::TfidfVectorizer;

/// Errors that can occur while fitting a vectorizer.
#[derive(Debug, Error)]
pub enum VectorizeError {
    /// No documents were supplied
    #[error("Cannot fit vectorizer on an empty corpus")]
    EmptyCorpus,

    /// Documents contained no usable terms at all
    #[error("Empty vocabulary: no document contains a term of two or more characters")]
    EmptyVocabulary,

    /// Fitted state is internally inconsistent (e.g. a corrupt artifact)
    #[error("Invalid vectorizer state: {0}")]
    InvalidState(String),
}

/// Result type for vectorizer operations.
pub type VectorizeResult<T> = Result<T, VectorizeError>;

/// Trait for fitted text vectorizers.
///
/// Implementations map text into a fixed column space learned at fit time.
pub trait Vectorizer: Send + Sync {
    /// Transform one text into a sparse vector over the fitted vocabulary.
    fn transform(&self, text: &str) -> SparseVector;

    /// Number of columns in the output space.
    fn vocabulary_size(&self) -> usize;
}

/// Terms are runs of at least two word characters.
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?u)\b\w\w+\b").expect("token pattern is valid"));

/// Lower-case `text` and split it into terms.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_PATTERN
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Sparse vector with strictly increasing column indices.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SparseVector {
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl SparseVector {
    /// Build from `(column, value)` pairs. Pairs are sorted and duplicate
    /// columns summed; explicit zeros are dropped.
    pub fn from_pairs(mut pairs: Vec<(usize, f64)>) -> Self {
        pairs.sort_by_key(|(column, _)| *column);

        let mut indices: Vec<usize> = Vec::with_capacity(pairs.len());
        let mut values: Vec<f64> = Vec::with_capacity(pairs.len());
        for (column, value) in pairs {
            if indices.last() == Some(&column) {
                if let Some(last) = values.last_mut() {
                    *last += value;
                }
            } else {
                indices.push(column);
                values.push(value);
            }
        }

        let (indices, values) = indices
            .into_iter()
            .zip(values)
            .filter(|(_, value)| *value != 0.0)
            .unzip();
        Self { indices, values }
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_zero(&self) -> bool {
        self.values.iter().all(|v| *v == 0.0)
    }

    /// Largest column index plus one, or zero for an empty vector.
    pub fn min_dimension(&self) -> usize {
        self.indices.last().map_or(0, |last| last + 1)
    }

    pub fn norm(&self) -> f64 {
        self.values.iter().map(|v| v * v).sum::<f64>().sqrt()
    }

    /// Dot product via a merge over the two index lists.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// Scale to unit L2 norm in place. Zero vectors stay zero.
    pub fn normalize_l2(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for value in &mut self.values {
                *value /= norm;
            }
        }
    }

    /// Check that indices are strictly increasing and values finite.
    pub fn is_well_formed(&self) -> bool {
        self.indices.len() == self.values.len()
            && self.indices.windows(2).all(|w| w[0] < w[1])
            && self.values.iter().all(|v| v.is_finite())
    }
}
