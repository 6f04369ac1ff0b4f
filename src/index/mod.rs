//! Nearest-neighbor index over vectorized recipes.
//!
//! The index stores one sparse row per recipe, in corpus order, and answers
//! k-nearest-neighbor queries under cosine distance. Results are ordered by
//! ascending distance with ties broken by corpus row, so the same query always
//! yields the same ranking.

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::Neighbor;
use crate::vectorize::SparseVector;

/// Trait for k-nearest-neighbor search backends.
pub trait NeighborSearch: Send + Sync {
    /// Return the `k` rows closest to `query`, closest first.
    ///
    /// `k` larger than the index is clamped to the index size.
    fn kneighbors(&self, query: &SparseVector, k: usize) -> Vec<Neighbor>;

    /// Number of indexed rows.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cosine distance between two vectors: `1 - cos(a, b)`.
///
/// A zero vector has no direction; its distance to anything is 1.
pub fn cosine_distance(a: &SparseVector, b: &SparseVector) -> f64 {
    let norm_a = a.norm();
    let norm_b = b.norm();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - a.dot(b) / (norm_a * norm_b)
}

fn by_distance_then_row(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.row.cmp(&b.row))
}

/// Exhaustive cosine index: scores every row for every query.
///
/// Suitable for corpora of tens of thousands of recipes; scoring runs in
/// parallel across rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BruteForceIndex {
    /// Corpus matrix, one row per recipe
    rows: Vec<SparseVector>,

    /// Column count of the matrix (vocabulary size)
    n_features: usize,
}

impl BruteForceIndex {
    /// Build an index over `rows`, whose column space has `n_features` columns.
    pub fn fit(rows: Vec<SparseVector>, n_features: usize) -> Self {
        Self { rows, n_features }
    }

    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Check that every row is well formed and fits the column space.
    ///
    /// # Returns
    /// The first offending row index, if any.
    pub fn first_invalid_row(&self) -> Option<usize> {
        self.rows
            .iter()
            .position(|row| !row.is_well_formed() || row.min_dimension() > self.n_features)
    }
}

impl NeighborSearch for BruteForceIndex {
    fn kneighbors(&self, query: &SparseVector, k: usize) -> Vec<Neighbor> {
        let k = k.min(self.rows.len());
        if k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<Neighbor> = self
            .rows
            .par_iter()
            .enumerate()
            .map(|(row, vector)| Neighbor {
                row,
                distance: cosine_distance(query, vector),
            })
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance_then_row);
            scored.truncate(k);
        }
        scored.sort_by(by_distance_then_row);
        scored
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}
