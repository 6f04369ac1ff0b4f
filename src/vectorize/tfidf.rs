//! TF-IDF vectorizer.
//!
//! Weighting scheme:
//!
//! ```text
//! tfidf(t, d) = count(t, d) × idf(t)
//! idf(t)      = ln((1 + n) / (1 + df(t))) + 1
//! ```
//!
//! where `n` is the number of documents and `df(t)` the number of documents
//! containing `t`. Every output row is scaled to unit L2 norm, so the cosine of
//! two rows is their dot product. Vocabulary columns are assigned in sorted
//! term order, which makes a fit over the same corpus reproducible.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::{tokenize, SparseVector, VectorizeError, VectorizeResult, Vectorizer};

/// Fitted TF-IDF vectorizer state: vocabulary and per-column IDF weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// term → column index
    vocabulary: BTreeMap<String, usize>,

    /// IDF weight per column
    idf: Vec<f64>,

    /// Number of documents seen at fit time
    document_count: usize,
}

impl TfidfVectorizer {
    /// Learn vocabulary and IDF weights from `documents`.
    ///
    /// Empty documents are valid and simply contribute no terms.
    ///
    /// # Errors
    /// `EmptyCorpus` if there are no documents, `EmptyVocabulary` if no
    /// document contains a single term.
    pub fn fit<S: AsRef<str>>(documents: &[S]) -> VectorizeResult<Self> {
        if documents.is_empty() {
            return Err(VectorizeError::EmptyCorpus);
        }

        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
        for doc in documents {
            let unique: BTreeSet<String> = tokenize(doc.as_ref()).into_iter().collect();
            for term in unique {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        if doc_freq.is_empty() {
            return Err(VectorizeError::EmptyVocabulary);
        }

        let n = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(doc_freq.len());
        for (column, (term, df)) in doc_freq.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(term, column);
        }

        Ok(Self {
            vocabulary,
            idf,
            document_count: documents.len(),
        })
    }

    /// Fit on `documents` and return the transformed rows alongside the vectorizer.
    pub fn fit_transform<S: AsRef<str>>(
        documents: &[S],
    ) -> VectorizeResult<(Self, Vec<SparseVector>)> {
        let vectorizer = Self::fit(documents)?;
        let rows = documents
            .iter()
            .map(|doc| vectorizer.transform(doc.as_ref()))
            .collect();
        Ok((vectorizer, rows))
    }

    pub fn vocabulary(&self) -> &BTreeMap<String, usize> {
        &self.vocabulary
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    pub fn document_count(&self) -> usize {
        self.document_count
    }

    /// IDF weight of a term, if it is in the vocabulary.
    pub fn idf_of(&self, term: &str) -> Option<f64> {
        self.vocabulary.get(term).map(|&column| self.idf[column])
    }

    /// Check invariants of deserialized state.
    ///
    /// # Errors
    /// `InvalidState` if columns are not exactly `0..len` or weights are not finite.
    pub fn validate(&self) -> VectorizeResult<()> {
        if self.idf.len() != self.vocabulary.len() {
            return Err(VectorizeError::InvalidState(format!(
                "{} IDF weights for {} vocabulary terms",
                self.idf.len(),
                self.vocabulary.len()
            )));
        }

        let mut seen = vec![false; self.idf.len()];
        for (term, &column) in &self.vocabulary {
            match seen.get_mut(column) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(VectorizeError::InvalidState(format!(
                        "term '{}' has invalid or duplicate column {}",
                        term, column
                    )))
                }
            }
        }

        if self.idf.iter().any(|w| !w.is_finite()) {
            return Err(VectorizeError::InvalidState(
                "non-finite IDF weight".to_string(),
            ));
        }

        Ok(())
    }
}

impl Vectorizer for TfidfVectorizer {
    fn transform(&self, text: &str) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for term in tokenize(text) {
            if let Some(&column) = self.vocabulary.get(&term) {
                *counts.entry(column).or_insert(0.0) += 1.0;
            }
        }

        let mut vector = SparseVector::from_pairs(
            counts
                .into_iter()
                .map(|(column, count)| (column, count * self.idf[column]))
                .collect(),
        );
        vector.normalize_l2();
        vector
    }

    fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<&'static str> {
        vec!["egg flour", "egg milk sugar", "chicken rice"]
    }

    #[test]
    fn test_fit_builds_sorted_vocabulary() {
        let vectorizer = TfidfVectorizer::fit(&corpus()).unwrap();
        let terms: Vec<&String> = vectorizer.vocabulary().keys().collect();
        assert_eq!(terms, vec!["chicken", "egg", "flour", "milk", "rice", "sugar"]);
        assert_eq!(vectorizer.vocabulary()["chicken"], 0);
        assert_eq!(vectorizer.vocabulary()["sugar"], 5);
        assert_eq!(vectorizer.vocabulary_size(), 6);
        assert_eq!(vectorizer.document_count(), 3);
        assert!(vectorizer.validate().is_ok());
    }

    #[test]
    fn test_smoothed_idf_weights() {
        let vectorizer = TfidfVectorizer::fit(&corpus()).unwrap();
        // "egg" occurs in 2 of 3 documents, "rice" in 1 of 3
        let egg = (4.0_f64 / 3.0).ln() + 1.0;
        let rice = (4.0_f64 / 2.0).ln() + 1.0;
        assert!((vectorizer.idf_of("egg").unwrap() - egg).abs() < 1e-12);
        assert!((vectorizer.idf_of("rice").unwrap() - rice).abs() < 1e-12);
        assert!(vectorizer.idf_of("tofu").is_none());
    }

    #[test]
    fn test_transform_is_unit_length_and_drops_unknown_terms() {
        let vectorizer = TfidfVectorizer::fit(&corpus()).unwrap();

        let v = vectorizer.transform("Egg FLOUR tofu");
        assert_eq!(v.nnz(), 2);
        assert!((v.norm() - 1.0).abs() < 1e-12);

        let unknown = vectorizer.transform("tofu tempeh");
        assert!(unknown.is_zero());
    }

    #[test]
    fn test_transform_counts_repeated_terms() {
        let vectorizer = TfidfVectorizer::fit(&corpus()).unwrap();
        let v = vectorizer.transform("egg egg flour");
        let egg_col = vectorizer.vocabulary()["egg"];
        let flour_col = vectorizer.vocabulary()["flour"];
        let egg = v.values()[v.indices().iter().position(|&c| c == egg_col).unwrap()];
        let flour = v.values()[v.indices().iter().position(|&c| c == flour_col).unwrap()];
        let expected_ratio =
            2.0 * vectorizer.idf_of("egg").unwrap() / vectorizer.idf_of("flour").unwrap();
        assert!((egg / flour - expected_ratio).abs() < 1e-9);
    }

    #[test]
    fn test_empty_documents_are_valid_input() {
        let (vectorizer, rows) = TfidfVectorizer::fit_transform(&["egg", "", "milk"]).unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows[1].is_zero());
        assert_eq!(vectorizer.vocabulary_size(), 2);
    }

    #[test]
    fn test_fit_errors() {
        let empty: Vec<&str> = Vec::new();
        assert!(matches!(TfidfVectorizer::fit(&empty), Err(VectorizeError::EmptyCorpus)));
        assert!(matches!(
            TfidfVectorizer::fit(&["", "a"]),
            Err(VectorizeError::EmptyVocabulary)
        ));
    }

    #[test]
    fn test_validate_rejects_inconsistent_state() {
        let mut vectorizer = TfidfVectorizer::fit(&corpus()).unwrap();
        vectorizer.idf.pop();
        assert!(matches!(vectorizer.validate(), Err(VectorizeError::InvalidState(_))));

        let mut vectorizer = TfidfVectorizer::fit(&corpus()).unwrap();
        vectorizer.vocabulary.insert("egg".to_string(), 0);
        assert!(vectorizer.validate().is_err());
    }

    #[test]
    fn test_serde_preserves_fitted_state() {
        let vectorizer = TfidfVectorizer::fit(&corpus()).unwrap();
        let json = serde_json::to_string(&vectorizer).unwrap();
        let restored: TfidfVectorizer = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.vocabulary(), vectorizer.vocabulary());
        for (a, b) in restored.idf().iter().zip(vectorizer.idf()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!(restored.validate().is_ok());
    }
}
