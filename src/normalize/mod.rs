//! Ingredient list normalization.
//!
//! Turns every stored representation of an ingredient list into an ordered
//! sequence of ingredient names. The same routine serves the offline indexer
//! and the online query path, so both sides see identical tokens.
//!
//! Normalization never fails. A string that does not parse as a literal list
//! takes the comma-splitting fallback, which is logged as a warning.

pub mod literal;

use tracing::warn;

use crate::models::{NormalizedIngredients, RawIngredients};
use literal::{parse_literal, Literal};

/// Which branch produced a normalized list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeOutcome {
    /// Input was already a list
    Native,
    /// Text parsed as a list or tuple literal
    Literal,
    /// Text parsed as a scalar literal and became a single item
    Scalar,
    /// Text failed to parse and was split on commas
    Fallback,
    /// Missing or unusable input
    Empty,
}

/// Normalize a stored ingredient list.
///
/// Native lists are returned as-is: case folding happens at comparison time.
pub fn normalize(value: &RawIngredients) -> NormalizedIngredients {
    normalize_with_outcome(value).0
}

/// Normalize a stored ingredient list and report which branch handled it.
pub fn normalize_with_outcome(value: &RawIngredients) -> (NormalizedIngredients, NormalizeOutcome) {
    match value {
        RawIngredients::List(items) => (items.clone(), NormalizeOutcome::Native),
        RawIngredients::Text(text) => normalize_text(text),
        RawIngredients::Missing | RawIngredients::Other(_) => (Vec::new(), NormalizeOutcome::Empty),
    }
}

fn normalize_text(text: &str) -> (NormalizedIngredients, NormalizeOutcome) {
    match parse_literal(text) {
        Ok(Literal::List(items)) | Ok(Literal::Tuple(items)) => (
            items.iter().map(Literal::to_string).collect(),
            NormalizeOutcome::Literal,
        ),
        Ok(scalar) => (vec![scalar.to_string()], NormalizeOutcome::Scalar),
        Err(err) => {
            warn!(input = %text, error = %err, "Ingredient list is not a literal, splitting on commas");
            (split_delimited(text), NormalizeOutcome::Fallback)
        }
    }
}

/// Split loosely bracketed comma text such as `[egg, 'flour' , ]`.
///
/// Strips one leading `[` and one trailing `]`, splits on commas, trims
/// whitespace and surrounding quotes from every piece, and drops empty pieces.
pub fn split_delimited(text: &str) -> NormalizedIngredients {
    let trimmed = text.trim();
    let inner = trimmed.strip_prefix('[').unwrap_or(trimmed);
    let inner = inner.strip_suffix(']').unwrap_or(inner);

    inner
        .split(',')
        .map(|piece| piece.trim().trim_matches(|c| c == '\'' || c == '"').trim())
        .filter(|piece| !piece.is_empty())
        .map(str::to_string)
        .collect()
}

/// Comparison key for an ingredient: trimmed and lower-cased.
pub fn ingredient_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Join ingredient names into the lower-cased bag-of-words text fed to the vectorizer.
pub fn bag_of_words(ingredients: &[String]) -> String {
    ingredients.join(" ").to_lowercase()
}
