// src/prewarm/keywords.rs
//! Keyword combinations and per-shader variant sets.
//! Everything that compares combinations goes through `canonical_key`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Joins sorted keywords into a canonical key.
pub const CANONICAL_DELIMITER: &str = " | ";

/// Keywords enabled together for one shader compile.
/// Keeps the order it was observed in; use `sorted()` for the canonical ordering.
/// Equality and hashing go through `canonical_key`, so order never matters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordCombination(Vec<String>);

impl KeywordCombination {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keywords.into_iter().map(Into::into).collect())
    }

    pub fn keywords(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Same keywords, ordinal (byte-wise) ascending.
    pub fn sorted(&self) -> Self {
        let mut keywords = self.0.clone();
        keywords.sort();
        Self(keywords)
    }

    /// Order-independent identity used for deduplication.
    pub fn canonical_key(&self) -> String {
        let mut refs: Vec<&str> = self.0.iter().map(String::as_str).collect();
        refs.sort_unstable();
        refs.join(CANONICAL_DELIMITER)
    }

    /// Exact element-wise match (no canonicalization).
    pub fn sequence_eq(&self, keywords: &[String]) -> bool {
        self.0.as_slice() == keywords
    }
}

impl PartialEq for KeywordCombination {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}

impl Eq for KeywordCombination {}

impl Hash for KeywordCombination {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_key().hash(state);
    }
}

/// Unique combinations for one shader, in first-seen order.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "StoredVariantSet", into = "StoredVariantSet")]
pub struct ShaderVariantSet {
    shader: String,
    combinations: Vec<KeywordCombination>,
    seen: HashSet<String>,
}

impl ShaderVariantSet {
    pub fn new(shader: impl Into<String>) -> Self {
        Self { shader: shader.into(), combinations: Vec::new(), seen: HashSet::new() }
    }

    pub fn shader(&self) -> &str {
        &self.shader
    }

    pub fn combinations(&self) -> &[KeywordCombination] {
        &self.combinations
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    #[cfg(test)]
    pub fn contains(&self, combination: &KeywordCombination) -> bool {
        self.seen.contains(&combination.canonical_key())
    }

    /// Appends unless a combination with the same canonical key is present.
    /// Returns whether it was added.
    pub fn insert(&mut self, combination: KeywordCombination) -> bool {
        if !self.seen.insert(combination.canonical_key()) {
            return false;
        }
        self.combinations.push(combination);
        true
    }
}

impl PartialEq for ShaderVariantSet {
    fn eq(&self, other: &Self) -> bool {
        self.shader == other.shader && self.combinations == other.combinations
    }
}

impl Eq for ShaderVariantSet {}

/// On-disk form. Loading re-inserts every combination so duplicates in a
/// hand-edited file collapse.
#[derive(Clone, Serialize, Deserialize)]
struct StoredVariantSet {
    shader: String,
    #[serde(default)]
    combinations: Vec<KeywordCombination>,
}

impl From<StoredVariantSet> for ShaderVariantSet {
    fn from(stored: StoredVariantSet) -> Self {
        let mut set = ShaderVariantSet::new(stored.shader);
        for combination in stored.combinations {
            set.insert(combination);
        }
        set
    }
}

impl From<ShaderVariantSet> for StoredVariantSet {
    fn from(set: ShaderVariantSet) -> Self {
        Self { shader: set.shader, combinations: set.combinations }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_ignores_order() {
        let a = KeywordCombination::new(["_SHADOWS", "FOG_LINEAR", "INSTANCING_ON"]);
        let b = KeywordCombination::new(["INSTANCING_ON", "_SHADOWS", "FOG_LINEAR"]);
        assert_eq!(a.canonical_key(), b.canonical_key());
        assert_eq!(a.canonical_key(), "FOG_LINEAR | INSTANCING_ON | _SHADOWS");
        assert_eq!(a, b);
        assert_ne!(a.keywords(), b.keywords());
    }

    #[test]
    fn equal_combinations_hash_alike() {
        let set: HashSet<KeywordCombination> = [
            KeywordCombination::new(["K1", "K2"]),
            KeywordCombination::new(["K2", "K1"]),
            KeywordCombination::new(["K1"]),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 2);
        assert_ne!(KeywordCombination::new(["K1"]), KeywordCombination::new(["K1", "K2"]));
    }

    #[test]
    fn sorted_matches_canonical_key_order() {
        let c = KeywordCombination::new(["K2", "K1", "A"]);
        let sorted = c.sorted();
        assert_eq!(sorted.keywords(), ["A", "K1", "K2"]);
        assert_eq!(sorted.keywords().join(CANONICAL_DELIMITER), c.canonical_key());
    }

    #[test]
    fn variant_set_rejects_canonical_duplicates() {
        let mut set = ShaderVariantSet::new("Lit");
        assert!(set.insert(KeywordCombination::new(["K2", "K1"])));
        assert!(!set.insert(KeywordCombination::new(["K1", "K2"])));
        assert!(set.insert(KeywordCombination::new(["K1"])));
        assert_eq!(set.len(), 2);
        assert_eq!(set.combinations()[0].keywords(), ["K2", "K1"]);
    }

    #[test]
    fn deserializing_collapses_duplicates() {
        let text = r#"(shader: "Lit", combinations: [["A", "B"], ["B", "A"], ["C"]])"#;
        let set: ShaderVariantSet = ron::from_str(text).expect("valid ron");
        assert_eq!(set.shader(), "Lit");
        assert_eq!(set.len(), 2);
        assert!(set.contains(&KeywordCombination::new(["C"])));
    }
}
