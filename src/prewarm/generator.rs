// src/prewarm/generator.rs
//! One material variant per resolved (shader, combination) pair.

use super::keywords::{KeywordCombination, ShaderVariantSet};

/// Keyword that maps to the material's instancing flag instead of a shader define.
pub const INSTANCING_KEYWORD: &str = "INSTANCING_ON";

/// A variant description; `material.rs` turns it into an engine material.
#[derive(Clone, Debug, PartialEq)]
pub struct GeneratedVariant {
    pub shader: String,
    pub combination: KeywordCombination,
    /// Keywords to switch on, canonical order, instancing keyword excluded.
    pub enabled_keywords: Vec<String>,
    pub instancing: bool,
    pub label: String,
}

impl GeneratedVariant {
    pub fn from_combination(shader: &str, combination: &KeywordCombination) -> Self {
        let canonical = combination.sorted();
        let mut enabled_keywords = Vec::with_capacity(canonical.len());
        let mut instancing = false;
        for keyword in canonical.keywords() {
            if keyword == INSTANCING_KEYWORD {
                instancing = true;
            } else {
                enabled_keywords.push(keyword.clone());
            }
        }

        Self {
            shader: shader.to_string(),
            combination: canonical,
            enabled_keywords,
            instancing,
            label: format!("Generated material (from shader \"{shader}\")"),
        }
    }
}

/// No dedup here: identical-looking variants are still emitted once each.
pub fn generate(resolved: &[ShaderVariantSet]) -> Vec<GeneratedVariant> {
    resolved
        .iter()
        .flat_map(|set| {
            set.combinations()
                .iter()
                .map(move |combination| GeneratedVariant::from_combination(set.shader(), combination))
        })
        .collect()
}
