// src/prewarm/resolver.rs
//! Merges collected passes into the authoritative shader -> combinations map.

use bevy::prelude::*;
use std::collections::HashMap;

use super::collector::CollectedPass;
use super::keywords::ShaderVariantSet;

/// Merge every pass (canonical dedup per shader), then keep only the seed
/// shaders, in seed order. Stored combinations are keyword-sorted.
pub fn resolve(passes: &[CollectedPass], seed_shaders: &[String]) -> Vec<ShaderVariantSet> {
    let mut merged: HashMap<&str, ShaderVariantSet> = HashMap::new();

    for pass in passes {
        for observed in &pass.shaders {
            let set = merged
                .entry(observed.shader.as_str())
                .or_insert_with(|| ShaderVariantSet::new(observed.shader.clone()));
            for seq in &observed.sequences {
                set.insert(seq.sorted());
            }
        }
    }

    let mut resolved = Vec::with_capacity(seed_shaders.len());
    for shader in seed_shaders {
        match merged.remove(shader.as_str()) {
            Some(set) => resolved.push(set),
            None => warn!(
                "Prewarm: shader '{}' not found in collected keyword data, \
                 likely excluded from the compiled scene/build",
                shader
            ),
        }
    }

    if !merged.is_empty() {
        debug!("Prewarm: dropped {} collected shaders not listed as seeds", merged.len());
    }

    resolved
}

/// Diagnostic summary: one line per shader with its combination count.
pub fn log_variant_summary(resolved: &[ShaderVariantSet]) {
    let mut total = 0usize;
    for set in resolved {
        if set.is_empty() {
            warn!("Prewarm: shader '{}' has no keyword combinations", set.shader());
            continue;
        }
        info!(
            "Prewarm: shader '{}' has keyword combination count: {}",
            set.shader(),
            set.len()
        );
        for combination in set.combinations() {
            debug!("Prewarm: shader '{}' keywords: {}", set.shader(), combination.keywords().join(" "));
        }
        total += set.len();
    }
    info!("Prewarm: {} shaders, {} keyword combinations in total", resolved.len(), total);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prewarm::collector::run_collection_pass;
    use crate::prewarm::keywords::KeywordCombination;
    use std::collections::HashSet;

    fn kw(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn seeds(list: &[&str]) -> Vec<String> {
        kw(list)
    }

    #[test]
    fn reordered_sequences_across_passes_collapse() {
        let first = run_collection_pass(|p| p.observe("S", &kw(&["K2", "K1"])));
        let second = run_collection_pass(|p| p.observe("S", &kw(&["K1", "K2"])));

        let resolved = resolve(&[first, second], &seeds(&["S"]));
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].len(), 1);
        assert_eq!(resolved[0].combinations()[0].keywords(), ["K1", "K2"]);
    }

    #[test]
    fn k_distinct_combinations_survive_any_number_of_passes() {
        let combos: [&[&str]; 4] = [&["A"], &["A", "B"], &["C", "B", "A"], &["D"]];
        let passes: Vec<_> = (0..5)
            .map(|i| {
                run_collection_pass(|p| {
                    for c in combos.iter().cycle().skip(i).take(combos.len()) {
                        let mut seq = kw(c);
                        if i % 2 == 1 {
                            seq.reverse();
                        }
                        p.observe("S", &seq);
                    }
                })
            })
            .collect();

        let resolved = resolve(&passes, &seeds(&["S"]));
        let set = &resolved[0];
        assert_eq!(set.len(), combos.len());
        let keys: HashSet<_> = set.combinations().iter().map(KeywordCombination::canonical_key).collect();
        assert_eq!(keys.len(), combos.len());
    }

    #[test]
    fn only_seed_shaders_survive_in_seed_order() {
        let pass = run_collection_pass(|p| {
            p.observe("A", &kw(&["X"]));
            p.observe("B", &kw(&["Y"]));
            p.observe("C", &kw(&["Z"]));
        });
        let resolved = resolve(&[pass], &seeds(&["C", "Missing", "A"]));
        let names: Vec<_> = resolved.iter().map(ShaderVariantSet::shader).collect();
        assert_eq!(names, ["C", "A"]);
    }

    #[test]
    fn resolve_is_idempotent() {
        let passes = vec![
            run_collection_pass(|p| {
                p.observe("S", &kw(&["B", "A"]));
                p.observe("T", &kw(&["Q"]));
            }),
            run_collection_pass(|p| {
                p.observe("S", &kw(&["C"]));
                p.observe("S", &kw(&["A", "B"]));
            }),
        ];
        let seed = seeds(&["S", "T"]);
        assert_eq!(resolve(&passes, &seed), resolve(&passes, &seed));
    }

    #[test]
    fn first_seen_order_is_kept() {
        let pass = run_collection_pass(|p| {
            p.observe("S", &kw(&["Z"]));
            p.observe("S", &kw(&["A"]));
            p.observe("S", &kw(&["M", "B"]));
        });
        let resolved = resolve(&[pass], &seeds(&["S"]));
        let got: Vec<_> = resolved[0].combinations().iter().map(|c| c.keywords().join(",")).collect();
        assert_eq!(got, ["Z", "A", "B,M"]);
    }
}
