// src/prewarm/collector.rs
//! Per-pass keyword collection.
//! A compile driver gets a `CollectionPass` for the duration of one pass and
//! reports every compiled unit into it. Nothing here is global.

use std::collections::HashMap;

use super::keywords::KeywordCombination;

/// Raw observations for one shader within a single pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ShaderObservations {
    pub shader: String,
    pub sequences: Vec<KeywordCombination>,
}

/// Result of one finished collection pass; shaders in first-seen order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectedPass {
    pub shaders: Vec<ShaderObservations>,
}

impl CollectedPass {
    pub fn observation_count(&self) -> usize {
        self.shaders.iter().map(|s| s.sequences.len()).sum()
    }
}

/// Live context handed to the compile driver.
#[derive(Debug, Default)]
pub struct CollectionPass {
    gathering: bool,
    shaders: Vec<ShaderObservations>,
    by_name: HashMap<String, usize>,
}

impl CollectionPass {
    #[cfg(test)]
    pub fn is_gathering(&self) -> bool {
        self.gathering
    }

    /// Records one compiled unit. Empty sequences and exact repeats within
    /// this pass are dropped; ordering differences are kept for the resolver.
    pub fn observe(&mut self, shader: &str, keywords: &[String]) {
        if !self.gathering || keywords.is_empty() {
            return;
        }

        let idx = match self.by_name.get(shader) {
            Some(&i) => i,
            None => {
                self.shaders.push(ShaderObservations {
                    shader: shader.to_string(),
                    sequences: Vec::new(),
                });
                let i = self.shaders.len() - 1;
                self.by_name.insert(shader.to_string(), i);
                i
            }
        };

        let entry = &mut self.shaders[idx];
        if entry.sequences.iter().any(|seq| seq.sequence_eq(keywords)) {
            return;
        }
        entry.sequences.push(KeywordCombination::new(keywords.iter().cloned()));
    }

    fn finish(self) -> CollectedPass {
        CollectedPass { shaders: self.shaders }
    }
}

/// Runs one gathering pass: `compile` sees an open pass, and the collected
/// data comes back once it returns.
pub fn run_collection_pass<F>(compile: F) -> CollectedPass
where
    F: FnOnce(&mut CollectionPass),
{
    let mut pass = CollectionPass { gathering: true, ..Default::default() };
    compile(&mut pass);
    pass.gathering = false;
    pass.finish()
}
