// src/prewarm/queue.rs
//! Prewarm work queues: one FIFO lane per spawn category, drained in priority order.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};

use bevy::prelude::*;

use super::lights::LightKind;

/// Which material list an index points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MaterialRef {
    /// `PrewarmConfig::materials`
    Seed(usize),
    /// Output of the variant generator.
    Generated(usize),
}

/// One unit of spawn work. Indices refer into the session's `PrewarmPlan`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpawnQueueItem {
    SeedObject(usize),
    MeshMaterial { mesh: usize, material: MaterialRef },
    RendererMaterial { renderer: usize, material: MaterialRef },
}

impl SpawnQueueItem {
    pub fn priority(&self) -> QueuePriority {
        match self {
            SpawnQueueItem::SeedObject(_) => QueuePriority::SeedObjects,
            SpawnQueueItem::MeshMaterial { .. } => QueuePriority::MeshMaterial,
            SpawnQueueItem::RendererMaterial { .. } => QueuePriority::RendererMaterial,
        }
    }

    #[cfg(test)]
    pub fn material(&self) -> Option<MaterialRef> {
        match *self {
            SpawnQueueItem::SeedObject(_) => None,
            SpawnQueueItem::MeshMaterial { material, .. }
            | SpawnQueueItem::RendererMaterial { material, .. } => Some(material),
        }
    }
}

/// Lane index; lower drains first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueuePriority {
    SeedObjects = 0,
    MeshMaterial = 1,
    RendererMaterial = 2,
}

impl QueuePriority {
    pub const ORDERED: [QueuePriority; 3] = [
        QueuePriority::SeedObjects,
        QueuePriority::MeshMaterial,
        QueuePriority::RendererMaterial,
    ];

    pub fn label(self) -> &'static str {
        match self {
            QueuePriority::SeedObjects => "seed object queue",
            QueuePriority::MeshMaterial => "mesh x material queue",
            QueuePriority::RendererMaterial => "mesh renderer x material queue",
        }
    }
}

/// Which mesh lanes get populated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeshSeedType {
    None,
    Mesh,
    MeshRenderer,
    #[default]
    All,
}

impl MeshSeedType {
    pub fn uses_meshes(self) -> bool {
        matches!(self, MeshSeedType::Mesh | MeshSeedType::All)
    }

    pub fn uses_renderers(self) -> bool {
        matches!(self, MeshSeedType::MeshRenderer | MeshSeedType::All)
    }
}

/// Which seed sources feed the queues.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueOptions {
    #[serde(default)]
    pub use_source_prefabs: bool,
    #[serde(default = "default_true")]
    pub use_source_materials: bool,
    #[serde(default = "default_true")]
    pub use_source_shaders: bool,
    #[serde(default)]
    pub mesh_seed: MeshSeedType,
}

fn default_true() -> bool {
    true
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            use_source_prefabs: false,
            use_source_materials: true,
            use_source_shaders: true,
            mesh_seed: MeshSeedType::All,
        }
    }
}

/// A light taking part in subsets.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanLight {
    pub name: String,
    pub kind: LightKind,
}

/// Everything a session needs to know about its inputs, as labels.
/// Positions in each list are the indices used by `SpawnQueueItem`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrewarmPlan {
    pub prefabs: Vec<String>,
    pub materials: Vec<String>,
    pub generated: Vec<String>,
    pub meshes: Vec<String>,
    pub renderers: Vec<String>,
    pub lights: Vec<PlanLight>,
    pub options: QueueOptions,
}

impl PrewarmPlan {
    pub fn material_label(&self, material: MaterialRef) -> &str {
        let label = match material {
            MaterialRef::Seed(i) => self.materials.get(i),
            MaterialRef::Generated(i) => self.generated.get(i),
        };
        label.map(String::as_str).unwrap_or("<unknown material>")
    }

    /// Renderer indices to use, first occurrence of each name only.
    fn unique_renderers(&self) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(self.renderers.len());
        for (i, name) in self.renderers.iter().enumerate() {
            if seen.insert(name.as_str()) {
                out.push(i);
            } else {
                warn!("Prewarm: duplicate mesh renderer seed '{}' skipped", name);
            }
        }
        out
    }

    /// Seed materials then generated variants, filtered by the options.
    fn material_sources(&self) -> Vec<MaterialRef> {
        let mut out = Vec::new();
        if self.options.use_source_materials {
            out.extend((0..self.materials.len()).map(MaterialRef::Seed));
        }
        if self.options.use_source_shaders {
            out.extend((0..self.generated.len()).map(MaterialRef::Generated));
        }
        out
    }
}

/// FIFO lanes indexed by `QueuePriority`.
#[derive(Clone, Debug, Default)]
pub struct SpawnQueues {
    lanes: [VecDeque<SpawnQueueItem>; 3],
}

impl SpawnQueues {
    pub fn push(&mut self, item: SpawnQueueItem) {
        self.lanes[item.priority() as usize].push_back(item);
    }

    pub fn pop(&mut self, lane: QueuePriority) -> Option<SpawnQueueItem> {
        self.lanes[lane as usize].pop_front()
    }

    pub fn lane_len(&self, lane: QueuePriority) -> usize {
        self.lanes[lane as usize].len()
    }

    pub fn len(&self) -> usize {
        self.lanes.iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.iter().all(VecDeque::is_empty)
    }

    pub fn clear(&mut self) {
        for lane in &mut self.lanes {
            lane.clear();
        }
    }

    /// Fill the lanes for a new session: every selected seed object, then
    /// every mesh x material and renderer x material pairing (mesh-major).
    pub fn populate(&mut self, plan: &PrewarmPlan) {
        let opts = plan.options;

        if opts.use_source_prefabs {
            for i in 0..plan.prefabs.len() {
                self.push(SpawnQueueItem::SeedObject(i));
            }
        }

        if opts.mesh_seed == MeshSeedType::None {
            return;
        }
        let materials = plan.material_sources();

        if opts.mesh_seed.uses_meshes() {
            for mesh in 0..plan.meshes.len() {
                for &material in &materials {
                    self.push(SpawnQueueItem::MeshMaterial { mesh, material });
                }
            }
        }

        if opts.mesh_seed.uses_renderers() {
            for renderer in plan.unique_renderers() {
                for &material in &materials {
                    self.push(SpawnQueueItem::RendererMaterial { renderer, material });
                }
            }
        }

        info!(
            "Prewarm: queued {} seed objects, {} mesh x material, {} mesh renderer x material",
            self.lane_len(QueuePriority::SeedObjects),
            self.lane_len(QueuePriority::MeshMaterial),
            self.lane_len(QueuePriority::RendererMaterial),
        );
    }
}
