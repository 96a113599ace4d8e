// src/prewarm/config.rs
//! Data-driven prewarm configuration + keyword capture assets and their loaders.

use bevy::asset::{io::Reader, AssetLoader, LoadContext};
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::collector::{run_collection_pass, CollectedPass};
use super::generator::GeneratedVariant;
use super::keywords::ShaderVariantSet;
use super::lights::LightKind;
use super::placement::SpawnVolume;
use super::queue::{PlanLight, PrewarmPlan, QueueOptions};
use super::resolver::{log_variant_summary, resolve};
use super::scheduler::ScheduleSettings;

// ---------- Public plugin to register assets+loaders ----------

pub struct PrewarmConfigAssetPlugin;

impl Plugin for PrewarmConfigAssetPlugin {
    fn build(&self, app: &mut App) {
        app.init_asset::<PrewarmConfig>()
            .init_asset::<KeywordCapture>()
            .register_asset_loader(PrewarmConfigLoader)
            .register_asset_loader(KeywordCaptureLoader);
    }
}

// ---------- Seed definitions (data form) ----------

/// A prefab-like scene spawned as-is.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrefabDef {
    pub name: String,
    /// Scene asset path, e.g. `models/crate.glb#Scene0`.
    pub scene: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MaterialDef {
    pub name: String,
    #[serde(default = "default_base_color")]
    pub base_color: [f32; 4],
    #[serde(default)]
    pub metallic: f32,
    #[serde(default = "default_roughness")]
    pub perceptual_roughness: f32,
    #[serde(default)]
    pub unlit: bool,
    #[serde(default)]
    pub double_sided: bool,
}

fn default_base_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}
fn default_roughness() -> f32 {
    0.5
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MeshSource {
    Asset { path: String },
    Cuboid { size: [f32; 3] },
    Sphere { radius: f32 },
    Capsule { radius: f32, length: f32 },
    Torus { minor_radius: f32, major_radius: f32 },
    Plane { size: [f32; 2] },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshDef {
    pub name: String,
    pub source: MeshSource,
}

/// Object whose renderers get cloned with each material. Each part is one
/// child renderer and is rescaled to unit size on its own.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MeshRendererDef {
    pub name: String,
    pub parts: Vec<MeshSource>,
}

impl MeshRendererDef {
    /// `name` for a single-part object, `name[i]` per part otherwise.
    pub fn part_label(&self, index: usize) -> String {
        if self.parts.len() == 1 {
            self.name.clone()
        } else {
            format!("{}[{}]", self.name, index)
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightDef {
    pub name: String,
    pub kind: LightKind,
    #[serde(default = "default_light_color")]
    pub color: [f32; 3],
    /// Lux for directional lights, lumens otherwise; engine default when absent.
    #[serde(default)]
    pub intensity: Option<f32>,
    #[serde(default)]
    pub shadows: bool,
}

fn default_light_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Scenes reachable through the next-scene trigger.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SceneCatalogDef {
    #[serde(default)]
    pub scenes: Vec<String>,
    #[serde(default)]
    pub active: usize,
    #[serde(default)]
    pub next_scene_index: i64,
}

// ---------- Runtime config asset ----------

#[derive(Asset, TypePath, Clone, Debug, Default, Serialize, Deserialize)]
pub struct PrewarmConfig {
    #[serde(default)]
    pub prefabs: Vec<PrefabDef>,
    #[serde(default)]
    pub materials: Vec<MaterialDef>,
    /// Seed shader asset paths; only these get resolved keyword entries.
    #[serde(default)]
    pub shaders: Vec<String>,
    #[serde(default)]
    pub meshes: Vec<MeshDef>,
    #[serde(default)]
    pub mesh_renderers: Vec<MeshRendererDef>,
    #[serde(default)]
    pub lights: Vec<LightDef>,
    /// Resolved shader -> combinations, in seed shader order.
    #[serde(default)]
    pub shader_keywords: Vec<ShaderVariantSet>,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub volume: SpawnVolume,
    #[serde(default)]
    pub queues: QueueOptions,
    #[serde(default)]
    pub scenes: SceneCatalogDef,
}

impl PrewarmConfig {
    /// Replace the resolved map with one built from `passes`; returns the
    /// number of combinations kept.
    pub fn apply_collected(&mut self, passes: &[CollectedPass]) -> usize {
        self.shader_keywords = resolve(passes, &self.shaders);
        log_variant_summary(&self.shader_keywords);
        self.shader_keywords.iter().map(ShaderVariantSet::len).sum()
    }

    /// Labels and options for a session, with `generated` as the variant list.
    pub fn plan(&self, generated: &[GeneratedVariant]) -> PrewarmPlan {
        PrewarmPlan {
            prefabs: self.prefabs.iter().map(|p| p.name.clone()).collect(),
            materials: self.materials.iter().map(|m| m.name.clone()).collect(),
            generated: generated.iter().map(|v| v.label.clone()).collect(),
            meshes: self.meshes.iter().map(|m| m.name.clone()).collect(),
            renderers: self.renderer_parts().into_iter().map(|(label, _)| label).collect(),
            lights: self
                .lights
                .iter()
                .map(|l| PlanLight { name: l.name.clone(), kind: l.kind })
                .collect(),
            options: self.queues,
        }
    }

    /// Every renderer part across all seed objects, flattened in config order.
    /// Plan renderer indices point into this list.
    pub fn renderer_parts(&self) -> Vec<(String, &MeshSource)> {
        self.mesh_renderers
            .iter()
            .flat_map(|r| r.parts.iter().enumerate().map(move |(i, part)| (r.part_label(i), part)))
            .collect()
    }

    /// Pretty RON for writing the resolved config back to disk.
    pub fn to_ron_string(&self) -> Result<String, ron::Error> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
    }

    /// Write the config (resolved keyword map included) to `path`.
    pub fn save_ron(&self, path: impl AsRef<Path>) -> Result<(), PrewarmConfigSaveError> {
        std::fs::write(path, self.to_ron_string()?)?;
        Ok(())
    }

    /// Drop blank entries (unset slots in hand-edited files).
    fn drop_blank_entries(&mut self) {
        self.prefabs.retain(|p| !p.scene.trim().is_empty());
        self.shaders.retain(|s| !s.trim().is_empty());
        self.materials.retain(|m| !m.name.trim().is_empty());
        self.meshes.retain(|m| !m.name.trim().is_empty());
        self.mesh_renderers.retain(|r| !r.name.trim().is_empty() && !r.parts.is_empty());
        self.lights.retain(|l| !l.name.trim().is_empty());
    }

    fn check_unique_names(&self) -> Result<(), PrewarmConfigLoadError> {
        check_unique("prefab", self.prefabs.iter().map(|p| p.name.as_str()))?;
        check_unique("material", self.materials.iter().map(|m| m.name.as_str()))?;
        check_unique("shader", self.shaders.iter().map(String::as_str))?;
        check_unique("mesh", self.meshes.iter().map(|m| m.name.as_str()))?;
        check_unique("light", self.lights.iter().map(|l| l.name.as_str()))?;
        Ok(())
    }

    fn check_settings(&self) -> Result<(), PrewarmConfigLoadError> {
        if self.schedule.max_batch_size == 0 {
            return Err(PrewarmConfigLoadError::InvalidSetting {
                field: "schedule.max_batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        let numbers = [
            ("schedule.min_spawn_interval", self.schedule.min_spawn_interval),
            ("schedule.min_despawn_interval", self.schedule.min_despawn_interval),
            ("volume.half_width", self.volume.half_width),
            ("volume.half_height", self.volume.half_height),
            ("volume.distance", self.volume.distance),
        ];
        for (field, value) in numbers {
            if !value.is_finite() {
                return Err(PrewarmConfigLoadError::InvalidSetting {
                    field,
                    reason: format!("{value} is not a finite number"),
                });
            }
        }
        Ok(())
    }

    /// Parse, clean and validate a config file's bytes.
    pub fn from_ron_bytes(bytes: &[u8]) -> Result<Self, PrewarmConfigLoadError> {
        let mut config: PrewarmConfig =
            ron::de::from_bytes(bytes).map_err(|e| PrewarmConfigLoadError::Ron(e.to_string()))?;
        config.drop_blank_entries();
        config.check_unique_names()?;
        config.check_settings()?;
        Ok(config)
    }
}

fn check_unique<'a>(
    kind: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), PrewarmConfigLoadError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(PrewarmConfigLoadError::DuplicateName { kind, name: name.to_string() });
        }
    }
    Ok(())
}

// ---------- Keyword capture asset ----------

/// One compiled unit as reported by the build hook.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Observation {
    pub shader: String,
    pub keywords: Vec<String>,
}

/// Recorded observations, one list per compilation pass.
#[derive(Asset, TypePath, Clone, Debug, Default, Serialize, Deserialize)]
pub struct KeywordCapture {
    pub passes: Vec<Vec<Observation>>,
}

impl KeywordCapture {
    /// Replay every recorded pass through the collector.
    pub fn collect(&self) -> Vec<CollectedPass> {
        self.passes
            .iter()
            .map(|observations| {
                run_collection_pass(|pass| {
                    for o in observations {
                        pass.observe(&o.shader, &o.keywords);
                    }
                })
            })
            .collect()
    }
}

// ---------- Asset loaders ----------

#[derive(Default)]
pub struct PrewarmConfigLoader;

impl AssetLoader for PrewarmConfigLoader {
    type Asset = PrewarmConfig;
    type Settings = ();
    type Error = PrewarmConfigLoadError;

    fn extensions(&self) -> &[&str] {
        &["prewarm.ron"]
    }

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        PrewarmConfig::from_ron_bytes(&bytes)
    }
}

#[derive(Default)]
pub struct KeywordCaptureLoader;

impl AssetLoader for KeywordCaptureLoader {
    type Asset = KeywordCapture;
    type Settings = ();
    type Error = KeywordCaptureLoadError;

    fn extensions(&self) -> &[&str] {
        &["keywords.ron"]
    }

    async fn load(
        &self,
        reader: &mut dyn Reader,
        _settings: &Self::Settings,
        _load_context: &mut LoadContext<'_>,
    ) -> Result<Self::Asset, Self::Error> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes).await?;
        ron::de::from_bytes(&bytes).map_err(|e| KeywordCaptureLoadError::Ron(e.to_string()))
    }
}

// ---------- Loader errors ----------

#[derive(thiserror::Error, Debug)]
pub enum PrewarmConfigLoadError {
    #[error("I/O while reading prewarm config: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(String),
    #[error("Duplicate {kind} name '{name}'")]
    DuplicateName { kind: &'static str, name: String },
    #[error("Invalid {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

#[derive(thiserror::Error, Debug)]
pub enum PrewarmConfigSaveError {
    #[error("I/O while writing prewarm config: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON serialize error: {0}")]
    Ron(#[from] ron::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum KeywordCaptureLoadError {
    #[error("I/O while reading keyword capture: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(String),
}
