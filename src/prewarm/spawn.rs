// src/prewarm/spawn.rs
//! Engine side of the scheduler: turns plan indices into entities.
//! Bundle-free: components are added explicitly (Transform, Visibility, SceneRoot, Mesh3d, ...).

use bevy::pbr::MeshMaterial3d;
use bevy::prelude::*;
use bevy::render::batching::NoAutomaticBatching;
use bevy::render::mesh::MeshAabb;

use super::config::{LightDef, MeshSource, PrewarmConfig};
use super::generator::GeneratedVariant;
use super::lights::{LightParams, LightRig};
use super::material::{is_wgsl_path, VariantMaterial};
use super::queue::MaterialRef;
use super::scheduler::PrewarmSpawner;

/// Tag on every object spawned by a prewarm session.
#[derive(Component, Debug, Clone, Copy)]
pub struct PrewarmObject;

/// Tag on transient prewarm lights.
#[derive(Component, Debug, Clone, Copy)]
pub struct PrewarmLight;

pub struct NamedHandle<T: Asset> {
    pub name: String,
    pub handle: Handle<T>,
}

pub struct VariantHandle {
    pub label: String,
    pub handle: Handle<VariantMaterial>,
    pub instancing: bool,
}

/// Engine handles for every seed, indexed the same way as the session's plan.
#[derive(Resource, Default)]
pub struct PrewarmAssets {
    pub prefabs: Vec<NamedHandle<Scene>>,
    pub materials: Vec<NamedHandle<StandardMaterial>>,
    pub variants: Vec<VariantHandle>,
    pub meshes: Vec<NamedHandle<Mesh>>,
    pub renderers: Vec<NamedHandle<Mesh>>,
    pub lights: Vec<LightDef>,
}

impl PrewarmAssets {
    pub fn build(
        config: &PrewarmConfig,
        variants: &[GeneratedVariant],
        assets: &AssetServer,
        meshes: &mut Assets<Mesh>,
        materials: &mut Assets<StandardMaterial>,
        variant_materials: &mut Assets<VariantMaterial>,
    ) -> Self {
        let prefabs = config
            .prefabs
            .iter()
            .map(|p| NamedHandle { name: p.name.clone(), handle: assets.load(p.scene.as_str()) })
            .collect();

        let seed_materials = config
            .materials
            .iter()
            .map(|m| {
                let [r, g, b, a] = m.base_color;
                let handle = materials.add(StandardMaterial {
                    base_color: Color::srgba(r, g, b, a),
                    metallic: m.metallic,
                    perceptual_roughness: m.perceptual_roughness,
                    unlit: m.unlit,
                    double_sided: m.double_sided,
                    cull_mode: if m.double_sided { None } else { Some(bevy::render::render_resource::Face::Back) },
                    ..default()
                });
                NamedHandle { name: m.name.clone(), handle }
            })
            .collect();

        let variants = variants
            .iter()
            .map(|v| {
                let shader = if is_wgsl_path(&v.shader) {
                    Some(assets.load::<Shader>(v.shader.as_str()))
                } else {
                    None
                };
                VariantHandle {
                    label: v.label.clone(),
                    handle: variant_materials.add(VariantMaterial::from_variant(v, shader)),
                    instancing: v.instancing,
                }
            })
            .collect();

        let mesh_handles = config
            .meshes
            .iter()
            .map(|m| NamedHandle { name: m.name.clone(), handle: mesh_handle(&m.source, assets, meshes) })
            .collect();

        let renderers = config
            .renderer_parts()
            .into_iter()
            .map(|(name, part)| NamedHandle { name, handle: mesh_handle(part, assets, meshes) })
            .collect();

        Self {
            prefabs,
            materials: seed_materials,
            variants,
            meshes: mesh_handles,
            renderers,
            lights: config.lights.clone(),
        }
    }
}

fn mesh_handle(source: &MeshSource, assets: &AssetServer, meshes: &mut Assets<Mesh>) -> Handle<Mesh> {
    match source {
        MeshSource::Asset { path } => assets.load(path.as_str()),
        MeshSource::Cuboid { size: [x, y, z] } => meshes.add(Cuboid::new(*x, *y, *z)),
        MeshSource::Sphere { radius } => meshes.add(Sphere::new(*radius)),
        MeshSource::Capsule { radius, length } => meshes.add(Capsule3d::new(*radius, *length)),
        MeshSource::Torus { minor_radius, major_radius } => meshes.add(Torus {
            minor_radius: *minor_radius,
            major_radius: *major_radius,
        }),
        MeshSource::Plane { size: [x, z] } => meshes.add(Plane3d::default().mesh().size(*x, *z)),
    }
}

/// `PrewarmSpawner` over `Commands`. Lives for one system run.
pub struct EcsSpawner<'a, 'w, 's> {
    pub commands: &'a mut Commands<'w, 's>,
    pub assets: &'a PrewarmAssets,
    pub meshes: &'a Assets<Mesh>,
}

impl EcsSpawner<'_, '_, '_> {
    fn material_label(&self, material: MaterialRef) -> &str {
        match material {
            MaterialRef::Seed(i) => self.assets.materials.get(i).map(|m| m.name.as_str()),
            MaterialRef::Generated(i) => self.assets.variants.get(i).map(|v| v.label.as_str()),
        }
        .unwrap_or("<unknown material>")
    }

    /// Drawable entity with the mesh + material pair applied.
    fn spawn_drawable(
        &mut self,
        name: String,
        mesh: Handle<Mesh>,
        material: MaterialRef,
        transform: Transform,
    ) -> Entity {
        let mut e = self.commands.spawn((
            Name::new(name),
            PrewarmObject,
            transform,
            Visibility::Visible,
            Mesh3d(mesh),
        ));

        match material {
            MaterialRef::Seed(i) => {
                let handle = self.assets.materials.get(i).map(|m| m.handle.clone()).unwrap_or_default();
                e.insert(MeshMaterial3d(handle));
            }
            MaterialRef::Generated(i) => {
                let (handle, instancing) = self
                    .assets
                    .variants
                    .get(i)
                    .map(|v| (v.handle.clone(), v.instancing))
                    .unwrap_or_default();
                e.insert(MeshMaterial3d(handle));
                if !instancing {
                    e.insert(NoAutomaticBatching);
                }
            }
        }
        e.id()
    }
}

impl PrewarmSpawner for EcsSpawner<'_, '_, '_> {
    type Instance = Entity;

    fn spawn_seed_object(&mut self, prefab: usize, transform: Transform) -> Entity {
        let Some(p) = self.assets.prefabs.get(prefab) else {
            warn!("Prewarm: no prefab at index {}", prefab);
            return self.commands.spawn((PrewarmObject, transform)).id();
        };
        self.commands
            .spawn((
                Name::new(format!("Prewarm - {}", p.name)),
                PrewarmObject,
                transform,
                Visibility::Visible,
                SceneRoot(p.handle.clone()),
            ))
            .id()
    }

    fn spawn_mesh(&mut self, mesh: usize, material: MaterialRef, transform: Transform) -> Entity {
        let (name, handle) = match self.assets.meshes.get(mesh) {
            Some(m) => (m.name.clone(), m.handle.clone()),
            None => (format!("mesh #{mesh}"), Handle::default()),
        };
        let name = format!("Prewarm - {} x {}", name, self.material_label(material));
        self.spawn_drawable(name, handle, material, transform)
    }

    fn renderer_extent(&self, renderer: usize) -> Option<Vec3> {
        let r = self.assets.renderers.get(renderer)?;
        let aabb = self.meshes.get(&r.handle)?.compute_aabb()?;
        Some(Vec3::from(aabb.half_extents) * 2.0)
    }

    fn spawn_renderer_clone(
        &mut self,
        renderer: usize,
        material: MaterialRef,
        transform: Transform,
    ) -> Entity {
        let (name, handle) = match self.assets.renderers.get(renderer) {
            Some(r) => (r.name.clone(), r.handle.clone()),
            None => (format!("renderer #{renderer}"), Handle::default()),
        };
        let name = format!("Prewarm - {} (renderer) x {}", name, self.material_label(material));
        self.spawn_drawable(name, handle, material, transform)
    }

    fn spawn_light(&mut self, light: usize, rig: &LightRig) -> Entity {
        let def = self.assets.lights.get(light);
        let name = def.map(|d| d.name.as_str()).unwrap_or("unnamed");
        let [r, g, b] = def.map(|d| d.color).unwrap_or([1.0, 1.0, 1.0]);
        let color = Color::srgb(r, g, b);
        let intensity = def.and_then(|d| d.intensity);
        let shadows_enabled = def.is_some_and(|d| d.shadows);

        let mut e = self.commands.spawn((
            Name::new(format!("Prewarm Light - {name}")),
            PrewarmLight,
            rig.transform,
        ));

        match rig.params {
            LightParams::Directional => {
                let defaults = DirectionalLight::default();
                e.insert(DirectionalLight {
                    color,
                    illuminance: intensity.unwrap_or(defaults.illuminance),
                    shadows_enabled,
                    ..defaults
                });
            }
            LightParams::Point { range } => {
                let defaults = PointLight::default();
                e.insert(PointLight {
                    color,
                    intensity: intensity.unwrap_or(defaults.intensity),
                    range,
                    shadows_enabled,
                    ..defaults
                });
            }
            LightParams::Spot { range, cone_angle_deg } => {
                let defaults = SpotLight::default();
                let outer = spot_outer_angle(cone_angle_deg);
                e.insert(SpotLight {
                    color,
                    intensity: intensity.unwrap_or(defaults.intensity),
                    range,
                    outer_angle: outer,
                    inner_angle: outer * 0.9,
                    shadows_enabled,
                    ..defaults
                });
            }
        }
        e.id()
    }

    fn despawn(&mut self, instance: Entity) {
        if let Ok(mut e) = self.commands.get_entity(instance) {
            e.despawn();
        }
    }
}

/// Full cone aperture in degrees -> engine half-angle in radians, kept below 90°.
fn spot_outer_angle(cone_angle_deg: f32) -> f32 {
    (cone_angle_deg.to_radians() * 0.5).clamp(0.0, std::f32::consts::FRAC_PI_2 - 1e-3)
}
