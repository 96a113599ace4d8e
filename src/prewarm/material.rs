// src/prewarm/material.rs
//! Engine material for generated variants. Enabled keywords become shader defs
//! during pipeline specialization, so each distinct keyword set compiles its
//! own pipeline the first time it is drawn.

use bevy::pbr::{MaterialPipeline, MaterialPipelineKey};
use bevy::prelude::*;
use bevy::render::mesh::MeshVertexBufferLayoutRef;
use bevy::render::render_resource::{
    AsBindGroup, RenderPipelineDescriptor, ShaderDefVal, ShaderRef, SpecializedMeshPipelineError,
};

use super::generator::GeneratedVariant;

/// Fragment shader used when a variant's shader path can't be loaded as WGSL.
pub const DEFAULT_VARIANT_SHADER: &str = "shaders/prewarm_variant.wgsl";

#[derive(Asset, TypePath, AsBindGroup, Debug, Clone)]
#[bind_group_data(VariantMaterialKey)]
pub struct VariantMaterial {
    #[uniform(0)]
    pub color: LinearRgba,
    /// Overrides the default fragment shader when set.
    pub shader: Option<Handle<Shader>>,
    pub keywords: Vec<String>,
}

impl VariantMaterial {
    pub fn from_variant(variant: &GeneratedVariant, shader: Option<Handle<Shader>>) -> Self {
        Self {
            color: LinearRgba::WHITE,
            shader,
            keywords: variant.enabled_keywords.clone(),
        }
    }
}

/// Pipeline key: one specialization per (shader, keyword set).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct VariantMaterialKey {
    pub shader: Option<Handle<Shader>>,
    pub keywords: Vec<String>,
}

impl From<&VariantMaterial> for VariantMaterialKey {
    fn from(material: &VariantMaterial) -> Self {
        Self {
            shader: material.shader.clone(),
            keywords: material.keywords.clone(),
        }
    }
}

impl Material for VariantMaterial {
    fn fragment_shader() -> ShaderRef {
        DEFAULT_VARIANT_SHADER.into()
    }

    fn specialize(
        _pipeline: &MaterialPipeline<Self>,
        descriptor: &mut RenderPipelineDescriptor,
        _layout: &MeshVertexBufferLayoutRef,
        key: MaterialPipelineKey<Self>,
    ) -> Result<(), SpecializedMeshPipelineError> {
        let Some(fragment) = descriptor.fragment.as_mut() else { return Ok(()) };
        if let Some(shader) = &key.bind_group_data.shader {
            fragment.shader = shader.clone();
        }
        fragment
            .shader_defs
            .extend(shader_defs(&key.bind_group_data.keywords));
        Ok(())
    }
}

fn shader_defs(keywords: &[String]) -> impl Iterator<Item = ShaderDefVal> + '_ {
    keywords.iter().map(|k| ShaderDefVal::Bool(k.clone(), true))
}

/// True when `path` names a shader this engine can compile directly.
pub fn is_wgsl_path(path: &str) -> bool {
    path.ends_with(".wgsl")
}
