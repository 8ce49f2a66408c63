//! Deferred rendering pipeline
//!
//! Passes in frame order:
//! 1. G-Buffer pass - geometry into position/normal/emissive/albedo targets
//! 2. Lighting pass - fullscreen PBR shading into the HDR target
//! 3. Color pass - unlit per-instance colored geometry, depth tested
//! 4. Skybox pass - cubemap where nothing wrote depth
//! 5. Post-processing - tonemapping to the swapchain, then auto-exposure

pub mod color_pass;
pub mod gbuffer_pass;
pub mod lighting_pass;
pub mod postprocess;
pub mod skybox_pass;

pub use color_pass::ColorPass;
pub use gbuffer_pass::GBufferPass;
pub use lighting_pass::LightingPass;
pub use skybox_pass::SkyboxPass;

use crate::backend::traits::*;
use crate::backend::types::*;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

/// Fixed binding points shared between the CPU side and the WGSL sources
pub mod bindings {
    use crate::assets::TextureKind;

    /// Group holding [`super::TransformUniform`] in geometry pipelines
    pub const TRANSFORM_GROUP: u32 = 0;
    pub const TRANSFORM_BINDING: u32 = 0;

    /// Group holding the material textures in the G-buffer pipeline
    pub const MATERIAL_GROUP: u32 = 1;
    pub const MATERIAL_SAMPLER: u32 = 6;

    /// Material texture binding for a slot, 0 through 5
    pub const fn material_texture(kind: TextureKind) -> u32 {
        kind as u32
    }

    pub const GBUFFER_GROUP: u32 = 0;
    pub const LIGHTS_GROUP: u32 = 1;
    pub const LIGHTS_BINDING: u32 = 0;
    pub const CAMERA_BINDING: u32 = 1;

    pub const VERTEX_SLOT: u32 = 0;
    pub const INSTANCE_SLOT: u32 = 1;

    /// First vertex location of per-instance attributes
    pub const INSTANCE_LOCATION: u32 = 4;
}

/// Frame transform uniform
///
/// `model` stays identity; per-object transforms come from instance data.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct TransformUniform {
    pub view: Mat4,
    pub projection: Mat4,
    pub model: Mat4,
}

impl Default for TransformUniform {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            model: Mat4::IDENTITY,
        }
    }
}

/// Per-instance data of the colored pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ColoredInstance {
    pub model: Mat4,
    pub color: Vec4,
}

fn mat4_attributes() -> Vec<VertexAttribute> {
    (0..4)
        .map(|column| VertexAttribute {
            location: bindings::INSTANCE_LOCATION + column,
            format: VertexFormat::Float32x4,
            offset: column as u64 * 16,
        })
        .collect()
}

/// Instance layout carrying one model matrix (locations 4-7)
pub fn model_instance_layout() -> VertexBufferLayout {
    VertexBufferLayout {
        array_stride: std::mem::size_of::<Mat4>() as u64,
        step_mode: VertexStepMode::Instance,
        attributes: mat4_attributes(),
    }
}

/// Instance layout carrying a model matrix and a color (location 8)
pub fn colored_instance_layout() -> VertexBufferLayout {
    let mut attributes = mat4_attributes();
    attributes.push(VertexAttribute {
        location: bindings::INSTANCE_LOCATION + 4,
        format: VertexFormat::Float32x4,
        offset: 64,
    });
    VertexBufferLayout {
        array_stride: std::mem::size_of::<ColoredInstance>() as u64,
        step_mode: VertexStepMode::Instance,
        attributes,
    }
}

/// Bind group layout holding only the transform uniform
pub(crate) fn create_transform_layout<B: GraphicsBackend>(
    backend: &mut B,
) -> BackendResult<BindGroupLayoutHandle> {
    backend.create_bind_group_layout(&[BindGroupLayoutEntry {
        binding: bindings::TRANSFORM_BINDING,
        visibility: ShaderStageFlags::VERTEX_FRAGMENT,
        ty: BindingType::UniformBuffer,
    }])
}

/// Vertex stage emitting a triangle that covers the screen
pub(crate) const FULLSCREEN_VERTEX_WGSL: &str = r#"
struct FullscreenOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_fullscreen(@builtin(vertex_index) vertex_index: u32) -> FullscreenOutput {
    var output: FullscreenOutput;
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);
    output.position = vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
    output.uv = vec2<f32>(x, 1.0 - y);
    return output;
}
"#;

/// WGSL declarations matching [`TransformUniform`] and the vertex layouts
pub(crate) const TRANSFORM_WGSL: &str = r#"
struct Transform {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    model: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> transform: Transform;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) tangent: vec4<f32>,
}

struct InstanceInput {
    @location(4) model_0: vec4<f32>,
    @location(5) model_1: vec4<f32>,
    @location(6) model_2: vec4<f32>,
    @location(7) model_3: vec4<f32>,
}

fn instance_model(instance: InstanceInput) -> mat4x4<f32> {
    return mat4x4<f32>(instance.model_0, instance.model_1, instance.model_2, instance.model_3);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_layouts_match_structs() {
        assert_eq!(model_instance_layout().array_stride, 64);
        let colored = colored_instance_layout();
        assert_eq!(colored.array_stride, 80);
        let locations: Vec<u32> = colored.attributes.iter().map(|a| a.location).collect();
        assert_eq!(locations, vec![4, 5, 6, 7, 8]);
        assert_eq!(std::mem::size_of::<TransformUniform>(), 192);
    }
}
