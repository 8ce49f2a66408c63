//! G-Buffer generation pass for deferred rendering
//!
//! Renders instanced geometry to multiple render targets (MRT):
//! - Position (xyz) + metallic (w), RGBA16F
//! - World-space normal (xyz) + roughness (w), RGBA16F
//! - Emissive (rgb) + ambient occlusion (a), RGBA16F
//! - Albedo, RGBA8
//! - Depth, copied into the HDR target after lighting
//!
//! The four color targets fill the 32 bytes per sample every device
//! guarantees, so position is stored at half precision.

use super::{bindings, create_transform_layout, model_instance_layout, TRANSFORM_WGSL};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::renderer::DrawCall;
use crate::resources::{FrameBuffer, FrameBufferLayout, InstanceBuffer, Renderable, RenderTarget};

/// G-Buffer generation pass
pub struct GBufferPass {
    pipeline: RenderPipelineHandle,
    transform_layout: BindGroupLayoutHandle,
    transform_bind_group: BindGroupHandle,
    framebuffer: FrameBuffer,
    instances: InstanceBuffer,
}

impl GBufferPass {
    pub const LABEL: &'static str = "G-Buffer Pass";

    pub const POSITION_METALLIC: usize = 0;
    pub const NORMAL_ROUGHNESS: usize = 1;
    pub const EMISSIVE_AO: usize = 2;
    pub const ALBEDO: usize = 3;

    fn layout() -> FrameBufferLayout {
        FrameBufferLayout {
            label: "gbuffer".into(),
            color_formats: vec![
                TextureFormat::Rgba16Float,
                TextureFormat::Rgba16Float,
                TextureFormat::Rgba16Float,
                TextureFormat::Rgba8Unorm,
            ],
            color_usage: TextureUsage::empty(),
            depth_usage: Some(TextureUsage::COPY_SRC),
        }
    }

    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        transform_buffer: BufferHandle,
        material_layout: BindGroupLayoutHandle,
        width: u32,
        height: u32,
    ) -> BackendResult<Self> {
        let transform_layout = create_transform_layout(backend)?;
        let transform_bind_group = backend.create_bind_group(
            transform_layout,
            &[(
                bindings::TRANSFORM_BINDING,
                BindGroupEntry::buffer(transform_buffer),
            )],
        )?;

        let framebuffer = FrameBuffer::new(backend, Self::layout(), width, height)?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("G-Buffer Pipeline".into()),
            shader: format!("{}{}", TRANSFORM_WGSL, GBUFFER_SHADER),
            vertex_entry: "vs_main".into(),
            fragment_entry: Some("fs_main".into()),
            vertex_layouts: vec![Vertex::layout(), model_instance_layout()],
            bind_group_layouts: vec![transform_layout, material_layout],
            front_face: FrontFace::Cw,
            cull_mode: CullMode::Back,
            depth_stencil: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            }),
            color_targets: framebuffer
                .colors()
                .iter()
                .map(|target| target.format)
                .collect(),
        })?;

        let instances = InstanceBuffer::new(backend, "G-Buffer Instances")?;

        Ok(Self {
            pipeline,
            transform_layout,
            transform_bind_group,
            framebuffer,
            instances,
        })
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    /// One of the color attachments, by the associated index constants
    pub fn target(&self, index: usize) -> Option<&RenderTarget> {
        self.framebuffer.color(index)
    }

    pub fn instance_buffer(&self) -> BufferHandle {
        self.instances.handle()
    }

    pub fn resize<B: GraphicsBackend>(&mut self, backend: &mut B, width: u32, height: u32) -> BackendResult<()> {
        self.framebuffer.resize(backend, width, height)
    }

    /// Clear the G-buffer and draw every batch with one instanced call
    pub fn execute<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        batches: &[(&Renderable, &DrawCall)],
    ) -> BackendResult<()> {
        let matrices: Vec<glam::Mat4> = batches
            .iter()
            .flat_map(|(_, call)| call.model_matrices.iter().copied())
            .collect();
        self.instances
            .upload(backend, bytemuck::cast_slice(&matrices))?;

        backend.begin_render_pass(&self.framebuffer.clear_pass(Self::LABEL, [0.0; 4]));
        backend.set_viewport(
            0.0,
            0.0,
            self.framebuffer.width() as f32,
            self.framebuffer.height() as f32,
            0.0,
            1.0,
        );
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(bindings::TRANSFORM_GROUP, self.transform_bind_group);

        let stride = std::mem::size_of::<glam::Mat4>() as u64;
        let mut first_instance = 0u64;
        for (renderable, call) in batches {
            let count = call.model_matrices.len() as u32;
            backend.set_vertex_buffer(
                bindings::INSTANCE_SLOT,
                self.instances.handle(),
                first_instance * stride,
            );
            renderable.draw_instanced(backend, count, Some(bindings::MATERIAL_GROUP));
            first_instance += count as u64;
        }

        backend.end_render_pass();
        Ok(())
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        self.framebuffer.destroy(backend);
        self.instances.destroy(backend);
        backend.destroy_bind_group(self.transform_bind_group);
        backend.destroy_bind_group_layout(self.transform_layout);
        backend.destroy_render_pipeline(self.pipeline);
    }
}

/// G-Buffer generation shader, appended to the shared transform declarations
pub const GBUFFER_SHADER: &str = r#"
@group(1) @binding(0) var albedo_map: texture_2d<f32>;
@group(1) @binding(1) var normal_map: texture_2d<f32>;
@group(1) @binding(2) var metallic_map: texture_2d<f32>;
@group(1) @binding(3) var roughness_map: texture_2d<f32>;
@group(1) @binding(4) var ao_map: texture_2d<f32>;
@group(1) @binding(5) var emissive_map: texture_2d<f32>;
@group(1) @binding(6) var material_sampler: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) world_tangent: vec4<f32>,
}

struct GBufferOutput {
    @location(0) position_metallic: vec4<f32>,
    @location(1) normal_roughness: vec4<f32>,
    @location(2) emissive_ao: vec4<f32>,
    @location(3) albedo: vec4<f32>,
}

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = instance_model(instance);
    let world_position = model * vec4<f32>(vertex.position, 1.0);
    let normal_matrix = mat3x3<f32>(model[0].xyz, model[1].xyz, model[2].xyz);

    var output: VertexOutput;
    output.clip_position = transform.projection * transform.view * world_position;
    output.world_position = world_position.xyz;
    output.world_normal = normalize(normal_matrix * vertex.normal);
    output.uv = vertex.uv;
    output.world_tangent = vec4<f32>(normalize(normal_matrix * vertex.tangent.xyz), vertex.tangent.w);
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> GBufferOutput {
    let n = normalize(input.world_normal);
    let t = normalize(input.world_tangent.xyz - n * dot(n, input.world_tangent.xyz));
    let b = cross(n, t) * input.world_tangent.w;
    let tbn = mat3x3<f32>(t, b, n);

    let tangent_normal = textureSample(normal_map, material_sampler, input.uv).xyz * 2.0 - 1.0;
    let normal = normalize(tbn * tangent_normal);

    let albedo = textureSample(albedo_map, material_sampler, input.uv);
    let metallic = textureSample(metallic_map, material_sampler, input.uv).r;
    let roughness = textureSample(roughness_map, material_sampler, input.uv).r;
    let ao = textureSample(ao_map, material_sampler, input.uv).r;
    let emissive = textureSample(emissive_map, material_sampler, input.uv).rgb;

    var output: GBufferOutput;
    output.position_metallic = vec4<f32>(input.world_position, metallic);
    output.normal_roughness = vec4<f32>(normal, roughness);
    output.emissive_ao = vec4<f32>(emissive, ao);
    output.albedo = vec4<f32>(albedo.rgb, 1.0);
    return output;
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    #[test]
    fn targets_fit_the_guaranteed_attachment_budget() {
        let formats = GBufferPass::layout().color_formats;
        assert_eq!(formats.len(), 4);
        assert!(color_attachment_bytes_per_sample(&formats) <= MAX_COLOR_ATTACHMENT_BYTES_PER_SAMPLE);
    }

    #[test]
    fn pipeline_is_created_within_device_limits() {
        let mut backend = DummyBackend::new(64, 64);
        let transform = backend
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 64,
                usage: BufferUsage::UNIFORM,
            })
            .unwrap();
        let material_layout = backend.create_bind_group_layout(&[]).unwrap();
        let pass = GBufferPass::new(&mut backend, transform, material_layout, 64, 64).unwrap();
        assert_eq!(pass.framebuffer().colors().len(), 4);
    }
}
