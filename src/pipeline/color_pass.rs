//! Forward pass for unlit, per-instance colored geometry
//!
//! Renders into the HDR target after lighting, depth tested against the
//! deferred geometry copied over by the lighting pass. Used for light
//! markers and other debug shapes.

use super::{bindings, colored_instance_layout, create_transform_layout, ColoredInstance, TRANSFORM_WGSL};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::renderer::DrawCall;
use crate::resources::{FrameBuffer, InstanceBuffer, Renderable};

pub struct ColorPass {
    pipeline: RenderPipelineHandle,
    transform_layout: BindGroupLayoutHandle,
    transform_bind_group: BindGroupHandle,
    instances: InstanceBuffer,
}

impl ColorPass {
    pub const LABEL: &'static str = "Color Pass";

    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        transform_buffer: BufferHandle,
        target_format: TextureFormat,
    ) -> BackendResult<Self> {
        let transform_layout = create_transform_layout(backend)?;
        let transform_bind_group = backend.create_bind_group(
            transform_layout,
            &[(
                bindings::TRANSFORM_BINDING,
                BindGroupEntry::buffer(transform_buffer),
            )],
        )?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Color Pipeline".into()),
            shader: format!("{}{}", TRANSFORM_WGSL, COLOR_SHADER),
            vertex_entry: "vs_main".into(),
            fragment_entry: Some("fs_main".into()),
            vertex_layouts: vec![Vertex::layout(), colored_instance_layout()],
            bind_group_layouts: vec![transform_layout],
            front_face: FrontFace::Cw,
            cull_mode: CullMode::Back,
            depth_stencil: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: true,
                depth_compare: CompareFunction::Less,
            }),
            color_targets: vec![target_format],
        })?;

        let instances = InstanceBuffer::new(backend, "Color Instances")?;

        Ok(Self {
            pipeline,
            transform_layout,
            transform_bind_group,
            instances,
        })
    }

    pub fn instance_buffer(&self) -> BufferHandle {
        self.instances.handle()
    }

    /// Draw every colored batch into `target`, keeping its contents
    pub fn execute<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        target: &FrameBuffer,
        batches: &[(&Renderable, &DrawCall)],
    ) -> BackendResult<()> {
        let instances: Vec<ColoredInstance> = batches
            .iter()
            .flat_map(|(_, call)| {
                call.model_matrices
                    .iter()
                    .zip(&call.colors)
                    .map(|(&model, &color)| ColoredInstance { model, color })
            })
            .collect();
        self.instances
            .upload(backend, bytemuck::cast_slice(&instances))?;

        backend.begin_render_pass(&target.load_pass(Self::LABEL));
        backend.set_viewport(
            0.0,
            0.0,
            target.width() as f32,
            target.height() as f32,
            0.0,
            1.0,
        );
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(bindings::TRANSFORM_GROUP, self.transform_bind_group);

        let stride = std::mem::size_of::<ColoredInstance>() as u64;
        let mut first_instance = 0u64;
        for (renderable, call) in batches {
            let count = call.model_matrices.len().min(call.colors.len()) as u32;
            backend.set_vertex_buffer(
                bindings::INSTANCE_SLOT,
                self.instances.handle(),
                first_instance * stride,
            );
            renderable.draw_instanced(backend, count, None);
            first_instance += count as u64;
        }

        backend.end_render_pass();
        Ok(())
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_bind_group(self.transform_bind_group);
        backend.destroy_bind_group_layout(self.transform_layout);
        backend.destroy_render_pipeline(self.pipeline);
        self.instances.destroy(backend);
    }
}

pub const COLOR_SHADER: &str = r#"
struct ColorOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(
    vertex: VertexInput,
    instance: InstanceInput,
    @location(8) color: vec4<f32>,
) -> ColorOutput {
    let world_position = instance_model(instance) * vec4<f32>(vertex.position, 1.0);

    var output: ColorOutput;
    output.clip_position = transform.projection * transform.view * world_position;
    output.color = color;
    return output;
}

@fragment
fn fs_main(input: ColorOutput) -> @location(0) vec4<f32> {
    return input.color;
}
"#;
