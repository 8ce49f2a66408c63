//! Dummy GPU backend for testing.
//!
//! Performs no GPU work. Every call is recorded so tests can inspect the
//! exact command stream a frame produced, and buffer writes are applied to
//! CPU-side shadow copies so uploaded data can be read back.

use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::{HashMap, HashSet};
use std::ops::Range;

/// A single recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    BeginFrame,
    EndFrame,
    DiscardFrame,
    BeginRenderPass {
        label: Option<String>,
        color_load_ops: Vec<LoadOp>,
        has_depth: bool,
    },
    EndRenderPass,
    BeginComputePass {
        label: Option<String>,
    },
    EndComputePass,
    SetRenderPipeline(RenderPipelineHandle),
    SetComputePipeline(ComputePipelineHandle),
    SetBindGroup {
        index: u32,
        bind_group: BindGroupHandle,
    },
    SetVertexBuffer {
        slot: u32,
        buffer: BufferHandle,
        offset: u64,
    },
    SetIndexBuffer {
        buffer: BufferHandle,
        format: IndexFormat,
    },
    SetViewport {
        width: f32,
        height: f32,
    },
    Draw {
        vertices: Range<u32>,
        instances: Range<u32>,
    },
    DrawIndexed {
        indices: Range<u32>,
        instances: Range<u32>,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
    WriteBuffer {
        buffer: BufferHandle,
        offset: u64,
        size: u64,
    },
    WriteTexture {
        texture: TextureHandle,
        layer: u32,
    },
    CopyTexture {
        source: TextureHandle,
        destination: TextureHandle,
    },
}

/// Headless backend that records instead of rendering
#[derive(Debug)]
pub struct DummyBackend {
    width: u32,
    height: u32,
    format: TextureFormat,
    next_id: u64,
    commands: Vec<RecordedCommand>,
    buffers: HashMap<u64, Vec<u8>>,
    textures: HashMap<u64, TextureDescriptor>,
    views: HashMap<u64, TextureHandle>,
    bind_groups: HashMap<u64, Vec<(u32, BindGroupEntry)>>,
    render_pipelines: HashMap<u64, RenderPipelineDescriptor>,
    compute_pipelines: HashSet<u64>,
    samplers: HashSet<u64>,
    layouts: HashSet<u64>,
    in_render_pass: bool,
    in_compute_pass: bool,
    fail_buffer_creation: bool,
}

impl DummyBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            format: TextureFormat::Bgra8UnormSrgb,
            next_id: 1,
            commands: Vec::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            views: HashMap::new(),
            bind_groups: HashMap::new(),
            render_pipelines: HashMap::new(),
            compute_pipelines: HashSet::new(),
            samplers: HashSet::new(),
            layouts: HashSet::new(),
            in_render_pass: false,
            in_compute_pass: false,
            fail_buffer_creation: false,
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Make every following buffer creation fail with `OutOfMemory`
    pub fn set_fail_buffer_creation(&mut self, fail: bool) {
        self.fail_buffer_creation = fail;
    }

    fn record(&mut self, command: RecordedCommand) {
        self.commands.push(command);
    }

    /// All commands recorded since creation or the last [`Self::clear_commands`]
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Labels of render passes in the order they were begun
    pub fn render_pass_labels(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::BeginRenderPass { label, .. } => {
                    Some(label.clone().unwrap_or_default())
                }
                _ => None,
            })
            .collect()
    }

    /// Commands recorded inside every render pass with the given label
    pub fn pass_commands(&self, pass_label: &str) -> Vec<RecordedCommand> {
        let mut inside = false;
        let mut result = Vec::new();
        for cmd in &self.commands {
            match cmd {
                RecordedCommand::BeginRenderPass { label, .. } => {
                    inside = label.as_deref() == Some(pass_label);
                }
                RecordedCommand::EndRenderPass => inside = false,
                other if inside => result.push(other.clone()),
                _ => {}
            }
        }
        result
    }

    /// Indexed draws recorded inside the labelled render pass
    pub fn indexed_draws(&self, pass_label: &str) -> Vec<(Range<u32>, Range<u32>)> {
        self.pass_commands(pass_label)
            .into_iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::DrawIndexed { indices, instances } => Some((indices, instances)),
                _ => None,
            })
            .collect()
    }

    /// Shadow copy of a live buffer
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<&[u8]> {
        self.buffers.get(&buffer.0).map(|data| data.as_slice())
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn live_sampler_count(&self) -> usize {
        self.samplers.len()
    }

    pub fn live_bind_group_layout_count(&self) -> usize {
        self.layouts.len()
    }

    /// Render and compute pipelines together
    pub fn live_pipeline_count(&self) -> usize {
        self.render_pipelines.len() + self.compute_pipelines.len()
    }

    pub fn live_bind_group_count(&self) -> usize {
        self.bind_groups.len()
    }

    pub fn texture_descriptor(&self, texture: TextureHandle) -> Option<&TextureDescriptor> {
        self.textures.get(&texture.0)
    }

    /// Texture a view was created from
    pub fn view_texture(&self, view: TextureViewHandle) -> Option<TextureHandle> {
        self.views.get(&view.0).copied()
    }

    pub fn bind_group_entries(&self, bind_group: BindGroupHandle) -> Option<&[(u32, BindGroupEntry)]> {
        self.bind_groups.get(&bind_group.0).map(|entries| entries.as_slice())
    }

    pub fn render_pipeline_descriptor(
        &self,
        pipeline: RenderPipelineHandle,
    ) -> Option<&RenderPipelineDescriptor> {
        self.render_pipelines.get(&pipeline.0)
    }
}

impl GraphicsBackend for DummyBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let view = self.allocate_id();
        self.record(RecordedCommand::BeginFrame);
        Ok(FrameContext {
            swapchain_view: TextureViewHandle(view),
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.record(RecordedCommand::EndFrame);
        Ok(())
    }

    fn discard_frame(&mut self) {
        self.in_render_pass = false;
        self.in_compute_pass = false;
        self.record(RecordedCommand::DiscardFrame);
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.format
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        if self.fail_buffer_creation {
            return Err(BackendError::OutOfMemory);
        }
        log::trace!("DummyBackend: creating buffer {:?} ({} bytes)", desc.label, desc.size);
        let id = self.allocate_id();
        self.buffers.insert(id, vec![0; desc.size as usize]);
        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        if self.fail_buffer_creation {
            return Err(BackendError::OutOfMemory);
        }
        log::trace!("DummyBackend: creating buffer {:?} with data", desc.label);
        let id = self.allocate_id();
        self.buffers.insert(id, data.to_vec());
        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(contents) = self.buffers.get_mut(&buffer.0) {
            let start = offset as usize;
            let end = start + data.len();
            if contents.len() < end {
                contents.resize(end, 0);
            }
            contents[start..end].copy_from_slice(data);
        }
        self.record(RecordedCommand::WriteBuffer {
            buffer,
            offset,
            size: data.len() as u64,
        });
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        log::trace!(
            "DummyBackend: creating texture {:?} ({}x{}x{})",
            desc.label,
            desc.width,
            desc.height,
            desc.layers
        );
        let id = self.allocate_id();
        self.textures.insert(id, desc.clone());
        Ok(TextureHandle(id))
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        _dimension: TextureViewDimension,
    ) -> BackendResult<TextureViewHandle> {
        if !self.textures.contains_key(&texture.0) {
            return Err(BackendError::TextureCreationFailed("Texture not found".into()));
        }
        let id = self.allocate_id();
        self.views.insert(id, texture);
        Ok(TextureViewHandle(id))
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        layer: u32,
        _data: &[u8],
        _width: u32,
        _height: u32,
    ) {
        self.record(RecordedCommand::WriteTexture { texture, layer });
    }

    fn copy_texture_to_texture(
        &mut self,
        source: TextureHandle,
        destination: TextureHandle,
        _width: u32,
        _height: u32,
    ) {
        self.record(RecordedCommand::CopyTexture {
            source,
            destination,
        });
    }

    fn create_sampler(&mut self, _desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let id = self.allocate_id();
        self.samplers.insert(id);
        Ok(SamplerHandle(id))
    }

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let id = self.allocate_id();
        self.layouts.insert(id);
        Ok(BindGroupLayoutHandle(id))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let id = self.allocate_id();
        self.bind_groups.insert(id, entries.to_vec());
        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        desc.check_color_targets(MAX_COLOR_ATTACHMENT_BYTES_PER_SAMPLE)?;
        let id = self.allocate_id();
        self.render_pipelines.insert(id, desc.clone());
        Ok(RenderPipelineHandle(id))
    }

    fn create_compute_pipeline(
        &mut self,
        _desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle> {
        let id = self.allocate_id();
        self.compute_pipelines.insert(id);
        Ok(ComputePipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.in_render_pass = true;
        self.record(RecordedCommand::BeginRenderPass {
            label: desc.label.clone(),
            color_load_ops: desc
                .color_attachments
                .iter()
                .map(|att| att.load_op.clone())
                .collect(),
            has_depth: desc.depth_stencil_attachment.is_some(),
        });
    }

    fn end_render_pass(&mut self) {
        if self.in_render_pass {
            self.in_render_pass = false;
            self.record(RecordedCommand::EndRenderPass);
        }
    }

    fn begin_compute_pass(&mut self, label: Option<&str>) {
        self.in_compute_pass = true;
        self.record(RecordedCommand::BeginComputePass {
            label: label.map(str::to_string),
        });
    }

    fn end_compute_pass(&mut self) {
        if self.in_compute_pass {
            self.in_compute_pass = false;
            self.record(RecordedCommand::EndComputePass);
        }
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record(RecordedCommand::SetRenderPipeline(pipeline));
    }

    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle) {
        self.record(RecordedCommand::SetComputePipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.record(RecordedCommand::SetBindGroup { index, bind_group });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64) {
        self.record(RecordedCommand::SetVertexBuffer {
            slot,
            buffer,
            offset,
        });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, _offset: u64, format: IndexFormat) {
        self.record(RecordedCommand::SetIndexBuffer { buffer, format });
    }

    fn set_viewport(&mut self, _x: f32, _y: f32, width: f32, height: f32, _min_depth: f32, _max_depth: f32) {
        self.record(RecordedCommand::SetViewport { width, height });
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record(RecordedCommand::Draw {
            vertices,
            instances,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, _base_vertex: i32, instances: Range<u32>) {
        self.record(RecordedCommand::DrawIndexed { indices, instances });
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.record(RecordedCommand::Dispatch { x, y, z });
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture.0);
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.views.remove(&view.0);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group.0);
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        self.samplers.remove(&sampler.0);
    }

    fn destroy_bind_group_layout(&mut self, layout: BindGroupLayoutHandle) {
        self.layouts.remove(&layout.0);
    }

    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.render_pipelines.remove(&pipeline.0);
    }

    fn destroy_compute_pipeline(&mut self, pipeline: ComputePipelineHandle) {
        self.compute_pipelines.remove(&pipeline.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_shadowed() {
        let mut backend = DummyBackend::new(4, 4);
        let buffer = backend
            .create_buffer(&BufferDescriptor {
                label: None,
                size: 8,
                usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
            })
            .unwrap();
        backend.write_buffer(buffer, 4, &[1, 2, 3, 4]);
        assert_eq!(backend.buffer_contents(buffer).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);

        backend.destroy_buffer(buffer);
        assert!(backend.buffer_contents(buffer).is_none());
    }

    #[test]
    fn pass_commands_are_scoped_by_label() {
        let mut backend = DummyBackend::new(4, 4);
        for label in ["A", "B"] {
            backend.begin_render_pass(&RenderPassDescriptor {
                label: Some(label.into()),
                color_attachments: vec![],
                depth_stencil_attachment: None,
            });
            backend.draw(0..3, 0..1);
            backend.end_render_pass();
        }
        backend.draw(0..6, 0..1);

        assert_eq!(backend.render_pass_labels(), vec!["A", "B"]);
        assert_eq!(backend.pass_commands("A").len(), 1);
        assert_eq!(backend.pass_commands("B").len(), 1);
    }

    #[test]
    fn oversized_color_targets_are_rejected() {
        let mut backend = DummyBackend::new(4, 4);
        let descriptor = |color_targets: Vec<TextureFormat>| RenderPipelineDescriptor {
            label: Some("MRT".into()),
            shader: String::new(),
            vertex_entry: "vs_main".into(),
            fragment_entry: Some("fs_main".into()),
            vertex_layouts: vec![],
            bind_group_layouts: vec![],
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets,
        };

        // Four 8-byte targets fill the budget exactly
        assert!(backend
            .create_render_pipeline(&descriptor(vec![TextureFormat::Rgba16Float; 4]))
            .is_ok());
        let too_wide = backend.create_render_pipeline(&descriptor(vec![TextureFormat::Rgba16Float; 5]));
        assert!(matches!(too_wide, Err(BackendError::PipelineCreationFailed(_))));
        assert_eq!(backend.live_pipeline_count(), 1);
    }

    #[test]
    fn destroyed_objects_are_no_longer_live() {
        let mut backend = DummyBackend::new(4, 4);
        let sampler = backend.create_sampler(&SamplerDescriptor::default()).unwrap();
        let layout = backend.create_bind_group_layout(&[]).unwrap();
        let pipeline = backend
            .create_compute_pipeline(&ComputePipelineDescriptor {
                label: None,
                shader: String::new(),
                entry_point: "main".into(),
                bind_group_layouts: vec![layout],
            })
            .unwrap();
        assert_eq!(
            (backend.live_sampler_count(), backend.live_bind_group_layout_count(), backend.live_pipeline_count()),
            (1, 1, 1)
        );

        backend.destroy_sampler(sampler);
        backend.destroy_bind_group_layout(layout);
        backend.destroy_compute_pipeline(pipeline);
        assert_eq!(
            (backend.live_sampler_count(), backend.live_bind_group_layout_count(), backend.live_pipeline_count()),
            (0, 0, 0)
        );
    }
}
