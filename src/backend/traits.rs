//! The [`GraphicsBackend`] trait and the handle-based vocabulary it speaks
//!
//! Passes and resource wrappers only ever hold opaque handles. The wgpu
//! backend maps them to live GPU objects; the dummy backend records every
//! call so frames can be inspected without a GPU.

use std::ops::Range;

use bitflags::bitflags;
use thiserror::Error;

use crate::backend::types::*;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("No usable GPU: {0}")]
    InitializationFailed(String),
    #[error("Window surface unavailable: {0}")]
    SurfaceCreationFailed(String),
    #[error("GPU device request failed: {0}")]
    DeviceCreationFailed(String),
    #[error("Failed to acquire swapchain image: {0}")]
    AcquireImageFailed(String),
    #[error("Texture error: {0}")]
    TextureCreationFailed(String),
    #[error("Pipeline or bind group error: {0}")]
    PipelineCreationFailed(String),
    /// The surface must be reconfigured before the next frame
    #[error("Surface lost")]
    SurfaceLost,
    #[error("Out of memory")]
    OutOfMemory,
}

pub type BackendResult<T> = Result<T, BackendError>;

macro_rules! handles {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) u64);
    )*};
}

handles! {
    BufferHandle,
    TextureHandle,
    /// View of a texture, or the swapchain image of the current frame
    TextureViewHandle,
    SamplerHandle,
    RenderPipelineHandle,
    ComputePipelineHandle,
    BindGroupHandle,
    BindGroupLayoutHandle,
}

// ---------------------------------------------------------------------------
// Binding model
// ---------------------------------------------------------------------------

bitflags! {
    /// Shader stages that see a binding
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStageFlags: u32 {
        const VERTEX = 1 << 0;
        const FRAGMENT = 1 << 1;
        const COMPUTE = 1 << 2;
        const VERTEX_FRAGMENT = Self::VERTEX.bits() | Self::FRAGMENT.bits();
    }
}

/// What a bind group layout slot holds
#[derive(Debug, Clone)]
pub enum BindingType {
    UniformBuffer,
    StorageBuffer { read_only: bool },
    /// Float texture; unfilterable ones are read with `textureLoad`
    Texture {
        filterable: bool,
        view_dimension: TextureViewDimension,
    },
    /// Write-only 2D storage texture
    StorageTexture { format: TextureFormat },
    Sampler { filtering: bool },
}

impl BindingType {
    pub fn texture_2d() -> Self {
        BindingType::Texture {
            filterable: true,
            view_dimension: TextureViewDimension::D2,
        }
    }

    pub fn unfilterable_texture_2d() -> Self {
        BindingType::Texture {
            filterable: false,
            view_dimension: TextureViewDimension::D2,
        }
    }

    pub fn texture_cube() -> Self {
        BindingType::Texture {
            filterable: true,
            view_dimension: TextureViewDimension::Cube,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BindGroupLayoutEntry {
    pub binding: u32,
    pub visibility: ShaderStageFlags,
    pub ty: BindingType,
}

/// Resource bound into a bind group slot
#[derive(Debug, Clone)]
pub enum BindGroupEntry {
    /// `size: None` binds to the end of the buffer
    Buffer {
        buffer: BufferHandle,
        offset: u64,
        size: Option<u64>,
    },
    Texture(TextureViewHandle),
    Sampler(SamplerHandle),
    StorageTexture(TextureViewHandle),
}

impl BindGroupEntry {
    pub fn buffer(buffer: BufferHandle) -> Self {
        BindGroupEntry::Buffer {
            buffer,
            offset: 0,
            size: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipelines
// ---------------------------------------------------------------------------

/// Triangle-list pipeline whose vertex and fragment stages share one WGSL module
///
/// Color targets are written opaque, without blending.
#[derive(Debug, Clone)]
pub struct RenderPipelineDescriptor {
    pub label: Option<String>,
    pub shader: String,
    pub vertex_entry: String,
    pub fragment_entry: Option<String>,
    pub vertex_layouts: Vec<VertexBufferLayout>,
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
    pub front_face: FrontFace,
    pub cull_mode: CullMode,
    pub depth_stencil: Option<DepthStencilState>,
    pub color_targets: Vec<TextureFormat>,
}

impl RenderPipelineDescriptor {
    /// Reject color targets that need more storage per sample than `limit`
    pub fn check_color_targets(&self, limit: u32) -> BackendResult<()> {
        let required = color_attachment_bytes_per_sample(&self.color_targets);
        if required > limit {
            return Err(BackendError::PipelineCreationFailed(format!(
                "{}: color targets need {} bytes per sample, the device allows {}",
                self.label.as_deref().unwrap_or("pipeline"),
                required,
                limit
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DepthStencilState {
    pub format: TextureFormat,
    pub depth_write_enabled: bool,
    pub depth_compare: CompareFunction,
}

#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor {
    pub label: Option<String>,
    pub shader: String,
    pub entry_point: String,
    pub bind_group_layouts: Vec<BindGroupLayoutHandle>,
}

/// Swapchain image acquired by [`GraphicsBackend::begin_frame`]
pub struct FrameContext {
    pub swapchain_view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
}

/// GPU device, swapchain and command recording behind opaque handles
///
/// A frame is `begin_frame`, any number of passes, then `end_frame`. Inside
/// a pass, state and draw calls apply to that pass only; calls outside an
/// open pass are ignored. Handles of destroyed resources are skipped rather
/// than reported. Construction is backend specific and not part of the trait.
pub trait GraphicsBackend {
    // Surface and frames

    /// Reconfigure the swapchain; zero sizes are ignored
    fn resize(&mut self, width: u32, height: u32);

    /// Size actually configured, which may be clamped to device limits
    fn surface_size(&self) -> (u32, u32);

    fn swapchain_format(&self) -> TextureFormat;

    fn begin_frame(&mut self) -> BackendResult<FrameContext>;

    /// Submit everything recorded since `begin_frame` and present
    fn end_frame(&mut self) -> BackendResult<()>;

    /// Drop the frame in flight without submitting or presenting it
    fn discard_frame(&mut self);

    // Resources

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle>;

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle>;

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle>;

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        dimension: TextureViewDimension,
    ) -> BackendResult<TextureViewHandle>;

    /// Upload tightly packed texels into one array layer of mip 0
    fn write_texture(
        &mut self,
        texture: TextureHandle,
        layer: u32,
        data: &[u8],
        width: u32,
        height: u32,
    );

    /// Record a copy of layer 0 between same-sized, same-format textures
    fn copy_texture_to_texture(
        &mut self,
        source: TextureHandle,
        destination: TextureHandle,
        width: u32,
        height: u32,
    );

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle>;

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle>;

    /// Entries are `(binding, resource)` pairs matching `layout`
    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle>;

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle>;

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle>;

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    fn destroy_texture(&mut self, texture: TextureHandle);

    fn destroy_texture_view(&mut self, view: TextureViewHandle);

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle);

    fn destroy_sampler(&mut self, sampler: SamplerHandle);

    fn destroy_bind_group_layout(&mut self, layout: BindGroupLayoutHandle);

    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineHandle);

    fn destroy_compute_pipeline(&mut self, pipeline: ComputePipelineHandle);

    // Passes

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor);

    fn end_render_pass(&mut self);

    fn begin_compute_pass(&mut self, label: Option<&str>);

    fn end_compute_pass(&mut self);

    // Pass state and work

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle);

    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle);

    /// Applies to whichever kind of pass is open
    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle);

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64);

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat);

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32);

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>);

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32);
}
