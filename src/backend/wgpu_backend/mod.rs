//! wgpu implementation of [`GraphicsBackend`]
//!
//! Every wgpu object lives in a [`Registry`] keyed by the id inside its
//! handle. Ids come from one counter shared by all resource kinds, so a
//! handle of one kind can never alias another. The swapchain image of the
//! current frame gets a fresh view id per frame.

mod convert;
mod recording;

use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::util::DeviceExt;

use crate::backend::traits::*;
use crate::backend::types::*;
use recording::{ComputeOp, OpenPass, RenderOp};

/// Live wgpu objects keyed by handle id
#[derive(Default)]
pub(crate) struct Registry {
    last_id: u64,
    buffers: HashMap<u64, wgpu::Buffer>,
    textures: HashMap<u64, wgpu::Texture>,
    views: HashMap<u64, wgpu::TextureView>,
    samplers: HashMap<u64, wgpu::Sampler>,
    layouts: HashMap<u64, wgpu::BindGroupLayout>,
    bind_groups: HashMap<u64, wgpu::BindGroup>,
    render_pipelines: HashMap<u64, wgpu::RenderPipeline>,
    compute_pipelines: HashMap<u64, wgpu::ComputePipeline>,
}

impl Registry {
    /// Ids start at 1 and are never reused
    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    fn insert<T>(map: &mut HashMap<u64, T>, id: u64, item: T) -> u64 {
        map.insert(id, item);
        id
    }

    fn pipeline_layout(
        &self,
        device: &wgpu::Device,
        label: Option<&str>,
        handles: &[BindGroupLayoutHandle],
    ) -> BackendResult<wgpu::PipelineLayout> {
        let layouts = handles
            .iter()
            .map(|handle| {
                self.layouts.get(&handle.0).ok_or_else(|| {
                    BackendError::PipelineCreationFailed(format!(
                        "{}: unknown bind group layout {}",
                        label.unwrap_or("pipeline"),
                        handle.0
                    ))
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;

        Ok(device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label,
            bind_group_layouts: &layouts,
            push_constant_ranges: &[],
        }))
    }
}

/// Swapchain image and encoder of the frame in flight
struct Frame {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    view_id: u64,
    encoder: wgpu::CommandEncoder,
}

/// Window-backed renderer backend
pub struct WgpuBackend {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    format: TextureFormat,
    registry: Registry,
    frame: Option<Frame>,
    open_pass: Option<OpenPass>,
}

impl WgpuBackend {
    /// Create the backend for a window surface, blocking on adapter and device requests
    pub fn new<W>(window: Arc<W>, width: u32, height: u32, vsync: bool) -> BackendResult<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        pollster::block_on(Self::new_async(window, width, height, vsync))
    }

    pub async fn new_async<W>(
        window: Arc<W>,
        width: u32,
        height: u32,
        vsync: bool,
    ) -> BackendResult<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::util::backend_bits_from_env().unwrap_or(wgpu::Backends::all()),
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("no compatible adapter".into()))?;
        let info = adapter.get_info();
        log::info!("Using {} via {:?}", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("PBR Renderer Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        let caps = surface.get_capabilities(&adapter);
        let (surface_format, format) = Self::pick_surface_format(&caps.formats)?;

        let mut backend = Self {
            surface,
            device,
            queue,
            config: wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format: surface_format,
                width: 1,
                height: 1,
                present_mode: if vsync {
                    wgpu::PresentMode::AutoVsync
                } else {
                    wgpu::PresentMode::AutoNoVsync
                },
                alpha_mode: caps
                    .alpha_modes
                    .first()
                    .copied()
                    .unwrap_or(wgpu::CompositeAlphaMode::Auto),
                view_formats: vec![],
                desired_maximum_frame_latency: 2,
            },
            format,
            registry: Registry::default(),
            frame: None,
            open_pass: None,
        };
        backend.configure(width.max(1), height.max(1));
        Ok(backend)
    }

    /// Prefer an sRGB format the renderer knows, then any known format
    fn pick_surface_format(
        formats: &[wgpu::TextureFormat],
    ) -> BackendResult<(wgpu::TextureFormat, TextureFormat)> {
        let known: Vec<_> = formats
            .iter()
            .filter_map(|&raw| TextureFormat::try_from(raw).ok().map(|format| (raw, format)))
            .collect();
        known
            .iter()
            .find(|(_, format)| format.is_srgb())
            .or_else(|| known.first())
            .copied()
            .ok_or_else(|| {
                BackendError::SurfaceCreationFailed(format!(
                    "no supported surface format among {:?}",
                    formats
                ))
            })
    }

    /// Configure the surface, shrinking oversized requests to the device limit
    fn configure(&mut self, width: u32, height: u32) {
        let limit = self.device.limits().max_texture_dimension_2d;
        let scale = (limit as f32 / width.max(height) as f32).min(1.0);
        self.config.width = ((width as f32 * scale) as u32).clamp(1, limit);
        self.config.height = ((height as f32 * scale) as u32).clamp(1, limit);
        self.surface.configure(&self.device, &self.config);
        log::debug!(
            "Surface {:?} configured at {}x{}",
            self.config.format,
            self.config.width,
            self.config.height
        );
    }

    fn shader(&self, label: Option<&str>, source: &str) -> wgpu::ShaderModule {
        self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label,
            source: wgpu::ShaderSource::Wgsl(source.into()),
        })
    }

    /// Run `create` in a validation error scope so a rejected shader or
    /// pipeline comes back as an error instead of reaching the uncaptured
    /// error handler, which panics
    fn validated<T>(&self, label: Option<&str>, create: impl FnOnce() -> T) -> BackendResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let object = create();
        match pollster::block_on(self.device.pop_error_scope()) {
            Some(error) => Err(BackendError::PipelineCreationFailed(format!(
                "{}: {}",
                label.unwrap_or("pipeline"),
                error
            ))),
            None => Ok(object),
        }
    }

    fn record_render(&mut self, op: RenderOp) {
        match self.open_pass.as_mut() {
            Some(pass) => pass.push_render(op),
            None => log::warn!("Render command recorded with no open pass"),
        }
    }

    fn record_compute(&mut self, op: ComputeOp) {
        match self.open_pass.as_mut() {
            Some(pass) => pass.push_compute(op),
            None => log::warn!("Compute command recorded with no open pass"),
        }
    }

    fn image_copy(texture: &wgpu::Texture, layer: u32) -> wgpu::ImageCopyTexture<'_> {
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
            aspect: wgpu::TextureAspect::All,
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.configure(width, height);
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let surface_texture = self.surface.get_current_texture().map_err(|e| match e {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => BackendError::SurfaceLost,
            wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
            other => BackendError::AcquireImageFailed(other.to_string()),
        })?;

        let view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame"),
            });
        let view_id = self.registry.next_id();
        self.frame = Some(Frame {
            surface_texture,
            view,
            view_id,
            encoder,
        });

        Ok(FrameContext {
            swapchain_view: TextureViewHandle(view_id),
            width: self.config.width,
            height: self.config.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if self.open_pass.take().is_some() {
            log::warn!("Frame ended with an unfinished pass; its commands were dropped");
        }
        if let Some(frame) = self.frame.take() {
            self.queue.submit(Some(frame.encoder.finish()));
            frame.surface_texture.present();
        }
        Ok(())
    }

    fn discard_frame(&mut self) {
        self.open_pass = None;
        if self.frame.take().is_some() {
            log::debug!("Frame discarded before presenting");
        }
    }

    fn swapchain_format(&self) -> TextureFormat {
        self.format
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: desc.size,
            usage: desc.usage.into(),
            mapped_at_creation: false,
        });
        let id = self.registry.next_id();
        Ok(BufferHandle(Registry::insert(&mut self.registry.buffers, id, buffer)))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: desc.label.as_deref(),
            contents: data,
            usage: desc.usage.into(),
        });
        let id = self.registry.next_id();
        Ok(BufferHandle(Registry::insert(&mut self.registry.buffers, id, buffer)))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        match self.registry.buffers.get(&buffer.0) {
            Some(target) => self.queue.write_buffer(target, offset, data),
            None => log::warn!("Write to unknown buffer {}", buffer.0),
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.layers.max(1),
            },
            mip_level_count: desc.mip_levels,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.into(),
            usage: desc.usage.into(),
            view_formats: &[],
        });
        let id = self.registry.next_id();
        Ok(TextureHandle(Registry::insert(&mut self.registry.textures, id, texture)))
    }

    fn create_texture_view(
        &mut self,
        texture: TextureHandle,
        dimension: TextureViewDimension,
    ) -> BackendResult<TextureViewHandle> {
        let view = self
            .registry
            .textures
            .get(&texture.0)
            .ok_or_else(|| {
                BackendError::TextureCreationFailed(format!("unknown texture {}", texture.0))
            })?
            .create_view(&wgpu::TextureViewDescriptor {
                dimension: Some(dimension.into()),
                ..Default::default()
            });
        let id = self.registry.next_id();
        Ok(TextureViewHandle(Registry::insert(&mut self.registry.views, id, view)))
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        layer: u32,
        data: &[u8],
        width: u32,
        height: u32,
    ) {
        let Some(target) = self.registry.textures.get(&texture.0) else {
            log::warn!("Upload to unknown texture {}", texture.0);
            return;
        };
        let texel_size = target.format().block_copy_size(None).unwrap_or(4);
        self.queue.write_texture(
            Self::image_copy(target, layer),
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width * texel_size),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn copy_texture_to_texture(
        &mut self,
        source: TextureHandle,
        destination: TextureHandle,
        width: u32,
        height: u32,
    ) {
        let textures = &self.registry.textures;
        let (Some(from), Some(to), Some(frame)) = (
            textures.get(&source.0),
            textures.get(&destination.0),
            self.frame.as_mut(),
        ) else {
            log::warn!("Texture copy skipped: missing texture or no frame in flight");
            return;
        };
        frame.encoder.copy_texture_to_texture(
            Self::image_copy(from, 0),
            Self::image_copy(to, 0),
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let sampler = self
            .device
            .create_sampler(&convert::sampler_descriptor(desc));
        let id = self.registry.next_id();
        Ok(SamplerHandle(Registry::insert(&mut self.registry.samplers, id, sampler)))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let entries: Vec<_> = entries
            .iter()
            .map(|entry| wgpu::BindGroupLayoutEntry {
                binding: entry.binding,
                visibility: entry.visibility.into(),
                ty: (&entry.ty).into(),
                count: None,
            })
            .collect();
        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &entries,
            });
        let id = self.registry.next_id();
        Ok(BindGroupLayoutHandle(Registry::insert(&mut self.registry.layouts, id, layout)))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let registry = &self.registry;
        let missing =
            |what: &str, id: u64| BackendError::PipelineCreationFailed(format!("unknown {what} {id}"));

        let layout = registry
            .layouts
            .get(&layout.0)
            .ok_or_else(|| missing("bind group layout", layout.0))?;
        let resources = entries
            .iter()
            .map(|(binding, entry)| -> BackendResult<wgpu::BindGroupEntry> {
                let resource = match entry {
                    BindGroupEntry::Buffer {
                        buffer,
                        offset,
                        size,
                    } => wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: registry
                            .buffers
                            .get(&buffer.0)
                            .ok_or_else(|| missing("buffer", buffer.0))?,
                        offset: *offset,
                        size: size.and_then(wgpu::BufferSize::new),
                    }),
                    BindGroupEntry::Texture(view) | BindGroupEntry::StorageTexture(view) => {
                        wgpu::BindingResource::TextureView(
                            registry
                                .views
                                .get(&view.0)
                                .ok_or_else(|| missing("texture view", view.0))?,
                        )
                    }
                    BindGroupEntry::Sampler(sampler) => wgpu::BindingResource::Sampler(
                        registry
                            .samplers
                            .get(&sampler.0)
                            .ok_or_else(|| missing("sampler", sampler.0))?,
                    ),
                };
                Ok(wgpu::BindGroupEntry {
                    binding: *binding,
                    resource,
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;

        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout,
            entries: &resources,
        });
        let id = self.registry.next_id();
        Ok(BindGroupHandle(Registry::insert(&mut self.registry.bind_groups, id, group)))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        desc.check_color_targets(self.device.limits().max_color_attachment_bytes_per_sample)?;
        let label = desc.label.as_deref();
        let layout = self
            .registry
            .pipeline_layout(&self.device, label, &desc.bind_group_layouts)?;

        let attributes: Vec<Vec<_>> = desc
            .vertex_layouts
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|attribute| wgpu::VertexAttribute {
                        format: attribute.format.into(),
                        offset: attribute.offset,
                        shader_location: attribute.location,
                    })
                    .collect()
            })
            .collect();
        let buffers: Vec<_> = desc
            .vertex_layouts
            .iter()
            .zip(&attributes)
            .map(|(layout, attributes)| wgpu::VertexBufferLayout {
                array_stride: layout.array_stride,
                step_mode: layout.step_mode.into(),
                attributes,
            })
            .collect();
        let targets: Vec<_> = desc
            .color_targets
            .iter()
            .map(|&format| {
                Some(wgpu::ColorTargetState {
                    format: format.into(),
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })
            })
            .collect();

        let pipeline = self.validated(label, || {
            let module = self.shader(label, &desc.shader);
            self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label,
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: &desc.vertex_entry,
                    buffers: &buffers,
                    compilation_options: Default::default(),
                },
                fragment: desc.fragment_entry.as_deref().map(|entry_point| wgpu::FragmentState {
                    module: &module,
                    entry_point,
                    targets: &targets,
                    compilation_options: Default::default(),
                }),
                primitive: convert::primitive_state(desc.front_face, desc.cull_mode),
                depth_stencil: desc.depth_stencil.as_ref().map(|depth| wgpu::DepthStencilState {
                    format: depth.format.into(),
                    depth_write_enabled: depth.depth_write_enabled,
                    depth_compare: depth.depth_compare.into(),
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: Default::default(),
                multiview: None,
            })
        })?;
        let id = self.registry.next_id();
        Ok(RenderPipelineHandle(Registry::insert(
            &mut self.registry.render_pipelines,
            id,
            pipeline,
        )))
    }

    fn create_compute_pipeline(
        &mut self,
        desc: &ComputePipelineDescriptor,
    ) -> BackendResult<ComputePipelineHandle> {
        let label = desc.label.as_deref();
        let layout = self
            .registry
            .pipeline_layout(&self.device, label, &desc.bind_group_layouts)?;
        let pipeline = self.validated(label, || {
            let module = self.shader(label, &desc.shader);
            self.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label,
                layout: Some(&layout),
                module: &module,
                entry_point: &desc.entry_point,
                compilation_options: Default::default(),
            })
        })?;
        let id = self.registry.next_id();
        Ok(ComputePipelineHandle(Registry::insert(
            &mut self.registry.compute_pipelines,
            id,
            pipeline,
        )))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.open_pass = Some(OpenPass::render(desc));
    }

    fn end_render_pass(&mut self) {
        let Some(OpenPass::Render { descriptor, ops }) = self.open_pass.take() else {
            log::warn!("end_render_pass without an open render pass");
            return;
        };
        let Some(mut frame) = self.frame.take() else {
            log::warn!("Render pass {:?} ended outside a frame", descriptor.label);
            return;
        };

        {
            let registry = &self.registry;
            let swapchain = (frame.view_id, &frame.view);
            let resolve = |handle: TextureViewHandle| {
                if handle.0 == swapchain.0 {
                    Some(swapchain.1)
                } else {
                    registry.views.get(&handle.0)
                }
            };

            // Attachments with unknown views are dropped
            let color_attachments: Vec<_> = descriptor
                .color_attachments
                .iter()
                .map(|attachment| {
                    resolve(attachment.view).map(|view| wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: convert::color_ops(&attachment.load_op, attachment.store_op),
                    })
                })
                .collect();
            let depth_stencil_attachment =
                descriptor.depth_stencil_attachment.as_ref().and_then(|depth| {
                    Some(wgpu::RenderPassDepthStencilAttachment {
                        view: resolve(depth.view)?,
                        depth_ops: Some(convert::depth_ops(
                            &depth.depth_load_op,
                            depth.depth_store_op,
                            depth.depth_clear_value,
                        )),
                        stencil_ops: None,
                    })
                });

            let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: descriptor.label.as_deref(),
                color_attachments: &color_attachments,
                depth_stencil_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            recording::replay_render(&mut pass, registry, &ops);
        }

        self.frame = Some(frame);
    }

    fn begin_compute_pass(&mut self, label: Option<&str>) {
        self.open_pass = Some(OpenPass::compute(label));
    }

    fn end_compute_pass(&mut self) {
        let Some(OpenPass::Compute { label, ops }) = self.open_pass.take() else {
            log::warn!("end_compute_pass without an open compute pass");
            return;
        };
        let Some(frame) = self.frame.as_mut() else {
            log::warn!("Compute pass {:?} ended outside a frame", label);
            return;
        };

        let mut pass = frame.encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: label.as_deref(),
            timestamp_writes: None,
        });
        recording::replay_compute(&mut pass, &self.registry, &ops);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.record_render(RenderOp::Pipeline(pipeline));
    }

    fn set_compute_pipeline(&mut self, pipeline: ComputePipelineHandle) {
        self.record_compute(ComputeOp::Pipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        match self.open_pass {
            Some(OpenPass::Compute { .. }) => {
                self.record_compute(ComputeOp::BindGroup(index, bind_group))
            }
            _ => self.record_render(RenderOp::BindGroup(index, bind_group)),
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64) {
        self.record_render(RenderOp::VertexBuffer { slot, buffer, offset });
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat) {
        self.record_render(RenderOp::IndexBuffer { buffer, offset, format });
    }

    fn set_viewport(&mut self, x: f32, y: f32, width: f32, height: f32, min_depth: f32, max_depth: f32) {
        self.record_render(RenderOp::Viewport([x, y, width, height, min_depth, max_depth]));
    }

    fn draw(&mut self, vertices: Range<u32>, instances: Range<u32>) {
        self.record_render(RenderOp::Draw { vertices, instances });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.record_render(RenderOp::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }

    fn dispatch_compute(&mut self, x: u32, y: u32, z: u32) {
        self.record_compute(ComputeOp::Dispatch([x, y, z]));
    }

    // Dropping releases the object once submitted work no longer uses it
    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.registry.buffers.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.registry.textures.remove(&texture.0);
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.registry.views.remove(&view.0);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.registry.bind_groups.remove(&bind_group.0);
    }

    fn destroy_sampler(&mut self, sampler: SamplerHandle) {
        self.registry.samplers.remove(&sampler.0);
    }

    fn destroy_bind_group_layout(&mut self, layout: BindGroupLayoutHandle) {
        self.registry.layouts.remove(&layout.0);
    }

    fn destroy_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.registry.render_pipelines.remove(&pipeline.0);
    }

    fn destroy_compute_pipeline(&mut self, pipeline: ComputePipelineHandle) {
        self.registry.compute_pipelines.remove(&pipeline.0);
    }
}
