//! Frame orchestration
//!
//! [`Renderer`] owns the backend, the resource managers and every pass, and
//! runs the passes in a fixed order once per [`Renderer::draw`]:
//!
//! 1. Light snapshot upload
//! 2. Transform upload
//! 3. G-buffer pass
//! 4. Lighting pass into the HDR target, then the depth copy
//! 5. Colored forward pass
//! 6. Skybox
//! 7. Tonemapping to the swapchain
//! 8. Auto-exposure measurement
//! 9. Draw queue reset

mod draw_queue;
mod error;
mod light_manager;
mod renderable_manager;

pub use draw_queue::{DrawCall, DrawQueue};
pub use error::{RenderError, RenderResult};
pub use light_manager::{LightId, LightManager, LightPool, LightSnapshot};
pub use renderable_manager::{RenderableId, RenderableManager};

use crate::assets::{AssetLoader, FsAssetLoader, TexturePaths};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::postprocess::{AutoExposurePass, ExposureSettings, TonemapOperator, TonemappingPass};
use crate::pipeline::{ColorPass, GBufferPass, LightingPass, SkyboxPass, TransformUniform};
use crate::resources::{Renderable, UniformBuffer};
use crate::scene::LightsUniform;
use crate::RendererConfig;
use bitflags::bitflags;
use glam::{Mat4, Vec3, Vec4};
use std::path::Path;
use std::time::Instant;

bitflags! {
    /// Framebuffer aspects to clear on the next [`Renderer::draw`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

/// Deferred PBR renderer
pub struct Renderer<B: GraphicsBackend> {
    backend: B,
    config: RendererConfig,
    light_manager: LightManager,
    renderable_manager: RenderableManager,
    transform: UniformBuffer<TransformUniform>,
    lights_buffer: BufferHandle,
    gbuffer_pass: GBufferPass,
    lighting_pass: LightingPass,
    color_pass: ColorPass,
    skybox_pass: SkyboxPass,
    tonemapping_pass: TonemappingPass,
    auto_exposure_pass: AutoExposurePass,
    queue: DrawQueue,
    view: Mat4,
    projection: Mat4,
    exposure: f32,
    clear_color: [f32; 4],
    pending_clear: ClearFlags,
    last_frame: Option<Instant>,
    size: (u32, u32),
}

impl<B: GraphicsBackend> Renderer<B> {
    /// Create a renderer that loads assets from the file system
    pub fn new(backend: B, config: RendererConfig) -> RenderResult<Self> {
        Self::with_loader(backend, config, Box::new(FsAssetLoader::new()))
    }

    pub fn with_loader(
        mut backend: B,
        config: RendererConfig,
        loader: Box<dyn AssetLoader>,
    ) -> RenderResult<Self> {
        let (width, height) = backend.surface_size();
        let (width, height) = (width.max(1), height.max(1));

        let max_point_lights = clamp_capacity("point", config.max_point_lights, LightsUniform::MAX_POINT_LIGHTS);
        let max_spot_lights = clamp_capacity("spot", config.max_spot_lights, LightsUniform::MAX_SPOT_LIGHTS);

        let renderable_manager = RenderableManager::new(&mut backend, loader)?;
        let transform = UniformBuffer::new(&mut backend, "Transform Uniform", &TransformUniform::default())?;
        let lights_buffer = backend.create_buffer(&BufferDescriptor {
            label: Some("Lights Uniform".into()),
            size: LightsUniform::SIZE,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        })?;

        let gbuffer_pass = GBufferPass::new(
            &mut backend,
            transform.handle(),
            renderable_manager.material_layout().layout,
            width,
            height,
        )?;
        let lighting_pass = LightingPass::new(&mut backend, lights_buffer, &gbuffer_pass, width, height)?;
        let color_pass = ColorPass::new(&mut backend, transform.handle(), LightingPass::HDR_FORMAT)?;
        let skybox_pass = SkyboxPass::new(
            &mut backend,
            renderable_manager.loader(),
            config.skybox_faces.as_ref(),
            LightingPass::HDR_FORMAT,
        )?;

        let hdr_view = hdr_view(&lighting_pass)?;
        let auto_exposure_pass = AutoExposurePass::new(&mut backend, hdr_view, width, height, &config)?;
        let swapchain_format = backend.swapchain_format();
        let tonemapping_pass = TonemappingPass::new(
            &mut backend,
            hdr_view,
            auto_exposure_pass.luminance_views(),
            swapchain_format,
            config.tonemap_operator,
        )?;

        log::info!(
            "Renderer created at {}x{} ({:?} output, {:?} tonemapping, auto exposure {})",
            width,
            height,
            swapchain_format,
            config.tonemap_operator,
            if config.auto_exposure { "on" } else { "off" }
        );

        Ok(Self {
            backend,
            light_manager: LightManager::new(max_point_lights, max_spot_lights),
            renderable_manager,
            transform,
            lights_buffer,
            gbuffer_pass,
            lighting_pass,
            color_pass,
            skybox_pass,
            tonemapping_pass,
            auto_exposure_pass,
            queue: DrawQueue::new(),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            exposure: config.exposure,
            clear_color: config.clear_color,
            pending_clear: ClearFlags::empty(),
            last_frame: None,
            size: (width, height),
            config,
        })
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn light_manager(&self) -> &LightManager {
        &self.light_manager
    }

    pub fn light_manager_mut(&mut self) -> &mut LightManager {
        &mut self.light_manager
    }

    pub fn renderable_manager(&self) -> &RenderableManager {
        &self.renderable_manager
    }

    pub fn gbuffer_pass(&self) -> &GBufferPass {
        &self.gbuffer_pass
    }

    pub fn lighting_pass(&self) -> &LightingPass {
        &self.lighting_pass
    }

    pub fn color_pass(&self) -> &ColorPass {
        &self.color_pass
    }

    pub fn lights_buffer(&self) -> BufferHandle {
        self.lights_buffer
    }

    pub fn transform_buffer(&self) -> BufferHandle {
        self.transform.handle()
    }

    /// Draws queued since the last [`Renderer::draw`]
    pub fn draw_queue(&self) -> &DrawQueue {
        &self.queue
    }

    pub fn create_renderable(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        texture_paths: &TexturePaths,
    ) -> RenderResult<RenderableId> {
        self.renderable_manager
            .create_renderable(&mut self.backend, vertices, indices, texture_paths)
    }

    pub fn create_renderable_from_model(&mut self, path: impl AsRef<Path>) -> RenderResult<RenderableId> {
        self.renderable_manager
            .create_renderable_from_model(&mut self.backend, path)
    }

    pub fn remove_renderable(&mut self, id: RenderableId) {
        self.renderable_manager
            .remove_renderable(&mut self.backend, id);
    }

    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.view = view;
    }

    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.exposure = exposure;
    }

    pub fn exposure(&self) -> f32 {
        self.exposure
    }

    pub fn set_tonemap_operator(&mut self, operator: TonemapOperator) {
        self.tonemapping_pass.operator = operator;
    }

    /// Color used by [`ClearFlags::COLOR`] and behind unlit pixels
    pub fn clear_color(&mut self, rgba: [f32; 4]) {
        self.clear_color = rgba;
    }

    /// Schedule a clear of the visible framebuffer for the next frame
    pub fn clear(&mut self, flags: ClearFlags) {
        self.pending_clear = self.pending_clear | flags;
    }

    pub fn queue_draw(&mut self, id: RenderableId, model: Mat4) {
        self.queue.push(id, model);
    }

    pub fn queue_draw_with_color(&mut self, id: RenderableId, model: Mat4, color: Vec4) {
        self.queue.push_colored(id, model, color);
    }

    /// World-space camera position encoded in the view matrix
    pub fn camera_position(&self) -> Vec3 {
        self.view.inverse().w_axis.truncate()
    }

    /// Render and present one frame, consuming the draw queue
    ///
    /// The queue is emptied even when the frame fails. A frame that fails
    /// after the swapchain image was acquired is discarded, not presented.
    pub fn draw(&mut self) -> RenderResult<()> {
        let mut queue = std::mem::take(&mut self.queue);
        let clear = std::mem::replace(&mut self.pending_clear, ClearFlags::empty());
        let result = self.render_queue(&queue, clear);
        queue.clear();
        self.queue = queue;
        result
    }

    fn render_queue(&mut self, queue: &DrawQueue, clear: ClearFlags) -> RenderResult<()> {
        for id in queue.renderables() {
            self.renderable_manager.get_renderable(id)?;
        }

        let frame = match self.backend.begin_frame() {
            Ok(frame) => frame,
            Err(BackendError::SurfaceLost) => {
                log::warn!("Surface lost, reconfiguring and skipping frame");
                let (width, height) = self.size;
                self.backend.resize(width, height);
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.record_frame(&frame, queue, clear) {
            self.backend.discard_frame();
            return Err(e);
        }
        self.backend.end_frame()?;
        Ok(())
    }

    fn record_frame(&mut self, frame: &FrameContext, queue: &DrawQueue, clear: ClearFlags) -> RenderResult<()> {
        self.upload_lights();
        self.transform.update(
            &mut self.backend,
            &TransformUniform {
                view: self.view,
                projection: self.projection,
                model: Mat4::IDENTITY,
            },
        );

        let batches = collect_batches(&self.renderable_manager, queue.draws())?;
        let colored_batches = collect_batches(&self.renderable_manager, queue.colored_draws())?;
        log::trace!(
            "Frame: {} batches, {} colored batches",
            batches.len(),
            colored_batches.len()
        );

        let camera_position = self.camera_position();
        self.gbuffer_pass.execute(&mut self.backend, &batches)?;
        self.lighting_pass.execute(
            &mut self.backend,
            &self.gbuffer_pass,
            camera_position,
            self.clear_color,
        );
        self.color_pass
            .execute(&mut self.backend, self.lighting_pass.hdr(), &colored_batches)?;
        self.skybox_pass.execute(
            &mut self.backend,
            self.lighting_pass.hdr(),
            self.view,
            self.projection,
        );

        // DEPTH is accepted but the swapchain has no depth attachment
        let load_op = if clear.contains(ClearFlags::COLOR) {
            LoadOp::Clear(self.clear_color)
        } else {
            LoadOp::Load
        };
        self.tonemapping_pass.execute(
            &mut self.backend,
            frame.swapchain_view,
            (frame.width, frame.height),
            load_op,
            ExposureSettings {
                exposure: self.exposure,
                auto_exposure: self.config.auto_exposure,
                key: self.config.exposure_key,
            },
            self.auto_exposure_pass.current(),
        );

        let now = Instant::now();
        let dt = self
            .last_frame
            .map_or(0.0, |last| now.duration_since(last).as_secs_f32());
        self.last_frame = Some(now);
        if self.config.auto_exposure {
            self.auto_exposure_pass.execute(&mut self.backend, dt);
        }
        Ok(())
    }

    fn upload_lights(&mut self) {
        let snapshot = self.light_manager.get_light_data();
        self.backend
            .write_buffer(self.lights_buffer, 0, bytemuck::bytes_of(&snapshot.header()));

        let points = snapshot.point_light_data();
        if !points.is_empty() {
            self.backend.write_buffer(
                self.lights_buffer,
                LightsUniform::POINT_LIGHTS_OFFSET,
                bytemuck::cast_slice(&points),
            );
        }

        let spots = snapshot.spot_light_data();
        if !spots.is_empty() {
            self.backend.write_buffer(
                self.lights_buffer,
                LightsUniform::SPOT_LIGHTS_OFFSET,
                bytemuck::cast_slice(&spots),
            );
        }
    }

    /// Resize the surface and every size-dependent target
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        if width == 0 || height == 0 {
            return Ok(());
        }

        self.backend.resize(width, height);
        let (width, height) = self.backend.surface_size();
        if (width, height) == self.size {
            return Ok(());
        }

        self.gbuffer_pass.resize(&mut self.backend, width, height)?;
        self.lighting_pass
            .resize(&mut self.backend, &self.gbuffer_pass, width, height)?;
        let hdr_view = hdr_view(&self.lighting_pass)?;
        self.auto_exposure_pass
            .resize(&mut self.backend, hdr_view, width, height)?;
        self.tonemapping_pass.resize(
            &mut self.backend,
            hdr_view,
            self.auto_exposure_pass.luminance_views(),
        )?;

        self.size = (width, height);
        log::debug!("Renderer resized to {}x{}", width, height);
        Ok(())
    }

    /// Release every GPU resource and hand the backend back
    pub fn shutdown(self) -> B {
        let mut backend = self.backend;
        self.auto_exposure_pass.destroy(&mut backend);
        self.tonemapping_pass.destroy(&mut backend);
        self.skybox_pass.destroy(&mut backend);
        self.color_pass.destroy(&mut backend);
        self.lighting_pass.destroy(&mut backend);
        self.gbuffer_pass.destroy(&mut backend);
        self.renderable_manager.destroy(&mut backend);
        self.transform.destroy(&mut backend);
        backend.destroy_buffer(self.lights_buffer);
        backend
    }
}

fn clamp_capacity(kind: &str, requested: usize, max: usize) -> usize {
    if requested > max {
        log::warn!(
            "Requested {} {} lights, the lighting shader holds {}",
            requested,
            kind,
            max
        );
    }
    requested.min(max)
}

fn hdr_view(lighting_pass: &LightingPass) -> BackendResult<TextureViewHandle> {
    lighting_pass
        .hdr_color()
        .map(|target| target.view)
        .ok_or_else(|| BackendError::TextureCreationFailed("HDR target has no color attachment".into()))
}

fn collect_batches<'a>(
    manager: &'a RenderableManager,
    draws: &'a [DrawCall],
) -> RenderResult<Vec<(&'a Renderable, &'a DrawCall)>> {
    draws
        .iter()
        .map(|call| Ok((manager.get_renderable(call.renderable)?, call)))
        .collect()
}
