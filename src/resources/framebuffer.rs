//! Offscreen render targets

use crate::backend::traits::*;
use crate::backend::types::*;

/// One attachment of a [`FrameBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    pub texture: TextureHandle,
    pub view: TextureViewHandle,
    pub format: TextureFormat,
}

impl RenderTarget {
    fn create<B: GraphicsBackend>(
        backend: &mut B,
        label: &str,
        width: u32,
        height: u32,
        format: TextureFormat,
        extra_usage: TextureUsage,
    ) -> BackendResult<Self> {
        let texture = backend.create_texture(&TextureDescriptor {
            label: Some(label.to_string()),
            width,
            height,
            format,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING | extra_usage,
            ..Default::default()
        })?;
        let view = backend.create_texture_view(texture, TextureViewDimension::D2)?;
        Ok(Self {
            texture,
            view,
            format,
        })
    }
}

/// Attachment layout of a framebuffer, used to (re)create it at any size
#[derive(Debug, Clone)]
pub struct FrameBufferLayout {
    pub label: String,
    pub color_formats: Vec<TextureFormat>,
    pub color_usage: TextureUsage,
    pub depth_usage: Option<TextureUsage>,
}

/// A set of same-sized color attachments plus an optional depth attachment
#[derive(Debug)]
pub struct FrameBuffer {
    layout: FrameBufferLayout,
    colors: Vec<RenderTarget>,
    depth: Option<RenderTarget>,
    width: u32,
    height: u32,
}

impl FrameBuffer {
    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        layout: FrameBufferLayout,
        width: u32,
        height: u32,
    ) -> BackendResult<Self> {
        let (width, height) = (width.max(1), height.max(1));

        let colors = layout
            .color_formats
            .iter()
            .enumerate()
            .map(|(i, &format)| {
                RenderTarget::create(
                    backend,
                    &format!("{} color {}", layout.label, i),
                    width,
                    height,
                    format,
                    layout.color_usage,
                )
            })
            .collect::<BackendResult<Vec<_>>>()?;

        let depth = match layout.depth_usage {
            Some(usage) => Some(RenderTarget::create(
                backend,
                &format!("{} depth", layout.label),
                width,
                height,
                TextureFormat::Depth32Float,
                usage,
            )?),
            None => None,
        };

        log::debug!(
            "Created framebuffer '{}' {}x{} with {} color attachment(s)",
            layout.label,
            width,
            height,
            colors.len()
        );

        Ok(Self {
            layout,
            colors,
            depth,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn color(&self, index: usize) -> Option<&RenderTarget> {
        self.colors.get(index)
    }

    pub fn colors(&self) -> &[RenderTarget] {
        &self.colors
    }

    pub fn depth(&self) -> Option<&RenderTarget> {
        self.depth.as_ref()
    }

    /// Color attachments cleared to `clear` and a depth attachment cleared to 1.0
    pub fn clear_pass(&self, label: &str, clear: [f32; 4]) -> RenderPassDescriptor {
        self.pass(label, LoadOp::Clear(clear))
    }

    /// Color and depth attachments keeping their previous contents
    pub fn load_pass(&self, label: &str) -> RenderPassDescriptor {
        self.pass(label, LoadOp::Load)
    }

    fn pass(&self, label: &str, load_op: LoadOp) -> RenderPassDescriptor {
        RenderPassDescriptor {
            label: Some(label.to_string()),
            color_attachments: self
                .colors
                .iter()
                .map(|target| ColorAttachment {
                    view: target.view,
                    load_op: load_op.clone(),
                    store_op: StoreOp::Store,
                })
                .collect(),
            depth_stencil_attachment: self.depth.map(|depth| DepthStencilAttachment {
                view: depth.view,
                depth_load_op: load_op.clone(),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
            }),
        }
    }

    /// Recreate every attachment at the new size
    pub fn resize<B: GraphicsBackend>(&mut self, backend: &mut B, width: u32, height: u32) -> BackendResult<()> {
        let resized = Self::new(backend, self.layout.clone(), width, height)?;
        let old = std::mem::replace(self, resized);
        old.destroy(backend);
        Ok(())
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        for target in self.colors.into_iter().chain(self.depth) {
            backend.destroy_texture_view(target.view);
            backend.destroy_texture(target.texture);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;

    fn layout() -> FrameBufferLayout {
        FrameBufferLayout {
            label: "test".into(),
            color_formats: vec![TextureFormat::Rgba16Float, TextureFormat::Rgba8Unorm],
            color_usage: TextureUsage::COPY_SRC,
            depth_usage: Some(TextureUsage::COPY_DST),
        }
    }

    #[test]
    fn resize_replaces_attachments() {
        let mut backend = DummyBackend::new(8, 8);
        let mut fb = FrameBuffer::new(&mut backend, layout(), 64, 32).unwrap();
        assert_eq!(backend.live_texture_count(), 3);
        let before = fb.colors()[0].texture;

        fb.resize(&mut backend, 128, 64).unwrap();

        assert_eq!(backend.live_texture_count(), 3);
        assert_ne!(fb.colors()[0].texture, before);
        let desc = backend.texture_descriptor(fb.colors()[0].texture).unwrap();
        assert_eq!((desc.width, desc.height), (128, 64));
        assert_eq!(fb.depth().unwrap().format, TextureFormat::Depth32Float);
    }

    #[test]
    fn clear_pass_covers_all_attachments() {
        let mut backend = DummyBackend::new(8, 8);
        let fb = FrameBuffer::new(&mut backend, layout(), 4, 4).unwrap();
        let desc = fb.clear_pass("clear", [0.0; 4]);
        assert_eq!(desc.color_attachments.len(), 2);
        assert!(desc.depth_stencil_attachment.is_some());
        assert_eq!(fb.load_pass("load").color_attachments[1].load_op, LoadOp::Load);
    }
}
