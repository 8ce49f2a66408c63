//! Plain data shared by every backend: formats, usage flags, resource
//! descriptors, the mesh vertex and render pass attachments.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

use crate::backend::traits::TextureViewHandle;

bitflags! {
    /// What a texture may be used for
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const STORAGE_BINDING = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

bitflags! {
    /// What a buffer may be used for
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const INDEX = 1 << 2;
        const VERTEX = 1 << 3;
        const UNIFORM = 1 << 4;
        const STORAGE = 1 << 5;
    }
}

/// Formats of render targets, material textures and the swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    /// HDR color and G-buffer attachments
    Rgba16Float,
    Depth32Float,
    /// Exposure and luminance storage
    R32Float,
}

impl TextureFormat {
    /// The GPU converts to sRGB on write, so shaders output linear color
    pub fn is_srgb(&self) -> bool {
        matches!(self, Self::Rgba8UnormSrgb | Self::Bgra8UnormSrgb)
    }

    /// Tile memory one sample of this format takes as a color attachment
    ///
    /// 8-bit normalized formats are stored at 16 bits per channel by some
    /// GPUs and are charged as such. `None` for depth formats.
    pub fn target_pixel_byte_cost(&self) -> Option<u32> {
        match self {
            Self::R32Float => Some(4),
            Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Bgra8Unorm
            | Self::Bgra8UnormSrgb
            | Self::Rgba16Float => Some(8),
            Self::Depth32Float => None,
        }
    }

    /// Alignment of this format's components within the per-sample budget
    pub fn target_component_alignment(&self) -> Option<u32> {
        match self {
            Self::Rgba8Unorm | Self::Rgba8UnormSrgb | Self::Bgra8Unorm | Self::Bgra8UnormSrgb => Some(1),
            Self::Rgba16Float => Some(2),
            Self::R32Float => Some(4),
            Self::Depth32Float => None,
        }
    }
}

/// Per-sample limit every WebGPU device supports without raising limits
pub const MAX_COLOR_ATTACHMENT_BYTES_PER_SAMPLE: u32 = 32;

/// Bytes per sample a set of color attachments needs, aligning each
/// attachment to its component size in attachment order
pub fn color_attachment_bytes_per_sample(formats: &[TextureFormat]) -> u32 {
    formats.iter().fold(0, |total, format| {
        let (Some(cost), Some(alignment)) = (format.target_pixel_byte_cost(), format.target_component_alignment())
        else {
            return total;
        };
        total.next_multiple_of(alignment) + cost
    })
}

/// 2D texture, or a stack of `layers` 2D images (six of them view as a cubemap)
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub mip_levels: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            layers: 1,
            mip_levels: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextureViewDimension {
    #[default]
    D2,
    Cube,
}

#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    ClampToEdge,
    Repeat,
}

/// Linear filtering everywhere; only the wrap mode varies between samplers
#[derive(Debug, Clone)]
pub struct SamplerDescriptor {
    pub label: Option<String>,
    pub mag_filter: FilterMode,
    pub min_filter: FilterMode,
    pub mipmap_filter: FilterMode,
    pub address_mode_u: AddressMode,
    pub address_mode_v: AddressMode,
    pub address_mode_w: AddressMode,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            address_mode_w: AddressMode::ClampToEdge,
        }
    }
}

impl SamplerDescriptor {
    /// Tiling sampler for material textures
    pub fn repeating(label: &str) -> Self {
        Self {
            label: Some(label.to_owned()),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Vertex input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub fn size(&self) -> u64 {
        match self {
            Self::Float32x2 => 8,
            Self::Float32x3 => 12,
            Self::Float32x4 => 16,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VertexAttribute {
    pub location: u32,
    pub format: VertexFormat,
    pub offset: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexStepMode {
    Vertex,
    /// Advances once per instance (model matrices, tint colors)
    Instance,
}

#[derive(Debug, Clone)]
pub struct VertexBufferLayout {
    pub array_stride: u64,
    pub step_mode: VertexStepMode,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexBufferLayout {
    /// Per-vertex layout with attributes packed back to back from `first_location`
    fn packed(stride: u64, first_location: u32, formats: &[VertexFormat]) -> Self {
        let mut offset = 0;
        let attributes = formats
            .iter()
            .zip(first_location..)
            .map(|(&format, location)| {
                let attribute = VertexAttribute {
                    location,
                    format,
                    offset,
                };
                offset += format.size();
                attribute
            })
            .collect();
        Self {
            array_stride: stride,
            step_mode: VertexStepMode::Vertex,
            attributes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexFormat {
    Uint16,
    Uint32,
}

/// Mesh vertex shared by every geometry pass
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    /// xyz tangent, w handedness of the bitangent
    pub tangent: Vec4,
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn new(position: Vec3, normal: Vec3, uv: Vec2, tangent: Vec4) -> Self {
        Self {
            position,
            normal,
            uv,
            tangent,
        }
    }

    /// Locations 0..4: position, normal, uv, tangent
    pub fn layout() -> VertexBufferLayout {
        VertexBufferLayout::packed(
            Self::STRIDE,
            0,
            &[
                VertexFormat::Float32x3,
                VertexFormat::Float32x3,
                VertexFormat::Float32x2,
                VertexFormat::Float32x4,
            ],
        )
    }

    /// Position at location 0 only, for the skybox cube
    pub fn position_only_layout() -> VertexBufferLayout {
        VertexBufferLayout::packed(Self::STRIDE, 0, &[VertexFormat::Float32x3])
    }
}

// ---------------------------------------------------------------------------
// Rasterization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontFace {
    Ccw,
    Cw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareFunction {
    Less,
    LessEqual,
    Always,
}

// ---------------------------------------------------------------------------
// Render pass attachments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOp {
    Clear([f32; 4]),
    Load,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Store,
    Discard,
}

#[derive(Debug, Clone)]
pub struct ColorAttachment {
    pub view: TextureViewHandle,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

/// Depth attachment; a `Clear` load op clears to `depth_clear_value`
#[derive(Debug, Clone)]
pub struct DepthStencilAttachment {
    pub view: TextureViewHandle,
    pub depth_load_op: LoadOp,
    pub depth_store_op: StoreOp,
    pub depth_clear_value: f32,
}

#[derive(Debug, Clone)]
pub struct RenderPassDescriptor {
    pub label: Option<String>,
    pub color_attachments: Vec<ColorAttachment>,
    pub depth_stencil_attachment: Option<DepthStencilAttachment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_covers_the_whole_vertex() {
        let layout = Vertex::layout();
        assert_eq!(layout.array_stride, 48);
        let offsets: Vec<u64> = layout.attributes.iter().map(|a| a.offset).collect();
        assert_eq!(offsets, vec![0, 12, 24, 32]);
        let last = layout.attributes.last().unwrap();
        assert_eq!(last.offset + last.format.size(), Vertex::STRIDE);
    }

    #[test]
    fn flags_combine_and_query() {
        let usage = BufferUsage::VERTEX | BufferUsage::COPY_DST;
        assert!(usage.contains(BufferUsage::VERTEX));
        assert!(usage.contains(BufferUsage::COPY_DST | BufferUsage::VERTEX));
        assert!(!usage.contains(BufferUsage::UNIFORM));
        assert!(TextureUsage::empty().contains(TextureUsage::empty()));
    }

    #[test]
    fn attachment_cost_aligns_each_target() {
        assert_eq!(color_attachment_bytes_per_sample(&[]), 0);
        assert_eq!(
            color_attachment_bytes_per_sample(&[TextureFormat::Rgba16Float, TextureFormat::Rgba8Unorm]),
            16
        );
        // 8-bit unorm targets are charged at 16 bits per channel
        assert_eq!(
            color_attachment_bytes_per_sample(&[TextureFormat::Rgba8Unorm, TextureFormat::R32Float]),
            12
        );
        assert_eq!(
            color_attachment_bytes_per_sample(&[TextureFormat::Depth32Float, TextureFormat::Rgba16Float]),
            8
        );
    }

    #[test]
    fn srgb_formats() {
        assert!(TextureFormat::Bgra8UnormSrgb.is_srgb());
        assert!(!TextureFormat::Rgba16Float.is_srgb());
    }
}
