//! Descriptor conversions into wgpu types

use crate::backend::traits::{BindingType, ShaderStageFlags};
use crate::backend::types::*;

impl From<TextureFormat> for wgpu::TextureFormat {
    fn from(format: TextureFormat) -> Self {
        match format {
            TextureFormat::Rgba8Unorm => Self::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => Self::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => Self::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => Self::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => Self::Rgba16Float,
            TextureFormat::Depth32Float => Self::Depth32Float,
            TextureFormat::R32Float => Self::R32Float,
        }
    }
}

/// Surface formats the renderer can present to; anything else is returned as the error
impl TryFrom<wgpu::TextureFormat> for TextureFormat {
    type Error = wgpu::TextureFormat;

    fn try_from(format: wgpu::TextureFormat) -> Result<Self, Self::Error> {
        Ok(match format {
            wgpu::TextureFormat::Rgba8Unorm => Self::Rgba8Unorm,
            wgpu::TextureFormat::Rgba8UnormSrgb => Self::Rgba8UnormSrgb,
            wgpu::TextureFormat::Bgra8Unorm => Self::Bgra8Unorm,
            wgpu::TextureFormat::Bgra8UnormSrgb => Self::Bgra8UnormSrgb,
            wgpu::TextureFormat::Rgba16Float => Self::Rgba16Float,
            other => return Err(other),
        })
    }
}

macro_rules! map_flags {
    ($flags:expr, $target:ty, [$(($from:expr, $to:ident)),* $(,)?]) => {{
        let mut bits = <$target>::empty();
        $(
            if $flags.contains($from) {
                bits |= <$target>::$to;
            }
        )*
        bits
    }};
}

impl From<BufferUsage> for wgpu::BufferUsages {
    fn from(usage: BufferUsage) -> Self {
        map_flags!(
            usage,
            Self,
            [
                (BufferUsage::COPY_SRC, COPY_SRC),
                (BufferUsage::COPY_DST, COPY_DST),
                (BufferUsage::INDEX, INDEX),
                (BufferUsage::VERTEX, VERTEX),
                (BufferUsage::UNIFORM, UNIFORM),
                (BufferUsage::STORAGE, STORAGE),
            ]
        )
    }
}

impl From<TextureUsage> for wgpu::TextureUsages {
    fn from(usage: TextureUsage) -> Self {
        map_flags!(
            usage,
            Self,
            [
                (TextureUsage::COPY_SRC, COPY_SRC),
                (TextureUsage::COPY_DST, COPY_DST),
                (TextureUsage::TEXTURE_BINDING, TEXTURE_BINDING),
                (TextureUsage::STORAGE_BINDING, STORAGE_BINDING),
                (TextureUsage::RENDER_ATTACHMENT, RENDER_ATTACHMENT),
            ]
        )
    }
}

impl From<ShaderStageFlags> for wgpu::ShaderStages {
    fn from(stages: ShaderStageFlags) -> Self {
        map_flags!(
            stages,
            Self,
            [
                (ShaderStageFlags::VERTEX, VERTEX),
                (ShaderStageFlags::FRAGMENT, FRAGMENT),
                (ShaderStageFlags::COMPUTE, COMPUTE),
            ]
        )
    }
}

impl From<TextureViewDimension> for wgpu::TextureViewDimension {
    fn from(dimension: TextureViewDimension) -> Self {
        match dimension {
            TextureViewDimension::D2 => Self::D2,
            TextureViewDimension::Cube => Self::Cube,
        }
    }
}

impl From<VertexFormat> for wgpu::VertexFormat {
    fn from(format: VertexFormat) -> Self {
        match format {
            VertexFormat::Float32x2 => Self::Float32x2,
            VertexFormat::Float32x3 => Self::Float32x3,
            VertexFormat::Float32x4 => Self::Float32x4,
        }
    }
}

impl From<VertexStepMode> for wgpu::VertexStepMode {
    fn from(mode: VertexStepMode) -> Self {
        match mode {
            VertexStepMode::Vertex => Self::Vertex,
            VertexStepMode::Instance => Self::Instance,
        }
    }
}

impl From<IndexFormat> for wgpu::IndexFormat {
    fn from(format: IndexFormat) -> Self {
        match format {
            IndexFormat::Uint16 => Self::Uint16,
            IndexFormat::Uint32 => Self::Uint32,
        }
    }
}

impl From<CompareFunction> for wgpu::CompareFunction {
    fn from(function: CompareFunction) -> Self {
        match function {
            CompareFunction::Less => Self::Less,
            CompareFunction::LessEqual => Self::LessEqual,
            CompareFunction::Always => Self::Always,
        }
    }
}

pub(super) fn primitive_state(front_face: FrontFace, cull_mode: CullMode) -> wgpu::PrimitiveState {
    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        front_face: match front_face {
            FrontFace::Ccw => wgpu::FrontFace::Ccw,
            FrontFace::Cw => wgpu::FrontFace::Cw,
        },
        cull_mode: match cull_mode {
            CullMode::None => None,
            CullMode::Front => Some(wgpu::Face::Front),
            CullMode::Back => Some(wgpu::Face::Back),
        },
        ..Default::default()
    }
}

fn sampler_address(mode: AddressMode) -> wgpu::AddressMode {
    match mode {
        AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
    }
}

fn sampler_filter(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

pub(super) fn sampler_descriptor(desc: &SamplerDescriptor) -> wgpu::SamplerDescriptor<'_> {
    wgpu::SamplerDescriptor {
        label: desc.label.as_deref(),
        address_mode_u: sampler_address(desc.address_mode_u),
        address_mode_v: sampler_address(desc.address_mode_v),
        address_mode_w: sampler_address(desc.address_mode_w),
        mag_filter: sampler_filter(desc.mag_filter),
        min_filter: sampler_filter(desc.min_filter),
        mipmap_filter: sampler_filter(desc.mipmap_filter),
        ..Default::default()
    }
}

impl From<&BindingType> for wgpu::BindingType {
    fn from(ty: &BindingType) -> Self {
        let buffer = |ty| Self::Buffer {
            ty,
            has_dynamic_offset: false,
            min_binding_size: None,
        };
        match *ty {
            BindingType::UniformBuffer => buffer(wgpu::BufferBindingType::Uniform),
            BindingType::StorageBuffer { read_only } => {
                buffer(wgpu::BufferBindingType::Storage { read_only })
            }
            BindingType::Texture {
                filterable,
                view_dimension,
            } => Self::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable },
                view_dimension: view_dimension.into(),
                multisampled: false,
            },
            BindingType::StorageTexture { format } => Self::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: format.into(),
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            BindingType::Sampler { filtering: true } => {
                Self::Sampler(wgpu::SamplerBindingType::Filtering)
            }
            BindingType::Sampler { filtering: false } => {
                Self::Sampler(wgpu::SamplerBindingType::NonFiltering)
            }
        }
    }
}

pub(super) fn color_ops(load: &LoadOp, store: StoreOp) -> wgpu::Operations<wgpu::Color> {
    wgpu::Operations {
        load: match *load {
            LoadOp::Clear([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                r: r as f64,
                g: g as f64,
                b: b as f64,
                a: a as f64,
            }),
            LoadOp::Load => wgpu::LoadOp::Load,
        },
        store: store_op(store),
    }
}

/// Depth clears use the attachment's clear value, not the color in the load op
pub(super) fn depth_ops(load: &LoadOp, store: StoreOp, clear_value: f32) -> wgpu::Operations<f32> {
    wgpu::Operations {
        load: match load {
            LoadOp::Clear(_) => wgpu::LoadOp::Clear(clear_value),
            LoadOp::Load => wgpu::LoadOp::Load,
        },
        store: store_op(store),
    }
}

fn store_op(op: StoreOp) -> wgpu::StoreOp {
    match op {
        StoreOp::Store => wgpu::StoreOp::Store,
        StoreOp::Discard => wgpu::StoreOp::Discard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_flags_map_bit_by_bit() {
        let usage: wgpu::BufferUsages = (BufferUsage::VERTEX | BufferUsage::COPY_DST).into();
        assert_eq!(usage, wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST);

        let stages: wgpu::ShaderStages = ShaderStageFlags::VERTEX_FRAGMENT.into();
        assert_eq!(stages, wgpu::ShaderStages::VERTEX_FRAGMENT);
    }

    #[test]
    fn attachment_costs_match_wgpu() {
        let formats = [
            TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float,
            TextureFormat::Depth32Float,
            TextureFormat::R32Float,
        ];
        for format in formats {
            let native = wgpu::TextureFormat::from(format);
            assert_eq!(format.target_pixel_byte_cost(), native.target_pixel_byte_cost(), "{format:?}");
            assert_eq!(
                format.target_component_alignment(),
                native.target_component_alignment(),
                "{format:?}"
            );
        }
        assert_eq!(
            MAX_COLOR_ATTACHMENT_BYTES_PER_SAMPLE,
            wgpu::Limits::default().max_color_attachment_bytes_per_sample
        );
    }

    #[test]
    fn unsupported_surface_formats_are_rejected() {
        assert_eq!(
            TextureFormat::try_from(wgpu::TextureFormat::Bgra8UnormSrgb),
            Ok(TextureFormat::Bgra8UnormSrgb)
        );
        assert_eq!(
            TextureFormat::try_from(wgpu::TextureFormat::Rgb10a2Unorm),
            Err(wgpu::TextureFormat::Rgb10a2Unorm)
        );
    }
}
