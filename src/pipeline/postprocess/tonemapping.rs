//! Tonemapping post-processing

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::FULLSCREEN_VERTEX_WGSL;
use crate::resources::UniformBuffer;
use bytemuck::{Pod, Zeroable};

/// Tonemapping operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TonemapOperator {
    Reinhard,
    #[default]
    Aces,
    /// Clamp only
    None,
}

impl TonemapOperator {
    fn shader_index(self) -> u32 {
        match self {
            TonemapOperator::Reinhard => 0,
            TonemapOperator::Aces => 1,
            TonemapOperator::None => 2,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TonemapParams {
    pub exposure: f32,
    pub gamma: f32,
    pub operator: u32,
    /// Non-zero when the average luminance texel scales exposure
    pub auto_exposure: u32,
    /// Middle-grey target for auto exposure
    pub key: f32,
    pub _padding: [f32; 3],
}

/// Per-frame exposure inputs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExposureSettings {
    pub exposure: f32,
    pub auto_exposure: bool,
    pub key: f32,
}

/// Tonemapping post-processing pass
///
/// Maps the HDR target onto the swapchain. There is one bind group per
/// average-luminance texture so the pass can follow the auto-exposure
/// ping-pong without rebinding.
pub struct TonemappingPass {
    pub operator: TonemapOperator,
    pub gamma: f32,
    pipeline: RenderPipelineHandle,
    layout: BindGroupLayoutHandle,
    bind_groups: [BindGroupHandle; 2],
    params: UniformBuffer<TonemapParams>,
}

impl TonemappingPass {
    pub const LABEL: &'static str = "Tonemapping";

    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        hdr_view: TextureViewHandle,
        luminance_views: [TextureViewHandle; 2],
        target_format: TextureFormat,
        operator: TonemapOperator,
    ) -> BackendResult<Self> {
        // sRGB surfaces encode on store
        let gamma = if target_format.is_srgb() { 1.0 } else { 2.2 };

        let layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::unfilterable_texture_2d(),
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::unfilterable_texture_2d(),
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::UniformBuffer,
            },
        ])?;

        let params = UniformBuffer::new(backend, "Tonemap Params", &TonemapParams::zeroed())?;
        let bind_groups = create_bind_groups(backend, layout, hdr_view, luminance_views, &params)?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Tonemapping Pipeline".into()),
            shader: format!("{}{}", FULLSCREEN_VERTEX_WGSL, TONEMAPPING_SHADER),
            vertex_entry: "vs_fullscreen".into(),
            fragment_entry: Some("fs_main".into()),
            vertex_layouts: vec![],
            bind_group_layouts: vec![layout],
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets: vec![target_format],
        })?;

        Ok(Self {
            operator,
            gamma,
            pipeline,
            layout,
            bind_groups,
            params,
        })
    }

    pub fn params(&self, settings: ExposureSettings) -> TonemapParams {
        TonemapParams {
            exposure: settings.exposure,
            gamma: self.gamma,
            operator: self.operator.shader_index(),
            auto_exposure: settings.auto_exposure as u32,
            key: settings.key,
            _padding: [0.0; 3],
        }
    }

    pub fn params_buffer(&self) -> BufferHandle {
        self.params.handle()
    }

    /// Rebind after the HDR target was recreated
    pub fn resize<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        hdr_view: TextureViewHandle,
        luminance_views: [TextureViewHandle; 2],
    ) -> BackendResult<()> {
        let bind_groups = create_bind_groups(backend, self.layout, hdr_view, luminance_views, &self.params)?;
        for old in std::mem::replace(&mut self.bind_groups, bind_groups) {
            backend.destroy_bind_group(old);
        }
        Ok(())
    }

    /// Draw into `target`, reading the luminance texture at `luminance_index`
    pub fn execute<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        target: TextureViewHandle,
        size: (u32, u32),
        load_op: LoadOp,
        settings: ExposureSettings,
        luminance_index: usize,
    ) {
        self.params.update(backend, &self.params(settings));

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some(Self::LABEL.into()),
            color_attachments: vec![ColorAttachment {
                view: target,
                load_op,
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        });

        backend.set_viewport(0.0, 0.0, size.0 as f32, size.1 as f32, 0.0, 1.0);
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, self.bind_groups[luminance_index % 2]);
        backend.draw(0..3, 0..1);

        backend.end_render_pass();
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        for bind_group in self.bind_groups {
            backend.destroy_bind_group(bind_group);
        }
        backend.destroy_bind_group_layout(self.layout);
        backend.destroy_render_pipeline(self.pipeline);
        self.params.destroy(backend);
    }
}

fn create_bind_groups<B: GraphicsBackend>(
    backend: &mut B,
    layout: BindGroupLayoutHandle,
    hdr_view: TextureViewHandle,
    luminance_views: [TextureViewHandle; 2],
    params: &UniformBuffer<TonemapParams>,
) -> BackendResult<[BindGroupHandle; 2]> {
    let mut create = |luminance: TextureViewHandle| {
        backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::Texture(hdr_view)),
                (1, BindGroupEntry::Texture(luminance)),
                (2, BindGroupEntry::buffer(params.handle())),
            ],
        )
    };
    Ok([create(luminance_views[0])?, create(luminance_views[1])?])
}

pub const TONEMAPPING_SHADER: &str = r#"
struct TonemapParams {
    exposure: f32,
    gamma: f32,
    operator: u32,
    auto_exposure: u32,
    key: f32,
}

@group(0) @binding(0) var hdr_texture: texture_2d<f32>;
@group(0) @binding(1) var average_luminance: texture_2d<f32>;
@group(0) @binding(2) var<uniform> params: TonemapParams;

fn aces_tonemap(color: vec3<f32>) -> vec3<f32> {
    let a = 2.51;
    let b = 0.03;
    let c = 2.43;
    let d = 0.59;
    let e = 0.14;
    return saturate((color * (a * color + b)) / (color * (c * color + d) + e));
}

fn reinhard_tonemap(color: vec3<f32>) -> vec3<f32> {
    return color / (color + vec3<f32>(1.0));
}

@fragment
fn fs_main(input: FullscreenOutput) -> @location(0) vec4<f32> {
    var color = textureLoad(hdr_texture, vec2<i32>(input.position.xy), 0).rgb;

    var exposure = params.exposure;
    if params.auto_exposure != 0u {
        let average = textureLoad(average_luminance, vec2<i32>(0, 0), 0).r;
        exposure = exposure * params.key / max(average, 0.0001);
    }
    color = color * exposure;

    var mapped: vec3<f32>;
    switch params.operator {
        case 0u: { mapped = reinhard_tonemap(color); }
        case 1u: { mapped = aces_tonemap(color); }
        default: { mapped = saturate(color); }
    }

    let gamma_corrected = pow(mapped, vec3<f32>(1.0 / params.gamma));
    return vec4<f32>(gamma_corrected, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::DummyBackend;
    use rstest::rstest;

    #[rstest]
    #[case(TextureFormat::Bgra8UnormSrgb, 1.0)]
    #[case(TextureFormat::Rgba8Unorm, 2.2)]
    fn gamma_follows_target_format(#[case] format: TextureFormat, #[case] gamma: f32) {
        let mut backend = DummyBackend::new(4, 4);
        let view = TextureViewHandle(1);
        let pass = TonemappingPass::new(&mut backend, view, [view, view], format, TonemapOperator::Reinhard)
            .unwrap();
        assert_eq!(pass.gamma, gamma);
    }

    #[test]
    fn params_encode_settings() {
        let mut backend = DummyBackend::new(4, 4);
        let view = TextureViewHandle(1);
        let pass = TonemappingPass::new(
            &mut backend,
            view,
            [view, view],
            TextureFormat::Bgra8UnormSrgb,
            TonemapOperator::None,
        )
        .unwrap();
        let params = pass.params(ExposureSettings {
            exposure: 2.0,
            auto_exposure: true,
            key: 0.18,
        });
        assert_eq!(params.operator, 2);
        assert_eq!(params.auto_exposure, 1);
        assert_eq!(params.exposure, 2.0);
        assert_eq!(std::mem::size_of::<TonemapParams>(), 32);
    }
}
