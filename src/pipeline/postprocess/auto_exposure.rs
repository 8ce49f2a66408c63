//! Histogram-based automatic exposure
//!
//! Two compute dispatches per frame:
//! 1. `cs_histogram` bins the log luminance of every HDR pixel into 256 bins.
//! 2. `cs_average` reduces the histogram to a weighted average, blends it
//!    with the previous value and stores it in a single R32Float texel.
//!
//! The average lives in a ping-pong pair of 1x1 textures. The tonemapping
//! pass samples the texture written by the previous frame.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::UniformBuffer;
use crate::RendererConfig;
use bytemuck::{Pod, Zeroable};

pub const HISTOGRAM_BINS: usize = 256;
const HISTOGRAM_WORKGROUP: u32 = 16;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ExposureParams {
    pub min_log_luminance: f32,
    pub log_luminance_range: f32,
    pub inverse_log_luminance_range: f32,
    /// Blend factor towards the new average, 0..1
    pub time_coeff: f32,
    pub pixel_count: u32,
    pub _padding: [u32; 3],
}

/// Fraction of the way the adapted luminance moves towards the measured one
pub fn adaptation_coefficient(dt: f32, rate: f32) -> f32 {
    (1.0 - (-dt.max(0.0) * rate).exp()).clamp(0.0, 1.0)
}

struct LuminanceTexture {
    texture: TextureHandle,
    view: TextureViewHandle,
}

pub struct AutoExposurePass {
    histogram_pipeline: ComputePipelineHandle,
    average_pipeline: ComputePipelineHandle,
    histogram_layout: BindGroupLayoutHandle,
    average_layout: BindGroupLayoutHandle,
    histogram_bind_group: BindGroupHandle,
    /// Index `i` reads luminance `i` and writes luminance `1 - i`
    average_bind_groups: [BindGroupHandle; 2],
    histogram: BufferHandle,
    params: UniformBuffer<ExposureParams>,
    luminance: [LuminanceTexture; 2],
    current: usize,
    min_log_luminance: f32,
    log_luminance_range: f32,
    adaptation_rate: f32,
    size: (u32, u32),
}

impl AutoExposurePass {
    pub const LABEL: &'static str = "Auto Exposure";

    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        hdr_view: TextureViewHandle,
        width: u32,
        height: u32,
        config: &RendererConfig,
    ) -> BackendResult<Self> {
        let histogram = backend.create_buffer_init(
            &BufferDescriptor {
                label: Some("Luminance Histogram".into()),
                size: (HISTOGRAM_BINS * 4) as u64,
                usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
            },
            &[0u8; HISTOGRAM_BINS * 4],
        )?;

        let log_luminance_range = (config.max_log_luminance - config.min_log_luminance).max(f32::EPSILON);
        let params = UniformBuffer::new(
            backend,
            "Auto Exposure Params",
            &ExposureParams {
                min_log_luminance: config.min_log_luminance,
                log_luminance_range,
                inverse_log_luminance_range: 1.0 / log_luminance_range,
                time_coeff: 1.0,
                pixel_count: width * height,
                _padding: [0; 3],
            },
        )?;

        let luminance = [
            create_luminance_texture(backend, "Average Luminance A", config.exposure_key)?,
            create_luminance_texture(backend, "Average Luminance B", config.exposure_key)?,
        ];

        let histogram_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::COMPUTE,
                ty: BindingType::unfilterable_texture_2d(),
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::COMPUTE,
                ty: BindingType::StorageBuffer { read_only: false },
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStageFlags::COMPUTE,
                ty: BindingType::UniformBuffer,
            },
        ])?;
        let histogram_bind_group =
            create_histogram_bind_group(backend, histogram_layout, hdr_view, histogram, &params)?;

        let average_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::COMPUTE,
                ty: BindingType::StorageBuffer { read_only: false },
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::COMPUTE,
                ty: BindingType::UniformBuffer,
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStageFlags::COMPUTE,
                ty: BindingType::unfilterable_texture_2d(),
            },
            BindGroupLayoutEntry {
                binding: 3,
                visibility: ShaderStageFlags::COMPUTE,
                ty: BindingType::StorageTexture {
                    format: TextureFormat::R32Float,
                },
            },
        ])?;
        let mut average_bind_group = |read: usize| {
            backend.create_bind_group(
                average_layout,
                &[
                    (0, BindGroupEntry::buffer(histogram)),
                    (1, BindGroupEntry::buffer(params.handle())),
                    (2, BindGroupEntry::Texture(luminance[read].view)),
                    (3, BindGroupEntry::StorageTexture(luminance[1 - read].view)),
                ],
            )
        };
        let average_bind_groups = [average_bind_group(0)?, average_bind_group(1)?];

        let histogram_pipeline = backend.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("Luminance Histogram Pipeline".into()),
            shader: format!("{}{}", EXPOSURE_COMMON_WGSL, HISTOGRAM_SHADER),
            entry_point: "cs_histogram".into(),
            bind_group_layouts: vec![histogram_layout],
        })?;
        let average_pipeline = backend.create_compute_pipeline(&ComputePipelineDescriptor {
            label: Some("Luminance Average Pipeline".into()),
            shader: format!("{}{}", EXPOSURE_COMMON_WGSL, AVERAGE_SHADER),
            entry_point: "cs_average".into(),
            bind_group_layouts: vec![average_layout],
        })?;

        Ok(Self {
            histogram_pipeline,
            average_pipeline,
            histogram_layout,
            average_layout,
            histogram_bind_group,
            average_bind_groups,
            histogram,
            params,
            luminance,
            current: 0,
            min_log_luminance: config.min_log_luminance,
            log_luminance_range,
            adaptation_rate: config.exposure_adaptation_rate,
            size: (width.max(1), height.max(1)),
        })
    }

    /// Index of the texture holding the most recent average
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn luminance_views(&self) -> [TextureViewHandle; 2] {
        [self.luminance[0].view, self.luminance[1].view]
    }

    pub fn histogram_buffer(&self) -> BufferHandle {
        self.histogram
    }

    pub fn params(&self, dt: f32) -> ExposureParams {
        ExposureParams {
            min_log_luminance: self.min_log_luminance,
            log_luminance_range: self.log_luminance_range,
            inverse_log_luminance_range: 1.0 / self.log_luminance_range,
            time_coeff: adaptation_coefficient(dt, self.adaptation_rate),
            pixel_count: self.size.0 * self.size.1,
            _padding: [0; 3],
        }
    }

    /// Rebind the (recreated) HDR target
    pub fn resize<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        hdr_view: TextureViewHandle,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        let bind_group =
            create_histogram_bind_group(backend, self.histogram_layout, hdr_view, self.histogram, &self.params)?;
        backend.destroy_bind_group(std::mem::replace(&mut self.histogram_bind_group, bind_group));
        self.size = (width.max(1), height.max(1));
        Ok(())
    }

    /// Measure the HDR target and advance the ping-pong pair
    pub fn execute<B: GraphicsBackend>(&mut self, backend: &mut B, dt: f32) {
        self.params.update(backend, &self.params(dt));

        let (width, height) = self.size;
        backend.begin_compute_pass(Some(Self::LABEL));

        backend.set_compute_pipeline(self.histogram_pipeline);
        backend.set_bind_group(0, self.histogram_bind_group);
        backend.dispatch_compute(
            width.div_ceil(HISTOGRAM_WORKGROUP),
            height.div_ceil(HISTOGRAM_WORKGROUP),
            1,
        );

        backend.set_compute_pipeline(self.average_pipeline);
        backend.set_bind_group(0, self.average_bind_groups[self.current]);
        backend.dispatch_compute(1, 1, 1);

        backend.end_compute_pass();
        self.current = 1 - self.current;
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_bind_group(self.histogram_bind_group);
        for bind_group in self.average_bind_groups {
            backend.destroy_bind_group(bind_group);
        }
        for texture in self.luminance {
            backend.destroy_texture_view(texture.view);
            backend.destroy_texture(texture.texture);
        }
        backend.destroy_bind_group_layout(self.histogram_layout);
        backend.destroy_bind_group_layout(self.average_layout);
        backend.destroy_compute_pipeline(self.histogram_pipeline);
        backend.destroy_compute_pipeline(self.average_pipeline);
        backend.destroy_buffer(self.histogram);
        self.params.destroy(backend);
    }
}

fn create_luminance_texture<B: GraphicsBackend>(
    backend: &mut B,
    label: &str,
    initial: f32,
) -> BackendResult<LuminanceTexture> {
    let texture = backend.create_texture(&TextureDescriptor {
        label: Some(label.to_string()),
        format: TextureFormat::R32Float,
        usage: TextureUsage::TEXTURE_BINDING | TextureUsage::STORAGE_BINDING | TextureUsage::COPY_DST,
        ..Default::default()
    })?;
    backend.write_texture(texture, 0, bytemuck::bytes_of(&initial), 1, 1);
    let view = backend.create_texture_view(texture, TextureViewDimension::D2)?;
    Ok(LuminanceTexture { texture, view })
}

fn create_histogram_bind_group<B: GraphicsBackend>(
    backend: &mut B,
    layout: BindGroupLayoutHandle,
    hdr_view: TextureViewHandle,
    histogram: BufferHandle,
    params: &UniformBuffer<ExposureParams>,
) -> BackendResult<BindGroupHandle> {
    backend.create_bind_group(
        layout,
        &[
            (0, BindGroupEntry::Texture(hdr_view)),
            (1, BindGroupEntry::buffer(histogram)),
            (2, BindGroupEntry::buffer(params.handle())),
        ],
    )
}

const EXPOSURE_COMMON_WGSL: &str = r#"
struct ExposureParams {
    min_log_luminance: f32,
    log_luminance_range: f32,
    inverse_log_luminance_range: f32,
    time_coeff: f32,
    pixel_count: u32,
}

const BIN_COUNT: u32 = 256u;
"#;

pub const HISTOGRAM_SHADER: &str = r#"
@group(0) @binding(0) var hdr_texture: texture_2d<f32>;
@group(0) @binding(1) var<storage, read_write> histogram: array<atomic<u32>, 256>;
@group(0) @binding(2) var<uniform> params: ExposureParams;

var<workgroup> local_bins: array<atomic<u32>, 256>;

// Bin 0 collects near-black pixels, 1..255 span the log luminance range
fn luminance_bin(color: vec3<f32>) -> u32 {
    let luminance = dot(color, vec3<f32>(0.2126, 0.7152, 0.0722));
    if luminance < 0.005 {
        return 0u;
    }
    let t = clamp((log2(luminance) - params.min_log_luminance) * params.inverse_log_luminance_range, 0.0, 1.0);
    return u32(t * 254.0 + 1.0);
}

@compute @workgroup_size(16, 16, 1)
fn cs_histogram(
    @builtin(global_invocation_id) global_id: vec3<u32>,
    @builtin(local_invocation_index) local_index: u32,
) {
    atomicStore(&local_bins[local_index], 0u);
    workgroupBarrier();

    let dimensions = textureDimensions(hdr_texture);
    if global_id.x < dimensions.x && global_id.y < dimensions.y {
        let color = textureLoad(hdr_texture, vec2<i32>(global_id.xy), 0).rgb;
        atomicAdd(&local_bins[luminance_bin(color)], 1u);
    }

    workgroupBarrier();
    atomicAdd(&histogram[local_index], atomicLoad(&local_bins[local_index]));
}
"#;

pub const AVERAGE_SHADER: &str = r#"
@group(0) @binding(0) var<storage, read_write> histogram: array<atomic<u32>, 256>;
@group(0) @binding(1) var<uniform> params: ExposureParams;
@group(0) @binding(2) var previous_average: texture_2d<f32>;
@group(0) @binding(3) var next_average: texture_storage_2d<r32float, write>;

// Float sums: bin index times pixel count overflows u32 on large surfaces
var<workgroup> weighted_bins: array<f32, 256>;

@compute @workgroup_size(256, 1, 1)
fn cs_average(@builtin(local_invocation_index) local_index: u32) {
    let count = atomicLoad(&histogram[local_index]);
    weighted_bins[local_index] = f32(count) * f32(local_index);
    // Reset for the next frame
    atomicStore(&histogram[local_index], 0u);
    workgroupBarrier();

    for (var cutoff = BIN_COUNT >> 1u; cutoff > 0u; cutoff = cutoff >> 1u) {
        if local_index < cutoff {
            weighted_bins[local_index] += weighted_bins[local_index + cutoff];
        }
        workgroupBarrier();
    }

    if local_index == 0u {
        // `count` is the black bin here; it does not contribute to the average
        let lit_pixels = max(f32(params.pixel_count) - f32(count), 1.0);
        let weighted_log_average = weighted_bins[0] / lit_pixels - 1.0;
        let average = exp2(weighted_log_average / 254.0 * params.log_luminance_range + params.min_log_luminance);

        let previous = textureLoad(previous_average, vec2<i32>(0, 0), 0).r;
        let adapted = previous + (average - previous) * params.time_coeff;
        textureStore(next_average, vec2<i32>(0, 0), vec4<f32>(adapted, 0.0, 0.0, 1.0));
    }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyBackend, RecordedCommand};
    use approx::assert_relative_eq;

    #[test]
    fn adaptation_is_clamped() {
        assert_relative_eq!(adaptation_coefficient(0.0, 1.1), 0.0);
        assert!(adaptation_coefficient(1.0, 1.1) > 0.6);
        assert_relative_eq!(adaptation_coefficient(1e6, 1.1), 1.0);
        assert_relative_eq!(adaptation_coefficient(-1.0, 1.1), 0.0);
    }

    #[test]
    fn histogram_weights_are_summed_in_float() {
        // Largest surface the backend configures, every pixel in the brightest bin
        let pixels = 8192u64 * 8192;
        let weighted = pixels * (HISTOGRAM_BINS as u64 - 1);
        assert!(weighted > u32::MAX as u64);
        assert!(AVERAGE_SHADER.contains("var<workgroup> weighted_bins: array<f32, 256>;"));
        assert!(AVERAGE_SHADER.contains("f32(count) * f32(local_index)"));

        let weighted_log_average = weighted as f32 / pixels as f32 - 1.0;
        assert_relative_eq!(weighted_log_average, 254.0, epsilon = 1e-3);
    }

    #[test]
    fn execute_dispatches_and_swaps() {
        let mut backend = DummyBackend::new(40, 20);
        let hdr = backend
            .create_texture(&TextureDescriptor {
                width: 40,
                height: 20,
                format: TextureFormat::Rgba16Float,
                ..Default::default()
            })
            .unwrap();
        let hdr_view = backend.create_texture_view(hdr, TextureViewDimension::D2).unwrap();
        let mut pass = AutoExposurePass::new(&mut backend, hdr_view, 40, 20, &RendererConfig::default()).unwrap();
        backend.clear_commands();

        pass.execute(&mut backend, 0.016);
        assert_eq!(pass.current(), 1);

        let dispatches: Vec<_> = backend
            .commands()
            .iter()
            .filter_map(|cmd| match cmd {
                RecordedCommand::Dispatch { x, y, z } => Some((*x, *y, *z)),
                _ => None,
            })
            .collect();
        assert_eq!(dispatches, vec![(3, 2, 1), (1, 1, 1)]);

        pass.execute(&mut backend, 0.016);
        assert_eq!(pass.current(), 0);
    }

    #[test]
    fn average_bind_groups_cross_the_pair() {
        let mut backend = DummyBackend::new(8, 8);
        let hdr = backend.create_texture(&TextureDescriptor::default()).unwrap();
        let hdr_view = backend.create_texture_view(hdr, TextureViewDimension::D2).unwrap();
        let pass = AutoExposurePass::new(&mut backend, hdr_view, 8, 8, &RendererConfig::default()).unwrap();

        let [a, b] = pass.luminance_views();
        let entries = backend.bind_group_entries(pass.average_bind_groups[0]).unwrap();
        assert!(matches!(entries[2].1, BindGroupEntry::Texture(view) if view == a));
        assert!(matches!(entries[3].1, BindGroupEntry::StorageTexture(view) if view == b));
    }
}
