//! Deferred lighting pass
//!
//! Reads the G-buffer with `textureLoad`, shades every covered pixel with a
//! Cook-Torrance BRDF against the directional light and the live point and
//! spot lights, and writes radiance into the HDR target. Pixels the G-buffer
//! pass never touched keep the clear color. Afterwards the G-buffer depth is
//! copied into the HDR depth attachment so forward passes can depth test
//! against deferred geometry.

use super::{bindings, GBufferPass, FULLSCREEN_VERTEX_WGSL};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::{FrameBuffer, FrameBufferLayout, RenderTarget, UniformBuffer};
use crate::scene::LightsUniform;
use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Camera data needed to build view vectors
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct CameraUniform {
    /// xyz = world-space position
    pub position: Vec4,
}

pub struct LightingPass {
    pipeline: RenderPipelineHandle,
    gbuffer_layout: BindGroupLayoutHandle,
    lights_layout: BindGroupLayoutHandle,
    gbuffer_bind_group: BindGroupHandle,
    lights_bind_group: BindGroupHandle,
    camera: UniformBuffer<CameraUniform>,
    hdr: FrameBuffer,
}

impl LightingPass {
    pub const LABEL: &'static str = "Lighting Pass";

    pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

    fn hdr_layout() -> FrameBufferLayout {
        FrameBufferLayout {
            label: "hdr".into(),
            color_formats: vec![Self::HDR_FORMAT],
            color_usage: TextureUsage::empty(),
            depth_usage: Some(TextureUsage::COPY_DST),
        }
    }

    pub fn new<B: GraphicsBackend>(
        backend: &mut B,
        lights_buffer: BufferHandle,
        gbuffer: &GBufferPass,
        width: u32,
        height: u32,
    ) -> BackendResult<Self> {
        let gbuffer_entries: Vec<BindGroupLayoutEntry> = (0..gbuffer.framebuffer().colors().len() as u32)
            .map(|binding| BindGroupLayoutEntry {
                binding,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::unfilterable_texture_2d(),
            })
            .collect();
        let gbuffer_layout = backend.create_bind_group_layout(&gbuffer_entries)?;
        let gbuffer_bind_group = create_gbuffer_bind_group(backend, gbuffer_layout, gbuffer)?;

        let lights_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: bindings::LIGHTS_BINDING,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::UniformBuffer,
            },
            BindGroupLayoutEntry {
                binding: bindings::CAMERA_BINDING,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::UniformBuffer,
            },
        ])?;

        let camera = UniformBuffer::new(
            backend,
            "Lighting Camera",
            &CameraUniform {
                position: Vec4::ZERO,
            },
        )?;

        let lights_bind_group = backend.create_bind_group(
            lights_layout,
            &[
                (bindings::LIGHTS_BINDING, BindGroupEntry::buffer(lights_buffer)),
                (bindings::CAMERA_BINDING, BindGroupEntry::buffer(camera.handle())),
            ],
        )?;

        let hdr = FrameBuffer::new(backend, Self::hdr_layout(), width, height)?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Deferred Lighting Pipeline".into()),
            shader: lighting_shader(),
            vertex_entry: "vs_fullscreen".into(),
            fragment_entry: Some("fs_main".into()),
            vertex_layouts: vec![],
            bind_group_layouts: vec![gbuffer_layout, lights_layout],
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets: vec![Self::HDR_FORMAT],
        })?;

        Ok(Self {
            pipeline,
            gbuffer_layout,
            lights_layout,
            gbuffer_bind_group,
            lights_bind_group,
            camera,
            hdr,
        })
    }

    /// HDR color and depth attachments
    pub fn hdr(&self) -> &FrameBuffer {
        &self.hdr
    }

    pub fn hdr_color(&self) -> Option<&RenderTarget> {
        self.hdr.color(0)
    }

    /// Rebuild the HDR target and rebind the (already resized) G-buffer
    pub fn resize<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        gbuffer: &GBufferPass,
        width: u32,
        height: u32,
    ) -> BackendResult<()> {
        self.hdr.resize(backend, width, height)?;
        let bind_group = create_gbuffer_bind_group(backend, self.gbuffer_layout, gbuffer)?;
        backend.destroy_bind_group(std::mem::replace(&mut self.gbuffer_bind_group, bind_group));
        log::debug!("Lighting pass rebuilt at {}x{}", width, height);
        Ok(())
    }

    /// Clear the HDR target, shade it from the G-buffer, then copy depth over
    pub fn execute<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        gbuffer: &GBufferPass,
        camera_position: Vec3,
        clear_color: [f32; 4],
    ) {
        self.camera.update(
            backend,
            &CameraUniform {
                position: camera_position.extend(1.0),
            },
        );

        let Some(hdr_color) = self.hdr.color(0) else {
            return;
        };

        backend.begin_render_pass(&RenderPassDescriptor {
            label: Some(Self::LABEL.to_string()),
            color_attachments: vec![ColorAttachment {
                view: hdr_color.view,
                load_op: LoadOp::Clear(clear_color),
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: None,
        });
        backend.set_viewport(
            0.0,
            0.0,
            self.hdr.width() as f32,
            self.hdr.height() as f32,
            0.0,
            1.0,
        );
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(bindings::GBUFFER_GROUP, self.gbuffer_bind_group);
        backend.set_bind_group(bindings::LIGHTS_GROUP, self.lights_bind_group);
        backend.draw(0..3, 0..1);
        backend.end_render_pass();

        if let (Some(source), Some(destination)) = (gbuffer.framebuffer().depth(), self.hdr.depth()) {
            backend.copy_texture_to_texture(
                source.texture,
                destination.texture,
                self.hdr.width(),
                self.hdr.height(),
            );
        }
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_bind_group(self.gbuffer_bind_group);
        backend.destroy_bind_group(self.lights_bind_group);
        backend.destroy_bind_group_layout(self.gbuffer_layout);
        backend.destroy_bind_group_layout(self.lights_layout);
        backend.destroy_render_pipeline(self.pipeline);
        self.camera.destroy(backend);
        self.hdr.destroy(backend);
    }
}

fn create_gbuffer_bind_group<B: GraphicsBackend>(
    backend: &mut B,
    layout: BindGroupLayoutHandle,
    gbuffer: &GBufferPass,
) -> BackendResult<BindGroupHandle> {
    let entries: Vec<(u32, BindGroupEntry)> = gbuffer
        .framebuffer()
        .colors()
        .iter()
        .enumerate()
        .map(|(binding, target)| (binding as u32, BindGroupEntry::Texture(target.view)))
        .collect();
    backend.create_bind_group(layout, &entries)
}

fn lighting_shader() -> String {
    let body = DEFERRED_LIGHTING_SHADER
        .replace("MAX_POINT_LIGHTS", &LightsUniform::MAX_POINT_LIGHTS.to_string())
        .replace("MAX_SPOT_LIGHTS", &LightsUniform::MAX_SPOT_LIGHTS.to_string());
    format!("{}{}", FULLSCREEN_VERTEX_WGSL, body)
}

/// Deferred PBR shading; light array lengths are substituted at pipeline creation
pub const DEFERRED_LIGHTING_SHADER: &str = r#"
const PI: f32 = 3.14159265359;

struct DirectionalLight {
    direction: vec4<f32>,
    color_intensity: vec4<f32>,
}

struct PointLight {
    // xyz = position, w = radius
    position_radius: vec4<f32>,
    // xyz = color, w = intensity
    color_intensity: vec4<f32>,
}

struct SpotLight {
    position_radius: vec4<f32>,
    direction: vec4<f32>,
    color_intensity: vec4<f32>,
    // x = cos(inner), y = cos(outer)
    cutoffs: vec4<f32>,
}

struct Lights {
    directional: DirectionalLight,
    // x = point count, y = spot count
    counts: vec4<u32>,
    point_lights: array<PointLight, MAX_POINT_LIGHTS>,
    spot_lights: array<SpotLight, MAX_SPOT_LIGHTS>,
}

struct Camera {
    position: vec4<f32>,
}

// G-buffer textures
@group(0) @binding(0) var gbuffer_position: texture_2d<f32>;
@group(0) @binding(1) var gbuffer_normal: texture_2d<f32>;
@group(0) @binding(2) var gbuffer_emissive: texture_2d<f32>;
@group(0) @binding(3) var gbuffer_albedo: texture_2d<f32>;

@group(1) @binding(0) var<uniform> lights: Lights;
@group(1) @binding(1) var<uniform> camera: Camera;

fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / max(PI * d * d, 0.0001);
}

fn geometry_schlick_ggx(n_dot_x: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = (r * r) / 8.0;
    return n_dot_x / (n_dot_x * (1.0 - k) + k);
}

fn fresnel_schlick(cos_theta: f32, f0: vec3<f32>) -> vec3<f32> {
    return f0 + (1.0 - f0) * pow(clamp(1.0 - cos_theta, 0.0, 1.0), 5.0);
}

// Windowed inverse-square falloff reaching zero at the radius
fn distance_attenuation(distance: f32, radius: f32) -> f32 {
    let ratio = distance / max(radius, 0.0001);
    let window = clamp(1.0 - ratio * ratio * ratio * ratio, 0.0, 1.0);
    return window * window / (distance * distance + 1.0);
}

fn brdf(
    n: vec3<f32>,
    v: vec3<f32>,
    l: vec3<f32>,
    albedo: vec3<f32>,
    metallic: f32,
    roughness: f32,
    radiance: vec3<f32>,
) -> vec3<f32> {
    let h = normalize(v + l);
    let n_dot_v = max(dot(n, v), 0.0001);
    let n_dot_l = max(dot(n, l), 0.0);
    let f0 = mix(vec3<f32>(0.04), albedo, metallic);

    let d = distribution_ggx(max(dot(n, h), 0.0), roughness);
    let g = geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness);
    let f = fresnel_schlick(max(dot(h, v), 0.0), f0);

    let specular = d * g * f / max(4.0 * n_dot_v * n_dot_l, 0.0001);
    let k_d = (vec3<f32>(1.0) - f) * (1.0 - metallic);
    return (k_d * albedo / PI + specular) * radiance * n_dot_l;
}

@fragment
fn fs_main(input: FullscreenOutput) -> @location(0) vec4<f32> {
    let pixel = vec2<i32>(input.position.xy);

    let position_metallic = textureLoad(gbuffer_position, pixel, 0);
    let normal_roughness = textureLoad(gbuffer_normal, pixel, 0);
    let emissive_ao = textureLoad(gbuffer_emissive, pixel, 0);
    let albedo = textureLoad(gbuffer_albedo, pixel, 0).rgb;

    // Background: nothing wrote a normal here
    if length(normal_roughness.xyz) < 0.5 {
        discard;
    }

    let world_position = position_metallic.xyz;
    let metallic = clamp(position_metallic.w, 0.0, 1.0);
    let roughness = clamp(normal_roughness.w, 0.04, 1.0);
    let n = normalize(normal_roughness.xyz);
    let v = normalize(camera.position.xyz - world_position);

    var color = vec3<f32>(0.0);

    let sun = lights.directional;
    color += brdf(n, v, -normalize(sun.direction.xyz), albedo, metallic, roughness,
        sun.color_intensity.rgb * sun.color_intensity.w);

    let point_count = min(lights.counts.x, MAX_POINT_LIGHTSu);
    for (var i = 0u; i < point_count; i++) {
        let light = lights.point_lights[i];
        let to_light = light.position_radius.xyz - world_position;
        let distance = length(to_light);
        if distance >= light.position_radius.w {
            continue;
        }
        let radiance = light.color_intensity.rgb * light.color_intensity.w
            * distance_attenuation(distance, light.position_radius.w);
        color += brdf(n, v, to_light / max(distance, 0.0001), albedo, metallic, roughness, radiance);
    }

    let spot_count = min(lights.counts.y, MAX_SPOT_LIGHTSu);
    for (var i = 0u; i < spot_count; i++) {
        let light = lights.spot_lights[i];
        let to_light = light.position_radius.xyz - world_position;
        let distance = length(to_light);
        if distance >= light.position_radius.w {
            continue;
        }
        let l = to_light / max(distance, 0.0001);
        let cos_angle = dot(-l, normalize(light.direction.xyz));
        let cone = smoothstep(light.cutoffs.y, light.cutoffs.x, cos_angle);
        let radiance = light.color_intensity.rgb * light.color_intensity.w
            * distance_attenuation(distance, light.position_radius.w) * cone;
        color += brdf(n, v, l, albedo, metallic, roughness, radiance);
    }

    let ambient = vec3<f32>(0.03) * albedo * emissive_ao.a;
    color += ambient + emissive_ao.rgb;

    return vec4<f32>(color, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn light_array_lengths_are_substituted() {
        let shader = lighting_shader();
        assert!(shader.contains("array<PointLight, 256>"));
        assert!(shader.contains("array<SpotLight, 256>"));
        assert!(shader.contains("min(lights.counts.x, 256u)"));
        assert!(!shader.contains("MAX_POINT_LIGHTS"));
    }
}
