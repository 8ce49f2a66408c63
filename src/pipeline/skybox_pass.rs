//! Skybox pass
//!
//! Draws a unit cube around the camera with the translation stripped from
//! the view matrix. The vertex stage pushes every fragment to the far plane,
//! so with a `LessEqual` test the cube only shows where nothing wrote depth.

use crate::assets::{ImageData, ImageLoader};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::{FrameBuffer, GpuMesh, GpuTexture, Mesh, UniformBuffer};
use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4};
use std::path::PathBuf;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SkyboxUniform {
    /// Rotation-only view
    pub view: Mat4,
    pub projection: Mat4,
}

/// Face colors used when no cubemap images are configured (+X, -X, +Y, -Y, +Z, -Z)
const PROCEDURAL_FACES: [[u8; 4]; 6] = [
    [132, 168, 214, 255],
    [132, 168, 214, 255],
    [86, 132, 204, 255],
    [48, 46, 44, 255],
    [132, 168, 214, 255],
    [132, 168, 214, 255],
];

pub struct SkyboxPass {
    pipeline: RenderPipelineHandle,
    layout: BindGroupLayoutHandle,
    bind_group: BindGroupHandle,
    sampler: SamplerHandle,
    uniform: UniformBuffer<SkyboxUniform>,
    cube: GpuMesh,
    cubemap: GpuTexture,
}

impl SkyboxPass {
    pub const LABEL: &'static str = "Skybox Pass";

    pub fn new<B: GraphicsBackend, L: ImageLoader + ?Sized>(
        backend: &mut B,
        loader: &L,
        faces: Option<&[PathBuf; 6]>,
        target_format: TextureFormat,
    ) -> BackendResult<Self> {
        let images = faces
            .and_then(|paths| load_faces(loader, paths))
            .unwrap_or_else(procedural_faces);
        let cubemap = GpuTexture::create_cube(backend, "Skybox Cubemap", &images)?;

        let sampler = backend.create_sampler(&SamplerDescriptor {
            label: Some("Skybox Sampler".into()),
            ..Default::default()
        })?;

        let layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::VERTEX,
                ty: BindingType::UniformBuffer,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::texture_cube(),
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler { filtering: true },
            },
        ])?;

        let uniform = UniformBuffer::new(
            backend,
            "Skybox Uniform",
            &SkyboxUniform {
                view: Mat4::IDENTITY,
                projection: Mat4::IDENTITY,
            },
        )?;

        let bind_group = backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::buffer(uniform.handle())),
                (1, BindGroupEntry::Texture(cubemap.view)),
                (2, BindGroupEntry::Sampler(sampler)),
            ],
        )?;

        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Skybox Pipeline".into()),
            shader: SKYBOX_SHADER.to_string(),
            vertex_entry: "vs_main".into(),
            fragment_entry: Some("fs_main".into()),
            vertex_layouts: vec![Vertex::position_only_layout()],
            bind_group_layouts: vec![layout],
            front_face: FrontFace::Cw,
            cull_mode: CullMode::Front,
            depth_stencil: Some(DepthStencilState {
                format: TextureFormat::Depth32Float,
                depth_write_enabled: false,
                depth_compare: CompareFunction::LessEqual,
            }),
            color_targets: vec![target_format],
        })?;

        let cube = GpuMesh::from_mesh(backend, &Mesh::cube(), None)?;

        Ok(Self {
            pipeline,
            layout,
            bind_group,
            sampler,
            uniform,
            cube,
            cubemap,
        })
    }

    pub fn cubemap(&self) -> &GpuTexture {
        &self.cubemap
    }

    pub fn execute<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        target: &FrameBuffer,
        view: Mat4,
        projection: Mat4,
    ) {
        self.uniform.update(
            backend,
            &SkyboxUniform {
                view: Mat4::from_mat3(Mat3::from_mat4(view)),
                projection,
            },
        );

        backend.begin_render_pass(&target.load_pass(Self::LABEL));
        backend.set_viewport(
            0.0,
            0.0,
            target.width() as f32,
            target.height() as f32,
            0.0,
            1.0,
        );
        backend.set_render_pipeline(self.pipeline);
        backend.set_bind_group(0, self.bind_group);
        self.cube.draw(backend, None);
        backend.end_render_pass();
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_bind_group(self.bind_group);
        backend.destroy_bind_group_layout(self.layout);
        backend.destroy_sampler(self.sampler);
        backend.destroy_render_pipeline(self.pipeline);
        self.uniform.destroy(backend);
        self.cube.destroy(backend);
        self.cubemap.destroy(backend);
    }
}

fn load_faces<L: ImageLoader + ?Sized>(loader: &L, paths: &[PathBuf; 6]) -> Option<[ImageData; 6]> {
    let mut images = Vec::with_capacity(6);
    for path in paths {
        match loader.load_image(path) {
            Ok(image) if image.is_valid() => images.push(image),
            Ok(_) => {
                log::warn!("Skybox face {:?} is empty, using procedural sky", path);
                return None;
            }
            Err(e) => {
                log::warn!("Failed to load skybox face {:?}: {}, using procedural sky", path, e);
                return None;
            }
        }
    }

    let (width, height) = (images[0].width, images[0].height);
    if images.iter().any(|image| image.width != width || image.height != height) {
        log::warn!("Skybox faces differ in size, using procedural sky");
        return None;
    }

    images.try_into().ok()
}

fn procedural_faces() -> [ImageData; 6] {
    PROCEDURAL_FACES.map(|color| ImageData::solid_color(1, 1, color))
}

pub const SKYBOX_SHADER: &str = r#"
struct Skybox {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> skybox: Skybox;
@group(0) @binding(1) var skybox_texture: texture_cube<f32>;
@group(0) @binding(2) var skybox_sampler: sampler;

struct SkyboxOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) direction: vec3<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> SkyboxOutput {
    let clip = skybox.projection * skybox.view * vec4<f32>(position, 1.0);

    var output: SkyboxOutput;
    // z = w puts the cube on the far plane
    output.clip_position = clip.xyww;
    output.direction = position;
    return output;
}

@fragment
fn fs_main(input: SkyboxOutput) -> @location(0) vec4<f32> {
    return vec4<f32>(textureSample(skybox_texture, skybox_sampler, input.direction).rgb, 1.0);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetError;
    use crate::backend::dummy::DummyBackend;
    use std::path::Path;

    struct SizedLoader(u32);

    impl ImageLoader for SizedLoader {
        fn load_image(&self, path: &Path) -> Result<ImageData, AssetError> {
            if path.ends_with("missing.png") {
                return Err(AssetError::Io(std::io::Error::from(std::io::ErrorKind::NotFound)));
            }
            Ok(ImageData::solid_color(self.0, self.0, [255; 4]))
        }
    }

    fn faces(last: &str) -> [PathBuf; 6] {
        ["px.png", "nx.png", "py.png", "ny.png", "pz.png", last].map(PathBuf::from)
    }

    #[test]
    fn configured_faces_are_uploaded() {
        let mut backend = DummyBackend::new(16, 16);
        let pass = SkyboxPass::new(
            &mut backend,
            &SizedLoader(4),
            Some(&faces("nz.png")),
            TextureFormat::Rgba16Float,
        )
        .unwrap();
        assert_eq!(pass.cubemap().width, 4);
        let desc = backend.texture_descriptor(pass.cubemap().handle).unwrap();
        assert_eq!(desc.layers, 6);
    }

    #[test]
    fn missing_face_falls_back_to_procedural_sky() {
        let mut backend = DummyBackend::new(16, 16);
        let pass = SkyboxPass::new(
            &mut backend,
            &SizedLoader(4),
            Some(&faces("missing.png")),
            TextureFormat::Rgba16Float,
        )
        .unwrap();
        assert_eq!(pass.cubemap().width, 1);
    }
}
