//! Shared fixtures for the headless renderer tests.
//!
//! Every test drives a [`Renderer`] over the recording [`DummyBackend`] with a
//! [`CountingLoader`] standing in for the file system.

#![allow(dead_code)]

use std::cell::Cell;
use std::path::Path;
use std::rc::Rc;

use glam::{Mat4, Vec2, Vec3};
use pbr_renderer::assets::{AssetError, ImageData, ImageLoader, MeshData, ModelData, ModelLoader};
use pbr_renderer::backend::dummy::DummyBackend;
use pbr_renderer::resources::Mesh;
use pbr_renderer::{Renderer, RendererConfig, RenderableId, TexturePaths};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

/// Loader double that counts every call and serves a single triangle
#[derive(Clone, Default)]
pub struct CountingLoader {
    pub model_loads: Rc<Cell<usize>>,
    pub image_loads: Rc<Cell<usize>>,
}

impl ImageLoader for CountingLoader {
    fn load_image(&self, _path: &Path) -> Result<ImageData, AssetError> {
        self.image_loads.set(self.image_loads.get() + 1);
        Ok(ImageData::solid_color(2, 2, [255, 255, 255, 255]))
    }
}

impl ModelLoader for CountingLoader {
    fn load_model(&self, _path: &Path) -> Result<ModelData, AssetError> {
        self.model_loads.set(self.model_loads.get() + 1);
        Ok(ModelData {
            meshes: vec![MeshData::from_attributes(
                vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                vec![Vec2::ZERO, Vec2::X, Vec2::Y],
                vec![],
                vec![],
                vec![0, 1, 2],
            )],
        })
    }
}

pub fn renderer() -> Renderer<DummyBackend> {
    renderer_with(CountingLoader::default(), RendererConfig::default())
}

pub fn renderer_with(loader: CountingLoader, config: RendererConfig) -> Renderer<DummyBackend> {
    Renderer::with_loader(DummyBackend::new(WIDTH, HEIGHT), config, Box::new(loader)).unwrap()
}

pub fn create_cube(renderer: &mut Renderer<DummyBackend>) -> RenderableId {
    let cube = Mesh::cube();
    renderer
        .create_renderable(&cube.vertices, &cube.indices, &TexturePaths::new())
        .unwrap()
}

pub fn cube_index_count() -> u32 {
    Mesh::cube().indices.len() as u32
}

/// Read `count` matrices back from a shadow buffer
pub fn read_matrices(bytes: &[u8], count: usize) -> Vec<Mat4> {
    let stride = std::mem::size_of::<Mat4>();
    (0..count)
        .map(|i| bytemuck::pod_read_unaligned(&bytes[i * stride..(i + 1) * stride]))
        .collect()
}
