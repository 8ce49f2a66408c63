//! Multi-mesh models and the drawable variants managed by the renderer

use crate::backend::traits::GraphicsBackend;
use crate::resources::mesh::GpuMesh;

/// A model imported from a file, one GPU mesh per sub-mesh
#[derive(Debug, Default)]
pub struct Model {
    pub meshes: Vec<GpuMesh>,
}

impl Model {
    pub fn new(meshes: Vec<GpuMesh>) -> Self {
        Self { meshes }
    }

    pub fn draw_instanced<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        instance_count: u32,
        material_group: Option<u32>,
    ) {
        for mesh in &self.meshes {
            mesh.draw_instanced(backend, instance_count, material_group);
        }
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        for mesh in self.meshes {
            mesh.destroy(backend);
        }
    }
}

/// GPU-resident drawable
#[derive(Debug)]
pub enum Renderable {
    Mesh(GpuMesh),
    Model(Model),
}

impl Renderable {
    pub fn draw<B: GraphicsBackend>(&self, backend: &mut B, material_group: Option<u32>) {
        self.draw_instanced(backend, 1, material_group);
    }

    pub fn draw_instanced<B: GraphicsBackend>(
        &self,
        backend: &mut B,
        instance_count: u32,
        material_group: Option<u32>,
    ) {
        match self {
            Renderable::Mesh(mesh) => mesh.draw_instanced(backend, instance_count, material_group),
            Renderable::Model(model) => {
                model.draw_instanced(backend, instance_count, material_group)
            }
        }
    }

    pub fn mesh_count(&self) -> usize {
        match self {
            Renderable::Mesh(_) => 1,
            Renderable::Model(model) => model.meshes.len(),
        }
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        match self {
            Renderable::Mesh(mesh) => mesh.destroy(backend),
            Renderable::Model(model) => model.destroy(backend),
        }
    }
}
