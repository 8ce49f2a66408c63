//! Ownership of GPU-resident drawables

use super::{RenderError, RenderResult};
use crate::assets::{AssetError, AssetLoader, ModelLoader, TexturePaths};
use crate::backend::traits::*;
use crate::backend::types::Vertex;
use crate::resources::{GpuMesh, Material, MaterialLayout, Model, Renderable, TextureCache};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// Id of a renderable owned by a [`RenderableManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderableId(pub u32);

/// Owns every renderable, the texture cache and the asset loader
///
/// Model files are memoized by path: loading the same path twice returns the
/// first id without touching the loader or the GPU.
pub struct RenderableManager {
    renderables: BTreeMap<RenderableId, Renderable>,
    model_paths: HashMap<PathBuf, RenderableId>,
    textures: TextureCache,
    material_layout: MaterialLayout,
    loader: Box<dyn AssetLoader>,
}

impl RenderableManager {
    pub fn new<B: GraphicsBackend>(backend: &mut B, loader: Box<dyn AssetLoader>) -> BackendResult<Self> {
        Ok(Self {
            renderables: BTreeMap::new(),
            model_paths: HashMap::new(),
            textures: TextureCache::new(backend)?,
            material_layout: MaterialLayout::new(backend)?,
            loader,
        })
    }

    pub fn material_layout(&self) -> &MaterialLayout {
        &self.material_layout
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    pub fn loader(&self) -> &dyn AssetLoader {
        self.loader.as_ref()
    }

    // One past the highest live id; gaps left by removals are not refilled
    fn next_id(&self) -> RenderableId {
        self.renderables
            .keys()
            .next_back()
            .map_or(RenderableId(0), |id| RenderableId(id.0 + 1))
    }

    fn create_mesh<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        label: &str,
        vertices: &[Vertex],
        indices: &[u32],
        texture_paths: &TexturePaths,
    ) -> BackendResult<GpuMesh> {
        let material = Material::create(
            backend,
            &self.material_layout,
            &mut self.textures,
            self.loader.as_ref(),
            texture_paths,
        )?;
        GpuMesh::create(backend, label, vertices, indices, Some(material))
    }

    /// Upload raw geometry as a new renderable
    pub fn create_renderable<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        vertices: &[Vertex],
        indices: &[u32],
        texture_paths: &TexturePaths,
    ) -> RenderResult<RenderableId> {
        let id = self.next_id();
        let mesh = self.create_mesh(
            backend,
            &format!("renderable {}", id.0),
            vertices,
            indices,
            texture_paths,
        )?;
        self.renderables.insert(id, Renderable::Mesh(mesh));
        log::debug!("Created renderable {:?}", id);
        Ok(id)
    }

    /// Load a model file, or return the id it was loaded under before
    pub fn create_renderable_from_model<B: GraphicsBackend>(
        &mut self,
        backend: &mut B,
        path: impl AsRef<Path>,
    ) -> RenderResult<RenderableId> {
        let path = path.as_ref();
        if let Some(&id) = self.model_paths.get(path) {
            return Ok(id);
        }

        let model_data = self.loader.load_model(path)?;
        if model_data.meshes.iter().all(|mesh| mesh.indices.is_empty()) {
            return Err(AssetError::EmptyModel(path.to_path_buf()).into());
        }

        let mut meshes = Vec::with_capacity(model_data.meshes.len());
        for (i, mesh_data) in model_data.meshes.iter().enumerate() {
            if mesh_data.indices.is_empty() {
                continue;
            }
            let label = format!("{} [{}]", path.display(), i);
            match self.create_mesh(
                backend,
                &label,
                &mesh_data.to_vertices(),
                &mesh_data.indices,
                &mesh_data.texture_paths,
            ) {
                Ok(mesh) => meshes.push(mesh),
                Err(e) => {
                    Model::new(meshes).destroy(backend);
                    return Err(e.into());
                }
            }
        }

        let id = self.next_id();
        log::info!("Loaded model {:?} as {:?} ({} meshes)", path, id, meshes.len());
        self.renderables.insert(id, Renderable::Model(Model::new(meshes)));
        self.model_paths.insert(path.to_path_buf(), id);
        Ok(id)
    }

    pub fn get_renderable(&self, id: RenderableId) -> RenderResult<&Renderable> {
        self.renderables
            .get(&id)
            .ok_or(RenderError::RenderableNotFound(id))
    }

    /// Release a renderable's GPU buffers; unknown ids are ignored
    pub fn remove_renderable<B: GraphicsBackend>(&mut self, backend: &mut B, id: RenderableId) {
        let Some(renderable) = self.renderables.remove(&id) else {
            return;
        };
        renderable.destroy(backend);
        self.model_paths.retain(|_, memo| *memo != id);
        log::debug!("Removed renderable {:?}", id);
    }

    pub fn contains(&self, id: RenderableId) -> bool {
        self.renderables.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.renderables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.renderables.is_empty()
    }

    /// Live ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = RenderableId> + '_ {
        self.renderables.keys().copied()
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        for renderable in self.renderables.into_values() {
            renderable.destroy(backend);
        }
        self.textures.destroy(backend);
        self.material_layout.destroy(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{ImageData, ImageLoader, MeshData, ModelData};
    use crate::backend::dummy::DummyBackend;
    use crate::resources::Mesh;
    use glam::{Vec2, Vec3};

    struct EmptyLoader;

    impl ImageLoader for EmptyLoader {
        fn load_image(&self, path: &Path) -> Result<ImageData, AssetError> {
            Err(AssetError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                path.display().to_string(),
            )))
        }
    }

    impl ModelLoader for EmptyLoader {
        fn load_model(&self, path: &Path) -> Result<ModelData, AssetError> {
            if path.ends_with("empty.obj") {
                return Ok(ModelData::default());
            }
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

    fn manager(backend: &mut DummyBackend) -> RenderableManager {
        RenderableManager::new(backend, Box::new(EmptyLoader)).unwrap()
    }

    #[test]
    fn ids_grow_from_the_highest_live_id() {
        let mut backend = DummyBackend::new(8, 8);
        let mut manager = manager(&mut backend);
        let cube = Mesh::cube();
        let create = |manager: &mut RenderableManager, backend: &mut DummyBackend| {
            manager
                .create_renderable(backend, &cube.vertices, &cube.indices, &TexturePaths::new())
                .unwrap()
        };

        let a = create(&mut manager, &mut backend);
        let b = create(&mut manager, &mut backend);
        let c = create(&mut manager, &mut backend);
        assert_eq!((a, b, c), (RenderableId(0), RenderableId(1), RenderableId(2)));

        manager.remove_renderable(&mut backend, c);
        assert_eq!(create(&mut manager, &mut backend), RenderableId(2));

        // A gap below the maximum stays unused
        manager.remove_renderable(&mut backend, a);
        assert_eq!(create(&mut manager, &mut backend), RenderableId(3));
        assert_eq!(manager.ids().collect::<Vec<_>>(), vec![
            RenderableId(1),
            RenderableId(2),
            RenderableId(3)
        ]);
    }

    #[test]
    fn unknown_lookup_is_an_error() {
        let mut backend = DummyBackend::new(8, 8);
        let manager = manager(&mut backend);
        assert!(matches!(
            manager.get_renderable(RenderableId(7)),
            Err(RenderError::RenderableNotFound(RenderableId(7)))
        ));
    }

    #[test]
    fn empty_model_is_rejected() {
        let mut backend = DummyBackend::new(8, 8);
        let mut manager = manager(&mut backend);
        let result = manager.create_renderable_from_model(&mut backend, "empty.obj");
        assert!(matches!(result, Err(RenderError::Asset(AssetError::EmptyModel(_)))));
        assert!(manager.is_empty());
    }

    #[test]
    fn removing_a_model_forgets_its_path() {
        let mut backend = DummyBackend::new(8, 8);
        let mut manager = manager(&mut backend);
        let first = manager.create_renderable_from_model(&mut backend, "tri.obj").unwrap();
        manager.remove_renderable(&mut backend, first);
        manager.remove_renderable(&mut backend, first);
        assert!(!manager.contains(first));

        let second = manager.create_renderable_from_model(&mut backend, "tri.obj").unwrap();
        assert!(manager.contains(second));
        assert_eq!(manager.len(), 1);
    }
}
