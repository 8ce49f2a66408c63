//! File-system asset loader backed by `image` and `tobj`

use super::{AssetError, ImageData, ImageLoader, MeshData, ModelData, ModelLoader, TextureKind};
use glam::{Vec2, Vec3};
use image::GenericImageView;
use std::path::Path;

/// Loads images with the `image` crate and OBJ/MTL models with `tobj`
#[derive(Debug, Default, Clone, Copy)]
pub struct FsAssetLoader;

impl FsAssetLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ImageLoader for FsAssetLoader {
    fn load_image(&self, path: &Path) -> Result<ImageData, AssetError> {
        log::debug!("Loading image from: {:?}", path);

        let img = image::open(path)?;
        let channel_count = img.color().channel_count();
        let (width, height) = img.dimensions();

        Ok(ImageData {
            pixels: img.to_rgba8().into_raw(),
            width,
            height,
            channel_count,
        })
    }
}

impl ModelLoader for FsAssetLoader {
    fn load_model(&self, path: &Path) -> Result<ModelData, AssetError> {
        log::debug!("Loading model from: {:?}", path);

        let (models, materials) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)?;
        let materials = materials.unwrap_or_else(|e| {
            log::warn!("Failed to load materials for {:?}: {}", path, e);
            Vec::new()
        });
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

        let meshes: Vec<MeshData> = models
            .into_iter()
            .filter(|model| !model.mesh.indices.is_empty())
            .map(|model| {
                let mesh = model.mesh;
                let positions = mesh
                    .positions
                    .chunks_exact(3)
                    .map(|p| Vec3::new(p[0], p[1], p[2]))
                    .collect();
                let normals = mesh
                    .normals
                    .chunks_exact(3)
                    .map(|n| Vec3::new(n[0], n[1], n[2]))
                    .collect();
                // OBJ texture space has v pointing up
                let uvs = mesh
                    .texcoords
                    .chunks_exact(2)
                    .map(|t| Vec2::new(t[0], 1.0 - t[1]))
                    .collect();

                let mut data =
                    MeshData::from_attributes(positions, uvs, normals, Vec::new(), mesh.indices);

                if let Some(material) = mesh.material_id.and_then(|id| materials.get(id)) {
                    let slots = [
                        (TextureKind::Albedo, material.diffuse_texture.as_deref()),
                        (TextureKind::Normal, material.normal_texture.as_deref()),
                        (
                            TextureKind::AmbientOcclusion,
                            material.ambient_texture.as_deref(),
                        ),
                        (
                            TextureKind::Roughness,
                            material.unknown_param.get("map_Pr").map(String::as_str),
                        ),
                        (
                            TextureKind::Metallic,
                            material.unknown_param.get("map_Pm").map(String::as_str),
                        ),
                        (
                            TextureKind::Emissive,
                            material.unknown_param.get("map_Ke").map(String::as_str),
                        ),
                    ];
                    for (kind, file) in slots {
                        if let Some(file) = file.filter(|f| !f.is_empty()) {
                            data.texture_paths.insert(kind, base_dir.join(file));
                        }
                    }
                }

                data
            })
            .collect();

        if meshes.is_empty() {
            return Err(AssetError::EmptyModel(path.to_path_buf()));
        }

        log::info!("Loaded model {:?} with {} mesh(es)", path, meshes.len());
        Ok(ModelData { meshes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("pbr_renderer_fs_loader_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_obj_with_material_textures() {
        write_temp(
            "quad.mtl",
            "newmtl stone\nmap_Kd stone_albedo.png\nmap_Bump stone_normal.png\nmap_Pr stone_rough.png\n",
        );
        let obj = write_temp(
            "quad.obj",
            "mtllib quad.mtl\n\
             v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\n\
             vt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\n\
             usemtl stone\n\
             f 1/1 2/2 3/3 4/4\n",
        );

        let model = FsAssetLoader::new().load_model(&obj).unwrap();
        assert_eq!(model.meshes.len(), 1);

        let mesh = &model.meshes[0];
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.positions.len(), mesh.uvs.len());
        assert_eq!(
            mesh.texture_paths.get(&TextureKind::Albedo),
            Some(&obj.parent().unwrap().join("stone_albedo.png"))
        );
        assert!(mesh.texture_paths.contains_key(&TextureKind::Normal));
        assert!(mesh.texture_paths.contains_key(&TextureKind::Roughness));
        assert!(!mesh.texture_paths.contains_key(&TextureKind::Emissive));
    }

    #[test]
    fn missing_files_are_errors() {
        let loader = FsAssetLoader::new();
        assert!(loader.load_model(Path::new("/nonexistent/model.obj")).is_err());
        assert!(loader.load_image(Path::new("/nonexistent/image.png")).is_err());
    }
}
