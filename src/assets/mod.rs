//! Asset loading collaborators
//!
//! The renderer consumes images and models only through [`ImageLoader`] and
//! [`ModelLoader`]. [`FsAssetLoader`] reads them from disk; tests substitute
//! their own implementations.

mod fs_loader;

pub use fs_loader::FsAssetLoader;

use crate::backend::types::Vertex;
use crate::resources::{generate_normals, generate_tangents};
use glam::{Vec2, Vec3, Vec4};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("Failed to parse model: {0}")]
    Model(#[from] tobj::LoadError),
    #[error("Model {0} contains no geometry")]
    EmptyModel(PathBuf),
}

/// Material texture slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextureKind {
    Albedo,
    Normal,
    Metallic,
    Roughness,
    AmbientOcclusion,
    Emissive,
}

impl TextureKind {
    pub const ALL: [TextureKind; 6] = [
        TextureKind::Albedo,
        TextureKind::Normal,
        TextureKind::Metallic,
        TextureKind::Roughness,
        TextureKind::AmbientOcclusion,
        TextureKind::Emissive,
    ];

    /// Color textures are stored in sRGB, data textures are linear
    pub fn is_srgb(&self) -> bool {
        matches!(self, TextureKind::Albedo | TextureKind::Emissive)
    }

    /// Placeholder pixel used when no texture is provided for this slot
    pub fn default_pixel(&self) -> [u8; 4] {
        match self {
            TextureKind::Albedo | TextureKind::Roughness | TextureKind::AmbientOcclusion => {
                [255, 255, 255, 255]
            }
            // Tangent-space +Z
            TextureKind::Normal => [128, 128, 255, 255],
            TextureKind::Metallic | TextureKind::Emissive => [0, 0, 0, 255],
        }
    }
}

/// Texture file per material slot
pub type TexturePaths = HashMap<TextureKind, PathBuf>;

/// Decoded image, always expanded to RGBA8
#[derive(Debug, Clone)]
pub struct ImageData {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Channel count of the source file before expansion
    pub channel_count: u8,
}

impl ImageData {
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = (width * height) as usize;
        Self {
            pixels: color.repeat(pixel_count),
            width,
            height,
            channel_count: 4,
        }
    }

    /// True when the pixel buffer matches the dimensions
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == (self.width * self.height * 4) as usize
    }
}

/// Geometry of one mesh as produced by a model loader
///
/// `normals`, `uvs` and `tangents` are either empty or one entry per position.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
    pub normals: Vec<Vec3>,
    pub tangents: Vec<Vec4>,
    pub indices: Vec<u32>,
    pub texture_paths: TexturePaths,
}

impl MeshData {
    pub fn from_attributes(
        positions: Vec<Vec3>,
        uvs: Vec<Vec2>,
        normals: Vec<Vec3>,
        tangents: Vec<Vec4>,
        indices: Vec<u32>,
    ) -> Self {
        Self {
            positions,
            uvs,
            normals,
            tangents,
            indices,
            texture_paths: TexturePaths::new(),
        }
    }

    /// Interleave the attribute arrays, generating normals and tangents when absent
    pub fn to_vertices(&self) -> Vec<Vertex> {
        let mut vertices: Vec<Vertex> = self
            .positions
            .iter()
            .enumerate()
            .map(|(i, &position)| {
                Vertex::new(
                    position,
                    self.normals.get(i).copied().unwrap_or(Vec3::ZERO),
                    self.uvs.get(i).copied().unwrap_or(Vec2::ZERO),
                    self.tangents.get(i).copied().unwrap_or(Vec4::ZERO),
                )
            })
            .collect();

        if self.normals.len() != self.positions.len() {
            generate_normals(&mut vertices, &self.indices);
        }
        if self.tangents.len() != self.positions.len() {
            generate_tangents(&mut vertices, &self.indices);
        }

        vertices
    }
}

/// All meshes of a model file
#[derive(Debug, Clone, Default)]
pub struct ModelData {
    pub meshes: Vec<MeshData>,
}

/// Image decoding collaborator
pub trait ImageLoader {
    fn load_image(&self, path: &Path) -> Result<ImageData, AssetError>;
}

/// Model import collaborator
pub trait ModelLoader {
    fn load_model(&self, path: &Path) -> Result<ModelData, AssetError>;
}

/// Both loaders in one object, as owned by the renderable manager
pub trait AssetLoader: ImageLoader + ModelLoader {}

impl<T: ImageLoader + ModelLoader> AssetLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> MeshData {
        MeshData::from_attributes(
            vec![Vec3::ZERO, Vec3::X, Vec3::Y],
            vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            vec![],
            vec![],
            vec![0, 1, 2],
        )
    }

    #[test]
    fn solid_color_image_is_valid() {
        let img = ImageData::solid_color(4, 2, [255, 0, 0, 255]);
        assert!(img.is_valid());
        assert_eq!(&img.pixels[4..8], &[255, 0, 0, 255]);
    }

    #[test]
    fn missing_normals_and_tangents_are_generated() {
        let vertices = triangle().to_vertices();
        assert_eq!(vertices.len(), 3);
        for v in &vertices {
            assert_relative_eq!(v.normal.length(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(v.tangent.truncate().length(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(v.tangent.w.abs(), 1.0);
        }
    }

    #[test]
    fn srgb_slots() {
        assert!(TextureKind::Albedo.is_srgb());
        assert!(!TextureKind::Normal.is_srgb());
        assert_eq!(TextureKind::Normal.default_pixel(), [128, 128, 255, 255]);
    }
}
