//! Texture upload and the path-keyed texture cache

use crate::assets::{ImageData, ImageLoader, TextureKind};
use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// GPU texture with its default view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuTexture {
    pub handle: TextureHandle,
    pub view: TextureViewHandle,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl GpuTexture {
    /// Create and upload a 2D texture
    pub fn create<B: GraphicsBackend>(
        backend: &mut B,
        label: &str,
        image: &ImageData,
        format: TextureFormat,
    ) -> BackendResult<Self> {
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(label.to_string()),
            width: image.width,
            height: image.height,
            format,
            ..Default::default()
        })?;

        let view = backend.create_texture_view(handle, TextureViewDimension::D2)?;
        backend.write_texture(handle, 0, &image.pixels, image.width, image.height);

        Ok(Self {
            handle,
            view,
            width: image.width,
            height: image.height,
            format,
        })
    }

    /// Create a cubemap from six faces in +X, -X, +Y, -Y, +Z, -Z order
    ///
    /// All faces must share the dimensions of the first one.
    pub fn create_cube<B: GraphicsBackend>(
        backend: &mut B,
        label: &str,
        faces: &[ImageData; 6],
    ) -> BackendResult<Self> {
        let (width, height) = (faces[0].width, faces[0].height);
        if faces.iter().any(|f| f.width != width || f.height != height) {
            return Err(BackendError::TextureCreationFailed(format!(
                "Cubemap '{}' faces differ in size",
                label
            )));
        }

        let format = TextureFormat::Rgba8UnormSrgb;
        let handle = backend.create_texture(&TextureDescriptor {
            label: Some(label.to_string()),
            width,
            height,
            layers: 6,
            format,
            ..Default::default()
        })?;

        for (layer, face) in faces.iter().enumerate() {
            backend.write_texture(handle, layer as u32, &face.pixels, width, height);
        }

        let view = backend.create_texture_view(handle, TextureViewDimension::Cube)?;

        Ok(Self {
            handle,
            view,
            width,
            height,
            format,
        })
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_texture_view(self.view);
        backend.destroy_texture(self.handle);
    }
}

fn format_for(kind: TextureKind) -> TextureFormat {
    if kind.is_srgb() {
        TextureFormat::Rgba8UnormSrgb
    } else {
        TextureFormat::Rgba8Unorm
    }
}

/// Content-addressed texture cache with per-slot fallbacks
///
/// Textures are keyed by path and color space. A path that cannot be loaded
/// resolves to the placeholder for its [`TextureKind`]; the failure is not
/// cached so a later request retries the file.
pub struct TextureCache {
    textures: HashMap<(PathBuf, TextureFormat), GpuTexture>,
    // Indexed by `TextureKind as usize`
    defaults: Vec<GpuTexture>,
}

impl TextureCache {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> BackendResult<Self> {
        let mut defaults = Vec::with_capacity(TextureKind::ALL.len());
        for kind in TextureKind::ALL {
            let image = ImageData::solid_color(1, 1, kind.default_pixel());
            let texture =
                GpuTexture::create(backend, &format!("default {:?}", kind), &image, format_for(kind))?;
            defaults.push(texture);
        }

        Ok(Self {
            textures: HashMap::new(),
            defaults,
        })
    }

    /// Placeholder texture for a material slot
    pub fn default_texture(&self, kind: TextureKind) -> GpuTexture {
        self.defaults[kind as usize]
    }

    pub fn get(&self, path: &Path, kind: TextureKind) -> Option<GpuTexture> {
        self.textures
            .get(&(path.to_path_buf(), format_for(kind)))
            .copied()
    }

    /// Return the cached texture for `path`, loading it on first use
    pub fn get_or_load<B: GraphicsBackend, L: ImageLoader + ?Sized>(
        &mut self,
        backend: &mut B,
        loader: &L,
        path: &Path,
        kind: TextureKind,
    ) -> BackendResult<GpuTexture> {
        let format = format_for(kind);
        let key = (path.to_path_buf(), format);
        if let Some(texture) = self.textures.get(&key) {
            return Ok(*texture);
        }

        let image = match loader.load_image(path) {
            Ok(image) if image.is_valid() => image,
            Ok(_) => {
                log::warn!("Texture {:?} decoded to an empty image, using default {:?}", path, kind);
                return Ok(self.default_texture(kind));
            }
            Err(e) => {
                log::warn!("Failed to load texture {:?} ({}), using default {:?}", path, e, kind);
                return Ok(self.default_texture(kind));
            }
        };

        let texture = GpuTexture::create(backend, &path.to_string_lossy(), &image, format)?;
        log::debug!("Cached texture {:?} ({}x{})", path, texture.width, texture.height);
        self.textures.insert(key, texture);
        Ok(texture)
    }

    /// Number of loaded (non-placeholder) textures
    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        for texture in self.textures.into_values().chain(self.defaults) {
            texture.destroy(backend);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetError;
    use crate::backend::dummy::DummyBackend;
    use std::cell::Cell;

    struct CountingImages {
        loads: Cell<usize>,
    }

    impl ImageLoader for CountingImages {
        fn load_image(&self, path: &Path) -> Result<ImageData, AssetError> {
            self.loads.set(self.loads.get() + 1);
            if path.ends_with("missing.png") {
                return Err(AssetError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "missing",
                )));
            }
            Ok(ImageData::solid_color(2, 2, [10, 20, 30, 255]))
        }
    }

    #[test]
    fn textures_are_loaded_once_per_path() {
        let mut backend = DummyBackend::new(8, 8);
        let mut cache = TextureCache::new(&mut backend).unwrap();
        let loader = CountingImages { loads: Cell::new(0) };

        let a = cache
            .get_or_load(&mut backend, &loader, Path::new("wood.png"), TextureKind::Albedo)
            .unwrap();
        let b = cache
            .get_or_load(&mut backend, &loader, Path::new("wood.png"), TextureKind::Albedo)
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(loader.loads.get(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(a.format, TextureFormat::Rgba8UnormSrgb);
    }

    #[test]
    fn missing_texture_falls_back_to_default() {
        let mut backend = DummyBackend::new(8, 8);
        let mut cache = TextureCache::new(&mut backend).unwrap();
        let loader = CountingImages { loads: Cell::new(0) };

        let normal = cache
            .get_or_load(&mut backend, &loader, Path::new("missing.png"), TextureKind::Normal)
            .unwrap();

        assert_eq!(normal, cache.default_texture(TextureKind::Normal));
        assert!(cache.is_empty());
    }

    #[test]
    fn cube_faces_must_match() {
        let mut backend = DummyBackend::new(8, 8);
        let mut faces: [ImageData; 6] =
            std::array::from_fn(|_| ImageData::solid_color(4, 4, [0, 0, 0, 255]));
        let cube = GpuTexture::create_cube(&mut backend, "sky", &faces).unwrap();
        assert_eq!(backend.texture_descriptor(cube.handle).unwrap().layers, 6);

        faces[3] = ImageData::solid_color(2, 2, [0, 0, 0, 255]);
        assert!(GpuTexture::create_cube(&mut backend, "sky", &faces).is_err());
    }
}
