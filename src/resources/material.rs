//! PBR material texture sets

use crate::assets::{ImageLoader, TextureKind, TexturePaths};
use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::bindings;
use crate::resources::texture::{GpuTexture, TextureCache};

/// Layout shared by every material bind group: one texture per
/// [`TextureKind`] followed by a repeating sampler
pub fn material_layout_entries() -> Vec<BindGroupLayoutEntry> {
    let mut entries: Vec<BindGroupLayoutEntry> = TextureKind::ALL
        .iter()
        .map(|&kind| BindGroupLayoutEntry {
            binding: bindings::material_texture(kind),
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::texture_2d(),
        })
        .collect();
    entries.push(BindGroupLayoutEntry {
        binding: bindings::MATERIAL_SAMPLER,
        visibility: ShaderStageFlags::FRAGMENT,
        ty: BindingType::Sampler { filtering: true },
    });
    entries
}

/// Bind group layout and sampler used to build material bind groups
#[derive(Debug, Clone, Copy)]
pub struct MaterialLayout {
    pub layout: BindGroupLayoutHandle,
    pub sampler: SamplerHandle,
}

impl MaterialLayout {
    pub fn new<B: GraphicsBackend>(backend: &mut B) -> BackendResult<Self> {
        let layout = backend.create_bind_group_layout(&material_layout_entries())?;
        let sampler = backend.create_sampler(&SamplerDescriptor::repeating("Material Sampler"))?;
        Ok(Self { layout, sampler })
    }

    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_bind_group_layout(self.layout);
        backend.destroy_sampler(self.sampler);
    }
}

/// Resolved textures of one mesh, bound as a single bind group
#[derive(Debug, Clone, Copy)]
pub struct Material {
    // Indexed by `TextureKind as usize`
    textures: [GpuTexture; 6],
    bind_group: BindGroupHandle,
}

impl Material {
    /// Resolve every slot through the cache, falling back to placeholders
    pub fn create<B: GraphicsBackend, L: ImageLoader + ?Sized>(
        backend: &mut B,
        layout: &MaterialLayout,
        cache: &mut TextureCache,
        loader: &L,
        paths: &TexturePaths,
    ) -> BackendResult<Self> {
        let mut textures = TextureKind::ALL.map(|kind| cache.default_texture(kind));
        for (kind, path) in paths {
            textures[*kind as usize] = cache.get_or_load(backend, loader, path, *kind)?;
        }

        let mut entries: Vec<(u32, BindGroupEntry)> = TextureKind::ALL
            .iter()
            .map(|&kind| {
                (
                    bindings::material_texture(kind),
                    BindGroupEntry::Texture(textures[kind as usize].view),
                )
            })
            .collect();
        entries.push((bindings::MATERIAL_SAMPLER, BindGroupEntry::Sampler(layout.sampler)));

        let bind_group = backend.create_bind_group(layout.layout, &entries)?;
        Ok(Self {
            textures,
            bind_group,
        })
    }

    pub fn texture(&self, kind: TextureKind) -> &GpuTexture {
        &self.textures[kind as usize]
    }

    pub fn bind_group(&self) -> BindGroupHandle {
        self.bind_group
    }

    /// Textures belong to the cache; only the bind group is released
    pub fn destroy<B: GraphicsBackend>(self, backend: &mut B) {
        backend.destroy_bind_group(self.bind_group);
    }
}
