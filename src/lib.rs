//! PBR Renderer - A deferred physically based renderer
//!
//! The renderer draws opaque geometry into a G-buffer, shades it with a
//! Cook-Torrance lighting pass into an HDR target and tonemaps the result to
//! the swapchain with automatic exposure.
//!
//! # Features
//! - Handle-based [`GraphicsBackend`](backend::traits::GraphicsBackend) with a wgpu implementation
//! - Directional, point and spot lights with stable ids
//! - Per-frame draw batching and instancing
//! - Skybox, colored forward pass, Reinhard/ACES tonemapping
//! - Headless recording backend for tests

pub mod assets;
pub mod backend;
pub mod engine;
pub mod pipeline;
pub mod renderer;
pub mod resources;
pub mod scene;
pub mod window;

pub use assets::{AssetError, AssetLoader, FsAssetLoader, ImageLoader, ModelLoader, TextureKind, TexturePaths};
pub use engine::{Application, Engine};
pub use pipeline::postprocess::TonemapOperator;
pub use renderer::{ClearFlags, LightId, RenderError, RenderResult, Renderer, RenderableId};
pub use scene::{Camera, CameraMovement, DirectionalLight, PointLight, SpotLight};
pub use window::{Key, KeyAction, Window, WinitWindow};

// Re-export wgpu backend for direct access
pub use backend::wgpu_backend::WgpuBackend;

use std::path::PathBuf;

/// Configuration for the renderer
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Capacity of the point light pool (at most 256)
    pub max_point_lights: usize,
    /// Capacity of the spot light pool (at most 256)
    pub max_spot_lights: usize,
    /// Manual exposure multiplier
    pub exposure: f32,
    /// Scale exposure by the measured scene luminance
    pub auto_exposure: bool,
    pub tonemap_operator: TonemapOperator,
    pub clear_color: [f32; 4],
    /// Cubemap faces in +X, -X, +Y, -Y, +Z, -Z order; a procedural sky is used when unset
    pub skybox_faces: Option<[PathBuf; 6]>,
    /// Lower bound of the luminance histogram (log2)
    pub min_log_luminance: f32,
    /// Upper bound of the luminance histogram (log2)
    pub max_log_luminance: f32,
    /// How fast the measured luminance follows the scene
    pub exposure_adaptation_rate: f32,
    /// Middle-grey target for auto exposure
    pub exposure_key: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_point_lights: 256,
            max_spot_lights: 256,
            exposure: 1.0,
            auto_exposure: true,
            tonemap_operator: TonemapOperator::Aces,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            skybox_faces: None,
            min_log_luminance: -8.0,
            max_log_luminance: 3.5,
            exposure_adaptation_rate: 1.1,
            exposure_key: 0.18,
        }
    }
}

/// Configuration for initializing the engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Window title
    pub title: String,
    /// Initial window width
    pub width: u32,
    /// Initial window height
    pub height: u32,
    /// Enable vsync
    pub vsync: bool,
    pub renderer: RendererConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            title: "PBR Renderer".to_string(),
            width: 1280,
            height: 720,
            vsync: true,
            renderer: RendererConfig::default(),
        }
    }
}
