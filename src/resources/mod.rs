//! GPU resource wrappers
//!
//! Buffers, textures, framebuffers, materials and meshes. Each wrapper owns
//! its backend handles and releases them through an explicit `destroy`.

mod buffer;
mod framebuffer;
mod material;
mod mesh;
mod model;
mod texture;

pub use buffer::*;
pub use framebuffer::*;
pub use material::*;
pub use mesh::*;
pub use model::*;
pub use texture::*;
