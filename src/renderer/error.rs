use crate::assets::AssetError;
use crate::backend::traits::BackendError;
use crate::renderer::RenderableId;
use thiserror::Error;

/// Renderer errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Asset(#[from] AssetError),
    #[error("Renderable {0:?} not found")]
    RenderableNotFound(RenderableId),
}

pub type RenderResult<T> = Result<T, RenderError>;
