//! Post-processing: tonemapping to the swapchain and exposure measurement

pub mod auto_exposure;
pub mod tonemapping;

pub use auto_exposure::AutoExposurePass;
pub use tonemapping::{ExposureSettings, TonemapOperator, TonemappingPass};
