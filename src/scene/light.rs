//! Light types and their GPU layouts

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

/// Directional light (like the sun)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            direction: Vec3::new(-0.5, -1.0, -0.5).normalize(),
            color: Vec3::ONE,
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    pub fn new(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            direction: direction.normalize_or_zero(),
            color,
            intensity,
        }
    }

    pub fn to_gpu_data(&self) -> DirectionalLightGpu {
        DirectionalLightGpu {
            direction: self.direction.normalize_or_zero().extend(0.0),
            color_intensity: self.color.extend(self.intensity),
        }
    }
}

/// Omnidirectional light with a finite influence radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 10.0,
        }
    }
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            position,
            color,
            intensity,
            radius,
        }
    }

    pub fn to_gpu_data(&self) -> PointLightGpu {
        PointLightGpu {
            position_radius: self.position.extend(self.radius),
            color_intensity: self.color.extend(self.intensity),
        }
    }
}

/// Cone light; cutoffs are half-angles in radians
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
    pub inner_cutoff: f32,
    pub outer_cutoff: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            direction: -Vec3::Y,
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 10.0,
            inner_cutoff: 12.5_f32.to_radians(),
            outer_cutoff: 17.5_f32.to_radians(),
        }
    }
}

impl SpotLight {
    pub fn new(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        radius: f32,
        inner_cutoff: f32,
        outer_cutoff: f32,
    ) -> Self {
        Self {
            position,
            direction: direction.normalize_or_zero(),
            color,
            intensity,
            radius,
            inner_cutoff,
            outer_cutoff,
        }
    }

    pub fn to_gpu_data(&self) -> SpotLightGpu {
        SpotLightGpu {
            position_radius: self.position.extend(self.radius),
            direction: self.direction.normalize_or_zero().extend(0.0),
            color_intensity: self.color.extend(self.intensity),
            cutoffs: Vec4::new(self.inner_cutoff.cos(), self.outer_cutoff.cos(), 0.0, 0.0),
        }
    }
}

/// xyz = direction, w unused; color xyz with intensity in w
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct DirectionalLightGpu {
    pub direction: Vec4,
    pub color_intensity: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct PointLightGpu {
    /// xyz = position, w = radius
    pub position_radius: Vec4,
    /// xyz = color, w = intensity
    pub color_intensity: Vec4,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SpotLightGpu {
    pub position_radius: Vec4,
    pub direction: Vec4,
    pub color_intensity: Vec4,
    /// x = cos(inner), y = cos(outer)
    pub cutoffs: Vec4,
}

/// Leading block of the lights uniform
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct LightsHeader {
    pub directional: DirectionalLightGpu,
    /// x = point light count, y = spot light count
    pub counts: [u32; 4],
}

/// Byte layout of the lights uniform block
///
/// ```text
/// offset 0                    LightsHeader
/// POINT_LIGHTS_OFFSET         array<PointLightGpu, MAX_POINT_LIGHTS>
/// SPOT_LIGHTS_OFFSET          array<SpotLightGpu, MAX_SPOT_LIGHTS>
/// ```
///
/// Only the header and the live prefix of each array are written per frame.
pub struct LightsUniform;

impl LightsUniform {
    pub const MAX_POINT_LIGHTS: usize = 256;
    pub const MAX_SPOT_LIGHTS: usize = 256;

    pub const POINT_LIGHTS_OFFSET: u64 = std::mem::size_of::<LightsHeader>() as u64;
    pub const SPOT_LIGHTS_OFFSET: u64 = Self::POINT_LIGHTS_OFFSET
        + (Self::MAX_POINT_LIGHTS * std::mem::size_of::<PointLightGpu>()) as u64;
    pub const SIZE: u64 =
        Self::SPOT_LIGHTS_OFFSET + (Self::MAX_SPOT_LIGHTS * std::mem::size_of::<SpotLightGpu>()) as u64;
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn gpu_layout_is_std140_compatible() {
        assert_eq!(std::mem::size_of::<LightsHeader>(), 48);
        assert_eq!(std::mem::size_of::<PointLightGpu>(), 32);
        assert_eq!(std::mem::size_of::<SpotLightGpu>(), 64);
        assert_eq!(LightsUniform::POINT_LIGHTS_OFFSET % 16, 0);
        assert_eq!(LightsUniform::SPOT_LIGHTS_OFFSET % 16, 0);
        assert_eq!(LightsUniform::SIZE, 48 + 256 * 32 + 256 * 64);
    }

    #[test]
    fn spot_cutoffs_are_stored_as_cosines() {
        let spot = SpotLight::new(Vec3::ZERO, Vec3::NEG_Y * 3.0, Vec3::ONE, 2.0, 5.0, 0.0, 1.0);
        let gpu = spot.to_gpu_data();
        assert_relative_eq!(gpu.cutoffs.x, 1.0);
        assert_relative_eq!(gpu.cutoffs.y, 1.0_f32.cos());
        assert_relative_eq!(gpu.direction.y, -1.0);
        assert_relative_eq!(gpu.position_radius.w, 5.0);
    }
}
