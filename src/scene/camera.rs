//! Free-fly camera with left-handed view and projection

use glam::{Mat4, Vec2, Vec3};

/// Camera translation directions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
    Up,
    Down,
}

/// Yaw/pitch camera
///
/// Angles are in degrees. Yaw 90 looks down +Z.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    world_up: Vec3,
    yaw: f32,
    pitch: f32,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    /// World units per second
    pub translation_speed: f32,
    /// Degrees per unit of mouse movement
    pub rotation_speed: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 1.0, -5.0), 16.0 / 9.0)
    }
}

impl Camera {
    pub const PITCH_LIMIT: f32 = 89.0;

    pub fn new(position: Vec3, aspect: f32) -> Self {
        let mut camera = Self {
            position,
            forward: Vec3::Z,
            right: Vec3::X,
            up: Vec3::Y,
            world_up: Vec3::Y,
            yaw: 90.0,
            pitch: 0.0,
            fov_y_degrees: 45.0,
            aspect,
            near: 0.1,
            far: 1000.0,
            translation_speed: 5.0,
            rotation_speed: 0.1,
        };
        camera.update_vectors();
        camera
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn yaw_degrees(&self) -> f32 {
        self.yaw
    }

    pub fn pitch_degrees(&self) -> f32 {
        self.pitch
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn move_in(&mut self, direction: CameraMovement, dt: f32) {
        let step = self.translation_speed * dt;
        self.position += match direction {
            CameraMovement::Forward => self.forward * step,
            CameraMovement::Backward => -self.forward * step,
            CameraMovement::Right => self.right * step,
            CameraMovement::Left => -self.right * step,
            CameraMovement::Up => self.world_up * step,
            CameraMovement::Down => -self.world_up * step,
        };
    }

    /// Accumulate yaw and pitch, clamping pitch and wrapping yaw
    pub fn rotate(&mut self, yaw_delta: f32, pitch_delta: f32) {
        self.yaw = (self.yaw + yaw_delta).rem_euclid(360.0);
        self.pitch = (self.pitch + pitch_delta).clamp(-Self::PITCH_LIMIT, Self::PITCH_LIMIT);
        self.update_vectors();
    }

    /// Mouse look: moving right turns right, moving up looks up
    pub fn look(&mut self, mouse_delta: Vec2) {
        self.rotate(
            -mouse_delta.x * self.rotation_speed,
            -mouse_delta.y * self.rotation_speed,
        );
    }

    fn update_vectors(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        self.forward = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos())
            .normalize();
        self.right = self.world_up.cross(self.forward).normalize();
        self.up = self.forward.cross(self.right);
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_lh(self.position, self.position + self.forward, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_lh(self.fov_y_degrees.to_radians(), self.aspect, self.near, self.far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn initial_orientation_looks_down_positive_z() {
        let camera = Camera::new(Vec3::ZERO, 1.0);
        assert_relative_eq!(camera.forward().z, 1.0, epsilon = 1e-6);
        assert_relative_eq!(camera.right().x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(camera.up().y, 1.0, epsilon = 1e-6);
    }

    #[rstest]
    #[case(1000.0, 1, 89.0)]
    #[case(-1000.0, 3, -89.0)]
    #[case(20.0, 2, 40.0)]
    #[case(60.0, 2, 89.0)]
    fn pitch_is_clamped(#[case] delta: f32, #[case] steps: usize, #[case] expected: f32) {
        let mut camera = Camera::default();
        for _ in 0..steps {
            camera.rotate(0.0, delta);
        }
        assert_relative_eq!(camera.pitch_degrees(), expected);
        assert_relative_eq!(camera.forward().length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn yaw_wraps() {
        let mut camera = Camera::default();
        camera.rotate(300.0, 0.0);
        assert_relative_eq!(camera.yaw_degrees(), 30.0, epsilon = 1e-4);
        camera.rotate(-60.0, 0.0);
        assert_relative_eq!(camera.yaw_degrees(), 330.0, epsilon = 1e-4);
    }

    #[test]
    fn movement_scales_with_time() {
        let mut camera = Camera::new(Vec3::ZERO, 1.0);
        camera.translation_speed = 2.0;
        camera.move_in(CameraMovement::Forward, 0.5);
        camera.move_in(CameraMovement::Right, 1.0);
        assert_relative_eq!(camera.position.z, 1.0, epsilon = 1e-6);
        assert_relative_eq!(camera.position.x, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn view_matrix_places_forward_point_in_front() {
        let camera = Camera::new(Vec3::new(1.0, 2.0, 3.0), 1.0);
        let ahead = camera.view_matrix().transform_point3(camera.position + camera.forward() * 4.0);
        // Left-handed view space looks down +Z
        assert_relative_eq!(ahead.z, 4.0, epsilon = 1e-5);
        assert_relative_eq!(ahead.x, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn mouse_right_turns_right() {
        let mut camera = Camera::new(Vec3::ZERO, 1.0);
        camera.look(Vec2::new(100.0, 0.0));
        assert!(camera.forward().x > 0.0);
    }
}
