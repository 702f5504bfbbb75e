//! Cameras shared by every render pipeline.
//!
//! [`Camera`] holds view and projection state. [`FirstPersonCamera`] drives
//! one from movement and look input, integrated once per frame in
//! [`FirstPersonCamera::update`].

use glam::{Mat4, Vec2, Vec3};

/// Pitch is kept just short of straight up or down to keep `look_at` stable.
const MAX_PITCH_DEGREES: f32 = 89.0;

/// Perspective camera looking down -Z at zero yaw and pitch.
#[derive(Clone, Debug)]
pub struct Camera {
    /// Camera position in world space
    pub position: Vec3,
    /// Rotation about +Y, in degrees
    pub yaw: f32,
    /// Rotation about the camera's right axis, in degrees
    pub pitch: f32,
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            yaw: 0.0,
            pitch: 0.0,
            fov_y: 45.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn new(aspect: f32) -> Self {
        Self {
            aspect,
            ..Self::default()
        }
    }

    /// Update the aspect ratio. Non-positive or non-finite values are ignored
    /// (a minimized window reports a zero height).
    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }

    pub fn forward(&self) -> Vec3 {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        Vec3::new(-yaw.sin() * pitch.cos(), pitch.sin(), -yaw.cos() * pitch.cos()).normalize()
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    /// Projection matrix with the Y axis flipped for Vulkan clip space.
    pub fn projection_matrix(&self) -> Mat4 {
        let mut proj = Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far);
        proj.y_axis.y *= -1.0;
        proj
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

/// Fly camera: WASD-style movement plus mouse look.
///
/// Input is accumulated between frames; `update` applies it scaled by the
/// frame delta and clears the look delta.
#[derive(Clone, Debug)]
pub struct FirstPersonCamera {
    camera: Camera,
    /// Units per second
    move_speed: f32,
    /// Degrees per second per unit of look input
    rotation_speed: f32,
    /// x = right, y = up, z = forward; each in [-1, 1]
    movement: Vec3,
    look: Vec2,
}

impl FirstPersonCamera {
    pub fn new(aspect: f32, move_speed: f32, rotation_speed: f32) -> Self {
        Self {
            camera: Camera::new(aspect),
            move_speed,
            rotation_speed,
            movement: Vec3::ZERO,
            look: Vec2::ZERO,
        }
    }

    /// Movement intent for following frames. Components are clamped to [-1, 1].
    pub fn set_movement(&mut self, movement: Vec3) {
        self.movement = movement.clamp(Vec3::NEG_ONE, Vec3::ONE);
    }

    /// Add look input (x = yaw, y = pitch) consumed by the next `update`.
    pub fn add_look(&mut self, delta: Vec2) {
        self.look += delta;
    }

    /// Advance by `delta_time` seconds.
    pub fn update(&mut self, delta_time: f32) {
        if !delta_time.is_finite() || delta_time <= 0.0 {
            return;
        }

        let turn = self.look * self.rotation_speed * delta_time;
        self.camera.yaw = (self.camera.yaw + turn.x).rem_euclid(360.0);
        self.camera.pitch =
            (self.camera.pitch + turn.y).clamp(-MAX_PITCH_DEGREES, MAX_PITCH_DEGREES);
        self.look = Vec2::ZERO;

        let direction = self.camera.right() * self.movement.x
            + Vec3::Y * self.movement.y
            + self.camera.forward() * self.movement.z;
        if direction.length_squared() > 0.0 {
            self.camera.position += direction.normalize() * self.move_speed * delta_time;
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.camera.set_aspect(aspect);
    }

    pub fn move_speed(&self) -> f32 {
        self.move_speed
    }

    pub fn rotation_speed(&self) -> f32 {
        self.rotation_speed
    }

    pub fn view_matrix(&self) -> Mat4 {
        self.camera.view_matrix()
    }

    pub fn projection_matrix(&self) -> Mat4 {
        self.camera.projection_matrix()
    }

    pub fn view_projection_matrix(&self) -> Mat4 {
        self.camera.view_projection_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-4;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < EPSILON
    }

    #[test]
    fn test_default_looks_down_negative_z() {
        let camera = Camera::default();
        assert!(approx_eq_vec3(camera.forward(), Vec3::NEG_Z));
        assert!(approx_eq_vec3(camera.right(), Vec3::X));
        assert!(approx_eq_vec3(camera.up(), Vec3::Y));
    }

    #[test]
    fn test_projection_flips_y() {
        let camera = Camera::default();
        let unflipped = Mat4::perspective_rh(camera.fov_y, camera.aspect, camera.near, camera.far);
        assert_eq!(camera.projection_matrix().y_axis.y, -unflipped.y_axis.y);
    }

    #[test]
    fn test_set_aspect_ignores_degenerate() {
        let mut camera = Camera::new(1.5);
        camera.set_aspect(0.0);
        camera.set_aspect(f32::NAN);
        assert_eq!(camera.aspect, 1.5);
        camera.set_aspect(2.0);
        assert_eq!(camera.aspect, 2.0);
    }

    #[test]
    fn test_forward_movement_scales_with_delta() {
        let mut fps = FirstPersonCamera::new(1.0, 10.0, 40.0);
        let start = fps.camera().position;

        fps.set_movement(Vec3::Z);
        fps.update(0.5);

        assert!(approx_eq_vec3(fps.camera().position, start + Vec3::new(0.0, 0.0, -5.0)));
    }

    #[test]
    fn test_diagonal_movement_is_normalized() {
        let mut fps = FirstPersonCamera::new(1.0, 10.0, 40.0);
        let start = fps.camera().position;

        fps.set_movement(Vec3::new(1.0, 0.0, 1.0));
        fps.update(1.0);

        let travelled = (fps.camera().position - start).length();
        assert!((travelled - 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_look_is_consumed_and_pitch_clamped() {
        let mut fps = FirstPersonCamera::new(1.0, 10.0, 40.0);

        fps.add_look(Vec2::new(0.0, 100.0));
        fps.update(1.0);
        assert_eq!(fps.camera().pitch, MAX_PITCH_DEGREES);

        let pitch = fps.camera().pitch;
        fps.update(1.0);
        assert_eq!(fps.camera().pitch, pitch);
    }

    #[test]
    fn test_yaw_wraps() {
        let mut fps = FirstPersonCamera::new(1.0, 10.0, 40.0);
        fps.add_look(Vec2::new(10.0, 0.0));
        fps.update(1.0);
        assert!((fps.camera().yaw - 40.0).abs() < EPSILON);
    }

    #[test]
    fn test_update_ignores_invalid_delta() {
        let mut fps = FirstPersonCamera::new(1.0, 10.0, 40.0);
        let start = fps.camera().position;
        fps.set_movement(Vec3::Z);
        fps.update(0.0);
        fps.update(f32::NAN);
        assert_eq!(fps.camera().position, start);
    }
}
