//! Transform component for registry entities.
//!
//! ```
//! use sable_scene::Transform;
//! use glam::Vec3;
//!
//! let t = Transform::from_position(Vec3::new(1.0, 0.0, 0.0)).with_scale(Vec3::splat(2.0));
//! let p = t.matrix().transform_point3(Vec3::X);
//! assert!((p - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-5);
//! ```

use glam::{Mat4, Quat, Vec3};

/// Position, rotation and scale of an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Model matrix: scale, then rotate, then translate.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Inverse transpose of the model matrix, or identity when the model
    /// matrix is singular (zero scale).
    pub fn normal_matrix(&self) -> Mat4 {
        const EPSILON: f32 = 1e-6;
        let model = self.matrix();
        if model.determinant().abs() < EPSILON {
            Mat4::IDENTITY
        } else {
            model.inverse().transpose()
        }
    }

    /// Rotate by `angle` radians around `axis`.
    pub fn rotate(&mut self, axis: Vec3, angle: f32) {
        if let Some(axis) = axis.try_normalize() {
            self.rotation = (Quat::from_axis_angle(axis, angle) * self.rotation).normalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_transform_default() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_matrix_applies_scale_before_translation() {
        let t = Transform::from_position(Vec3::new(0.0, 1.0, 0.0)).with_scale(Vec3::splat(3.0));
        let p = t.matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::new(3.0, 1.0, 0.0)).length() < EPSILON);
    }

    #[test]
    fn test_normal_matrix_with_scale() {
        let t = Transform::default().with_scale(Vec3::new(1.0, 2.0, 1.0));
        assert_eq!(t.normal_matrix(), t.matrix().inverse().transpose());
    }

    #[test]
    fn test_normal_matrix_zero_scale() {
        let t = Transform::default().with_scale(Vec3::ZERO);
        assert_eq!(t.normal_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_rotate_ignores_zero_axis() {
        let mut t = Transform::default();
        t.rotate(Vec3::ZERO, 1.0);
        assert_eq!(t.rotation, Quat::IDENTITY);

        t.rotate(Vec3::Y, std::f32::consts::FRAC_PI_2);
        let p = t.matrix().transform_point3(Vec3::X);
        assert!((p - Vec3::NEG_Z).length() < EPSILON);
    }
}
