//! Local transform for scene nodes.
//!
//! A transform holds local translation, rotation, and scale. Hierarchy
//! lives in the scene arena; composition through the parent chain is
//! [`Scene::world_matrix`](crate::Scene::world_matrix).

use glam::{Mat4, Quat, Vec3};

/// Position, rotation, and scale relative to the parent node.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    /// Position in local space.
    pub position: Vec3,
    /// Rotation as a quaternion.
    pub rotation: Quat,
    /// Scale factor.
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
    /// Create an identity transform.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transform with the given position.
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Create a transform with the given rotation.
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Create a transform with the given scale.
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// The local transformation matrix, not accounting for any parent.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    fn approx_eq_vec3(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < EPSILON
    }

    #[test]
    fn test_transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
        assert_eq!(t.scale, Vec3::ONE);
        assert_eq!(t.local_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn test_transform_builder() {
        let t = Transform::new()
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_scale(Vec3::splat(2.0));

        assert_eq!(t.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(t.scale, Vec3::splat(2.0));
    }

    #[test]
    fn test_local_matrix_translates() {
        let t = Transform::new().with_position(Vec3::new(5.0, 0.0, -1.0));
        let p = t.local_matrix().transform_point3(Vec3::ZERO);
        assert!(approx_eq_vec3(p, Vec3::new(5.0, 0.0, -1.0)));
    }

    #[test]
    fn test_local_matrix_rotates() {
        let t =
            Transform::new().with_rotation(Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        let p = t.local_matrix().transform_point3(Vec3::X);
        assert!(approx_eq_vec3(p, Vec3::Y));
    }

    #[test]
    fn test_local_matrix_scales() {
        let t = Transform::new().with_scale(Vec3::splat(3.0));
        let p = t.local_matrix().transform_point3(Vec3::ONE);
        assert!(approx_eq_vec3(p, Vec3::splat(3.0)));
    }
}
