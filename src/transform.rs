//! Rigid transforms (rotation + translation, no scale or shear).

use core::ops::Mul;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A rotation followed by a translation: `p -> rotation * p + translation`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RigidTransform {
    pub rotation: Quat,
    pub translation: Vec3,
}

impl RigidTransform {
    /// No rotation, no translation.
    pub const IDENTITY: Self = RigidTransform { rotation: Quat::IDENTITY, translation: Vec3::ZERO };

    /// Rotate by `rotation`, then translate by `translation`.
    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        RigidTransform { rotation, translation }
    }

    /// Pure translation.
    pub fn from_translation(translation: Vec3) -> Self {
        RigidTransform { rotation: Quat::IDENTITY, translation }
    }

    /// Pure rotation about the origin.
    pub fn from_rotation(rotation: Quat) -> Self {
        RigidTransform { rotation, translation: Vec3::ZERO }
    }

    /// Inverse of a rigid transform: conjugate rotation and rotated,
    /// negated translation.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.conjugate();
        RigidTransform { rotation, translation: -(rotation * self.translation) }
    }

    /// Apply rotation and translation to a position.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation * p + self.translation
    }

    /// Apply the rotation only, for directions and normals.
    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.rotation * v
    }

    /// Linear interpolation of the translation and spherical interpolation
    /// of the rotation. `alpha` of 0 returns `self`, 1 returns `other`.
    pub fn interpolate(&self, other: &Self, alpha: f32) -> Self {
        RigidTransform {
            rotation: self.rotation.slerp(other.rotation, alpha).normalize(),
            translation: self.translation.lerp(other.translation, alpha),
        }
    }

    /// Homogeneous matrix with the rotation in the upper 3x3 block.
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }

    /// Returns `None` when the matrix carries scale or shear.
    pub fn from_mat4(m: &Mat4) -> Option<Self> {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        if (scale - Vec3::ONE).abs().max_element() > 1e-3 {
            return None;
        }
        Some(RigidTransform { rotation: rotation.normalize(), translation })
    }

    /// Whether both transforms agree within `eps` on rotation (up to the
    /// quaternion double cover) and translation.
    pub fn abs_diff_eq(&self, other: &Self, eps: f32) -> bool {
        let same_rotation = self.rotation.abs_diff_eq(other.rotation, eps)
            || self.rotation.abs_diff_eq(-other.rotation, eps);
        same_rotation && self.translation.abs_diff_eq(other.translation, eps)
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Composition: `(a * b).transform_point(p) == a.transform_point(b.transform_point(p))`.
impl Mul for RigidTransform {
    type Output = RigidTransform;
    fn mul(self, rhs: RigidTransform) -> RigidTransform {
        RigidTransform {
            rotation: (self.rotation * rhs.rotation).normalize(),
            translation: self.rotation * rhs.translation + self.translation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f32::consts::FRAC_PI_2;

    #[test]
    fn inverse_undoes_transform() {
        let t = RigidTransform::new(Quat::from_rotation_z(0.7), Vec3::new(1.0, -2.0, 0.5));
        let p = Vec3::new(0.3, 0.4, -1.0);
        let back = t.inverse().transform_point(t.transform_point(p));
        assert!((back - p).length() < 1e-5);
        assert!((t * t.inverse()).abs_diff_eq(&RigidTransform::IDENTITY, 1e-5));
    }

    #[test]
    fn composition_applies_right_first() {
        let a = RigidTransform::new(Quat::from_rotation_z(FRAC_PI_2), Vec3::X);
        let b = RigidTransform::from_translation(Vec3::X);
        let p = (a * b).transform_point(Vec3::ZERO);
        assert!((p - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn interpolate_endpoints_and_midpoint() {
        let a = RigidTransform::IDENTITY;
        let b = RigidTransform::new(Quat::from_rotation_z(FRAC_PI_2), Vec3::new(2.0, 0.0, 0.0));
        assert!(a.interpolate(&b, 0.0).abs_diff_eq(&a, 1e-6));
        assert!(a.interpolate(&b, 1.0).abs_diff_eq(&b, 1e-6));
        let mid = a.interpolate(&b, 0.5);
        let expected = RigidTransform::new(Quat::from_rotation_z(FRAC_PI_2 * 0.5), Vec3::X);
        assert!(mid.abs_diff_eq(&expected, 1e-5));
    }

    #[test]
    fn matrix_round_trip() {
        let t = RigidTransform::new(Quat::from_rotation_x(0.3), Vec3::new(0.0, 1.0, 2.0));
        let back = RigidTransform::from_mat4(&t.to_mat4()).unwrap();
        assert!(back.abs_diff_eq(&t, 1e-5));
        assert!(RigidTransform::from_mat4(&Mat4::from_scale(Vec3::splat(2.0))).is_none());
    }
}
