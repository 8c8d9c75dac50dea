//! Unit dual quaternions for rigid-transform blending.

use core::ops::{Add, Mul};

use glam::{Quat, Vec3};

use crate::transform::RigidTransform;

/// `real + ε dual`. A unit dual quaternion encodes a rigid transform with
/// `real` the rotation and `dual = ½ (0, t) real`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DualQuat {
    pub real: Quat,
    pub dual: Quat,
}

const ZERO_QUAT: Quat = Quat::from_xyzw(0.0, 0.0, 0.0, 0.0);

impl DualQuat {
    pub const ZERO: Self = DualQuat { real: ZERO_QUAT, dual: ZERO_QUAT };
    pub const IDENTITY: Self = DualQuat { real: Quat::IDENTITY, dual: ZERO_QUAT };

    pub fn from_rigid(t: &RigidTransform) -> Self {
        let real = t.rotation.normalize();
        let pure = Quat::from_xyzw(t.translation.x, t.translation.y, t.translation.z, 0.0);
        DualQuat { real, dual: (pure * real) * 0.5 }
    }

    /// Rescale to unit length and remove the component of `dual` along
    /// `real`. A zero dual quaternion normalizes to the identity.
    pub fn normalize(&self) -> Self {
        let len = self.real.length();
        if len < 1e-8 {
            return Self::IDENTITY;
        }
        let real = self.real * (1.0 / len);
        let dual = self.dual * (1.0 / len);
        DualQuat { real, dual: dual - real * real.dot(dual) }
    }

    pub fn rotation(&self) -> Quat {
        self.real
    }

    pub fn translation(&self) -> Vec3 {
        let t = (self.dual * 2.0) * self.real.conjugate();
        Vec3::new(t.x, t.y, t.z)
    }

    pub fn to_rigid(&self) -> RigidTransform {
        RigidTransform::new(self.real, self.translation())
    }

    /// Requires a normalized dual quaternion.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.real * p + self.translation()
    }

    pub fn transform_vector(&self, v: Vec3) -> Vec3 {
        self.real * v
    }

    /// Weighted sum of `items`, each flipped onto the hemisphere of the
    /// first one, then normalized.
    pub fn blend(items: impl IntoIterator<Item = (DualQuat, f32)>) -> Self {
        let mut pivot: Option<Quat> = None;
        let mut sum = Self::ZERO;
        for (dq, w) in items {
            let pivot = *pivot.get_or_insert(dq.real);
            let w = if pivot.dot(dq.real) < 0.0 { -w } else { w };
            sum = sum + dq * w;
        }
        sum.normalize()
    }
}

impl Add for DualQuat {
    type Output = DualQuat;
    fn add(self, rhs: DualQuat) -> DualQuat {
        DualQuat { real: self.real + rhs.real, dual: self.dual + rhs.dual }
    }
}

impl Mul<f32> for DualQuat {
    type Output = DualQuat;
    fn mul(self, s: f32) -> DualQuat {
        DualQuat { real: self.real * s, dual: self.dual * s }
    }
}
