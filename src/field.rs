//! Element types that can be stored in a spatial field.

use core::ops::{Add, Mul, Sub};

use glam::{Vec2, Vec3};

/// Grid axis, used to pick the velocity component normal to a wall.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Trait for values stored in a [`Grid2D`](crate::grid::Grid2D).
///
/// Abstracts over scalar densities, 2D velocities and RGB densities so that
/// diffusion, advection and interpolation are written once.
pub trait FieldValue:
    Copy
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f32, Output = Self>
    + PartialEq
    + Default
    + core::fmt::Debug
{
    /// The additive identity.
    fn zero() -> Self;

    /// Euclidean magnitude, used for diagnostics and tests.
    fn magnitude(self) -> f32;

    /// Negates the component along `axis`. Values without such a component
    /// (scalars) are returned unchanged.
    fn negate_axis(self, _axis: Axis) -> Self {
        self
    }

    /// Scale by a scalar.
    fn scale(self, s: f32) -> Self {
        self * s
    }

    /// Linear interpolation between self and other.
    fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self).scale(t)
    }
}

impl FieldValue for f32 {
    fn zero() -> Self { 0.0 }
    fn magnitude(self) -> f32 { self.abs() }
}

impl FieldValue for Vec2 {
    fn zero() -> Self { Vec2::ZERO }
    fn magnitude(self) -> f32 { self.length() }
    fn negate_axis(self, axis: Axis) -> Self {
        match axis {
            Axis::X => Vec2::new(-self.x, self.y),
            Axis::Y => Vec2::new(self.x, -self.y),
        }
    }
}

/// In-plane components are treated as a velocity; z is left untouched.
impl FieldValue for Vec3 {
    fn zero() -> Self { Vec3::ZERO }
    fn magnitude(self) -> f32 { self.length() }
    fn negate_axis(self, axis: Axis) -> Self {
        match axis {
            Axis::X => Vec3::new(-self.x, self.y, self.z),
            Axis::Y => Vec3::new(self.x, -self.y, self.z),
        }
    }
}
