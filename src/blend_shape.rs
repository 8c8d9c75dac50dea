//! Blend shapes: a base mesh deformed by a weighted sum of pose offsets.

use glam::Vec3;

use crate::error::{SimError, SimResult};

/// A base mesh and a set of target poses sharing its vertex order.
///
/// Each target is stored as its offset from the base, so evaluation is
/// `base + Σ weight_k * (pose_k - base)`. Weights are kept in `[0, 1]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BlendShape {
    base: Vec<Vec3>,
    offsets: Vec<Vec<Vec3>>,
    weights: Vec<f32>,
}

impl BlendShape {
    /// A blend shape with no targets yet; it evaluates to `base`.
    pub fn new(base: Vec<Vec3>) -> Self {
        BlendShape { base, offsets: Vec::new(), weights: Vec::new() }
    }

    /// Build from a base and every target pose at once.
    pub fn from_poses(base: Vec<Vec3>, poses: &[Vec<Vec3>]) -> SimResult<Self> {
        let mut shape = Self::new(base);
        for pose in poses {
            shape.add_target(pose)?;
        }
        Ok(shape)
    }

    /// Store `pose` as a new target with weight 0 and return its index.
    pub fn add_target(&mut self, pose: &[Vec3]) -> SimResult<usize> {
        if pose.len() != self.base.len() {
            return Err(SimError::LengthMismatch {
                name: "blend shape target",
                expected: self.base.len(),
                actual: pose.len(),
            });
        }
        self.offsets.push(pose.iter().zip(&self.base).map(|(p, b)| *p - *b).collect());
        self.weights.push(0.0);
        Ok(self.offsets.len() - 1)
    }

    pub fn vertex_count(&self) -> usize { self.base.len() }
    pub fn target_count(&self) -> usize { self.offsets.len() }
    pub fn base(&self) -> &[Vec3] { &self.base }
    pub fn weights(&self) -> &[f32] { &self.weights }

    /// Offsets of target `target` from the base.
    pub fn offsets(&self, target: usize) -> Option<&[Vec3]> {
        self.offsets.get(target).map(Vec::as_slice)
    }

    /// Set one weight, clamped to `[0, 1]`.
    pub fn set_weight(&mut self, target: usize, weight: f32) -> SimResult<()> {
        let count = self.weights.len();
        let slot = self.weights.get_mut(target).ok_or(SimError::IndexOutOfBounds { index: target, count })?;
        if !weight.is_finite() {
            return Err(SimError::InvalidParameter { name: "blend weight", value: weight });
        }
        *slot = weight.clamp(0.0, 1.0);
        Ok(())
    }

    /// Set every weight at once, e.g. from a slider panel.
    pub fn set_weights(&mut self, weights: &[f32]) -> SimResult<()> {
        if weights.len() != self.weights.len() {
            return Err(SimError::LengthMismatch {
                name: "blend weights",
                expected: self.weights.len(),
                actual: weights.len(),
            });
        }
        if let Some(&bad) = weights.iter().find(|w| !w.is_finite()) {
            return Err(SimError::InvalidParameter { name: "blend weight", value: bad });
        }
        for (slot, w) in self.weights.iter_mut().zip(weights) {
            *slot = w.clamp(0.0, 1.0);
        }
        Ok(())
    }

    pub fn reset_weights(&mut self) {
        self.weights.iter_mut().for_each(|w| *w = 0.0);
    }

    /// Deformed positions for the current weights.
    pub fn evaluate(&self) -> Vec<Vec3> {
        let mut out = self.base.clone();
        self.accumulate(&mut out);
        out
    }

    /// Write the deformed positions into an existing buffer.
    pub fn evaluate_into(&self, out: &mut [Vec3]) -> SimResult<()> {
        if out.len() != self.base.len() {
            return Err(SimError::LengthMismatch {
                name: "blend shape output",
                expected: self.base.len(),
                actual: out.len(),
            });
        }
        out.copy_from_slice(&self.base);
        self.accumulate(out);
        Ok(())
    }

    fn accumulate(&self, out: &mut [Vec3]) {
        for (offsets, &weight) in self.offsets.iter().zip(&self.weights) {
            if weight <= 0.0 {
                continue;
            }
            for (p, d) in out.iter_mut().zip(offsets) {
                *p += *d * weight;
            }
        }
    }
}

/// Area-weighted vertex normals of a triangle mesh.
///
/// Vertices not used by any triangle get a zero normal.
pub fn vertex_normals(positions: &[Vec3], triangles: &[[usize; 3]]) -> SimResult<Vec<Vec3>> {
    let count = positions.len();
    let mut normals = vec![Vec3::ZERO; count];
    for &[a, b, c] in triangles {
        if let Some(&index) = [a, b, c].iter().find(|&&k| k >= count) {
            return Err(SimError::IndexOutOfBounds { index, count });
        }
        let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += n;
        normals[b] += n;
        normals[c] += n;
    }
    for n in normals.iter_mut() {
        *n = n.normalize_or_zero();
    }
    Ok(normals)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad() -> Vec<Vec3> {
        vec![Vec3::ZERO, Vec3::X, Vec3::new(1.0, 1.0, 0.0), Vec3::Y]
    }

    #[test]
    fn zero_weights_give_the_base() {
        let lifted: Vec<Vec3> = quad().iter().map(|p| *p + Vec3::Z).collect();
        let shape = BlendShape::from_poses(quad(), &[lifted]).unwrap();
        assert_eq!(shape.evaluate(), quad());
    }

    #[test]
    fn full_weight_reaches_the_target() {
        let mut pose = quad();
        pose[2].z = 0.5;
        let mut shape = BlendShape::from_poses(quad(), &[pose.clone()]).unwrap();
        shape.set_weight(0, 1.0).unwrap();
        assert_eq!(shape.evaluate(), pose);
    }

    #[test]
    fn targets_add_up() {
        let mut smile = quad();
        smile[0].z = 1.0;
        let mut frown = quad();
        frown[0].x = -2.0;
        let mut shape = BlendShape::from_poses(quad(), &[smile, frown]).unwrap();
        shape.set_weights(&[0.5, 0.25]).unwrap();
        let out = shape.evaluate();
        assert!((out[0] - Vec3::new(-0.5, 0.0, 0.5)).length() < 1e-6, "{}", out[0]);
        assert_eq!(out[1], Vec3::X);
    }

    #[test]
    fn weights_are_clamped_and_checked() {
        let mut shape = BlendShape::from_poses(quad(), &[quad()]).unwrap();
        shape.set_weight(0, 3.0).unwrap();
        assert_eq!(shape.weights(), &[1.0]);
        assert_eq!(shape.set_weight(1, 0.5), Err(SimError::IndexOutOfBounds { index: 1, count: 1 }));
        assert!(shape.set_weight(0, f32::NAN).is_err());
        assert!(shape.set_weights(&[0.1, 0.2]).is_err());
        shape.reset_weights();
        assert_eq!(shape.weights(), &[0.0]);
    }

    #[test]
    fn target_size_must_match_base() {
        let mut shape = BlendShape::new(quad());
        assert_eq!(
            shape.add_target(&[Vec3::ZERO]),
            Err(SimError::LengthMismatch { name: "blend shape target", expected: 4, actual: 1 })
        );
        let mut out = vec![Vec3::ZERO; 3];
        assert!(shape.evaluate_into(&mut out).is_err());
    }

    #[test]
    fn flat_quad_normals_point_up() {
        let normals = vertex_normals(&quad(), &[[0, 1, 2], [0, 2, 3]]).unwrap();
        for n in normals {
            assert!((n - Vec3::Z).length() < 1e-6);
        }
        assert!(vertex_normals(&quad(), &[[0, 1, 7]]).is_err());
    }
}
