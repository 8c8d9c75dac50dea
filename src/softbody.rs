//! Deformable shapes driven by shape matching.

use glam::Vec3;

use crate::cloth::{DivergenceKind, DivergenceReport};
use crate::constraint::ConstraintTarget;
use crate::error::{SimError, SimResult};

/// A cloud of vertices that tries to keep the layout of its reference shape.
///
/// `position` is the state at the start of a step, `predicted` is what the
/// solver corrects during projection.
#[derive(Clone, Debug, PartialEq)]
pub struct Deformable {
    position: Vec<Vec3>,
    predicted: Vec<Vec3>,
    reference: Vec<Vec3>,
    velocity: Vec<Vec3>,
    com: Vec3,
    com_reference: Vec3,
}

impl Deformable {
    /// The given positions become both the current and the reference shape.
    pub fn new(positions: Vec<Vec3>) -> SimResult<Self> {
        if positions.is_empty() {
            return Err(SimError::InvalidParameter { name: "vertex count", value: 0.0 });
        }
        let com = center_of_mass(&positions);
        Ok(Deformable {
            predicted: positions.clone(),
            reference: positions.clone(),
            velocity: vec![Vec3::ZERO; positions.len()],
            position: positions,
            com,
            com_reference: com,
        })
    }

    /// Place the reference shape at `translation` with a rigid velocity field
    /// `linear + angular × (p - com)`.
    pub fn set_position_and_velocity(&mut self, translation: Vec3, linear: Vec3, angular: Vec3) {
        for (k, r) in self.reference.iter().enumerate() {
            self.position[k] = *r + translation;
        }
        self.com = center_of_mass(&self.position);
        for (p, v) in self.position.iter().zip(self.velocity.iter_mut()) {
            *v = linear + angular.cross(*p - self.com);
        }
        self.predicted.copy_from_slice(&self.position);
    }

    pub fn vertex_count(&self) -> usize { self.position.len() }
    pub fn positions(&self) -> &[Vec3] { &self.position }
    pub fn predicted(&self) -> &[Vec3] { &self.predicted }
    pub fn predicted_mut(&mut self) -> &mut [Vec3] { &mut self.predicted }
    pub fn reference(&self) -> &[Vec3] { &self.reference }
    pub fn velocities(&self) -> &[Vec3] { &self.velocity }
    pub fn com(&self) -> Vec3 { self.com }
    pub fn com_reference(&self) -> Vec3 { self.com_reference }

    /// Bounding box of the predicted positions.
    pub fn aabb(&self) -> (Vec3, Vec3) {
        self.predicted
            .iter()
            .fold((Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY)), |(lo, hi), p| {
                (lo.min(*p), hi.max(*p))
            })
    }

    /// Explicit velocity update with air friction, then prediction.
    pub(crate) fn predict(&mut self, dt: f32, friction: f32, gravity: Vec3) {
        let damping = 1.0 - dt * friction;
        for ((p, v), q) in self.position.iter().zip(self.velocity.iter_mut()).zip(self.predicted.iter_mut()) {
            *v = *v * damping + gravity * dt;
            *q = *p + *v * dt;
        }
    }

    /// Velocity from the corrected displacement, then commit.
    pub(crate) fn finalize(&mut self, dt: f32) {
        for ((p, v), q) in self.position.iter_mut().zip(self.velocity.iter_mut()).zip(&self.predicted) {
            *v = (*q - *p) / dt;
            *p = *q;
        }
    }

    /// First vertex whose position or velocity is no longer finite.
    pub fn detect_divergence(&self) -> Option<DivergenceReport> {
        if let Some(vertex) = self.position.iter().position(|p| !p.is_finite()) {
            return Some(DivergenceReport { vertex, kind: DivergenceKind::NanPosition });
        }
        self.velocity
            .iter()
            .position(|v| !v.is_finite())
            .map(|vertex| DivergenceReport { vertex, kind: DivergenceKind::NanVelocity })
    }

    /// Move `predicted` toward the best rigid fit of the reference shape.
    ///
    /// `elasticity` keeps that share of the deviation from the rigid goal,
    /// `plasticity` moves the reference shape toward the current deformation.
    pub(crate) fn match_shape(&mut self, elasticity: f32, plasticity: f32) {
        let com = center_of_mass(&self.predicted);
        let mut covariance = glam::Mat3::ZERO;
        for (p, r) in self.predicted.iter().zip(&self.reference) {
            let a = *p - com;
            let b = *r - self.com_reference;
            covariance += glam::Mat3::from_cols(a * b.x, a * b.y, a * b.z);
        }
        let rotation = crate::solver::polar_decomposition(covariance);

        if plasticity > 0.0 {
            let inverse = rotation.transpose();
            for (p, r) in self.predicted.iter().zip(self.reference.iter_mut()) {
                let deformed = inverse * (*p - com) + self.com_reference;
                *r += (deformed - *r) * plasticity;
            }
            self.com_reference = center_of_mass(&self.reference);
        }

        for (p, r) in self.predicted.iter_mut().zip(&self.reference) {
            let goal = com + rotation * (*r - self.com_reference);
            *p = goal + (*p - goal) * elasticity;
        }
        self.com = com;
    }
}

impl ConstraintTarget for Deformable {
    fn vertex_count(&self) -> usize { self.predicted.len() }
    fn position(&self, index: usize) -> Vec3 { self.predicted[index] }
    fn set_position(&mut self, index: usize, position: Vec3) { self.predicted[index] = position; }

    /// Friction cancels that share of the tangential motion since the last step.
    fn on_contact(&mut self, index: usize, normal: Vec3, friction: f32) {
        if friction <= 0.0 {
            return;
        }
        let d = self.predicted[index] - self.position[index];
        let tangential = d - normal * d.dot(normal);
        self.predicted[index] -= tangential * friction;
    }
}

pub fn center_of_mass(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return Vec3::ZERO;
    }
    points.iter().copied().sum::<Vec3>() / points.len() as f32
}
