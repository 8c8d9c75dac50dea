//! Position-based dynamics solver for a scene of deformable shapes.

use glam::{Mat3, Vec3};
use nalgebra::Matrix3;

use crate::config::PbdConfig;
use crate::cloth::DivergenceReport;
use crate::constraint::{Constraint, CollisionVolume};
use crate::error::{SimError, SimResult};
use crate::observer::StepObserver;
use crate::softbody::Deformable;

/// Predict / project / finalize stepper over independent shapes that only
/// interact through vertex-vertex collisions.
#[derive(Clone, Debug, Default)]
pub struct PbdSolver {
    shapes: Vec<Deformable>,
    /// Per-shape constraints, parallel to `shapes`.
    constraints: Vec<Vec<Constraint>>,
    /// Constraints applied to every shape (walls, ground).
    scene: Vec<Constraint>,
    halted: Option<(usize, DivergenceReport)>,
}

impl PbdSolver {
    pub fn new() -> Self {
        PbdSolver { shapes: Vec::new(), constraints: Vec::new(), scene: Vec::new(), halted: None }
    }

    /// Side walls at x, y in [-1, 5] and a frictional ground at z = 0.
    pub fn with_default_scene() -> Self {
        let mut solver = Self::new();
        solver.scene = default_scene();
        solver
    }

    pub fn add_shape(&mut self, shape: Deformable) -> usize {
        self.shapes.push(shape);
        self.constraints.push(Vec::new());
        self.shapes.len() - 1
    }

    /// Attach a constraint to one shape. Pins and targets must name one of
    /// its vertices.
    pub fn add_constraint(&mut self, shape: usize, constraint: Constraint) -> SimResult<()> {
        let count = self.shapes.len();
        let body = self.shapes.get(shape).ok_or(SimError::IndexOutOfBounds { index: shape, count })?;
        constraint.check_vertex(body.vertex_count())?;
        self.constraints[shape].push(constraint);
        Ok(())
    }

    pub fn add_scene_constraint(&mut self, constraint: Constraint) {
        self.scene.push(constraint);
    }

    /// Remove every shape and lift a halt. Scene constraints are kept.
    pub fn clear(&mut self) {
        self.shapes.clear();
        self.constraints.clear();
        self.halted = None;
    }

    pub fn is_halted(&self) -> bool { self.halted.is_some() }

    /// Shape index and report of the divergence that halted the solver.
    pub fn halt_report(&self) -> Option<(usize, &DivergenceReport)> {
        self.halted.as_ref().map(|(shape, report)| (*shape, report))
    }

    pub fn shape_count(&self) -> usize { self.shapes.len() }
    pub fn shapes(&self) -> &[Deformable] { &self.shapes }
    pub fn shape(&self, index: usize) -> Option<&Deformable> { self.shapes.get(index) }
    pub fn shape_mut(&mut self, index: usize) -> Option<&mut Deformable> { self.shapes.get_mut(index) }
    pub fn scene_constraints(&self) -> &[Constraint] { &self.scene }

    pub fn predict(&mut self, config: &PbdConfig) {
        for shape in self.shapes.iter_mut() {
            shape.predict(config.time_step, config.friction, config.gravity);
        }
    }

    /// `collision_steps` rounds of: collision volumes, vertex-vertex
    /// contacts between shapes, shape matching, soft targets, pins.
    pub fn project<O: StepObserver>(&mut self, config: &PbdConfig, observer: &mut O) {
        for iteration in 0..config.collision_steps {
            for (shape, own) in self.shapes.iter_mut().zip(&self.constraints) {
                for c in self.scene.iter().chain(own).filter(|c| c.priority() == 0) {
                    c.apply(shape);
                }
            }

            self.collide_shapes(config.collision_radius);

            for shape in self.shapes.iter_mut() {
                shape.match_shape(config.elasticity, config.plasticity);
            }

            for (shape, own) in self.shapes.iter_mut().zip(&self.constraints) {
                for pass in 1..=2 {
                    for c in self.scene.iter().chain(own).filter(|c| c.priority() == pass) {
                        c.apply(shape);
                    }
                }
            }
            observer.on_constraint_iteration(iteration);
        }
    }

    pub fn finalize(&mut self, config: &PbdConfig) {
        for shape in self.shapes.iter_mut() {
            shape.finalize(config.time_step);
        }
    }

    /// One step of `config.time_step`.
    ///
    /// A shape whose state stops being finite halts the solver; later calls
    /// return [`SimError::Halted`] until [`clear`](Self::clear).
    pub fn step<O: StepObserver>(&mut self, config: &PbdConfig, observer: &mut O) -> SimResult<()> {
        if self.halted.is_some() {
            return Err(SimError::Halted);
        }
        config.validate()?;

        self.predict(config);
        observer.on_integrate();
        self.project(config, observer);
        self.finalize(config);

        if let Some((shape, report)) = self.detect_divergence() {
            log::error!("shape {} diverged, stepping halted: {}", shape, report);
            self.halted = Some((shape, report));
            return Err(SimError::Diverged(report));
        }
        observer.on_step_complete();
        Ok(())
    }

    /// First shape with a non-finite position or velocity.
    pub fn detect_divergence(&self) -> Option<(usize, DivergenceReport)> {
        self.shapes
            .iter()
            .enumerate()
            .find_map(|(k, shape)| shape.detect_divergence().map(|report| (k, report)))
    }

    /// Push apart vertices of different shapes closer than two radii, half
    /// the overlap each. Shape pairs whose boxes are apart are skipped.
    fn collide_shapes(&mut self, radius: f32) {
        let reach = 2.0 * radius;
        let boxes: Vec<(Vec3, Vec3)> = self.shapes.iter().map(Deformable::aabb).collect();
        for i in 0..self.shapes.len() {
            let (head, tail) = self.shapes.split_at_mut(i + 1);
            let a = &mut head[i];
            for (offset, b) in tail.iter_mut().enumerate() {
                let j = i + 1 + offset;
                if !boxes_overlap(boxes[i], boxes[j], reach) {
                    continue;
                }
                for pa in a.predicted_mut().iter_mut() {
                    for pb in b.predicted_mut().iter_mut() {
                        let d = *pa - *pb;
                        let dist = d.length();
                        if dist >= reach || dist < 1e-8 {
                            continue;
                        }
                        let push = d * (0.5 * (reach - dist) / dist);
                        *pa += push;
                        *pb -= push;
                    }
                }
            }
        }
    }
}

/// The walls and ground of the shape-matching scene.
pub fn default_scene() -> Vec<Constraint> {
    vec![
        Constraint::Collision(CollisionVolume::container(
            Vec3::new(-1.0, -1.0, f32::NEG_INFINITY),
            Vec3::new(5.0, 5.0, f32::INFINITY),
        )),
        Constraint::Collision(CollisionVolume::ground(0.0, 1.0)),
    ]
}

fn boxes_overlap(a: (Vec3, Vec3), b: (Vec3, Vec3), margin: f32) -> bool {
    (a.0 - margin).cmple(b.1).all() && (b.0 - margin).cmple(a.1).all()
}

/// Rotation part of `m = R S`, computed as `U Vᵗ` from the SVD.
///
/// Reflections are turned into rotations by flipping the singular vector of
/// the smallest singular value. Degenerate input yields the identity.
pub fn polar_decomposition(m: Mat3) -> Mat3 {
    if !m.is_finite() {
        return Mat3::IDENTITY;
    }
    let svd = Matrix3::from_column_slice(&m.to_cols_array()).svd(true, true);
    if svd.singular_values.sum() < 1e-12 {
        return Mat3::IDENTITY;
    }
    let (Some(mut u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Mat3::IDENTITY;
    };
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let (smallest, _) = svd.singular_values.argmin();
        for row in 0..3 {
            u[(row, smallest)] = -u[(row, smallest)];
        }
        r = u * v_t;
    }
    Mat3::from_cols_slice(r.as_slice())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    #[test]
    fn polar_of_rotation_is_itself() {
        let q = Mat3::from_quat(Quat::from_rotation_y(0.7));
        let r = polar_decomposition(q * Mat3::from_diagonal(Vec3::new(2.0, 1.0, 0.5)));
        assert!(r.abs_diff_eq(q, 1e-4));
    }

    #[test]
    fn polar_fixes_reflection() {
        let r = polar_decomposition(Mat3::from_diagonal(Vec3::new(1.0, 1.0, -0.1)));
        assert!((r.determinant() - 1.0).abs() < 1e-4);
        assert!(r.abs_diff_eq(Mat3::IDENTITY, 1e-4));
    }

    #[test]
    fn polar_of_zero_is_identity() {
        assert_eq!(polar_decomposition(Mat3::ZERO), Mat3::IDENTITY);
    }

    #[test]
    fn box_pruning() {
        let a = (Vec3::ZERO, Vec3::ONE);
        let b = (Vec3::splat(1.05), Vec3::splat(2.0));
        assert!(boxes_overlap(a, b, 0.08));
        assert!(!boxes_overlap(a, b, 0.01));
    }
}
