//! Positional constraints: fixed pins, soft targets and collision volumes.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};

/// A region that vertices are kept out of (or inside of, for a box).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CollisionVolume {
    /// Half-space `normal · p >= offset`. `friction` in [0, 1] removes that
    /// share of the tangential motion on contact.
    Plane { normal: Vec3, offset: f32, friction: f32 },
    /// Solid sphere obstacle, vertices are pushed onto its surface.
    Sphere { center: Vec3, radius: f32 },
    /// Axis-aligned container, vertices are clamped inside its walls.
    Box { min: Vec3, max: Vec3 },
}

impl CollisionVolume {
    /// Half-space with a normalized normal.
    pub fn plane(normal: Vec3, offset: f32, friction: f32) -> Self {
        CollisionVolume::Plane {
            normal: normal.normalize_or_zero(),
            offset,
            friction: friction.clamp(0.0, 1.0),
        }
    }

    /// Horizontal ground at height `z`.
    pub fn ground(z: f32, friction: f32) -> Self {
        Self::plane(Vec3::Z, z, friction)
    }

    pub fn sphere(center: Vec3, radius: f32) -> Self {
        CollisionVolume::Sphere { center, radius: radius.max(0.0) }
    }

    pub fn container(min: Vec3, max: Vec3) -> Self {
        CollisionVolume::Box { min: min.min(max), max: min.max(max) }
    }

    pub fn friction(&self) -> f32 {
        match self {
            CollisionVolume::Plane { friction, .. } => *friction,
            _ => 0.0,
        }
    }

    /// Move `p` back onto the feasible side of the volume.
    ///
    /// `on_contact` receives the unit normal pointing into the feasible
    /// region once per violated surface (a box corner reports up to three).
    /// Returns whether `p` was changed.
    pub fn resolve(&self, p: &mut Vec3, mut on_contact: impl FnMut(Vec3)) -> bool {
        match *self {
            CollisionVolume::Plane { normal, offset, .. } => {
                let depth = normal.dot(*p) - offset;
                if depth < 0.0 {
                    *p -= normal * depth;
                    on_contact(normal);
                    true
                } else {
                    false
                }
            }
            CollisionVolume::Sphere { center, radius } => {
                let r = *p - center;
                let dist = r.length();
                if dist >= radius {
                    return false;
                }
                let normal = if dist > 1e-8 { r / dist } else { Vec3::Z };
                *p = center + normal * radius;
                on_contact(normal);
                true
            }
            CollisionVolume::Box { min, max } => {
                let mut touched = false;
                for axis in 0..3 {
                    let mut normal = Vec3::ZERO;
                    if p[axis] < min[axis] {
                        p[axis] = min[axis];
                        normal[axis] = 1.0;
                    } else if p[axis] > max[axis] {
                        p[axis] = max[axis];
                        normal[axis] = -1.0;
                    } else {
                        continue;
                    }
                    touched = true;
                    on_contact(normal);
                }
                touched
            }
        }
    }
}

/// A constraint that can be applied to a set of vertices.
///
/// Variants carry stable vertex indices, so a constraint can be re-applied
/// every step for the lifetime of the shape it was built for.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    /// Hard pin: the vertex is placed exactly on `target`.
    Fixed { index: usize, target: Vec3 },
    /// Soft pull toward `target`, `stiffness` in [0, 1] per application.
    Target { index: usize, target: Vec3, stiffness: f32 },
    /// Every vertex is kept out of (or inside) the volume.
    Collision(CollisionVolume),
}

/// State a constraint can correct.
///
/// Cloth and deformable shapes differ in how they respond to a contact
/// (explicit velocities vs. positions derived from the previous step), so
/// the response is delegated here.
pub trait ConstraintTarget {
    fn vertex_count(&self) -> usize;
    fn position(&self, index: usize) -> Vec3;
    fn set_position(&mut self, index: usize, position: Vec3);

    /// Called after `index` was pushed out along `normal`.
    fn on_contact(&mut self, _index: usize, _normal: Vec3, _friction: f32) {}

    /// Called after `index` was snapped onto a fixed target.
    fn on_pinned(&mut self, _index: usize) {}
}

impl Constraint {
    /// Collisions first, soft targets next, fixed pins last so they win.
    pub fn priority(&self) -> u8 {
        match self {
            Constraint::Collision(_) => 0,
            Constraint::Target { .. } => 1,
            Constraint::Fixed { .. } => 2,
        }
    }

    /// The vertex this constraint acts on, if it acts on a single one.
    pub fn vertex(&self) -> Option<usize> {
        match self {
            Constraint::Fixed { index, .. } | Constraint::Target { index, .. } => Some(*index),
            Constraint::Collision(_) => None,
        }
    }

    /// Fail if the constraint names a vertex outside a body of `count` vertices.
    pub fn check_vertex(&self, count: usize) -> SimResult<()> {
        match self.vertex() {
            Some(index) if index >= count => Err(SimError::IndexOutOfBounds { index, count }),
            _ => Ok(()),
        }
    }

    pub fn apply<S: ConstraintTarget>(&self, state: &mut S) {
        match *self {
            Constraint::Fixed { index, target } => {
                if index < state.vertex_count() {
                    state.set_position(index, target);
                    state.on_pinned(index);
                }
            }
            Constraint::Target { index, target, stiffness } => {
                if index < state.vertex_count() {
                    let p = state.position(index);
                    state.set_position(index, p + (target - p) * stiffness);
                }
            }
            Constraint::Collision(volume) => {
                let friction = volume.friction();
                let mut normals = [Vec3::ZERO; 3];
                for index in 0..state.vertex_count() {
                    let mut p = state.position(index);
                    let mut count = 0;
                    let moved = volume.resolve(&mut p, |n| {
                        if count < normals.len() {
                            normals[count] = n;
                            count += 1;
                        }
                    });
                    if moved {
                        state.set_position(index, p);
                        for n in &normals[..count] {
                            state.on_contact(index, *n, friction);
                        }
                    }
                }
            }
        }
    }
}

/// Apply every constraint once, ordered by [`Constraint::priority`].
pub fn apply_constraints<S: ConstraintTarget>(constraints: &[Constraint], state: &mut S) {
    for pass in 0..=2 {
        for c in constraints.iter().filter(|c| c.priority() == pass) {
            c.apply(state);
        }
    }
}
