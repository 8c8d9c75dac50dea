//! Spring-mass cloth with semi-implicit Euler integration and a divergence guard.

use core::fmt;

use glam::Vec3;

use crate::config::{validate_time_step, ClothConfig};
use crate::constraint::{self, Constraint, ConstraintTarget};
use crate::error::{SimError, SimResult};
use crate::grid::Grid2D;
use crate::observer::StepObserver;

/// Which neighbour a spring connects, and so which stiffness it uses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SpringKind {
    /// Axis neighbours.
    Structural,
    /// Diagonal neighbours.
    Shear,
    /// Axis neighbours two apart.
    Bend,
}

/// Linear spring between two vertices, stored by grid offset.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Spring {
    pub a: usize,
    pub b: usize,
    pub rest_length: f32,
    pub kind: SpringKind,
}

/// What tripped the divergence guard.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DivergenceKind {
    NanForce,
    StrongForce { magnitude: f32 },
    NanPosition,
    NanVelocity,
}

/// First offending vertex found by [`Cloth::detect_divergence`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DivergenceReport {
    pub vertex: usize,
    pub kind: DivergenceKind,
}

impl fmt::Display for DivergenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DivergenceKind::NanForce => write!(f, "NaN force at vertex {}", self.vertex),
            DivergenceKind::StrongForce { magnitude } => {
                write!(f, "force of magnitude {} at vertex {}", magnitude, self.vertex)
            }
            DivergenceKind::NanPosition => write!(f, "NaN position at vertex {}", self.vertex),
            DivergenceKind::NanVelocity => write!(f, "NaN velocity at vertex {}", self.vertex),
        }
    }
}

/// A rectangular sheet of point masses.
///
/// Vertex `(ku, kv)` lives at grid offset `ku + nu * kv`. Spring rest
/// lengths come from the layout the cloth was built with, and
/// [`reset`](Cloth::reset) returns to that layout.
pub struct Cloth {
    position: Grid2D<Vec3>,
    velocity: Grid2D<Vec3>,
    force: Grid2D<Vec3>,
    normal: Grid2D<Vec3>,
    initial: Grid2D<Vec3>,
    springs: Vec<Spring>,
    triangles: Vec<[usize; 3]>,
    constraints: Vec<Constraint>,
    /// Mean structural rest length, used as the wind area scale.
    spacing: f32,
    halted: Option<DivergenceReport>,
}

impl Cloth {
    /// The unit sheet `[-0.5, 0.5] x [0, 1]` lying flat at height 1.
    pub fn flat(nu: usize, nv: usize) -> SimResult<Self> {
        check_dimensions(nu, nv)?;
        let mut grid = Grid2D::new(nu, nv);
        for kv in 0..nv {
            for ku in 0..nu {
                let u = ku as f32 / (nu - 1) as f32;
                let v = kv as f32 / (nv - 1) as f32;
                grid[(ku, kv)] = Vec3::new(-0.5 + u, v, 1.0);
            }
        }
        Self::from_positions(grid)
    }

    pub fn from_positions(position: Grid2D<Vec3>) -> SimResult<Self> {
        let (nu, nv) = position.dimensions();
        check_dimensions(nu, nv)?;

        let springs = build_springs(&position);
        let triangles = build_triangles(nu, nv);
        let structural: Vec<f32> = springs
            .iter()
            .filter(|s| s.kind == SpringKind::Structural)
            .map(|s| s.rest_length)
            .collect();
        let spacing = structural.iter().sum::<f32>() / structural.len().max(1) as f32;

        let mut cloth = Cloth {
            velocity: Grid2D::new(nu, nv),
            force: Grid2D::new(nu, nv),
            normal: Grid2D::new(nu, nv),
            initial: position.clone(),
            position,
            springs,
            triangles,
            constraints: Vec::new(),
            spacing,
            halted: None,
        };
        cloth.update_normals();
        log::debug!("cloth {}x{} built with {} springs", nu, nv, cloth.springs.len());
        Ok(cloth)
    }

    pub fn dimensions(&self) -> (usize, usize) { self.position.dimensions() }
    pub fn vertex_count(&self) -> usize { self.position.len() }
    pub fn positions(&self) -> &Grid2D<Vec3> { &self.position }
    pub fn velocities(&self) -> &Grid2D<Vec3> { &self.velocity }
    pub fn forces(&self) -> &Grid2D<Vec3> { &self.force }
    pub fn normals(&self) -> &Grid2D<Vec3> { &self.normal }
    pub fn springs(&self) -> &[Spring] { &self.springs }
    pub fn triangles(&self) -> &[[usize; 3]] { &self.triangles }
    pub fn constraints(&self) -> &[Constraint] { &self.constraints }
    pub fn is_halted(&self) -> bool { self.halted.is_some() }
    pub fn halt_report(&self) -> Option<&DivergenceReport> { self.halted.as_ref() }

    pub fn position_at(&self, ku: usize, kv: usize) -> Vec3 {
        self.position[(ku, kv)]
    }

    /// Attach a constraint. Pins and targets must name an existing vertex.
    pub fn add_constraint(&mut self, constraint: Constraint) -> SimResult<()> {
        constraint.check_vertex(self.vertex_count())?;
        self.constraints.push(constraint);
        Ok(())
    }

    /// Hold `(ku, kv)` at its current position.
    pub fn pin(&mut self, ku: usize, kv: usize) -> SimResult<()> {
        let index = self.checked_offset(ku, kv)?;
        let target = self.position.data()[index];
        self.constraints.retain(|c| !matches!(c, Constraint::Fixed { index: i, .. } if *i == index));
        self.constraints.push(Constraint::Fixed { index, target });
        Ok(())
    }

    pub fn unpin(&mut self, ku: usize, kv: usize) -> SimResult<()> {
        let index = self.checked_offset(ku, kv)?;
        self.constraints.retain(|c| !matches!(c, Constraint::Fixed { index: i, .. } if *i == index));
        Ok(())
    }

    /// Return to the initial layout at rest and clear a halt. Constraints
    /// are kept.
    pub fn reset(&mut self) {
        self.position = self.initial.clone();
        self.velocity.fill(Vec3::ZERO);
        self.force.fill(Vec3::ZERO);
        self.halted = None;
        self.update_normals();
    }

    /// Gravity, drag, springs and wind into the force buffer.
    pub fn compute_forces(&mut self, config: &ClothConfig) {
        let mass = self.vertex_mass(config);
        let wind = config.wind.direction.normalize_or_zero();
        let wind_scale = config.wind.magnitude * self.spacing * self.spacing;

        let forces = self.force.data_mut();
        let positions = self.position.data();
        let velocities = self.velocity.data();
        let normals = self.normal.data();

        for (k, f) in forces.iter_mut().enumerate() {
            *f = config.gravity * mass - velocities[k] * (config.drag * mass);
            if wind_scale != 0.0 {
                let n = normals[k];
                *f += n * (wind_scale * n.dot(wind));
            }
        }

        for s in &self.springs {
            let stiffness = match s.kind {
                SpringKind::Structural => config.stiffness,
                SpringKind::Shear => config.shear_stiffness,
                SpringKind::Bend => config.bend_stiffness,
            };
            let d = positions[s.b] - positions[s.a];
            let length = d.length();
            if length < 1e-12 {
                continue;
            }
            // pulls a toward b when stretched
            let f = d * (stiffness * (length - s.rest_length) / length);
            forces[s.a] += f;
            forces[s.b] -= f;
        }
    }

    /// Semi-implicit Euler: velocity first, then position with the new velocity.
    pub fn integrate(&mut self, dt: f32, config: &ClothConfig) {
        let inv_mass = 1.0 / self.vertex_mass(config);
        let forces = self.force.data();
        for ((p, v), f) in self.position.data_mut().iter_mut().zip(self.velocity.data_mut()).zip(forces) {
            *v += *f * (dt * inv_mass);
            *p += *v * dt;
        }
    }

    /// Collisions, then targets, then pins.
    pub fn apply_constraints(&mut self) {
        let mut body = ClothBody { position: &mut self.position, velocity: &mut self.velocity };
        constraint::apply_constraints(&self.constraints, &mut body);
    }

    /// Scan for NaN forces, forces above the threshold, and NaN positions.
    pub fn detect_divergence(&self, config: &ClothConfig) -> Option<DivergenceReport> {
        for (vertex, f) in self.force.data().iter().enumerate() {
            if f.is_nan() {
                return Some(DivergenceReport { vertex, kind: DivergenceKind::NanForce });
            }
            let magnitude = f.length();
            if magnitude > config.divergence_threshold {
                return Some(DivergenceReport { vertex, kind: DivergenceKind::StrongForce { magnitude } });
            }
        }
        self.position
            .data()
            .iter()
            .position(|p| p.is_nan())
            .map(|vertex| DivergenceReport { vertex, kind: DivergenceKind::NanPosition })
    }

    /// Area-weighted vertex normals from the triangle mesh.
    pub fn update_normals(&mut self) {
        self.normal.fill(Vec3::ZERO);
        let positions = self.position.data();
        let normals = self.normal.data_mut();
        for &[a, b, c] in &self.triangles {
            let n = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
            normals[a] += n;
            normals[b] += n;
            normals[c] += n;
        }
        for n in normals.iter_mut() {
            *n = n.normalize_or_zero();
        }
    }

    /// Advance by `dt`, split into `config.sub_steps` sub-steps.
    ///
    /// Once the divergence guard trips the cloth stays frozen and every
    /// later call returns [`SimError::Halted`] until [`reset`](Self::reset).
    pub fn step<O: StepObserver>(&mut self, dt: f32, config: &ClothConfig, observer: &mut O) -> SimResult<()> {
        if self.halted.is_some() {
            return Err(SimError::Halted);
        }
        validate_time_step(dt)?;
        config.validate()?;
        let sub_steps = config.sub_steps.max(1);
        let sub_dt = dt / sub_steps as f32;

        for sub in 0..sub_steps {
            self.compute_forces(config);
            self.integrate(sub_dt, config);
            observer.on_integrate();

            self.apply_constraints();
            observer.on_constraint_iteration(sub);

            if let Some(report) = self.detect_divergence(config) {
                log::error!("cloth diverged, stepping halted: {}", report);
                self.halted = Some(report);
                return Err(SimError::Diverged(report));
            }
            self.update_normals();
        }

        observer.on_step_complete();
        Ok(())
    }

    fn vertex_mass(&self, config: &ClothConfig) -> f32 {
        config.mass_total / self.position.len() as f32
    }

    fn checked_offset(&self, ku: usize, kv: usize) -> SimResult<usize> {
        let (nu, nv) = self.position.dimensions();
        if ku >= nu || kv >= nv {
            return Err(SimError::IndexOutOfBounds { index: ku + nu * kv, count: nu * nv });
        }
        Ok(self.position.offset(ku, kv))
    }
}

struct ClothBody<'a> {
    position: &'a mut Grid2D<Vec3>,
    velocity: &'a mut Grid2D<Vec3>,
}

impl ConstraintTarget for ClothBody<'_> {
    fn vertex_count(&self) -> usize { self.position.len() }
    fn position(&self, index: usize) -> Vec3 { self.position.data()[index] }
    fn set_position(&mut self, index: usize, position: Vec3) { self.position.data_mut()[index] = position; }

    fn on_contact(&mut self, index: usize, normal: Vec3, friction: f32) {
        let v = &mut self.velocity.data_mut()[index];
        let vn = v.dot(normal);
        if vn < 0.0 {
            *v -= normal * vn;
        }
        let tangential = *v - normal * v.dot(normal);
        *v -= tangential * friction;
    }

    fn on_pinned(&mut self, index: usize) {
        self.velocity.data_mut()[index] = Vec3::ZERO;
    }
}

fn check_dimensions(nu: usize, nv: usize) -> SimResult<()> {
    if nu < 2 || nv < 2 {
        return Err(SimError::InvalidGridDimensions { nx: nu, ny: nv, min: 2 });
    }
    Ok(())
}

fn build_springs(position: &Grid2D<Vec3>) -> Vec<Spring> {
    let (nu, nv) = position.dimensions();
    let mut springs = Vec::new();
    let mut connect = |a: (usize, usize), b: (usize, usize), kind: SpringKind| {
        let (a, b) = (position.offset(a.0, a.1), position.offset(b.0, b.1));
        let rest_length = (position.data()[a] - position.data()[b]).length();
        springs.push(Spring { a, b, rest_length, kind });
    };

    for kv in 0..nv {
        for ku in 0..nu {
            // Structural
            if ku + 1 < nu {
                connect((ku, kv), (ku + 1, kv), SpringKind::Structural);
            }
            if kv + 1 < nv {
                connect((ku, kv), (ku, kv + 1), SpringKind::Structural);
            }
            // Shear
            if ku + 1 < nu && kv + 1 < nv {
                connect((ku, kv), (ku + 1, kv + 1), SpringKind::Shear);
                connect((ku + 1, kv), (ku, kv + 1), SpringKind::Shear);
            }
            // Bend
            if ku + 2 < nu {
                connect((ku, kv), (ku + 2, kv), SpringKind::Bend);
            }
            if kv + 2 < nv {
                connect((ku, kv), (ku, kv + 2), SpringKind::Bend);
            }
        }
    }
    springs
}

fn build_triangles(nu: usize, nv: usize) -> Vec<[usize; 3]> {
    let mut triangles = Vec::with_capacity(2 * (nu - 1) * (nv - 1));
    for kv in 0..nv - 1 {
        for ku in 0..nu - 1 {
            let a = ku + nu * kv;
            let b = a + 1;
            let c = b + nu;
            let d = a + nu;
            triangles.push([a, b, c]);
            triangles.push([a, c, d]);
        }
    }
    triangles
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::CollisionVolume;
    use crate::observer::NoOpStepObserver;

    #[test]
    fn rejects_degenerate_grid() {
        assert!(matches!(Cloth::flat(1, 4), Err(SimError::InvalidGridDimensions { .. })));
    }

    #[test]
    fn spring_counts() {
        let cloth = Cloth::flat(4, 4).unwrap();
        let count = |kind| cloth.springs().iter().filter(|s| s.kind == kind).count();
        assert_eq!(count(SpringKind::Structural), 24);
        assert_eq!(count(SpringKind::Shear), 18);
        assert_eq!(count(SpringKind::Bend), 16);
        assert_eq!(cloth.triangles().len(), 18);
    }

    #[test]
    fn rest_lengths_follow_layout() {
        let cloth = Cloth::flat(3, 3).unwrap();
        for s in cloth.springs() {
            let expected = match s.kind {
                SpringKind::Structural => 0.5,
                SpringKind::Shear => 0.5 * 2f32.sqrt(),
                SpringKind::Bend => 1.0,
            };
            assert!((s.rest_length - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn flat_sheet_normals_point_up() {
        let cloth = Cloth::flat(3, 3).unwrap();
        for n in cloth.normals().data() {
            assert!((*n - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn rest_sheet_feels_only_gravity_and_drag() {
        let mut cloth = Cloth::flat(3, 3).unwrap();
        let config = ClothConfig::new();
        cloth.compute_forces(&config);
        let m = config.mass_total / 9.0;
        for f in cloth.forces().data() {
            assert!((*f - config.gravity * m).length() < 1e-5);
        }
    }

    #[test]
    fn stretched_spring_pulls_together() {
        let mut grid = Grid2D::new(2, 2);
        grid[(0, 0)] = Vec3::new(0.0, 0.0, 0.0);
        grid[(1, 0)] = Vec3::new(1.0, 0.0, 0.0);
        grid[(0, 1)] = Vec3::new(0.0, 1.0, 0.0);
        grid[(1, 1)] = Vec3::new(1.0, 1.0, 0.0);
        let mut cloth = Cloth::from_positions(grid).unwrap();
        cloth.position[(1, 0)].x = 1.5;
        cloth.position[(1, 1)].x = 1.5;
        cloth.compute_forces(&ClothConfig::new().with_gravity(Vec3::ZERO));
        assert!(cloth.forces()[(0, 0)].x > 0.0);
        assert!(cloth.forces()[(1, 0)].x < 0.0);
    }

    #[test]
    fn ground_contact_removes_downward_velocity() {
        let mut cloth = Cloth::flat(2, 2).unwrap();
        cloth.add_constraint(Constraint::Collision(CollisionVolume::ground(0.99, 0.0))).unwrap();
        cloth.position[(0, 0)].z = 0.9;
        cloth.velocity[(0, 0)] = Vec3::new(0.3, 0.0, -1.0);
        cloth.apply_constraints();
        assert!((cloth.position_at(0, 0).z - 0.99).abs() < 1e-6);
        assert!((cloth.velocities()[(0, 0)] - Vec3::new(0.3, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn divergence_halts_until_reset() {
        let mut cloth = Cloth::flat(3, 3).unwrap();
        let config = ClothConfig::new().with_divergence_threshold(1e-3);
        let err = cloth.step(0.005, &config, &mut NoOpStepObserver).unwrap_err();
        assert!(matches!(err, SimError::Diverged(DivergenceReport { kind: DivergenceKind::StrongForce { .. }, .. })));
        assert!(cloth.is_halted());
        assert_eq!(cloth.step(0.005, &config, &mut NoOpStepObserver), Err(SimError::Halted));
        cloth.reset();
        assert!(cloth.step(0.005, &ClothConfig::new(), &mut NoOpStepObserver).is_ok());
    }

    #[test]
    fn pin_out_of_bounds() {
        let mut cloth = Cloth::flat(2, 2).unwrap();
        assert!(cloth.pin(2, 0).is_err());
        cloth.pin(1, 1).unwrap();
        cloth.pin(1, 1).unwrap();
        assert_eq!(cloth.constraints().len(), 1);
        cloth.unpin(1, 1).unwrap();
        assert!(cloth.constraints().is_empty());
    }

    #[test]
    fn constraint_on_missing_vertex_is_rejected() {
        let mut cloth = Cloth::flat(4, 4).unwrap();
        let err = cloth.add_constraint(Constraint::Fixed { index: 999, target: Vec3::ZERO }).unwrap_err();
        assert_eq!(err, SimError::IndexOutOfBounds { index: 999, count: 16 });
        assert!(cloth.constraints().is_empty());
    }

    #[test]
    fn invalid_step_inputs_leave_cloth_untouched() {
        let mut cloth = Cloth::flat(3, 3).unwrap();
        let before = cloth.positions().clone();
        assert_eq!(
            cloth.step(0.0, &ClothConfig::new(), &mut NoOpStepObserver),
            Err(SimError::InvalidParameter { name: "dt", value: 0.0 })
        );
        assert!(cloth.step(0.005, &ClothConfig::new().with_mass_total(0.0), &mut NoOpStepObserver).is_err());
        assert_eq!(cloth.positions(), &before);
        assert!(!cloth.is_halted());
    }
}
