//! Smoothed-particle hydrodynamics with a weakly compressible equation of state.
//!
//! Density uses the poly6 kernel, pressure forces the spiky kernel gradient
//! and viscosity the viscosity kernel Laplacian. Neighbours are found
//! through a hash of cubic cells of side `h`, rebuilt every step.

use std::collections::HashMap;
use std::f32::consts::PI;

use glam::{IVec3, Vec3};

use crate::cloth::{DivergenceKind, DivergenceReport};
use crate::config::{validate_time_step, SphConfig};
use crate::error::{SimError, SimResult};
use crate::observer::StepObserver;

/// One fluid particle. `density` and `pressure` are refreshed every step.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SphParticle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Acceleration from the last step, gravity included.
    pub acceleration: Vec3,
    pub density: f32,
    pub pressure: f32,
}

impl SphParticle {
    pub fn new(position: Vec3, velocity: Vec3) -> Self {
        SphParticle { position, velocity, ..Default::default() }
    }
}

/// `315 / (64 π h⁹) (h² - r²)³` for `r < h`.
pub fn poly6(r: f32, h: f32) -> f32 {
    if r >= h {
        return 0.0;
    }
    let d = h * h - r * r;
    315.0 / (64.0 * PI * h.powi(9)) * d * d * d
}

/// Gradient of the spiky kernel with respect to `p_i`, for `d = p_i - p_j`.
pub fn spiky_gradient(d: Vec3, h: f32) -> Vec3 {
    let r = d.length();
    if r >= h || r < 1e-8 {
        return Vec3::ZERO;
    }
    d * (-45.0 / (PI * h.powi(6)) * (h - r) * (h - r) / r)
}

/// Laplacian of the viscosity kernel, `45 / (π h⁶) (h - r)`.
pub fn viscosity_laplacian(r: f32, h: f32) -> f32 {
    if r >= h {
        return 0.0;
    }
    45.0 / (PI * h.powi(6)) * (h - r)
}

/// A set of SPH particles inside an axis-aligned container.
#[derive(Clone, Debug, Default)]
pub struct SphSolver {
    particles: Vec<SphParticle>,
    cells: HashMap<IVec3, Vec<usize>>,
    halted: Option<DivergenceReport>,
}

impl SphSolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Particles at rest at the given positions.
    pub fn from_positions(positions: impl IntoIterator<Item = Vec3>) -> Self {
        SphSolver {
            particles: positions.into_iter().map(|p| SphParticle::new(p, Vec3::ZERO)).collect(),
            ..Self::default()
        }
    }

    /// Fill `[min, max]` with particles on a regular lattice of `spacing`.
    /// Returns how many were added.
    pub fn fill_box(&mut self, min: Vec3, max: Vec3, spacing: f32) -> SimResult<usize> {
        if !(spacing > 0.0 && spacing.is_finite()) {
            return Err(SimError::InvalidParameter { name: "spacing", value: spacing });
        }
        let counts = ((max - min) / spacing).floor().max(Vec3::ZERO).as_uvec3() + 1;
        let before = self.particles.len();
        for z in 0..counts.z {
            for y in 0..counts.y {
                for x in 0..counts.x {
                    let p = min + Vec3::new(x as f32, y as f32, z as f32) * spacing;
                    self.particles.push(SphParticle::new(p.min(max), Vec3::ZERO));
                }
            }
        }
        Ok(self.particles.len() - before)
    }

    pub fn add_particle(&mut self, position: Vec3, velocity: Vec3) -> usize {
        self.particles.push(SphParticle::new(position, velocity));
        self.particles.len() - 1
    }

    /// Remove every particle and lift a halt.
    pub fn clear(&mut self) {
        self.particles.clear();
        self.cells.clear();
        self.halted = None;
    }

    pub fn len(&self) -> usize { self.particles.len() }
    pub fn is_empty(&self) -> bool { self.particles.is_empty() }
    pub fn particles(&self) -> &[SphParticle] { &self.particles }
    pub fn particles_mut(&mut self) -> &mut [SphParticle] { &mut self.particles }
    pub fn is_halted(&self) -> bool { self.halted.is_some() }
    pub fn halt_report(&self) -> Option<&DivergenceReport> { self.halted.as_ref() }

    pub fn positions(&self) -> Vec<Vec3> {
        self.particles.iter().map(|p| p.position).collect()
    }

    /// Density, pressure, forces, then a damped semi-implicit Euler step and
    /// wall collisions.
    ///
    /// A particle whose state stops being finite halts the solver; later
    /// calls return [`SimError::Halted`] until [`clear`](Self::clear).
    pub fn step<O: StepObserver>(&mut self, dt: f32, config: &SphConfig, observer: &mut O) -> SimResult<()> {
        if self.halted.is_some() {
            return Err(SimError::Halted);
        }
        validate_time_step(dt)?;
        config.validate()?;

        self.build_cells(config.kernel_radius);
        self.update_density(config);
        self.update_acceleration(config);

        let keep = 1.0 - config.damping;
        for p in self.particles.iter_mut() {
            p.velocity = p.velocity * keep + p.acceleration * dt;
            p.position += p.velocity * dt;
        }
        observer.on_integrate();

        self.collide_container(config);
        observer.on_constraint_iteration(0);

        if let Some(report) = self.detect_divergence() {
            log::error!("sph diverged, stepping halted: {}", report);
            self.halted = Some(report);
            return Err(SimError::Diverged(report));
        }
        observer.on_step_complete();
        Ok(())
    }

    /// First particle whose position or velocity is not finite.
    pub fn detect_divergence(&self) -> Option<DivergenceReport> {
        if let Some(vertex) = self.particles.iter().position(|p| !p.position.is_finite()) {
            return Some(DivergenceReport { vertex, kind: DivergenceKind::NanPosition });
        }
        self.particles
            .iter()
            .position(|p| !p.velocity.is_finite())
            .map(|vertex| DivergenceReport { vertex, kind: DivergenceKind::NanVelocity })
    }

    fn build_cells(&mut self, h: f32) {
        self.cells.clear();
        for (k, p) in self.particles.iter().enumerate() {
            self.cells.entry(cell_of(p.position, h)).or_default().push(k);
        }
    }

    /// Indices of the particles in the 27 cells around `position`, `i` included.
    fn neighbors(&self, position: Vec3, h: f32) -> impl Iterator<Item = usize> + '_ {
        let center = cell_of(position, h);
        (-1..=1)
            .flat_map(|z| (-1..=1).flat_map(move |y| (-1..=1).map(move |x| IVec3::new(x, y, z))))
            .filter_map(move |offset| self.cells.get(&(center + offset)))
            .flatten()
            .copied()
    }

    fn update_density(&mut self, config: &SphConfig) {
        let h = config.kernel_radius;
        let mass = config.particle_mass();
        let densities: Vec<f32> = self
            .particles
            .iter()
            .map(|pi| {
                self.neighbors(pi.position, h)
                    .map(|j| mass * poly6(pi.position.distance(self.particles[j].position), h))
                    .sum()
            })
            .collect();
        for (p, rho) in self.particles.iter_mut().zip(densities) {
            p.density = rho;
            p.pressure = config.stiffness * (rho - config.rest_density);
        }
    }

    fn update_acceleration(&mut self, config: &SphConfig) {
        let h = config.kernel_radius;
        let mass = config.particle_mass();
        let accelerations: Vec<Vec3> = self
            .particles
            .iter()
            .enumerate()
            .map(|(i, pi)| {
                let mut pressure = Vec3::ZERO;
                let mut viscosity = Vec3::ZERO;
                for j in self.neighbors(pi.position, h).filter(|&j| j != i) {
                    let pj = &self.particles[j];
                    if pj.density <= 0.0 {
                        continue;
                    }
                    let d = pi.position - pj.position;
                    pressure += spiky_gradient(d, h) * (mass * (pi.pressure + pj.pressure) / (2.0 * pj.density));
                    viscosity += (pj.velocity - pi.velocity) * (mass / pj.density * viscosity_laplacian(d.length(), h));
                }
                let inv_density = if pi.density > 0.0 { 1.0 / pi.density } else { 0.0 };
                config.gravity - pressure * inv_density + viscosity * config.viscosity
            })
            .collect();
        for (p, a) in self.particles.iter_mut().zip(accelerations) {
            p.acceleration = a;
        }
    }

    fn collide_container(&mut self, config: &SphConfig) {
        let (min, max) = (config.container_min, config.container_max);
        for p in self.particles.iter_mut() {
            for axis in 0..3 {
                if p.position[axis] < min[axis] {
                    p.position[axis] = min[axis];
                    if p.velocity[axis] < 0.0 {
                        p.velocity[axis] *= -config.restitution;
                    }
                } else if p.position[axis] > max[axis] {
                    p.position[axis] = max[axis];
                    if p.velocity[axis] > 0.0 {
                        p.velocity[axis] *= -config.restitution;
                    }
                }
            }
        }
    }
}

fn cell_of(p: Vec3, h: f32) -> IVec3 {
    (p / h).floor().as_ivec3()
}
