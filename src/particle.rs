//! Free particles: emission, ageing, and impulse-based sphere collisions.

use glam::Vec3;

use crate::config::{validate_time_step, ParticleConfig};
use crate::error::SimResult;
use crate::observer::StepObserver;

/// A spherical particle owned by a [`ParticleSystem`].
#[derive(Clone, Debug, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Accumulated external force, cleared after each step.
    pub force: Vec3,
    pub mass: f32,
    pub radius: f32,
    pub color: Vec3,
    /// Simulation time at which the particle was emitted.
    pub birth_time: f32,
}

impl Particle {
    pub fn new(position: Vec3, velocity: Vec3, mass: f32, radius: f32) -> Self {
        Particle {
            position,
            velocity,
            force: Vec3::ZERO,
            mass,
            radius,
            color: Vec3::ONE,
            birth_time: 0.0,
        }
    }

    pub fn with_color(mut self, color: Vec3) -> Self {
        self.color = color;
        self
    }

    pub fn born_at(mut self, time: f32) -> Self {
        self.birth_time = time;
        self
    }

    pub fn inv_mass(&self) -> f32 {
        if self.mass > 1e-10 { 1.0 / self.mass } else { 0.0 }
    }

    pub fn age(&self, now: f32) -> f32 {
        now - self.birth_time
    }

    pub fn apply_force(&mut self, force: Vec3) {
        self.force += force;
    }
}

/// Flat collection of particles advanced with explicit Euler steps and
/// impulse collision response.
#[derive(Clone, Debug, Default)]
pub struct ParticleSystem {
    particles: Vec<Particle>,
}

impl ParticleSystem {
    pub fn new() -> Self {
        ParticleSystem { particles: Vec::new() }
    }

    /// Add a particle and return its index.
    pub fn emit(&mut self, particle: Particle) -> usize {
        self.particles.push(particle);
        self.particles.len() - 1
    }

    /// Drop every particle older than `max_age`. Returns how many were removed.
    pub fn remove_expired(&mut self, now: f32, max_age: f32) -> usize {
        let before = self.particles.len();
        self.particles.retain(|p| p.age(now) <= max_age);
        before - self.particles.len()
    }

    pub fn clear(&mut self) {
        self.particles.clear();
    }

    pub fn len(&self) -> usize { self.particles.len() }
    pub fn is_empty(&self) -> bool { self.particles.is_empty() }
    pub fn particles(&self) -> &[Particle] { &self.particles }
    pub fn particles_mut(&mut self) -> &mut [Particle] { &mut self.particles }

    pub fn positions(&self) -> Vec<Vec3> {
        self.particles.iter().map(|p| p.position).collect()
    }

    /// Advance every particle by `dt`.
    ///
    /// Positions are predicted from the new velocities first, then pair and
    /// container collisions are resolved on the predicted state, so every
    /// particle ends the step inside the container.
    pub fn step<O: StepObserver>(&mut self, dt: f32, config: &ParticleConfig, observer: &mut O) -> SimResult<()> {
        validate_time_step(dt)?;
        config.validate()?;

        let damping = (1.0 - config.drag * dt).max(0.0);
        for p in self.particles.iter_mut() {
            let accel = config.gravity + p.force * p.inv_mass();
            p.velocity = p.velocity * damping + accel * dt;
            p.position += p.velocity * dt;
            p.force = Vec3::ZERO;
        }
        observer.on_integrate();

        self.collide_pairs(config.restitution);
        self.collide_container(config);
        observer.on_constraint_iteration(0);

        observer.on_step_complete();
        Ok(())
    }

    fn collide_pairs(&mut self, restitution: f32) {
        let n = self.particles.len();
        for i in 0..n {
            let (head, tail) = self.particles.split_at_mut(i + 1);
            let a = &mut head[i];
            for b in tail.iter_mut() {
                let delta = a.position - b.position;
                let dist = delta.length();
                let contact = a.radius + b.radius;
                if dist >= contact || dist < 1e-8 {
                    continue;
                }
                let (wa, wb) = (a.inv_mass(), b.inv_mass());
                let w = wa + wb;
                if w <= 0.0 {
                    continue;
                }
                let u = delta / dist;

                let approach = (a.velocity - b.velocity).dot(u);
                if approach < 0.0 {
                    let impulse = -(1.0 + restitution) * approach / w;
                    a.velocity += u * (impulse * wa);
                    b.velocity -= u * (impulse * wb);
                }

                let overlap = contact - dist;
                a.position += u * (overlap * wa / w);
                b.position -= u * (overlap * wb / w);
            }
        }
    }

    fn collide_container(&mut self, config: &ParticleConfig) {
        let (min, max) = (config.container_min, config.container_max);
        for p in self.particles.iter_mut() {
            for axis in 0..3 {
                if p.position[axis] - p.radius < min[axis] {
                    p.position[axis] = min[axis] + p.radius;
                    if p.velocity[axis] < 0.0 {
                        p.velocity[axis] *= -config.restitution;
                    }
                } else if p.position[axis] + p.radius > max[axis] {
                    p.position[axis] = max[axis] - p.radius;
                    if p.velocity[axis] > 0.0 {
                        p.velocity[axis] *= -config.restitution;
                    }
                }
            }
        }
    }
}
