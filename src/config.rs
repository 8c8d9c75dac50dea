//! Configuration types for the simulation steppers.
//!
//! Every stepper takes its configuration by reference on each call. Nothing is
//! read from global state, so a GUI can hand a fresh copy every frame.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::grid::Boundary;

/// Standard gravity along -Z, the up axis used throughout the crate.
pub const GRAVITY: Vec3 = Vec3::new(0.0, 0.0, -9.81);

fn require(name: &'static str, value: f32, valid: bool) -> SimResult<()> {
    if valid && value.is_finite() {
        Ok(())
    } else {
        Err(SimError::InvalidParameter { name, value })
    }
}

fn require_vec(name: &'static str, value: Vec3) -> SimResult<()> {
    require(name, value.length(), value.is_finite())
}

/// A step length must be positive and finite.
pub(crate) fn validate_time_step(dt: f32) -> SimResult<()> {
    require("dt", dt, dt > 0.0)
}

/// Wind applied to the cloth along its normals.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub magnitude: f32,
    pub direction: Vec3,
}

impl Default for Wind {
    fn default() -> Self {
        Wind { magnitude: 0.0, direction: Vec3::new(0.0, -1.0, 0.0) }
    }
}

/// Parameters of the spring-mass cloth.
///
/// # Builder Pattern
/// ```
/// use physanim::config::ClothConfig;
///
/// let config = ClothConfig::new()
///     .with_stiffness(8.0)
///     .with_drag(10.0)
///     .with_sub_steps(4);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClothConfig {
    /// Total mass of the cloth, split evenly across vertices. Default: 0.5.
    pub mass_total: f32,
    /// Stiffness of structural springs (axis neighbours). Default: 5.0.
    pub stiffness: f32,
    /// Stiffness of shear springs (diagonal neighbours). Default: 5.0.
    pub shear_stiffness: f32,
    /// Stiffness of bend springs (neighbours two apart). Default: 5.0.
    pub bend_stiffness: f32,
    /// Drag coefficient mu, force is `-mu * m * v`. Default: 15.0.
    pub drag: f32,
    pub gravity: Vec3,
    pub wind: Wind,
    /// Number of sub-steps per call. Default: 1.
    pub sub_steps: usize,
    /// Force magnitude above which the step is declared divergent. Default: 600.
    pub divergence_threshold: f32,
}

impl ClothConfig {
    pub fn new() -> Self {
        ClothConfig {
            mass_total: 0.5,
            stiffness: 5.0,
            shear_stiffness: 5.0,
            bend_stiffness: 5.0,
            drag: 15.0,
            gravity: GRAVITY,
            wind: Wind::default(),
            sub_steps: 1,
            divergence_threshold: 600.0,
        }
    }

    pub fn with_mass_total(mut self, mass_total: f32) -> Self {
        self.mass_total = mass_total;
        self
    }

    /// Set the structural stiffness only.
    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }

    /// Set shear and bend stiffness together.
    pub fn with_secondary_stiffness(mut self, shear: f32, bend: f32) -> Self {
        self.shear_stiffness = shear;
        self.bend_stiffness = bend;
        self
    }

    pub fn with_drag(mut self, drag: f32) -> Self {
        self.drag = drag;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_wind(mut self, magnitude: f32, direction: Vec3) -> Self {
        self.wind = Wind { magnitude, direction: direction.normalize_or_zero() };
        self
    }

    pub fn with_sub_steps(mut self, sub_steps: usize) -> Self {
        self.sub_steps = sub_steps.max(1);
        self
    }

    pub fn with_divergence_threshold(mut self, threshold: f32) -> Self {
        self.divergence_threshold = threshold;
        self
    }

    /// Reject values the spring-mass integrator cannot run with.
    pub fn validate(&self) -> SimResult<()> {
        require("mass_total", self.mass_total, self.mass_total > 0.0)?;
        require("stiffness", self.stiffness, self.stiffness > 0.0)?;
        require("shear_stiffness", self.shear_stiffness, self.shear_stiffness >= 0.0)?;
        require("bend_stiffness", self.bend_stiffness, self.bend_stiffness >= 0.0)?;
        require("drag", self.drag, self.drag >= 0.0)?;
        require_vec("gravity", self.gravity)?;
        require("wind.magnitude", self.wind.magnitude, true)?;
        require_vec("wind.direction", self.wind.direction)?;
        require("sub_steps", self.sub_steps as f32, self.sub_steps >= 1)?;
        require("divergence_threshold", self.divergence_threshold, self.divergence_threshold > 0.0)
    }
}

impl Default for ClothConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters of the position-based shape-matching solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PbdConfig {
    /// Integration time step. Default: 0.005.
    pub time_step: f32,
    /// Velocity reduction per unit time (air friction). Default: 1.0.
    pub friction: f32,
    pub gravity: Vec3,
    /// Projection passes per step. Fixed count, no convergence test. Default: 5.
    pub collision_steps: usize,
    /// Radius of the collision sphere around every vertex. Default: 0.04.
    pub collision_radius: f32,
    /// 0 snaps to the rigid goal, 1 keeps the predicted position. Default: 0.
    pub elasticity: f32,
    /// Share of the deformation absorbed by the reference shape. Default: 0.
    pub plasticity: f32,
}

impl PbdConfig {
    pub fn new() -> Self {
        PbdConfig {
            time_step: 0.005,
            friction: 1.0,
            gravity: GRAVITY,
            collision_steps: 5,
            collision_radius: 0.04,
            elasticity: 0.0,
            plasticity: 0.0,
        }
    }

    pub fn with_time_step(mut self, time_step: f32) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_collision_steps(mut self, steps: usize) -> Self {
        self.collision_steps = steps;
        self
    }

    pub fn with_collision_radius(mut self, radius: f32) -> Self {
        self.collision_radius = radius;
        self
    }

    pub fn with_elasticity(mut self, elasticity: f32) -> Self {
        self.elasticity = elasticity.clamp(0.0, 1.0);
        self
    }

    pub fn with_plasticity(mut self, plasticity: f32) -> Self {
        self.plasticity = plasticity.clamp(0.0, 1.0);
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        require("time_step", self.time_step, self.time_step > 0.0)?;
        require("friction", self.friction, self.friction >= 0.0)?;
        require_vec("gravity", self.gravity)?;
        require("collision_steps", self.collision_steps as f32, self.collision_steps >= 1)?;
        require("collision_radius", self.collision_radius, self.collision_radius >= 0.0)?;
        require("elasticity", self.elasticity, (0.0..=1.0).contains(&self.elasticity))?;
        require("plasticity", self.plasticity, (0.0..=1.0).contains(&self.plasticity))
    }
}

impl Default for PbdConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters of the free particle system (bouncing spheres).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleConfig {
    pub gravity: Vec3,
    /// Linear velocity damping per unit time. Default: 0.9.
    pub drag: f32,
    /// Coefficient of restitution for impacts, in [0, 1]. Default: 0.8.
    pub restitution: f32,
    /// Lifetime after which particles are removed. Default: 3.0.
    pub max_age: f32,
    /// Inner corner of the container. Default: (-1, -1, -1).
    pub container_min: Vec3,
    /// Outer corner of the container. Default: (1, 1, 1).
    pub container_max: Vec3,
}

impl ParticleConfig {
    pub fn new() -> Self {
        ParticleConfig {
            gravity: GRAVITY,
            drag: 0.9,
            restitution: 0.8,
            max_age: 3.0,
            container_min: Vec3::splat(-1.0),
            container_max: Vec3::splat(1.0),
        }
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_drag(mut self, drag: f32) -> Self {
        self.drag = drag;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_age(mut self, max_age: f32) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_container(mut self, min: Vec3, max: Vec3) -> Self {
        self.container_min = min.min(max);
        self.container_max = min.max(max);
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        require_vec("gravity", self.gravity)?;
        require("drag", self.drag, self.drag >= 0.0)?;
        require("restitution", self.restitution, (0.0..=1.0).contains(&self.restitution))?;
        require("max_age", self.max_age, self.max_age > 0.0)?;
        require_vec("container_min", self.container_min)?;
        require_vec("container_max", self.container_max)?;
        let extent = self.container_max - self.container_min;
        require("container extent", extent.min_element(), extent.min_element() > 0.0)
    }
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters of the stable-fluids solver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluidConfig {
    /// Viscosity used when diffusing velocity. Default: 0.01.
    pub velocity_diffusion: f32,
    /// Diffusion rate of the density field. Default: 0.01.
    pub density_diffusion: f32,
    /// Gauss-Seidel sweeps per diffusion. Default: 15.
    pub diffusion_iterations: usize,
    /// Gauss-Seidel sweeps for the pressure Poisson solve. Default: 40.
    pub projection_iterations: usize,
    /// Default: reflective, fluid does not cross the walls.
    pub velocity_boundary: Boundary,
    /// Default: copy.
    pub density_boundary: Boundary,
}

impl FluidConfig {
    pub fn new() -> Self {
        FluidConfig {
            velocity_diffusion: 0.01,
            density_diffusion: 0.01,
            diffusion_iterations: 15,
            projection_iterations: 40,
            velocity_boundary: Boundary::Reflective,
            density_boundary: Boundary::Copy,
        }
    }

    pub fn with_velocity_diffusion(mut self, mu: f32) -> Self {
        self.velocity_diffusion = mu;
        self
    }

    pub fn with_density_diffusion(mut self, mu: f32) -> Self {
        self.density_diffusion = mu;
        self
    }

    pub fn with_diffusion_iterations(mut self, iterations: usize) -> Self {
        self.diffusion_iterations = iterations;
        self
    }

    pub fn with_projection_iterations(mut self, iterations: usize) -> Self {
        self.projection_iterations = iterations;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        require("velocity_diffusion", self.velocity_diffusion, self.velocity_diffusion >= 0.0)?;
        require("density_diffusion", self.density_diffusion, self.density_diffusion >= 0.0)?;
        require("diffusion_iterations", self.diffusion_iterations as f32, self.diffusion_iterations >= 1)?;
        require("projection_iterations", self.projection_iterations as f32, self.projection_iterations >= 1)
    }
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters of the smoothed-particle hydrodynamics solver.
///
/// The particle mass is derived from the rest density and kernel radius,
/// see [`particle_mass`](Self::particle_mass).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SphConfig {
    /// Kernel radius h, the influence distance of a particle. Default: 0.12.
    pub kernel_radius: f32,
    /// Density at which pressure vanishes. Default: 1.0.
    pub rest_density: f32,
    /// Kinematic viscosity nu. Default: 0.02.
    pub viscosity: f32,
    /// Converts density excess into pressure. Default: 8.0.
    pub stiffness: f32,
    /// Share of the velocity removed each step. Default: 0.005.
    pub damping: f32,
    /// Velocity kept, reversed, after hitting a wall. Default: 0.5.
    pub restitution: f32,
    pub gravity: Vec3,
    /// Default: (-1, -1, -1).
    pub container_min: Vec3,
    /// Default: (1, 1, 1).
    pub container_max: Vec3,
}

impl SphConfig {
    pub fn new() -> Self {
        SphConfig {
            kernel_radius: 0.12,
            rest_density: 1.0,
            viscosity: 0.02,
            stiffness: 8.0,
            damping: 0.005,
            restitution: 0.5,
            gravity: GRAVITY,
            container_min: Vec3::splat(-1.0),
            container_max: Vec3::splat(1.0),
        }
    }

    /// `rest_density * h²`.
    pub fn particle_mass(&self) -> f32 {
        self.rest_density * self.kernel_radius * self.kernel_radius
    }

    pub fn with_kernel_radius(mut self, h: f32) -> Self {
        self.kernel_radius = h;
        self
    }

    pub fn with_viscosity(mut self, viscosity: f32) -> Self {
        self.viscosity = viscosity;
        self
    }

    pub fn with_stiffness(mut self, stiffness: f32) -> Self {
        self.stiffness = stiffness;
        self
    }

    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn with_container(mut self, min: Vec3, max: Vec3) -> Self {
        self.container_min = min.min(max);
        self.container_max = min.max(max);
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        require("kernel_radius", self.kernel_radius, self.kernel_radius > 0.0)?;
        require("rest_density", self.rest_density, self.rest_density > 0.0)?;
        require("viscosity", self.viscosity, self.viscosity >= 0.0)?;
        require("stiffness", self.stiffness, self.stiffness >= 0.0)?;
        require("damping", self.damping, (0.0..=1.0).contains(&self.damping))?;
        require("restitution", self.restitution, (0.0..=1.0).contains(&self.restitution))?;
        require_vec("gravity", self.gravity)?;
        require_vec("container_min", self.container_min)?;
        require_vec("container_max", self.container_max)?;
        let extent = self.container_max - self.container_min;
        require("container extent", extent.min_element(), extent.min_element() > 0.0)
    }
}

impl Default for SphConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters of the CCD inverse kinematics solver.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IkConfig {
    /// Maximum number of CCD sweeps. Default: 20.
    pub iterations: usize,
    /// Distance at which the effector counts as on target. Default: 1e-4.
    pub tolerance: f32,
}

impl IkConfig {
    pub fn new() -> Self {
        IkConfig { iterations: 20, tolerance: 1e-4 }
    }

    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f32) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn validate(&self) -> SimResult<()> {
        require("iterations", self.iterations as f32, self.iterations >= 1)?;
        require("tolerance", self.tolerance, self.tolerance >= 0.0)
    }
}

impl Default for IkConfig {
    fn default() -> Self {
        Self::new()
    }
}
