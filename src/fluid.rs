//! Stable Fluids on a collocated 2D grid.
//!
//! All distances are in cell units and velocities in cells per unit time.
//! Interior cells are `1..n-1` on each axis; the outer ring is filled by the
//! configured [`Boundary`] policy.

use glam::{Vec2, Vec3};

use crate::config::{validate_time_step, FluidConfig};
use crate::error::{SimError, SimResult};
use crate::field::FieldValue;
use crate::grid::{apply_boundary, Boundary, Grid2D};

/// Implicit diffusion `(I - mu dt ∇²) field = previous` by Gauss-Seidel.
///
/// `field` is the initial guess and is relaxed in place. The boundary is
/// reapplied after every sweep.
pub fn diffuse<T: FieldValue>(
    field: &mut Grid2D<T>,
    previous: &Grid2D<T>,
    mu: f32,
    dt: f32,
    iterations: usize,
    boundary: Boundary,
) {
    let (nx, ny) = field.dimensions();
    if nx < 3 || ny < 3 {
        return;
    }
    let a = mu * dt;
    let denom = 1.0 / (1.0 + 4.0 * a);
    for _ in 0..iterations {
        for y in 1..ny - 1 {
            for x in 1..nx - 1 {
                let around = field[(x - 1, y)] + field[(x + 1, y)] + field[(x, y - 1)] + field[(x, y + 1)];
                field[(x, y)] = (previous[(x, y)] + around * a) * denom;
            }
        }
        apply_boundary(field, boundary);
    }
}

/// Semi-Lagrangian transport of `source` along `velocity` into `field`.
///
/// Each interior cell traces back by `dt` along the velocity averaged over
/// the four half-cell offsets around it and takes the bilinear sample there.
/// `source` is never written, so no cell reads a value from this pass.
pub fn advect<T: FieldValue>(field: &mut Grid2D<T>, source: &Grid2D<T>, velocity: &Grid2D<Vec2>, dt: f32) {
    let (nx, ny) = field.dimensions();
    if nx < 3 || ny < 3 {
        return;
    }
    for y in 1..ny - 1 {
        for x in 1..nx - 1 {
            let (fx, fy) = (x as f32, y as f32);
            let v = (velocity.sample_bilinear(fx - 0.5, fy - 0.5)
                + velocity.sample_bilinear(fx + 0.5, fy - 0.5)
                + velocity.sample_bilinear(fx - 0.5, fy + 0.5)
                + velocity.sample_bilinear(fx + 0.5, fy + 0.5))
                * 0.25;
            let back = Vec2::new(fx, fy) - v * dt;
            field[(x, y)] = source.sample_bilinear(back.x, back.y);
        }
    }
}

/// Discrete divergence at interior cells, zero on the boundary ring.
///
/// Forward differences, paired with the backward-difference gradient in
/// [`project`] so that their composition is the 5-point Laplacian.
pub fn divergence(velocity: &Grid2D<Vec2>, out: &mut Grid2D<f32>) {
    let (nx, ny) = velocity.dimensions();
    out.fill(0.0);
    if nx < 3 || ny < 3 {
        return;
    }
    for y in 1..ny - 1 {
        for x in 1..nx - 1 {
            out[(x, y)] = velocity[(x + 1, y)].x - velocity[(x, y)].x + velocity[(x, y + 1)].y - velocity[(x, y)].y;
        }
    }
}

/// Remove the gradient part of `velocity`.
///
/// Solves `∇²φ = div v` by Gauss-Seidel with `φ = 0` on the boundary, then
/// subtracts `∇φ`. `divergence_out` and `potential` are scratch grids of the
/// same size as `velocity`. The boundary ring is left as the gradient
/// subtraction leaves it; [`FluidSolver::project_velocity`] reapplies the
/// wall policy afterwards.
pub fn project(velocity: &mut Grid2D<Vec2>, divergence_out: &mut Grid2D<f32>, potential: &mut Grid2D<f32>, iterations: usize) {
    let (nx, ny) = velocity.dimensions();
    if nx < 3 || ny < 3 {
        return;
    }
    divergence(velocity, divergence_out);

    potential.fill(0.0);
    for _ in 0..iterations {
        for y in 1..ny - 1 {
            for x in 1..nx - 1 {
                let around = potential[(x - 1, y)] + potential[(x + 1, y)] + potential[(x, y - 1)] + potential[(x, y + 1)];
                potential[(x, y)] = (around - divergence_out[(x, y)]) * 0.25;
            }
        }
    }

    for y in 0..ny {
        for x in 1..nx {
            velocity[(x, y)].x -= potential[(x, y)] - potential[(x - 1, y)];
        }
    }
    for y in 1..ny {
        for x in 0..nx {
            velocity[(x, y)].y -= potential[(x, y)] - potential[(x, y - 1)];
        }
    }
}

/// Scalar vorticity `∂v_y/∂x - ∂v_x/∂y` by central differences, zero on the boundary.
pub fn curl(velocity: &Grid2D<Vec2>) -> Grid2D<f32> {
    let (nx, ny) = velocity.dimensions();
    let mut out = Grid2D::new(nx, ny);
    if nx < 3 || ny < 3 {
        return out;
    }
    for y in 1..ny - 1 {
        for x in 1..nx - 1 {
            let dvy = velocity[(x + 1, y)].y - velocity[(x - 1, y)].y;
            let dvx = velocity[(x, y + 1)].x - velocity[(x, y - 1)].x;
            out[(x, y)] = 0.5 * (dvy - dvx);
        }
    }
    out
}

/// Largest absolute interior divergence.
pub fn max_divergence(velocity: &Grid2D<Vec2>) -> f32 {
    let mut scratch = Grid2D::new(velocity.nx(), velocity.ny());
    divergence(velocity, &mut scratch);
    scratch.max_magnitude()
}

/// Velocity and density grids with their previous-step buffers.
///
/// The density defaults to RGB so several dyes can be carried at once.
#[derive(Clone, Debug)]
pub struct FluidSolver<D: FieldValue = Vec3> {
    velocity: Grid2D<Vec2>,
    velocity_prev: Grid2D<Vec2>,
    density: Grid2D<D>,
    density_prev: Grid2D<D>,
    divergence: Grid2D<f32>,
    potential: Grid2D<f32>,
}

impl<D: FieldValue> FluidSolver<D> {
    /// At least 3x3 so that there is an interior.
    pub fn new(nx: usize, ny: usize) -> SimResult<Self> {
        if nx < 3 || ny < 3 {
            return Err(SimError::InvalidGridDimensions { nx, ny, min: 3 });
        }
        log::debug!("fluid grid {}x{}", nx, ny);
        Ok(FluidSolver {
            velocity: Grid2D::new(nx, ny),
            velocity_prev: Grid2D::new(nx, ny),
            density: Grid2D::new(nx, ny),
            density_prev: Grid2D::new(nx, ny),
            divergence: Grid2D::new(nx, ny),
            potential: Grid2D::new(nx, ny),
        })
    }

    /// Replace the density field, e.g. with an initial dye pattern.
    pub fn with_density(mut self, density: Grid2D<D>) -> SimResult<Self> {
        if density.dimensions() != self.density.dimensions() {
            let (nx, ny) = self.density.dimensions();
            return Err(SimError::LengthMismatch { name: "density grid", expected: nx * ny, actual: density.len() });
        }
        self.density_prev = density.clone();
        self.density = density;
        Ok(self)
    }

    pub fn dimensions(&self) -> (usize, usize) { self.velocity.dimensions() }
    pub fn velocity(&self) -> &Grid2D<Vec2> { &self.velocity }
    pub fn velocity_mut(&mut self) -> &mut Grid2D<Vec2> { &mut self.velocity }
    pub fn density(&self) -> &Grid2D<D> { &self.density }
    pub fn density_mut(&mut self) -> &mut Grid2D<D> { &mut self.density }

    pub fn reset_velocity(&mut self) {
        self.velocity.fill(Vec2::ZERO);
        self.velocity_prev.fill(Vec2::ZERO);
    }

    /// Add `velocity * exp(-d² / radius²)` around `center` (cell units).
    pub fn add_velocity_splat(&mut self, center: Vec2, velocity: Vec2, radius: f32) {
        splat(&mut self.velocity, center, velocity, radius);
    }

    /// Same falloff as [`add_velocity_splat`](Self::add_velocity_splat), for dye.
    pub fn add_density_splat(&mut self, center: Vec2, amount: D, radius: f32) {
        splat(&mut self.density, center, amount, radius);
    }

    pub fn curl(&self) -> Grid2D<f32> {
        curl(&self.velocity)
    }

    /// Make the velocity divergence-free, then restore the wall policy on
    /// the boundary ring so the next advection reads consistent values.
    pub fn project_velocity(&mut self, config: &FluidConfig) {
        project(&mut self.velocity, &mut self.divergence, &mut self.potential, config.projection_iterations);
        apply_boundary(&mut self.velocity, config.velocity_boundary);
    }

    /// Diffuse and project the velocity, self-advect it, then diffuse and
    /// advect the density through the updated velocity.
    pub fn step(&mut self, dt: f32, config: &FluidConfig) -> SimResult<()> {
        validate_time_step(dt)?;
        config.validate()?;

        self.velocity_prev.clone_from(&self.velocity);
        diffuse(
            &mut self.velocity,
            &self.velocity_prev,
            config.velocity_diffusion,
            dt,
            config.diffusion_iterations,
            config.velocity_boundary,
        );
        self.project_velocity(config);

        self.velocity_prev.clone_from(&self.velocity);
        advect(&mut self.velocity, &self.velocity_prev, &self.velocity_prev, dt);
        apply_boundary(&mut self.velocity, config.velocity_boundary);

        self.density_prev.clone_from(&self.density);
        diffuse(
            &mut self.density,
            &self.density_prev,
            config.density_diffusion,
            dt,
            config.diffusion_iterations,
            config.density_boundary,
        );
        self.density_prev.clone_from(&self.density);
        advect(&mut self.density, &self.density_prev, &self.velocity, dt);
        apply_boundary(&mut self.density, config.density_boundary);
        Ok(())
    }
}

fn splat<T: FieldValue>(grid: &mut Grid2D<T>, center: Vec2, value: T, radius: f32) {
    if radius <= 0.0 {
        return;
    }
    let inv_r2 = 1.0 / (radius * radius);
    let (nx, ny) = grid.dimensions();
    for y in 0..ny {
        for x in 0..nx {
            let d2 = (Vec2::new(x as f32, y as f32) - center).length_squared();
            let w = (-d2 * inv_r2).exp();
            grid[(x, y)] = grid[(x, y)] + value * w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_tiny_grid() {
        assert!(matches!(FluidSolver::<f32>::new(2, 8), Err(SimError::InvalidGridDimensions { min: 3, .. })));
    }

    #[test]
    fn diffusion_keeps_uniform_field() {
        let prev = Grid2D::filled(6, 6, 2.0f32);
        let mut field = prev.clone();
        diffuse(&mut field, &prev, 0.5, 0.1, 15, Boundary::Copy);
        for v in field.data() {
            assert!((v - 2.0).abs() < 1e-5);
        }
    }

    #[test]
    fn diffusion_spreads_a_spike() {
        let mut prev: Grid2D<f32> = Grid2D::new(7, 7);
        prev[(3, 3)] = 1.0;
        let mut field = prev.clone();
        diffuse(&mut field, &prev, 1.0, 1.0, 15, Boundary::Copy);
        assert!(field[(3, 3)] < 1.0);
        assert!(field[(2, 3)] > 0.0);
        assert!((field[(2, 3)] - field[(4, 3)]).abs() < 0.05);
    }

    #[test]
    fn zero_velocity_advection_is_identity() {
        let mut source: Grid2D<f32> = Grid2D::new(5, 5);
        source[(2, 2)] = 3.0;
        source[(1, 3)] = -1.0;
        let velocity = Grid2D::new(5, 5);
        let mut field = Grid2D::new(5, 5);
        advect(&mut field, &source, &velocity, 0.1);
        assert_eq!(field[(2, 2)], 3.0);
        assert_eq!(field[(1, 3)], -1.0);
    }

    #[test]
    fn uniform_velocity_shifts_by_one_cell() {
        let mut source: Grid2D<f32> = Grid2D::new(8, 8);
        source[(3, 4)] = 1.0;
        let velocity = Grid2D::filled(8, 8, Vec2::new(1.0, 0.0));
        let mut field = Grid2D::new(8, 8);
        advect(&mut field, &source, &velocity, 1.0);
        assert!((field[(4, 4)] - 1.0).abs() < 1e-6);
        assert!(field[(3, 4)].abs() < 1e-6);
    }

    #[test]
    fn projection_removes_source() {
        let mut velocity: Grid2D<Vec2> = Grid2D::new(12, 12);
        velocity[(6, 6)] = Vec2::new(1.0, 0.0);
        velocity[(5, 6)] = Vec2::new(-1.0, 0.0);
        let mut div = Grid2D::new(12, 12);
        let mut phi = Grid2D::new(12, 12);
        assert!(max_divergence(&velocity) > 0.5);
        project(&mut velocity, &mut div, &mut phi, 400);
        assert!(max_divergence(&velocity) < 1e-3);
    }

    #[test]
    fn rotation_has_positive_curl() {
        let mut velocity: Grid2D<Vec2> = Grid2D::new(5, 5);
        for y in 0..5 {
            for x in 0..5 {
                velocity[(x, y)] = Vec2::new(-(y as f32 - 2.0), x as f32 - 2.0);
            }
        }
        let c = curl(&velocity);
        assert!((c[(2, 2)] - 2.0).abs() < 1e-6);
        assert_eq!(c[(0, 0)], 0.0);
    }

    #[test]
    fn splat_peaks_at_center() {
        let mut solver: FluidSolver<f32> = FluidSolver::new(9, 9).unwrap();
        solver.add_velocity_splat(Vec2::new(4.0, 4.0), Vec2::new(0.0, 2.0), 1.5);
        assert!((solver.velocity()[(4, 4)].y - 2.0).abs() < 1e-6);
        assert!(solver.velocity()[(6, 4)].y < solver.velocity()[(5, 4)].y);
    }

    #[test]
    fn projected_velocity_is_reflective_at_walls() {
        let mut solver: FluidSolver<f32> = FluidSolver::new(10, 10).unwrap();
        solver.add_velocity_splat(Vec2::new(2.0, 5.0), Vec2::new(-3.0, 1.0), 2.0);
        solver.add_velocity_splat(Vec2::new(7.0, 1.5), Vec2::new(0.5, -2.0), 2.0);
        solver.project_velocity(&FluidConfig::new());

        let v = solver.velocity();
        for k in 1..9 {
            assert_eq!(v[(0, k)], Vec2::new(-v[(1, k)].x, v[(1, k)].y));
            assert_eq!(v[(9, k)], Vec2::new(-v[(8, k)].x, v[(8, k)].y));
            assert_eq!(v[(k, 0)], Vec2::new(v[(k, 1)].x, -v[(k, 1)].y));
            assert_eq!(v[(k, 9)], Vec2::new(v[(k, 8)].x, -v[(k, 8)].y));
        }
    }

    #[test]
    fn step_rejects_bad_inputs() {
        let mut solver: FluidSolver<f32> = FluidSolver::new(5, 5).unwrap();
        assert_eq!(
            solver.step(0.0, &FluidConfig::new()),
            Err(SimError::InvalidParameter { name: "dt", value: 0.0 })
        );
        assert!(solver.step(0.1, &FluidConfig::new().with_density_diffusion(-1.0)).is_err());
        assert!(solver.step(0.1, &FluidConfig::new()).is_ok());
    }
}
