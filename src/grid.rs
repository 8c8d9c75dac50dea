//! Dense 2D spatial field with bilinear sampling and boundary conditions.

use core::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::field::{Axis, FieldValue};

/// How the outer ring of cells is filled from the interior.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Boundary {
    /// Duplicate the nearest interior value outward.
    Copy,
    /// Copy, then negate the component normal to the wall so nothing
    /// crosses it.
    Reflective,
}

/// A dense `nx` by `ny` array of samples.
///
/// The sample at `(x, y)` is stored at offset `x + nx * y`, so a row of
/// constant `y` is contiguous.
#[derive(Clone, Debug, PartialEq)]
pub struct Grid2D<T> {
    nx: usize,
    ny: usize,
    data: Vec<T>,
}

impl<T: Copy> Grid2D<T> {
    /// Create a grid with every sample set to `value`.
    pub fn filled(nx: usize, ny: usize, value: T) -> Self {
        Grid2D { nx, ny, data: vec![value; nx * ny] }
    }

    /// Wrap a flat buffer laid out as `x + nx * y`.
    pub fn from_vec(nx: usize, ny: usize, data: Vec<T>) -> SimResult<Self> {
        if data.len() != nx * ny {
            return Err(SimError::LengthMismatch {
                name: "grid data",
                expected: nx * ny,
                actual: data.len(),
            });
        }
        Ok(Grid2D { nx, ny, data })
    }

    pub fn nx(&self) -> usize { self.nx }
    pub fn ny(&self) -> usize { self.ny }
    pub fn dimensions(&self) -> (usize, usize) { (self.nx, self.ny) }
    pub fn len(&self) -> usize { self.data.len() }
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    pub fn offset(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.nx && y < self.ny, "({}, {}) outside {}x{} grid", x, y, self.nx, self.ny);
        x + self.nx * y
    }

    /// Inverse of [`offset`](Self::offset).
    pub fn coords(&self, offset: usize) -> (usize, usize) {
        (offset % self.nx, offset / self.nx)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        if x < self.nx && y < self.ny {
            Some(self.data[x + self.nx * y])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        if x < self.nx && y < self.ny {
            self.data.get_mut(x + self.nx * y)
        } else {
            None
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    pub fn data(&self) -> &[T] { &self.data }
    pub fn data_mut(&mut self) -> &mut [T] { &mut self.data }
    pub fn into_vec(self) -> Vec<T> { self.data }

    /// Axis neighbours (±1 in x and y) of `(x, y)` that lie inside the grid.
    pub fn neighbors(&self, x: usize, y: usize) -> impl Iterator<Item = (usize, usize)> {
        let (nx, ny) = (self.nx as isize, self.ny as isize);
        let (x, y) = (x as isize, y as isize);
        [(-1, 0), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .map(move |(dx, dy)| (x + dx, y + dy))
            .filter(move |&(u, v)| u >= 0 && v >= 0 && u < nx && v < ny)
            .map(|(u, v)| (u as usize, v as usize))
    }
}

impl<T: FieldValue> Grid2D<T> {
    /// Create a grid filled with zeros.
    pub fn new(nx: usize, ny: usize) -> Self {
        Self::filled(nx, ny, T::zero())
    }

    /// Bilinear interpolation at continuous grid coordinates.
    ///
    /// Coordinates are clamped to `[0, nx-1] x [0, ny-1]`, so sampling
    /// outside the grid returns the nearest edge value. An axis with a
    /// single sample is constant along it, and an empty grid samples to zero.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> T {
        if self.data.is_empty() {
            return T::zero();
        }
        let (x0, x1, fx) = axis_cell(x, self.nx);
        let (y0, y1, fy) = axis_cell(y, self.ny);

        let bottom = self[(x0, y0)].lerp(self[(x1, y0)], fx);
        let top = self[(x0, y1)].lerp(self[(x1, y1)], fx);
        bottom.lerp(top, fy)
    }

    /// Largest magnitude over all samples.
    pub fn max_magnitude(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, v| acc.max(v.magnitude()))
    }
}

/// Lower sample, upper sample and blend factor for `c` on an axis of `n`
/// samples.
fn axis_cell(c: f32, n: usize) -> (usize, usize, f32) {
    if n < 2 {
        return (0, 0, 0.0);
    }
    let c = c.clamp(0.0, (n - 1) as f32);
    let lower = (c.floor() as usize).min(n - 2);
    (lower, lower + 1, c - lower as f32)
}

impl<T> Index<(usize, usize)> for Grid2D<T> {
    type Output = T;
    fn index(&self, (x, y): (usize, usize)) -> &T {
        &self.data[x + self.nx * y]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid2D<T> {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut T {
        &mut self.data[x + self.nx * y]
    }
}

/// Fill the outer ring of `grid` from its interior according to `boundary`.
pub fn apply_boundary<T: FieldValue>(grid: &mut Grid2D<T>, boundary: Boundary) {
    let (nx, ny) = grid.dimensions();
    if nx < 3 || ny < 3 {
        return;
    }

    for x in 1..nx - 1 {
        grid[(x, 0)] = grid[(x, 1)];
        grid[(x, ny - 1)] = grid[(x, ny - 2)];
    }
    for y in 1..ny - 1 {
        grid[(0, y)] = grid[(1, y)];
        grid[(nx - 1, y)] = grid[(nx - 2, y)];
    }
    set_corners(grid);

    if boundary == Boundary::Reflective {
        for x in 1..nx - 1 {
            grid[(x, 0)] = grid[(x, 0)].negate_axis(Axis::Y);
            grid[(x, ny - 1)] = grid[(x, ny - 1)].negate_axis(Axis::Y);
        }
        for y in 1..ny - 1 {
            grid[(0, y)] = grid[(0, y)].negate_axis(Axis::X);
            grid[(nx - 1, y)] = grid[(nx - 1, y)].negate_axis(Axis::X);
        }
    }
}

/// Each corner becomes the mean of its two edge neighbours.
fn set_corners<T: FieldValue>(grid: &mut Grid2D<T>) {
    let (nx, ny) = grid.dimensions();
    grid[(0, 0)] = (grid[(1, 0)] + grid[(0, 1)]).scale(0.5);
    grid[(nx - 1, 0)] = (grid[(nx - 2, 0)] + grid[(nx - 1, 1)]).scale(0.5);
    grid[(0, ny - 1)] = (grid[(1, ny - 1)] + grid[(0, ny - 2)]).scale(0.5);
    grid[(nx - 1, ny - 1)] = (grid[(nx - 2, ny - 1)] + grid[(nx - 1, ny - 2)]).scale(0.5);
}
