//! Free-form deformation with a Bézier control lattice.
//!
//! A mesh is embedded in an axis-aligned box covered by an `nx × ny × nz`
//! lattice of control points. Each vertex is given lattice coordinates
//! `(u, v, w)` in the box, once, and its deformed position is
//! `Σ B_i(u) B_j(v) B_k(w) P_ijk` with Bernstein polynomials `B` of degree
//! `n - 1` on each axis. Moving control points then only costs the weighted
//! sum.

use glam::Vec3;

use crate::error::{SimError, SimResult};

/// `n` choose `k`, computed incrementally so small lattices never overflow.
pub fn binomial(n: usize, k: usize) -> f32 {
    if k > n {
        return 0.0;
    }
    let k = k.min(n - k);
    (0..k).fold(1.0f32, |acc, i| acc * (n - i) as f32 / (i + 1) as f32)
}

/// Bernstein basis polynomial `C(n, k) t^k (1 - t)^(n - k)`.
pub fn bernstein(n: usize, k: usize, t: f32) -> f32 {
    binomial(n, k) * t.powi(k as i32) * (1.0 - t).powi((n - k) as i32)
}

/// Control points laid out on a regular grid over `[min, max]` at rest.
#[derive(Clone, Debug, PartialEq)]
pub struct Lattice {
    dims: [usize; 3],
    min: Vec3,
    max: Vec3,
    control: Vec<Vec3>,
}

impl Lattice {
    /// At least two control points per axis and a box with positive extent.
    pub fn new(dims: [usize; 3], min: Vec3, max: Vec3) -> SimResult<Self> {
        if let Some(&n) = dims.iter().find(|&&n| n < 2) {
            return Err(SimError::InvalidParameter { name: "lattice resolution", value: n as f32 });
        }
        let extent = max - min;
        if !min.is_finite() || !max.is_finite() || extent.min_element() <= 0.0 {
            return Err(SimError::InvalidParameter { name: "lattice extent", value: extent.min_element() });
        }
        let mut lattice = Lattice { dims, min, max, control: vec![Vec3::ZERO; dims[0] * dims[1] * dims[2]] };
        lattice.reset();
        Ok(lattice)
    }

    /// `n × n × n` points over the unit cube.
    pub fn unit(n: usize) -> SimResult<Self> {
        Self::new([n; 3], Vec3::ZERO, Vec3::ONE)
    }

    pub fn dimensions(&self) -> [usize; 3] { self.dims }
    pub fn bounds(&self) -> (Vec3, Vec3) { (self.min, self.max) }
    pub fn control_points(&self) -> &[Vec3] { &self.control }
    pub fn control_points_mut(&mut self) -> &mut [Vec3] { &mut self.control }

    /// Storage offset of `(kx, ky, kz)`, x varying fastest.
    pub fn offset(&self, kx: usize, ky: usize, kz: usize) -> Option<usize> {
        let [nx, ny, nz] = self.dims;
        (kx < nx && ky < ny && kz < nz).then(|| kx + nx * (ky + ny * kz))
    }

    pub fn control(&self, kx: usize, ky: usize, kz: usize) -> Option<Vec3> {
        self.offset(kx, ky, kz).map(|k| self.control[k])
    }

    pub fn set_control(&mut self, kx: usize, ky: usize, kz: usize, position: Vec3) -> SimResult<()> {
        let count = self.control.len();
        let [nx, ny, _] = self.dims;
        let k = self
            .offset(kx, ky, kz)
            .ok_or(SimError::IndexOutOfBounds { index: kx + nx * (ky + ny * kz), count })?;
        self.control[k] = position;
        Ok(())
    }

    /// Put every control point back on its rest position.
    pub fn reset(&mut self) {
        let [nx, ny, nz] = self.dims;
        let extent = self.max - self.min;
        for kz in 0..nz {
            for ky in 0..ny {
                for kx in 0..nx {
                    let t = Vec3::new(
                        kx as f32 / (nx - 1) as f32,
                        ky as f32 / (ny - 1) as f32,
                        kz as f32 / (nz - 1) as f32,
                    );
                    self.control[kx + nx * (ky + ny * kz)] = self.min + extent * t;
                }
            }
        }
    }

    /// Lattice coordinates of `p`, `(0, 0, 0)` at `min` and `(1, 1, 1)` at `max`.
    pub fn parameters(&self, p: Vec3) -> Vec3 {
        (p - self.min) / (self.max - self.min)
    }

    /// Pairs of control point offsets joined along an axis, for drawing the cage.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let [nx, ny, nz] = self.dims;
        let at = |x: usize, y: usize, z: usize| x + nx * (y + ny * z);
        let mut edges = Vec::with_capacity((nx - 1) * ny * nz + nx * (ny - 1) * nz + nx * ny * (nz - 1));
        for z in 0..nz {
            for y in 0..ny {
                for x in 0..nx {
                    if x + 1 < nx {
                        edges.push((at(x, y, z), at(x + 1, y, z)));
                    }
                    if y + 1 < ny {
                        edges.push((at(x, y, z), at(x, y + 1, z)));
                    }
                    if z + 1 < nz {
                        edges.push((at(x, y, z), at(x, y, z + 1)));
                    }
                }
            }
        }
        edges
    }
}

/// A mesh bound to a lattice, with its Bernstein weights precomputed.
#[derive(Clone, Debug)]
pub struct FreeFormDeformation {
    lattice: Lattice,
    /// `weights[v * controls + c]` is the influence of control point `c` on vertex `v`.
    weights: Vec<f32>,
    vertex_count: usize,
}

impl FreeFormDeformation {
    /// Bind `rest` to `lattice`. The lattice is reset to its rest layout so
    /// the first [`deform`](Self::deform) returns `rest`.
    pub fn new(mut lattice: Lattice, rest: &[Vec3]) -> Self {
        lattice.reset();
        let weights = precompute_weights(&lattice, rest);
        log::debug!("ffd bound {} vertices to a {:?} lattice", rest.len(), lattice.dimensions());
        FreeFormDeformation { lattice, weights, vertex_count: rest.len() }
    }

    pub fn lattice(&self) -> &Lattice { &self.lattice }
    pub fn lattice_mut(&mut self) -> &mut Lattice { &mut self.lattice }
    pub fn vertex_count(&self) -> usize { self.vertex_count }

    /// Influence of every control point on `vertex`, in lattice storage order.
    pub fn weights(&self, vertex: usize) -> Option<&[f32]> {
        let controls = self.lattice.control.len();
        self.weights.get(vertex * controls..(vertex + 1) * controls)
    }

    /// Deformed positions for the current control points.
    pub fn deform(&self) -> Vec<Vec3> {
        let mut out = vec![Vec3::ZERO; self.vertex_count];
        self.accumulate(&mut out);
        out
    }

    pub fn deform_into(&self, out: &mut [Vec3]) -> SimResult<()> {
        if out.len() != self.vertex_count {
            return Err(SimError::LengthMismatch { name: "ffd output", expected: self.vertex_count, actual: out.len() });
        }
        self.accumulate(out);
        Ok(())
    }

    fn accumulate(&self, out: &mut [Vec3]) {
        let controls = self.lattice.control_points();
        for (p, w) in out.iter_mut().zip(self.weights.chunks_exact(controls.len())) {
            *p = controls.iter().zip(w).fold(Vec3::ZERO, |acc, (c, w)| acc + *c * *w);
        }
    }
}

/// Tensor-product Bernstein weights of every position, flattened vertex-major.
pub fn precompute_weights(lattice: &Lattice, positions: &[Vec3]) -> Vec<f32> {
    let [nx, ny, nz] = lattice.dims;
    let mut weights = Vec::with_capacity(positions.len() * nx * ny * nz);
    let mut bx = vec![0.0; nx];
    let mut by = vec![0.0; ny];
    let mut bz = vec![0.0; nz];
    for p in positions {
        let t = lattice.parameters(*p);
        basis(&mut bx, t.x);
        basis(&mut by, t.y);
        basis(&mut bz, t.z);
        for wz in &bz {
            for wy in &by {
                for wx in &bx {
                    weights.push(wx * wy * wz);
                }
            }
        }
    }
    weights
}

fn basis(out: &mut [f32], t: f32) {
    let degree = out.len() - 1;
    for (k, b) in out.iter_mut().enumerate() {
        *b = bernstein(degree, k, t);
    }
}
