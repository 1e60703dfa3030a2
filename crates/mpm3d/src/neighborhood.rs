//! Kernel neighborhood of a particle.
//!
//! Both transfer directions visit the same cells with the same weights, so the
//! scan runs once per particle per step and the result is cached on the
//! particle. The scan covers a 5x5x5 block around the particle's base cell;
//! the cubic kernel is nonzero on at most 4 of those cells per axis, which
//! bounds the cache at 4^3 entries.

use glam::{IVec3, UVec3, Vec3};

use crate::kernels::{cubic_bspline_3d, cubic_bspline_3d_gradient, NEIGHBORHOOD_RADIUS};

/// Largest number of cells with nonzero weight or gradient for one particle.
pub const MAX_NEIGHBORS: usize = 64;

/// Flat cell index, x fastest.
#[inline]
pub fn flat_index(coord: UVec3, dims: UVec3) -> usize {
    (coord.z as usize * dims.y as usize + coord.y as usize) * dims.x as usize + coord.x as usize
}

/// Whether a signed cell coordinate lies inside a grid of `dims` cells.
#[inline]
pub fn in_bounds(coord: IVec3, dims: UVec3) -> bool {
    coord.cmpge(IVec3::ZERO).all() && coord.as_uvec3().cmplt(dims).all()
}

/// One cached (cell, weight, gradient) entry.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridNeighbor {
    pub cell: UVec3,
    /// Flat index into the grid's cell array.
    pub index: usize,
    pub weight: f32,
    pub weight_gradient: Vec3,
}

impl GridNeighbor {
    const EMPTY: Self = Self {
        cell: UVec3::ZERO,
        index: 0,
        weight: 0.0,
        weight_gradient: Vec3::ZERO,
    };
}

/// Fixed-capacity neighbor list stored inline in each particle.
#[derive(Clone, Debug)]
pub struct NeighborCache {
    entries: [GridNeighbor; MAX_NEIGHBORS],
    len: usize,
}

impl NeighborCache {
    pub const fn new() -> Self {
        Self {
            entries: [GridNeighbor::EMPTY; MAX_NEIGHBORS],
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Append an entry. Panics when the cache is already full; nothing is
    /// written in that case.
    #[track_caller]
    pub fn push(&mut self, neighbor: GridNeighbor) {
        assert!(
            self.len < MAX_NEIGHBORS,
            "neighbor cache overflow: more than {MAX_NEIGHBORS} cells in a particle's kernel support"
        );
        self.entries[self.len] = neighbor;
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == MAX_NEIGHBORS
    }

    pub fn as_slice(&self) -> &[GridNeighbor] {
        &self.entries[..self.len]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GridNeighbor> {
        self.as_slice().iter()
    }
}

impl Default for NeighborCache {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> IntoIterator for &'a NeighborCache {
    type Item = &'a GridNeighbor;
    type IntoIter = std::slice::Iter<'a, GridNeighbor>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Every cell of the 5x5x5 block around the particle, with the distance from
/// the cell to the particle measured in cells (`position / H - coord`).
///
/// Coordinates may fall outside the grid; filtering is up to the caller.
pub fn scan(position: Vec3, cell_size: f32) -> impl Iterator<Item = (IVec3, Vec3)> {
    let scaled = position / cell_size;
    let base = scaled.floor().as_ivec3();
    let r = NEIGHBORHOOD_RADIUS;
    (-r..=r).flat_map(move |dz| {
        (-r..=r).flat_map(move |dy| {
            (-r..=r).map(move |dx| {
                let coord = base + IVec3::new(dx, dy, dz);
                (coord, scaled - coord.as_vec3())
            })
        })
    })
}

/// Rebuild `cache` for a particle at `position` in a grid of `dims` cells.
///
/// Out-of-range cells are skipped, as are cells where both the weight and its
/// gradient vanish.
pub fn fill_cache(cache: &mut NeighborCache, position: Vec3, cell_size: f32, dims: UVec3) {
    cache.clear();
    for (coord, delta) in scan(position, cell_size) {
        if !in_bounds(coord, dims) {
            continue;
        }
        let weight = cubic_bspline_3d(delta);
        let weight_gradient = cubic_bspline_3d_gradient(delta, cell_size);
        if weight == 0.0 && weight_gradient == Vec3::ZERO {
            continue;
        }
        let cell = coord.as_uvec3();
        cache.push(GridNeighbor {
            cell,
            index: flat_index(cell, dims),
            weight,
            weight_gradient,
        });
    }
}
