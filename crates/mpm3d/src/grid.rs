//! Dense background grid for MPM.
//!
//! Cells are stored in a flat `Vec` (x fastest) and each cell sits behind its
//! own `Mutex`. Particle-parallel stages scatter into whichever cells a
//! particle touches, locking one cell per increment. Cell-parallel stages and
//! the particle stages that only read the grid go through `Mutex::get_mut`
//! and never lock at all.
//!
//! Per step the cell fields move through:
//! rasterize (mass, momentum) -> normalize (velocity) -> forces ->
//! integrate (velocity_star) -> collide -> solve (velocity_next) -> reset.

use std::sync::{Mutex, MutexGuard, PoisonError};

use glam::{IVec3, UVec3, Vec3};

use crate::hooks::{GridCollision, LinearSolver};
use crate::neighborhood::{flat_index, in_bounds};
use crate::parallel::ParallelExecutor;
use crate::params::SimulationParameters;
use crate::particle::Particle;
use crate::validate::assert_finite_vec3;

/// Per-cell accumulators. All fields are zero after [`Grid::reset`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Cell {
    pub mass: f32,
    /// Momentum while rasterizing, velocity once normalized.
    pub velocity: Vec3,
    pub force: Vec3,
    /// Velocity after explicit force integration.
    pub velocity_star: Vec3,
    /// Velocity after the linear solve.
    pub velocity_next: Vec3,
}

impl Cell {
    fn reset(&mut self) {
        *self = Cell::default();
    }
}

pub struct Grid {
    dims: UVec3,
    params: SimulationParameters,
    cells: Vec<Mutex<Cell>>,
}

impl Grid {
    /// Create a grid of `dims` cells with every accumulator at zero.
    pub fn new(dims: UVec3, params: SimulationParameters) -> Self {
        assert!(
            dims.x > 0 && dims.y > 0 && dims.z > 0,
            "Grid dimensions must be positive, got {dims}"
        );
        let cell_count = dims.x as usize * dims.y as usize * dims.z as usize;
        let cells = (0..cell_count).map(|_| Mutex::new(Cell::default())).collect();
        Self { dims, params, cells }
    }

    pub fn dims(&self) -> UVec3 {
        self.dims
    }

    pub fn cell_size(&self) -> f32 {
        self.params.cell_size
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Flat index of an in-range cell coordinate.
    #[inline]
    pub fn cell_index(&self, coord: UVec3) -> usize {
        flat_index(coord, self.dims)
    }

    /// Inverse of [`Grid::cell_index`].
    pub fn cell_coord(&self, index: usize) -> UVec3 {
        let nx = self.dims.x as usize;
        let ny = self.dims.y as usize;
        UVec3::new(
            (index % nx) as u32,
            ((index / nx) % ny) as u32,
            (index / (nx * ny)) as u32,
        )
    }

    #[inline]
    pub fn contains(&self, coord: IVec3) -> bool {
        in_bounds(coord, self.dims)
    }

    #[inline]
    fn lock(&self, index: usize) -> MutexGuard<'_, Cell> {
        // A poisoned cell means a worker already panicked; that panic is
        // what aborts the stage, so the data itself is still usable here.
        lock_cell(&self.cells[index])
    }

    /// Copy of the cell at `coord`.
    #[track_caller]
    pub fn cell(&self, coord: UVec3) -> Cell {
        assert!(
            coord.cmplt(self.dims).all(),
            "cell {coord} outside grid of {} cells",
            self.dims
        );
        *self.lock(self.cell_index(coord))
    }

    /// Every cell by flat index, read through exclusive access so the
    /// particle stages that only gather from the grid take no locks.
    pub fn cell_view(&mut self) -> Vec<&Cell> {
        self.cells.iter_mut().map(|cell| &*cell_mut(cell)).collect()
    }

    /// Visit every cell in index order.
    pub fn for_each_cell(&self, mut f: impl FnMut(UVec3, &Cell)) {
        for (index, cell) in self.cells.iter().enumerate() {
            f(self.cell_coord(index), &lock_cell(cell));
        }
    }

    /// Mutable access to one cell, for collision and solve strategies.
    #[track_caller]
    pub fn with_cell_mut<R>(&mut self, coord: UVec3, f: impl FnOnce(&mut Cell) -> R) -> R {
        assert!(
            coord.cmplt(self.dims).all(),
            "cell {coord} outside grid of {} cells",
            self.dims
        );
        let index = self.cell_index(coord);
        f(cell_mut(&mut self.cells[index]))
    }

    /// Every cell, mutably, in index order.
    pub fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> {
        self.cells.iter_mut().map(cell_mut)
    }

    pub fn total_mass(&self) -> f32 {
        self.cells.iter().map(|c| lock_cell(c).mass).sum()
    }

    /// Sum of `mass * velocity`. Meaningful after normalization.
    pub fn total_momentum(&self) -> Vec3 {
        self.cells
            .iter()
            .map(|c| {
                let cell = lock_cell(c);
                cell.velocity * cell.mass
            })
            .sum()
    }

    /// Cells that received mass this step.
    pub fn active_cell_count(&self) -> usize {
        self.cells.iter().filter(|c| lock_cell(c).mass > 0.0).count()
    }

    // =========================================================================
    // Pipeline stages
    // =========================================================================

    /// Scatter particle mass and momentum through the cached neighborhoods,
    /// then turn momentum into velocity.
    pub fn rasterize_particles(&mut self, particles: &[Particle], executor: &ParallelExecutor) {
        executor.for_each(particles, |particle| {
            let mass = particle.mass();
            let momentum = particle.velocity * mass;
            for neighbor in &particle.neighbors {
                let mut cell = self.lock(neighbor.index);
                cell.mass += neighbor.weight * mass;
                cell.velocity += neighbor.weight * momentum;
            }
        });
        self.normalize_velocities(executor);
    }

    /// velocity = momentum / mass. Empty cells are left at zero.
    pub fn normalize_velocities(&mut self, executor: &ParallelExecutor) {
        executor.for_each_mut(&mut self.cells, |cell| {
            let cell = cell_mut(cell);
            if cell.mass > 0.0 {
                cell.velocity /= cell.mass;
            }
        });
    }

    /// Accumulate `-volume * sigma * grad_w` from every particle.
    pub fn compute_grid_forces(&mut self, particles: &[Particle], executor: &ParallelExecutor) {
        let params = self.params;
        executor.for_each(particles, |particle| {
            let stress = particle.cauchy_stress(&params);
            let volume = particle.volume;
            for neighbor in &particle.neighbors {
                let force = -volume * (stress * neighbor.weight_gradient);
                self.lock(neighbor.index).force += force;
            }
        });
    }

    /// Add gravity and integrate: `velocity_star = velocity + dt / mass * force`.
    pub fn update_grid_velocities(&mut self, dt: f32, executor: &ParallelExecutor) {
        let gravity = self.params.gravity_vector();
        executor.for_each_mut(&mut self.cells, |cell| {
            let cell = cell_mut(cell);
            cell.force += cell.mass * gravity;
            if cell.mass > 0.0 {
                cell.velocity_star = cell.velocity + dt / cell.mass * cell.force;
                assert_finite_vec3(cell.velocity_star, "grid velocity");
            }
        });
    }

    /// Grid-based collision stage.
    pub fn apply_collisions(&mut self, collision: &mut dyn GridCollision, dt: f32) {
        collision.resolve(self, dt);
    }

    /// Linear solve stage; produces `velocity_next`.
    pub fn solve(&mut self, solver: &mut dyn LinearSolver, dt: f32) {
        solver.solve(self, dt);
    }

    /// Zero every cell.
    pub fn reset(&mut self, executor: &ParallelExecutor) {
        executor.for_each_mut(&mut self.cells, |cell| cell_mut(cell).reset());
    }
}

#[inline]
fn lock_cell(cell: &Mutex<Cell>) -> MutexGuard<'_, Cell> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Exclusive access without locking.
#[inline]
fn cell_mut(cell: &mut Mutex<Cell>) -> &mut Cell {
    cell.get_mut().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for Grid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grid")
            .field("dims", &self.dims)
            .field("cell_size", &self.params.cell_size)
            .finish()
    }
}
