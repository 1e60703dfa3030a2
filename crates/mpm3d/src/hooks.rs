//! Extension points in the step pipeline.
//!
//! The solver calls each hook at a fixed point of every step, on the calling
//! thread. `()` is the no-op implementation for the collision hooks.

use crate::grid::Grid;
use crate::particle::Particle;

/// Runs after grid velocity integration, before the linear solve. May edit
/// `velocity_star` of any cell.
pub trait GridCollision: Send {
    fn resolve(&mut self, grid: &mut Grid, dt: f32);
}

impl GridCollision for () {
    fn resolve(&mut self, _: &mut Grid, _: f32) {
        /* nothing */
    }
}

/// Produces each cell's `velocity_next` from its `velocity_star`.
pub trait LinearSolver: Send {
    fn solve(&mut self, grid: &mut Grid, dt: f32);
}

/// Explicit integration: `velocity_next = velocity_star`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExplicitSolve;

impl LinearSolver for ExplicitSolve {
    fn solve(&mut self, grid: &mut Grid, _: f32) {
        for cell in grid.cells_mut() {
            cell.velocity_next = cell.velocity_star;
        }
    }
}

/// Runs after the particle velocity update, before positions move.
pub trait ParticleCollision: Send {
    fn resolve(&mut self, particles: &mut [Particle], dt: f32);
}

impl ParticleCollision for () {
    fn resolve(&mut self, _: &mut [Particle], _: f32) {
        /* nothing */
    }
}
