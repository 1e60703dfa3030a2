//! Explicit MPM time stepping.
//!
//! One [`Solver::step`] runs the full grid/particle round trip:
//!
//! 1. cache kernel neighborhoods
//! 2. rasterize mass and momentum, normalize to velocity
//! 3. estimate particle volumes (first step only)
//! 4. grid forces from particle stress
//! 5. integrate grid velocities
//! 6. grid collision hook
//! 7. linear solve hook
//! 8. deformation gradient update
//! 9. FLIP/PIC particle velocity update
//! 10. particle collision hook
//! 11. move particles
//! 12. reset the grid
//!
//! Every stage finishes on all workers before the next one starts.

use glam::Vec3;

use crate::constants::FRAME_DIVISIBILITY_TOLERANCE;
use crate::grid::Grid;
use crate::hooks::{ExplicitSolve, GridCollision, LinearSolver, ParticleCollision};
use crate::output::SimulationOutput;
use crate::parallel::ParallelExecutor;
use crate::params::{SimulationParameters, SolverSettings};
use crate::particle::ParticleSystem;

/// Number of whole sub-steps in a frame.
///
/// Panics unless `frame_length / sub_step` is a positive integer within a
/// relative tolerance.
#[track_caller]
pub fn steps_per_frame(frame_length: f32, sub_step: f32) -> u32 {
    let ratio = frame_length / sub_step;
    assert!(
        ratio.is_finite() && ratio >= 0.5,
        "frame length {frame_length} must be at least one sub-step of {sub_step}"
    );
    let steps = ratio.round();
    assert!(
        (ratio - steps).abs() <= FRAME_DIVISIBILITY_TOLERANCE * steps,
        "frame length {frame_length} is not a multiple of the sub-step {sub_step} ({ratio} steps)"
    );
    steps as u32
}

pub struct Solver {
    settings: SolverSettings,
    grid: Grid,
    particles: ParticleSystem,
    executor: ParallelExecutor,
    grid_collision: Box<dyn GridCollision>,
    linear_solver: Box<dyn LinearSolver>,
    particle_collision: Box<dyn ParticleCollision>,
    step_count: u64,
    elapsed: f64,
}

impl Solver {
    /// Empty solver with no-op collisions and the explicit solve.
    pub fn new(settings: SolverSettings, params: SimulationParameters) -> Self {
        let grid = Grid::new(settings.grid_dims, params);
        let executor = ParallelExecutor::new(settings.workers);
        log::info!(
            "MPM solver: {} grid, H = {}, {} workers, frame {:.4}s / sub-step {:.6}s",
            settings.grid_dims,
            params.cell_size,
            settings.workers,
            settings.frame_length,
            settings.sub_step
        );
        Self {
            settings,
            grid,
            particles: ParticleSystem::new(params),
            executor,
            grid_collision: Box::new(()),
            linear_solver: Box::new(ExplicitSolve),
            particle_collision: Box::new(()),
            step_count: 0,
            elapsed: 0.0,
        }
    }

    pub fn with_grid_collision(mut self, collision: impl GridCollision + 'static) -> Self {
        self.grid_collision = Box::new(collision);
        self
    }

    pub fn with_linear_solver(mut self, solver: impl LinearSolver + 'static) -> Self {
        self.linear_solver = Box::new(solver);
        self
    }

    pub fn with_particle_collision(mut self, collision: impl ParticleCollision + 'static) -> Self {
        self.particle_collision = Box::new(collision);
        self
    }

    #[track_caller]
    pub fn add_particle(&mut self, position: Vec3, velocity: Vec3, mass: f32) {
        self.particles.add_particle(position, velocity, mass);
    }

    /// Advance by one explicit step of `dt` seconds.
    pub fn step(&mut self, dt: f32) {
        log::debug!("Beginning step {}", self.step_count);
        let executor = &self.executor;

        self.particles.cache_particle_grads(&self.grid, executor);
        self.grid.rasterize_particles(self.particles.particles(), executor);
        if self.step_count == 0 {
            self.particles.estimate_particle_volumes(&mut self.grid, executor);
        }

        self.grid.compute_grid_forces(self.particles.particles(), executor);
        self.grid.update_grid_velocities(dt, executor);
        self.grid.apply_collisions(self.grid_collision.as_mut(), dt);
        self.grid.solve(self.linear_solver.as_mut(), dt);

        self.particles.update_deformation_gradients(dt, &mut self.grid, executor);
        self.particles.update_velocities(&mut self.grid, executor);
        self.particles.apply_collisions(self.particle_collision.as_mut(), dt);
        self.particles.update_positions(dt, executor);

        self.grid.reset(executor);
        self.step_count += 1;
        self.elapsed += f64::from(dt);
    }

    /// Simulate one frame and return a snapshot of the particles.
    pub fn next_frame(&mut self) -> SimulationOutput {
        let steps = steps_per_frame(self.settings.frame_length, self.settings.sub_step);
        let dt = self.settings.frame_length / steps as f32;

        for _ in 0..steps {
            if let Some(p) = self.particles.particles().first() {
                log::trace!(
                    "t = {:.5}: particle 0 at {} moving {} (F_p diagonal {}, {}, {})",
                    self.elapsed,
                    p.position,
                    p.velocity,
                    p.deformation_plastic.x_axis.x,
                    p.deformation_plastic.y_axis.y,
                    p.deformation_plastic.z_axis.z
                );
            }
            self.step(dt);
        }

        log::info!(
            "Frame done: {} steps of {:.6}s, t = {:.4}s, {} particles",
            steps,
            dt,
            self.elapsed,
            self.particles.len()
        );
        self.output()
    }

    /// Snapshot of the current particle state.
    pub fn output(&self) -> SimulationOutput {
        SimulationOutput::new(self.step_count, self.elapsed, self.particles.particles())
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Simulated seconds so far.
    pub fn elapsed_time(&self) -> f64 {
        self.elapsed
    }

    pub fn settings(&self) -> &SolverSettings {
        &self.settings
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut ParticleSystem {
        &mut self.particles
    }
}
