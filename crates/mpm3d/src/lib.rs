//! 3D Material Point Method for elastoplastic snow
//!
//! Particles carry mass, velocity and a deformation gradient split into
//! elastic and plastic parts. Each step scatters particle state to a dense
//! background grid, integrates forces there, and gathers the result back
//! with a FLIP/PIC blend. Plasticity comes from clamping the singular values
//! of the elastic deformation gradient.
//!
//! # Example
//!
//! ```
//! use mpm3d::{scene, SimulationParameters, Solver, SolverSettings, UVec3, Vec3};
//!
//! let settings = SolverSettings::default()
//!     .with_grid_dims(UVec3::splat(16))
//!     .with_timing(0.004, 0.001)
//!     .with_workers(2);
//! let mut solver = Solver::new(settings, SimulationParameters::default());
//!
//! // A 4x4x4 block of snow in the middle of the domain
//! for position in scene::cube_lattice(Vec3::splat(8.0), 2, 1.0) {
//!     solver.add_particle(position, Vec3::ZERO, 0.001);
//! }
//!
//! let frame = solver.next_frame();
//! assert_eq!(frame.len(), 64);
//! assert!(frame.particles().iter().all(|p| p.position.z < 8.0 + 2.0));
//! ```

pub mod constants;
pub mod grid;
pub mod hooks;
pub mod kernels;
pub mod neighborhood;
pub mod output;
pub mod parallel;
pub mod params;
pub mod particle;
pub mod scene;
pub mod serde_utils;
pub mod solver;
pub mod svd;
pub mod validate;

pub use glam::{IVec3, Mat3, UVec3, Vec3};
pub use grid::{Cell, Grid};
pub use hooks::{ExplicitSolve, GridCollision, LinearSolver, ParticleCollision};
pub use neighborhood::{GridNeighbor, NeighborCache, MAX_NEIGHBORS};
pub use output::{DensityField, ParticleState, SimulationOutput};
pub use parallel::{partition, ParallelExecutor};
pub use params::{SimulationParameters, SolverSettings};
pub use particle::{Particle, ParticleSystem};
pub use solver::{steps_per_frame, Solver};
pub use svd::{polar_rotation, svd3, Svd3};
