//! Material points and their per-step updates.
//!
//! Each particle carries its own elastic/plastic split of the deformation
//! gradient. The grid is only ever read from here; every stage that writes
//! to the grid lives in [`crate::grid`].

use std::sync::atomic::{AtomicUsize, Ordering};

use glam::{Mat3, Vec3};

use crate::grid::Grid;
use crate::hooks::ParticleCollision;
use crate::neighborhood::{fill_cache, NeighborCache};
use crate::parallel::ParallelExecutor;
use crate::params::SimulationParameters;
use crate::svd::{polar_rotation, svd3};
use crate::validate::{assert_finite, assert_finite_mat3, assert_finite_vec3, assert_non_singular};

/// A single material point.
#[derive(Clone, Debug)]
pub struct Particle {
    /// World position
    pub position: Vec3,
    pub velocity: Vec3,
    /// Rest volume. Zero until estimated on the first step.
    pub volume: f32,
    /// Elastic deformation gradient F_e
    pub deformation_elastic: Mat3,
    /// Plastic deformation gradient F_p
    pub deformation_plastic: Mat3,
    /// Rotation part of F_e, refreshed with every deformation update.
    pub rotation_elastic: Mat3,
    /// Grid cells within kernel support, rebuilt every step.
    pub neighbors: NeighborCache,
    mass: f32,
}

impl Particle {
    /// Create an undeformed particle. Panics unless `mass > 0`.
    #[track_caller]
    pub fn new(position: Vec3, velocity: Vec3, mass: f32) -> Self {
        assert!(mass > 0.0, "particle mass must be positive, got {mass}");
        Self {
            position,
            velocity,
            volume: 0.0,
            deformation_elastic: Mat3::IDENTITY,
            deformation_plastic: Mat3::IDENTITY,
            rotation_elastic: Mat3::IDENTITY,
            neighbors: NeighborCache::new(),
            mass,
        }
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn momentum(&self) -> Vec3 {
        self.velocity * self.mass
    }

    /// Total deformation gradient F = F_e F_p.
    pub fn deformation(&self) -> Mat3 {
        self.deformation_elastic * self.deformation_plastic
    }

    /// Fixed-corotated Cauchy stress with exponential hardening.
    ///
    /// `sigma = 2 mu (F_e - R_e) F_e^T + lambda (J_e - 1) J_e I`
    #[track_caller]
    pub fn cauchy_stress(&self, params: &SimulationParameters) -> Mat3 {
        let j_p = self.deformation_plastic.determinant();
        let j_e = self.deformation_elastic.determinant();
        let (mu, lambda) = params.hardened_moduli(j_p);

        let stress = 2.0 * mu * (self.deformation_elastic - self.rotation_elastic)
            * self.deformation_elastic.transpose()
            + Mat3::from_diagonal(Vec3::splat(lambda * (j_e - 1.0) * j_e));
        assert_finite_mat3(stress, "Cauchy stress");
        stress
    }
}

/// Clamp singular values into `[1 - critical_compression, 1 + critical_stretch]`.
/// Returns the clamped values and their reciprocals.
pub fn clamp_singular_values(
    singular_values: Vec3,
    critical_compression: f32,
    critical_stretch: f32,
) -> (Vec3, Vec3) {
    let clamped = singular_values.clamp(
        Vec3::splat(1.0 - critical_compression),
        Vec3::splat(1.0 + critical_stretch),
    );
    (clamped, clamped.recip())
}

/// Owns every particle and runs the particle-side pipeline stages.
pub struct ParticleSystem {
    params: SimulationParameters,
    particles: Vec<Particle>,
}

impl ParticleSystem {
    pub fn new(params: SimulationParameters) -> Self {
        Self {
            params,
            particles: Vec::new(),
        }
    }

    /// Append a particle at rest shape. Volume is filled in on the first step.
    #[track_caller]
    pub fn add_particle(&mut self, position: Vec3, velocity: Vec3, mass: f32) {
        self.particles.push(Particle::new(position, velocity, mass));
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn total_mass(&self) -> f32 {
        self.particles.iter().map(Particle::mass).sum()
    }

    pub fn total_momentum(&self) -> Vec3 {
        self.particles.iter().map(Particle::momentum).sum()
    }

    // =========================================================================
    // Pipeline stages
    // =========================================================================

    /// Rebuild each particle's neighbor cache for the current positions.
    pub fn cache_particle_grads(&mut self, grid: &Grid, executor: &ParallelExecutor) {
        let cell_size = self.params.cell_size;
        let dims = grid.dims();
        executor.for_each_mut(&mut self.particles, |particle| {
            fill_cache(&mut particle.neighbors, particle.position, cell_size, dims);
        });
    }

    /// Estimate rest volumes from the rasterized mass. First step only.
    pub fn estimate_particle_volumes(&mut self, grid: &mut Grid, executor: &ParallelExecutor) {
        let cell_volume = self.params.cell_volume();
        let cells = grid.cell_view();
        let without_density = AtomicUsize::new(0);
        executor.for_each_mut(&mut self.particles, |particle| {
            let density: f32 = particle
                .neighbors
                .iter()
                .map(|n| n.weight * cells[n.index].mass / cell_volume)
                .sum();
            assert_finite(density, "particle density");
            if density > 0.0 {
                particle.volume = particle.mass / density;
            } else {
                without_density.fetch_add(1, Ordering::Relaxed);
            }
        });

        let missing = without_density.into_inner();
        if missing > 0 {
            log::warn!("{missing} particles have no grid density; their volume stays at zero");
        }
    }

    /// Advance F_e and F_p with the grid velocity field and apply plastic
    /// yield.
    pub fn update_deformation_gradients(
        &mut self,
        dt: f32,
        grid: &mut Grid,
        executor: &ParallelExecutor,
    ) {
        let params = self.params;
        let cells = grid.cell_view();
        executor.for_each_mut(&mut self.particles, |particle| {
            let velocity_gradient = particle.neighbors.iter().fold(Mat3::ZERO, |acc, n| {
                acc + outer(cells[n.index].velocity_star, n.weight_gradient)
            });

            let elastic = (Mat3::IDENTITY + dt * velocity_gradient) * particle.deformation_elastic;
            let total = elastic * particle.deformation_plastic;

            let svd = svd3(elastic);
            let (clamped, clamped_inv) = clamp_singular_values(
                svd.s,
                params.critical_compression,
                params.critical_stretch,
            );

            particle.deformation_elastic = svd.u * Mat3::from_diagonal(clamped) * svd.v.transpose();
            particle.deformation_plastic =
                svd.v * Mat3::from_diagonal(clamped_inv) * svd.u.transpose() * total;
            particle.rotation_elastic = polar_rotation(particle.deformation_elastic);

            assert_non_singular(particle.deformation_elastic, "elastic deformation gradient");
            assert_non_singular(particle.deformation_plastic, "plastic deformation gradient");
            assert_finite_mat3(particle.rotation_elastic, "elastic rotation");
        });
    }

    /// Blend PIC and FLIP velocities from the integrated grid.
    pub fn update_velocities(&mut self, grid: &mut Grid, executor: &ParallelExecutor) {
        let alpha = self.params.flip_alpha;
        let cells = grid.cell_view();
        executor.for_each_mut(&mut self.particles, |particle| {
            let mut pic = Vec3::ZERO;
            let mut flip = particle.velocity;
            for n in &particle.neighbors {
                let cell = cells[n.index];
                pic += cell.velocity_star * n.weight;
                flip += (cell.velocity_star - cell.velocity) * n.weight;
            }
            particle.velocity = (1.0 - alpha) * pic + alpha * flip;
            assert_finite_vec3(particle.velocity, "particle velocity");
        });
    }

    /// Particle-based collision stage.
    pub fn apply_collisions(&mut self, collision: &mut dyn ParticleCollision, dt: f32) {
        collision.resolve(&mut self.particles, dt);
    }

    /// Explicit Euler: `x += dt * v`.
    pub fn update_positions(&mut self, dt: f32, executor: &ParallelExecutor) {
        executor.for_each_mut(&mut self.particles, |particle| {
            particle.position += dt * particle.velocity;
            assert_finite_vec3(particle.position, "particle position");
        });
    }
}

/// `a b^T`
#[inline]
fn outer(a: Vec3, b: Vec3) -> Mat3 {
    Mat3::from_cols(a * b.x, a * b.y, a * b.z)
}
