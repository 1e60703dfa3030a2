//! Simulation configuration.
//!
//! [`SimulationParameters`] holds the material and transfer knobs read by the
//! grid and particle stages. [`SolverSettings`] holds the domain, timing and
//! threading choices read only by the [`Solver`](crate::Solver). Both are
//! passed once at construction and never mutated afterwards. Values are not
//! cross-checked; a nonsensical configuration surfaces as a numeric assertion
//! during the first step.

use std::path::Path;

use glam::{UVec3, Vec3};
use serde::{Deserialize, Serialize};

use crate::constants::*;

/// Material and transfer parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    /// Grid cell edge length (H).
    pub cell_size: f32,
    /// Hardening coefficient (xi).
    pub hardening: f32,
    /// Base shear modulus.
    pub mu_0: f32,
    /// Base Lame modulus.
    pub lambda_0: f32,
    /// theta_c
    pub critical_compression: f32,
    /// theta_s
    pub critical_stretch: f32,
    /// FLIP fraction of the particle velocity update.
    pub flip_alpha: f32,
    /// Gravity acceleration, applied along +Z.
    pub gravity: f32,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            hardening: HARDENING,
            mu_0: MU_0,
            lambda_0: LAMBDA_0,
            critical_compression: CRITICAL_COMPRESSION,
            critical_stretch: CRITICAL_STRETCH,
            flip_alpha: FLIP_ALPHA,
            gravity: GRAVITY,
        }
    }
}

impl SimulationParameters {
    pub fn with_cell_size(mut self, cell_size: f32) -> Self {
        self.cell_size = cell_size;
        self
    }

    pub fn with_hardening(mut self, hardening: f32) -> Self {
        self.hardening = hardening;
        self
    }

    /// Set both base moduli.
    pub fn with_moduli(mut self, mu_0: f32, lambda_0: f32) -> Self {
        self.mu_0 = mu_0;
        self.lambda_0 = lambda_0;
        self
    }

    pub fn with_critical_strain(mut self, compression: f32, stretch: f32) -> Self {
        self.critical_compression = compression;
        self.critical_stretch = stretch;
        self
    }

    pub fn with_flip_alpha(mut self, flip_alpha: f32) -> Self {
        self.flip_alpha = flip_alpha;
        self
    }

    pub fn with_gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    /// H^3
    pub fn cell_volume(&self) -> f32 {
        self.cell_size * self.cell_size * self.cell_size
    }

    /// Gravity as an acceleration vector.
    pub fn gravity_vector(&self) -> Vec3 {
        Vec3::new(0.0, 0.0, self.gravity)
    }

    /// Lame parameters (mu, lambda) after hardening for a plastic
    /// determinant `plastic_det`.
    pub fn hardened_moduli(&self, plastic_det: f32) -> (f32, f32) {
        let factor = (self.hardening * (1.0 - plastic_det)).exp();
        (self.mu_0 * factor, self.lambda_0 * factor)
    }

    /// Save parameters to a JSON file
    pub fn save_json(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load parameters from a JSON file. Missing fields take their defaults.
    pub fn load_json(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = std::fs::read_to_string(path)?;
        let params = serde_json::from_str(&json)?;
        Ok(params)
    }
}

/// Domain, timing and threading.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    /// Number of cells along each axis.
    #[serde(with = "crate::serde_utils::uvec3")]
    pub grid_dims: UVec3,
    /// Seconds of simulated time per output frame.
    pub frame_length: f32,
    /// Requested explicit step. Must divide `frame_length`.
    pub sub_step: f32,
    /// Worker threads for the parallel stages.
    pub workers: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            grid_dims: UVec3::splat(DEFAULT_GRID_RESOLUTION),
            frame_length: FRAME_LENGTH,
            sub_step: SUB_STEP,
            workers: rayon::current_num_threads().max(1),
        }
    }
}

impl SolverSettings {
    pub fn with_grid_dims(mut self, grid_dims: UVec3) -> Self {
        self.grid_dims = grid_dims;
        self
    }

    pub fn with_timing(mut self, frame_length: f32, sub_step: f32) -> Self {
        self.frame_length = frame_length;
        self.sub_step = sub_step;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Save settings to a JSON file
    pub fn save_json(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn load_json(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = std::fs::read_to_string(path)?;
        let settings = serde_json::from_str(&json)?;
        Ok(settings)
    }
}
