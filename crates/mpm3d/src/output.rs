//! Per-frame simulation output.
//!
//! A [`SimulationOutput`] is an owned copy of the particle state taken after a
//! frame; later steps never touch it. Volume exporters consume it through
//! [`SimulationOutput::rasterize_density`], which splats particle mass onto a
//! sparse, unbounded density grid with the simulation kernel.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use glam::{IVec3, Mat3, Vec3};
use serde::{Deserialize, Serialize};

use crate::kernels::{cubic_bspline_3d, KERNEL_SUPPORT};
use crate::neighborhood::scan;
use crate::particle::Particle;

/// Name of the density field handed to volume exporters.
pub const DENSITY_FIELD_NAME: &str = "snowdensity";

/// Snapshot of one particle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleState {
    #[serde(with = "crate::serde_utils::vec3")]
    pub position: Vec3,
    #[serde(with = "crate::serde_utils::vec3")]
    pub velocity: Vec3,
    pub mass: f32,
    pub volume: f32,
    #[serde(with = "crate::serde_utils::mat3")]
    pub deformation_elastic: Mat3,
    #[serde(with = "crate::serde_utils::mat3")]
    pub deformation_plastic: Mat3,
}

impl From<&Particle> for ParticleState {
    fn from(p: &Particle) -> Self {
        Self {
            position: p.position,
            velocity: p.velocity,
            mass: p.mass(),
            volume: p.volume,
            deformation_elastic: p.deformation_elastic,
            deformation_plastic: p.deformation_plastic,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    /// Steps completed when the snapshot was taken.
    pub step: u64,
    /// Simulated seconds at the snapshot.
    pub time: f64,
    pub particles: Vec<ParticleState>,
}

impl SimulationOutput {
    pub fn new(step: u64, time: f64, particles: &[Particle]) -> Self {
        Self {
            step,
            time,
            particles: particles.iter().map(ParticleState::from).collect(),
        }
    }

    pub fn particles(&self) -> &[ParticleState] {
        &self.particles
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn total_mass(&self) -> f32 {
        self.particles.iter().map(|p| p.mass).sum()
    }

    /// Mass-weighted mean position, or `None` without particles.
    pub fn center_of_mass(&self) -> Option<Vec3> {
        let mass = self.total_mass();
        if self.is_empty() || mass <= 0.0 {
            return None;
        }
        let weighted: Vec3 = self.particles.iter().map(|p| p.position * p.mass).sum();
        Some(weighted / mass)
    }

    /// Splat particle mass onto a sparse grid of `cell_size` cells.
    pub fn rasterize_density(&self, cell_size: f32) -> DensityField {
        let mut values: HashMap<IVec3, f32> = HashMap::new();
        for particle in &self.particles {
            for (coord, delta) in scan(particle.position, cell_size) {
                // Rounding can push the outermost scanned cells onto the
                // support edge, where the weight is zero anyway
                if delta.abs().max_element() >= KERNEL_SUPPORT {
                    continue;
                }
                let weight = cubic_bspline_3d(delta);
                if weight > 0.0 {
                    *values.entry(coord).or_insert(0.0) += weight * particle.mass;
                }
            }
        }
        DensityField {
            name: DENSITY_FIELD_NAME.to_string(),
            cell_size,
            values,
        }
    }

    /// One `x y z` line per particle.
    pub fn write_positions<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for p in &self.particles {
            writeln!(writer, "{} {} {}", p.position.x, p.position.y, p.position.z)?;
        }
        writer.flush()
    }

    /// Save the snapshot to a JSON file
    pub fn save_json(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let json = serde_json::to_string(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a snapshot from a JSON file
    pub fn load_json(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let json = std::fs::read_to_string(path)?;
        let output = serde_json::from_str(&json)?;
        Ok(output)
    }
}

/// Sparse scalar field keyed by integer cell coordinate.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityField {
    name: String,
    cell_size: f32,
    values: HashMap<IVec3, f32>,
}

impl DensityField {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Value at `coord`; zero where nothing was splatted.
    pub fn get(&self, coord: IVec3) -> f32 {
        self.values.get(&coord).copied().unwrap_or(0.0)
    }

    /// Number of active (nonzero) cells.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Active cells in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (IVec3, f32)> + '_ {
        self.values.iter().map(|(&coord, &value)| (coord, value))
    }

    pub fn total(&self) -> f32 {
        self.values.values().sum()
    }

    /// Inclusive (min, max) coordinates of the active cells.
    pub fn bounds(&self) -> Option<(IVec3, IVec3)> {
        let mut coords = self.values.keys();
        let first = *coords.next()?;
        Some(coords.fold((first, first), |(lo, hi), &c| (lo.min(c), hi.max(c))))
    }
}
