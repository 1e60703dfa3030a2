//! Particle seeding helpers.

use glam::{IVec3, Vec3};
use rand::Rng;

/// Lattice points `center + spacing * (i, j, k)` for every integer offset in
/// `-half..half` along each axis. `half = 5` gives a 10x10x10 block.
pub fn cube_lattice(center: Vec3, half: i32, spacing: f32) -> Vec<Vec3> {
    let mut points = Vec::new();
    for x in -half..half {
        for y in -half..half {
            for z in -half..half {
                points.push(center + spacing * IVec3::new(x, y, z).as_vec3());
            }
        }
    }
    points
}

/// Fill the box `[min, max)` with one point per `spacing`-sized sub-cell,
/// each displaced randomly by up to `jitter * spacing / 2` along each axis.
pub fn jittered_box<R: Rng>(
    min: Vec3,
    max: Vec3,
    spacing: f32,
    jitter: f32,
    rng: &mut R,
) -> Vec<Vec3> {
    assert!(spacing > 0.0, "spacing must be positive, got {spacing}");
    let counts = ((max - min) / spacing).floor().max(Vec3::ZERO).as_uvec3();
    let mut points = Vec::with_capacity((counts.x * counts.y * counts.z) as usize);
    for k in 0..counts.z {
        for j in 0..counts.y {
            for i in 0..counts.x {
                let center = min + (Vec3::new(i as f32, j as f32, k as f32) + 0.5) * spacing;
                let offset = Vec3::new(
                    rng.gen_range(-0.5..=0.5),
                    rng.gen_range(-0.5..=0.5),
                    rng.gen_range(-0.5..=0.5),
                ) * jitter
                    * spacing;
                points.push(center + offset);
            }
        }
    }
    points
}

/// Mass per particle so that `count` particles fill `volume` at `density`.
pub fn particle_mass(density: f32, volume: f32, count: usize) -> f32 {
    assert!(count > 0, "cannot split mass across zero particles");
    density * volume / count as f32
}
