//! Particle-to-grid rasterization tests
//!
//! Mass and momentum must land on exactly the cells inside a particle's
//! kernel support and nowhere else.

use mpm3d::{Grid, ParallelExecutor, ParticleSystem, SimulationParameters, UVec3, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn rasterize(dims: UVec3, particles: &[(Vec3, Vec3, f32)], workers: usize) -> (Grid, ParticleSystem) {
    let params = SimulationParameters::default();
    let executor = ParallelExecutor::new(workers);
    let mut grid = Grid::new(dims, params);
    let mut system = ParticleSystem::new(params);
    for &(position, velocity, mass) in particles {
        system.add_particle(position, velocity, mass);
    }
    system.cache_particle_grads(&grid, &executor);
    grid.rasterize_particles(system.particles(), &executor);
    (grid, system)
}

/// A unit mass at (3.5, 3.5, 3.5) covers cells 2..=5 on each axis
#[test]
fn test_single_particle_support() {
    let (grid, _) = rasterize(UVec3::splat(10), &[(Vec3::splat(3.5), Vec3::ZERO, 1.0)], 2);

    let mut support_mass = 0.0;
    grid.for_each_cell(|coord, cell| {
        let inside = coord.cmpge(UVec3::splat(2)).all() && coord.cmple(UVec3::splat(5)).all();
        if inside {
            assert!(cell.mass > 0.0, "support cell {coord} received no mass");
            support_mass += cell.mass;
        } else {
            assert_eq!(cell.mass, 0.0, "cell {coord} outside support has mass");
        }
    });
    assert!((support_mass - 1.0).abs() < 1e-5, "support mass {support_mass}");
}

/// The nearest cells get the largest share
#[test]
fn test_weights_peak_near_particle() {
    let (grid, _) = rasterize(UVec3::splat(10), &[(Vec3::splat(3.5), Vec3::ZERO, 1.0)], 1);
    let near = grid.cell(UVec3::splat(3)).mass;
    let far = grid.cell(UVec3::splat(2)).mass;
    assert!(near > far);
    // (3, 3, 3) and (4, 4, 4) are equidistant from 3.5
    assert!((near - grid.cell(UVec3::splat(4)).mass).abs() < 1e-6);
}

#[test]
fn test_mass_round_trip_random_particles() {
    let mut rng = StdRng::seed_from_u64(42);
    let particles: Vec<_> = (0..500)
        .map(|_| {
            let position = Vec3::new(
                rng.gen_range(3.0..13.0),
                rng.gen_range(3.0..13.0),
                rng.gen_range(3.0..13.0),
            );
            let velocity = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            );
            (position, velocity, rng.gen_range(0.1..2.0))
        })
        .collect();

    let (grid, system) = rasterize(UVec3::splat(16), &particles, 4);

    let particle_mass = system.total_mass();
    let particle_momentum = system.total_momentum();
    assert!(
        (grid.total_mass() - particle_mass).abs() < 1e-3 * particle_mass,
        "grid mass {} vs particle mass {particle_mass}",
        grid.total_mass()
    );
    assert!(
        (grid.total_momentum() - particle_momentum).length() < 1e-2,
        "grid momentum {} vs particle momentum {particle_momentum}",
        grid.total_momentum()
    );
}

/// Particles near the boundary lose the weight of out-of-range cells
#[test]
fn test_boundary_particle_loses_out_of_range_weight() {
    let (grid, system) = rasterize(UVec3::splat(6), &[(Vec3::splat(0.2), Vec3::ZERO, 1.0)], 2);
    let p = &system.particles()[0];
    assert!(p.neighbors.len() < mpm3d::MAX_NEIGHBORS);
    assert!(grid.total_mass() < 1.0);
    assert!(grid.total_mass() > 0.0);
}

#[test]
fn test_interior_particle_fills_neighbor_cache() {
    let (_, system) = rasterize(UVec3::splat(10), &[(Vec3::new(4.1, 5.3, 4.9), Vec3::ZERO, 1.0)], 1);
    assert_eq!(system.particles()[0].neighbors.len(), mpm3d::MAX_NEIGHBORS);
}
