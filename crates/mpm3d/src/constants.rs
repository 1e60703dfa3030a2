//! Default material and timing constants for the snow simulation.
//!
//! ## Units
//!
//! Lengths are in grid units scaled by [`DEFAULT_CELL_SIZE`], time in seconds.
//! The material moduli are deliberately soft defaults; real snow uses moduli
//! several orders of magnitude larger together with a much smaller sub-step.

/// Gravity acceleration along +Z (m/s^2). Negative pulls toward z = 0.
pub const GRAVITY: f32 = -9.81;

/// Edge length of one grid cell.
pub const DEFAULT_CELL_SIZE: f32 = 1.0;

// =============================================================================
// CONSTITUTIVE MODEL
// =============================================================================

/// Hardening coefficient (xi). Scales how quickly the moduli grow under
/// plastic compression.
pub const HARDENING: f32 = 1.0;

/// Base shear modulus (mu_0).
pub const MU_0: f32 = 1.0;

/// Base Lame modulus (lambda_0).
pub const LAMBDA_0: f32 = 1.0;

/// Critical compression (theta_c). Singular values below `1 - theta_c` yield.
pub const CRITICAL_COMPRESSION: f32 = 0.025;

/// Critical stretch (theta_s). Singular values above `1 + theta_s` yield.
pub const CRITICAL_STRETCH: f32 = 0.0075;

/// FLIP/PIC blend (0.95 = 95% FLIP, 5% PIC).
pub const FLIP_ALPHA: f32 = 0.95;

// =============================================================================
// TIMING
// =============================================================================

/// Duration of one output frame (24 fps).
pub const FRAME_LENGTH: f32 = 1.0 / 24.0;

/// Explicit sub-step. Must divide [`FRAME_LENGTH`] evenly.
pub const SUB_STEP: f32 = 1.0 / 2400.0;

/// Relative tolerance when checking that a frame is a whole number of sub-steps.
pub const FRAME_DIVISIBILITY_TOLERANCE: f32 = 1e-4;

/// Default grid resolution along each axis.
pub const DEFAULT_GRID_RESOLUTION: u32 = 50;
