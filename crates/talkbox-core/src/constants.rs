//! Engine-wide compile-time parameters.
//!
//! These are fixed at build time; an instance is parameterized only by its
//! sample rate. The shift constants below are derived from the lengths and
//! rely on the power-of-two assertions at the bottom of the file.

/// All-pole model order.
pub const ORDER: usize = 50;

/// Samples per analysis block.
pub const BLOCK_LENGTH: usize = 512;

/// Number of past autocorrelation vectors averaged by the analysis pass.
pub const NUM_ACF: usize = 4;

/// Length of the FIR integrator behind the voice envelope.
pub const MEMORY_RMS_SIZE: usize = 4;

/// Fractional bits of the prediction coefficients (Q8.24).
pub const FRACTIONAL_DIGITS: u32 = 24;

/// Q1.31 unity, `0x7FFF_FFFF`.
pub const Q31_ONE: i32 = 0x7FFF_FFFF;

/// Reflection coefficient clamp, 0.99 in Q1.31. Keeps every pole of the
/// synthesis filter strictly inside the unit circle.
pub const K_MAX: i32 = (0.99 * Q31_ONE as f64) as i32;

/// `log2(BLOCK_LENGTH)`, the per-block envelope normalization shift.
pub const N_SHIFT_BLOCK: u32 = BLOCK_LENGTH.trailing_zeros() as u32;

/// `log2(MEMORY_RMS_SIZE)`, the envelope integrator normalization shift.
pub const N_SHIFT_MEMORY: u32 = MEMORY_RMS_SIZE.trailing_zeros() as u32;

/// `log2(NUM_ACF)`, the ring-average normalization shift.
pub const ACF_AVG_SHIFT: u32 = NUM_ACF.trailing_zeros() as u32;

/// Smoothing time constant applied at construction, seconds.
pub const DEFAULT_SMOOTHING_TIME: f64 = 0.03;

/// Pre-emphasis cutoff applied at construction, Hz.
pub const DEFAULT_PREEMPHASIS_HZ: f64 = 20_000.0;

// The derived shifts above are exact only for power-of-two lengths, and the
// ring average divides by shifting.
const _: () = assert!(BLOCK_LENGTH.is_power_of_two());
const _: () = assert!(NUM_ACF.is_power_of_two());
const _: () = assert!(MEMORY_RMS_SIZE.is_power_of_two());
const _: () = assert!(FRACTIONAL_DIGITS < 32);
